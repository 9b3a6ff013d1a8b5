//! Array operations: get/set by index, erase, resize.

use super::config::MAX_ARRAY_LEN;
use super::DataStore;
use crate::arena::ContainerHeader;
use crate::error::ShapeError;
use crate::value::{DataNode, Handle};

const HEADER: usize = crate::arena::container::HEADER_WORDS;

fn header(store: &DataStore, h: Handle) -> Result<(usize, ContainerHeader), ShapeError> {
    if !store.arena().is_valid(h) {
        return Err(ShapeError::InvalidHandle);
    }
    let offset = store.arena().offset_of(h).unwrap();
    Ok((offset, ContainerHeader::read_at(store.arena().heap(), offset)))
}

pub fn len(store: &DataStore, h: Handle) -> Result<u32, ShapeError> {
    Ok(header(store, h)?.1.count)
}

pub fn get(store: &DataStore, h: Handle, index: u32) -> Result<DataNode, ShapeError> {
    let (offset, hdr) = header(store, h)?;
    if index >= hdr.count {
        return Err(ShapeError::IndexOutOfRange);
    }
    let word = store.arena().heap()[offset + HEADER + index as usize];
    DataNode::decode(word).ok_or(ShapeError::NotAContainer)
}

fn ensure_capacity(store: &mut DataStore, h: Handle, needed: u32) -> Result<(), ShapeError> {
    let (offset, hdr) = header(store, h)?;
    if needed <= hdr.capacity {
        return Ok(());
    }
    let new_capacity = needed.max(hdr.capacity.saturating_mul(2)).max(4);
    store
        .arena_mut()
        .reallocate(h, HEADER + hdr.capacity as usize, HEADER + new_capacity as usize);
    let offset = store.arena().offset_of(h).unwrap();
    ContainerHeader {
        capacity: new_capacity,
        ..hdr
    }
    .write_at(store.arena_mut().heap_mut(), offset);
    let _ = offset;
    Ok(())
}

/// Set `index`, growing the array (null-filling new slots) if
/// `index >= len`. Rejects oversize arrays.
pub fn set(store: &mut DataStore, h: Handle, index: u32, value: DataNode) -> Result<(), ShapeError> {
    if index >= MAX_ARRAY_LEN {
        return Err(ShapeError::IndexOutOfRange);
    }
    store.with_gc_suppressed(|store| {
        ensure_capacity(store, h, index + 1)?;
        let (offset, hdr) = header(store, h)?;
        if index >= hdr.count {
            // Null-fill the gap between the old tail and the new index.
            for i in hdr.count..index {
                store.arena_mut().heap_mut()[offset + HEADER + i as usize] = DataNode::Null.encode();
            }
            ContainerHeader {
                count: index + 1,
                ..hdr
            }
            .write_at(store.arena_mut().heap_mut(), offset);
        }
        store.arena_mut().heap_mut()[offset + HEADER + index as usize] = value.encode();
        Ok(())
    })?;
    store.maybe_collect();
    Ok(())
}

/// Append to the tail, equivalent to `set(h, len(h), value)`.
pub fn push(store: &mut DataStore, h: Handle, value: DataNode) -> Result<(), ShapeError> {
    let n = len(store, h)?;
    set(store, h, n, value)
}

/// Erase `index`, shifting the tail forward by one.
pub fn erase(store: &mut DataStore, h: Handle, index: u32) -> Result<(), ShapeError> {
    let (offset, hdr) = header(store, h)?;
    if index >= hdr.count {
        return Err(ShapeError::IndexOutOfRange);
    }
    for i in index..hdr.count - 1 {
        let word = store.arena().heap()[offset + HEADER + i as usize + 1];
        store.arena_mut().heap_mut()[offset + HEADER + i as usize] = word;
    }
    store.arena_mut().heap_mut()[offset + HEADER + (hdr.count - 1) as usize] = DataNode::Null.encode();
    ContainerHeader {
        count: hdr.count - 1,
        ..hdr
    }
    .write_at(store.arena_mut().heap_mut(), offset);
    Ok(())
}

/// Truncate or null-extend to `new_len`.
pub fn resize(store: &mut DataStore, h: Handle, new_len: u32) -> Result<(), ShapeError> {
    if new_len >= MAX_ARRAY_LEN {
        return Err(ShapeError::IndexOutOfRange);
    }
    let (offset, hdr) = header(store, h)?;
    if new_len <= hdr.count {
        for i in new_len..hdr.count {
            store.arena_mut().heap_mut()[offset + HEADER + i as usize] = DataNode::Null.encode();
        }
        ContainerHeader { count: new_len, ..hdr }.write_at(store.arena_mut().heap_mut(), offset);
        Ok(())
    } else if new_len == 0 {
        ContainerHeader { count: 0, ..hdr }.write_at(store.arena_mut().heap_mut(), offset);
        Ok(())
    } else {
        set(store, h, new_len - 1, DataNode::Null)
    }
}

pub fn iter(store: &DataStore, h: Handle) -> Result<Vec<DataNode>, ShapeError> {
    let (offset, hdr) = header(store, h)?;
    let mut out = Vec::with_capacity(hdr.count as usize);
    for i in 0..hdr.count {
        let word = store.arena().heap()[offset + HEADER + i as usize];
        out.push(DataNode::decode(word).ok_or(ShapeError::NotAContainer)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataStore;

    #[test]
    fn set_grows_and_null_fills() {
        let mut store = DataStore::new();
        store.make_array();
        let h = DataStore::expect_array(store.root()).unwrap();
        set(&mut store, h, 2, DataNode::Int32Small(7)).unwrap();
        assert_eq!(len(&store, h).unwrap(), 3);
        assert_eq!(get(&store, h, 0).unwrap(), DataNode::Null);
        assert_eq!(get(&store, h, 1).unwrap(), DataNode::Null);
        assert_eq!(get(&store, h, 2).unwrap(), DataNode::Int32Small(7));
    }

    #[test]
    fn erase_shifts_tail() {
        let mut store = DataStore::new();
        store.make_array();
        let h = DataStore::expect_array(store.root()).unwrap();
        for i in 0..4 {
            push(&mut store, h, DataNode::Int32Small(i)).unwrap();
        }
        erase(&mut store, h, 1).unwrap();
        assert_eq!(iter(&store, h).unwrap(), vec![
            DataNode::Int32Small(0),
            DataNode::Int32Small(2),
            DataNode::Int32Small(3),
        ]);
    }

    #[test]
    fn oversize_rejected() {
        let mut store = DataStore::new();
        store.make_array();
        let h = DataStore::expect_array(store.root()).unwrap();
        assert_eq!(
            set(&mut store, h, MAX_ARRAY_LEN, DataNode::Null),
            Err(ShapeError::IndexOutOfRange)
        );
    }

    #[test]
    fn resize_truncates_and_nulls() {
        let mut store = DataStore::new();
        store.make_array();
        let h = DataStore::expect_array(store.root()).unwrap();
        for i in 0..5 {
            push(&mut store, h, DataNode::Int32Small(i)).unwrap();
        }
        resize(&mut store, h, 2).unwrap();
        assert_eq!(len(&store, h).unwrap(), 2);
        resize(&mut store, h, 4).unwrap();
        assert_eq!(iter(&store, h).unwrap()[2], DataNode::Null);
    }
}
