//! Structural sanity checks for a freshly loaded store: every decoded word
//! must name a valid type, every by-reference handle must resolve inside
//! the heap, and every container's header must describe a region that
//! actually fits.
//!
//! This runs after [`super::load::load`] as a defence against a truncated or
//! hand-edited file producing an `Arena` that merely happens not to panic —
//! `load` trusts the header counts it reads; this is the pass that doesn't.

use std::collections::HashSet;

use crate::arena::ContainerHeader;
use crate::error::LoadError;
use crate::store::table::check_probe_invariant;
use crate::store::DataStore;
use crate::value::{DataNode, Handle};

const HEADER: usize = crate::arena::container::HEADER_WORDS;

/// Walk every value reachable from `store`'s root, returning the first
/// structural violation found.
pub fn verify_integrity(store: &DataStore) -> Result<(), LoadError> {
    let mut visited = HashSet::new();
    check_node(store, store.root(), &mut visited)
}

fn check_node(store: &DataStore, node: DataNode, visited: &mut HashSet<u32>) -> Result<(), LoadError> {
    match node {
        DataNode::Array(h) => check_array(store, h, visited),
        DataNode::Table(h) => check_table(store, h, visited),
        DataNode::String(h) => check_string(store, h),
        DataNode::Int32Big(h) | DataNode::UInt32(h) | DataNode::Float32(h) => check_scalar_handle(store, h, 1),
        DataNode::Int64(h) | DataNode::UInt64(h) => check_scalar_handle(store, h, 2),
        _ => Ok(()),
    }
}

fn check_handle_in_range(store: &DataStore, h: Handle) -> Result<usize, LoadError> {
    store.arena().offset_of(h).ok_or(LoadError::CorruptContainerHeader)
}

fn check_scalar_handle(store: &DataStore, h: Handle, words: usize) -> Result<(), LoadError> {
    let offset = check_handle_in_range(store, h)?;
    if offset + words > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    Ok(())
}

fn check_string(store: &DataStore, h: Handle) -> Result<(), LoadError> {
    let offset = check_handle_in_range(store, h)?;
    if offset + HEADER > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    let hdr = ContainerHeader::read_at(store.arena().heap(), offset);
    // `capacity` is a word count, `count` a byte length; the NUL terminator
    // must fit inside the reserved words.
    if (hdr.count as usize) + 1 > (hdr.capacity as usize) * 4 {
        return Err(LoadError::OversizeCount);
    }
    if offset + HEADER + hdr.capacity as usize > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    Ok(())
}

fn check_array(store: &DataStore, h: Handle, visited: &mut HashSet<u32>) -> Result<(), LoadError> {
    if !visited.insert(h.index) {
        return Ok(());
    }
    let offset = check_handle_in_range(store, h)?;
    if offset + HEADER > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    let hdr = ContainerHeader::read_at(store.arena().heap(), offset);
    if hdr.count > hdr.capacity {
        return Err(LoadError::OversizeCount);
    }
    let values_start = offset + HEADER;
    if values_start + hdr.capacity as usize > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    for i in 0..hdr.count as usize {
        let word = store.arena().heap()[values_start + i];
        let node = DataNode::decode(word).ok_or(LoadError::CorruptContainerHeader)?;
        check_node(store, node, visited)?;
    }
    Ok(())
}

fn check_table(store: &DataStore, h: Handle, visited: &mut HashSet<u32>) -> Result<(), LoadError> {
    if !visited.insert(h.index) {
        return Ok(());
    }
    let offset = check_handle_in_range(store, h)?;
    if offset + HEADER > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    let hdr = ContainerHeader::read_at(store.arena().heap(), offset);
    if hdr.count > hdr.capacity {
        return Err(LoadError::OversizeCount);
    }
    let slots = hdr.capacity as usize + hdr.has_null_storage as usize;
    let values_start = offset + HEADER;
    let keys_start = values_start + slots;
    if keys_start + hdr.capacity as usize > store.arena().heap_len() {
        return Err(LoadError::CorruptContainerHeader);
    }
    if !check_probe_invariant(store, h).map_err(|_| LoadError::CorruptContainerHeader)? {
        return Err(LoadError::CorruptContainerHeader);
    }
    for i in 0..slots {
        let word = store.arena().heap()[values_start + i];
        let is_null_slot = hdr.has_null_storage && i == hdr.capacity as usize;
        let key_is_set = if is_null_slot { hdr.has_null } else { store.arena().heap()[keys_start + i] != 0 };
        if !key_is_set {
            continue;
        }
        let node = DataNode::decode(word).ok_or(LoadError::CorruptContainerHeader)?;
        check_node(store, node, visited)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::table as table_ops;

    #[test]
    fn freshly_built_store_is_sound() {
        let mut store = DataStore::new();
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, h, 7, DataNode::Int32Small(1)).unwrap();
        assert!(verify_integrity(&store).is_ok());
    }

    #[test]
    fn detects_oversize_array_count() {
        let mut store = DataStore::new();
        let h = store.make_array();
        let offset = store.arena().offset_of(h).unwrap();
        let mut hdr = ContainerHeader::read_at(store.arena().heap(), offset);
        hdr.count = hdr.capacity + 1;
        hdr.write_at(store.arena_mut().heap_mut(), offset);
        assert_eq!(verify_integrity(&store), Err(LoadError::OversizeCount));
    }
}
