//! Table operations: open-addressed, linearly-probed, anti-clustering
//! insertion, with a dedicated tail slot for the empty-symbol ("null") key.

use super::config::{MIN_TABLE_CAPACITY, TABLE_LOAD_FACTOR_DEN, TABLE_LOAD_FACTOR_NUM};
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

fn values_start(offset: usize) -> usize {
    offset + HEADER
}

fn keys_start(offset: usize, capacity: u32, has_null_storage: bool) -> usize {
    values_start(offset) + capacity as usize + has_null_storage as usize
}

fn null_slot_index(capacity: u32) -> usize {
    capacity as usize
}

/// Fibonacci-style multiplicative hash, masked down to `[0, capacity)` by
/// the top `log2(capacity)` bits. `capacity` is always a power of two.
fn home_slot(symbol: u32, capacity: u32) -> u32 {
    debug_assert!(capacity.is_power_of_two() && capacity > 0);
    let log2 = capacity.trailing_zeros();
    (symbol.wrapping_mul(0x9E37_79B1)) >> (32 - log2)
}

pub fn len(store: &DataStore, h: Handle) -> Result<u32, ShapeError> {
    let (_, hdr) = header(store, h)?;
    Ok(hdr.count + hdr.has_null as u32)
}

pub fn get(store: &DataStore, h: Handle, symbol: u32) -> Result<Option<DataNode>, ShapeError> {
    let (offset, hdr) = header(store, h)?;
    if symbol == 0 {
        if hdr.has_null_storage && hdr.has_null {
            let idx = null_slot_index(hdr.capacity);
            let word = store.arena().heap()[values_start(offset) + idx];
            return Ok(Some(DataNode::decode(word).ok_or(ShapeError::NotAContainer)?));
        }
        return Ok(None);
    }
    let ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);
    let vs = values_start(offset);
    let mut idx = home_slot(symbol, hdr.capacity);
    for _ in 0..hdr.capacity {
        let key = store.arena().heap()[ks + idx as usize];
        if key == 0 {
            return Ok(None);
        }
        if key == symbol {
            let word = store.arena().heap()[vs + idx as usize];
            return Ok(Some(DataNode::decode(word).ok_or(ShapeError::NotAContainer)?));
        }
        idx = (idx + 1) % hdr.capacity;
    }
    Ok(None)
}

pub fn contains(store: &DataStore, h: Handle, symbol: u32) -> Result<bool, ShapeError> {
    Ok(get(store, h, symbol)?.is_some())
}

/// Anti-clustering insertion into an already-right-sized slots region: if
/// the home slot holds an entry whose own home is elsewhere, the incoming
/// pair displaces it and the displaced pair continues probing; otherwise
/// probing simply continues forward.
fn insert_into_slots(heap: &mut [u32], values_start: usize, keys_start: usize, capacity: u32, symbol: u32, value_word: u32) {
    let mut symbol = symbol;
    let mut value_word = value_word;
    let mut idx = home_slot(symbol, capacity);
    loop {
        let key_at = heap[keys_start + idx as usize];
        if key_at == 0 {
            heap[keys_start + idx as usize] = symbol;
            heap[values_start + idx as usize] = value_word;
            return;
        }
        let occ_home = home_slot(key_at, capacity);
        if occ_home == idx {
            idx = (idx + 1) % capacity;
        } else {
            let out_symbol = key_at;
            let out_value = heap[values_start + idx as usize];
            heap[keys_start + idx as usize] = symbol;
            heap[values_start + idx as usize] = value_word;
            symbol = out_symbol;
            value_word = out_value;
            idx = (idx + 1) % capacity;
        }
    }
}

/// Rebuild the table's backing storage at `new_capacity`/`new_has_null_storage`,
/// reinserting every existing entry. Used both for load-factor growth and
/// for first-time null-key storage.
fn rebuild(store: &mut DataStore, h: Handle, new_capacity: u32, new_has_null_storage: bool) -> Result<(), ShapeError> {
    let (offset, hdr) = header(store, h)?;
    let old_slots = hdr.capacity as usize + hdr.has_null_storage as usize;
    let old_vs = values_start(offset);
    let old_ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);

    let mut pairs = Vec::with_capacity(hdr.count as usize);
    for i in 0..hdr.capacity as usize {
        let key = store.arena().heap()[old_ks + i];
        if key != 0 {
            pairs.push((key, store.arena().heap()[old_vs + i]));
        }
    }
    let null_entry = if hdr.has_null_storage && hdr.has_null {
        Some(store.arena().heap()[old_vs + hdr.capacity as usize])
    } else {
        None
    };

    let old_n = HEADER + 2 * old_slots;
    let new_slots = new_capacity as usize + new_has_null_storage as usize;
    let new_n = HEADER + 2 * new_slots;
    store.arena_mut().reallocate(h, old_n, new_n);

    let offset = store.arena().offset_of(h).unwrap();
    let heap = store.arena_mut().heap_mut();
    let vs = values_start(offset);
    let ks = keys_start(offset, new_capacity, new_has_null_storage);
    for i in 0..new_slots {
        heap[vs + i] = DataNode::Null.encode();
        heap[ks + i] = 0;
    }
    for (symbol, value_word) in &pairs {
        insert_into_slots(heap, vs, ks, new_capacity, *symbol, *value_word);
    }
    let has_null = if let Some(word) = null_entry {
        heap[vs + new_capacity as usize] = word;
        true
    } else {
        false
    };
    ContainerHeader {
        capacity: new_capacity,
        has_null_storage: new_has_null_storage,
        count: pairs.len() as u32,
        has_null,
    }
    .write_at(heap, offset);
    Ok(())
}

fn needs_growth(hdr: &ContainerHeader) -> bool {
    (hdr.count + 1) * TABLE_LOAD_FACTOR_DEN >= hdr.capacity * TABLE_LOAD_FACTOR_NUM
}

/// Smallest power-of-two capacity that holds `count` entries without being
/// at or over the load-factor threshold. Used by the garbage collector's
/// "compact containers" pass to right-size a table from scratch.
pub(crate) fn compacted_capacity(count: u32) -> u32 {
    let mut capacity = MIN_TABLE_CAPACITY;
    while count * TABLE_LOAD_FACTOR_DEN >= capacity * TABLE_LOAD_FACTOR_NUM {
        capacity *= 2;
    }
    capacity
}

/// Build a fresh, minimally-sized table payload (header plus values/keys
/// words) from a flat list of `(symbol, encoded_value)` pairs, used by
/// [`crate::store::gc`]'s container-compaction pass.
pub(crate) fn build_compacted(pairs: &[(u32, u32)], null_value: Option<u32>) -> (ContainerHeader, Vec<u32>) {
    let capacity = compacted_capacity(pairs.len() as u32);
    let has_null_storage = null_value.is_some();
    let slots = capacity as usize + has_null_storage as usize;
    let mut buf = vec![DataNode::Null.encode(); 2 * slots];
    // Insert in ascending home-slot order (ties broken by symbol) rather
    // than in the order the caller happened to enumerate them: this makes
    // repeated compaction idempotent, since the anti-clustering rule's
    // outcome otherwise depends on insertion order.
    let mut sorted: Vec<(u32, u32)> = pairs.to_vec();
    sorted.sort_by_key(|(symbol, _)| (home_slot(*symbol, capacity), *symbol));
    for (symbol, value_word) in &sorted {
        insert_into_slots(&mut buf, 0, slots, capacity, *symbol, *value_word);
    }
    if let Some(v) = null_value {
        buf[capacity as usize] = v;
    }
    let header = ContainerHeader {
        capacity,
        has_null_storage,
        count: pairs.len() as u32,
        has_null: null_value.is_some(),
    };
    (header, buf)
}

/// Insert or overwrite `symbol`'s value. Symbol `0` is the empty-symbol
/// ("null") key and is stored in its dedicated tail slot.
pub fn set(store: &mut DataStore, h: Handle, symbol: u32, value: DataNode) -> Result<(), ShapeError> {
    store.with_gc_suppressed(|store| {
        if symbol == 0 {
            let (_, hdr) = header(store, h)?;
            if !hdr.has_null_storage {
                rebuild(store, h, hdr.capacity.max(MIN_TABLE_CAPACITY), true)?;
            }
            let (offset, hdr) = header(store, h)?;
            let idx = null_slot_index(hdr.capacity);
            store.arena_mut().heap_mut()[values_start(offset) + idx] = value.encode();
            ContainerHeader { has_null: true, ..hdr }.write_at(store.arena_mut().heap_mut(), offset);
            return Ok(());
        }

        if contains(store, h, symbol)? {
            let (offset, hdr) = header(store, h)?;
            let ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);
            let vs = values_start(offset);
            let mut idx = home_slot(symbol, hdr.capacity);
            loop {
                let key = store.arena().heap()[ks + idx as usize];
                if key == symbol {
                    store.arena_mut().heap_mut()[vs + idx as usize] = value.encode();
                    return Ok(());
                }
                idx = (idx + 1) % hdr.capacity;
            }
        }

        let (_, hdr) = header(store, h)?;
        if needs_growth(&hdr) {
            let new_capacity = (hdr.capacity + 2).next_power_of_two();
            rebuild(store, h, new_capacity, hdr.has_null_storage)?;
        }
        let (offset, hdr) = header(store, h)?;
        let ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);
        let vs = values_start(offset);
        let heap = store.arena_mut().heap_mut();
        insert_into_slots(heap, vs, ks, hdr.capacity, symbol, value.encode());
        ContainerHeader {
            count: hdr.count + 1,
            ..hdr
        }
        .write_at(heap, offset);
        Ok(())
    })?;
    store.maybe_collect();
    Ok(())
}

/// Erase `symbol`. Nulls its slot, then walks forward reinserting each
/// displaced neighbour until an already-empty slot is hit, preserving the
/// probe-chain invariant.
pub fn erase(store: &mut DataStore, h: Handle, symbol: u32) -> Result<(), ShapeError> {
    let (offset, hdr) = header(store, h)?;
    if symbol == 0 {
        if hdr.has_null_storage && hdr.has_null {
            let idx = null_slot_index(hdr.capacity);
            store.arena_mut().heap_mut()[values_start(offset) + idx] = DataNode::Null.encode();
            ContainerHeader { has_null: false, ..hdr }.write_at(store.arena_mut().heap_mut(), offset);
            return Ok(());
        }
        return Err(ShapeError::KeyNotFound);
    }

    let ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);
    let vs = values_start(offset);
    let mut idx = home_slot(symbol, hdr.capacity);
    let mut found = None;
    for _ in 0..hdr.capacity {
        let key = store.arena().heap()[ks + idx as usize];
        if key == 0 {
            break;
        }
        if key == symbol {
            found = Some(idx);
            break;
        }
        idx = (idx + 1) % hdr.capacity;
    }
    let Some(erased_idx) = found else {
        return Err(ShapeError::KeyNotFound);
    };

    let heap = store.arena_mut().heap_mut();
    heap[ks + erased_idx as usize] = 0;
    heap[vs + erased_idx as usize] = DataNode::Null.encode();

    let mut j = (erased_idx + 1) % hdr.capacity;
    loop {
        let key = heap[ks + j as usize];
        if key == 0 {
            break;
        }
        let value_word = heap[vs + j as usize];
        heap[ks + j as usize] = 0;
        heap[vs + j as usize] = DataNode::Null.encode();
        insert_into_slots(heap, vs, ks, hdr.capacity, key, value_word);
        j = (j + 1) % hdr.capacity;
    }

    ContainerHeader {
        count: hdr.count - 1,
        ..hdr
    }
    .write_at(store.arena_mut().heap_mut(), offset);
    Ok(())
}

/// All `(symbol, value)` pairs in storage order: main slots 0..capacity in
/// array order, then the null-key slot last if occupied.
pub fn iter(store: &DataStore, h: Handle) -> Result<Vec<(u32, DataNode)>, ShapeError> {
    let (offset, hdr) = header(store, h)?;
    let ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);
    let vs = values_start(offset);
    let mut out = Vec::with_capacity(hdr.count as usize + hdr.has_null as usize);
    for i in 0..hdr.capacity {
        let key = store.arena().heap()[ks + i as usize];
        if key != 0 {
            let word = store.arena().heap()[vs + i as usize];
            out.push((key, DataNode::decode(word).ok_or(ShapeError::NotAContainer)?));
        }
    }
    if hdr.has_null_storage && hdr.has_null {
        let word = store.arena().heap()[vs + hdr.capacity as usize];
        out.push((0, DataNode::decode(word).ok_or(ShapeError::NotAContainer)?));
    }
    Ok(out)
}

/// Verify the probe-chain invariant: every live entry at position `i` is
/// reachable by starting at its home slot and probing forward without
/// crossing an empty slot. Used by tests and by
/// [`crate::binary::integrity::verify_integrity`].
pub fn check_probe_invariant(store: &DataStore, h: Handle) -> Result<bool, ShapeError> {
    let (offset, hdr) = header(store, h)?;
    let ks = keys_start(offset, hdr.capacity, hdr.has_null_storage);
    for i in 0..hdr.capacity {
        let key = store.arena().heap()[ks + i as usize];
        if key == 0 {
            continue;
        }
        let mut idx = home_slot(key, hdr.capacity);
        let mut reached = false;
        for _ in 0..hdr.capacity {
            if idx == i {
                reached = true;
                break;
            }
            if store.arena().heap()[ks + idx as usize] == 0 {
                break;
            }
            idx = (idx + 1) % hdr.capacity;
        }
        if !reached {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataStore;

    #[test]
    fn insert_get_erase() {
        let mut store = DataStore::new();
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        set(&mut store, h, 5, DataNode::Int32Small(1)).unwrap();
        set(&mut store, h, 9, DataNode::Int32Small(2)).unwrap();
        assert_eq!(get(&store, h, 5).unwrap(), Some(DataNode::Int32Small(1)));
        assert_eq!(get(&store, h, 9).unwrap(), Some(DataNode::Int32Small(2)));
        erase(&mut store, h, 5).unwrap();
        assert_eq!(get(&store, h, 5).unwrap(), None);
        assert!(check_probe_invariant(&store, h).unwrap());
    }

    #[test]
    fn null_key_roundtrip() {
        let mut store = DataStore::new();
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        set(&mut store, h, 0, DataNode::Boolean(true)).unwrap();
        set(&mut store, h, 3, DataNode::Int32Small(1)).unwrap();
        assert_eq!(get(&store, h, 0).unwrap(), Some(DataNode::Boolean(true)));
        erase(&mut store, h, 0).unwrap();
        assert_eq!(get(&store, h, 0).unwrap(), None);
        assert_eq!(get(&store, h, 3).unwrap(), Some(DataNode::Int32Small(1)));
    }

    #[test]
    fn grows_under_load_and_keeps_probe_invariant() {
        let mut store = DataStore::new();
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        for sym in 1..200u32 {
            set(&mut store, h, sym, DataNode::Int32Small(sym as i32)).unwrap();
        }
        assert!(check_probe_invariant(&store, h).unwrap());
        for sym in 1..200u32 {
            assert_eq!(get(&store, h, sym).unwrap(), Some(DataNode::Int32Small(sym as i32)));
        }
    }

    #[test]
    fn erase_preserves_invariant_under_clustering() {
        let mut store = DataStore::new();
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        // Force clustering by inserting many keys, then erase interleaved ones.
        for sym in 1..64u32 {
            set(&mut store, h, sym, DataNode::Int32Small(sym as i32)).unwrap();
        }
        for sym in (1..64u32).step_by(2) {
            erase(&mut store, h, sym).unwrap();
        }
        assert!(check_probe_invariant(&store, h).unwrap());
        for sym in (2..64u32).step_by(2) {
            assert_eq!(get(&store, h, sym).unwrap(), Some(DataNode::Int32Small(sym as i32)));
        }
    }
}
