//! Garbage collection: mark from the root, then compact the heap so
//! unreachable words are reclaimed. Handle *indices*
//! are never renumbered — every live [`Handle`] embedded in the surviving
//! tree stays valid — only the handle table's offsets and the heap's
//! contents move.

use std::collections::HashMap;

use super::table;
use super::DataStore;
use crate::arena::{ContainerHeader, FREE_OFFSET};
use crate::value::{DataNode, Handle};

const HEADER: usize = crate::arena::container::HEADER_WORDS;

#[derive(Clone, Copy)]
enum Kind {
    Array,
    Table,
    String,
    /// A headerless by-reference scalar (`Int32Big`/`UInt32`/`Float32`):
    /// one raw word, no children.
    Scalar1,
    /// A headerless by-reference scalar (`Int64`/`UInt64`): two raw words.
    Scalar2,
}

struct Reachable {
    old_offset: usize,
    header: ContainerHeader,
    kind: Kind,
}

/// Mark every container/string/scalar transitively reachable from `node`,
/// in preorder, deduplicating shared handles and tolerating cycles.
fn mark(store: &DataStore, node: DataNode, visited: &mut HashMap<u32, Reachable>, order: &mut Vec<u32>) {
    let (h, kind) = match node {
        DataNode::Array(h) => (h, Kind::Array),
        DataNode::Table(h) => (h, Kind::Table),
        DataNode::String(h) => (h, Kind::String),
        DataNode::Int32Big(h) | DataNode::UInt32(h) | DataNode::Float32(h) => (h, Kind::Scalar1),
        DataNode::Int64(h) | DataNode::UInt64(h) => (h, Kind::Scalar2),
        _ => return,
    };
    if visited.contains_key(&h.index) {
        return;
    }
    if !store.arena().is_valid(h) {
        return;
    }
    let offset = store.arena().offset_of(h).unwrap();
    // Scalars carry no container header; reuse the struct with a zeroed one.
    let header = match kind {
        Kind::Array | Kind::Table | Kind::String => ContainerHeader::read_at(store.arena().heap(), offset),
        Kind::Scalar1 | Kind::Scalar2 => ContainerHeader {
            capacity: 0,
            has_null_storage: false,
            count: 0,
            has_null: false,
        },
    };
    visited.insert(h.index, Reachable { old_offset: offset, header, kind });
    order.push(h.index);

    match kind {
        Kind::Array => {
            for i in 0..header.count as usize {
                let word = store.arena().heap()[offset + HEADER + i];
                if let Some(child) = DataNode::decode(word) {
                    mark(store, child, visited, order);
                }
            }
        }
        Kind::Table => {
            let slots = header.capacity as usize + header.has_null_storage as usize;
            for i in 0..slots {
                let word = store.arena().heap()[offset + HEADER + i];
                if let Some(child) = DataNode::decode(word) {
                    mark(store, child, visited, order);
                }
            }
        }
        Kind::String | Kind::Scalar1 | Kind::Scalar2 => {}
    }
}

fn old_word_count(header: &ContainerHeader, kind: &Kind) -> usize {
    match kind {
        Kind::Array => HEADER + header.capacity as usize,
        Kind::Table => HEADER + 2 * (header.capacity as usize + header.has_null_storage as usize),
        Kind::String => HEADER + header.capacity as usize,
        Kind::Scalar1 => 1,
        Kind::Scalar2 => 2,
    }
}

fn copy_verbatim(store: &DataStore, r: &Reachable, new_heap: &mut Vec<u32>) {
    let n = old_word_count(&r.header, &r.kind);
    new_heap.extend_from_slice(&store.arena().heap()[r.old_offset..r.old_offset + n]);
}

fn copy_compacted(store: &DataStore, r: &Reachable, new_heap: &mut Vec<u32>) {
    match r.kind {
        Kind::String | Kind::Scalar1 | Kind::Scalar2 => copy_verbatim(store, r, new_heap),
        Kind::Array => {
            let header = ContainerHeader {
                capacity: r.header.count,
                has_null_storage: false,
                count: r.header.count,
                has_null: false,
            };
            new_heap.push(0);
            new_heap.push(0);
            let start = new_heap.len() - 2;
            header.write_at(new_heap, start);
            for i in 0..r.header.count as usize {
                new_heap.push(store.arena().heap()[r.old_offset + HEADER + i]);
            }
        }
        Kind::Table => {
            let values_start = r.old_offset + HEADER;
            let slots = r.header.capacity as usize + r.header.has_null_storage as usize;
            let keys_start = values_start + slots;
            let mut pairs = Vec::with_capacity(r.header.count as usize);
            for i in 0..r.header.capacity as usize {
                let k = store.arena().heap()[keys_start + i];
                if k != 0 {
                    pairs.push((k, store.arena().heap()[values_start + i]));
                }
            }
            let null_value = if r.header.has_null_storage && r.header.has_null {
                Some(store.arena().heap()[values_start + r.header.capacity as usize])
            } else {
                None
            };
            let (header, buf) = table::build_compacted(&pairs, null_value);
            new_heap.push(0);
            new_heap.push(0);
            let start = new_heap.len() - 2;
            header.write_at(new_heap, start);
            new_heap.extend_from_slice(&buf);
        }
    }
}

/// Mark-and-compact: rebuild the heap from only what `store.root()`
/// transitively reaches, reclaiming everything else. When
/// `compact_containers` is set, every surviving array/table is additionally
/// right-sized to its live element count (arrays shrink to `count` words,
/// tables are rehashed into the smallest capacity that satisfies the
/// load-factor invariant).
pub(crate) fn collect_and_compact(store: &mut DataStore, compact_containers: bool) {
    let root = store.root();
    let mut visited: HashMap<u32, Reachable> = HashMap::new();
    let mut order: Vec<u32> = Vec::new();
    mark(store, root, &mut visited, &mut order);

    let mut new_heap: Vec<u32> = Vec::new();
    let mut new_offsets: HashMap<u32, usize> = HashMap::new();
    for idx in &order {
        let r = &visited[idx];
        new_offsets.insert(*idx, new_heap.len());
        if compact_containers {
            copy_compacted(store, r, &mut new_heap);
        } else {
            copy_verbatim(store, r, &mut new_heap);
        }
    }

    let old_table = store.arena().raw_table();
    let mut new_table = Vec::with_capacity(old_table.len());
    for (i, (_, generation, is_free)) in old_table.into_iter().enumerate() {
        let idx = i as u32;
        if is_free {
            new_table.push((FREE_OFFSET, generation));
        } else if let Some(&new_offset) = new_offsets.get(&idx) {
            // Reachable: keep the same generation so every live Handle
            // embedded in the surviving tree stays valid.
            new_table.push((new_offset as u32, generation));
        } else {
            // Was allocated but unreached: now garbage. Free it and bump
            // the generation so any stray copy of its old Handle is
            // rejected by Arena::is_valid, mirroring Arena::free.
            let next_gen = (generation + 1) % (1 << crate::value::handle::GENERATION_BITS);
            new_table.push((FREE_OFFSET, next_gen));
        }
    }

    let allocated_handles = order.len() as u32;
    store.arena_mut().rebuild(new_table, new_heap, allocated_handles);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::array;
    use crate::store::table as table_ops;

    #[test]
    fn collect_reclaims_detached_subtree() {
        let mut store = DataStore::new();
        store.make_array();
        let h = DataStore::expect_array(store.root()).unwrap();
        array::push(&mut store, h, DataNode::Int32Small(1)).unwrap();
        array::push(&mut store, h, DataNode::Int32Small(2)).unwrap();

        // Detach an element by truncating, then force a collection.
        array::resize(&mut store, h, 1).unwrap();
        let words_before = store.arena().heap_len();
        store.collect_garbage();
        assert!(store.arena().heap_len() <= words_before);
        assert_eq!(array::len(&store, h).unwrap(), 1);
        assert_eq!(array::get(&store, h, 0).unwrap(), DataNode::Int32Small(1));
    }

    #[test]
    fn compact_containers_shrinks_array_capacity_to_len() {
        let mut store = DataStore::new();
        store.make_array();
        let h = DataStore::expect_array(store.root()).unwrap();
        for i in 0..10 {
            array::push(&mut store, h, DataNode::Int32Small(i)).unwrap();
        }
        array::resize(&mut store, h, 2).unwrap();
        store.collect_garbage_and_compact_containers();
        assert_eq!(array::len(&store, h).unwrap(), 2);
        assert_eq!(array::get(&store, h, 0).unwrap(), DataNode::Int32Small(0));
        assert_eq!(array::get(&store, h, 1).unwrap(), DataNode::Int32Small(1));
    }

    #[test]
    fn compact_containers_preserves_table_entries() {
        let mut store = DataStore::new();
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        for sym in 1..20u32 {
            table_ops::set(&mut store, h, sym, DataNode::Int32Small(sym as i32)).unwrap();
        }
        table_ops::set(&mut store, h, 0, DataNode::Boolean(true)).unwrap();
        store.collect_garbage_and_compact_containers();
        for sym in 1..20u32 {
            assert_eq!(table_ops::get(&store, h, sym).unwrap(), Some(DataNode::Int32Small(sym as i32)));
        }
        assert_eq!(table_ops::get(&store, h, 0).unwrap(), Some(DataNode::Boolean(true)));
        assert!(table_ops::check_probe_invariant(&store, h).unwrap());
    }

    #[test]
    fn nested_containers_survive_collection() {
        let mut store = DataStore::new();
        store.make_array();
        let outer = DataStore::expect_array(store.root()).unwrap();
        let guard_value = {
            let mut guard = store.suppress_gc();
            let inner = guard.store().alloc_array_container(0);
            array::push(guard.store(), inner, DataNode::Int32Small(42)).unwrap();
            DataNode::Array(inner)
        };
        array::push(&mut store, outer, guard_value).unwrap();
        store.collect_garbage();
        let DataNode::Array(inner) = array::get(&store, outer, 0).unwrap() else {
            panic!("expected nested array to survive");
        };
        assert_eq!(array::get(&store, inner, 0).unwrap(), DataNode::Int32Small(42));
    }
}
