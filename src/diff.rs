//! Diff/patch: structural tree diffing and patch application.
//!
//! `diff(a, b)` produces a patch such that applying it to a store holding
//! `a` yields something deep-equal to `b`. Patches are ordinary `DataStore`
//! trees, with [`DataNode::SpecialErase`] marking a removed table key.
//!
//! Every entry point here wraps its whole body in GC suppression: diff/clone
//! construction builds subtrees that aren't reachable from the store root
//! until the very end, and a collection partway through would reclaim them.

use crate::store::config::MIN_TABLE_CAPACITY;
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::{DataNode, Handle};

/// Build a patch such that `apply_diff(target, diff(a, b))` is deep-equal
/// to `b`. Both `a` and `b`, and the patch itself, live in `store`.
pub fn diff(store: &mut DataStore, symbols: &SymbolTable, a: DataNode, b: DataNode) -> DataNode {
    store.with_gc_suppressed(|store| diff_inner(store, symbols, a, b))
}

fn diff_inner(store: &mut DataStore, symbols: &SymbolTable, a: DataNode, b: DataNode) -> DataNode {
    if matches!(a, DataNode::Null) {
        return clone_inner(store, b);
    }
    let b = if matches!(b, DataNode::Null) && a.is_container() {
        match a {
            DataNode::Array(_) => DataNode::Array(store.alloc_array_container(0)),
            DataNode::Table(_) => DataNode::Table(store.alloc_table_container(MIN_TABLE_CAPACITY)),
            _ => b,
        }
    } else {
        b
    };

    match (a, b) {
        (DataNode::Table(ha), DataNode::Table(hb)) => diff_tables(store, symbols, ha, hb),
        _ => clone_inner(store, b),
    }
}

fn diff_tables(store: &mut DataStore, symbols: &SymbolTable, ha: Handle, hb: Handle) -> DataNode {
    let out = store.alloc_table_container(MIN_TABLE_CAPACITY);
    let a_pairs = table::iter(store, ha).unwrap_or_default();
    let b_pairs = table::iter(store, hb).unwrap_or_default();

    for (symbol, _) in &a_pairs {
        if table::get(store, hb, *symbol).unwrap_or(None).is_none() {
            table::set(store, out, *symbol, DataNode::SpecialErase).unwrap();
        }
    }

    for (symbol, b_value) in &b_pairs {
        let patch = match table::get(store, ha, *symbol).unwrap_or(None) {
            None => clone_inner(store, *b_value),
            Some(a_value) if crate::hash::deep_equals(store, symbols, a_value, *b_value, false) => continue,
            Some(a_value @ DataNode::Table(_)) if matches!(b_value, DataNode::Table(_)) => diff_inner(store, symbols, a_value, *b_value),
            _ => clone_inner(store, *b_value),
        };
        table::set(store, out, *symbol, patch).unwrap();
    }
    DataNode::Table(out)
}

/// Apply `patch` onto `target` in place, within `store`. `SpecialErase`
/// removes the key (absent-already counts as success); nested tables merge
/// recursively; everything else (including arrays) replaces wholesale.
pub fn apply_diff(store: &mut DataStore, target: DataNode, patch: DataNode) -> DataNode {
    store.with_gc_suppressed(|store| apply_diff_inner(store, target, patch))
}

fn apply_diff_inner(store: &mut DataStore, target: DataNode, patch: DataNode) -> DataNode {
    match (target, patch) {
        (DataNode::Table(ht), DataNode::Table(hp)) => {
            let pairs = table::iter(store, hp).unwrap_or_default();
            for (symbol, patch_value) in pairs {
                match patch_value {
                    DataNode::SpecialErase => {
                        let _ = table::erase(store, ht, symbol);
                    }
                    DataNode::Table(_) => {
                        let merged = match table::get(store, ht, symbol).unwrap_or(None) {
                            Some(existing @ DataNode::Table(_)) => apply_diff_inner(store, existing, patch_value),
                            _ => clone_inner(store, patch_value),
                        };
                        table::set(store, ht, symbol, merged).unwrap();
                    }
                    _ => {
                        let cloned = clone_inner(store, patch_value);
                        table::set(store, ht, symbol, cloned).unwrap();
                    }
                }
            }
            DataNode::Table(ht)
        }
        _ => clone_inner(store, patch),
    }
}

/// Deep-copy `node` (and everything it reaches) into fresh arena storage.
pub fn clone_into(store: &mut DataStore, node: DataNode) -> DataNode {
    store.with_gc_suppressed(|store| clone_inner(store, node))
}

fn clone_inner(store: &mut DataStore, node: DataNode) -> DataNode {
    match node {
        DataNode::Array(h) => {
            let items = array::iter(store, h).unwrap_or_default();
            let new_h = store.alloc_array_container(items.len() as u32);
            for item in items {
                let cloned = clone_inner(store, item);
                array::push(store, new_h, cloned).unwrap();
            }
            DataNode::Array(new_h)
        }
        DataNode::Table(h) => {
            let pairs = table::iter(store, h).unwrap_or_default();
            let new_h = store.alloc_table_container(MIN_TABLE_CAPACITY);
            for (symbol, value) in pairs {
                let cloned = clone_inner(store, value);
                table::set(store, new_h, symbol, cloned).unwrap();
            }
            DataNode::Table(new_h)
        }
        DataNode::String(h) => {
            let s = store.read_string(h).unwrap_or("").to_string();
            DataNode::String(store.alloc_string(&s))
        }
        DataNode::Int32Big(h) => DataNode::Int32Big(store.alloc_int32_big(store.read_int32_big(h).unwrap_or(0))),
        DataNode::UInt32(h) => DataNode::UInt32(store.alloc_uint32(store.read_uint32(h).unwrap_or(0))),
        DataNode::Int64(h) => DataNode::Int64(store.alloc_int64(store.read_int64(h).unwrap_or(0))),
        DataNode::UInt64(h) => DataNode::UInt64(store.alloc_uint64(store.read_uint64(h).unwrap_or(0))),
        DataNode::Float32(h) => DataNode::Float32(store.alloc_float32(store.read_float32(h).unwrap_or(0.0))),
        scalar => scalar,
    }
}
