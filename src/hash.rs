//! Canonical MD5-based hash and deep equality.
//!
//! The hash is a depth-first, order-independent fingerprint: table keys are
//! sorted by the underlying symbol string before mixing, so two tables that
//! differ only in insertion order hash identically.

use md5::{Digest, Md5};

use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::{canonicalize_float, DataNode};

/// Mix `node` and everything it reaches into `hasher`, in canonical order.
fn mix(store: &DataStore, symbols: &SymbolTable, node: DataNode, hasher: &mut Md5) {
    hasher.update((node.type_of() as u32).to_le_bytes());
    match node {
        DataNode::Null | DataNode::SpecialErase => hasher.update(0u32.to_le_bytes()),
        DataNode::Boolean(b) => hasher.update((b as u32).to_le_bytes()),
        DataNode::Int32Small(v) => hasher.update(v.to_le_bytes()),
        DataNode::Float31(v) => hasher.update(canonicalize_float(v).to_bits().to_le_bytes()),
        DataNode::FilePath(fp) => {
            let name = symbols.resolve(fp.symbol).unwrap_or("");
            let url = format!("{}://{}.{}", fp.directory.scheme(), name, fp.file_type.extension());
            hasher.update(url.to_ascii_lowercase().as_bytes());
        }
        DataNode::String(h) => {
            if let Ok(s) = store.read_string(h) {
                hasher.update(s.as_bytes());
            }
        }
        DataNode::Int32Big(h) => {
            if let Ok(v) = store.read_int32_big(h) {
                hasher.update(v.to_le_bytes());
            }
        }
        DataNode::UInt32(h) => {
            if let Ok(v) = store.read_uint32(h) {
                hasher.update(v.to_le_bytes());
            }
        }
        DataNode::Int64(h) => {
            if let Ok(v) = store.read_int64(h) {
                hasher.update(v.to_le_bytes());
            }
        }
        DataNode::UInt64(h) => {
            if let Ok(v) = store.read_uint64(h) {
                hasher.update(v.to_le_bytes());
            }
        }
        DataNode::Float32(h) => {
            if let Ok(v) = store.read_float32(h) {
                let v = if v == 0.0 { 0.0 } else { v };
                hasher.update(v.to_bits().to_le_bytes());
            }
        }
        DataNode::Array(h) => {
            let items = array::iter(store, h).unwrap_or_default();
            hasher.update((items.len() as u32).to_le_bytes());
            for child in items {
                mix(store, symbols, child, hasher);
            }
        }
        DataNode::Table(h) => {
            let mut pairs = table::iter(store, h).unwrap_or_default();
            pairs.sort_by(|(a, _), (b, _)| {
                let a = symbols.resolve(*a).unwrap_or("");
                let b = symbols.resolve(*b).unwrap_or("");
                a.as_bytes().cmp(b.as_bytes())
            });
            hasher.update((pairs.len() as u32).to_le_bytes());
            for (symbol, value) in pairs {
                let key = symbols.resolve(symbol).unwrap_or("");
                hasher.update(key.as_bytes());
                mix(store, symbols, value, hasher);
            }
        }
    }
}

/// The canonical MD5 digest of `node`: `deep_equals(a, b) ⇒
/// canonical_hash(a) = canonical_hash(b)`.
pub fn canonical_hash(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> [u8; 16] {
    let mut hasher = Md5::new();
    mix(store, symbols, node, &mut hasher);
    hasher.finalize().into()
}

/// Structural equality. When `nan_equals_nan` is set, two `Float31`/`Float32`
/// NaNs compare equal to each other regardless of bit pattern.
pub fn deep_equals(store: &DataStore, symbols: &SymbolTable, a: DataNode, b: DataNode, nan_equals_nan: bool) -> bool {
    if a.type_of() != b.type_of() {
        return false;
    }
    match (a, b) {
        (DataNode::Null, DataNode::Null) | (DataNode::SpecialErase, DataNode::SpecialErase) => true,
        (DataNode::Boolean(x), DataNode::Boolean(y)) => x == y,
        (DataNode::Int32Small(x), DataNode::Int32Small(y)) => x == y,
        (DataNode::FilePath(x), DataNode::FilePath(y)) => x == y,
        (DataNode::Float31(x), DataNode::Float31(y)) => float_eq(x, y, nan_equals_nan),
        (DataNode::Float32(hx), DataNode::Float32(hy)) => {
            match (store.read_float32(hx), store.read_float32(hy)) {
                (Ok(x), Ok(y)) => float_eq(x, y, nan_equals_nan),
                _ => false,
            }
        }
        (DataNode::String(hx), DataNode::String(hy)) => match (store.read_string(hx), store.read_string(hy)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        },
        (DataNode::Int32Big(hx), DataNode::Int32Big(hy)) => store.read_int32_big(hx).ok() == store.read_int32_big(hy).ok(),
        (DataNode::UInt32(hx), DataNode::UInt32(hy)) => store.read_uint32(hx).ok() == store.read_uint32(hy).ok(),
        (DataNode::Int64(hx), DataNode::Int64(hy)) => store.read_int64(hx).ok() == store.read_int64(hy).ok(),
        (DataNode::UInt64(hx), DataNode::UInt64(hy)) => store.read_uint64(hx).ok() == store.read_uint64(hy).ok(),
        (DataNode::Array(hx), DataNode::Array(hy)) => {
            let xs = array::iter(store, hx).unwrap_or_default();
            let ys = array::iter(store, hy).unwrap_or_default();
            xs.len() == ys.len()
                && xs
                    .into_iter()
                    .zip(ys)
                    .all(|(x, y)| deep_equals(store, symbols, x, y, nan_equals_nan))
        }
        (DataNode::Table(hx), DataNode::Table(hy)) => {
            let xs = table::iter(store, hx).unwrap_or_default();
            let ys = table::iter(store, hy).unwrap_or_default();
            if xs.len() != ys.len() {
                return false;
            }
            xs.into_iter().all(|(symbol, xv)| match table::get(store, hy, symbol) {
                Ok(Some(yv)) => deep_equals(store, symbols, xv, yv, nan_equals_nan),
                _ => false,
            })
        }
        _ => false,
    }
}

/// Plain IEEE-754 comparison (so `-0.0 == 0.0`, and by default `NaN != NaN`
/// even against itself), except that with `nan_equals_nan` set, any two NaNs
/// compare equal regardless of bit pattern.
fn float_eq(x: f32, y: f32, nan_equals_nan: bool) -> bool {
    if x.is_nan() || y.is_nan() {
        return nan_equals_nan && x.is_nan() && y.is_nan();
    }
    x == y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::table as table_ops;

    #[test]
    fn hash_is_order_independent_for_tables() {
        let mut store = DataStore::new();
        let mut symbols = SymbolTable::new();
        let a_sym = symbols.intern("a");
        let b_sym = symbols.intern("b");

        store.make_table();
        let h1 = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, h1, a_sym, DataNode::Int32Small(1)).unwrap();
        table_ops::set(&mut store, h1, b_sym, DataNode::Int32Small(2)).unwrap();
        let hash1 = canonical_hash(&store, &symbols, store.root());

        store.make_table();
        let h2 = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, h2, b_sym, DataNode::Int32Small(2)).unwrap();
        table_ops::set(&mut store, h2, a_sym, DataNode::Int32Small(1)).unwrap();
        let hash2 = canonical_hash(&store, &symbols, store.root());

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn hash_distinguishes_swapped_values() {
        let mut store = DataStore::new();
        let mut symbols = SymbolTable::new();
        let a_sym = symbols.intern("a");
        let b_sym = symbols.intern("b");

        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, h, a_sym, DataNode::Int32Small(1)).unwrap();
        table_ops::set(&mut store, h, b_sym, DataNode::Int32Small(2)).unwrap();
        let hash_ab = canonical_hash(&store, &symbols, store.root());

        store.make_table();
        let h2 = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, h2, a_sym, DataNode::Int32Small(2)).unwrap();
        table_ops::set(&mut store, h2, b_sym, DataNode::Int32Small(1)).unwrap();
        let hash_ba = canonical_hash(&store, &symbols, store.root());

        assert_ne!(hash_ab, hash_ba);
    }

    #[test]
    fn deep_equals_respects_nan_mode() {
        let mut store = DataStore::new();
        let symbols = SymbolTable::new();
        // Float32 stores bits exactly, so two distinct NaN payloads survive
        // as genuinely different bit patterns (unlike Float31, which
        // canonicalises every NaN at encode time).
        let ha = store.alloc_float32(f32::from_bits(0x7FC0_0001));
        let hb = store.alloc_float32(f32::from_bits(0x7FC0_0003));
        let a = DataNode::Float32(ha);
        let b = DataNode::Float32(hb);
        assert!(!deep_equals(&store, &symbols, a, b, false));
        assert!(deep_equals(&store, &symbols, a, b, true));
    }

    #[test]
    fn deep_equals_array_and_table() {
        let mut store = DataStore::new();
        let mut symbols = SymbolTable::new();
        let sym = symbols.intern("x");
        store.make_array();
        let arr = DataStore::expect_array(store.root()).unwrap();
        array::push(&mut store, arr, DataNode::Int32Small(1)).unwrap();
        let a = DataNode::Array(arr);

        store.make_table();
        let t = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, t, sym, DataNode::Int32Small(1)).unwrap();
        let b = DataNode::Table(t);

        assert!(!deep_equals(&store, &symbols, a, b, false));
        assert!(deep_equals(&store, &symbols, a, a, false));
    }
}
