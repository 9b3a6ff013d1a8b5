//! The hint tree: a structure parallel to the value tree that carries
//! enough source-formatting metadata (original order, comments, an identity
//! hash) for [`crate::hint::printer`] to reproduce a human-edited layout
//! across a parse/print round trip.

use xxhash_rust::xxh64::Xxh64;

use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::DataNode;

/// A byte-offset span `(start, end)` into the source buffer the hint tree was
/// parsed from. Only meaningful as long as that buffer outlives the tree.
pub type CommentSpan = (usize, usize);

/// One node of the hint tree. Mirrors the shape of the value tree it was
/// built alongside, but a hint tree built for one document is never walked
/// against a different document except through the hash-based matching in
/// [`crate::hint::printer`].
#[derive(Debug, Clone, PartialEq)]
pub enum HintNode {
    Array {
        order: u32,
        comment: Option<CommentSpan>,
        hash: u64,
        children: Vec<HintNode>,
    },
    Table {
        order: u32,
        comment: Option<CommentSpan>,
        hash: u64,
        /// Stored insertion order, the same order the value table's `iter`
        /// walks its occupied slots in at the time of parsing.
        entries: Vec<(String, HintNode)>,
    },
    Leaf {
        order: u32,
        comment: Option<CommentSpan>,
        hash: u64,
    },
    /// No hint information is available for this position — either the value
    /// tree was built without a hint parse, or the printer already gave up
    /// trying to match a hint node here.
    None,
}

impl HintNode {
    pub fn order(&self) -> u32 {
        match self {
            HintNode::Array { order, .. } | HintNode::Table { order, .. } | HintNode::Leaf { order, .. } => *order,
            HintNode::None => 0,
        }
    }

    pub fn comment(&self) -> Option<CommentSpan> {
        match self {
            HintNode::Array { comment, .. } | HintNode::Table { comment, .. } | HintNode::Leaf { comment, .. } => *comment,
            HintNode::None => None,
        }
    }

    pub fn hash(&self) -> Option<u64> {
        match self {
            HintNode::Array { hash, .. } | HintNode::Table { hash, .. } | HintNode::Leaf { hash, .. } => Some(*hash),
            HintNode::None => None,
        }
    }
}

const SEED: u64 = 0;

/// The identity hash of a scalar (non-container) value: mixes the type tag
/// and the value's bytes. Used both while building the hint tree and, at
/// print time, recomputed straight off the current value tree so the two
/// can be compared.
pub fn scalar_hash(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> u64 {
    let mut h = Xxh64::new(SEED);
    h.update(&(node.type_of() as u32).to_le_bytes());
    match node {
        DataNode::Null => h.update(&[0]),
        DataNode::SpecialErase => h.update(&[1]),
        DataNode::Boolean(b) => h.update(&[b as u8]),
        DataNode::Int32Small(v) => h.update(&v.to_le_bytes()),
        DataNode::Float31(v) => h.update(&v.to_bits().to_le_bytes()),
        DataNode::FilePath(fp) => {
            let name = symbols.resolve(fp.symbol).unwrap_or("");
            h.update(name.as_bytes());
            h.update(&[fp.directory as u8, fp.file_type as u8]);
        }
        DataNode::String(sh) => h.update(store.read_string(sh).unwrap_or("").as_bytes()),
        DataNode::Int32Big(sh) => h.update(&store.read_int32_big(sh).unwrap_or(0).to_le_bytes()),
        DataNode::UInt32(sh) => h.update(&store.read_uint32(sh).unwrap_or(0).to_le_bytes()),
        DataNode::Int64(sh) => h.update(&store.read_int64(sh).unwrap_or(0).to_le_bytes()),
        DataNode::UInt64(sh) => h.update(&store.read_uint64(sh).unwrap_or(0).to_le_bytes()),
        DataNode::Float32(sh) => h.update(&store.read_float32(sh).unwrap_or(0.0).to_bits().to_le_bytes()),
        DataNode::Array(_) | DataNode::Table(_) => unreachable!("scalar_hash called on a container"),
    }
    h.digest()
}

/// Fold an array's already-computed child hashes into its own identity hash,
/// in element order (arrays are order-sensitive: swapping two elements
/// changes the hash).
pub fn array_hash(child_hashes: &[u64]) -> u64 {
    let mut h = Xxh64::new(SEED);
    h.update(b"A");
    h.update(&(child_hashes.len() as u32).to_le_bytes());
    for child in child_hashes {
        h.update(&child.to_le_bytes());
    }
    h.digest()
}

/// Fold a table's already-computed child hashes into its own identity hash.
/// Order-independent: entries are sorted by key bytes before mixing, so
/// reordering a table's keys doesn't change its hash.
pub fn table_hash(mut keyed: Vec<(&str, u64)>) -> u64 {
    keyed.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
    let mut h = Xxh64::new(SEED);
    h.update(b"T");
    h.update(&(keyed.len() as u32).to_le_bytes());
    for (key, child) in keyed {
        h.update(key.as_bytes());
        h.update(&child.to_le_bytes());
    }
    h.digest()
}

/// The identity hash of `node` as it stands right now in `store`, computed
/// fresh (not read from any hint tree). This is what the printer compares
/// against a hint node's stored hash to decide whether they still refer to
/// the same logical element.
pub fn resolve_hash(store: &DataStore, symbols: &SymbolTable, node: DataNode) -> u64 {
    match node {
        DataNode::Array(h) => {
            let items = array::iter(store, h).unwrap_or_default();
            let hashes: Vec<u64> = items.into_iter().map(|item| resolve_hash(store, symbols, item)).collect();
            array_hash(&hashes)
        }
        DataNode::Table(h) => {
            let pairs = table::iter(store, h).unwrap_or_default();
            let keyed: Vec<(&str, u64)> = pairs
                .iter()
                .filter_map(|(symbol, value)| symbols.resolve(*symbol).map(|name| (name, resolve_hash(store, symbols, *value))))
                .collect();
            table_hash(keyed)
        }
        scalar => scalar_hash(store, symbols, scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_hash_is_order_sensitive() {
        let a = array_hash(&[1, 2]);
        let b = array_hash(&[2, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn table_hash_is_order_independent() {
        let a = table_hash(vec![("x", 1), ("y", 2)]);
        let b = table_hash(vec![("y", 2), ("x", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn resolve_hash_matches_for_equal_values_regardless_of_symbol_table() {
        let mut store = DataStore::new();
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        table::set(&mut store, h, x, DataNode::Int32Small(1)).unwrap();
        let first = resolve_hash(&store, &symbols, store.root());

        let mut other_symbols = SymbolTable::new();
        other_symbols.intern("unrelated");
        let x2 = other_symbols.intern("x");
        let mut store2 = DataStore::new();
        store2.make_table();
        let h2 = DataStore::expect_table(store2.root()).unwrap();
        table::set(&mut store2, h2, x2, DataNode::Int32Small(1)).unwrap();
        let second = resolve_hash(&store2, &other_symbols, store2.root());

        assert_eq!(first, second);
    }
}
