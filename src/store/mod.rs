//! Lifecycle and mutation API: [`DataStore`], the single-owner,
//! single-threaded value store.

pub mod array;
pub mod config;
pub mod gc;
pub mod table;

use crate::arena::{Arena, ContainerHeader};
use crate::error::ShapeError;
use crate::value::{DataNode, Handle, Type};

/// The hierarchical value store: one [`Arena`] plus a root [`DataNode`].
///
/// Single-owner, single-threaded — every method here takes `&mut self`;
/// concurrent access is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct DataStore {
    arena: Arena,
    root: DataNode,
    gc_suppress: u32,
    last_gc_heap_words: usize,
}

impl DataStore {
    pub fn new() -> DataStore {
        DataStore {
            arena: Arena::new(),
            root: DataNode::Null,
            gc_suppress: 0,
            last_gc_heap_words: 0,
        }
    }

    /// Build a store directly from an already-populated arena and root,
    /// used by binary load once it has rebuilt the handle table and heap.
    /// The GC threshold starts fresh at the loaded heap's size.
    pub(crate) fn from_loaded(arena: Arena, root: DataNode) -> DataStore {
        let last_gc_heap_words = arena.heap_len();
        DataStore {
            arena,
            root,
            gc_suppress: 0,
            last_gc_heap_words,
        }
    }

    pub fn root(&self) -> DataNode {
        self.root
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Replace the root with a fresh empty array, invalidating every prior
    /// handle's meaning as "reachable".
    pub fn make_array(&mut self) -> Handle {
        let h = self.alloc_array_container(0);
        self.root = DataNode::Array(h);
        h
    }

    /// Replace the root with a fresh empty table.
    pub fn make_table(&mut self) -> Handle {
        let h = self.alloc_table_container(config::MIN_TABLE_CAPACITY);
        self.root = DataNode::Table(h);
        h
    }

    /// Set the root directly to an already-constructed value (used by
    /// loaders and the command evaluator's `$include` wholesale-clone path).
    pub fn set_root(&mut self, node: DataNode) {
        self.root = node;
    }

    // ── String containers ──────────────────────────────────────────────

    pub fn alloc_string(&mut self, s: &str) -> Handle {
        let n_words = words_for_string_bytes(s.len());
        let h = self.arena.allocate(ContainerHeaderWords::HEADER + n_words);
        let offset = self.arena.offset_of(h).unwrap();
        ContainerHeader {
            capacity: n_words as u32,
            has_null_storage: false,
            count: s.len() as u32,
            has_null: false,
        }
        .write_at(self.arena.heap_mut(), offset);
        write_string_bytes(self.arena.heap_mut(), offset + ContainerHeaderWords::HEADER, s.as_bytes());
        self.maybe_collect();
        h
    }

    pub fn read_string(&self, h: Handle) -> Result<&str, ShapeError> {
        if !self.arena.is_valid(h) {
            return Err(ShapeError::InvalidHandle);
        }
        let offset = self.arena.offset_of(h).unwrap();
        let header = ContainerHeader::read_at(self.arena.heap(), offset);
        let bytes = read_string_bytes(self.arena.heap(), offset + ContainerHeaderWords::HEADER, header.count as usize);
        std::str::from_utf8(bytes).map_err(|_| ShapeError::NotAContainer)
    }

    // ── Wide scalars (Int32Big/UInt32/Int64/UInt64/Float32) ────────────
    //
    // These by-reference scalars carry no container header — just one or
    // two raw words at the handle's offset.

    pub fn alloc_int32_big(&mut self, v: i32) -> Handle {
        let h = self.arena.allocate(1);
        let offset = self.arena.offset_of(h).unwrap();
        self.arena.heap_mut()[offset] = v as u32;
        self.maybe_collect();
        h
    }

    pub fn read_int32_big(&self, h: Handle) -> Result<i32, ShapeError> {
        Ok(self.arena.heap()[self.scalar_offset(h)?] as i32)
    }

    pub fn alloc_uint32(&mut self, v: u32) -> Handle {
        let h = self.arena.allocate(1);
        let offset = self.arena.offset_of(h).unwrap();
        self.arena.heap_mut()[offset] = v;
        self.maybe_collect();
        h
    }

    pub fn read_uint32(&self, h: Handle) -> Result<u32, ShapeError> {
        Ok(self.arena.heap()[self.scalar_offset(h)?])
    }

    pub fn alloc_int64(&mut self, v: i64) -> Handle {
        let h = self.arena.allocate(2);
        let offset = self.arena.offset_of(h).unwrap();
        let bits = v as u64;
        self.arena.heap_mut()[offset] = bits as u32;
        self.arena.heap_mut()[offset + 1] = (bits >> 32) as u32;
        self.maybe_collect();
        h
    }

    pub fn read_int64(&self, h: Handle) -> Result<i64, ShapeError> {
        let offset = self.scalar_offset(h)?;
        let lo = self.arena.heap()[offset] as u64;
        let hi = self.arena.heap()[offset + 1] as u64;
        Ok(((hi << 32) | lo) as i64)
    }

    pub fn alloc_uint64(&mut self, v: u64) -> Handle {
        let h = self.arena.allocate(2);
        let offset = self.arena.offset_of(h).unwrap();
        self.arena.heap_mut()[offset] = v as u32;
        self.arena.heap_mut()[offset + 1] = (v >> 32) as u32;
        self.maybe_collect();
        h
    }

    pub fn read_uint64(&self, h: Handle) -> Result<u64, ShapeError> {
        let offset = self.scalar_offset(h)?;
        let lo = self.arena.heap()[offset] as u64;
        let hi = self.arena.heap()[offset + 1] as u64;
        Ok((hi << 32) | lo)
    }

    /// Stored exactly, bit-for-bit; callers only reach for this when the
    /// value's low bit is set and would lose information as a `Float31`.
    pub fn alloc_float32(&mut self, v: f32) -> Handle {
        let h = self.arena.allocate(1);
        let offset = self.arena.offset_of(h).unwrap();
        self.arena.heap_mut()[offset] = v.to_bits();
        self.maybe_collect();
        h
    }

    pub fn read_float32(&self, h: Handle) -> Result<f32, ShapeError> {
        Ok(f32::from_bits(self.arena.heap()[self.scalar_offset(h)?]))
    }

    fn scalar_offset(&self, h: Handle) -> Result<usize, ShapeError> {
        if !self.arena.is_valid(h) {
            return Err(ShapeError::InvalidHandle);
        }
        Ok(self.arena.offset_of(h).unwrap())
    }

    // ── Container allocation (shared by array/table modules) ──────────

    pub(crate) fn alloc_array_container(&mut self, capacity: u32) -> Handle {
        let h = self.arena.allocate(ContainerHeaderWords::HEADER + capacity as usize);
        let offset = self.arena.offset_of(h).unwrap();
        ContainerHeader {
            capacity,
            has_null_storage: false,
            count: 0,
            has_null: false,
        }
        .write_at(self.arena.heap_mut(), offset);
        h
    }

    pub(crate) fn alloc_table_container(&mut self, capacity: u32) -> Handle {
        debug_assert!(capacity.is_power_of_two());
        let slots = capacity as usize; // no null storage yet
        let h = self.arena.allocate(ContainerHeaderWords::HEADER + 2 * slots);
        let offset = self.arena.offset_of(h).unwrap();
        ContainerHeader {
            capacity,
            has_null_storage: false,
            count: 0,
            has_null: false,
        }
        .write_at(self.arena.heap_mut(), offset);
        let values_start = offset + ContainerHeaderWords::HEADER;
        let keys_start = values_start + slots;
        for i in 0..slots {
            self.arena.heap_mut()[values_start + i] = DataNode::Null.encode();
            self.arena.heap_mut()[keys_start + i] = 0;
        }
        h
    }

    pub(crate) fn header_of(&self, h: Handle, expect: Type) -> Result<(usize, ContainerHeader), ShapeError> {
        if !self.arena.is_valid(h) {
            return Err(ShapeError::InvalidHandle);
        }
        let offset = self.arena.offset_of(h).unwrap();
        let _ = expect;
        Ok((offset, ContainerHeader::read_at(self.arena.heap(), offset)))
    }

    pub fn expect_array(node: DataNode) -> Result<Handle, ShapeError> {
        match node {
            DataNode::Array(h) => Ok(h),
            _ => Err(ShapeError::NotAContainer),
        }
    }

    pub fn expect_table(node: DataNode) -> Result<Handle, ShapeError> {
        match node {
            DataNode::Table(h) => Ok(h),
            _ => Err(ShapeError::NotAContainer),
        }
    }

    // ── GC suppression ──────────────────────────────────────────────────

    /// Acquire a scoped suppression: GC will not run until every nested
    /// guard has dropped. Callers hold this whenever a `DataNode` argument
    /// they pass into a mutation may not yet be reachable from the root
    /// (e.g. a subtree built off to the side before being attached) — a GC
    /// pass walks from the root, so anything not yet attached would be
    /// treated as garbage.
    pub fn suppress_gc(&mut self) -> GcSuppressGuard<'_> {
        self.gc_suppress += 1;
        GcSuppressGuard { store: self }
    }

    pub(crate) fn with_gc_suppressed<T>(&mut self, f: impl FnOnce(&mut DataStore) -> T) -> T {
        self.gc_suppress += 1;
        let result = f(self);
        self.gc_suppress -= 1;
        result
    }

    pub(crate) fn maybe_collect(&mut self) {
        if self.gc_suppress != 0 {
            return;
        }
        let threshold = (self.last_gc_heap_words * 2).max(config::GC_HEAP_FLOOR_WORDS);
        if self.arena.heap_len() >= threshold {
            gc::collect_and_compact(self, false);
            self.last_gc_heap_words = self.arena.heap_len();
        }
    }

    /// Force a collection regardless of the heap-growth threshold. Exposed
    /// for binary save's optional collect-before-write step, and for tests.
    pub fn collect_garbage(&mut self) {
        gc::collect_and_compact(self, false);
        self.last_gc_heap_words = self.arena.heap_len();
    }

    /// Like [`DataStore::collect_garbage`] but additionally right-sizes
    /// every container to its live element count ("compact containers" mode).
    pub fn collect_garbage_and_compact_containers(&mut self) {
        gc::collect_and_compact(self, true);
        self.last_gc_heap_words = self.arena.heap_len();
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`DataStore::suppress_gc`].
pub struct GcSuppressGuard<'a> {
    store: &'a mut DataStore,
}

impl<'a> GcSuppressGuard<'a> {
    pub fn store(&mut self) -> &mut DataStore {
        self.store
    }
}

impl Drop for GcSuppressGuard<'_> {
    fn drop(&mut self) {
        self.store.gc_suppress -= 1;
    }
}

struct ContainerHeaderWords;
impl ContainerHeaderWords {
    const HEADER: usize = crate::arena::container::HEADER_WORDS;
}

fn words_for_string_bytes(len: usize) -> usize {
    // +1 for the NUL terminator, rounded up to whole 32-bit words.
    (len + 1 + 3) / 4
}

fn write_string_bytes(heap: &mut [u32], word_offset: usize, bytes: &[u8]) {
    let byte_offset = word_offset * 4;
    let heap_bytes = bytes_mut(heap);
    heap_bytes[byte_offset..byte_offset + bytes.len()].copy_from_slice(bytes);
    heap_bytes[byte_offset + bytes.len()] = 0;
}

fn read_string_bytes(heap: &[u32], word_offset: usize, len: usize) -> &[u8] {
    let byte_offset = word_offset * 4;
    &bytes_ref(heap)[byte_offset..byte_offset + len]
}

fn bytes_mut(heap: &mut [u32]) -> &mut [u8] {
    // Safety: u32 -> u8 slice reinterpretation is valid for any bit pattern;
    // length/alignment are derived from the source slice.
    unsafe { std::slice::from_raw_parts_mut(heap.as_mut_ptr() as *mut u8, heap.len() * 4) }
}

fn bytes_ref(heap: &[u32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(heap.as_ptr() as *const u8, heap.len() * 4) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_roundtrip() {
        let mut store = DataStore::new();
        let h = store.alloc_string("hello, world");
        assert_eq!(store.read_string(h).unwrap(), "hello, world");
    }

    #[test]
    fn empty_string() {
        let mut store = DataStore::new();
        let h = store.alloc_string("");
        assert_eq!(store.read_string(h).unwrap(), "");
    }

    #[test]
    fn make_array_replaces_root() {
        let mut store = DataStore::new();
        store.make_array();
        assert!(matches!(store.root(), DataNode::Array(_)));
    }
}
