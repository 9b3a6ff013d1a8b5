//! Parse the on-disk binary framing back into a [`DataStore`].
//!
//! Any error here leaves the caller's store untouched: the whole payload is
//! parsed into a fresh [`crate::arena::Arena`] first, and only swapped in at
//! the very end via [`DataStore::from_loaded`].

use std::collections::{HashMap, HashSet};

use super::format;
use super::strtable;
use crate::arena::{Arena, ContainerHeader};
use crate::error::LoadError;
use crate::platform::TargetPlatform;
use crate::store::DataStore;
use crate::symbol::SymbolTable;
use crate::value::{DataNode, Type};

const HEADER: usize = crate::arena::container::HEADER_WORDS;

fn patch_filepath_word(word: u32, symbol: u32) -> u32 {
    let payload = word >> 5;
    let low = payload & 0xFF;
    let new_payload = low | ((symbol & 0x7_FFFF) << 8);
    (new_payload << 5) | (word & 0x1F)
}

fn ordinal_of(raw: u32, version: u32, offsets: &HashMap<u32, u32>) -> Result<u32, LoadError> {
    if version == format::VERSION_STRING_COUNTS {
        Ok(raw)
    } else {
        offsets.get(&raw).copied().ok_or(LoadError::IndexOutOfRange)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        strtable::read_u32(self.buf, &mut self.pos)
    }

    fn table(&mut self) -> Result<(Vec<String>, HashMap<u32, u32>), LoadError> {
        strtable::read_table(self.buf, &mut self.pos)
    }
}

struct Relinker<'a> {
    heap: &'a mut [u32],
    offsets: &'a [u32],
    version: u32,
    filepath_offsets: &'a HashMap<u32, u32>,
    filepath_remap: &'a [u32],
    symbol_offsets: &'a HashMap<u32, u32>,
    symbol_remap: &'a [u32],
}

impl<'a> Relinker<'a> {
    fn filepath_symbol(&self, raw_symbol: u32) -> Result<u32, LoadError> {
        let ordinal = ordinal_of(raw_symbol, self.version, self.filepath_offsets)?;
        self.filepath_remap.get(ordinal as usize).copied().ok_or(LoadError::IndexOutOfRange)
    }

    fn table_key_symbol(&self, raw: u32) -> Result<u32, LoadError> {
        if raw == 0 {
            return Ok(0);
        }
        let ordinal = ordinal_of(raw, self.version, self.symbol_offsets)?;
        self.symbol_remap.get(ordinal as usize).copied().ok_or(LoadError::IndexOutOfRange)
    }

    fn handle_offset(&self, index: u32) -> Option<usize> {
        self.offsets.get(index as usize).map(|&o| o as usize)
    }

    /// Patch a single decoded-word slot in place: FilePath words get their
    /// embedded symbol remapped, container handles get walked recursively.
    fn relink_word(&mut self, slot: usize, visited: &mut HashSet<u32>) -> Result<(), LoadError> {
        let word = self.heap[slot];
        let Some(node) = DataNode::decode(word) else { return Ok(()) };
        match node {
            DataNode::FilePath(fp) => {
                let symbol = self.filepath_symbol(fp.symbol)?;
                self.heap[slot] = patch_filepath_word(word, symbol);
                Ok(())
            }
            DataNode::Array(h) => self.relink_container(h.index, Kind::Array, visited),
            DataNode::Table(h) => self.relink_container(h.index, Kind::Table, visited),
            DataNode::String(h) | DataNode::Int32Big(h) | DataNode::UInt32(h) | DataNode::Int64(h) | DataNode::UInt64(h) | DataNode::Float32(h) => {
                self.relink_container(h.index, Kind::Opaque, visited)
            }
            _ => Ok(()),
        }
    }

    fn relink_container(&mut self, index: u32, kind: Kind, visited: &mut HashSet<u32>) -> Result<(), LoadError> {
        if !visited.insert(index) {
            return Ok(());
        }
        let Some(offset) = self.handle_offset(index) else { return Ok(()) };
        match kind {
            Kind::Array => {
                if offset + HEADER > self.heap.len() {
                    return Err(LoadError::CorruptContainerHeader);
                }
                let hdr = ContainerHeader::read_at(self.heap, offset);
                let values_start = offset + HEADER;
                for i in 0..hdr.count as usize {
                    self.relink_word(values_start + i, visited)?;
                }
                Ok(())
            }
            Kind::Table => {
                if offset + HEADER > self.heap.len() {
                    return Err(LoadError::CorruptContainerHeader);
                }
                let hdr = ContainerHeader::read_at(self.heap, offset);
                let slots = hdr.capacity as usize + hdr.has_null_storage as usize;
                let values_start = offset + HEADER;
                let keys_start = values_start + slots;
                for i in 0..hdr.capacity as usize {
                    let raw = self.heap[keys_start + i];
                    let symbol = self.table_key_symbol(raw)?;
                    self.heap[keys_start + i] = symbol;
                }
                for i in 0..slots {
                    self.relink_word(values_start + i, visited)?;
                }
                Ok(())
            }
            Kind::Opaque => Ok(()),
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Array,
    Table,
    Opaque,
}

/// Parse `bytes`, re-interning FilePath and table-key strings into `symbols`
/// and normalising on-disk path separators to the current platform.
pub fn load(bytes: &[u8], symbols: &mut SymbolTable) -> Result<DataStore, LoadError> {
    if bytes.len() < 8 {
        return Err(LoadError::Truncated);
    }
    let sig: [u8; 8] = bytes[0..8].try_into().unwrap();
    let mut cursor = Cursor::new(bytes);
    cursor.pos = 8;

    let version = if sig == format::SIGNATURE {
        cursor.u32()?
    } else if sig == format::LEGACY_SIGNATURE {
        format::VERSION_LEGACY
    } else {
        return Err(LoadError::SignatureMismatch);
    };
    if version > format::CURRENT_VERSION {
        return Err(LoadError::UnsupportedVersion(version));
    }

    let (filepath_entries, filepath_offsets) = cursor.table()?;
    let (symbol_entries, symbol_offsets) = cursor.table()?;

    let table_len = cursor.u32()? as usize;
    let mut offsets = Vec::with_capacity(table_len);
    let mut generations = Vec::with_capacity(table_len);
    for _ in 0..table_len {
        let packed = cursor.u32()?;
        offsets.push(packed >> 3);
        generations.push((packed & 0x7) as u8);
    }

    let heap_len = cursor.u32()? as usize;
    let mut heap = Vec::with_capacity(heap_len);
    for _ in 0..heap_len {
        heap.push(cursor.u32()?);
    }

    let allocated_handles = cursor.u32()?;
    let root_word = cursor.u32()?;

    let target = TargetPlatform::current();

    let mut symbol_remap: Vec<u32> = Vec::with_capacity(symbol_entries.len());
    for s in &symbol_entries {
        symbol_remap.push(symbols.intern(s));
    }

    let mut filepath_remap: Vec<u32> = Vec::with_capacity(filepath_entries.len());
    for s in &filepath_entries {
        let mut raw = s.as_bytes().to_vec();
        crate::platform::rewrite_separator(&mut raw, target.alternate_separator(), target.primary_separator());
        let normalised = String::from_utf8(raw).map_err(|_| LoadError::CorruptContainerHeader)?;
        filepath_remap.push(symbols.intern(&normalised));
    }

    let mut relinker = Relinker {
        heap: &mut heap,
        offsets: &offsets,
        version,
        filepath_offsets: &filepath_offsets,
        filepath_remap: &filepath_remap,
        symbol_offsets: &symbol_offsets,
        symbol_remap: &symbol_remap,
    };
    let mut visited = HashSet::new();

    let root_word = if root_word & 1 == 1 {
        root_word
    } else if root_word & 0x1F == Type::FilePath as u32 {
        let payload = root_word >> 5;
        let symbol = relinker.filepath_symbol(payload >> 8)?;
        patch_filepath_word(root_word, symbol)
    } else {
        root_word
    };
    let root = DataNode::decode(root_word).ok_or(LoadError::CorruptContainerHeader)?;
    match root {
        DataNode::Array(h) => relinker.relink_container(h.index, Kind::Array, &mut visited)?,
        DataNode::Table(h) => relinker.relink_container(h.index, Kind::Table, &mut visited)?,
        _ => {}
    }

    let raw_table: Vec<(u32, u8)> = offsets.into_iter().zip(generations).collect();
    let mut arena = Arena::new();
    arena.rebuild(raw_table, heap, allocated_handles);

    Ok(DataStore::from_loaded(arena, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::save::{save, SaveOptions};
    use crate::store::table as table_ops;

    #[test]
    fn roundtrip_simple_table() {
        let mut store = DataStore::new();
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        store.make_table();
        let h = DataStore::expect_table(store.root()).unwrap();
        table_ops::set(&mut store, h, x, DataNode::Int32Small(42)).unwrap();

        let bytes = save(&store, &symbols, SaveOptions::default());
        let mut loaded_symbols = SymbolTable::new();
        let loaded = load(&bytes, &mut loaded_symbols).unwrap();

        let loaded_x = loaded_symbols.lookup("x").unwrap();
        let loaded_h = DataStore::expect_table(loaded.root()).unwrap();
        assert_eq!(table_ops::get(&loaded, loaded_h, loaded_x).unwrap(), Some(DataNode::Int32Small(42)));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut symbols = SymbolTable::new();
        let err = load(&[0u8; 16], &mut symbols).unwrap_err();
        assert_eq!(err, LoadError::SignatureMismatch);
    }

    #[test]
    fn rejects_truncated_header() {
        let mut symbols = SymbolTable::new();
        let err = load(&[1, 2, 3], &mut symbols).unwrap_err();
        assert_eq!(err, LoadError::Truncated);
    }
}
