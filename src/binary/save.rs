//! Serialise a [`DataStore`] to the on-disk binary framing.
//!
//! Save always writes [`format::CURRENT_VERSION`]: remap indices embedded in
//! the payload heap are plain ordinals into the FilePath/symbol tables
//! written alongside it. Save never mutates the caller's store — it works
//! on an internal clone, collected (and optionally compacted) before the
//! heap is walked, so every handle in the clone is both reachable and
//! contiguous.

use std::collections::{HashMap, HashSet};

use super::format;
use super::strtable;
use crate::platform::TargetPlatform;
use crate::store::DataStore;
use crate::symbol::SymbolTable;
use crate::value::{DataNode, FilePath, Handle};

/// Tuning knobs for [`save`].
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Run a garbage collection before writing. Save always needs a
    /// reachable, contiguous heap to walk, so this cannot be skipped; the
    /// flag only controls whether containers are additionally right-sized.
    pub compact_containers: bool,
    pub target_platform: TargetPlatform,
}

impl Default for SaveOptions {
    fn default() -> SaveOptions {
        SaveOptions {
            compact_containers: true,
            target_platform: TargetPlatform::current(),
        }
    }
}

struct Tables {
    filepath_strings: Vec<String>,
    filepath_ordinal: HashMap<(u8, u8, u32), u32>,
    symbol_strings: Vec<String>,
    symbol_ordinal: HashMap<u32, u32>,
}

impl Tables {
    fn new() -> Tables {
        Tables {
            filepath_strings: Vec::new(),
            filepath_ordinal: HashMap::new(),
            symbol_strings: vec![String::new()],
            symbol_ordinal: HashMap::new(),
        }
    }

    fn filepath_ordinal(&mut self, fp: FilePath, symbols: &SymbolTable, target: TargetPlatform) -> u32 {
        let key = (fp.directory.bits(), fp.file_type.bits(), fp.symbol);
        if let Some(&ord) = self.filepath_ordinal.get(&key) {
            return ord;
        }
        let mut bytes = symbols.resolve(fp.symbol).unwrap_or("").as_bytes().to_vec();
        crate::platform::rewrite_separator(&mut bytes, target.alternate_separator(), target.primary_separator());
        let s = String::from_utf8(bytes).expect("separator rewrite preserves UTF-8 validity");
        let ord = self.filepath_strings.len() as u32;
        self.filepath_strings.push(s);
        self.filepath_ordinal.insert(key, ord);
        ord
    }

    fn symbol_ordinal(&mut self, symbol: u32, symbols: &SymbolTable) -> u32 {
        if symbol == 0 {
            return 0;
        }
        if let Some(&ord) = self.symbol_ordinal.get(&symbol) {
            return ord;
        }
        let ord = self.symbol_strings.len() as u32;
        self.symbol_strings.push(symbols.resolve(symbol).unwrap_or("").to_string());
        self.symbol_ordinal.insert(symbol, ord);
        ord
    }
}

fn patch_filepath_word(word: u32, ordinal: u32) -> u32 {
    let payload = word >> 5;
    let low = payload & 0xFF; // directory (3 bits) + file_type (5 bits)
    let new_payload = low | (ordinal << 8);
    (new_payload << 5) | (word & 0x1F)
}

const HEADER: usize = crate::arena::container::HEADER_WORDS;

/// Walk every reachable container from `h`, collecting FilePath/symbol
/// strings and patching FilePath words and table key words in `wire_heap`.
fn walk(store: &DataStore, symbols: &SymbolTable, target: TargetPlatform, h: Handle, kind: NodeKind, visited: &mut HashSet<u32>, tables: &mut Tables, wire_heap: &mut [u32]) {
    if !visited.insert(h.index) {
        return;
    }
    let offset = store.arena().offset_of(h).unwrap();
    match kind {
        NodeKind::Array => {
            let hdr = crate::arena::ContainerHeader::read_at(store.arena().heap(), offset);
            let values_start = offset + HEADER;
            for i in 0..hdr.count as usize {
                patch_value_slot(store, symbols, target, values_start + i, tables, wire_heap, visited);
            }
        }
        NodeKind::Table => {
            let hdr = crate::arena::ContainerHeader::read_at(store.arena().heap(), offset);
            let slots = hdr.capacity as usize + hdr.has_null_storage as usize;
            let values_start = offset + HEADER;
            let keys_start = values_start + slots;
            for i in 0..hdr.capacity as usize {
                let key = store.arena().heap()[keys_start + i];
                if key != 0 {
                    let ord = tables.symbol_ordinal(key, symbols);
                    wire_heap[keys_start + i] = ord;
                }
            }
            for i in 0..slots {
                patch_value_slot(store, symbols, target, values_start + i, tables, wire_heap, visited);
            }
        }
        NodeKind::Opaque => {}
    }
}

#[derive(Clone, Copy)]
enum NodeKind {
    Array,
    Table,
    Opaque,
}

fn patch_value_slot(store: &DataStore, symbols: &SymbolTable, target: TargetPlatform, slot_offset: usize, tables: &mut Tables, wire_heap: &mut [u32], visited: &mut HashSet<u32>) {
    let word = store.arena().heap()[slot_offset];
    let Some(node) = DataNode::decode(word) else { return };
    if let DataNode::FilePath(fp) = node {
        let ord = tables.filepath_ordinal(fp, symbols, target);
        wire_heap[slot_offset] = patch_filepath_word(word, ord);
        return;
    }
    let (child_h, kind) = match node {
        DataNode::Array(h) => (h, NodeKind::Array),
        DataNode::Table(h) => (h, NodeKind::Table),
        DataNode::String(h) | DataNode::Int32Big(h) | DataNode::UInt32(h) | DataNode::Int64(h) | DataNode::UInt64(h) | DataNode::Float32(h) => (h, NodeKind::Opaque),
        _ => return,
    };
    walk(store, symbols, target, child_h, kind, visited, tables, wire_heap);
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Serialise `store` (whose FilePath/table-key symbols are resolved against
/// `symbols`) into the current binary format.
pub fn save(store: &DataStore, symbols: &SymbolTable, options: SaveOptions) -> Vec<u8> {
    let mut working = store.clone();
    if options.compact_containers {
        working.collect_garbage_and_compact_containers();
    } else {
        working.collect_garbage();
    }

    let mut wire_heap = working.arena().heap().to_vec();
    let mut tables = Tables::new();
    let mut visited = HashSet::new();

    let root_word = match working.root() {
        DataNode::FilePath(fp) => {
            let ord = tables.filepath_ordinal(fp, symbols, options.target_platform);
            patch_filepath_word(DataNode::FilePath(fp).encode(), ord)
        }
        DataNode::Array(h) => {
            walk(&working, symbols, options.target_platform, h, NodeKind::Array, &mut visited, &mut tables, &mut wire_heap);
            DataNode::Array(h).encode()
        }
        DataNode::Table(h) => {
            walk(&working, symbols, options.target_platform, h, NodeKind::Table, &mut visited, &mut tables, &mut wire_heap);
            DataNode::Table(h).encode()
        }
        other => other.encode(),
    };

    let mut out = Vec::new();
    out.extend_from_slice(&format::SIGNATURE);
    write_u32(&mut out, format::CURRENT_VERSION);

    strtable::write_table(&mut out, &tables.filepath_strings);
    strtable::write_table(&mut out, &tables.symbol_strings);

    let raw_table = working.arena().raw_table();
    write_u32(&mut out, raw_table.len() as u32);
    for (offset, generation, _is_free) in &raw_table {
        write_u32(&mut out, (offset << 3) | (*generation as u32));
    }

    write_u32(&mut out, wire_heap.len() as u32);
    for word in &wire_heap {
        write_u32(&mut out, *word);
    }

    write_u32(&mut out, working.arena().allocated_handles());
    write_u32(&mut out, root_word);

    out
}
