//! A symbol service stand-in: interning strings to stable indices is
//! normally an externally-owned collaborator, so this module is the
//! trait seam plus an in-process implementation good enough to drive the
//! rest of the crate and its tests.
//!
//! `FilePath.symbol` and table keys are both plain `u32` indices into
//! whatever interns strings; this module is that interner. It never touches
//! the arena — symbols are looked up by value, not reachability, and are
//! never garbage collected.

use std::collections::HashMap;

/// Interns strings to stable `u32` indices and back. Index `0` is reserved
/// for the empty string, which also doubles as the table "null key".
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    strings: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        let mut table = SymbolTable {
            strings: Vec::new(),
            lookup: HashMap::new(),
        };
        table.intern("");
        table
    }

    /// Intern `s`, returning its existing index or allocating a new one.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.lookup.get(s) {
            return idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), idx);
        idx
    }

    pub fn resolve(&self, symbol: u32) -> Option<&str> {
        self.strings.get(symbol as usize).map(String::as_str)
    }

    pub fn lookup(&self, s: &str) -> Option<u32> {
        self.lookup.get(s).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }

    /// All interned strings in index order, for binary save's string table.
    pub fn entries(&self) -> &[String] {
        &self.strings
    }

    /// Rebuild from an ordered list of strings (binary load's string table),
    /// replacing any prior contents.
    pub fn rebuild_from(entries: Vec<String>) -> SymbolTable {
        let mut lookup = HashMap::with_capacity(entries.len());
        for (idx, s) in entries.iter().enumerate() {
            lookup.insert(s.clone(), idx as u32);
        }
        SymbolTable { strings: entries, lookup }
    }
}
