//! `ddstore` — a dynamically typed hierarchical value store: an arena-backed
//! tagged-union value representation, a binary save/load format, a JSON
//! parser with an embedded command DSL, a hint-tree pretty printer, and a
//! cook dependency database built on top of it.

pub mod arena;
pub mod binary;
pub mod cli;
pub mod commands;
pub mod compress;
pub mod cook;
pub mod diff;
pub mod error;
pub mod hash;
pub mod hint;
pub mod json;
pub mod platform;
pub mod store;
pub mod symbol;
pub mod value;

pub use arena::Arena;
pub use error::{CommandError, CookError, LoadError, ParseError, ShapeError, SourcePos};
pub use store::DataStore;
pub use symbol::SymbolTable;
pub use value::{DataNode, FilePath, Handle, Type};

/// Canonical on-disk signature for the current binary format version.
pub use binary::format::{CURRENT_VERSION, LEGACY_SIGNATURE, SIGNATURE};
