//! The per-artifact sidecar metadata many-to-one cooked types carry: cooker
//! and data versions, the cooked timestamp, and the declared sources,
//! siblings, and directory sources that staleness is checked against.

use crate::error::CookError;
use crate::json::{self, ParseFlags};
use crate::store::{array, table, DataStore};
use crate::symbol::SymbolTable;
use crate::value::{DataNode, FilePath, Handle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSource {
    pub path: FilePath,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectorySource {
    pub path: FilePath,
    pub file_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub cooker_version: u32,
    pub data_version: u32,
    pub cooked_timestamp: u64,
    pub sources: Vec<FileSource>,
    pub siblings: Vec<FileSource>,
    pub directory_sources: Vec<DirectorySource>,
}

/// Parse a sidecar metadata document. `symbols` is the same symbol table the
/// rest of the store's `FilePath` values are interned against.
pub fn parse(bytes: &[u8], symbols: &mut SymbolTable) -> Result<Metadata, CookError> {
    let store = json::parse(bytes, symbols, ParseFlags::default())?;
    let h = DataStore::expect_table(store.root()).map_err(|_| CookError::Metadata("sidecar root is not a table".to_string()))?;

    let cooked_timestamp = as_u64(require_field(&store, h, symbols, "CookedTimestamp")?, &store)?;
    let cooker_version = as_u32(require_field(&store, h, symbols, "CookerVersion")?, &store)?;
    let data_version = as_u32(require_field(&store, h, symbols, "DataVersion")?, &store)?;
    let sources = read_file_sources(&store, h, symbols, "Sources")?;
    let siblings = read_file_sources(&store, h, symbols, "Siblings")?;
    let directory_sources = read_directory_sources(&store, h, symbols, "DirectorySources")?;

    Ok(Metadata { cooker_version, data_version, cooked_timestamp, sources, siblings, directory_sources })
}

/// Render a sidecar metadata document. Written directly rather than through
/// [`crate::hint::printer`]: the sidecar has a fixed, known shape and no
/// human ever hand-edits it, so there's nothing to preserve across a
/// round trip.
pub fn write(meta: &Metadata, symbols: &SymbolTable) -> String {
    let mut out = String::new();
    out.push_str("{\n");
    out.push_str(&format!("  \"CookedTimestamp\": {},\n", meta.cooked_timestamp));
    out.push_str(&format!("  \"CookerVersion\": {},\n", meta.cooker_version));
    out.push_str(&format!("  \"DataVersion\": {},\n", meta.data_version));
    out.push_str("  \"Sources\": [");
    write_file_sources(&mut out, &meta.sources, symbols);
    out.push_str("]");
    if !meta.siblings.is_empty() {
        out.push_str(",\n  \"Siblings\": [");
        write_file_sources(&mut out, &meta.siblings, symbols);
        out.push(']');
    }
    out.push_str(",\n  \"DirectorySources\": [");
    write_directory_sources(&mut out, &meta.directory_sources, symbols);
    out.push_str("]\n}\n");
    out
}

fn write_file_sources(out: &mut String, sources: &[FileSource], symbols: &SymbolTable) {
    for (i, s) in sources.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{{\"Source\": \"{}\", \"Timestamp\": {}}}", file_path_url(s.path, symbols), s.timestamp));
    }
}

fn write_directory_sources(out: &mut String, sources: &[DirectorySource], symbols: &SymbolTable) {
    for (i, s) in sources.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{{\"Source\": \"{}\", \"FileCount\": {}}}", file_path_url(s.path, symbols), s.file_count));
    }
}

fn file_path_url(fp: FilePath, symbols: &SymbolTable) -> String {
    let name = symbols.resolve(fp.symbol).unwrap_or("");
    let ext = fp.file_type.extension();
    if ext.is_empty() {
        format!("{}://{}", fp.directory.scheme(), name)
    } else {
        format!("{}://{}.{}", fp.directory.scheme(), name, ext)
    }
}

fn field(store: &DataStore, h: Handle, symbols: &mut SymbolTable, name: &str) -> Result<Option<DataNode>, CookError> {
    let symbol = symbols.intern(name);
    table::get(store, h, symbol).map_err(|_| CookError::Metadata(format!("'{name}' is not a table")))
}

fn require_field(store: &DataStore, h: Handle, symbols: &mut SymbolTable, name: &str) -> Result<DataNode, CookError> {
    field(store, h, symbols, name)?.ok_or_else(|| CookError::Metadata(format!("missing required field '{name}'")))
}

fn as_u64(node: DataNode, store: &DataStore) -> Result<u64, CookError> {
    match node {
        DataNode::Int32Small(v) if v >= 0 => Ok(v as u64),
        DataNode::UInt32(h) => Ok(store.read_uint32(h).unwrap_or(0) as u64),
        DataNode::Int32Big(h) => Ok(store.read_int32_big(h).unwrap_or(0).max(0) as u64),
        DataNode::Int64(h) => Ok(store.read_int64(h).unwrap_or(0).max(0) as u64),
        DataNode::UInt64(h) => Ok(store.read_uint64(h).unwrap_or(0)),
        _ => Err(CookError::Metadata("expected an unsigned integer".to_string())),
    }
}

fn as_u32(node: DataNode, store: &DataStore) -> Result<u32, CookError> {
    as_u64(node, store).map(|v| v as u32)
}

fn as_filepath(node: DataNode) -> Result<FilePath, CookError> {
    match node {
        DataNode::FilePath(fp) => Ok(fp),
        _ => Err(CookError::Metadata("expected a FilePath value".to_string())),
    }
}

fn read_file_sources(store: &DataStore, h: Handle, symbols: &mut SymbolTable, name: &str) -> Result<Vec<FileSource>, CookError> {
    let Some(node) = field(store, h, symbols, name)? else { return Ok(Vec::new()) };
    let arr = DataStore::expect_array(node).map_err(|_| CookError::Metadata(format!("'{name}' is not an array")))?;
    let items = array::iter(store, arr).map_err(|_| CookError::Metadata(format!("'{name}' shape error")))?;
    items
        .into_iter()
        .map(|item| {
            let entry = DataStore::expect_table(item).map_err(|_| CookError::Metadata(format!("'{name}' entry is not a table")))?;
            let path = as_filepath(require_field(store, entry, symbols, "Source")?)?;
            let timestamp = as_u64(require_field(store, entry, symbols, "Timestamp")?, store)?;
            Ok(FileSource { path, timestamp })
        })
        .collect()
}

fn read_directory_sources(store: &DataStore, h: Handle, symbols: &mut SymbolTable, name: &str) -> Result<Vec<DirectorySource>, CookError> {
    let Some(node) = field(store, h, symbols, name)? else { return Ok(Vec::new()) };
    let arr = DataStore::expect_array(node).map_err(|_| CookError::Metadata(format!("'{name}' is not an array")))?;
    let items = array::iter(store, arr).map_err(|_| CookError::Metadata(format!("'{name}' shape error")))?;
    items
        .into_iter()
        .map(|item| {
            let entry = DataStore::expect_table(item).map_err(|_| CookError::Metadata(format!("'{name}' entry is not a table")))?;
            let path = as_filepath(require_field(store, entry, symbols, "Source")?)?;
            let file_count = as_u32(require_field(store, entry, symbols, "FileCount")?, store)?;
            Ok(DirectorySource { path, file_count })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FileTypeTag;

    #[test]
    fn round_trips_through_write_and_parse() {
        let mut symbols = SymbolTable::new();
        let name = symbols.intern("ui/main");
        let meta = Metadata {
            cooker_version: 3,
            data_version: 1,
            cooked_timestamp: 1_000,
            sources: vec![FileSource {
                path: FilePath { directory: crate::platform::DirectoryTag::Content, file_type: FileTypeTag::Image, symbol: name },
                timestamp: 500,
            }],
            siblings: Vec::new(),
            directory_sources: vec![DirectorySource {
                path: FilePath { directory: crate::platform::DirectoryTag::Content, file_type: FileTypeTag::Unknown, symbol: name },
                file_count: 4,
            }],
        };
        let text = write(&meta, &symbols);
        let parsed = parse(text.as_bytes(), &mut symbols).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let mut symbols = SymbolTable::new();
        let err = parse(br#"{"CookerVersion": 1, "DataVersion": 1}"#, &mut symbols).unwrap_err();
        assert!(matches!(err, CookError::Metadata(_)));
    }
}
