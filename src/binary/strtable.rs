//! The flat, NUL-delimited string tables binary save/load uses for both
//! the FilePath table and the symbol table.

use std::collections::HashMap;

use crate::error::LoadError;

/// Serialise `entries` as a length-prefixed, NUL-terminated flat buffer.
pub fn write_table(out: &mut Vec<u8>, entries: &[String]) {
    let mut body = Vec::new();
    for s in entries {
        body.extend_from_slice(s.as_bytes());
        body.push(0);
    }
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
}

/// Parse a flat string table, returning the ordered entries plus a map from
/// each entry's starting byte offset to its ordinal index (needed to decode
/// version-1 remap indices, which are byte offsets rather than ordinals).
pub fn read_table(buf: &[u8], cursor: &mut usize) -> Result<(Vec<String>, HashMap<u32, u32>), LoadError> {
    let len = read_u32(buf, cursor)? as usize;
    let end = cursor.checked_add(len).ok_or(LoadError::Truncated)?;
    if end > buf.len() {
        return Err(LoadError::Truncated);
    }
    let region = &buf[*cursor..end];
    let mut entries = Vec::new();
    let mut offsets = HashMap::new();
    let mut start = 0usize;
    for (i, &b) in region.iter().enumerate() {
        if b == 0 {
            let s = std::str::from_utf8(&region[start..i]).map_err(|_| LoadError::CorruptContainerHeader)?;
            offsets.insert(start as u32, entries.len() as u32);
            entries.push(s.to_string());
            start = i + 1;
        }
    }
    *cursor = end;
    Ok((entries, offsets))
}

pub fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32, LoadError> {
    let end = cursor.checked_add(4).ok_or(LoadError::Truncated)?;
    if end > buf.len() {
        return Err(LoadError::Truncated);
    }
    let v = u32::from_le_bytes(buf[*cursor..end].try_into().unwrap());
    *cursor = end;
    Ok(v)
}
