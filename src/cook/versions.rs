//! The global cooker-versions file (`content://version_data.dat`): per
//! file-type cooker and data versions, compared on startup to decide whether
//! a cooker upgrade invalidated every cooked file of a given type.

use std::collections::HashMap;

use crate::error::CookError;
use crate::platform::FileTypeTag;

/// Every file type, in the order the on-disk format stores them.
pub const ALL_FILE_TYPES: [FileTypeTag; 11] = [
    FileTypeTag::Unknown,
    FileTypeTag::Text,
    FileTypeTag::Json,
    FileTypeTag::Image,
    FileTypeTag::Audio,
    FileTypeTag::Binary,
    FileTypeTag::Script,
    FileTypeTag::Effect,
    FileTypeTag::ScriptProject,
    FileTypeTag::SoundProject,
    FileTypeTag::UiMovie,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionPair {
    pub data_version: u32,
    pub cooker_version: u32,
}

/// One row per file type. A type with no recorded entry reads back as
/// `VersionPair::default()` (both versions zero), which never matches a real
/// cooker's version and so is always treated as stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionsFile {
    by_type: HashMap<FileTypeTag, VersionPair>,
}

impl VersionsFile {
    pub fn get(&self, ty: FileTypeTag) -> VersionPair {
        self.by_type.get(&ty).copied().unwrap_or_default()
    }

    pub fn set(&mut self, ty: FileTypeTag, pair: VersionPair) {
        self.by_type.insert(ty, pair);
    }

    /// `count:u32` then `count × (data_version:u32, cooker_version:u32)`, in
    /// [`ALL_FILE_TYPES`] order, all little-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + ALL_FILE_TYPES.len() * 8);
        out.extend_from_slice(&(ALL_FILE_TYPES.len() as u32).to_le_bytes());
        for ty in ALL_FILE_TYPES {
            let pair = self.get(ty);
            out.extend_from_slice(&pair.data_version.to_le_bytes());
            out.extend_from_slice(&pair.cooker_version.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<VersionsFile, CookError> {
        let mut pos = 0usize;
        let count = read_u32(bytes, &mut pos)? as usize;
        if count != ALL_FILE_TYPES.len() {
            return Err(CookError::Metadata(format!(
                "versions file has {count} entries, expected {}",
                ALL_FILE_TYPES.len()
            )));
        }
        let mut by_type = HashMap::with_capacity(count);
        for ty in ALL_FILE_TYPES {
            let data_version = read_u32(bytes, &mut pos)?;
            let cooker_version = read_u32(bytes, &mut pos)?;
            by_type.insert(ty, VersionPair { data_version, cooker_version });
        }
        Ok(VersionsFile { by_type })
    }
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32, CookError> {
    let end = pos.checked_add(4).filter(|&end| end <= buf.len()).ok_or_else(|| CookError::Metadata("versions file truncated".into()))?;
    let v = u32::from_le_bytes(buf[*pos..end].try_into().unwrap());
    *pos = end;
    Ok(v)
}
