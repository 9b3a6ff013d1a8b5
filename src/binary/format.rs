//! On-disk framing constants: file signatures and format versions.

/// Current file signature.
pub const SIGNATURE: [u8; 8] = [0xEB, 0x4E, 0x6D, 0xBA, 0xBD, 0x66, 0xD1, 0xEC];
/// Legacy signature; implies version 0 (no explicit version word follows it).
pub const LEGACY_SIGNATURE: [u8; 8] = [0xFF, 0xFF, 0x00, 0xDE, 0xA7, 0x7F, 0x00, 0xDD];

/// Version 0 (legacy): implied by [`LEGACY_SIGNATURE`], no version word.
pub const VERSION_LEGACY: u32 = 0;
/// Version 1: remap indices are byte offsets into the string table.
pub const VERSION_BYTE_OFFSETS: u32 = 1;
/// Version 2 (current): remap indices are ordinal string counts.
pub const VERSION_STRING_COUNTS: u32 = 2;
/// The version this crate writes.
pub const CURRENT_VERSION: u32 = VERSION_STRING_COUNTS;
