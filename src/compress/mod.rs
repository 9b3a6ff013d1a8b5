//! Framing headers for the compressed blobs the value store's external save
//! path writes and reads. The codecs themselves (LZ4, ZSTD) are external
//! collaborators — this module only knows the 4-byte FourCC plus
//! little-endian uncompressed length that precedes the compressed stream,
//! and the alignment each format is padded to.

use crate::error::CompressError;

pub const LZ4_FOURCC: [u8; 4] = *b"LZ4C";
pub const ZSTD_FOURCC: [u8; 4] = *b"ZSTD";

/// Header size: 4-byte FourCC + 4-byte little-endian uncompressed length.
pub const HEADER_LEN: usize = 8;

/// Largest uncompressed length a header may declare.
pub const MAX_UNCOMPRESSED_LEN: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Lz4,
    Zstd,
}

impl Codec {
    pub fn four_cc(self) -> [u8; 4] {
        match self {
            Codec::Lz4 => LZ4_FOURCC,
            Codec::Zstd => ZSTD_FOURCC,
        }
    }

    /// Byte alignment the framed blob is padded to.
    pub fn alignment(self) -> usize {
        match self {
            Codec::Lz4 => 16,
            Codec::Zstd => 8,
        }
    }

    fn from_four_cc(bytes: [u8; 4]) -> Option<Codec> {
        match bytes {
            LZ4_FOURCC => Some(Codec::Lz4),
            ZSTD_FOURCC => Some(Codec::Zstd),
            _ => None,
        }
    }
}

/// A parsed framing header: which codec produced the stream, and how long
/// the stream decompresses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub codec: Codec,
    pub uncompressed_len: u32,
}

impl FrameHeader {
    pub fn new(codec: Codec, uncompressed_len: u32) -> Result<FrameHeader, CompressError> {
        if uncompressed_len as u64 > MAX_UNCOMPRESSED_LEN {
            return Err(CompressError::OversizeInput);
        }
        Ok(FrameHeader { codec, uncompressed_len })
    }

    /// Encode the 8-byte header. The compressed stream and any alignment
    /// padding follow immediately; this module has no opinion on either.
    pub fn encode(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&self.codec.four_cc());
        out[4..].copy_from_slice(&self.uncompressed_len.to_le_bytes());
        out
    }

    /// Decode a header from the start of `bytes`. Does not validate that
    /// the rest of the buffer actually holds `uncompressed_len` worth of
    /// decompressed data; that's the codec's job once it runs.
    pub fn decode(bytes: &[u8]) -> Result<FrameHeader, CompressError> {
        if bytes.len() < HEADER_LEN {
            return Err(CompressError::Truncated);
        }
        let four_cc: [u8; 4] = bytes[..4].try_into().unwrap();
        let codec = Codec::from_four_cc(four_cc).ok_or(CompressError::UnrecognisedFourCc)?;
        let uncompressed_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        FrameHeader::new(codec, uncompressed_len)
    }

    /// Padding needed after `payload_len` compressed bytes to reach this
    /// codec's alignment, measured from the start of the header.
    pub fn padding_after(self, payload_len: usize) -> usize {
        let total = HEADER_LEN + payload_len;
        let align = self.codec.alignment();
        (align - total % align) % align
    }
}
