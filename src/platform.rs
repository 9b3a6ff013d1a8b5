//! Directory/file-type tags and separator normalisation for [`crate::value::FilePath`].
//!
//! General platform and path utilities and game-directory enumeration are
//! out of scope here; this module is the minimal slice actually embedded in
//! the `FilePath` wire format (the 3-bit directory tag and 5-bit file-type
//! tag) plus the separator-rewrite rule binary save/load needs, not a
//! general path-handling library.

/// The `scheme://` prefix a [`crate::value::FilePath`] was classified from.
/// 3 bits wide in the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectoryTag {
    Config = 0,
    Content = 1,
    Log = 2,
    Save = 3,
    Tools = 4,
    Video = 5,
}

impl DirectoryTag {
    pub fn from_bits(bits: u8) -> Option<DirectoryTag> {
        match bits {
            0 => Some(DirectoryTag::Config),
            1 => Some(DirectoryTag::Content),
            2 => Some(DirectoryTag::Log),
            3 => Some(DirectoryTag::Save),
            4 => Some(DirectoryTag::Tools),
            5 => Some(DirectoryTag::Video),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn scheme(self) -> &'static str {
        match self {
            DirectoryTag::Config => "config",
            DirectoryTag::Content => "content",
            DirectoryTag::Log => "log",
            DirectoryTag::Save => "save",
            DirectoryTag::Tools => "tools",
            DirectoryTag::Video => "video",
        }
    }

    /// The six recognised scheme prefixes, checked in this order.
    pub const SCHEMES: &'static [(&'static str, DirectoryTag)] = &[
        ("config://", DirectoryTag::Config),
        ("content://", DirectoryTag::Content),
        ("log://", DirectoryTag::Log),
        ("save://", DirectoryTag::Save),
        ("tools://", DirectoryTag::Tools),
        ("video://", DirectoryTag::Video),
    ];

    /// Classify a string as `(scheme, relative-path-with-extension)` if it
    /// begins with one of the six recognised prefixes.
    pub fn classify(s: &str) -> Option<(DirectoryTag, &str)> {
        for (prefix, tag) in Self::SCHEMES {
            if let Some(rest) = s.strip_prefix(prefix) {
                return Some((*tag, rest));
            }
        }
        None
    }
}

/// The file-type tag packed alongside the directory tag. 5 bits wide.
/// This is a small, closed enumeration of the extensions the engine's
/// cooker pipeline (see [`crate::cook`]) actually dispatches on — not a
/// general MIME registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FileTypeTag {
    Unknown = 0,
    Text = 1,
    Json = 2,
    Image = 3,
    Audio = 4,
    Binary = 5,
    Script = 6,
    Effect = 7,
    ScriptProject = 8,
    SoundProject = 9,
    UiMovie = 10,
}

impl FileTypeTag {
    pub fn from_bits(bits: u8) -> Option<FileTypeTag> {
        match bits {
            0 => Some(FileTypeTag::Unknown),
            1 => Some(FileTypeTag::Text),
            2 => Some(FileTypeTag::Json),
            3 => Some(FileTypeTag::Image),
            4 => Some(FileTypeTag::Audio),
            5 => Some(FileTypeTag::Binary),
            6 => Some(FileTypeTag::Script),
            7 => Some(FileTypeTag::Effect),
            8 => Some(FileTypeTag::ScriptProject),
            9 => Some(FileTypeTag::SoundProject),
            10 => Some(FileTypeTag::UiMovie),
            _ => None,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Canonical extension used when re-serialising a `FilePath` to a URL string.
    pub fn extension(self) -> &'static str {
        match self {
            FileTypeTag::Unknown => "",
            FileTypeTag::Text => "txt",
            FileTypeTag::Json => "json",
            FileTypeTag::Image => "png",
            FileTypeTag::Audio => "wav",
            FileTypeTag::Binary => "bin",
            FileTypeTag::Script => "lua",
            FileTypeTag::Effect => "fx",
            FileTypeTag::ScriptProject => "sproj",
            FileTypeTag::SoundProject => "sndproj",
            FileTypeTag::UiMovie => "ui",
        }
    }

    /// Classify a relative path's extension into a `FileTypeTag`, returning
    /// the stem (path without the recognised extension).
    pub fn classify(rest: &str) -> (FileTypeTag, &str) {
        for tag in [
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
        ] {
            let ext = tag.extension();
            let suffix = format!(".{ext}");
            if !ext.is_empty() {
                if let Some(stem) = rest.strip_suffix(&suffix) {
                    return (tag, stem);
                }
            }
        }
        (FileTypeTag::Unknown, rest)
    }

    /// The family of types whose cooked variants are invalidated together
    /// when any one of them changes on disk. Hard-coded as a fixed table
    /// rather than a schema property — see DESIGN.md.
    pub fn is_texture_family(self) -> bool {
        matches!(self, FileTypeTag::Image)
    }
}

/// Target platform for binary save — governs which directory separator
/// gets baked into the on-disk `FilePath` string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPlatform {
    Posix,
    Windows,
}

impl TargetPlatform {
    /// The platform this process is running on.
    pub fn current() -> TargetPlatform {
        if cfg!(windows) {
            TargetPlatform::Windows
        } else {
            TargetPlatform::Posix
        }
    }

    pub fn primary_separator(self) -> u8 {
        match self {
            TargetPlatform::Posix => b'/',
            TargetPlatform::Windows => b'\\',
        }
    }

    pub fn alternate_separator(self) -> u8 {
        match self {
            TargetPlatform::Posix => b'\\',
            TargetPlatform::Windows => b'/',
        }
    }
}

/// Rewrite every occurrence of `from` to `to` in a NUL-free byte buffer.
/// Used by binary save (rewrite current separators to the target platform's)
/// and binary load (normalise on-disk separators to the current platform's).
pub fn rewrite_separator(bytes: &mut [u8], from: u8, to: u8) {
    if from == to {
        return;
    }
    for b in bytes.iter_mut() {
        if *b == from {
            *b = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_scheme_and_extension() {
        let (dir, rest) = DirectoryTag::classify("content://ui/main.png").unwrap();
        assert_eq!(dir, DirectoryTag::Content);
        let (ft, stem) = FileTypeTag::classify(rest);
        assert_eq!(ft, FileTypeTag::Image);
        assert_eq!(stem, "ui/main");
    }

    #[test]
    fn unrecognised_scheme_is_not_a_filepath() {
        assert!(DirectoryTag::classify("https://example.com").is_none());
    }

    #[test]
    fn separator_rewrite() {
        let mut buf = b"a/b/c".to_vec();
        rewrite_separator(&mut buf, b'/', b'\\');
        assert_eq!(&buf, b"a\\b\\c");
    }
}
