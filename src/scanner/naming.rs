//! Output path derivation
//!
//! The output for `photo.jpg` is its sibling `photo.avif`. The derivation is a
//! plain string trim on the file name, never a parse of the file contents.
//!
//! Existing installations decide "already converted" purely from the derived
//! name, so the trim rule must not change under them. `SuffixLength` is the
//! documented rule. `CharacterSet` reproduces the legacy plugin, which trimmed
//! every trailing character that appears in `"." + ext` and therefore
//! mis-names short base names (`bg.jpeg` becomes `b.avif`, `jpg.jpg` becomes
//! `.avif`).

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Default target format extension
pub const DEFAULT_TARGET_EXTENSION: &str = "avif";

/// How the source extension is removed from a file name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimRule {
    /// Remove exactly `"." + ext` from the end of the name
    #[default]
    SuffixLength,
    /// Remove every trailing character found in `"." + ext` (legacy naming)
    CharacterSet,
}

impl TrimRule {
    /// Trim the source extension from a bare file name
    pub fn trim<'a>(&self, file_name: &'a str, extension: &str) -> &'a str {
        &file_name[..self.kept_len(file_name.as_bytes(), extension)]
    }

    /// Trim the source extension from a file name in any platform encoding
    pub fn trim_os<'a>(&self, file_name: &'a OsStr, extension: &str) -> Option<&'a OsStr> {
        let kept = self.kept_len(file_name.as_encoded_bytes(), extension);
        encoded_prefix(file_name, kept)
    }

    /// Length of the name that survives the trim. Only ASCII bytes are ever
    /// removed, so the cut always falls on a character boundary.
    fn kept_len(&self, name: &[u8], extension: &str) -> usize {
        match self {
            TrimRule::SuffixLength => {
                let ext = extension.as_bytes();
                let suffix_len = ext.len() + 1;
                let has_suffix = name.len() >= suffix_len
                    && name.ends_with(ext)
                    && name[name.len() - suffix_len] == b'.';
                if has_suffix {
                    name.len() - suffix_len
                } else {
                    name.len()
                }
            }
            TrimRule::CharacterSet => {
                let in_set =
                    |b: u8| b.is_ascii() && (b == b'.' || extension.as_bytes().contains(&b));
                name.len() - name.iter().rev().take_while(|b| in_set(**b)).count()
            }
        }
    }
}

#[cfg(unix)]
fn encoded_prefix(name: &OsStr, len: usize) -> Option<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Some(OsStr::from_bytes(&name.as_bytes()[..len]))
}

#[cfg(not(unix))]
fn encoded_prefix(name: &OsStr, len: usize) -> Option<&OsStr> {
    name.to_str().map(|s| OsStr::new(&s[..len]))
}

/// Maps a source image path to the path of its converted sibling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    target_extension: String,
    trim_rule: TrimRule,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            target_extension: DEFAULT_TARGET_EXTENSION.to_string(),
            trim_rule: TrimRule::default(),
        }
    }
}

impl OutputNaming {
    pub fn new(target_extension: impl Into<String>, trim_rule: TrimRule) -> Self {
        Self {
            target_extension: target_extension.into(),
            trim_rule,
        }
    }

    pub fn target_extension(&self) -> &str {
        &self.target_extension
    }

    pub fn trim_rule(&self) -> TrimRule {
        self.trim_rule
    }

    /// Derive the output path for `source`, using its own trailing extension.
    ///
    /// Returns `None` when the path has no file name or its extension is not
    /// valid UTF-8 (such an extension never matches the allow-list).
    pub fn output_for(&self, source: &Path) -> Option<PathBuf> {
        let extension = source.extension()?.to_str()?;
        self.output_with_extension(source, extension)
    }

    /// Derive the output path for `source` given the extension it was matched
    /// by. The rest of the file name may be in any encoding.
    pub fn output_with_extension(&self, source: &Path, extension: &str) -> Option<PathBuf> {
        let file_name = source.file_name()?;
        let mut output_name = self.trim_rule.trim_os(file_name, extension)?.to_os_string();
        output_name.push(".");
        output_name.push(&self.target_extension);
        Some(source.with_file_name(output_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_length_basic() {
        let naming = OutputNaming::default();
        assert_eq!(
            naming.output_for(Path::new("/theme/img/photo.jpg")),
            Some(PathBuf::from("/theme/img/photo.avif"))
        );
        assert_eq!(
            naming.output_for(Path::new("/theme/hero.jpeg")),
            Some(PathBuf::from("/theme/hero.avif"))
        );
    }

    #[test]
    fn test_suffix_length_repeated_extension() {
        // Only one extension-length suffix is removed
        let naming = OutputNaming::default();
        assert_eq!(
            naming.output_for(Path::new("/theme/jpg.jpg")),
            Some(PathBuf::from("/theme/jpg.avif"))
        );
        assert_eq!(
            naming.output_for(Path::new("/theme/archive.png.png")),
            Some(PathBuf::from("/theme/archive.png.avif"))
        );
    }

    #[test]
    fn test_suffix_length_keeps_inner_dots() {
        let naming = OutputNaming::default();
        assert_eq!(
            naming.output_for(Path::new("/theme/logo.min.webp")),
            Some(PathBuf::from("/theme/logo.min.avif"))
        );
    }

    #[test]
    fn test_character_set_legacy_trim() {
        let naming = OutputNaming::new("avif", TrimRule::CharacterSet);
        assert_eq!(
            naming.output_for(Path::new("/theme/photo.jpg")),
            Some(PathBuf::from("/theme/photo.avif"))
        );
        assert_eq!(
            naming.output_for(Path::new("/theme/bg.jpeg")),
            Some(PathBuf::from("/theme/b.avif"))
        );
        assert_eq!(
            naming.output_for(Path::new("/theme/jpg.jpg")),
            Some(PathBuf::from("/theme/.avif"))
        );
        assert_eq!(
            naming.output_for(Path::new("/theme/sprite.png")),
            Some(PathBuf::from("/theme/sprite.avif"))
        );
    }

    #[test]
    fn test_trim_without_matching_suffix() {
        assert_eq!(TrimRule::SuffixLength.trim("readme", "jpg"), "readme");
        assert_eq!(TrimRule::SuffixLength.trim("xjpg", "jpg"), "xjpg");
    }

    #[test]
    fn test_custom_target_extension() {
        let naming = OutputNaming::new("webp", TrimRule::SuffixLength);
        assert_eq!(
            naming.output_for(Path::new("a/b.png")),
            Some(PathBuf::from("a/b.webp"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_keeps_its_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let source = Path::new("/theme").join(OsStr::from_bytes(b"caf\xe9.jpg"));
        let expected = Path::new("/theme").join(OsStr::from_bytes(b"caf\xe9.avif"));
        assert_eq!(OutputNaming::default().output_for(&source), Some(expected));

        let legacy = OutputNaming::new("avif", TrimRule::CharacterSet);
        let source = Path::new("/theme").join(OsStr::from_bytes(b"\xe9tag.jpeg"));
        let expected = Path::new("/theme").join(OsStr::from_bytes(b"\xe9ta.avif"));
        assert_eq!(legacy.output_for(&source), Some(expected));
    }

    #[test]
    fn test_no_extension_yields_none() {
        let naming = OutputNaming::default();
        assert_eq!(naming.output_for(Path::new("/theme/Makefile")), None);
    }
}
