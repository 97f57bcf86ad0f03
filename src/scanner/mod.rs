//! Image Scanner
//!
//! Walks a root directory set and classifies each matching image as converted
//! or unconverted, depending on whether its derived output file exists.
//!
//! Nothing is cached: every call re-walks the tree and probes the filesystem,
//! so the result always reflects what is on disk right now.

pub mod naming;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::{DirEntry, WalkDir};

pub use naming::{OutputNaming, TrimRule, DEFAULT_TARGET_EXTENSION};

/// Image extensions searched by default, in discovery order
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "webp", "jpeg"];

/// Which candidates `find` keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionFilter {
    /// Every matching image
    #[default]
    All,
    /// Images whose output file does not exist yet
    Unconverted,
    /// Images whose output file already exists
    Converted,
}

impl ConversionFilter {
    fn keeps(&self, output_exists: bool) -> bool {
        match self {
            ConversionFilter::All => true,
            ConversionFilter::Unconverted => !output_exists,
            ConversionFilter::Converted => output_exists,
        }
    }
}

/// A matched image and the output path derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub extension: String,
    pub output: PathBuf,
}

impl CandidateFile {
    /// Probe the filesystem for the output file
    pub fn is_converted(&self) -> bool {
        self.output.exists()
    }
}

/// Converted/total counts for dashboard display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCounts {
    pub converted: usize,
    pub total: usize,
}

/// Recursive image finder
#[derive(Debug, Clone)]
pub struct Scanner {
    /// Extensions to match, in the order their groups are reported per directory
    extensions: Vec<String>,

    /// Source path -> output path mapping
    naming: OutputNaming,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            naming: OutputNaming::default(),
        }
    }
}

impl Scanner {
    /// Create a scanner with the default extensions and naming
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the extension allow-list
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the output naming
    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn naming(&self) -> &OutputNaming {
        &self.naming
    }

    /// Find matching images under `roots`, keeping those selected by `filter`.
    ///
    /// Roots are reported first to last. Within each directory, matching files
    /// come first, grouped by extension in allow-list order and sorted by name,
    /// followed by each subdirectory (sorted by name) walked depth-first.
    /// Missing or unreadable directories contribute nothing.
    pub fn find(&self, roots: &[PathBuf], filter: ConversionFilter) -> Vec<PathBuf> {
        self.candidates(roots)
            .into_iter()
            .filter(|candidate| filter.keeps(candidate.is_converted()))
            .map(|candidate| candidate.path)
            .collect()
    }

    /// Count converted and total images under `roots`
    pub fn counts_for(&self, roots: &[PathBuf]) -> FileCounts {
        FileCounts {
            converted: self.find(roots, ConversionFilter::Converted).len(),
            total: self.find(roots, ConversionFilter::All).len(),
        }
    }

    /// Every matching image under `roots` with its derived output path
    pub fn candidates(&self, roots: &[PathBuf]) -> Vec<CandidateFile> {
        let start = Instant::now();
        let mut found = Vec::new();

        for root in roots {
            self.walk_root(root, &mut found);
        }

        tracing::debug!(
            roots = roots.len(),
            matches = found.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "[Scanner] Scan finished"
        );

        found
    }

    fn walk_root(&self, root: &Path, found: &mut Vec<CandidateFile>) {
        let order = self.extensions.clone();

        // Symlinked directories are followed; walkdir reports loops as errors
        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(true)
            .sort_by(move |a, b| discovery_order(&order, a, b))
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry));

        for entry_result in walker {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("[Scanner] Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(extension) = self.matched_extension(entry.path()) else {
                continue;
            };

            match self.naming.output_with_extension(entry.path(), extension) {
                Some(output) => found.push(CandidateFile {
                    path: entry.path().to_path_buf(),
                    extension: extension.to_string(),
                    output,
                }),
                None => {
                    tracing::debug!(
                        path = %entry.path().display(),
                        "[Scanner] Cannot derive output path, skipping"
                    );
                }
            }
        }
    }

    /// The allow-list extension `path` ends with, if any (case-sensitive)
    fn matched_extension(&self, path: &Path) -> Option<&str> {
        let extension = path.extension()?.to_str()?;
        self.extensions
            .iter()
            .find(|allowed| allowed.as_str() == extension)
            .map(String::as_str)
    }
}

/// Shell-glob semantics: names starting with a dot are never matched or entered
fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Files before directories; files grouped by extension rank; then by name
fn discovery_order(extensions: &[String], a: &DirEntry, b: &DirEntry) -> Ordering {
    let key = |entry: &DirEntry| {
        let is_dir = entry.file_type().is_dir();
        let rank = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| extensions.iter().position(|allowed| allowed == ext))
            .unwrap_or(usize::MAX);
        (is_dir, if is_dir { 0 } else { rank })
    };

    key(a)
        .cmp(&key(b))
        .then_with(|| a.file_name().cmp(b.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(&path).unwrap();
        path
    }

    fn create_theme() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        touch(root, "screenshot.png");
        touch(root, "style.css");
        touch(root, "assets/logo.png");
        touch(root, "assets/logo.avif");
        touch(root, "assets/hero.jpg");
        touch(root, "assets/banner.webp");
        touch(root, "assets/icons/arrow.jpeg");
        touch(root, "assets/icons/arrow.avif");
        touch(root, "assets/icons/close.png");
        touch(root, ".git/objects/cache.png");
        touch(root, "assets/.hidden.png");

        dir
    }

    fn as_set(paths: &[PathBuf]) -> HashSet<PathBuf> {
        paths.iter().cloned().collect()
    }

    #[test]
    fn test_find_all_recurses() {
        let theme = create_theme();
        let root = theme.path().to_path_buf();

        let found = Scanner::new().find(&[root.clone()], ConversionFilter::All);

        assert_eq!(found.len(), 6);
        assert!(found.contains(&root.join("assets/icons/arrow.jpeg")));
        assert!(!found.contains(&root.join("style.css")));
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let theme = create_theme();
        let root = theme.path().to_path_buf();

        let found = Scanner::new().find(&[root.clone()], ConversionFilter::All);

        assert!(!found.contains(&root.join(".git/objects/cache.png")));
        assert!(!found.contains(&root.join("assets/.hidden.png")));
    }

    #[test]
    fn test_filters_partition_all() {
        let theme = create_theme();
        let roots = vec![theme.path().to_path_buf()];
        let scanner = Scanner::new();

        let all = scanner.find(&roots, ConversionFilter::All);
        let unconverted = scanner.find(&roots, ConversionFilter::Unconverted);
        let converted = scanner.find(&roots, ConversionFilter::Converted);

        assert!(as_set(&unconverted).is_disjoint(&as_set(&converted)));
        let union: HashSet<_> = as_set(&unconverted).union(&as_set(&converted)).cloned().collect();
        assert_eq!(union, as_set(&all));

        assert_eq!(converted.len(), 2);
        assert_eq!(unconverted.len(), 4);
    }

    #[test]
    fn test_discovery_order() {
        let theme = create_theme();
        let root = theme.path().to_path_buf();

        let found = Scanner::new().find(&[root.clone()], ConversionFilter::All);

        let expected: Vec<PathBuf> = [
            "screenshot.png",
            "assets/logo.png",
            "assets/hero.jpg",
            "assets/banner.webp",
            "assets/icons/close.png",
            "assets/icons/arrow.jpeg",
        ]
        .iter()
        .map(|rel| root.join(rel))
        .collect();

        assert_eq!(found, expected);
    }

    #[test]
    fn test_roots_reported_in_order() {
        let child = TempDir::new().unwrap();
        let parent = TempDir::new().unwrap();
        let a = touch(child.path(), "a.png");
        let b = touch(parent.path(), "b.png");

        let roots = vec![child.path().to_path_buf(), parent.path().to_path_buf()];
        let found = Scanner::new().find(&roots, ConversionFilter::All);

        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn test_missing_root_contributes_nothing() {
        let theme = create_theme();
        let roots = vec![
            PathBuf::from("/definitely/not/a/theme"),
            theme.path().to_path_buf(),
        ];

        let found = Scanner::new().find(&roots, ConversionFilter::All);

        assert_eq!(found.len(), 6);
    }

    #[test]
    fn test_extension_match_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "upper.JPG");
        let lower = touch(dir.path(), "lower.jpg");

        let found = Scanner::new().find(&[dir.path().to_path_buf()], ConversionFilter::All);

        assert_eq!(found, vec![lower]);
    }

    #[test]
    fn test_custom_extensions() {
        let theme = create_theme();
        let scanner = Scanner::new().with_extensions(["jpeg"]);

        let found = scanner.find(&[theme.path().to_path_buf()], ConversionFilter::All);

        assert_eq!(found, vec![theme.path().join("assets/icons/arrow.jpeg")]);
    }

    #[test]
    fn test_directory_named_like_image_is_not_matched() {
        let dir = TempDir::new().unwrap();
        let nested = touch(dir.path(), "gallery.png/inner.png");

        let found = Scanner::new().find(&[dir.path().to_path_buf()], ConversionFilter::All);

        assert_eq!(found, vec![nested]);
    }

    #[test]
    fn test_counts_for() {
        let theme = create_theme();
        let counts = Scanner::new().counts_for(&[theme.path().to_path_buf()]);

        assert_eq!(counts, FileCounts { converted: 2, total: 6 });
    }

    #[test]
    fn test_legacy_naming_changes_classification() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "bg.jpeg");
        touch(dir.path(), "b.avif");

        let roots = vec![dir.path().to_path_buf()];
        let modern = Scanner::new();
        let legacy = Scanner::new().with_naming(OutputNaming::new("avif", TrimRule::CharacterSet));

        assert_eq!(modern.find(&roots, ConversionFilter::Converted).len(), 0);
        assert_eq!(legacy.find(&roots, ConversionFilter::Converted).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_terminates() {
        let dir = TempDir::new().unwrap();
        let image = touch(dir.path(), "sub/pic.png");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/loop")).unwrap();

        let found = Scanner::new().find(&[dir.path().to_path_buf()], ConversionFilter::All);

        assert_eq!(found, vec![image]);
    }

    #[test]
    fn test_candidates_carry_matched_extension_and_output() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.webp");
        touch(dir.path(), "b.jpeg");

        let candidates = Scanner::new().candidates(&[dir.path().to_path_buf()]);

        let summary: Vec<(&str, PathBuf)> = candidates
            .iter()
            .map(|c| (c.extension.as_str(), c.output.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("webp", dir.path().join("a.avif")),
                ("jpeg", dir.path().join("b.avif")),
            ]
        );
        assert_eq!(Scanner::new().extensions(), DEFAULT_EXTENSIONS);
    }

    // Other unixes may refuse non UTF-8 file names at the filesystem level
    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_found_and_classified() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let latin1 = dir.path().join(OsStr::from_bytes(b"caf\xe9.jpg"));
        File::create(&latin1).unwrap();
        touch(dir.path(), "ok.jpg");
        let roots = vec![dir.path().to_path_buf()];

        let scanner = Scanner::new();
        assert_eq!(scanner.find(&roots, ConversionFilter::All).len(), 2);
        assert_eq!(
            scanner.find(&roots, ConversionFilter::Unconverted),
            vec![latin1.clone(), dir.path().join("ok.jpg")]
        );

        File::create(dir.path().join(OsStr::from_bytes(b"caf\xe9.avif"))).unwrap();
        assert_eq!(scanner.find(&roots, ConversionFilter::Converted), vec![latin1]);
        assert_eq!(scanner.counts_for(&roots), FileCounts { converted: 1, total: 2 });
    }
}
