//! Theme root directories
//!
//! A plain theme is swept from its own directory. A child theme is swept from
//! the child directory first and the parent (template) directory second.

use crate::scanner::{FileCounts, Scanner};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Active theme location(s)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeDirs {
    /// Directory of the active (possibly child) theme
    stylesheet_dir: PathBuf,

    /// Parent theme directory when the active theme is a child theme
    template_dir: Option<PathBuf>,
}

impl ThemeDirs {
    /// A standalone theme
    pub fn new(stylesheet_dir: impl Into<PathBuf>) -> Self {
        Self {
            stylesheet_dir: stylesheet_dir.into(),
            template_dir: None,
        }
    }

    /// A child theme of `template_dir`. A template equal to the stylesheet
    /// directory is not a parent.
    pub fn with_template(mut self, template_dir: impl Into<PathBuf>) -> Self {
        let template_dir = template_dir.into();
        self.template_dir = (template_dir != self.stylesheet_dir).then_some(template_dir);
        self
    }

    pub fn stylesheet_dir(&self) -> &Path {
        &self.stylesheet_dir
    }

    pub fn template_dir(&self) -> Option<&Path> {
        self.template_dir.as_deref()
    }

    pub fn is_child(&self) -> bool {
        self.template_dir.is_some()
    }

    /// Root directory set to sweep, child first
    pub fn roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.stylesheet_dir.clone()];
        roots.extend(self.template_dir.iter().cloned());
        roots
    }
}

/// Dashboard summary of the active theme
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeReport {
    pub theme_dir: PathBuf,
    pub parent_dir: Option<PathBuf>,
    pub is_child: bool,
    pub roots: Vec<PathBuf>,
    pub files: FileCounts,
}

impl ThemeReport {
    pub fn build(dirs: &ThemeDirs, scanner: &Scanner) -> Self {
        let roots = dirs.roots();
        let files = scanner.counts_for(&roots);
        Self {
            theme_dir: dirs.stylesheet_dir().to_path_buf(),
            parent_dir: dirs.template_dir().map(Path::to_path_buf),
            is_child: dirs.is_child(),
            roots,
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn test_standalone_theme_roots() {
        let dirs = ThemeDirs::new("/themes/flat");
        assert!(!dirs.is_child());
        assert_eq!(dirs.stylesheet_dir(), Path::new("/themes/flat"));
        assert_eq!(dirs.template_dir(), None);
        assert_eq!(dirs.roots(), vec![PathBuf::from("/themes/flat")]);
    }

    #[test]
    fn test_child_theme_roots_child_first() {
        let dirs = ThemeDirs::new("/themes/child").with_template("/themes/parent");
        assert!(dirs.is_child());
        assert_eq!(
            dirs.roots(),
            vec![PathBuf::from("/themes/child"), PathBuf::from("/themes/parent")]
        );
    }

    #[test]
    fn test_template_equal_to_stylesheet_is_not_child() {
        let dirs = ThemeDirs::new("/themes/a").with_template("/themes/a");
        assert!(!dirs.is_child());
        assert_eq!(dirs.roots().len(), 1);
    }

    #[test]
    fn test_report_counts_both_themes() {
        let child = TempDir::new().unwrap();
        let parent = TempDir::new().unwrap();
        File::create(child.path().join("a.png")).unwrap();
        File::create(child.path().join("a.avif")).unwrap();
        fs::create_dir(parent.path().join("img")).unwrap();
        File::create(parent.path().join("img/b.jpg")).unwrap();

        let dirs = ThemeDirs::new(child.path()).with_template(parent.path());
        let report = ThemeReport::build(&dirs, &Scanner::new());

        assert!(report.is_child);
        assert_eq!(report.theme_dir, child.path());
        assert_eq!(report.parent_dir.as_deref(), Some(parent.path()));
        assert_eq!(report.files, FileCounts { converted: 1, total: 2 });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"]["converted"], 1);
        assert_eq!(json["files"]["total"], 2);
        assert_eq!(
            json["parentDir"].as_str(),
            Some(&*parent.path().to_string_lossy())
        );
    }
}
