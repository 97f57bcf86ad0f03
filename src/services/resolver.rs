//! Local path to public URL mapping for the cloud engine

use crate::converter::PathToUrlResolver;
use reqwest::Url;
use std::path::{Component, Path, PathBuf};

/// Serves everything under `site_root` at `site_url`.
///
/// `/srv/site/wp-content/themes/t/logo.png` with root `/srv/site` and URL
/// `https://example.com/` resolves to
/// `https://example.com/wp-content/themes/t/logo.png`.
#[derive(Debug, Clone)]
pub struct SiteUrlResolver {
    site_root: PathBuf,
    site_url: Url,
}

impl SiteUrlResolver {
    pub fn new(site_root: impl Into<PathBuf>, site_url: Url) -> Self {
        Self {
            site_root: site_root.into(),
            site_url,
        }
    }

    /// Parse `site_url` and build a resolver
    pub fn parse(site_root: impl Into<PathBuf>, site_url: &str) -> Result<Self, String> {
        let url = Url::parse(site_url).map_err(|e| format!("invalid site URL '{}': {}", site_url, e))?;
        if url.cannot_be_a_base() {
            return Err(format!("site URL '{}' cannot be used as a base", site_url));
        }
        Ok(Self::new(site_root, url))
    }
}

impl PathToUrlResolver for SiteUrlResolver {
    fn resolve(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.site_root).ok()?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?),
                Component::CurDir => {}
                // `..` or absolute pieces would escape the site root
                _ => return None,
            }
        }
        if segments.is_empty() {
            return None;
        }

        let mut url = self.site_url.clone();
        {
            let mut path_segments = url.path_segments_mut().ok()?;
            path_segments.pop_if_empty();
            path_segments.extend(segments);
        }
        Some(url.to_string())
    }
}
