//! Settings
//!
//! Loaded from a TOML file (every field optional), then overridden from the
//! environment. `.env` files are read by `logging::init` before this runs.
//!
//! ```toml
//! [theme]
//! stylesheet_dir = "/srv/site/wp-content/themes/child"
//! template_dir = "/srv/site/wp-content/themes/parent"
//!
//! [conversion]
//! engine = "cloud"
//! quality = 70
//!
//! [cloud]
//! endpoint = "https://convert.example.com/v1/avif"
//! site_root = "/srv/site"
//! site_url = "https://example.com/"
//! ```

use crate::converter::{Engine, HttpCloudConverter, QUALITY_RANGE, SPEED_RANGE};
use crate::error::ConfigError;
use crate::scanner::{OutputNaming, Scanner, TrimRule, DEFAULT_EXTENSIONS, DEFAULT_TARGET_EXTENSION};
use crate::services::{CredentialManager, DeleteMode, FsDeleter, SiteUrlResolver, TimeBudgetGuard};
use crate::sweep::{SweepController, SweepLock, Sweeper, DEFAULT_BATCH_CAP, DEFAULT_PER_CALL_LIMIT};
use crate::theme::ThemeDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `conversion.engine`
pub const ENGINE_ENV: &str = "AVIF_SWEEP_ENGINE";
/// Environment variable overriding `conversion.quality`
pub const QUALITY_ENV: &str = "AVIF_SWEEP_QUALITY";
/// Environment variable overriding `conversion.speed`
pub const SPEED_ENV: &str = "AVIF_SWEEP_SPEED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: ThemeSettings,
    pub scan: ScanSettings,
    pub conversion: ConversionSettings,
    pub cloud: CloudSettings,
    pub execution: ExecutionSettings,
    pub delete: DeleteSettings,
    pub sweep: SweepSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    /// Active theme directory
    pub stylesheet_dir: Option<PathBuf>,
    /// Parent theme directory, for child themes
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    pub extensions: Vec<String>,
    pub target_extension: String,
    pub trim_rule: TrimRule,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            target_extension: DEFAULT_TARGET_EXTENSION.to_string(),
            trim_rule: TrimRule::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub engine: Engine,
    pub quality: u8,
    pub speed: u8,
    pub per_call_limit: usize,
    pub batch_cap: usize,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            engine: Engine::Local,
            quality: 80,
            speed: 6,
            per_call_limit: DEFAULT_PER_CALL_LIMIT,
            batch_cap: DEFAULT_BATCH_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    pub endpoint: Option<String>,
    /// Filesystem directory served at `site_url`
    pub site_root: Option<PathBuf>,
    pub site_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            site_root: None,
            site_url: None,
            timeout_secs: crate::converter::cloud::DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// False on hosts that pin the execution time limit
    pub allow_time_extension: bool,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            allow_time_extension: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteSettings {
    pub mode: DeleteMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Refuse to start while another sweep over the same roots runs
    pub exclusive: bool,
    pub lock_dir: Option<PathBuf>,
    /// Upper bound for `convert --until-done`
    pub max_rounds: usize,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            exclusive: false,
            lock_dir: None,
            max_rounds: 1000,
        }
    }
}

impl Settings {
    /// `<config dir>/avif-sweep/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("avif-sweep").join("config.toml"))
    }

    /// Load settings from `path`, or the default location when it exists,
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    tracing::debug!("[Config] No config file, using defaults");
                    Self::default()
                }
            },
        };

        settings.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Parse a TOML settings file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "[Config] Loaded settings");
        Ok(settings)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(engine) = lookup(ENGINE_ENV) {
            self.conversion.engine = engine
                .parse()
                .map_err(|e: String| ConfigError::invalid("conversion.engine", e))?;
        }
        if let Some(quality) = lookup(QUALITY_ENV) {
            self.conversion.quality = parse_u8("conversion.quality", &quality)?;
        }
        if let Some(speed) = lookup(SPEED_ENV) {
            self.conversion.speed = parse_u8("conversion.speed", &speed)?;
        }
        Ok(())
    }

    /// Check ranges and the settings the selected engine needs
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.theme.stylesheet_dir.is_none() {
            return Err(ConfigError::invalid(
                "theme.stylesheet_dir",
                "no theme directory configured",
            ));
        }
        if !QUALITY_RANGE.contains(&self.conversion.quality) {
            return Err(ConfigError::invalid(
                "conversion.quality",
                format!("{} is outside {:?}", self.conversion.quality, QUALITY_RANGE),
            ));
        }
        if !SPEED_RANGE.contains(&self.conversion.speed) {
            return Err(ConfigError::invalid(
                "conversion.speed",
                format!("{} is outside {:?}", self.conversion.speed, SPEED_RANGE),
            ));
        }
        if self.conversion.per_call_limit == 0 {
            return Err(ConfigError::invalid("conversion.per_call_limit", "must be at least 1"));
        }
        if self.conversion.batch_cap == 0 {
            return Err(ConfigError::invalid("conversion.batch_cap", "must be at least 1"));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::invalid("scan.extensions", "at least one extension is required"));
        }
        if let Some(bad) = self
            .scan
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.contains('.') || **ext == self.scan.target_extension)
        {
            return Err(ConfigError::invalid(
                "scan.extensions",
                format!("'{}' is not a usable source extension", bad),
            ));
        }

        if self.conversion.engine == Engine::Cloud {
            if self.cloud.endpoint.is_none() {
                return Err(ConfigError::invalid("cloud.endpoint", "required for the cloud engine"));
            }
            if self.cloud.site_root.is_none() {
                return Err(ConfigError::invalid("cloud.site_root", "required for the cloud engine"));
            }
            if self.cloud.site_url.is_none() {
                return Err(ConfigError::invalid("cloud.site_url", "required for the cloud engine"));
            }
        }
        Ok(())
    }

    pub fn theme_dirs(&self) -> Result<ThemeDirs, ConfigError> {
        let stylesheet = self.theme.stylesheet_dir.clone().ok_or_else(|| {
            ConfigError::invalid("theme.stylesheet_dir", "no theme directory configured")
        })?;
        let dirs = ThemeDirs::new(stylesheet);
        Ok(match &self.theme.template_dir {
            Some(template) => dirs.with_template(template),
            None => dirs,
        })
    }

    pub fn scanner(&self) -> Scanner {
        Scanner::new()
            .with_extensions(self.scan.extensions.iter().cloned())
            .with_naming(OutputNaming::new(
                self.scan.target_extension.clone(),
                self.scan.trim_rule,
            ))
    }

    /// Batch limits and naming for a single sweep
    pub fn controller(&self) -> SweepController {
        SweepController::new()
            .with_naming(self.scanner().naming().clone())
            .with_per_call_limit(self.conversion.per_call_limit)
            .with_batch_cap(self.conversion.batch_cap)
    }

    /// Wire a sweep pipeline from these settings
    pub fn sweeper(&self) -> Result<Sweeper, ConfigError> {
        self.validate()?;

        let controller = self.controller();

        let mut sweeper = Sweeper::new(self.theme_dirs()?.roots())
            .with_scanner(self.scanner())
            .with_controller(controller)
            .with_engine(self.conversion.engine)
            .with_encoding(self.conversion.quality, self.conversion.speed)
            .with_guard(TimeBudgetGuard::new(self.execution.allow_time_extension))
            .with_deleter(FsDeleter::new(self.delete.mode));

        if self.conversion.engine == Engine::Cloud {
            let (Some(endpoint), Some(site_root), Some(site_url)) = (
                &self.cloud.endpoint,
                &self.cloud.site_root,
                &self.cloud.site_url,
            ) else {
                return Err(ConfigError::invalid("cloud", "incomplete cloud settings"));
            };

            let resolver = SiteUrlResolver::parse(site_root.clone(), site_url)
                .map_err(|e| ConfigError::invalid("cloud.site_url", e))?;
            let client = HttpCloudConverter::new(
                endpoint.clone(),
                CredentialManager::cloud_api_key(),
                Duration::from_secs(self.cloud.timeout_secs),
            )
            .map_err(|e| ConfigError::invalid("cloud.endpoint", e.to_string()))?
            .with_encoding(self.conversion.quality, self.conversion.speed);

            sweeper = sweeper.with_cloud(resolver, client);
        }

        if self.sweep.exclusive {
            let lock_dir = self.sweep.lock_dir.clone().unwrap_or_else(SweepLock::default_dir);
            sweeper = sweeper.with_lock(SweepLock::new(lock_dir));
        }

        Ok(sweeper)
    }
}

fn parse_u8(field: &'static str, value: &str) -> Result<u8, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::invalid(field, format!("'{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn with_theme() -> Settings {
        let mut settings = Settings::default();
        settings.theme.stylesheet_dir = Some(PathBuf::from("/themes/child"));
        settings
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.conversion.engine, Engine::Local);
        assert_eq!(settings.conversion.per_call_limit, 5);
        assert_eq!(settings.conversion.batch_cap, 20);
        assert_eq!(settings.scan.extensions, vec!["png", "jpg", "webp", "jpeg"]);
        assert!(settings.execution.allow_time_extension);
        assert!(!settings.sweep.exclusive);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[theme]
stylesheet_dir = "/themes/child"
template_dir = "/themes/parent"

[conversion]
quality = 65

[scan]
trim_rule = "character_set"

[delete]
mode = "trash"
"#,
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();

        assert_eq!(settings.conversion.quality, 65);
        assert_eq!(settings.conversion.speed, 6);
        assert_eq!(settings.scan.trim_rule, TrimRule::CharacterSet);
        assert_eq!(settings.delete.mode, DeleteMode::Trash);

        let scanner = settings.scanner();
        assert_eq!(scanner.naming().trim_rule(), TrimRule::CharacterSet);
        assert_eq!(scanner.naming().target_extension(), "avif");

        let controller = settings.controller();
        assert_eq!(controller.per_call_limit(), 5);
        assert_eq!(controller.batch_cap(), 20);
        assert_eq!(
            settings.theme_dirs().unwrap().roots(),
            vec![PathBuf::from("/themes/child"), PathBuf::from("/themes/parent")]
        );
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Settings::load(Some(Path::new("/no/such/avif-sweep.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[conversion]\nquality = \"high\"\n").unwrap();

        assert!(matches!(Settings::from_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [(ENGINE_ENV, "cloud"), (QUALITY_ENV, "50"), (SPEED_ENV, " 9 ")].into();
        let mut settings = Settings::default();

        settings
            .apply_env_from(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.conversion.engine, Engine::Cloud);
        assert_eq!(settings.conversion.quality, 50);
        assert_eq!(settings.conversion.speed, 9);
    }

    #[test]
    fn test_bad_env_override() {
        let mut settings = Settings::default();
        let result = settings.apply_env_from(|key| (key == QUALITY_ENV).then(|| "lots".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "conversion.quality", .. })
        ));
    }

    #[test]
    fn test_validate_ranges() {
        let mut settings = with_theme();
        assert!(settings.validate().is_ok());

        settings.conversion.quality = 101;
        assert!(settings.validate().is_err());

        settings.conversion.quality = 80;
        settings.conversion.speed = 11;
        assert!(settings.validate().is_err());

        settings.conversion.speed = 0;
        settings.conversion.per_call_limit = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_requires_theme() {
        assert!(matches!(
            Settings::default().validate(),
            Err(ConfigError::Invalid { field: "theme.stylesheet_dir", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_target_as_source() {
        let mut settings = with_theme();
        settings.scan.extensions.push("avif".to_string());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cloud_engine_requires_endpoint_and_site() {
        let mut settings = with_theme();
        settings.conversion.engine = Engine::Cloud;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "cloud.endpoint", .. })
        ));

        settings.cloud.endpoint = Some("https://convert.test/avif".to_string());
        settings.cloud.site_root = Some(PathBuf::from("/srv/site"));
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "cloud.site_url", .. })
        ));

        settings.cloud.site_url = Some("https://example.com/".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_sweeper_from_settings() {
        let theme = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.theme.stylesheet_dir = Some(theme.path().to_path_buf());
        settings.sweep.exclusive = true;
        settings.sweep.lock_dir = Some(theme.path().join(".locks"));

        let sweeper = settings.sweeper().unwrap();

        assert_eq!(sweeper.roots(), &[theme.path().to_path_buf()]);
        assert_eq!(sweeper.engine(), Engine::Local);
        assert_eq!(sweeper.sweep().unwrap(), crate::sweep::SweepOutcome::NoOp);
    }
}
