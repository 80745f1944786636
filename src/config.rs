//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/heredoc-extract/heredoc-extract.toml`
//! 3. Local config: `<project_dir>/.heredoc-extract.toml`
//! 4. Environment variables: `HEREDOC_EXTRACT_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, DomainError, MetadataEndpoint, Service};

/// Base directory used when nothing else is configured, relative to the project directory.
pub const DEFAULT_BASE_DIR: &str = "multicloud/gcp";

/// Services processed when nothing else is configured, in processing order.
pub const DEFAULT_SERVICES: [&str; 4] = [
    "crm-backend",
    "crm-frontend",
    "crm-status",
    "inventory-service",
];

pub const DEFAULT_METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/attributes";
pub const DEFAULT_METADATA_HEADER: &str = "Metadata-Flavor: Google";

const ENV_PREFIX: &str = "HEREDOC_EXTRACT";
const LOCAL_CONFIG_FILE: &str = ".heredoc-extract.toml";

/// Metadata server the rewritten startup scripts fetch payloads from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetadataConfig {
    /// Attribute base URL; the attribute name is appended as last path segment
    pub url: String,
    /// Header sent with every metadata request
    pub header: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_METADATA_URL.into(),
            header: DEFAULT_METADATA_HEADER.into(),
        }
    }
}

/// Raw metadata config for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawMetadataConfig {
    pub url: Option<String>,
    pub header: Option<String>,
}

/// Raw settings for intermediate parsing (Option to detect "not specified").
///
/// Used during layered config merging to distinguish between:
/// - `None` → field not specified, inherit from base
/// - `Some([])` → explicit empty array
/// - `Some([...])` → explicit values to merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub base_dir: Option<PathBuf>,
    pub services: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: RawMetadataConfig,
}

/// Unified configuration for heredoc-extract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory holding one sub-directory per service
    pub base_dir: PathBuf,
    /// Service directory names, processed in this order
    pub services: Vec<String>,
    /// Metadata server settings
    pub metadata: MetadataConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            services: DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect(),
            metadata: MetadataConfig::default(),
        }
    }
}

/// Get the XDG config directory for heredoc-extract.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "heredoc-extract").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("heredoc-extract.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(LOCAL_CONFIG_FILE)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Merge service lists with union semantics and negation support.
    ///
    /// - Items from overlay are appended to base, keeping base order
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_services(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_services(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_services(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: Vec<String> = Vec::with_capacity(base.len() + overlay.len());
        for name in base {
            if !result.contains(name) {
                result.push(name.clone());
            }
        }

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.retain(|name| name != negated);
            } else if !result.contains(pattern) {
                result.push(pattern.clone());
            }
        }

        result
    }

    /// Validated service list.
    pub fn service_list(&self) -> Result<Vec<Service>, DomainError> {
        self.services.iter().map(|s| Service::new(s.as_str())).collect()
    }

    /// Metadata endpoint used for the generated fetch commands.
    pub fn metadata_endpoint(&self) -> MetadataEndpoint {
        MetadataEndpoint {
            url: self.metadata.url.clone(),
            header: self.metadata.header.clone(),
        }
    }

    /// Override `base_dir`, expanding `~` and variables as for config files.
    pub fn with_base_dir(mut self, base_dir: &Path) -> Self {
        self.base_dir = base_dir.to_path_buf();
        self.expand_paths();
        self
    }

    /// Resolve a relative `base_dir` against the project directory.
    pub fn with_project_dir(mut self, project_dir: &Path) -> Self {
        if self.base_dir.is_relative() {
            self.base_dir = project_dir.join(&self.base_dir);
        }
        self
    }

    /// Expand shell variables and tilde in path-like fields.
    ///
    /// Handles `~`, `$VAR`, and `${VAR}` syntax.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.base_dir.to_string_lossy().as_ref());
        self.base_dir = PathBuf::from(expanded);
    }

    /// Merge overlay config onto self (base) with union semantics for services.
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Services: union merge with negation support
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            base_dir: overlay
                .base_dir
                .clone()
                .unwrap_or_else(|| self.base_dir.clone()),
            services: overlay
                .services
                .as_ref()
                .map(|o| Self::merge_services(&self.services, o))
                .unwrap_or_else(|| self.services.clone()),
            metadata: self.metadata.overlay(&overlay.metadata),
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for services.
    ///
    /// Unlike `merge_with()` which uses union semantics, this method replaces
    /// the service list entirely if the global config specifies one.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            base_dir: global
                .base_dir
                .clone()
                .unwrap_or_else(|| self.base_dir.clone()),
            services: global
                .services
                .clone()
                .unwrap_or_else(|| self.services.clone()),
            metadata: self.metadata.overlay(&global.metadata),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional project directory for local config
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config (services REPLACE defaults)
    /// 3. Local config: `<project_dir>/.heredoc-extract.toml` (services UNION with global)
    /// 4. Environment variables: `HEREDOC_EXTRACT_*` prefix (REPLACES)
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;

        current.expand_paths();

        Ok(current)
    }

    /// Apply HEREDOC_EXTRACT_* environment variables as explicit overrides.
    ///
    /// Env vars replace values (not merge) - they are explicit user overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("services"),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("base_dir") {
            settings.base_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("services") {
            settings.services = val;
        }
        if let Ok(val) = config.get_string("metadata.url") {
            settings.metadata.url = val;
        }
        if let Ok(val) = config.get_string("metadata.header") {
            settings.metadata.header = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        format!(
            r#"# heredoc-extract configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/heredoc-extract/heredoc-extract.toml
#   Local:  <project_dir>/{local}
#   Env:    {prefix}_* environment variables (explicit overrides)
#
# Service list merge semantics:
#   Global config REPLACES the compiled defaults.
#   Local config UNIONS with global.
#   Use "!name" in local config to REMOVE an inherited service:
#     services = ["billing-service", "!crm-status"]

# Directory holding one sub-directory per service (relative to the project dir)
# base_dir = "{base_dir}"

# Services to process, in order
# services = [{services}]

[metadata]
# Attribute base URL; "/package_json" or "/app_js" is appended
# url = "{url}"

# Header required by the metadata server
# header = "{header}"
"#,
            local = LOCAL_CONFIG_FILE,
            prefix = ENV_PREFIX,
            base_dir = DEFAULT_BASE_DIR,
            services = DEFAULT_SERVICES
                .iter()
                .map(|s| format!("\"{s}\""))
                .collect::<Vec<_>>()
                .join(", "),
            url = DEFAULT_METADATA_URL,
            header = DEFAULT_METADATA_HEADER,
        )
    }
}

impl MetadataConfig {
    fn overlay(&self, raw: &RawMetadataConfig) -> Self {
        Self {
            url: raw.url.clone().unwrap_or_else(|| self.url.clone()),
            header: raw.header.clone().unwrap_or_else(|| self.header.clone()),
        }
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn given_defaults_then_matches_original_layout() {
        let settings = Settings::default();
        assert_eq!(settings.base_dir, PathBuf::from("multicloud/gcp"));
        assert_eq!(
            settings.services,
            names(&["crm-backend", "crm-frontend", "crm-status", "inventory-service"])
        );
        assert_eq!(settings.metadata.header, "Metadata-Flavor: Google");
    }

    #[test]
    fn given_tilde_in_base_dir_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            base_dir: PathBuf::from("~/services"),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let base = settings.base_dir.to_string_lossy();
        assert!(base.starts_with(&home), "base_dir should start with home: {base}");
        assert!(!base.contains('~'), "base_dir should not contain tilde: {base}");
    }

    #[test]
    fn given_tilde_override_when_with_base_dir_then_expands_to_home() {
        let settings = Settings::default().with_base_dir(Path::new("~/gcp"));

        let home = std::env::var("HOME").expect("HOME should be set");
        assert_eq!(settings.base_dir, Path::new(&home).join("gcp"));
    }

    #[test]
    fn given_relative_base_dir_when_with_project_dir_then_joined() {
        let settings = Settings::default().with_project_dir(Path::new("/work"));
        assert_eq!(settings.base_dir, PathBuf::from("/work/multicloud/gcp"));
    }

    #[test]
    fn given_absolute_base_dir_when_with_project_dir_then_unchanged() {
        let settings = Settings {
            base_dir: PathBuf::from("/srv/gcp"),
            ..Settings::default()
        }
        .with_project_dir(Path::new("/work"));
        assert_eq!(settings.base_dir, PathBuf::from("/srv/gcp"));
    }

    // ========================================
    // Tests for merge_services union semantics
    // ========================================

    #[test]
    fn test_merge_services_union_keeps_order() {
        let result = Settings::merge_services(&names(&["b", "a"]), &names(&["c"]));
        assert_eq!(result, names(&["b", "a", "c"]));
    }

    #[test]
    fn test_merge_services_negation() {
        let result = Settings::merge_services(&names(&["a", "b"]), &names(&["!a", "c"]));
        assert_eq!(result, names(&["b", "c"]));
    }

    #[test]
    fn test_merge_services_negation_nonexistent() {
        let result = Settings::merge_services(&names(&["a", "b"]), &names(&["!x"]));
        assert_eq!(result, names(&["a", "b"]));
    }

    #[test]
    fn test_merge_services_duplicates() {
        let result = Settings::merge_services(&names(&["a", "b"]), &names(&["a", "c", "c"]));
        assert_eq!(result, names(&["a", "b", "c"]));
    }

    #[test]
    fn test_merge_with_overrides_scalars_and_unions_services() {
        let base = Settings::default();
        let overlay = RawSettings {
            base_dir: Some(PathBuf::from("infra/gcp")),
            services: Some(names(&["!crm-status", "billing"])),
            metadata: RawMetadataConfig {
                url: None,
                header: Some("X-Test: 1".to_string()),
            },
        };

        let result = base.merge_with(&overlay);

        assert_eq!(result.base_dir, PathBuf::from("infra/gcp"));
        assert_eq!(
            result.services,
            names(&["crm-backend", "crm-frontend", "inventory-service", "billing"])
        );
        assert_eq!(result.metadata.url, DEFAULT_METADATA_URL);
        assert_eq!(result.metadata.header, "X-Test: 1");
    }

    #[test]
    fn test_apply_global_replaces_services() {
        let base = Settings::default();
        let global = RawSettings {
            base_dir: None,
            services: Some(names(&["only-one"])),
            metadata: RawMetadataConfig::default(),
        };

        let result = base.apply_global(&global);

        assert_eq!(result.services, names(&["only-one"]));
        assert_eq!(result.base_dir, PathBuf::from(DEFAULT_BASE_DIR));
    }

    #[test]
    fn given_invalid_service_name_when_listing_then_errors() {
        let settings = Settings {
            services: names(&["ok", "../escape"]),
            ..Settings::default()
        };
        assert!(settings.service_list().is_err());
    }

    #[test]
    fn given_settings_when_to_toml_then_roundtrips_through_raw() {
        let toml_text = Settings::default().to_toml().unwrap();
        let raw: RawSettings = toml::from_str(&toml_text).unwrap();
        assert_eq!(raw.services.unwrap().len(), 4);
        assert_eq!(raw.metadata.url.as_deref(), Some(DEFAULT_METADATA_URL));
    }

    #[test]
    fn given_template_when_parsed_then_is_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.base_dir.is_none());
        assert!(raw.services.is_none());
    }
}
