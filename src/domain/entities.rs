//! Domain entities: core data structures

use std::fmt;
use std::path::{Path, PathBuf};

use crate::domain::{DomainError, PayloadKind};

/// Name of the startup script inside every service directory.
pub const STARTUP_SCRIPT: &str = "startup.sh";

/// A service directory below the base directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Service(String);

impl Service {
    /// Validate a service name.
    ///
    /// The name is used as a single path component, so it must be non-empty,
    /// must not be `.` or `..`, and must not contain a path separator.
    /// Leading or trailing whitespace is rejected, not stripped.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty()
            || name.trim() != name
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(DomainError::InvalidServiceName(name));
        }
        Ok(Self(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.0)
    }

    pub fn startup_script(&self, base_dir: &Path) -> PathBuf {
        self.dir(base_dir).join(STARTUP_SCRIPT)
    }

    pub fn artifact_path(&self, base_dir: &Path, kind: PayloadKind) -> PathBuf {
        self.dir(base_dir).join(kind.file_name())
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Instance metadata server the rewritten script fetches payloads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEndpoint {
    /// Attribute base URL, without trailing slash
    pub url: String,
    /// Request header required by the metadata server
    pub header: String,
}

impl MetadataEndpoint {
    /// Shell line replacing the heredoc of `kind`.
    ///
    /// ```ignore
    /// curl -s -H "Metadata-Flavor: Google" http://.../attributes/package_json > package.json
    /// ```
    pub fn fetch_command(&self, kind: PayloadKind) -> String {
        format!(
            "curl -s -H \"{}\" {}/{} > {}",
            self.header,
            self.url.trim_end_matches('/'),
            kind.attribute(),
            kind.file_name()
        )
    }
}

/// What happened to a single service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// No startup script at the expected path
    Skipped,
    /// Startup script rewritten; lists the payloads moved out of it
    Processed { extracted: Vec<PayloadKind> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub service: Service,
    pub startup_script: PathBuf,
    pub outcome: ServiceOutcome,
}

impl ServiceReport {
    pub fn extracted(&self) -> &[PayloadKind] {
        match &self.outcome {
            ServiceOutcome::Skipped => &[],
            ServiceOutcome::Processed { extracted } => extracted.as_slice(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, ServiceOutcome::Skipped)
    }
}

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
///
/// Uses shellexpand crate for robust expansion.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}
