//! Startup script extraction service
//!
//! Moves heredoc payloads out of each service's `startup.sh` into sibling
//! files and makes the script fetch them from the metadata server at boot.
//!
//! Scripts are read with `\r\n` and `\r` folded into `\n`, so a rewritten
//! script always has LF line endings.
//!
//! Per service the steps run strictly in order: read the script, write each
//! extracted payload, overwrite the script. Nothing is rolled back if a later
//! step fails.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    normalize_newlines, HeredocPattern, MetadataEndpoint, PayloadKind, Service, ServiceOutcome,
    ServiceReport, Substitution,
};
use crate::infrastructure::traits::FileSystem;

/// Extracts heredoc payloads from service startup scripts.
pub struct ExtractorService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
    endpoint: MetadataEndpoint,
    patterns: Vec<HeredocPattern>,
}

impl ExtractorService {
    /// Create a new extractor service.
    ///
    /// # Arguments
    /// * `fs` - Filesystem abstraction
    /// * `settings` - Settings with `base_dir` already resolved against the project dir
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> ApplicationResult<Self> {
        let patterns = PayloadKind::ALL
            .iter()
            .map(|kind| HeredocPattern::new(*kind))
            .collect::<Result<Vec<_>, _>>()?;
        let endpoint = settings.metadata_endpoint();

        Ok(Self {
            fs,
            settings,
            endpoint,
            patterns,
        })
    }

    /// Directory holding the service directories.
    pub fn base_dir(&self) -> &Path {
        &self.settings.base_dir
    }

    /// Configured services, in processing order.
    pub fn services(&self) -> ApplicationResult<Vec<Service>> {
        Ok(self.settings.service_list()?)
    }

    /// Apply every payload pattern to the script text, in `PayloadKind::ALL` order.
    ///
    /// Each pattern sees the text produced by the previous one. Returns the
    /// final text and one substitution per payload that matched.
    pub fn rewrite(&self, text: &str) -> (String, Vec<Substitution>) {
        let mut current = text.to_string();
        let mut substitutions = Vec::new();

        for pattern in &self.patterns {
            let replacement = self.endpoint.fetch_command(pattern.kind());
            if let Some(sub) = pattern.substitute(&current, &replacement) {
                debug!(
                    "rewrite: matched {} heredoc ({} bytes)",
                    sub.kind,
                    sub.body.len()
                );
                current = sub.text.clone();
                substitutions.push(sub);
            }
        }

        (current, substitutions)
    }

    /// Extract payloads of one service and rewrite its startup script.
    ///
    /// A missing startup script skips the service without error. Any other
    /// I/O failure is returned.
    #[instrument(level = "debug", skip_all, fields(service = %service))]
    pub fn process(&self, service: &Service) -> ApplicationResult<ServiceReport> {
        let script = service.startup_script(self.base_dir());
        if !self.fs.exists(&script) {
            debug!("process: no startup script at {}", script.display());
            return Ok(ServiceReport {
                service: service.clone(),
                startup_script: script,
                outcome: ServiceOutcome::Skipped,
            });
        }

        let content = self
            .fs
            .read_to_string(&script)
            .with_path_context("read startup script", &script)?;

        let (rewritten, substitutions) = self.rewrite(&normalize_newlines(&content));

        for sub in &substitutions {
            let artifact = service.artifact_path(self.base_dir(), sub.kind);
            self.fs
                .write(&artifact, &sub.body)
                .with_path_context("write payload", &artifact)?;
            info!("{}: extracted {}", service, artifact.display());
        }

        self.fs
            .write(&script, &rewritten)
            .with_path_context("write startup script", &script)?;

        Ok(ServiceReport {
            service: service.clone(),
            startup_script: script,
            outcome: ServiceOutcome::Processed {
                extracted: substitutions.iter().map(|s| s.kind).collect(),
            },
        })
    }

    /// Process every configured service, stopping at the first error.
    pub fn process_all(&self) -> ApplicationResult<Vec<ServiceReport>> {
        let services = self.services()?;
        debug!("process_all: {} services in {}", services.len(), self.base_dir().display());
        services.iter().map(|s| self.process(s)).collect()
    }

    /// Report what `process` would extract, without writing anything.
    #[instrument(level = "debug", skip_all, fields(service = %service))]
    pub fn plan(&self, service: &Service) -> ApplicationResult<ServiceReport> {
        let script = service.startup_script(self.base_dir());
        if !self.fs.exists(&script) {
            return Ok(ServiceReport {
                service: service.clone(),
                startup_script: script,
                outcome: ServiceOutcome::Skipped,
            });
        }

        let content = self
            .fs
            .read_to_string(&script)
            .with_path_context("read startup script", &script)?;
        let (_, substitutions) = self.rewrite(&normalize_newlines(&content));

        Ok(ServiceReport {
            service: service.clone(),
            startup_script: script,
            outcome: ServiceOutcome::Processed {
                extracted: substitutions.iter().map(|s| s.kind).collect(),
            },
        })
    }

    /// Plan every configured service.
    pub fn plan_all(&self) -> ApplicationResult<Vec<ServiceReport>> {
        self.services()?.iter().map(|s| self.plan(s)).collect()
    }
}
