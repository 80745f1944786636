//! Command dispatch: turns parsed arguments into service calls

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use itertools::Itertools;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands, TargetArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{Service, ServiceReport};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

/// Execute the parsed command line.
///
/// Without a subcommand the full extraction runs with the configured defaults.
pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let project_dir = resolve_project_dir(cli.project_dir.as_deref())?;
    debug!("execute_command: project_dir={}", project_dir.display());

    match &cli.command {
        None => cmd_extract(&project_dir, &TargetArgs::default(), false),
        Some(Commands::Extract { target, dry_run }) => cmd_extract(&project_dir, target, *dry_run),
        Some(Commands::Status { target }) => cmd_extract(&project_dir, target, true),
        Some(Commands::Config { command }) => cmd_config(&project_dir, command),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

fn resolve_project_dir(project_dir: Option<&Path>) -> CliResult<PathBuf> {
    match project_dir {
        Some(dir) if !dir.is_dir() => Err(CliError::Usage(format!(
            "project directory does not exist: {}",
            dir.display()
        ))),
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| CliError::from(InfraError::io("determine current directory", e))),
    }
}

/// Load settings and apply command line overrides.
fn load_settings(project_dir: &Path, target: &TargetArgs) -> CliResult<Settings> {
    let mut settings = Settings::load(Some(project_dir))?;

    if let Some(base_dir) = &target.base_dir {
        settings = settings.with_base_dir(base_dir);
    }
    if !target.services.is_empty() {
        for name in &target.services {
            Service::new(name.as_str()).map_err(|e| CliError::InvalidArgs(e.to_string()))?;
        }
        settings.services = target.services.clone();
    }

    Ok(settings.with_project_dir(project_dir))
}

#[instrument(level = "debug", skip(target))]
fn cmd_extract(project_dir: &Path, target: &TargetArgs, dry_run: bool) -> CliResult<()> {
    let settings = load_settings(project_dir, target)?;
    let container = ServiceContainer::new(settings);
    let extractor = container.extractor()?;

    debug!(
        "cmd_extract: base_dir={}, services=[{}]",
        extractor.base_dir().display(),
        container.settings.services.iter().join(", ")
    );

    if dry_run {
        let reports = extractor.plan_all()?;
        output::header("Embedded payloads:");
        print_reports(&reports, true);
    } else {
        let reports = extractor.process_all()?;
        print_reports(&reports, false);
    }
    Ok(())
}

fn print_reports(reports: &[ServiceReport], dry_run: bool) {
    for report in reports.iter().filter(|r| !r.is_skipped()) {
        let extracted = report.extracted();
        if extracted.is_empty() {
            if dry_run {
                output::action(report.service.name(), "nothing embedded");
            }
            continue;
        }
        if dry_run {
            output::action(report.service.name(), &extracted.iter().join(", "));
        } else {
            output::success(&report.service);
            for kind in extracted {
                output::success_detail(&format!(
                    "{} -> {}",
                    kind,
                    report
                        .startup_script
                        .with_file_name(kind.file_name())
                        .display()
                ));
            }
        }
    }
}

fn cmd_config(project_dir: &Path, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = Settings::load(Some(project_dir))?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::warning("no global config directory on this platform"),
            }
            output::action("local", &local_config_path(project_dir).display());
        }
        ConfigCommands::Template => output::info(&Settings::template()),
    }
    Ok(())
}
