//! Autoupdater CLI - Main entry point for CLI binary
//!
//! Drives the update engine from a terminal: one-off checks, installs,
//! a watch loop, quarantine cleanup and digest verification.

use anyhow::{bail, Context};
use autoupdater::engine::{
    cli::formatter::{format_size, CliFormatter},
    cli::{Cli, Commands, OutputFormat},
    updater::{
        install, verify, ApplyOutcome, CheckOutcome, Checksum, HashAlgorithm, UpdateController,
        UpdateEvent,
    },
};
use clap::Parser;
use std::path::Path;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_cli(cli).await {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let json_output = cli.format == OutputFormat::Json;

    match &cli.command {
        Commands::Check => cmd_check(&cli, json_output).await,
        Commands::Apply => cmd_apply(&cli, json_output).await,
        Commands::Watch { apply } => cmd_watch(&cli, *apply).await,
        Commands::Cleanup { dir } => cmd_cleanup(dir, json_output),
        Commands::Verify {
            file,
            algorithm,
            value,
        } => cmd_verify(file, *algorithm, value, json_output),
    }
}

fn controller(cli: &Cli) -> anyhow::Result<UpdateController> {
    let config = cli.load_config().context("cannot load updater config")?;
    UpdateController::new(&config).context("cannot start update engine")
}

fn spawn_printer(mut events: UnboundedReceiver<UpdateEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            CliFormatter::event(&event);
        }
    })
}

async fn cmd_check(cli: &Cli, json: bool) -> anyhow::Result<()> {
    let controller = controller(cli)?;
    let outcome = controller.check().await;

    if json {
        let body = match &outcome {
            CheckOutcome::Available(pending) => serde_json::json!({
                "update_available": true,
                "version": pending.item.version,
                "url": pending.download_url,
                "changelog": pending.changelog_url,
                "mandatory": pending.item.mandatory,
            }),
            CheckOutcome::Installed { version } => serde_json::json!({
                "update_available": true,
                "installed": version,
            }),
            CheckOutcome::Failed(e) => serde_json::json!({
                "error": e.to_string(),
            }),
            CheckOutcome::NoUpdate | CheckOutcome::Skipped => serde_json::json!({
                "update_available": false,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        match &outcome {
            CheckOutcome::Available(pending) => {
                CliFormatter::success(&format!("Update available: {}", pending.item.version));
                CliFormatter::kv("Download", &pending.download_url);
                if let Some(changelog) = &pending.changelog_url {
                    CliFormatter::kv("Changelog", changelog);
                }
                if let Some(checksum) = &pending.item.checksum {
                    CliFormatter::kv("Checksum", &format!("{} {}", checksum.algorithm, checksum.value));
                }
            }
            CheckOutcome::Installed { version } => {
                CliFormatter::success(&format!("Mandatory update {} installed", version));
            }
            CheckOutcome::NoUpdate | CheckOutcome::Skipped => CliFormatter::info("Already up to date"),
            CheckOutcome::Failed(_) => {}
        }
    }

    if let CheckOutcome::Failed(e) = outcome {
        bail!("update check failed: {}", e);
    }
    Ok(())
}

async fn cmd_apply(cli: &Cli, json: bool) -> anyhow::Result<()> {
    let controller = controller(cli)?;
    let printer = (!json).then(|| spawn_printer(controller.subscribe()));

    let result = match controller.check().await {
        CheckOutcome::Available(_) => match controller.apply().await {
            ApplyOutcome::Installed { version } => Ok(Some(version)),
            ApplyOutcome::Failed(e) => Err(e),
            ApplyOutcome::Skipped | ApplyOutcome::NothingPending => Ok(None),
        },
        CheckOutcome::Installed { version } => Ok(Some(version)),
        CheckOutcome::Failed(e) => Err(e),
        CheckOutcome::NoUpdate | CheckOutcome::Skipped => Ok(None),
    };

    drop(controller);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match result {
        Ok(installed) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "success": true, "installed": installed })
                );
            } else if let Some(version) = installed {
                CliFormatter::success(&format!("Installed {}", version));
            }
            Ok(())
        }
        Err(e) => {
            if json {
                println!("{}", serde_json::json!({ "success": false, "error": e.to_string() }));
            }
            bail!("update failed: {}", e)
        }
    }
}

async fn cmd_watch(cli: &Cli, auto_apply: bool) -> anyhow::Result<()> {
    let controller = controller(cli)?;
    let mut events = controller.subscribe();

    CliFormatter::header("Watching for updates");
    CliFormatter::kv("Install dir", &controller.install_root().display().to_string());
    controller.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                CliFormatter::event(&event);
                if auto_apply && matches!(event, UpdateEvent::UpdateAvailable { .. }) {
                    let _ = controller.spawn_apply();
                }
            }
        }
    }

    controller.stop();
    CliFormatter::info("Stopped");
    Ok(())
}

fn cmd_cleanup(dir: &Path, json: bool) -> anyhow::Result<()> {
    let root = install::resolve_install_root(dir)?;
    let report = install::cleanup_old_files(&root, |_, _| {});

    if json {
        println!(
            "{}",
            serde_json::json!({
                "deleted": report.deleted,
                "failed": report.failed,
            })
        );
    } else {
        for path in &report.deleted {
            CliFormatter::success(&format!("Removed {}", path.display()));
        }
        for path in &report.failed {
            CliFormatter::warning(&format!("Still in use: {}", path.display()));
        }
        if report.deleted.is_empty() && report.failed.is_empty() {
            CliFormatter::info("No quarantined files found");
        }
    }
    Ok(())
}

fn cmd_verify(file: &Path, algorithm: HashAlgorithm, value: &str, json: bool) -> anyhow::Result<()> {
    let size = std::fs::metadata(file)
        .with_context(|| format!("cannot read {}", file.display()))?
        .len();
    let checksum = Checksum {
        algorithm,
        value: value.to_string(),
    };
    let result = verify::verify(file, Some(&checksum));

    if json {
        println!(
            "{}",
            serde_json::json!({
                "file": file.display().to_string(),
                "algorithm": algorithm.to_string(),
                "valid": result.is_ok(),
            })
        );
    } else if result.is_ok() {
        CliFormatter::success(&format!(
            "{} matches ({}, {})",
            file.display(),
            algorithm,
            format_size(size)
        ));
    }

    result.with_context(|| format!("{} failed verification", file.display()))
}
