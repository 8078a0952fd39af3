//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use colored::Colorize;

use crate::engine::updater::state::{UpdateEvent, UpdateStep};

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a stage progress bar
    pub fn progress(step: UpdateStep, processed: u64, total: Option<u64>, percent: Option<f64>) {
        let label = step_label(step);
        match percent {
            Some(percent) => {
                let filled = (percent / 5.0).floor().clamp(0.0, 20.0) as usize;
                println!(
                    "  {} {:<20} [{}{}] {:>6.2}%",
                    "▶".bright_blue(),
                    label,
                    "█".repeat(filled).bright_green(),
                    "░".repeat(20 - filled).bright_black(),
                    percent
                );
            }
            None => {
                let amount = match (step, total) {
                    (UpdateStep::Downloading, _) => format_size(processed),
                    (_, Some(total)) => format!("{}/{}", processed, total),
                    (_, None) => processed.to_string(),
                };
                println!("  {} {:<20} {}", "▶".bright_blue(), label, amount);
            }
        }
    }

    /// Print one lifecycle event
    pub fn event(event: &UpdateEvent) {
        match event {
            UpdateEvent::Progress {
                step,
                processed,
                total,
                percent,
            } => Self::progress(*step, *processed, *total, *percent),
            UpdateEvent::UpdateAvailable {
                version,
                changelog_url,
            } => {
                Self::success(&format!("Update available: {}", version.bright_white().bold()));
                if let Some(url) = changelog_url {
                    Self::kv("Changelog", url);
                }
            }
            UpdateEvent::UpdateStarted { version } => {
                Self::info(&format!("Installing {}", version));
            }
            UpdateEvent::NoUpdateAvailable => Self::info("Already up to date"),
            UpdateEvent::Failure { error } => Self::error(&error.to_string()),
        }
    }
}

pub fn step_label(step: UpdateStep) -> &'static str {
    match step {
        UpdateStep::Downloading => "Downloading",
        UpdateStep::VerifyingChecksum => "Verifying checksum",
        UpdateStep::Extracting => "Extracting",
        UpdateStep::CleaningUp => "Cleaning up",
        UpdateStep::Restarting => "Restarting",
    }
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}
