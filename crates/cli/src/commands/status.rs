use std::fmt::Write;

use anyhow::{Context, Result};
use strata_orm::migrations::MigrationStatus;
use strata_orm::{MigrationRunner, MigrationStatusReport};

pub async fn run(runner: &MigrationRunner) -> Result<()> {
    let report = runner
        .status_reporter()
        .report()
        .await
        .context("Failed to read migration status")?;
    print!("{}", render(&report));
    Ok(())
}

/// Plain-text status table, one line per identifier
pub fn render(report: &MigrationStatusReport) -> String {
    let entries = report.entries();
    let mut out = String::new();
    let _ = writeln!(out, "Migration Status");
    let _ = writeln!(out, "================");

    if entries.is_empty() {
        let _ = writeln!(out, "No migrations registered");
        return out;
    }

    let width = entries.iter().map(|e| e.id.len()).max().unwrap_or(0);
    for entry in &entries {
        let line = match &entry.status {
            MigrationStatus::Applied { applied_at, batch } => format!(
                "  applied   {:width$}  batch {:<3} {}",
                entry.id,
                batch,
                applied_at.format("%Y-%m-%d %H:%M:%S"),
            ),
            MigrationStatus::Pending => format!(
                "  pending   {:width$}  {}",
                entry.id, entry.description,
            ),
            MigrationStatus::Orphaned { applied_at, batch } => format!(
                "  orphaned  {:width$}  batch {:<3} {} (no longer registered)",
                entry.id,
                batch,
                applied_at.format("%Y-%m-%d %H:%M:%S"),
            ),
        };
        let _ = writeln!(out, "{}", line.trim_end());
    }

    let _ = writeln!(
        out,
        "\n{} applied, {} pending",
        report.applied.len(),
        report.pending.len()
    );
    out
}
