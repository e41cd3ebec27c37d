use anyhow::Context;
use std::path::Path;

use crate::domain::{IndexId, SeasonKey, SubjectId};
use crate::models::{BatchReport, ReconcileAction, ReconcileReport};
use crate::services::ReconcileError;
use crate::state::Engine;

pub async fn cmd_reconcile(
    engine: &Engine,
    season: SeasonKey,
    index: Option<i32>,
    ids: &[i32],
    titles_file: Option<&Path>,
) -> anyhow::Result<()> {
    let asserted = index.map(IndexId::new);

    let report = if let Some(path) = titles_file {
        let titles = read_titles(path)?;
        println!("Resolving {} titles...", titles.len());

        let (report, resolution) = match engine.reconcile_titles(season, &titles, asserted).await {
            Ok(done) => done,
            Err(ReconcileError::LookupFailed { titles }) => {
                for title in &titles {
                    println!("  ✗ Lookup failed: {title}");
                }
                anyhow::bail!("Title lookups failed, {} index left unchanged", season.label());
            }
            Err(e) => return Err(e.into()),
        };
        for title in &resolution.unresolved {
            println!("  ? No exact match: {title}");
        }
        report
    } else {
        let desired: Vec<SubjectId> = ids.iter().copied().map(SubjectId::new).collect();
        engine.reconcile_index(season, &desired, asserted).await?
    };

    print_report(&report);

    if !report.is_clean() {
        anyhow::bail!("Some index members could not be updated");
    }
    Ok(())
}

fn read_titles(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read titles file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}

fn print_report(report: &ReconcileReport) {
    let action = match report.action {
        ReconcileAction::Created => "Created",
        ReconcileAction::Updated => "Updated",
    };
    println!(
        "{action} index {} for {}",
        report.index_id,
        report.season.label()
    );
    println!(
        "  +{} -{} ={}",
        report.added.success.len(),
        report.removed.success.len(),
        report.unchanged
    );
    print_failures("add", &report.added);
    print_failures("remove", &report.removed);
}

fn print_failures(op: &str, report: &BatchReport<SubjectId>) {
    for failure in &report.failures {
        println!("  ✗ {op} {}: {}", failure.id, failure.error);
    }
}
