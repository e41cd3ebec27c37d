use chrono::Utc;

use crate::domain::{SeasonKey, SubjectId};
use crate::models::{BatchReport, SeasonBatchReport};
use crate::state::Engine;

pub async fn cmd_list_seasons(engine: &Engine) -> anyhow::Result<()> {
    let indices = engine.store.list_indices().await?;

    if indices.is_empty() {
        println!("No season indices mapped yet.");
        println!();
        println!("Create one with: seasonrank reconcile <season> --ids <id,...>");
        return Ok(());
    }

    println!("Season Indices ({} total)", indices.len());
    println!("{:-<60}", "");

    for index in indices {
        println!(
            "{} {} | Index: {} | Members: {}",
            index.season,
            index.season.label(),
            index.index_id,
            index.subject_ids.len()
        );
    }

    Ok(())
}

pub async fn cmd_update_season(engine: &Engine, season: SeasonKey) -> anyhow::Result<()> {
    println!("Updating {}...", season.label());
    let report = engine.batch.update_season(season).await?;
    print_subject_report(&report);

    if !report.is_clean() {
        anyhow::bail!("{} subjects failed", report.failed.len());
    }
    Ok(())
}

pub async fn cmd_update_all(engine: &Engine, recent: bool) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let report = if recent {
        engine.batch.update_recent_seasons(today).await?
    } else {
        engine.batch.update_all_seasons(today).await?
    };
    print_season_report(&report);

    if !report.seasons.is_clean() || !report.subjects.is_clean() {
        anyhow::bail!(
            "{} seasons and {} subjects failed",
            report.seasons.failed.len(),
            report.subjects.failed.len()
        );
    }
    Ok(())
}

fn print_subject_report(report: &BatchReport<SubjectId>) {
    println!(
        "✓ {} succeeded ({} already fresh) | ✗ {} failed",
        report.success.len(),
        report.skipped,
        report.failed.len()
    );
    for renamed in &report.renamed {
        println!("  Moved: {} -> {}", renamed.from, renamed.to);
    }
    for failure in &report.failures {
        println!("  ✗ {}: {}", failure.id, failure.error);
    }
}

fn print_season_report(report: &SeasonBatchReport) {
    println!(
        "Seasons: {} updated, {} failed",
        report.seasons.success.len(),
        report.seasons.failed.len()
    );
    for failure in &report.seasons.failures {
        println!("  ✗ {}: {}", failure.id, failure.error);
    }
    print_subject_report(&report.subjects);
}
