use crate::domain::SubjectId;
use crate::state::Engine;

pub async fn cmd_refresh(engine: &Engine, ids: &[i32]) -> anyhow::Result<()> {
    let mut failed = 0usize;

    for id in ids.iter().copied().map(SubjectId::new) {
        match engine.refresh_entity(id).await {
            Ok(refreshed) => {
                let subject = &refreshed.subject;
                let score = subject
                    .score
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.2}"));
                let rank = if subject.is_ranked() {
                    subject.rank.to_string()
                } else {
                    "-".to_string()
                };

                println!("✓ {} {}", subject.id, subject.display_name());
                println!(
                    "  Rank: {rank} | Score: {score} | Collected: {} | Comments/ep: {:.1}",
                    subject.collection_total.unwrap_or_default(),
                    subject.average_comment
                );
                if let Some(renamed) = refreshed.renamed {
                    println!("  Moved: {} -> {}", renamed.from, renamed.to);
                }
            }
            Err(e) => {
                failed += 1;
                println!("✗ {id}: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} subjects failed to refresh", ids.len());
    }
    Ok(())
}
