use chrono::Utc;

use crate::domain::SubjectId;
use crate::state::Engine;

pub async fn cmd_stale(engine: &Engine, ids: &[i32]) -> anyhow::Result<()> {
    let now = Utc::now();

    for id in ids.iter().copied().map(SubjectId::new) {
        let cached = engine.store.get_subject(id).await?;
        let season = engine.store.season_for_subject(id).await?;
        let stale = engine.is_subject_stale(id).await?;

        let age = cached.as_ref().map_or_else(
            || "never fetched".to_string(),
            |s| format!("{}h old", (now - s.updated_at).num_hours()),
        );
        let window = season.map_or_else(
            || "no season".to_string(),
            |s| format!("{} allows {}d", s, engine.staleness.window(s, now).num_days()),
        );

        let marker = if stale { "stale" } else { "fresh" };
        println!("{id}: {marker} ({age}, {window})");
    }

    Ok(())
}
