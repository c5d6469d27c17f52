//! `course-harvest discover`: refresh the course list from the site.

use anyhow::Result;
use std::path::Path;

use course_harvest::{HarvestConfig, Harvester};

use super::{open_session, open_store, BrowserArgs};
use crate::output;

pub async fn run(db: &Path, args: &BrowserArgs, config: &HarvestConfig) -> Result<()> {
    let store = open_store(db)?;
    let session = open_session(args, config).await?;
    let refs = Harvester::new(&session, &store, config).discover().await?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "total": refs.len(),
            "courses": refs,
        }));
        return Ok(());
    }

    if refs.is_empty() {
        eprintln!("  No enrolled courses found.");
        return Ok(());
    }
    eprintln!("  Found {} course(s):", refs.len());
    for r in &refs {
        println!(
            "  {:>3}. {:<8} {}",
            r.display_order.unwrap_or_default(),
            r.id,
            output::clip(r.title.as_deref().unwrap_or("-"), 60)
        );
    }
    Ok(())
}
