//! `course-harvest harvest` and `course-harvest recrawl`.

use anyhow::Result;
use std::path::Path;
use tracing::info;

use course_harvest::{HarvestConfig, HarvestFilter, Harvester};

use super::{open_session, open_store, report_outcomes, BrowserArgs};

/// Discovery-seeded run.
pub async fn run(
    db: &Path,
    args: &BrowserArgs,
    config: &HarvestConfig,
    filter: &HarvestFilter,
) -> Result<()> {
    let store = open_store(db)?;
    let session = open_session(args, config).await?;
    info!(?filter, "harvest started");

    let outcomes = Harvester::new(&session, &store, config)
        .harvest_all(filter)
        .await?;
    report_outcomes(outcomes);
    Ok(())
}

/// Drift-seeded run.
pub async fn run_recrawl(
    db: &Path,
    args: &BrowserArgs,
    config: &HarvestConfig,
    threshold: f64,
) -> Result<()> {
    let store = open_store(db)?;
    // Fail on a bad threshold before launching a browser.
    let drifted = store.drift_report(threshold)?;
    if drifted.is_empty() {
        report_outcomes(Vec::new());
        return Ok(());
    }

    let session = open_session(args, config).await?;
    info!(threshold, courses = drifted.len(), policy = ?config.recrawl_policy, "recrawl started");
    let outcomes = Harvester::new(&session, &store, config)
        .harvest_drifted(threshold)
        .await?;
    report_outcomes(outcomes);
    Ok(())
}
