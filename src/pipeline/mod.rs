//! Pipeline entry points for probe operations.
//!
//! - `run_probe`: probe competitors, attach hiring trends, persist everything
//! - `diff`: pricing plan comparison between two page snapshots
//! - `trend`: hiring comparison between two stored snapshots

pub mod diff;
pub mod probe;
pub mod trend;

pub use diff::DiffEngine;
pub use probe::Prober;
pub use trend::compare_hiring;

use crate::error::Result;
use crate::models::{BranchOutcome, Competitor, Report};
use crate::storage::{ProbeStorage, WriteSummary};

/// Run a full probe and persist its output.
///
/// Fresh hiring snapshots are compared against the previously stored one for
/// the same company before being saved as the new latest. Storage problems
/// for a single snapshot are logged and do not fail the run.
pub async fn run_probe(
    prober: &Prober,
    storage: &dyn ProbeStorage,
    competitors: &[Competitor],
    lookback_months: u32,
) -> Result<(Report, WriteSummary)> {
    let records = prober.run(competitors, lookback_months).await;

    let mut results = Vec::with_capacity(records.len());
    for record in records {
        let BranchOutcome::Ok(snapshot) = &record.hiring else {
            results.push(record);
            continue;
        };

        let previous = match storage.load_hiring_snapshot(&record.name).await {
            Ok(previous) => previous,
            Err(e) => {
                log::warn!("{}: cannot load previous hiring snapshot: {}", record.name, e);
                None
            }
        };
        if let Err(e) = storage.save_hiring_snapshot(snapshot).await {
            log::warn!("{}: cannot save hiring snapshot: {}", record.name, e);
        }

        match previous {
            Some(previous) => {
                let trend = compare_hiring(&previous, snapshot);
                log::info!("{}: {}", record.name, trend.summary);
                results.push(record.with_trend(trend));
            }
            None => results.push(record),
        }
    }

    let report = Report::new(lookback_months, results);
    let summary = storage.write_report(&report).await?;
    Ok((report, summary))
}
