// Replay pipeline: score a logged action stream offline.
//
// Reads a JSONL action log (one action per line, as emitted by the
// platform's request layer), pushes every action through the scorer with
// bounded concurrency, and collects a summary. Used for weight tuning and
// for demos — the state store fills up exactly as it would have in
// production, so late actions in the log see the behavioral footprint of
// earlier ones.

use std::path::Path;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use crate::models::{ActionRecord, AnomalyScore, Severity};
use crate::scoring::{AnomalyScorer, ScoringError};

/// One scored action that crossed the detection threshold.
pub struct FlaggedAction {
    pub record: ActionRecord,
    pub score: AnomalyScore,
}

/// Aggregate results of one replay run.
#[derive(Default)]
pub struct ReplaySummary {
    pub total_lines: usize,
    pub parse_failures: usize,
    pub scored: usize,
    pub validation_failures: usize,
    pub anomalies: usize,
    pub auto_flagged: usize,
    /// Scored actions at or above the detection threshold, in completion
    /// order.
    pub flagged: Vec<FlaggedAction>,
}

impl ReplaySummary {
    /// Count of flagged actions at or above a severity tier.
    pub fn at_or_above(&self, severity: Severity) -> usize {
        self.flagged
            .iter()
            .filter(|f| f.score.severity >= severity)
            .count()
    }
}

/// Run the replay: parse, score concurrently, summarize.
pub async fn run(scorer: &AnomalyScorer, path: &Path, concurrency: usize) -> Result<ReplaySummary> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read action log {}", path.display()))?;

    let mut summary = ReplaySummary::default();
    let mut records = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.total_lines += 1;
        match serde_json::from_str::<ActionRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                summary.parse_failures += 1;
                warn!(line = lineno + 1, error = %e, "Skipping unparseable action");
            }
        }
    }

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Scoring [{bar:30}] {pos}/{len} ({eta})")
            .unwrap(),
    );

    let results: Vec<Result<(ActionRecord, AnomalyScore), ScoringError>> =
        stream::iter(records.into_iter().map(|record| async move {
            let score = match &record {
                ActionRecord::Vote(a) => scorer.score_vote_action(a).await,
                ActionRecord::Follow(a) => scorer.score_follow_action(a).await,
                ActionRecord::Submission(a) => scorer.score_submission_action(a).await,
            }?;
            Ok((record, score))
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for result in results {
        match result {
            Ok((record, score)) => {
                summary.scored += 1;
                if score.is_anomaly {
                    summary.anomalies += 1;
                }
                if score.should_auto_flag {
                    summary.auto_flagged += 1;
                }
                if score.is_anomaly {
                    summary.flagged.push(FlaggedAction { record, score });
                }
            }
            Err(e) => {
                summary.validation_failures += 1;
                warn!(error = %e, "Action rejected, skipping");
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(summary)
}
