use std::env;

use anyhow::{Context, Result};

use crate::scoring::ScoringConfig;

/// Central configuration loaded from environment variables.
///
/// The scoring surface starts from the documented defaults; operators tune
/// the decision thresholds through env vars without a code change. The
/// .env file is loaded at startup via dotenvy.
pub struct Config {
    pub scoring: ScoringConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// A malformed value or a contradictory resulting config fails here,
    /// at startup — never at request time.
    pub fn load() -> Result<Self> {
        let mut scoring = ScoringConfig::new();

        if let Ok(raw) = env::var("PALISADE_DETECTION_THRESHOLD") {
            scoring.detection_threshold = raw
                .parse()
                .with_context(|| format!("Invalid PALISADE_DETECTION_THRESHOLD: {raw}"))?;
        }
        if let Ok(raw) = env::var("PALISADE_AUTO_FLAG_THRESHOLD") {
            scoring.auto_flag_threshold = raw
                .parse()
                .with_context(|| format!("Invalid PALISADE_AUTO_FLAG_THRESHOLD: {raw}"))?;
        }

        scoring
            .validate()
            .context("Scoring configuration is invalid")?;

        Ok(Self { scoring })
    }
}
