// Feature extraction — turns shared behavioral state into per-action
// feature snapshots.
//
// The extractor reads the state store (never the other way around), so the
// pure signal math lives here at module level where both the extractor and
// the test suites can reach it.

pub mod extractor;

pub use extractor::FeatureExtractor;

use std::time::Duration;

use sha2::{Digest, Sha256};

/// Short velocity window.
pub const SHORT_WINDOW: Duration = Duration::from_secs(5 * 60);
/// Long velocity window.
pub const LONG_WINDOW: Duration = Duration::from_secs(60 * 60);
/// How long IP/UA fan-in sets and per-user IP history stay alive after the
/// last write.
pub const IDENTITY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How long a clip's recent-voter set stays alive.
pub const CLIP_VOTERS_TTL: Duration = Duration::from_secs(60 * 60);
/// How long follow edges are remembered.
pub const FOLLOW_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// How long per-user timing lists stay alive.
pub const TIMING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing lists are trimmed to this many entries on every write.
pub const TIMING_LIST_MAX: usize = 20;
/// Entropy is estimated over at most this many most-recent timestamps.
pub const TIMING_ENTROPY_SAMPLES: usize = 10;
/// Below this many timestamps the entropy estimate is meaningless.
pub const MIN_TIMING_SAMPLES: usize = 3;

/// Normalized user agents are truncated to this many characters before
/// hashing, so trailing version noise groups together.
pub const UA_NORMALIZED_LEN: usize = 120;

/// Tracking windows and TTLs for one extractor instance.
///
/// Production uses the defaults; tests shrink them to exercise expiry with
/// real sleeps.
#[derive(Debug, Clone, Copy)]
pub struct WindowSettings {
    pub short_window: Duration,
    pub long_window: Duration,
    pub identity_ttl: Duration,
    pub clip_voters_ttl: Duration,
    pub follow_ttl: Duration,
    pub timing_ttl: Duration,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            short_window: SHORT_WINDOW,
            long_window: LONG_WINDOW,
            identity_ttl: IDENTITY_TTL,
            clip_voters_ttl: CLIP_VOTERS_TTL,
            follow_ttl: FOLLOW_TTL,
            timing_ttl: TIMING_TTL,
        }
    }
}

/// Lowercase and truncate a user agent so trivial variants (case, long
/// version tails) land on the same key.
pub fn normalize_user_agent(user_agent: &str) -> String {
    user_agent
        .chars()
        .take(UA_NORMALIZED_LEN)
        .collect::<String>()
        .to_lowercase()
}

/// Stable, bounded-size key fragment for a user agent: the first 8 bytes of
/// the SHA-256 digest of the normalized form, hex-encoded.
pub fn user_agent_key(user_agent: &str) -> String {
    let normalized = normalize_user_agent(user_agent);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Normalized irregularity of the spacing between consecutive timestamps
/// (epoch milliseconds, oldest first): variance of the inter-arrival gaps
/// divided by the squared mean gap, clamped to [0, 1].
///
/// Low values mean mechanically regular timing. Fewer than
/// `MIN_TIMING_SAMPLES` timestamps return the neutral 1.0 — an unknown
/// cadence is not evidence of automation. A zero mean gap (all arrivals in
/// the same instant) is maximally mechanical and returns 0.0.
pub fn timing_entropy(timestamps_ms: &[i64]) -> f64 {
    if timestamps_ms.len() < MIN_TIMING_SAMPLES {
        return 1.0;
    }

    let gaps: Vec<f64> = timestamps_ms
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0) as f64 / 1000.0)
        .collect();

    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    if mean <= 0.0 {
        return 0.0;
    }

    let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;
    (variance / (mean * mean)).clamp(0.0, 1.0)
}

/// How many total votes are needed before one-sidedness means anything.
pub const MIN_VOTES_FOR_DIVERSITY: i64 = 5;

/// Vote-pattern diversity from cumulative up/down counts:
/// `1 - 2*|up_ratio - 0.5|`. All-up or all-down voting scores 0.0, an even
/// split scores 1.0. Below `MIN_VOTES_FOR_DIVERSITY` total votes the sample
/// is too small to call one-sided, so the neutral 1.0 is returned.
pub fn vote_diversity(up: i64, down: i64) -> f64 {
    let total = up + down;
    if total < MIN_VOTES_FOR_DIVERSITY {
        return 1.0;
    }
    let up_ratio = up as f64 / total as f64;
    1.0 - 2.0 * (up_ratio - 0.5).abs()
}
