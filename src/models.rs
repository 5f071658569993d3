// Data types that flow through the scoring engine.
//
// These are separate from the extractor and scorer so the CLI, the replay
// pipeline, and downstream consumers (moderation tooling reads severity and
// reason codes) can use them without depending on scoring internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of user action the engine scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Vote,
    Follow,
    Submission,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Vote => "vote",
            ActionKind::Follow => "follow",
            ActionKind::Submission => "submission",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A vote on a clip, plus the request context the identity and request
/// layers supply alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteAction {
    pub user_id: String,
    pub clip_id: String,
    /// +1 for an upvote, -1 for a downvote.
    pub vote_value: i8,
    pub ip: String,
    pub user_agent: String,
    /// Trust score from the identity subsystem (0-100).
    pub trust_score: u8,
    pub account_created_at: DateTime<Utc>,
}

/// One user following another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowAction {
    pub follower_id: String,
    pub following_id: String,
    pub ip: String,
    pub user_agent: String,
    pub trust_score: u8,
    pub account_created_at: DateTime<Utc>,
}

/// A content submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionAction {
    pub user_id: String,
    pub ip: String,
    pub user_agent: String,
    pub trust_score: u8,
    pub account_created_at: DateTime<Utc>,
}

/// One line of a JSONL action log, e.g.
/// `{"action":"vote","user_id":"u1","clip_id":"c1",...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRecord {
    Vote(VoteAction),
    Follow(FollowAction),
    Submission(SubmissionAction),
}

impl ActionRecord {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRecord::Vote(_) => ActionKind::Vote,
            ActionRecord::Follow(_) => ActionKind::Follow,
            ActionRecord::Submission(_) => ActionKind::Submission,
        }
    }

    /// The acting user, for display and grouping.
    pub fn actor(&self) -> &str {
        match self {
            ActionRecord::Vote(a) => &a.user_id,
            ActionRecord::Follow(a) => &a.follower_id,
            ActionRecord::Submission(a) => &a.user_id,
        }
    }

    /// One-line description, e.g. `vote u1 -> clip c9`.
    pub fn describe(&self) -> String {
        match self {
            ActionRecord::Vote(a) => format!("vote {} -> clip {}", a.user_id, a.clip_id),
            ActionRecord::Follow(a) => {
                format!("follow {} -> {}", a.follower_id, a.following_id)
            }
            ActionRecord::Submission(a) => format!("submission {}", a.user_id),
        }
    }
}

/// Per-action feature snapshot read from behavioral state.
///
/// Every field defaults to its neutral value; a degraded store read leaves
/// the corresponding field at neutral rather than failing the extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ActionFeatures {
    pub action: ActionKind,
    /// Actions of this kind by this actor in the short (5-minute) window.
    pub short_window_count: i64,
    /// Actions of this kind by this actor in the long (1-hour) window.
    pub long_window_count: i64,
    /// Distinct users seen on this IP in the tracking window.
    pub ip_fan_in: u64,
    /// Distinct users seen on this normalized user agent.
    pub ua_fan_in: u64,
    /// Distinct IPs this actor has used in the tracking window.
    pub distinct_ips: u64,
    /// Votes only: fraction of the clip's other recent voters whose last
    /// IP is shared with at least one other recent voter.
    pub coordinated_vote_score: f64,
    /// How many other recent voters backed the coordinated-vote score.
    pub voter_sample: usize,
    /// Follows only: the target already follows the actor.
    pub mutual_follow: bool,
    /// Degree to which the short-window count exceeds the burst threshold.
    pub burst_score: f64,
    /// Normalized irregularity of inter-arrival gaps; low = mechanical.
    pub timing_entropy: f64,
    /// How many recorded timestamps backed the entropy estimate.
    pub timing_samples: usize,
    /// Votes only: 1 - 2*|up_ratio - 0.5| over cumulative up/down counts.
    pub vote_diversity: f64,
    pub account_age_days: f64,
    pub trust_score: u8,
}

impl ActionFeatures {
    /// A neutral snapshot: nothing observed, nothing suspicious.
    pub fn neutral(action: ActionKind) -> Self {
        Self {
            action,
            short_window_count: 0,
            long_window_count: 0,
            ip_fan_in: 0,
            ua_fan_in: 0,
            distinct_ips: 0,
            coordinated_vote_score: 0.0,
            voter_sample: 0,
            mutual_follow: false,
            burst_score: 0.0,
            timing_entropy: 1.0,
            timing_samples: 0,
            vote_diversity: 1.0,
            account_age_days: 0.0,
            trust_score: 0,
        }
    }
}

/// Severity tiers derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map an overall score onto a tier given four ascending thresholds
    /// (low, medium, high, critical).
    pub fn from_score(score: f64, thresholds: &[f64; 4]) -> Self {
        match score {
            s if s >= thresholds[3] => Severity::Critical,
            s if s >= thresholds[2] => Severity::High,
            s if s >= thresholds[1] => Severity::Medium,
            s if s >= thresholds[0] => Severity::Low,
            // NaN fails every >= comparison and lands here too.
            _ => Severity::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identifiers for the factors that contributed to a score.
///
/// These are presentation/explainability output for review tooling; the
/// scoring computation never reads them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    HighVelocity,
    SharedIp,
    SharedUa,
    IpHopping,
    LowTrust,
    CoordinatedVoting,
    CircularFollow,
    BurstActivity,
    LowTimingEntropy,
    OneSidedVoting,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::HighVelocity => "high_velocity",
            ReasonCode::SharedIp => "shared_ip",
            ReasonCode::SharedUa => "shared_ua",
            ReasonCode::IpHopping => "ip_hopping",
            ReasonCode::LowTrust => "low_trust",
            ReasonCode::CoordinatedVoting => "coordinated_voting",
            ReasonCode::CircularFollow => "circular_follow",
            ReasonCode::BurstActivity => "burst_activity",
            ReasonCode::LowTimingEntropy => "low_timing_entropy",
            ReasonCode::OneSidedVoting => "one_sided_voting",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The result handed back to the calling action handler.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyScore {
    pub action: ActionKind,
    /// Blended sub-scores, clamped to [0, 1].
    pub overall: f64,
    pub severity: Severity,
    /// How much evidence backs the score, clamped to [0, 1]. Independent
    /// of the score itself: a brand-new account scores low here even when
    /// raw sub-scores are elevated.
    pub confidence: f64,
    pub is_anomaly: bool,
    /// Eligible for automatic enforcement. Gated on a stricter threshold
    /// than detection; lower-confidence cases are meant for human review.
    pub should_auto_flag: bool,
    /// Contributing factors in evaluation order, for review tooling.
    pub reason_codes: Vec<ReasonCode>,
    /// The snapshot the score was computed from.
    pub features: ActionFeatures,
    pub scored_at: DateTime<Utc>,
}
