// Scoring configuration — every weight and threshold in one place.
//
// The scoring model is a hand-tuned rule-based classifier; keeping the
// whole surface in one named object keeps it operator-tunable and lets the
// tests sweep the weight space instead of chasing literals through the
// logic. A malformed config is rejected at construction time, never at
// request time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::extractor::BurstThresholds;
use crate::models::ActionKind;

/// Configuration problems. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("blend weights must sum to 1.0 (got {0:.4})")]
    BlendWeightSum(f64),
    #[error("velocity short/long weights must sum to 1.0 (got {0:.4})")]
    VelocityWeightSum(f64),
    #[error("behavioral weights must sum to 1.0 (got {0:.4})")]
    BehavioralWeightSum(f64),
    #[error("severity thresholds must ascend within [0, 1]")]
    SeverityThresholds,
    #[error("detection threshold must be within [0, 1] and not exceed the auto-flag threshold")]
    DecisionThresholds,
    #[error("trust bands must pair descending boundaries with ascending penalties in [0, 1]")]
    TrustBands,
    #[error("{name} must be positive")]
    NonPositiveThreshold { name: &'static str },
    #[error("{name} must be within [0, 1]")]
    WeightOutOfRange { name: &'static str },
}

/// How short- and long-window velocity mix, plus the per-action count
/// thresholds the observed counts are measured against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityWeights {
    /// Short-window share of the velocity sub-score (default 0.7).
    pub short_weight: f64,
    /// Long-window share of the velocity sub-score (default 0.3).
    pub long_weight: f64,
    pub vote_short_threshold: i64,
    pub vote_long_threshold: i64,
    pub follow_short_threshold: i64,
    pub follow_long_threshold: i64,
    pub submission_short_threshold: i64,
    pub submission_long_threshold: i64,
    /// Short-window counts above these trip the burst signal.
    pub vote_burst_threshold: i64,
    pub follow_burst_threshold: i64,
    pub submission_burst_threshold: i64,
}

impl Default for VelocityWeights {
    fn default() -> Self {
        Self {
            short_weight: 0.7,
            long_weight: 0.3,
            vote_short_threshold: 10,
            vote_long_threshold: 80,
            follow_short_threshold: 15,
            follow_long_threshold: 100,
            submission_short_threshold: 5,
            submission_long_threshold: 20,
            vote_burst_threshold: 8,
            follow_burst_threshold: 12,
            submission_burst_threshold: 4,
        }
    }
}

impl VelocityWeights {
    pub fn short_threshold(&self, kind: ActionKind) -> i64 {
        match kind {
            ActionKind::Vote => self.vote_short_threshold,
            ActionKind::Follow => self.follow_short_threshold,
            ActionKind::Submission => self.submission_short_threshold,
        }
    }

    pub fn long_threshold(&self, kind: ActionKind) -> i64 {
        match kind {
            ActionKind::Vote => self.vote_long_threshold,
            ActionKind::Follow => self.follow_long_threshold,
            ActionKind::Submission => self.submission_long_threshold,
        }
    }

    pub fn burst_thresholds(&self) -> BurstThresholds {
        BurstThresholds {
            vote: self.vote_burst_threshold,
            follow: self.follow_burst_threshold,
            submission: self.submission_burst_threshold,
        }
    }
}

/// Shared-infrastructure weights: IP fan-in, UA fan-in, IP hopping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkWeights {
    /// Ceiling of the shared-IP contribution (default 0.5).
    pub shared_ip_weight: f64,
    /// Ceiling of the shared-UA contribution (default 0.25).
    pub shared_ua_weight: f64,
    /// Ceiling of the IP-hopping contribution (default 0.35).
    pub ip_hopping_weight: f64,
    /// Distinct users on one IP past this count as a crowd (default 5).
    pub ip_crowd_threshold: u64,
    /// Distinct users on one UA past this count as a crowd (default 8).
    pub ua_crowd_threshold: u64,
    /// Distinct IPs for one user past this count as hopping (default 3).
    pub hopping_threshold: u64,
}

impl Default for NetworkWeights {
    fn default() -> Self {
        Self {
            shared_ip_weight: 0.5,
            shared_ua_weight: 0.25,
            ip_hopping_weight: 0.35,
            ip_crowd_threshold: 5,
            ua_crowd_threshold: 8,
            hopping_threshold: 3,
        }
    }
}

/// Step function from a 0-100 trust score to a penalty in [0, 1].
///
/// `boundaries` descend; the first boundary the trust score meets selects
/// the matching penalty. Trust below every boundary gets `floor_penalty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustBands {
    pub boundaries: Vec<u8>,
    pub penalties: Vec<f64>,
    pub floor_penalty: f64,
}

impl Default for TrustBands {
    fn default() -> Self {
        Self {
            boundaries: vec![80, 60, 40, 10],
            penalties: vec![0.0, 0.3, 0.6, 0.9],
            floor_penalty: 1.0,
        }
    }
}

impl TrustBands {
    pub fn penalty(&self, trust_score: u8) -> f64 {
        for (boundary, penalty) in self.boundaries.iter().zip(&self.penalties) {
            if trust_score >= *boundary {
                return *penalty;
            }
        }
        self.floor_penalty
    }
}

/// Graph-signal weighting: coordinated votes and circular follows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphWeights {
    /// Weight of a confirmed mutual follow (default 0.8).
    pub mutual_follow_weight: f64,
    /// Coordinated-vote discount applied below `full_evidence_voters`
    /// (default 0.5).
    pub thin_evidence_discount: f64,
    /// Voter sample size at which coordination evidence counts in full
    /// (default 10).
    pub full_evidence_voters: usize,
}

impl Default for GraphWeights {
    fn default() -> Self {
        Self {
            mutual_follow_weight: 0.8,
            thin_evidence_discount: 0.5,
            full_evidence_voters: 10,
        }
    }
}

/// Mix of the behavioral signals: burst, timing regularity, one-sidedness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehavioralWeights {
    pub burst_weight: f64,
    pub timing_weight: f64,
    pub diversity_weight: f64,
}

impl Default for BehavioralWeights {
    fn default() -> Self {
        Self {
            burst_weight: 0.5,
            timing_weight: 0.3,
            diversity_weight: 0.2,
        }
    }
}

/// How the five sub-scores blend into the overall score. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendWeights {
    pub velocity: f64,
    pub network: f64,
    pub trust: f64,
    pub graph: f64,
    pub behavioral: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            velocity: 0.30,
            network: 0.25,
            trust: 0.15,
            graph: 0.15,
            behavioral: 0.15,
        }
    }
}

impl BlendWeights {
    fn sum(&self) -> f64 {
        self.velocity + self.network + self.trust + self.graph + self.behavioral
    }
}

/// Fixed confidence increments per dimension of available evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceIncrements {
    /// Velocity history present (default 0.2).
    pub velocity_history: f64,
    /// IP or UA fan-in history present (default 0.2).
    pub network_history: f64,
    /// Account older than `age_floor_days` (default 0.15).
    pub account_age: f64,
    /// Additional increment past `established_age_days` (default 0.10).
    pub established_account: f64,
    /// Trust score known, i.e. non-zero (default 0.15).
    pub trust_known: f64,
    /// A usable timing-entropy sample exists (default 0.15).
    pub timing_sample: f64,
    pub age_floor_days: f64,
    pub established_age_days: f64,
    pub min_timing_samples: usize,
}

impl Default for ConfidenceIncrements {
    fn default() -> Self {
        Self {
            velocity_history: 0.2,
            network_history: 0.2,
            account_age: 0.15,
            established_account: 0.10,
            trust_known: 0.15,
            timing_sample: 0.15,
            age_floor_days: 7.0,
            established_age_days: 30.0,
            min_timing_samples: 3,
        }
    }
}

/// The full tunable surface of the anomaly scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub velocity: VelocityWeights,
    pub network: NetworkWeights,
    pub trust: TrustBands,
    pub graph: GraphWeights,
    pub behavioral: BehavioralWeights,
    pub blend: BlendWeights,
    /// Ascending cut points for Low/Medium/High/Critical.
    pub severity_thresholds: [f64; 4],
    /// Overall score at which `is_anomaly` flips (default 0.3).
    pub detection_threshold: f64,
    /// Overall score at which `should_auto_flag` flips (default 0.7).
    pub auto_flag_threshold: f64,
    /// A signal below this never earns a reason code (default 0.2).
    pub reason_floor: f64,
    pub confidence: ConfidenceIncrements,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringConfig {
    pub fn new() -> Self {
        Self {
            velocity: VelocityWeights::default(),
            network: NetworkWeights::default(),
            trust: TrustBands::default(),
            graph: GraphWeights::default(),
            behavioral: BehavioralWeights::default(),
            blend: BlendWeights::default(),
            severity_thresholds: [0.3, 0.5, 0.7, 0.9],
            detection_threshold: 0.3,
            auto_flag_threshold: 0.7,
            reason_floor: 0.2,
            confidence: ConfidenceIncrements::default(),
        }
    }

    /// Check the config for contradictions. Called by the scorer at
    /// construction, so a bad config fails at startup, not on a request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const EPS: f64 = 1e-6;

        let blend_sum = self.blend.sum();
        if (blend_sum - 1.0).abs() > EPS {
            return Err(ConfigError::BlendWeightSum(blend_sum));
        }

        let vel_sum = self.velocity.short_weight + self.velocity.long_weight;
        if (vel_sum - 1.0).abs() > EPS {
            return Err(ConfigError::VelocityWeightSum(vel_sum));
        }

        let beh_sum = self.behavioral.burst_weight
            + self.behavioral.timing_weight
            + self.behavioral.diversity_weight;
        if (beh_sum - 1.0).abs() > EPS {
            return Err(ConfigError::BehavioralWeightSum(beh_sum));
        }

        for (name, threshold) in [
            ("vote_short_threshold", self.velocity.vote_short_threshold),
            ("vote_long_threshold", self.velocity.vote_long_threshold),
            ("follow_short_threshold", self.velocity.follow_short_threshold),
            ("follow_long_threshold", self.velocity.follow_long_threshold),
            (
                "submission_short_threshold",
                self.velocity.submission_short_threshold,
            ),
            (
                "submission_long_threshold",
                self.velocity.submission_long_threshold,
            ),
            ("vote_burst_threshold", self.velocity.vote_burst_threshold),
            ("follow_burst_threshold", self.velocity.follow_burst_threshold),
            (
                "submission_burst_threshold",
                self.velocity.submission_burst_threshold,
            ),
        ] {
            if threshold <= 0 {
                return Err(ConfigError::NonPositiveThreshold { name });
            }
        }
        if self.network.ip_crowd_threshold == 0
            || self.network.ua_crowd_threshold == 0
            || self.network.hopping_threshold == 0
        {
            return Err(ConfigError::NonPositiveThreshold {
                name: "network crowd/hopping thresholds",
            });
        }

        for (name, weight) in [
            ("shared_ip_weight", self.network.shared_ip_weight),
            ("shared_ua_weight", self.network.shared_ua_weight),
            ("ip_hopping_weight", self.network.ip_hopping_weight),
            ("mutual_follow_weight", self.graph.mutual_follow_weight),
            ("thin_evidence_discount", self.graph.thin_evidence_discount),
            ("floor_penalty", self.trust.floor_penalty),
            ("reason_floor", self.reason_floor),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(ConfigError::WeightOutOfRange { name });
            }
        }

        let t = &self.severity_thresholds;
        let ascending = t.windows(2).all(|w| w[0] < w[1]);
        if !ascending || t[0] < 0.0 || t[3] > 1.0 {
            return Err(ConfigError::SeverityThresholds);
        }

        if !(0.0..=1.0).contains(&self.detection_threshold)
            || !(0.0..=1.0).contains(&self.auto_flag_threshold)
            || self.detection_threshold > self.auto_flag_threshold
        {
            return Err(ConfigError::DecisionThresholds);
        }

        if self.trust.boundaries.is_empty()
            || self.trust.boundaries.len() != self.trust.penalties.len()
            || !self.trust.boundaries.windows(2).all(|w| w[0] > w[1])
            || !self.trust.penalties.windows(2).all(|w| w[0] <= w[1])
            || !self
                .trust
                .penalties
                .iter()
                .all(|p| (0.0..=1.0).contains(p))
        {
            return Err(ConfigError::TrustBands);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        ScoringConfig::new().validate().unwrap();
    }

    #[test]
    fn test_default_weights_match_documented_values() {
        let cfg = ScoringConfig::new();
        assert_eq!(cfg.velocity.short_weight, 0.7);
        assert_eq!(cfg.velocity.long_weight, 0.3);
        assert_eq!(cfg.severity_thresholds, [0.3, 0.5, 0.7, 0.9]);
        assert_eq!(cfg.detection_threshold, 0.3);
        assert_eq!(cfg.auto_flag_threshold, 0.7);
        assert_eq!(cfg.trust.boundaries, vec![80, 60, 40, 10]);
        assert_eq!(cfg.trust.penalties, vec![0.0, 0.3, 0.6, 0.9]);
        assert!((cfg.blend.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_blend_sum_enforced() {
        let mut cfg = ScoringConfig::new();
        cfg.blend.velocity = 0.9;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::BlendWeightSum(_))
        ));
    }

    #[test]
    fn test_severity_thresholds_must_ascend() {
        let mut cfg = ScoringConfig::new();
        cfg.severity_thresholds = [0.5, 0.3, 0.7, 0.9];
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::SeverityThresholds)
        ));
    }

    #[test]
    fn test_detection_cannot_exceed_auto_flag() {
        let mut cfg = ScoringConfig::new();
        cfg.detection_threshold = 0.8;
        cfg.auto_flag_threshold = 0.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DecisionThresholds)
        ));
    }

    #[test]
    fn test_trust_bands_shape_enforced() {
        let mut cfg = ScoringConfig::new();
        cfg.trust.boundaries = vec![40, 60]; // not descending
        cfg.trust.penalties = vec![0.3, 0.6];
        assert!(matches!(cfg.validate(), Err(ConfigError::TrustBands)));

        let mut cfg = ScoringConfig::new();
        cfg.trust.penalties.pop(); // length mismatch
        assert!(matches!(cfg.validate(), Err(ConfigError::TrustBands)));
    }

    #[test]
    fn test_zero_velocity_threshold_rejected() {
        let mut cfg = ScoringConfig::new();
        cfg.velocity.vote_short_threshold = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositiveThreshold { .. })
        ));
    }

    #[test]
    fn test_trust_penalty_bands() {
        let bands = TrustBands::default();
        assert_eq!(bands.penalty(100), 0.0);
        assert_eq!(bands.penalty(80), 0.0);
        assert_eq!(bands.penalty(79), 0.3);
        assert_eq!(bands.penalty(60), 0.3);
        assert_eq!(bands.penalty(40), 0.6);
        assert_eq!(bands.penalty(10), 0.9);
        assert_eq!(bands.penalty(9), 1.0);
        assert_eq!(bands.penalty(0), 1.0);
    }
}
