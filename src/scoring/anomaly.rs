// The anomaly scorer — blends weighted sub-scores into an AnomalyScore.
//
// Each sub-score is a pure function of the feature snapshot and the
// config, so the numeric behavior is testable without any store. The
// scorer itself only sequences: validate identifiers, extract features,
// blend, decide. It performs no enforcement; the caller owns what happens
// to the result.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::features::extractor::FeatureExtractor;
use crate::features::WindowSettings;
use crate::models::{
    ActionFeatures, ActionKind, AnomalyScore, FollowAction, ReasonCode, Severity,
    SubmissionAction, VoteAction,
};
use crate::store::StateStore;

use super::config::{
    BehavioralWeights, ConfidenceIncrements, ConfigError, GraphWeights, NetworkWeights,
    ScoringConfig, VelocityWeights,
};

/// Request-time errors. Infra degradation is handled inside extraction and
/// never lands here; the only way a scoring call fails is a caller bug.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("missing required identifier: {0}")]
    MissingIdentifier(&'static str),
}

fn require(field: &'static str, value: &str) -> Result<(), ScoringError> {
    if value.trim().is_empty() {
        Err(ScoringError::MissingIdentifier(field))
    } else {
        Ok(())
    }
}

// ── Sub-scores ────────────────────────────────────────────────────
//
// All return values in [0, 1].

/// Velocity sub-score. Only counts above their threshold contribute:
/// `ratio - 1` per window, mixed by the short/long weights, clamped.
pub fn score_velocity(
    short_count: i64,
    long_count: i64,
    short_threshold: i64,
    long_threshold: i64,
    weights: &VelocityWeights,
) -> f64 {
    let excess = |count: i64, threshold: i64| -> f64 {
        if threshold <= 0 {
            return 0.0;
        }
        (count as f64 / threshold as f64 - 1.0).max(0.0)
    };
    let combined = weights.short_weight * excess(short_count, short_threshold)
        + weights.long_weight * excess(long_count, long_threshold);
    combined.clamp(0.0, 1.0)
}

/// How far a count has grown past a crowd threshold, saturating at 1.0
/// when it reaches twice the threshold.
fn saturation(count: u64, threshold: u64) -> f64 {
    if threshold == 0 || count <= threshold {
        return 0.0;
    }
    ((count - threshold) as f64 / threshold as f64).clamp(0.0, 1.0)
}

/// The three shared-infrastructure signals, pre-weight. Exposed separately
/// so reason codes can name the specific signal that fired.
#[derive(Debug, Clone, Copy)]
pub struct NetworkSignals {
    pub shared_ip: f64,
    pub shared_ua: f64,
    pub ip_hopping: f64,
}

pub fn network_signals(features: &ActionFeatures, weights: &NetworkWeights) -> NetworkSignals {
    NetworkSignals {
        shared_ip: saturation(features.ip_fan_in, weights.ip_crowd_threshold),
        shared_ua: saturation(features.ua_fan_in, weights.ua_crowd_threshold),
        ip_hopping: saturation(features.distinct_ips, weights.hopping_threshold),
    }
}

/// IP/UA sub-score: the three weighted signals summed, clamped once at the
/// end rather than per signal.
pub fn score_network(signals: &NetworkSignals, weights: &NetworkWeights) -> f64 {
    (weights.shared_ip_weight * signals.shared_ip
        + weights.shared_ua_weight * signals.shared_ua
        + weights.ip_hopping_weight * signals.ip_hopping)
        .clamp(0.0, 1.0)
}

/// Graph sub-score: coordinated voting (discounted on a thin voter sample)
/// or a circular follow. Submissions carry no graph signal.
pub fn score_graph(features: &ActionFeatures, weights: &GraphWeights) -> f64 {
    match features.action {
        ActionKind::Vote => {
            let mut score = features.coordinated_vote_score;
            if features.voter_sample < weights.full_evidence_voters {
                score *= weights.thin_evidence_discount;
            }
            score.clamp(0.0, 1.0)
        }
        ActionKind::Follow => {
            if features.mutual_follow {
                weights.mutual_follow_weight
            } else {
                0.0
            }
        }
        ActionKind::Submission => 0.0,
    }
}

/// Behavioral sub-score: burst pressure, mechanical timing, one-sided
/// voting. Neutral feature values (entropy 1.0, diversity 1.0) contribute
/// nothing.
pub fn score_behavioral(features: &ActionFeatures, weights: &BehavioralWeights) -> f64 {
    (weights.burst_weight * features.burst_score
        + weights.timing_weight * (1.0 - features.timing_entropy)
        + weights.diversity_weight * (1.0 - features.vote_diversity))
        .clamp(0.0, 1.0)
}

/// Evidence-based confidence, independent of the anomaly score itself.
/// Each available dimension adds its fixed increment; a brand-new,
/// unobserved account stays low even when raw sub-scores are elevated.
pub fn estimate_confidence(features: &ActionFeatures, inc: &ConfidenceIncrements) -> f64 {
    let mut confidence = 0.0;
    if features.short_window_count > 0 || features.long_window_count > 0 {
        confidence += inc.velocity_history;
    }
    if features.ip_fan_in > 0 || features.ua_fan_in > 0 {
        confidence += inc.network_history;
    }
    if features.account_age_days >= inc.age_floor_days {
        confidence += inc.account_age;
        if features.account_age_days >= inc.established_age_days {
            confidence += inc.established_account;
        }
    }
    if features.trust_score > 0 {
        confidence += inc.trust_known;
    }
    if features.timing_samples >= inc.min_timing_samples {
        confidence += inc.timing_sample;
    }
    confidence.clamp(0.0, 1.0)
}

/// Scores user actions against shared behavioral state.
pub struct AnomalyScorer {
    extractor: FeatureExtractor,
    config: ScoringConfig,
}

impl AnomalyScorer {
    /// Build a scorer over the given store. Fails fast on a malformed
    /// config — configuration problems are startup problems.
    pub fn new(store: Arc<dyn StateStore>, config: ScoringConfig) -> Result<Self, ConfigError> {
        Self::with_windows(store, config, WindowSettings::default())
    }

    /// As `new`, with explicit tracking windows (tests shrink these).
    pub fn with_windows(
        store: Arc<dyn StateStore>,
        config: ScoringConfig,
        windows: WindowSettings,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor =
            FeatureExtractor::with_settings(store, windows, config.velocity.burst_thresholds());
        Ok(Self { extractor, config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a vote. Always returns a best-effort score once identifiers
    /// check out; state-store trouble degrades features, never the call.
    pub async fn score_vote_action(
        &self,
        action: &VoteAction,
    ) -> Result<AnomalyScore, ScoringError> {
        require("user_id", &action.user_id)?;
        require("clip_id", &action.clip_id)?;
        let features = self.extractor.extract_vote_features(action).await;
        Ok(self.assemble(features))
    }

    /// Score a follow.
    pub async fn score_follow_action(
        &self,
        action: &FollowAction,
    ) -> Result<AnomalyScore, ScoringError> {
        require("follower_id", &action.follower_id)?;
        require("following_id", &action.following_id)?;
        let features = self.extractor.extract_follow_features(action).await;
        Ok(self.assemble(features))
    }

    /// Score a content submission.
    pub async fn score_submission_action(
        &self,
        action: &SubmissionAction,
    ) -> Result<AnomalyScore, ScoringError> {
        require("user_id", &action.user_id)?;
        let features = self.extractor.extract_submission_features(action).await;
        Ok(self.assemble(features))
    }

    fn assemble(&self, features: ActionFeatures) -> AnomalyScore {
        let cfg = &self.config;

        let velocity = score_velocity(
            features.short_window_count,
            features.long_window_count,
            cfg.velocity.short_threshold(features.action),
            cfg.velocity.long_threshold(features.action),
            &cfg.velocity,
        );
        let net = network_signals(&features, &cfg.network);
        let network = score_network(&net, &cfg.network);
        let trust = cfg.trust.penalty(features.trust_score);
        let graph = score_graph(&features, &cfg.graph);
        let behavioral = score_behavioral(&features, &cfg.behavioral);

        let overall = (cfg.blend.velocity * velocity
            + cfg.blend.network * network
            + cfg.blend.trust * trust
            + cfg.blend.graph * graph
            + cfg.blend.behavioral * behavioral)
            .clamp(0.0, 1.0);

        let severity = Severity::from_score(overall, &cfg.severity_thresholds);
        let confidence = estimate_confidence(&features, &cfg.confidence);

        let reason_codes =
            self.reason_codes(&features, velocity, &net, trust, graph);

        let score = AnomalyScore {
            action: features.action,
            overall,
            severity,
            confidence,
            is_anomaly: overall >= cfg.detection_threshold,
            should_auto_flag: overall >= cfg.auto_flag_threshold,
            reason_codes,
            features,
            scored_at: Utc::now(),
        };

        info!(
            action = score.action.as_str(),
            overall = format!("{:.3}", score.overall),
            severity = score.severity.as_str(),
            confidence = format!("{:.2}", score.confidence),
            reasons = score.reason_codes.len(),
            "Scored action"
        );

        score
    }

    /// Emit one code per signal above the material floor, in fixed
    /// evaluation order.
    fn reason_codes(
        &self,
        features: &ActionFeatures,
        velocity: f64,
        net: &NetworkSignals,
        trust: f64,
        graph: f64,
    ) -> Vec<ReasonCode> {
        let floor = self.config.reason_floor;
        let mut codes = Vec::new();

        if velocity > floor {
            codes.push(ReasonCode::HighVelocity);
        }
        if net.shared_ip > floor {
            codes.push(ReasonCode::SharedIp);
        }
        if net.shared_ua > floor {
            codes.push(ReasonCode::SharedUa);
        }
        if net.ip_hopping > floor {
            codes.push(ReasonCode::IpHopping);
        }
        if trust > floor {
            codes.push(ReasonCode::LowTrust);
        }
        match features.action {
            ActionKind::Vote if graph > floor => codes.push(ReasonCode::CoordinatedVoting),
            ActionKind::Follow if graph > floor => codes.push(ReasonCode::CircularFollow),
            _ => {}
        }
        if features.burst_score > floor {
            codes.push(ReasonCode::BurstActivity);
        }
        if features.timing_samples >= self.config.confidence.min_timing_samples
            && (1.0 - features.timing_entropy) > floor
        {
            codes.push(ReasonCode::LowTimingEntropy);
        }
        if features.action == ActionKind::Vote && (1.0 - features.vote_diversity) > floor {
            codes.push(ReasonCode::OneSidedVoting);
        }

        codes
    }
}
