// Unit tests for the scoring functions.
//
// Tests isolated pure functions: Severity::from_score boundary conditions,
// the velocity/trust/network/graph sub-scores against their documented
// values, confidence estimation, and truncate_chars UTF-8 safety.

use palisade::features::{timing_entropy, vote_diversity};
use palisade::models::{ActionFeatures, ActionKind, Severity};
use palisade::output::truncate_chars;
use palisade::scoring::anomaly::{
    estimate_confidence, network_signals, score_behavioral, score_graph, score_network,
    score_velocity, NetworkSignals,
};
use palisade::scoring::config::{
    BehavioralWeights, ConfidenceIncrements, GraphWeights, NetworkWeights, TrustBands,
    VelocityWeights,
};
use palisade::scoring::ScoringConfig;

const THRESHOLDS: [f64; 4] = [0.3, 0.5, 0.7, 0.9];

// ============================================================
// Severity::from_score — boundary conditions
// ============================================================

#[test]
fn severity_buckets_at_documented_points() {
    assert_eq!(Severity::from_score(0.2, &THRESHOLDS), Severity::None);
    assert_eq!(Severity::from_score(0.35, &THRESHOLDS), Severity::Low);
    assert_eq!(Severity::from_score(0.55, &THRESHOLDS), Severity::Medium);
    assert_eq!(Severity::from_score(0.75, &THRESHOLDS), Severity::High);
    assert_eq!(Severity::from_score(0.9, &THRESHOLDS), Severity::Critical);
}

#[test]
fn severity_exact_boundaries_round_up() {
    assert_eq!(Severity::from_score(0.3, &THRESHOLDS), Severity::Low);
    assert_eq!(Severity::from_score(0.5, &THRESHOLDS), Severity::Medium);
    assert_eq!(Severity::from_score(0.7, &THRESHOLDS), Severity::High);
}

#[test]
fn severity_just_below_boundaries() {
    assert_eq!(Severity::from_score(0.299, &THRESHOLDS), Severity::None);
    assert_eq!(Severity::from_score(0.499, &THRESHOLDS), Severity::Low);
    assert_eq!(Severity::from_score(0.699, &THRESHOLDS), Severity::Medium);
    assert_eq!(Severity::from_score(0.899, &THRESHOLDS), Severity::High);
}

#[test]
fn severity_extremes() {
    assert_eq!(Severity::from_score(0.0, &THRESHOLDS), Severity::None);
    assert_eq!(Severity::from_score(1.0, &THRESHOLDS), Severity::Critical);
    assert_eq!(Severity::from_score(-1.0, &THRESHOLDS), Severity::None);
    assert_eq!(Severity::from_score(100.0, &THRESHOLDS), Severity::Critical);
}

#[test]
fn severity_nan_falls_to_none() {
    // NaN fails all >= comparisons, so it falls through to the wildcard arm
    assert_eq!(Severity::from_score(f64::NAN, &THRESHOLDS), Severity::None);
}

#[test]
fn severity_is_monotone_in_score() {
    let mut last = Severity::None;
    for step in 0..=100 {
        let tier = Severity::from_score(step as f64 / 100.0, &THRESHOLDS);
        assert!(tier >= last, "severity regressed at {step}");
        last = tier;
    }
}

#[test]
fn severity_display_matches_as_str() {
    for tier in [
        Severity::None,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ] {
        assert_eq!(tier.to_string(), tier.as_str());
    }
}

// ============================================================
// score_velocity — documented worked examples
// ============================================================

#[test]
fn velocity_below_thresholds_is_zero() {
    let w = VelocityWeights::default();
    assert_eq!(score_velocity(1, 5, 2, 10, &w), 0.0);
}

#[test]
fn velocity_capped_from_one_point_zero_five() {
    let w = VelocityWeights::default();
    // 0.7*(5/2 - 1) + 0.3*0 = 1.05, clamped
    assert!((score_velocity(5, 8, 2, 10, &w) - 1.0).abs() < 1e-9);
}

#[test]
fn velocity_mixed_windows() {
    let w = VelocityWeights::default();
    // 0.7*0.5 + 0.3*0.2 = 0.41
    assert!((score_velocity(3, 12, 2, 10, &w) - 0.41).abs() < 1e-9);
}

#[test]
fn velocity_long_window_only() {
    let w = VelocityWeights::default();
    // 0.7*0 + 0.3*(30/10 - 1) = 0.6
    assert!((score_velocity(1, 30, 2, 10, &w) - 0.6).abs() < 1e-9);
}

#[test]
fn velocity_zero_counts() {
    let w = VelocityWeights::default();
    assert_eq!(score_velocity(0, 0, 2, 10, &w), 0.0);
}

#[test]
fn velocity_extreme_counts_stay_in_range() {
    let w = VelocityWeights::default();
    let score = score_velocity(i64::MAX / 2, i64::MAX / 2, 2, 10, &w);
    assert_eq!(score, 1.0);
}

#[test]
fn velocity_custom_weights() {
    let w = VelocityWeights {
        short_weight: 0.5,
        long_weight: 0.5,
        ..VelocityWeights::default()
    };
    // 0.5*0.5 + 0.5*0.2 = 0.35
    assert!((score_velocity(3, 12, 2, 10, &w) - 0.35).abs() < 1e-9);
}

// ============================================================
// Trust bands
// ============================================================

#[test]
fn trust_bands_documented_points() {
    let bands = TrustBands::default();
    assert_eq!(bands.penalty(85), 0.0);
    assert_eq!(bands.penalty(60), 0.3);
    assert_eq!(bands.penalty(40), 0.6);
    assert_eq!(bands.penalty(10), 0.9);
}

#[test]
fn trust_penalty_monotone_nonincreasing_in_trust() {
    let bands = TrustBands::default();
    let mut last = bands.penalty(0);
    for trust in 0..=100u8 {
        let p = bands.penalty(trust);
        assert!((0.0..=1.0).contains(&p));
        assert!(p <= last, "penalty rose at trust {trust}");
        last = p;
    }
}

#[test]
fn trust_below_lowest_band_hits_floor() {
    let bands = TrustBands::default();
    assert_eq!(bands.penalty(0), 1.0);
    assert_eq!(bands.penalty(9), 1.0);
}

// ============================================================
// Network signals
// ============================================================

#[test]
fn network_signals_from_features() {
    let w = NetworkWeights::default();
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.ip_fan_in = 10; // (10-5)/5 = 1.0
    f.ua_fan_in = 10; // (10-8)/8 = 0.25
    f.distinct_ips = 6; // (6-3)/3 = 1.0

    let s = network_signals(&f, &w);
    assert!((s.shared_ip - 1.0).abs() < 1e-12);
    assert!((s.shared_ua - 0.25).abs() < 1e-12);
    assert!((s.ip_hopping - 1.0).abs() < 1e-12);
}

#[test]
fn network_score_below_crowd_thresholds_is_zero() {
    let w = NetworkWeights::default();
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.ip_fan_in = 5;
    f.ua_fan_in = 8;
    f.distinct_ips = 3;
    let s = network_signals(&f, &w);
    assert_eq!(score_network(&s, &w), 0.0);
}

#[test]
fn network_score_sums_before_clamping() {
    let w = NetworkWeights::default();
    let s = NetworkSignals {
        shared_ip: 1.0,
        shared_ua: 1.0,
        ip_hopping: 1.0,
    };
    // 0.5 + 0.25 + 0.35 = 1.1 -> 1.0
    assert_eq!(score_network(&s, &w), 1.0);
}

// ============================================================
// Graph and behavioral signals
// ============================================================

#[test]
fn graph_coordination_discounted_until_full_evidence() {
    let w = GraphWeights::default();
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.coordinated_vote_score = 1.0;

    f.voter_sample = 3;
    assert!((score_graph(&f, &w) - 0.5).abs() < 1e-12);
    f.voter_sample = 10;
    assert!((score_graph(&f, &w) - 1.0).abs() < 1e-12);
}

#[test]
fn behavioral_combines_burst_timing_diversity() {
    let w = BehavioralWeights::default();
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.burst_score = 1.0;
    f.timing_entropy = 0.5;
    f.vote_diversity = 0.5;
    // 0.5*1.0 + 0.3*0.5 + 0.2*0.5 = 0.75
    assert!((score_behavioral(&f, &w) - 0.75).abs() < 1e-12);
}

#[test]
fn timing_entropy_detects_regular_cadence() {
    let regular: Vec<i64> = (0..10).map(|i| i * 2_000).collect();
    assert_eq!(timing_entropy(&regular), 0.0);

    let human = [0, 3_000, 4_500, 21_000, 24_000, 70_000];
    assert!(timing_entropy(&human) > 0.5);
}

#[test]
fn vote_diversity_extremes() {
    assert_eq!(vote_diversity(50, 0), 0.0);
    assert!((vote_diversity(25, 25) - 1.0).abs() < f64::EPSILON);
    // Below the minimum sample: neutral.
    assert_eq!(vote_diversity(4, 0), 1.0);
}

// ============================================================
// Confidence — evidence completeness from the testable grid
// ============================================================

#[test]
fn confidence_bare_account_is_near_zero() {
    let inc = ConfidenceIncrements::default();
    let f = ActionFeatures::neutral(ActionKind::Submission);
    let c = estimate_confidence(&f, &inc);
    assert!((0.0..=0.2).contains(&c), "confidence {c}");
}

#[test]
fn confidence_mid_evidence_band() {
    let inc = ConfidenceIncrements::default();
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.long_window_count = 6;
    f.ip_fan_in = 3;
    f.account_age_days = 10.0;
    f.trust_score = 50;
    let c = estimate_confidence(&f, &inc);
    assert!((0.6..=0.9).contains(&c), "confidence {c}");
}

#[test]
fn confidence_full_evidence_band() {
    let inc = ConfidenceIncrements::default();
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.short_window_count = 2;
    f.long_window_count = 9;
    f.ip_fan_in = 3;
    f.ua_fan_in = 3;
    f.account_age_days = 60.0;
    f.trust_score = 70;
    f.timing_samples = 10;
    let c = estimate_confidence(&f, &inc);
    assert!((0.9..=1.0).contains(&c), "confidence {c}");
}

#[test]
fn confidence_always_within_unit_interval() {
    let mut inc = ConfidenceIncrements::default();
    // Inflated increments must still clamp.
    inc.velocity_history = 0.9;
    inc.network_history = 0.9;
    let mut f = ActionFeatures::neutral(ActionKind::Vote);
    f.long_window_count = 1;
    f.ip_fan_in = 1;
    assert_eq!(estimate_confidence(&f, &inc), 1.0);
}

// ============================================================
// Weight-space sweep: the blend stays within [0, 1]
// ============================================================

#[test]
fn overall_bounds_hold_across_weight_sweep() {
    // Sweep the blend across a few extreme-but-valid distributions and
    // feature corners; the clamps must hold everywhere.
    let distributions = [
        [1.0, 0.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0, 1.0],
        [0.2, 0.2, 0.2, 0.2, 0.2],
    ];

    let mut hostile = ActionFeatures::neutral(ActionKind::Vote);
    hostile.short_window_count = 1_000;
    hostile.long_window_count = 10_000;
    hostile.ip_fan_in = 500;
    hostile.ua_fan_in = 500;
    hostile.distinct_ips = 100;
    hostile.coordinated_vote_score = 1.0;
    hostile.voter_sample = 50;
    hostile.burst_score = 1.0;
    hostile.timing_entropy = 0.0;
    hostile.vote_diversity = 0.0;
    hostile.trust_score = 0;

    for [bv, bn, bt, bg, bb] in distributions {
        let mut cfg = ScoringConfig::new();
        cfg.blend.velocity = bv;
        cfg.blend.network = bn;
        cfg.blend.trust = bt;
        cfg.blend.graph = bg;
        cfg.blend.behavioral = bb;
        cfg.validate().unwrap();

        for f in [&hostile, &ActionFeatures::neutral(ActionKind::Vote)] {
            let velocity = score_velocity(
                f.short_window_count,
                f.long_window_count,
                cfg.velocity.short_threshold(f.action),
                cfg.velocity.long_threshold(f.action),
                &cfg.velocity,
            );
            let net = network_signals(f, &cfg.network);
            let overall = cfg.blend.velocity * velocity
                + cfg.blend.network * score_network(&net, &cfg.network)
                + cfg.blend.trust * cfg.trust.penalty(f.trust_score)
                + cfg.blend.graph * score_graph(f, &cfg.graph)
                + cfg.blend.behavioral * score_behavioral(f, &cfg.behavioral);
            assert!((0.0..=1.0).contains(&overall), "overall {overall}");
        }
    }
}

// ============================================================
// truncate_chars — UTF-8 safe truncation
// ============================================================

#[test]
fn truncate_within_limit() {
    assert_eq!(truncate_chars("curl/8.1", 20), "curl/8.1");
}

#[test]
fn truncate_over_limit_appends_ellipsis() {
    assert_eq!(truncate_chars("a-very-long-agent", 6), "a-very...");
}

#[test]
fn truncate_multibyte_safe() {
    let ua = "Mözillä/5.0 🦀";
    let result = truncate_chars(ua, 8);
    assert_eq!(result, "Mözillä/...");
}
