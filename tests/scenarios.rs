// End-to-end scoring scenarios through the public API: a hostile
// vote-farm account, a long-standing benign account, the anomaly/auto-flag
// gap, and concurrent scoring over one shared store.

use std::sync::Arc;

use chrono::Utc;

use palisade::models::{Severity, SubmissionAction, VoteAction};
use palisade::scoring::{AnomalyScorer, ScoringConfig};
use palisade::store::MemoryStore;

fn vote_from(
    user: &str,
    clip: &str,
    ip: &str,
    ua: &str,
    trust: u8,
    age_days: i64,
) -> VoteAction {
    VoteAction {
        user_id: user.to_string(),
        clip_id: clip.to_string(),
        vote_value: 1,
        ip: ip.to_string(),
        user_agent: ua.to_string(),
        trust_score: trust,
        account_created_at: Utc::now() - chrono::Duration::days(age_days),
    }
}

// ============================================================
// Scenario A: young low-trust account in a vote farm
// ============================================================

#[tokio::test]
async fn vote_farm_account_is_flagged_high() {
    let store = Arc::new(MemoryStore::new());
    let scorer = AnomalyScorer::new(store, ScoringConfig::new()).unwrap();

    // Ten other accounts share the farm's exit IP and client, all piling
    // onto the same clip.
    for i in 0..10 {
        let bot = vote_from(
            &format!("farm-{i}"),
            "clip-hot",
            "198.51.100.7",
            "FarmClient/1.0",
            30,
            3,
        );
        scorer.score_vote_action(&bot).await.unwrap();
    }

    // The account under test: two days old, trust 20, hammering votes
    // from the shared IP.
    let suspect = vote_from("suspect", "clip-hot", "198.51.100.7", "FarmClient/1.0", 20, 2);
    let mut last = scorer.score_vote_action(&suspect).await.unwrap();
    for _ in 0..29 {
        last = scorer.score_vote_action(&suspect).await.unwrap();
    }

    assert!(last.is_anomaly);
    assert!(last.overall >= 0.5, "overall {}", last.overall);
    assert!(
        last.severity >= Severity::High,
        "severity {}",
        last.severity
    );
    assert!(!last.reason_codes.is_empty());

    // The evidence is specific: shared infrastructure and velocity both
    // show up in the reasons.
    let reasons: Vec<&str> = last.reason_codes.iter().map(|r| r.as_str()).collect();
    assert!(reasons.contains(&"shared_ip"));
    assert!(reasons.contains(&"high_velocity"));
    assert!(reasons.contains(&"low_trust"));
    assert!(reasons.contains(&"coordinated_voting"));
}

// ============================================================
// Scenario B: established account at normal cadence
// ============================================================

#[tokio::test]
async fn established_account_voting_normally_stays_clear() {
    let store = Arc::new(MemoryStore::new());
    let scorer = AnomalyScorer::new(store, ScoringConfig::new()).unwrap();

    let mut last = None;
    for clip in ["c1", "c2", "c3"] {
        let action = vote_from("regular", clip, "203.0.113.50", "Mozilla/5.0", 80, 180);
        last = Some(scorer.score_vote_action(&action).await.unwrap());
    }
    let score = last.unwrap();

    assert!(score.overall < 0.5, "overall {}", score.overall);
    assert!(!score.should_auto_flag);
    assert_eq!(score.severity, Severity::None);
    assert!(score.reason_codes.is_empty());
}

// ============================================================
// Detection vs auto-flag gap
// ============================================================

#[tokio::test]
async fn anomalous_but_below_the_auto_flag_bar() {
    // Tighten the vote threshold so moderate repetition alone crosses
    // detection without reaching enforcement territory.
    let mut cfg = ScoringConfig::new();
    cfg.velocity.vote_short_threshold = 1;
    cfg.velocity.vote_long_threshold = 2;

    let store = Arc::new(MemoryStore::new());
    let scorer = AnomalyScorer::new(store, cfg).unwrap();

    // High trust, unique IP: velocity is the only elevated signal.
    let action = vote_from("eager", "c1", "192.0.2.9", "Mozilla/5.0", 90, 365);
    let mut last = scorer.score_vote_action(&action).await.unwrap();
    for _ in 0..4 {
        last = scorer.score_vote_action(&action).await.unwrap();
    }

    assert!(last.is_anomaly, "overall {}", last.overall);
    assert!(!last.should_auto_flag, "overall {}", last.overall);
    assert!(last.severity < Severity::High);
}

// ============================================================
// Confidence tracks evidence, not suspicion
// ============================================================

#[tokio::test]
async fn brand_new_account_scores_with_low_confidence() {
    let store = Arc::new(MemoryStore::new());
    let scorer = AnomalyScorer::new(store, ScoringConfig::new()).unwrap();

    // First-ever action from an account created moments ago, unknown
    // trust: almost no evidence dimensions are available.
    let action = SubmissionAction {
        user_id: "newborn".to_string(),
        ip: "10.1.1.1".to_string(),
        user_agent: "agent".to_string(),
        trust_score: 0,
        account_created_at: Utc::now(),
    };
    let first = scorer.score_submission_action(&action).await.unwrap();
    assert!(first.confidence <= 0.2, "confidence {}", first.confidence);

    // After a few observed actions the evidence accumulates.
    for _ in 0..4 {
        scorer.score_submission_action(&action).await.unwrap();
    }
    let later = scorer.score_submission_action(&action).await.unwrap();
    assert!(later.confidence > first.confidence);
}

// ============================================================
// Concurrent scoring over one shared store
// ============================================================

#[tokio::test]
async fn concurrent_users_score_independently() {
    let store = Arc::new(MemoryStore::new());
    let scorer = Arc::new(AnomalyScorer::new(store, ScoringConfig::new()).unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let scorer = Arc::clone(&scorer);
        handles.push(tokio::spawn(async move {
            let action = vote_from(
                &format!("user-{i}"),
                &format!("clip-{i}"),
                &format!("10.0.{i}.1"),
                "Mozilla/5.0",
                75,
                90,
            );
            let mut last = scorer.score_vote_action(&action).await.unwrap();
            for _ in 0..4 {
                last = scorer.score_vote_action(&action).await.unwrap();
            }
            last
        }));
    }

    for h in handles {
        let score = h.await.unwrap();
        // Each isolated user saw exactly its own four prior votes.
        assert_eq!(score.features.short_window_count, 4);
        assert_eq!(score.features.ip_fan_in, 1);
        assert!((0.0..=1.0).contains(&score.overall));
        assert!((0.0..=1.0).contains(&score.confidence));
    }
}
