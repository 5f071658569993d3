// Replay pipeline: JSONL parsing, skip-and-warn on bad lines, summary
// counts.

use std::sync::Arc;

use palisade::pipeline::replay;
use palisade::scoring::{AnomalyScorer, ScoringConfig};
use palisade::store::MemoryStore;

fn fixture(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("palisade-test-{}-{}.jsonl", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn replay_scores_mixed_action_log() {
    let log = concat!(
        r#"{"action":"vote","user_id":"u1","clip_id":"c1","vote_value":1,"ip":"10.0.0.1","user_agent":"ua","trust_score":80,"account_created_at":"2025-01-01T00:00:00Z"}"#,
        "\n",
        r#"{"action":"follow","follower_id":"u1","following_id":"u2","ip":"10.0.0.1","user_agent":"ua","trust_score":80,"account_created_at":"2025-01-01T00:00:00Z"}"#,
        "\n",
        r#"{"action":"submission","user_id":"u2","ip":"10.0.0.2","user_agent":"ua","trust_score":60,"account_created_at":"2025-03-01T00:00:00Z"}"#,
        "\n",
        "not json at all\n",
        "\n",
    );
    let path = fixture("mixed", log);

    let scorer =
        AnomalyScorer::new(Arc::new(MemoryStore::new()), ScoringConfig::new()).unwrap();
    let summary = replay::run(&scorer, &path, 4).await.unwrap();
    std::fs::remove_file(&path).ok();

    // Blank lines are ignored entirely; the garbage line counts as a
    // parse failure, not a scored action.
    assert_eq!(summary.total_lines, 4);
    assert_eq!(summary.parse_failures, 1);
    assert_eq!(summary.scored, 3);
    assert_eq!(summary.validation_failures, 0);
}

#[tokio::test]
async fn replay_counts_validation_rejects_separately() {
    let log = concat!(
        r#"{"action":"vote","user_id":"","clip_id":"c1","vote_value":1,"ip":"10.0.0.1","user_agent":"ua","trust_score":80,"account_created_at":"2025-01-01T00:00:00Z"}"#,
        "\n",
        r#"{"action":"vote","user_id":"u1","clip_id":"c1","vote_value":-1,"ip":"10.0.0.1","user_agent":"ua","trust_score":80,"account_created_at":"2025-01-01T00:00:00Z"}"#,
        "\n",
    );
    let path = fixture("rejects", log);

    let scorer =
        AnomalyScorer::new(Arc::new(MemoryStore::new()), ScoringConfig::new()).unwrap();
    let summary = replay::run(&scorer, &path, 2).await.unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(summary.scored, 1);
    assert_eq!(summary.validation_failures, 1);
}

#[tokio::test]
async fn replay_missing_file_is_an_error() {
    let scorer =
        AnomalyScorer::new(Arc::new(MemoryStore::new()), ScoringConfig::new()).unwrap();
    let missing = std::env::temp_dir().join("palisade-test-definitely-missing.jsonl");
    assert!(replay::run(&scorer, &missing, 2).await.is_err());
}
