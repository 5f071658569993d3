// Feature extractor — reads behavioral state into a snapshot, then records
// the current action back into it.
//
// Extraction runs inline with the user-facing action, so every store
// operation is wrapped in a short timeout and degrades to a neutral value
// on failure: a flaky state backend costs one feature, never the scoring
// call. Recording is unconditional — the behavioral footprint is written
// whether or not the caller ends up acting on the score.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::{ActionFeatures, ActionKind, FollowAction, SubmissionAction, VoteAction};
use crate::store::{StateStore, StoreResult};

use super::{
    timing_entropy, user_agent_key, vote_diversity, WindowSettings, TIMING_ENTROPY_SAMPLES,
    TIMING_LIST_MAX,
};

/// Per-op deadline for state reads and writes. A slow backend degrades the
/// affected feature instead of stalling the action pipeline.
const STORE_OP_TIMEOUT: Duration = Duration::from_millis(50);

/// A vote needs at least this many other recent voters before the
/// coordinated-vote fraction is worth computing.
const MIN_COORDINATION_VOTERS: usize = 3;

/// At most this many other voters' last-IPs are read per extraction.
const VOTER_SAMPLE_CAP: usize = 50;

/// Short-window counts above these trip the burst signal. Per action kind;
/// the scorer wires its configured values in at construction.
#[derive(Debug, Clone, Copy)]
pub struct BurstThresholds {
    pub vote: i64,
    pub follow: i64,
    pub submission: i64,
}

impl Default for BurstThresholds {
    fn default() -> Self {
        Self {
            vote: 8,
            follow: 12,
            submission: 4,
        }
    }
}

impl BurstThresholds {
    fn for_kind(&self, kind: ActionKind) -> i64 {
        match kind {
            ActionKind::Vote => self.vote,
            ActionKind::Follow => self.follow,
            ActionKind::Submission => self.submission,
        }
    }
}

fn burst_score(count: i64, threshold: i64) -> f64 {
    if threshold <= 0 || count <= threshold {
        return 0.0;
    }
    ((count - threshold) as f64 / threshold as f64).clamp(0.0, 1.0)
}

// ── State keys ────────────────────────────────────────────────────

fn vel_key(kind: ActionKind, window: &str, user_id: &str) -> String {
    format!("vel:{}:{}:{}", kind.as_str(), window, user_id)
}

fn ip_users_key(ip: &str) -> String {
    format!("ip:users:{ip}")
}

fn ua_users_key(user_agent: &str) -> String {
    format!("ua:users:{}", user_agent_key(user_agent))
}

fn last_ip_key(user_id: &str) -> String {
    format!("user:lastip:{user_id}")
}

fn user_ips_key(user_id: &str) -> String {
    format!("user:ips:{user_id}")
}

fn clip_voters_key(clip_id: &str) -> String {
    format!("clip:voters:{clip_id}")
}

fn follows_key(follower_id: &str) -> String {
    format!("follows:{follower_id}")
}

fn vote_count_key(user_id: &str, up: bool) -> String {
    if up {
        format!("votes:up:{user_id}")
    } else {
        format!("votes:down:{user_id}")
    }
}

fn times_key(kind: ActionKind, user_id: &str) -> String {
    format!("times:{}:{}", kind.as_str(), user_id)
}

/// Reads behavioral state into [`ActionFeatures`] and records actions back
/// into it.
pub struct FeatureExtractor {
    store: Arc<dyn StateStore>,
    windows: WindowSettings,
    bursts: BurstThresholds,
}

impl FeatureExtractor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self::with_settings(store, WindowSettings::default(), BurstThresholds::default())
    }

    pub fn with_settings(
        store: Arc<dyn StateStore>,
        windows: WindowSettings,
        bursts: BurstThresholds,
    ) -> Self {
        Self {
            store,
            windows,
            bursts,
        }
    }

    // ── Degrading store access ────────────────────────────────────
    //
    // Reads fall back to the caller-provided neutral value; writes are
    // fire-and-forget. Both log at warn so a degraded backend is visible
    // without ever failing the scoring call.

    async fn read_or<T>(
        &self,
        key: &str,
        fallback: T,
        op: impl Future<Output = StoreResult<T>>,
    ) -> T {
        match tokio::time::timeout(STORE_OP_TIMEOUT, op).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(key, error = %e, "State read failed, using neutral value");
                fallback
            }
            Err(_) => {
                warn!(key, "State read timed out, using neutral value");
                fallback
            }
        }
    }

    async fn record<T>(&self, key: &str, op: impl Future<Output = StoreResult<T>>) {
        match tokio::time::timeout(STORE_OP_TIMEOUT, op).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(key, error = %e, "State write failed, footprint incomplete"),
            Err(_) => warn!(key, "State write timed out, footprint incomplete"),
        }
    }

    // ── Shared feature reads ──────────────────────────────────────

    /// Velocity, fan-in, hopping, burst, and timing signals common to all
    /// action kinds.
    async fn base_features(
        &self,
        kind: ActionKind,
        user_id: &str,
        ip: &str,
        user_agent: &str,
        trust_score: u8,
        account_created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ActionFeatures {
        let mut f = ActionFeatures::neutral(kind);
        f.trust_score = trust_score;
        f.account_age_days = ((now - account_created_at).num_seconds().max(0) as f64) / 86_400.0;

        let short_key = vel_key(kind, "5m", user_id);
        let long_key = vel_key(kind, "1h", user_id);
        f.short_window_count = self.read_or(&short_key, 0, self.store.counter(&short_key)).await;
        f.long_window_count = self.read_or(&long_key, 0, self.store.counter(&long_key)).await;

        let ip_key = ip_users_key(ip);
        let ua_key = ua_users_key(user_agent);
        let ips_key = user_ips_key(user_id);
        f.ip_fan_in = self.read_or(&ip_key, 0, self.store.set_card(&ip_key)).await;
        f.ua_fan_in = self.read_or(&ua_key, 0, self.store.set_card(&ua_key)).await;
        f.distinct_ips = self.read_or(&ips_key, 0, self.store.set_card(&ips_key)).await;

        f.burst_score = burst_score(f.short_window_count, self.bursts.for_kind(kind));

        let tk = times_key(kind, user_id);
        let stamps: Vec<i64> = self
            .read_or(
                &tk,
                Vec::new(),
                self.store
                    .list_range(&tk, -(TIMING_ENTROPY_SAMPLES as i64), -1),
            )
            .await
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        f.timing_samples = stamps.len();
        f.timing_entropy = timing_entropy(&stamps);

        f
    }

    /// Fraction of the clip's other recent voters whose last IP is shared
    /// with at least one other recent voter. One hop deep, sample capped.
    async fn coordinated_vote_score(&self, clip_id: &str, user_id: &str) -> (f64, usize) {
        let key = clip_voters_key(clip_id);
        let voters: Vec<String> = self
            .read_or(&key, Vec::new(), self.store.set_members(&key))
            .await
            .into_iter()
            .filter(|v| v != user_id)
            .take(VOTER_SAMPLE_CAP)
            .collect();

        if voters.len() < MIN_COORDINATION_VOTERS {
            return (0.0, voters.len());
        }

        let mut last_ips = Vec::with_capacity(voters.len());
        for voter in &voters {
            let ip_key = last_ip_key(voter);
            last_ips.push(self.read_or(&ip_key, None, self.store.get(&ip_key)).await);
        }

        let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for ip in last_ips.iter().flatten() {
            *counts.entry(ip.as_str()).or_default() += 1;
        }
        let sharing: usize = counts.values().filter(|&&n| n >= 2).sum();

        (sharing as f64 / voters.len() as f64, voters.len())
    }

    // ── Shared recording ──────────────────────────────────────────

    /// The footprint every action leaves: velocity counters, fan-in sets,
    /// IP history, timing list.
    async fn record_base(&self, kind: ActionKind, user_id: &str, ip: &str, user_agent: &str, now: DateTime<Utc>) {
        let short_key = vel_key(kind, "5m", user_id);
        let long_key = vel_key(kind, "1h", user_id);
        self.record(&short_key, self.store.incr(&short_key, Some(self.windows.short_window)))
            .await;
        self.record(&long_key, self.store.incr(&long_key, Some(self.windows.long_window)))
            .await;

        let ip_key = ip_users_key(ip);
        let ua_key = ua_users_key(user_agent);
        self.record(&ip_key, self.store.set_add(&ip_key, user_id, Some(self.windows.identity_ttl)))
            .await;
        self.record(&ua_key, self.store.set_add(&ua_key, user_id, Some(self.windows.identity_ttl)))
            .await;

        let lip_key = last_ip_key(user_id);
        let ips_key = user_ips_key(user_id);
        self.record(&lip_key, self.store.set(&lip_key, ip, Some(self.windows.identity_ttl)))
            .await;
        self.record(&ips_key, self.store.set_add(&ips_key, ip, Some(self.windows.identity_ttl)))
            .await;

        let tk = times_key(kind, user_id);
        self.record(
            &tk,
            self.store
                .list_push(&tk, &now.timestamp_millis().to_string(), Some(self.windows.timing_ttl)),
        )
        .await;
        self.record(&tk, self.store.list_trim(&tk, -(TIMING_LIST_MAX as i64), -1))
            .await;
    }

    // ── Entry points ──────────────────────────────────────────────

    /// Feature snapshot for a vote, then record the vote.
    pub async fn extract_vote_features(&self, action: &VoteAction) -> ActionFeatures {
        let now = Utc::now();
        let mut f = self
            .base_features(
                ActionKind::Vote,
                &action.user_id,
                &action.ip,
                &action.user_agent,
                action.trust_score,
                action.account_created_at,
                now,
            )
            .await;

        let (coordination, sample) = self
            .coordinated_vote_score(&action.clip_id, &action.user_id)
            .await;
        f.coordinated_vote_score = coordination;
        f.voter_sample = sample;

        let up_key = vote_count_key(&action.user_id, true);
        let down_key = vote_count_key(&action.user_id, false);
        let up = self.read_or(&up_key, 0, self.store.counter(&up_key)).await;
        let down = self.read_or(&down_key, 0, self.store.counter(&down_key)).await;
        f.vote_diversity = vote_diversity(up, down);

        self.record_base(ActionKind::Vote, &action.user_id, &action.ip, &action.user_agent, now)
            .await;

        let voters_key = clip_voters_key(&action.clip_id);
        self.record(
            &voters_key,
            self.store
                .set_add(&voters_key, &action.user_id, Some(self.windows.clip_voters_ttl)),
        )
        .await;

        // Cumulative up/down counts are the one unbounded pair of keys;
        // diversity needs lifetime totals, not a window.
        let count_key = vote_count_key(&action.user_id, action.vote_value >= 0);
        self.record(&count_key, self.store.incr(&count_key, None)).await;

        f
    }

    /// Feature snapshot for a follow, then record the follow edge.
    pub async fn extract_follow_features(&self, action: &FollowAction) -> ActionFeatures {
        let now = Utc::now();
        let mut f = self
            .base_features(
                ActionKind::Follow,
                &action.follower_id,
                &action.ip,
                &action.user_agent,
                action.trust_score,
                action.account_created_at,
                now,
            )
            .await;

        // Does the target already follow the actor back? Read before the
        // current edge is written.
        let reverse_key = follows_key(&action.following_id);
        f.mutual_follow = self
            .read_or(
                &reverse_key,
                false,
                self.store.set_contains(&reverse_key, &action.follower_id),
            )
            .await;

        self.record_base(
            ActionKind::Follow,
            &action.follower_id,
            &action.ip,
            &action.user_agent,
            now,
        )
        .await;

        let edge_key = follows_key(&action.follower_id);
        self.record(
            &edge_key,
            self.store
                .set_add(&edge_key, &action.following_id, Some(self.windows.follow_ttl)),
        )
        .await;

        f
    }

    /// Feature snapshot for a content submission, then record it.
    pub async fn extract_submission_features(&self, action: &SubmissionAction) -> ActionFeatures {
        let now = Utc::now();
        let f = self
            .base_features(
                ActionKind::Submission,
                &action.user_id,
                &action.ip,
                &action.user_agent,
                action.trust_score,
                action.account_created_at,
                now,
            )
            .await;

        self.record_base(
            ActionKind::Submission,
            &action.user_id,
            &action.ip,
            &action.user_agent,
            now,
        )
        .await;

        f
    }
}
