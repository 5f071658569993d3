use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use palisade::config::Config;
use palisade::models::{FollowAction, SubmissionAction, VoteAction};
use palisade::output::terminal;
use palisade::pipeline::replay;
use palisade::scoring::AnomalyScorer;
use palisade::store::MemoryStore;

/// Palisade: real-time abuse scoring for social content platforms.
///
/// Scores votes, follows, and content submissions against shared
/// behavioral state and reports an overall risk score, severity tier, and
/// the reasons behind them.
#[derive(Parser)]
#[command(name = "palisade", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSONL action log through the scorer
    Replay {
        /// Path to the action log (one JSON action per line)
        path: PathBuf,

        /// Number of actions to score in parallel (default: 8)
        #[arg(long, default_value = "8")]
        concurrency: usize,
    },

    /// Score a single vote
    Vote {
        /// The voting user's ID
        user: String,

        /// The clip being voted on
        clip: String,

        /// +1 for an upvote, -1 for a downvote
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        value: i8,

        #[command(flatten)]
        context: ActionContext,
    },

    /// Score a single follow
    Follow {
        /// The following user's ID
        follower: String,

        /// The user being followed
        following: String,

        #[command(flatten)]
        context: ActionContext,
    },

    /// Score a single content submission
    Submit {
        /// The submitting user's ID
        user: String,

        #[command(flatten)]
        context: ActionContext,
    },
}

/// Request context shared by the one-off scoring commands.
#[derive(clap::Args)]
struct ActionContext {
    /// Source IP address
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,

    /// User agent string
    #[arg(long, default_value = "palisade-cli/0.1")]
    user_agent: String,

    /// Trust score from the identity subsystem (0-100)
    #[arg(long, default_value = "50")]
    trust: u8,

    /// Account age in days
    #[arg(long, default_value = "30")]
    age_days: i64,
}

impl ActionContext {
    fn created_at(&self) -> chrono::DateTime<Utc> {
        Utc::now() - chrono::Duration::days(self.age_days)
    }
}

/// How often the in-memory store prunes expired state.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("palisade=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let store = Arc::new(MemoryStore::new());
    tokio::spawn(Arc::clone(&store).sweep_loop(SWEEP_INTERVAL));

    let scorer = AnomalyScorer::new(store, config.scoring)?;

    match cli.command {
        Commands::Replay { path, concurrency } => {
            println!("Replaying {}...", path.display());
            let summary = replay::run(&scorer, &path, concurrency).await?;
            info!(
                scored = summary.scored,
                anomalies = summary.anomalies,
                auto_flagged = summary.auto_flagged,
                "Replay complete"
            );
            terminal::display_replay_summary(&summary);
            if summary.scored == 0 {
                println!(
                    "{}",
                    "No actions scored. Is the log one JSON action per line?".dimmed()
                );
            }
        }

        Commands::Vote {
            user,
            clip,
            value,
            context,
        } => {
            let action = VoteAction {
                user_id: user.clone(),
                clip_id: clip.clone(),
                vote_value: value,
                ip: context.ip.clone(),
                user_agent: context.user_agent.clone(),
                trust_score: context.trust,
                account_created_at: context.created_at(),
            };
            let score = scorer.score_vote_action(&action).await?;
            terminal::display_score(&format!("vote {user} -> clip {clip}"), &score);
        }

        Commands::Follow {
            follower,
            following,
            context,
        } => {
            let action = FollowAction {
                follower_id: follower.clone(),
                following_id: following.clone(),
                ip: context.ip.clone(),
                user_agent: context.user_agent.clone(),
                trust_score: context.trust,
                account_created_at: context.created_at(),
            };
            let score = scorer.score_follow_action(&action).await?;
            terminal::display_score(&format!("follow {follower} -> {following}"), &score);
        }

        Commands::Submit { user, context } => {
            let action = SubmissionAction {
                user_id: user.clone(),
                ip: context.ip.clone(),
                user_agent: context.user_agent.clone(),
                trust_score: context.trust,
                account_created_at: context.created_at(),
            };
            let score = scorer.score_submission_action(&action).await?;
            terminal::display_score(&format!("submission by {user}"), &score);
        }
    }

    Ok(())
}
