//! Haddaf CLI - drive goal tracking against a local JSON store.

use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use clap::{Parser, Subcommand};
use haddaf_core::{GoalId, GoalStatus, MetricType, PerformanceFeedback, PlayerGoal, PlayerId};
use haddaf_storage::JsonGoalRepository;
use haddaf_tracker::{
    GoalTracker, NotificationDispatch, TracingNotifier, TrackerConfig, WebhookConfig,
    WebhookNotifier,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "haddaf")]
#[command(about = "Player goal tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Storage path for goal data
    #[arg(short, long, default_value = ".haddaf")]
    storage: std::path::PathBuf,

    /// Webhook receiving goal notifications (logged only when unset)
    #[arg(long)]
    webhook: Option<String>,

    /// Don't notify when a goal is dismissed
    #[arg(long)]
    quiet_delete: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a new goal
    Set {
        /// Player ID
        player: String,
        /// Metric (dribble, pass, shoot)
        metric: MetricType,
        /// Actions required per video (0-5)
        #[arg(allow_negative_numbers = true)]
        target: i64,
    },
    /// Change the target of an active goal
    Edit {
        /// Goal ID
        id: GoalId,
        /// New target (0-5)
        #[arg(allow_negative_numbers = true)]
        target: i64,
    },
    /// Record the counts from one processed video
    Observe {
        /// Player ID
        player: String,
        /// Dribbles counted
        #[arg(long)]
        dribble: Option<u32>,
        /// Passes counted
        #[arg(long)]
        pass: Option<u32>,
        /// Shots counted
        #[arg(long)]
        shoot: Option<u32>,
        /// Source video ID
        #[arg(long)]
        video: Option<String>,
    },
    /// List a player's goals
    List {
        /// Player ID
        player: String,
    },
    /// Show metrics the player can set a goal for
    Metrics {
        /// Player ID
        player: String,
    },
    /// Remove a goal
    Dismiss {
        /// Goal ID
        id: GoalId,
    },
    /// Replace an achieved goal with a new one for the same metric
    Reset {
        /// Goal ID
        id: GoalId,
        /// New target (0-5)
        #[arg(allow_negative_numbers = true)]
        target: i64,
    },
    /// Print the player's goals on every change until interrupted
    Watch {
        /// Player ID
        player: String,
        /// How often to re-read the storage directory, in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let repository = Arc::new(JsonGoalRepository::new(&cli.storage).await?);
    let notifier: Arc<dyn NotificationDispatch> = match &cli.webhook {
        Some(url) => Arc::new(WebhookNotifier::new(WebhookConfig::new(url))?),
        None => Arc::new(TracingNotifier),
    };
    // The process exits right after the command, so notifications are awaited.
    let tracker = GoalTracker::new(repository.clone(), notifier).with_config(TrackerConfig {
        notify_on_delete: !cli.quiet_delete,
        background_notifications: false,
    });

    match cli.command {
        Commands::Set { player, metric, target } => {
            let goal = tracker.set_goal(&PlayerId::new(player), metric, target).await?;
            println!("Set goal: {}", format_goal(&goal));
        }
        Commands::Edit { id, target } => {
            let goal = tracker.edit_target(id, target).await?;
            println!("Updated goal: {}", format_goal(&goal));
        }
        Commands::Observe { player, dribble, pass, shoot, video } => {
            let mut feedback = PerformanceFeedback::new(PlayerId::new(player), chrono::Utc::now());
            for metric in MetricType::ALL {
                let count = match metric {
                    MetricType::Dribble => dribble,
                    MetricType::Pass => pass,
                    MetricType::Shoot => shoot,
                };
                if let Some(count) = count {
                    feedback = feedback.with_count(metric, count);
                }
            }
            if let Some(video) = video {
                feedback = feedback.with_video(video);
            }

            let report = tracker.record_feedback(&feedback).await?;
            for goal in &report.achieved {
                println!("Achieved: {}", format_goal(goal));
            }
            println!(
                "{} achieved, {} unchanged",
                report.achieved.len(),
                report.unchanged.len()
            );
        }
        Commands::List { player } => {
            let goals = tracker.goals(&PlayerId::new(player)).await?;
            println!("Goals ({})", goals.len());
            for goal in goals {
                println!("  {}", format_goal(&goal));
            }
        }
        Commands::Metrics { player } => {
            let metrics = tracker.selectable_metrics(&PlayerId::new(player)).await?;
            if metrics.is_empty() {
                println!("Every metric already has an active goal");
            }
            for metric in metrics {
                println!("  {} ({})", metric, metric.label());
            }
        }
        Commands::Dismiss { id } => {
            let goal = tracker.dismiss_goal(id).await?;
            println!("Dismissed {} goal {}", goal.metric, goal.id);
        }
        Commands::Reset { id, target } => {
            let goal = tracker.reset_goal(id, target).await?;
            println!("New goal: {}", format_goal(&goal));
        }
        Commands::Watch { player, poll_ms } => {
            let mut board = tracker.board(PlayerId::new(player));
            board.attach().await?;
            // Other haddaf processes write the same directory.
            let watcher = repository.watch_disk(Duration::from_millis(poll_ms.max(1)));
            info!("Watching goals for {}", board.owner());
            print_board(board.goals());

            loop {
                tokio::select! {
                    changed = board.refresh() => {
                        if !changed {
                            break;
                        }
                        print_board(board.goals());
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            watcher.abort();
        }
    }

    Ok(())
}

fn print_board(goals: &[PlayerGoal]) {
    println!("--- {} goal(s)", goals.len());
    for goal in goals {
        println!("  {}", format_goal(goal));
    }
}

fn format_goal(goal: &PlayerGoal) -> String {
    let status = match goal.status {
        GoalStatus::Active => "ACTIVE".to_string(),
        GoalStatus::Achieved => match goal.achieved_at {
            Some(at) => format!("ACHIEVED {}", at.format("%Y-%m-%d %H:%M")),
            None => "ACHIEVED".to_string(),
        },
    };
    format!(
        "{} | {} | target {} | {}",
        goal.id,
        goal.metric.label(),
        goal.target_count,
        status
    )
}
