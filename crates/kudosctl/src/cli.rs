//! CLI - Command-line argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Kudos CLI
#[derive(Parser)]
#[command(name = "kudosctl")]
#[command(about = "Kudos - trigger rewards and inspect progression", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Daemon base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:7870")]
    pub url: String,

    /// Output JSON only
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reward generation for a finished round
    Reward {
        #[command(subcommand)]
        action: RewardCommands,
    },

    /// Compute XP for a round locally
    Xp {
        /// XP of one scored message (repeatable)
        #[arg(long = "message-xp", value_name = "XP")]
        message_xp: Vec<u64>,

        /// The user won the round
        #[arg(long)]
        won: bool,

        /// Win streak before this round
        #[arg(long, default_value_t = 0)]
        streak: u32,

        /// Total XP before this round
        #[arg(long = "xp-before", default_value_t = 0, allow_negative_numbers = true)]
        xp_before: i64,
    },

    /// Show the level for an XP total
    Level {
        xp: u64,
    },

    /// Ping the daemon
    Health,
}

#[derive(Subcommand)]
pub enum RewardCommands {
    /// Start generation for a round
    Start {
        /// Round id (generated when omitted)
        round_id: Option<String>,

        /// JSON file with the round context
        #[arg(long)]
        context: PathBuf,
    },

    /// Show the status of a round
    Status {
        round_id: String,

        /// Poll until the reward settles
        #[arg(long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_xp() {
        let cli = Cli::parse_from([
            "kudosctl", "xp", "--message-xp", "60", "--message-xp", "60", "--won", "--streak", "5",
            "--xp-before", "980",
        ]);
        match cli.command {
            Commands::Xp { message_xp, won, streak, xp_before } => {
                assert_eq!(message_xp, vec![60, 60]);
                assert!(won);
                assert_eq!(streak, 5);
                assert_eq!(xp_before, 980);
            }
            _ => panic!("expected xp command"),
        }
    }

    #[test]
    fn test_parse_reward_start_without_id() {
        let cli = Cli::parse_from(["kudosctl", "reward", "start", "--context", "round.json"]);
        match cli.command {
            Commands::Reward { action: RewardCommands::Start { round_id, context } } => {
                assert!(round_id.is_none());
                assert_eq!(context, PathBuf::from("round.json"));
            }
            _ => panic!("expected reward start"),
        }
    }
}
