//! Kudos CLI - trigger rewards and inspect progression

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use kudos_common::{KudosConfig, MessageEvent, RoundContext, RoundId, XpEngine};
use kudosctl::cli::{Cli, Commands, RewardCommands};
use kudosctl::client::KudosClient;
use kudosctl::display;
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Reward { action } => {
            let client = KudosClient::new(&cli.url);
            match action {
                RewardCommands::Start { round_id, context } => {
                    let raw = round_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                    let round_id = RoundId::parse(&raw)?;
                    let content = std::fs::read_to_string(&context)
                        .with_context(|| format!("reading {}", context.display()))?;
                    let context: RoundContext =
                        serde_json::from_str(&content).context("parsing round context")?;

                    let accepted = client.start_reward(&round_id, &context).await?;
                    if cli.json {
                        println!("{}", serde_json::json!({
                            "round_id": accepted.round_id,
                            "accepted": accepted.accepted,
                            "status_url": accepted.status_url,
                        }));
                    } else {
                        println!("{} reward generation for {}", "Started".green().bold(), accepted.round_id);
                        println!("  poll: kudosctl reward status {} --wait", accepted.round_id);
                    }
                }
                RewardCommands::Status { round_id, wait, timeout_secs } => {
                    let round_id = RoundId::parse(&round_id)?;
                    let deadline = Instant::now() + Duration::from_secs(timeout_secs);
                    loop {
                        let status = client.reward_status(&round_id).await?;
                        let Some(status) = status else {
                            return Err(anyhow!("Round {} is unknown to the daemon", round_id));
                        };
                        if !wait || status.is_settled() || Instant::now() >= deadline {
                            if cli.json {
                                println!("{}", serde_json::to_string_pretty(&status)?);
                            } else {
                                print!("{}", display::format_status(&status));
                            }
                            break;
                        }
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
            }
        }

        Commands::Xp { message_xp, won, streak, xp_before } => {
            let engine = local_engine()?;
            let messages: Vec<MessageEvent> = message_xp.into_iter().map(MessageEvent::new).collect();
            let summary = engine.compute_round_xp(&messages, won, streak, xp_before);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", display::format_xp(&summary));
            }
        }

        Commands::Level { xp } => {
            let progress = local_engine()?.level_for_xp(xp);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&progress)?);
            } else {
                println!("{}", display::format_level(&progress));
            }
        }

        Commands::Health => {
            let health = KudosClient::new(&cli.url).health().await?;
            if cli.json {
                println!("{}", health);
            } else {
                println!(
                    "{} kudosd v{} up {}s, tracking {} rounds",
                    "OK".green().bold(),
                    health["version"].as_str().unwrap_or("?"),
                    health["uptime_secs"],
                    health["rounds_tracked"]
                );
            }
        }
    }

    Ok(())
}

/// XP engine tuned by the local config when one is present
fn local_engine() -> Result<XpEngine> {
    match KudosConfig::load(None) {
        Ok(config) => Ok(XpEngine::from_config(&config.progression)?),
        Err(_) => Ok(XpEngine::default()),
    }
}
