//! Terminal rendering of reward and progression values.

use kudos_common::progression::streak::BASIS_POINTS;
use kudos_common::progression::StreakMultiplier;
use kudos_common::reward::AssetRecord;
use kudos_common::{AssetKind, AssetState, LevelProgress, RewardStage, RewardStatus, RoundXpSummary};
use owo_colors::OwoColorize;
use std::fmt::Write;

fn stage_label(stage: RewardStage) -> String {
    match stage {
        RewardStage::Completed => stage.as_str().green().bold().to_string(),
        RewardStage::Partial => stage.as_str().yellow().bold().to_string(),
        RewardStage::Failed => stage.as_str().red().bold().to_string(),
        RewardStage::Pending | RewardStage::Generating => stage.as_str().cyan().to_string(),
    }
}

fn asset_line(kind: AssetKind, record: &AssetRecord) -> String {
    let state = match record.state {
        AssetState::NotStarted => "not started".dimmed().to_string(),
        AssetState::InProgress => "in progress".cyan().to_string(),
        AssetState::Succeeded => "ok".green().to_string(),
        AssetState::Failed => "failed".red().to_string(),
    };
    let mut line = format!("  {:<6} {}", kind.as_str(), state);
    if let Some(ms) = record.duration_ms() {
        let _ = write!(line, " ({}ms)", ms);
    }
    if let Some(result) = &record.result {
        let _ = write!(line, "  {}", result);
    }
    if let Some(error) = &record.error {
        let _ = write!(line, "  {}", error.red());
    }
    line
}

pub fn format_status(status: &RewardStatus) -> String {
    let mut out = format!("Round {}: {}\n", status.round_id.bold(), stage_label(status.stage));
    for kind in AssetKind::ALL {
        out.push_str(&asset_line(kind, status.assets.get(kind)));
        out.push('\n');
    }
    if let Some(result) = &status.result {
        let _ = writeln!(out, "  total  {}ms", result.generation_time_ms);
    }
    out
}

pub fn format_level(progress: &LevelProgress) -> String {
    let mut out = format!(
        "Level {} {}",
        progress.level.to_string().bold(),
        format!("({})", progress.title()).dimmed()
    );
    if progress.xp_to_next == 0 {
        out.push_str("  max level");
    } else {
        let _ = write!(
            out,
            "  {} xp into level, {} to next ({:.1}%)",
            progress.xp_into_level, progress.xp_to_next, progress.progress_percent
        );
    }
    out
}

pub fn format_xp(summary: &RoundXpSummary) -> String {
    let multiplier =
        StreakMultiplier::from_basis_points((summary.streak_multiplier * f64::from(BASIS_POINTS)).round() as u32);
    let mut out = String::new();
    let _ = writeln!(
        out,
        "XP gained: {}  ({} message + {} win) x {}",
        format!("+{}", summary.total_xp_gained).green().bold(),
        summary.message_xp_sum,
        summary.win_xp,
        multiplier
    );
    let _ = writeln!(out, "Total: {} -> {}", summary.xp_before, summary.xp_after);
    let _ = writeln!(out, "Streak: {} -> {}", summary.streak_before, summary.streak_after);
    if summary.leveled_up() {
        let _ = writeln!(
            out,
            "{} {} -> {}",
            "Level up!".yellow().bold(),
            summary.level_before,
            summary.level_after
        );
    }
    out.push_str(&format_level(&summary.progress_after));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kudos_common::{MessageEvent, RoundId, XpEngine};

    #[test]
    fn test_format_xp_level_up() {
        let summary =
            XpEngine::default().compute_round_xp(&[MessageEvent::new(120)], true, 5, 980);
        let out = format_xp(&summary);
        assert!(out.contains("+204"), "{}", out);
        assert!(out.contains("1.20x"), "{}", out);
        assert!(out.contains("980 -> 1184"), "{}", out);
        assert!(out.contains("Level up!"), "{}", out);
    }

    #[test]
    fn test_format_level_max() {
        let progress = XpEngine::default().level_for_xp(u64::MAX);
        assert!(format_level(&progress).contains("max level"));
        assert!(format_level(&progress).contains("Legend"));
    }

    #[test]
    fn test_format_pending_status() {
        let status = RewardStatus::new(RoundId::parse("r1").unwrap(), Default::default());
        let out = format_status(&status);
        assert!(out.contains("pending"), "{}", out);
        assert!(out.contains("not started"), "{}", out);
    }
}
