// Plain-text and CSV rendering of scores, standings and the score log.

use std::collections::HashMap;
use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

use gametourney_core::db::{ScoreRecord, Standing};
use gametourney_core::models::{PlayerId, TourneyScore};

const RULE_WIDTH: usize = 20;

pub fn rule(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\n{}", "-".repeat(RULE_WIDTH))
}

/// One line per player: `name -> metascore (raw)`, best metascore first.
pub fn write_game_scores<'a>(
    out: &mut impl Write,
    names: &HashMap<PlayerId, String>,
    scores: impl IntoIterator<Item = &'a TourneyScore>,
) -> io::Result<()> {
    let mut scores: Vec<&TourneyScore> = scores.into_iter().collect();
    scores.sort_by(|a, b| {
        b.tournament_score
            .total_cmp(&a.tournament_score)
            .then(a.player_id.cmp(&b.player_id))
    });
    for score in scores {
        let name = names
            .get(&score.player_id)
            .map(String::as_str)
            .unwrap_or("<unknown player>");
        writeln!(
            out,
            "{name} ->  {} ({} {})",
            format_score(score.tournament_score),
            format_score(score.game_score),
            score.game_score_type
        )?;
    }
    Ok(())
}

pub fn write_standings(out: &mut impl Write, standings: &[Standing]) -> io::Result<()> {
    if standings.is_empty() {
        return writeln!(out, "No players registered.");
    }
    for standing in standings {
        writeln!(
            out,
            "{} -> avg: {}, total: {}, games: {}",
            standing.player.name,
            format_score(standing.average_score),
            format_score(standing.total_score),
            standing.game_count
        )?;
    }
    Ok(())
}

/// `| key: value ` pairs, one record per line.
pub fn write_log(out: &mut impl Write, records: &[ScoreRecord]) -> io::Result<()> {
    for r in records {
        writeln!(
            out,
            "| name: {} | score_id: {} | game_number: {} | game: {} | hours: {} | player_id: {} | score: {} | points_or_rank: {} | game_score_type: {} | recorded_at: {} ",
            r.player_name,
            r.score_id,
            r.game_number,
            r.game,
            r.hours,
            r.player_id,
            format_score(r.score),
            r.points_or_rank,
            r.game_score_type,
            r.recorded_at
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct LogRow<'a> {
    score_id: i64,
    game_number: i64,
    game: &'a str,
    hours: f64,
    player_id: PlayerId,
    name: &'a str,
    score: f64,
    points_or_rank: f64,
    game_score_type: &'static str,
    recorded_at: &'a str,
}

/// The score log as CSV with a header row.
pub fn write_log_csv(out: impl Write, records: &[ScoreRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for r in records {
        writer
            .serialize(LogRow {
                score_id: r.score_id,
                game_number: r.game_number,
                game: &r.game,
                hours: r.hours,
                player_id: r.player_id,
                name: &r.player_name,
                score: r.score,
                points_or_rank: r.points_or_rank,
                game_score_type: r.game_score_type.as_str(),
                recorded_at: &r.recorded_at,
            })
            .with_context(|| format!("failed to write score {} as CSV", r.score_id))?;
    }
    writer.flush().context("failed to flush CSV output")?;
    Ok(())
}

/// Scores rounded to three decimals, without trailing zeros.
pub fn format_score(value: f64) -> String {
    let rounded = format!("{value:.3}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
