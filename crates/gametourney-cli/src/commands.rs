// Interactive command implementations. Each command runs against one
// prompter, so whole sessions can be scripted in tests.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use gametourney_core::config::{validate_tournament_config, Config};
use gametourney_core::context::{get_current_tournament, set_current_tournament};
use gametourney_core::db::Database;
use gametourney_core::models::{
    Player, PlayerId, ScoreType, Tournament, TournamentConfig, TourneyScore,
};
use gametourney_core::scoring::{recalculate_game, scorer_for, Scorer};

use crate::output::{self, rule};
use crate::prompt::Prompter;

pub struct Session<'a, R, W> {
    config: &'a Config,
    db: &'a Database,
    prompter: Prompter<R, W>,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(config: &'a Config, db: &'a Database, prompter: Prompter<R, W>) -> Self {
        Self {
            config,
            db,
            prompter,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.prompter.into_output()
    }

    fn out(&mut self) -> &mut W {
        self.prompter.output()
    }

    fn current_tournament(&self) -> Result<Tournament> {
        let tournament = get_current_tournament(&self.config.context_path())?;
        Ok(tournament)
    }

    // ------------------------------------------------------------------
    // Tournaments
    // ------------------------------------------------------------------

    pub fn new_tournament(&mut self) -> Result<Tournament> {
        let defaults = self.config.defaults;
        let p = &mut self.prompter;

        let name = p.required_text("Tournament name")?;
        let rank_multiplier =
            p.parsed("Rank multiplier", Some(defaults.rank_multiplier), positive)?;
        let duration_multiplier = p.parsed(
            "Duration multiplier (per hour played)",
            Some(defaults.duration_multiplier),
            positive,
        )?;
        let apply_bonus_or_penalty = p.confirm(
            "Apply a bonus/penalty for distance from the average in points games?",
            defaults.apply_bonus_or_penalty,
        )?;
        let participation_award = p.parsed(
            "Participation award (0 for none)",
            Some(defaults.participation_award),
            non_negative,
        )?;

        let tournament_config = TournamentConfig {
            rank_multiplier,
            duration_multiplier,
            apply_bonus_or_penalty,
            participation_award,
        };
        validate_tournament_config(&tournament_config, "")?;

        let mut names: Vec<String> = Vec::new();
        loop {
            let answer = p.text("Player name (leave blank to finish)", None)?;
            if answer.is_empty() {
                if names.is_empty() {
                    writeln!(p.output(), "At least one player is required.")?;
                    continue;
                }
                break;
            }
            if names.contains(&answer) {
                writeln!(p.output(), "{answer} is already in this tournament.")?;
                continue;
            }
            names.push(answer);
        }

        let tournament = self
            .db
            .create_tournament(&name, Utc::now(), &tournament_config)?;
        self.db.insert_players(tournament.id, &names)?;
        set_current_tournament(&self.config.context_path(), &tournament)?;

        writeln!(
            self.out(),
            "Created tournament {} with {} players. It is now the current tournament.",
            tournament.name,
            names.len()
        )?;
        Ok(tournament)
    }

    pub fn set_tournament(&mut self) -> Result<Tournament> {
        let tournaments = self.db.list_tournaments()?;
        if tournaments.is_empty() {
            bail!("no tournaments found; run `new-tournament` first");
        }
        let options: Vec<String> = tournaments
            .iter()
            .map(|t| format!("{} (started {})", t.name, t.start_date.format("%Y-%m-%d")))
            .collect();
        let index = self.prompter.choose("Which tournament?", &options)?;
        let tournament = tournaments[index].clone();

        set_current_tournament(&self.config.context_path(), &tournament)?;
        writeln!(self.out(), "Current tournament: {}", tournament.name)?;
        Ok(tournament)
    }

    // ------------------------------------------------------------------
    // Scores
    // ------------------------------------------------------------------

    pub fn add_scores(&mut self) -> Result<()> {
        let tournament = self.current_tournament()?;
        let roster = self.db.get_players(tournament.id)?;
        if roster.is_empty() {
            bail!("tournament {} has no players", tournament.name);
        }

        let p = &mut self.prompter;
        let game = p.required_text("What game was played?")?;
        let hours = p.parsed("How many hours did it take?", None, positive)?;

        let players: Vec<Player> = if p.confirm("Did all players play?", true)? {
            roster.clone()
        } else {
            let mut playing = Vec::new();
            for player in &roster {
                if p.confirm(&format!("Did {} play?", player.name), true)? {
                    playing.push(player.clone());
                }
            }
            playing
        };
        if players.is_empty() {
            writeln!(p.output(), "Nobody played; nothing to record.")?;
            return Ok(());
        }

        let score_type = if p.confirm("Did the game have points?", true)? {
            ScoreType::Points
        } else {
            ScoreType::Rank
        };

        let scorer = scorer_for(score_type, &tournament.config, players, hours);
        let scores = scorer.score(&mut *p)?;

        let names = player_names(&roster);
        let out = p.output();
        rule(out)?;
        writeln!(out, "{game}: {}", scorer.get_formula())?;
        output::write_game_scores(out, &names, scores.values())?;
        rule(out)?;

        if !p.confirm("Record these scores?", true)? {
            writeln!(p.output(), "Scores discarded.")?;
            return Ok(());
        }

        let game_number = self
            .db
            .record_scores(tournament.id, &game, hours, scores.values())
            .context("failed to record game scores")?;
        info!(tournament_id = tournament.id, game = %game, game_number, "scores added");
        self.write_standings(&tournament)
    }

    pub fn standings(&mut self) -> Result<()> {
        let tournament = self.current_tournament()?;
        self.write_standings(&tournament)
    }

    fn write_standings(&mut self, tournament: &Tournament) -> Result<()> {
        let standings = self.db.get_standings(tournament.id)?;
        let out = self.out();
        writeln!(out, "Standings for {}:", tournament.name)?;
        output::write_standings(out, &standings)?;
        Ok(())
    }

    pub fn log(&mut self, as_csv: bool) -> Result<()> {
        let tournament = self.current_tournament()?;
        let records = self.db.get_all_records(tournament.id)?;
        if as_csv {
            output::write_log_csv(self.out(), &records)?;
        } else if records.is_empty() {
            writeln!(self.out(), "No scores recorded for {} yet.", tournament.name)?;
        } else {
            output::write_log(self.out(), &records)?;
        }
        Ok(())
    }

    /// Re-derive every recorded metascore from its raw result under the
    /// tournament's configuration, and save the ones that changed.
    pub fn recalc(&mut self) -> Result<()> {
        let tournament = self.current_tournament()?;
        let names = player_names(&self.db.get_players(tournament.id)?);
        let games = self.db.load_games(tournament.id)?;

        let mut changed: Vec<TourneyScore> = Vec::new();
        for game in games {
            let before: HashMap<Option<i64>, f64> = game
                .scores
                .iter()
                .map(|s| (s.score_id, s.tournament_score))
                .collect();
            let updated =
                recalculate_game(&tournament.config, game.players, game.hours, game.scores)
                    .with_context(|| {
                        format!(
                            "failed to recalculate game {} ({})",
                            game.game_number, game.game
                        )
                    })?;

            let out = self.out();
            writeln!(out, "Game {}: {} ({}h)", game.game_number, game.game, game.hours)?;
            output::write_game_scores(out, &names, &updated)?;

            changed.extend(
                updated
                    .into_iter()
                    .filter(|s| before.get(&s.score_id) != Some(&s.tournament_score)),
            );
        }

        if changed.is_empty() {
            writeln!(self.out(), "All scores are up to date.")?;
            return Ok(());
        }

        writeln!(self.out(), "{} scores would change.", changed.len())?;
        if !self.prompter.confirm("Save recalculated scores?", true)? {
            writeln!(self.out(), "Recalculation discarded.")?;
            return Ok(());
        }

        let updated = self.db.update_scores(&changed)?;
        if updated != changed.len() {
            warn!(expected = changed.len(), updated, "some recalculated scores were not saved");
        }
        self.write_standings(&tournament)
    }

    pub fn formula(&mut self, score_type: ScoreType, hours: f64) -> Result<()> {
        if !hours.is_finite() || hours <= 0.0 {
            bail!("hours must be a number greater than 0, got {hours}");
        }
        let tournament = self.current_tournament()?;
        let scorer = scorer_for(score_type, &tournament.config, Vec::new(), hours);
        writeln!(self.out(), "{}", scorer.get_formula())?;
        Ok(())
    }
}

fn player_names(players: &[Player]) -> HashMap<PlayerId, String> {
    players.iter().map(|p| (p.id, p.name.clone())).collect()
}

fn positive(value: &f64) -> Result<(), String> {
    if value.is_finite() && *value > 0.0 {
        Ok(())
    } else {
        Err("must be a number greater than 0".into())
    }
}

fn non_negative(value: &f64) -> Result<(), String> {
    if value.is_finite() && *value >= 0.0 {
        Ok(())
    } else {
        Err("must be a number of at least 0".into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
