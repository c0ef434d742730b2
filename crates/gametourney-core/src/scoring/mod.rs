// Scorers: turn one game's raw results into metascores.

pub mod point;
pub mod rank;

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;
use tracing::{debug, info};

use crate::formula::{Formula, FormulaError, MetascoreFormula};
use crate::models::{Player, PlayerId, RawResult, ScoreType, TournamentConfig, TourneyScore};

pub use point::PointScorer;
pub use rank::{normalize_ranks, RankScorer};

/// Scores keyed by player, as produced by one scoring pass.
pub type GameScores = BTreeMap<PlayerId, TourneyScore>;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("rank {rank} for player {player_id} is outside 1..={max}")]
    RankOutOfRange {
        player_id: PlayerId,
        rank: f64,
        max: usize,
    },

    #[error("points for player {player_id} must be a finite number, got {points}")]
    InvalidPoints { player_id: PlayerId, points: f64 },

    #[error("cannot recalculate {expected} scores together with {found} scores")]
    MixedScoreTypes { expected: ScoreType, found: ScoreType },

    #[error("player {player_id} has more than one result for this game")]
    DuplicatePlayer { player_id: PlayerId },

    #[error("no result was calculated for player {player_id}")]
    MissingResult { player_id: PlayerId },

    #[error("failed to read a result for {player}: {source}")]
    Input {
        player: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Input collaborator
// ---------------------------------------------------------------------------

/// Supplies raw results for players, one query at a time.
pub trait ResultSource {
    /// Points scored by `player` (higher is better).
    fn points(&mut self, player: &Player) -> Result<f64, ScoringError>;

    /// Finishing rank of `player` (1 is best, `player_count` is worst).
    /// Out-of-range answers are rejected by the scorer, not the source.
    fn rank(&mut self, player: &Player, player_count: usize) -> Result<i64, ScoringError>;
}

// ---------------------------------------------------------------------------
// Scorer trait
// ---------------------------------------------------------------------------

/// Scores one game for a fixed set of players.
pub trait Scorer {
    fn score_type(&self) -> ScoreType;

    fn formula(&self) -> &MetascoreFormula;

    /// Ask `source` for every player's raw result, then calculate.
    fn score(&self, source: &mut dyn ResultSource) -> Result<GameScores, ScoringError>;

    /// Metascores for already-collected results.
    fn calculate(&self, results: &[RawResult]) -> Result<GameScores, ScoringError>;

    /// Re-derive `tournament_score` for persisted records, keeping their
    /// `score_id` and `game_score`.
    fn recalculate(
        &self,
        mut existing: Vec<TourneyScore>,
    ) -> Result<Vec<TourneyScore>, ScoringError> {
        if let Some(mismatch) = existing
            .iter()
            .find(|score| score.game_score_type != self.score_type())
        {
            return Err(ScoringError::MixedScoreTypes {
                expected: self.score_type(),
                found: mismatch.game_score_type,
            });
        }

        let results: Vec<RawResult> = existing
            .iter()
            .map(|score| (score.player_id, score.game_score))
            .collect();
        let recalculated = self.calculate(&results)?;

        for score in &mut existing {
            let updated = recalculated
                .get(&score.player_id)
                .ok_or(ScoringError::MissingResult {
                    player_id: score.player_id,
                })?;
            if updated.tournament_score != score.tournament_score {
                debug!(
                    player_id = score.player_id,
                    old = score.tournament_score,
                    new = updated.tournament_score,
                    "tournament score changed"
                );
            }
            score.tournament_score = updated.tournament_score;
        }

        Ok(existing)
    }

    /// The formula as text, with placeholders for per-player terms.
    fn get_formula(&self) -> String {
        self.formula().show()
    }
}

/// Build the scorer for `score_type`, folding `game_hours` into the
/// tournament's duration multiplier.
pub fn scorer_for(
    score_type: ScoreType,
    config: &TournamentConfig,
    players: Vec<Player>,
    game_hours: f64,
) -> Box<dyn Scorer> {
    match score_type {
        ScoreType::Points => Box::new(PointScorer::new(config, players, game_hours)),
        ScoreType::Rank => Box::new(RankScorer::new(config, players, game_hours)),
    }
}

/// Recalculate one recorded game. The scorer is chosen from the first
/// record's score type; any other type in the batch is rejected.
pub fn recalculate_game(
    config: &TournamentConfig,
    players: Vec<Player>,
    game_hours: f64,
    scores: Vec<TourneyScore>,
) -> Result<Vec<TourneyScore>, ScoringError> {
    let Some(first) = scores.first() else {
        return Ok(scores);
    };
    let scorer = scorer_for(first.game_score_type, config, players, game_hours);
    let recalculated = scorer.recalculate(scores)?;
    info!(
        score_type = %scorer.score_type(),
        players = recalculated.len(),
        "recalculated game"
    );
    Ok(recalculated)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject result batches that mention a player twice.
pub(crate) fn ensure_unique_players<T>(results: &[(PlayerId, T)]) -> Result<(), ScoringError> {
    let mut seen = HashSet::with_capacity(results.len());
    for (player_id, _) in results {
        if !seen.insert(*player_id) {
            return Err(ScoringError::DuplicatePlayer {
                player_id: *player_id,
            });
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn stored(
        player_id: PlayerId,
        game_score: f64,
        score_type: ScoreType,
        score_id: i64,
    ) -> TourneyScore {
        TourneyScore {
            player_id,
            game_score,
            tournament_score: -1.0,
            game_score_type: score_type,
            score_id: Some(score_id),
        }
    }

    #[test]
    fn recalculate_overwrites_only_tournament_score() {
        let scorer = PointScorer::new(&unit_config(), players(3), 1.0);
        let existing = vec![
            stored(1, 10.0, ScoreType::Points, 100),
            stored(2, 10.0, ScoreType::Points, 101),
            stored(3, 5.0, ScoreType::Points, 102),
        ];

        let updated = scorer.recalculate(existing).unwrap();

        let summary: Vec<(i64, Option<i64>, f64, f64)> = updated
            .iter()
            .map(|s| (s.player_id, s.score_id, s.game_score, s.tournament_score))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, Some(100), 10.0, 3.0),
                (2, Some(101), 10.0, 3.0),
                (3, Some(102), 5.0, 1.0),
            ]
        );
    }

    #[test]
    fn recalculate_is_idempotent() {
        let config = TournamentConfig {
            rank_multiplier: 2.0,
            duration_multiplier: 1.0,
            apply_bonus_or_penalty: true,
            participation_award: 1.0,
        };
        let scorer = PointScorer::new(&config, players(4), 2.5);
        let existing = vec![
            stored(1, 40.0, ScoreType::Points, 1),
            stored(2, 25.0, ScoreType::Points, 2),
            stored(3, 25.0, ScoreType::Points, 3),
            stored(4, 3.0, ScoreType::Points, 4),
        ];

        let once = scorer.recalculate(existing).unwrap();
        let twice = scorer.recalculate(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn recalculate_rejects_mixed_score_types() {
        let scorer = RankScorer::new(&unit_config(), players(2), 1.0);
        let existing = vec![
            stored(1, 2.0, ScoreType::Rank, 1),
            stored(2, 7.0, ScoreType::Points, 2),
        ];
        let err = scorer.recalculate(existing).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::MixedScoreTypes {
                expected: ScoreType::Rank,
                found: ScoreType::Points
            }
        ));
    }

    #[test]
    fn recalculate_game_picks_scorer_from_records() {
        let existing = vec![
            stored(1, 4.0, ScoreType::Rank, 10),
            stored(2, 2.0, ScoreType::Rank, 11),
            stored(3, 2.0, ScoreType::Rank, 12),
            stored(4, 1.0, ScoreType::Rank, 13),
        ];
        let updated = recalculate_game(&unit_config(), players(4), 1.0, existing).unwrap();
        let scores: Vec<f64> = updated.iter().map(|s| s.tournament_score).collect();
        assert_eq!(scores, vec![4.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    fn recalculate_game_with_no_records_is_a_no_op() {
        let updated = recalculate_game(&unit_config(), vec![], 1.0, vec![]).unwrap();
        assert!(updated.is_empty());
    }

    #[test]
    fn get_formula_shows_placeholders() {
        let scorer = scorer_for(ScoreType::Points, &unit_config(), players(2), 2.0);
        assert_eq!(
            scorer.get_formula(),
            "{Inverse Rank} x {Rank Multiplier:1} x {Duration Multiplier:2}"
        );
    }

    #[test]
    fn duplicate_players_are_rejected() {
        let err = ensure_unique_players(&[(1, 3.0), (2, 1.0), (1, 2.0)]).unwrap_err();
        assert!(matches!(err, ScoringError::DuplicatePlayer { player_id: 1 }));
    }
}
