// Point scorer: higher raw points rank higher, ties share a metascore.

use tracing::{debug, info};

use super::{ensure_unique_players, GameScores, ResultSource, Scorer, ScoringError};
use crate::formula::{Formula, MetascoreFormula, PointFormula};
use crate::models::{Player, RawResult, ScoreType, TournamentConfig, TourneyScore};

pub struct PointScorer {
    players: Vec<Player>,
    formula: MetascoreFormula,
}

impl PointScorer {
    pub fn new(config: &TournamentConfig, players: Vec<Player>, game_hours: f64) -> Self {
        Self {
            players,
            formula: MetascoreFormula::Point(PointFormula::new(&config.for_game_hours(game_hours))),
        }
    }
}

impl Scorer for PointScorer {
    fn score_type(&self) -> ScoreType {
        ScoreType::Points
    }

    fn formula(&self) -> &MetascoreFormula {
        &self.formula
    }

    fn score(&self, source: &mut dyn ResultSource) -> Result<GameScores, ScoringError> {
        let mut results = Vec::with_capacity(self.players.len());
        for player in &self.players {
            results.push((player.id, source.points(player)?));
        }
        self.calculate(&results)
    }

    /// Competition ranking: the best of `n` players gets inverse rank `n`,
    /// and the rank drops by one for every player walked, tied or not. A
    /// player tied with the one above them copies that player's metascore
    /// instead of computing their own.
    fn calculate(&self, results: &[RawResult]) -> Result<GameScores, ScoringError> {
        ensure_unique_players(results)?;
        if let Some((player_id, points)) = results.iter().find(|(_, points)| !points.is_finite()) {
            return Err(ScoringError::InvalidPoints {
                player_id: *player_id,
                points: *points,
            });
        }

        let mut sorted = results.to_vec();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        let cohort: Vec<f64> = sorted.iter().map(|(_, points)| *points).collect();

        let mut scores = GameScores::new();
        let mut inverse_rank = sorted.len() + 1;
        let mut previous: Option<(f64, f64)> = None;

        for (player_id, points) in sorted {
            inverse_rank -= 1;
            let tournament_score = match previous {
                Some((previous_points, previous_score)) if previous_points == points => {
                    debug!(player_id, points, "tied with previous player, sharing score");
                    previous_score
                }
                _ => {
                    let computed = self.formula.compute(inverse_rank, &cohort, points)?;
                    previous = Some((points, computed));
                    computed
                }
            };
            scores.insert(
                player_id,
                TourneyScore {
                    player_id,
                    game_score: points,
                    tournament_score,
                    game_score_type: ScoreType::Points,
                    score_id: None,
                },
            );
        }

        info!(players = scores.len(), "scored points game");
        Ok(scores)
    }
}
