// Rank scorer: finishing positions (lower is better) compressed into tiers.

use tracing::{debug, info};

use super::{ensure_unique_players, GameScores, ResultSource, Scorer, ScoringError};
use crate::formula::{Formula, MetascoreFormula, RankFormula};
use crate::models::{Player, PlayerId, RawResult, ScoreType, TournamentConfig, TourneyScore};

pub struct RankScorer {
    players: Vec<Player>,
    formula: MetascoreFormula,
}

impl RankScorer {
    pub fn new(config: &TournamentConfig, players: Vec<Player>, game_hours: f64) -> Self {
        Self {
            players,
            formula: MetascoreFormula::Rank(RankFormula::new(&config.for_game_hours(game_hours))),
        }
    }
}

/// Compress raw ranks into dense tiers, worst first.
///
/// Players sharing a raw rank form a tier. The worst tier becomes 1 and each
/// better tier adds 1, however many rank slots the ties skipped. The best
/// tier is then lifted to the player count, so the winner always gets the
/// full inverse value.
///
/// Ranks `[1, 2, 2, 4]` become `[4, 2, 2, 1]`.
pub fn normalize_ranks(ranks: &[(PlayerId, i64)]) -> Vec<(PlayerId, usize)> {
    let mut worst_first = ranks.to_vec();
    worst_first.sort_by(|a, b| b.1.cmp(&a.1));

    let mut normalized = Vec::with_capacity(worst_first.len());
    let mut tier = 0;
    let mut previous_rank = None;
    for (player_id, rank) in worst_first {
        if previous_rank != Some(rank) {
            tier += 1;
            previous_rank = Some(rank);
        }
        normalized.push((player_id, tier));
    }

    let best_tier = tier;
    let player_count = normalized.len();
    for (_, value) in &mut normalized {
        if *value == best_tier {
            *value = player_count;
        }
    }
    normalized
}

impl Scorer for RankScorer {
    fn score_type(&self) -> ScoreType {
        ScoreType::Rank
    }

    fn formula(&self) -> &MetascoreFormula {
        &self.formula
    }

    fn score(&self, source: &mut dyn ResultSource) -> Result<GameScores, ScoringError> {
        let player_count = self.players.len();
        let mut ranks = Vec::with_capacity(player_count);
        for player in &self.players {
            let rank = source.rank(player, player_count)?;
            if rank < 1 || rank as usize > player_count {
                return Err(ScoringError::RankOutOfRange {
                    player_id: player.id,
                    rank: rank as f64,
                    max: player_count,
                });
            }
            ranks.push((player.id, rank));
        }

        let normalized: Vec<RawResult> = normalize_ranks(&ranks)
            .into_iter()
            .map(|(player_id, value)| (player_id, value as f64))
            .collect();
        debug!(?ranks, ?normalized, "normalized raw ranks");
        self.calculate(&normalized)
    }

    /// `results` hold tier-normalized ranks, as produced by
    /// [`normalize_ranks`] and stored as each record's `game_score`. Players
    /// in the same tier share one metascore.
    fn calculate(&self, results: &[RawResult]) -> Result<GameScores, ScoringError> {
        ensure_unique_players(results)?;
        let player_count = results.len();

        let mut best_first = Vec::with_capacity(player_count);
        for &(player_id, value) in results {
            if value.fract() != 0.0 || value < 1.0 || value > player_count as f64 {
                return Err(ScoringError::RankOutOfRange {
                    player_id,
                    rank: value,
                    max: player_count,
                });
            }
            best_first.push((player_id, value as usize));
        }
        best_first.sort_by(|a, b| b.1.cmp(&a.1));

        let mut scores = GameScores::new();
        let mut previous: Option<(usize, f64)> = None;
        for (player_id, tier) in best_first {
            let tournament_score = match previous {
                Some((previous_tier, previous_score)) if previous_tier == tier => previous_score,
                _ => {
                    let computed = self.formula.compute(tier, &[], tier as f64)?;
                    previous = Some((tier, computed));
                    computed
                }
            };
            scores.insert(
                player_id,
                TourneyScore {
                    player_id,
                    game_score: tier as f64,
                    tournament_score,
                    game_score_type: ScoreType::Rank,
                    score_id: None,
                },
            );
        }

        info!(players = scores.len(), "scored rank game");
        Ok(scores)
    }
}
