// Tournament, player and score records shared by scoring and persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Database identifier of a player. Unique within a tournament.
pub type PlayerId = i64;

/// A raw per-game result: points (higher is better) or a rank (lower is better).
pub type RawResult = (PlayerId, f64);

// ---------------------------------------------------------------------------
// Tournament configuration
// ---------------------------------------------------------------------------

/// Scoring knobs fixed for the lifetime of a tournament.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub rank_multiplier: f64,
    pub duration_multiplier: f64,
    pub apply_bonus_or_penalty: bool,
    /// Flat award added to every metascore. Zero disables the term entirely.
    pub participation_award: f64,
}

impl TournamentConfig {
    /// Whether the participation award contributes a term to the formula.
    pub fn has_participation_award(&self) -> bool {
        self.participation_award > 0.0
    }

    /// Fold a game's length into the duration multiplier.
    ///
    /// Formulas treat the duration multiplier as a single fixed term, so the
    /// per-game hours are applied here before a formula is built.
    pub fn for_game_hours(&self, game_hours: f64) -> Self {
        Self {
            duration_multiplier: self.duration_multiplier * game_hours,
            ..*self
        }
    }
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rank_multiplier: 1.0,
            duration_multiplier: 1.0,
            apply_bonus_or_penalty: false,
            participation_award: 0.0,
        }
    }
}

/// A persisted tournament and its scoring configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    #[serde(flatten)]
    pub config: TournamentConfig,
}

/// A tournament participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// How a game's raw results were recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    Points,
    Rank,
}

impl ScoreType {
    /// Parse the stored `game_score_type` column value.
    pub fn from_str_type(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "points" => Some(ScoreType::Points),
            "rank" => Some(ScoreType::Rank),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::Points => "points",
            ScoreType::Rank => "rank",
        }
    }
}

impl fmt::Display for ScoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One player's result for one game, raw and normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TourneyScore {
    pub player_id: PlayerId,
    /// Raw points, or the tier-normalized rank for rank-scored games.
    pub game_score: f64,
    /// The metascore.
    pub tournament_score: f64,
    pub game_score_type: ScoreType,
    /// Present only on records loaded back from the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participation_award_active_only_when_positive() {
        let mut config = TournamentConfig::default();
        assert!(!config.has_participation_award());
        config.participation_award = 5.0;
        assert!(config.has_participation_award());
        config.participation_award = -1.0;
        assert!(!config.has_participation_award());
    }

    #[test]
    fn game_hours_scale_duration_multiplier_only() {
        let config = TournamentConfig {
            rank_multiplier: 2.0,
            duration_multiplier: 1.5,
            apply_bonus_or_penalty: true,
            participation_award: 3.0,
        };
        let scaled = config.for_game_hours(2.0);
        assert_eq!(scaled.duration_multiplier, 3.0);
        assert_eq!(scaled.rank_multiplier, 2.0);
        assert!(scaled.apply_bonus_or_penalty);
        assert_eq!(scaled.participation_award, 3.0);
    }

    #[test]
    fn score_type_parses_stored_values() {
        assert_eq!(ScoreType::from_str_type("points"), Some(ScoreType::Points));
        assert_eq!(ScoreType::from_str_type(" Rank "), Some(ScoreType::Rank));
        assert_eq!(ScoreType::from_str_type("elo"), None);
        assert_eq!(ScoreType::Rank.to_string(), "rank");
    }

    #[test]
    fn tourney_score_serializes_without_missing_score_id() {
        let score = TourneyScore {
            player_id: 7,
            game_score: 12.0,
            tournament_score: 3.0,
            game_score_type: ScoreType::Points,
            score_id: None,
        };
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["game_score_type"], "points");
        assert!(json.get("score_id").is_none());
    }
}
