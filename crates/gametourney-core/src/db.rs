// SQLite persistence layer for tournaments, players and recorded scores.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, info};

use crate::models::{Player, PlayerId, ScoreType, Tournament, TournamentConfig, TourneyScore};

/// SQLite-backed persistence for tournaments, their players, and every
/// per-game score recorded against them.
pub struct Database {
    conn: Mutex<Connection>,
}

/// A player's running totals across every recorded game.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub player: Player,
    pub total_score: f64,
    pub game_count: i64,
    pub average_score: f64,
}

/// One row of the `scores` table joined with the player's name.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub score_id: i64,
    pub game_number: i64,
    pub game: String,
    pub hours: f64,
    pub player_id: PlayerId,
    pub player_name: String,
    pub score: f64,
    pub points_or_rank: f64,
    pub game_score_type: ScoreType,
    pub recorded_at: String,
}

impl ScoreRecord {
    pub fn to_tourney_score(&self) -> TourneyScore {
        TourneyScore {
            player_id: self.player_id,
            game_score: self.points_or_rank,
            tournament_score: self.score,
            game_score_type: self.game_score_type,
            score_id: Some(self.score_id),
        }
    }
}

/// Every score recorded for one play of a game.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedGame {
    pub game_number: i64,
    pub game: String,
    pub hours: f64,
    pub players: Vec<Player>,
    pub scores: Vec<TourneyScore>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tournaments (
                id                     INTEGER PRIMARY KEY AUTOINCREMENT,
                name                   TEXT NOT NULL,
                start_date             TEXT NOT NULL,
                rank_multiplier        REAL NOT NULL,
                duration_multiplier    REAL NOT NULL,
                apply_bonus_or_penalty INTEGER NOT NULL,
                participation_award    REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS players (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                name          TEXT NOT NULL,
                tournament_id INTEGER NOT NULL REFERENCES tournaments(id),
                UNIQUE(tournament_id, name)
            );

            CREATE TABLE IF NOT EXISTS scores (
                score_id        INTEGER PRIMARY KEY AUTOINCREMENT,
                game_number     INTEGER NOT NULL,
                game            TEXT NOT NULL,
                hours           REAL NOT NULL,
                player_id       INTEGER NOT NULL REFERENCES players(id),
                score           REAL NOT NULL,
                points_or_rank  REAL NOT NULL,
                game_score_type TEXT NOT NULL,
                tournament_id   INTEGER NOT NULL REFERENCES tournaments(id),
                recorded_at     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_scores_tournament ON scores(tournament_id, game_number);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Tournaments
    // ------------------------------------------------------------------

    /// Insert a tournament and return it with its new id.
    pub fn create_tournament(
        &self,
        name: &str,
        start_date: DateTime<Utc>,
        config: &TournamentConfig,
    ) -> Result<Tournament> {
        let conn = self.conn();
        let id: i64 = conn
            .query_row(
                "INSERT INTO tournaments
                    (name, start_date, rank_multiplier, duration_multiplier, apply_bonus_or_penalty, participation_award)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id",
                params![
                    name,
                    start_date.to_rfc3339(),
                    config.rank_multiplier,
                    config.duration_multiplier,
                    config.apply_bonus_or_penalty,
                    config.participation_award,
                ],
                |row| row.get(0),
            )
            .context("failed to create tournament")?;
        info!(tournament_id = id, name, "created tournament");
        Ok(Tournament {
            id,
            name: name.to_string(),
            start_date,
            config: *config,
        })
    }

    /// All tournaments, most recently started first.
    pub fn list_tournaments(&self) -> Result<Vec<Tournament>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, name, start_date, rank_multiplier, duration_multiplier, apply_bonus_or_penalty, participation_award
                 FROM tournaments ORDER BY start_date DESC, id DESC",
            )
            .context("failed to prepare list_tournaments query")?;

        let rows = stmt
            .query_map([], tournament_row)
            .context("failed to query tournaments")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map tournament rows")?;

        rows.into_iter().map(TournamentRow::into_tournament).collect()
    }

    /// Look up a tournament by id. Returns `None` if it does not exist.
    pub fn get_tournament(&self, tournament_id: i64) -> Result<Option<Tournament>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, name, start_date, rank_multiplier, duration_multiplier, apply_bonus_or_penalty, participation_award
                 FROM tournaments WHERE id = ?1",
                params![tournament_id],
                tournament_row,
            )
            .optional()
            .context("failed to query tournament")?;
        row.map(TournamentRow::into_tournament).transpose()
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Register players for a tournament in one transaction, returning them
    /// with their new ids in the order given.
    pub fn insert_players(&self, tournament_id: i64, names: &[String]) -> Result<Vec<Player>> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let mut players = Vec::with_capacity(names.len());
        {
            let mut stmt = tx
                .prepare("INSERT INTO players (name, tournament_id) VALUES (?1, ?2) RETURNING id")
                .context("failed to prepare insert_players statement")?;
            for name in names {
                let id: i64 = stmt
                    .query_row(params![name, tournament_id], |row| row.get(0))
                    .with_context(|| format!("failed to insert player {name}"))?;
                players.push(Player {
                    id,
                    name: name.clone(),
                });
            }
        }
        tx.commit().context("failed to commit players")?;
        info!(tournament_id, count = players.len(), "registered players");
        Ok(players)
    }

    /// Players of a tournament, in registration order.
    pub fn get_players(&self, tournament_id: i64) -> Result<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name FROM players WHERE tournament_id = ?1 ORDER BY id")
            .context("failed to prepare get_players query")?;

        let players = stmt
            .query_map(params![tournament_id], |row| {
                Ok(Player {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;

        Ok(players)
    }

    // ------------------------------------------------------------------
    // Scores
    // ------------------------------------------------------------------

    /// Record one game's scores. All rows share a fresh `game_number`, which
    /// is returned.
    pub fn record_scores<'a>(
        &self,
        tournament_id: i64,
        game: &str,
        hours: f64,
        scores: impl IntoIterator<Item = &'a TourneyScore>,
    ) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let game_number: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(game_number), 0) + 1 FROM scores WHERE tournament_id = ?1",
                params![tournament_id],
                |row| row.get(0),
            )
            .context("failed to allocate game number")?;

        let mut count = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO scores
                        (game_number, game, hours, player_id, score, points_or_rank, game_score_type, tournament_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .context("failed to prepare record_scores statement")?;
            for score in scores {
                stmt.execute(params![
                    game_number,
                    game,
                    hours,
                    score.player_id,
                    score.tournament_score,
                    score.game_score,
                    score.game_score_type,
                    tournament_id,
                ])
                .with_context(|| format!("failed to record score for player {}", score.player_id))?;
                count += 1;
            }
        }

        tx.commit().context("failed to commit scores")?;
        info!(tournament_id, game, game_number, count, "recorded game scores");
        Ok(game_number)
    }

    /// Running totals per player, best average first. Players without any
    /// recorded game are included with zeros.
    pub fn get_standings(&self, tournament_id: i64) -> Result<Vec<Standing>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT p.id,
                        p.name,
                        COALESCE(SUM(s.score), 0.0) AS total_score,
                        COUNT(s.score_id) AS game_count,
                        COALESCE(SUM(s.score) / COUNT(s.score_id), 0.0) AS average_score
                 FROM players AS p
                 LEFT JOIN scores AS s ON s.player_id = p.id
                 WHERE p.tournament_id = ?1
                 GROUP BY p.id, p.name
                 ORDER BY average_score DESC, p.id",
            )
            .context("failed to prepare get_standings query")?;

        let standings = stmt
            .query_map(params![tournament_id], |row| {
                Ok(Standing {
                    player: Player {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    },
                    total_score: row.get(2)?,
                    game_count: row.get(3)?,
                    average_score: row.get(4)?,
                })
            })
            .context("failed to query standings")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map standing rows")?;

        Ok(standings)
    }

    /// Every recorded score of a tournament, in recording order.
    pub fn get_all_records(&self, tournament_id: i64) -> Result<Vec<ScoreRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT s.score_id, s.game_number, s.game, s.hours, s.player_id, p.name,
                        s.score, s.points_or_rank, s.game_score_type, s.recorded_at
                 FROM scores AS s
                 JOIN players AS p ON s.player_id = p.id
                 WHERE s.tournament_id = ?1
                 ORDER BY s.game_number, s.score_id",
            )
            .context("failed to prepare get_all_records query")?;

        let records = stmt
            .query_map(params![tournament_id], |row| {
                Ok(ScoreRecord {
                    score_id: row.get(0)?,
                    game_number: row.get(1)?,
                    game: row.get(2)?,
                    hours: row.get(3)?,
                    player_id: row.get(4)?,
                    player_name: row.get(5)?,
                    score: row.get(6)?,
                    points_or_rank: row.get(7)?,
                    game_score_type: row.get(8)?,
                    recorded_at: row.get(9)?,
                })
            })
            .context("failed to query score records")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map score rows")?;

        Ok(records)
    }

    /// Recorded scores grouped per play of a game, in recording order.
    pub fn load_games(&self, tournament_id: i64) -> Result<Vec<RecordedGame>> {
        let mut games: Vec<RecordedGame> = Vec::new();
        for record in self.get_all_records(tournament_id)? {
            let player = Player {
                id: record.player_id,
                name: record.player_name.clone(),
            };
            match games.last_mut() {
                Some(game) if game.game_number == record.game_number => {
                    game.players.push(player);
                    game.scores.push(record.to_tourney_score());
                }
                _ => games.push(RecordedGame {
                    game_number: record.game_number,
                    game: record.game.clone(),
                    hours: record.hours,
                    players: vec![player],
                    scores: vec![record.to_tourney_score()],
                }),
            }
        }
        debug!(tournament_id, games = games.len(), "loaded recorded games");
        Ok(games)
    }

    /// Overwrite `tournament_score` for already-recorded scores, matched by
    /// `score_id`, in one transaction. Returns the number of rows updated.
    pub fn update_scores(&self, scores: &[TourneyScore]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let mut updated = 0;
        {
            let mut stmt = tx
                .prepare("UPDATE scores SET score = ?1 WHERE score_id = ?2")
                .context("failed to prepare update_scores statement")?;
            for score in scores {
                let Some(score_id) = score.score_id else {
                    bail!(
                        "cannot update score for player {}: it has never been recorded",
                        score.player_id
                    );
                };
                updated += stmt
                    .execute(params![score.tournament_score, score_id])
                    .with_context(|| format!("failed to update score {score_id}"))?;
            }
        }
        tx.commit().context("failed to commit score updates")?;
        info!(updated, "updated tournament scores");
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

impl ToSql for ScoreType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ScoreType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        ScoreType::from_str_type(text).ok_or_else(|| {
            FromSqlError::Other(format!("unknown game_score_type {text:?}").into())
        })
    }
}

struct TournamentRow {
    id: i64,
    name: String,
    start_date: String,
    config: TournamentConfig,
}

impl TournamentRow {
    fn into_tournament(self) -> Result<Tournament> {
        let start_date = DateTime::parse_from_rfc3339(&self.start_date)
            .with_context(|| format!("tournament {} has an invalid start_date", self.id))?
            .with_timezone(&Utc);
        Ok(Tournament {
            id: self.id,
            name: self.name,
            start_date,
            config: self.config,
        })
    }
}

fn tournament_row(row: &Row<'_>) -> rusqlite::Result<TournamentRow> {
    Ok(TournamentRow {
        id: row.get(0)?,
        name: row.get(1)?,
        start_date: row.get(2)?,
        config: TournamentConfig {
            rank_multiplier: row.get(3)?,
            duration_multiplier: row.get(4)?,
            apply_bonus_or_penalty: row.get(5)?,
            participation_award: row.get(6)?,
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 19, 0, 0).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn score(player_id: PlayerId, game_score: f64, tournament_score: f64) -> TourneyScore {
        TourneyScore {
            player_id,
            game_score,
            tournament_score,
            game_score_type: ScoreType::Points,
            score_id: None,
        }
    }

    /// A tournament with three players: returns (tournament, players).
    fn seeded(db: &Database) -> (Tournament, Vec<Player>) {
        let tournament = db
            .create_tournament("Spring", start(), &TournamentConfig::default())
            .unwrap();
        let players = db
            .insert_players(tournament.id, &names(&["Ana", "Ben", "Cy"]))
            .unwrap();
        (tournament, players)
    }

    // ------------------------------------------------------------------
    // Tournaments and players
    // ------------------------------------------------------------------

    #[test]
    fn create_and_get_tournament() {
        let db = test_db();
        let config = TournamentConfig {
            rank_multiplier: 2.0,
            duration_multiplier: 0.5,
            apply_bonus_or_penalty: true,
            participation_award: 5.0,
        };
        let created = db.create_tournament("Summer", start(), &config).unwrap();
        let loaded = db.get_tournament(created.id).unwrap();
        assert_eq!(loaded, Some(created));
        assert!(db.get_tournament(999).unwrap().is_none());
    }

    #[test]
    fn list_tournaments_newest_first() {
        let db = test_db();
        let older = db
            .create_tournament("Old", start(), &TournamentConfig::default())
            .unwrap();
        let newer = db
            .create_tournament(
                "New",
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                &TournamentConfig::default(),
            )
            .unwrap();
        let listed: Vec<i64> = db.list_tournaments().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(listed, vec![newer.id, older.id]);
    }

    #[test]
    fn players_are_scoped_to_tournament() {
        let db = test_db();
        let (first, players) = seeded(&db);
        let second = db
            .create_tournament("Other", start(), &TournamentConfig::default())
            .unwrap();
        db.insert_players(second.id, &names(&["Dee"])).unwrap();

        assert_eq!(db.get_players(first.id).unwrap(), players);
        let other: Vec<String> = db
            .get_players(second.id)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(other, vec!["Dee"]);
    }

    #[test]
    fn duplicate_player_name_is_rejected() {
        let db = test_db();
        let (tournament, _) = seeded(&db);
        assert!(db.insert_players(tournament.id, &names(&["Ana"])).is_err());
    }

    // ------------------------------------------------------------------
    // Scores
    // ------------------------------------------------------------------

    #[test]
    fn record_scores_allocates_game_numbers() {
        let db = test_db();
        let (tournament, p) = seeded(&db);

        let first = db
            .record_scores(tournament.id, "Catan", 2.0, &[score(p[0].id, 10.0, 3.0)])
            .unwrap();
        let second = db
            .record_scores(tournament.id, "Catan", 1.5, &[score(p[1].id, 8.0, 3.0)])
            .unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn standings_average_and_include_idle_players() {
        let db = test_db();
        let (tournament, p) = seeded(&db);
        db.record_scores(
            tournament.id,
            "Catan",
            2.0,
            &[score(p[0].id, 10.0, 3.0), score(p[1].id, 5.0, 1.0)],
        )
        .unwrap();
        db.record_scores(tournament.id, "Azul", 1.0, &[score(p[0].id, 40.0, 1.0)])
            .unwrap();

        let standings = db.get_standings(tournament.id).unwrap();
        let summary: Vec<(&str, f64, i64, f64)> = standings
            .iter()
            .map(|s| (s.player.name.as_str(), s.total_score, s.game_count, s.average_score))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Ana", 4.0, 2, 2.0),
                ("Ben", 1.0, 1, 1.0),
                ("Cy", 0.0, 0, 0.0),
            ]
        );
    }

    #[test]
    fn records_round_trip_score_type_and_names() {
        let db = test_db();
        let (tournament, p) = seeded(&db);
        let rank_score = TourneyScore {
            game_score_type: ScoreType::Rank,
            ..score(p[2].id, 3.0, 3.0)
        };
        db.record_scores(tournament.id, "Hanabi", 0.5, &[rank_score]).unwrap();

        let records = db.get_all_records(tournament.id).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].player_name, "Cy");
        assert_eq!(records[0].game_score_type, ScoreType::Rank);
        assert_eq!(records[0].hours, 0.5);
        assert!(!records[0].recorded_at.is_empty());
        assert_eq!(records[0].to_tourney_score().score_id, Some(records[0].score_id));
    }

    #[test]
    fn unknown_score_type_fails_to_load() {
        let db = test_db();
        let (tournament, p) = seeded(&db);
        db.conn()
            .execute(
                "INSERT INTO scores
                    (game_number, game, hours, player_id, score, points_or_rank, game_score_type, tournament_id)
                 VALUES (1, 'Catan', 1.0, ?1, 1.0, 1.0, 'votes', ?2)",
                params![p[0].id, tournament.id],
            )
            .unwrap();

        let err = db.get_all_records(tournament.id).unwrap_err();
        assert!(format!("{err:#}").contains("unknown game_score_type \"votes\""));
    }

    #[test]
    fn load_games_groups_by_game_number() {
        let db = test_db();
        let (tournament, p) = seeded(&db);
        db.record_scores(
            tournament.id,
            "Catan",
            2.0,
            &[score(p[0].id, 10.0, 2.0), score(p[1].id, 8.0, 1.0)],
        )
        .unwrap();
        db.record_scores(tournament.id, "Catan", 1.0, &[score(p[2].id, 9.0, 1.0)])
            .unwrap();

        let games = db.load_games(tournament.id).unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].game, "Catan");
        assert_eq!(games[0].hours, 2.0);
        assert_eq!(games[0].players, vec![p[0].clone(), p[1].clone()]);
        assert_eq!(games[0].scores.len(), 2);
        assert!(games[0].scores.iter().all(|s| s.score_id.is_some()));
        assert_eq!(games[1].players, vec![p[2].clone()]);
    }

    #[test]
    fn update_scores_by_score_id() {
        let db = test_db();
        let (tournament, p) = seeded(&db);
        db.record_scores(
            tournament.id,
            "Catan",
            1.0,
            &[score(p[0].id, 10.0, 2.0), score(p[1].id, 8.0, 1.0)],
        )
        .unwrap();

        let mut stored: Vec<TourneyScore> = db.load_games(tournament.id).unwrap()[0].scores.clone();
        stored[0].tournament_score = 20.0;
        assert_eq!(db.update_scores(&stored).unwrap(), 2);

        let records = db.get_all_records(tournament.id).unwrap();
        assert_eq!(records[0].score, 20.0);
        assert_eq!(records[1].score, 1.0);
        assert_eq!(records[0].points_or_rank, 10.0);
    }

    #[test]
    fn update_scores_requires_score_id() {
        let db = test_db();
        assert!(db.update_scores(&[score(1, 1.0, 1.0)]).is_err());
    }
}
