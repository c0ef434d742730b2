// Configuration loading and parsing (config.toml).

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::TournamentConfig;

/// File name looked up inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("could not determine a home directory for config and data files")]
    NoHomeDirectory,
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory that relative storage paths resolve against.
    pub data_dir: PathBuf,
    pub storage: StorageConfig,
    /// Prompt defaults for new tournaments.
    pub defaults: TournamentConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// config.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire config.toml file. Every section
/// is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    storage: StorageConfig,
    defaults: DefaultsSection,
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub context_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "tournament.db".into(),
            context_path: "tournament-context.json".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct DefaultsSection {
    rank_multiplier: f64,
    duration_multiplier: f64,
    apply_bonus_or_penalty: bool,
    participation_award: f64,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        let defaults = TournamentConfig::default();
        Self {
            rank_multiplier: defaults.rank_multiplier,
            duration_multiplier: defaults.duration_multiplier,
            apply_bonus_or_penalty: defaults.apply_bonus_or_penalty,
            participation_award: defaults.participation_award,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "gametourney=info,gametourney_core=info,warn".into(),
        }
    }
}

impl Config {
    /// Absolute path of the SQLite database.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(&self.storage.db_path)
    }

    /// Absolute path of the current-tournament context file.
    pub fn context_path(&self) -> PathBuf {
        self.resolve(&self.storage.context_path)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `path`, resolving storage paths
/// against `data_dir`.
///
/// A missing file is an error here; `load_config()` is the entry point that
/// treats a missing default file as "use defaults".
pub fn load_config_from(path: &Path, data_dir: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let config = assemble(file, data_dir);
    validate(&config)?;
    Ok(config)
}

/// Load configuration.
///
/// With an explicit `path`, that file must exist and storage paths resolve
/// against its directory. Otherwise the platform config directory is used;
/// a missing file there yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        let data_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        return load_config_from(path, &data_dir);
    }

    let dirs = ProjectDirs::from("", "", "gametourney").ok_or(ConfigError::NoHomeDirectory)?;
    let config_path = dirs.config_dir().join(CONFIG_FILE_NAME);
    let data_dir = dirs.data_dir().to_path_buf();

    if config_path.exists() {
        load_config_from(&config_path, &data_dir)
    } else {
        let config = assemble(ConfigFile::default(), &data_dir);
        validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn assemble(file: ConfigFile, data_dir: &Path) -> Config {
    Config {
        data_dir: data_dir.to_path_buf(),
        storage: file.storage,
        defaults: TournamentConfig {
            rank_multiplier: file.defaults.rank_multiplier,
            duration_multiplier: file.defaults.duration_multiplier,
            apply_bonus_or_penalty: file.defaults.apply_bonus_or_penalty,
            participation_award: file.defaults.participation_award,
        },
        logging: file.logging,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a tournament's scoring knobs. Shared with tournament creation so
/// prompted values obey the same rules as configured defaults.
pub fn validate_tournament_config(
    config: &TournamentConfig,
    prefix: &str,
) -> Result<(), ConfigError> {
    let multipliers: &[(&str, f64)] = &[
        ("rank_multiplier", config.rank_multiplier),
        ("duration_multiplier", config.duration_multiplier),
    ];
    for (name, val) in multipliers {
        if !val.is_finite() || *val <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: format!("{prefix}{name}"),
                message: format!("must be a finite number > 0, got {val}"),
            });
        }
    }

    let award = config.participation_award;
    if !award.is_finite() || award < 0.0 {
        return Err(ConfigError::ValidationError {
            field: format!("{prefix}participation_award"),
            message: format!("must be a finite number >= 0, got {award}"),
        });
    }

    Ok(())
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let paths: &[(&str, &str)] = &[
        ("storage.db_path", config.storage.db_path.as_str()),
        ("storage.context_path", config.storage.context_path.as_str()),
    ];
    for (name, val) in paths {
        if val.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must not be empty".into(),
            });
        }
    }

    validate_tournament_config(&config.defaults, "defaults.")?;

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.filter".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Helper: write `contents` to a fresh config file under a per-test temp
    /// directory and return its path.
    fn write_config(test_name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gametourney_config_{test_name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_full_config() {
        let path = write_config(
            "full",
            r#"
[storage]
db_path = "games.db"
context_path = "/tmp/current.json"

[defaults]
rank_multiplier = 2.0
duration_multiplier = 0.5
apply_bonus_or_penalty = true
participation_award = 3.0

[logging]
filter = "debug"
"#,
        );
        let data_dir = path.parent().unwrap();
        let config = load_config_from(&path, data_dir).expect("should load valid config");

        assert_eq!(config.db_path(), data_dir.join("games.db"));
        assert_eq!(config.context_path(), PathBuf::from("/tmp/current.json"));
        assert!((config.defaults.rank_multiplier - 2.0).abs() < f64::EPSILON);
        assert!((config.defaults.duration_multiplier - 0.5).abs() < f64::EPSILON);
        assert!(config.defaults.apply_bonus_or_penalty);
        assert!((config.defaults.participation_award - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let path = write_config("empty", "");
        let config = load_config_from(&path, Path::new("/data")).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/data/tournament.db"));
        assert_eq!(
            config.context_path(),
            PathBuf::from("/data/tournament-context.json")
        );
        assert_eq!(config.defaults, TournamentConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let path = write_config("partial", "[defaults]\nparticipation_award = 5.0\n");
        let config = load_config_from(&path, Path::new("/data")).unwrap();
        assert!((config.defaults.participation_award - 5.0).abs() < f64::EPSILON);
        assert!((config.defaults.rank_multiplier - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.storage.db_path, "tournament.db");
    }

    #[test]
    fn explicit_path_resolves_storage_next_to_it() {
        let path = write_config("explicit", "");
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.data_dir, path.parent().unwrap());
    }

    #[test]
    fn rejects_zero_rank_multiplier() {
        let path = write_config("zero_rank", "[defaults]\nrank_multiplier = 0.0\n");
        let err = load_config_from(&path, Path::new("/data")).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "defaults.rank_multiplier");
            }
            other => panic!("expected ValidationError, got: {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_participation_award() {
        let path = write_config("negative_award", "[defaults]\nparticipation_award = -1.0\n");
        let err = load_config_from(&path, Path::new("/data")).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "defaults.participation_award");
            }
            other => panic!("expected ValidationError, got: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_db_path() {
        let path = write_config("empty_db", "[storage]\ndb_path = \"  \"\n");
        let err = load_config_from(&path, Path::new("/data")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "storage.db_path"
        ));
    }

    #[test]
    fn file_not_found_for_missing_file() {
        let path = std::env::temp_dir().join("gametourney_config_missing/nope.toml");
        let err = load_config_from(&path, Path::new("/data")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let path = write_config("invalid", "[defaults\nrank_multiplier = ");
        let err = load_config_from(&path, Path::new("/data")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn tournament_config_validation_uses_prefix() {
        let config = TournamentConfig {
            duration_multiplier: f64::NAN,
            ..TournamentConfig::default()
        };
        let err = validate_tournament_config(&config, "").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "duration_multiplier"
        ));
    }
}
