// Library root: the metascore engine plus the persistence, configuration and
// tournament-context plumbing the CLI builds on.

pub mod config;
pub mod context;
pub mod db;
pub mod formula;
pub mod models;
pub mod scoring;
pub mod stats;
