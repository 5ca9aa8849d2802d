pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sandbox;
pub mod utils;

use std::collections::HashMap;

use sqlx::SqlitePool;
use tokio::sync::RwLock;

/// Shared data accessible across all Poise commands and event handlers.
pub struct Data {
    pub db: SqlitePool,
    pub config: config::Config,
    pub start_time: std::time::Instant,
    /// Per-guild command prefixes, mirroring the `guild_prefixes` table.
    pub prefixes: RwLock<HashMap<u64, String>>,
    pub sandbox: sandbox::SandboxConfig,
    pub weather: Option<commands::weather::WeatherClient>,
    pub trivia: commands::trivia::TriviaClient,
    pub jokes: commands::jokes::JokeClient,
}

/// Poise context alias used throughout the bot.
pub type Context<'a> = poise::Context<'a, Data, error::Error>;
