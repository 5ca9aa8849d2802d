use crate::error::Error;
use serenity::all::GuildId;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub weather_api_key: Option<String>,
    pub guild_id: Option<GuildId>,
    pub default_prefix: String,
    pub bot_version: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DISCORD_TOKEN` — Bot token from Discord Developer Portal
    ///
    /// Optional:
    /// - `DATABASE_URL` — SQLite connection string (default "sqlite:masterbot.db")
    /// - `WEATHER_API_KEY` — weatherapi.com key; weather commands are
    ///   disabled without it
    /// - `GUILD_ID` — register slash commands to one guild instead of globally
    /// - `DEFAULT_PREFIX` — prefix for guilds that never set one (default "!")
    pub fn from_env() -> Result<Self, Error> {
        let discord_token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| Error::Config("DISCORD_TOKEN environment variable is required".into()))?;

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:masterbot.db".into());

        let weather_api_key = std::env::var("WEATHER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());

        let guild_id = parse_optional_id::<GuildId>("GUILD_ID")?;

        let default_prefix = std::env::var("DEFAULT_PREFIX")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "!".into());

        Ok(Self {
            discord_token,
            database_url,
            weather_api_key,
            guild_id,
            default_prefix,
            bot_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

fn parse_optional_id<T>(var: &str) -> Result<Option<T>, Error>
where
    T: From<u64>,
{
    match std::env::var(var) {
        Ok(val) if !val.is_empty() => {
            let id = val
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("Invalid ID for {var}: '{val}'")))?;
            Ok(Some(T::from(id)))
        }
        _ => Ok(None),
    }
}
