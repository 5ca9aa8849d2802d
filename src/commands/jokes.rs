//! Jokes cog backed by v2.jokeapi.dev.
//!
//! Guilds control which JokeAPI blacklist flags apply to them; everything is
//! filtered by default until an admin opts categories back in. Jokes already
//! told are remembered for the life of the process and not repeated.

use std::collections::HashSet;

use poise::CreateReply;
use serde::Deserialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::utils::{embeds, text};
use crate::Context;

type Error = crate::error::Error;

const BASE_URL: &str = "https://v2.jokeapi.dev/joke/";

/// How many times to re-roll before serving a repeat anyway.
const REROLL_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum JokeCategory {
    Any,
    Misc,
    Programming,
    Dark,
    Pun,
    Spooky,
    Christmas,
}

impl JokeCategory {
    fn path(self) -> &'static str {
        match self {
            JokeCategory::Any => "Any",
            JokeCategory::Misc => "Misc",
            JokeCategory::Programming => "Programming",
            JokeCategory::Dark => "Dark",
            JokeCategory::Pun => "Pun",
            JokeCategory::Spooky => "Spooky",
            JokeCategory::Christmas => "Christmas",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct JokePayload {
    pub error: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub joke: Option<String>,
    pub setup: Option<String>,
    pub delivery: Option<String>,
    pub id: Option<u64>,
    pub message: Option<String>,
}

#[derive(Debug)]
pub struct JokeClient {
    api: crate::utils::http::ApiClient,
    seen: Mutex<HashSet<u64>>,
}

impl Default for JokeClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JokeClient {
    pub fn new() -> Self {
        Self {
            api: crate::utils::http::ApiClient::new(BASE_URL),
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub async fn get_joke(
        &self,
        category: JokeCategory,
        blacklist: &[&str],
    ) -> Result<JokePayload, Error> {
        let flags = blacklist.join(",");
        let mut params: Vec<(&str, &str)> = Vec::new();
        if !flags.is_empty() {
            params.push(("blacklistFlags", flags.as_str()));
        }
        Ok(self.api.get(category.path(), &params).await?)
    }

    /// Record a joke id; false when we have told it before.
    async fn remember(&self, id: u64) -> bool {
        self.seen.lock().await.insert(id)
    }
}

/// The six JokeAPI blacklist flag names, in table-column order.
const FLAG_NAMES: [&str; 6] = [
    "nsfw",
    "religious",
    "political",
    "sexist",
    "racist",
    "explicit",
];

/// Which flags a guild blacklists. Everything is filtered until the guild
/// says otherwise.
async fn blacklist_flags(db: &SqlitePool, guild_id: Option<u64>) -> Vec<&'static str> {
    let Some(guild_id) = guild_id else {
        return FLAG_NAMES.to_vec();
    };
    let row: Option<(bool, bool, bool, bool, bool, bool)> = sqlx::query_as(
        "SELECT nsfw, religious, political, sexist, racist, explicit
         FROM joke_blacklist WHERE guild_id = ?",
    )
    .bind(guild_id as i64)
    .fetch_optional(db)
    .await
    .unwrap_or_else(|err| {
        tracing::warn!(guild_id, error = %err, "failed to read the joke blacklist");
        None
    });

    match row {
        Some(flags) => {
            let set = [flags.0, flags.1, flags.2, flags.3, flags.4, flags.5];
            FLAG_NAMES
                .iter()
                .zip(set)
                .filter_map(|(name, enabled)| enabled.then_some(*name))
                .collect()
        }
        None => FLAG_NAMES.to_vec(),
    }
}

/// Get a joke.
#[poise::command(slash_command, prefix_command, category = "Jokes")]
pub async fn joke(
    ctx: Context<'_>,
    #[description = "The joke category"] category: Option<JokeCategory>,
) -> Result<(), Error> {
    let category = category.unwrap_or(JokeCategory::Any);
    let flags = blacklist_flags(&ctx.data().db, ctx.guild_id().map(|g| g.get())).await;
    let client = &ctx.data().jokes;

    let mut payload = None;
    for _ in 0..REROLL_LIMIT {
        let candidate = client.get_joke(category, &flags).await?;
        if candidate.error {
            tracing::warn!(message = ?candidate.message, "joke API returned an error");
            ctx.say("We encountered an unexpected error. Try again later.")
                .await?;
            return Ok(());
        }
        let fresh = match candidate.id {
            Some(id) => client.remember(id).await,
            None => true,
        };
        payload = Some(candidate);
        if fresh {
            break;
        }
    }
    let Some(payload) = payload else {
        ctx.say("We encountered an unexpected error. Try again later.")
            .await?;
        return Ok(());
    };

    match (payload.kind.as_deref(), payload.joke, payload.setup, payload.delivery) {
        (Some("single"), Some(joke), _, _) => {
            ctx.say(text::decode_html(&joke)).await?;
        }
        (Some("twopart"), _, Some(setup), Some(delivery)) => {
            let embed = embeds::jokes_embed()
                .title(text::decode_html(&setup))
                .description(format!("|| {} ||", text::decode_html(&delivery)));
            ctx.send(CreateReply::default().embed(embed)).await?;
        }
        _ => {
            ctx.say("We encountered an unexpected error. Try again later.")
                .await?;
        }
    }
    Ok(())
}

/// Change which joke categories are filtered out for this server.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    category = "Jokes"
)]
#[allow(clippy::too_many_arguments)]
pub async fn jokeblacklist(
    ctx: Context<'_>,
    #[description = "Filter NSFW jokes"] nsfw: Option<bool>,
    #[description = "Filter religious jokes"] religious: Option<bool>,
    #[description = "Filter political jokes"] political: Option<bool>,
    #[description = "Filter sexist jokes"] sexist: Option<bool>,
    #[description = "Filter racist jokes"] racist: Option<bool>,
    #[description = "Filter explicit jokes"] explicit: Option<bool>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id().map(|g| g.get()) else {
        return Ok(());
    };

    let current = blacklist_flags(&ctx.data().db, Some(guild_id)).await;
    let resolve = |name: &'static str, choice: Option<bool>| {
        choice.unwrap_or_else(|| current.contains(&name))
    };
    let values = [
        resolve("nsfw", nsfw),
        resolve("religious", religious),
        resolve("political", political),
        resolve("sexist", sexist),
        resolve("racist", racist),
        resolve("explicit", explicit),
    ];

    sqlx::query(
        "INSERT INTO joke_blacklist (guild_id, nsfw, religious, political, sexist, racist, explicit)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(guild_id) DO UPDATE SET
             nsfw = excluded.nsfw,
             religious = excluded.religious,
             political = excluded.political,
             sexist = excluded.sexist,
             racist = excluded.racist,
             explicit = excluded.explicit",
    )
    .bind(guild_id as i64)
    .bind(values[0])
    .bind(values[1])
    .bind(values[2])
    .bind(values[3])
    .bind(values[4])
    .bind(values[5])
    .execute(&ctx.data().db)
    .await?;

    let filtered: Vec<&str> = FLAG_NAMES
        .iter()
        .zip(values)
        .filter_map(|(name, enabled)| enabled.then_some(*name))
        .collect();
    let summary = if filtered.is_empty() {
        "nothing".to_string()
    } else {
        filtered.join(", ")
    };
    ctx.say(format!("New settings! Filtering: `{summary}`"))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_joke_payload_deserializes() {
        let payload = r#"{
            "error": false,
            "category": "Programming",
            "type": "single",
            "joke": "There are only 10 kinds of people.",
            "id": 42,
            "safe": true
        }"#;
        let parsed: JokePayload = serde_json::from_str(payload).unwrap();
        assert!(!parsed.error);
        assert_eq!(parsed.kind.as_deref(), Some("single"));
        assert_eq!(parsed.id, Some(42));
        assert!(parsed.setup.is_none());
    }

    #[test]
    fn twopart_joke_payload_deserializes() {
        let payload = r#"{
            "error": false,
            "type": "twopart",
            "setup": "Why do programmers prefer dark mode?",
            "delivery": "Because light attracts bugs.",
            "id": 7
        }"#;
        let parsed: JokePayload = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.kind.as_deref(), Some("twopart"));
        assert!(parsed.joke.is_none());
        assert!(parsed.delivery.is_some());
    }

    #[test]
    fn error_payload_deserializes() {
        let payload = r#"{"error": true, "message": "No matching joke found"}"#;
        let parsed: JokePayload = serde_json::from_str(payload).unwrap();
        assert!(parsed.error);
        assert_eq!(parsed.message.as_deref(), Some("No matching joke found"));
    }

    #[test]
    fn categories_map_to_api_paths() {
        assert_eq!(JokeCategory::Any.path(), "Any");
        assert_eq!(JokeCategory::Programming.path(), "Programming");
        assert_eq!(JokeCategory::Christmas.path(), "Christmas");
    }

    #[tokio::test]
    async fn seen_jokes_are_remembered() {
        let client = JokeClient::new();
        assert!(client.remember(1).await);
        assert!(!client.remember(1).await);
        assert!(client.remember(2).await);
    }
}
