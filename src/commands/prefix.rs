//! Per-guild command prefixes.
//!
//! The `guild_prefixes` table is the source of truth; a full copy lives in
//! `Data::prefixes` so prefix resolution never touches the database on the
//! message hot path. Writes go through the command below and update both.

use std::collections::HashMap;

use sqlx::SqlitePool;

use crate::{Context, Data};

type Error = crate::error::Error;

/// Longest prefix we accept; anything more is a typo.
const MAX_PREFIX_LEN: usize = 10;

/// Load every stored prefix at startup.
pub async fn load_prefixes(db: &SqlitePool) -> Result<HashMap<u64, String>, sqlx::Error> {
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT guild_id, prefix FROM guild_prefixes")
        .fetch_all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(guild_id, prefix)| (guild_id as u64, prefix))
        .collect())
}

/// Dynamic prefix hook for the framework: the guild's stored prefix, or the
/// configured default (also for DMs). Mentions work regardless.
pub async fn resolve(
    ctx: poise::PartialContext<'_, Data, Error>,
) -> Result<Option<String>, Error> {
    let data = ctx.framework.user_data().await;
    let prefix = match ctx.guild_id {
        Some(guild_id) => data
            .prefixes
            .read()
            .await
            .get(&guild_id.get())
            .cloned()
            .unwrap_or_else(|| data.config.default_prefix.clone()),
        None => data.config.default_prefix.clone(),
    };
    Ok(Some(prefix))
}

/// Change the command prefix for this server (`reset` restores the default).
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    category = "Settings"
)]
pub async fn prefix(
    ctx: Context<'_>,
    #[description = "The new prefix, or `reset`"] option: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id().map(|g| g.get()) else {
        return Ok(());
    };

    let new_prefix = if option == "reset" {
        ctx.data().config.default_prefix.clone()
    } else {
        option
    };
    if new_prefix.is_empty() || new_prefix.len() > MAX_PREFIX_LEN {
        ctx.say(format!(
            "A prefix has to be between 1 and {MAX_PREFIX_LEN} characters."
        ))
        .await?;
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO guild_prefixes (guild_id, prefix) VALUES (?, ?)
         ON CONFLICT(guild_id) DO UPDATE SET prefix = excluded.prefix",
    )
    .bind(guild_id as i64)
    .bind(&new_prefix)
    .execute(&ctx.data().db)
    .await?;

    ctx.data()
        .prefixes
        .write()
        .await
        .insert(guild_id, new_prefix.clone());

    ctx.say(format!("The prefix is now `{new_prefix}`")).await?;
    Ok(())
}

/// Forget a guild's prefix (it kicked us, or was deleted).
pub async fn forget_guild(data: &Data, guild_id: u64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM guild_prefixes WHERE guild_id = ?")
        .bind(guild_id as i64)
        .execute(&data.db)
        .await?;
    data.prefixes.write().await.remove(&guild_id);
    Ok(())
}
