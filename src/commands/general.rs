//! Help and info cog.

use poise::CreateReply;
use serenity::all::Permissions;

use crate::utils::embeds;
use crate::Context;

type Error = crate::error::Error;

/// Get the bot's latency.
#[poise::command(slash_command, prefix_command, category = "Info")]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let start = std::time::Instant::now();
    let msg = ctx.say("Pong!").await?;
    let api_latency = start.elapsed().as_millis();

    msg.edit(
        ctx,
        CreateReply::default().content(format!("Pong! `{api_latency}ms`")),
    )
    .await?;

    Ok(())
}

/// Get info about the bot.
#[poise::command(slash_command, prefix_command, category = "Info")]
pub async fn info(ctx: Context<'_>) -> Result<(), Error> {
    let cache = &ctx.serenity_context().cache;
    let (bot_name, guild_count, user_count) = {
        let current = cache.current_user();
        (current.name.clone(), cache.guilds().len(), cache.user_count())
    };

    let uptime = ctx.data().start_time.elapsed();
    let hours = uptime.as_secs() / 3600;
    let minutes = (uptime.as_secs() % 3600) / 60;
    let seconds = uptime.as_secs() % 60;

    let embed = embeds::default_embed()
        .title(format!("{bot_name} Info"))
        .field(
            "Version Info",
            format!(
                "{bot_name} version {}\n[Rust](https://www.rust-lang.org)\n\
                 [serenity](https://github.com/serenity-rs/serenity)\n\
                 [poise](https://github.com/serenity-rs/poise)\n\
                 Platform {}",
                ctx.data().config.bot_version,
                std::env::consts::OS
            ),
            true,
        )
        .field(
            "Stats",
            format!("Servers {guild_count}\nUsers {user_count}"),
            true,
        )
        .field("Uptime", format!("{hours}h {minutes}m {seconds}s"), true);

    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// List all available commands.
#[poise::command(slash_command, prefix_command, category = "Info")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command to get help for"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            extra_text_at_bottom: "MasterBot — built with Rust + Poise",
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await?;
    Ok(())
}

/// Get an invite link for the bot.
#[poise::command(slash_command, prefix_command, category = "Info")]
pub async fn invite(ctx: Context<'_>) -> Result<(), Error> {
    let bot_id = ctx.serenity_context().cache.current_user().id;

    let permissions = Permissions::MANAGE_ROLES
        | Permissions::MANAGE_CHANNELS
        | Permissions::KICK_MEMBERS
        | Permissions::BAN_MEMBERS
        | Permissions::MANAGE_WEBHOOKS
        | Permissions::MODERATE_MEMBERS
        | Permissions::SEND_MESSAGES
        | Permissions::ADD_REACTIONS;

    let url = format!(
        "https://discord.com/api/oauth2/authorize?client_id={bot_id}&permissions={}&scope=bot%20applications.commands",
        permissions.bits()
    );
    ctx.say(url).await?;
    Ok(())
}

/// Find out what's new in a version.
#[poise::command(slash_command, prefix_command, aliases("new"), category = "Info")]
pub async fn whatsnew(
    ctx: Context<'_>,
    #[description = "The version, e.g. 1.5.0"] version: String,
) -> Result<(), Error> {
    if version.is_empty()
        || !version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.')
    {
        ctx.say("That version was not found.").await?;
        return Ok(());
    }

    let path = format!("version/{}.txt", version.replace('.', "-"));
    let notes = match tokio::fs::read_to_string(&path).await {
        Ok(notes) => notes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            ctx.say("That version was not found.").await?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let embed = embeds::default_embed().title(version).description(notes);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
