use masterbot::commands;
use masterbot::config::Config;
use masterbot::events;
use masterbot::sandbox::SandboxConfig;
use masterbot::Data;
use poise::serenity_prelude as serenity;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "masterbot=info".parse().unwrap()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    if config.weather_api_key.is_none() {
        warn!("No WEATHER_API_KEY configured — weather commands are disabled");
    }

    let db = match masterbot::db::init_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            std::process::exit(1);
        }
    };

    let prefixes = match commands::prefix::load_prefixes(&db).await {
        Ok(prefixes) => {
            info!(guilds = prefixes.len(), "Loaded stored guild prefixes");
            prefixes
        }
        Err(e) => {
            error!(error = %e, "Failed to load guild prefixes");
            std::process::exit(1);
        }
    };

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let discord_token = config.discord_token.clone();
    let start_time = std::time::Instant::now();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::general::ping(),
                commands::general::info(),
                commands::general::help(),
                commands::general::invite(),
                commands::general::whatsnew(),
                commands::code::eval(),
                commands::code::created(),
                commands::code::binaryint(),
                commands::code::hexint(),
                commands::code::octint(),
                commands::code::source(),
                commands::weather::current(),
                commands::weather::forecast(),
                commands::weather::city(),
                commands::weather::timezone(),
                commands::weather::units(),
                commands::trivia::trivia(),
                commands::jokes::joke(),
                commands::jokes::jokeblacklist(),
                commands::prefix::prefix(),
            ],
            prefix_options: poise::PrefixFrameworkOptions {
                dynamic_prefix: Some(|ctx| Box::pin(commands::prefix::resolve(ctx))),
                mention_as_prefix: true,
                ..Default::default()
            },
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    events::guild::handle_event(ctx, event, data).await;
                    Ok(())
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            let embed = masterbot::utils::embeds::error_embed()
                                .title("Error")
                                .description(error.user_message());
                            let _ = ctx
                                .send(poise::CreateReply::default().embed(embed).ephemeral(true))
                                .await;
                            tracing::error!(
                                command = ctx.command().name,
                                error = %error,
                                "Command error"
                            );
                        }
                        poise::FrameworkError::CooldownHit {
                            remaining_cooldown,
                            ctx,
                            ..
                        } => {
                            let _ = ctx
                                .say(format!(
                                    "Patience. Wait {:.1} seconds",
                                    remaining_cooldown.as_secs_f64()
                                ))
                                .await;
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                tracing::error!(error = %e, "Error handling error");
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(
                    bot = %ready.user.name,
                    guilds = ready.guilds.len(),
                    ready_secs = format!("{:.1}", start_time.elapsed().as_secs_f64()),
                    "Logged in and ready"
                );

                // Register slash commands (guild-specific if GUILD_ID set, otherwise global)
                if let Some(guild_id) = config.guild_id {
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                        .await?;
                    info!(guild_id = %guild_id, "Slash commands registered to guild");
                } else {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    info!("Slash commands registered globally");
                }

                ctx.set_activity(Some(serenity::ActivityData::playing(format!(
                    "version {}",
                    config.bot_version
                ))));

                let weather = config
                    .weather_api_key
                    .clone()
                    .map(commands::weather::WeatherClient::new);

                Ok(Data {
                    db,
                    config,
                    start_time,
                    prefixes: RwLock::new(prefixes),
                    sandbox: SandboxConfig::default(),
                    weather,
                    trivia: commands::trivia::TriviaClient::new(),
                    jokes: commands::jokes::JokeClient::new(),
                })
            })
        })
        .build();

    let mut client = match serenity::ClientBuilder::new(discord_token, intents)
        .framework(framework)
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create Discord client");
            std::process::exit(1);
        }
    };

    // Graceful shutdown on SIGINT/SIGTERM
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping bot...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!(error = %why, "Client error");
    }
    info!("Bot has shut down cleanly");
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
