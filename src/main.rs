use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtmbot::{Action, Attachment, Bot, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rtmbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Name: {}", config.bot.name);
    info!("  API: {}", config.slack.api_base_url);
    info!("  Delivery: {}", config.bot.delivery);
    info!("  On error: {:?}", config.connection.on_error);

    let mut bot = Bot::from_config(&config);
    register_actions(&mut bot)?;

    info!("{} is starting, ^C exits", bot.name());
    bot.connect().await?;

    Ok(())
}

fn register_actions(bot: &mut Bot) -> Result<()> {
    bot.hear(
        Action::new(r"(?i)\bhello\b", |session, ctx| async move {
            let greeting = format!("hello <@{}>", ctx.message.sender_id);
            session.say(&ctx.message, &greeting).await?;
            anyhow::Ok(())
        })?
        .with_friendly_pattern("hello")
        .with_description("Greets back"),
    );

    bot.respond(
        Action::new(r"\bping\b", |session, ctx| async move {
            session.say(&ctx.message, "pong").await?;
            anyhow::Ok(())
        })?
        .with_friendly_pattern("ping")
        .with_description("Checks that the bot is alive"),
    );

    bot.respond(
        Action::new(r"\bhelp\b", |session, ctx| async move {
            let attachment = Attachment {
                fallback: Some(session.help_text()),
                title: Some(format!("{} commands", session.name())),
                text: Some(session.help_text()),
                ..Attachment::default()
            };
            session
                .say_with_attachments(&ctx.message, "Here is what I can do:", vec![attachment])
                .await?;
            anyhow::Ok(())
        })?
        .with_friendly_pattern("help")
        .with_description("Lists every action"),
    );

    bot.respond(
        Action::new(r"\bmute (\d+)", |session, ctx| async move {
            let seconds: u64 = ctx
                .capture(1)
                .context("missing mute duration")?
                .parse()
                .context("mute duration is not a number")?;
            session
                .say(&ctx.message, &format!("going quiet for {} seconds", seconds))
                .await?;
            session.mute(Duration::from_secs(seconds));
            anyhow::Ok(())
        })?
        .with_friendly_pattern("mute <seconds>")
        .with_description("Stays quiet for a while"),
    );

    Ok(())
}
