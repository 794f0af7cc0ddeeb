#![warn(clippy::perf)]
#![warn(clippy::unwrap_used)]

mod commands;
mod counting;
mod errors;
mod framework;
mod utils;

use poise::serenity_prelude::{self as serenity, GatewayIntents};
use thisslime::TracingError;
use tracing::info;
use tracing_unwrap::ResultExt;

use framework::{Config, PoiseData};

#[tokio::main]
async fn main() {
    framework::logging::init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "starting countbot");

    run()
        .await
        .inspect_err(|err| err.trace())
        .expect_or_log("countbot stopped");
}

async fn run() -> Result<(), errors::Error> {
    let config = Config::load()?;
    info!("config loaded");

    if let Some(flavor_text) = config.logs.flavor_text() {
        info!("{flavor_text}")
    }

    let token = config.bot.token().to_owned();

    let data = PoiseData::new(config).await?;
    let framework = framework::poise::build(data);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::Client::builder(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;

    Ok(())
}
