use poise::PrefixFrameworkOptions;
use tracing::{info, trace};

use crate::{
    commands,
    errors::{self, CommandError},
};

use super::{data::PoiseData, event_handler};

pub fn build(data: PoiseData) -> poise::Framework<PoiseData, CommandError> {
    poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::list(),
            prefix_options: PrefixFrameworkOptions {
                prefix: Some(data.config().bot.prefix().to_owned()),
                ..Default::default()
            },
            on_error: errors::handle_framework_error,
            event_handler: event_handler::poise,
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                let commands = framework.options().commands.as_ref();

                if let Some(guild_id) = data.config().bot.testing_server() {
                    poise::builtins::register_in_guild(ctx, commands, guild_id).await?;
                    info!(%guild_id, "registered commands in testing server");
                } else {
                    poise::builtins::register_globally(ctx, commands).await?;
                    info!("registered commands globally");
                }

                ctx.set_activity(data.config().bot.activity());

                trace!("finished setup, accepting commands");

                if let Some(status_channel) = data.config().bot.status_channel() {
                    status_channel.say(ctx, "ready!").await?;
                }

                Ok(data)
            })
        })
        .build()
}
