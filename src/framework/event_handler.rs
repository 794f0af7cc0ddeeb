use std::{future::Future, pin::Pin};

use poise::{
    serenity_prelude::{self as serenity, FullEvent},
    FrameworkContext,
};
use thiserror::Error;
use tracing::{info, instrument};

use super::data::PoiseData;
use crate::{
    counting::{self, intake, Submission},
    errors::{CommandError, SendMessageError},
};

#[derive(Debug, Error, thisslime::TracingError)]
#[span]
pub enum Error {
    #[error("error evaluating count: {0}")]
    Counting(#[from] counting::Error),

    #[error("error showing verdict: {0}")]
    Respond(#[from] SendMessageError),
}

pub use Error as HandlerError;

#[instrument(level = "debug", skip_all, fields(event = event.snake_case_name()))]
async fn event_handler(
    serenity_ctx: &serenity::Context,
    event: &FullEvent,
    _framework_ctx: FrameworkContext<'_, PoiseData, CommandError>,
    data: &PoiseData,
) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!(
                user = %data_about_bot.user.name,
                guilds = data_about_bot.guilds.len(),
                "connected to discord"
            );
        }
        FullEvent::Message { new_message: msg } => {
            let Some(submission) = Submission::from_message(msg) else {
                return Ok(());
            };

            let verdict = data.counting().submit(submission).await?;

            let feedback = intake::MessageFeedback::new(serenity_ctx, msg);
            intake::respond(&feedback, msg.author.id, &verdict, &data.config().counting).await?;
        }
        _ => (),
    }

    Ok(())
}

pub fn poise<'a>(
    serenity_ctx: &'a serenity::Context,
    event: &'a FullEvent,
    framework_ctx: FrameworkContext<'a, PoiseData, CommandError>,
    data: &'a PoiseData,
) -> Pin<Box<dyn Future<Output = Result<(), CommandError>> + Send + 'a>> {
    Box::pin(async move {
        event_handler(serenity_ctx, event, framework_ctx, data)
            .await
            .map_err(CommandError::from)
    })
}
