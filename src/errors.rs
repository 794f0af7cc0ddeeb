use poise::{
    serenity_prelude::{self as serenity, Permissions},
    BoxFuture, FrameworkError,
};

use thiserror::Error as ThisError;
use thisslime::TracingError;
use tracing::{error, error_span, Instrument};

use crate::{
    counting,
    framework::{self, event_handler::HandlerError, PoiseData},
    utils::{poise::ContextExt, Context},
};

pub fn handle_framework_error(err: FrameworkError<'_, PoiseData, CommandError>) -> BoxFuture<()> {
    Box::pin(async move {
        match err {
            FrameworkError::Command { error, ctx, .. } => {
                let command = ctx.invoked_command_name();
                let span = error_span!("", command);

                handle_command_error(error, ctx).instrument(span).await;
            }
            FrameworkError::EventHandler { error, event, .. } => {
                let span = error_span!("", event = event.snake_case_name());
                let _enter = span.enter();

                error.trace();
            }
            FrameworkError::MissingBotPermissions {
                missing_permissions,
                ctx,
                ..
            } => {
                let command = ctx.invoked_command_name();
                let span = error_span!("", command);
                let _enter = span.enter();

                error!(%missing_permissions, "bot is missing permissions");
            }
            _ => {
                if let Err(err) = poise::builtins::on_error(err).await {
                    error!(%err, "failed to handle framework error");
                }
            }
        };
    })
}

async fn handle_command_error(err: CommandError, ctx: Context<'_>) {
    err.trace();

    if let Err(err) = ctx.reply_ephemeral(err.to_string()).await {
        error!(%err, "failed to send error message");
    }
}

#[derive(Debug, ThisError, TracingError)]
#[span(level = WARN)]
pub enum CommandError {
    #[error("input error: {0}")]
    SendMessage(#[from] SendMessageError),

    #[error("other serenity error: {0}")]
    #[event(level = ERROR)]
    Serenity(#[from] serenity::Error),

    #[error("the counting game is unavailable right now: {0}")]
    Counting(#[from] counting::Error),

    #[error("error from event handler: {0}")]
    EventHandler(#[from] HandlerError),

    #[error(transparent)]
    GuildOnly(#[from] GuildOnlyError),
}

#[derive(Debug, ThisError, TracingError)]
#[error("`{command}` only works in a server")]
#[event(level = WARN)]
pub struct GuildOnlyError {
    #[field(print = Display)]
    command: String,
}

impl GuildOnlyError {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

/// Everything that can stop the bot from starting or keep it from running.
#[derive(Debug, ThisError, TracingError)]
#[span]
pub enum Error {
    #[error(transparent)]
    Config(#[from] framework::config::Error),

    #[error(transparent)]
    Data(#[from] framework::DataError),

    #[error("discord client error: {0}")]
    #[event(level = ERROR)]
    Client(#[from] serenity::Error),
}

#[derive(Debug, ThisError, TracingError)]
#[span(level = ERROR)]
pub enum SendMessageError {
    #[error(transparent)]
    Permissions(#[from] MissingPermissionsError),

    #[error(transparent)]
    MessageTooLong(#[from] MessageTooLongError),

    #[error("couldn't send message: {0}")]
    #[event(level = ERROR)]
    Other(serenity::Error),
}

impl From<serenity::Error> for SendMessageError {
    fn from(value: serenity::Error) -> Self {
        match value {
            serenity::Error::Model(ref model) => match model {
                serenity::ModelError::InvalidPermissions { required, present } => {
                    Self::Permissions(MissingPermissionsError {
                        required: *required,
                        present: *present,
                    })
                }
                serenity::ModelError::MessageTooLong(len) => {
                    Self::MessageTooLong(MessageTooLongError { length: *len })
                }
                _ => Self::Other(value),
            },
            _ => Self::Other(value),
        }
    }
}

#[derive(Debug, ThisError, TracingError)]
#[error("missing permissions: {}", self.missing())]
#[event(level = WARN)]
pub struct MissingPermissionsError {
    #[field(print = Display)]
    required: Permissions,

    #[field(print = Display)]
    present: Permissions,
}

impl MissingPermissionsError {
    fn missing(&self) -> Permissions {
        self.required.difference(self.present)
    }
}

#[derive(Debug, ThisError, TracingError)]
#[event(level = ERROR)]
#[error("message is too long")]
pub struct MessageTooLongError {
    #[field(print = Display)]
    pub length: usize,
}
