use poise::{serenity_prelude as serenity, CreateReply};

use crate::{
    errors::{CommandError, SendMessageError},
    framework::PoiseData,
};

pub type Context<'a> = poise::Context<'a, PoiseData, CommandError>;

pub type Command = poise::Command<PoiseData, CommandError>;
pub type CommandResult = Result<(), CommandError>;

pub trait ContextExt {
    /// Replies without pinging anyone mentioned in `text`.
    async fn reply_ext(
        &self,
        text: impl Into<String>,
    ) -> Result<poise::ReplyHandle<'_>, SendMessageError>;

    /// Only the invoking user sees the reply. Prefix invocations get a plain
    /// reply instead.
    async fn reply_ephemeral(
        &self,
        text: impl Into<String>,
    ) -> Result<poise::ReplyHandle<'_>, SendMessageError>;
}

impl ContextExt for Context<'_> {
    async fn reply_ext(
        &self,
        text: impl Into<String>,
    ) -> Result<poise::ReplyHandle<'_>, SendMessageError> {
        let builder = CreateReply::default()
            .reply(true)
            .allowed_mentions(serenity::CreateAllowedMentions::new())
            .content(text);

        self.send(builder).await.map_err(SendMessageError::from)
    }

    async fn reply_ephemeral(
        &self,
        text: impl Into<String>,
    ) -> Result<poise::ReplyHandle<'_>, SendMessageError> {
        let builder = CreateReply::default()
            .reply(true)
            .ephemeral(true)
            .content(text);

        self.send(builder).await.map_err(SendMessageError::from)
    }
}
