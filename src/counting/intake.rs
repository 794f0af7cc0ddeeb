//! The boundary between Discord and the counting engine.
//!
//! Incoming messages become [`Submission`]s, submissions for the same guild are
//! funnelled through one [`Lanes`] lock at a time, and verdicts are turned back
//! into reactions and notices by [`respond`].

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use poise::serenity_prelude::{
    self as serenity, ChannelId, GuildId, Http, Message, MessageId, ReactionType, UserId,
};
use thisslime::TracingError;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

use super::engine::{Presentation, Verdict, RESET_REACTION};
use crate::{errors::SendMessageError, framework::config::CountingConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Content {
    Number(u64),
    Text,
}

impl Content {
    /// Plain ASCII digits, surrounding whitespace ignored. Anything else,
    /// including signs and numbers too large to hold, counts as text.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Self::Text;
        }

        trimmed.parse().map_or(Self::Text, Self::Number)
    }
}

/// Message ids are snowflakes, so `id` also orders submissions by arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub id: MessageId,
    pub guild: GuildId,
    pub channel: ChannelId,
    pub author: UserId,
    pub content: Content,
}

impl Submission {
    /// `None` for messages that can never take part in a game: direct
    /// messages and anything sent by a bot.
    pub fn from_message(msg: &Message) -> Option<Self> {
        if msg.author.bot {
            return None;
        }

        Some(Self {
            id: msg.id,
            guild: msg.guild_id?,
            channel: msg.channel_id,
            author: msg.author.id,
            content: Content::classify(&msg.content),
        })
    }
}

/// One lock per guild. A guild has at most one counting channel, so this is
/// the per-channel serialization point; guilds never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct Lanes(Arc<Mutex<HashMap<GuildId, Arc<Mutex<()>>>>>);

impl Lanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the guild's lane. Waiters are served in the order they
    /// arrived.
    pub async fn enter(&self, guild: GuildId) -> OwnedMutexGuard<()> {
        let lane = {
            let mut guard = self.0.lock().await;
            guard.entry(guild).or_default().clone()
        };

        lane.lock_owned().await
    }
}

fn reset_notice(author: UserId, at: u64, reason: impl std::fmt::Display) -> String {
    format!("❌ <@{author}> broke the count at `{at}`: {reason}. Start again from 1!")
}

fn milestone_notice(count: u64) -> String {
    format!("🎉 Congratulations! We've hit **{count}**! Keep it going! 🎉")
}

/// Where verdicts are shown.
pub trait Feedback: Sync {
    /// Reacts to the submitted message.
    fn react(&self, emoji: &str) -> impl Future<Output = Result<(), SendMessageError>> + Send;

    /// Posts into the submission's channel, deleting the post after `ttl`.
    fn notice(
        &self,
        text: String,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), SendMessageError>> + Send;
}

pub struct MessageFeedback<'a> {
    ctx: &'a serenity::Context,
    msg: &'a Message,
}

impl<'a> MessageFeedback<'a> {
    pub fn new(ctx: &'a serenity::Context, msg: &'a Message) -> Self {
        Self { ctx, msg }
    }
}

impl Feedback for MessageFeedback<'_> {
    async fn react(&self, emoji: &str) -> Result<(), SendMessageError> {
        self.msg
            .react(self.ctx, ReactionType::Unicode(emoji.to_owned()))
            .await
            .map_err(SendMessageError::from)?;

        Ok(())
    }

    async fn notice(&self, text: String, ttl: Option<Duration>) -> Result<(), SendMessageError> {
        let notice = self
            .msg
            .channel_id
            .say(self.ctx, text)
            .await
            .map_err(SendMessageError::from)?;

        if let Some(ttl) = ttl {
            delete_after(self.ctx.http.clone(), notice, ttl);
        }

        Ok(())
    }
}

/// Shows a verdict for a submission by `author`. A reset always gets its
/// notice, even when the reaction can't be added.
pub async fn respond(
    feedback: &impl Feedback,
    author: UserId,
    verdict: &Verdict,
    config: &CountingConfig,
) -> Result<(), SendMessageError> {
    match *verdict {
        Verdict::Ignore => {}
        Verdict::Accept {
            presentation: Presentation::Reaction(tier),
            ..
        } => {
            feedback.react(tier.emoji()).await?;
        }
        Verdict::Accept {
            count,
            presentation: Presentation::Milestone,
        } => {
            feedback
                .notice(milestone_notice(count), config.milestone_notice_ttl())
                .await?;
        }
        Verdict::Reject { at, reason } => {
            if let Err(err) = feedback.react(RESET_REACTION).await {
                err.trace();
            }

            feedback
                .notice(reset_notice(author, at, reason), config.reset_notice_ttl())
                .await?;
        }
    }

    Ok(())
}

fn delete_after(http: Arc<Http>, notice: Message, ttl: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;

        match notice.delete(&*http).await {
            Ok(()) => trace!(message = %notice.id, "deleted notice"),
            Err(err) => warn!(message = %notice.id, %err, "could not delete notice"),
        }
    });
}
