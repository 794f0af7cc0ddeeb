//! Typed schema for the settings table.
//!
//! Each setting has a fixed name and value kind. Stored keys are
//! `<name>_<guildId>` so that every guild runs its own game.

use poise::serenity_prelude::{ChannelId, GuildId};
use serde::{de::DeserializeOwned, Serialize};

use super::GameState;

pub trait Setting {
    const NAME: &'static str;
    type Value: Serialize + DeserializeOwned + Default + Send + Sync;

    fn key(guild: GuildId) -> String {
        format!("{}_{guild}", Self::NAME)
    }
}

/// The channel the game is played in. Nothing is evaluated while unset.
pub struct CountingChannel;

impl Setting for CountingChannel {
    const NAME: &'static str = "counting_channel_id";
    type Value = Option<ChannelId>;
}

pub struct Paused;

impl Setting for Paused {
    const NAME: &'static str = "counting_paused";
    type Value = bool;
}

/// Whether non-numbers may be sent between counts without ruining the count.
pub struct AllowChat;

impl Setting for AllowChat {
    const NAME: &'static str = "allow_chat_between_counts";
    type Value = bool;
}

/// The current count together with whoever reached it. Stored as one value so
/// both halves always change in the same write.
pub struct CountState;

impl Setting for CountState {
    const NAME: &'static str = "counting_state";
    type Value = GameState;
}
