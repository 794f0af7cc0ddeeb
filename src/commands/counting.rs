use poise::serenity_prelude::{self as serenity, GuildId};
use tracing::instrument;

use crate::{
    commands::LogCommands,
    counting::{engine::Snapshot, store::Stat},
    errors::{CommandError, GuildOnlyError},
    utils::{
        poise::{CommandResult, ContextExt},
        Context,
    },
};

fn guild(ctx: Context<'_>) -> Result<GuildId, CommandError> {
    ctx.guild_id()
        .ok_or_else(|| GuildOnlyError::new(ctx.command().qualified_name.clone()).into())
}

fn describe(snapshot: &Snapshot) -> String {
    let state = snapshot.state;

    let last = state
        .last_counter
        .map_or_else(String::new, |id| format!(" (last counted by <@{id}>)"));
    let channel = snapshot
        .channel
        .map_or_else(|| "not set".to_owned(), |id| format!("<#{id}>"));
    let chat = if snapshot.allow_chat {
        "allowed"
    } else {
        "not allowed"
    };
    let paused = if snapshot.paused { "yes" } else { "no" };

    format!(
        "current count: `{}`{last}\nchannel: {channel}\nchat between counts: {chat}\npaused: {paused}",
        state.count
    )
}

/// count together, one number at a time
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    subcommand_required,
    subcommands("channel", "pause", "resume", "chat", "settings", "score", "leaderboard"),
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn counting(_ctx: Context<'_>) -> CommandResult {
    Ok(())
}

/// set the channel the game is played in
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "where to count"]
    #[channel_types("Text")]
    channel: serenity::GuildChannel,
) -> CommandResult {
    ctx.log_command().await;

    let guild = guild(ctx)?;

    if channel.guild_id != guild {
        ctx.reply_ephemeral("that channel isn't in this server!")
            .await?;
        return Ok(());
    }

    ctx.data().counting().bind(guild, channel.id).await?;
    ctx.reply_ext(format!("counting now happens in <#{}>!", channel.id))
        .await?;

    Ok(())
}

/// stop evaluating messages in the counting channel
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;

    ctx.data().counting().set_paused(guild(ctx)?, true).await?;
    ctx.reply_ext("counting paused ⏸️").await?;

    Ok(())
}

/// pick the count back up
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn resume(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;

    let guild = guild(ctx)?;
    let counting = ctx.data().counting();

    counting.set_paused(guild, false).await?;
    let state = counting.state(guild).await?;

    ctx.reply_ext(format!(
        "counting resumed ▶️ next number is `{}`",
        state.expected()
    ))
    .await?;

    Ok(())
}

/// allow or forbid chatting between counts
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn chat(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;

    let allowed = ctx.data().counting().toggle_chat(guild(ctx)?).await?;

    let reply = if allowed {
        "chatting between counts is now allowed 💬"
    } else {
        "chatting between counts will now ruin the count 🤐"
    };
    ctx.reply_ext(reply).await?;

    Ok(())
}

/// show how the game is set up here
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn settings(ctx: Context<'_>) -> CommandResult {
    ctx.log_command().await;

    let snapshot = ctx.data().counting().settings(guild(ctx)?).await?;
    ctx.reply_ext(describe(&snapshot)).await?;

    Ok(())
}

/// show someone's counting record
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn score(
    ctx: Context<'_>,
    #[description = "whose record to show (defaults to you)"] user: Option<serenity::User>,
) -> CommandResult {
    ctx.log_command().await;

    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let profile = ctx.data().counting().profile(user.id).await?;

    ctx.reply_ext(format!("<@{}> {profile}", user.id)).await?;

    Ok(())
}

/// show the best (and worst) counters
#[instrument(skip_all)]
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_bot_permissions = "SEND_MESSAGES | VIEW_CHANNEL"
)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "what to rank by (defaults to total)"] stat: Option<Stat>,
) -> CommandResult {
    ctx.log_command().await;

    let size = ctx.data().config().counting.leaderboard_size();
    let board = ctx
        .data()
        .counting()
        .leaderboard(stat.unwrap_or(Stat::Total), size)
        .await?;

    ctx.reply_ext(board.to_string()).await?;

    Ok(())
}
