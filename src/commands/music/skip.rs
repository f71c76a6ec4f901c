use rusty_dj::music::MusicError;

use super::embedded_messages;
use crate::{CommandResult, Context};

/// Skip the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let reply = match ctx.data().manager.skip(guild_id).await {
        Ok(song) => embedded_messages::skipped(&song),
        Err(err) => embedded_messages::error(&err),
    };
    ctx.send(reply).await?;

    Ok(())
}
