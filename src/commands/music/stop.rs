use rusty_dj::music::MusicError;

use super::embedded_messages;
use crate::{CommandResult, Context};

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let reply = match ctx.data().manager.stop(guild_id).await {
        Ok(()) => embedded_messages::stopped(),
        Err(err) => embedded_messages::error(&err),
    };
    ctx.send(reply).await?;

    Ok(())
}
