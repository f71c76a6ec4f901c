use poise::CreateReply;
use rusty_dj::music::MusicError;

use super::embedded_messages;
use crate::{CommandResult, Context};

/// View the current music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let snapshot = ctx.data().manager.snapshot(guild_id).await;
    ctx.send(
        CreateReply::default()
            .embed(embedded_messages::music_queue(snapshot.as_ref()))
            .ephemeral(false),
    )
    .await?;

    Ok(())
}
