pub(crate) mod embedded_messages;
pub(crate) mod play;
pub(crate) mod queue;
pub(crate) mod search;
pub(crate) mod skip;
pub(crate) mod stop;

use poise::serenity_prelude::ChannelId;
use rusty_dj::music::MusicError;
use std::time::Duration;
use tracing::{info, warn};

use crate::{CommandResult, Context};

/// Format a duration into a human-readable string (e.g., "3:45" or "1:23:45")
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// The voice channel the invoking user is sitting in, from the guild cache.
fn caller_voice_channel(ctx: &Context<'_>) -> Option<ChannelId> {
    let guild = ctx.guild()?;
    guild
        .voice_states
        .get(&ctx.author().id)
        .and_then(|state| state.channel_id)
}

/// Shared body of `/play` and `/search`.
async fn enqueue(ctx: Context<'_>, query: String) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    let channel_id = caller_voice_channel(&ctx);

    // Looking a song up can take a few seconds
    ctx.defer().await?;

    let requested_by = ctx.author().name.clone();
    match ctx
        .data()
        .manager
        .enqueue(guild_id, &query, &requested_by, channel_id)
        .await
    {
        Ok(enqueued) => {
            info!(
                "Queued \"{}\" at position {} for {}",
                enqueued.song.title, enqueued.position, requested_by
            );
            ctx.send(embedded_messages::enqueued(&enqueued)).await?;
        }
        Err(err) => {
            warn!("Could not queue \"{}\": {}", query, err);
            ctx.send(embedded_messages::error(&err)).await?;
        }
    }

    Ok(())
}
