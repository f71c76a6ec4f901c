use poise::CreateReply;
use poise::serenity_prelude::CreateEmbed;

use crate::{CommandResult, Context};

/// Show what this bot does
#[poise::command(slash_command, category = "General")]
pub async fn about(ctx: Context<'_>) -> CommandResult {
    let embed = CreateEmbed::new()
        .title("🎶 Rusty DJ")
        .description(
            "A music bot that plays YouTube audio in your voice channel.\n\n\
             Use `/play` with a link or `/search` with a few words to queue a song, \
             `/queue` to see what's next, `/skip` to move on and `/stop` to clear \
             everything and leave. I leave on my own after a while with nothing to play.",
        )
        .field("Version", format!("`{}`", env!("CARGO_PKG_VERSION")), true)
        .color(0x00ff00);

    ctx.send(CreateReply::default().embed(embed).ephemeral(false))
        .await?;

    Ok(())
}
