use crate::{CommandResult, Context};

/// Play a song from a URL, or the first search result for anything else
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"] query: String,
) -> CommandResult {
    super::enqueue(ctx, query).await
}
