use crate::{CommandResult, Context};

/// Search YouTube and queue the first result
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn search(
    ctx: Context<'_>,
    #[description = "What to search for"] query: String,
) -> CommandResult {
    super::enqueue(ctx, format!("ytsearch1:{}", query.trim())).await
}
