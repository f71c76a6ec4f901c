//! Sample songs and ids used across the playback tests.

use rusty_dj::music::Song;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;

pub const SAMPLE_USER: &str = "tester";

pub fn guild() -> GuildId {
    GuildId::new(1)
}

pub fn other_guild() -> GuildId {
    GuildId::new(2)
}

pub fn voice_channel() -> Option<ChannelId> {
    Some(ChannelId::new(10))
}

/// A song whose query, title and URL all derive from `name`.
pub fn song(name: &str) -> Song {
    Song::new(
        name,
        format!("https://www.youtube.com/watch?v={}", name),
        Duration::from_secs(200),
        SAMPLE_USER,
    )
}
