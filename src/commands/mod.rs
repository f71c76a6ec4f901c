//! This module aggregates all the command modules for the bot.

/// General purpose commands (e.g., about).
pub(crate) mod general;
/// Commands related to music playback.
pub(crate) mod music;
