//! Playback core of the Rusty DJ bot. The Discord command layer in the
//! binary only calls into `music::PlaybackManager` and renders its results.

pub mod config;
pub mod music;
