use poise::CreateReply;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use rusty_dj::music::{Enqueued, MusicError, QueueSnapshot, Song};
use std::time::Duration;

use super::format_duration;

/// How many upcoming songs the queue embed lists.
const QUEUE_PAGE: usize = 10;

fn duration_label(duration: Duration) -> String {
    if duration.is_zero() {
        "Live".to_string()
    } else {
        format_duration(duration)
    }
}

fn song_link(song: &Song) -> String {
    format!("[{}]({})", song.title, song.url)
}

/// Create an embed for a song that was just queued
pub fn enqueued(enqueued: &Enqueued) -> CreateReply {
    let Enqueued { song, position } = enqueued;

    let embed = if *position == 0 {
        CreateEmbed::new().title("🎵 Now Playing")
    } else {
        CreateEmbed::new().title("🎵 Added to Queue")
    };

    let mut embed = embed
        .description(song_link(song))
        .field("Duration", format!("`{}`", duration_label(song.duration)), true)
        .field("Requested by", &song.requested_by, true)
        .color(0x00ff00);

    if *position > 0 {
        embed = embed.field("Position", format!("`#{}`", position), true);
    }

    CreateReply::default().embed(embed)
}

/// Create an embed for a skipped song
pub fn skipped(song: &Song) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏭️ Skipped")
            .description(song_link(song))
            .color(0x00ff00),
    )
}

/// Create an embed for when playback was stopped
pub fn stopped() -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("⏹️ Stopped")
            .description("Stopped playback, cleared the queue and left the voice channel")
            .color(0x00ff00),
    )
}

/// Create an embed for the music queue
pub fn music_queue(snapshot: Option<&QueueSnapshot>) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎵 Music Queue")
        .description(queue_description(snapshot))
        .footer(CreateEmbedFooter::new(queue_total(snapshot)))
        .color(0x00ff00)
}

/// Counts every pending song, the one streaming included.
fn queue_total(snapshot: Option<&QueueSnapshot>) -> String {
    match snapshot.map_or(0, |snapshot| snapshot.songs.len()) {
        1 => "There is 1 song in total".to_string(),
        count => format!("There are {} songs in total", count),
    }
}

fn queue_description(snapshot: Option<&QueueSnapshot>) -> String {
    let mut description = String::new();

    let (current, upcoming): (Option<&Song>, &[Song]) = match snapshot {
        Some(snapshot) if snapshot.playing => match snapshot.songs.split_first() {
            Some((head, rest)) => (Some(head), rest),
            None => (None, &[]),
        },
        Some(snapshot) => (None, snapshot.songs.as_slice()),
        None => (None, &[]),
    };

    match current {
        Some(song) => {
            description.push_str("**🎵 Now Playing**\n");
            description.push_str(&format!(
                "**{}** `{}`\n\n",
                song_link(song),
                duration_label(song.duration)
            ));
        }
        None => description.push_str("**🔇 Nothing playing**\n\n"),
    }

    if upcoming.is_empty() {
        description.push_str("**📭 Queue is empty**");
    } else {
        description.push_str(&format!("**📋 Queue - {} tracks**\n", upcoming.len()));
        for (index, song) in upcoming.iter().take(QUEUE_PAGE).enumerate() {
            description.push_str(&format!(
                "{}. {} `{}`\n",
                index + 1,
                song_link(song),
                duration_label(song.duration)
            ));
        }
        if upcoming.len() > QUEUE_PAGE {
            description.push_str(&format!("…and {} more\n", upcoming.len() - QUEUE_PAGE));
        }

        let total: Duration = upcoming.iter().map(|song| song.duration).sum();
        if !total.is_zero() {
            description.push_str(&format!(
                "\n**⏱️ Total Duration:** `{}`",
                format_duration(total)
            ));
        }
    }

    description
}

/// Create an error embed for a failed music operation
pub fn error(err: &MusicError) -> CreateReply {
    let description = match err {
        MusicError::VoiceUnavailable => "You need to be in a voice channel".to_string(),
        MusicError::NotFound(_) => "Couldn't find anything to play for that".to_string(),
        MusicError::NothingPlaying => "No track is currently playing".to_string(),
        MusicError::NothingActive => "I'm not playing anything in this server".to_string(),
        MusicError::SessionClosed => {
            "Playback was stopped before your song was ready".to_string()
        }
        other => other.to_string(),
    };

    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(description)
                .color(0xff0000),
        )
        .ephemeral(matches!(err, MusicError::VoiceUnavailable))
}
