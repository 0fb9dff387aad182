// Exclusive media sequence: glitch, three items in order, diagnosis.
use std::time::Duration;

use bevy::asset::LoadState;
use bevy::prelude::*;
use rand::Rng;

use crate::actions::ActionCompleted;
use crate::screens::{ActionKey, Screens};
use crate::stage::{ShowFragment, StageFragment};

pub struct MediaPlugin;

impl Plugin for MediaPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MediaSequence>()
            .add_systems(Startup, preload_media)
            .add_systems(
                Update,
                advance_media_sequence.run_if(in_state(Screens::Arcade)),
            );
    }
}

pub const GLITCH_SECS: f32 = 0.48;
pub const VIDEO_CAP_SECS: f32 = 3.5;
pub const IMAGE_SECS: f32 = 3.0;

const CAPTIONS: [&str; 4] = [
    "Studying (conceptually).",
    "Peak productivity.",
    "Absolutely focused individual.",
    "No thoughts. Just commitment.",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MediaKind {
    /// A clip; `natural` is its own length if known.
    Video { natural: Option<f32> },
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaItem {
    pub path: &'static str,
    pub kind: MediaKind,
}

impl MediaItem {
    /// Natural length capped for clips, fixed for stills.
    pub fn display_duration(&self) -> Duration {
        let secs = match self.kind {
            MediaKind::Video { natural } => natural.unwrap_or(VIDEO_CAP_SECS).min(VIDEO_CAP_SECS),
            MediaKind::Image => IMAGE_SECS,
        };
        Duration::from_secs_f32(secs)
    }
}

const MEDIA_ITEMS: [MediaItem; 3] = [
    MediaItem {
        path: "media/video1.png",
        kind: MediaKind::Video { natural: None },
    },
    MediaItem {
        path: "media/video2.png",
        kind: MediaKind::Video {
            natural: Some(2.6),
        },
    },
    MediaItem {
        path: "media/sleeping.png",
        kind: MediaKind::Image,
    },
];

pub fn media_item(index: usize) -> Option<&'static MediaItem> {
    MEDIA_ITEMS.get(index)
}

/// Handles loaded at startup so the sequence rarely waits on disk.
#[derive(Resource)]
pub struct MediaAssets {
    handles: Vec<Handle<Image>>,
}

impl MediaAssets {
    pub fn handle(&self, index: usize) -> Handle<Image> {
        self.handles.get(index).cloned().unwrap_or_default()
    }
}

fn preload_media(mut commands: Commands, asset_server: Res<AssetServer>) {
    let handles = MEDIA_ITEMS
        .iter()
        .map(|item| asset_server.load(item.path))
        .collect();
    commands.insert_resource(MediaAssets { handles });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    GlitchStarted,
    ShowItem(usize),
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Glitch,
    Item(usize),
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    epoch: u64,
    cursor: Cursor,
    remaining: Duration,
}

/// Where the exclusive sequence is. Advanced purely by elapsed time, so a
/// failed item still takes its slot and the sequence always finishes.
#[derive(Resource, Debug, Default)]
pub struct MediaSequence {
    playback: Option<Playback>,
}

impl MediaSequence {
    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    pub fn epoch(&self) -> Option<u64> {
        self.playback.map(|p| p.epoch)
    }

    /// Start playing under the given stage epoch. No-op while already playing.
    pub fn start(&mut self, epoch: u64) -> Option<MediaEvent> {
        if self.playback.is_some() {
            return None;
        }
        self.playback = Some(Playback {
            epoch,
            cursor: Cursor::Glitch,
            remaining: Duration::from_secs_f32(GLITCH_SECS),
        });
        Some(MediaEvent::GlitchStarted)
    }

    pub fn advance(&mut self, dt: Duration) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        let mut budget = dt;

        while let Some(playback) = self.playback.as_mut() {
            if budget < playback.remaining {
                playback.remaining -= budget;
                break;
            }
            budget -= playback.remaining;

            let next = match playback.cursor {
                Cursor::Glitch => 0,
                Cursor::Item(i) => i + 1,
            };
            match media_item(next) {
                Some(item) => {
                    playback.cursor = Cursor::Item(next);
                    playback.remaining = item.display_duration();
                    events.push(MediaEvent::ShowItem(next));
                }
                None => {
                    self.playback = None;
                    events.push(MediaEvent::Finished);
                }
            }
        }
        events
    }
}

fn advance_media_sequence(
    time: Res<Time>,
    mut sequence: ResMut<MediaSequence>,
    media: Res<MediaAssets>,
    asset_server: Res<AssetServer>,
    mut show: MessageWriter<ShowFragment>,
    mut completed: MessageWriter<ActionCompleted>,
) {
    let Some(epoch) = sequence.epoch() else {
        return;
    };
    let mut rng = rand::rng();

    for event in sequence.advance(time.delta()) {
        match event {
            MediaEvent::GlitchStarted => {}
            MediaEvent::ShowItem(index) => {
                let handle = media.handle(index);
                // Playback failures are not fatal; the slot still elapses.
                if let Some(LoadState::Failed(err)) = asset_server.get_load_state(&handle) {
                    debug!("Media item {index} failed to play, continuing: {err}");
                }
                let caption = CAPTIONS[rng.random_range(0..CAPTIONS.len())];
                show.write(ShowFragment {
                    epoch,
                    fragment: StageFragment::Media {
                        item: index,
                        caption,
                    },
                });
            }
            MediaEvent::Finished => {
                info!("Media sequence finished");
                show.write(ShowFragment {
                    epoch,
                    fragment: StageFragment::Diagnosis,
                });
                completed.write(ActionCompleted(ActionKey::Broken));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    fn run_to_end(sequence: &mut MediaSequence, frame: Duration) -> (Vec<MediaEvent>, Duration) {
        let mut events = Vec::new();
        let mut elapsed = Duration::ZERO;
        while sequence.is_playing() {
            events.extend(sequence.advance(frame));
            elapsed += frame;
            assert!(elapsed < Duration::from_secs(30), "sequence never finished");
        }
        (events, elapsed)
    }

    #[test]
    fn visits_three_items_in_order_then_finishes() {
        let mut sequence = MediaSequence::default();
        assert_eq!(sequence.start(1), Some(MediaEvent::GlitchStarted));

        let (events, elapsed) = run_to_end(&mut sequence, FRAME);
        assert_eq!(
            events,
            vec![
                MediaEvent::ShowItem(0),
                MediaEvent::ShowItem(1),
                MediaEvent::ShowItem(2),
                MediaEvent::Finished,
            ]
        );

        // 0.48 glitch + 3.5 capped clip + 2.6 clip + 3.0 still.
        let expected = Duration::from_secs_f32(GLITCH_SECS + VIDEO_CAP_SECS + 2.6 + IMAGE_SECS);
        assert!(elapsed >= expected);
        assert!(elapsed < expected + FRAME);
        assert!(!sequence.is_playing());
    }

    #[test]
    fn restart_while_playing_is_ignored() {
        let mut sequence = MediaSequence::default();
        sequence.start(1);
        sequence.advance(Duration::from_secs(1));
        assert_eq!(sequence.start(2), None);
        assert_eq!(sequence.epoch(), Some(1));
    }

    #[test]
    fn one_huge_frame_still_emits_every_step() {
        let mut sequence = MediaSequence::default();
        sequence.start(1);
        let events = sequence.advance(Duration::from_secs(60));
        assert_eq!(events.len(), 4);
        assert_eq!(events.last(), Some(&MediaEvent::Finished));
        assert!(sequence.start(2).is_some());
    }

    #[test]
    fn clip_duration_is_capped() {
        let long = MediaItem {
            path: "x",
            kind: MediaKind::Video { natural: Some(9.0) },
        };
        let short = MediaItem {
            path: "x",
            kind: MediaKind::Video { natural: Some(1.25) },
        };
        let unknown = MediaItem {
            path: "x",
            kind: MediaKind::Video { natural: None },
        };
        let still = MediaItem {
            path: "x",
            kind: MediaKind::Image,
        };
        assert_eq!(long.display_duration(), Duration::from_secs_f32(3.5));
        assert_eq!(short.display_duration(), Duration::from_secs_f32(1.25));
        assert_eq!(unknown.display_duration(), Duration::from_secs_f32(3.5));
        assert_eq!(still.display_duration(), Duration::from_secs(3));
    }
}
