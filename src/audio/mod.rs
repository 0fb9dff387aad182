// Synthesized sound effects and the background track state machine.
pub mod synth;

use std::time::Duration;

use bevy::audio::{AudioSinkPlayback, Volume};
use bevy::prelude::*;
use bevy::window::WindowOccluded;

use crate::screens::Screens;

pub struct SynthAudioPlugin;

impl Plugin for SynthAudioPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TrackManager>()
            .add_message::<Sfx>()
            .add_systems(Startup, render_sounds)
            .add_systems(OnEnter(Screens::Arcade), start_game_track)
            .add_systems(
                Update,
                (
                    play_sfx,
                    follow_window_visibility,
                    tick_track_restore,
                    sync_background_track,
                    hold_pending_tracks,
                )
                    .chain()
                    .run_if(resource_exists::<SynthSounds>),
            );
    }
}

/// How long a clap holds the background slot before the prior track returns.
pub const CLAP_HOLD: Duration = Duration::from_millis(1_200);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Track {
    #[default]
    None,
    Game,
    Happy,
    Clap,
}

#[derive(Debug, Clone, Copy)]
struct PendingRestore {
    generation: u64,
    restore_to: Track,
    remaining: Duration,
}

/// Which background track is logically current.
///
/// Every transition bumps `generation`. A clap schedules a restore tagged
/// with the generation it created; the restore only applies if nothing has
/// transitioned since and the clap is still current.
#[derive(Resource, Debug, Default)]
pub struct TrackManager {
    current: Track,
    generation: u64,
    pending: Option<PendingRestore>,
    suspended: bool,
}

impl TrackManager {
    pub fn current(&self) -> Track {
        self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// The track that will be playing once any clap has finished.
    fn settled(&self) -> Track {
        match (self.current, self.pending) {
            (Track::Clap, Some(pending)) => pending.restore_to,
            (current, _) => current,
        }
    }

    fn transition(&mut self, to: Track) {
        self.generation += 1;
        self.current = to;
    }

    /// Switch to a looping track. Happy is terminal: asking for game after it
    /// is refused. Returns whether the switch happened.
    pub fn switch(&mut self, to: Track) -> bool {
        if to == Track::Clap {
            self.clap();
            return true;
        }
        if self.settled() == Track::Happy && to != Track::Happy {
            return false;
        }
        if self.current == to {
            return false;
        }
        self.transition(to);
        true
    }

    /// Preempt whatever is playing with a clap burst.
    pub fn clap(&mut self) {
        let restore_to = self.settled();
        self.transition(Track::Clap);
        self.pending = Some(PendingRestore {
            generation: self.generation,
            restore_to,
            remaining: CLAP_HOLD,
        });
    }

    /// Advance the restore timer. Returns true if the prior track came back.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        pending.remaining = pending.remaining.saturating_sub(dt);
        if !pending.remaining.is_zero() {
            return false;
        }

        let pending = *pending;
        self.pending = None;
        if pending.generation != self.generation || self.current != Track::Clap {
            return false;
        }
        self.transition(pending.restore_to);
        true
    }

    pub fn suspend(&mut self) {
        if self.current != Track::None {
            self.suspended = true;
        }
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }
}

/// One-shot sound effects.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sfx {
    Click,
    Siren,
    Glitch,
    Chime,
}

#[derive(Resource)]
pub struct SynthSounds {
    click: Handle<AudioSource>,
    siren: Handle<AudioSource>,
    glitch: Handle<AudioSource>,
    chime: Handle<AudioSource>,
    clap: Handle<AudioSource>,
    game: Handle<AudioSource>,
    happy: Handle<AudioSource>,
}

impl SynthSounds {
    fn sfx(&self, sfx: Sfx) -> Handle<AudioSource> {
        match sfx {
            Sfx::Click => self.click.clone(),
            Sfx::Siren => self.siren.clone(),
            Sfx::Glitch => self.glitch.clone(),
            Sfx::Chime => self.chime.clone(),
        }
    }

    fn track(&self, track: Track) -> Option<Handle<AudioSource>> {
        match track {
            Track::None => None,
            Track::Game => Some(self.game.clone()),
            Track::Happy => Some(self.happy.clone()),
            Track::Clap => Some(self.clap.clone()),
        }
    }
}

#[derive(Component)]
struct BackgroundTrack {
    track: Track,
    generation: u64,
}

impl BackgroundTrack {
    /// Looping tracks carry on across unrelated changes; each clap is its own burst.
    fn matches(&self, tracks: &TrackManager) -> bool {
        self.track == tracks.current()
            && (self.track != Track::Clap || self.generation == tracks.generation())
    }
}

fn build_sounds(sources: &mut Assets<AudioSource>) -> Result<SynthSounds, hound::Error> {
    let mut add = |samples: Vec<f32>| -> Result<Handle<AudioSource>, hound::Error> {
        let bytes = synth::encode_wav(&samples)?;
        Ok(sources.add(AudioSource {
            bytes: bytes.into(),
        }))
    };
    Ok(SynthSounds {
        click: add(synth::click())?,
        siren: add(synth::siren())?,
        glitch: add(synth::glitch())?,
        chime: add(synth::chime())?,
        clap: add(synth::clap())?,
        game: add(synth::game_loop())?,
        happy: add(synth::happy_loop())?,
    })
}

/// Without sounds the audio systems stay idle; the rest of the app runs silent.
fn render_sounds(mut commands: Commands, mut sources: ResMut<Assets<AudioSource>>) {
    match build_sounds(&mut sources) {
        Ok(sounds) => {
            commands.insert_resource(sounds);
            debug!("Rendered synth sounds");
        }
        Err(err) => warn!("Failed to render synth sounds, running silent: {err}"),
    }
}

fn start_game_track(mut tracks: ResMut<TrackManager>) {
    tracks.switch(Track::Game);
}

fn play_sfx(mut commands: Commands, mut requests: MessageReader<Sfx>, sounds: Res<SynthSounds>) {
    for sfx in requests.read() {
        commands.spawn((AudioPlayer::new(sounds.sfx(*sfx)), PlaybackSettings::DESPAWN));
    }
}

fn follow_window_visibility(
    mut occluded: MessageReader<WindowOccluded>,
    mut tracks: ResMut<TrackManager>,
) {
    for event in occluded.read() {
        if event.occluded {
            debug!("Window hidden, suspending music");
            tracks.suspend();
        } else {
            tracks.resume();
        }
    }
}

fn tick_track_restore(time: Res<Time>, mut tracks: ResMut<TrackManager>) {
    // Bypass change detection so an idle tick doesn't look like a transition.
    if tracks.bypass_change_detection().tick(time.delta()) {
        tracks.set_changed();
    }
}

fn sync_background_track(
    mut commands: Commands,
    tracks: Res<TrackManager>,
    sounds: Res<SynthSounds>,
    playing: Query<(Entity, &BackgroundTrack)>,
    mut sinks: Query<&mut AudioSink, With<BackgroundTrack>>,
) {
    if !tracks.is_changed() {
        return;
    }

    let current = tracks.current();
    let mut already_playing = false;
    for (entity, track) in &playing {
        if track.matches(&tracks) {
            already_playing = true;
        } else {
            commands.entity(entity).despawn();
        }
    }

    if !already_playing {
        if let Some(handle) = sounds.track(current) {
            let settings = match current {
                Track::Clap => PlaybackSettings::DESPAWN,
                _ => PlaybackSettings::LOOP.with_volume(Volume::Linear(0.6)),
            };
            info!("Background track: {current:?}");
            commands.spawn((
                BackgroundTrack {
                    track: current,
                    generation: tracks.generation(),
                },
                AudioPlayer::new(handle),
                PlaybackSettings {
                    paused: tracks.is_suspended(),
                    ..settings
                },
            ));
        }
    }

    for mut sink in &mut sinks {
        if tracks.is_suspended() {
            sink.pause();
        } else {
            sink.play();
        }
    }
}

/// A track spawned this frame has no sink until audio output picks it up.
/// Keep its start settings in step with suspension so it doesn't start
/// playing behind a hidden window.
fn hold_pending_tracks(
    tracks: Res<TrackManager>,
    mut pending: Query<&mut PlaybackSettings, (With<BackgroundTrack>, Without<AudioSink>)>,
) {
    let suspended = tracks.is_suspended();
    for mut settings in &mut pending {
        if settings.paused != suspended {
            settings.paused = suspended;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: Duration = Duration::from_millis(100);

    fn run_for(tracks: &mut TrackManager, total: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            tracks.tick(STEP);
            elapsed += STEP;
        }
    }

    #[test]
    fn clap_restores_prior_track() {
        let mut tracks = TrackManager::default();
        assert!(tracks.switch(Track::Game));
        tracks.clap();
        assert_eq!(tracks.current(), Track::Clap);

        run_for(&mut tracks, CLAP_HOLD - STEP);
        assert_eq!(tracks.current(), Track::Clap);
        run_for(&mut tracks, STEP);
        assert_eq!(tracks.current(), Track::Game);
    }

    #[test]
    fn rapid_claps_restore_once_to_original() {
        let mut tracks = TrackManager::default();
        tracks.switch(Track::Game);
        tracks.clap();
        run_for(&mut tracks, Duration::from_millis(500));
        tracks.clap();

        // The first clap's deadline passes without effect.
        run_for(&mut tracks, Duration::from_millis(800));
        assert_eq!(tracks.current(), Track::Clap);

        run_for(&mut tracks, Duration::from_millis(400));
        assert_eq!(tracks.current(), Track::Game);

        let generation = tracks.generation();
        run_for(&mut tracks, Duration::from_secs(5));
        assert_eq!(tracks.current(), Track::Game);
        assert_eq!(tracks.generation(), generation);
    }

    #[test]
    fn stale_restore_does_not_resurrect() {
        let mut tracks = TrackManager::default();
        tracks.switch(Track::Game);
        tracks.clap();
        assert!(tracks.switch(Track::Happy));

        run_for(&mut tracks, CLAP_HOLD * 2);
        assert_eq!(tracks.current(), Track::Happy);
    }

    #[test]
    fn happy_is_terminal() {
        let mut tracks = TrackManager::default();
        tracks.switch(Track::Game);
        tracks.switch(Track::Happy);
        assert!(!tracks.switch(Track::Game));
        assert_eq!(tracks.current(), Track::Happy);

        // A clap during happy comes back to happy, and game stays refused.
        tracks.clap();
        assert!(!tracks.switch(Track::Game));
        run_for(&mut tracks, CLAP_HOLD);
        assert_eq!(tracks.current(), Track::Happy);
    }

    #[test]
    fn suspend_needs_an_active_track() {
        let mut tracks = TrackManager::default();
        tracks.suspend();
        assert!(!tracks.is_suspended());

        tracks.switch(Track::Game);
        tracks.suspend();
        assert!(tracks.is_suspended());
        tracks.resume();
        assert!(!tracks.is_suspended());
        assert_eq!(tracks.current(), Track::Game);
    }

    #[test]
    fn track_without_sink_follows_suspension() {
        let mut app = App::new();
        app.init_resource::<TrackManager>()
            .add_systems(Update, hold_pending_tracks);
        let entity = app
            .world_mut()
            .spawn((
                BackgroundTrack {
                    track: Track::Game,
                    generation: 1,
                },
                PlaybackSettings::LOOP,
            ))
            .id();

        {
            let mut tracks = app.world_mut().resource_mut::<TrackManager>();
            tracks.switch(Track::Game);
            tracks.suspend();
        }
        app.update();
        assert!(app.world().get::<PlaybackSettings>(entity).unwrap().paused);

        app.world_mut().resource_mut::<TrackManager>().resume();
        app.update();
        assert!(!app.world().get::<PlaybackSettings>(entity).unwrap().paused);
    }
}
