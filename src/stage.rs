// The stage: the one display region every action writes into.
use bevy::prelude::*;
use noiz::prelude::{common_noise::*, *};

use crate::media::{MediaAssets, MediaKind, media_item};
use crate::screens::Screens;

pub struct StagePlugin;

impl Plugin for StagePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Stage>()
            .init_resource::<WobbleNoise>()
            .add_message::<ShowFragment>()
            .add_systems(
                Update,
                (
                    render_stage,
                    fade_in,
                    type_dialogue,
                    blink_cursor,
                    play_clip,
                    jitter_glitch,
                )
                    .chain()
                    .run_if(in_state(Screens::Arcade)),
            );
    }
}

const FADE_SECS: f32 = 0.35;
const TYPE_INTERVAL: f32 = 0.045;
const BLINK_INTERVAL: f32 = 0.5;
const CLIP_ZOOM: f32 = 0.08;
const GLITCH_SHAKE: f32 = 14.0;

pub const LEAD: Color = Color::srgb(1.0, 0.85, 0.2);
pub const BODY: Color = Color::srgb(0.92, 0.92, 0.95);
pub const MUTED: Color = Color::srgb(0.55, 0.55, 0.62);
pub const ALERT: Color = Color::srgb(1.0, 0.25, 0.35);
pub const STAGE_BG: Color = Color::srgb(0.06, 0.05, 0.1);

/// Everything the stage knows how to show.
#[derive(Debug, Clone, PartialEq)]
pub enum StageFragment {
    Idle,
    Busy,
    ProgressLog {
        lines: Vec<&'static str>,
        total: usize,
    },
    Verdict,
    Roast(&'static str),
    Quest(&'static str),
    Dialogue(&'static str),
    Media {
        item: usize,
        caption: &'static str,
    },
    Diagnosis,
    Win,
}

impl StageFragment {
    fn fades(&self) -> bool {
        !matches!(
            self,
            StageFragment::Idle | StageFragment::Busy | StageFragment::ProgressLog { .. }
        )
    }
}

/// Ownership of the stage. Whoever claimed last owns it; writes carrying an
/// older epoch are dropped.
#[derive(Resource, Debug, Default)]
pub struct Stage {
    epoch: u64,
}

impl Stage {
    pub fn claim(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// A write that doesn't take ownership, so the owner's next write
    /// replaces it.
    pub fn transient(&self, fragment: StageFragment) -> ShowFragment {
        ShowFragment {
            epoch: self.epoch,
            fragment,
        }
    }
}

#[derive(Message, Debug, Clone)]
pub struct ShowFragment {
    pub epoch: u64,
    pub fragment: StageFragment,
}

/// The stage panel. Fragments are spawned as its children.
#[derive(Component)]
pub struct StageRoot;

/// Short shake applied to the stage panel before media playback.
#[derive(Component)]
pub struct Glitch {
    pub remaining: f32,
}

#[derive(Resource)]
pub struct WobbleNoise(pub Noise<Fbm<Perlin>>);

impl Default for WobbleNoise {
    fn default() -> WobbleNoise {
        let mut noise: Noise<Fbm<Perlin>> = Noise::<Fbm<Perlin>>::default();
        noise.set_seed(7);
        noise.set_frequency(3.0);
        WobbleNoise(noise)
    }
}

impl WobbleNoise {
    /// Roughly -1..1, smooth in `t`, decorrelated across `lane`.
    pub fn sample(&self, t: f32, lane: f32) -> f32 {
        self.0.sample_for::<f32>(Vec3::new(t, lane * 17.0, 0.0))
    }
}

#[derive(Component)]
struct FadeIn(f32);

#[derive(Component)]
struct Typewriter {
    full: &'static str,
    shown: usize,
    timer: Timer,
}

#[derive(Component)]
struct BlinkCursor(Timer);

#[derive(Component)]
struct ClipPlayback(f32);

fn render_stage(
    mut commands: Commands,
    stage: Res<Stage>,
    mut shows: MessageReader<ShowFragment>,
    root: Query<Entity, With<StageRoot>>,
    media: Res<MediaAssets>,
) {
    let Some(show) = shows.read().filter(|s| s.epoch == stage.epoch()).last() else {
        return;
    };
    let Ok(root) = root.single() else {
        return;
    };

    commands.entity(root).despawn_related::<Children>();
    commands.entity(root).with_children(|parent| {
        let mut content = parent.spawn(Node {
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            flex_direction: FlexDirection::Column,
            justify_content: JustifyContent::Center,
            align_items: AlignItems::Center,
            row_gap: Val::Px(10.0),
            ..default()
        });
        if show.fragment.fades() {
            content.insert(FadeIn(0.0));
        }
        content.with_children(|parent| spawn_fragment(parent, &show.fragment, &media));
    });
}

fn text(parent: &mut ChildSpawnerCommands, content: impl Into<String>, size: f32, color: Color) {
    parent.spawn((
        Text::new(content),
        TextFont {
            font_size: size,
            ..default()
        },
        TextColor(color),
    ));
}

fn spawn_fragment(parent: &mut ChildSpawnerCommands, fragment: &StageFragment, media: &MediaAssets) {
    match fragment {
        StageFragment::Idle => {
            text(parent, "INSERT COIN", 32.0, LEAD);
            text(parent, "(or just press a button)", 18.0, MUTED);
        }
        StageFragment::Busy => {
            text(parent, "BUSY... TRY AGAIN", 30.0, ALERT);
        }
        StageFragment::ProgressLog { lines, total } => {
            let progress = lines.len() as f32 / (*total).max(1) as f32;
            parent
                .spawn((
                    Node {
                        width: Val::Percent(80.0),
                        height: Val::Px(14.0),
                        border: UiRect::all(Val::Px(2.0)),
                        ..default()
                    },
                    BorderColor::all(BODY),
                ))
                .with_children(|bar| {
                    bar.spawn((
                        Node {
                            width: Val::Percent(progress * 100.0),
                            height: Val::Percent(100.0),
                            ..default()
                        },
                        BackgroundColor(LEAD),
                    ));
                });
            parent
                .spawn(Node {
                    width: Val::Percent(80.0),
                    flex_direction: FlexDirection::Column,
                    ..default()
                })
                .with_children(|log| {
                    for line in lines {
                        text(log, format!("> {line}"), 18.0, BODY);
                    }
                });
        }
        StageFragment::Verdict => {
            text(parent, "RESULT: You deserve cake.", 32.0, LEAD);
            text(parent, "STATUS: confirmed.", 20.0, BODY);
            parent
                .spawn((
                    Node {
                        padding: UiRect::axes(Val::Px(16.0), Val::Px(6.0)),
                        border: UiRect::all(Val::Px(4.0)),
                        margin: UiRect::top(Val::Px(12.0)),
                        ..default()
                    },
                    BorderColor::all(ALERT),
                    UiTransform {
                        rotation: Rot2::degrees(-12.0),
                        ..default()
                    },
                ))
                .with_children(|stamp| text(stamp, "APPROVED", 36.0, ALERT));
        }
        StageFragment::Roast(line) => {
            text(
                parent,
                "WARNING: You are about to be mildly misjudged.",
                26.0,
                LEAD,
            );
            text(parent, format!("RACE CONTROL: {line}"), 20.0, BODY);
        }
        StageFragment::Quest(scenario) => {
            parent
                .spawn((
                    Node {
                        width: Val::Percent(80.0),
                        flex_direction: FlexDirection::Column,
                        padding: UiRect::all(Val::Px(16.0)),
                        border: UiRect::all(Val::Px(2.0)),
                        row_gap: Val::Px(6.0),
                        ..default()
                    },
                    BorderColor::all(LEAD),
                ))
                .with_children(|card| {
                    text(card, "NEW QUEST", 14.0, ALERT);
                    text(card, "New Quest Unlocked", 28.0, LEAD);
                    text(card, "Be there without being asked", 18.0, BODY);
                    text(card, format!("Scenario: {scenario}"), 18.0, BODY);
                    text(card, "Quest already completed.", 16.0, MUTED);
                    text(card, "You do this anyway.", 16.0, MUTED);
                });
        }
        StageFragment::Dialogue(line) => {
            parent
                .spawn(Node {
                    width: Val::Percent(85.0),
                    padding: UiRect::all(Val::Px(16.0)),
                    column_gap: Val::Px(4.0),
                    align_items: AlignItems::Center,
                    ..default()
                })
                .with_children(|panel| {
                    panel.spawn((
                        Typewriter {
                            full: *line,
                            shown: 0,
                            timer: Timer::from_seconds(TYPE_INTERVAL, TimerMode::Repeating),
                        },
                        Text::new(""),
                        TextFont {
                            font_size: 24.0,
                            ..default()
                        },
                        TextColor(BODY),
                    ));
                    panel.spawn((
                        BlinkCursor(Timer::from_seconds(BLINK_INTERVAL, TimerMode::Repeating)),
                        Node {
                            width: Val::Px(12.0),
                            height: Val::Px(24.0),
                            ..default()
                        },
                        BackgroundColor(LEAD),
                    ));
                });
        }
        StageFragment::Media { item, caption } => {
            let Some(spec) = media_item(*item) else {
                return;
            };
            parent
                .spawn(Node {
                    width: Val::Percent(100.0),
                    height: Val::Percent(100.0),
                    overflow: Overflow::clip(),
                    ..default()
                })
                .with_children(|wrapper| {
                    let mut image = wrapper.spawn((
                        ImageNode::new(media.handle(*item)),
                        Node {
                            width: Val::Percent(100.0),
                            height: Val::Percent(100.0),
                            ..default()
                        },
                        UiTransform::default(),
                    ));
                    if matches!(spec.kind, MediaKind::Video { .. }) {
                        image.insert(ClipPlayback(0.0));
                    }

                    // REC / LIVE overlay and caption.
                    wrapper
                        .spawn(Node {
                            position_type: PositionType::Absolute,
                            width: Val::Percent(100.0),
                            height: Val::Percent(100.0),
                            flex_direction: FlexDirection::Column,
                            justify_content: JustifyContent::SpaceBetween,
                            padding: UiRect::all(Val::Px(12.0)),
                            ..default()
                        })
                        .with_children(|overlay| {
                            overlay
                                .spawn(Node {
                                    justify_content: JustifyContent::SpaceBetween,
                                    ..default()
                                })
                                .with_children(|top| {
                                    text(top, "REC", 16.0, ALERT);
                                    text(top, "LIVE", 16.0, BODY);
                                });
                            overlay
                                .spawn((
                                    Node {
                                        padding: UiRect::all(Val::Px(6.0)),
                                        ..default()
                                    },
                                    BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
                                ))
                                .with_children(|bar| text(bar, *caption, 18.0, BODY));
                        });
                });
        }
        StageFragment::Diagnosis => {
            text(parent, "DIAGNOSIS: functioning. Mostly.", 30.0, LEAD);
        }
        StageFragment::Win => {
            text(parent, "Happy Birthday.", 48.0, LEAD);
            text(parent, "I'm glad you exist.", 24.0, BODY);
        }
    }
}

fn fade_in(
    mut commands: Commands,
    time: Res<Time>,
    mut roots: Query<(Entity, &mut FadeIn)>,
    children: Query<&Children>,
    mut texts: Query<&mut TextColor>,
    mut images: Query<&mut ImageNode>,
) {
    for (entity, mut fade) in &mut roots {
        fade.0 += time.delta_secs();
        let alpha = (fade.0 / FADE_SECS).min(1.0);

        for child in children.iter_descendants(entity) {
            if let Ok(mut color) = texts.get_mut(child) {
                color.0.set_alpha(alpha);
            }
            if let Ok(mut image) = images.get_mut(child) {
                image.color.set_alpha(alpha);
            }
        }

        if alpha >= 1.0 {
            commands.entity(entity).remove::<FadeIn>();
        }
    }
}

fn type_dialogue(time: Res<Time>, mut writers: Query<(&mut Typewriter, &mut Text)>) {
    for (mut writer, mut text) in &mut writers {
        let total = writer.full.chars().count();
        if writer.shown >= total {
            continue;
        }
        writer.timer.tick(time.delta());
        let typed = writer.timer.times_finished_this_tick() as usize;
        if typed == 0 {
            continue;
        }
        writer.shown = (writer.shown + typed).min(total);
        **text = writer.full.chars().take(writer.shown).collect();
    }
}

fn blink_cursor(time: Res<Time>, mut cursors: Query<(&mut BlinkCursor, &mut Visibility)>) {
    for (mut blink, mut visibility) in &mut cursors {
        if blink.0.tick(time.delta()).just_finished() {
            *visibility = match *visibility {
                Visibility::Hidden => Visibility::Inherited,
                _ => Visibility::Hidden,
            };
        }
    }
}

/// Clips are shown as a slow push-in on their poster frame.
fn play_clip(time: Res<Time>, mut clips: Query<(&mut ClipPlayback, &mut UiTransform)>) {
    for (mut clip, mut transform) in &mut clips {
        clip.0 += time.delta_secs();
        let k = (clip.0 / crate::media::VIDEO_CAP_SECS).min(1.0);
        transform.scale = Vec2::splat(1.0 + CLIP_ZOOM * k);
    }
}

fn jitter_glitch(
    mut commands: Commands,
    time: Res<Time>,
    noise: Res<WobbleNoise>,
    mut stages: Query<(Entity, &mut Glitch, &mut UiTransform, &mut BackgroundColor), With<StageRoot>>,
) {
    for (entity, mut glitch, mut transform, mut bg) in &mut stages {
        glitch.remaining -= time.delta_secs();
        if glitch.remaining <= 0.0 {
            transform.translation = Val2::ZERO;
            bg.0 = STAGE_BG;
            commands.entity(entity).remove::<Glitch>();
            continue;
        }

        let t = time.elapsed_secs() * 12.0;
        transform.translation = Val2::px(
            noise.sample(t, 0.0) * GLITCH_SHAKE,
            noise.sample(t, 1.0) * GLITCH_SHAKE,
        );
        let flicker = noise.sample(t, 2.0).abs();
        bg.0 = STAGE_BG.to_srgba().mix(&ALERT.to_srgba(), flicker * 0.4).into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_supersede_and_transients_do_not() {
        let mut stage = Stage::default();
        let media = stage.claim();
        let busy = stage.transient(StageFragment::Busy);
        assert_eq!(busy.epoch, media);
        assert_eq!(stage.epoch(), media);

        let later = stage.claim();
        assert!(later > media);
    }

    #[test]
    fn only_finished_content_fades() {
        assert!(!StageFragment::Busy.fades());
        assert!(
            !StageFragment::ProgressLog {
                lines: vec!["ready"],
                total: 5
            }
            .fades()
        );
        assert!(StageFragment::Verdict.fades());
        assert!(StageFragment::Win.fades());
    }
}
