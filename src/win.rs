// Hidden win screen: birthday message, happy loop, confetti.
use bevy::prelude::*;
use fast_poisson::Poisson2D;
use rand::Rng;

use crate::audio::{Track, TrackManager};
use crate::screens::{Screens, SessionState};
use crate::stage::{ShowFragment, Stage, StageFragment, WobbleNoise};

pub struct WinPlugin;

impl Plugin for WinPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<SecretPressed>().add_systems(
            Update,
            (celebrate, fall_confetti)
                .chain()
                .run_if(in_state(Screens::Arcade)),
        );
    }
}

const CONFETTI_SPACING: f32 = 0.07;
const CONFETTI_SIZE: Vec2 = Vec2::new(8.0, 14.0);
const GRAVITY: f32 = 260.0;
const SWAY: f32 = 90.0;
const MAX_SPIN: f32 = 6.0;

const CONFETTI_COLORS: [Color; 6] = [
    Color::srgb(1.0, 0.85, 0.2),
    Color::srgb(1.0, 0.25, 0.35),
    Color::srgb(0.3, 0.8, 1.0),
    Color::srgb(0.5, 1.0, 0.45),
    Color::srgb(0.85, 0.45, 1.0),
    Color::WHITE,
];

#[derive(Message, Debug, Clone, Copy)]
pub struct SecretPressed;

#[derive(Component)]
struct Confetti {
    lane: f32,
    velocity: Vec2,
    spin: f32,
    angle: f32,
}

/// Blue-noise layout over a band above the top edge, in pixels.
fn confetti_layout(width: f32, height: f32, seed: u64) -> Vec<Vec2> {
    Poisson2D::new()
        .with_dimensions([1.0, 1.0], CONFETTI_SPACING)
        .with_seed(seed)
        .generate()
        .into_iter()
        .map(|[x, y]| Vec2::new(x * width, -y * height * 0.5))
        .collect()
}

fn celebrate(
    mut commands: Commands,
    mut pressed: MessageReader<SecretPressed>,
    session: Res<SessionState>,
    mut stage: ResMut<Stage>,
    mut tracks: ResMut<TrackManager>,
    mut show: MessageWriter<ShowFragment>,
    windows: Query<&Window>,
) {
    if pressed.read().count() == 0 {
        return;
    }

    info!("Secret pressed, celebrating");
    // The media sequence keeps the stage; its next item replaces the message.
    if session.media_playing() {
        show.write(stage.transient(StageFragment::Win));
    } else {
        let epoch = stage.claim();
        show.write(ShowFragment {
            epoch,
            fragment: StageFragment::Win,
        });
    }
    tracks.switch(Track::Happy);
    tracks.clap();

    let (width, height) = windows
        .single()
        .map(|w| (w.width(), w.height()))
        .unwrap_or((1280.0, 720.0));
    let mut rng = rand::rng();

    for (i, position) in confetti_layout(width, height, rng.random())
        .into_iter()
        .enumerate()
    {
        let color = CONFETTI_COLORS[rng.random_range(0..CONFETTI_COLORS.len())];
        commands.spawn((
            Confetti {
                lane: i as f32,
                velocity: Vec2::new(0.0, rng.random_range(40.0..140.0)),
                spin: rng.random_range(-MAX_SPIN..MAX_SPIN),
                angle: rng.random_range(0.0..std::f32::consts::TAU),
            },
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(position.x),
                top: Val::Px(position.y),
                width: Val::Px(CONFETTI_SIZE.x),
                height: Val::Px(CONFETTI_SIZE.y),
                ..default()
            },
            BackgroundColor(color),
            UiTransform::default(),
            GlobalZIndex(300),
            DespawnOnExit(Screens::Arcade),
        ));
    }
}

fn fall_confetti(
    mut commands: Commands,
    time: Res<Time>,
    noise: Res<WobbleNoise>,
    windows: Query<&Window>,
    mut pieces: Query<(Entity, &mut Confetti, &mut Node, &mut UiTransform)>,
) {
    let height = windows.single().map(|w| w.height()).unwrap_or(720.0);
    let dt = time.delta_secs();
    let t = time.elapsed_secs();

    for (entity, mut piece, mut node, mut transform) in &mut pieces {
        piece.velocity.y += GRAVITY * dt;
        piece.velocity.x = noise.sample(t * 0.8, piece.lane) * SWAY;
        piece.angle += piece.spin * dt;

        let (Val::Px(left), Val::Px(top)) = (node.left, node.top) else {
            continue;
        };
        let top = top + piece.velocity.y * dt;
        if top > height + CONFETTI_SIZE.y {
            commands.entity(entity).despawn();
            continue;
        }
        node.left = Val::Px(left + piece.velocity.x * dt);
        node.top = Val::Px(top);
        transform.rotation = Rot2::radians(piece.angle);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::media::{MediaEvent, MediaSequence};
    use crate::screens::ActionKey;

    fn app() -> App {
        let mut app = App::new();
        app.init_resource::<SessionState>()
            .init_resource::<Stage>()
            .init_resource::<TrackManager>()
            .add_message::<SecretPressed>()
            .add_message::<ShowFragment>()
            .add_systems(Update, celebrate);
        app
    }

    fn shown(app: &App) -> Vec<ShowFragment> {
        app.world()
            .resource::<Messages<ShowFragment>>()
            .iter_current_update_messages()
            .cloned()
            .collect()
    }

    #[test]
    fn secret_claims_an_idle_stage() {
        let mut app = app();
        let before = app.world().resource::<Stage>().epoch();

        app.world_mut().write_message(SecretPressed);
        app.update();

        let epoch = app.world().resource::<Stage>().epoch();
        assert!(epoch > before);
        let shown = shown(&app);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].epoch, epoch);
        assert!(matches!(shown[0].fragment, StageFragment::Win));
        assert_eq!(app.world().resource::<TrackManager>().current(), Track::Clap);
    }

    #[test]
    fn secret_during_media_leaves_the_stage_to_the_sequence() {
        let mut app = app();
        app.world_mut()
            .resource_mut::<SessionState>()
            .begin(ActionKey::Broken);
        let media_epoch = app.world_mut().resource_mut::<Stage>().claim();
        let mut sequence = MediaSequence::default();
        sequence.start(media_epoch);
        sequence.advance(Duration::from_secs(1));

        app.world_mut().write_message(SecretPressed);
        app.update();

        let stage_epoch = app.world().resource::<Stage>().epoch();
        assert_eq!(stage_epoch, media_epoch);
        let shown = shown(&app);
        assert!(matches!(shown[0].fragment, StageFragment::Win));
        assert_eq!(shown[0].epoch, media_epoch);

        // The remaining items and the diagnosis are written under the
        // sequence's epoch, which is still the stage's.
        assert_eq!(sequence.epoch(), Some(stage_epoch));
        let events = sequence.advance(Duration::from_secs(30));
        assert!(events.contains(&MediaEvent::ShowItem(2)));
        assert_eq!(events.last(), Some(&MediaEvent::Finished));
    }

    #[test]
    fn layout_sits_above_the_screen() {
        let points = confetti_layout(800.0, 600.0, 3);
        assert!(!points.is_empty());
        for p in &points {
            assert!((0.0..=800.0).contains(&p.x));
            assert!((-300.0..=0.0).contains(&p.y));
        }
    }

    #[test]
    fn layout_is_seeded() {
        assert_eq!(confetti_layout(800.0, 600.0, 9), confetti_layout(800.0, 600.0, 9));
    }
}
