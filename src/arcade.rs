// Arcade screen: stage, five buttons, and the hidden secret control.

use bevy::prelude::*;
use strum::IntoEnumIterator;

use crate::actions::{ActionCompleted, StartAction};
use crate::audio::{Sfx, TrackManager};
use crate::screens::{ActionKey, Dispatch, Screens, SessionState};
use crate::stage::{STAGE_BG, ShowFragment, Stage, StageFragment, StageRoot};
use crate::win::SecretPressed;

pub struct ArcadePlugin;

impl Plugin for ArcadePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SessionState>()
            .add_message::<ActionTriggered>()
            .add_systems(OnEnter(Screens::Arcade), setup_arcade)
            .add_systems(
                Update,
                (
                    button_visuals,
                    press_buttons,
                    dispatch_actions,
                    record_completions,
                )
                    .chain()
                    .run_if(in_state(Screens::Arcade)),
            );
    }
}

const NORMAL_BUTTON: Color = Color::srgb(0.55, 0.08, 0.2);
const HOVERED_BUTTON: Color = Color::srgb(0.7, 0.12, 0.28);
const PRESSED_BUTTON: Color = Color::srgb(0.9, 0.2, 0.35);
const DISABLED_BUTTON: Color = Color::srgb(0.2, 0.2, 0.22);
const SECRET_BUTTON: Color = Color::srgb(0.75, 0.6, 0.1);

/// A press the dispatcher has not looked at yet.
#[derive(Message, Debug, Clone, Copy)]
pub struct ActionTriggered(pub ActionKey);

#[derive(Component)]
enum ArcadeButton {
    Action(ActionKey),
    Secret,
}

#[derive(Component)]
struct SecretFooter;

fn setup_arcade(mut commands: Commands, mut stage: ResMut<Stage>, mut show: MessageWriter<ShowFragment>) {
    // Root container.
    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(20.0),
                ..default()
            },
            BackgroundColor(Color::srgb(0.02, 0.01, 0.05)),
            DespawnOnExit(Screens::Arcade),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("BIRTHDAY ARCADE"),
                TextFont {
                    font_size: 40.0,
                    ..default()
                },
                TextColor(Color::srgb(1.0, 0.85, 0.2)),
            ));

            // Stage panel.
            parent.spawn((
                StageRoot,
                Node {
                    width: Val::Px(640.0),
                    height: Val::Px(340.0),
                    padding: UiRect::all(Val::Px(16.0)),
                    border: UiRect::all(Val::Px(3.0)),
                    ..default()
                },
                BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.3)),
                BackgroundColor(STAGE_BG),
                UiTransform::default(),
            ));

            // Button row.
            parent
                .spawn(Node {
                    flex_wrap: FlexWrap::Wrap,
                    justify_content: JustifyContent::Center,
                    column_gap: Val::Px(12.0),
                    row_gap: Val::Px(12.0),
                    max_width: Val::Px(900.0),
                    ..default()
                })
                .with_children(|row| {
                    for key in ActionKey::iter() {
                        spawn_button(row, key.label(), ArcadeButton::Action(key), NORMAL_BUTTON);
                    }
                });

            // Secret footer, hidden until every action has run.
            parent
                .spawn((
                    SecretFooter,
                    Node {
                        display: Display::None,
                        margin: UiRect::top(Val::Px(12.0)),
                        ..default()
                    },
                ))
                .with_children(|footer| {
                    spawn_button(footer, "???", ArcadeButton::Secret, SECRET_BUTTON);
                });
        });

    let epoch = stage.claim();
    show.write(ShowFragment {
        epoch,
        fragment: StageFragment::Idle,
    });
}

fn spawn_button(parent: &mut ChildSpawnerCommands, label: &str, marker: ArcadeButton, color: Color) {
    parent
        .spawn((
            marker,
            Button,
            Node {
                width: Val::Px(160.0),
                height: Val::Px(64.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(3.0)),
                ..default()
            },
            BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.3)),
            BackgroundColor(color),
        ))
        .with_children(|btn| {
            btn.spawn((
                Text::new(label),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
        });
}

fn button_visuals(
    session: Res<SessionState>,
    mut query: Query<(
        &ArcadeButton,
        &Interaction,
        &mut BackgroundColor,
        &mut BorderColor,
    )>,
) {
    for (button, interaction, mut bg, mut border) in &mut query {
        let (normal, lit) = match button {
            // Broken is disabled while its own sequence plays.
            ArcadeButton::Action(ActionKey::Broken) if session.media_playing() => {
                *bg = DISABLED_BUTTON.into();
                *border = BorderColor::all(Color::srgba(1.0, 1.0, 1.0, 0.1));
                continue;
            }
            ArcadeButton::Action(_) => (NORMAL_BUTTON, HOVERED_BUTTON),
            ArcadeButton::Secret => (SECRET_BUTTON, Color::srgb(0.95, 0.8, 0.2)),
        };
        match *interaction {
            Interaction::Pressed => {
                *bg = PRESSED_BUTTON.into();
                *border = BorderColor::all(Color::WHITE);
            }
            Interaction::Hovered => {
                *bg = lit.into();
                *border = BorderColor::all(Color::WHITE);
            }
            Interaction::None => {
                *bg = normal.into();
                // Finished actions keep a bright rim.
                let done = matches!(button, ArcadeButton::Action(key) if session.is_completed(*key));
                let rim = if done { 0.8 } else { 0.3 };
                *border = BorderColor::all(Color::srgba(1.0, 1.0, 1.0, rim));
            }
        }
    }
}

fn press_buttons(
    query: Query<(&Interaction, &ArcadeButton), Changed<Interaction>>,
    mut triggered: MessageWriter<ActionTriggered>,
    mut secret: MessageWriter<SecretPressed>,
    mut sfx: MessageWriter<Sfx>,
) {
    for (interaction, button) in &query {
        if *interaction != Interaction::Pressed {
            continue;
        }
        sfx.write(Sfx::Click);
        match button {
            ArcadeButton::Action(key) => {
                triggered.write(ActionTriggered(*key));
            }
            ArcadeButton::Secret => {
                secret.write(SecretPressed);
            }
        }
    }
}

/// The only mutual exclusion between handlers: presses during the media
/// sequence are answered with the busy message and dropped.
pub fn dispatch_actions(
    mut triggered: MessageReader<ActionTriggered>,
    mut session: ResMut<SessionState>,
    stage: Res<Stage>,
    mut show: MessageWriter<ShowFragment>,
    mut start: MessageWriter<StartAction>,
) {
    for &ActionTriggered(key) in triggered.read() {
        match session.dispatch(key) {
            Dispatch::Run => {
                info!("Action {key:?}");
                session.begin(key);
                start.write(StartAction(key));
            }
            Dispatch::Busy => {
                debug!("Action {key:?} rejected, media playing");
                show.write(stage.transient(StageFragment::Busy));
            }
            Dispatch::Ignored => {
                debug!("Action {key:?} already running");
            }
        }
    }
}

pub fn record_completions(
    mut completed: MessageReader<ActionCompleted>,
    mut session: ResMut<SessionState>,
    mut tracks: ResMut<TrackManager>,
    mut footer: Query<&mut Node, With<SecretFooter>>,
) {
    for &ActionCompleted(key) in completed.read() {
        if !session.finish(key) {
            continue;
        }
        info!("All actions completed, revealing secret");
        tracks.clap();
        if let Ok(mut node) = footer.single_mut() {
            node.display = Display::Flex;
        }
    }
}
