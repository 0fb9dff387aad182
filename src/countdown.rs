// Launch countdown overlay, followed by a one-shot launch card.

use bevy::prelude::*;
use chrono::{DateTime, TimeDelta, Utc};

use crate::config::{LaunchConfig, load_launch_config};
use crate::screens::Screens;

pub struct CountdownPlugin;

impl Plugin for CountdownPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (load_launch_config, arm_gate).chain())
            .add_systems(OnEnter(Screens::Countdown), setup_countdown)
            .add_systems(
                Update,
                (tick_countdown, play_launch_card)
                    .chain()
                    .run_if(in_state(Screens::Countdown).and(resource_exists::<CountdownGate>)),
            )
            .add_systems(OnExit(Screens::Countdown), exit_countdown);
    }
}

const FADE_IN: f32 = 0.2;
const HOLD: f32 = 1.0;
const FADE_OUT: f32 = 0.8;
const TOTAL: f32 = FADE_IN + HOLD + FADE_OUT;

/// What the gate saw on a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTick {
    Counting(TimeDelta),
    /// Emitted exactly once, on the first poll at or after the target.
    Launched,
    /// Already launched; nothing left to render.
    Done,
}

/// Counts down to a fixed instant and flips to launched exactly once.
#[derive(Resource, Debug, Clone)]
pub struct CountdownGate {
    target: DateTime<Utc>,
    launched: bool,
}

impl CountdownGate {
    pub fn new(target: DateTime<Utc>) -> CountdownGate {
        CountdownGate {
            target,
            launched: false,
        }
    }

    /// Time left, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> TimeDelta {
        (self.target - now).max(TimeDelta::zero())
    }

    pub fn poll(&mut self, now: DateTime<Utc>) -> GateTick {
        if self.launched {
            return GateTick::Done;
        }
        let remaining = self.remaining(now);
        if remaining.is_zero() {
            self.launched = true;
            GateTick::Launched
        } else {
            GateTick::Counting(remaining)
        }
    }

    pub fn is_launched(&self) -> bool {
        self.launched
    }
}

/// `DD:HH:MM:SS`, rounding partial seconds up so zero shows only at launch.
pub fn format_remaining(remaining: TimeDelta) -> String {
    let mut secs = remaining.num_seconds().max(0);
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    let days = secs / 86_400;
    let hours = (secs / 3_600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{days:02}:{hours:02}:{minutes:02}:{seconds:02}")
}

#[derive(Resource)]
struct CountdownTicker {
    timer: Timer,
    primed: bool,
}

#[derive(Resource)]
struct LaunchCard(f32);

#[derive(Component)]
struct CountdownDigits;

#[derive(Component)]
struct LaunchCardRoot;

#[derive(Component)]
struct LaunchCardText;

fn arm_gate(mut commands: Commands, config: Res<LaunchConfig>) {
    commands.insert_resource(CountdownGate::new(config.launch_at));
}

fn setup_countdown(mut commands: Commands) {
    commands.insert_resource(CountdownTicker {
        timer: Timer::from_seconds(1.0, TimerMode::Repeating),
        primed: false,
    });

    commands
        .spawn((
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(16.0),
                ..default()
            },
            BackgroundColor(Color::srgb(0.04, 0.02, 0.08)),
            DespawnOnExit(Screens::Countdown),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("LAUNCHING IN"),
                TextFont {
                    font_size: 28.0,
                    ..default()
                },
                TextColor(Color::srgba(0.8, 0.8, 0.8, 1.0)),
            ));
            parent.spawn((
                CountdownDigits,
                Text::new("--:--:--:--"),
                TextFont {
                    font_size: 64.0,
                    ..default()
                },
                TextColor(Color::srgb(1.0, 0.85, 0.2)),
            ));
        });
}

fn tick_countdown(
    mut commands: Commands,
    time: Res<Time>,
    mut gate: ResMut<CountdownGate>,
    ticker: Option<ResMut<CountdownTicker>>,
    mut digits: Query<&mut Text, With<CountdownDigits>>,
) {
    let Some(mut ticker) = ticker else {
        return;
    };

    ticker.timer.tick(time.delta());
    if ticker.primed && !ticker.timer.just_finished() {
        return;
    }
    ticker.primed = true;

    match gate.poll(Utc::now()) {
        GateTick::Counting(remaining) => {
            if let Ok(mut text) = digits.single_mut() {
                **text = format_remaining(remaining);
            }
        }
        GateTick::Launched => {
            info!("Countdown reached zero, launching");
            if let Ok(mut text) = digits.single_mut() {
                **text = format_remaining(TimeDelta::zero());
            }
            // Stop periodic updates for good.
            commands.remove_resource::<CountdownTicker>();
            spawn_launch_card(&mut commands);
        }
        GateTick::Done => {}
    }
}

fn spawn_launch_card(commands: &mut Commands) {
    commands.insert_resource(LaunchCard(0.0));

    commands
        .spawn((
            LaunchCardRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                position_type: PositionType::Absolute,
                ..default()
            },
            BackgroundColor(Color::BLACK),
            GlobalZIndex(100),
            DespawnOnExit(Screens::Countdown),
        ))
        .with_children(|parent| {
            parent.spawn((
                LaunchCardText,
                Text::new("LAUNCH!"),
                TextFont {
                    font_size: 72.0,
                    ..default()
                },
                TextColor(Color::srgba(1.0, 0.85, 0.2, 0.0)),
                UiTransform::default(),
            ));
        });
}

fn play_launch_card(
    time: Res<Time>,
    card: Option<ResMut<LaunchCard>>,
    mut texts: Query<(&mut TextColor, &mut UiTransform), With<LaunchCardText>>,
    mut backgrounds: Query<&mut BackgroundColor, With<LaunchCardRoot>>,
    mut next_screen: ResMut<NextState<Screens>>,
) {
    let Some(mut card) = card else {
        return;
    };

    card.0 += time.delta_secs();
    let t = card.0;

    if t >= TOTAL {
        next_screen.set(Screens::Arcade);
        return;
    }

    let (text_alpha, bg_alpha, scale) = if t < FADE_IN {
        let k = t / FADE_IN;
        (k, 1.0, 0.5 + 0.5 * k)
    } else if t < FADE_IN + HOLD {
        let k = (t - FADE_IN) / HOLD;
        (1.0, 1.0, 1.0 + 0.1 * k)
    } else {
        let k = (t - FADE_IN - HOLD) / FADE_OUT;
        (1.0 - k, 1.0 - k, 1.1 + 1.5 * k)
    };

    for (mut color, mut transform) in &mut texts {
        color.0 = color.0.with_alpha(text_alpha);
        transform.scale = Vec2::splat(scale);
    }
    for mut bg in &mut backgrounds {
        bg.0 = Color::srgba(0.0, 0.0, 0.0, bg_alpha);
    }
}

fn exit_countdown(mut commands: Commands) {
    commands.remove_resource::<LaunchCard>();
    commands.remove_resource::<CountdownTicker>();
}
