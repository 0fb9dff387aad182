// Main
mod actions;
mod arcade;
mod audio;
mod config;
mod countdown;
mod media;
mod screens;
mod stage;
mod win;

use bevy::prelude::*;
use actions::ActionsPlugin;
use arcade::ArcadePlugin;
use audio::SynthAudioPlugin;
use countdown::CountdownPlugin;
use media::MediaPlugin;
use screens::Screens;
use stage::StagePlugin;
use win::WinPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Happy Birthday".into(),
                fit_canvas_to_parent: true,
                ..default()
            }),
            ..default()
        }))
        .init_state::<Screens>()
        .insert_resource(ClearColor(Color::BLACK))
        .add_systems(Startup, spawn_camera)
        .add_plugins((
            CountdownPlugin,
            SynthAudioPlugin,
            StagePlugin,
            MediaPlugin,
            ActionsPlugin,
            ArcadePlugin,
            WinPlugin,
        ))
        .run();
}

fn spawn_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}
