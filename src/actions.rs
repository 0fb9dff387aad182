// Handlers for the five arcade actions.
use std::collections::VecDeque;
use std::time::Duration;

use bevy::prelude::*;
use rand::Rng;

use crate::audio::{Sfx, TrackManager};
use crate::media::{GLITCH_SECS, MediaSequence};
use crate::screens::{ActionKey, Screens};
use crate::stage::{Glitch, ShowFragment, Stage, StageFragment, StageRoot};

pub struct ActionsPlugin;

impl Plugin for ActionsPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<StartAction>()
            .add_message::<ActionCompleted>()
            .add_systems(
                Update,
                (start_actions, run_routines)
                    .chain()
                    .run_if(in_state(Screens::Arcade)),
            );
    }
}

const LOG_INTERVAL: f32 = 0.4;

const PROGRESS_LOG: [&str; 5] = [
    "initializing birthday_protocol_v1",
    "syncing ego_resilience",
    "loading premium_vibes",
    "calibrating chaos",
    "ready",
];

const ROAST_LINES: [&str; 5] = [
    "You help everyone except yourself.",
    "You act unbothered with impressive consistency.",
    "You take responsibility for things you didn't break.",
    "You're calm until you're not. Then you recover quickly.",
    "You show up even when rest would be smarter.",
];

const DIALOGUE_LINES: [&str; 4] = [
    "Relax. This is not flirting.",
    "This interaction meant nothing. Remember it forever.",
    "I would tease you more, but you'd overthink it.",
    "You're smiling. That was not the goal.",
];

const QUEST_SCENARIOS: [&str; 3] = [
    "Friend stressed at 2am",
    "Someone lost in a new city",
    "Person pretending they're fine",
];

/// The dispatcher accepted a press; run the handler.
#[derive(Message, Debug, Clone, Copy)]
pub struct StartAction(pub ActionKey);

/// A handler ran to completion.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionCompleted(pub ActionKey);

fn pick(lines: &[&'static str]) -> &'static str {
    lines[rand::rng().random_range(0..lines.len())]
}

/// One step of a handler script.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Show(StageFragment),
    Wait(Duration),
    Sfx(Sfx),
    Clap,
    Complete,
}

/// A handler written as an ordered list of steps with waits between them.
#[derive(Component, Debug)]
pub struct Routine {
    key: ActionKey,
    epoch: u64,
    steps: VecDeque<Step>,
    wait: Duration,
}

impl Routine {
    pub fn new(key: ActionKey, epoch: u64, steps: impl IntoIterator<Item = Step>) -> Routine {
        Routine {
            key,
            epoch,
            steps: steps.into_iter().collect(),
            wait: Duration::ZERO,
        }
    }

    /// Everything due after `dt` more time, in order. Waits are consumed
    /// here and never returned.
    pub fn advance(&mut self, dt: Duration) -> Vec<Step> {
        let mut due = Vec::new();
        let mut budget = dt;
        loop {
            if !self.wait.is_zero() {
                if budget < self.wait {
                    self.wait -= budget;
                    break;
                }
                budget -= self.wait;
                self.wait = Duration::ZERO;
            }
            match self.steps.pop_front() {
                Some(Step::Wait(wait)) => self.wait = wait,
                Some(step) => due.push(step),
                None => break,
            }
        }
        due
    }

    pub fn is_done(&self) -> bool {
        self.steps.is_empty() && self.wait.is_zero()
    }
}

/// Script for a non-media action.
pub fn script(key: ActionKey) -> Vec<Step> {
    match key {
        ActionKey::Unnecessary => {
            let interval = Duration::from_secs_f32(LOG_INTERVAL);
            let mut steps = vec![Step::Show(StageFragment::ProgressLog {
                lines: Vec::new(),
                total: PROGRESS_LOG.len(),
            })];
            for shown in 1..=PROGRESS_LOG.len() {
                steps.push(Step::Wait(interval));
                steps.push(Step::Show(StageFragment::ProgressLog {
                    lines: PROGRESS_LOG[..shown].to_vec(),
                    total: PROGRESS_LOG.len(),
                }));
            }
            // One more tick to notice the log is done, then the reveal delay.
            steps.push(Step::Wait(interval * 2));
            steps.extend([
                Step::Show(StageFragment::Verdict),
                Step::Sfx(Sfx::Chime),
                Step::Clap,
                Step::Complete,
            ]);
            steps
        }
        ActionKey::Emergency => vec![
            Step::Sfx(Sfx::Siren),
            Step::Show(StageFragment::Roast(pick(&ROAST_LINES))),
            Step::Complete,
        ],
        ActionKey::SideQuest => vec![
            Step::Show(StageFragment::Quest(pick(&QUEST_SCENARIOS))),
            Step::Complete,
        ],
        ActionKey::DoNot => vec![
            Step::Show(StageFragment::Dialogue(pick(&DIALOGUE_LINES))),
            Step::Complete,
        ],
        // The media sequence runs on its own clock.
        ActionKey::Broken => Vec::new(),
    }
}

fn start_actions(
    mut commands: Commands,
    mut starts: MessageReader<StartAction>,
    mut stage: ResMut<Stage>,
    mut sequence: ResMut<MediaSequence>,
    roots: Query<Entity, With<StageRoot>>,
    mut sfx: MessageWriter<Sfx>,
) {
    for &StartAction(key) in starts.read() {
        let epoch = stage.claim();
        if key != ActionKey::Broken {
            commands.spawn(Routine::new(key, epoch, script(key)));
            continue;
        }

        if sequence.start(epoch).is_none() {
            debug!("Media sequence already playing");
            continue;
        }
        if let Ok(root) = roots.single() {
            commands.entity(root).insert(Glitch {
                remaining: GLITCH_SECS,
            });
        }
        sfx.write(Sfx::Glitch);
    }
}

fn run_routines(
    mut commands: Commands,
    time: Res<Time>,
    mut routines: Query<(Entity, &mut Routine)>,
    mut tracks: ResMut<TrackManager>,
    mut show: MessageWriter<ShowFragment>,
    mut sfx: MessageWriter<Sfx>,
    mut completed: MessageWriter<ActionCompleted>,
) {
    for (entity, mut routine) in &mut routines {
        let epoch = routine.epoch;
        let key = routine.key;
        for step in routine.advance(time.delta()) {
            match step {
                Step::Show(fragment) => {
                    show.write(ShowFragment { epoch, fragment });
                }
                Step::Sfx(effect) => {
                    sfx.write(effect);
                }
                Step::Clap => tracks.clap(),
                Step::Complete => {
                    completed.write(ActionCompleted(key));
                }
                Step::Wait(_) => {}
            }
        }
        if routine.is_done() {
            commands.entity(entity).despawn();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shows(steps: &[Step]) -> usize {
        steps.iter().filter(|s| matches!(s, Step::Show(_))).count()
    }

    #[test]
    fn progress_log_runs_on_its_interval() {
        let mut routine = Routine::new(ActionKey::Unnecessary, 1, script(ActionKey::Unnecessary));

        // Empty log straight away.
        let now = routine.advance(Duration::ZERO);
        assert_eq!(
            now,
            vec![Step::Show(StageFragment::ProgressLog {
                lines: vec![],
                total: 5
            })]
        );

        // One line per 0.4s.
        let step = Duration::from_millis(400);
        for shown in 1..=5 {
            let due = routine.advance(step);
            assert_eq!(
                due,
                vec![Step::Show(StageFragment::ProgressLog {
                    lines: PROGRESS_LOG[..shown].to_vec(),
                    total: 5
                })]
            );
        }

        // Verdict 0.8s after the last line.
        assert!(routine.advance(Duration::from_millis(799)).is_empty());
        assert!(!routine.is_done());
        let due = routine.advance(Duration::from_millis(1));
        assert_eq!(
            due,
            vec![
                Step::Show(StageFragment::Verdict),
                Step::Sfx(Sfx::Chime),
                Step::Clap,
                Step::Complete
            ]
        );
        assert!(routine.is_done());
    }

    #[test]
    fn large_frame_flushes_everything_in_order() {
        let mut routine = Routine::new(ActionKey::Unnecessary, 1, script(ActionKey::Unnecessary));
        let due = routine.advance(Duration::from_secs(10));
        assert_eq!(shows(&due), 7);
        assert_eq!(due.last(), Some(&Step::Complete));
        assert!(routine.is_done());
    }

    #[test]
    fn instant_actions_complete_on_first_frame() {
        for key in [ActionKey::Emergency, ActionKey::SideQuest, ActionKey::DoNot] {
            let mut routine = Routine::new(key, 1, script(key));
            let due = routine.advance(Duration::ZERO);
            assert_eq!(shows(&due), 1);
            assert_eq!(due.last(), Some(&Step::Complete));
            assert!(routine.is_done());
        }
    }

    #[test]
    fn canned_picks_come_from_their_lists() {
        for _ in 0..20 {
            match &script(ActionKey::Emergency)[1] {
                Step::Show(StageFragment::Roast(line)) => assert!(ROAST_LINES.contains(line)),
                other => panic!("unexpected step {other:?}"),
            }
            match &script(ActionKey::DoNot)[0] {
                Step::Show(StageFragment::Dialogue(line)) => {
                    assert!(DIALOGUE_LINES.contains(line))
                }
                other => panic!("unexpected step {other:?}"),
            }
        }
    }
}
