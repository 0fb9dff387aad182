/// App screens and shared session state.
use std::collections::HashSet;

use bevy::prelude::*;
use strum::{EnumCount, EnumIter};

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum Screens {
    #[default]
    Countdown,
    Arcade,
}

/// The five arcade buttons.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, EnumIter, EnumCount)]
pub enum ActionKey {
    Unnecessary,
    Emergency,
    SideQuest,
    DoNot,
    Broken,
}

impl ActionKey {
    pub fn label(self) -> &'static str {
        match self {
            ActionKey::Unnecessary => "UNNECESSARY",
            ActionKey::Emergency => "EMERGENCY",
            ActionKey::SideQuest => "SIDE QUEST",
            ActionKey::DoNot => "DO NOT PRESS",
            ActionKey::Broken => "BROKEN?",
        }
    }
}

/// Outcome of checking a button press against the session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Dispatch {
    /// Run the handler.
    Run,
    /// The media sequence holds the stage; show the busy message instead.
    Busy,
    /// The handler for this key is already running.
    Ignored,
}

/// Flags that live for the whole session and gate the arcade buttons.
#[derive(Resource, Debug, Default)]
pub struct SessionState {
    completed: HashSet<ActionKey>,
    in_flight: HashSet<ActionKey>,
    media_playing: bool,
    secret_revealed: bool,
}

impl SessionState {
    pub fn dispatch(&self, key: ActionKey) -> Dispatch {
        if self.media_playing && key != ActionKey::Broken {
            Dispatch::Busy
        } else if self.in_flight.contains(&key) {
            Dispatch::Ignored
        } else {
            Dispatch::Run
        }
    }

    /// Mark a handler as started. Starting `Broken` takes exclusive hold of the stage.
    pub fn begin(&mut self, key: ActionKey) {
        self.in_flight.insert(key);
        if key == ActionKey::Broken {
            self.media_playing = true;
        }
    }

    /// Record a finished handler. Returns true the one time the last missing
    /// key lands and the secret control should appear.
    pub fn finish(&mut self, key: ActionKey) -> bool {
        self.in_flight.remove(&key);
        if key == ActionKey::Broken {
            self.media_playing = false;
        }
        self.completed.insert(key);

        if !self.secret_revealed && self.completed.len() == ActionKey::COUNT {
            self.secret_revealed = true;
            return true;
        }
        false
    }

    pub fn media_playing(&self) -> bool {
        self.media_playing
    }

    pub fn secret_revealed(&self) -> bool {
        self.secret_revealed
    }

    pub fn is_completed(&self, key: ActionKey) -> bool {
        self.completed.contains(&key)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn run(session: &mut SessionState, key: ActionKey) -> bool {
        assert_eq!(session.dispatch(key), Dispatch::Run);
        session.begin(key);
        session.finish(key)
    }

    #[test]
    fn secret_waits_for_all_five() {
        let mut session = SessionState::default();
        assert!(!run(&mut session, ActionKey::Emergency));
        assert!(!run(&mut session, ActionKey::SideQuest));
        assert!(!session.secret_revealed());

        assert!(!run(&mut session, ActionKey::DoNot));
        assert!(!run(&mut session, ActionKey::Unnecessary));
        assert!(run(&mut session, ActionKey::Broken));
        assert!(session.secret_revealed());
    }

    #[test]
    fn secret_reveals_once_in_any_order() {
        let keys: Vec<ActionKey> = ActionKey::iter().collect();
        // Every rotation and its reverse.
        for shift in 0..keys.len() {
            for reverse in [false, true] {
                let mut order = keys.clone();
                order.rotate_left(shift);
                if reverse {
                    order.reverse();
                }

                let mut session = SessionState::default();
                let reveals: Vec<bool> = order.iter().map(|&k| run(&mut session, k)).collect();
                assert_eq!(reveals.iter().filter(|&&r| r).count(), 1);
                assert_eq!(reveals.last(), Some(&true));

                // Repeats never reveal again.
                for &key in &order {
                    assert!(!run(&mut session, key));
                }
            }
        }
    }

    #[test]
    fn repeated_keys_do_not_count_twice() {
        let mut session = SessionState::default();
        for _ in 0..5 {
            run(&mut session, ActionKey::Emergency);
        }
        assert_eq!(session.completed_count(), 1);
        assert!(!session.secret_revealed());
    }

    #[test]
    fn media_playing_rejects_other_keys() {
        let mut session = SessionState::default();
        session.begin(ActionKey::Broken);
        assert!(session.media_playing());

        for key in ActionKey::iter().filter(|&k| k != ActionKey::Broken) {
            assert_eq!(session.dispatch(key), Dispatch::Busy);
        }
        assert_eq!(session.dispatch(ActionKey::Broken), Dispatch::Ignored);
        assert_eq!(session.completed_count(), 0);

        session.finish(ActionKey::Broken);
        assert!(!session.media_playing());
        assert!(session.is_completed(ActionKey::Broken));
        assert_eq!(session.dispatch(ActionKey::Emergency), Dispatch::Run);
    }

    #[test]
    fn running_handler_ignores_second_press() {
        let mut session = SessionState::default();
        session.begin(ActionKey::Unnecessary);
        assert_eq!(session.dispatch(ActionKey::Unnecessary), Dispatch::Ignored);
        assert_eq!(session.dispatch(ActionKey::DoNot), Dispatch::Run);
    }
}
