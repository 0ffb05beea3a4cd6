//! Key-chord dispatch.
//!
//! Holding a mode key (`R` rotate, `C` center, `D` dimension), an axis key and
//! an arrow produces one local-frame edit per key-down event, including OS key
//! repeats. The box model never sees keys, only [`EditCommand`]s.

use crate::{
    config::EditorConfig,
    types::{Axis, EditCommand},
};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    R,
    C,
    D,
    X,
    Y,
    Z,
    ArrowUp,
    ArrowDown,
    Tab,
    Delete,
}

impl Key {
    /// Map a DOM-style `KeyboardEvent.code`.
    pub fn from_code(code: &str) -> Option<Key> {
        Some(match code {
            "KeyR" => Key::R,
            "KeyC" => Key::C,
            "KeyD" => Key::D,
            "KeyX" => Key::X,
            "KeyY" => Key::Y,
            "KeyZ" => Key::Z,
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "Tab" => Key::Tab,
            "Delete" => Key::Delete,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Edit(EditCommand),
    SelectNext,
    DeleteSelected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Rotate,
    Translate,
    Resize,
}

const MODES: [(Key, Mode); 3] = [
    (Key::R, Mode::Rotate),
    (Key::C, Mode::Translate),
    (Key::D, Mode::Resize),
];
const AXES: [(Key, Axis); 3] = [(Key::X, Axis::X), (Key::Y, Axis::Y), (Key::Z, Axis::Z)];
const DIRECTIONS: [(Key, f64); 2] = [(Key::ArrowUp, 1.0), (Key::ArrowDown, -1.0)];

#[derive(Debug, Clone)]
pub struct InputDispatcher {
    pressed: HashSet<Key>,
    rotation_step: f64,
    translation_step: f64,
    dimension_step: f64,
}

impl InputDispatcher {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            pressed: HashSet::new(),
            rotation_step: config.rotation_step,
            translation_step: config.translation_step,
            dimension_step: config.dimension_step,
        }
    }

    pub fn key_down(&mut self, key: Key) -> Vec<Action> {
        self.pressed.insert(key);

        let mut actions = Vec::new();
        match key {
            Key::Tab => actions.push(Action::SelectNext),
            Key::Delete => actions.push(Action::DeleteSelected),
            _ => {}
        }

        for (mode_key, mode) in MODES {
            if !self.pressed.contains(&mode_key) {
                continue;
            }
            for (axis_key, axis) in AXES {
                if !self.pressed.contains(&axis_key) {
                    continue;
                }
                for (direction_key, sign) in DIRECTIONS {
                    if self.pressed.contains(&direction_key) {
                        actions.push(Action::Edit(self.command(mode, axis, sign)));
                    }
                }
            }
        }
        actions
    }

    pub fn key_up(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    /// Forget held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.pressed.clear();
    }

    fn command(&self, mode: Mode, axis: Axis, sign: f64) -> EditCommand {
        match mode {
            Mode::Rotate => EditCommand::Rotate {
                axis,
                angle: sign * self.rotation_step,
            },
            Mode::Translate => EditCommand::Translate {
                axis,
                distance: sign * self.translation_step,
            },
            Mode::Resize => EditCommand::Resize {
                axis,
                delta: sign * self.dimension_step,
            },
        }
    }
}
