use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::scene::Direction;

/// Device-independent input, already translated by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent {
    /// Click inside the playfield, in screen coordinates.
    Click { x: i32, y: i32 },
    /// Leave the scene through an edge without walking there.
    UseExit { edge: Direction },
    Quit,
}

pub trait InputProvider {
    /// Returns the events that arrived since the last poll.
    fn poll(&mut self) -> Vec<InputEvent>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullInput;

impl InputProvider for NullInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        Vec::new()
    }
}

/// Replays events at fixed poll counts; used by tests and the headless host.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    polls: u64,
    pending: VecDeque<(u64, InputEvent)>,
}

#[derive(Debug, Deserialize)]
struct ScriptedEntry {
    poll: u64,
    #[serde(flatten)]
    event: InputEvent,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `event` for delivery on the `poll`-th call (zero-based).
    pub fn at(mut self, poll: u64, event: InputEvent) -> Self {
        self.push(poll, event);
        self
    }

    pub fn push(&mut self, poll: u64, event: InputEvent) {
        let position = self
            .pending
            .iter()
            .position(|(at, _)| *at > poll)
            .unwrap_or(self.pending.len());
        self.pending.insert(position, (poll, event));
    }

    /// Parses `[{"poll": 3, "kind": "click", "x": 10, "y": 20}, ...]`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<ScriptedEntry> = serde_json::from_str(raw)?;
        let mut input = Self::new();
        for entry in entries {
            input.push(entry.poll, entry.event);
        }
        Ok(input)
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl InputProvider for ScriptedInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        let mut ready = Vec::new();
        while let Some((at, _)) = self.pending.front() {
            if *at > self.polls {
                break;
            }
            if let Some((_, event)) = self.pending.pop_front() {
                ready.push(event);
            }
        }
        self.polls += 1;
        ready
    }
}
