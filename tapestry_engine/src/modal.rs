use serde::Serialize;

use crate::geometry::Point;

/// A blocking sequence. While any modal is stacked the main script is held;
/// ambient scripts, animation and compositing keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modal {
    /// Main script `wait`.
    Delay { until: u64 },
    /// Message banner shown by the main script.
    Message { until: u64 },
    /// Character walking in from outside the playfield after a transition.
    EntranceWalk { target: Point },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModalStack {
    stack: Vec<Modal>,
}

impl ModalStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, modal: Modal) {
        self.stack.push(modal);
    }

    pub fn top(&self) -> Option<&Modal> {
        self.stack.last()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn blocks_main_script(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn has_entrance_walk(&self) -> bool {
        self.stack
            .iter()
            .any(|modal| matches!(modal, Modal::EntranceWalk { .. }))
    }

    /// Drops pending message modals, keeping everything else in order.
    pub fn flush_messages(&mut self) -> usize {
        let before = self.stack.len();
        self.stack
            .retain(|modal| !matches!(modal, Modal::Message { .. }));
        before - self.stack.len()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }

    /// Pops every finished modal from the top of the stack and returns them
    /// in pop order. `walking` reports whether the character is still
    /// moving toward its target.
    pub fn resolve(&mut self, now: u64, walking: bool) -> Vec<Modal> {
        let mut finished = Vec::new();
        while let Some(top) = self.stack.last().copied() {
            let done = match top {
                Modal::Delay { until } | Modal::Message { until } => now >= until,
                Modal::EntranceWalk { .. } => !walking,
            };
            if !done {
                break;
            }
            self.stack.pop();
            finished.push(top);
        }
        finished
    }
}
