use serde::Serialize;

/// Ordered record of what the engine did, as short dotted strings such as
/// `scene.enter 3` or `ambient.overrun 4`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct EventLog {
    entries: Vec<String>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: impl Into<String>) {
        let event = event.into();
        log::debug!(target: "tapestry::events", "{event}");
        self.entries.push(event);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries starting with `prefix`, in order.
    pub fn matching<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .map(String::as_str)
            .filter(move |entry| entry.starts_with(prefix))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
