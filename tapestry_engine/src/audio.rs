use std::{cell::RefCell, fmt, rc::Rc};

use serde::Serialize;

/// Adapter for routing music and sound requests to a mixer.
pub trait AudioCallback {
    fn music_play(&self, _track: u16) {}
    fn music_fade_out(&self) {}
    fn sfx_play(&self, _sound: u16) {}
}

impl fmt::Debug for dyn AudioCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AudioCallback")
    }
}

/// Discards every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAudio;

impl AudioCallback for SilentAudio {}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioEvent {
    MusicPlay { track: u16 },
    MusicFadeOut,
    SfxPlay { sound: u16 },
}

#[derive(Clone, Default)]
pub struct RecordingAudioCallback {
    events: Rc<RefCell<Vec<AudioEvent>>>,
}

impl RecordingAudioCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.borrow().clone()
    }
}

impl AudioCallback for RecordingAudioCallback {
    fn music_play(&self, track: u16) {
        self.events
            .borrow_mut()
            .push(AudioEvent::MusicPlay { track });
    }

    fn music_fade_out(&self) {
        self.events.borrow_mut().push(AudioEvent::MusicFadeOut);
    }

    fn sfx_play(&self, sound: u16) {
        self.events.borrow_mut().push(AudioEvent::SfxPlay { sound });
    }
}
