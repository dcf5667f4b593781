//! Shared test doubles

use std::sync::{Arc, Mutex};

use sr_core::TerminalSize;

use crate::ui::{DisplayUpdate, UiSink};

/// Everything a [`RecordingUi`] was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Write(String),
    Clear,
    SessionActive(bool),
    Update(DisplayUpdate),
}

/// UI sink that records every call
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    /// All terminal text concatenated
    pub fn written(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Write(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<DisplayUpdate> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Update(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl UiSink for RecordingUi {
    fn write(&self, text: &str) {
        self.push(UiEvent::Write(text.to_string()));
    }

    fn clear(&self) {
        self.push(UiEvent::Clear);
    }

    fn size(&self) -> TerminalSize {
        TerminalSize::new(24, 80)
    }

    fn set_session_active(&self, active: bool) {
        self.push(UiEvent::SessionActive(active));
    }

    fn apply(&self, update: DisplayUpdate) {
        self.push(UiEvent::Update(update));
    }
}
