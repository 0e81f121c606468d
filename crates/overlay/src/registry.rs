//! Arena of panels, at most one live per tab.

use std::collections::HashMap;

use shared::messages::TabId;

use crate::session::OverlaySession;

/// Lifecycle position of a tab's panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    /// No panel has been created for this tab (or it navigated away).
    Absent,
    Open,
    /// A panel existed and was explicitly closed; its nodes are gone.
    Closed,
}

enum Slot {
    Open { session: OverlaySession, epoch: u64 },
    Closed,
}

/// Looks panels up by tab identity. `open` is find-or-create: triggering
/// twice never yields a second instance for the same tab. Each created
/// instance gets a fresh epoch, so a message aimed at an earlier instance
/// can be told apart from one aimed at its replacement.
#[derive(Default)]
pub struct OverlayRegistry {
    slots: HashMap<TabId, Slot>,
    next_epoch: u64,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, tab: TabId) -> PanelState {
        match self.slots.get(&tab) {
            None => PanelState::Absent,
            Some(Slot::Open { .. }) => PanelState::Open,
            Some(Slot::Closed) => PanelState::Closed,
        }
    }

    /// Open the tab's panel, or reuse the live one. Initial turns are
    /// appended to whichever panel results, so a second trigger adds to the
    /// existing conversation instead of recreating it.
    pub fn open(
        &mut self,
        tab: TabId,
        initial_message: Option<String>,
        initial_response: Option<String>,
    ) -> &mut OverlaySession {
        let slot = self.slots.entry(tab).or_insert(Slot::Closed);
        if !matches!(slot, Slot::Open { .. }) {
            self.next_epoch += 1;
            *slot = Slot::Open {
                session: OverlaySession::new(),
                epoch: self.next_epoch,
            };
        }
        let Slot::Open { session, .. } = slot else {
            unreachable!("slot was just opened")
        };
        if initial_message.is_some() || initial_response.is_some() {
            session.seed(initial_message, initial_response);
        }
        session
    }

    pub fn session(&self, tab: TabId) -> Option<&OverlaySession> {
        match self.slots.get(&tab) {
            Some(Slot::Open { session, .. }) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self, tab: TabId) -> Option<&mut OverlaySession> {
        match self.slots.get_mut(&tab) {
            Some(Slot::Open { session, .. }) => Some(session),
            _ => None,
        }
    }

    /// Epoch of the live panel, `None` when nothing is open.
    pub fn epoch(&self, tab: TabId) -> Option<u64> {
        match self.slots.get(&tab) {
            Some(Slot::Open { epoch, .. }) => Some(*epoch),
            _ => None,
        }
    }

    /// Close the tab's panel. Returns false when nothing was open; a close
    /// for an already-closed panel is a tolerated no-op.
    pub fn close(&mut self, tab: TabId) -> bool {
        match self.slots.get_mut(&tab) {
            Some(slot @ Slot::Open { .. }) => {
                *slot = Slot::Closed;
                true
            }
            _ => false,
        }
    }

    /// Drop every trace of the tab (navigation away).
    pub fn forget(&mut self, tab: TabId) {
        self.slots.remove(&tab);
    }

    pub fn open_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::Open { .. }))
            .count()
    }
}
