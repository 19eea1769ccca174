//! The official selection record and its `Idle | Synchronizing` guard.

/// Phase of a coordinator's synchronization state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    /// A coordinator-driven update is in flight; re-entrant requests are dropped.
    Synchronizing,
}

/// The authoritative selected position of one coordinator.
///
/// `official` is `None` when nothing is selected and otherwise always a valid
/// index into the catalog the owning coordinator is attached to.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    official: Option<usize>,
    phase: SyncPhase,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn official(&self) -> Option<usize> {
        self.official
    }

    pub fn set_official(&mut self, index: Option<usize>) {
        self.official = index;
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn is_synchronizing(&self) -> bool {
        self.phase == SyncPhase::Synchronizing
    }

    /// Idle -> Synchronizing. Returns false if a synchronization is already running.
    pub fn try_begin(&mut self) -> bool {
        if self.is_synchronizing() {
            return false;
        }
        self.phase = SyncPhase::Synchronizing;
        true
    }

    /// Synchronizing -> Idle.
    pub fn finish(&mut self) {
        self.phase = SyncPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let mut state = SelectionState::new();
        assert_eq!(state.phase(), SyncPhase::Idle);

        assert!(state.try_begin());
        assert!(state.is_synchronizing());
        assert!(!state.try_begin());

        state.finish();
        assert_eq!(state.phase(), SyncPhase::Idle);
        assert!(state.try_begin());
    }

    #[test]
    fn test_official_starts_empty() {
        let mut state = SelectionState::new();
        assert_eq!(state.official(), None);
        state.set_official(Some(4));
        assert_eq!(state.official(), Some(4));
    }
}
