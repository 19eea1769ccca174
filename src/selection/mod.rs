//! Selection coordination: one official index per context, pushed to every
//! view without feedback loops.

pub mod coordinator;
pub mod grouped;
pub mod navigation;
pub mod router;
pub mod state;
pub mod sync;

pub use coordinator::{ListCoordinator, SelectionCoordinator};
pub use grouped::GroupedCoordinator;
pub use navigation::NavStep;
pub use router::{ActiveCoordinator, ModeRouter};
pub use state::{SelectionState, SyncPhase};
pub use sync::{SelectOutcome, SyncCore};
