//! UI-thread plumbing. Concrete widgets live behind `ViewSyncAdapter`.

pub mod binding;
pub mod content;
pub mod event_loop;
pub mod headless;

pub use binding::{GroupedLayout, IndexMapping, SelectionSink, ViewBinding, ViewSyncAdapter};
pub use content::{ContentLoader, ContentRequest, PreviewLoader};
pub use event_loop::{ControlFlow, EventLoop};
