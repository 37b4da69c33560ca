//! Projector windows: opening them, finding them again as capture sources,
//! and binding them to monitoring slots

mod discovery;
mod launcher;
mod matcher;
mod poller;

pub use discovery::{filter_by_keywords, CaptureSourceProvider, SystemWindows};
pub use launcher::ProjectorLauncher;
pub use matcher::{bind, classify, Binding, CaptureSourceDescriptor, ProjectorSlot};
pub use poller::ProjectorPoller;
