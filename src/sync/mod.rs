pub mod directory;
pub mod timeline;
pub mod typing;

pub use directory::ChatDirectory;
pub use timeline::{HistoryApply, HistoryRequest, MessageTimeline, StaleHistoryPolicy};
pub use typing::TypingCoordinator;
