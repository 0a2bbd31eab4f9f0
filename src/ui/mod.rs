pub mod app;
pub mod components;
pub mod state;

pub use app::{ConsoleApp, PageMode};
pub use state::AppState;
