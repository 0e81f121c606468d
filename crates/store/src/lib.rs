pub mod config;
pub mod history;

pub use config::ConfigStore;
pub use history::{HistoryBuffer, HISTORY_CAP};
