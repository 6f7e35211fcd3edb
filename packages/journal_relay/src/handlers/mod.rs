pub mod health;
pub mod history;
pub mod journal;
pub mod process;
pub mod websocket;

// Re-export all handlers for easy route registration
pub use health::{health_handler, health_live_handler, metrics_handler};
pub use history::get_conversation_history;
pub use journal::{append_transcript, get_journal, update_journal};
pub use process::process_input;
pub use websocket::journal_websocket_handler;
