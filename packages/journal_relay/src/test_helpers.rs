use std::sync::Arc;

use crate::AppState;
use crate::config::{HistoryConfig, HistoryFileConfig};
use crate::history::HistoryClient;
use crate::metrics::ServerMetrics;
use crate::store::ConversationStore;
use crate::ws::RoomRegistry;

/// Build an isolated `AppState` with an empty store and no upstream key.
/// The history client points at an address nothing listens on.
pub fn test_app_state() -> AppState {
    test_app_state_with_history("http://127.0.0.1:9", None)
}

/// Like [`test_app_state`], with the history proxy aimed at `base_url`.
pub fn test_app_state_with_history(base_url: &str, api_key: Option<&str>) -> AppState {
    let history = HistoryConfig::from_file(&HistoryFileConfig {
        api_key: api_key.map(str::to_string),
        base_url: base_url.to_string(),
        timeout_secs: 5,
    });

    AppState {
        store: Arc::new(ConversationStore::new()),
        rooms: Arc::new(RoomRegistry::new()),
        metrics: Arc::new(ServerMetrics::new()),
        history: Arc::new(HistoryClient::new(history).expect("history client")),
    }
}
