//! Realtime Journal WebSocket
//!
//! Clients join conversation rooms and exchange journal and transcript
//! updates with everyone else in the same room.

mod dispatch;
mod handler;
mod protocol;
mod rooms;

pub use handler::handle_journal_ws;
pub use rooms::{ConnectionId, Delivery, RoomRegistry};
