pub mod api;
pub mod handler;
pub mod server;

/// Connection ID.
pub type ConnId = usize;

/// Room key.
pub type RoomId = String;

/// Message relayed to a room.
pub type Msg = String;
