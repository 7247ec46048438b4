// Library root: the live game server. Input routing, verb handlers, the
// session registry and the TCP and WebSocket transports.

pub mod commands;
pub mod config;
pub mod describe;
pub mod listener;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod ws_server;
