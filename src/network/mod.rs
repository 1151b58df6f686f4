//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls the shutdown token)
//! - One thread per connection, capped by [`ConnectionLimiter`]
//! - Commands routed through Engine

mod connection;
mod limiter;
mod server;

pub use connection::Connection;
pub use limiter::{ConnectionLimiter, Permit};
pub use server::{accept_loop, Server};
