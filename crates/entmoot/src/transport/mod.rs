//! Minimal TCP harness for exercising the service end to end
//!
//! Frames are single lines of JSON. Each request carries an id that its
//! response echoes, so one connection can have many requests in flight and
//! responses may arrive out of order.

pub mod client;
mod frame;
pub mod server;

pub use client::ExecutorClient;
pub use frame::{Envelope, DEFAULT_MAX_FRAME_LEN};
pub use server::{serve, Server, ServerHandle};
