//! Remote debug adapter speaking the Debug Adapter Protocol over TCP.
//!
//! A [`session::Session`] drives one client connection: it answers requests,
//! forwards breakpoint stops of the debuggee as events, and exposes the frames
//! of a stop through scope and variable references that the client expands
//! lazily.
pub mod breakpoints;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod handler;
pub mod inspector;
pub mod literal;
pub mod log;
pub mod mutator;
pub mod protocol;
pub mod scope;
pub mod server;
pub mod session;
pub mod source_map;
pub mod transport;

pub use server::start;
