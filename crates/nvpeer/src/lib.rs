//! # nvpeer
//!
//! A peer for a long-lived editor host speaking msgpack-rpc over a byte stream.
//! The same connection is used in both directions: a [`Peer`] drives the host
//! with calls and pipelines, and serves the handlers a plugin registers.
//!
//! ## Architecture
//!
//! - [`registry`] records handlers and the manifest describing them.
//! - [`script`] renders the manifest as host script text.
//! - [`peer`] and [`pipeline`] issue calls and run the read loop.
//! - [`transport`] moves encoded messages; [`mock_transport`] does it in memory.
//! - [`plugin`] wires configuration, logging and stdio into an entry point.

pub mod api;
pub mod config;
pub mod error;
pub mod fault;
pub mod handler;
pub mod logging;
pub mod mock_transport;
pub mod peer;
pub mod pipeline;
pub mod plugin;
pub mod registry;
pub mod script;
pub mod transport;

pub use error::Error;
pub use error::Result;
pub use handler::Handler;
pub use handler::HandlerError;
pub use peer::Peer;
pub use pipeline::Pipeline;
pub use pipeline::Slot;
pub use registry::PeerRegistry;

pub use nvwire;
pub use nvwire::Buffer;
pub use nvwire::Tabpage;
pub use nvwire::Value;
pub use nvwire::Window;
