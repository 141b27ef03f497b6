//! # nvwire
//!
//! The wire layer of an msgpack-rpc peer: typed remote handles, a dynamic value
//! union, and the request / response / notification envelopes.
//!
//! ## Architecture
//!
//! General MessagePack encoding is delegated to `rmpv`. This crate owns only what
//! the host protocol adds on top: the integer sub-codec inside the three handle
//! extension types, the array shapes of the three message kinds, and finding
//! where one message ends on a stream.

pub mod error;
pub mod frame;
pub mod handle;
pub mod message;
pub mod value;

pub use error::Error;
pub use error::Result;
pub use frame::frame_len;
pub use frame::FrameScanner;
pub use handle::Buffer;
pub use handle::Handle;
pub use handle::HandleKind;
pub use handle::RemoteHandle;
pub use handle::Tabpage;
pub use handle::Window;
pub use message::Message;
pub use value::FromValue;
pub use value::Value;

#[cfg(test)]
mod tests;
