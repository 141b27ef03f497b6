//! # Remote Handle Codec
//!
//! The host refers to its buffers, windows and tab pages with opaque integer ids
//! carried inside MessagePack extension values. The extension type says which kind
//! of object the id names; the payload is itself a MessagePack-encoded integer.
//!
//! ## Invariants
//!
//! - **Minimal Decode**: every integer shape the host may emit is accepted
//!   (fixints, uint8..uint32, int8..int32). Nothing else is.
//! - **Fixed Encode**: ids are always written as the 5-byte int32 form. The host
//!   accepts any valid shape, so encoding is never minimized.
//! - **Kind Strictness**: decoding into a handle type checks the extension type first.

use crate::error::Error;
use crate::error::Result;

/// Extension type of a buffer handle.
pub const BUFFER_EXT: i8 = 0;
/// Extension type of a window handle.
pub const WINDOW_EXT: i8 = 1;
/// Extension type of a tab page handle.
pub const TABPAGE_EXT: i8 = 2;

/// Decodes an extension payload into the id it carries.
pub fn decode_ext(p: &[u8]) -> Result<i32> {
    match *p {
        [b] if b <= 0x7f => Ok(b as i32),
        [0xcc, b] => Ok(b as i32),
        [0xcd, b1, b0] => Ok(u16::from_be_bytes([b1, b0]) as i32),
        // ids above i32::MAX are never emitted; reinterpret rather than fail
        [0xce, b3, b2, b1, b0] => Ok(u32::from_be_bytes([b3, b2, b1, b0]) as i32),
        [0xd0, b] => Ok(b as i8 as i32),
        [0xd1, b1, b0] => Ok(i16::from_be_bytes([b1, b0]) as i32),
        [0xd2, b3, b2, b1, b0] => Ok(i32::from_be_bytes([b3, b2, b1, b0])),
        [b] if b >= 0xe0 => Ok(b as i8 as i32),
        _ => Err(Error::MalformedExtension(p.to_vec())),
    }
}

/// Encodes an id as an extension payload (always the int32 form).
pub fn encode_ext(n: i32) -> [u8; 5] {
    let [b3, b2, b1, b0] = n.to_be_bytes();
    [0xd2, b3, b2, b1, b0]
}

/// The three kinds of host objects a handle can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandleKind {
    Buffer,
    Window,
    Tabpage,
}

impl HandleKind {
    pub const fn ext_type(self) -> i8 {
        match self {
            Self::Buffer => BUFFER_EXT,
            Self::Window => WINDOW_EXT,
            Self::Tabpage => TABPAGE_EXT,
        }
    }

    pub const fn from_ext_type(ext_type: i8) -> Option<Self> {
        match ext_type {
            BUFFER_EXT => Some(Self::Buffer),
            WINDOW_EXT => Some(Self::Window),
            TABPAGE_EXT => Some(Self::Tabpage),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Buffer => "Buffer",
            Self::Window => "Window",
            Self::Tabpage => "Tabpage",
        }
    }
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A kind-tagged reference to an object living in the host.
///
/// The peer never owns what a handle names. A handle goes stale when the host
/// destroys the object, which is only observable by asking the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteHandle {
    pub kind: HandleKind,
    pub id: i32,
}

impl RemoteHandle {
    pub const fn new(kind: HandleKind, id: i32) -> Self {
        Self { kind, id }
    }

    /// Decodes a handle of whatever kind the extension type names.
    pub fn decode(ext_type: i8, payload: &[u8]) -> Result<Self> {
        let kind = HandleKind::from_ext_type(ext_type)
            .ok_or_else(|| Error::mismatch("handle extension", format!("extension type {}", ext_type)))?;
        Ok(Self::new(kind, decode_ext(payload)?))
    }

    /// Returns the extension type and payload for this handle.
    pub fn encode(&self) -> (i8, [u8; 5]) {
        (self.kind.ext_type(), encode_ext(self.id))
    }
}

impl std::fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A statically-kinded handle.
pub trait Handle: Copy + Sized {
    const KIND: HandleKind;

    fn from_id(id: i32) -> Self;

    fn id(self) -> i32;

    /// Decodes from an extension value, rejecting foreign extension types.
    fn decode_ext(ext_type: i8, payload: &[u8]) -> Result<Self> {
        if ext_type != Self::KIND.ext_type() {
            let found = match HandleKind::from_ext_type(ext_type) {
                Some(kind) => kind.name().to_string(),
                None => format!("extension type {}", ext_type),
            };
            return Err(Error::mismatch(Self::KIND.name(), found));
        }
        decode_ext(payload).map(Self::from_id)
    }

    fn encode_ext(self) -> (i8, [u8; 5]) {
        (Self::KIND.ext_type(), encode_ext(self.id()))
    }

    fn to_remote(self) -> RemoteHandle {
        RemoteHandle::new(Self::KIND, self.id())
    }

    /// Narrows a kind-tagged handle, rejecting other kinds.
    fn from_remote(handle: RemoteHandle) -> Result<Self> {
        if handle.kind != Self::KIND {
            return Err(Error::mismatch(Self::KIND.name(), handle.kind.name()));
        }
        Ok(Self::from_id(handle.id))
    }
}

macro_rules! define_handle {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i32);

        impl Handle for $name {
            const KIND: HandleKind = $kind;

            fn from_id(id: i32) -> Self {
                Self(id)
            }

            fn id(self) -> i32 {
                self.0
            }
        }

        impl From<$name> for RemoteHandle {
            fn from(h: $name) -> Self {
                h.to_remote()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}:{}", Self::KIND, self.0)
            }
        }
    };
}

define_handle!(
    /// A host buffer.
    Buffer, HandleKind::Buffer
);
define_handle!(
    /// A host window.
    Window, HandleKind::Window
);
define_handle!(
    /// A host tab page.
    Tabpage, HandleKind::Tabpage
);
