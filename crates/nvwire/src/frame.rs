//! # Frame Boundaries
//!
//! Messages arrive back to back on a byte stream with no length prefix, so the
//! reader has to walk MessagePack markers to find where one message ends.
//!
//! ## Invariants
//!
//! - **Resumable**: a [`FrameScanner`] remembers how far it got. Feeding it a
//!   growing buffer costs time linear in the bytes added, not in the buffer.
//! - **No Allocation per Value**: only markers and length fields are read;
//!   payloads are skipped, never decoded. Decoding happens once, afterwards.
//! - **Bounded Nesting**: containers deeper than [`MAX_DEPTH`] are rejected.

use crate::error::Error;
use crate::error::Result;

/// Deepest container nesting accepted in one message.
pub const MAX_DEPTH: usize = 1024;

/// What one marker introduces.
enum Item {
    /// A value without children, `len` bytes long in total.
    Leaf(usize),
    /// An array or map header of `header` bytes, followed by `children` values.
    Open { header: usize, children: u64 },
}

/// Reads a big-endian length field of `width` bytes right after the marker.
fn length(buf: &[u8], width: usize) -> Option<u64> {
    let field = buf.get(1..1 + width)?;
    Some(field.iter().fold(0u64, |n, &b| (n << 8) | u64::from(b)))
}

/// Parses the marker at the start of `buf`. `None` if its header is incomplete.
fn item(buf: &[u8]) -> Result<Option<Item>> {
    let Some(&marker) = buf.first() else {
        return Ok(None);
    };

    // a length field of `width` bytes, then `extra` fixed bytes, then the payload
    let sized = |width: usize, extra: usize| {
        length(buf, width).map(|len| Item::Leaf((1 + width + extra).saturating_add(len as usize)))
    };
    // a count field of `width` bytes, then `per` child values per count
    let open = |width: usize, per: u64| {
        length(buf, width).map(|n| Item::Open { header: 1 + width, children: n * per })
    };

    let item = match marker {
        0x00..=0x7f | 0xe0..=0xff | 0xc0 | 0xc2 | 0xc3 => Some(Item::Leaf(1)),
        0x80..=0x8f => Some(Item::Open { header: 1, children: 2 * u64::from(marker & 0x0f) }),
        0x90..=0x9f => Some(Item::Open { header: 1, children: u64::from(marker & 0x0f) }),
        0xa0..=0xbf => Some(Item::Leaf(1 + usize::from(marker & 0x1f))),
        0xc1 => return Err(Error::Decode("reserved marker 0xc1".into())),
        0xc4 | 0xd9 => sized(1, 0),
        0xc5 | 0xda => sized(2, 0),
        0xc6 | 0xdb => sized(4, 0),
        0xc7 => sized(1, 1),
        0xc8 => sized(2, 1),
        0xc9 => sized(4, 1),
        0xcc | 0xd0 => Some(Item::Leaf(2)),
        0xcd | 0xd1 => Some(Item::Leaf(3)),
        0xca | 0xce | 0xd2 => Some(Item::Leaf(5)),
        0xcb | 0xcf | 0xd3 => Some(Item::Leaf(9)),
        0xd4 => Some(Item::Leaf(3)),
        0xd5 => Some(Item::Leaf(4)),
        0xd6 => Some(Item::Leaf(6)),
        0xd7 => Some(Item::Leaf(10)),
        0xd8 => Some(Item::Leaf(18)),
        0xdc => open(2, 1),
        0xdd => open(4, 1),
        0xde => open(2, 2),
        0xdf => open(4, 2),
    };
    Ok(item)
}

/// Finds the end of the first complete MessagePack value in a growing buffer.
///
/// Call [`FrameScanner::scan`] each time the buffer grows. Once it returns
/// `Some(n)`, the first `n` bytes are one value and the scanner starts over at
/// the beginning of whatever buffer it is given next.
#[derive(Debug, Default)]
pub struct FrameScanner {
    /// Start of the first value not yet fully seen.
    pos: usize,
    /// Values still expected by each open container, innermost last.
    open: Vec<u64>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues from where the previous call stopped. `buf` must start with
    /// the same bytes as before.
    pub fn scan(&mut self, buf: &[u8]) -> Result<Option<usize>> {
        loop {
            let rest = buf.get(self.pos..).unwrap_or_default();
            let Some(item) = item(rest)? else {
                return Ok(None);
            };
            match item {
                Item::Leaf(len) => {
                    if rest.len() < len {
                        return Ok(None);
                    }
                    self.pos += len;
                }
                Item::Open { header, children } => {
                    self.pos += header;
                    if children > 0 {
                        if self.open.len() == MAX_DEPTH {
                            self.reset();
                            return Err(Error::Decode(format!("nesting deeper than {}", MAX_DEPTH)));
                        }
                        self.open.push(children);
                        continue;
                    }
                }
            }

            // a value just ended; close every container it completes
            loop {
                match self.open.last_mut() {
                    None => {
                        let end = self.pos;
                        self.reset();
                        return Ok(Some(end));
                    }
                    Some(remaining) => {
                        *remaining -= 1;
                        if *remaining > 0 {
                            break;
                        }
                        self.open.pop();
                    }
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.open.clear();
    }
}

/// Returns the length of the first complete MessagePack value in `buf`, or
/// `None` if the buffer ends before that value does.
pub fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
    FrameScanner::new().scan(buf)
}
