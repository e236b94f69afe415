//! Relay wire format.
//!
//! Every raw record starts with a little-endian `u16` tag. Records on the
//! short channel have a fixed total size per tag; records on the long channel
//! carry a `u16` total length right after the tag.
//!
//! ```text
//! short: | tag u16 | version u8 | reserved u8 | fixed payload ...          |
//! long:  | tag u16 | length u16 | version u8  | reserved u8 | payload ...  |
//! ```
//!
//! [`decode`] turns one framed buffer into an owned [`Record`], [`encode`] is
//! its inverse and [`RecordFramer`] splits a contiguous relay stream into
//! frames.

mod codec;
mod framer;
mod record;
mod tag;

pub use codec::*;
pub use framer::*;
pub use record::*;
pub use tag::*;
