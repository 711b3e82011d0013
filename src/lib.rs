//! # barker-framer
//! A GNU Radio style tagged stream block adding a physical layer header, and optionally
//! a tail, made of a Barker code to every packet. The known code helps the receiver
//! with timing recovery and frame synchronisation.
//!
//! The block does not depend on any runtime. A host drives it either through the
//! [`TaggedStreamBlock`] trait, or by calling [`Framer::output_length`] and
//! [`Framer::transform`] directly for each packet.
//!
//! ## Wire format
//! The output of every packet is `[code][payload]`, or `[code][payload][code]` if the tail
//! is enabled. Codes are packed MSB first and right-aligned into whole bytes:
//!
//! | Length | Chips           | Bytes          |
//! |--------|-----------------|----------------|
//! | 2      | `10`            | `[0x02]`       |
//! | 3      | `110`           | `[0x06]`       |
//! | 4      | `1101`          | `[0x0D]`       |
//! | 5      | `11101`         | `[0x1D]`       |
//! | 7      | `1110010`       | `[0x72]`       |
//! | 11     | `11100010010`   | `[0x07, 0x12]` |
//! | 13     | `1111100110101` | `[0x1F, 0x35]` |
//!
//! ## Tags
//! Every tag found on the input packet, including the length tag, is forwarded to the
//! output shifted by the header length. A runtime usually writes its own length tag at
//! the start of each output packet, so the forwarded input length tag ends up inside
//! the packet where it is ignored.
//!
//! ## Example
//!
//! ```
//! use barker_framer::{Cursors, Framer};
//!
//! let framer = Framer::new(11, false, "packet_len").unwrap();
//! let framed = framer.transform(&[0xAA, 0xBB, 0xCC], &[], Cursors::default()).unwrap();
//! assert_eq!(framed.data, vec![0x07, 0x12, 0xAA, 0xBB, 0xCC]);
//! ```
pub mod barker;
pub mod block;
pub mod config;
pub mod framer;
pub mod pdu;
pub mod pmt;
pub mod stream;
mod tag;

pub use block::{TagPropagation, TaggedStreamBlock, WorkIo};
pub use config::{ConfigurationError, FramerConfig};
pub use framer::{Cursors, FramedPacket, Framer, ProtocolViolation};
pub use pdu::{Pdu, PduError};
pub use pmt::Pmt;
pub use stream::{StreamError, TaggedStream};
pub use tag::Tag;
