//! Physical layer header block: prefixes every packet of a tagged stream with a
//! Barker code, and optionally appends it again as a tail.
//!
//! Output layout is `[code][payload]` or `[code][payload][code]`, see `barker` for how
//! the code is packed into bytes. As the payload moves by the code length, tags are
//! forwarded by the block itself instead of by the runtime.

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    barker::BarkerCode,
    block::{TagPropagation, TaggedStreamBlock, WorkIo},
    config::{ConfigurationError, FramerConfig},
    tag::Tag,
};

pub const BLOCK_NAME: &str = "physical_header_barker_tagged_stream";

/// Contract breaches by whoever drives the block. None of these are recoverable.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Output buffer holds {available} items, but {required} are required")]
    OutputTooSmall { required: usize, available: usize },
    #[error("Item counter overflows when moving items at offset {offset} to the output")]
    OffsetOverflow { offset: u64 },
    #[error("Block declared {declared} output items but produced {produced}")]
    LengthMismatch { declared: usize, produced: usize },
}

/// Absolute item counters of the input and output streams at the start of a packet
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct Cursors {
    pub nitems_read: u64,
    pub nitems_written: u64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct FramedPacket {
    pub data: Vec<u8>,
    pub tags: Vec<Tag>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Framer {
    code: &'static BarkerCode,
    add_tail: bool,
    length_tag_name: String,
}

impl Framer {
    pub fn new(
        barker_len: i32,
        add_tail: bool,
        length_tag_name: &str,
    ) -> Result<Framer, ConfigurationError> {
        Framer::from_config(&FramerConfig::new(barker_len, add_tail, length_tag_name))
    }

    pub fn from_config(config: &FramerConfig) -> Result<Framer, ConfigurationError> {
        let code = config.validate()?;
        debug!(
            barker_len = code.len,
            add_tail = config.add_tail,
            length_tag_name = %config.length_tag_name,
            "configured barker framer"
        );
        Ok(Framer {
            code,
            add_tail: config.add_tail,
            length_tag_name: config.length_tag_name.clone(),
        })
    }

    /// The packed code written as header (and tail)
    pub fn marker(&self) -> &'static [u8] {
        self.code.packed
    }

    pub fn barker_code(&self) -> &'static BarkerCode {
        self.code
    }

    pub fn add_tail(&self) -> bool {
        self.add_tail
    }

    pub fn length_tag_name(&self) -> &str {
        &self.length_tag_name
    }

    /// Number of items added to every packet
    pub fn added_items(&self) -> usize {
        if self.add_tail {
            2 * self.code.packed.len()
        } else {
            self.code.packed.len()
        }
    }

    pub fn output_length(&self, input_len: usize) -> usize {
        input_len + self.added_items()
    }

    /// Writes the framed packet into the start of `out`, returning the number of
    /// items written. Anything in `out` past that is left untouched.
    pub fn frame_into(&self, payload: &[u8], out: &mut [u8]) -> Result<usize, ProtocolViolation> {
        let required = self.output_length(payload.len());
        if out.len() < required {
            warn!(required, available = out.len(), "output buffer too small");
            return Err(ProtocolViolation::OutputTooSmall {
                required,
                available: out.len(),
            });
        }

        let marker = self.code.packed;
        let (header, rest) = out.split_at_mut(marker.len());
        header.copy_from_slice(marker);
        let (body, rest) = rest.split_at_mut(payload.len());
        body.copy_from_slice(payload);
        if self.add_tail {
            rest[..marker.len()].copy_from_slice(marker);
        }

        trace!(payload_len = payload.len(), produced = required, "framed packet");
        Ok(required)
    }

    /// Forwards every tag lying on the packet's input items to the output, shifted
    /// by the header length. Tags outside the packet are skipped.
    pub fn relocate_tags(
        &self,
        tags: &[Tag],
        packet_len: usize,
        cursors: Cursors,
        sink: &mut Vec<Tag>,
    ) -> Result<(), ProtocolViolation> {
        let start = cursors.nitems_read;
        let end = start
            .checked_add(packet_len as u64)
            .ok_or(ProtocolViolation::OffsetOverflow { offset: start })?;
        // If the last output item fits in the counter, so does every relocated tag
        if cursors
            .nitems_written
            .checked_add(self.output_length(packet_len) as u64)
            .is_none()
        {
            warn!(nitems_written = cursors.nitems_written, "output item counter overflow");
            return Err(ProtocolViolation::OffsetOverflow {
                offset: cursors.nitems_written,
            });
        }

        let shift = self.code.packed.len() as u64;
        for tag in tags {
            if !tag.in_range(start, end) {
                trace!(offset = tag.offset, key = %tag.key, "tag outside of packet, skipped");
                continue;
            }
            sink.push(Tag {
                offset: cursors.nitems_written + (tag.offset - start) + shift,
                key: tag.key.clone(),
                value: tag.value.clone(),
            });
        }
        Ok(())
    }

    /// Frames a single packet into a newly allocated buffer of exactly
    /// `output_length(payload.len())` items.
    pub fn transform(
        &self,
        payload: &[u8],
        tags: &[Tag],
        cursors: Cursors,
    ) -> Result<FramedPacket, ProtocolViolation> {
        let mut data = vec![0u8; self.output_length(payload.len())];
        self.frame_into(payload, &mut data)?;
        let mut out_tags = Vec::new();
        self.relocate_tags(tags, payload.len(), cursors, &mut out_tags)?;
        Ok(FramedPacket {
            data,
            tags: out_tags,
        })
    }
}

impl TaggedStreamBlock for Framer {
    fn name(&self) -> &str {
        BLOCK_NAME
    }

    fn length_tag_key(&self) -> &str {
        &self.length_tag_name
    }

    fn tag_propagation(&self) -> TagPropagation {
        TagPropagation::Dont
    }

    fn calculate_output_stream_length(&self, ninput_items: usize) -> usize {
        self.output_length(ninput_items)
    }

    fn work(&mut self, io: WorkIo<'_>) -> Result<usize, ProtocolViolation> {
        let cursors = Cursors {
            nitems_read: io.nitems_read,
            nitems_written: io.nitems_written,
        };
        // Tags first, so a failing call leaves no partial output tags behind
        let mut relocated = Vec::with_capacity(io.input_tags.len());
        self.relocate_tags(io.input_tags, io.input.len(), cursors, &mut relocated)?;
        let produced = self.frame_into(io.input, io.output)?;
        io.output_tags.append(&mut relocated);
        Ok(produced)
    }
}
