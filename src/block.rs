//! The boundary between a block and the runtime hosting it. The runtime owns
//! scheduling, buffers and the item counters, the block only sees one packet per
//! call to `work`.

use crate::{framer::ProtocolViolation, tag::Tag};

/// How the runtime should move tags from inputs to outputs
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum TagPropagation {
    /// Every input tag goes to every output, offsets unchanged
    AllToAll,
    /// Input i goes to output i, offsets unchanged
    OneToOne,
    /// The runtime does not touch tags, the block forwards them itself
    Dont,
}

/// Everything a tagged stream block gets to see during one call to `work`.
pub struct WorkIo<'a> {
    /// One full packet
    pub input: &'a [u8],
    /// Sized by the runtime to `calculate_output_stream_length(input.len())`
    pub output: &'a mut [u8],
    /// Tags attached to the input packet's items
    pub input_tags: &'a [Tag],
    /// Absolute index of `input[0]`
    pub nitems_read: u64,
    /// Absolute index of `output[0]`
    pub nitems_written: u64,
    /// Tags the block adds to its output
    pub output_tags: &'a mut Vec<Tag>,
}

pub trait TaggedStreamBlock {
    fn name(&self) -> &str;

    /// Key of the tag delimiting packets on the input and output
    fn length_tag_key(&self) -> &str;

    fn tag_propagation(&self) -> TagPropagation;

    /// Must be a pure function of the input length
    fn calculate_output_stream_length(&self, ninput_items: usize) -> usize;

    /// Processes a packet, returning the number of items produced
    fn work(&mut self, io: WorkIo<'_>) -> Result<usize, ProtocolViolation>;
}
