//! Offline driver for tagged stream blocks. Splits a finite stream into packets
//! using its length tags and hands them one at a time to a block, the same way a
//! runtime would while the flowgraph runs.

use std::ops::Range;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    block::{TagPropagation, TaggedStreamBlock, WorkIo},
    framer::ProtocolViolation,
    pmt::Pmt,
    tag::Tag,
};

#[derive(Error, Debug, PartialEq)]
pub enum StreamError {
    #[error("No length tag at packet start {offset}")]
    MissingLengthTag { offset: u64 },
    #[error("Length tag at {offset} does not hold a non-negative integer")]
    InvalidLengthTag { offset: u64 },
    #[error("Packet declares {expected} items, but only {available} remain in the stream")]
    Truncated { expected: u64, available: u64 },
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct TaggedStream {
    pub data: Vec<u8>,
    pub tags: Vec<Tag>,
}

impl TaggedStream {
    /// Concatenates the packets, tagging the start of each with its length
    pub fn from_packets<P: AsRef<[u8]>>(packets: &[P], length_tag_key: &str) -> TaggedStream {
        let mut stream = TaggedStream::default();
        for packet in packets {
            let packet = packet.as_ref();
            stream.tags.push(Tag::new(
                stream.data.len() as u64,
                length_tag_key,
                Pmt::Int64(packet.len() as i64),
            ));
            stream.data.extend_from_slice(packet);
        }
        stream
    }

    pub fn tags_in_range(&self, start: u64, end: u64) -> Vec<Tag> {
        self.tags
            .iter()
            .filter(|tag| tag.in_range(start, end))
            .cloned()
            .collect()
    }

    /// Item ranges of every packet. Length tags which do not sit at a packet start
    /// are ignored, as a runtime would never look at them.
    pub fn packets(&self, length_tag_key: &str) -> Result<Vec<Range<usize>>, StreamError> {
        let total = self.data.len() as u64;
        let mut length_tags: Vec<&Tag> = self
            .tags
            .iter()
            .filter(|tag| tag.key == length_tag_key)
            .collect();
        length_tags.sort_by_key(|tag| tag.offset);
        let mut next = length_tags.into_iter().peekable();

        let mut packets = Vec::new();
        let mut pos = 0u64;
        loop {
            while next.next_if(|tag| tag.offset < pos).is_some() {}

            let Some(tag) = next.next_if(|tag| tag.offset == pos) else {
                if pos < total {
                    return Err(StreamError::MissingLengthTag { offset: pos });
                }
                break;
            };
            let len = tag
                .value
                .get_u64()
                .ok_or(StreamError::InvalidLengthTag { offset: pos })?;
            let available = total - pos;
            if len > available {
                return Err(StreamError::Truncated {
                    expected: len,
                    available,
                });
            }
            packets.push(pos as usize..(pos + len) as usize);
            pos += len;
        }
        Ok(packets)
    }
}

/// Runs every packet of `input` through the block, returning the produced stream.
/// The output carries a fresh length tag at the start of each produced packet, plus
/// whatever tags the block (or the propagation policy) forwards.
pub fn run<B: TaggedStreamBlock>(
    block: &mut B,
    input: &TaggedStream,
) -> Result<TaggedStream, StreamError> {
    let packets = input.packets(block.length_tag_key())?;
    let length_tag_key = block.length_tag_key().to_string();
    let propagation = block.tag_propagation();
    let mut output = TaggedStream::default();

    for packet in packets {
        let nitems_read = packet.start as u64;
        let nitems_written = output.data.len() as u64;
        let input_tags = input.tags_in_range(nitems_read, packet.end as u64);
        let payload = &input.data[packet];
        let declared = block.calculate_output_stream_length(payload.len());

        let start = output.data.len();
        output.data.resize(start + declared, 0);
        let mut produced_tags = Vec::new();
        let produced = block.work(WorkIo {
            input: payload,
            output: &mut output.data[start..],
            input_tags: &input_tags,
            nitems_read,
            nitems_written,
            output_tags: &mut produced_tags,
        })?;
        if produced != declared {
            warn!(block = block.name(), declared, produced, "block broke its declared length");
            return Err(ProtocolViolation::LengthMismatch { declared, produced }.into());
        }

        output.tags.push(Tag::new(
            nitems_written,
            &length_tag_key,
            Pmt::Int64(produced as i64),
        ));
        if propagation != TagPropagation::Dont {
            // Single input and output, so both policies forward the same tags
            output.tags.extend(
                input_tags
                    .into_iter()
                    .filter(|tag| tag.key != length_tag_key)
                    .map(|tag| Tag {
                        offset: tag.offset - nitems_read + nitems_written,
                        ..tag
                    }),
            );
        }
        output.tags.append(&mut produced_tags);
    }

    output.tags.sort_by_key(|tag| tag.offset);
    debug!(
        block = block.name(),
        consumed = input.data.len(),
        produced = output.data.len(),
        "ran tagged stream"
    );
    Ok(output)
}

#[cfg(test)]
mod stream_tests {
    use super::*;
    use crate::framer::Framer;

    #[test]
    fn splits_on_length_tags() {
        let stream = TaggedStream::from_packets(&[vec![1u8, 2, 3], vec![], vec![4]], "packet_len");
        assert_eq!(stream.data, vec![1, 2, 3, 4]);
        assert_eq!(stream.packets("packet_len").unwrap(), vec![0..3, 3..3, 3..4]);
    }

    #[test]
    fn ignores_length_tags_inside_packets() {
        let mut stream = TaggedStream::from_packets(&[vec![1u8, 2, 3]], "packet_len");
        stream.tags.push(Tag::new(1, "packet_len", Pmt::Int64(99)));
        assert_eq!(stream.packets("packet_len").unwrap(), vec![0..3]);
    }

    #[test]
    fn malformed_streams() {
        let mut stream = TaggedStream::from_packets(&[vec![1u8, 2]], "packet_len");
        stream.data.push(3);
        assert_eq!(
            stream.packets("packet_len"),
            Err(StreamError::MissingLengthTag { offset: 2 })
        );
        assert_eq!(
            stream.packets("other_len"),
            Err(StreamError::MissingLengthTag { offset: 0 })
        );

        let stream = TaggedStream {
            data: vec![1, 2],
            tags: vec![Tag::new(0, "packet_len", Pmt::Int64(5))],
        };
        assert_eq!(
            stream.packets("packet_len"),
            Err(StreamError::Truncated {
                expected: 5,
                available: 2
            })
        );

        let stream = TaggedStream {
            data: vec![1, 2],
            tags: vec![Tag::new(0, "packet_len", Pmt::symbol("two"))],
        };
        assert_eq!(
            stream.packets("packet_len"),
            Err(StreamError::InvalidLengthTag { offset: 0 })
        );
    }

    #[test]
    fn frames_a_stream() {
        // Same setup as a vector source -> stream to tagged stream -> framer -> vector sink
        let mut framer = Framer::new(11, false, "tx_packet_len").unwrap();
        let input = TaggedStream::from_packets(&[[1u8, 2, 3]], "tx_packet_len");
        let output = run(&mut framer, &input).unwrap();
        assert_eq!(output.data, vec![7, 18, 1, 2, 3]);
        assert_eq!(
            output.tags,
            vec![
                Tag::new(0, "tx_packet_len", Pmt::Int64(5)),
                Tag::new(2, "tx_packet_len", Pmt::Int64(3)),
            ]
        );
    }

    #[test]
    fn cursors_advance_between_packets() {
        let mut framer = Framer::new(13, true, "packet_len").unwrap();
        let mut input = TaggedStream::from_packets(&[vec![0xA0u8, 0xA1], vec![0xB0]], "packet_len");
        input.tags.push(Tag::new(2, "rx_id", Pmt::UInt64(7)));
        let output = run(&mut framer, &input).unwrap();
        assert_eq!(
            output.data,
            vec![
                0x1F, 0x35, 0xA0, 0xA1, 0x1F, 0x35, // first packet
                0x1F, 0x35, 0xB0, 0x1F, 0x35,
            ]
        );
        let rx_id: Vec<&Tag> = output.tags.iter().filter(|t| t.key == "rx_id").collect();
        assert_eq!(rx_id, vec![&Tag::new(8, "rx_id", Pmt::UInt64(7))]);
        let starts: Vec<u64> = output
            .packets("packet_len")
            .unwrap()
            .into_iter()
            .map(|r| r.start as u64)
            .collect();
        assert_eq!(starts, vec![0, 6]);
    }

    struct Liar;

    impl TaggedStreamBlock for Liar {
        fn name(&self) -> &str {
            "liar"
        }
        fn length_tag_key(&self) -> &str {
            "packet_len"
        }
        fn tag_propagation(&self) -> TagPropagation {
            TagPropagation::AllToAll
        }
        fn calculate_output_stream_length(&self, ninput_items: usize) -> usize {
            ninput_items + 1
        }
        fn work(&mut self, io: WorkIo<'_>) -> Result<usize, ProtocolViolation> {
            io.output[..io.input.len()].copy_from_slice(io.input);
            Ok(io.input.len())
        }
    }

    #[test]
    fn length_mismatch_is_fatal() {
        let input = TaggedStream::from_packets(&[vec![1u8, 2]], "packet_len");
        assert_eq!(
            run(&mut Liar, &input),
            Err(StreamError::Protocol(ProtocolViolation::LengthMismatch {
                declared: 3,
                produced: 2
            }))
        );
    }
}
