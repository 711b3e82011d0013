//! Message based variant of the framer, for flowgraphs passing packets as PDUs
//! (a pair of metadata and a u8 vector) instead of tagged streams.

use thiserror::Error;

use crate::{
    framer::{Framer, ProtocolViolation},
    pmt::Pmt,
};

#[derive(Error, Debug, PartialEq)]
pub enum PduError {
    #[error("PDU must be a pair of (metadata, data)")]
    NotAPair,
    #[error("PDU data must be a u8 vector")]
    DataNotU8Vector,
}

#[derive(PartialEq, Debug, Clone)]
pub struct Pdu {
    pub meta: Pmt,
    pub data: Vec<u8>,
}

impl Pdu {
    pub fn new(meta: Pmt, data: Vec<u8>) -> Pdu {
        Pdu { meta, data }
    }

    pub fn from_pmt(pmt: Pmt) -> Result<Pdu, PduError> {
        let Pmt::Pair(meta, data) = pmt else {
            return Err(PduError::NotAPair);
        };
        match *data {
            Pmt::U8Vector(data) => Ok(Pdu { meta: *meta, data }),
            _ => Err(PduError::DataNotU8Vector),
        }
    }

    pub fn into_pmt(self) -> Pmt {
        Pmt::pair(self.meta, Pmt::U8Vector(self.data))
    }
}

impl Framer {
    /// Frames the PDU data with the same layout as the stream block. Metadata is kept as is.
    pub fn frame_pdu(&self, pdu: &Pdu) -> Result<Pdu, ProtocolViolation> {
        let mut data = vec![0u8; self.output_length(pdu.data.len())];
        self.frame_into(&pdu.data, &mut data)?;
        Ok(Pdu {
            meta: pdu.meta.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod pdu_tests {
    use super::*;
    use crate::framer::Cursors;
    use std::collections::BTreeMap;

    #[test]
    fn pmt_conversion() {
        let pdu = Pdu::new(Pmt::Null(), vec![1, 2, 3]);
        let pmt = pdu.clone().into_pmt();
        assert_eq!(
            pmt,
            Pmt::pair(Pmt::Null(), Pmt::U8Vector(vec![1, 2, 3]))
        );
        assert_eq!(Pdu::from_pmt(pmt), Ok(pdu));

        assert_eq!(Pdu::from_pmt(Pmt::Int32(1)), Err(PduError::NotAPair));
        assert_eq!(
            Pdu::from_pmt(Pmt::pair(Pmt::Null(), Pmt::Tuple(vec![]))),
            Err(PduError::DataNotU8Vector)
        );
    }

    #[test]
    fn same_bytes_as_stream() {
        let mut meta = BTreeMap::new();
        meta.insert("dest".to_string(), Pmt::symbol("CQ"));
        let pdu = Pdu::new(Pmt::Dict(meta), vec![0xAA, 0xBB, 0xCC]);

        for (len, tail) in [(2, false), (7, true), (11, false), (13, true)] {
            let framer = Framer::new(len, tail, "packet_len").unwrap();
            let framed = framer.frame_pdu(&pdu).unwrap();
            let stream = framer
                .transform(&pdu.data, &[], Cursors::default())
                .unwrap();
            assert_eq!(framed.data, stream.data);
            assert_eq!(framed.meta, pdu.meta);
        }
    }

    #[test]
    fn empty_pdu_gets_markers_only() {
        let pdu = Pdu::new(Pmt::Null(), vec![]);
        let framer = Framer::new(13, true, "packet_len").unwrap();
        let framed = framer.frame_pdu(&pdu).unwrap();
        assert_eq!(framed.data, vec![0x1F, 0x35, 0x1F, 0x35]);
        assert_eq!(framed.data.len(), framer.output_length(0));
    }
}
