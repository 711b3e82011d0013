use crate::pmt::Pmt;

/// A stream tag. The offset is absolute, counted in items since the start of the stream.
#[derive(PartialEq, Debug, Clone)]
pub struct Tag {
    pub offset: u64,
    pub key: String,
    pub value: Pmt,
}

impl Tag {
    pub fn new(offset: u64, key: &str, value: Pmt) -> Tag {
        Tag {
            offset,
            key: key.to_string(),
            value,
        }
    }

    /// True if the tag lies in the half-open item range [start, end)
    pub fn in_range(&self, start: u64, end: u64) -> bool {
        self.offset >= start && self.offset < end
    }
}

#[cfg(test)]
mod tag_tests {
    use super::*;

    #[test]
    fn range_is_half_open() {
        let tag = Tag::new(10, "packet_len", Pmt::Int64(3));
        assert!(!tag.in_range(0, 10));
        assert!(tag.in_range(10, 11));
        assert!(tag.in_range(5, 13));
        assert!(!tag.in_range(11, 20));
        assert!(!tag.in_range(10, 10));
    }
}
