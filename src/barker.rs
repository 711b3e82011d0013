//! Barker codes used as physical layer header and tail.
//!
//! Each code is stored both as its chip sequence and in packed form. The packed
//! form is what goes on the wire: chips are bits (`1` for +1, `0` for -1), written
//! MSB first and right-aligned into `ceil(len / 8)` big-endian bytes, so any padding
//! zeros sit in the high bits of the first byte. For example Barker-11
//! `11100010010` packs to `[0x07, 0x12]`.

use crate::config::ConfigurationError;

#[derive(PartialEq, Eq, Debug)]
pub struct BarkerCode {
    pub len: usize,
    pub chips: &'static [bool],
    pub packed: &'static [u8],
}

// Only one of the two length 4 codes is supported (1101).
static BARKER_CODES: [BarkerCode; 7] = [
    BarkerCode {
        len: 2,
        chips: &[true, false],
        packed: &[0x02],
    },
    BarkerCode {
        len: 3,
        chips: &[true, true, false],
        packed: &[0x06],
    },
    BarkerCode {
        len: 4,
        chips: &[true, true, false, true],
        packed: &[0x0D],
    },
    BarkerCode {
        len: 5,
        chips: &[true, true, true, false, true],
        packed: &[0x1D],
    },
    BarkerCode {
        len: 7,
        chips: &[true, true, true, false, false, true, false],
        packed: &[0x72],
    },
    BarkerCode {
        len: 11,
        chips: &[
            true, true, true, false, false, false, true, false, false, true, false,
        ],
        packed: &[0x07, 0x12],
    },
    BarkerCode {
        len: 13,
        chips: &[
            true, true, true, true, true, false, false, true, true, false, true, false, true,
        ],
        packed: &[0x1F, 0x35],
    },
];

impl BarkerCode {
    /// Chips as +1 / -1 values
    pub fn bipolar(&self) -> impl Iterator<Item = i32> + '_ {
        self.chips.iter().map(|&c| if c { 1 } else { -1 })
    }

    /// Aperiodic autocorrelation at the given lag
    pub fn autocorrelation(&self, lag: usize) -> i32 {
        if lag >= self.len {
            return 0;
        }
        self.bipolar()
            .zip(self.bipolar().skip(lag))
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Looks up the code for a given length. Only lengths for which a Barker code
/// exists are accepted.
pub fn resolve(barker_len: i32) -> Result<&'static BarkerCode, ConfigurationError> {
    BARKER_CODES
        .iter()
        .find(|code| code.len as i32 == barker_len)
        .ok_or(ConfigurationError::UnsupportedBarkerLength(barker_len))
}

pub fn supported_lengths() -> impl Iterator<Item = usize> {
    BARKER_CODES.iter().map(|code| code.len)
}

/// Packs chips following the convention described in the module docs.
pub fn pack_chips(chips: &[bool]) -> Vec<u8> {
    let num_bytes = chips.len().div_ceil(8);
    let pad = num_bytes * 8 - chips.len();
    let mut out = vec![0u8; num_bytes];
    for (i, &chip) in chips.iter().enumerate() {
        if chip {
            let bit = pad + i;
            out[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    out
}

#[cfg(test)]
mod barker_tests {
    use super::*;

    #[test]
    fn packed_matches_chips() {
        for code in BARKER_CODES.iter() {
            assert_eq!(code.chips.len(), code.len);
            assert_eq!(pack_chips(code.chips), code.packed, "barker {}", code.len);
        }
    }

    #[test]
    fn barker_property() {
        for code in BARKER_CODES.iter() {
            assert_eq!(code.autocorrelation(0), code.len as i32);
            for lag in 1..code.len {
                assert!(
                    code.autocorrelation(lag).abs() <= 1,
                    "barker {} lag {}",
                    code.len,
                    lag
                );
            }
        }
    }

    #[test]
    fn resolve_known() {
        assert_eq!(resolve(11).unwrap().packed, &[0x07u8, 0x12]);
        assert_eq!(resolve(13).unwrap().packed, &[0x1Fu8, 0x35]);
        assert_eq!(resolve(2).unwrap().packed, &[0x02u8]);
        assert_eq!(
            supported_lengths().collect::<Vec<_>>(),
            vec![2, 3, 4, 5, 7, 11, 13]
        );
    }

    #[test]
    fn resolve_unsupported() {
        for len in [-1, 0, 1, 6, 8, 12, 14, 256] {
            assert!(matches!(
                resolve(len),
                Err(ConfigurationError::UnsupportedBarkerLength(l)) if l == len
            ));
        }
    }

    #[test]
    fn pack_pads_high_bits() {
        assert_eq!(pack_chips(&[]), Vec::<u8>::new());
        assert_eq!(pack_chips(&[true]), vec![0x01]);
        assert_eq!(pack_chips(&[true; 8]), vec![0xFF]);
        assert_eq!(pack_chips(&[true; 9]), vec![0x01, 0xFF]);
    }
}
