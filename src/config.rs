//! Block parameters, as given when instantiating the block in a flowgraph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::barker::{self, BarkerCode};

pub const DEFAULT_BARKER_LEN: i32 = 11;
pub const DEFAULT_LENGTH_TAG_NAME: &str = "packet_len";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No Barker code of length {0} is supported (valid lengths: 2, 3, 4, 5, 7, 11, 13)")]
    UnsupportedBarkerLength(i32),
    #[error("Length tag name must not be empty")]
    EmptyLengthTagName,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
#[serde(default)]
pub struct FramerConfig {
    /// Length of the Barker code used as header (and tail)
    pub barker_len: i32,
    /// Also append the code after the payload
    pub add_tail: bool,
    /// Key of the tag which delimits packets in the tagged stream
    pub length_tag_name: String,
}

impl Default for FramerConfig {
    fn default() -> Self {
        FramerConfig {
            barker_len: DEFAULT_BARKER_LEN,
            add_tail: false,
            length_tag_name: DEFAULT_LENGTH_TAG_NAME.to_string(),
        }
    }
}

impl FramerConfig {
    pub fn new(barker_len: i32, add_tail: bool, length_tag_name: &str) -> FramerConfig {
        FramerConfig {
            barker_len,
            add_tail,
            length_tag_name: length_tag_name.to_string(),
        }
    }

    /// Checks the parameters, returning the code to frame packets with
    pub fn validate(&self) -> Result<&'static BarkerCode, ConfigurationError> {
        let code = barker::resolve(self.barker_len)?;
        if self.length_tag_name.is_empty() {
            return Err(ConfigurationError::EmptyLengthTagName);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = FramerConfig::default();
        assert_eq!(config.barker_len, 11);
        assert!(!config.add_tail);
        assert_eq!(config.length_tag_name, "packet_len");
        assert_eq!(config.validate().map(|code| code.packed), Ok(&[0x07u8, 0x12][..]));
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            FramerConfig::new(6, false, "packet_len").validate().map(|code| code.len),
            Err(ConfigurationError::UnsupportedBarkerLength(6))
        );
        assert_eq!(
            FramerConfig::new(13, true, "").validate().map(|code| code.len),
            Err(ConfigurationError::EmptyLengthTagName)
        );
    }

    #[test]
    fn deserialize_partial() {
        let config: FramerConfig =
            serde_json::from_str(r#"{"barker_len": 13, "add_tail": true}"#).unwrap();
        assert_eq!(config, FramerConfig::new(13, true, DEFAULT_LENGTH_TAG_NAME));

        let config: FramerConfig =
            serde_json::from_str(r#"{"length_tag_name": "tx_packet_len"}"#).unwrap();
        assert_eq!(config, FramerConfig::new(11, false, "tx_packet_len"));
    }
}
