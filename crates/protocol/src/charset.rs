//! Filename transcoding between local text and the remote byte form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Charset used for names sent to and received from the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    #[serde(rename = "utf8")]
    Utf8,
    /// GBK, the usual local charset of servers without UTF-8 support.
    #[default]
    #[serde(rename = "gbk")]
    Gbk,
    /// ISO-8859-1, one byte per character.
    #[serde(rename = "latin1")]
    Latin1,
}

impl Charset {
    /// Encodes a local name into remote bytes.
    ///
    /// Fails with [`SessionError::Unencodable`] if any character has no
    /// representation in this charset; names are never substituted, since
    /// two distinct names must not reach the server as the same bytes.
    pub fn encode(self, name: &str) -> Result<Vec<u8>, SessionError> {
        let unencodable = || SessionError::Unencodable {
            name: name.to_string(),
            charset: self,
        };
        match self {
            Charset::Utf8 => Ok(name.as_bytes().to_vec()),
            Charset::Gbk => {
                let (bytes, _, unmappable) = encoding_rs::GBK.encode(name);
                if unmappable {
                    return Err(unencodable());
                }
                Ok(bytes.into_owned())
            }
            Charset::Latin1 => name
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| unencodable()))
                .collect(),
        }
    }

    /// Decodes remote bytes into a local name.
    ///
    /// Malformed sequences decode to U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Gbk => encoding_rs::GBK
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Charset::Utf8 => "utf8",
            Charset::Gbk => "gbk",
            Charset::Latin1 => "latin1",
        })
    }
}
