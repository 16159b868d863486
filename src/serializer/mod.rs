//! Output formats for reconstruction commands.

use std::{fmt, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{command::Command, protocol::RespEncoder};

/// How a [`Command`] is rendered into the dump stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serializer {
    /// Wire protocol: `*<argc>\r\n` then `$<len>\r\n<arg>\r\n` per argument.
    #[default]
    Resp,
    /// Arguments joined by single spaces.
    #[value(name = "commands")]
    #[serde(rename = "commands")]
    Text,
}

impl Serializer {
    /// Renders `command` as the bytes written to the dump stream.
    pub fn serialize(
        self,
        command: &Command,
    ) -> Vec<u8> {
        match self {
            Self::Resp => resp(command),
            Self::Text => text(command).into_bytes(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Resp => "resp",
            Self::Text => "commands",
        }
    }
}

/// RESP request form, byte for byte what a client would send.
pub fn resp(command: &Command) -> Vec<u8> {
    RespEncoder::encode_request(command.parts())
}

/// Plain command line, no terminator. Not binary safe: invalid UTF-8 is
/// replaced.
pub fn text(command: &Command) -> String {
    command.to_string()
}

impl fmt::Display for Serializer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Serializer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resp" => Ok(Self::Resp),
            "commands" | "text" => Ok(Self::Text),
            other => Err(format!(
                "unknown output format '{other}' (expected resp or commands)"
            )),
        }
    }
}
