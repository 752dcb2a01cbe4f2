//! Cloud-to-device messages and their acknowledgements.

use super::{Error, discovery::from_json};
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

pub const MAX_COMMAND_LEN: usize = 256;
pub const MAX_ACK_ID_LEN: usize = 64;
pub const MAX_VERSION_LEN: usize = 32;
pub const MAX_OTA_URL_LEN: usize = 256;
pub const MAX_OTA_URLS: usize = 2;
/// Largest acknowledgement document.
pub const MAX_ACK_LEN: usize = 256;

const TYPE_COMMAND: u8 = 0;
const TYPE_OTA: u8 = 1;

/// A device command such as `led-on 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub command: String<MAX_COMMAND_LEN>,
    pub ack_id: Option<String<MAX_ACK_ID_LEN>>,
}

impl Command {
    /// First word of the command line.
    pub fn name(&self) -> &str {
        let command = self.command.as_str();
        command.split_once(' ').map_or(command, |(name, _)| name)
    }

    /// Everything after the first word.
    pub fn args(&self) -> &str {
        self.command.split_once(' ').map_or("", |(_, args)| args.trim_start())
    }
}

/// A firmware update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaUpdate {
    pub version: String<MAX_VERSION_LEN>,
    pub urls: Vec<String<MAX_OTA_URL_LEN>, MAX_OTA_URLS>,
    pub ack_id: Option<String<MAX_ACK_ID_LEN>>,
}

/// A decoded cloud-to-device message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum C2dEvent {
    Command(Command),
    Ota(OtaUpdate),
    /// A message type with no dedicated handler.
    Other(u8),
}

/// Outcome reported back to the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckStatus {
    Success,
    Failure(&'static str),
}

impl AckStatus {
    pub fn code(self) -> u8 {
        match self {
            AckStatus::Success => 7,
            AckStatus::Failure(_) => 4,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            AckStatus::Success => "",
            AckStatus::Failure(message) => message,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    ct: Option<u8>,
    cmd: Option<String<MAX_COMMAND_LEN>>,
    ack: Option<String<MAX_ACK_ID_LEN>>,
    sw: Option<String<MAX_VERSION_LEN>>,
    urls: Option<Vec<OtaUrl, MAX_OTA_URLS>>,
}

#[derive(Deserialize)]
struct OtaUrl {
    url: String<MAX_OTA_URL_LEN>,
}

impl C2dEvent {
    /// Decode a message body.
    pub fn parse(body: &str) -> Result<Self, Error> {
        let raw: RawEvent = from_json(body)?;
        match raw.ct {
            Some(TYPE_COMMAND) => {
                let Some(command) = raw.cmd else {
                    return Err(Error::Parsing);
                };
                Ok(C2dEvent::Command(Command {
                    command,
                    ack_id: raw.ack,
                }))
            }
            Some(TYPE_OTA) => {
                let urls = raw
                    .urls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|u| u.url)
                    .collect();
                Ok(C2dEvent::Ota(OtaUpdate {
                    version: raw.sw.unwrap_or_default(),
                    urls,
                    ack_id: raw.ack,
                }))
            }
            Some(other) => Ok(C2dEvent::Other(other)),
            None => Err(Error::Parsing),
        }
    }

    /// Acknowledgement id and message type, if the cloud asked for one.
    pub fn ack_target(&self) -> Option<(&str, u8)> {
        match self {
            C2dEvent::Command(c) => c.ack_id.as_deref().map(|id| (id, TYPE_COMMAND)),
            C2dEvent::Ota(o) => o.ack_id.as_deref().map(|id| (id, TYPE_OTA)),
            C2dEvent::Other(_) => None,
        }
    }
}

#[derive(Serialize)]
struct AckDocument<'a> {
    d: AckBody<'a>,
}

#[derive(Serialize)]
struct AckBody<'a> {
    ack: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    st: u8,
    msg: &'a str,
}

/// `{"d":{"ack":<id>,"type":<kind>,"st":<code>,"msg":<text>}}`
pub fn ack_json(ack_id: &str, kind: u8, status: AckStatus) -> Result<String<MAX_ACK_LEN>, Error> {
    let document = AckDocument {
        d: AckBody {
            ack: ack_id,
            kind,
            st: status.code(),
            msg: status.message(),
        },
    };
    serde_json_core::to_string(&document).map_err(|_| Error::Overflow)
}
