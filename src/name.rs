use std::collections::HashSet;
use std::fmt::Display;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{instrument, warn};

use super::Networkable;
use crate::{ByteCursor, ProtocolError};

const MAX_LABEL_LEN: usize = 63;
// Encoded form, including length octets and the root label.
const MAX_NAME_LEN: usize = 255;

const POINTER_MASK: u8 = 0b1100_0000;

/// A domain name, case preserved.
///
/// The root is the empty name. A trailing dot is kept as written; it does not
/// change the wire encoding.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name {
    /// This is the domain name
    /// E.g. www.google.com
    pub name: String,
}

impl Name {
    pub fn new(name: &str) -> Result<Self, ProtocolError> {
        let trimmed = name.strip_suffix('.').unwrap_or(name);

        if !trimmed.is_empty() {
            for label in trimmed.split('.') {
                if label.is_empty() {
                    return Err(ProtocolError::InvalidName(format!("{name:?} has an empty label")));
                }

                if unescape_label(label).len() > MAX_LABEL_LEN {
                    return Err(ProtocolError::InvalidName(format!(
                        "label {label:?} is longer than {MAX_LABEL_LEN} bytes"
                    )));
                }
            }
        }

        let name = Self {
            name: name.to_owned(),
        };

        if name.wire_len() > MAX_NAME_LEN {
            return Err(ProtocolError::InvalidName(format!(
                "{:?} is longer than {MAX_NAME_LEN} bytes on the wire",
                name.name
            )));
        }

        Ok(name)
    }

    pub fn root() -> Self {
        Self {
            name: String::new(),
        }
    }

    fn from_labels(labels: Vec<String>) -> Self {
        Self {
            name: labels.join("."),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn is_root(&self) -> bool {
        self.labels().next().is_none()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.name.split('.').filter(|label| !label.is_empty())
    }

    /// Lowercased and without a trailing dot, for comparing names the way
    /// DNS does.
    pub fn normalized(&self) -> Self {
        let trimmed = self.name.strip_suffix('.').unwrap_or(&self.name);
        Self {
            name: trimmed.to_ascii_lowercase(),
        }
    }

    fn wire_len(&self) -> usize {
        self.labels()
            .map(|label| unescape_label(label).len() + 1)
            .sum::<usize>()
            + 1
    }
}

/// Text form of a wire label. Dots, backslashes and bytes outside printable
/// ASCII become `\DDD` so that the label survives being joined with dots.
fn escape_label(raw: &[u8]) -> String {
    let mut label = String::with_capacity(raw.len());
    for &byte in raw {
        if byte.is_ascii_graphic() && byte != b'.' && byte != b'\\' {
            label.push(byte as char);
        } else {
            label.push_str(&format!("\\{byte:03}"));
        }
    }
    label
}

/// Wire bytes of a text label, undoing `\DDD` and `\X` escapes.
fn unescape_label(label: &str) -> Vec<u8> {
    let bytes = label.as_bytes();
    let mut raw = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' || i + 1 == bytes.len() {
            raw.push(bytes[i]);
            i += 1;
            continue;
        }

        let decimal = bytes
            .get(i + 1..i + 4)
            .filter(|digits| digits.iter().all(u8::is_ascii_digit))
            .and_then(|digits| std::str::from_utf8(digits).ok())
            .and_then(|digits| digits.parse::<u8>().ok());

        match decimal {
            Some(byte) => {
                raw.push(byte);
                i += 4;
            }
            None => {
                raw.push(bytes[i + 1]);
                i += 2;
            }
        }
    }

    raw
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            f.pad(".")
        } else {
            f.pad(&self.name)
        }
    }
}

impl FromStr for Name {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Networkable for Name {
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::with_capacity(self.wire_len());

        for section in self.labels() {
            let raw = unescape_label(section);
            ret.put_u8(raw.len() as u8);
            ret.extend_from_slice(&raw);
        }

        ret.put_u8(0);

        ret.into()
    }

    /// Reads a name at the cursor, following compression pointers.
    ///
    /// Every offset visited while reading one name is remembered; revisiting
    /// one, or pointing outside the message, is a `MalformedName`. The cursor
    /// ends up just past the first pointer, or past the terminating zero
    /// octet when the name is fully inline. A name that would start past the
    /// end of the message is a truncated section, `OutOfBounds`.
    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        bytes.peek_u8()?;

        let buf = bytes.buffer();
        let mut position = bytes.position();
        let mut resume_at = None;
        let mut visited = HashSet::new();
        let mut labels: Vec<String> = Vec::new();
        let mut wire_len = 1;

        loop {
            if position >= buf.len() || !visited.insert(position) {
                warn!(offset = position, "name points outside the message or loops");
                return Err(ProtocolError::MalformedName { offset: position });
            }

            let len = buf[position];

            if len & POINTER_MASK == POINTER_MASK {
                // Compressed
                let low = *buf
                    .get(position + 1)
                    .ok_or(ProtocolError::MalformedName { offset: position })?;
                let pointer = (((len & !POINTER_MASK) as usize) << 8) | low as usize;
                resume_at.get_or_insert(position + 2);
                position = pointer;
            } else if len & POINTER_MASK != 0 {
                // 0b01 and 0b10 prefixes are reserved
                return Err(ProtocolError::MalformedName { offset: position });
            } else if len == 0 {
                position += 1;
                break;
            } else {
                // Uncompressed
                let start = position + 1;
                let end = start + len as usize;
                let chars = buf
                    .get(start..end)
                    .ok_or(ProtocolError::MalformedName { offset: position })?;

                wire_len += len as usize + 1;
                if wire_len > MAX_NAME_LEN {
                    return Err(ProtocolError::MalformedName { offset: position });
                }

                labels.push(escape_label(chars));
                position = end;
            }
        }

        bytes.set_position(resume_at.unwrap_or(position))?;

        Ok(Self::from_labels(labels))
    }
}
