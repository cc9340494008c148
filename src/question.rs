use std::fmt::Display;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::instrument;

use super::{Name, Networkable};
use crate::{ByteCursor, ProtocolError, RecordType};

pub const CLASS_IN: u16 = 1;

/// What is being asked: a name and a record type.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryNode {
    pub name: Name,
    pub type_: RecordType,
}

impl QueryNode {
    pub fn new(name: Name, type_: RecordType) -> Self {
        Self { name, type_ }
    }

    pub fn parse(name: &str, type_: RecordType) -> Result<Self, ProtocolError> {
        Ok(Self::new(Name::new(name)?, type_))
    }

    pub fn normalized(&self) -> Self {
        Self {
            name: self.name.normalized(),
            type_: self.type_,
        }
    }
}

impl Display for QueryNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.type_)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: Name,
    pub type_: RecordType,
    pub class: u16,
}

impl Question {
    pub fn new(name: Name, type_: RecordType) -> Self {
        Self {
            name,
            type_,
            class: CLASS_IN,
        }
    }
}

impl From<&QueryNode> for Question {
    fn from(value: &QueryNode) -> Self {
        Self::new(value.name.clone(), value.type_)
    }
}

impl From<&Question> for QueryNode {
    fn from(value: &Question) -> Self {
        Self::new(value.name.clone(), value.type_)
    }
}

impl Networkable for Question {
    #[instrument(level = "trace", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::new();

        ret.extend_from_slice(&self.name.to_bytes());
        ret.put_u16(self.type_.to_int());
        ret.put_u16(self.class);

        ret.into()
    }

    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        let name = Name::from_bytes(bytes)?;
        let type_ = RecordType::from_int(bytes.read_u16()?);
        let class = bytes.read_u16()?;

        Ok(Self { name, type_, class })
    }
}
