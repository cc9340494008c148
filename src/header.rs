use bitfield::bitfield;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{instrument, warn};

use super::Networkable;
use crate::{ByteCursor, ProtocolError};

pub const HEADER_LEN: usize = 12;

bitfield! {
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    pub struct Flags(u16);
    impl Debug;
    u8;
    // query or response
    pub qr, set_qr: 15;
    // query type
    pub opcode, set_opcode: 14, 11;
    // authoritative answerer
    pub aa, set_aa: 10;
    // truncation
    pub tc, set_tc: 9;
    // recursion desired
    pub rd, set_rd: 8;
    // recursion available
    pub ra, set_ra: 7;
    // reserved
    pub z, set_z: 6, 4;
    // response code
    pub rcode, set_rcode: 3, 0;
}

impl Flags {
    /// Flags for an outgoing query: only RD is set.
    pub fn query() -> Self {
        let mut flags = Self::default();
        flags.set_rd(true);
        flags
    }

    pub fn response_code(&self) -> Rcode {
        Rcode::from(self.rcode())
    }
}

/// How a response code affects decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rcode {
    NoError,
    FormatError,
    ServerFailure,
    NameError,
    NotImplemented,
    Refused,
    Unknown(u8),
}

impl Rcode {
    /// Codes after which the rest of the message is meaningless.
    pub fn check(self) -> Result<Self, ProtocolError> {
        match self {
            Self::NoError | Self::NameError | Self::Refused => Ok(self),
            Self::FormatError => Err(ProtocolError::FormatError),
            Self::ServerFailure => Err(ProtocolError::ServerFailure),
            Self::NotImplemented => Err(ProtocolError::NotImplemented),
            Self::Unknown(code) => Err(ProtocolError::UnknownRCode(code)),
        }
    }
}

impl From<u8> for Rcode {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::FormatError,
            2 => Self::ServerFailure,
            3 => Self::NameError,
            4 => Self::NotImplemented,
            5 => Self::Refused,
            other => Self::Unknown(other),
        }
    }
}

impl Networkable for Flags {
    #[instrument(level = "trace", skip_all)]
    fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.0.to_be_bytes())
    }

    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        Ok(Self(u16::from_be_bytes(bytes.read_padded())))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: Flags,
    pub num_questions: u16,
    pub num_answers: u16,
    pub num_authorities: u16,
    pub num_additionals: u16,
}

impl Header {
    pub fn new(id: u16, flags: Flags) -> Self {
        Self {
            id,
            flags,
            ..Default::default()
        }
    }
}

impl Networkable for Header {
    #[instrument(level = "trace", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::with_capacity(HEADER_LEN);
        ret.put_u16(self.id);
        ret.extend_from_slice(&self.flags.to_bytes());
        ret.put_u16(self.num_questions);
        ret.put_u16(self.num_answers);
        ret.put_u16(self.num_authorities);
        ret.put_u16(self.num_additionals);

        ret.into()
    }

    /// A header shorter than twelve bytes is zero-filled rather than
    /// rejected; the counts then describe an empty message.
    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        if bytes.remaining() < HEADER_LEN {
            warn!(len = bytes.remaining(), "short header, zero-filling");
        }

        let id = u16::from_be_bytes(bytes.read_padded());
        let flags = Flags::from_bytes(bytes)?;
        let qd_count = u16::from_be_bytes(bytes.read_padded());
        let an_count = u16::from_be_bytes(bytes.read_padded());
        let ns_count = u16::from_be_bytes(bytes.read_padded());
        let ar_count = u16::from_be_bytes(bytes.read_padded());

        Ok(Self {
            id,
            flags,
            num_questions: qd_count,
            num_answers: an_count,
            num_authorities: ns_count,
            num_additionals: ar_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_flags_only_set_rd() {
        let header = Header::new(0xbeef, Flags::query());
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..4], &[0xbe, 0xef, 0x01, 0x00]);
        assert_eq!(bytes.len(), HEADER_LEN);
    }

    #[test]
    fn reads_aa_and_rcode_from_their_bytes() {
        // byte 1: QR | AA, byte 2: RA | rcode 3
        let buf = [0, 1, 0b1000_0100, 0b1000_0011, 0, 1, 0, 2, 0, 3, 0, 4];
        let header = Header::from_bytes(&mut ByteCursor::new(&buf)).unwrap();

        assert_eq!(header.id, 1);
        assert!(header.flags.qr());
        assert!(header.flags.aa());
        assert!(!header.flags.tc());
        assert!(header.flags.ra());
        assert_eq!(header.flags.response_code(), Rcode::NameError);
        assert_eq!(
            (
                header.num_questions,
                header.num_answers,
                header.num_authorities,
                header.num_additionals
            ),
            (1, 2, 3, 4)
        );
    }

    #[test]
    fn short_header_is_zero_filled() {
        let buf = [0x12, 0x34, 0x84];
        let mut cursor = ByteCursor::new(&buf);
        let header = Header::from_bytes(&mut cursor).unwrap();

        assert_eq!(header.id, 0x1234);
        assert!(header.flags.aa());
        assert_eq!(header.num_answers, 0);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn classifies_response_codes() {
        assert_eq!(Rcode::from(0).check(), Ok(Rcode::NoError));
        assert_eq!(Rcode::from(3).check(), Ok(Rcode::NameError));
        assert_eq!(Rcode::from(5).check(), Ok(Rcode::Refused));
        assert_eq!(Rcode::from(1).check(), Err(ProtocolError::FormatError));
        assert_eq!(Rcode::from(2).check(), Err(ProtocolError::ServerFailure));
        assert_eq!(Rcode::from(4).check(), Err(ProtocolError::NotImplemented));
        assert_eq!(Rcode::from(9).check(), Err(ProtocolError::UnknownRCode(9)));
    }
}
