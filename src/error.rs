use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::{Name, RecordType};

/// Anything wrong with the bytes of a single message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("read of {wanted} bytes at offset {offset} runs past the end of a {len} byte message")]
    OutOfBounds {
        offset: usize,
        wanted: usize,
        len: usize,
    },

    #[error("malformed or looping name at offset {offset}")]
    MalformedName { offset: usize },

    #[error("invalid domain name: {0}")]
    InvalidName(String),

    #[error("format error: the server was unable to interpret the query")]
    FormatError,

    #[error("server failure")]
    ServerFailure,

    #[error("query kind not implemented by the server")]
    NotImplemented,

    #[error("unknown response code {0}")]
    UnknownRCode(u8),

    #[error("message carries {0} questions, only one is supported")]
    MultipleQuestions(u16),

    #[error("{record_type} record declared {declared} bytes of data but {consumed} were consumed")]
    RdataLength {
        record_type: RecordType,
        declared: u16,
        consumed: usize,
    },

    #[error("response id {received:#06x} does not match query id {expected:#06x}")]
    IdMismatch { expected: u16, received: u16 },

    #[error("message is not a response")]
    NotAResponse,
}

/// Failure to get any bytes back from a server.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no response from {0}")]
    Timeout(SocketAddr),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a lookup ended without records.
///
/// None of these are fatal to the caller; they explain an empty answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("maximum number of indirection levels ({0}) reached")]
    IndirectionLimit(usize),

    #[error("gave up after following {0} referrals")]
    ReferralLimit(usize),

    #[error("{0} did not answer")]
    Unreachable(SocketAddr),

    #[error("bad response from {server}: {source}")]
    Protocol {
        server: IpAddr,
        #[source]
        source: ProtocolError,
    },

    #[error("alias target {target} could not be resolved: {source}")]
    AliasUnresolved {
        target: Name,
        #[source]
        source: Box<ResolutionError>,
    },

    #[error("{0} refused the query")]
    Refused(IpAddr),

    #[error("answer section holds nothing usable for the query")]
    NoUsableAnswer,

    #[error("response neither answers nor refers")]
    NoNameservers,

    #[error("none of the referred nameservers could be resolved")]
    UnresolvableNameservers,
}
