use bytes::Bytes;

mod cursor;
pub use cursor::ByteCursor;

mod error;
pub use error::{ProtocolError, ResolutionError, TransportError};

mod header;
pub use header::{Flags, Header, Rcode};

mod name;
pub use name::Name;

mod message;
pub use message::{decode_response, encode_query, Message, Section};

mod question;
pub use question::{QueryNode, Question};

mod resource_record;
pub use resource_record::{RecordData, ResourceRecord};

mod record_type;
pub use record_type::{RecordType, UnknownRecordType};

pub mod cache;
pub use cache::Cache;

pub mod config;
pub use config::ResolverConfig;

pub mod resolver;
pub use resolver::{Resolver, TraceEvent, Transport, UdpTransport};

pub trait Networkable: Sized {
    fn to_bytes(&self) -> Bytes;

    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError>;
}
