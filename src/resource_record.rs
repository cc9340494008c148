use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use derivative::Derivative;
use tracing::{instrument, warn};

use super::{Name, Networkable};
use crate::question::CLASS_IN;
use crate::{ByteCursor, ProtocolError, RecordType};

mod record_data;
pub use record_data::RecordData;

/// One resource record as observed on the wire.
///
/// Equality and hashing ignore `inserted_at`, so the same record seen twice
/// is one cache entry.
#[derive(Derivative)]
#[derivative(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: Name,
    pub type_: RecordType,
    pub class: u16,
    pub ttl: u32,
    #[derivative(Hash = "ignore", PartialEq = "ignore")]
    pub inserted_at: Instant,
    pub data: RecordData,
}

impl ResourceRecord {
    pub fn new(name: Name, type_: RecordType, ttl: u32, data: RecordData) -> Self {
        Self {
            name,
            type_,
            class: CLASS_IN,
            ttl,
            inserted_at: Instant::now(),
            data,
        }
    }

    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.ttl.into())
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl_duration()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Whole seconds left before expiry.
    pub fn remaining_ttl(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.inserted_at).as_secs();
        u64::from(self.ttl).saturating_sub(elapsed) as u32
    }

    /// The same data, reported under another owner name and type.
    pub fn rekeyed(&self, name: &Name, type_: RecordType) -> Self {
        Self {
            name: name.clone(),
            type_,
            ..self.clone()
        }
    }
}

impl Networkable for ResourceRecord {
    #[instrument(level = "trace", skip_all)]
    fn to_bytes(&self) -> Bytes {
        let mut ret = BytesMut::new();
        ret.extend_from_slice(&self.name.to_bytes());
        ret.put_u16(self.type_.to_int());
        ret.put_u16(self.class);
        ret.put_u32(self.ttl);
        let data = self.data.to_bytes();
        ret.put_u16(data.len() as u16);
        ret.extend_from_slice(&data);

        ret.into()
    }

    #[instrument(level = "trace", skip_all)]
    fn from_bytes(bytes: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        let name = Name::from_bytes(bytes)?;
        let type_ = RecordType::from_int(bytes.read_u16()?);
        let class = bytes.read_u16()?;
        let ttl = bytes.read_u32()?;
        let rd_length = bytes.read_u16()?;

        let start = bytes.position();
        if bytes.remaining() < rd_length as usize {
            return Err(ProtocolError::OutOfBounds {
                offset: start,
                wanted: rd_length as usize,
                len: bytes.len(),
            });
        }

        let data = RecordData::from_bytes(type_, rd_length, bytes)?;

        let consumed = bytes.position() - start;
        if consumed != rd_length as usize {
            warn!(%name, %type_, rd_length, consumed, "record data length mismatch");
            return Err(ProtocolError::RdataLength {
                record_type: type_,
                declared: rd_length,
                consumed,
            });
        }

        Ok(Self {
            name,
            type_,
            class,
            ttl,
            inserted_at: Instant::now(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    fn decode(buf: &[u8], start: usize) -> (Result<ResourceRecord, ProtocolError>, usize) {
        let mut cursor = ByteCursor::new(buf);
        cursor.set_position(start).unwrap();
        let record = ResourceRecord::from_bytes(&mut cursor);
        (record, cursor.position())
    }

    #[test]
    fn decodes_a_record_with_compressed_owner() {
        let mut buf = b"\x07example\x03com\x00".to_vec();
        let start = buf.len();
        buf.extend_from_slice(b"\xc0\x00\x00\x01\x00\x01\x00\x00\x01\x2c\x00\x04\x5d\xb8\xd8\x22");

        let (record, position) = decode(&buf, start);
        let record = record.unwrap();

        assert_eq!(record.name.as_str(), "example.com");
        assert_eq!(record.type_, RecordType::A);
        assert_eq!(record.ttl, 300);
        assert_eq!(record.data, RecordData::A(Ipv4Addr::new(93, 184, 216, 34)));
        assert_eq!(position, buf.len());
    }

    #[test]
    fn decodes_cname_rdata_through_pointer() {
        // "example.com" at 0, then "www" -> pointer, CNAME -> "cdn" + pointer
        let mut buf = b"\x07example\x03com\x00".to_vec();
        let start = buf.len();
        buf.extend_from_slice(b"\x03www\xc0\x00\x00\x05\x00\x01\x00\x00\x00\x3c\x00\x06\x03cdn\xc0\x00");

        let (record, position) = decode(&buf, start);
        let record = record.unwrap();

        assert_eq!(record.name.as_str(), "www.example.com");
        assert_eq!(record.data, RecordData::Cname(name("cdn.example.com")));
        assert_eq!(position, buf.len());
    }

    #[test]
    fn decodes_soa_mx_srv_and_aaaa() {
        let records = [
            ResourceRecord::new(
                name("example.com"),
                RecordType::Soa,
                3600,
                RecordData::Soa {
                    mname: name("ns1.example.com"),
                    rname: name("hostmaster.example.com"),
                    serial: 2024010101,
                    refresh: 7200,
                    retry: 900,
                    expire: 1209600,
                    minimum: 300,
                },
            ),
            ResourceRecord::new(
                name("example.com"),
                RecordType::Mx,
                60,
                RecordData::Mx {
                    preference: 10,
                    exchange: name("mail.example.com"),
                },
            ),
            ResourceRecord::new(
                name("_sip._udp.example.com"),
                RecordType::Srv,
                60,
                RecordData::Srv {
                    priority: 1,
                    weight: 5,
                    port: 5060,
                    target: name("sip.example.com"),
                },
            ),
            ResourceRecord::new(
                name("example.com"),
                RecordType::Aaaa,
                60,
                RecordData::Aaaa(Ipv6Addr::new(0x2606, 0x2800, 0x220, 1, 0, 0, 0, 0x1946)),
            ),
        ];

        for record in records {
            let buf = record.to_bytes();
            let (decoded, position) = decode(&buf, 0);
            assert_eq!(decoded.unwrap(), record);
            assert_eq!(position, buf.len());
        }
    }

    #[test]
    fn unsupported_types_are_kept_opaque() {
        // TXT "hi" followed by one trailing byte that must not be consumed
        let buf = b"\x00\x00\x10\x00\x01\x00\x00\x00\x0a\x00\x03\x02hi\xff";
        let (record, position) = decode(buf, 0);
        let record = record.unwrap();

        assert_eq!(record.type_, RecordType::Other(16));
        assert_eq!(
            record.data,
            RecordData::Unsupported(Bytes::from_static(b"\x02hi"))
        );
        assert_eq!(position, buf.len() - 1);
    }

    #[test]
    fn wrong_address_length_is_rejected() {
        let buf = b"\x00\x00\x01\x00\x01\x00\x00\x00\x0a\x00\x05\x01\x02\x03\x04\x05";
        let (record, _) = decode(buf, 0);
        assert_eq!(
            record,
            Err(ProtocolError::RdataLength {
                record_type: RecordType::A,
                declared: 5,
                consumed: 4
            })
        );
    }

    #[test]
    fn rdata_past_end_is_out_of_bounds() {
        let buf = b"\x00\x00\x01\x00\x01\x00\x00\x00\x0a\x00\x04\x01\x02";
        let (record, _) = decode(buf, 0);
        assert!(matches!(record, Err(ProtocolError::OutOfBounds { .. })));
    }

    #[test]
    fn expiry_follows_ttl() {
        let record = ResourceRecord::new(
            name("example.com"),
            RecordType::A,
            300,
            RecordData::A(Ipv4Addr::LOCALHOST),
        );
        let start = record.inserted_at;

        assert!(!record.is_expired_at(start));
        assert!(!record.is_expired_at(start + Duration::from_secs(299)));
        assert!(record.is_expired_at(start + Duration::from_secs(300)));
        assert_eq!(record.remaining_ttl(start + Duration::from_secs(100)), 200);
        assert_eq!(record.remaining_ttl(start + Duration::from_secs(900)), 0);
    }

    #[test]
    fn zero_ttl_is_expired_immediately() {
        let record = ResourceRecord::new(
            name("example.com"),
            RecordType::A,
            0,
            RecordData::A(Ipv4Addr::LOCALHOST),
        );
        assert!(record.is_expired_at(record.inserted_at));
    }

    #[test]
    fn equality_ignores_insertion_time() {
        let first = ResourceRecord::new(
            name("example.com"),
            RecordType::A,
            300,
            RecordData::A(Ipv4Addr::LOCALHOST),
        );
        let mut second = first.clone();
        second.inserted_at += Duration::from_secs(10);
        assert_eq!(first, second);

        second.ttl = 301;
        assert_ne!(first, second);
    }

    #[test]
    fn rekeying_keeps_data_and_ttl() {
        let record = ResourceRecord::new(
            name("example.net"),
            RecordType::A,
            120,
            RecordData::A(Ipv4Addr::new(192, 0, 2, 1)),
        );
        let rekeyed = record.rekeyed(&name("www.example.com"), RecordType::A);

        assert_eq!(rekeyed.name.as_str(), "www.example.com");
        assert_eq!(rekeyed.ttl, 120);
        assert_eq!(rekeyed.data, record.data);
    }
}
