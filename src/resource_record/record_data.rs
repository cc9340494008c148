use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};

use crate::{ByteCursor, Name, Networkable, ProtocolError, RecordType};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(Name),
    Cname(Name),
    Soa {
        mname: Name,
        rname: Name,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Mx {
        preference: u16,
        exchange: Name,
    },
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: Name,
    },
    /// RDATA of a type that is not decoded, kept verbatim.
    Unsupported(Bytes),
}

impl RecordData {
    /// Decodes RDATA starting at the cursor. Names may be compressed;
    /// addresses never are. The caller checks that exactly `rd_length`
    /// bytes were consumed.
    pub fn from_bytes(
        type_: RecordType,
        rd_length: u16,
        bytes: &mut ByteCursor<'_>,
    ) -> Result<Self, ProtocolError> {
        let data = match type_ {
            RecordType::A => {
                let octets: [u8; 4] = read_array(bytes)?;
                Self::A(octets.into())
            }
            RecordType::Aaaa => {
                let octets: [u8; 16] = read_array(bytes)?;
                Self::Aaaa(octets.into())
            }
            RecordType::Ns => Self::Ns(Name::from_bytes(bytes)?),
            RecordType::Cname => Self::Cname(Name::from_bytes(bytes)?),
            RecordType::Soa => Self::Soa {
                mname: Name::from_bytes(bytes)?,
                rname: Name::from_bytes(bytes)?,
                serial: bytes.read_u32()?,
                refresh: bytes.read_u32()?,
                retry: bytes.read_u32()?,
                expire: bytes.read_u32()?,
                minimum: bytes.read_u32()?,
            },
            RecordType::Mx => Self::Mx {
                preference: bytes.read_u16()?,
                exchange: Name::from_bytes(bytes)?,
            },
            RecordType::Srv => Self::Srv {
                priority: bytes.read_u16()?,
                weight: bytes.read_u16()?,
                port: bytes.read_u16()?,
                target: Name::from_bytes(bytes)?,
            },
            RecordType::Any | RecordType::Other(_) => {
                let raw = bytes.read_bytes(rd_length as usize)?;
                Self::Unsupported(Bytes::copy_from_slice(raw))
            }
        };

        Ok(data)
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Self::A(addr) => Bytes::copy_from_slice(&addr.octets()),
            Self::Aaaa(addr) => Bytes::copy_from_slice(&addr.octets()),
            Self::Ns(name) | Self::Cname(name) => name.to_bytes(),
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                let mut ret = BytesMut::new();
                ret.extend_from_slice(&mname.to_bytes());
                ret.extend_from_slice(&rname.to_bytes());
                for value in [serial, refresh, retry, expire, minimum] {
                    ret.put_u32(*value);
                }
                ret.into()
            }
            Self::Mx {
                preference,
                exchange,
            } => {
                let mut ret = BytesMut::new();
                ret.put_u16(*preference);
                ret.extend_from_slice(&exchange.to_bytes());
                ret.into()
            }
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                let mut ret = BytesMut::new();
                ret.put_u16(*priority);
                ret.put_u16(*weight);
                ret.put_u16(*port);
                ret.extend_from_slice(&target.to_bytes());
                ret.into()
            }
            Self::Unsupported(raw) => raw.clone(),
        }
    }

    pub fn address(&self) -> Option<IpAddr> {
        match self {
            Self::A(addr) => Some(IpAddr::V4(*addr)),
            Self::Aaaa(addr) => Some(IpAddr::V6(*addr)),
            _ => None,
        }
    }

    pub fn domain_name(&self) -> Option<&Name> {
        match self {
            Self::Ns(name) | Self::Cname(name) => Some(name),
            Self::Soa { mname, .. } => Some(mname),
            Self::Mx { exchange, .. } => Some(exchange),
            Self::Srv { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl Display for RecordData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A(addr) => write!(f, "{addr}"),
            Self::Aaaa(addr) => write!(f, "{addr}"),
            Self::Ns(name) | Self::Cname(name) => write!(f, "{name}"),
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"
            ),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{priority} {weight} {port} {target}"),
            Self::Unsupported(raw) => write!(f, "<unsupported, {} bytes>", raw.len()),
        }
    }
}

fn read_array<const N: usize>(bytes: &mut ByteCursor<'_>) -> Result<[u8; N], ProtocolError> {
    let mut out = [0; N];
    out.copy_from_slice(bytes.read_bytes(N)?);
    Ok(out)
}
