//! Stored tuple metadata
//!
//! Every document carries an 18-byte big-endian header:
//!
//! ```text
//! offset  size  field
//! 0       4     block number
//! 4       2     offset number
//! 6       8     xmin
//! 14      4     cmin
//! ```
//!
//! Deletes and updates never rewrite the header; they add a supersession
//! record keyed by the origin `(block, offset)`.

use serde::{Deserialize, Serialize};

use super::errors::{VisibilityError, VisibilityResult};

/// Length of the encoded per-document header
pub const TUPLE_HEADER_LEN: usize = 18;

/// Physical row identity in the source table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TupleId {
    pub block: u32,
    pub offset: u16,
}

impl TupleId {
    pub fn new(block: u32, offset: u16) -> Self {
        Self { block, offset }
    }
}

/// Decoded per-document header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleHeader {
    pub id: TupleId,
    pub xmin: u64,
    pub cmin: u32,
}

impl TupleHeader {
    /// Encodes into the 18-byte wire layout
    pub fn encode(&self) -> [u8; TUPLE_HEADER_LEN] {
        let mut out = [0u8; TUPLE_HEADER_LEN];
        out[0..4].copy_from_slice(&self.id.block.to_be_bytes());
        out[4..6].copy_from_slice(&self.id.offset.to_be_bytes());
        out[6..14].copy_from_slice(&self.xmin.to_be_bytes());
        out[14..18].copy_from_slice(&self.cmin.to_be_bytes());
        out
    }

    /// Decodes the 18-byte wire layout
    pub fn decode(bytes: &[u8]) -> VisibilityResult<Self> {
        let bytes: &[u8; TUPLE_HEADER_LEN] = bytes.try_into().map_err(|_| {
            VisibilityError::invalid_header(format!(
                "expected {} bytes, got {}",
                TUPLE_HEADER_LEN,
                bytes.len()
            ))
        })?;

        let mut block = [0u8; 4];
        let mut offset = [0u8; 2];
        let mut xmin = [0u8; 8];
        let mut cmin = [0u8; 4];
        block.copy_from_slice(&bytes[0..4]);
        offset.copy_from_slice(&bytes[4..6]);
        xmin.copy_from_slice(&bytes[6..14]);
        cmin.copy_from_slice(&bytes[14..18]);

        Ok(Self {
            id: TupleId::new(u32::from_be_bytes(block), u16::from_be_bytes(offset)),
            xmin: u64::from_be_bytes(xmin),
            cmin: u32::from_be_bytes(cmin),
        })
    }
}

/// Marks an origin row as updated or deleted by `xmax` at command `cmax`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupersessionRecord {
    pub origin: TupleId,
    pub xmax: u64,
    pub cmax: u32,
}

/// A document as seen by the visibility predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleRecord {
    pub id: TupleId,
    pub xmin: u64,
    pub cmin: u32,
    pub xmax: Option<u64>,
    pub cmax: Option<u32>,
}

impl TupleRecord {
    /// Joins a decoded header with its supersession record, if any
    pub fn from_parts(header: TupleHeader, superseded: Option<&SupersessionRecord>) -> Self {
        Self {
            id: header.id,
            xmin: header.xmin,
            cmin: header.cmin,
            xmax: superseded.map(|s| s.xmax),
            cmax: superseded.map(|s| s.cmax),
        }
    }
}

/// One scanned document: its shard-local ordinal and raw header bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTuple {
    pub shard: u32,
    pub ordinal: u32,
    pub header: Vec<u8>,
}
