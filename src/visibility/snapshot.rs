//! Transaction snapshot descriptor
//!
//! Wire form (camelCase JSON, signed ids):
//!
//! ```text
//! { "myXid": 100, "xmin": 90, "xmax": 110, "commandId": 5, "activeXids": [97] }
//! ```
//!
//! Ids are validated non-negative and `xmin <= xmax`; `xmin` is required.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::errors::{VisibilityError, VisibilityResult};

/// Immutable input to one visibility computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotWire", into = "SnapshotWire")]
pub struct SnapshotDescriptor {
    my_xid: u64,
    xmin: u64,
    xmax: u64,
    command_id: u32,
    active_xids: BTreeSet<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotWire {
    my_xid: i64,
    #[serde(default)]
    xmin: Option<i64>,
    xmax: i64,
    command_id: i32,
    #[serde(default)]
    active_xids: Vec<i64>,
}

impl SnapshotDescriptor {
    /// Creates a validated descriptor
    pub fn new(
        my_xid: u64,
        xmin: u64,
        xmax: u64,
        command_id: u32,
        active_xids: impl IntoIterator<Item = u64>,
    ) -> VisibilityResult<Self> {
        if xmin > xmax {
            return Err(VisibilityError::invalid_snapshot(format!(
                "xmin {} exceeds xmax {}",
                xmin, xmax
            )));
        }
        Ok(Self {
            my_xid,
            xmin,
            xmax,
            command_id,
            active_xids: active_xids.into_iter().collect(),
        })
    }

    /// Parses the JSON wire form
    pub fn from_json(text: &str) -> VisibilityResult<Self> {
        serde_json::from_str(text).map_err(|e| VisibilityError::invalid_snapshot(e.to_string()))
    }

    /// The calling transaction's id
    pub fn my_xid(&self) -> u64 {
        self.my_xid
    }

    /// Oldest transaction still running when the snapshot was taken
    pub fn xmin(&self) -> u64 {
        self.xmin
    }

    /// First transaction id not yet assigned when the snapshot was taken
    pub fn xmax(&self) -> u64 {
        self.xmax
    }

    /// Current command counter of the calling transaction
    pub fn command_id(&self) -> u32 {
        self.command_id
    }

    /// Transactions in progress at snapshot time
    pub fn active_xids(&self) -> &BTreeSet<u64> {
        &self.active_xids
    }

    /// True if `xid` was in progress at snapshot time
    pub fn is_active(&self, xid: u64) -> bool {
        self.active_xids.contains(&xid)
    }
}

fn non_negative(name: &str, value: i64) -> VisibilityResult<u64> {
    u64::try_from(value)
        .map_err(|_| VisibilityError::invalid_snapshot(format!("{} must be non-negative, got {}", name, value)))
}

impl TryFrom<SnapshotWire> for SnapshotDescriptor {
    type Error = VisibilityError;

    fn try_from(wire: SnapshotWire) -> VisibilityResult<Self> {
        let xmin = wire
            .xmin
            .ok_or_else(|| VisibilityError::invalid_snapshot("xmin is required"))?;
        let command_id = u32::try_from(wire.command_id).map_err(|_| {
            VisibilityError::invalid_snapshot(format!(
                "commandId must be non-negative, got {}",
                wire.command_id
            ))
        })?;
        let active = wire
            .active_xids
            .iter()
            .map(|x| non_negative("activeXids", *x))
            .collect::<VisibilityResult<Vec<_>>>()?;

        Self::new(
            non_negative("myXid", wire.my_xid)?,
            non_negative("xmin", xmin)?,
            non_negative("xmax", wire.xmax)?,
            command_id,
            active,
        )
    }
}

impl From<SnapshotDescriptor> for SnapshotWire {
    fn from(s: SnapshotDescriptor) -> Self {
        // ids above i64::MAX never come from the wire form
        let signed = |x: u64| i64::try_from(x).unwrap_or(i64::MAX);
        Self {
            my_xid: signed(s.my_xid),
            xmin: Some(signed(s.xmin)),
            xmax: signed(s.xmax),
            command_id: i32::try_from(s.command_id).unwrap_or(i32::MAX),
            active_xids: s.active_xids.iter().map(|x| signed(*x)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility::VisibilityErrorCode;

    #[test]
    fn test_parse_wire_form() {
        let snapshot = SnapshotDescriptor::from_json(
            r#"{"myXid":100,"xmin":90,"xmax":110,"commandId":5,"activeXids":[97,98]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.my_xid(), 100);
        assert_eq!(snapshot.command_id(), 5);
        assert!(snapshot.is_active(97));
        assert!(!snapshot.is_active(100));
    }

    #[test]
    fn test_xmin_required() {
        let err = SnapshotDescriptor::from_json(r#"{"myXid":100,"xmax":110,"commandId":5}"#)
            .unwrap_err();
        assert_eq!(err.code(), VisibilityErrorCode::AeroSnapshotInvalid);
        assert!(err.message().contains("xmin"));
    }

    #[test]
    fn test_negative_ids_rejected() {
        assert!(SnapshotDescriptor::from_json(
            r#"{"myXid":-1,"xmin":90,"xmax":110,"commandId":5}"#
        )
        .is_err());
        assert!(SnapshotDescriptor::from_json(
            r#"{"myXid":100,"xmin":90,"xmax":110,"commandId":5,"activeXids":[-3]}"#
        )
        .is_err());
    }

    #[test]
    fn test_xmin_after_xmax_rejected() {
        assert!(SnapshotDescriptor::new(100, 120, 110, 0, []).is_err());
    }

    #[test]
    fn test_serializes_back_to_wire_form() {
        let snapshot = SnapshotDescriptor::new(100, 90, 110, 5, [97]).unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["myXid"], 100);
        assert_eq!(value["activeXids"][0], 97);
        let back: SnapshotDescriptor = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }
}
