//! Shared error vocabulary
//!
//! Every subsystem error carries a stable `AERO_*` code and one of these
//! severities. Nothing in the pipeline retries; the caller owns retry policy.

use std::fmt;

/// Severity levels shared by all subsystem errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Query or schema problem; the request is rejected
    Reject,
    /// Remote round trip failed; propagated to the caller
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}
