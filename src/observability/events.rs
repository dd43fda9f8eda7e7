//! Observable lifecycle events
//!
//! Events are explicit and typed; each carries the severity it is logged at.
//! Begin/complete pairs (`QUERY_COMPILE_*`, `VISIBILITY_*`) come from
//! `ObservationScope` instead.

use std::fmt;

use super::logger::Severity;

/// Observable events of query compilation and visibility computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Compiler configuration loaded from a file
    ConfigLoaded,

    // Query compilation
    /// Compilation aborted with an error
    QueryRejected,

    // Metadata
    /// Index metadata fetched and flattened
    MetadataLoaded,

    // Expansion
    /// An implicit join was synthesized
    ExpansionGenerated,
    /// A join was rewritten as the negation of its complement
    JoinInverted,
    /// The shared count cache overflowed and was cleared
    EstimateCacheCleared,

    // Visibility
    /// No supersessions, aborts or active writers; only recent rows were scanned
    VisibilityShortCircuit,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::QueryRejected => "QUERY_REJECTED",

            Event::MetadataLoaded => "METADATA_LOADED",

            Event::ExpansionGenerated => "EXPANSION_GENERATED",
            Event::JoinInverted => "JOIN_INVERTED",
            Event::EstimateCacheCleared => "ESTIMATE_CACHE_CLEARED",

            Event::VisibilityShortCircuit => "VISIBILITY_SHORT_CIRCUIT",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::QueryRejected => Severity::Warn,
            Event::MetadataLoaded | Event::ExpansionGenerated | Event::VisibilityShortCircuit => {
                Severity::Trace
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::QueryRejected,
            Event::MetadataLoaded,
            Event::ExpansionGenerated,
            Event::JoinInverted,
            Event::EstimateCacheCleared,
            Event::VisibilityShortCircuit,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::QueryRejected.severity(), Severity::Warn);
        assert_eq!(Event::JoinInverted.severity(), Severity::Info);
        assert_eq!(Event::MetadataLoaded.severity(), Severity::Trace);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(format!("{}", Event::JoinInverted), "JOIN_INVERTED");
    }
}
