//! Topic routing policy
//!
//! One topic exchange, one routing key per event family plus the raw firehose
//! and the DLQ. Queue names are the routing keys with a `.q` suffix; the
//! bindings are declared from the same constants so they cannot drift.

/// The topic exchange all events flow through
pub const EXCHANGE: &str = "sb.events";

pub const TOPIC_RAW: &str = "sb.events.raw";
pub const TOPIC_GEO: &str = "sb.events.geo";
pub const TOPIC_LICENSE: &str = "sb.events.license";
pub const TOPIC_SESSION: &str = "sb.events.session";
pub const TOPIC_SCREEN: &str = "sb.events.screen";
pub const TOPIC_UI: &str = "sb.events.ui";
pub const TOPIC_SYSTEM: &str = "sb.events.system";
pub const TOPIC_DLQ: &str = "sb.events.dlq";

/// Every queue the processor consumes (excludes the DLQ)
pub const DOMAIN_TOPICS: [&str; 7] = [
    TOPIC_RAW,
    TOPIC_GEO,
    TOPIC_LICENSE,
    TOPIC_SESSION,
    TOPIC_SCREEN,
    TOPIC_UI,
    TOPIC_SYSTEM,
];

/// Topics whose queues get the protective policy
/// (message TTL, max length, drop-head overflow)
pub const PROTECTED_TOPICS: [&str; 5] = [
    TOPIC_RAW,
    TOPIC_SESSION,
    TOPIC_SCREEN,
    TOPIC_UI,
    TOPIC_SYSTEM,
];

/// Queue name for a routing key
pub fn queue_name(topic: &str) -> String {
    format!("{topic}.q")
}

/// Event family derived from the `event_name` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFamily {
    Geo,
    License,
    Session,
    Screen,
    Ui,
    System,
    /// No recognized prefix; staged on the raw firehose only
    Other,
}

impl EventFamily {
    /// Classify an event name by prefix
    pub fn from_event_name(event_name: &str) -> Self {
        if event_name.starts_with("geo.") {
            Self::Geo
        } else if event_name.starts_with("license.") {
            Self::License
        } else if event_name.starts_with("session.") {
            Self::Session
        } else if event_name.starts_with("screen.") {
            Self::Screen
        } else if event_name.starts_with("ui.") {
            Self::Ui
        } else if event_name.starts_with("system.") {
            Self::System
        } else {
            Self::Other
        }
    }

    /// The family's dedicated routing key, if any
    pub fn topic(&self) -> Option<&'static str> {
        match self {
            Self::Geo => Some(TOPIC_GEO),
            Self::License => Some(TOPIC_LICENSE),
            Self::Session => Some(TOPIC_SESSION),
            Self::Screen => Some(TOPIC_SCREEN),
            Self::Ui => Some(TOPIC_UI),
            Self::System => Some(TOPIC_SYSTEM),
            Self::Other => None,
        }
    }
}

/// Routing keys an accepted event is staged on: the raw firehose always,
/// plus the family topic when the prefix is recognized.
pub fn routing_keys(event_name: &str) -> Vec<&'static str> {
    let mut keys = vec![TOPIC_RAW];
    if let Some(topic) = EventFamily::from_event_name(event_name).topic() {
        keys.push(topic);
    }
    keys
}
