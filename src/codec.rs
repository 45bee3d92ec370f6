//! Event codec: the single source of truth for the wire format.
//!
//! Events travel as a compact, human-readable key/value text blob in which
//! every string field appears as `key:"value"`. Enumerations (`status`) are
//! bare tokens and options are rendered `Some("…")`/`None`, so both stay
//! textually distinguishable from absent fields.
//!
//! Decoding is deliberately lenient: the shared inbound topic carries
//! traffic for every service, and a partial or garbled payload must never
//! take a consumer down. `decode` extracts whatever `key:"value"` pairs
//! parse cleanly and silently drops the rest.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Wire constants
// ============================================================================

/// Fixed semantic tag carried by every event of this protocol family.
pub const EVENT_NAME: &str = "user_registration";
/// Protocol schema version stamped on locally originated events.
pub const PROTOCOL_VERSION: &str = "v0.1.0";
/// Payload-shape version, independent of [`PROTOCOL_VERSION`].
pub const SCHEMA_VERSION: &str = "v0.1.0";

/// Wire key for the correlation id.
pub const KEY_CORRELATION_ID: &str = "uuid";
/// Wire key for the event family tag.
pub const KEY_EVENT_NAME: &str = "name";
/// Wire key for the addressee service name.
pub const KEY_SERVICE: &str = "service";
/// Wire key for the requested function.
pub const KEY_FUNCTION: &str = "function";
/// Wire key for the payload-shape version.
pub const KEY_SCHEMA: &str = "schema";
/// Wire key for the opaque payload.
pub const KEY_PAYLOAD: &str = "data";

// ============================================================================
// Event record
// ============================================================================

/// Operation identifier carried in an event.
///
/// The closed set a service understands is create/update/delete; anything
/// else decodes to `Unknown` and is observed rather than dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    Create,
    Update,
    Delete,
    /// Unrecognized operation, preserved verbatim for observability.
    Unknown(String),
}

impl Function {
    /// Parse a wire value into a function, mapping anything outside the
    /// closed set to `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "create" => Function::Create,
            "update" => Function::Update,
            "delete" => Function::Delete,
            other => Function::Unknown(other.to_string()),
        }
    }

    /// Wire representation.
    pub fn as_wire(&self) -> &str {
        match self {
            Function::Create => "create",
            Function::Update => "update",
            Function::Delete => "delete",
            Function::Unknown(other) => other,
        }
    }

    /// Whether this function is in the closed set the dispatcher acts on.
    pub fn is_known(&self) -> bool {
        !matches!(self, Function::Unknown(_))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Outcome reported by an event, relevant on acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    /// Wire representation: a bare token, not a quoted string.
    pub fn as_wire(&self) -> &str {
        match self {
            Status::Success => "Success",
            Status::Failure => "Failure",
        }
    }
}

/// One immutable message exchanged over the bus.
///
/// An event is constructed once, published once, and never mutated. The
/// `origin_service` field names the addressee used for local filtering,
/// not the network sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub correlation_id: String,
    pub event_name: String,
    pub version: Option<String>,
    pub origin_service: String,
    pub function: Function,
    pub status: Status,
    pub schema_version: String,
    pub payload: String,
}

impl Event {
    /// Build a freshly originated request event addressed to `service`.
    ///
    /// Mints a new correlation id; used by the trigger surface, where no
    /// caller-supplied id exists.
    pub fn request(service: impl Into<String>, function: Function) -> Self {
        Self::new(
            uuid::Uuid::new_v4().simple().to_string(),
            service,
            function,
        )
    }

    /// Build an acknowledgement event carrying the correlation id of the
    /// request that triggered it.
    pub fn acknowledgement(
        service: impl Into<String>,
        function: Function,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self::new(correlation_id, service, function)
    }

    fn new(
        correlation_id: impl Into<String>,
        service: impl Into<String>,
        function: Function,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            event_name: EVENT_NAME.to_string(),
            version: Some(PROTOCOL_VERSION.to_string()),
            origin_service: service.into(),
            function,
            status: Status::Success,
            schema_version: SCHEMA_VERSION.to_string(),
            payload: String::new(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event {{ uuid: {}, service: {}, function: {}, status: {} }}",
            self.correlation_id,
            self.origin_service,
            self.function,
            self.status.as_wire()
        )
    }
}

// ============================================================================
// Encode
// ============================================================================

/// Escape a value for embedding between wire quotes.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Encode an event into its wire text.
///
/// Deterministic: the same event always yields the same text. Every string
/// field is emitted as `key:"value"` with quotes and backslashes escaped.
pub fn encode(event: &Event) -> String {
    let version = match &event.version {
        Some(v) => format!("Some(\"{}\")", escape(v)),
        None => "None".to_string(),
    };
    format!(
        "({}:\"{}\",{}:\"{}\",version:{},process:Process({}:\"{}\",{}:\"{}\"),status:{},{}:\"{}\",{}:\"{}\")",
        KEY_CORRELATION_ID,
        escape(&event.correlation_id),
        KEY_EVENT_NAME,
        escape(&event.event_name),
        version,
        KEY_SERVICE,
        escape(&event.origin_service),
        KEY_FUNCTION,
        escape(event.function.as_wire()),
        event.status.as_wire(),
        KEY_SCHEMA,
        escape(&event.schema_version),
        KEY_PAYLOAD,
        escape(&event.payload),
    )
}

// ============================================================================
// Decode
// ============================================================================

/// Decoded field mapping extracted from wire text.
///
/// Unknown keys are preserved (forward compatible); repeated keys keep the
/// last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Correlation id, if one parsed.
    pub fn correlation_id(&self) -> Option<&str> {
        self.get(KEY_CORRELATION_ID)
    }

    /// Addressee service name, if one parsed.
    pub fn addressee(&self) -> Option<&str> {
        self.get(KEY_SERVICE)
    }

    /// Raw function value, if one parsed.
    pub fn function(&self) -> Option<&str> {
        self.get(KEY_FUNCTION)
    }
}

/// Decode wire text into a field mapping.
///
/// Never fails: extracts every `identifier:"value"` pair that parses
/// cleanly and ignores everything else, including dangling quotes at a
/// truncation point. Empty input yields an empty mapping.
pub fn decode(text: &str) -> Fields {
    let mut fields = BTreeMap::new();
    let mut chars = text.chars().peekable();
    let mut key = String::new();

    while let Some(c) = chars.next() {
        if c.is_ascii_alphanumeric() || c == '_' {
            key.push(c);
        } else if c == ':' && !key.is_empty() && chars.peek() == Some(&'"') {
            chars.next(); // opening quote
            if let Some(value) = scan_quoted(&mut chars) {
                fields.insert(std::mem::take(&mut key), value);
            } else {
                // Unterminated value: drop the dangling pair.
                key.clear();
            }
        } else {
            key.clear();
        }
    }

    Fields(fields)
}

/// Scan a quoted value up to its closing quote, honoring backslash
/// escapes. Returns `None` if the input ends first.
fn scan_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut value = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(value),
            '\\' => match chars.next() {
                Some(escaped) => value.push(escaped),
                None => return None,
            },
            other => value.push(other),
        }
    }
    None
}
