//! Transaction log events
//!
//! Defines the record for a single store mutation and its line encoding.
//!
//! ## Line Format
//! ```text
//! <sequence>\t<event type>\t<key>\t<value>\n
//! ```
//! Key and value are escaped so a raw tab or newline only ever appears as a
//! delimiter: `\` → `\\`, TAB → `\t`, LF → `\n`, CR → `\r`.

use std::fmt;

use thiserror::Error;

/// Field delimiter within a record line
pub const FIELD_DELIMITER: char = '\t';

/// Number of fields in every record line
pub const FIELD_COUNT: usize = 4;

/// Kind of mutation recorded by an event
///
/// Zero is reserved and never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    Delete = 1,
    Put = 2,
}

impl EventType {
    /// The numeric code written to the log
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EventType {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(EventType::Delete),
            2 => Ok(EventType::Put),
            other => Err(DecodeError::InvalidEventType(other.to_string())),
        }
    }
}

/// Why a record line could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid sequence number {0:?}")]
    InvalidSequence(String),

    #[error("invalid event type {0:?}")]
    InvalidEventType(String),

    #[error("empty key")]
    EmptyKey,

    #[error("invalid escape sequence in {0:?}")]
    InvalidEscape(String),

    #[error("record is not valid UTF-8")]
    InvalidUtf8,
}

/// A single mutation in the transaction log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Sequence number, strictly increasing within one log file.
    /// Zero until the log writer assigns one.
    pub sequence: u64,

    /// The action taken
    pub event_type: EventType,

    /// The key affected
    pub key: String,

    /// The value written by a put; empty for a delete
    pub value: String,
}

impl Event {
    /// A put that has not been assigned a sequence number yet
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            event_type: EventType::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// A delete that has not been assigned a sequence number yet
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            event_type: EventType::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Encode as one newline-terminated record
    pub fn encode(&self) -> String {
        let mut line = String::with_capacity(24 + self.key.len() + self.value.len());
        self.encode_into(&mut line);
        line
    }

    /// Append the newline-terminated record to `buf`
    pub fn encode_into(&self, buf: &mut String) {
        use std::fmt::Write;

        // Writing into a String cannot fail.
        let _ = write!(
            buf,
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}",
            self.sequence,
            self.event_type.code()
        );
        escape_into(&self.key, buf);
        buf.push(FIELD_DELIMITER);
        if self.event_type == EventType::Put {
            escape_into(&self.value, buf);
        }
        buf.push('\n');
    }

    /// Decode one record. A single trailing `\n` is ignored.
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let line = line.strip_suffix('\n').unwrap_or(line);

        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != FIELD_COUNT {
            return Err(DecodeError::FieldCount(fields.len()));
        }

        let sequence = fields[0]
            .parse::<u64>()
            .map_err(|_| DecodeError::InvalidSequence(fields[0].to_string()))?;

        let event_type = fields[1]
            .parse::<u8>()
            .map_err(|_| DecodeError::InvalidEventType(fields[1].to_string()))
            .and_then(EventType::try_from)?;

        let key = unescape(fields[2])?;
        if key.is_empty() {
            return Err(DecodeError::EmptyKey);
        }

        let value = match event_type {
            EventType::Put => unescape(fields[3])?,
            EventType::Delete => String::new(),
        };

        Ok(Self {
            sequence,
            event_type,
            key,
            value,
        })
    }

    /// Decode one record from raw bytes
    pub fn decode_bytes(line: &[u8]) -> Result<Self, DecodeError> {
        let line = std::str::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8)?;
        Self::decode(line)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event_type {
            EventType::Put => write!(f, "#{} put {:?}={:?}", self.sequence, self.key, self.value),
            EventType::Delete => write!(f, "#{} delete {:?}", self.sequence, self.key),
        }
    }
}

fn escape_into(field: &str, buf: &mut String) {
    for c in field.chars() {
        match c {
            '\\' => buf.push_str("\\\\"),
            '\t' => buf.push_str("\\t"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            c => buf.push(c),
        }
    }
}

fn unescape(field: &str) -> Result<String, DecodeError> {
    if !field.contains('\\') {
        return Ok(field.to_string());
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            _ => return Err(DecodeError::InvalidEscape(field.to_string())),
        }
    }
    Ok(out)
}
