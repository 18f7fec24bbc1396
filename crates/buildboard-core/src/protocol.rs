//! Push-feed line protocol.
//!
//! Every SSE message carries one frame: up to three newline-separated
//! segments `type`, `execution id` and `payload`. Only the first two newlines
//! split; the payload keeps any further newlines verbatim.
//!
//! `execution_update` payloads are JSON arrays of slot records:
//!
//! ```text
//! [{"I": "slot id", "T": "slot title", "M": mode, "S": status, "R": run state, "O": Operation|null}]
//! ```

use std::fmt;

use serde::Deserialize;
use serde::de::{self, Deserializer, Visitor};

/// A decoded protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    ExecutionCreate {
        id: String,
        title: String,
    },
    ExecutionDestroy {
        id: String,
    },
    ExecutionLog {
        id: String,
        level: char,
        message: String,
    },
    /// The payload stays undecoded until the target execution is known to
    /// exist; updates for unknown executions are dropped without parsing.
    ExecutionUpdate {
        id: String,
        payload: String,
    },
    /// Log frame with an empty payload (no level character).
    EmptyLog {
        id: String,
    },
    Unknown {
        kind: String,
    },
}

impl Frame {
    /// Splits a message into its segments and classifies it.
    ///
    /// Missing segments are treated as empty strings.
    pub fn parse(data: &str) -> Self {
        let mut segments = data.splitn(3, '\n');
        let kind = segments.next().unwrap_or_default();
        let id = segments.next().unwrap_or_default().to_string();
        let payload = segments.next().unwrap_or_default();

        match kind {
            "execution_create" => Frame::ExecutionCreate {
                id,
                title: payload.to_string(),
            },
            "execution_destroy" => Frame::ExecutionDestroy { id },
            "execution_log" => {
                let mut chars = payload.chars();
                match chars.next() {
                    Some(level) => Frame::ExecutionLog {
                        id,
                        level,
                        message: chars.as_str().to_string(),
                    },
                    None => Frame::EmptyLog { id },
                }
            }
            "execution_update" => Frame::ExecutionUpdate {
                id,
                payload: payload.to_string(),
            },
            other => Frame::Unknown {
                kind: other.to_string(),
            },
        }
    }
}

/// Errors raised while decoding a single frame.
#[derive(Debug)]
pub enum FrameError {
    /// The `execution_update` payload was not a valid slot record list.
    MalformedUpdate {
        execution_id: String,
        source: serde_json::Error,
    },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MalformedUpdate {
                execution_id,
                source,
            } => write!(
                f,
                "malformed execution_update payload for {execution_id}: {source}"
            ),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::MalformedUpdate { source, .. } => Some(source),
        }
    }
}

/// Decodes an `execution_update` payload in full.
///
/// Nothing is applied unless the whole payload decodes, so a malformed frame
/// never leaves an execution partially updated.
///
/// # Errors
/// Returns `FrameError::MalformedUpdate` if the payload is not a JSON array of
/// slot records.
pub fn decode_slot_updates(
    execution_id: &str,
    payload: &str,
) -> Result<Vec<SlotRecord>, FrameError> {
    serde_json::from_str(payload).map_err(|source| FrameError::MalformedUpdate {
        execution_id: execution_id.to_string(),
        source,
    })
}

/// One entry of an `execution_update` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SlotRecord {
    #[serde(rename = "I")]
    pub id: Tag,
    #[serde(rename = "T", default)]
    pub title: Tag,
    #[serde(rename = "M", default)]
    pub mode: Tag,
    #[serde(rename = "S", default)]
    pub status: Tag,
    #[serde(rename = "R", default)]
    pub run_state: Tag,
    #[serde(rename = "O", default)]
    pub operation: Option<Operation>,
}

/// Description of the work currently happening in a slot.
///
/// Replaced wholesale on every update; fields are never merged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Operation {
    pub short_description: Option<String>,
    pub long_description: Option<String>,
    pub statement_message: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub statement_stalled: bool,
    pub async_title: Option<String>,
    pub percent_complete: Option<f64>,
    pub statement_percent_complete: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub background_operations: Vec<Option<Operation>>,
}

impl Operation {
    /// An operation without a short description is empty and never shown.
    pub fn is_visible(&self) -> bool {
        self.short_description
            .as_deref()
            .is_some_and(|text| !text.is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Opaque classification value (slot id, mode, status, run state).
///
/// The feed sends these as strings or numbers; both are kept in string form.
/// `null` decodes as the empty tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub String);

impl Tag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(value: &str) -> Self {
        Tag(value.to_string())
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TagVisitor;

        impl Visitor<'_> for TagVisitor {
            type Value = Tag;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, number, boolean or null")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Tag, E> {
                Ok(Tag(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Tag, E> {
                Ok(Tag(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tag, E> {
                Ok(Tag(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tag, E> {
                Ok(Tag(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Tag, E> {
                Ok(Tag(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Tag, E> {
                Ok(Tag(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Tag, E> {
                Ok(Tag::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<Tag, E> {
                Ok(Tag::default())
            }
        }

        deserializer.deserialize_any(TagVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_keeps_payload_newlines() {
        let frame = Frame::parse("execution_create\n42\nNightly\nbuild");
        assert_eq!(
            frame,
            Frame::ExecutionCreate {
                id: "42".to_string(),
                title: "Nightly\nbuild".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_missing_segments_are_empty() {
        assert_eq!(
            Frame::parse("execution_destroy"),
            Frame::ExecutionDestroy { id: String::new() }
        );
        assert_eq!(
            Frame::parse("execution_create\n7"),
            Frame::ExecutionCreate {
                id: "7".to_string(),
                title: String::new(),
            }
        );
    }

    #[test]
    fn test_parse_log_splits_level_character() {
        let frame = Frame::parse("execution_log\n1\nWdisk almost full");
        assert_eq!(
            frame,
            Frame::ExecutionLog {
                id: "1".to_string(),
                level: 'W',
                message: "disk almost full".to_string(),
            }
        );
        assert_eq!(
            Frame::parse("execution_log\n1\n"),
            Frame::EmptyLog {
                id: "1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let frame = Frame::parse("heartbeat\n\n");
        assert_eq!(
            frame,
            Frame::Unknown {
                kind: "heartbeat".to_string()
            }
        );
    }

    #[test]
    fn test_decode_slot_updates_accepts_numeric_tags() {
        let payload = r#"[{"I":3,"T":"Deploy","M":1,"S":"Running","R":null,"O":null}]"#;
        let records = decode_slot_updates("1", payload).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_str(), "3");
        assert_eq!(records[0].title.as_str(), "Deploy");
        assert_eq!(records[0].mode.as_str(), "1");
        assert_eq!(records[0].status.as_str(), "Running");
        assert!(records[0].run_state.is_empty());
        assert!(records[0].operation.is_none());
    }

    #[test]
    fn test_decode_nested_operation() {
        let payload = r#"[{"I":"a","T":"Build","M":"m","S":"s","R":"r","O":{
            "ShortDescription":"Compiling",
            "StatementStalled":null,
            "PercentComplete":40,
            "BackgroundOperations":[null,{"ShortDescription":"Fetching","BackgroundOperations":null}]
        }}]"#;
        let records = decode_slot_updates("1", payload).unwrap();
        let op = records[0].operation.as_ref().unwrap();
        assert_eq!(op.short_description.as_deref(), Some("Compiling"));
        assert!(!op.statement_stalled);
        assert_eq!(op.percent_complete, Some(40.0));
        assert_eq!(op.statement_percent_complete, None);
        assert_eq!(op.background_operations.len(), 2);
        assert!(op.background_operations[0].is_none());
        let child = op.background_operations[1].as_ref().unwrap();
        assert_eq!(child.short_description.as_deref(), Some("Fetching"));
        assert!(child.background_operations.is_empty());
    }

    #[test]
    fn test_decode_malformed_payload() {
        let err = decode_slot_updates("9", "{not json").unwrap_err();
        assert!(matches!(err, FrameError::MalformedUpdate { ref execution_id, .. } if execution_id == "9"));
        assert!(err.to_string().contains("malformed execution_update payload for 9"));
    }

    #[test]
    fn test_operation_visibility() {
        let mut op = Operation::default();
        assert!(!op.is_visible());
        op.short_description = Some(String::new());
        assert!(!op.is_visible());
        op.short_description = Some("Running tests".to_string());
        assert!(op.is_visible());
    }
}
