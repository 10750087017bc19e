//! Message-type descriptors and the registry that owns them
//!
//! The registry is built whole from a JSON catalogue source and is immutable
//! afterwards. A failed load returns an error and leaves nothing behind;
//! "re-loading" is building a new registry value and swapping the `Arc`.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while parsing and validating a catalogue source
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("catalogue is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("messages {first} and {second} share wire id {id}")]
    DuplicateWireId { id: u16, first: String, second: String },

    #[error("message {message} declares field tag {tag} twice")]
    DuplicateTag { message: String, tag: u8 },

    #[error("message {message} field {field} references undefined type {referenced}")]
    UndefinedReference {
        message: String,
        field: String,
        referenced: String,
    },
}

/// Lookup failure for a message type that is not in the registry
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown message type: {0}")]
pub struct UnknownTypeError(pub String);

/// Wire type of a single field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I64,
    Str,
    /// Homogeneous list of the inner kind
    List { item: Box<FieldKind> },
    /// Nested message encoded with the named descriptor
    Msg { name: String },
}

impl FieldKind {
    /// Human-readable kind name for error messages
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Bool => "bool",
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::I64 => "i64",
            FieldKind::Str => "str",
            FieldKind::List { .. } => "list",
            FieldKind::Msg { .. } => "msg",
        }
    }
}

/// One field of a message layout
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDescriptor {
    /// Wire tag, unique within the message
    pub tag: u8,

    /// Field name as it appears in structured values
    pub name: String,

    /// Wire type
    pub kind: FieldKind,

    /// Whether decode fails when the field is absent
    #[serde(default)]
    pub required: bool,
}

/// Layout of one message type
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    wire_id: u16,
    fields: Vec<FieldDescriptor>,
}

impl Descriptor {
    /// Message name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric id carried in the frame header
    pub fn wire_id(&self) -> u16 {
        self.wire_id
    }

    /// Fields in declared order
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Find a field by its wire tag
    pub fn field_by_tag(&self, tag: u8) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.tag == tag)
    }
}

/// Raw catalogue shape as parsed from JSON
#[derive(Debug, Deserialize)]
struct RawCatalogue {
    // BTreeMap keeps validation order deterministic
    messages: BTreeMap<String, RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: u16,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

/// Immutable table of message descriptors keyed by name and wire id
#[derive(Debug)]
pub struct SchemaRegistry {
    by_name: HashMap<String, Descriptor>,
    id_to_name: HashMap<u16, String>,
}

impl SchemaRegistry {
    /// Parse and validate a catalogue source
    ///
    /// The whole table is built and cross-checked before the registry value
    /// exists, so a failed load cannot leave a half-applied table.
    pub fn load(source: &str) -> Result<Self, SchemaLoadError> {
        let raw: RawCatalogue = serde_json::from_str(source)?;

        let mut by_name = HashMap::with_capacity(raw.messages.len());
        let mut id_to_name: HashMap<u16, String> = HashMap::with_capacity(raw.messages.len());

        for (name, message) in &raw.messages {
            if let Some(first) = id_to_name.get(&message.id) {
                return Err(SchemaLoadError::DuplicateWireId {
                    id: message.id,
                    first: first.clone(),
                    second: name.clone(),
                });
            }
            id_to_name.insert(message.id, name.clone());

            let mut seen_tags = Vec::with_capacity(message.fields.len());
            for field in &message.fields {
                if seen_tags.contains(&field.tag) {
                    return Err(SchemaLoadError::DuplicateTag {
                        message: name.clone(),
                        tag: field.tag,
                    });
                }
                seen_tags.push(field.tag);
                check_references(name, &field.name, &field.kind, &raw.messages)?;
            }

            by_name.insert(
                name.clone(),
                Descriptor {
                    name: name.clone(),
                    wire_id: message.id,
                    fields: message.fields.clone(),
                },
            );
        }

        Ok(Self { by_name, id_to_name })
    }

    /// Look up a descriptor by message name
    pub fn describe(&self, name: &str) -> Result<&Descriptor, UnknownTypeError> {
        self.by_name
            .get(name)
            .ok_or_else(|| UnknownTypeError(name.to_string()))
    }

    /// Look up a descriptor by the wire id carried in a frame header
    pub fn describe_id(&self, wire_id: u16) -> Result<&Descriptor, UnknownTypeError> {
        let name = self
            .id_to_name
            .get(&wire_id)
            .ok_or_else(|| UnknownTypeError(format!("wire id {wire_id}")))?;
        self.describe(name)
    }

    /// Wire id for a message name
    pub fn wire_id(&self, name: &str) -> Result<u16, UnknownTypeError> {
        self.describe(name).map(Descriptor::wire_id)
    }

    /// Number of registered message types
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when the registry holds no descriptors
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Walk a field kind and verify every nested message reference exists
fn check_references(
    message: &str,
    field: &str,
    kind: &FieldKind,
    messages: &BTreeMap<String, RawMessage>,
) -> Result<(), SchemaLoadError> {
    match kind {
        FieldKind::Msg { name } => {
            if !messages.contains_key(name) {
                return Err(SchemaLoadError::UndefinedReference {
                    message: message.to_string(),
                    field: field.to_string(),
                    referenced: name.clone(),
                });
            }
            Ok(())
        }
        FieldKind::List { item } => check_references(message, field, item, messages),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: &str) -> Result<SchemaRegistry, SchemaLoadError> {
        SchemaRegistry::load(source)
    }

    #[test]
    fn test_load_minimal_catalogue() {
        let registry = load(
            r#"{
                "messages": {
                    "Ping": { "id": 1, "fields": [ { "tag": 1, "name": "nonce", "kind": "u32", "required": true } ] },
                    "Pong": { "id": 2 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        let ping = registry.describe("Ping").unwrap();
        assert_eq!(ping.wire_id(), 1);
        assert_eq!(ping.fields().len(), 1);
        assert_eq!(registry.describe_id(2).unwrap().name(), "Pong");
        assert_eq!(registry.wire_id("Pong").unwrap(), 2);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let err = load("{ not json").unwrap_err();
        assert!(matches!(err, SchemaLoadError::Parse(_)));
    }

    #[test]
    fn test_load_rejects_duplicate_wire_id() {
        let err = load(
            r#"{ "messages": { "A": { "id": 7 }, "B": { "id": 7 } } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaLoadError::DuplicateWireId { id: 7, .. }));
    }

    #[test]
    fn test_load_rejects_duplicate_tag() {
        let err = load(
            r#"{
                "messages": {
                    "A": {
                        "id": 1,
                        "fields": [
                            { "tag": 1, "name": "x", "kind": "u8" },
                            { "tag": 1, "name": "y", "kind": "u8" }
                        ]
                    }
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaLoadError::DuplicateTag { tag: 1, .. }));
    }

    #[test]
    fn test_load_rejects_undefined_nested_reference() {
        let err = load(
            r#"{
                "messages": {
                    "A": {
                        "id": 1,
                        "fields": [ { "tag": 1, "name": "inner", "kind": { "msg": { "name": "Missing" } } } ]
                    }
                }
            }"#,
        )
        .unwrap_err();
        match err {
            SchemaLoadError::UndefinedReference { referenced, .. } => assert_eq!(referenced, "Missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_checks_references_inside_lists() {
        let err = load(
            r#"{
                "messages": {
                    "A": {
                        "id": 1,
                        "fields": [
                            { "tag": 1, "name": "inner", "kind": { "list": { "item": { "msg": { "name": "Gone" } } } } }
                        ]
                    }
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaLoadError::UndefinedReference { .. }));
    }

    #[test]
    fn test_describe_unknown_name() {
        let registry = load(r#"{ "messages": {} }"#).unwrap();
        assert!(registry.is_empty());
        let err = registry.describe("Nope").unwrap_err();
        assert_eq!(err, UnknownTypeError("Nope".to_string()));
        assert!(registry.describe_id(99).is_err());
    }
}
