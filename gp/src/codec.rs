//! Encode/decode structured values against a message descriptor
//!
//! Payloads are a TLV sequence: `[tag u8][len u16 LE][bytes]` for every
//! present field. Integers are little-endian fixed width, strings UTF-8,
//! lists carry a `u16` element count followed by length-prefixed elements,
//! and nested messages embed the nested payload bytes. Unknown tags are
//! skipped on decode so newer servers can add fields; required fields are
//! enforced strictly in both directions.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Descriptor, FieldDescriptor, FieldKind, SchemaRegistry, UnknownTypeError};

/// Errors from serializing a value against a descriptor
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),

    #[error("message {message} expects an object value")]
    NotAnObject { message: String },

    #[error("message {message} is missing required field {field}")]
    MissingField { message: String, field: String },

    #[error("message {message} field {field} is not a {expected}")]
    WrongType {
        message: String,
        field: String,
        expected: &'static str,
    },

    #[error("message {message} field {field} is out of range for its wire type")]
    OutOfRange { message: String, field: String },

    #[error("message {message} field {field} exceeds the per-field size limit")]
    Oversize { message: String, field: String },
}

/// Errors from reconstructing a value from payload bytes
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    UnknownType(#[from] UnknownTypeError),

    #[error("message {message} payload is truncated")]
    Truncated { message: String },

    #[error("message {message} is missing required field {field}")]
    MissingField { message: String, field: String },

    #[error("message {message} field {field} has wire length {got}, expected {expected}")]
    WrongLength {
        message: String,
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("message {message} field {field} is not valid UTF-8")]
    InvalidUtf8 { message: String, field: String },

    #[error("message {message} field {field} is not a valid bool byte")]
    InvalidBool { message: String, field: String },
}

/// Serialize `value` as the named message's payload
pub fn encode(registry: &SchemaRegistry, name: &str, value: &Value) -> Result<Vec<u8>, EncodeError> {
    let descriptor = registry.describe(name)?;
    encode_message(registry, descriptor, value)
}

/// Reconstruct the named message's structured value from payload bytes
pub fn decode(registry: &SchemaRegistry, name: &str, payload: &[u8]) -> Result<Value, DecodeError> {
    let descriptor = registry.describe(name)?;
    decode_message(registry, descriptor, payload)
}

fn encode_message(registry: &SchemaRegistry, descriptor: &Descriptor, value: &Value) -> Result<Vec<u8>, EncodeError> {
    let object = value.as_object().ok_or_else(|| EncodeError::NotAnObject {
        message: descriptor.name().to_string(),
    })?;

    let mut out = Vec::new();
    for field in descriptor.fields() {
        match object.get(&field.name) {
            Some(Value::Null) | None => {
                if field.required {
                    return Err(EncodeError::MissingField {
                        message: descriptor.name().to_string(),
                        field: field.name.clone(),
                    });
                }
            }
            Some(present) => {
                let bytes = encode_field(registry, descriptor, field, present)?;
                if bytes.len() > u16::MAX as usize {
                    return Err(EncodeError::Oversize {
                        message: descriptor.name().to_string(),
                        field: field.name.clone(),
                    });
                }
                out.push(field.tag);
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(&bytes);
            }
        }
    }
    Ok(out)
}

fn encode_field(
    registry: &SchemaRegistry,
    descriptor: &Descriptor,
    field: &FieldDescriptor,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    let wrong_type = || EncodeError::WrongType {
        message: descriptor.name().to_string(),
        field: field.name.clone(),
        expected: field.kind.label(),
    };
    let out_of_range = || EncodeError::OutOfRange {
        message: descriptor.name().to_string(),
        field: field.name.clone(),
    };

    match &field.kind {
        FieldKind::Bool => {
            let b = value.as_bool().ok_or_else(wrong_type)?;
            Ok(vec![u8::from(b)])
        }
        FieldKind::U8 => {
            let n = value.as_u64().ok_or_else(wrong_type)?;
            let n = u8::try_from(n).map_err(|_| out_of_range())?;
            Ok(vec![n])
        }
        FieldKind::U16 => {
            let n = value.as_u64().ok_or_else(wrong_type)?;
            let n = u16::try_from(n).map_err(|_| out_of_range())?;
            Ok(n.to_le_bytes().to_vec())
        }
        FieldKind::U32 => {
            let n = value.as_u64().ok_or_else(wrong_type)?;
            let n = u32::try_from(n).map_err(|_| out_of_range())?;
            Ok(n.to_le_bytes().to_vec())
        }
        FieldKind::U64 => {
            let n = value.as_u64().ok_or_else(wrong_type)?;
            Ok(n.to_le_bytes().to_vec())
        }
        FieldKind::I64 => {
            let n = value.as_i64().ok_or_else(wrong_type)?;
            Ok(n.to_le_bytes().to_vec())
        }
        FieldKind::Str => {
            let s = value.as_str().ok_or_else(wrong_type)?;
            Ok(s.as_bytes().to_vec())
        }
        FieldKind::List { item } => {
            let elements = value.as_array().ok_or_else(wrong_type)?;
            let count = u16::try_from(elements.len()).map_err(|_| out_of_range())?;

            let element_field = FieldDescriptor {
                tag: field.tag,
                name: field.name.clone(),
                kind: (**item).clone(),
                required: true,
            };

            let mut out = count.to_le_bytes().to_vec();
            for element in elements {
                let bytes = encode_field(registry, descriptor, &element_field, element)?;
                if bytes.len() > u16::MAX as usize {
                    return Err(EncodeError::Oversize {
                        message: descriptor.name().to_string(),
                        field: field.name.clone(),
                    });
                }
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(&bytes);
            }
            Ok(out)
        }
        FieldKind::Msg { name } => {
            let nested = registry.describe(name)?;
            encode_message(registry, nested, value)
        }
    }
}

fn decode_message(registry: &SchemaRegistry, descriptor: &Descriptor, payload: &[u8]) -> Result<Value, DecodeError> {
    let truncated = || DecodeError::Truncated {
        message: descriptor.name().to_string(),
    };

    // First pass: scan the TLV sequence. First occurrence of a tag wins;
    // tags not in the descriptor are skipped for forward compatibility.
    let mut raw: Vec<(u8, &[u8])> = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() {
        if payload.len() - pos < 3 {
            return Err(truncated());
        }
        let tag = payload[pos];
        let len = u16::from_le_bytes([payload[pos + 1], payload[pos + 2]]) as usize;
        pos += 3;
        if payload.len() - pos < len {
            return Err(truncated());
        }
        if !raw.iter().any(|(t, _)| *t == tag) {
            raw.push((tag, &payload[pos..pos + len]));
        }
        pos += len;
    }

    let mut object = Map::new();
    for field in descriptor.fields() {
        match raw.iter().find(|(tag, _)| *tag == field.tag) {
            Some((_, bytes)) => {
                let value = decode_field(registry, descriptor, field, bytes)?;
                object.insert(field.name.clone(), value);
            }
            None => {
                if field.required {
                    return Err(DecodeError::MissingField {
                        message: descriptor.name().to_string(),
                        field: field.name.clone(),
                    });
                }
            }
        }
    }
    Ok(Value::Object(object))
}

fn decode_field(
    registry: &SchemaRegistry,
    descriptor: &Descriptor,
    field: &FieldDescriptor,
    bytes: &[u8],
) -> Result<Value, DecodeError> {
    let wrong_length = |expected: usize| DecodeError::WrongLength {
        message: descriptor.name().to_string(),
        field: field.name.clone(),
        expected,
        got: bytes.len(),
    };

    match &field.kind {
        FieldKind::Bool => match bytes {
            [0] => Ok(Value::Bool(false)),
            [1] => Ok(Value::Bool(true)),
            [_] => Err(DecodeError::InvalidBool {
                message: descriptor.name().to_string(),
                field: field.name.clone(),
            }),
            _ => Err(wrong_length(1)),
        },
        FieldKind::U8 => match bytes {
            [n] => Ok(Value::from(u64::from(*n))),
            _ => Err(wrong_length(1)),
        },
        FieldKind::U16 => {
            let arr: [u8; 2] = bytes.try_into().map_err(|_| wrong_length(2))?;
            Ok(Value::from(u64::from(u16::from_le_bytes(arr))))
        }
        FieldKind::U32 => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| wrong_length(4))?;
            Ok(Value::from(u64::from(u32::from_le_bytes(arr))))
        }
        FieldKind::U64 => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| wrong_length(8))?;
            Ok(Value::from(u64::from_le_bytes(arr)))
        }
        FieldKind::I64 => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| wrong_length(8))?;
            Ok(Value::from(i64::from_le_bytes(arr)))
        }
        FieldKind::Str => {
            let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
                message: descriptor.name().to_string(),
                field: field.name.clone(),
            })?;
            Ok(Value::String(s.to_string()))
        }
        FieldKind::List { item } => {
            let truncated = || DecodeError::Truncated {
                message: descriptor.name().to_string(),
            };
            if bytes.len() < 2 {
                return Err(truncated());
            }
            let count = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;

            let element_field = FieldDescriptor {
                tag: field.tag,
                name: field.name.clone(),
                kind: (**item).clone(),
                required: true,
            };

            let mut elements = Vec::with_capacity(count.min(1024));
            let mut pos = 2usize;
            for _ in 0..count {
                if bytes.len() - pos < 2 {
                    return Err(truncated());
                }
                let len = u16::from_le_bytes([bytes[pos], bytes[pos + 1]]) as usize;
                pos += 2;
                if bytes.len() - pos < len {
                    return Err(truncated());
                }
                elements.push(decode_field(registry, descriptor, &element_field, &bytes[pos..pos + len])?);
                pos += len;
            }
            Ok(Value::Array(elements))
        }
        FieldKind::Msg { name } => {
            let nested = registry.describe(name)?;
            decode_message(registry, nested, bytes)
        }
    }
}
