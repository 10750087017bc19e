//! GameProto - wire protocol layer for the farm backend
//!
//! This crate knows how bytes are shaped, not what they mean. It holds the
//! message-type catalogue, the schema registry built from it, the TLV field
//! codec, and the length/type/sequence frame format used on the socket.
//! Game semantics (plots, friends, tasks) live in the farmbot crate.
//!
//! # Modules
//!
//! - [`schema`] - message-type descriptors and the registry that owns them
//! - [`codec`] - encode/decode structured values against a descriptor
//! - [`frame`] - length/type/sequence framing over a byte stream
//! - [`catalogue`] - the embedded message catalogue for this one backend

pub mod catalogue;
pub mod codec;
pub mod frame;
pub mod schema;

// Re-export commonly used types
pub use catalogue::{DEFAULT_CATALOGUE, default_registry, msg};
pub use codec::{DecodeError, EncodeError, decode, encode};
pub use frame::{FRAME_HEADER_LEN, Frame, FrameError, MAX_FRAME_BYTES, encode_frame, read_frame, write_frame};
pub use schema::{Descriptor, FieldDescriptor, FieldKind, SchemaLoadError, SchemaRegistry, UnknownTypeError};
