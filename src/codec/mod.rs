//! Codec Module
//!
//! Converts typed values to and from the bytes stored in an entry file.
//!
//! ## Responsibilities
//! - Frame every payload in a versioned, checksummed envelope
//! - Encode bodies as field-tagged maps so old/new struct shapes stay readable
//! - Reject null roots before anything touches the disk
//! - Route registered types through their custom serializer
//!
//! ## Envelope Format (V1)
//! ```text
//! ┌──────────┬──────────────┬──────────────────┬─────────────────┐
//! │Magic (4) │HeaderLen (4) │ Header (bincode) │      Body       │
//! └──────────┴──────────────┴──────────────────┴─────────────────┘
//!
//! Header: format_version | type_name | body_format | body_len | body_crc
//! ```
//!
//! ## Schema Drift
//! Structural bodies are MessagePack maps keyed by field name. Fields the
//! reader does not know are skipped; fields the writer did not know fall back
//! to `Default` when the target type is annotated with `#[serde(default)]`.

mod adapter;
mod envelope;
mod registry;

pub use adapter::Codec;
pub use envelope::{open_envelope, seal_envelope, BodyFormat, EnvelopeHeader};
pub use registry::{FnSerializer, SerializerRegistry, TypeSerializer};

/// Magic bytes at the start of every entry file
pub const MAGIC: &[u8; 4] = b"BKSF";

/// Current envelope format version
pub const FORMAT_VERSION: u16 = 1;

/// Magic + header length prefix
pub const PREFIX_SIZE: usize = 8;

/// Upper bound on the encoded header (guards against garbage lengths)
pub const MAX_HEADER_SIZE: usize = 4096;
