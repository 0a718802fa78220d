//! Object registry module
//!
//! This module provides:
//! - `ObjectRegistry`, a concurrent id → object store
//! - `Blueprint` constructors for every storable kind
//! - Payload handling: reference resolution and key unflattening

mod payload;
mod store;
mod types;

pub use payload::{Payload, PayloadError, PayloadNode, PayloadValue, RawPayload, RawValue};
pub use store::{Blueprint, ObjectRegistry, RegistryDefaults, line_annotation};
pub use types::{ObjectDescriptor, ObjectKind, RegistryError, StoredObject};
