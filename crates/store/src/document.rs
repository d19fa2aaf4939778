//! Documents as stored: a UUID key plus a JSON body.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::StoreError;

/// A document in a collection.
///
/// The store works with untyped JSON bodies; typed conversion happens at
/// the workflow boundary via [`Document::from_typed`] / [`Document::to_typed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub body: JsonValue,
}

impl Document {
    pub fn new(id: Uuid, body: JsonValue) -> Self {
        Self { id, body }
    }

    /// Build a document from a typed record.
    pub fn from_typed<T: Serialize>(id: Uuid, record: &T) -> Result<Self, StoreError> {
        let body = serde_json::to_value(record)
            .map_err(|e| StoreError::Serialization(format!("encoding document {id}: {e}")))?;
        Ok(Self { id, body })
    }

    /// Decode the body into a typed record.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| StoreError::Serialization(format!("decoding document {}: {e}", self.id)))
    }
}
