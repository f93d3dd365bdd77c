use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::node::{Links, Meta, ResourceNode};

/// A complete resource document: primary data plus the deduplicated
/// included side-table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub data: PrimaryData,
    /// Unique by identity; serialized only when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<ResourceNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Primary data, resolved by JSON shape: an object for a single resource,
/// an array for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    One(ResourceNode),
    Many(Vec<ResourceNode>),
}

impl Document {
    /// Serializes this document to JSON bytes.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Serializes this document to a writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        Ok(serde_json::to_writer(writer, self)?)
    }

    /// Converts this document into a generic JSON value tree.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a document from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Document> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parses a document from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Document> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Converts a generic JSON value tree into a document.
    pub fn from_value(value: Value) -> Result<Document> {
        Ok(serde_json::from_value(value)?)
    }
}
