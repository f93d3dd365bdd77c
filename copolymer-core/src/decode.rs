use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::directive::{Role, TimeFormat, ISO8601_FORMAT};
use crate::document::{Document, PrimaryData};
use crate::error::{ConfigError, Error, Result};
use crate::layout::{layout_for, Entry, Layout};
use crate::node::{RelationshipData, ResourceIdentity, ResourceNode};
use crate::resource::{Resource, WireId};

/// Decodes a single-resource document into a record.
pub fn from_document<R: Resource + Default>(document: &Document) -> Result<R> {
    let PrimaryData::One(node) = &document.data else {
        return Err(Error::ShapeMismatch(
            "expected single-resource primary data, found a collection".to_string(),
        ));
    };
    let mut decoder = Decoder::new(&document.included);
    let mut record = R::default();
    decoder.populate(node, &mut record)?;
    Ok(record)
}

/// Decodes a collection document into a list of records, in document order.
pub fn from_document_many<R: Resource + Default>(document: &Document) -> Result<Vec<R>> {
    let PrimaryData::Many(nodes) = &document.data else {
        return Err(Error::ShapeMismatch(
            "expected collection primary data, found a single resource".to_string(),
        ));
    };
    let mut decoder = Decoder::new(&document.included);
    let mut records = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mut record = R::default();
        decoder.populate(node, &mut record)?;
        records.push(record);
    }
    Ok(records)
}

/// Parses JSON bytes and decodes the single resource they carry.
pub fn from_slice<R: Resource + Default>(bytes: &[u8]) -> Result<R> {
    from_document(&Document::from_slice(bytes)?)
}

/// Parses a JSON stream and decodes the single resource it carries.
pub fn from_reader<R: Resource + Default>(reader: impl Read) -> Result<R> {
    from_document(&Document::from_reader(reader)?)
}

/// Parses JSON bytes and decodes the collection they carry.
pub fn from_slice_many<R: Resource + Default>(bytes: &[u8]) -> Result<Vec<R>> {
    from_document_many(&Document::from_slice(bytes)?)
}

/// Parses a JSON stream and decodes the collection it carries.
pub fn from_reader_many<R: Resource + Default>(reader: impl Read) -> Result<Vec<R>> {
    from_document_many(&Document::from_reader(reader)?)
}

/// Per-call decoding state: the document's included side-table indexed by
/// identity and the chain of identities currently being populated.
struct Decoder<'doc> {
    included: HashMap<ResourceIdentity, &'doc ResourceNode>,
    in_flight: Vec<ResourceIdentity>,
}

impl<'doc> Decoder<'doc> {
    fn new(included: &'doc [ResourceNode]) -> Self {
        Decoder {
            included: included
                .iter()
                .map(|node| (node.identity(), node))
                .collect(),
            in_flight: Vec::new(),
        }
    }

    fn populate(&mut self, node: &ResourceNode, record: &mut dyn Resource) -> Result<()> {
        let layout = layout_for(record)?;
        if node.kind != layout.resource_type {
            return Err(Error::ShapeMismatch(format!(
                "document resource type `{}` does not match `{}`",
                node.kind, layout.resource_type
            )));
        }

        self.in_flight.push(node.identity());
        let mut source = FieldSource {
            layout,
            node,
            decoder: self,
            cursor: 0,
        };
        let outcome = record
            .populate_fields(&mut source)
            .and_then(|()| source.finish());
        self.in_flight.pop();
        outcome
    }

    /// Populates a relation target from its identity.
    ///
    /// A target carried in the included side-table gets its full node; an
    /// identity without a sideloaded body, or one already on the population
    /// chain, yields a stub carrying only type and id.
    fn resolve_identity(
        &mut self,
        identity: &ResourceIdentity,
        record: &mut dyn Resource,
    ) -> Result<()> {
        match self.included.get(identity).copied() {
            Some(node) if !self.in_flight.contains(identity) => self.populate(node, record),
            _ => {
                let stub = ResourceNode {
                    kind: identity.kind.clone(),
                    id: identity.id.clone(),
                    ..ResourceNode::default()
                };
                self.populate(&stub, record)
            }
        }
    }
}

/// The ordered field-population handshake of the decode path.
///
/// A record's `populate_fields` makes one call per layout entry, in order;
/// each call pulls the corresponding wire member out of the node and writes
/// it into the record's field. A member absent from the document leaves the
/// field at its prior value.
pub struct FieldSource<'a, 'doc> {
    layout: Arc<Layout>,
    node: &'a ResourceNode,
    decoder: &'a mut Decoder<'doc>,
    cursor: usize,
}

impl FieldSource<'_, '_> {
    /// Parses the node's wire `id` into the primary-key field.
    pub fn id<T: WireId>(&mut self, out: &mut T) -> Result<()> {
        self.advance(Role::PrimaryKey, None)?;
        if self.node.id.is_empty() {
            return Ok(());
        }
        *out = T::from_wire(&self.node.id)?;
        Ok(())
    }

    /// Parses the node's `client-id` member, if present.
    pub fn client_id<T: WireId>(&mut self, out: &mut T) -> Result<()> {
        self.advance(Role::ClientId, None)?;
        match self.node.client_id.as_deref() {
            Some(raw) if !raw.is_empty() => {
                *out = T::from_wire(raw)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Deserializes an attribute value into the field.
    pub fn attr<T: DeserializeOwned>(&mut self, out: &mut T) -> Result<()> {
        let index = self.advance(Role::Attribute, None)?;
        let entry = &self.layout.entries[index];
        let Some(value) = self.node.attributes.get(&entry.directive.wire_name) else {
            return Ok(());
        };
        *out = serde_json::from_value(value.clone()).map_err(|err| Error::ValueCoercion {
            field: format!("{}.{}", entry.type_name, entry.ident),
            key: entry.directive.wire_name.clone(),
            reason: err.to_string(),
        })?;
        Ok(())
    }

    /// Parses a timestamp attribute into the field.
    pub fn time(&mut self, out: &mut DateTime<Utc>) -> Result<()> {
        let index = self.advance(Role::Attribute, None)?;
        let entry = &self.layout.entries[index];
        let Some(value) = self.node.attributes.get(&entry.directive.wire_name) else {
            return Ok(());
        };
        *out = parse_time(entry, value)?;
        Ok(())
    }

    /// Parses an optional timestamp attribute; an explicit `null` clears it.
    pub fn time_opt(&mut self, out: &mut Option<DateTime<Utc>>) -> Result<()> {
        let index = self.advance(Role::Attribute, None)?;
        let entry = &self.layout.entries[index];
        match self.node.attributes.get(&entry.directive.wire_name) {
            None => Ok(()),
            Some(Value::Null) => {
                *out = None;
                Ok(())
            }
            Some(value) => {
                *out = Some(parse_time(entry, value)?);
                Ok(())
            }
        }
    }

    /// Populates a to-one relation field from the node's relationships.
    pub fn relation_one<R: Resource + Default>(&mut self, out: &mut Option<R>) -> Result<()> {
        let index = self.advance(Role::Relation, Some(false))?;
        let layout = Arc::clone(&self.layout);
        let entry = &layout.entries[index];
        let Some(relationship) = self.node.relationships.get(&entry.directive.wire_name) else {
            return Ok(());
        };
        match &relationship.data {
            None | Some(RelationshipData::One(None)) => Ok(()),
            Some(RelationshipData::One(Some(identity))) => {
                let mut record = R::default();
                self.decoder.resolve_identity(identity, &mut record)?;
                *out = Some(record);
                Ok(())
            }
            Some(RelationshipData::Many(_)) => Err(Error::ShapeMismatch(format!(
                "relationship `{}` is to-one but document carries a list",
                entry.directive.wire_name
            ))),
        }
    }

    /// Populates a to-many relation field, preserving document order.
    pub fn relation_many<R: Resource + Default>(&mut self, out: &mut Vec<R>) -> Result<()> {
        let index = self.advance(Role::Relation, Some(true))?;
        let layout = Arc::clone(&self.layout);
        let entry = &layout.entries[index];
        let Some(relationship) = self.node.relationships.get(&entry.directive.wire_name) else {
            return Ok(());
        };
        match &relationship.data {
            None => Ok(()),
            Some(RelationshipData::Many(identities)) => {
                let mut records = Vec::with_capacity(identities.len());
                for identity in identities {
                    let mut record = R::default();
                    self.decoder.resolve_identity(identity, &mut record)?;
                    records.push(record);
                }
                *out = records;
                Ok(())
            }
            Some(RelationshipData::One(_)) => Err(Error::ShapeMismatch(format!(
                "relationship `{}` is to-many but document carries a single reference",
                entry.directive.wire_name
            ))),
        }
    }

    fn advance(&mut self, role: Role, to_many: Option<bool>) -> Result<usize> {
        let entry = self
            .layout
            .entries
            .get(self.cursor)
            .ok_or(ConfigError::FieldOrder {
                type_name: self.layout.type_name,
            })?;
        let fits = entry.directive.role == role
            && to_many.is_none_or(|many| entry.directive.to_many == many);
        if !fits {
            return Err(ConfigError::FieldOrder {
                type_name: entry.type_name,
            }
            .into());
        }
        let index = self.cursor;
        self.cursor += 1;
        Ok(index)
    }

    fn finish(self) -> Result<()> {
        if self.cursor != self.layout.entries.len() {
            return Err(ConfigError::FieldOrder {
                type_name: self.layout.type_name,
            }
            .into());
        }
        Ok(())
    }
}

fn parse_time(entry: &Entry, value: &Value) -> Result<DateTime<Utc>> {
    let parsed = match (entry.directive.time_format, value) {
        (TimeFormat::Iso8601, Value::String(text)) => {
            NaiveDateTime::parse_from_str(text, ISO8601_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        }
        (TimeFormat::Epoch, Value::Number(number)) => number
            .as_i64()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
        _ => None,
    };
    parsed.ok_or_else(|| Error::ValueCoercion {
        field: format!("{}.{}", entry.type_name, entry.ident),
        key: entry.directive.wire_name.clone(),
        reason: "not a valid timestamp value".to_string(),
    })
}
