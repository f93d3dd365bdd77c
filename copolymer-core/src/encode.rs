use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::directive::{Role, TimeFormat, ISO8601_FORMAT};
use crate::document::{Document, PrimaryData};
use crate::error::{ConfigError, Error, Result};
use crate::layout::{layout_for, Layout};
use crate::node::{validate_links, Relationship, RelationshipData, ResourceIdentity, ResourceNode};
use crate::resource::{IdRef, Resource, WireId};

/// Encodes a single record into a document with its included side-table.
pub fn to_document(record: &dyn Resource) -> Result<Document> {
    build_single(record, true)
}

/// Encodes a single record, leaving the included side-table empty.
///
/// Relationship data still carries the full identity references; only the
/// sideloaded node bodies are suppressed.
pub fn to_document_without_included(record: &dyn Resource) -> Result<Document> {
    build_single(record, false)
}

/// Encodes an ordered sequence of records into a collection document.
pub fn to_document_many<R: Resource>(records: &[R]) -> Result<Document> {
    let refs: Vec<&dyn Resource> = records.iter().map(|record| record as &dyn Resource).collect();
    build_many(&refs, true)
}

/// Encodes a heterogeneous sequence of records into a collection document.
///
/// Output is byte-for-byte identical to [`to_document_many`] for the same
/// values.
pub fn to_document_many_dyn(records: &[&dyn Resource]) -> Result<Document> {
    build_many(records, true)
}

/// [`to_document_many`] with the included side-table left empty.
pub fn to_document_many_without_included<R: Resource>(records: &[R]) -> Result<Document> {
    let refs: Vec<&dyn Resource> = records.iter().map(|record| record as &dyn Resource).collect();
    build_many(&refs, false)
}

/// [`to_document_many_dyn`] with the included side-table left empty.
pub fn to_document_many_dyn_without_included(records: &[&dyn Resource]) -> Result<Document> {
    build_many(records, false)
}

/// Encodes a single record straight to JSON bytes.
pub fn to_vec(record: &dyn Resource) -> Result<Vec<u8>> {
    to_document(record)?.to_vec()
}

/// Encodes a single record straight to a writer.
pub fn to_writer<W: Write>(writer: W, record: &dyn Resource) -> Result<()> {
    to_document(record)?.to_writer(writer)
}

fn build_single(record: &dyn Resource, sideload: bool) -> Result<Document> {
    let mut encoder = Encoder::new(sideload);
    let node = encoder.build_node(record)?;
    encoder.included.shift_remove(&node.identity());
    Ok(Document {
        data: PrimaryData::One(node),
        included: encoder.included.into_values().collect(),
        links: None,
        meta: None,
    })
}

fn build_many(records: &[&dyn Resource], sideload: bool) -> Result<Document> {
    let mut encoder = Encoder::new(sideload);
    let mut nodes = Vec::with_capacity(records.len());
    for record in records {
        nodes.push(encoder.build_node(*record)?);
    }

    // A resource appearing as primary data never duplicates into included,
    // even when another primary references it as a relation target.
    let primaries: HashSet<ResourceIdentity> = nodes.iter().map(ResourceNode::identity).collect();
    let included = encoder
        .included
        .into_iter()
        .filter(|(identity, _)| !primaries.contains(identity))
        .map(|(_, node)| node)
        .collect();

    Ok(Document {
        data: PrimaryData::Many(nodes),
        included,
        links: None,
        meta: None,
    })
}

/// Per-call encoding state: the accumulating included set and the identity
/// chain currently being built.
struct Encoder {
    sideload: bool,
    /// Keyed by identity, in first-completion order.
    included: IndexMap<ResourceIdentity, ResourceNode>,
    in_flight: Vec<ResourceIdentity>,
}

impl Encoder {
    fn new(sideload: bool) -> Self {
        Encoder {
            sideload,
            included: IndexMap::new(),
            in_flight: Vec::new(),
        }
    }

    fn build_node(&mut self, record: &dyn Resource) -> Result<ResourceNode> {
        let layout = layout_for(record)?;
        let mut sink = FieldSink::new(Arc::clone(&layout));
        record.visit_fields(&mut sink)?;
        let (mut node, relations) = sink.finish()?;

        let identity = node.identity();
        if self.in_flight.contains(&identity) {
            // Cycle: stop recursion here. The in-flight frame completes the
            // full node and the merger reconciles this shallow entry.
            return Ok(node);
        }

        self.in_flight.push(identity);
        let filled = self.fill_relationships(&mut node, relations, record, &layout);
        self.in_flight.pop();
        filled?;

        if let Some(provider) = record.as_linkable() {
            let links = provider.links();
            validate_links(&links)?;
            node.links = Some(links);
        }
        if let Some(provider) = record.as_metable() {
            node.meta = Some(provider.meta());
        }

        Ok(node)
    }

    fn fill_relationships(
        &mut self,
        node: &mut ResourceNode,
        relations: Vec<(usize, RelValue<'_>)>,
        record: &dyn Resource,
        layout: &Layout,
    ) -> Result<()> {
        for (index, value) in relations {
            let directive = &layout.entries[index].directive;
            let data = match value {
                RelValue::One(None) if directive.omit_empty => continue,
                RelValue::One(None) => None,
                RelValue::One(Some(target)) => {
                    Some(RelationshipData::One(Some(self.reference(target)?)))
                }
                RelValue::Many(targets) if targets.is_empty() && directive.omit_empty => continue,
                RelValue::Many(targets) => {
                    let mut identities = Vec::with_capacity(targets.len());
                    for target in targets {
                        identities.push(self.reference(target)?);
                    }
                    Some(RelationshipData::Many(identities))
                }
            };

            let mut relationship = Relationship {
                data,
                links: None,
                meta: None,
            };
            if let Some(provider) = record.as_relationship_linkable() {
                if let Some(links) = provider.relationship_links(&directive.wire_name) {
                    validate_links(&links)?;
                    relationship.links = Some(links);
                }
            }
            if let Some(provider) = record.as_relationship_metable() {
                if let Some(meta) = provider.relationship_meta(&directive.wire_name) {
                    relationship.meta = Some(meta);
                }
            }

            node.relationships
                .insert(directive.wire_name.clone(), relationship);
        }
        Ok(())
    }

    /// Builds the full node for a relation target and folds it into the
    /// included set, returning the target's identity.
    fn reference(&mut self, target: &dyn Resource) -> Result<ResourceIdentity> {
        let node = self.build_node(target)?;
        let identity = node.identity();
        if self.sideload {
            match self.included.entry(identity.clone()) {
                indexmap::map::Entry::Occupied(mut slot) => slot.get_mut().merge(node),
                indexmap::map::Entry::Vacant(slot) => {
                    slot.insert(node);
                }
            }
        }
        Ok(identity)
    }
}

/// The ordered field-visitation handshake of the encode path.
///
/// A record's `visit_fields` feeds one call per layout entry, in order;
/// identifier and attribute values are staged into the node directly while
/// relation targets are buffered for the encoder's recursive pass.
pub struct FieldSink<'a> {
    layout: Arc<Layout>,
    cursor: usize,
    node: ResourceNode,
    relations: Vec<(usize, RelValue<'a>)>,
}

enum RelValue<'a> {
    One(Option<&'a dyn Resource>),
    Many(Vec<&'a dyn Resource>),
}

impl<'a> FieldSink<'a> {
    fn new(layout: Arc<Layout>) -> Self {
        let node = ResourceNode {
            kind: layout.resource_type.clone(),
            ..ResourceNode::default()
        };
        FieldSink {
            layout,
            cursor: 0,
            node,
            relations: Vec::new(),
        }
    }

    /// Stages the primary-key value as the node's wire `id`.
    pub fn id<T: WireId>(&mut self, value: &T) -> Result<()> {
        let index = self.advance(Role::PrimaryKey, None)?;
        let entry = &self.layout.entries[index];
        self.node.id = match value.id_ref() {
            IdRef::Str(raw) => raw.to_owned(),
            IdRef::Int(raw) => raw.to_string(),
            IdRef::Uint(raw) => raw.to_string(),
            IdRef::Absent => {
                return Err(Error::BadIdentifier(format!(
                    "{}.{} has no identifier value",
                    entry.type_name, entry.ident
                )));
            }
        };
        Ok(())
    }

    /// Stages the client-supplied identifier; empty or unset leaves it off.
    pub fn client_id<T: WireId>(&mut self, value: &T) -> Result<()> {
        self.advance(Role::ClientId, None)?;
        self.node.client_id = match value.id_ref() {
            IdRef::Str(raw) if !raw.is_empty() => Some(raw.to_owned()),
            IdRef::Str(_) | IdRef::Absent => None,
            IdRef::Int(raw) => Some(raw.to_string()),
            IdRef::Uint(raw) => Some(raw.to_string()),
        };
        Ok(())
    }

    /// Serializes an attribute value, honoring `omitempty`.
    pub fn attr<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let index = self.advance(Role::Attribute, None)?;
        let value = serde_json::to_value(value)?;
        let entry = &self.layout.entries[index];
        if entry.directive.omit_empty && is_empty_value(&value) {
            return Ok(());
        }
        self.node
            .attributes
            .insert(entry.directive.wire_name.clone(), value);
        Ok(())
    }

    /// Stages a timestamp attribute.
    pub fn time(&mut self, value: &DateTime<Utc>) -> Result<()> {
        let index = self.advance(Role::Attribute, None)?;
        self.put_time(index, Some(value));
        Ok(())
    }

    /// Stages an optional timestamp attribute.
    pub fn time_opt(&mut self, value: &Option<DateTime<Utc>>) -> Result<()> {
        let index = self.advance(Role::Attribute, None)?;
        self.put_time(index, value.as_ref());
        Ok(())
    }

    fn put_time(&mut self, index: usize, value: Option<&DateTime<Utc>>) {
        let entry = &self.layout.entries[index];
        let encoded = match value {
            // The zero timestamp marks "unset" and is always omitted,
            // regardless of omitempty.
            Some(stamp) if *stamp == DateTime::<Utc>::default() => return,
            Some(stamp) => match entry.directive.time_format {
                TimeFormat::Iso8601 => Value::String(stamp.format(ISO8601_FORMAT).to_string()),
                TimeFormat::Epoch => Value::from(stamp.timestamp()),
            },
            None if entry.directive.omit_empty => return,
            None => Value::Null,
        };
        self.node
            .attributes
            .insert(entry.directive.wire_name.clone(), encoded);
    }

    /// Buffers a to-one relation target.
    pub fn relation_one(&mut self, target: Option<&'a dyn Resource>) -> Result<()> {
        let index = self.advance(Role::Relation, Some(false))?;
        self.relations.push((index, RelValue::One(target)));
        Ok(())
    }

    /// Buffers an ordered list of to-many relation targets.
    pub fn relation_many(&mut self, targets: &[&'a dyn Resource]) -> Result<()> {
        let index = self.advance(Role::Relation, Some(true))?;
        self.relations.push((index, RelValue::Many(targets.to_vec())));
        Ok(())
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

    fn finish(self) -> Result<(ResourceNode, Vec<(usize, RelValue<'a>)>)> {
        if self.cursor != self.layout.entries.len() {
            return Err(ConfigError::FieldOrder {
                type_name: self.layout.type_name,
            }
            .into());
        }
        Ok((self.node, self.relations))
    }
}

/// The zero/empty test behind `omitempty`: null, empty string, zero number,
/// `false`, or a zero-length list or map.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => {
            number.as_i64() == Some(0) || number.as_u64() == Some(0) || number.as_f64() == Some(0.0)
        }
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(members) => members.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_value_classification() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("")));
        assert!(is_empty_value(&json!(0)));
        assert!(is_empty_value(&json!(false)));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({})));

        assert!(!is_empty_value(&json!("x")));
        assert!(!is_empty_value(&json!(1)));
        assert!(!is_empty_value(&json!(-0.5)));
        assert!(!is_empty_value(&json!(true)));
        assert!(!is_empty_value(&json!([0])));
    }
}
