use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A resource's `links` member. `BTreeMap` keeps wire output key-ordered.
pub type Links = BTreeMap<String, Value>;

/// A resource's `meta` member.
pub type Meta = BTreeMap<String, Value>;

/// The pair that makes two nodes the same resource.
///
/// Ids are compared as decimal strings regardless of the original numeric
/// width of the source field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// One resource of the wire format: typed, identified, with attributes,
/// relationships, and optional link/meta blocks.
///
/// Owned exclusively by the graph that created it; nodes live only for the
/// duration of a single encode or decode call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "client-id", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationships: BTreeMap<String, Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl ResourceNode {
    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity {
            kind: self.kind.clone(),
            id: self.id.clone(),
        }
    }

    /// Combines a later-seen node for the same identity into this one.
    ///
    /// The incoming side wins for `type`/`id`/`client-id` when it sets them,
    /// and for any attribute, relationship, link, or meta key both sides
    /// define; keys present in only one side are kept.
    pub fn merge(&mut self, incoming: ResourceNode) {
        if !incoming.kind.is_empty() {
            self.kind = incoming.kind;
        }
        if !incoming.id.is_empty() {
            self.id = incoming.id;
        }
        if incoming.client_id.is_some() {
            self.client_id = incoming.client_id;
        }
        self.attributes.extend(incoming.attributes);
        self.relationships.extend(incoming.relationships);
        if let Some(links) = incoming.links {
            self.links.get_or_insert_with(Links::new).extend(links);
        }
        if let Some(meta) = incoming.meta {
            self.meta.get_or_insert_with(Meta::new).extend(meta);
        }
    }
}

/// One relationship of a resource node.
///
/// The encoder always materializes `data` (a nil to-one is `null`, an empty
/// to-many is `[]`); the decoder tolerates a missing member by leaving the
/// destination field at its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

/// Relationship data, resolved by JSON shape: an identity object for
/// to-one, an identity array for to-many.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    One(Option<ResourceIdentity>),
    Many(Vec<ResourceIdentity>),
}

/// A link object: an `href` with optional meta.
///
/// Links map members may be plain URL strings or objects of this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Link {
            href: href.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(href: impl Into<String>, meta: Meta) -> Self {
        Link {
            href: href.into(),
            meta,
        }
    }
}

impl From<Link> for Value {
    fn from(link: Link) -> Value {
        serde_json::to_value(&link).expect("link serialization should not fail")
    }
}

/// Checks every member of a links map: each value must be a URL string or a
/// link object with an `href` string and optional `meta` object.
pub(crate) fn validate_links(links: &Links) -> Result<()> {
    for (name, value) in links {
        let valid = match value {
            Value::String(_) => true,
            Value::Object(members) => {
                matches!(members.get("href"), Some(Value::String(_)))
                    && members.iter().all(|(key, member)| match key.as_str() {
                        "href" => true,
                        "meta" => member.is_object(),
                        _ => false,
                    })
            }
            _ => false,
        };
        if !valid {
            return Err(Error::Capability {
                member: name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_prefers_incoming_for_set_members() {
        let mut existing = ResourceNode {
            kind: "Good".to_string(),
            id: "99".to_string(),
            attributes: [("fizz".to_string(), json!("buzz"))].into(),
            ..ResourceNode::default()
        };

        let incoming = ResourceNode {
            kind: "Better".to_string(),
            client_id: Some("1111".to_string()),
            attributes: [("timbuk".to_string(), json!(2))].into(),
            ..ResourceNode::default()
        };

        existing.merge(incoming);

        assert_eq!(existing.kind, "Better");
        assert_eq!(existing.id, "99");
        assert_eq!(existing.client_id.as_deref(), Some("1111"));
        assert_eq!(existing.attributes["fizz"], json!("buzz"));
        assert_eq!(existing.attributes["timbuk"], json!(2));
    }

    #[test]
    fn merge_keeps_existing_identity_when_incoming_unset() {
        let mut existing = ResourceNode {
            kind: "comments".to_string(),
            id: "1".to_string(),
            ..ResourceNode::default()
        };
        existing.merge(ResourceNode::default());
        assert_eq!(existing.kind, "comments");
        assert_eq!(existing.id, "1");
    }

    #[test]
    fn merge_overwrites_duplicate_attribute_keys() {
        let mut existing = ResourceNode {
            attributes: [("body".to_string(), json!("old"))].into(),
            ..ResourceNode::default()
        };
        let incoming = ResourceNode {
            attributes: [("body".to_string(), json!("new"))].into(),
            ..ResourceNode::default()
        };
        existing.merge(incoming);
        assert_eq!(existing.attributes["body"], json!("new"));
    }

    #[test]
    fn links_accept_strings_and_link_objects() {
        let mut links = Links::new();
        links.insert("self".to_string(), json!("https://example.com/api/blogs/5"));
        links.insert(
            "comments".to_string(),
            Link::with_meta(
                "https://example.com/api/blogs/5/comments",
                [("count".to_string(), json!(20))].into(),
            )
            .into(),
        );
        assert!(validate_links(&links).is_ok());
    }

    #[test]
    fn links_reject_other_shapes() {
        let mut links = Links::new();
        links.insert("self".to_string(), json!(["invalid", "should error"]));
        assert!(matches!(
            validate_links(&links),
            Err(Error::Capability { member }) if member == "self"
        ));

        let mut links = Links::new();
        links.insert("self".to_string(), json!({ "meta": {} }));
        assert!(validate_links(&links).is_err());
    }
}
