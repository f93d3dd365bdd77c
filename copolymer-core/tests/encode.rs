//! Encode-side integration tests over derived record types.

use chrono::{TimeZone, Timelike, Utc};
use copolymer_core::{
    Error, Link, Linkable, Links, Meta, Metable, RelationshipLinkable, Resource,
};
use serde_json::{json, Value};

#[derive(Resource, Default, Clone, Debug, PartialEq)]
#[resource(links, relationship_links)]
struct Blog {
    #[resource("primary,blogs")]
    id: u64,
    #[resource("client-id")]
    client_id: String,
    #[resource("attr,title")]
    title: String,
    #[resource("attr,created_at")]
    created_at: chrono::DateTime<Utc>,
    #[resource("attr,view_count")]
    view_count: i32,
    #[resource("relation,posts")]
    posts: Vec<Post>,
    #[resource("relation,current_post")]
    current_post: Option<Post>,
}

impl Linkable for Blog {
    fn links(&self) -> Links {
        let mut links = Links::new();
        links.insert(
            "self".to_string(),
            json!(format!("https://example.com/api/blogs/{}", self.id)),
        );
        links
    }
}

impl RelationshipLinkable for Blog {
    fn relationship_links(&self, relation: &str) -> Option<Links> {
        if relation != "posts" {
            return None;
        }
        let mut links = Links::new();
        links.insert(
            "related".to_string(),
            Link::new(format!("https://example.com/api/blogs/{}/posts", self.id)).into(),
        );
        Some(links)
    }
}

#[derive(Resource, Default, Clone, Debug, PartialEq)]
struct Post {
    #[resource("primary,posts")]
    id: u64,
    #[resource("attr,title")]
    title: String,
    #[resource("attr,body")]
    body: String,
    #[resource("relation,comments")]
    comments: Vec<Comment>,
    #[resource("relation,latest_comment,omitempty")]
    latest_comment: Option<Comment>,
}

#[derive(Resource, Default, Clone, Debug, PartialEq)]
struct Comment {
    #[resource("primary,comments")]
    id: u64,
    #[resource("attr,body")]
    body: String,
    #[resource("attr,likes,omitempty")]
    likes: u32,
}

fn sample_blog() -> Blog {
    let comment_foo = Comment {
        id: 1,
        body: "foo".to_string(),
        likes: 4,
    };
    let comment_bar = Comment {
        id: 2,
        body: "bar".to_string(),
        likes: 0,
    };
    let first = Post {
        id: 1,
        title: "Foo".to_string(),
        body: "Bar".to_string(),
        comments: vec![comment_foo.clone(), comment_bar.clone()],
        latest_comment: Some(comment_bar),
    };
    let second = Post {
        id: 2,
        title: "Fuubar".to_string(),
        body: "Bas".to_string(),
        comments: vec![comment_foo],
        latest_comment: None,
    };
    Blog {
        id: 5,
        client_id: String::new(),
        title: "Title 1".to_string(),
        created_at: Utc.timestamp_opt(1471422432, 0).unwrap(),
        view_count: 1000,
        posts: vec![first.clone(), second],
        current_post: Some(first),
    }
}

fn included_node<'a>(value: &'a Value, kind: &str, id: &str) -> &'a Value {
    value["included"]
        .as_array()
        .unwrap()
        .iter()
        .find(|node| node["type"] == kind && node["id"] == id)
        .unwrap_or_else(|| panic!("included is missing {kind}/{id}"))
}

#[test]
fn single_resource_document() {
    let value = copolymer_core::to_document(&sample_blog())
        .unwrap()
        .to_value()
        .unwrap();

    let data = &value["data"];
    assert_eq!(data["type"], "blogs");
    assert_eq!(data["id"], "5");
    assert_eq!(data["attributes"]["title"], "Title 1");
    assert_eq!(data["attributes"]["created_at"], 1471422432);
    assert_eq!(data["attributes"]["view_count"], 1000);
    // Empty client id stays off the wire.
    assert!(data.get("client-id").is_none());

    let posts = data["relationships"]["posts"]["data"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0], json!({"type": "posts", "id": "1"}));
    assert_eq!(posts[1], json!({"type": "posts", "id": "2"}));
    assert_eq!(
        data["relationships"]["current_post"]["data"],
        json!({"type": "posts", "id": "1"})
    );

    // Two posts and two comments, each exactly once.
    assert_eq!(value["included"].as_array().unwrap().len(), 4);
    assert_eq!(included_node(&value, "posts", "2")["attributes"]["title"], "Fuubar");
    assert_eq!(included_node(&value, "comments", "1")["attributes"]["likes"], 4);
}

#[test]
fn resource_and_relationship_links() {
    let value = copolymer_core::to_document(&sample_blog())
        .unwrap()
        .to_value()
        .unwrap();

    assert_eq!(value["data"]["links"]["self"], "https://example.com/api/blogs/5");
    assert_eq!(
        value["data"]["relationships"]["posts"]["links"]["related"]["href"],
        "https://example.com/api/blogs/5/posts"
    );
    assert!(value["data"]["relationships"]["current_post"]
        .get("links")
        .is_none());
}

#[test]
fn without_included_keeps_references() {
    let value = copolymer_core::to_document_without_included(&sample_blog())
        .unwrap()
        .to_value()
        .unwrap();

    assert!(value.get("included").is_none());
    assert_eq!(
        value["data"]["relationships"]["posts"]["data"]
            .as_array()
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn client_id_on_the_wire_when_set() {
    let mut blog = sample_blog();
    blog.client_id = "abc-123".to_string();
    let value = copolymer_core::to_document(&blog).unwrap().to_value().unwrap();
    assert_eq!(value["data"]["client-id"], "abc-123");
}

#[test]
fn relationship_data_always_materialized() {
    let post = Post {
        id: 7,
        title: "quiet".to_string(),
        body: "post".to_string(),
        comments: Vec::new(),
        latest_comment: None,
    };
    let value = copolymer_core::to_document(&post).unwrap().to_value().unwrap();

    // Empty to-many is [], nil to-one with omitempty disappears.
    assert_eq!(value["data"]["relationships"]["comments"]["data"], json!([]));
    assert!(value["data"]["relationships"].get("latest_comment").is_none());
    assert!(value.get("included").is_none());
}

#[derive(Resource, Default)]
struct Profile {
    #[resource("primary,profiles")]
    id: u64,
    #[resource("attr,handle")]
    handle: String,
    #[resource("relation,friends,omitempty")]
    friends: Vec<Comment>,
    #[resource("relation,best_friend,omitempty")]
    best_friend: Option<Comment>,
}

#[test]
fn all_omitempty_relations_drop_the_relationships_key() {
    let profile = Profile {
        id: 11,
        handle: "quiet".to_string(),
        friends: Vec::new(),
        best_friend: None,
    };
    let value = copolymer_core::to_document(&profile).unwrap().to_value().unwrap();
    assert!(value["data"].get("relationships").is_none());
    assert!(value.get("included").is_none());
}

#[test]
fn nil_to_one_serializes_null_without_omitempty() {
    let mut blog = sample_blog();
    blog.current_post = None;
    blog.posts.clear();
    let value = copolymer_core::to_document(&blog).unwrap().to_value().unwrap();
    assert_eq!(value["data"]["relationships"]["current_post"]["data"], Value::Null);
}

#[test]
fn omitempty_attributes_dropped_when_zero() {
    let comment = Comment {
        id: 3,
        body: "plain".to_string(),
        likes: 0,
    };
    let value = copolymer_core::to_document(&comment).unwrap().to_value().unwrap();
    assert_eq!(value["data"]["attributes"]["body"], "plain");
    assert!(value["data"]["attributes"].get("likes").is_none());
}

#[test]
fn zero_timestamp_always_omitted() {
    let blog = Blog {
        id: 5,
        title: "fresh".to_string(),
        ..Blog::default()
    };
    let value = copolymer_core::to_document(&blog).unwrap().to_value().unwrap();
    assert!(value["data"]["attributes"].get("created_at").is_none());
}

#[derive(Resource, Default)]
struct Timestamp {
    #[resource("primary,timestamps")]
    id: u64,
    #[resource("attr,timestamp,iso8601")]
    stamp: chrono::DateTime<Utc>,
    #[resource("attr,next,omitempty,iso8601")]
    next: Option<chrono::DateTime<Utc>>,
}

#[test]
fn iso8601_timestamps_drop_subseconds() {
    let stamp = Utc
        .with_ymd_and_hms(2016, 8, 17, 8, 27, 12)
        .unwrap()
        .with_nanosecond(23849)
        .unwrap();
    let record = Timestamp {
        id: 5,
        stamp,
        next: None,
    };
    let value = copolymer_core::to_document(&record).unwrap().to_value().unwrap();
    assert_eq!(value["data"]["attributes"]["timestamp"], "2016-08-17T08:27:12Z");
    assert!(value["data"]["attributes"].get("next").is_none());
}

#[derive(Resource, Default)]
struct Car {
    #[resource("primary,cars")]
    id: Option<String>,
    #[resource("attr,make")]
    make: String,
}

#[test]
fn optional_string_id() {
    let car = Car {
        id: Some("123e4567-e89b".to_string()),
        make: "Foo".to_string(),
    };
    let value = copolymer_core::to_document(&car).unwrap().to_value().unwrap();
    assert_eq!(value["data"]["id"], "123e4567-e89b");

    let unset = Car {
        id: None,
        make: "Foo".to_string(),
    };
    assert!(matches!(
        copolymer_core::to_document(&unset),
        Err(Error::BadIdentifier(_))
    ));
}

#[derive(Resource, Default)]
struct BadModel {
    #[resource("primary,badIDs")]
    id: bool,
}

#[test]
fn unsupported_primary_key_kind() {
    assert!(matches!(
        copolymer_core::to_document(&BadModel::default()),
        Err(Error::BadIdentifier(_))
    ));
}

#[derive(Resource, Default)]
#[resource(links)]
struct BadLink {
    #[resource("primary,bad-links")]
    id: u64,
}

impl Linkable for BadLink {
    fn links(&self) -> Links {
        let mut links = Links::new();
        links.insert("self".to_string(), json!(["not", "a", "link"]));
        links
    }
}

#[test]
fn invalid_link_member_rejected() {
    assert!(matches!(
        copolymer_core::to_document(&BadLink { id: 1 }),
        Err(Error::Capability { member }) if member == "self"
    ));
}

#[derive(Resource, Default)]
#[resource(meta)]
struct Measurement {
    #[resource("primary,measurements")]
    id: u64,
    #[resource("attr,reading")]
    reading: f64,
}

impl Metable for Measurement {
    fn meta(&self) -> Meta {
        [("unit".to_string(), json!("celsius"))].into()
    }
}

#[test]
fn resource_meta_block() {
    let value = copolymer_core::to_document(&Measurement { id: 2, reading: 21.5 })
        .unwrap()
        .to_value()
        .unwrap();
    assert_eq!(value["data"]["meta"]["unit"], "celsius");
}

#[test]
fn collection_document() {
    let blogs = vec![sample_blog(), {
        let mut other = sample_blog();
        other.id = 6;
        other.title = "Title 2".to_string();
        other
    }];
    let value = copolymer_core::to_document_many(&blogs).unwrap().to_value().unwrap();

    let data = value["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["id"], "5");
    assert_eq!(data[1]["id"], "6");
    // Shared posts and comments appear once.
    assert_eq!(value["included"].as_array().unwrap().len(), 4);
}

#[test]
fn heterogeneous_matches_concrete_output() {
    let blogs = vec![sample_blog(), sample_blog()];
    let concrete = copolymer_core::to_document_many(&blogs).unwrap().to_vec().unwrap();

    let refs: Vec<&dyn Resource> = blogs.iter().map(|blog| blog as &dyn Resource).collect();
    let dynamic = copolymer_core::to_document_many_dyn(&refs).unwrap().to_vec().unwrap();

    assert_eq!(concrete, dynamic);
}

#[test]
fn included_nodes_merge_across_occurrences() {
    // The same comment identity with differing field visibility: one
    // occurrence omits `likes`, the other carries it. The merged node keeps
    // the attribute.
    let bare = Comment {
        id: 9,
        body: "same".to_string(),
        likes: 0,
    };
    let liked = Comment {
        likes: 5,
        ..bare.clone()
    };
    let post = Post {
        id: 4,
        title: "t".to_string(),
        body: "b".to_string(),
        comments: vec![bare],
        latest_comment: Some(liked),
    };

    let value = copolymer_core::to_document(&post).unwrap().to_value().unwrap();
    let included = value["included"].as_array().unwrap();
    assert_eq!(included.len(), 1);
    assert_eq!(included[0]["attributes"]["likes"], 5);
    assert_eq!(included[0]["attributes"]["body"], "same");
}

#[derive(Resource, Default, Clone, Debug, PartialEq)]
struct Model {
    #[resource("primary,things")]
    id: u64,
    #[resource("attr,bar")]
    bar: String,
    #[resource("attr,buzz")]
    buzz: u32,
}

#[derive(Resource, Default, Clone, Debug, PartialEq)]
struct Composite {
    #[resource("flatten")]
    model: Model,
    #[resource("attr,foo")]
    foo: String,
    #[resource("attr,bat")]
    bat: String,
    #[resource("attr,fizz")]
    fizz: String,
}

#[test]
fn flattened_fields_splice_into_one_node() {
    let composite = Composite {
        model: Model {
            id: 1,
            bar: "barry".to_string(),
            buzz: 99,
        },
        foo: "fooey".to_string(),
        bat: "batty".to_string(),
        fizz: "fizzy".to_string(),
    };

    let bytes = copolymer_core::to_vec(&composite).unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        r#"{"data":{"type":"things","id":"1","attributes":{"bar":"barry","bat":"batty","buzz":99,"fizz":"fizzy","foo":"fooey"}}}"#
    );
}

#[test]
fn primary_resources_never_duplicate_into_included() {
    let shared = Comment {
        id: 1,
        body: "foo".to_string(),
        likes: 0,
    };
    let posts = vec![
        Post {
            id: 1,
            title: "a".to_string(),
            body: "a".to_string(),
            comments: vec![shared.clone()],
            latest_comment: None,
        },
        Post {
            id: 2,
            title: "b".to_string(),
            body: "b".to_string(),
            comments: vec![shared],
            latest_comment: None,
        },
    ];
    let value = copolymer_core::to_document_many(&posts).unwrap().to_value().unwrap();
    let included = value["included"].as_array().unwrap();
    assert_eq!(included.len(), 1);
    assert_eq!(included[0]["type"], "comments");
}
