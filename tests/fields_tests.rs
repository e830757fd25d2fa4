//! Field resolution tests: tags, inline structs, name conflicts, caching

use pretty_assertions::assert_eq;
use royalbit_sheetmap::dispatch::{codec_ref, dispatch, EncodeStrategy};
use royalbit_sheetmap::fields::type_fields;
use royalbit_sheetmap::{record, Reflect};
use std::sync::Arc;
use std::thread;

record! {
    #[derive(Debug, Default)]
    pub struct Employee {
        #[tag(excel = "id")]
        pub id: i64,
        #[tag(excel = "name,omitempty", csv = "full_name")]
        pub name: String,
        #[tag(excel = "-")]
        pub internal: bool,
        pub email: String,
        hidden: String,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Audit {
        #[tag(excel = "created")]
        pub created: String,
        #[tag(excel = "updated")]
        pub updated: String,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Account {
        #[tag(excel = "login")]
        pub login: String,
        #[tag(excel = ",inline")]
        pub audit: Audit,
        #[tag(excel = "owner")]
        pub owner: Audit,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Profile {
        #[tag(excel = ",inline")]
        audit: Option<Box<Audit>>,
        #[tag(excel = "bio")]
        pub bio: String,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Left {
        #[tag(excel = "code")]
        pub left_code: String,
        pub shared: i32,
        #[tag(excel = "title")]
        pub heading: String,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Right {
        #[tag(excel = "code")]
        pub right_code: String,
        pub shared: i32,
        pub title: String,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Merged {
        #[tag(excel = ",inline")]
        pub left: Left,
        #[tag(excel = ",inline")]
        pub right: Right,
        pub shared: i32,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Node {
        #[tag(excel = "value")]
        pub value: i32,
        #[tag(excel = "next")]
        pub next: Option<Box<Node>>,
    }
}

record! {
    #[derive(Debug, Default)]
    pub struct Threaded {
        #[tag(excel = "a")]
        pub a: u8,
        #[tag(excel = "b")]
        pub b: Vec<String>,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TAG PARSING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_tags_pick_names_and_options() {
    let fields = type_fields(&Employee::shape(), "excel");
    assert_eq!(fields.names(), vec!["id", "name", "email"]);

    let name = fields.get("name").unwrap();
    assert!(name.omit_empty);
    assert!(name.tagged);
    assert_eq!(name.index, vec![1]);

    let email = fields.get("email").unwrap();
    assert!(!email.tagged, "untagged field falls back to its identifier");
    assert!(!email.omit_empty);

    assert!(!fields.contains("internal"), "'-' excludes the field");
    assert!(!fields.contains("hidden"), "private fields are not exported");
}

#[test]
fn test_tag_key_is_configurable() {
    let fields = type_fields(&Employee::shape(), "csv");
    assert_eq!(fields.names(), vec!["id", "full_name", "internal", "email"]);
    assert!(!fields.get("full_name").unwrap().omit_empty);
}

// ═══════════════════════════════════════════════════════════════════════════
// INLINE STRUCTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_inline_struct_is_flattened() {
    let fields = type_fields(&Account::shape(), "excel");
    assert_eq!(fields.names(), vec!["login", "created", "updated", "owner"]);
    assert_eq!(fields.get("created").unwrap().index, vec![1, 0]);
    assert_eq!(fields.get("updated").unwrap().index, vec![1, 1]);

    // a tagged struct without `inline` stays a single field
    assert_eq!(fields.get("owner").unwrap().index, vec![2]);
}

#[test]
fn test_private_inline_pointer_exposes_public_fields() {
    let fields = type_fields(&Profile::shape(), "excel");
    assert_eq!(fields.names(), vec!["created", "updated", "bio"]);
    assert_eq!(fields.get("created").unwrap().index, vec![0, 0]);
}

#[test]
fn test_name_conflicts_use_dominant_field() {
    let fields = type_fields(&Merged::shape(), "excel");

    // "shared" at depth 1 beats both copies at depth 2
    assert_eq!(fields.get("shared").unwrap().index, vec![2]);
    // two tagged "code" fields at the same depth cancel out
    assert!(!fields.contains("code"));
    // tagged "title" beats the untagged one at the same depth
    assert_eq!(fields.get("title").unwrap().index, vec![0, 2]);
    assert_eq!(fields.names(), vec!["title", "shared"]);
}

// ═══════════════════════════════════════════════════════════════════════════
// CACHING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_field_list_is_cached() {
    let a = type_fields(&Account::shape(), "excel");
    let b = type_fields(&Account::shape(), "excel");
    assert!(Arc::ptr_eq(&a, &b));

    let other_tag = type_fields(&Account::shape(), "csv");
    assert!(!Arc::ptr_eq(&a, &other_tag));
}

#[test]
fn test_concurrent_resolution_shares_one_list() {
    let handles: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(|| {
                let fields = type_fields(&Threaded::shape(), "excel");
                let codec = codec_ref(&Threaded::shape(), "excel");
                (fields, codec)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let (first_fields, first_codec) = &results[0];
    for (fields, codec) in &results[1..] {
        assert!(Arc::ptr_eq(first_fields, fields));
        assert!(Arc::ptr_eq(first_codec, codec));
    }
    assert_eq!(first_fields.names(), vec!["a", "b"]);
}

#[test]
fn test_recursive_type_resolves() {
    let entry = dispatch(&Node::shape(), "excel");
    let EncodeStrategy::Struct(fields) = &entry.encode else {
        panic!("expected struct strategy");
    };
    let fields = fields.get();
    assert_eq!(fields.names(), vec!["value", "next"]);

    // next → Option<Box<Node>> → Box<Node> → Node, the same entry
    let next = fields.get("next").unwrap().codec.get();
    let EncodeStrategy::Pointer(boxed) = &next.encode else {
        panic!("expected pointer strategy");
    };
    let EncodeStrategy::Pointer(node) = &boxed.get().encode else {
        panic!("expected pointer strategy");
    };
    assert!(Arc::ptr_eq(&node.get(), &entry));
}
