//! Field discovery for record types
//!
//! Resolves the ordered list of logical fields for a struct type under a
//! given tag key: tag parsing, breadth-first flattening of `inline` fields,
//! and the dominant-field rule for duplicate names. Results are memoized
//! per `(type, tag key)` for the life of the process.

use crate::dispatch::{self, CodecRef};
use crate::reflect::{Kind, Shape};
use crate::registry::{Registry, Slot};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Tag value that excludes a field.
pub const IGNORE_FIELD: &str = "-";
pub const OPT_OMITEMPTY: &str = "omitempty";
pub const OPT_INLINE: &str = "inline";

/// Handle to a (possibly still building) field list.
pub type FieldsRef = Arc<Slot<FieldList>>;

/// Modifiers that follow the name in a tag, e.g. `omitempty,inline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagOptions<'a>(&'a str);

impl TagOptions<'_> {
    pub fn contains(&self, option: &str) -> bool {
        !self.0.is_empty() && self.0.split(',').any(|o| o == option)
    }
}

/// Splits a tag into its name and its comma-separated options.
pub fn parse_tag(tag: &str) -> (&str, TagOptions<'_>) {
    match tag.split_once(',') {
        Some((name, opts)) => (name, TagOptions(opts)),
        None => (tag, TagOptions("")),
    }
}

/// Tag names may hold letters, digits and a fixed set of punctuation.
/// Backslash and quote characters are reserved.
pub fn is_valid_tag(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.chars()
        .all(|c| c.is_alphanumeric() || "!#$%&()*+-./:;<=>?@[]^_{|}~ ".contains(c))
}

/// One resolved logical field.
#[derive(Clone)]
pub struct FieldSpec {
    pub name: String,
    /// Name came from the tag rather than the identifier.
    pub tagged: bool,
    /// Field positions from the root struct through inline structs.
    pub index: Vec<usize>,
    /// Declared type of the field, pointers included.
    pub shape: Shape,
    pub omit_empty: bool,
    pub codec: CodecRef,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("tagged", &self.tagged)
            .field("index", &self.index)
            .field("type", &self.shape.name)
            .field("omit_empty", &self.omit_empty)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct FieldList {
    pub list: Vec<FieldSpec>,
    pub name_index: HashMap<String, usize>,
}

impl FieldList {
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.name_index.get(name).map(|&i| &self.list[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.list.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.list.iter()
    }
}

fn registry() -> &'static Registry<FieldList> {
    static REGISTRY: OnceLock<Registry<FieldList>> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

/// Returns the cached field list for `shape` under `tag`, building it on
/// first use. Non-struct shapes resolve to an empty list.
pub fn type_fields(shape: &Shape, tag: &str) -> Arc<FieldList> {
    fields_ref(shape, tag).get()
}

/// Slot handle for the field list; never waits on a build in progress.
pub fn fields_ref(shape: &Shape, tag: &str) -> FieldsRef {
    registry().resolve(shape.id, tag, || build(shape, tag))
}

#[derive(Clone)]
struct Candidate {
    name: String,
    tagged: bool,
    index: Vec<usize>,
    shape: Shape,
    omit_empty: bool,
}

struct Pending {
    shape: Shape,
    index: Vec<usize>,
}

fn build(root: &Shape, tag: &str) -> FieldList {
    let mut next = vec![Pending {
        shape: root.clone(),
        index: Vec::new(),
    }];
    let mut next_count: HashMap<TypeId, usize> = HashMap::new();
    let mut visited: HashSet<TypeId> = HashSet::new();
    let mut found: Vec<Candidate> = Vec::new();

    while !next.is_empty() {
        let current = std::mem::take(&mut next);
        let count = std::mem::take(&mut next_count);

        for pending in current {
            if !visited.insert(pending.shape.id) {
                continue;
            }
            let Kind::Struct { fields } = &pending.shape.kind else {
                continue;
            };

            for (i, def) in fields.iter().enumerate() {
                let raw = def.tag(tag).unwrap_or("");
                if raw == IGNORE_FIELD {
                    continue;
                }

                let (name, opts) = parse_tag(raw);
                let name = if is_valid_tag(name) { name } else { "" };
                let inline = opts.contains(OPT_INLINE);
                let declared = (def.shape)();
                let target = declared.pointee();

                if inline {
                    // private inline structs may still carry public fields
                    if !def.exported && !target.is_struct() {
                        continue;
                    }
                } else if !def.exported {
                    continue;
                }

                let mut index = pending.index.clone();
                index.push(i);

                if !name.is_empty() || !inline || !target.is_struct() {
                    let candidate = Candidate {
                        name: if name.is_empty() {
                            def.ident.to_string()
                        } else {
                            name.to_string()
                        },
                        tagged: !name.is_empty(),
                        index,
                        shape: declared,
                        omit_empty: opts.contains(OPT_OMITEMPTY),
                    };
                    trace!(field = %candidate.name, index = ?candidate.index, "resolved field");
                    // a type queued more than once at this depth contributes
                    // a duplicate so the dominant-field pass drops it
                    if count.get(&pending.shape.id).copied().unwrap_or(0) > 1 {
                        found.push(candidate.clone());
                    }
                    found.push(candidate);
                    continue;
                }

                let seen = next_count.entry(target.id).or_insert(0);
                *seen += 1;
                if *seen == 1 {
                    next.push(Pending {
                        shape: target,
                        index,
                    });
                }
            }
        }
    }

    found.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.index.len().cmp(&b.index.len()))
            .then(b.tagged.cmp(&a.tagged))
            .then(a.index.cmp(&b.index))
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(found.len());
    let mut start = 0;
    while start < found.len() {
        let mut end = start + 1;
        while end < found.len() && found[end].name == found[start].name {
            end += 1;
        }
        if let Some(winner) = dominant_field(&found[start..end]) {
            kept.push(winner.clone());
        }
        start = end;
    }

    kept.sort_by(|a, b| a.index.cmp(&b.index));

    let list: Vec<FieldSpec> = kept
        .into_iter()
        .map(|c| FieldSpec {
            codec: dispatch::codec_ref(&c.shape, tag),
            name: c.name,
            tagged: c.tagged,
            index: c.index,
            shape: c.shape,
            omit_empty: c.omit_empty,
        })
        .collect();
    let name_index = list
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.clone(), i))
        .collect();

    debug!(type_name = root.name, tag, fields = list.len(), "built field list");
    FieldList { list, name_index }
}

/// Picks the field that survives among candidates sharing one name.
///
/// Candidates arrive sorted by depth, then tagged first, so the first one
/// wins unless the runner-up ties it on both.
fn dominant_field(group: &[Candidate]) -> Option<&Candidate> {
    match group {
        [] => None,
        [first, second, ..]
            if first.index.len() == second.index.len() && first.tagged == second.tagged =>
        {
            None
        }
        [first, ..] => Some(first),
    }
}
