//! Type-directed encode/decode strategies
//!
//! Each reflectable type gets one [`DispatchEntry`] per tag key, chosen once
//! and shared by every session in the process. Custom hooks take priority
//! over the kind default. A pointer kind forwards to its pointee's entry,
//! so a hook declared on the pointee is picked up after dereferencing.
//!
//! Child entries are held as slot handles. A type that reaches itself
//! (`Option<Box<Self>>`) resolves to the placeholder its own build
//! published, and reads it only after the build is done.

use crate::fields::{self, FieldsRef};
use crate::reflect::{Kind, MarshalFn, Shape, ShapeFn, UnmarshalFn};
use crate::registry::{Registry, Slot};
use std::any::TypeId;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Handle to a (possibly still building) dispatch entry.
pub type CodecRef = Arc<Slot<DispatchEntry>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Int,
    Uint,
    Float { bits: u8 },
    Bool,
    Str,
}

pub enum EncodeStrategy {
    Hook(MarshalFn),
    Literal(LiteralKind),
    DateTime,
    /// Byte buffers are a single cell, not one cell per byte.
    Bytes,
    Seq(CodecRef),
    Map(CodecRef),
    Pointer(CodecRef),
    Struct(FieldsRef),
    Unsupported,
}

pub enum DecodeStrategy {
    Hook(UnmarshalFn),
    Literal(LiteralKind),
    DateTime,
    Bytes,
    Seq { elem: CodecRef, len: Option<usize> },
    Map(CodecRef),
    Pointer(CodecRef),
    Struct(FieldsRef),
    Unsupported,
}

pub struct DispatchEntry {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub encode: EncodeStrategy,
    pub decode: DecodeStrategy,
}

fn registry() -> &'static Registry<DispatchEntry> {
    static REGISTRY: OnceLock<Registry<DispatchEntry>> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

/// Returns the dispatch entry for `shape`, building it on first use.
pub fn dispatch(shape: &Shape, tag: &str) -> Arc<DispatchEntry> {
    codec_ref(shape, tag).get()
}

/// Slot handle for the dispatch entry; never waits on a build in progress.
pub fn codec_ref(shape: &Shape, tag: &str) -> CodecRef {
    registry().resolve(shape.id, tag, || build(shape, tag))
}

fn build(shape: &Shape, tag: &str) -> DispatchEntry {
    debug!(type_name = shape.name, tag, "building dispatch entry");
    DispatchEntry {
        type_id: shape.id,
        type_name: shape.name,
        encode: encode_strategy(shape, tag),
        decode: decode_strategy(shape, tag),
    }
}

fn literal_kind(kind: &Kind) -> Option<LiteralKind> {
    match kind {
        Kind::Int { .. } => Some(LiteralKind::Int),
        Kind::Uint { .. } => Some(LiteralKind::Uint),
        Kind::Float { bits } => Some(LiteralKind::Float { bits: *bits }),
        Kind::Bool => Some(LiteralKind::Bool),
        Kind::Str => Some(LiteralKind::Str),
        _ => None,
    }
}

/// Variable-length `u8` sequences without hooks of their own.
fn is_bytes(elem: ShapeFn, len: Option<usize>) -> bool {
    if len.is_some() {
        return false;
    }
    let elem = elem();
    elem.id == TypeId::of::<u8>() && elem.hooks.marshal.is_none() && elem.hooks.unmarshal.is_none()
}

fn encode_strategy(shape: &Shape, tag: &str) -> EncodeStrategy {
    if let Some(hook) = shape.hooks.marshal {
        return EncodeStrategy::Hook(hook);
    }
    if let Some(literal) = literal_kind(&shape.kind) {
        return EncodeStrategy::Literal(literal);
    }
    match &shape.kind {
        Kind::DateTime => EncodeStrategy::DateTime,
        Kind::Seq { elem, len } if is_bytes(*elem, *len) => EncodeStrategy::Bytes,
        Kind::Seq { elem, .. } => EncodeStrategy::Seq(codec_ref(&elem(), tag)),
        Kind::Map { value } => EncodeStrategy::Map(codec_ref(&value(), tag)),
        Kind::Pointer { elem } => EncodeStrategy::Pointer(codec_ref(&elem(), tag)),
        Kind::Struct { .. } => EncodeStrategy::Struct(fields::fields_ref(shape, tag)),
        _ => EncodeStrategy::Unsupported,
    }
}

fn decode_strategy(shape: &Shape, tag: &str) -> DecodeStrategy {
    if let Some(hook) = shape.hooks.unmarshal {
        return DecodeStrategy::Hook(hook);
    }
    if let Some(literal) = literal_kind(&shape.kind) {
        return DecodeStrategy::Literal(literal);
    }
    match &shape.kind {
        Kind::DateTime => DecodeStrategy::DateTime,
        Kind::Seq { elem, len } if is_bytes(*elem, *len) => DecodeStrategy::Bytes,
        Kind::Seq { elem, len } => DecodeStrategy::Seq {
            elem: codec_ref(&elem(), tag),
            len: *len,
        },
        Kind::Map { value } => DecodeStrategy::Map(codec_ref(&value(), tag)),
        Kind::Pointer { elem } => DecodeStrategy::Pointer(codec_ref(&elem(), tag)),
        Kind::Struct { .. } => DecodeStrategy::Struct(fields::fields_ref(shape, tag)),
        _ => DecodeStrategy::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::Reflect;
    use chrono::NaiveDateTime;

    #[test]
    fn test_literal_strategies() {
        let entry = dispatch(&i16::shape(), "excel");
        assert!(matches!(entry.encode, EncodeStrategy::Literal(LiteralKind::Int)));
        assert!(matches!(entry.decode, DecodeStrategy::Literal(LiteralKind::Int)));

        let entry = dispatch(&f32::shape(), "excel");
        assert!(matches!(
            entry.encode,
            EncodeStrategy::Literal(LiteralKind::Float { bits: 32 })
        ));
    }

    #[test]
    fn test_bytes_are_a_single_value() {
        let entry = dispatch(&Vec::<u8>::shape(), "excel");
        assert!(matches!(entry.encode, EncodeStrategy::Bytes));
        assert!(matches!(entry.decode, DecodeStrategy::Bytes));

        // fixed arrays of bytes still expand
        let entry = dispatch(&<[u8; 4]>::shape(), "excel");
        assert!(matches!(
            entry.decode,
            DecodeStrategy::Seq { len: Some(4), .. }
        ));
    }

    #[test]
    fn test_pointer_and_time_strategies() {
        let entry = dispatch(&Option::<NaiveDateTime>::shape(), "excel");
        let EncodeStrategy::Pointer(inner) = &entry.encode else {
            panic!("expected pointer strategy");
        };
        assert!(matches!(inner.get().encode, EncodeStrategy::DateTime));
    }

    #[test]
    fn test_opaque_is_unsupported() {
        let entry = dispatch(&<()>::shape(), "excel");
        assert!(matches!(entry.encode, EncodeStrategy::Unsupported));
        assert!(matches!(entry.decode, DecodeStrategy::Unsupported));
    }

    #[test]
    fn test_same_type_same_entry() {
        let a = codec_ref(&String::shape(), "excel");
        let b = codec_ref(&String::shape(), "excel");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
