//! Self-describing record types
//!
//! A type that can be mapped onto sheet cells implements [`Reflect`]. The
//! trait exposes two things:
//! - a static [`Shape`]: the type's identity, its [`Kind`], and any custom
//!   marshal/unmarshal [`Hooks`];
//! - dynamic access to a live value for reading ([`ValueRef`]) and
//!   writing ([`ValueMut`]).
//!
//! Structs normally get their impl from the [`record!`](crate::record)
//! macro, custom cell types from [`reflect_opaque!`](crate::reflect_opaque).

mod impls;
mod macros;

use crate::error::BoxError;
use chrono::NaiveDateTime;
use std::any::{Any, TypeId};
use std::fmt;

/// Lazily produces a child shape; keeps recursive types finite.
pub type ShapeFn = fn() -> Shape;

/// Custom marshal hook: renders a value as one or more cell strings.
pub type MarshalFn = fn(&dyn Reflect) -> Result<Vec<String>, BoxError>;

/// Custom unmarshal hook: fills a value from the non-empty cells of its field.
pub type UnmarshalFn = fn(&mut dyn Reflect, &[String]) -> Result<(), BoxError>;

/// Static description of a reflectable type.
#[derive(Clone)]
pub struct Shape {
    pub id: TypeId,
    pub name: &'static str,
    pub kind: Kind,
    pub hooks: Hooks,
}

impl Shape {
    pub fn new<T: 'static>(kind: Kind) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind,
            hooks: Hooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Follows pointer kinds down to the first non-pointer shape.
    pub fn pointee(&self) -> Shape {
        let mut shape = self.clone();
        while let Kind::Pointer { elem } = shape.kind {
            shape = elem();
        }
        shape
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, Kind::Struct { .. })
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

#[derive(Clone, Copy, Default)]
pub struct Hooks {
    pub marshal: Option<MarshalFn>,
    pub unmarshal: Option<UnmarshalFn>,
}

#[derive(Clone)]
pub enum Kind {
    Int { bits: u8 },
    Uint { bits: u8 },
    Float { bits: u8 },
    Bool,
    Str,
    DateTime,
    /// `len` is `Some` for fixed-size arrays.
    Seq { elem: ShapeFn, len: Option<usize> },
    /// String-keyed map.
    Map { value: ShapeFn },
    /// Nullable (`Option`) or owning (`Box`) indirection.
    Pointer { elem: ShapeFn },
    Struct { fields: Vec<FieldDef> },
    /// No tabular mapping without hooks.
    Opaque,
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Int { bits } => write!(f, "Int({bits})"),
            Kind::Uint { bits } => write!(f, "Uint({bits})"),
            Kind::Float { bits } => write!(f, "Float({bits})"),
            Kind::Bool => write!(f, "Bool"),
            Kind::Str => write!(f, "Str"),
            Kind::DateTime => write!(f, "DateTime"),
            Kind::Seq { elem, len } => write!(f, "Seq({}, {:?})", elem().name, len),
            Kind::Map { value } => write!(f, "Map({})", value().name),
            Kind::Pointer { elem } => write!(f, "Pointer({})", elem().name),
            Kind::Struct { fields } => {
                let names: Vec<&str> = fields.iter().map(|d| d.ident).collect();
                write!(f, "Struct{names:?}")
            }
            Kind::Opaque => write!(f, "Opaque"),
        }
    }
}

/// One declared struct field.
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub ident: &'static str,
    /// `(tag key, tag value)` pairs, e.g. `("excel", "id,omitempty")`.
    pub tags: &'static [(&'static str, &'static str)],
    /// `pub` fields are exported; private ones are only explored when inline.
    pub exported: bool,
    pub shape: ShapeFn,
}

impl FieldDef {
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

/// Owned scalar handed to [`ScalarMut::assign`].
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    DateTime(NaiveDateTime),
}

/// Read view of a value.
pub enum ValueRef<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Str(&'a str),
    DateTime(NaiveDateTime),
    Seq(&'a dyn SeqRef),
    Map(Vec<(&'a str, &'a dyn Reflect)>),
    Pointer(Option<&'a dyn Reflect>),
    Struct(&'a dyn StructRef),
    Opaque,
}

/// Write view of a value.
pub enum ValueMut<'a> {
    Scalar(&'a mut dyn ScalarMut),
    Seq(&'a mut dyn SeqMut),
    Map(&'a mut dyn MapMut),
    Pointer(&'a mut dyn PointerMut),
    Struct(&'a mut dyn StructMut),
    Opaque,
}

pub trait SeqRef {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&dyn Reflect>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait StructRef {
    fn field(&self, index: usize) -> Option<&dyn Reflect>;
}

pub trait ScalarMut {
    /// Stores `value`, failing when it does not fit the target type.
    fn assign(&mut self, value: Scalar) -> Result<(), String>;
}

pub trait SeqMut {
    /// Variable sequences resize to `len`; fixed arrays keep their length
    /// and reset positions at or beyond `len` to the default. Returns the
    /// resulting length.
    fn set_len(&mut self, len: usize) -> usize;
    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;
}

pub trait MapMut {
    /// Returns the value stored under `key`, inserting a default first.
    fn entry(&mut self, key: &str) -> &mut dyn Reflect;
}

pub trait PointerMut {
    fn is_null(&self) -> bool;
    /// Returns the pointee, allocating a default one when null.
    fn get_or_alloc(&mut self) -> &mut dyn Reflect;
}

pub trait StructMut {
    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;
}

/// A type that can be walked by the encoder and filled by the decoder.
pub trait Reflect: Any {
    fn shape() -> Shape
    where
        Self: Sized;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn value_ref(&self) -> ValueRef<'_>;
    fn value_mut(&mut self) -> ValueMut<'_>;
}

/// Renders cells for a custom type; wired up by `reflect_opaque!`.
pub trait CellMarshal {
    fn marshal_cells(&self) -> Result<Vec<String>, BoxError>;
}

/// Parses cells into a custom type; wired up by `reflect_opaque!`.
pub trait CellUnmarshal {
    fn unmarshal_cells(&mut self, cells: &[String]) -> Result<(), BoxError>;
}

/// Adapts a [`CellMarshal`] impl to a [`MarshalFn`].
pub fn marshal_hook<T: Reflect + CellMarshal>(value: &dyn Reflect) -> Result<Vec<String>, BoxError> {
    match value.as_any().downcast_ref::<T>() {
        Some(v) => v.marshal_cells(),
        None => Err(format!("marshal hook expects {}", std::any::type_name::<T>()).into()),
    }
}

/// Adapts a [`CellUnmarshal`] impl to an [`UnmarshalFn`].
pub fn unmarshal_hook<T: Reflect + CellUnmarshal>(
    value: &mut dyn Reflect,
    cells: &[String],
) -> Result<(), BoxError> {
    match value.as_any_mut().downcast_mut::<T>() {
        Some(v) => v.unmarshal_cells(cells),
        None => Err(format!("unmarshal hook expects {}", std::any::type_name::<T>()).into()),
    }
}

/// Kind-appropriate zero check used by the `omitempty` rule.
pub fn is_empty_value(value: &dyn Reflect) -> bool {
    match value.value_ref() {
        ValueRef::Int(n) => n == 0,
        ValueRef::Uint(n) => n == 0,
        ValueRef::Float(n) => n == 0.0,
        ValueRef::Bool(b) => !b,
        ValueRef::Str(s) => s.is_empty(),
        ValueRef::Seq(s) => s.is_empty(),
        ValueRef::Map(entries) => entries.is_empty(),
        ValueRef::Pointer(p) => p.is_none(),
        ValueRef::DateTime(_) | ValueRef::Struct(_) | ValueRef::Opaque => false,
    }
}
