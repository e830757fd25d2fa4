//! Built-in `Reflect` impls for scalars, containers and indirections.

use super::{
    Kind, MapMut, PointerMut, Reflect, Scalar, ScalarMut, SeqMut, SeqRef, Shape, ValueMut,
    ValueRef,
};
use chrono::NaiveDateTime;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};

fn mismatch(value: &Scalar, target: &str) -> String {
    format!("cannot assign {value:?} to {target}")
}

macro_rules! reflect_scalar_common {
    ($t:ty, $kind:expr, $this:ident => $read:expr) => {
        impl Reflect for $t {
            fn shape() -> Shape {
                Shape::new::<$t>($kind)
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }

            fn value_ref(&self) -> ValueRef<'_> {
                let $this = self;
                $read
            }

            fn value_mut(&mut self) -> ValueMut<'_> {
                ValueMut::Scalar(self)
            }
        }
    };
}

macro_rules! reflect_int {
    ($($t:ty => $bits:expr),* $(,)?) => {$(
        reflect_scalar_common!($t, Kind::Int { bits: $bits }, v => ValueRef::Int(*v as i64));

        impl ScalarMut for $t {
            fn assign(&mut self, value: Scalar) -> Result<(), String> {
                *self = match value {
                    Scalar::Int(n) => <$t>::try_from(n).map_err(|e| e.to_string())?,
                    Scalar::Uint(n) => <$t>::try_from(n).map_err(|e| e.to_string())?,
                    other => return Err(mismatch(&other, stringify!($t))),
                };
                Ok(())
            }
        }
    )*};
}

macro_rules! reflect_uint {
    ($($t:ty => $bits:expr),* $(,)?) => {$(
        reflect_scalar_common!($t, Kind::Uint { bits: $bits }, v => ValueRef::Uint(*v as u64));

        impl ScalarMut for $t {
            fn assign(&mut self, value: Scalar) -> Result<(), String> {
                *self = match value {
                    Scalar::Int(n) => <$t>::try_from(n).map_err(|e| e.to_string())?,
                    Scalar::Uint(n) => <$t>::try_from(n).map_err(|e| e.to_string())?,
                    other => return Err(mismatch(&other, stringify!($t))),
                };
                Ok(())
            }
        }
    )*};
}

reflect_int!(i8 => 8, i16 => 16, i32 => 32, i64 => 64, isize => 64);
reflect_uint!(u8 => 8, u16 => 16, u32 => 32, u64 => 64, usize => 64);

reflect_scalar_common!(f32, Kind::Float { bits: 32 }, v => ValueRef::Float(f64::from(*v)));
reflect_scalar_common!(f64, Kind::Float { bits: 64 }, v => ValueRef::Float(*v));

impl ScalarMut for f32 {
    fn assign(&mut self, value: Scalar) -> Result<(), String> {
        let wide = match value {
            Scalar::Float(f) => f,
            Scalar::Int(n) => n as f64,
            Scalar::Uint(n) => n as f64,
            other => return Err(mismatch(&other, "f32")),
        };
        let narrow = wide as f32;
        if wide.is_finite() && narrow.is_infinite() {
            return Err(format!("value {wide} out of range for f32"));
        }
        *self = narrow;
        Ok(())
    }
}

impl ScalarMut for f64 {
    fn assign(&mut self, value: Scalar) -> Result<(), String> {
        *self = match value {
            Scalar::Float(f) => f,
            Scalar::Int(n) => n as f64,
            Scalar::Uint(n) => n as f64,
            other => return Err(mismatch(&other, "f64")),
        };
        Ok(())
    }
}

reflect_scalar_common!(bool, Kind::Bool, v => ValueRef::Bool(*v));

impl ScalarMut for bool {
    fn assign(&mut self, value: Scalar) -> Result<(), String> {
        match value {
            Scalar::Bool(b) => {
                *self = b;
                Ok(())
            }
            other => Err(mismatch(&other, "bool")),
        }
    }
}

reflect_scalar_common!(String, Kind::Str, v => ValueRef::Str(v.as_str()));

impl ScalarMut for String {
    fn assign(&mut self, value: Scalar) -> Result<(), String> {
        match value {
            Scalar::Str(s) => {
                *self = s;
                Ok(())
            }
            other => Err(mismatch(&other, "String")),
        }
    }
}

reflect_scalar_common!(NaiveDateTime, Kind::DateTime, v => ValueRef::DateTime(*v));

impl ScalarMut for NaiveDateTime {
    fn assign(&mut self, value: Scalar) -> Result<(), String> {
        match value {
            Scalar::DateTime(dt) => {
                *self = dt;
                Ok(())
            }
            other => Err(mismatch(&other, "NaiveDateTime")),
        }
    }
}

// Sequences

impl<T: Reflect + Default> Reflect for Vec<T> {
    fn shape() -> Shape {
        Shape::new::<Vec<T>>(Kind::Seq {
            elem: T::shape,
            len: None,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Seq(self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Seq(self)
    }
}

impl<T: Reflect> SeqRef for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|v| v as &dyn Reflect)
    }
}

impl<T: Reflect + Default> SeqMut for Vec<T> {
    fn set_len(&mut self, len: usize) -> usize {
        self.resize_with(len, T::default);
        len
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut_slice()
            .get_mut(index)
            .map(|v| v as &mut dyn Reflect)
    }
}

impl<T: Reflect + Default, const N: usize> Reflect for [T; N] {
    fn shape() -> Shape {
        Shape::new::<[T; N]>(Kind::Seq {
            elem: T::shape,
            len: Some(N),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Seq(self)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Seq(self)
    }
}

impl<T: Reflect, const N: usize> SeqRef for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|v| v as &dyn Reflect)
    }
}

impl<T: Reflect + Default, const N: usize> SeqMut for [T; N] {
    fn set_len(&mut self, len: usize) -> usize {
        for slot in self.iter_mut().skip(len) {
            *slot = T::default();
        }
        N
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        self.as_mut_slice()
            .get_mut(index)
            .map(|v| v as &mut dyn Reflect)
    }
}

// Indirections

impl<T: Reflect + Default> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::new::<Option<T>>(Kind::Pointer { elem: T::shape })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Pointer(self.as_ref().map(|v| v as &dyn Reflect))
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Pointer(self)
    }
}

impl<T: Reflect + Default> PointerMut for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn get_or_alloc(&mut self) -> &mut dyn Reflect {
        self.get_or_insert_with(T::default)
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn shape() -> Shape {
        Shape::new::<Box<T>>(Kind::Pointer { elem: T::shape })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Pointer(Some(&**self))
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Pointer(self)
    }
}

impl<T: Reflect> PointerMut for Box<T> {
    fn is_null(&self) -> bool {
        false
    }

    fn get_or_alloc(&mut self) -> &mut dyn Reflect {
        &mut **self
    }
}

// String-keyed maps

fn sorted_entries<'a, I, V>(iter: I) -> Vec<(&'a str, &'a dyn Reflect)>
where
    I: Iterator<Item = (&'a String, &'a V)>,
    V: Reflect,
{
    let mut entries: Vec<(&str, &dyn Reflect)> = iter
        .map(|(k, v)| (k.as_str(), v as &dyn Reflect))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

impl<V: Reflect + Default> Reflect for HashMap<String, V> {
    fn shape() -> Shape {
        Shape::new::<HashMap<String, V>>(Kind::Map { value: V::shape })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Map(sorted_entries(self.iter()))
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Map(self)
    }
}

impl<V: Reflect + Default> MapMut for HashMap<String, V> {
    fn entry(&mut self, key: &str) -> &mut dyn Reflect {
        HashMap::entry(self, key.to_string()).or_default()
    }
}

impl<V: Reflect + Default> Reflect for BTreeMap<String, V> {
    fn shape() -> Shape {
        Shape::new::<BTreeMap<String, V>>(Kind::Map { value: V::shape })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Map(sorted_entries(self.iter()))
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Map(self)
    }
}

impl<V: Reflect + Default> MapMut for BTreeMap<String, V> {
    fn entry(&mut self, key: &str) -> &mut dyn Reflect {
        BTreeMap::entry(self, key.to_string()).or_default()
    }
}

impl Reflect for () {
    fn shape() -> Shape {
        Shape::new::<()>(Kind::Opaque)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn value_ref(&self) -> ValueRef<'_> {
        ValueRef::Opaque
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Opaque
    }
}
