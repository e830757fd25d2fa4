/// Declares a struct and implements [`Reflect`](crate::reflect::Reflect) for it.
///
/// Fields may carry a `#[tag(key = "value", ...)]` attribute, one entry per
/// tag key. The value uses the `name[,omitempty][,inline]` syntax; `-`
/// excludes the field. Only `pub` fields are exported.
///
/// ```
/// use royalbit_sheetmap::record;
///
/// record! {
///     #[derive(Debug, Default, Clone, PartialEq)]
///     pub struct Employee {
///         #[tag(excel = "id")]
///         pub id: i64,
///         #[tag(excel = "name,omitempty")]
///         pub name: String,
///         #[tag(excel = "-")]
///         pub internal: bool,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[doc = $fdoc:expr])*
                $(#[tag($($key:ident = $val:literal),* $(,)?)])?
                $fvis:vis $field:ident : $fty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[doc = $fdoc])*
                $fvis $field: $fty,
            )*
        }

        impl $crate::reflect::Reflect for $name {
            fn shape() -> $crate::reflect::Shape {
                $crate::reflect::Shape::new::<$name>($crate::reflect::Kind::Struct {
                    fields: ::std::vec![
                        $(
                            $crate::reflect::FieldDef {
                                ident: ::std::stringify!($field),
                                tags: &[$($((::std::stringify!($key), $val)),*)?],
                                exported: !::std::stringify!($fvis).is_empty(),
                                shape: <$fty as $crate::reflect::Reflect>::shape,
                            },
                        )*
                    ],
                })
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn value_ref(&self) -> $crate::reflect::ValueRef<'_> {
                $crate::reflect::ValueRef::Struct(self)
            }

            fn value_mut(&mut self) -> $crate::reflect::ValueMut<'_> {
                $crate::reflect::ValueMut::Struct(self)
            }
        }

        impl $crate::reflect::StructRef for $name {
            fn field(&self, index: usize) -> ::std::option::Option<&dyn $crate::reflect::Reflect> {
                let fields: &[&dyn $crate::reflect::Reflect] =
                    &[$(&self.$field as &dyn $crate::reflect::Reflect),*];
                fields.get(index).copied()
            }
        }

        impl $crate::reflect::StructMut for $name {
            #[allow(unused_assignments, unused_mut, unused_variables)]
            fn field_mut(
                &mut self,
                index: usize,
            ) -> ::std::option::Option<&mut dyn $crate::reflect::Reflect> {
                let mut position = 0usize;
                $(
                    if index == position {
                        return ::std::option::Option::Some(&mut self.$field);
                    }
                    position += 1;
                )*
                ::std::option::Option::None
            }
        }
    };
}

/// Implements [`Reflect`](crate::reflect::Reflect) for a type with no
/// tabular kind of its own, optionally wiring its
/// [`CellMarshal`](crate::reflect::CellMarshal) and
/// [`CellUnmarshal`](crate::reflect::CellUnmarshal) impls in as hooks.
///
/// ```
/// use royalbit_sheetmap::reflect::{CellMarshal, CellUnmarshal};
/// use royalbit_sheetmap::{reflect_opaque, BoxError};
///
/// #[derive(Debug, Default)]
/// struct Tags(Vec<String>);
///
/// impl CellMarshal for Tags {
///     fn marshal_cells(&self) -> Result<Vec<String>, BoxError> {
///         Ok(vec![self.0.join("|")])
///     }
/// }
///
/// impl CellUnmarshal for Tags {
///     fn unmarshal_cells(&mut self, cells: &[String]) -> Result<(), BoxError> {
///         self.0 = cells.iter().flat_map(|c| c.split('|')).map(String::from).collect();
///         Ok(())
///     }
/// }
///
/// reflect_opaque!(Tags, marshal, unmarshal);
/// ```
#[macro_export]
macro_rules! reflect_opaque {
    (@impl $ty:ty, $marshal:expr, $unmarshal:expr) => {
        impl $crate::reflect::Reflect for $ty {
            fn shape() -> $crate::reflect::Shape {
                $crate::reflect::Shape::new::<$ty>($crate::reflect::Kind::Opaque).with_hooks(
                    $crate::reflect::Hooks {
                        marshal: $marshal,
                        unmarshal: $unmarshal,
                    },
                )
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn value_ref(&self) -> $crate::reflect::ValueRef<'_> {
                $crate::reflect::ValueRef::Opaque
            }

            fn value_mut(&mut self) -> $crate::reflect::ValueMut<'_> {
                $crate::reflect::ValueMut::Opaque
            }
        }
    };
    ($ty:ty) => {
        $crate::reflect_opaque!(@impl $ty, None, None);
    };
    ($ty:ty, marshal) => {
        $crate::reflect_opaque!(
            @impl $ty,
            Some($crate::reflect::marshal_hook::<$ty> as $crate::reflect::MarshalFn),
            None
        );
    };
    ($ty:ty, unmarshal) => {
        $crate::reflect_opaque!(
            @impl $ty,
            None,
            Some($crate::reflect::unmarshal_hook::<$ty> as $crate::reflect::UnmarshalFn)
        );
    };
    ($ty:ty, marshal, unmarshal) => {
        $crate::reflect_opaque!(
            @impl $ty,
            Some($crate::reflect::marshal_hook::<$ty> as $crate::reflect::MarshalFn),
            Some($crate::reflect::unmarshal_hook::<$ty> as $crate::reflect::UnmarshalFn)
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::reflect::{Kind, Reflect, ValueRef};

    record! {
        #[derive(Debug, Default)]
        struct Sample {
            #[tag(excel = "a,omitempty", json = "alpha")]
            pub a: i32,
            /// Private and untagged.
            b: String,
        }
    }

    #[test]
    fn test_record_macro_describes_fields() {
        let shape = Sample::shape();
        let Kind::Struct { fields } = shape.kind else {
            panic!("expected struct kind");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].ident, "a");
        assert_eq!(fields[0].tag("excel"), Some("a,omitempty"));
        assert_eq!(fields[0].tag("json"), Some("alpha"));
        assert!(fields[0].exported);
        assert_eq!(fields[1].ident, "b");
        assert_eq!(fields[1].tag("excel"), None);
        assert!(!fields[1].exported);
    }

    #[test]
    fn test_record_macro_field_access() {
        let mut s = Sample {
            a: 7,
            b: "x".to_string(),
        };
        let ValueRef::Struct(view) = s.value_ref() else {
            panic!("expected struct view");
        };
        assert!(matches!(view.field(0).map(|f| f.value_ref()), Some(ValueRef::Int(7))));
        assert!(view.field(2).is_none());

        if let crate::reflect::ValueMut::Struct(fields) = s.value_mut() {
            assert!(fields.field_mut(1).is_some());
            assert!(fields.field_mut(5).is_none());
        }
        assert_eq!(s.b, "x");
    }
}
