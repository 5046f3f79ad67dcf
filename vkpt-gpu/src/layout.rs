//! Layout descriptions shared by the host structs and the shader-side
//! declarations.
//!
//! Every struct uploaded to the GPU is declared once through [`schema!`],
//! which produces both the `#[repr(C)]` Pod struct and a [`Schema`] listing
//! its `{name, type, count}` records; the shader declarations are generated
//! from the latter with [`Schema::glsl()`].

use glam::{Mat4, UVec4, Vec2, Vec4};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    F32,
    U32,
    I32,
    Vec2,
    Vec4,
    UVec4,
    Mat4,
    Struct(&'static Schema),
}

impl FieldType {
    pub const fn size(self) -> usize {
        match self {
            FieldType::F32 | FieldType::U32 | FieldType::I32 => 4,
            FieldType::Vec2 => 8,
            FieldType::Vec4 | FieldType::UVec4 => 16,
            FieldType::Mat4 => 64,
            FieldType::Struct(schema) => schema.size(),
        }
    }

    pub const fn align(self) -> usize {
        match self {
            FieldType::F32 | FieldType::U32 | FieldType::I32 => 4,
            FieldType::Vec2 => 8,
            FieldType::Vec4 | FieldType::UVec4 | FieldType::Mat4 => 16,
            FieldType::Struct(schema) => schema.align(),
        }
    }

    pub fn glsl(self) -> &'static str {
        match self {
            FieldType::F32 => "float",
            FieldType::U32 => "uint",
            FieldType::I32 => "int",
            FieldType::Vec2 => "vec2",
            FieldType::Vec4 => "vec4",
            FieldType::UVec4 => "uvec4",
            FieldType::Mat4 => "mat4",
            FieldType::Struct(schema) => schema.name,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub count: usize,
}

impl Field {
    pub const fn size(&self) -> usize {
        self.ty.size() * self.count
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub const fn size(&self) -> usize {
        let mut size = 0;
        let mut idx = 0;

        while idx < self.fields.len() {
            size += self.fields[idx].size();
            idx += 1;
        }

        size
    }

    /// Alignment of the struct, i.e. the largest alignment of its fields.
    pub const fn align(&self) -> usize {
        let mut align = 4;
        let mut idx = 0;

        while idx < self.fields.len() {
            let field_align = self.fields[idx].ty.align();

            if field_align > align {
                align = field_align;
            }

            idx += 1;
        }

        align
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let mut offset = 0;

        for field in self.fields {
            if field.name == name {
                return Some(offset);
            }

            offset += field.size();
        }

        None
    }

    /// Checks that the struct has no implicit padding under std430 rules, i.e.
    /// that the host-side `#[repr(C)]` layout and the shader-side layout agree
    /// byte for byte.
    pub fn validate(&self) -> Result<(), String> {
        let mut offset = 0;

        for field in self.fields {
            if offset % field.ty.align() != 0 {
                return Err(format!(
                    "{}.{} is at offset {offset}, which is not aligned to {}",
                    self.name,
                    field.name,
                    field.ty.align()
                ));
            }

            if let FieldType::Struct(schema) = field.ty {
                schema.validate()?;
            }

            offset += field.size();
        }

        if offset % self.align() != 0 {
            return Err(format!(
                "{} has size {offset}, which is not a multiple of {}",
                self.name,
                self.align()
            ));
        }

        Ok(())
    }

    /// Generates GLSL declaration of this struct, preceded by declarations of
    /// all structs it nests.
    pub fn glsl(&self) -> String {
        let mut out = String::new();

        for field in self.fields {
            if let FieldType::Struct(schema) = field.ty {
                out += &schema.glsl();
                out += "\n";
            }
        }

        out += &format!("struct {} {{\n", self.name);

        for field in self.fields {
            if field.count == 1 {
                out += &format!("    {} {};\n", field.ty.glsl(), field.name);
            } else {
                out += &format!(
                    "    {} {}[{}];\n",
                    field.ty.glsl(),
                    field.name,
                    field.count
                );
            }
        }

        out += "};\n";
        out
    }
}

/// Type that can appear as a field of a [`schema!`] struct.
pub trait SchemaType {
    const FIELD: FieldType;
    const COUNT: usize = 1;
}

/// Struct declared through [`schema!`].
pub trait HasSchema: bytemuck::Pod {
    const SCHEMA: Schema;
}

macro_rules! schema_types {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl SchemaType for $ty {
                const FIELD: FieldType = FieldType::$field;
            }
        )*
    };
}

schema_types! {
    f32 => F32,
    u32 => U32,
    i32 => I32,
    Vec2 => Vec2,
    Vec4 => Vec4,
    UVec4 => UVec4,
    Mat4 => Mat4,
}

impl<T, const N: usize> SchemaType for [T; N]
where
    T: SchemaType,
{
    const FIELD: FieldType = T::FIELD;
    const COUNT: usize = N * T::COUNT;
}

/// Declares a GPU-visible struct together with its [`Schema`].
macro_rules! schema {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                pub $field:ident: $ty:ty,
            )*
        }
    ) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $crate::HasSchema for $name {
            const SCHEMA: $crate::Schema = $crate::Schema {
                name: stringify!($name),
                fields: &[
                    $(
                        $crate::Field {
                            name: stringify!($field),
                            ty: <$ty as $crate::SchemaType>::FIELD,
                            count: <$ty as $crate::SchemaType>::COUNT,
                        },
                    )*
                ],
            };
        }

        impl $crate::SchemaType for $name {
            const FIELD: $crate::FieldType =
                $crate::FieldType::Struct(&<$name as $crate::HasSchema>::SCHEMA);
        }
    };
}

pub(crate) use schema;
