//! Field type representations

use crate::TypeId;
use serde::{Deserialize, Serialize};

/// Built-in SKilL value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroundType {
    I8,
    I16,
    I32,
    I64,
    V64,
    F32,
    F64,
    Bool,
    Annotation,
    String,
}

impl GroundType {
    /// Resolve a type name from schema source. Names are matched exactly;
    /// anything unrecognized is a user-type reference or an error.
    pub fn from_name(name: &str) -> Option<GroundType> {
        match name {
            "i8" => Some(GroundType::I8),
            "i16" => Some(GroundType::I16),
            "i32" => Some(GroundType::I32),
            "i64" => Some(GroundType::I64),
            "v64" => Some(GroundType::V64),
            "f32" => Some(GroundType::F32),
            "f64" => Some(GroundType::F64),
            "bool" => Some(GroundType::Bool),
            "annotation" => Some(GroundType::Annotation),
            "string" => Some(GroundType::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GroundType::I8 => "i8",
            GroundType::I16 => "i16",
            GroundType::I32 => "i32",
            GroundType::I64 => "i64",
            GroundType::V64 => "v64",
            GroundType::F32 => "f32",
            GroundType::F64 => "f64",
            GroundType::Bool => "bool",
            GroundType::Annotation => "annotation",
            GroundType::String => "string",
        }
    }

    /// Integral types admit constant literals and integer range restrictions.
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            GroundType::I8 | GroundType::I16 | GroundType::I32 | GroundType::I64 | GroundType::V64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, GroundType::F32 | GroundType::F64)
    }
}

/// The type of a field. User references hold an arena id rather than an
/// owning pointer, so reference cycles between declarations are fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    Ground(GroundType),
    UserRef(TypeId),
    /// `T[n]` - length is part of the type.
    FixedArray { elem: Box<FieldType>, length: u64 },
    /// `T[]`
    VarArray(Box<FieldType>),
    List(Box<FieldType>),
    Set(Box<FieldType>),
    /// `map<k1, ..., kn>` with n >= 2, nested right-associatively.
    Map(Vec<FieldType>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_type_names_round_trip() {
        for name in [
            "i8",
            "i16",
            "i32",
            "i64",
            "v64",
            "f32",
            "f64",
            "bool",
            "annotation",
            "string",
        ] {
            let g = GroundType::from_name(name).unwrap();
            assert_eq!(g.name(), name);
        }
        assert_eq!(GroundType::from_name("halfFloat"), None);
    }
}
