//! Reflective field values
//!
//! Generated bindings hold typed cells; the core runtime stores the same
//! data as a tagged sum so one encoder and one decoder cover every field
//! shape, including fields of types the binding does not know.

use skill_core::{FieldType, GroundType};

/// One field cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    /// Also carries `v64`-typed fields; the distinction is wire-only.
    I64(i64),
    F32(f32),
    F64(f64),
    /// `None` is the null string (pool index 0).
    String(Option<String>),
    /// Reference to an instance of the field's declared type; 0 is null.
    /// Skill ids index the referenced type's base pool.
    Ref(u64),
    /// Annotation: a reference to any user type, carried with the name of
    /// the target's base type. `None` is null, written as `(0, 0)`.
    Annotation(Option<(String, u64)>),
    /// Fixed arrays, var arrays and lists.
    Array(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// The empty cell a fresh instance starts with.
    pub fn default_for(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Ground(g) => match g {
                GroundType::Bool => Value::Bool(false),
                GroundType::I8 => Value::I8(0),
                GroundType::I16 => Value::I16(0),
                GroundType::I32 => Value::I32(0),
                GroundType::I64 | GroundType::V64 => Value::I64(0),
                GroundType::F32 => Value::F32(0.0),
                GroundType::F64 => Value::F64(0.0),
                GroundType::String => Value::String(None),
                GroundType::Annotation => Value::Annotation(None),
            },
            FieldType::UserRef(_) => Value::Ref(0),
            FieldType::FixedArray { elem, length } => Value::Array(
                (0..*length).map(|_| Value::default_for(elem)).collect(),
            ),
            FieldType::VarArray(_) | FieldType::List(_) => Value::Array(Vec::new()),
            FieldType::Set(_) => Value::Set(Vec::new()),
            FieldType::Map(_) => Value::Map(Vec::new()),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_arrays_default_to_their_length() {
        let ft = FieldType::FixedArray {
            elem: Box::new(FieldType::Ground(GroundType::I32)),
            length: 3,
        };
        assert_eq!(
            Value::default_for(&ft),
            Value::Array(vec![Value::I32(0), Value::I32(0), Value::I32(0)])
        );
    }

    #[test]
    fn reference_types_default_to_null() {
        assert_eq!(
            Value::default_for(&FieldType::Ground(GroundType::Annotation)),
            Value::Annotation(None)
        );
        assert_eq!(
            Value::default_for(&FieldType::Ground(GroundType::String)),
            Value::String(None)
        );
    }
}
