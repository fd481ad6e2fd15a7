//! Restriction and hint vocabulary

use serde::{Deserialize, Serialize};

/// A literal value carried by a restriction argument or a `default`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RestrictionValue {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Validated field/type restrictions. Range bounds are checked at
/// type-check time; nothing here is evaluated per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Restriction {
    IntRange {
        low: i64,
        high: i64,
        inclusive_low: bool,
        inclusive_high: bool,
    },
    FloatRange {
        low: f64,
        high: f64,
        inclusive_low: bool,
        inclusive_high: bool,
    },
    NonNull,
    Unique,
    Singleton,
    Monotone,
    Default(RestrictionValue),
    Coding(String),
    ConstantLengthPointer,
}

impl Restriction {
    /// The lowercase name this restriction is written with in schema source.
    pub fn name(&self) -> &'static str {
        match self {
            Restriction::IntRange { .. } | Restriction::FloatRange { .. } => "range",
            Restriction::NonNull => "nonnull",
            Restriction::Unique => "unique",
            Restriction::Singleton => "singleton",
            Restriction::Monotone => "monotone",
            Restriction::Default(_) => "default",
            Restriction::Coding(_) => "coding",
            Restriction::ConstantLengthPointer => "constantlengthpointer",
        }
    }
}

/// Field and type hints. Unlike restrictions these never affect the wire
/// format; they steer generated bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hint {
    Unique,
    Pure,
    Distributed,
    OnDemand,
    Monotone,
    ReadOnly,
    Ignore,
    Hide,
}

impl Hint {
    pub fn from_name(name: &str) -> Option<Hint> {
        match name.to_lowercase().as_str() {
            "unique" => Some(Hint::Unique),
            "pure" => Some(Hint::Pure),
            "distributed" => Some(Hint::Distributed),
            "ondemand" => Some(Hint::OnDemand),
            "monotone" => Some(Hint::Monotone),
            "readonly" => Some(Hint::ReadOnly),
            "ignore" => Some(Hint::Ignore),
            "hide" => Some(Hint::Hide),
            _ => None,
        }
    }
}
