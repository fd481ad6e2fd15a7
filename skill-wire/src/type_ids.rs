//! The wire type-ID table
//!
//! Field types are announced in the type block with these constants. IDs
//! 21..=31 and 16 are reserved; user types start at [`USER_BASE`] plus the
//! type's index in type order.

pub const CONST_I8: u64 = 0;
pub const CONST_I16: u64 = 1;
pub const CONST_I32: u64 = 2;
pub const CONST_I64: u64 = 3;
pub const CONST_V64: u64 = 4;
pub const ANNOTATION: u64 = 5;
pub const BOOL: u64 = 6;
pub const I8: u64 = 7;
pub const I16: u64 = 8;
pub const I32: u64 = 9;
pub const I64: u64 = 10;
pub const V64: u64 = 11;
pub const F32: u64 = 12;
pub const F64: u64 = 13;
pub const STRING: u64 = 14;
pub const FIXED_ARRAY: u64 = 15;
// 16 is reserved and never written.
pub const VAR_ARRAY: u64 = 17;
pub const LIST: u64 = 18;
pub const SET: u64 = 19;
pub const MAP: u64 = 20;

/// First user-type ID; a user type is written as `USER_BASE + type index`.
pub const USER_BASE: u64 = 32;
