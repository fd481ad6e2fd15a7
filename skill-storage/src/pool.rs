//! Storage pools
//!
//! One pool per user type. Instances read from a file live in `data`,
//! indexed by their 1-based skill id within the base pool; instances
//! created this session live in `new_objects` and get ids at
//! serialization time. A pool whose type the binding does not know is
//! opaque: every field of every instance goes through `unknown_fields`.

use crate::value::Value;
use skill_core::{FieldType, TypeContext, TypeId};
use std::collections::HashMap;

/// Per-block bookkeeping: where in the base pool this block's instances
/// of one type start, and how many it contributed (subtypes included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub bpsi: u64,
    pub count: u64,
}

/// A field type as announced in a type block. Known and unknown fields
/// share this representation so one decoder covers both.
#[derive(Debug, Clone, PartialEq)]
pub enum WireType {
    /// A constant field; its value lives in the type block and it has no
    /// per-instance bytes.
    Const(i64),
    Annotation,
    Bool,
    I8,
    I16,
    I32,
    I64,
    V64,
    F32,
    F64,
    String,
    FixedArray { length: u64, elem: Box<WireType> },
    VarArray(Box<WireType>),
    List(Box<WireType>),
    Set(Box<WireType>),
    Map(Vec<WireType>),
    /// Reference to the type at this index in type order.
    User(usize),
}

/// A field as it appears on the wire for one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WireField {
    pub name: String,
    pub wire_type: WireType,
}

/// One instance. `skill_id` is 0 until the instance is serialized, and
/// again once it is marked for deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Obj {
    pub skill_id: u64,
    deleted: bool,
    /// Known-field cells, ordered as `TypeContext::all_fields` orders them
    /// (inherited first).
    pub fields: Vec<Value>,
    /// Fields read from a file the binding has no typed accessor for.
    pub unknown_fields: HashMap<String, Value>,
}

impl Obj {
    pub fn new(fields: Vec<Value>) -> Self {
        Self {
            skill_id: 0,
            deleted: false,
            fields,
            unknown_fields: HashMap::new(),
        }
    }

    /// Mark for deletion. The id becomes 0, the null marker; the instance
    /// is skipped by every subsequent serialization.
    pub fn delete(&mut self) {
        self.deleted = true;
        self.skill_id = 0;
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// The instance container for one type.
#[derive(Debug)]
pub struct StoragePool {
    /// `None` for an opaque pool carrying a type only the file knows.
    pub type_id: Option<TypeId>,
    pub name: String,
    pub super_name: Option<String>,
    /// Instances from prior blocks.
    pub data: Vec<Obj>,
    /// Instances created since the last read/write.
    pub new_objects: Vec<Obj>,
    pub blocks: Vec<BlockInfo>,
    /// Whether this type has been emitted to or read from the backing
    /// file; later blocks use the short type-entry form.
    pub appeared: bool,
    /// Field records in wire order, established on first appearance.
    pub wire_fields: Vec<WireField>,
    /// Known-field name → cell index.
    field_slots: HashMap<String, usize>,
    cell_types: Vec<FieldType>,
}

impl StoragePool {
    /// Pool for a type the binding was generated for.
    pub fn for_type(ctx: &TypeContext, id: TypeId) -> Self {
        let decl = ctx.decl(id);
        let all_fields = ctx.all_fields(id);
        let field_slots = all_fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.skill_name.clone(), i))
            .collect();
        let cell_types = all_fields.iter().map(|f| f.field_type.clone()).collect();
        Self {
            type_id: Some(id),
            name: decl.skill_name.clone(),
            super_name: decl
                .super_type
                .map(|s| ctx.decl(s).skill_name.clone()),
            data: Vec::new(),
            new_objects: Vec::new(),
            blocks: Vec::new(),
            appeared: false,
            wire_fields: Vec::new(),
            field_slots,
            cell_types,
        }
    }

    /// Opaque pool for a type found only in a file. Instances carry all
    /// field data in `unknown_fields`.
    pub fn opaque(name: String, super_name: Option<String>) -> Self {
        Self {
            type_id: None,
            name,
            super_name,
            data: Vec::new(),
            new_objects: Vec::new(),
            blocks: Vec::new(),
            appeared: false,
            wire_fields: Vec::new(),
            field_slots: HashMap::new(),
            cell_types: Vec::new(),
        }
    }

    /// A fresh instance with default cells, not yet in any region.
    pub fn make_obj(&self) -> Obj {
        Obj::new(self.cell_types.iter().map(Value::default_for).collect())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.field_slots.get(name).copied()
    }

    /// Reflective read: known fields come from their cell, anything else
    /// from `unknown_fields`.
    pub fn get_value<'a>(&self, obj: &'a Obj, name: &str) -> Option<&'a Value> {
        match self.field_index(name) {
            Some(i) => obj.fields.get(i),
            None => obj.unknown_fields.get(name),
        }
    }

    /// Reflective write, symmetric to [`get_value`](Self::get_value).
    pub fn set_value(&self, obj: &mut Obj, name: &str, value: Value) {
        match self.field_index(name) {
            Some(i) => obj.fields[i] = value,
            None => {
                obj.unknown_fields.insert(name.to_string(), value);
            }
        }
    }

    /// Instances read from the file, 1-based by position within this
    /// pool's slices of the base pool.
    pub fn data_len(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Which regions an iteration covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    All,
    NewOnly,
}

/// Explicit iterator over a pool and its sub-pools in type order. Yields
/// each live instance with its exact type.
pub struct TypeOrderIter<'a> {
    pools: &'a [StoragePool],
    types: Vec<TypeId>,
    region: Region,
    type_cursor: usize,
    obj_cursor: usize,
}

impl<'a> TypeOrderIter<'a> {
    /// All instances (data, then new) of `root` and its subtypes.
    pub fn all(ctx: &TypeContext, pools: &'a [StoragePool], root: TypeId) -> Self {
        Self {
            pools,
            types: ctx.subtree(root),
            region: Region::All,
            type_cursor: 0,
            obj_cursor: 0,
        }
    }

    /// Only instances created since the last session, for append.
    pub fn new_only(ctx: &TypeContext, pools: &'a [StoragePool], root: TypeId) -> Self {
        Self {
            pools,
            types: ctx.subtree(root),
            region: Region::NewOnly,
            type_cursor: 0,
            obj_cursor: 0,
        }
    }

    fn current_objs(&self) -> (&'a [Obj], &'a [Obj]) {
        let pool = &self.pools[self.types[self.type_cursor].0];
        match self.region {
            Region::All => (&pool.data, &pool.new_objects),
            Region::NewOnly => (&[], &pool.new_objects),
        }
    }
}

impl<'a> Iterator for TypeOrderIter<'a> {
    type Item = (TypeId, &'a Obj);

    fn next(&mut self) -> Option<Self::Item> {
        while self.type_cursor < self.types.len() {
            let (first, second) = self.current_objs();
            let total = first.len() + second.len();
            while self.obj_cursor < total {
                let i = self.obj_cursor;
                self.obj_cursor += 1;
                let obj = if i < first.len() {
                    &first[i]
                } else {
                    &second[i - first.len()]
                };
                if !obj.is_deleted() {
                    return Some((self.types[self.type_cursor], obj));
                }
            }
            self.type_cursor += 1;
            self.obj_cursor = 0;
        }
        None
    }
}
