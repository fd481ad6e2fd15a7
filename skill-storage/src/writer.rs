//! Block serialization
//!
//! Writing is two-phase: field data streams into an `OutBuffer` first
//! (interning every reachable string on the way), and only once the
//! per-field end offsets are known are the string block and type block
//! emitted, followed by a copy of the buffer. The state machine drives
//! this from `SkillState::write` and `SkillState::append`.

use crate::error::{StateError, StateResult};
use crate::pool::{StoragePool, TypeOrderIter};
use crate::string_pool::StringPool;
use crate::value::Value;
use skill_core::{Field, FieldType, GroundType, TypeContext, TypeId};
use skill_wire::{type_ids, OutBuffer};
use std::io::Write;

/// Where one type's instances land in its base pool for the block being
/// written.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeLayout {
    pub lbpsi: u64,
    pub count: u64,
}

/// Assign skill ids for the block being written and compute each type's
/// LBPSI and dynamic count. Walks every base tree in type order and hands
/// out consecutive indices, so every type's dynamic range is contiguous.
///
/// A full write lays out `data` and `new_objects`; an append continues
/// the id space after the existing instances with new objects only.
pub(crate) fn layout(
    ctx: &TypeContext,
    pools: &mut [StoragePool],
    include_data: bool,
) -> Vec<TypeLayout> {
    let mut layouts = vec![TypeLayout { lbpsi: 0, count: 0 }; pools.len()];

    for base in ctx.bases() {
        let types = ctx.subtree(base);
        let mut next = if include_data {
            1
        } else {
            types
                .iter()
                .map(|t| pools[t.0].data_len())
                .sum::<u64>()
                + 1
        };

        // Preorder: a type's own instances first, then its subtrees, so
        // each subtree's start index is simply the cursor on entry.
        for &t in &types {
            layouts[t.0].lbpsi = next;
            let pool = &mut pools[t.0];
            if include_data {
                for obj in &mut pool.data {
                    if obj.is_deleted() {
                        continue;
                    }
                    obj.skill_id = next;
                    next += 1;
                }
            }
            for obj in &mut pool.new_objects {
                if obj.is_deleted() {
                    continue;
                }
                obj.skill_id = next;
                next += 1;
            }
        }
        for &t in &types {
            layouts[t.0].count = ctx
                .subtree(t)
                .iter()
                .map(|u| {
                    let pool = &pools[u.0];
                    let live = |objs: &[crate::pool::Obj]| {
                        objs.iter().filter(|o| !o.is_deleted()).count() as u64
                    };
                    if include_data {
                        live(&pool.data) + live(&pool.new_objects)
                    } else {
                        live(&pool.new_objects)
                    }
                })
                .sum();
        }
    }

    layouts
}

/// Sum of field counts of `t`'s proper ancestors: the cell index where
/// `t`'s own fields start on every instance at or below `t`.
pub(crate) fn field_offset(ctx: &TypeContext, t: TypeId) -> usize {
    let mut off = 0;
    let mut cursor = ctx.decl(t).super_type;
    while let Some(s) = cursor {
        off += ctx.decl(s).fields.len();
        cursor = ctx.decl(s).super_type;
    }
    off
}

fn ground_type_id(g: GroundType) -> u64 {
    match g {
        GroundType::Annotation => type_ids::ANNOTATION,
        GroundType::Bool => type_ids::BOOL,
        GroundType::I8 => type_ids::I8,
        GroundType::I16 => type_ids::I16,
        GroundType::I32 => type_ids::I32,
        GroundType::I64 => type_ids::I64,
        GroundType::V64 => type_ids::V64,
        GroundType::F32 => type_ids::F32,
        GroundType::F64 => type_ids::F64,
        GroundType::String => type_ids::STRING,
    }
}

/// Wire id of a base (non-container) type.
fn base_type_id(ft: &FieldType) -> u64 {
    match ft {
        FieldType::Ground(g) => ground_type_id(*g),
        FieldType::UserRef(TypeId(k)) => type_ids::USER_BASE + *k as u64,
        // Containers never nest in the surface language.
        _ => unreachable!("container element is always a base type"),
    }
}

/// Emit the type id and payload of one field record. A constant field is
/// written as its `CONST_*` id followed by the constant value, which is
/// how the value stays recoverable from the wire without instance data.
pub(crate) fn write_field_record_type(out: &mut OutBuffer, field: &Field) {
    if !field.is_constant {
        write_field_type(out, &field.field_type);
        return;
    }
    let value = field.constant_value.unwrap_or(0);
    match &field.field_type {
        FieldType::Ground(GroundType::I8) => {
            out.write_v64(type_ids::CONST_I8);
            out.write_i8(value as i8);
        }
        FieldType::Ground(GroundType::I16) => {
            out.write_v64(type_ids::CONST_I16);
            out.write_i16(value as i16);
        }
        FieldType::Ground(GroundType::I32) => {
            out.write_v64(type_ids::CONST_I32);
            out.write_i32(value as i32);
        }
        FieldType::Ground(GroundType::I64) => {
            out.write_v64(type_ids::CONST_I64);
            out.write_i64(value);
        }
        FieldType::Ground(GroundType::V64) => {
            out.write_v64(type_ids::CONST_V64);
            out.write_v64(value as u64);
        }
        // The type checker only admits integral ground constants.
        _ => unreachable!("constant fields always have an integral ground type"),
    }
}

/// Emit a field's type id plus its type-specific payload.
pub(crate) fn write_field_type(out: &mut OutBuffer, ft: &FieldType) {
    match ft {
        FieldType::Ground(g) => out.write_v64(ground_type_id(*g)),
        FieldType::UserRef(TypeId(k)) => out.write_v64(type_ids::USER_BASE + *k as u64),
        FieldType::FixedArray { elem, length } => {
            out.write_v64(type_ids::FIXED_ARRAY);
            out.write_v64(*length);
            out.write_v64(base_type_id(elem));
        }
        FieldType::VarArray(elem) => {
            out.write_v64(type_ids::VAR_ARRAY);
            out.write_v64(base_type_id(elem));
        }
        FieldType::List(elem) => {
            out.write_v64(type_ids::LIST);
            out.write_v64(base_type_id(elem));
        }
        FieldType::Set(elem) => {
            out.write_v64(type_ids::SET);
            out.write_v64(base_type_id(elem));
        }
        FieldType::Map(elems) => {
            out.write_v64(type_ids::MAP);
            out.write_v64(elems.len() as u64);
            for elem in elems {
                out.write_v64(base_type_id(elem));
            }
        }
    }
}

/// Encodes cells of one field, interning strings as they stream by.
pub(crate) struct FieldEncoder<'a> {
    pub strings: &'a mut StringPool,
    pub type_name: &'a str,
    pub field_name: &'a str,
}

impl FieldEncoder<'_> {
    fn mismatch(&self, reason: &str) -> StateError {
        StateError::ValueMismatch {
            type_name: self.type_name.to_string(),
            field: self.field_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn encode(&mut self, out: &mut OutBuffer, ft: &FieldType, v: &Value) -> StateResult<()> {
        match (ft, v) {
            (FieldType::Ground(GroundType::Bool), Value::Bool(b)) => out.write_bool(*b),
            (FieldType::Ground(GroundType::I8), Value::I8(n)) => out.write_i8(*n),
            (FieldType::Ground(GroundType::I16), Value::I16(n)) => out.write_i16(*n),
            (FieldType::Ground(GroundType::I32), Value::I32(n)) => out.write_i32(*n),
            (FieldType::Ground(GroundType::I64), Value::I64(n)) => out.write_i64(*n),
            (FieldType::Ground(GroundType::V64), Value::I64(n)) => out.write_v64(*n as u64),
            (FieldType::Ground(GroundType::F32), Value::F32(n)) => out.write_f32(*n),
            (FieldType::Ground(GroundType::F64), Value::F64(n)) => out.write_f64(*n),
            (FieldType::Ground(GroundType::String), Value::String(s)) => match s {
                None => out.write_v64(0),
                Some(s) => {
                    let id = self.strings.intern(s);
                    out.write_v64(id);
                }
            },
            // The null annotation is two zero bytes.
            (FieldType::Ground(GroundType::Annotation), Value::Annotation(a)) => match a {
                None => {
                    out.write_v64(0);
                    out.write_v64(0);
                }
                Some((base_name, id)) => {
                    let name_id = self.strings.intern(base_name);
                    out.write_v64(name_id);
                    out.write_v64(*id);
                }
            },
            (FieldType::UserRef(_), Value::Ref(id)) => out.write_v64(*id),
            (FieldType::FixedArray { elem, length }, Value::Array(items)) => {
                if items.len() as u64 != *length {
                    return Err(self.mismatch(&format!(
                        "fixed array holds {} elements, type says {}",
                        items.len(),
                        length
                    )));
                }
                for item in items {
                    self.encode(out, elem, item)?;
                }
            }
            (FieldType::VarArray(elem), Value::Array(items))
            | (FieldType::List(elem), Value::Array(items)) => {
                out.write_v64(items.len() as u64);
                for item in items {
                    self.encode(out, elem, item)?;
                }
            }
            (FieldType::Set(elem), Value::Set(items)) => {
                out.write_v64(items.len() as u64);
                for item in items {
                    self.encode(out, elem, item)?;
                }
            }
            (FieldType::Map(elems), Value::Map(pairs)) => {
                self.encode_map(out, elems, pairs)?;
            }
            _ => return Err(self.mismatch("value does not match the declared field type")),
        }
        Ok(())
    }

    /// `map<k1, ..., kn>` nests right-associatively: the value side of a
    /// map over more than two base types is itself a map.
    fn encode_map(
        &mut self,
        out: &mut OutBuffer,
        elems: &[FieldType],
        pairs: &[(Value, Value)],
    ) -> StateResult<()> {
        out.write_v64(pairs.len() as u64);
        for (key, value) in pairs {
            self.encode(out, &elems[0], key)?;
            if elems.len() == 2 {
                self.encode(out, &elems[1], value)?;
            } else {
                match value {
                    Value::Map(inner) => self.encode_map(out, &elems[1..], inner)?,
                    _ => return Err(self.mismatch("nested map level must be a map value")),
                }
            }
        }
        Ok(())
    }
}

/// Stream the field data for one block into the side buffer: for every
/// type in type order, for every serialized field it declares, the cells
/// of every live instance in the type's dynamic range.
pub(crate) fn build_field_data(
    ctx: &TypeContext,
    pools: &[StoragePool],
    strings: &mut StringPool,
    new_only: bool,
) -> StateResult<OutBuffer> {
    let mut out = OutBuffer::new();

    for t in ctx.ids() {
        let decl = ctx.decl(t);
        let off = field_offset(ctx, t);
        for (j, field) in decl.fields.iter().enumerate() {
            if !field.on_wire() {
                continue;
            }
            // Constant fields still get an end offset so the type block
            // and the data region stay in step; they contribute no bytes.
            if field.is_serialized() {
                let iter = if new_only {
                    TypeOrderIter::new_only(ctx, pools, t)
                } else {
                    TypeOrderIter::all(ctx, pools, t)
                };
                let mut encoder = FieldEncoder {
                    strings,
                    type_name: &decl.skill_name,
                    field_name: &field.skill_name,
                };
                for (_, obj) in iter {
                    encoder.encode(&mut out, &field.field_type, &obj.fields[off + j])?;
                }
            }
            out.mark_field_end();
        }
    }

    Ok(out)
}

/// Emit one complete block: string block, type block, field data.
///
/// `strings_mark` is the pool length before this block's preparation;
/// only strings interned after it are written. `layouts` comes from
/// [`layout`]; `first` marks types making their first appearance in the
/// file.
pub(crate) fn write_block<W: Write>(
    w: &mut W,
    ctx: &TypeContext,
    pools: &[StoragePool],
    strings: &StringPool,
    strings_mark: u64,
    layouts: &[TypeLayout],
    field_data: &OutBuffer,
) -> StateResult<()> {
    let mut head = OutBuffer::new();

    // String block: count, cumulative end offsets, then the bytes.
    let new_strings = strings.since(strings_mark);
    head.write_v64(new_strings.len() as u64);
    let mut end = 0i32;
    for s in new_strings {
        end += s.len() as i32;
        head.write_i32(end);
    }
    for s in new_strings {
        head.write_raw(s.as_bytes());
    }

    // Type block.
    head.write_v64(ctx.len() as u64);
    let mut offsets = field_data.end_offsets().iter();
    for t in ctx.ids() {
        let decl = ctx.decl(t);
        let pool = &pools[t.0];
        let first = !pool.appeared;
        let name_id = strings
            .id_of(&decl.skill_name)
            .ok_or_else(|| StateError::MissingString(decl.skill_name.clone()))?;

        head.write_v64(name_id);
        if first {
            let super_id = match decl.super_type {
                Some(s) => strings
                    .id_of(&ctx.decl(s).skill_name)
                    .ok_or_else(|| StateError::MissingString(ctx.decl(s).skill_name.clone()))?,
                None => 0,
            };
            head.write_v64(super_id);
            head.write_v64(layouts[t.0].lbpsi);
        }
        head.write_v64(layouts[t.0].count);
        if first {
            // Restriction bodies are not serialized; the count is zero.
            head.write_v64(0);
        }

        let wire_fields: Vec<_> = decl.fields.iter().filter(|f| f.on_wire()).collect();
        head.write_v64(wire_fields.len() as u64);
        for field in wire_fields {
            if first {
                head.write_v64(0); // field restrictions
                write_field_record_type(&mut head, field);
            }
            let field_name_id = strings
                .id_of(&field.skill_name)
                .ok_or_else(|| StateError::MissingString(field.skill_name.clone()))?;
            head.write_v64(field_name_id);
            let end_offset = offsets.next().copied().ok_or_else(|| StateError::Corrupt {
                offset: 0,
                reason: "type block and field data buffer disagree".to_string(),
            })?;
            head.write_v64(end_offset);
        }
    }

    w.write_all(head.as_slice())?;
    w.write_all(field_data.as_slice())?;
    Ok(())
}

/// Intern the names the type block refers to: type names and the names
/// of every wire field, constants included, in type order. Instance
/// strings are interned while the field data streams.
pub(crate) fn prepare_names(ctx: &TypeContext, strings: &mut StringPool) {
    for decl in ctx.iter() {
        strings.intern(&decl.skill_name);
        for field in decl.fields.iter().filter(|f| f.on_wire()) {
            strings.intern(&field.skill_name);
        }
    }
}
