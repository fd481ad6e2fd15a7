//! Block deserialization
//!
//! Reads a file block by block, rebuilding the string pool and instance
//! regions. Types and fields the binding does not know are carried
//! through: unknown types become opaque pools, unknown field values are
//! decoded generically off their wire type and parked per instance.

use crate::error::{StateError, StateResult};
use crate::pool::{BlockInfo, StoragePool, WireField, WireType};
use crate::string_pool::StringPool;
use crate::value::Value;
use skill_core::{TypeContext, TypeId};
use skill_wire::{type_ids, InStream, WireError};
use std::collections::HashMap;

/// Identifies a pool during reading: a binding type or an opaque pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PoolKey {
    Known(TypeId),
    Opaque(usize),
}

/// One type entry of the block currently being read.
struct Entry {
    key: PoolKey,
    count: u64,
    stored_lbpsi: Option<u64>,
    /// `(wire field slot, end offset)` in record order.
    fields: Vec<(usize, u64)>,
}

pub(crate) struct Reader<'a> {
    ctx: &'a TypeContext,
    pools: &'a mut Vec<StoragePool>,
    opaques: &'a mut Vec<StoragePool>,
    strings: &'a mut StringPool,
}

impl<'a> Reader<'a> {
    pub fn new(
        ctx: &'a TypeContext,
        pools: &'a mut Vec<StoragePool>,
        opaques: &'a mut Vec<StoragePool>,
        strings: &'a mut StringPool,
    ) -> Self {
        Self {
            ctx,
            pools,
            opaques,
            strings,
        }
    }

    /// Parse every block in `data`.
    pub fn read_file(&mut self, data: &[u8]) -> StateResult<()> {
        let mut stream = InStream::new(data);
        while !stream.is_at_end() {
            self.read_block(&mut stream)?;
        }
        Ok(())
    }

    fn corrupt(&self, stream: &InStream<'_>, reason: &str) -> StateError {
        StateError::Corrupt {
            offset: stream.pos(),
            reason: reason.to_string(),
        }
    }

    fn pool(&self, key: PoolKey) -> &StoragePool {
        match key {
            PoolKey::Known(t) => &self.pools[t.0],
            PoolKey::Opaque(i) => &self.opaques[i],
        }
    }

    fn pool_mut(&mut self, key: PoolKey) -> &mut StoragePool {
        match key {
            PoolKey::Known(t) => &mut self.pools[t.0],
            PoolKey::Opaque(i) => &mut self.opaques[i],
        }
    }

    /// Skill name of the root of `key`'s inheritance tree, following
    /// super names through known and opaque pools alike.
    fn base_name(&self, key: PoolKey) -> String {
        match key {
            PoolKey::Known(t) => self.ctx.decl(self.ctx.decl(t).base_type).skill_name.clone(),
            PoolKey::Opaque(i) => self.pool_base_name(&self.opaques[i]),
        }
    }

    fn read_block(&mut self, stream: &mut InStream<'_>) -> StateResult<()> {
        self.read_string_block(stream)?;
        let entries = self.read_type_block(stream)?;

        // The field data region: its total size is the last end offset.
        let total = entries
            .iter()
            .flat_map(|e| e.fields.iter().map(|&(_, end)| end))
            .max()
            .unwrap_or(0);
        let field_data = stream.read_bytes(total as usize)?;

        let index = self.create_instances(stream, &entries)?;
        self.decode_field_data(stream, &entries, field_data, &index)
    }

    fn read_string_block(&mut self, stream: &mut InStream<'_>) -> StateResult<()> {
        let count = stream.read_v64()?;
        let mut ends = Vec::with_capacity(count as usize);
        for _ in 0..count {
            ends.push(stream.read_i32()?);
        }
        let mut prev = 0i32;
        for &end in &ends {
            if end < prev {
                return Err(self.corrupt(stream, "string offsets must not decrease"));
            }
            let s = stream.read_string((end - prev) as usize)?;
            self.strings.push_raw(s);
            prev = end;
        }
        Ok(())
    }

    fn read_type_block(&mut self, stream: &mut InStream<'_>) -> StateResult<Vec<Entry>> {
        let type_count = stream.read_v64()?;
        let mut entries = Vec::with_capacity(type_count as usize);

        for _ in 0..type_count {
            let name_id = stream.read_v64()?;
            let name = self
                .strings
                .get(name_id)
                .ok_or_else(|| self.corrupt(stream, "type name index out of range"))?
                .to_string();

            let key = match self.ctx.get(&name) {
                Some(t) => PoolKey::Known(t),
                None => match self.opaques.iter().position(|p| p.name == name) {
                    Some(i) => PoolKey::Opaque(i),
                    None => {
                        self.opaques.push(StoragePool::opaque(name.clone(), None));
                        PoolKey::Opaque(self.opaques.len() - 1)
                    }
                },
            };
            let first = !self.pool(key).appeared;

            let stored_lbpsi = if first {
                let super_id = stream.read_v64()?;
                let super_name = match super_id {
                    0 => None,
                    id => Some(
                        self.strings
                            .get(id)
                            .ok_or_else(|| self.corrupt(stream, "super name index out of range"))?
                            .to_string(),
                    ),
                };
                if let PoolKey::Opaque(_) = key {
                    self.pool_mut(key).super_name = super_name;
                }
                Some(stream.read_v64()?)
            } else {
                None
            };

            let count = stream.read_v64()?;

            if first {
                let restrictions = stream.read_v64()?;
                if restrictions != 0 {
                    return Err(self.corrupt(stream, "restriction bodies are not supported"));
                }
            }

            let field_count = stream.read_v64()?;
            let mut fields = Vec::with_capacity(field_count as usize);
            for k in 0..field_count as usize {
                if k < self.pool(key).wire_fields.len() {
                    // A field this pool already carries: name plus offset.
                    let field_name_id = stream.read_v64()?;
                    let field_name = self
                        .strings
                        .get(field_name_id)
                        .ok_or_else(|| self.corrupt(stream, "field name index out of range"))?;
                    if field_name != self.pool(key).wire_fields[k].name {
                        return Err(
                            self.corrupt(stream, "field order changed between blocks")
                        );
                    }
                    let end = stream.read_v64()?;
                    fields.push((k, end));
                } else {
                    let restrictions = stream.read_v64()?;
                    if restrictions != 0 {
                        return Err(self.corrupt(stream, "restriction bodies are not supported"));
                    }
                    let wire_type = self.parse_wire_type(stream)?;
                    let field_name_id = stream.read_v64()?;
                    let field_name = self
                        .strings
                        .get(field_name_id)
                        .ok_or_else(|| self.corrupt(stream, "field name index out of range"))?
                        .to_string();
                    let end = stream.read_v64()?;
                    self.pool_mut(key).wire_fields.push(WireField {
                        name: field_name,
                        wire_type,
                    });
                    fields.push((k, end));
                }
            }

            entries.push(Entry {
                key,
                count,
                stored_lbpsi,
                fields,
            });
        }

        Ok(entries)
    }

    fn parse_wire_type(&self, stream: &mut InStream<'_>) -> StateResult<WireType> {
        let id = stream.read_v64()?;
        Ok(match id {
            type_ids::CONST_I8 => WireType::Const(stream.read_i8()? as i64),
            type_ids::CONST_I16 => WireType::Const(stream.read_i16()? as i64),
            type_ids::CONST_I32 => WireType::Const(stream.read_i32()? as i64),
            type_ids::CONST_I64 => WireType::Const(stream.read_i64()?),
            type_ids::CONST_V64 => WireType::Const(stream.read_v64()? as i64),
            type_ids::ANNOTATION => WireType::Annotation,
            type_ids::BOOL => WireType::Bool,
            type_ids::I8 => WireType::I8,
            type_ids::I16 => WireType::I16,
            type_ids::I32 => WireType::I32,
            type_ids::I64 => WireType::I64,
            type_ids::V64 => WireType::V64,
            type_ids::F32 => WireType::F32,
            type_ids::F64 => WireType::F64,
            type_ids::STRING => WireType::String,
            type_ids::FIXED_ARRAY => {
                let length = stream.read_v64()?;
                let elem = self.parse_wire_type(stream)?;
                WireType::FixedArray {
                    length,
                    elem: Box::new(elem),
                }
            }
            type_ids::VAR_ARRAY => WireType::VarArray(Box::new(self.parse_wire_type(stream)?)),
            type_ids::LIST => WireType::List(Box::new(self.parse_wire_type(stream)?)),
            type_ids::SET => WireType::Set(Box::new(self.parse_wire_type(stream)?)),
            type_ids::MAP => {
                let n = stream.read_v64()?;
                let mut elems = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    elems.push(self.parse_wire_type(stream)?);
                }
                WireType::Map(elems)
            }
            id if id >= type_ids::USER_BASE => WireType::User((id - type_ids::USER_BASE) as usize),
            id => return Err(WireError::UnknownTypeId { id }.into()),
        })
    }

    /// Create this block's instances. Exact-type ranges are consecutive in
    /// entry (preorder) order, so a single cursor per base tree recovers
    /// every type's start index from the dynamic counts alone.
    fn create_instances(
        &mut self,
        stream: &InStream<'_>,
        entries: &[Entry],
    ) -> StateResult<HashMap<(String, u64), (PoolKey, usize)>> {
        // Dynamic counts of this block's direct children per entry.
        let mut child_counts: HashMap<PoolKey, u64> = HashMap::new();
        for entry in entries {
            if let Some(super_name) = self.pool(entry.key).super_name.clone() {
                let parent = entries.iter().find(|e| self.pool(e.key).name == super_name);
                if let Some(parent) = parent {
                    *child_counts.entry(parent.key).or_insert(0) += entry.count;
                }
            }
        }

        // Ids continue after every instance read from prior blocks, so the
        // per-tree cursors must be fixed before this block adds anything.
        let mut cursors: HashMap<String, u64> = HashMap::new();
        for entry in entries {
            let base = self.base_name(entry.key);
            if !cursors.contains_key(&base) {
                let prior: u64 = self
                    .pools
                    .iter()
                    .chain(self.opaques.iter())
                    .filter(|p| self.pool_base_name(p) == base)
                    .map(|p| p.data_len())
                    .sum();
                cursors.insert(base, prior + 1);
            }
        }

        let mut index = HashMap::new();
        for entry in entries {
            let base = self.base_name(entry.key);
            let cursor = cursors
                .get_mut(&base)
                .ok_or_else(|| self.corrupt(stream, "entry outside any base tree"))?;

            let own_start = *cursor;
            if let Some(stored) = entry.stored_lbpsi {
                if stored != own_start && entry.count > 0 {
                    return Err(self.corrupt(stream, "stored LBPSI disagrees with layout"));
                }
            }
            let exact = entry
                .count
                .checked_sub(child_counts.get(&entry.key).copied().unwrap_or(0))
                .ok_or_else(|| self.corrupt(stream, "subtype counts exceed supertype count"))?;
            *cursor += exact;

            let pool = self.pool_mut(entry.key);
            let start_idx = pool.data.len();
            for i in 0..exact {
                let mut obj = pool.make_obj();
                obj.skill_id = own_start + i;
                pool.data.push(obj);
            }
            pool.blocks.push(BlockInfo {
                bpsi: own_start,
                count: entry.count,
            });
            pool.appeared = true;

            for i in 0..exact {
                index.insert(
                    (base.clone(), own_start + i),
                    (entry.key, start_idx + i as usize),
                );
            }
        }

        Ok(index)
    }

    fn pool_base_name(&self, pool: &StoragePool) -> String {
        match pool.type_id {
            Some(t) => self.ctx.decl(self.ctx.decl(t).base_type).skill_name.clone(),
            None => {
                let mut name = pool.name.clone();
                let mut super_name = pool.super_name.clone();
                while let Some(s) = super_name {
                    match self.ctx.get(&s) {
                        Some(t) => {
                            return self
                                .ctx
                                .decl(self.ctx.decl(t).base_type)
                                .skill_name
                                .clone()
                        }
                        None => match self.opaques.iter().find(|p| p.name == s) {
                            Some(p) => {
                                name = p.name.clone();
                                super_name = p.super_name.clone();
                            }
                            None => break,
                        },
                    }
                }
                name
            }
        }
    }

    /// Decode every field record against its slice of the field data
    /// region and assign values to the block's instances.
    fn decode_field_data(
        &mut self,
        stream: &InStream<'_>,
        entries: &[Entry],
        field_data: &[u8],
        index: &HashMap<(String, u64), (PoolKey, usize)>,
    ) -> StateResult<()> {
        // LBPSI of each entry, recomputed the same way create_instances
        // walked the ranges.
        let mut starts: HashMap<PoolKey, u64> = HashMap::new();
        for entry in entries {
            let bpsi = self
                .pool(entry.key)
                .blocks
                .last()
                .map(|b| b.bpsi)
                .unwrap_or(1);
            starts.insert(entry.key, bpsi);
        }

        let mut prev_end = 0u64;
        for entry in entries {
            let base = self.base_name(entry.key);
            let own_start = starts[&entry.key];
            for &(slot, end) in &entry.fields {
                if end < prev_end || end as usize > field_data.len() {
                    return Err(self.corrupt(stream, "field end offsets must not decrease"));
                }
                let slice = &field_data[prev_end as usize..end as usize];
                prev_end = end;

                let wire_field = self.pool(entry.key).wire_fields[slot].clone();
                if matches!(wire_field.wire_type, WireType::Const(_)) {
                    continue;
                }

                let mut data = InStream::new(slice);
                let mut values = Vec::with_capacity(entry.count as usize);
                for _ in 0..entry.count {
                    values.push(self.decode_value(&mut data, &wire_field.wire_type)?);
                }
                if !data.is_at_end() {
                    return Err(self.corrupt(stream, "trailing bytes in field data"));
                }

                for (i, value) in values.into_iter().enumerate() {
                    let (key, obj_idx) = *index
                        .get(&(base.clone(), own_start + i as u64))
                        .ok_or_else(|| self.corrupt(stream, "instance index out of range"))?;
                    let pool = self.pool_mut(key);
                    let cell = pool.field_index(&wire_field.name);
                    let obj = &mut pool.data[obj_idx];
                    match cell {
                        Some(c) => obj.fields[c] = value,
                        None => {
                            obj.unknown_fields.insert(wire_field.name.clone(), value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn decode_value(&self, data: &mut InStream<'_>, wt: &WireType) -> StateResult<Value> {
        Ok(match wt {
            WireType::Const(v) => Value::I64(*v),
            WireType::Bool => Value::Bool(data.read_bool()?),
            WireType::I8 => Value::I8(data.read_i8()?),
            WireType::I16 => Value::I16(data.read_i16()?),
            WireType::I32 => Value::I32(data.read_i32()?),
            WireType::I64 => Value::I64(data.read_i64()?),
            WireType::V64 => Value::I64(data.read_v64()? as i64),
            WireType::F32 => Value::F32(data.read_f32()?),
            WireType::F64 => Value::F64(data.read_f64()?),
            WireType::String => {
                let id = data.read_v64()?;
                match id {
                    0 => Value::String(None),
                    id => Value::String(Some(
                        self.strings
                            .get(id)
                            .ok_or_else(|| self.corrupt(data, "string index out of range"))?
                            .to_string(),
                    )),
                }
            }
            WireType::Annotation => {
                let name_id = data.read_v64()?;
                let skill_id = data.read_v64()?;
                if name_id == 0 && skill_id == 0 {
                    Value::Annotation(None)
                } else {
                    let name = self
                        .strings
                        .get(name_id)
                        .ok_or_else(|| self.corrupt(data, "annotation type index out of range"))?
                        .to_string();
                    Value::Annotation(Some((name, skill_id)))
                }
            }
            WireType::User(_) => Value::Ref(data.read_v64()?),
            WireType::FixedArray { length, elem } => {
                let mut items = Vec::with_capacity(*length as usize);
                for _ in 0..*length {
                    items.push(self.decode_value(data, elem)?);
                }
                Value::Array(items)
            }
            WireType::VarArray(elem) | WireType::List(elem) => {
                let n = data.read_v64()?;
                let mut items = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    items.push(self.decode_value(data, elem)?);
                }
                Value::Array(items)
            }
            WireType::Set(elem) => {
                let n = data.read_v64()?;
                let mut items = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    items.push(self.decode_value(data, elem)?);
                }
                Value::Set(items)
            }
            WireType::Map(elems) => self.decode_map(data, elems)?,
        })
    }

    fn decode_map(&self, data: &mut InStream<'_>, elems: &[WireType]) -> StateResult<Value> {
        let n = data.read_v64()?;
        let mut pairs = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let key = self.decode_value(data, &elems[0])?;
            let value = if elems.len() == 2 {
                self.decode_value(data, &elems[1])?
            } else {
                self.decode_map(data, &elems[1..])?
            };
            pairs.push((key, value));
        }
        Ok(Value::Map(pairs))
    }
}
