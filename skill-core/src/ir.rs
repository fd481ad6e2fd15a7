//! The type-checked schema IR
//!
//! Declarations live in an arena (`TypeContext`) and refer to each other by
//! `TypeId`, so inheritance edges and field-reference cycles never create
//! ownership cycles. The arena is stored in type order: every declaration
//! precedes all of its subtypes, siblings stable by source position. The
//! front-end is the only writer; once type checking returns, the context is
//! read-only.

use crate::{FieldType, Hint, Restriction};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable arena index of a declaration. Doubles as the wire type index
/// (user types are serialized as `32 + TypeId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub usize);

/// A user-defined type declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    /// Lowercased identifier; this is the name used on the wire.
    pub skill_name: String,
    /// The identifier as written in the schema, for display and codegen.
    pub capital_name: String,
    /// Block comment attached to the declaration, if any.
    pub doc: Option<String>,
    pub super_type: Option<TypeId>,
    /// Root of the super chain; the declaration itself when it has no super.
    pub base_type: TypeId,
    /// Direct subtypes, in source order. Transitive navigation goes through
    /// `TypeContext::subtree`.
    pub sub_types: Vec<TypeId>,
    pub fields: Vec<Field>,
    pub restrictions: Vec<Restriction>,
    pub hints: Vec<Hint>,
}

impl Declaration {
    pub fn is_base(&self) -> bool {
        self.super_type.is_none()
    }
}

/// A field of a declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub skill_name: String,
    pub doc: Option<String>,
    pub field_type: FieldType,
    /// `const` fields carry a compile-time value and consume no
    /// per-instance bytes.
    pub is_constant: bool,
    pub constant_value: Option<i64>,
    /// `auto` fields exist in memory only and are never serialized.
    pub is_auto: bool,
    pub restrictions: Vec<Restriction>,
    pub hints: Vec<Hint>,
}

impl Field {
    /// Ignored fields are kept in the IR but skipped by serialization.
    pub fn is_ignored(&self) -> bool {
        self.hints.contains(&Hint::Ignore)
    }

    /// Whether this field gets a record in the type block. Auto and
    /// ignored fields exist in memory only.
    pub fn on_wire(&self) -> bool {
        !self.is_auto && !self.is_ignored()
    }

    /// Whether this field occupies space in the field-data region.
    /// Constant fields are announced in the type block, value included,
    /// but carry no per-instance bytes.
    pub fn is_serialized(&self) -> bool {
        self.on_wire() && !self.is_constant
    }
}

/// The IR arena. Iteration order is type order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeContext {
    decls: Vec<Declaration>,
    by_name: HashMap<String, TypeId>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a declaration. The caller is responsible for pushing in type
    /// order; `TypeId`s are handed out consecutively. A declaration without
    /// a super is its own base.
    pub fn add(&mut self, mut decl: Declaration) -> TypeId {
        let id = TypeId(self.decls.len());
        if decl.super_type.is_none() {
            decl.base_type = id;
        }
        self.by_name.insert(decl.skill_name.clone(), id);
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: TypeId) -> &Declaration {
        &self.decls[id.0]
    }

    pub(crate) fn decl_mut(&mut self, id: TypeId) -> &mut Declaration {
        &mut self.decls[id.0]
    }

    /// Wire up a super edge. Only the front-end calls this, during
    /// construction.
    pub fn link_super(&mut self, child: TypeId, parent: TypeId) {
        self.decl_mut(child).super_type = Some(parent);
        let base = self.decl(parent).base_type;
        self.decl_mut(child).base_type = base;
        self.decl_mut(parent).sub_types.push(child);
    }

    /// Case-insensitive lookup by skill name.
    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// All declarations in type order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.decls.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.decls.len()).map(TypeId)
    }

    /// Base types (declarations without a super), in type order.
    pub fn bases(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.ids().filter(|id| self.decl(*id).is_base())
    }

    /// The inheritance subtree rooted at `id`, preorder, children in source
    /// order. Includes `id` itself.
    pub fn subtree(&self, id: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            for &child in self.decl(next).sub_types.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// All fields visible on `id`: inherited first (outermost super down),
    /// then the declaration's own, each segment in declaration order.
    pub fn all_fields(&self, id: TypeId) -> Vec<&Field> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(t) = cursor {
            chain.push(t);
            cursor = self.decl(t).super_type;
        }
        chain
            .iter()
            .rev()
            .flat_map(|t| self.decl(*t).fields.iter())
            .collect()
    }

    /// Distance from `id` to the root of its super chain.
    pub fn depth(&self, id: TypeId) -> usize {
        let mut n = 0;
        let mut cursor = self.decl(id).super_type;
        while let Some(t) = cursor {
            n += 1;
            cursor = self.decl(t).super_type;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str) -> Declaration {
        Declaration {
            skill_name: name.to_lowercase(),
            capital_name: name.to_string(),
            doc: None,
            super_type: None,
            base_type: TypeId(0),
            sub_types: Vec::new(),
            fields: Vec::new(),
            restrictions: Vec::new(),
            hints: Vec::new(),
        }
    }

    #[test]
    fn subtree_is_preorder_with_source_ordered_children() {
        let mut ctx = TypeContext::new();
        let a = ctx.add(decl("A"));
        let b = ctx.add(decl("B"));
        ctx.link_super(b, a);
        let c = ctx.add(decl("C"));
        ctx.link_super(c, a);
        let d = ctx.add(decl("D"));
        ctx.link_super(d, b);

        assert_eq!(ctx.subtree(a), vec![a, b, d, c]);
        assert_eq!(ctx.decl(d).base_type, a);
        assert_eq!(ctx.depth(d), 2);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut ctx = TypeContext::new();
        let id = ctx.add(decl("Message"));
        assert_eq!(ctx.get("MESSAGE"), Some(id));
        assert_eq!(ctx.get("message"), Some(id));
        assert_eq!(ctx.get("nope"), None);
    }
}
