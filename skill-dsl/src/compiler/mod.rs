//! Schema compiler - AST to IR
//!
//! Takes the flat declaration stream produced by include resolution and
//! lowers it into the `skill_core::TypeContext` arena. All semantic rules
//! that cannot be checked during parsing live here: name resolution,
//! inheritance wiring, constant and restriction validation, and the
//! type-order sort the wire format depends on.
//!
//! # Pipeline
//!
//! ```text
//! Schema files → Parser → AST stream → Compiler → TypeContext (IR)
//!                                         ↓
//!                                   Validation (semantic)
//! ```

use crate::includes::ResolvedSchema;
use crate::parser::ast::*;
use skill_core::{
    Declaration, Field, FieldType, GroundType, Hint, Restriction, RestrictionValue, TypeContext,
    TypeId,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

// ============================================================================
// COMPILE ERRORS
// ============================================================================

/// Errors raised while lowering a schema to IR. The message texts of
/// `UnknownType`, `UnknownRestriction` and `EmptyIntRange` are part of the
/// tool's interface; do not reword them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("missing include \"{file}\": no such file relative to {dir}")]
    MissingInclude { file: String, dir: String },

    #[error("duplicate definition: \"{name}\"")]
    DuplicateDefinition { name: String },

    #[error("duplicate field \"{field}\" in type \"{name}\"")]
    DuplicateField { field: String, name: String },

    #[error("The type \"{name}\" is unknown!\nKnown types are: {known}")]
    UnknownType { name: String, known: String },

    #[error("{name}() is either not supported or an invalid restriction name")]
    UnknownRestriction { name: String },

    #[error("unknown hint: !{name}")]
    UnknownHint { name: String },

    #[error("Integer range restriction has no legal values: {low} -> {high}")]
    EmptyIntRange { low: i64, high: i64 },

    #[error("Float range restriction has no legal values: {low} -> {high}")]
    EmptyFloatRange { low: f64, high: f64 },

    #[error("invalid restriction @{name}: {reason}")]
    InvalidRestriction { name: String, reason: String },

    #[error("constant field \"{field}\" must have an integral type")]
    NonIntegralConstant { field: String },

    #[error("circular inheritance involving \"{name}\"")]
    CircularInheritance { name: String },

    #[error("the type name \"any\" is reserved")]
    AnyType,

    #[error("schema contains no type definitions")]
    NoDefinitions,
}

pub type CompileResult<T> = Result<T, CompileError>;

/// How unknown hint names are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintMode {
    /// Unknown hints are logged and dropped.
    Lenient,
    /// Unknown hints fail the compilation.
    Strict,
}

// ============================================================================
// SCHEMA COMPILER
// ============================================================================

/// Lowers a resolved declaration stream into the IR.
pub struct SchemaCompiler<'a> {
    defs: &'a [Definition],
    mode: HintMode,
    /// Lowercased name → index into `defs`.
    index: HashMap<String, usize>,
    /// Declarations in type order, as indices into `defs`.
    order: Vec<usize>,
    /// Comma-space list of known type names, in type order. Baked into
    /// unknown-type diagnostics.
    known: String,
}

impl<'a> SchemaCompiler<'a> {
    /// Compile a resolved schema into a `TypeContext` in type order.
    pub fn compile(resolved: &ResolvedSchema, mode: HintMode) -> CompileResult<TypeContext> {
        if resolved.definitions.is_empty() {
            if resolved.any_content {
                return Err(CompileError::NoDefinitions);
            }
            return Ok(TypeContext::new());
        }

        let mut compiler = SchemaCompiler {
            defs: &resolved.definitions,
            mode,
            index: HashMap::new(),
            order: Vec::new(),
            known: String::new(),
        };
        compiler.build_name_table()?;
        compiler.sort_type_order()?;
        compiler.lower()
    }

    /// Register every declaration under its lowercased name.
    fn build_name_table(&mut self) -> CompileResult<()> {
        for (i, def) in self.defs.iter().enumerate() {
            let lower = def.name.to_lowercase();
            if lower == "any" {
                return Err(CompileError::AnyType);
            }
            if self.index.insert(lower, i).is_some() {
                return Err(CompileError::DuplicateDefinition {
                    name: def.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Produce type order: a preorder walk with roots in first-definition
    /// order and children in source order. A declaration whose super does
    /// not resolve is treated as a root so the known-types list is complete
    /// before the error is raised.
    fn sort_type_order(&mut self) -> CompileResult<()> {
        let n = self.defs.len();
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut has_super = vec![false; n];
        let mut missing: Option<String> = None;

        for (i, def) in self.defs.iter().enumerate() {
            if let Some(super_name) = &def.super_name {
                match self.index.get(&super_name.to_lowercase()) {
                    Some(&parent) => {
                        children[parent].push(i);
                        has_super[i] = true;
                    }
                    None => {
                        if missing.is_none() {
                            missing = Some(super_name.clone());
                        }
                    }
                }
            }
        }

        for root in 0..n {
            if has_super[root] {
                continue;
            }
            let mut stack = vec![root];
            while let Some(i) = stack.pop() {
                self.order.push(i);
                for &child in children[i].iter().rev() {
                    stack.push(child);
                }
            }
        }

        self.known = self
            .order
            .iter()
            .map(|&i| self.defs[i].name.to_lowercase())
            .collect::<Vec<_>>()
            .join(", ");

        if let Some(name) = missing {
            return Err(CompileError::UnknownType {
                name,
                known: self.known.clone(),
            });
        }

        // Anything the walk never reached sits on an inheritance cycle.
        if self.order.len() != n {
            let mut seen = vec![false; n];
            for &i in &self.order {
                seen[i] = true;
            }
            let i = (0..n).find(|&i| !seen[i]).unwrap_or(0);
            return Err(CompileError::CircularInheritance {
                name: self.defs[i].name.clone(),
            });
        }
        Ok(())
    }

    /// Build the arena in type order, then wire inheritance and resolve
    /// fields.
    fn lower(&self) -> CompileResult<TypeContext> {
        // TypeIds are handed out in type order, so they are known up front.
        let mut tid: HashMap<String, TypeId> = HashMap::new();
        for (k, &i) in self.order.iter().enumerate() {
            tid.insert(self.defs[i].name.to_lowercase(), TypeId(k));
        }

        let mut ctx = TypeContext::new();
        for &i in &self.order {
            let def = &self.defs[i];
            let decl = self.lower_definition(def, &tid)?;
            ctx.add(decl);
        }

        // Parents precede children in type order, so bases propagate in one
        // pass.
        for &i in &self.order {
            let def = &self.defs[i];
            if let Some(super_name) = &def.super_name {
                let child = tid[&def.name.to_lowercase()];
                let parent = tid[&super_name.to_lowercase()];
                ctx.link_super(child, parent);
            }
        }

        Ok(ctx)
    }

    fn lower_definition(
        &self,
        def: &Definition,
        tid: &HashMap<String, TypeId>,
    ) -> CompileResult<Declaration> {
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for field in &def.body {
            let name = field.body.name().to_lowercase();
            if !seen.insert(name) {
                return Err(CompileError::DuplicateField {
                    field: field.body.name().to_string(),
                    name: def.name.clone(),
                });
            }
            fields.push(self.lower_field(field, tid)?);
        }

        let restrictions = def
            .description
            .restrictions
            .iter()
            .map(|r| self.check_type_restriction(r))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Declaration {
            skill_name: def.name.to_lowercase(),
            capital_name: def.name.clone(),
            doc: def.description.doc.clone(),
            super_type: None,
            base_type: TypeId(0),
            sub_types: Vec::new(),
            fields,
            restrictions,
            hints: self.check_hints(&def.description.hints)?,
        })
    }

    fn lower_field(
        &self,
        field: &FieldDecl,
        tid: &HashMap<String, TypeId>,
    ) -> CompileResult<Field> {
        let (field_type, is_constant, constant_value, is_auto, name) = match &field.body {
            FieldBody::Constant {
                type_expr,
                name,
                value,
            } => {
                let ft = self.resolve_type_expr(type_expr, tid)?;
                // Only ground integral types admit a literal; this also bans
                // constants of the enclosing type.
                match ft {
                    FieldType::Ground(g) if g.is_integral() => {}
                    _ => {
                        return Err(CompileError::NonIntegralConstant {
                            field: name.clone(),
                        })
                    }
                }
                (ft, true, Some(*value), false, name.clone())
            }
            FieldBody::Data {
                auto,
                type_expr,
                name,
            } => {
                let ft = self.resolve_type_expr(type_expr, tid)?;
                (ft, false, None, *auto, name.clone())
            }
        };

        let restrictions = field
            .description
            .restrictions
            .iter()
            .map(|r| self.check_field_restriction(r, &field_type))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Field {
            skill_name: name.to_lowercase(),
            doc: field.description.doc.clone(),
            field_type,
            is_constant,
            constant_value,
            is_auto,
            restrictions,
            hints: self.check_hints(&field.description.hints)?,
        })
    }

    /// Resolve a base type name: ground types first, then user types.
    fn resolve_base(&self, name: &str, tid: &HashMap<String, TypeId>) -> CompileResult<FieldType> {
        if let Some(g) = GroundType::from_name(name) {
            return Ok(FieldType::Ground(g));
        }
        match tid.get(&name.to_lowercase()) {
            Some(&id) => Ok(FieldType::UserRef(id)),
            None => Err(CompileError::UnknownType {
                name: name.to_string(),
                known: self.known.clone(),
            }),
        }
    }

    fn resolve_type_expr(
        &self,
        expr: &TypeExpr,
        tid: &HashMap<String, TypeId>,
    ) -> CompileResult<FieldType> {
        Ok(match expr {
            TypeExpr::Base(name) => self.resolve_base(name, tid)?,
            TypeExpr::FixedArray { base, length } => FieldType::FixedArray {
                elem: Box::new(self.resolve_base(base, tid)?),
                length: *length,
            },
            TypeExpr::VarArray { base } => {
                FieldType::VarArray(Box::new(self.resolve_base(base, tid)?))
            }
            TypeExpr::List { base } => FieldType::List(Box::new(self.resolve_base(base, tid)?)),
            TypeExpr::Set { base } => FieldType::Set(Box::new(self.resolve_base(base, tid)?)),
            TypeExpr::Map { bases } => FieldType::Map(
                bases
                    .iter()
                    .map(|b| self.resolve_base(b, tid))
                    .collect::<CompileResult<Vec<_>>>()?,
            ),
        })
    }

    // ------------------------------------------------------------------
    // Restriction and hint validation
    // ------------------------------------------------------------------

    fn check_hints(&self, hints: &[HintNode]) -> CompileResult<Vec<Hint>> {
        let mut out = Vec::new();
        for node in hints {
            match Hint::from_name(&node.name) {
                Some(h) => out.push(h),
                None => match self.mode {
                    HintMode::Strict => {
                        return Err(CompileError::UnknownHint {
                            name: node.name.clone(),
                        })
                    }
                    HintMode::Lenient => {
                        tracing::warn!(hint = %node.name, "ignoring unknown hint");
                    }
                },
            }
        }
        Ok(out)
    }

    /// Restrictions legal on a type declaration.
    fn check_type_restriction(&self, node: &RestrictionNode) -> CompileResult<Restriction> {
        match node.name.to_lowercase().as_str() {
            "unique" => self.expect_no_args(node, Restriction::Unique),
            "singleton" => self.expect_no_args(node, Restriction::Singleton),
            "monotone" => self.expect_no_args(node, Restriction::Monotone),
            "range" | "nonnull" | "default" | "coding" | "constantlengthpointer" => {
                Err(CompileError::InvalidRestriction {
                    name: node.name.clone(),
                    reason: "not applicable to a type declaration".to_string(),
                })
            }
            _ => Err(CompileError::UnknownRestriction {
                name: node.name.clone(),
            }),
        }
    }

    /// Restrictions legal on a field, validated against the field's type.
    fn check_field_restriction(
        &self,
        node: &RestrictionNode,
        field_type: &FieldType,
    ) -> CompileResult<Restriction> {
        match node.name.to_lowercase().as_str() {
            "range" => self.check_range(node, field_type),
            "nonnull" => {
                let nullable = matches!(
                    field_type,
                    FieldType::Ground(GroundType::String)
                        | FieldType::Ground(GroundType::Annotation)
                        | FieldType::UserRef(_)
                );
                if !nullable {
                    return Err(CompileError::InvalidRestriction {
                        name: node.name.clone(),
                        reason: "only reference types can be non-null".to_string(),
                    });
                }
                self.expect_no_args(node, Restriction::NonNull)
            }
            "default" => {
                if node.args.len() != 1 {
                    return Err(CompileError::InvalidRestriction {
                        name: node.name.clone(),
                        reason: "takes exactly one argument".to_string(),
                    });
                }
                Ok(Restriction::Default(literal_value(&node.args[0])))
            }
            "coding" => match node.args.as_slice() {
                [Literal::Str(s)] => Ok(Restriction::Coding(s.clone())),
                _ => Err(CompileError::InvalidRestriction {
                    name: node.name.clone(),
                    reason: "takes exactly one string argument".to_string(),
                }),
            },
            "constantlengthpointer" => {
                self.expect_no_args(node, Restriction::ConstantLengthPointer)
            }
            "unique" | "singleton" | "monotone" => Err(CompileError::InvalidRestriction {
                name: node.name.clone(),
                reason: "only applicable to a type declaration".to_string(),
            }),
            _ => Err(CompileError::UnknownRestriction {
                name: node.name.clone(),
            }),
        }
    }

    /// `@range(low, high)` or `@range(low, high, incLow, incHigh)`;
    /// attaches as an integer or float range depending on the field type.
    fn check_range(
        &self,
        node: &RestrictionNode,
        field_type: &FieldType,
    ) -> CompileResult<Restriction> {
        let (inclusive_low, inclusive_high) = match node.args.len() {
            2 => (true, true),
            4 => (
                parse_inclusivity(node, &node.args[2])?,
                parse_inclusivity(node, &node.args[3])?,
            ),
            _ => {
                return Err(CompileError::InvalidRestriction {
                    name: node.name.clone(),
                    reason: "takes (low, high) or (low, high, incLow, incHigh)".to_string(),
                })
            }
        };

        match field_type {
            FieldType::Ground(g) if g.is_integral() => {
                let (low, high) = (int_arg(node, &node.args[0])?, int_arg(node, &node.args[1])?);
                if low >= high {
                    return Err(CompileError::EmptyIntRange { low, high });
                }
                Ok(Restriction::IntRange {
                    low,
                    high,
                    inclusive_low,
                    inclusive_high,
                })
            }
            FieldType::Ground(g) if g.is_float() => {
                let (low, high) = (
                    float_arg(node, &node.args[0])?,
                    float_arg(node, &node.args[1])?,
                );
                if low >= high {
                    return Err(CompileError::EmptyFloatRange { low, high });
                }
                Ok(Restriction::FloatRange {
                    low,
                    high,
                    inclusive_low,
                    inclusive_high,
                })
            }
            _ => Err(CompileError::InvalidRestriction {
                name: node.name.clone(),
                reason: "range requires an integral or floating field type".to_string(),
            }),
        }
    }

    fn expect_no_args(
        &self,
        node: &RestrictionNode,
        restriction: Restriction,
    ) -> CompileResult<Restriction> {
        if node.args.is_empty() {
            Ok(restriction)
        } else {
            Err(CompileError::InvalidRestriction {
                name: node.name.clone(),
                reason: "takes no arguments".to_string(),
            })
        }
    }
}

fn literal_value(lit: &Literal) -> RestrictionValue {
    match lit {
        Literal::Int(n) => RestrictionValue::Int(*n),
        Literal::Float(n) => RestrictionValue::Float(*n),
        Literal::Str(s) => RestrictionValue::Str(s.clone()),
    }
}

fn int_arg(node: &RestrictionNode, lit: &Literal) -> CompileResult<i64> {
    match lit {
        Literal::Int(n) => Ok(*n),
        _ => Err(CompileError::InvalidRestriction {
            name: node.name.clone(),
            reason: "integer range bounds must be integers".to_string(),
        }),
    }
}

fn float_arg(node: &RestrictionNode, lit: &Literal) -> CompileResult<f64> {
    match lit {
        Literal::Int(n) => Ok(*n as f64),
        Literal::Float(n) => Ok(*n),
        _ => Err(CompileError::InvalidRestriction {
            name: node.name.clone(),
            reason: "float range bounds must be numbers".to_string(),
        }),
    }
}

fn parse_inclusivity(node: &RestrictionNode, lit: &Literal) -> CompileResult<bool> {
    match lit {
        Literal::Str(s) if s.eq_ignore_ascii_case("inclusive") => Ok(true),
        Literal::Str(s) if s.eq_ignore_ascii_case("exclusive") => Ok(false),
        _ => Err(CompileError::InvalidRestriction {
            name: node.name.clone(),
            reason: "bound modifiers must be \"inclusive\" or \"exclusive\"".to_string(),
        }),
    }
}
