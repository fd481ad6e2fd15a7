//! The serialization state machine
//!
//! A `SkillState` owns the string pool and one storage pool per declared
//! type, plus opaque pools for types found only in a file. Lifecycle:
//!
//! ```text
//! create(ir)            empty pools, no backing file
//! read(path, ir)        pools populated from `path`, from_path = path
//! write(target)         full rewrite: string pool reset, every type
//!                       emitted as a first appearance, atomic swap
//! append([target])      one delta block of new objects; requires a
//!                       backing file
//! ```
//!
//! Writes are transactional: everything lands in a sibling temporary
//! file that is renamed over the target on success and deleted on every
//! other exit path.

use crate::error::{StateError, StateResult};
use crate::pool::{BlockInfo, Obj, StoragePool, TypeOrderIter};
use crate::reader::Reader;
use crate::string_pool::StringPool;
use crate::writer;
use skill_core::{TypeContext, TypeId};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct SkillState {
    ctx: Arc<TypeContext>,
    pub strings: StringPool,
    pools: Vec<StoragePool>,
    opaques: Vec<StoragePool>,
    from_path: Option<PathBuf>,
}

impl SkillState {
    /// A fresh state with empty pools and no backing file. `append`
    /// fails on such a state until a `write` establishes one.
    pub fn create(ctx: Arc<TypeContext>) -> Self {
        let pools = ctx.ids().map(|t| StoragePool::for_type(&ctx, t)).collect();
        Self {
            ctx,
            strings: StringPool::new(),
            pools,
            opaques: Vec::new(),
            from_path: None,
        }
    }

    /// Populate a state from an existing file.
    pub fn read(path: &Path, ctx: Arc<TypeContext>) -> StateResult<Self> {
        let mut state = Self::create(ctx);
        let bytes = fs::read(path)?;
        let ctx = state.ctx.clone();
        Reader::new(
            &ctx,
            &mut state.pools,
            &mut state.opaques,
            &mut state.strings,
        )
        .read_file(&bytes)?;
        state.from_path = Some(path.to_path_buf());
        tracing::info!(
            path = %path.display(),
            types = state.pools.len(),
            opaque = state.opaques.len(),
            "read skill file"
        );
        Ok(state)
    }

    pub fn types(&self) -> &TypeContext {
        &self.ctx
    }

    pub fn from_path(&self) -> Option<&Path> {
        self.from_path.as_deref()
    }

    pub fn pool(&self, t: TypeId) -> &StoragePool {
        &self.pools[t.0]
    }

    pub fn pool_mut(&mut self, t: TypeId) -> &mut StoragePool {
        &mut self.pools[t.0]
    }

    /// Opaque pools carried through from a read file, in file order.
    pub fn opaque_pools(&self) -> &[StoragePool] {
        &self.opaques
    }

    /// Create a new instance of `t`. It gets a skill id at the next
    /// write or append.
    pub fn add(&mut self, t: TypeId) -> &mut Obj {
        let pool = &mut self.pools[t.0];
        let obj = pool.make_obj();
        pool.new_objects.push(obj);
        let last = pool.new_objects.len() - 1;
        &mut pool.new_objects[last]
    }

    /// Every live instance of `t` and its subtypes, in type order.
    pub fn all_in_type_order(&self, t: TypeId) -> TypeOrderIter<'_> {
        TypeOrderIter::all(&self.ctx, &self.pools, t)
    }

    /// Instances created since the last session, in type order.
    pub fn new_in_type_order(&self, t: TypeId) -> TypeOrderIter<'_> {
        TypeOrderIter::new_only(&self.ctx, &self.pools, t)
    }

    /// Look up an instance of `t`'s tree by skill id.
    pub fn find_by_id(&self, t: TypeId, skill_id: u64) -> Option<(TypeId, &Obj)> {
        if skill_id == 0 {
            return None;
        }
        for u in self.ctx.subtree(t) {
            let pool = &self.pools[u.0];
            if let Some(obj) = pool.data.iter().find(|o| o.skill_id == skill_id) {
                return Some((u, obj));
            }
            if let Some(obj) = pool.new_objects.iter().find(|o| o.skill_id == skill_id) {
                return Some((u, obj));
            }
        }
        None
    }

    /// Rewrite the entire state to `target`. The string pool is reset and
    /// re-prepared; every type is emitted as a first appearance.
    pub fn write(&mut self, target: &Path) -> StateResult<()> {
        tracing::info!(target = %target.display(), "writing skill file");

        for pool in &mut self.pools {
            pool.appeared = false;
            pool.blocks.clear();
        }
        self.strings.reset();

        let ctx = self.ctx.clone();
        writer::prepare_names(&ctx, &mut self.strings);
        let layouts = writer::layout(&ctx, &mut self.pools, true);
        let field_data = writer::build_field_data(&ctx, &self.pools, &mut self.strings, false)?;

        let tmp = sibling_temp(target);
        let mut guard = TempGuard::new(tmp.clone());
        {
            let mut file = fs::File::create(&tmp)?;
            writer::write_block(
                &mut file,
                &ctx,
                &self.pools,
                &self.strings,
                0,
                &layouts,
                &field_data,
            )?;
        }
        fs::rename(&tmp, target)?;
        guard.disarm();

        self.finish_block(&layouts, true);
        self.opaques.clear();
        self.from_path = Some(target.to_path_buf());
        Ok(())
    }

    /// Append new objects to the backing file in place.
    pub fn append(&mut self) -> StateResult<()> {
        let base = self.from_path.clone().ok_or(StateError::NoBaseFile)?;
        self.append_impl(&base)
    }

    /// Append to `target`: the backing file is copied there first unless
    /// it already is the target.
    pub fn append_to(&mut self, target: &Path) -> StateResult<()> {
        self.append_impl(target)
    }

    fn append_impl(&mut self, target: &Path) -> StateResult<()> {
        let base = self.from_path.clone().ok_or(StateError::NoBaseFile)?;
        // An unknown subtype of a known base owns a slice of that base
        // pool's id space; appending around it would corrupt the layout.
        for opaque in &self.opaques {
            if let Some(root) = self.opaque_known_root(opaque) {
                return Err(StateError::UnknownSubtypes {
                    base: self.ctx.decl(root).skill_name.clone(),
                });
            }
        }
        tracing::info!(
            base = %base.display(),
            target = %target.display(),
            "appending to skill file"
        );

        let ctx = self.ctx.clone();
        let strings_mark = self.strings.len();
        writer::prepare_names(&ctx, &mut self.strings);
        let layouts = writer::layout(&ctx, &mut self.pools, false);
        let field_data = writer::build_field_data(&ctx, &self.pools, &mut self.strings, true)?;

        let tmp = sibling_temp(target);
        let mut guard = TempGuard::new(tmp.clone());
        fs::copy(&base, &tmp)?;
        {
            let mut file = fs::OpenOptions::new().append(true).open(&tmp)?;
            writer::write_block(
                &mut file,
                &ctx,
                &self.pools,
                &self.strings,
                strings_mark,
                &layouts,
                &field_data,
            )?;
        }
        fs::rename(&tmp, target)?;
        guard.disarm();

        self.finish_block(&layouts, false);
        self.from_path = Some(target.to_path_buf());
        Ok(())
    }

    /// The IR base type an opaque pool's super chain reaches, if any.
    fn opaque_known_root(&self, pool: &StoragePool) -> Option<TypeId> {
        let mut super_name = pool.super_name.clone();
        while let Some(name) = super_name {
            if let Some(t) = self.ctx.get(&name) {
                return Some(self.ctx.decl(t).base_type);
            }
            super_name = self
                .opaques
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.super_name.clone());
        }
        None
    }

    /// Promote new objects into the data region and record the block.
    /// Deleted data instances may only be dropped after a full rewrite;
    /// an append leaves their slots in the backing file.
    fn finish_block(&mut self, layouts: &[writer::TypeLayout], purge_data: bool) {
        for (i, pool) in self.pools.iter_mut().enumerate() {
            pool.appeared = true;
            pool.blocks.push(BlockInfo {
                bpsi: layouts[i].lbpsi,
                count: layouts[i].count,
            });
            if purge_data {
                pool.data.retain(|o| !o.is_deleted());
            }
            let news = std::mem::take(&mut pool.new_objects);
            pool.data.extend(news.into_iter().filter(|o| !o.is_deleted()));
        }
    }
}

/// Temporary file sitting next to the final target, so the final rename
/// never crosses a filesystem.
fn sibling_temp(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    target.with_file_name(format!(".{}.tmp", name))
}

/// Deletes the temporary output on every exit path unless disarmed after
/// a successful rename.
struct TempGuard {
    path: PathBuf,
    armed: bool,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
