//! The IR context: a module plus its cached analyses, with explicit
//! validity tracking and invalidation.

use silica_env::TargetEnv;
use silica_grammar::{Capability, Grammar};

use crate::{DefUseIndex, FeatureManager, Id, InstId, Module, UndefinedId};

/// A set of analyses, tracked as a validity bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisSet(u32);

impl AnalysisSet {
    pub const NONE: AnalysisSet = AnalysisSet(0);
    pub const DEF_USE: AnalysisSet = AnalysisSet(1 << 0);
    pub const FEATURES: AnalysisSet = AnalysisSet(1 << 1);
    pub const ALL: AnalysisSet = AnalysisSet(u32::MAX);

    pub const fn union(self, other: AnalysisSet) -> AnalysisSet {
        AnalysisSet(self.0 | other.0)
    }

    pub const fn intersect(self, other: AnalysisSet) -> AnalysisSet {
        AnalysisSet(self.0 & other.0)
    }

    pub const fn contains(self, other: AnalysisSet) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Owns a module together with lazily built analyses. Mutations go through
/// the context so each one either maintains the def-use index or explicitly
/// invalidates it.
pub struct IrContext {
    module: Module,
    grammar: &'static Grammar,
    def_use: Option<DefUseIndex>,
    features: Option<FeatureManager>,
    valid: AnalysisSet,
}

impl IrContext {
    pub fn new(module: Module, target_env: TargetEnv) -> Self {
        Self {
            module,
            grammar: Grammar::global(target_env),
            def_use: None,
            features: None,
            valid: AnalysisSet::NONE,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    /// Direct mutable access to the module. The caller takes responsibility
    /// for invalidating whatever analyses the mutation breaks.
    pub fn module_mut(&mut self) -> &mut Module {
        &mut self.module
    }

    pub fn grammar(&self) -> &'static Grammar {
        self.grammar
    }

    pub fn target_env(&self) -> TargetEnv {
        self.grammar.target_env()
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    /// The def-use index, rebuilt first if it has been invalidated.
    pub fn def_use(&mut self) -> &DefUseIndex {
        if !self.valid.contains(AnalysisSet::DEF_USE) {
            self.def_use = Some(DefUseIndex::analyze(&self.module));
            self.valid = self.valid.union(AnalysisSet::DEF_USE);
        }
        self.def_use.as_ref().expect("just built")
    }

    /// The feature manager, re-derived from the module's declarations if it
    /// has been invalidated.
    pub fn features(&mut self) -> &FeatureManager {
        if !self.valid.contains(AnalysisSet::FEATURES) {
            let mut features = FeatureManager::new(self.grammar);
            features.analyze(&self.module);
            self.features = Some(features);
            self.valid = self.valid.union(AnalysisSet::FEATURES);
        }
        self.features.as_ref().expect("just built")
    }

    /// The def-use index and the module together, for callers that walk the
    /// index while inspecting instructions.
    pub fn def_use_and_module(&mut self) -> (&DefUseIndex, &Module) {
        self.def_use();
        (self.def_use.as_ref().expect("just built"), &self.module)
    }

    pub fn get_def(&mut self, id: Id) -> Result<InstId, UndefinedId> {
        self.def_use().get_def(id)
    }

    /// Drops every cached analysis not named in `preserved`.
    pub fn invalidate_analyses_except(&mut self, preserved: AnalysisSet) {
        let keep = self.valid.intersect(preserved);
        if !keep.contains(AnalysisSet::DEF_USE) {
            self.def_use = None;
        }
        if !keep.contains(AnalysisSet::FEATURES) {
            self.features = None;
        }
        self.valid = keep;
    }

    pub fn valid_analyses(&self) -> AnalysisSet {
        self.valid
    }

    /// Declares a capability on the module and in the feature set.
    pub fn add_capability(&mut self, cap: Capability) {
        if self.valid.contains(AnalysisSet::FEATURES)
            && self
                .features
                .as_ref()
                .is_some_and(|features| features.has_capability(cap))
        {
            return;
        }
        self.module.declare_capability(cap.value());
        if let Some(features) = &mut self.features {
            if self.valid.contains(AnalysisSet::FEATURES) {
                features.add_capability(cap);
            }
        }
    }

    /// A fresh identifier, bumping the module id bound.
    pub fn take_next_id(&mut self) -> Id {
        self.module.take_next_id()
    }

    /// Appends an instruction to the global section, maintaining the
    /// def-use index when it is valid.
    pub fn append_global(&mut self, inst: crate::Instruction) -> InstId {
        let inst_id = self.module.alloc_inst(inst);
        self.module.types_global_values.push(inst_id);
        if self.valid.contains(AnalysisSet::DEF_USE) {
            let inst = self.module.inst(inst_id).clone();
            if let Some(index) = &mut self.def_use {
                index.track_inst(inst_id, &inst);
            }
        }
        inst_id
    }

    /// Inserts an instruction immediately before `target` in its block,
    /// maintaining the def-use index when it is valid. Panics if `target`
    /// is not inside a block.
    pub fn insert_before(&mut self, target: InstId, inst: crate::Instruction) -> InstId {
        let inst_id = self.module.alloc_inst(inst);

        let mut placed = false;
        'outer: for (_, func) in self.module.functions.iter_mut() {
            for block in &func.block_order {
                let block = &mut func.blocks[*block];
                if let Some(pos) = block.insts.iter().position(|id| *id == target) {
                    block.insts.insert(pos, inst_id);
                    placed = true;
                    break 'outer;
                }
            }
        }
        assert!(placed, "insertion target is not inside a block");

        if self.valid.contains(AnalysisSet::DEF_USE) {
            let inst = self.module.inst(inst_id).clone();
            if let Some(index) = &mut self.def_use {
                index.track_inst(inst_id, &inst);
            }
        }
        inst_id
    }

    /// Removes an instruction from the module layout, maintaining the
    /// def-use index when it is valid.
    pub fn kill_inst(&mut self, inst_id: InstId) {
        if self.valid.contains(AnalysisSet::DEF_USE) {
            let inst = self.module.inst(inst_id).clone();
            if let Some(index) = &mut self.def_use {
                index.untrack_inst(inst_id, &inst);
            }
        }
        self.module.detach_inst(inst_id);
    }

    /// Swaps an instruction in place, maintaining the def-use index when it
    /// is valid. The new instruction keeps the old one's arena slot and
    /// layout position.
    pub fn replace_inst(&mut self, inst_id: InstId, new: crate::Instruction) {
        if self.valid.contains(AnalysisSet::DEF_USE) {
            let old = self.module.inst(inst_id).clone();
            if let Some(index) = &mut self.def_use {
                index.untrack_inst(inst_id, &old);
            }
        }
        *self.module.inst_mut(inst_id) = new;
        if self.valid.contains(AnalysisSet::DEF_USE) {
            let new = self.module.inst(inst_id).clone();
            if let Some(index) = &mut self.def_use {
                index.track_inst(inst_id, &new);
            }
        }
    }

    /// Rewrites every use of `old` to `new`, maintaining the index.
    pub fn replace_all_uses(&mut self, old: Id, new: Id) {
        let users: Vec<InstId> = self.def_use().users(old).collect();
        for user in &users {
            self.module.inst_mut(*user).for_each_ref_mut(|id| {
                if *id == old {
                    *id = new;
                }
            });
        }
        if let Some(index) = &mut self.def_use {
            index.replace_uses(old, new);
        }
    }

    /// Cheap consistency predicate checked after every pass that reports a
    /// change: each cached analysis must match a from-scratch rebuild, and
    /// no instruction may reference an undefined identifier. Violation is an
    /// engine bug, not bad input.
    pub fn is_consistent(&self) -> bool {
        let rebuilt = DefUseIndex::analyze(&self.module);

        if self.valid.contains(AnalysisSet::DEF_USE) {
            match &self.def_use {
                Some(index) if *index == rebuilt => {}
                _ => return false,
            }
        }

        if self.valid.contains(AnalysisSet::FEATURES) {
            let mut features = FeatureManager::new(self.grammar);
            features.analyze(&self.module);
            match &self.features {
                Some(cached) if *cached == features => {}
                _ => return false,
            }
        }

        // No dangling references anywhere in the layout.
        for (inst_id, _) in self.module.iter_all_insts() {
            let mut ok = true;
            self.module.inst(inst_id).for_each_ref(|id| {
                if !rebuilt.has_def(id) {
                    ok = false;
                }
            });
            if !ok {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModuleBuilder;
    use crate::Opcode;
    use silica_grammar::Capability;

    fn small_context() -> (IrContext, Id, Id) {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let float = builder.type_float(32);
        let fn_ty = builder.type_function(void, &[]);
        let one = builder.constant_f32(float, 1.0);
        let two = builder.constant_f32(float, 2.0);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        let _sum = builder.binary(Opcode::FAdd, float, one, two);
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);
        (
            IrContext::new(builder.build(), TargetEnv::Universal1_3),
            one,
            two,
        )
    }

    #[test]
    fn def_use_is_lazily_built_and_invalidated() {
        let (mut ctx, one, _) = small_context();
        assert_eq!(ctx.valid_analyses(), AnalysisSet::NONE);
        assert_eq!(ctx.def_use().num_users(one), 1);
        assert!(ctx.valid_analyses().contains(AnalysisSet::DEF_USE));

        ctx.invalidate_analyses_except(AnalysisSet::NONE);
        assert_eq!(ctx.valid_analyses(), AnalysisSet::NONE);
        // Rebuild on demand.
        assert_eq!(ctx.def_use().num_users(one), 1);
    }

    #[test]
    fn invalidate_preserves_named_analyses() {
        let (mut ctx, _, _) = small_context();
        ctx.def_use();
        ctx.features();
        ctx.invalidate_analyses_except(AnalysisSet::DEF_USE);
        assert!(ctx.valid_analyses().contains(AnalysisSet::DEF_USE));
        assert!(!ctx.valid_analyses().contains(AnalysisSet::FEATURES));
    }

    #[test]
    fn replace_all_uses_keeps_index_consistent() {
        let (mut ctx, one, two) = small_context();
        ctx.def_use();
        ctx.replace_all_uses(one, two);
        assert!(ctx.is_consistent());
        assert_eq!(ctx.def_use().num_users(one), 0);
    }

    #[test]
    fn kill_inst_keeps_index_consistent() {
        let (mut ctx, one, _) = small_context();
        let def = ctx.def_use().get_def(one).unwrap();
        // The constant still has a user; kill that user first.
        let users: Vec<_> = ctx.def_use().users(one).collect();
        for user in users {
            ctx.kill_inst(user);
        }
        ctx.kill_inst(def);
        assert!(ctx.is_consistent());
    }

    #[test]
    fn add_capability_reaches_module_and_features() {
        let (mut ctx, _, _) = small_context();
        ctx.features();
        ctx.add_capability(Capability::Float16);
        assert!(ctx.features().has_capability(Capability::Float16));
        assert!(ctx
            .module()
            .capability_values()
            .any(|value| value == Capability::Float16.value()));
        assert!(ctx.is_consistent());
    }
}
