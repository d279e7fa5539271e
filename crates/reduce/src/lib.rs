//! Semantics-preserving simplification discovery for minimization tooling.
//!
//! A finder proposes the currently-legal simplifications for a scope; each
//! opportunity carries its own precondition and is consumed by a single
//! application. Opportunities from one discovery round are independently
//! applicable, though applying one may falsify another's precondition, which
//! the precondition re-check at apply time handles.

mod finders;
mod opportunity;

pub use finders::{
    OpportunityFinder, RemoveBlockFinder, RemoveSelectionFinder,
    SimpleConditionalBranchToBranchFinder,
};
pub use opportunity::{Opportunity, OpportunityKind};

#[cfg(test)]
mod tests {
    use super::*;
    use silica_env::TargetEnv;
    use silica_grammar::Capability;
    use silica_ir::{FuncId, Id, IrContext, ModuleBuilder, Opcode};

    fn first_func(ctx: &IrContext) -> FuncId {
        ctx.module().functions.iter().next().unwrap().0
    }

    /// A function whose second block is completely unreferenced.
    fn context_with_dead_block() -> IrContext {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let fn_ty = builder.type_function(void, &[]);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        builder.ret();
        builder.begin_block();
        builder.unreachable();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);
        IrContext::new(builder.build(), TargetEnv::Universal1_3)
    }

    #[test]
    fn dead_block_is_offered_and_removed() {
        let mut ctx = context_with_dead_block();
        let func = first_func(&ctx);

        let finder = RemoveBlockFinder;
        let mut opportunities = finder.available_opportunities(&mut ctx, Some(func));
        assert_eq!(opportunities.len(), 1);

        let opportunity = &mut opportunities[0];
        assert!(opportunity.try_apply(&mut ctx));
        assert_eq!(ctx.module().functions[func].block_order.len(), 1);
        assert!(ctx.is_consistent());

        // Consumed: a second application is refused.
        assert!(!opportunity.try_apply(&mut ctx));
    }

    #[test]
    fn entry_block_is_never_an_opportunity() {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let fn_ty = builder.type_function(void, &[]);

        // The entry block is provably unreferenced, yet still off limits.
        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);

        let mut ctx = IrContext::new(builder.build(), TargetEnv::Universal1_3);
        let func = first_func(&ctx);
        let opportunities = RemoveBlockFinder.available_opportunities(&mut ctx, Some(func));
        assert!(opportunities.is_empty());
    }

    #[test]
    fn referenced_block_is_not_an_opportunity() {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let fn_ty = builder.type_function(void, &[]);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        // Forward reference to the second block.
        let target = Id(builder.peek_next_id());
        builder.branch(target);
        let actual = builder.begin_block();
        assert_eq!(actual, target);
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);

        let mut ctx = IrContext::new(builder.build(), TargetEnv::Universal1_3);
        let func = first_func(&ctx);
        let opportunities = RemoveBlockFinder.available_opportunities(&mut ctx, Some(func));
        assert!(opportunities.is_empty());
    }

    #[test]
    fn block_with_outside_uses_is_not_an_opportunity() {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let float = builder.type_float(32);
        let fn_ty = builder.type_function(void, &[]);
        let one = builder.constant_f32(float, 1.0);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        builder.ret();
        // Dead block defining a value...
        builder.begin_block();
        let defined = builder.binary(Opcode::FAdd, float, one, one);
        builder.unreachable();
        // ...used by another dead block.
        builder.begin_block();
        builder.binary(Opcode::FMul, float, defined, defined);
        builder.unreachable();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);

        let mut ctx = IrContext::new(builder.build(), TargetEnv::Universal1_3);
        let func = first_func(&ctx);
        let opportunities = RemoveBlockFinder.available_opportunities(&mut ctx, Some(func));
        // Only the third block qualifies; the second has an outside use.
        assert_eq!(opportunities.len(), 1);
    }

    #[test]
    fn whole_module_scope_when_no_target_function() {
        let mut ctx = context_with_dead_block();
        let opportunities = RemoveBlockFinder.available_opportunities(&mut ctx, None);
        assert_eq!(opportunities.len(), 1);
    }

    fn context_with_selection() -> IrContext {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let bool_ty = builder.type_bool();
        let fn_ty = builder.type_function(void, &[]);
        let cond = builder.constant_true(bool_ty);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        let then_label = Id(builder.peek_next_id());
        let merge_label = Id(builder.peek_next_id() + 1);
        builder.selection_merge(merge_label, 0);
        builder.branch_conditional(cond, then_label, merge_label);
        let actual_then = builder.begin_block();
        assert_eq!(actual_then, then_label);
        builder.branch(merge_label);
        let actual_merge = builder.begin_block();
        assert_eq!(actual_merge, merge_label);
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);
        IrContext::new(builder.build(), TargetEnv::Universal1_3)
    }

    #[test]
    fn selection_merge_is_offered_and_removed() {
        let mut ctx = context_with_selection();
        let mut opportunities = RemoveSelectionFinder.available_opportunities(&mut ctx, None);
        assert_eq!(opportunities.len(), 1);

        assert!(opportunities[0].try_apply(&mut ctx));
        let has_merge = ctx
            .module()
            .iter_all_insts()
            .any(|(inst, _)| ctx.module().inst(inst).opcode == Opcode::SelectionMerge);
        assert!(!has_merge);
        assert!(ctx.is_consistent());
        assert!(!opportunities[0].try_apply(&mut ctx));
    }

    #[test]
    fn single_target_conditional_branch_is_simplified() {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let bool_ty = builder.type_bool();
        let fn_ty = builder.type_function(void, &[]);
        let cond = builder.constant_true(bool_ty);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        let target = Id(builder.peek_next_id());
        builder.branch_conditional(cond, target, target);
        let actual = builder.begin_block();
        assert_eq!(actual, target);
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);

        let mut ctx = IrContext::new(builder.build(), TargetEnv::Universal1_3);
        let mut opportunities =
            SimpleConditionalBranchToBranchFinder.available_opportunities(&mut ctx, None);
        assert_eq!(opportunities.len(), 1);
        assert!(opportunities[0].try_apply(&mut ctx));

        let branch = ctx
            .module()
            .iter_all_insts()
            .find(|(inst, _)| ctx.module().inst(*inst).opcode == Opcode::Branch);
        assert!(branch.is_some());
        let still_conditional = ctx
            .module()
            .iter_all_insts()
            .any(|(inst, _)| ctx.module().inst(*inst).opcode == Opcode::BranchConditional);
        assert!(!still_conditional);
        assert!(ctx.is_consistent());
    }

    #[test]
    fn two_target_conditional_branch_is_left_alone() {
        let mut ctx = context_with_selection();
        let opportunities =
            SimpleConditionalBranchToBranchFinder.available_opportunities(&mut ctx, None);
        assert!(opportunities.is_empty());
    }
}
