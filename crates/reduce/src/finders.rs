//! Opportunity finders: each discovers one family of currently-legal
//! simplifications for a target scope.

use rustc_hash::FxHashSet;
use silica_ir::{BlockId, FuncId, InstId, IrContext, Opcode};

use crate::opportunity::{single_target, Opportunity};

pub trait OpportunityFinder {
    fn name(&self) -> &'static str;

    /// The currently-legal opportunities for `target_function`, or for the
    /// whole module when unspecified. Each returned opportunity is
    /// independently applicable.
    fn available_opportunities(
        &self,
        ctx: &mut IrContext,
        target_function: Option<FuncId>,
    ) -> Vec<Opportunity>;
}

fn target_functions(ctx: &IrContext, target: Option<FuncId>) -> Vec<FuncId> {
    match target {
        Some(func) => vec![func],
        None => ctx.module().functions.keys().collect(),
    }
}

/// Finds unreferenced blocks whose contents leak nothing outside the block.
pub struct RemoveBlockFinder;

impl OpportunityFinder for RemoveBlockFinder {
    fn name(&self) -> &'static str {
        "remove-block"
    }

    fn available_opportunities(
        &self,
        ctx: &mut IrContext,
        target_function: Option<FuncId>,
    ) -> Vec<Opportunity> {
        let mut result = Vec::new();
        for func in target_functions(ctx, target_function) {
            let blocks = ctx.module().functions[func].block_order.clone();
            for block in blocks {
                if block_is_removable(ctx, func, block) {
                    result.push(Opportunity::remove_block(func, block));
                }
            }
        }
        result
    }
}

/// Whether a block can be deleted: never the function's first block, never a
/// block some instruction references, and no contained instruction may be
/// used outside the block.
pub(crate) fn block_is_removable(ctx: &mut IrContext, func: FuncId, block: BlockId) -> bool {
    let (index, module) = ctx.def_use_and_module();
    let function = &module.functions[func];

    // Removing the entry block would leave the function without one.
    if function.entry_block() == Some(block) {
        return false;
    }
    if !function.block_order.contains(&block) {
        return false;
    }
    let block_data = &function.blocks[block];

    if let Some(label) = block_data.label {
        if let Some(label_id) = module.inst(label).result_id {
            if index.num_users(label_id) > 0 {
                return false;
            }
        }
    }

    let instructions_in_block: FxHashSet<InstId> = block_data
        .label
        .into_iter()
        .chain(block_data.insts.iter().copied())
        .collect();

    for inst_id in &block_data.insts {
        let Some(result) = module.inst(*inst_id).result_id else {
            continue;
        };
        let no_uses_outside_block =
            index.while_each_user(result, |user| instructions_in_block.contains(&user));
        if !no_uses_outside_block {
            return false;
        }
    }
    true
}

/// Finds selection-construct headers whose merge instruction can go.
pub struct RemoveSelectionFinder;

impl OpportunityFinder for RemoveSelectionFinder {
    fn name(&self) -> &'static str {
        "remove-selection"
    }

    fn available_opportunities(
        &self,
        ctx: &mut IrContext,
        target_function: Option<FuncId>,
    ) -> Vec<Opportunity> {
        let mut result = Vec::new();
        for func in target_functions(ctx, target_function) {
            let function = &ctx.module().functions[func];
            for block in &function.block_order {
                for inst_id in &function.blocks[*block].insts {
                    if ctx.module().inst(*inst_id).opcode == Opcode::SelectionMerge {
                        result.push(Opportunity::remove_selection(*inst_id));
                    }
                }
            }
        }
        result
    }
}

/// Finds conditional branches with a single effective target.
pub struct SimpleConditionalBranchToBranchFinder;

impl OpportunityFinder for SimpleConditionalBranchToBranchFinder {
    fn name(&self) -> &'static str {
        "simple-conditional-branch-to-branch"
    }

    fn available_opportunities(
        &self,
        ctx: &mut IrContext,
        target_function: Option<FuncId>,
    ) -> Vec<Opportunity> {
        let mut result = Vec::new();
        for func in target_functions(ctx, target_function) {
            let function = &ctx.module().functions[func];
            for block in &function.block_order {
                let Some(terminator) = function.blocks[*block].terminator() else {
                    continue;
                };
                let inst = ctx.module().inst(terminator);
                if inst.opcode == Opcode::BranchConditional && single_target(inst).is_some() {
                    result.push(Opportunity::simplify_conditional_branch(terminator));
                }
            }
        }
        result
    }
}
