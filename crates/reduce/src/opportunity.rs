//! Reduction opportunities: candidate graph edits with a precondition and a
//! single-shot application.

use silica_ir::{BlockId, FuncId, Id, InstId, Instruction, IrContext, Opcode, Operand};

use crate::finders::block_is_removable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpportunityKind {
    /// Remove a whole unreferenced block.
    RemoveBlock { func: FuncId, block: BlockId },
    /// Remove a selection construct's merge instruction.
    RemoveSelection { merge_inst: InstId },
    /// Turn a single-target conditional branch into a plain branch.
    SimplifyConditionalBranch { branch: InstId },
    /// Remove one instruction.
    RemoveInstruction { inst: InstId },
}

/// A candidate edit bound to a specific module location. Applying consumes
/// the opportunity; a second application is refused.
#[derive(Debug)]
pub struct Opportunity {
    kind: OpportunityKind,
    applied: bool,
}

impl Opportunity {
    pub fn new(kind: OpportunityKind) -> Self {
        Self {
            kind,
            applied: false,
        }
    }

    pub fn remove_block(func: FuncId, block: BlockId) -> Self {
        Self::new(OpportunityKind::RemoveBlock { func, block })
    }

    pub fn remove_selection(merge_inst: InstId) -> Self {
        Self::new(OpportunityKind::RemoveSelection { merge_inst })
    }

    pub fn simplify_conditional_branch(branch: InstId) -> Self {
        Self::new(OpportunityKind::SimplifyConditionalBranch { branch })
    }

    pub fn remove_instruction(inst: InstId) -> Self {
        Self::new(OpportunityKind::RemoveInstruction { inst })
    }

    pub fn kind(&self) -> OpportunityKind {
        self.kind
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    /// Whether the edit is still legal. Applying another opportunity may
    /// have falsified a precondition established at discovery time.
    pub fn precondition_holds(&self, ctx: &mut IrContext) -> bool {
        if self.applied {
            return false;
        }
        match self.kind {
            OpportunityKind::RemoveBlock { func, block } => block_is_removable(ctx, func, block),
            OpportunityKind::RemoveSelection { merge_inst } => {
                ctx.module().inst(merge_inst).opcode == Opcode::SelectionMerge
            }
            OpportunityKind::SimplifyConditionalBranch { branch } => {
                let inst = ctx.module().inst(branch);
                inst.opcode == Opcode::BranchConditional
                    && single_target(inst).is_some()
            }
            OpportunityKind::RemoveInstruction { .. } => true,
        }
    }

    /// Checks the precondition and applies the edit. Returns whether the
    /// module was mutated; consumed opportunities always return `false`.
    pub fn try_apply(&mut self, ctx: &mut IrContext) -> bool {
        if !self.precondition_holds(ctx) {
            return false;
        }
        self.applied = true;

        match self.kind {
            OpportunityKind::RemoveBlock { func, block } => {
                let block_data = &ctx.module().functions[func].blocks[block];
                let doomed: Vec<InstId> = block_data
                    .label
                    .into_iter()
                    .chain(block_data.insts.iter().copied())
                    .collect();
                for inst in doomed {
                    ctx.kill_inst(inst);
                }
                ctx.module_mut().remove_block(func, block);
            }
            OpportunityKind::RemoveSelection { merge_inst } => {
                ctx.kill_inst(merge_inst);
            }
            OpportunityKind::SimplifyConditionalBranch { branch } => {
                let target = single_target(ctx.module().inst(branch))
                    .expect("precondition checked the target");
                ctx.replace_inst(
                    branch,
                    Instruction::new(Opcode::Branch, None, None, [Operand::Id(target)]),
                );
            }
            OpportunityKind::RemoveInstruction { inst } => {
                ctx.kill_inst(inst);
            }
        }
        true
    }
}

/// The single effective target of a conditional branch whose arms agree.
pub(crate) fn single_target(inst: &Instruction) -> Option<Id> {
    let then_target = inst.operand_id(1)?;
    let else_target = inst.operand_id(2)?;
    (then_target == else_target).then_some(then_target)
}
