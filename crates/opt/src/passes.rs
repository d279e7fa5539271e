//! Concrete passes.

use rustc_hash::FxHashSet;
use silica_ir::{Id, IrContext, Opcode};

use crate::{Pass, Status};

/// Does nothing; useful for exercising pipeline plumbing.
pub struct EmptyPass;

impl Pass for EmptyPass {
    fn name(&self) -> &'static str {
        "empty-pass"
    }

    fn process(&mut self, _ctx: &mut IrContext) -> Status {
        Status::NoChange
    }
}

/// Drops entry-point interface ids whose variables are never referenced
/// outside declarations, debug names and annotations.
pub struct RemoveUnusedInterfaceVariablesPass;

impl RemoveUnusedInterfaceVariablesPass {
    fn is_interface_use(opcode: Opcode) -> bool {
        !matches!(
            opcode,
            Opcode::EntryPoint | Opcode::Name | Opcode::MemberName | Opcode::Decorate
                | Opcode::MemberDecorate
        )
    }
}

impl Pass for RemoveUnusedInterfaceVariablesPass {
    fn name(&self) -> &'static str {
        "remove-unused-interface-variables"
    }

    fn process(&mut self, ctx: &mut IrContext) -> Status {
        // An entry point's interface begins after the execution model, the
        // function id, and the name.
        const INTERFACE_START: usize = 3;

        let mut unused: FxHashSet<Id> = FxHashSet::default();
        let entry_points = ctx.module().entry_points.clone();
        {
            let (index, module) = ctx.def_use_and_module();
            for entry in &entry_points {
                let interface = module
                    .inst(*entry)
                    .operands
                    .iter()
                    .skip(INTERFACE_START)
                    .filter_map(|operand| operand.as_id());
                for var in interface {
                    let used = !index.while_each_user(var, |user| {
                        !Self::is_interface_use(module.inst(user).opcode)
                    });
                    if !used {
                        unused.insert(var);
                    }
                }
            }
        }

        if unused.is_empty() {
            return Status::NoChange;
        }

        for entry in &entry_points {
            let inst = ctx.module_mut().inst_mut(*entry);
            let mut index = 0;
            inst.operands.retain(|operand| {
                index += 1;
                if index <= INTERFACE_START {
                    return true;
                }
                operand.as_id().is_none_or(|id| !unused.contains(&id))
            });
        }
        Status::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PassRunner;
    use silica_env::TargetEnv;
    use silica_grammar::Capability;
    use silica_ir::{ModuleBuilder, Operand};

    fn context_with_interface(use_variable: bool) -> (IrContext, Id) {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_4);
        builder.capability(Capability::Shader);
        let void = builder.type_void();
        let float = builder.type_float(32);
        let ptr = builder.type_pointer(1, float); // Input storage class
        let var = builder.global_variable(ptr, 1);
        let fn_ty = builder.type_function(void, &[]);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        if use_variable {
            builder.inst(Opcode::Load, Some(float), vec![Operand::Id(var)]);
        }
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(4, func, "main", &[var]);
        builder.execution_mode(func, 7, &[]); // OriginUpperLeft
        (
            IrContext::new(builder.build(), TargetEnv::Universal1_4),
            var,
        )
    }

    #[test]
    fn unused_interface_variable_is_dropped() {
        let (mut ctx, var) = context_with_interface(false);
        let mut runner = PassRunner::new(RemoveUnusedInterfaceVariablesPass);
        assert_eq!(runner.run(&mut ctx), Ok(Status::Changed));

        let entry = ctx.module().entry_points[0];
        let has_var = ctx
            .module()
            .inst(entry)
            .operands
            .iter()
            .any(|operand| operand.as_id() == Some(var));
        assert!(!has_var);
    }

    #[test]
    fn used_interface_variable_is_kept() {
        let (mut ctx, var) = context_with_interface(true);
        let mut runner = PassRunner::new(RemoveUnusedInterfaceVariablesPass);
        assert_eq!(runner.run(&mut ctx), Ok(Status::NoChange));

        let entry = ctx.module().entry_points[0];
        let has_var = ctx
            .module()
            .inst(entry)
            .operands
            .iter()
            .any(|operand| operand.as_id() == Some(var));
        assert!(has_var);
    }
}
