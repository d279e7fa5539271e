//! The validator rule engine.
//!
//! Rules dispatch once per instruction in module order. Instruction-local
//! checks run immediately and accumulate diagnostics without aborting the
//! run. Execution-model and execution-mode constraints register deferred
//! closures instead, evaluated only after the whole module (in particular
//! every entry point) has been scanned.

mod diagnostic;
pub mod rules;
mod state;

use silica_env::TargetEnv;
use silica_ir::Module;

pub use diagnostic::{Diagnostic, ErrorCode, ValidationReport};
pub use state::{
    cooperative_matrix_use, execution_mode, execution_model, storage_class, EntryPointInfo,
    ValidationState,
};

/// Validates a module, accumulating diagnostics bound to the offending
/// instructions. Rule failures never abort the run; the report is the
/// product.
pub fn validate_module(module: &Module, target_env: TargetEnv) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut state = ValidationState::new(module, target_env);

    // Every referenced identifier must resolve to exactly one definition
    // before rule checks can reason about types.
    for (inst_id, _) in module.iter_all_insts() {
        let mut missing = Vec::new();
        module.inst(inst_id).for_each_ref(|id| {
            if !state.def_use().has_def(id) {
                missing.push(id);
            }
        });
        for id in missing {
            report.push(Diagnostic::new(
                ErrorCode::InvalidLookup,
                inst_id,
                format!("instruction references undefined id {id}"),
            ));
        }
    }

    for (inst_id, func) in module.iter_all_insts() {
        let inst = module.inst(inst_id);
        if let Err(diagnostic) = rules::constants::check(&mut state, inst_id, inst, func) {
            report.push(diagnostic);
        }
        if let Err(diagnostic) = rules::arithmetics::check(&mut state, inst_id, inst, func) {
            report.push(diagnostic);
        }
        if let Err(diagnostic) = rules::derivatives::check(&mut state, inst_id, inst, func) {
            report.push(diagnostic);
        }
        if let Err(diagnostic) = rules::mesh_shading::check(&mut state, inst_id, inst, func) {
            report.push(diagnostic);
        }
    }

    state.finalize(&mut report);
    report
}
