//! Derivative instruction rules.
//!
//! The type checks run immediately; the execution-model and execution-mode
//! constraints register deferred closures, because an instruction's entry
//! points are only fully known after the whole module has been scanned.

use silica_ir::{FuncId, InstId, Instruction, Opcode};

use crate::diagnostic::Diagnostic;
use crate::state::{execution_mode, execution_model, ValidationState};

pub fn check(
    state: &mut ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    func: Option<FuncId>,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    if !matches!(
        opcode,
        Opcode::DPdx
            | Opcode::DPdy
            | Opcode::Fwidth
            | Opcode::DPdxFine
            | Opcode::DPdyFine
            | Opcode::FwidthFine
            | Opcode::DPdxCoarse
            | Opcode::DPdyCoarse
            | Opcode::FwidthCoarse
    ) {
        return Ok(());
    }

    let Some(result_type) = inst.result_type else {
        return Ok(());
    };

    if !state.is_float_scalar_or_vector_type(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected Result Type to be float scalar or vector type: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if !state.contains_sized_float_type(result_type, 32) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            "Result type component width must be 32 bits",
        ));
    }

    let p_type = state.operand_type_id(inst, 2);
    if p_type != Some(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected P type and Result Type to be the same: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let Some(func) = func else {
        return Ok(());
    };

    state.register_execution_model_limitation(
        func,
        inst_id,
        Box::new(move |model| {
            if !matches!(
                model,
                execution_model::FRAGMENT
                    | execution_model::GL_COMPUTE
                    | execution_model::MESH_EXT
                    | execution_model::TASK_EXT
            ) {
                return Err(format!(
                    "Derivative instructions require Fragment, GLCompute, MeshEXT or TaskEXT \
                     execution model: {}",
                    opcode.mnemonic()
                ));
            }
            Ok(())
        }),
    );

    state.register_limitation(
        func,
        inst_id,
        Box::new(move |info| {
            let compute_like = info.models.contains(&execution_model::GL_COMPUTE)
                || info.models.contains(&execution_model::MESH_EXT)
                || info.models.contains(&execution_model::TASK_EXT);
            let has_derivative_group = info
                .modes
                .contains(&execution_mode::DERIVATIVE_GROUP_QUADS)
                || info
                    .modes
                    .contains(&execution_mode::DERIVATIVE_GROUP_LINEAR);
            if compute_like && !has_derivative_group {
                return Err(format!(
                    "Derivative instructions require DerivativeGroupQuadsKHR or \
                     DerivativeGroupLinearKHR execution mode for GLCompute, MeshEXT or TaskEXT \
                     execution model: {}",
                    opcode.mnemonic()
                ));
            }
            Ok(())
        }),
    );

    Ok(())
}
