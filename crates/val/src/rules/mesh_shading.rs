//! Mesh-shading instruction rules.

use silica_ir::{FuncId, InstId, Instruction, Opcode};

use crate::diagnostic::Diagnostic;
use crate::state::{execution_model, storage_class, ValidationState};

pub fn check(
    state: &mut ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    func: Option<FuncId>,
) -> Result<(), Diagnostic> {
    match inst.opcode {
        Opcode::EmitMeshTasksExt => check_emit_mesh_tasks(state, inst_id, inst, func),
        Opcode::SetMeshOutputsExt => check_set_mesh_outputs(state, inst_id, inst, func),
        _ => Ok(()),
    }
}

fn require_u32_scalar(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    index: usize,
    what: &str,
) -> Result<(), Diagnostic> {
    let ty = state.operand_type_id(inst, index);
    let ok = ty.is_some_and(|ty| {
        state.is_unsigned_int_scalar_type(ty) && state.bit_width(ty) == 32
    });
    if !ok {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!("{what} must be a 32-bit unsigned int scalar"),
        )
        .with_operand_index(index));
    }
    Ok(())
}

fn check_emit_mesh_tasks(
    state: &mut ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    func: Option<FuncId>,
) -> Result<(), Diagnostic> {
    if let Some(func) = func {
        state.register_execution_model_limitation(
            func,
            inst_id,
            Box::new(|model| {
                if model != execution_model::TASK_EXT {
                    return Err(
                        "OpEmitMeshTasksEXT requires TaskEXT execution model".to_string()
                    );
                }
                Ok(())
            }),
        );
    }

    require_u32_scalar(state, inst_id, inst, 0, "Group Count X")?;
    require_u32_scalar(state, inst_id, inst, 1, "Group Count Y")?;
    require_u32_scalar(state, inst_id, inst, 2, "Group Count Z")?;

    if inst.operands.len() == 4 {
        let payload = inst.operand_id(3).and_then(|id| state.find_def(id));
        let Some(payload) = payload.filter(|def| def.opcode == Opcode::Variable) else {
            return Err(Diagnostic::invalid_data(
                inst_id,
                "Payload must be the result of a OpVariable",
            ));
        };
        if payload.operand_u32(0) != Some(storage_class::TASK_PAYLOAD_WORKGROUP) {
            return Err(Diagnostic::invalid_data(
                inst_id,
                "Payload OpVariable must have a storage class of TaskPayloadWorkgroupEXT",
            ));
        }
    }
    Ok(())
}

fn check_set_mesh_outputs(
    state: &mut ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    func: Option<FuncId>,
) -> Result<(), Diagnostic> {
    if let Some(func) = func {
        state.register_execution_model_limitation(
            func,
            inst_id,
            Box::new(|model| {
                if model != execution_model::MESH_EXT {
                    return Err(
                        "OpSetMeshOutputsEXT requires MeshEXT execution model".to_string()
                    );
                }
                Ok(())
            }),
        );
    }

    require_u32_scalar(state, inst_id, inst, 0, "Vertex Count")?;
    require_u32_scalar(state, inst_id, inst, 1, "Primitive Count")?;
    Ok(())
}
