//! Arithmetic instruction rules: operand types must agree with the result
//! type in scalarness, dimension and bit width, with carve-outs for
//! cooperative matrix and vector types. No implicit coercion anywhere.

use silica_grammar::Capability;
use silica_ir::{FuncId, Id, InstId, Instruction, Opcode};

use crate::diagnostic::Diagnostic;
use crate::state::ValidationState;

pub fn check(
    state: &mut ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    _func: Option<FuncId>,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let Some(result_type) = inst.result_type else {
        return Ok(());
    };

    match opcode {
        Opcode::FAdd
        | Opcode::FSub
        | Opcode::FMul
        | Opcode::FDiv
        | Opcode::FRem
        | Opcode::FMod
        | Opcode::FNegate => check_float_arithmetic(state, inst_id, inst, result_type),
        Opcode::UDiv | Opcode::UMod => check_unsigned_arithmetic(state, inst_id, inst, result_type),
        Opcode::IAdd
        | Opcode::ISub
        | Opcode::IMul
        | Opcode::SDiv
        | Opcode::SMod
        | Opcode::SRem
        | Opcode::SNegate => check_int_arithmetic(state, inst_id, inst, result_type),
        Opcode::Dot => check_dot(state, inst_id, inst, result_type),
        Opcode::VectorTimesScalar => check_vector_times_scalar(state, inst_id, inst, result_type),
        Opcode::MatrixTimesScalar => check_matrix_times_scalar(state, inst_id, inst, result_type),
        Opcode::VectorTimesMatrix => check_vector_times_matrix(state, inst_id, inst, result_type),
        Opcode::MatrixTimesVector => check_matrix_times_vector(state, inst_id, inst, result_type),
        Opcode::MatrixTimesMatrix => check_matrix_times_matrix(state, inst_id, inst, result_type),
        Opcode::OuterProduct => check_outer_product(state, inst_id, inst, result_type),
        Opcode::IAddCarry | Opcode::ISubBorrow | Opcode::UMulExtended | Opcode::SMulExtended => {
            check_extended_arithmetic(state, inst_id, inst, result_type)
        }
        Opcode::CooperativeMatrixMulAddKhr | Opcode::CooperativeMatrixMulAddNv => {
            check_cooperative_matrix_mul_add(state, inst_id, inst, result_type)
        }
        _ => Ok(()),
    }
}

/// Logical indices of the value operands: past the result type and result
/// id slots.
fn value_operand_indices(inst: &Instruction) -> impl Iterator<Item = usize> {
    let offset = usize::from(inst.result_type.is_some()) + usize::from(inst.result_id.is_some());
    (0..inst.operands.len()).map(move |i| i + offset)
}

fn operand_mismatch(inst_id: InstId, opcode: Opcode, index: usize) -> Diagnostic {
    Diagnostic::invalid_data(
        inst_id,
        format!(
            "Expected arithmetic operands to be of Result Type: {}",
            opcode.mnemonic()
        ),
    )
    .with_operand_index(index)
}

fn check_float_arithmetic(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let supports_coop_mat =
        !matches!(opcode, Opcode::FMul | Opcode::FRem | Opcode::FMod);
    let supports_coop_vec = !matches!(opcode, Opcode::FRem | Opcode::FMod);

    let result_ok = state.is_float_scalar_type(result_type)
        || state.is_float_vector_type(result_type)
        || (supports_coop_mat && state.is_float_cooperative_matrix_type(result_type))
        || (opcode == Opcode::FMul
            && state.is_cooperative_matrix_type(result_type)
            && state.is_float_cooperative_matrix_type(result_type))
        || (supports_coop_vec && state.is_float_cooperative_vector_type(result_type));
    if !result_ok {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected floating scalar or vector type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    for index in value_operand_indices(inst) {
        if supports_coop_vec && state.is_cooperative_vector_type(result_type) {
            let type_id = state.operand_type_id(inst, index);
            let Some(type_id) = type_id.filter(|t| state.is_cooperative_vector_type(*t)) else {
                return Err(operand_mismatch(inst_id, opcode, index));
            };
            state.cooperative_vector_dimensions_match(inst_id, type_id, result_type, opcode)?;
        } else if supports_coop_mat && state.is_cooperative_matrix_type(result_type) {
            let type_id = state.operand_type_id(inst, index);
            let Some(type_id) = type_id.filter(|t| {
                state.is_cooperative_matrix_type(*t)
                    && state.is_float_cooperative_matrix_type(*t)
            }) else {
                return Err(operand_mismatch(inst_id, opcode, index));
            };
            state.cooperative_matrix_shapes_match(inst_id, result_type, type_id, opcode)?;
        } else if state.operand_type_id(inst, index) != Some(result_type) {
            return Err(operand_mismatch(inst_id, opcode, index));
        }
    }
    Ok(())
}

fn check_unsigned_arithmetic(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let supports_coop = opcode == Opcode::UDiv;

    let result_ok = state.is_unsigned_int_scalar_type(result_type)
        || state.is_unsigned_int_vector_type(result_type)
        || (supports_coop && state.is_unsigned_int_cooperative_matrix_type(result_type))
        || (supports_coop && state.is_unsigned_int_cooperative_vector_type(result_type));
    if !result_ok {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected unsigned int scalar or vector type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    for index in value_operand_indices(inst) {
        if supports_coop && state.is_cooperative_vector_type(result_type) {
            let type_id = state.operand_type_id(inst, index);
            let Some(type_id) = type_id.filter(|t| state.is_cooperative_vector_type(*t)) else {
                return Err(operand_mismatch(inst_id, opcode, index));
            };
            state.cooperative_vector_dimensions_match(inst_id, type_id, result_type, opcode)?;
        } else if supports_coop && state.is_cooperative_matrix_type(result_type) {
            let type_id = state.operand_type_id(inst, index);
            let Some(type_id) = type_id.filter(|t| {
                state.is_cooperative_matrix_type(*t)
                    && state.is_unsigned_int_cooperative_matrix_type(*t)
            }) else {
                return Err(operand_mismatch(inst_id, opcode, index));
            };
            state.cooperative_matrix_shapes_match(inst_id, result_type, type_id, opcode)?;
        } else if state.operand_type_id(inst, index) != Some(result_type) {
            return Err(operand_mismatch(inst_id, opcode, index));
        }
    }
    Ok(())
}

fn check_int_arithmetic(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let supports_coop_mat =
        !matches!(opcode, Opcode::IMul | Opcode::SRem | Opcode::SMod);
    let supports_coop_vec = !matches!(opcode, Opcode::SRem | Opcode::SMod);

    let result_ok = state.is_int_scalar_type(result_type)
        || state.is_int_vector_type(result_type)
        || (supports_coop_mat && state.is_int_cooperative_matrix_type(result_type))
        || (opcode == Opcode::IMul
            && state.is_cooperative_matrix_type(result_type)
            && state.is_int_cooperative_matrix_type(result_type))
        || (supports_coop_vec && state.is_int_cooperative_vector_type(result_type));
    if !result_ok {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected int scalar or vector type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    // Signedness may differ between operands, but dimension and bit width
    // must agree exactly with the result type.
    let dimension = state.dimension(result_type);
    let bit_width = state.bit_width(result_type);

    for index in value_operand_indices(inst) {
        let type_id = state.operand_type_id(inst, index);

        if supports_coop_vec && state.is_cooperative_vector_type(result_type) {
            let Some(type_id) = type_id.filter(|t| state.is_cooperative_vector_type(*t)) else {
                return Err(operand_mismatch(inst_id, opcode, index));
            };
            state.cooperative_vector_dimensions_match(inst_id, type_id, result_type, opcode)?;
        }

        if supports_coop_mat && state.is_cooperative_matrix_type(result_type) {
            let Some(type_id) = type_id.filter(|t| {
                state.is_cooperative_matrix_type(*t) && state.is_int_cooperative_matrix_type(*t)
            }) else {
                return Err(operand_mismatch(inst_id, opcode, index));
            };
            state.cooperative_matrix_shapes_match(inst_id, result_type, type_id, opcode)?;
        }

        let operand_ok = type_id.is_some_and(|t| {
            state.is_int_scalar_type(t)
                || state.is_int_vector_type(t)
                || (supports_coop_mat && state.is_int_cooperative_matrix_type(result_type))
                || (opcode == Opcode::IMul
                    && state.is_cooperative_matrix_type(result_type)
                    && state.is_int_cooperative_matrix_type(result_type))
                || (supports_coop_vec && state.is_int_cooperative_vector_type(result_type))
        });
        if !operand_ok {
            return Err(Diagnostic::invalid_data(
                inst_id,
                format!(
                    "Expected int scalar or vector type as operand: {}",
                    opcode.mnemonic()
                ),
            )
            .with_operand_index(index));
        }

        let type_id = type_id.expect("checked above");
        if state.dimension(type_id) != dimension {
            return Err(Diagnostic::invalid_data(
                inst_id,
                format!(
                    "Expected arithmetic operands to have the same dimension as Result Type: {}",
                    opcode.mnemonic()
                ),
            )
            .with_operand_index(index));
        }
        if state.bit_width(type_id) != bit_width {
            return Err(Diagnostic::invalid_data(
                inst_id,
                format!(
                    "Expected arithmetic operands to have the same bit width as Result Type: {}",
                    opcode.mnemonic()
                ),
            )
            .with_operand_index(index));
        }
    }
    Ok(())
}

fn check_dot(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    if !state.is_float_scalar_type(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float scalar type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    if state.is_bfloat16_scalar_type(result_type)
        && !state
            .features()
            .has_capability(Capability::BFloat16DotProductKhr)
    {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "{} Result Type requires BFloat16DotProductKHR be declared",
                opcode.mnemonic()
            ),
        ));
    }

    let mut first_vector_num_components = None;
    for index in value_operand_indices(inst) {
        let type_id = state.operand_type_id(inst, index);
        let Some(type_id) = type_id.filter(|t| state.is_float_vector_type(*t)) else {
            return Err(Diagnostic::invalid_data(
                inst_id,
                format!("Expected float vector as operand: {}", opcode.mnemonic()),
            )
            .with_operand_index(index));
        };

        if state.component_type(type_id) != result_type {
            return Err(Diagnostic::invalid_data(
                inst_id,
                format!(
                    "Expected component type to be equal to Result Type: {}",
                    opcode.mnemonic()
                ),
            )
            .with_operand_index(index));
        }

        let num_components = state.dimension(type_id);
        match first_vector_num_components {
            None => first_vector_num_components = Some(num_components),
            Some(first) if first != num_components => {
                return Err(Diagnostic::invalid_data(
                    inst_id,
                    format!(
                        "Expected operands to have the same number of components: {}",
                        opcode.mnemonic()
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_vector_times_scalar(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    if !state.is_float_vector_type(result_type)
        && !state.is_float_cooperative_vector_type(result_type)
    {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float vector type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let vector_type = state.operand_type_id(inst, 2);
    if vector_type != Some(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected vector operand type to be equal to Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let component = state.component_type(vector_type.expect("checked above"));
    if state.operand_type_id(inst, 3) != Some(component) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected scalar operand type to be equal to the component type of the vector \
                 operand: {}",
                opcode.mnemonic()
            ),
        ));
    }
    Ok(())
}

fn check_matrix_times_scalar(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let is_float_matrix = state
        .matrix_type_info(result_type)
        .is_some_and(|(_, _, _, component)| state.is_float_scalar_type(component));
    if !is_float_matrix && !state.is_cooperative_matrix_type(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let matrix_type = state.operand_type_id(inst, 2);
    if matrix_type != Some(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected matrix operand type to be equal to Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let component = state.component_type(state.component_type(result_type));
    if state.operand_type_id(inst, 3) != Some(component) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected scalar operand type to be equal to the component type of the matrix \
                 operand: {}",
                opcode.mnemonic()
            ),
        ));
    }
    Ok(())
}

fn check_vector_times_matrix(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let vector_type = state.operand_type_id(inst, 2);
    let matrix_type = state.operand_type_id(inst, 3);

    if !state.is_float_vector_type(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float vector type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }
    let res_component = state.component_type(result_type);

    let Some(vector_type) = vector_type.filter(|t| state.is_float_vector_type(*t)) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float vector type as left operand: {}",
                opcode.mnemonic()
            ),
        ));
    };
    if res_component != state.component_type(vector_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected component types of Result Type and vector to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let Some((rows, cols, _, matrix_component)) =
        matrix_type.and_then(|t| state.matrix_type_info(t))
    else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as right operand: {}",
                opcode.mnemonic()
            ),
        ));
    };
    if res_component != matrix_component {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected component types of Result Type and matrix to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if cols != state.dimension(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected number of columns of the matrix to be equal to Result Type vector \
                 size: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if rows != state.dimension(vector_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected number of rows of the matrix to be equal to the vector operand \
                 size: {}",
                opcode.mnemonic()
            ),
        ));
    }
    Ok(())
}

fn check_matrix_times_vector(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let matrix_type = state.operand_type_id(inst, 2);
    let vector_type = state.operand_type_id(inst, 3);

    if !state.is_float_vector_type(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float vector type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let Some((_, cols, col_type, matrix_component)) =
        matrix_type.and_then(|t| state.matrix_type_info(t))
    else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as left operand: {}",
                opcode.mnemonic()
            ),
        ));
    };
    if result_type != col_type {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected column type of the matrix to be equal to Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let Some(vector_type) = vector_type.filter(|t| state.is_float_vector_type(*t)) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float vector type as right operand: {}",
                opcode.mnemonic()
            ),
        ));
    };
    if matrix_component != state.component_type(vector_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected component types of the operands to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if cols != state.dimension(vector_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected number of columns of the matrix to be equal to the vector size: {}",
                opcode.mnemonic()
            ),
        ));
    }
    Ok(())
}

fn check_matrix_times_matrix(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let left_type = state.operand_type_id(inst, 2);
    let right_type = state.operand_type_id(inst, 3);

    let Some((res_rows, res_cols, res_col_type, res_component)) =
        state.matrix_type_info(result_type)
    else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    };
    let Some((left_rows, left_cols, left_col_type, _)) =
        left_type.and_then(|t| state.matrix_type_info(t))
    else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as left operand: {}",
                opcode.mnemonic()
            ),
        ));
    };
    let Some((right_rows, right_cols, _, right_component)) =
        right_type.and_then(|t| state.matrix_type_info(t))
    else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as right operand: {}",
                opcode.mnemonic()
            ),
        ));
    };

    if !state.is_float_scalar_type(res_component) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if res_col_type != left_col_type {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected column types of Result Type and left matrix to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if res_component != right_component {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected component types of Result Type and right matrix to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if res_cols != right_cols {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected number of columns of Result Type and right matrix to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if left_cols != right_rows {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected number of columns of left matrix and number of rows of right matrix \
                 to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    debug_assert_eq!(left_rows, res_rows);
    Ok(())
}

fn check_outer_product(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let left_type = state.operand_type_id(inst, 2);
    let right_type = state.operand_type_id(inst, 3);

    let Some((_, res_cols, res_col_type, res_component)) = state.matrix_type_info(result_type)
    else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float matrix type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    };

    if left_type != Some(res_col_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected column type of Result Type to be equal to the type of the left \
                 operand: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let Some(right_type) = right_type.filter(|t| state.is_float_vector_type(*t)) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected float vector type as right operand: {}",
                opcode.mnemonic()
            ),
        ));
    };
    if res_component != state.component_type(right_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected component types of the operands to be equal: {}",
                opcode.mnemonic()
            ),
        ));
    }
    if res_cols != state.dimension(right_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected number of columns of the matrix to be equal to the vector size of \
                 the right operand: {}",
                opcode.mnemonic()
            ),
        ));
    }
    Ok(())
}

fn check_extended_arithmetic(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let Some(member_types) = state.struct_member_types(result_type) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!("Expected a struct as Result Type: {}", opcode.mnemonic()),
        ));
    };

    if member_types.len() != 2 {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected Result Type struct to have two members: {}",
                opcode.mnemonic()
            ),
        ));
    }

    if opcode == Opcode::SMulExtended {
        if !state.is_int_scalar_type(member_types[0]) && !state.is_int_vector_type(member_types[0])
        {
            return Err(Diagnostic::invalid_data(
                inst_id,
                format!(
                    "Expected Result Type struct member types to be integer scalar or vector: {}",
                    opcode.mnemonic()
                ),
            ));
        }
    } else if !state.is_unsigned_int_scalar_type(member_types[0])
        && !state.is_unsigned_int_vector_type(member_types[0])
    {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected Result Type struct member types to be unsigned integer scalar or \
                 vector: {}",
                opcode.mnemonic()
            ),
        ));
    }

    if member_types[0] != member_types[1] {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected Result Type struct member types to be identical: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let left = state.operand_type_id(inst, 2);
    let right = state.operand_type_id(inst, 3);
    if left != Some(member_types[0]) || right != Some(member_types[0]) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected both operands to be of Result Type member type: {}",
                opcode.mnemonic()
            ),
        ));
    }
    Ok(())
}

fn check_cooperative_matrix_mul_add(
    state: &ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    result_type: Id,
) -> Result<(), Diagnostic> {
    let opcode = inst.opcode;
    let a_type = state.operand_type_id(inst, 2);
    let b_type = state.operand_type_id(inst, 3);
    let c_type = state.operand_type_id(inst, 4);

    let Some(a_type) = a_type.filter(|t| state.is_cooperative_matrix_a_type(*t)) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Cooperative matrix type must be A Type: {}",
                opcode.mnemonic()
            ),
        ));
    };
    let Some(b_type) = b_type.filter(|t| state.is_cooperative_matrix_b_type(*t)) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Cooperative matrix type must be B Type: {}",
                opcode.mnemonic()
            ),
        ));
    };
    let Some(c_type) = c_type.filter(|t| state.is_cooperative_matrix_acc_type(*t)) else {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Cooperative matrix type must be Accumulator Type: {}",
                opcode.mnemonic()
            ),
        ));
    };
    if !state.is_cooperative_matrix_type(result_type) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "Expected cooperative matrix type as Result Type: {}",
                opcode.mnemonic()
            ),
        ));
    }

    let d_type = result_type;
    let scope = |ty: Id| state.cooperative_matrix_field(ty, 1);
    let rows = |ty: Id| state.cooperative_matrix_field(ty, 2);
    let cols = |ty: Id| state.cooperative_matrix_field(ty, 3);

    let not_equal = |x: Option<u32>, y: Option<u32>| matches!((x, y), (Some(x), Some(y)) if x != y);

    let scopes = [scope(a_type), scope(b_type), scope(c_type), scope(d_type)];
    for i in 0..scopes.len() {
        for j in i + 1..scopes.len() {
            if not_equal(scopes[i], scopes[j]) {
                return Err(Diagnostic::invalid_data(
                    inst_id,
                    format!("Cooperative matrix scopes must match: {}", opcode.mnemonic()),
                ));
            }
        }
    }

    // M: rows of A, C and D agree.
    let m = [rows(a_type), rows(c_type), rows(d_type)];
    for i in 0..m.len() {
        for j in i + 1..m.len() {
            if not_equal(m[i], m[j]) {
                return Err(Diagnostic::invalid_data(
                    inst_id,
                    format!("Cooperative matrix 'M' mismatch: {}", opcode.mnemonic()),
                ));
            }
        }
    }

    // N: cols of B, C and D agree.
    let n = [cols(b_type), cols(c_type), cols(d_type)];
    for i in 0..n.len() {
        for j in i + 1..n.len() {
            if not_equal(n[i], n[j]) {
                return Err(Diagnostic::invalid_data(
                    inst_id,
                    format!("Cooperative matrix 'N' mismatch: {}", opcode.mnemonic()),
                ));
            }
        }
    }

    // K: cols of A agree with rows of B.
    if not_equal(cols(a_type), rows(b_type)) {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!("Cooperative matrix 'K' mismatch: {}", opcode.mnemonic()),
        ));
    }
    Ok(())
}
