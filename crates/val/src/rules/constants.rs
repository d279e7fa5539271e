//! Constant literal rules: the encoded literal must occupy exactly the
//! words its type prescribes, and narrow literals must not smuggle payload
//! into their padding bits.

use silica_ir::{FuncId, InstId, Instruction, Opcode, Operand};
use silica_numeric::FloatKind;

use crate::diagnostic::Diagnostic;
use crate::state::ValidationState;

pub fn check(
    state: &mut ValidationState,
    inst_id: InstId,
    inst: &Instruction,
    _func: Option<FuncId>,
) -> Result<(), Diagnostic> {
    if !matches!(inst.opcode, Opcode::Constant | Opcode::SpecConstant) {
        return Ok(());
    }
    let Some(result_type) = inst.result_type else {
        return Ok(());
    };
    let Some(type_def) = state.find_def(result_type) else {
        return Ok(());
    };

    let width = match type_def.opcode {
        Opcode::TypeInt | Opcode::TypeFloat => type_def.operand_u32(0).unwrap_or(0),
        _ => return Ok(()),
    };

    let expected_words = if width > 32 { 2 } else { 1 };
    let actual_words = match inst.operands.first() {
        Some(Operand::Literal32(_)) => 1,
        Some(Operand::Literal64(_)) => 2,
        _ => 0,
    };
    if actual_words != expected_words {
        return Err(Diagnostic::invalid_data(
            inst_id,
            format!(
                "{} literal for a {width}-bit type must occupy {expected_words} word(s)",
                inst.opcode.mnemonic()
            ),
        ));
    }

    // Sub-word literals are stored in the low-order bits of one word; the
    // padding above them must be zero.
    if type_def.opcode == Opcode::TypeFloat && width < 32 {
        if let (Some(kind), Some(word)) = (FloatKind::for_width(width), inst.operand_u32(0)) {
            let used_bits = kind.spec().total_bits;
            if u64::from(word) >> used_bits != 0 {
                return Err(Diagnostic::invalid_data(
                    inst_id,
                    format!(
                        "high-order bits of a {width}-bit float literal must be zero: {}",
                        inst.opcode.mnemonic()
                    ),
                ));
            }
        }
    }
    Ok(())
}
