//! Shared algorithms available to every pass.

use silica_grammar::Capability;
use silica_ir::{Id, InstId, Instruction, IrContext, Opcode, Operand};

/// The pointee type of a pointer type, if `ptr_type` is one.
pub fn pointee_type(ctx: &mut IrContext, ptr_type: Id) -> Option<Id> {
    let def = ctx.get_def(ptr_type).ok()?;
    let inst = ctx.module().inst(def);
    if inst.opcode != Opcode::TypePointer {
        return None;
    }
    inst.operand_id(1)
}

/// Strips matrix and vector wrappers down to the scalar component type.
pub fn base_type(ctx: &mut IrContext, ty: Id) -> Option<Id> {
    let mut current = ty;
    loop {
        let def = ctx.get_def(current).ok()?;
        let inst = ctx.module().inst(def);
        match inst.opcode {
            Opcode::TypeMatrix | Opcode::TypeVector => {
                current = inst.operand_id(0)?;
            }
            _ => return Some(current),
        }
    }
}

/// Whether `ty` is (or wraps, through vectors/matrices) a float type of the
/// given width.
pub fn is_float_type(ctx: &mut IrContext, ty: Id, width: u32) -> bool {
    let Some(base) = base_type(ctx, ty) else {
        return false;
    };
    let Ok(def) = ctx.get_def(base) else {
        return false;
    };
    let inst = ctx.module().inst(def);
    inst.opcode == Opcode::TypeFloat && inst.operand_u32(0) == Some(width)
}

/// The zero/default constant for a type, creating it on demand. Types that
/// need capability support request it first, so a 16-bit float zero pulls in
/// the 16-bit float capability.
pub fn get_null_value(ctx: &mut IrContext, ty: Id) -> Id {
    if is_float_type(ctx, ty, 16) {
        ctx.add_capability(Capability::Float16);
    }

    let existing = ctx
        .module()
        .types_global_values
        .iter()
        .map(|id| ctx.module().inst(*id))
        .find(|inst| inst.opcode == Opcode::ConstantNull && inst.result_type == Some(ty))
        .and_then(|inst| inst.result_id);
    if let Some(id) = existing {
        return id;
    }

    let result = ctx.take_next_id();
    ctx.append_global(Instruction::new(
        Opcode::ConstantNull,
        Some(ty),
        Some(result),
        [],
    ));
    result
}

/// Produces a copy of `object` with type `new_type` by recursively
/// decomposing and reconstructing composite values whose types share opcode
/// shape (arrays and structs). Returns `None` when the two shapes are not
/// element-wise convertible.
pub fn generate_copy(
    ctx: &mut IrContext,
    object: Id,
    new_type: Id,
    insertion_point: InstId,
) -> Option<Id> {
    let object_def = ctx.get_def(object).ok()?;
    let original_type = ctx.module().inst(object_def).result_type?;
    if original_type == new_type {
        return Some(object);
    }

    let original_type_def = ctx.get_def(original_type).ok()?;
    let new_type_def = ctx.get_def(new_type).ok()?;
    let original_type_inst = ctx.module().inst(original_type_def).clone();
    let new_type_inst = ctx.module().inst(new_type_def).clone();
    if original_type_inst.opcode != new_type_inst.opcode {
        return None;
    }

    match original_type_inst.opcode {
        Opcode::TypeArray => {
            let original_element_type = original_type_inst.operand_id(0)?;
            let new_element_type = new_type_inst.operand_id(0)?;
            let length = array_length(ctx, &original_type_inst)?;

            let mut element_ids = Vec::with_capacity(length as usize);
            for index in 0..length {
                let extracted =
                    extract_member(ctx, original_element_type, object, index, insertion_point);
                let converted =
                    generate_copy(ctx, extracted, new_element_type, insertion_point)?;
                element_ids.push(converted);
            }
            Some(construct_composite(ctx, new_type, &element_ids, insertion_point))
        }
        Opcode::TypeStruct => {
            if original_type_inst.operands.len() != new_type_inst.operands.len() {
                return None;
            }
            let mut element_ids = Vec::with_capacity(original_type_inst.operands.len());
            for index in 0..original_type_inst.operands.len() {
                let original_member_type = original_type_inst.operand_id(index)?;
                let new_member_type = new_type_inst.operand_id(index)?;
                let extracted = extract_member(
                    ctx,
                    original_member_type,
                    object,
                    index as u32,
                    insertion_point,
                );
                let converted = generate_copy(ctx, extracted, new_member_type, insertion_point)?;
                element_ids.push(converted);
            }
            Some(construct_composite(ctx, new_type, &element_ids, insertion_point))
        }
        // A non-aggregate type mismatch means the copy is not expressible;
        // leave the code as is and let the caller deal with it.
        _ => None,
    }
}

fn array_length(ctx: &mut IrContext, array_type: &Instruction) -> Option<u32> {
    let length_id = array_type.operand_id(1)?;
    let def = ctx.get_def(length_id).ok()?;
    let inst = ctx.module().inst(def);
    if !inst.opcode.is_constant() {
        return None;
    }
    inst.operand_u32(0)
}

fn extract_member(
    ctx: &mut IrContext,
    member_type: Id,
    object: Id,
    index: u32,
    insertion_point: InstId,
) -> Id {
    let result = ctx.take_next_id();
    ctx.insert_before(
        insertion_point,
        Instruction::new(
            Opcode::CompositeExtract,
            Some(member_type),
            Some(result),
            [Operand::Id(object), Operand::Literal32(index)],
        ),
    );
    result
}

fn construct_composite(
    ctx: &mut IrContext,
    ty: Id,
    members: &[Id],
    insertion_point: InstId,
) -> Id {
    let result = ctx.take_next_id();
    ctx.insert_before(
        insertion_point,
        Instruction::new(
            Opcode::CompositeConstruct,
            Some(ty),
            Some(result),
            members.iter().map(|id| Operand::Id(*id)).collect::<Vec<_>>(),
        ),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_env::TargetEnv;
    use silica_grammar::Capability;
    use silica_ir::ModuleBuilder;

    struct Fixture {
        ctx: IrContext,
        struct_f32: Id,
        struct_f16: Id,
        value: Id,
        half: Id,
        insertion_point: InstId,
    }

    fn fixture() -> Fixture {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        builder.capability(Capability::Float16);
        let void = builder.type_void();
        let float = builder.type_float(32);
        let half = builder.type_float(16);
        let struct_f32 = builder.type_struct(&[float, float]);
        let struct_f16 = builder.type_struct(&[half, half]);
        let fn_ty = builder.type_function(void, &[]);
        let one = builder.constant_f32(float, 1.0);
        let value = builder.constant_composite(struct_f32, &[one, one]);

        let func = builder.begin_function(void, fn_ty);
        builder.begin_block();
        builder.ret();
        builder.end_function();
        builder.entry_point_with_interface(5, func, "main", &[]);

        let ctx = IrContext::new(builder.build(), TargetEnv::Universal1_3);
        let (_, function) = ctx.module().functions.iter().next().unwrap();
        let entry = function.entry_block().unwrap();
        let insertion_point = function.blocks[entry].terminator().unwrap();
        Fixture {
            ctx,
            struct_f32,
            struct_f16,
            value,
            half,
            insertion_point,
        }
    }

    #[test]
    fn copy_to_same_type_is_identity() {
        let mut f = fixture();
        let copied = generate_copy(&mut f.ctx, f.value, f.struct_f32, f.insertion_point);
        assert_eq!(copied, Some(f.value));
    }

    #[test]
    fn copy_between_matching_struct_shapes() {
        let mut f = fixture();
        let copied = generate_copy(&mut f.ctx, f.value, f.struct_f16, f.insertion_point)
            .expect("shapes match");
        assert_ne!(copied, f.value);

        // The construct instruction has the target type and two members.
        let def = f.ctx.get_def(copied).unwrap();
        let inst = f.ctx.module().inst(def);
        assert_eq!(inst.opcode, Opcode::CompositeConstruct);
        assert_eq!(inst.result_type, Some(f.struct_f16));
        assert_eq!(inst.operands.len(), 2);
        assert!(f.ctx.is_consistent());
    }

    #[test]
    fn copy_between_mismatched_shapes_fails() {
        let mut f = fixture();
        // A scalar is not opcode-shape compatible with a struct.
        let copied = generate_copy(&mut f.ctx, f.value, f.half, f.insertion_point);
        assert_eq!(copied, None);
    }

    #[test]
    fn null_value_is_deduplicated() {
        let mut f = fixture();
        let a = get_null_value(&mut f.ctx, f.struct_f32);
        let b = get_null_value(&mut f.ctx, f.struct_f32);
        assert_eq!(a, b);
    }

    #[test]
    fn half_null_requests_float16_capability() {
        let mut builder = ModuleBuilder::new(TargetEnv::Universal1_3);
        builder.capability(Capability::Shader);
        let half = builder.type_float(16);
        let mut ctx = IrContext::new(builder.build(), TargetEnv::Universal1_3);

        assert!(!ctx.features().has_capability(Capability::Float16));
        let null = get_null_value(&mut ctx, half);
        assert!(ctx.features().has_capability(Capability::Float16));
        let def = ctx.get_def(null).unwrap();
        assert_eq!(ctx.module().inst(def).opcode, Opcode::ConstantNull);
    }
}
