use silica_env::TargetEnv;
use silica_grammar::Capability;
use silica_ir::{Id, ModuleBuilder, Opcode, Operand};
use silica_val::{validate_module, ErrorCode, ValidationReport};

fn message_containing(report: &ValidationReport, needle: &str) -> bool {
    report
        .diagnostics
        .iter()
        .any(|diagnostic| diagnostic.message.contains(needle))
}

struct ShaderScaffold {
    builder: ModuleBuilder,
    void: Id,
    float: Id,
    vec4: Id,
    fn_ty: Id,
}

fn scaffold(env: TargetEnv) -> ShaderScaffold {
    let mut builder = ModuleBuilder::new(env);
    builder.capability(Capability::Shader);
    let void = builder.type_void();
    let float = builder.type_float(32);
    let vec4 = builder.type_vector(float, 4);
    let fn_ty = builder.type_function(void, &[]);
    ShaderScaffold {
        builder,
        void,
        float,
        vec4,
        fn_ty,
    }
}

#[test]
fn valid_module_is_ok() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let one = s.builder.constant_f32(s.float, 1.0);
    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::FAdd, s.float, one, one);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);
    s.builder.execution_mode(func, 7, &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(report.is_ok(), "expected no diagnostics, got {report}");
}

#[test]
fn fadd_with_struct_operand_reports_invalid_data_with_operand_index() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let struct_ty = s.builder.type_struct(&[s.float, s.float]);
    let one = s.builder.constant_f32(s.float, 1.0);
    let vec_value = s.builder.constant_composite(s.vec4, &[one, one, one, one]);
    let struct_value = s.builder.constant_composite(struct_ty, &[one, one]);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder
        .binary(Opcode::FAdd, s.vec4, vec_value, struct_value);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(report.has_code(ErrorCode::InvalidData), "{report}");

    let diagnostic = report
        .diagnostics
        .iter()
        .find(|d| d.code == ErrorCode::InvalidData)
        .unwrap();
    // The struct value is the second arithmetic operand: logical index 3.
    assert_eq!(diagnostic.operand_index, Some(3), "{report}");
    assert!(diagnostic.message.contains("OpFAdd"), "{report}");
}

#[test]
fn float_arithmetic_requires_float_result() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let int_ty = s.builder.type_int(32, 1);
    let one = s.builder.constant_u32(int_ty, 1);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::FAdd, int_ty, one, one);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "Expected floating scalar or vector type as Result Type"),
        "{report}"
    );
}

#[test]
fn int_arithmetic_bit_widths_must_match() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    s.builder.capability(Capability::Int64);
    let u32_ty = s.builder.type_int(32, 0);
    let u64_ty = s.builder.type_int(64, 0);
    let small = s.builder.constant_u32(u32_ty, 1);
    let big = s.builder.constant_u32(u64_ty, 1);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::IAdd, u32_ty, small, big);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "same bit width"),
        "{report}"
    );
}

#[test]
fn signedness_mismatch_is_tolerated_for_int_arithmetic() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let u32_ty = s.builder.type_int(32, 0);
    let s32_ty = s.builder.type_int(32, 1);
    let unsigned = s.builder.constant_u32(u32_ty, 1);
    let signed = s.builder.constant_u32(s32_ty, 2);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::IAdd, u32_ty, unsigned, signed);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(report.is_ok(), "{report}");
}

#[test]
fn matrix_times_matrix_inner_dimensions_must_agree() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let vec2 = s.builder.type_vector(s.float, 2);
    let mat2x2 = s.builder.type_matrix(vec2, 2);
    let mat2x3 = s.builder.type_matrix(vec2, 3);
    let one = s.builder.constant_f32(s.float, 1.0);
    let col = s.builder.constant_composite(vec2, &[one, one]);
    let left = s.builder.constant_composite(mat2x2, &[col, col]);
    let right = s.builder.constant_composite(mat2x2, &[col, col]);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    // Result claims 3 columns while the right operand has 2.
    s.builder
        .binary(Opcode::MatrixTimesMatrix, mat2x3, left, right);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(
            &report,
            "Expected number of columns of Result Type and right matrix to be equal"
        ),
        "{report}"
    );
}

#[test]
fn dot_on_bfloat16_requires_capability() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    // A 16-bit float with an explicit encoding literal is a bfloat16 type.
    let bf16 = s.builder.type_float_with_encoding(16, 0);
    let bvec2 = s.builder.type_vector(bf16, 2);
    let zero = s.builder.constant_u32(bf16, 0);
    let vec = s.builder.constant_composite(bvec2, &[zero, zero]);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::Dot, bf16, vec, vec);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "BFloat16DotProductKHR"),
        "{report}"
    );
}

#[test]
fn derivative_in_fragment_model_is_ok() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let one = s.builder.constant_f32(s.float, 1.0);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.unary(Opcode::DPdx, s.float, one);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);
    s.builder.execution_mode(func, 7, &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(report.is_ok(), "{report}");
}

#[test]
fn derivative_in_vertex_model_is_rejected() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let one = s.builder.constant_f32(s.float, 1.0);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.unary(Opcode::DPdx, s.float, one);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(0, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(
            &report,
            "Derivative instructions require Fragment, GLCompute, MeshEXT or TaskEXT"
        ),
        "{report}"
    );
}

#[test]
fn compute_derivative_requires_derivative_group_mode() {
    let build = |with_mode: bool| {
        let mut s = scaffold(TargetEnv::Universal1_6);
        let one = s.builder.constant_f32(s.float, 1.0);
        let func = s.builder.begin_function(s.void, s.fn_ty);
        s.builder.begin_block();
        s.builder.unary(Opcode::DPdx, s.float, one);
        s.builder.ret();
        s.builder.end_function();
        s.builder.entry_point_with_interface(5, func, "main", &[]);
        s.builder.execution_mode(func, 17, &[8, 8, 1]); // LocalSize
        if with_mode {
            s.builder.execution_mode(func, 5289, &[]); // DerivativeGroupQuadsKHR
        }
        s.builder.build()
    };

    let report = validate_module(&build(false), TargetEnv::Universal1_6);
    assert!(
        message_containing(&report, "DerivativeGroupQuadsKHR or DerivativeGroupLinearKHR"),
        "{report}"
    );

    let report = validate_module(&build(true), TargetEnv::Universal1_6);
    assert!(report.is_ok(), "{report}");
}

#[test]
fn derivative_limitation_applies_through_function_calls() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let one = s.builder.constant_f32(s.float, 1.0);

    // A helper containing the derivative.
    let helper_fn_ty = s.fn_ty;
    let helper = s.builder.begin_function(s.void, helper_fn_ty);
    s.builder.begin_block();
    s.builder.unary(Opcode::DPdy, s.float, one);
    s.builder.ret();
    s.builder.end_function();

    // A vertex entry point that calls it.
    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder
        .inst(Opcode::FunctionCall, Some(s.void), vec![Operand::Id(helper)]);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(0, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "Derivative instructions require"),
        "{report}"
    );
}

#[test]
fn emit_mesh_tasks_requires_task_model_and_u32_counts() {
    let mut s = scaffold(TargetEnv::Universal1_6);
    s.builder.capability(Capability::MeshShadingExt);
    let u32_ty = s.builder.type_int(32, 0);
    let count = s.builder.constant_u32(u32_ty, 1);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.inst(
        Opcode::EmitMeshTasksExt,
        None,
        vec![
            Operand::Id(count),
            Operand::Id(count),
            Operand::Id(count),
        ],
    );
    s.builder.end_function();
    // Fragment model instead of TaskEXT.
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_6);
    assert!(
        message_containing(&report, "OpEmitMeshTasksEXT requires TaskEXT execution model"),
        "{report}"
    );
}

#[test]
fn mesh_group_counts_must_be_unsigned_32_bit() {
    let mut s = scaffold(TargetEnv::Universal1_6);
    s.builder.capability(Capability::MeshShadingExt);
    let s32_ty = s.builder.type_int(32, 1);
    let count = s.builder.constant_u32(s32_ty, 1);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.inst(
        Opcode::EmitMeshTasksExt,
        None,
        vec![
            Operand::Id(count),
            Operand::Id(count),
            Operand::Id(count),
        ],
    );
    s.builder.end_function();
    s.builder.entry_point_with_interface(5364, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_6);
    assert!(
        message_containing(&report, "Group Count X must be a 32-bit unsigned int scalar"),
        "{report}"
    );
}

#[test]
fn cooperative_matrix_mul_add_shape_mismatch_is_rejected() {
    let mut s = scaffold(TargetEnv::Vulkan1_3);
    s.builder.capability(Capability::CooperativeMatrixKhr);
    let u32_ty = s.builder.type_int(32, 0);
    let scope = s.builder.constant_u32(u32_ty, 3);
    let m16 = s.builder.constant_u32(u32_ty, 16);
    let m8 = s.builder.constant_u32(u32_ty, 8);
    let use_a = s.builder.constant_u32(u32_ty, 0);
    let use_b = s.builder.constant_u32(u32_ty, 1);
    let use_acc = s.builder.constant_u32(u32_ty, 2);

    let a_ty = s
        .builder
        .type_cooperative_matrix(s.float, scope, m16, m16, use_a);
    // B's rows disagree with A's cols: K mismatch.
    let b_ty = s
        .builder
        .type_cooperative_matrix(s.float, scope, m8, m16, use_b);
    let acc_ty = s
        .builder
        .type_cooperative_matrix(s.float, scope, m16, m16, use_acc);

    let a = s.builder.constant_null(a_ty);
    let b = s.builder.constant_null(b_ty);
    let acc = s.builder.constant_null(acc_ty);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.inst(
        Opcode::CooperativeMatrixMulAddKhr,
        Some(acc_ty),
        vec![Operand::Id(a), Operand::Id(b), Operand::Id(acc)],
    );
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(5, func, "main", &[]);
    s.builder.execution_mode(func, 17, &[8, 8, 1]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Vulkan1_3);
    assert!(
        message_containing(&report, "Cooperative matrix 'K' mismatch"),
        "{report}"
    );
}

#[test]
fn cooperative_matrix_symbolic_dimensions_are_not_rejected() {
    let mut s = scaffold(TargetEnv::Vulkan1_3);
    s.builder.capability(Capability::CooperativeMatrixKhr);
    let u32_ty = s.builder.type_int(32, 0);
    let scope = s.builder.constant_u32(u32_ty, 3);
    let m16 = s.builder.constant_u32(u32_ty, 16);
    // Specialization constants are not statically evaluable, so shape
    // agreement cannot be proven or refuted.
    let sym = s.builder.spec_constant_u32(u32_ty, 8);
    let use_a = s.builder.constant_u32(u32_ty, 0);
    let use_b = s.builder.constant_u32(u32_ty, 1);
    let use_acc = s.builder.constant_u32(u32_ty, 2);

    let a_ty = s
        .builder
        .type_cooperative_matrix(s.float, scope, m16, sym, use_a);
    let b_ty = s
        .builder
        .type_cooperative_matrix(s.float, scope, m16, m16, use_b);
    let acc_ty = s
        .builder
        .type_cooperative_matrix(s.float, scope, m16, m16, use_acc);

    let a = s.builder.constant_null(a_ty);
    let b = s.builder.constant_null(b_ty);
    let acc = s.builder.constant_null(acc_ty);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.inst(
        Opcode::CooperativeMatrixMulAddKhr,
        Some(acc_ty),
        vec![Operand::Id(a), Operand::Id(b), Operand::Id(acc)],
    );
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(5, func, "main", &[]);
    s.builder.execution_mode(func, 17, &[8, 8, 1]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Vulkan1_3);
    assert!(report.is_ok(), "{report}");
}

#[test]
fn extended_arithmetic_requires_two_member_struct() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let u32_ty = s.builder.type_int(32, 0);
    let bad_struct = s.builder.type_struct(&[u32_ty, u32_ty, u32_ty]);
    let one = s.builder.constant_u32(u32_ty, 1);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::IAddCarry, bad_struct, one, one);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "Expected Result Type struct to have two members"),
        "{report}"
    );
}

#[test]
fn constant_literal_width_rules() {
    // A 64-bit float constant encoded in a single word.
    let mut s = scaffold(TargetEnv::Universal1_3);
    s.builder.capability(Capability::Float64);
    let f64_ty = s.builder.type_float(64);
    s.builder.constant_u32(f64_ty, 1);
    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "must occupy 2 word(s)"),
        "{report}"
    );

    // A 16-bit float literal with payload in its padding bits.
    let mut s = scaffold(TargetEnv::Universal1_3);
    s.builder.capability(Capability::Float16);
    let f16_ty = s.builder.type_float(16);
    s.builder.constant_u32(f16_ty, 0xffff_3c00);
    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(
        message_containing(&report, "high-order bits of a 16-bit float literal"),
        "{report}"
    );

    // The same value without padding is fine.
    let mut s = scaffold(TargetEnv::Universal1_3);
    s.builder.capability(Capability::Float16);
    let f16_ty = s.builder.type_float(16);
    s.builder.constant_u32(f16_ty, 0x3c00);
    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(report.is_ok(), "{report}");
}

#[test]
fn undefined_reference_is_an_invalid_lookup() {
    let mut s = scaffold(TargetEnv::Universal1_3);
    let bogus = Id(999);
    let one = s.builder.constant_f32(s.float, 1.0);

    let func = s.builder.begin_function(s.void, s.fn_ty);
    s.builder.begin_block();
    s.builder.binary(Opcode::FAdd, s.float, one, bogus);
    s.builder.ret();
    s.builder.end_function();
    s.builder.entry_point_with_interface(4, func, "main", &[]);

    let module = s.builder.build();
    let report = validate_module(&module, TargetEnv::Universal1_3);
    assert!(report.has_code(ErrorCode::InvalidLookup), "{report}");
}
