//! End-to-end flow: parse a binary module, validate it, run a pass
//! pipeline, apply a reduction, and re-serialize.

use silica_env::TargetEnv;
use silica_grammar::Capability;
use silica_ir::{emit_words, parse_words, IrContext, ModuleBuilder, Opcode};
use silica_opt::passes::{EmptyPass, RemoveUnusedInterfaceVariablesPass};
use silica_opt::PassPipeline;
use silica_reduce::{OpportunityFinder, RemoveBlockFinder};
use silica_val::validate_module;

const ENV: TargetEnv = TargetEnv::Vulkan1_1Spv1_4;

fn fragment_module_words() -> Vec<u32> {
    let mut builder = ModuleBuilder::new(ENV);
    builder.capability(Capability::Shader);
    let void = builder.type_void();
    let float = builder.type_float(32);
    let ptr = builder.type_pointer(1, float);
    let unused_input = builder.global_variable(ptr, 1);
    let fn_ty = builder.type_function(void, &[]);
    let one = builder.constant_f32(float, 1.0);

    let func = builder.begin_function(void, fn_ty);
    builder.begin_block();
    let sum = builder.binary(Opcode::FAdd, float, one, one);
    builder.binary(Opcode::FMul, float, sum, one);
    builder.ret();
    // A dead block for the reducer to find.
    builder.begin_block();
    builder.unreachable();
    builder.end_function();
    builder.entry_point_with_interface(4, func, "main", &[unused_input]);
    builder.execution_mode(func, 7, &[]);

    emit_words(&builder.build())
}

#[test]
fn parse_validate_transform_reduce_reserialize() {
    let words = fragment_module_words();

    let module = parse_words(&words).expect("well-formed module");
    let report = validate_module(&module, ENV);
    assert!(report.is_ok(), "{report}");

    let mut ctx = IrContext::new(module, ENV);
    let mut pipeline = PassPipeline::new();
    pipeline
        .add_pass(EmptyPass)
        .add_pass(RemoveUnusedInterfaceVariablesPass);
    let result = pipeline.run(&mut ctx).expect("pipeline should succeed");
    assert!(result.changed, "the unused interface variable must be dropped");

    let mut opportunities = RemoveBlockFinder.available_opportunities(&mut ctx, None);
    assert_eq!(opportunities.len(), 1, "exactly the dead block");
    assert!(opportunities[0].try_apply(&mut ctx));
    assert!(ctx.is_consistent());

    let module = ctx.into_module();
    let report = validate_module(&module, ENV);
    assert!(report.is_ok(), "{report}");

    let rewritten = emit_words(&module);
    let reparsed = parse_words(&rewritten).expect("round trip");
    assert_eq!(emit_words(&reparsed), rewritten);
}
