//! Programmatic module construction, used by clients and tests.

use cranelift_entity::PrimaryMap;
use silica_env::TargetEnv;
use silica_grammar::{Capability, OperandKind};
use silica_numeric::FloatBits;

use crate::{
    BasicBlock, BlockId, Function, Id, Instruction, Module, Opcode, Operand,
};

pub struct ModuleBuilder {
    module: Module,
    target_env: TargetEnv,
    current: Option<PartialFunction>,
}

struct PartialFunction {
    def: Instruction,
    params: Vec<Instruction>,
    blocks: Vec<(Instruction, Vec<Instruction>)>,
    in_block: bool,
}

impl ModuleBuilder {
    pub fn new(target_env: TargetEnv) -> Self {
        let module = Module::with_version(target_env.version_word());
        Self {
            module,
            target_env,
            current: None,
        }
    }

    pub fn target_env(&self) -> TargetEnv {
        self.target_env
    }

    fn next_id(&mut self) -> Id {
        self.module.take_next_id()
    }

    /// The raw value the next allocated id will take. Lets callers name a
    /// forward-referenced label before the block exists.
    pub fn peek_next_id(&self) -> u32 {
        self.module.header.bound
    }

    pub fn capability(&mut self, cap: Capability) {
        self.module.declare_capability(cap.value());
    }

    pub fn extension(&mut self, name: &str) {
        let inst = Instruction::new(
            Opcode::Extension,
            None,
            None,
            [Operand::LiteralString(name.to_string())],
        );
        let id = self.module.alloc_inst(inst);
        self.module.extensions.push(id);
    }

    pub fn ext_inst_import(&mut self, name: &str) -> Id {
        let result = self.next_id();
        let inst = Instruction::new(
            Opcode::ExtInstImport,
            None,
            Some(result),
            [Operand::LiteralString(name.to_string())],
        );
        let id = self.module.alloc_inst(inst);
        self.module.ext_inst_imports.push(id);
        result
    }

    pub fn memory_model(&mut self, addressing: u32, memory: u32) {
        let inst = Instruction::new(
            Opcode::MemoryModel,
            None,
            None,
            [Operand::Literal32(addressing), Operand::Literal32(memory)],
        );
        let id = self.module.alloc_inst(inst);
        self.module.memory_model = Some(id);
    }

    fn global(&mut self, opcode: Opcode, result_type: Option<Id>, operands: Vec<Operand>) -> Id {
        let result = self.next_id();
        let inst = Instruction::new(opcode, result_type, Some(result), operands);
        let id = self.module.alloc_inst(inst);
        self.module.types_global_values.push(id);
        result
    }

    pub fn type_void(&mut self) -> Id {
        self.global(Opcode::TypeVoid, None, vec![])
    }

    pub fn type_bool(&mut self) -> Id {
        self.global(Opcode::TypeBool, None, vec![])
    }

    pub fn type_int(&mut self, width: u32, signedness: u32) -> Id {
        self.global(
            Opcode::TypeInt,
            None,
            vec![Operand::Literal32(width), Operand::Literal32(signedness)],
        )
    }

    pub fn type_float(&mut self, width: u32) -> Id {
        self.global(Opcode::TypeFloat, None, vec![Operand::Literal32(width)])
    }

    /// A float type with an explicit encoding literal (e.g. bfloat16).
    pub fn type_float_with_encoding(&mut self, width: u32, encoding: u32) -> Id {
        self.global(
            Opcode::TypeFloat,
            None,
            vec![Operand::Literal32(width), Operand::Literal32(encoding)],
        )
    }

    pub fn type_vector(&mut self, component: Id, count: u32) -> Id {
        self.global(
            Opcode::TypeVector,
            None,
            vec![Operand::Id(component), Operand::Literal32(count)],
        )
    }

    pub fn type_matrix(&mut self, column: Id, count: u32) -> Id {
        self.global(
            Opcode::TypeMatrix,
            None,
            vec![Operand::Id(column), Operand::Literal32(count)],
        )
    }

    pub fn type_array(&mut self, element: Id, length: Id) -> Id {
        self.global(
            Opcode::TypeArray,
            None,
            vec![Operand::Id(element), Operand::Id(length)],
        )
    }

    pub fn type_struct(&mut self, members: &[Id]) -> Id {
        self.global(
            Opcode::TypeStruct,
            None,
            members.iter().map(|id| Operand::Id(*id)).collect(),
        )
    }

    pub fn type_pointer(&mut self, storage_class: u32, pointee: Id) -> Id {
        self.global(
            Opcode::TypePointer,
            None,
            vec![
                Operand::Enumerant(OperandKind::StorageClass, storage_class),
                Operand::Id(pointee),
            ],
        )
    }

    pub fn type_function(&mut self, ret: Id, params: &[Id]) -> Id {
        let mut operands = vec![Operand::Id(ret)];
        operands.extend(params.iter().map(|id| Operand::Id(*id)));
        self.global(Opcode::TypeFunction, None, operands)
    }

    pub fn type_cooperative_matrix(
        &mut self,
        component: Id,
        scope: Id,
        rows: Id,
        cols: Id,
        matrix_use: Id,
    ) -> Id {
        self.global(
            Opcode::TypeCooperativeMatrixKhr,
            None,
            vec![
                Operand::Id(component),
                Operand::Id(scope),
                Operand::Id(rows),
                Operand::Id(cols),
                Operand::Id(matrix_use),
            ],
        )
    }

    pub fn type_cooperative_vector(&mut self, component: Id, count: Id) -> Id {
        self.global(
            Opcode::TypeCooperativeVectorNv,
            None,
            vec![Operand::Id(component), Operand::Id(count)],
        )
    }

    pub fn constant_u32(&mut self, ty: Id, value: u32) -> Id {
        self.global(Opcode::Constant, Some(ty), vec![Operand::Literal32(value)])
    }

    pub fn constant_f32(&mut self, ty: Id, value: f32) -> Id {
        let bits = FloatBits::from_f32(value);
        self.global(
            Opcode::Constant,
            Some(ty),
            bits.words().into_iter().map(Operand::Literal32).collect(),
        )
    }

    pub fn constant_true(&mut self, ty: Id) -> Id {
        self.global(Opcode::ConstantTrue, Some(ty), vec![])
    }

    pub fn constant_false(&mut self, ty: Id) -> Id {
        self.global(Opcode::ConstantFalse, Some(ty), vec![])
    }

    pub fn constant_null(&mut self, ty: Id) -> Id {
        self.global(Opcode::ConstantNull, Some(ty), vec![])
    }

    pub fn constant_composite(&mut self, ty: Id, members: &[Id]) -> Id {
        self.global(
            Opcode::ConstantComposite,
            Some(ty),
            members.iter().map(|id| Operand::Id(*id)).collect(),
        )
    }

    pub fn spec_constant_u32(&mut self, ty: Id, value: u32) -> Id {
        self.global(
            Opcode::SpecConstant,
            Some(ty),
            vec![Operand::Literal32(value)],
        )
    }

    pub fn global_variable(&mut self, ptr_ty: Id, storage_class: u32) -> Id {
        self.global(
            Opcode::Variable,
            Some(ptr_ty),
            vec![Operand::Enumerant(OperandKind::StorageClass, storage_class)],
        )
    }

    pub fn decorate(&mut self, target: Id, decoration: u32, literals: &[u32]) {
        let mut operands = vec![
            Operand::Id(target),
            Operand::Enumerant(OperandKind::Decoration, decoration),
        ];
        operands.extend(literals.iter().map(|w| Operand::Literal32(*w)));
        let inst = Instruction::new(Opcode::Decorate, None, None, operands);
        let id = self.module.alloc_inst(inst);
        self.module.annotations.push(id);
    }

    /// Starts a function body; returns the function's result id.
    pub fn begin_function(&mut self, ret_ty: Id, fn_ty: Id) -> Id {
        assert!(self.current.is_none(), "function already open");
        let result = self.next_id();
        let def = Instruction::new(
            Opcode::Function,
            Some(ret_ty),
            Some(result),
            [
                Operand::Mask(OperandKind::FunctionControl, 0),
                Operand::Id(fn_ty),
            ],
        );
        self.current = Some(PartialFunction {
            def,
            params: Vec::new(),
            blocks: Vec::new(),
            in_block: false,
        });
        result
    }

    pub fn function_parameter(&mut self, ty: Id) -> Id {
        let result = self.next_id();
        let partial = self.current.as_mut().expect("no open function");
        assert!(partial.blocks.is_empty(), "parameters precede blocks");
        partial
            .params
            .push(Instruction::new(Opcode::FunctionParameter, Some(ty), Some(result), []));
        result
    }

    /// Opens a new basic block; returns its label id.
    pub fn begin_block(&mut self) -> Id {
        let result = self.next_id();
        let partial = self.current.as_mut().expect("no open function");
        assert!(!partial.in_block, "previous block is not terminated");
        partial
            .blocks
            .push((Instruction::new(Opcode::Label, None, Some(result), []), Vec::new()));
        partial.in_block = true;
        result
    }

    fn push_body(&mut self, inst: Instruction) {
        let is_terminator = inst.opcode.is_terminator();
        let partial = self.current.as_mut().expect("no open function");
        assert!(partial.in_block, "no open block");
        partial.blocks.last_mut().expect("open block").1.push(inst);
        if is_terminator {
            partial.in_block = false;
        }
    }

    /// Appends an instruction with a fresh result id to the open block.
    pub fn inst(
        &mut self,
        opcode: Opcode,
        result_type: Option<Id>,
        operands: Vec<Operand>,
    ) -> Option<Id> {
        let result = opcode.has_result().then(|| self.next_id());
        self.push_body(Instruction::new(opcode, result_type, result, operands));
        result
    }

    pub fn unary(&mut self, opcode: Opcode, ty: Id, value: Id) -> Id {
        self.inst(opcode, Some(ty), vec![Operand::Id(value)])
            .expect("unary ops have results")
    }

    pub fn binary(&mut self, opcode: Opcode, ty: Id, lhs: Id, rhs: Id) -> Id {
        self.inst(opcode, Some(ty), vec![Operand::Id(lhs), Operand::Id(rhs)])
            .expect("binary ops have results")
    }

    pub fn phi(&mut self, ty: Id, incoming: &[(Id, Id)]) -> Id {
        let mut operands = Vec::with_capacity(incoming.len() * 2);
        for (value, parent) in incoming {
            operands.push(Operand::Id(*value));
            operands.push(Operand::Id(*parent));
        }
        self.inst(Opcode::Phi, Some(ty), operands)
            .expect("phi has a result")
    }

    pub fn selection_merge(&mut self, merge_block: Id, control: u32) {
        self.push_body(Instruction::new(
            Opcode::SelectionMerge,
            None,
            None,
            [
                Operand::Id(merge_block),
                Operand::Mask(OperandKind::SelectionControl, control),
            ],
        ));
    }

    pub fn branch(&mut self, target: Id) {
        self.push_body(Instruction::new(
            Opcode::Branch,
            None,
            None,
            [Operand::Id(target)],
        ));
    }

    pub fn branch_conditional(&mut self, condition: Id, then_target: Id, else_target: Id) {
        self.push_body(Instruction::new(
            Opcode::BranchConditional,
            None,
            None,
            [
                Operand::Id(condition),
                Operand::Id(then_target),
                Operand::Id(else_target),
            ],
        ));
    }

    pub fn ret(&mut self) {
        self.push_body(Instruction::new(Opcode::Return, None, None, []));
    }

    pub fn ret_value(&mut self, value: Id) {
        self.push_body(Instruction::new(
            Opcode::ReturnValue,
            None,
            None,
            [Operand::Id(value)],
        ));
    }

    pub fn unreachable(&mut self) {
        self.push_body(Instruction::new(Opcode::Unreachable, None, None, []));
    }

    pub fn end_function(&mut self) {
        let partial = self.current.take().expect("no open function");
        assert!(!partial.in_block, "last block is not terminated");

        let def = self.module.alloc_inst(partial.def);
        let params = partial
            .params
            .into_iter()
            .map(|inst| self.module.alloc_inst(inst))
            .collect();

        let mut blocks = PrimaryMap::new();
        let mut block_order = Vec::new();
        for (label, body) in partial.blocks {
            let label = self.module.alloc_inst(label);
            let insts = body
                .into_iter()
                .map(|inst| self.module.alloc_inst(inst))
                .collect();
            let block: BlockId = blocks.push(BasicBlock {
                label: Some(label),
                insts,
            });
            block_order.push(block);
        }

        let end = self
            .module
            .alloc_inst(Instruction::new(Opcode::FunctionEnd, None, None, []));
        self.module.functions.push(Function {
            def,
            params,
            end,
            blocks,
            block_order,
        });
    }

    pub fn entry_point_with_interface(
        &mut self,
        execution_model: u32,
        func: Id,
        name: &str,
        interface: &[Id],
    ) {
        let mut operands = vec![
            Operand::Enumerant(OperandKind::ExecutionModel, execution_model),
            Operand::Id(func),
            Operand::LiteralString(name.to_string()),
        ];
        operands.extend(interface.iter().map(|id| Operand::Id(*id)));
        let inst = Instruction::new(Opcode::EntryPoint, None, None, operands);
        let id = self.module.alloc_inst(inst);
        self.module.entry_points.push(id);
    }

    pub fn execution_mode(&mut self, func: Id, mode: u32, literals: &[u32]) {
        let mut operands = vec![
            Operand::Id(func),
            Operand::Enumerant(OperandKind::ExecutionMode, mode),
        ];
        operands.extend(literals.iter().map(|w| Operand::Literal32(*w)));
        let inst = Instruction::new(Opcode::ExecutionMode, None, None, operands);
        let id = self.module.alloc_inst(inst);
        self.module.execution_modes.push(id);
    }

    pub fn build(self) -> Module {
        assert!(self.current.is_none(), "unterminated function");
        self.module
    }
}
