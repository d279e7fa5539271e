//! The module graph: global sections, functions, and basic blocks.
//!
//! All instruction storage lives in one module-level arena; sections and
//! blocks hold ordered lists of [`InstId`]. The auxiliary def-use index is
//! keyed by identifier, so the graph itself carries no back-pointers.

use cranelift_entity::{entity_impl, PrimaryMap};

use crate::{Id, InstId, Instruction, Opcode, Operand};

pub const MAGIC: u32 = 0x0723_0203;

/// The binary header words, minus the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHeader {
    pub version: u32,
    pub generator: u32,
    pub bound: u32,
    pub schema: u32,
}

impl Default for ModuleHeader {
    fn default() -> Self {
        Self {
            version: silica_env::Version::new(1, 0).word(),
            generator: 0,
            bound: 1,
            schema: 0,
        }
    }
}

/// An opaque reference to a [`Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(pub u32);
entity_impl!(FuncId, "func");

/// An opaque reference to a [`BasicBlock`] within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A basic block: an `OpLabel` and an ordered body ending in exactly one
/// terminator.
#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub label: Option<InstId>,
    pub insts: Vec<InstId>,
}

impl BasicBlock {
    pub fn terminator(&self) -> Option<InstId> {
        self.insts.last().copied()
    }
}

/// A function: its defining `OpFunction`, parameters, and ordered blocks.
/// The first block in `block_order` is the entry block and is never
/// removable.
#[derive(Debug, Clone)]
pub struct Function {
    pub def: InstId,
    pub params: Vec<InstId>,
    pub end: InstId,
    pub blocks: PrimaryMap<BlockId, BasicBlock>,
    pub block_order: Vec<BlockId>,
}

impl Function {
    pub fn entry_block(&self) -> Option<BlockId> {
        self.block_order.first().copied()
    }

    /// Instructions of the function in layout order, labels included.
    pub fn iter_insts<'a>(&'a self) -> impl Iterator<Item = InstId> + 'a {
        std::iter::once(self.def)
            .chain(self.params.iter().copied())
            .chain(self.block_order.iter().flat_map(move |block| {
                let block = &self.blocks[*block];
                block.label.into_iter().chain(block.insts.iter().copied())
            }))
            .chain(std::iter::once(self.end))
    }
}

/// The whole parsed program graph.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub header: ModuleHeader,
    insts: PrimaryMap<InstId, Instruction>,

    pub capabilities: Vec<InstId>,
    pub extensions: Vec<InstId>,
    pub ext_inst_imports: Vec<InstId>,
    pub memory_model: Option<InstId>,
    pub entry_points: Vec<InstId>,
    pub execution_modes: Vec<InstId>,
    pub debug: Vec<InstId>,
    pub annotations: Vec<InstId>,
    /// Types, constants and module-scope variables, in declaration order.
    pub types_global_values: Vec<InstId>,
    pub functions: PrimaryMap<FuncId, Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: u32) -> Self {
        Self {
            header: ModuleHeader {
                version,
                ..ModuleHeader::default()
            },
            ..Self::default()
        }
    }

    /// Allocates an arena slot for an instruction. Placement into a section
    /// or block is the caller's responsibility.
    pub fn alloc_inst(&mut self, inst: Instruction) -> InstId {
        self.insts.push(inst)
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id]
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut Instruction {
        &mut self.insts[id]
    }

    pub fn has_inst(&self, id: InstId) -> bool {
        self.insts.is_valid(id)
    }

    /// A fresh identifier, bumping the module's id bound.
    pub fn take_next_id(&mut self) -> Id {
        let id = Id(self.header.bound);
        self.header.bound += 1;
        id
    }

    /// Global-section instructions in module order.
    pub fn iter_global_insts<'a>(&'a self) -> impl Iterator<Item = InstId> + 'a {
        self.capabilities
            .iter()
            .chain(&self.extensions)
            .chain(&self.ext_inst_imports)
            .copied()
            .chain(self.memory_model)
            .chain(self.entry_points.iter().copied())
            .chain(self.execution_modes.iter().copied())
            .chain(self.debug.iter().copied())
            .chain(self.annotations.iter().copied())
            .chain(self.types_global_values.iter().copied())
    }

    /// Every instruction in module order, paired with its owning function
    /// where it has one.
    pub fn iter_all_insts<'a>(&'a self) -> impl Iterator<Item = (InstId, Option<FuncId>)> + 'a {
        self.iter_global_insts()
            .map(|inst| (inst, None))
            .chain(self.functions.iter().flat_map(|(func_id, func)| {
                func.iter_insts().map(move |inst| (inst, Some(func_id)))
            }))
    }

    /// The declared capability values, in declaration order.
    pub fn capability_values<'a>(&'a self) -> impl Iterator<Item = u32> + 'a {
        self.capabilities
            .iter()
            .filter_map(|id| self.inst(*id).operand_u32(0))
    }

    /// The declared extension names, in declaration order.
    pub fn extension_names<'a>(&'a self) -> impl Iterator<Item = &'a str> + 'a {
        self.extensions
            .iter()
            .filter_map(|id| self.inst(*id).operands.first().and_then(Operand::as_str))
    }

    /// The result id of the external-instruction-set import with the given
    /// name, if the module declares one.
    pub fn ext_inst_import_id(&self, name: &str) -> Option<Id> {
        self.ext_inst_imports.iter().find_map(|id| {
            let inst = self.inst(*id);
            (inst.operands.first().and_then(Operand::as_str) == Some(name))
                .then_some(inst.result_id)
                .flatten()
        })
    }

    /// The function defined by the given `OpFunction` result id.
    pub fn function_by_result_id(&self, id: Id) -> Option<FuncId> {
        self.functions
            .iter()
            .find(|(_, func)| self.inst(func.def).result_id == Some(id))
            .map(|(func_id, _)| func_id)
    }

    /// The block of `func` whose label defines `id`.
    pub fn block_by_label_id(&self, func: FuncId, id: Id) -> Option<BlockId> {
        let function = &self.functions[func];
        function.block_order.iter().copied().find(|block| {
            function.blocks[*block]
                .label
                .is_some_and(|label| self.inst(label).result_id == Some(id))
        })
    }

    /// Appends a capability declaration, keeping the section idempotent.
    pub fn declare_capability(&mut self, value: u32) -> InstId {
        if let Some(existing) = self
            .capabilities
            .iter()
            .find(|id| self.inst(**id).operand_u32(0) == Some(value))
        {
            return *existing;
        }
        let inst = Instruction::new(
            Opcode::Capability,
            None,
            None,
            [Operand::Enumerant(
                silica_grammar::OperandKind::Capability,
                value,
            )],
        );
        let id = self.alloc_inst(inst);
        self.capabilities.push(id);
        id
    }

    /// Detaches an instruction from whatever section or block lists it. The
    /// arena slot stays allocated; only the layout forgets the instruction.
    pub fn detach_inst(&mut self, inst: InstId) {
        fn remove(list: &mut Vec<InstId>, inst: InstId) -> bool {
            if let Some(pos) = list.iter().position(|id| *id == inst) {
                list.remove(pos);
                true
            } else {
                false
            }
        }

        if remove(&mut self.capabilities, inst)
            || remove(&mut self.extensions, inst)
            || remove(&mut self.ext_inst_imports, inst)
            || remove(&mut self.entry_points, inst)
            || remove(&mut self.execution_modes, inst)
            || remove(&mut self.debug, inst)
            || remove(&mut self.annotations, inst)
            || remove(&mut self.types_global_values, inst)
        {
            return;
        }
        if self.memory_model == Some(inst) {
            self.memory_model = None;
            return;
        }

        for (_, func) in self.functions.iter_mut() {
            if remove(&mut func.params, inst) {
                return;
            }
            for block in func.block_order.clone() {
                let block_data = &mut func.blocks[block];
                if block_data.label == Some(inst) {
                    block_data.label = None;
                    return;
                }
                if remove(&mut block_data.insts, inst) {
                    return;
                }
            }
        }
    }

    /// Removes a whole block from its function's layout. The entry block is
    /// not removable.
    pub fn remove_block(&mut self, func: FuncId, block: BlockId) {
        let function = &mut self.functions[func];
        assert!(
            function.entry_block() != Some(block),
            "entry block is not removable"
        );
        function.block_order.retain(|candidate| *candidate != block);
        function.blocks[block] = BasicBlock::default();
    }
}
