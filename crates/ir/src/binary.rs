//! Binary module parsing and re-serialization.
//!
//! The binary form is an ordered stream of 32-bit words: a five-word header,
//! then instructions whose leading word packs `(word_count << 16) | opcode`.

use cranelift_entity::PrimaryMap;
use silica_grammar::OperandKind;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    BasicBlock, BlockId, Function, Id, Instruction, Module, ModuleHeader, Opcode, Operand, MAGIC,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("module is shorter than the five-word header")]
    TruncatedHeader,

    #[error("invalid magic number {0:#010x}")]
    InvalidMagic(u32),

    #[error("instruction at word {word} extends past the end of the stream")]
    TruncatedInstruction { word: usize },

    #[error("instruction at word {word} declares a zero word count")]
    ZeroWordCount { word: usize },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),

    #[error("{mnemonic} is missing its result words")]
    MissingResult { mnemonic: &'static str },

    #[error("{mnemonic} carries a malformed literal string")]
    MalformedString { mnemonic: &'static str },

    #[error("{mnemonic} has malformed operands")]
    MalformedOperands { mnemonic: &'static str },

    #[error("{mnemonic} is not allowed {context}")]
    MisplacedInstruction {
        mnemonic: &'static str,
        context: &'static str,
    },

    #[error("function is missing OpFunctionEnd")]
    UnterminatedFunction,

    #[error("block is missing a terminator")]
    UnterminatedBlock,
}

/// Parses a binary word stream into a module. No partial mutation: failures
/// return before any module is produced.
pub fn parse_words(words: &[u32]) -> Result<Module, ParseError> {
    if words.len() < 5 {
        return Err(ParseError::TruncatedHeader);
    }
    if words[0] != MAGIC {
        return Err(ParseError::InvalidMagic(words[0]));
    }

    let mut module = Module::new();
    module.header = ModuleHeader {
        version: words[1],
        generator: words[2],
        bound: words[3],
        schema: words[4],
    };

    let mut builder = FunctionAssembler::default();
    let mut cursor = 5;
    while cursor < words.len() {
        let first = words[cursor];
        let word_count = (first >> 16) as usize;
        let code = (first & 0xffff) as u16;
        if word_count == 0 {
            return Err(ParseError::ZeroWordCount { word: cursor });
        }
        if cursor + word_count > words.len() {
            return Err(ParseError::TruncatedInstruction { word: cursor });
        }
        let opcode = Opcode::from_code(code).ok_or(ParseError::UnknownOpcode(code))?;
        let inst = decode_instruction(opcode, &words[cursor + 1..cursor + word_count])?;
        place_instruction(&mut module, &mut builder, inst)?;
        cursor += word_count;
    }

    if builder.current.is_some() {
        return Err(ParseError::UnterminatedFunction);
    }
    Ok(module)
}

/// Re-serializes a module to its binary word stream. `parse_words` followed
/// by `emit_words` is the identity on well-formed modules.
pub fn emit_words(module: &Module) -> Vec<u32> {
    let mut words = vec![
        MAGIC,
        module.header.version,
        module.header.generator,
        module.header.bound,
        module.header.schema,
    ];
    for (inst_id, _) in module.iter_all_insts() {
        module.inst(inst_id).push_words(&mut words);
    }
    words
}

#[derive(Default)]
struct FunctionAssembler {
    current: Option<PartialFunction>,
}

struct PartialFunction {
    def: Instruction,
    params: Vec<Instruction>,
    blocks: Vec<(Instruction, Vec<Instruction>)>,
    in_block: bool,
}

fn place_instruction(
    module: &mut Module,
    builder: &mut FunctionAssembler,
    inst: Instruction,
) -> Result<(), ParseError> {
    let opcode = inst.opcode;

    if let Some(partial) = &mut builder.current {
        match opcode {
            Opcode::Function => {
                return Err(ParseError::MisplacedInstruction {
                    mnemonic: opcode.mnemonic(),
                    context: "inside a function",
                })
            }
            Opcode::FunctionParameter => {
                if !partial.blocks.is_empty() {
                    return Err(ParseError::MisplacedInstruction {
                        mnemonic: opcode.mnemonic(),
                        context: "after the first block",
                    });
                }
                partial.params.push(inst);
            }
            Opcode::Label => {
                if partial.in_block {
                    return Err(ParseError::MisplacedInstruction {
                        mnemonic: opcode.mnemonic(),
                        context: "inside an open block",
                    });
                }
                partial.blocks.push((inst, Vec::new()));
                partial.in_block = true;
            }
            Opcode::FunctionEnd => {
                if partial.in_block {
                    return Err(ParseError::UnterminatedBlock);
                }
                let partial = builder.current.take().expect("checked above");
                finish_function(module, partial, inst);
            }
            _ => {
                if !partial.in_block {
                    return Err(ParseError::MisplacedInstruction {
                        mnemonic: opcode.mnemonic(),
                        context: "outside a block",
                    });
                }
                let is_terminator = opcode.is_terminator();
                partial
                    .blocks
                    .last_mut()
                    .expect("in_block implies a block")
                    .1
                    .push(inst);
                if is_terminator {
                    partial.in_block = false;
                }
            }
        }
        return Ok(());
    }

    match opcode {
        Opcode::Function => {
            builder.current = Some(PartialFunction {
                def: inst,
                params: Vec::new(),
                blocks: Vec::new(),
                in_block: false,
            });
            Ok(())
        }
        Opcode::Capability => {
            let id = module.alloc_inst(inst);
            module.capabilities.push(id);
            Ok(())
        }
        Opcode::Extension => {
            let id = module.alloc_inst(inst);
            module.extensions.push(id);
            Ok(())
        }
        Opcode::ExtInstImport => {
            let id = module.alloc_inst(inst);
            module.ext_inst_imports.push(id);
            Ok(())
        }
        Opcode::MemoryModel => {
            let id = module.alloc_inst(inst);
            module.memory_model = Some(id);
            Ok(())
        }
        Opcode::EntryPoint => {
            let id = module.alloc_inst(inst);
            module.entry_points.push(id);
            Ok(())
        }
        Opcode::ExecutionMode => {
            let id = module.alloc_inst(inst);
            module.execution_modes.push(id);
            Ok(())
        }
        Opcode::Name | Opcode::MemberName => {
            let id = module.alloc_inst(inst);
            module.debug.push(id);
            Ok(())
        }
        Opcode::Decorate | Opcode::MemberDecorate => {
            let id = module.alloc_inst(inst);
            module.annotations.push(id);
            Ok(())
        }
        _ if opcode.is_global() => {
            let id = module.alloc_inst(inst);
            module.types_global_values.push(id);
            Ok(())
        }
        _ => Err(ParseError::MisplacedInstruction {
            mnemonic: opcode.mnemonic(),
            context: "at module scope",
        }),
    }
}

fn finish_function(module: &mut Module, partial: PartialFunction, end: Instruction) {
    let def = module.alloc_inst(partial.def);
    let params = partial
        .params
        .into_iter()
        .map(|inst| module.alloc_inst(inst))
        .collect();

    let mut blocks = PrimaryMap::new();
    let mut block_order = Vec::new();
    for (label, body) in partial.blocks {
        let label = module.alloc_inst(label);
        let insts = body.into_iter().map(|inst| module.alloc_inst(inst)).collect();
        let block: BlockId = blocks.push(BasicBlock {
            label: Some(label),
            insts,
        });
        block_order.push(block);
    }

    let end = module.alloc_inst(end);
    module.functions.push(Function {
        def,
        params,
        end,
        blocks,
        block_order,
    });
}

fn decode_instruction(opcode: Opcode, mut words: &[u32]) -> Result<Instruction, ParseError> {
    let (has_result, has_type) = opcode.result_shape();

    let result_type = if has_type {
        let (first, rest) = words.split_first().ok_or(ParseError::MissingResult {
            mnemonic: opcode.mnemonic(),
        })?;
        words = rest;
        Some(Id(*first))
    } else {
        None
    };
    let result_id = if has_result {
        let (first, rest) = words.split_first().ok_or(ParseError::MissingResult {
            mnemonic: opcode.mnemonic(),
        })?;
        words = rest;
        Some(Id(*first))
    } else {
        None
    };

    let operands = decode_operands(opcode, words)?;
    Ok(Instruction {
        opcode,
        result_type,
        result_id,
        operands,
    })
}

struct OperandReader<'a> {
    mnemonic: &'static str,
    words: &'a [u32],
    pos: usize,
}

impl<'a> OperandReader<'a> {
    fn new(mnemonic: &'static str, words: &'a [u32]) -> Self {
        Self {
            mnemonic,
            words,
            pos: 0,
        }
    }

    fn word(&mut self) -> Result<u32, ParseError> {
        let word = self
            .words
            .get(self.pos)
            .copied()
            .ok_or(ParseError::MalformedOperands {
                mnemonic: self.mnemonic,
            })?;
        self.pos += 1;
        Ok(word)
    }

    fn id(&mut self) -> Result<Operand, ParseError> {
        Ok(Operand::Id(Id(self.word()?)))
    }

    fn literal(&mut self) -> Result<Operand, ParseError> {
        Ok(Operand::Literal32(self.word()?))
    }

    fn enumerant(&mut self, kind: OperandKind) -> Result<Operand, ParseError> {
        Ok(Operand::Enumerant(kind, self.word()?))
    }

    fn mask(&mut self, kind: OperandKind) -> Result<Operand, ParseError> {
        Ok(Operand::Mask(kind, self.word()?))
    }

    /// Reads a nul-terminated string packed four bytes per word.
    fn string(&mut self) -> Result<Operand, ParseError> {
        let mut bytes = Vec::new();
        loop {
            let word = self.word().map_err(|_| ParseError::MalformedString {
                mnemonic: self.mnemonic,
            })?;
            let chunk = word.to_le_bytes();
            if let Some(nul) = chunk.iter().position(|b| *b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        let text = String::from_utf8(bytes).map_err(|_| ParseError::MalformedString {
            mnemonic: self.mnemonic,
        })?;
        Ok(Operand::LiteralString(text))
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.words.len()
    }

    fn remaining(&self) -> usize {
        self.words.len() - self.pos
    }
}

fn decode_operands(
    opcode: Opcode,
    words: &[u32],
) -> Result<SmallVec<[Operand; 4]>, ParseError> {
    use Opcode::*;
    let mut r = OperandReader::new(opcode.mnemonic(), words);
    let mut ops: SmallVec<[Operand; 4]> = SmallVec::new();

    match opcode {
        Nop | Undef | TypeVoid | TypeBool | ConstantTrue | ConstantFalse | ConstantNull
        | SpecConstantTrue | SpecConstantFalse | FunctionParameter | FunctionEnd | Label | Kill
        | Return | Unreachable => {}

        Capability => ops.push(r.enumerant(OperandKind::Capability)?),
        Extension | ExtInstImport => ops.push(r.string()?),
        ExtInst => {
            ops.push(r.id()?);
            ops.push(r.literal()?);
            while !r.is_empty() {
                ops.push(r.id()?);
            }
        }
        MemoryModel => {
            ops.push(r.literal()?);
            ops.push(r.literal()?);
        }
        EntryPoint => {
            ops.push(r.enumerant(OperandKind::ExecutionModel)?);
            ops.push(r.id()?);
            ops.push(r.string()?);
            while !r.is_empty() {
                ops.push(r.id()?);
            }
        }
        ExecutionMode => {
            ops.push(r.id()?);
            ops.push(r.enumerant(OperandKind::ExecutionMode)?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        Name => {
            ops.push(r.id()?);
            ops.push(r.string()?);
        }
        MemberName => {
            ops.push(r.id()?);
            ops.push(r.literal()?);
            ops.push(r.string()?);
        }
        TypeInt => {
            ops.push(r.literal()?);
            ops.push(r.literal()?);
        }
        TypeFloat => {
            ops.push(r.literal()?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        TypeVector | TypeMatrix => {
            ops.push(r.id()?);
            ops.push(r.literal()?);
        }
        TypeArray => {
            ops.push(r.id()?);
            ops.push(r.id()?);
        }
        TypeRuntimeArray | CopyObject | Transpose | SNegate | FNegate | ReturnValue | Branch
        | CooperativeMatrixLengthKhr | DPdx | DPdy | Fwidth | DPdxFine | DPdyFine | FwidthFine
        | DPdxCoarse | DPdyCoarse | FwidthCoarse => ops.push(r.id()?),
        TypeStruct | TypeFunction | ConstantComposite | SpecConstantComposite | FunctionCall
        | AccessChain | InBoundsAccessChain | CompositeConstruct | Phi => {
            while !r.is_empty() {
                ops.push(r.id()?);
            }
        }
        TypePointer => {
            ops.push(r.enumerant(OperandKind::StorageClass)?);
            ops.push(r.id()?);
        }
        TypeCooperativeMatrixKhr => {
            for _ in 0..5 {
                ops.push(r.id()?);
            }
        }
        TypeCooperativeVectorNv => {
            ops.push(r.id()?);
            ops.push(r.id()?);
        }
        Constant | SpecConstant => match r.remaining() {
            1 => ops.push(r.literal()?),
            2 => {
                let lo = r.word()?;
                let hi = r.word()?;
                ops.push(Operand::Literal64(u64::from(lo) | (u64::from(hi) << 32)));
            }
            _ => {
                return Err(ParseError::MalformedOperands {
                    mnemonic: opcode.mnemonic(),
                })
            }
        },
        SpecConstantOp => {
            ops.push(r.literal()?);
            while !r.is_empty() {
                ops.push(r.id()?);
            }
        }
        Function => {
            ops.push(r.mask(OperandKind::FunctionControl)?);
            ops.push(r.id()?);
        }
        Variable => {
            ops.push(r.enumerant(OperandKind::StorageClass)?);
            if !r.is_empty() {
                ops.push(r.id()?);
            }
        }
        Load => {
            ops.push(r.id()?);
            if !r.is_empty() {
                ops.push(r.mask(OperandKind::MemoryAccess)?);
            }
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        Store => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            if !r.is_empty() {
                ops.push(r.mask(OperandKind::MemoryAccess)?);
            }
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        Decorate => {
            ops.push(r.id()?);
            ops.push(r.enumerant(OperandKind::Decoration)?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        MemberDecorate => {
            ops.push(r.id()?);
            ops.push(r.literal()?);
            ops.push(r.enumerant(OperandKind::Decoration)?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        VectorShuffle | CompositeInsert => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        CompositeExtract => {
            ops.push(r.id()?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        IAdd | FAdd | ISub | FSub | IMul | FMul | UDiv | SDiv | FDiv | UMod | SRem | SMod
        | FRem | FMod | VectorTimesScalar | MatrixTimesScalar | VectorTimesMatrix
        | MatrixTimesVector | MatrixTimesMatrix | OuterProduct | Dot | IAddCarry | ISubBorrow
        | UMulExtended | SMulExtended | SetMeshOutputsExt => {
            ops.push(r.id()?);
            ops.push(r.id()?);
        }
        LoopMerge => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            ops.push(r.mask(OperandKind::LoopControl)?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        SelectionMerge => {
            ops.push(r.id()?);
            ops.push(r.mask(OperandKind::SelectionControl)?);
        }
        BranchConditional => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            ops.push(r.id()?);
            while !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        Switch => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            while !r.is_empty() {
                ops.push(r.literal()?);
                ops.push(r.id()?);
            }
        }
        CooperativeMatrixMulAddKhr => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            ops.push(r.id()?);
            if !r.is_empty() {
                ops.push(r.literal()?);
            }
        }
        CooperativeMatrixMulAddNv => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            ops.push(r.id()?);
        }
        EmitMeshTasksExt => {
            ops.push(r.id()?);
            ops.push(r.id()?);
            ops.push(r.id()?);
            if !r.is_empty() {
                ops.push(r.id()?);
            }
        }
    }

    if !r.is_empty() {
        return Err(ParseError::MalformedOperands {
            mnemonic: opcode.mnemonic(),
        });
    }
    Ok(ops)
}
