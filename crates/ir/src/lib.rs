pub mod binary;
pub mod builder;
pub mod context;
pub mod def_use;
pub mod features;
pub mod inst;
pub mod module;
pub mod opcode;

pub use binary::{emit_words, parse_words, ParseError};
pub use builder::ModuleBuilder;
pub use context::{AnalysisSet, IrContext};
pub use def_use::{DefUseIndex, UndefinedId};
pub use features::FeatureManager;
pub use inst::{Id, InstId, Instruction, Operand};
pub use module::{BasicBlock, BlockId, FuncId, Function, Module, ModuleHeader, MAGIC};
pub use opcode::Opcode;
