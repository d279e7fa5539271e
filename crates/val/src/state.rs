//! Validation state: module views, type predicates, entry-point execution
//! model and mode tables, and the deferred-limitation registries.

use rustc_hash::{FxHashMap, FxHashSet};
use silica_env::TargetEnv;
use silica_grammar::Grammar;
use silica_ir::{
    DefUseIndex, FeatureManager, FuncId, Id, InstId, Instruction, Module, Opcode,
};

use crate::diagnostic::{Diagnostic, ValidationReport};

pub mod execution_model {
    pub const VERTEX: u32 = 0;
    pub const FRAGMENT: u32 = 4;
    pub const GL_COMPUTE: u32 = 5;
    pub const TASK_EXT: u32 = 5364;
    pub const MESH_EXT: u32 = 5365;
}

pub mod execution_mode {
    pub const DERIVATIVE_GROUP_QUADS: u32 = 5289;
    pub const DERIVATIVE_GROUP_LINEAR: u32 = 5290;
}

pub mod storage_class {
    pub const TASK_PAYLOAD_WORKGROUP: u32 = 5402;
}

pub mod cooperative_matrix_use {
    pub const MATRIX_A: u32 = 0;
    pub const MATRIX_B: u32 = 1;
    pub const MATRIX_ACCUMULATOR: u32 = 2;
}

/// Execution models and declared execution modes of one entry point.
#[derive(Debug, Default)]
pub struct EntryPointInfo {
    pub models: FxHashSet<u32>,
    pub modes: FxHashSet<u32>,
}

/// A deferred check evaluated per execution model once all entry points are
/// known.
pub type ModelLimitation = Box<dyn Fn(u32) -> Result<(), String>>;

/// A deferred check evaluated against each entry point reaching the
/// function.
pub type EntryLimitation = Box<dyn Fn(&EntryPointInfo) -> Result<(), String>>;

pub struct ValidationState<'a> {
    module: &'a Module,
    def_use: DefUseIndex,
    features: FeatureManager,
    /// Keyed by the entry point's function result id.
    entry_points: FxHashMap<Id, EntryPointInfo>,
    model_limitations: FxHashMap<FuncId, Vec<(InstId, ModelLimitation)>>,
    entry_limitations: FxHashMap<FuncId, Vec<(InstId, EntryLimitation)>>,
}

impl<'a> ValidationState<'a> {
    pub fn new(module: &'a Module, target_env: TargetEnv) -> Self {
        let def_use = DefUseIndex::analyze(module);
        let mut features = FeatureManager::new(Grammar::global(target_env));
        features.analyze(module);

        let mut entry_points: FxHashMap<Id, EntryPointInfo> = FxHashMap::default();
        for entry in &module.entry_points {
            let inst = module.inst(*entry);
            let (Some(model), Some(func)) = (inst.operand_u32(0), inst.operand_id(1)) else {
                continue;
            };
            entry_points.entry(func).or_default().models.insert(model);
        }
        for mode_inst in &module.execution_modes {
            let inst = module.inst(*mode_inst);
            let (Some(func), Some(mode)) = (inst.operand_id(0), inst.operand_u32(1)) else {
                continue;
            };
            if let Some(info) = entry_points.get_mut(&func) {
                info.modes.insert(mode);
            }
        }

        Self {
            module,
            def_use,
            features,
            entry_points,
            model_limitations: FxHashMap::default(),
            entry_limitations: FxHashMap::default(),
        }
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn features(&self) -> &FeatureManager {
        &self.features
    }

    pub fn def_use(&self) -> &DefUseIndex {
        &self.def_use
    }

    pub fn entry_point_info(&self, func: Id) -> Option<&EntryPointInfo> {
        self.entry_points.get(&func)
    }

    /// Defers a per-execution-model check for the enclosing function until
    /// every entry point is known.
    pub fn register_execution_model_limitation(
        &mut self,
        func: FuncId,
        inst: InstId,
        check: ModelLimitation,
    ) {
        self.model_limitations
            .entry(func)
            .or_default()
            .push((inst, check));
    }

    /// Defers an entry-point-wide check for the enclosing function.
    pub fn register_limitation(&mut self, func: FuncId, inst: InstId, check: EntryLimitation) {
        self.entry_limitations
            .entry(func)
            .or_default()
            .push((inst, check));
    }

    /// Evaluates all deferred limitations once the whole module has been
    /// scanned: for every entry point, every function its call tree reaches
    /// must satisfy the checks registered against that function.
    pub fn finalize(mut self, report: &mut ValidationReport) {
        let model_limitations = std::mem::take(&mut self.model_limitations);
        let entry_limitations = std::mem::take(&mut self.entry_limitations);

        let call_graph = self.build_call_graph();
        for (entry_func_id, info) in &self.entry_points {
            let Some(root) = self.module.function_by_result_id(*entry_func_id) else {
                continue;
            };
            for reached in reachable_functions(&call_graph, root) {
                for (inst, check) in model_limitations.get(&reached).into_iter().flatten() {
                    for model in &info.models {
                        if let Err(message) = check(*model) {
                            report.push(Diagnostic::invalid_data(*inst, message));
                        }
                    }
                }
                for (inst, check) in entry_limitations.get(&reached).into_iter().flatten() {
                    if let Err(message) = check(info) {
                        report.push(Diagnostic::invalid_data(*inst, message));
                    }
                }
            }
        }
    }

    fn build_call_graph(&self) -> FxHashMap<FuncId, Vec<FuncId>> {
        let mut graph: FxHashMap<FuncId, Vec<FuncId>> = FxHashMap::default();
        for (func_id, func) in self.module.functions.iter() {
            let callees = graph.entry(func_id).or_default();
            for inst_id in func.iter_insts() {
                let inst = self.module.inst(inst_id);
                if inst.opcode == Opcode::FunctionCall {
                    if let Some(callee) = inst
                        .operand_id(0)
                        .and_then(|id| self.module.function_by_result_id(id))
                    {
                        callees.push(callee);
                    }
                }
            }
        }
        graph
    }

    /// The defining instruction of an identifier, if any.
    pub fn find_def(&self, id: Id) -> Option<&'a Instruction> {
        let inst = self.def_use.get_def(id).ok()?;
        Some(self.module.inst(inst))
    }

    /// The type of the value operand at `index`, counted the logical way:
    /// the result type (where present) is operand 0 and the result id is
    /// operand 1.
    pub fn operand_type_id(&self, inst: &Instruction, index: usize) -> Option<Id> {
        let offset =
            usize::from(inst.result_type.is_some()) + usize::from(inst.result_id.is_some());
        let id = inst.operand_id(index.checked_sub(offset)?)?;
        self.find_def(id)?.result_type
    }

    /// A statically evaluable unsigned 32-bit constant, or `None` for
    /// symbolic and specialization-dependent values.
    pub fn eval_u32_if_const(&self, id: Id) -> Option<u32> {
        let def = self.find_def(id)?;
        match def.opcode {
            Opcode::Constant => def.operand_u32(0),
            _ => None,
        }
    }

    fn type_inst(&self, ty: Id) -> Option<&'a Instruction> {
        self.find_def(ty)
    }

    pub fn is_void_type(&self, ty: Id) -> bool {
        self.type_inst(ty).is_some_and(|t| t.opcode == Opcode::TypeVoid)
    }

    pub fn is_bool_type(&self, ty: Id) -> bool {
        self.type_inst(ty).is_some_and(|t| t.opcode == Opcode::TypeBool)
    }

    pub fn is_float_scalar_type(&self, ty: Id) -> bool {
        self.type_inst(ty).is_some_and(|t| t.opcode == Opcode::TypeFloat)
    }

    pub fn is_int_scalar_type(&self, ty: Id) -> bool {
        self.type_inst(ty).is_some_and(|t| t.opcode == Opcode::TypeInt)
    }

    pub fn is_unsigned_int_scalar_type(&self, ty: Id) -> bool {
        self.type_inst(ty)
            .is_some_and(|t| t.opcode == Opcode::TypeInt && t.operand_u32(1) == Some(0))
    }

    fn vector_component(&self, ty: Id) -> Option<Id> {
        let t = self.type_inst(ty)?;
        (t.opcode == Opcode::TypeVector).then(|| t.operand_id(0)).flatten()
    }

    pub fn is_float_vector_type(&self, ty: Id) -> bool {
        self.vector_component(ty)
            .is_some_and(|c| self.is_float_scalar_type(c))
    }

    pub fn is_int_vector_type(&self, ty: Id) -> bool {
        self.vector_component(ty)
            .is_some_and(|c| self.is_int_scalar_type(c))
    }

    pub fn is_unsigned_int_vector_type(&self, ty: Id) -> bool {
        self.vector_component(ty)
            .is_some_and(|c| self.is_unsigned_int_scalar_type(c))
    }

    pub fn is_float_scalar_or_vector_type(&self, ty: Id) -> bool {
        self.is_float_scalar_type(ty) || self.is_float_vector_type(ty)
    }

    /// A 16-bit float type carrying the bfloat16 encoding literal.
    pub fn is_bfloat16_scalar_type(&self, ty: Id) -> bool {
        self.type_inst(ty).is_some_and(|t| {
            t.opcode == Opcode::TypeFloat
                && t.operand_u32(0) == Some(16)
                && t.operand_u32(1).is_some()
        })
    }

    /// The scalar component type: vectors and matrices unwrap one level per
    /// call through `component_type`; scalars return themselves.
    pub fn component_type(&self, ty: Id) -> Id {
        match self.type_inst(ty) {
            Some(t) if matches!(t.opcode, Opcode::TypeVector | Opcode::TypeMatrix) => {
                t.operand_id(0).unwrap_or(ty)
            }
            Some(t)
                if matches!(
                    t.opcode,
                    Opcode::TypeCooperativeMatrixKhr | Opcode::TypeCooperativeVectorNv
                ) =>
            {
                t.operand_id(0).unwrap_or(ty)
            }
            _ => ty,
        }
    }

    /// The number of components of a vector or matrix type; scalars have
    /// dimension 1.
    pub fn dimension(&self, ty: Id) -> u32 {
        match self.type_inst(ty) {
            Some(t) if matches!(t.opcode, Opcode::TypeVector | Opcode::TypeMatrix) => {
                t.operand_u32(1).unwrap_or(1)
            }
            _ => 1,
        }
    }

    /// The scalar bit width underlying a type, 0 when it has none.
    pub fn bit_width(&self, ty: Id) -> u32 {
        let component = self.component_type(ty);
        self.type_inst(component)
            .filter(|t| matches!(t.opcode, Opcode::TypeInt | Opcode::TypeFloat))
            .and_then(|t| t.operand_u32(0))
            .unwrap_or(0)
    }

    /// Whether the type (or its component) is a sized int or float of the
    /// given width.
    pub fn contains_sized_float_type(&self, ty: Id, width: u32) -> bool {
        let component = self.component_type(ty);
        self.type_inst(component)
            .is_some_and(|t| t.opcode == Opcode::TypeFloat && t.operand_u32(0) == Some(width))
    }

    /// `(rows, cols, column_type, component_type)` of a matrix type.
    pub fn matrix_type_info(&self, ty: Id) -> Option<(u32, u32, Id, Id)> {
        let t = self.type_inst(ty)?;
        if t.opcode != Opcode::TypeMatrix {
            return None;
        }
        let col_type = t.operand_id(0)?;
        let cols = t.operand_u32(1)?;
        let col = self.type_inst(col_type)?;
        if col.opcode != Opcode::TypeVector {
            return None;
        }
        let component = col.operand_id(0)?;
        let rows = col.operand_u32(1)?;
        Some((rows, cols, col_type, component))
    }

    /// Member types of a struct type, in declaration order.
    pub fn struct_member_types(&self, ty: Id) -> Option<Vec<Id>> {
        let t = self.type_inst(ty)?;
        if t.opcode != Opcode::TypeStruct {
            return None;
        }
        t.operands
            .iter()
            .map(|operand| operand.as_id())
            .collect::<Option<Vec<_>>>()
    }

    /// A statically evaluable scope/rows/cols field of a cooperative matrix
    /// type (operand indices 1, 2, 3).
    pub fn cooperative_matrix_field(&self, ty: Id, operand: usize) -> Option<u32> {
        let t = self.type_inst(ty)?;
        if t.opcode != Opcode::TypeCooperativeMatrixKhr {
            return None;
        }
        self.eval_u32_if_const(t.operand_id(operand)?)
    }

    pub fn is_cooperative_matrix_type(&self, ty: Id) -> bool {
        self.type_inst(ty)
            .is_some_and(|t| t.opcode == Opcode::TypeCooperativeMatrixKhr)
    }

    pub fn is_float_cooperative_matrix_type(&self, ty: Id) -> bool {
        self.is_cooperative_matrix_type(ty)
            && self.is_float_scalar_type(self.component_type(ty))
    }

    pub fn is_int_cooperative_matrix_type(&self, ty: Id) -> bool {
        self.is_cooperative_matrix_type(ty) && self.is_int_scalar_type(self.component_type(ty))
    }

    pub fn is_unsigned_int_cooperative_matrix_type(&self, ty: Id) -> bool {
        self.is_cooperative_matrix_type(ty)
            && self.is_unsigned_int_scalar_type(self.component_type(ty))
    }

    fn cooperative_matrix_use(&self, ty: Id) -> Option<u32> {
        let t = self.type_inst(ty)?;
        if t.opcode != Opcode::TypeCooperativeMatrixKhr {
            return None;
        }
        self.eval_u32_if_const(t.operand_id(4)?)
    }

    pub fn is_cooperative_matrix_a_type(&self, ty: Id) -> bool {
        self.cooperative_matrix_use(ty) == Some(cooperative_matrix_use::MATRIX_A)
    }

    pub fn is_cooperative_matrix_b_type(&self, ty: Id) -> bool {
        self.cooperative_matrix_use(ty) == Some(cooperative_matrix_use::MATRIX_B)
    }

    pub fn is_cooperative_matrix_acc_type(&self, ty: Id) -> bool {
        self.cooperative_matrix_use(ty) == Some(cooperative_matrix_use::MATRIX_ACCUMULATOR)
    }

    pub fn is_cooperative_vector_type(&self, ty: Id) -> bool {
        self.type_inst(ty)
            .is_some_and(|t| t.opcode == Opcode::TypeCooperativeVectorNv)
    }

    pub fn is_float_cooperative_vector_type(&self, ty: Id) -> bool {
        self.is_cooperative_vector_type(ty)
            && self.is_float_scalar_type(self.component_type(ty))
    }

    pub fn is_int_cooperative_vector_type(&self, ty: Id) -> bool {
        self.is_cooperative_vector_type(ty) && self.is_int_scalar_type(self.component_type(ty))
    }

    pub fn is_unsigned_int_cooperative_vector_type(&self, ty: Id) -> bool {
        self.is_cooperative_vector_type(ty)
            && self.is_unsigned_int_scalar_type(self.component_type(ty))
    }

    /// Scope and dimension expressions of both cooperative matrix types must
    /// agree wherever both sides are statically evaluable constants.
    /// Symbolic dimensions cannot be proven unequal, so they pass.
    pub fn cooperative_matrix_shapes_match(
        &self,
        inst: InstId,
        result_type: Id,
        other_type: Id,
        opcode: Opcode,
    ) -> Result<(), Diagnostic> {
        let (Some(result_def), Some(other_def)) =
            (self.type_inst(result_type), self.type_inst(other_type))
        else {
            return Ok(());
        };

        let fields = [(1usize, "scope"), (2, "rows"), (3, "cols")];
        for (operand, what) in fields {
            let lhs = result_def
                .operand_id(operand)
                .and_then(|id| self.eval_u32_if_const(id));
            let rhs = other_def
                .operand_id(operand)
                .and_then(|id| self.eval_u32_if_const(id));
            if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                if lhs != rhs {
                    return Err(Diagnostic::invalid_data(
                        inst,
                        format!(
                            "Cooperative matrix {what} mismatch: {}",
                            opcode.mnemonic()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Component count expressions of both cooperative vector types must
    /// agree where statically evaluable.
    pub fn cooperative_vector_dimensions_match(
        &self,
        inst: InstId,
        result_type: Id,
        other_type: Id,
        opcode: Opcode,
    ) -> Result<(), Diagnostic> {
        let (Some(result_def), Some(other_def)) =
            (self.type_inst(result_type), self.type_inst(other_type))
        else {
            return Ok(());
        };
        let lhs = result_def
            .operand_id(1)
            .and_then(|id| self.eval_u32_if_const(id));
        let rhs = other_def
            .operand_id(1)
            .and_then(|id| self.eval_u32_if_const(id));
        if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
            if lhs != rhs {
                return Err(Diagnostic::invalid_data(
                    inst,
                    format!(
                        "Cooperative vector component counts must match: {}",
                        opcode.mnemonic()
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn reachable_functions(
    graph: &FxHashMap<FuncId, Vec<FuncId>>,
    root: FuncId,
) -> Vec<FuncId> {
    let mut seen = FxHashSet::default();
    let mut worklist = vec![root];
    let mut order = Vec::new();
    while let Some(func) = worklist.pop() {
        if !seen.insert(func) {
            continue;
        }
        order.push(func);
        if let Some(callees) = graph.get(&func) {
            worklist.extend(callees.iter().copied());
        }
    }
    order
}
