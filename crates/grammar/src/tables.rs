//! The static operand tables. Loaded once, never written.

use silica_env::Version;

use crate::{OperandDesc, OperandKind};

const V1_0: u32 = Version::new(1, 0).word();
const V1_3: u32 = Version::new(1, 3).word();
const V1_5: u32 = Version::new(1, 5).word();
const V1_6: u32 = Version::new(1, 6).word();
// Entries that never entered a core version are enabled by extensions or
// capabilities only.
const NEVER: u32 = u32::MAX;

/// Named feature flags a module can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Matrix,
    Shader,
    Geometry,
    Tessellation,
    Addresses,
    Linkage,
    Kernel,
    Float16,
    Float64,
    Int64,
    Int16,
    Int8,
    DerivativeControl,
    GroupNonUniform,
    StorageBuffer16BitAccess,
    VulkanMemoryModel,
    MeshShadingExt,
    ComputeDerivativeGroupQuadsKhr,
    ComputeDerivativeGroupLinearKhr,
    CooperativeMatrixKhr,
    CooperativeVectorNv,
    BFloat16DotProductKhr,
}

pub(crate) const ALL_CAPABILITIES: &[Capability] = &[
    Capability::Matrix,
    Capability::Shader,
    Capability::Geometry,
    Capability::Tessellation,
    Capability::Addresses,
    Capability::Linkage,
    Capability::Kernel,
    Capability::Float16,
    Capability::Float64,
    Capability::Int64,
    Capability::Int16,
    Capability::Int8,
    Capability::DerivativeControl,
    Capability::GroupNonUniform,
    Capability::StorageBuffer16BitAccess,
    Capability::VulkanMemoryModel,
    Capability::MeshShadingExt,
    Capability::ComputeDerivativeGroupQuadsKhr,
    Capability::ComputeDerivativeGroupLinearKhr,
    Capability::CooperativeMatrixKhr,
    Capability::CooperativeVectorNv,
    Capability::BFloat16DotProductKhr,
];

impl Capability {
    pub const fn value(self) -> u32 {
        match self {
            Capability::Matrix => 0,
            Capability::Shader => 1,
            Capability::Geometry => 2,
            Capability::Tessellation => 3,
            Capability::Addresses => 4,
            Capability::Linkage => 5,
            Capability::Kernel => 6,
            Capability::Float16 => 9,
            Capability::Float64 => 10,
            Capability::Int64 => 11,
            Capability::Int16 => 22,
            Capability::Int8 => 39,
            Capability::DerivativeControl => 51,
            Capability::GroupNonUniform => 61,
            Capability::StorageBuffer16BitAccess => 4433,
            Capability::VulkanMemoryModel => 5345,
            Capability::MeshShadingExt => 5283,
            Capability::ComputeDerivativeGroupQuadsKhr => 5288,
            Capability::ComputeDerivativeGroupLinearKhr => 5350,
            Capability::CooperativeMatrixKhr => 6022,
            Capability::CooperativeVectorNv => 5394,
            Capability::BFloat16DotProductKhr => 5117,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        ALL_CAPABILITIES
            .iter()
            .copied()
            .find(|cap| cap.value() == value)
    }

    pub fn name(self) -> &'static str {
        crate::operand_name(OperandKind::Capability, self.value())
    }

    /// The capabilities this capability directly implies.
    pub fn implies(self) -> &'static [Capability] {
        crate::lookup_value(OperandKind::Capability, self.value())
            .map(|desc| desc.capabilities)
            .unwrap_or(&[])
    }
}

/// Named extensions a module can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Extension {
    KhrStorageBufferStorageClass,
    Khr16BitStorage,
    KhrVariablePointers,
    KhrVulkanMemoryModel,
    KhrComputeShaderDerivatives,
    KhrCooperativeMatrix,
    KhrBfloat16,
    ExtMeshShader,
    NvCooperativeVector,
}

impl Extension {
    pub fn name(self) -> &'static str {
        match self {
            Extension::KhrStorageBufferStorageClass => "SPV_KHR_storage_buffer_storage_class",
            Extension::Khr16BitStorage => "SPV_KHR_16bit_storage",
            Extension::KhrVariablePointers => "SPV_KHR_variable_pointers",
            Extension::KhrVulkanMemoryModel => "SPV_KHR_vulkan_memory_model",
            Extension::KhrComputeShaderDerivatives => "SPV_KHR_compute_shader_derivatives",
            Extension::KhrCooperativeMatrix => "SPV_KHR_cooperative_matrix",
            Extension::KhrBfloat16 => "SPV_KHR_bfloat16",
            Extension::ExtMeshShader => "SPV_EXT_mesh_shader",
            Extension::NvCooperativeVector => "SPV_NV_cooperative_vector",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: &[Extension] = &[
            Extension::KhrStorageBufferStorageClass,
            Extension::Khr16BitStorage,
            Extension::KhrVariablePointers,
            Extension::KhrVulkanMemoryModel,
            Extension::KhrComputeShaderDerivatives,
            Extension::KhrCooperativeMatrix,
            Extension::KhrBfloat16,
            Extension::ExtMeshShader,
            Extension::NvCooperativeVector,
        ];
        ALL.iter().copied().find(|ext| ext.name() == name)
    }
}

macro_rules! operand {
    ($name:literal, $value:expr) => {
        OperandDesc {
            name: $name,
            value: $value,
            capabilities: &[],
            extensions: &[],
            min_version: V1_0,
            last_version: V1_6,
        }
    };
    ($name:literal, $value:expr, min: $min:expr) => {
        OperandDesc {
            name: $name,
            value: $value,
            capabilities: &[],
            extensions: &[],
            min_version: $min,
            last_version: V1_6,
        }
    };
    ($name:literal, $value:expr, caps: $caps:expr) => {
        OperandDesc {
            name: $name,
            value: $value,
            capabilities: $caps,
            extensions: &[],
            min_version: V1_0,
            last_version: V1_6,
        }
    };
    ($name:literal, $value:expr, caps: $caps:expr, exts: $exts:expr) => {
        OperandDesc {
            name: $name,
            value: $value,
            capabilities: $caps,
            extensions: $exts,
            min_version: NEVER,
            last_version: V1_6,
        }
    };
    ($name:literal, $value:expr, caps: $caps:expr, exts: $exts:expr, min: $min:expr) => {
        OperandDesc {
            name: $name,
            value: $value,
            capabilities: $caps,
            extensions: $exts,
            min_version: $min,
            last_version: V1_6,
        }
    };
}

// For `Capability` entries the `caps` list is the set of capabilities the
// entry transitively implies.
static CAPABILITY_TABLE: &[OperandDesc] = &[
    operand!("Matrix", 0),
    operand!("Shader", 1, caps: &[Capability::Matrix]),
    operand!("Geometry", 2, caps: &[Capability::Shader]),
    operand!("Tessellation", 3, caps: &[Capability::Shader]),
    operand!("Addresses", 4),
    operand!("Linkage", 5),
    operand!("Kernel", 6),
    operand!("Float16", 9),
    operand!("Float64", 10),
    operand!("Int64", 11),
    operand!("Int16", 22),
    operand!("Int8", 39),
    operand!("DerivativeControl", 51, caps: &[Capability::Shader]),
    operand!("GroupNonUniform", 61, min: V1_3),
    operand!(
        "StorageBuffer16BitAccess",
        4433,
        caps: &[],
        exts: &[Extension::Khr16BitStorage],
        min: V1_3
    ),
    operand!(
        "VulkanMemoryModel",
        5345,
        caps: &[],
        exts: &[Extension::KhrVulkanMemoryModel],
        min: V1_5
    ),
    operand!(
        "MeshShadingEXT",
        5283,
        caps: &[Capability::Shader],
        exts: &[Extension::ExtMeshShader]
    ),
    operand!(
        "ComputeDerivativeGroupQuadsKHR",
        5288,
        caps: &[Capability::Shader],
        exts: &[Extension::KhrComputeShaderDerivatives]
    ),
    operand!(
        "ComputeDerivativeGroupLinearKHR",
        5350,
        caps: &[Capability::Shader],
        exts: &[Extension::KhrComputeShaderDerivatives]
    ),
    operand!(
        "CooperativeMatrixKHR",
        6022,
        caps: &[],
        exts: &[Extension::KhrCooperativeMatrix]
    ),
    operand!(
        "CooperativeVectorNV",
        5394,
        caps: &[],
        exts: &[Extension::NvCooperativeVector]
    ),
    operand!(
        "BFloat16DotProductKHR",
        5117,
        caps: &[],
        exts: &[Extension::KhrBfloat16]
    ),
];

static EXECUTION_MODEL_TABLE: &[OperandDesc] = &[
    operand!("Vertex", 0, caps: &[Capability::Shader]),
    operand!("TessellationControl", 1, caps: &[Capability::Tessellation]),
    operand!("TessellationEvaluation", 2, caps: &[Capability::Tessellation]),
    operand!("Geometry", 3, caps: &[Capability::Geometry]),
    operand!("Fragment", 4, caps: &[Capability::Shader]),
    operand!("GLCompute", 5, caps: &[Capability::Shader]),
    operand!("Kernel", 6, caps: &[Capability::Kernel]),
    operand!("TaskEXT", 5364, caps: &[Capability::MeshShadingExt], exts: &[Extension::ExtMeshShader]),
    operand!("MeshEXT", 5365, caps: &[Capability::MeshShadingExt], exts: &[Extension::ExtMeshShader]),
];

static EXECUTION_MODE_TABLE: &[OperandDesc] = &[
    operand!("OriginUpperLeft", 7, caps: &[Capability::Shader]),
    operand!("OriginLowerLeft", 8, caps: &[Capability::Shader]),
    operand!("LocalSize", 17),
    operand!("OutputVertices", 26, caps: &[Capability::Geometry, Capability::Tessellation]),
    operand!(
        "OutputPrimitivesEXT",
        5270,
        caps: &[Capability::MeshShadingExt],
        exts: &[Extension::ExtMeshShader]
    ),
    operand!(
        "DerivativeGroupQuadsKHR",
        5289,
        caps: &[Capability::ComputeDerivativeGroupQuadsKhr],
        exts: &[Extension::KhrComputeShaderDerivatives]
    ),
    operand!(
        "DerivativeGroupLinearKHR",
        5290,
        caps: &[Capability::ComputeDerivativeGroupLinearKhr],
        exts: &[Extension::KhrComputeShaderDerivatives]
    ),
];

static STORAGE_CLASS_TABLE: &[OperandDesc] = &[
    operand!("UniformConstant", 0),
    operand!("Input", 1),
    operand!("Uniform", 2, caps: &[Capability::Shader]),
    operand!("Output", 3, caps: &[Capability::Shader]),
    operand!("Workgroup", 4),
    operand!("CrossWorkgroup", 5),
    operand!("Private", 6, caps: &[Capability::Shader]),
    operand!("Function", 7),
    operand!("PushConstant", 9, caps: &[Capability::Shader]),
    operand!(
        "StorageBuffer",
        12,
        caps: &[Capability::Shader],
        exts: &[Extension::KhrStorageBufferStorageClass],
        min: V1_3
    ),
    operand!(
        "TaskPayloadWorkgroupEXT",
        5402,
        caps: &[Capability::MeshShadingExt],
        exts: &[Extension::ExtMeshShader]
    ),
];

static DECORATION_TABLE: &[OperandDesc] = &[
    operand!("RelaxedPrecision", 0, caps: &[Capability::Shader]),
    operand!("Block", 2, caps: &[Capability::Shader]),
    operand!("BufferBlock", 3, caps: &[Capability::Shader]),
    operand!("RowMajor", 4, caps: &[Capability::Matrix]),
    operand!("ColMajor", 5, caps: &[Capability::Matrix]),
    operand!("ArrayStride", 6, caps: &[Capability::Shader]),
    operand!("BuiltIn", 11),
    operand!("NoPerspective", 13, caps: &[Capability::Shader]),
    operand!("Flat", 14, caps: &[Capability::Shader]),
    operand!("Restrict", 19),
    operand!("Aliased", 20),
    operand!("Volatile", 21),
    operand!("Coherent", 23),
    operand!("NonWritable", 24),
    operand!("NonReadable", 25),
    operand!("Location", 30, caps: &[Capability::Shader]),
    operand!("Binding", 33, caps: &[Capability::Shader]),
    operand!("DescriptorSet", 34, caps: &[Capability::Shader]),
    operand!("Offset", 35, caps: &[Capability::Shader]),
];

static FUNCTION_CONTROL_TABLE: &[OperandDesc] = &[
    operand!("None", 0x0),
    operand!("Inline", 0x1),
    operand!("DontInline", 0x2),
    operand!("Pure", 0x4),
    operand!("Const", 0x8),
];

static MEMORY_ACCESS_TABLE: &[OperandDesc] = &[
    operand!("None", 0x0),
    operand!("Volatile", 0x1),
    operand!("Aligned", 0x2),
    operand!("Nontemporal", 0x4),
    operand!("MakePointerAvailable", 0x8),
    operand!("MakePointerVisible", 0x10),
    operand!("ReadOnly", 0x20),
    operand!("NonWritable", 0x40),
];

static SELECTION_CONTROL_TABLE: &[OperandDesc] = &[
    operand!("None", 0x0),
    operand!("Flatten", 0x1),
    operand!("DontFlatten", 0x2),
];

static LOOP_CONTROL_TABLE: &[OperandDesc] = &[
    operand!("None", 0x0),
    operand!("Unroll", 0x1),
    operand!("DontUnroll", 0x2),
    operand!("DependencyInfinite", 0x4),
    operand!("DependencyLength", 0x8),
];

pub(crate) fn operand_table(kind: OperandKind) -> &'static [OperandDesc] {
    match kind {
        OperandKind::Capability => CAPABILITY_TABLE,
        OperandKind::ExecutionModel => EXECUTION_MODEL_TABLE,
        OperandKind::ExecutionMode => EXECUTION_MODE_TABLE,
        OperandKind::StorageClass => STORAGE_CLASS_TABLE,
        OperandKind::Decoration => DECORATION_TABLE,
        OperandKind::FunctionControl => FUNCTION_CONTROL_TABLE,
        OperandKind::MemoryAccess => MEMORY_ACCESS_TABLE,
        OperandKind::SelectionControl => SELECTION_CONTROL_TABLE,
        OperandKind::LoopControl => LOOP_CONTROL_TABLE,
    }
}

/// Opcode values admissible as the operation of a spec-constant op, keyed by
/// the operation name without its `Op` prefix.
pub static SPEC_CONSTANT_OPCODES: &[(&str, u32)] = &[
    // Conversion
    ("SConvert", 114),
    ("FConvert", 115),
    ("ConvertFToS", 110),
    ("ConvertSToF", 111),
    ("ConvertFToU", 109),
    ("ConvertUToF", 112),
    ("UConvert", 113),
    ("Bitcast", 124),
    ("QuantizeToF16", 116),
    // Arithmetic
    ("SNegate", 126),
    ("Not", 200),
    ("IAdd", 128),
    ("ISub", 130),
    ("IMul", 132),
    ("UDiv", 134),
    ("SDiv", 135),
    ("UMod", 137),
    ("SRem", 138),
    ("SMod", 139),
    ("ShiftRightLogical", 194),
    ("ShiftRightArithmetic", 195),
    ("ShiftLeftLogical", 196),
    ("BitwiseOr", 197),
    ("BitwiseXor", 198),
    ("BitwiseAnd", 199),
    ("FNegate", 127),
    ("FAdd", 129),
    ("FSub", 131),
    ("FMul", 133),
    ("FDiv", 136),
    ("FRem", 140),
    ("FMod", 141),
    // Composite
    ("VectorShuffle", 79),
    ("CompositeExtract", 81),
    ("CompositeInsert", 82),
    // Logical
    ("LogicalOr", 166),
    ("LogicalAnd", 167),
    ("LogicalNot", 168),
    ("LogicalEqual", 164),
    ("LogicalNotEqual", 165),
    ("Select", 169),
    // Comparison
    ("IEqual", 170),
    ("INotEqual", 171),
    ("ULessThan", 176),
    ("SLessThan", 177),
    ("UGreaterThan", 172),
    ("SGreaterThan", 173),
    ("ULessThanEqual", 178),
    ("SLessThanEqual", 179),
    ("UGreaterThanEqual", 174),
    ("SGreaterThanEqual", 175),
    // Memory
    ("AccessChain", 65),
    ("InBoundsAccessChain", 66),
    ("CooperativeMatrixLengthKHR", 4460),
];
