//! Static operand grammar: which enumerants and masks exist, which
//! capabilities they imply, and which target environments can see them.
//!
//! All tables are process-wide immutable data with no mutation API, so they
//! can be shared freely across validation and pass runs.

mod tables;

use std::fmt;

use silica_env::TargetEnv;
use thiserror::Error;

pub use tables::{Capability, Extension};

/// Operand classes that carry named enumerant or mask values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Capability,
    ExecutionModel,
    ExecutionMode,
    StorageClass,
    Decoration,
    FunctionControl,
    MemoryAccess,
    SelectionControl,
    LoopControl,
}

impl OperandKind {
    /// Mask kinds combine with `|`; the rest are single enumerants.
    pub fn is_mask(self) -> bool {
        matches!(
            self,
            OperandKind::FunctionControl
                | OperandKind::MemoryAccess
                | OperandKind::SelectionControl
                | OperandKind::LoopControl
        )
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperandKind::Capability => "Capability",
            OperandKind::ExecutionModel => "ExecutionModel",
            OperandKind::ExecutionMode => "ExecutionMode",
            OperandKind::StorageClass => "StorageClass",
            OperandKind::Decoration => "Decoration",
            OperandKind::FunctionControl => "FunctionControl",
            OperandKind::MemoryAccess => "MemoryAccess",
            OperandKind::SelectionControl => "SelectionControl",
            OperandKind::LoopControl => "LoopControl",
        };
        f.write_str(name)
    }
}

/// One entry of an operand table.
#[derive(Debug)]
pub struct OperandDesc {
    pub name: &'static str,
    pub value: u32,
    /// For a `Capability` entry, the capabilities it transitively implies;
    /// for any other entry, the capabilities that enable it.
    pub capabilities: &'static [Capability],
    /// Extensions that enable the operand outside its core version range.
    pub extensions: &'static [Extension],
    /// First core version word carrying the operand.
    pub min_version: u32,
    /// Last core version word carrying the operand.
    pub last_version: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GrammarError {
    /// Empty or structurally malformed operand text.
    #[error("invalid operand text")]
    InvalidText,

    /// A name or value that no table entry matches.
    #[error("unknown {kind} `{name}`")]
    InvalidLookup { kind: OperandKind, name: String },

    /// An opcode name outside the spec-constant operation table.
    #[error("unknown spec constant operation `{0}`")]
    InvalidOpcodeLookup(String),
}

/// Looks up an operand by name.
pub fn lookup(kind: OperandKind, name: &str) -> Result<&'static OperandDesc, GrammarError> {
    tables::operand_table(kind)
        .iter()
        .find(|desc| desc.name == name)
        .ok_or_else(|| GrammarError::InvalidLookup {
            kind,
            name: name.to_string(),
        })
}

/// Looks up an operand by its encoded value.
pub fn lookup_value(kind: OperandKind, value: u32) -> Result<&'static OperandDesc, GrammarError> {
    tables::operand_table(kind)
        .iter()
        .find(|desc| desc.value == value)
        .ok_or_else(|| GrammarError::InvalidLookup {
            kind,
            name: format!("{value}"),
        })
}

/// The operand's name, or `"Unknown"` when the value has no entry.
pub fn operand_name(kind: OperandKind, value: u32) -> &'static str {
    lookup_value(kind, value).map(|desc| desc.name).unwrap_or("Unknown")
}

/// Parses a mask expression of the shape `NAME1|NAME2|...`.
///
/// Terms are interpreted left to right with no whitespace permitted. Empty
/// input is `InvalidText`; an unknown term is `InvalidLookup`. The result is
/// the bitwise OR of the term values.
pub fn parse_mask(kind: OperandKind, text: &str) -> Result<u32, GrammarError> {
    if text.is_empty() {
        return Err(GrammarError::InvalidText);
    }

    let mut value = 0;
    for word in text.split('|') {
        let desc = lookup(kind, word)?;
        value |= desc.value;
    }
    Ok(value)
}

/// Renders a mask in its canonical text form: set bits in ascending order,
/// `|`-joined. The inverse of [`parse_mask`] on canonical input.
pub fn mask_to_names(kind: OperandKind, mask: u32) -> Result<String, GrammarError> {
    if mask == 0 {
        return match lookup_value(kind, 0) {
            Ok(desc) => Ok(desc.name.to_string()),
            Err(err) => Err(err),
        };
    }

    let mut names = Vec::new();
    let mut remaining = mask;
    let mut bit = 1u32;
    while remaining != 0 {
        if remaining & bit != 0 {
            let desc = lookup_value(kind, bit)?;
            names.push(desc.name);
            remaining &= !bit;
        }
        bit = bit.checked_shl(1).unwrap_or(0);
        if bit == 0 && remaining != 0 {
            return Err(GrammarError::InvalidLookup {
                kind,
                name: format!("{remaining:#x}"),
            });
        }
    }
    Ok(names.join("|"))
}

/// A grammar instance: the static operand tables viewed under one target
/// environment. Feature managers compare equal only over the same instance.
#[derive(Debug)]
pub struct Grammar {
    target_env: TargetEnv,
}

impl Grammar {
    pub fn new(target_env: TargetEnv) -> Self {
        Self { target_env }
    }

    /// The interned grammar instance for a target environment. Two views of
    /// the same environment share one instance, so address identity doubles
    /// as grammar identity.
    pub fn global(target_env: TargetEnv) -> &'static Grammar {
        macro_rules! interned {
            ($($variant:ident),* $(,)?) => {
                match target_env {
                    $(TargetEnv::$variant => {
                        static G: Grammar = Grammar {
                            target_env: TargetEnv::$variant,
                        };
                        &G
                    })*
                }
            };
        }
        interned!(
            Universal1_0,
            Universal1_1,
            Universal1_2,
            Universal1_3,
            Universal1_4,
            Universal1_5,
            Universal1_6,
            Vulkan1_0,
            Vulkan1_1,
            Vulkan1_1Spv1_4,
            Vulkan1_2,
            Vulkan1_3,
            Vulkan1_4,
            OpenCl1_2,
            OpenClEmbedded1_2,
            OpenCl2_0,
            OpenClEmbedded2_0,
            OpenCl2_1,
            OpenClEmbedded2_1,
            OpenCl2_2,
            OpenClEmbedded2_2,
            OpenGl4_0,
            OpenGl4_1,
            OpenGl4_2,
            OpenGl4_3,
            OpenGl4_5,
        )
    }

    pub fn target_env(&self) -> TargetEnv {
        self.target_env
    }

    /// Filters a capability list down to those visible in this grammar's
    /// target environment: in the env's core version range, or enabled by an
    /// extension or another capability.
    pub fn filter_caps_against_target_env(&self, caps: &[Capability]) -> Vec<Capability> {
        let version = self.target_env.version_word();
        caps.iter()
            .copied()
            .filter(|cap| {
                let Ok(desc) = lookup_value(OperandKind::Capability, cap.value()) else {
                    return false;
                };
                (version >= desc.min_version && version <= desc.last_version)
                    || !desc.extensions.is_empty()
                    || !desc.capabilities.is_empty()
            })
            .collect()
    }
}

/// Resolves a spec-constant operation name (no `Op` prefix, e.g. `"IAdd"`)
/// to its opcode value.
pub fn lookup_spec_constant_opcode(name: &str) -> Result<u32, GrammarError> {
    tables::SPEC_CONSTANT_OPCODES
        .iter()
        .find(|(entry_name, _)| *entry_name == name)
        .map(|(_, opcode)| *opcode)
        .ok_or_else(|| GrammarError::InvalidOpcodeLookup(name.to_string()))
}

/// All admissible spec-constant operations as (name, opcode value) pairs.
pub fn spec_constant_opcode_entries() -> &'static [(&'static str, u32)] {
    tables::SPEC_CONSTANT_OPCODES
}

/// Whether an opcode value is admissible as a spec-constant operation.
pub fn is_spec_constant_opcode(opcode: u32) -> bool {
    tables::SPEC_CONSTANT_OPCODES
        .iter()
        .any(|(_, entry)| *entry == opcode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use silica_env::TargetEnv;

    #[test]
    fn lookup_by_name_and_value_agree() {
        let desc = lookup(OperandKind::Capability, "Shader").unwrap();
        let by_value = lookup_value(OperandKind::Capability, desc.value).unwrap();
        assert_eq!(desc.name, by_value.name);
    }

    #[test]
    fn unknown_name_is_invalid_lookup() {
        assert!(matches!(
            lookup(OperandKind::Capability, "Bogus"),
            Err(GrammarError::InvalidLookup { .. })
        ));
        assert_eq!(operand_name(OperandKind::Capability, 0xdead_beef), "Unknown");
    }

    #[test]
    fn mask_parsing_round_trips() {
        let read_only = lookup(OperandKind::MemoryAccess, "ReadOnly").unwrap().value;
        let non_writable = lookup(OperandKind::MemoryAccess, "NonWritable").unwrap().value;

        let mask = parse_mask(OperandKind::MemoryAccess, "ReadOnly|NonWritable").unwrap();
        assert_eq!(mask, read_only | non_writable);

        let text = mask_to_names(OperandKind::MemoryAccess, mask).unwrap();
        assert_eq!(parse_mask(OperandKind::MemoryAccess, &text).unwrap(), mask);
    }

    #[test]
    fn empty_mask_text_is_invalid_text() {
        assert_eq!(
            parse_mask(OperandKind::MemoryAccess, ""),
            Err(GrammarError::InvalidText)
        );
    }

    #[test]
    fn unknown_mask_term_is_invalid_lookup() {
        assert!(matches!(
            parse_mask(OperandKind::MemoryAccess, "Bogus"),
            Err(GrammarError::InvalidLookup { .. })
        ));
        // A valid prefix does not excuse an invalid tail.
        assert!(matches!(
            parse_mask(OperandKind::MemoryAccess, "Volatile|Bogus"),
            Err(GrammarError::InvalidLookup { .. })
        ));
    }

    #[test]
    fn function_control_masks() {
        let mask = parse_mask(OperandKind::FunctionControl, "Inline|Pure").unwrap();
        assert_eq!(mask, 0x1 | 0x4);
        assert_eq!(
            mask_to_names(OperandKind::FunctionControl, 0).unwrap(),
            "None"
        );
    }

    #[test]
    fn capability_filter_respects_version_range() {
        let grammar = Grammar::new(TargetEnv::Universal1_0);
        // GroupNonUniform arrives in 1.3 and has no enabling extension here.
        let filtered = grammar.filter_caps_against_target_env(&[
            Capability::Shader,
            Capability::GroupNonUniform,
        ]);
        assert_eq!(filtered, vec![Capability::Shader]);

        let grammar = Grammar::new(TargetEnv::Universal1_3);
        let filtered = grammar.filter_caps_against_target_env(&[
            Capability::Shader,
            Capability::GroupNonUniform,
        ]);
        assert_eq!(
            filtered,
            vec![Capability::Shader, Capability::GroupNonUniform]
        );
    }

    #[test]
    fn extension_gated_capability_is_always_visible() {
        // Cooperative matrix support has no core version in any listed env,
        // but its gating extension keeps it visible.
        let grammar = Grammar::new(TargetEnv::Universal1_0);
        let filtered =
            grammar.filter_caps_against_target_env(&[Capability::CooperativeMatrixKhr]);
        assert_eq!(filtered, vec![Capability::CooperativeMatrixKhr]);
    }

    #[test]
    fn spec_constant_opcode_lookup() {
        let opcode = lookup_spec_constant_opcode("IAdd").unwrap();
        assert!(is_spec_constant_opcode(opcode));
        assert!(matches!(
            lookup_spec_constant_opcode("Bogus"),
            Err(GrammarError::InvalidOpcodeLookup(_))
        ));
    }
}
