//! Validator diagnostics.

use std::fmt;

use silica_ir::InstId;

/// Internal error category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The IR violates a validation rule.
    InvalidData,
    /// An unknown name or value in a lookup table.
    InvalidLookup,
    /// Malformed textual operand input.
    InvalidText,
    /// An engine invariant broke; signals a bug, not bad input.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidData => "INVALID_DATA",
            Self::InvalidLookup => "INVALID_LOOKUP",
            Self::InvalidText => "INVALID_TEXT",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// One finding, bound to the offending instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub inst: InstId,
    pub message: String,
    /// The offending operand, in logical operand numbering (result type is
    /// operand 0 where present).
    pub operand_index: Option<usize>,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, inst: InstId, message: impl Into<String>) -> Self {
        Self {
            code,
            inst,
            message: message.into(),
            operand_index: None,
        }
    }

    pub fn invalid_data(inst: InstId, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidData, inst, message)
    }

    pub fn with_operand_index(mut self, index: usize) -> Self {
        self.operand_index = Some(index);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error [{}] {} @ inst{}",
            self.code,
            self.message,
            self.inst.as_u32()
        )?;
        if let Some(index) = self.operand_index {
            write!(f, " (operand index {index})")?;
        }
        Ok(())
    }
}

/// All diagnostics of one validation run, in instruction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.diagnostics.is_empty() {
            return writeln!(f, "no diagnostics");
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
