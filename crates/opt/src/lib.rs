//! The pass engine: the execution contract every transformation obeys.
//!
//! A pass instance runs at most once. On a `Changed` status every analysis
//! the pass does not declare preserved is invalidated, and the graph must
//! then pass a consistency check; an inconsistency is an engine bug surfaced
//! as a distinguished fatal error, never silently swallowed.

mod helpers;
pub mod passes;

use silica_ir::{AnalysisSet, IrContext};
use thiserror::Error;

pub use helpers::{base_type, generate_copy, get_null_value, is_float_type, pointee_type};

/// The outcome of one pass's `process`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NoChange,
    Changed,
    Failure,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PassError {
    /// A pass object is single-use; a second `run` is refused.
    #[error("pass `{0}` has already run")]
    AlreadyRun(&'static str),

    /// The pass reported `Failure`; the owning pipeline must abort.
    #[error("pass `{0}` failed")]
    Failed(&'static str),

    /// An analysis was out of date after the pass completed. This signals a
    /// bug in the pass, not bad input.
    #[error("analyses are inconsistent after pass `{0}`")]
    InconsistentIr(&'static str),
}

/// A single graph transformation.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Transforms the module, reporting whether anything changed.
    fn process(&mut self, ctx: &mut IrContext) -> Status;

    /// Analyses that remain valid when this pass reports `Changed`.
    fn preserved_analyses(&self) -> AnalysisSet {
        AnalysisSet::NONE
    }
}

impl<P: Pass + ?Sized> Pass for Box<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn process(&mut self, ctx: &mut IrContext) -> Status {
        (**self).process(ctx)
    }

    fn preserved_analyses(&self) -> AnalysisSet {
        (**self).preserved_analyses()
    }
}

/// Drives one pass instance through its single permitted run.
pub struct PassRunner<P> {
    pass: P,
    already_run: bool,
}

impl<P: Pass> PassRunner<P> {
    pub fn new(pass: P) -> Self {
        Self {
            pass,
            already_run: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.pass.name()
    }

    /// Runs the pass: process, then on `Changed` invalidate every analysis
    /// outside the preserved set, then assert graph consistency.
    pub fn run(&mut self, ctx: &mut IrContext) -> Result<Status, PassError> {
        if self.already_run {
            return Err(PassError::AlreadyRun(self.pass.name()));
        }
        self.already_run = true;

        let status = self.pass.process(ctx);

        if status == Status::Changed {
            ctx.invalidate_analyses_except(self.pass.preserved_analyses());
        }
        if status == Status::Failure {
            return Err(PassError::Failed(self.pass.name()));
        }
        if !ctx.is_consistent() {
            return Err(PassError::InconsistentIr(self.pass.name()));
        }
        Ok(status)
    }
}

/// The report of a completed pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineResult {
    pub changed: bool,
}

/// An ordered sequence of passes, run sequentially. Stops at the first
/// failure and reports which pass failed.
#[derive(Default)]
pub struct PassPipeline {
    passes: Vec<PassRunner<Box<dyn Pass>>>,
}

impl PassPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, pass: impl Pass + 'static) -> &mut Self {
        self.passes.push(PassRunner::new(Box::new(pass)));
        self
    }

    pub fn run(&mut self, ctx: &mut IrContext) -> Result<PipelineResult, PassError> {
        let mut changed = false;
        for runner in &mut self.passes {
            match runner.run(ctx)? {
                Status::Changed => changed = true,
                Status::NoChange => {}
                Status::Failure => unreachable!("runner maps Failure to an error"),
            }
        }
        Ok(PipelineResult { changed })
    }
}
