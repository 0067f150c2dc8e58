//! The interface every pass implements.

use crate::{
    compiler::{PassContext, TransformStats},
    ir::{Method, Program},
    Result,
};

/// A pass over a program.
///
/// All passes must be thread-safe (Send + Sync): per-method passes are run
/// on many methods in parallel, each call receiving exclusive access to one
/// method and shared access to the context.
///
/// A pass is either per-method, implementing [`Pass::run_on_method`], or
/// global, returning `true` from [`Pass::is_global`] and implementing
/// [`Pass::run_global`].
pub trait Pass: Send + Sync {
    /// Unique name for logging and metrics.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific method?
    ///
    /// By default every method with code is processed, except those flagged
    /// as not to be optimized.
    fn should_run(&self, method: &Method, _ctx: &PassContext) -> bool {
        method.code.is_some() && !method.no_optimizations
    }

    /// Runs the pass on a single method.
    ///
    /// # Errors
    ///
    /// Returns an error if the rewritten method fails validation. The
    /// [`PassManager`](crate::compiler::PassManager) annotates it with the
    /// method identity.
    fn run_on_method(&self, _method: &mut Method, _ctx: &PassContext) -> Result<TransformStats> {
        Ok(TransformStats::default())
    }

    /// Runs the pass on the whole program.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails for any method.
    fn run_global(&self, _program: &mut Program, _ctx: &PassContext) -> Result<TransformStats> {
        Ok(TransformStats::default())
    }

    /// Does this pass operate on the whole program at once?
    fn is_global(&self) -> bool {
        false
    }

    /// Called once before the pass runs, with the program as it is then.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _program: &Program, _ctx: &PassContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass ran.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &PassContext) -> Result<()> {
        Ok(())
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
