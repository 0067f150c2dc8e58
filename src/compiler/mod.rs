//! Rewriting infrastructure and optimization passes.
//!
//! This module sits on top of [`crate::analysis`]: analyses compute facts,
//! the compiler layer turns them into edits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PassContext                 Shared state of one run             │
//! │    ├─ PassConfig              (enabled passes, cache path)       │
//! │    ├─ SummaryMap              (side-effect summaries)            │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassManager                 Runs passes in order, with metrics  │
//! │    ├─ SideEffectSummaryPass   (global)                           │
//! │    ├─ FinalInlinePass         (global)                           │
//! │    ├─ ConstantPropagationPass (per method, parallel)             │
//! │    └─ DeadWriteEliminationPass (per method, parallel)            │
//! │                                                                  │
//! │  Transform / EditQueue       Deferred edits, committed at once   │
//! │  LocalDce                    Cleanup of dead pure instructions   │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Edits are never applied while an analysis borrows the code: a
//! [`Transform`] queues them into an [`EditQueue`] and [`Transform::commit`]
//! applies them, rebuilds the graph and validates the result.

mod config;
mod context;
mod dce;
mod deadwrites;
mod events;
mod pass;
mod passes;
mod queue;
mod scheduler;
mod transform;

pub use config::PassConfig;
pub use context::PassContext;
pub use dce::LocalDce;
pub use deadwrites::DeadWriteElimination;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::Pass;
pub use passes::{
    ConstantPropagationPass, DeadWriteEliminationPass, FinalInlinePass, SideEffectSummaryPass,
};
pub use queue::{Edit, EditQueue};
pub use scheduler::{PassManager, PassMetrics};
pub use transform::{Config, Transform, TransformStats};
