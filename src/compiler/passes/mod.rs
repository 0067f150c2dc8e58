//! The built-in passes.
//!
//! | Pass | Kind | Rewrites |
//! |------|------|----------|
//! | [`SideEffectSummaryPass`] | global | none, publishes summaries |
//! | [`FinalInlinePass`] | global | encoded field values, initializers |
//! | [`ConstantPropagationPass`] | per method | constants, branches, redundant writes |
//! | [`DeadWriteEliminationPass`] | per method | unobserved heap writes |

mod constprop;
mod deadwrites;
mod finalinline;
mod summaries;

pub use constprop::ConstantPropagationPass;
pub use deadwrites::DeadWriteEliminationPass;
pub use finalinline::FinalInlinePass;
pub use summaries::SideEffectSummaryPass;
