//! Intraprocedural constant propagation.
//!
//! Tracks which registers (and which static fields of a class under
//! initialization) hold a known integer or string, folding arithmetic and
//! pruning branches whose outcome is known.
//!
//! # Components
//!
//! - [`ConstantTransfer`]: forward transfer with edge refinement
//! - [`ConstantEnvironment`]: the state, keyed by [`Location`]
//! - [`WholeProgramState`]: field values known across the whole program
//!
//! # Example
//!
//! ```rust
//! use optscope::prelude::*;
//!
//! let code = assembler::code_from_str(r#"(
//!     (const v0 0)
//!     (if-eqz v0 :zero)
//!     (const v1 1)
//!     (return v1)
//!     (:zero)
//!     (const v1 2)
//!     (return v1)
//! )"#)?;
//!
//! let mut iterator = MonotonicFixpointIterator::new(&code, ConstantTransfer::default());
//! iterator.run(ConstantEnvironment::top());
//!
//! // The fall-through side of the branch is unreachable
//! let unreachable = code
//!     .blocks()
//!     .iter()
//!     .filter(|b| iterator.entry_state_at(b.id()).is_bottom())
//!     .count();
//! assert_eq!(unreachable, 1);
//! # Ok::<(), optscope::Error>(())
//! ```

mod transfer;
mod whole_program;

use std::fmt;

use crate::{
    analysis::dataflow::{ConstantValue, Environment},
    ir::{FieldRef, Reg, RESULT_REGISTER},
};

pub use transfer::ConstantTransfer;
pub use whole_program::{encoded_to_constant, WholeProgramState};

/// A storage location tracked by constant propagation.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    /// A register, including [`RESULT_REGISTER`].
    Register(Reg),
    /// A static field of the class under initialization.
    Field(FieldRef),
}

impl Location {
    /// The pseudo register holding the last result.
    #[must_use]
    pub const fn result() -> Self {
        Self::Register(RESULT_REGISTER)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(RESULT_REGISTER) => f.write_str("result"),
            Self::Register(r) => write!(f, "v{r}"),
            Self::Field(field) => write!(f, "{field}"),
        }
    }
}

/// The constant propagation state.
pub type ConstantEnvironment = Environment<Location, ConstantValue>;
