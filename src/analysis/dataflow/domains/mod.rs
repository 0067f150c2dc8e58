//! Abstract domains.
//!
//! - [`SignedConstantDomain`] and [`StringDomain`]: flat constant lattices
//! - [`ConstantValue`]: the sum of both, as held by registers and fields
//! - [`PointerSet`]: sets of allocation sites
//! - [`Effects`]: side-effect flags

mod constant;
mod effects;
mod pointers;
mod string;
mod value;

pub use constant::SignedConstantDomain;
pub use effects::Effects;
pub use pointers::PointerSet;
pub use string::StringDomain;
pub use value::ConstantValue;
