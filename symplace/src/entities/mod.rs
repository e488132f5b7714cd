mod instance;
mod module;
mod symmetry;

pub use instance::Instance;
pub use module::{Module, ModuleKey};
pub use symmetry::{SymAxis, SymmetryGroup};
