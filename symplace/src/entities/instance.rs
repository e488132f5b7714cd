use crate::entities::{Module, SymmetryGroup};
use crate::error::PlaceError;
use crate::tree::HbTree;

/// A parsed placement problem: the modules to place and the symmetry
/// groups constraining them.
#[derive(Clone, Debug)]
pub struct Instance {
    pub modules: Vec<Module>,
    pub symmetry_groups: Vec<SymmetryGroup>,
}

impl Instance {
    pub fn new(modules: Vec<Module>, symmetry_groups: Vec<SymmetryGroup>) -> Self {
        Instance {
            modules,
            symmetry_groups,
        }
    }

    pub fn n_modules(&self) -> usize {
        self.modules.len()
    }

    /// Total module area, a lower bound on any packed bounding box.
    pub fn module_area(&self) -> i64 {
        self.modules.iter().map(Module::area).sum()
    }

    /// Builds an [`HbTree`] over this instance with its initial left-skewed topology.
    pub fn build_tree(&self) -> Result<HbTree, PlaceError> {
        let mut tree = HbTree::new();
        for module in &self.modules {
            tree.add_module(module.clone());
        }
        for group in &self.symmetry_groups {
            tree.add_symmetry_group(group.clone());
        }
        tree.construct_initial_tree()?;
        Ok(tree)
    }
}
