/// Errors surfaced by tree operations.
///
/// Perturbations fail without modifying the tree; callers are expected to
/// treat any error as "reject this perturbation" and continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaceError {
    /// The named module is not registered in the tree.
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    /// The named node is not present in the tree.
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    /// The named symmetry group is not registered in the tree.
    #[error("unknown symmetry group '{0}'")]
    UnknownGroup(String),

    /// A symmetry group's ASF-B*-tree no longer satisfies its structural
    /// feasibility constraints. The tree is not auto-repaired.
    #[error("symmetry group '{0}' is no longer symmetric-feasible")]
    InfeasibleSymmetry(String),

    /// `pack()` was called on a tree without a root.
    #[error("cannot pack an empty tree")]
    EmptyTree,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            format!("{}", PlaceError::UnknownModule("m3".into())),
            "unknown module 'm3'"
        );
        assert_eq!(format!("{}", PlaceError::EmptyTree), "cannot pack an empty tree");
    }
}
