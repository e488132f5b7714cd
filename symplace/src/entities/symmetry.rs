use anyhow::{ensure, Result};
use std::collections::HashSet;

/// Orientation of a symmetry axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymAxis {
    /// Paired modules mirror in x; self-symmetric centers share an x-coordinate.
    Vertical,
    /// Paired modules mirror in y; self-symmetric centers share a y-coordinate.
    Horizontal,
}

impl SymAxis {
    pub fn flipped(self) -> Self {
        match self {
            SymAxis::Vertical => SymAxis::Horizontal,
            SymAxis::Horizontal => SymAxis::Vertical,
        }
    }
}

/// Declarative description of one symmetry group: mirror pairs plus
/// self-symmetric modules sharing a common axis.
///
/// The axis *position* is determined by packing and is not stored here.
#[derive(Clone, Debug)]
pub struct SymmetryGroup {
    pub name: String,
    pairs: Vec<(String, String)>,
    self_symmetric: Vec<String>,
    pub axis: SymAxis,
}

impl SymmetryGroup {
    /// Creates a group, enforcing that every module appears at most once
    /// across all pairs and self-symmetric entries.
    pub fn try_new(
        name: impl Into<String>,
        axis: SymAxis,
        pairs: Vec<(String, String)>,
        self_symmetric: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for (a, b) in &pairs {
            ensure!(a != b, "symmetry pair in group '{name}' repeats module '{a}'");
            ensure!(
                seen.insert(a.as_str()) && seen.insert(b.as_str()),
                "module appears more than once in symmetry group '{name}'"
            );
        }
        for m in &self_symmetric {
            ensure!(
                seen.insert(m.as_str()),
                "module '{m}' appears more than once in symmetry group '{name}'"
            );
        }
        ensure!(
            !seen.is_empty(),
            "symmetry group '{name}' has no members"
        );
        Ok(SymmetryGroup {
            name,
            pairs,
            self_symmetric,
            axis,
        })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn self_symmetric(&self) -> &[String] {
        &self.self_symmetric
    }

    /// All member module names, pairs first.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.pairs
            .iter()
            .flat_map(|(a, b)| [a.as_str(), b.as_str()])
            .chain(self.self_symmetric.iter().map(String::as_str))
    }

    pub fn contains(&self, module: &str) -> bool {
        self.members().any(|m| m == module)
    }

    /// Index of the pair containing `module`, if any.
    pub fn pair_index_of(&self, module: &str) -> Option<usize> {
        self.pairs
            .iter()
            .position(|(a, b)| a == module || b == module)
    }

    pub fn is_self_symmetric(&self, module: &str) -> bool {
        self.self_symmetric.iter().any(|m| m == module)
    }
}
