use crate::entities::{Module, ModuleKey, SymAxis, SymmetryGroup};
use crate::error::PlaceError;
use crate::geometry::Contour;
use itertools::Itertools;
use slotmap::{new_key_type, SlotMap};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

new_key_type! {
    struct AsfNodeKey;
}

#[derive(Clone, Debug)]
struct AsfNode {
    module: ModuleKey,
    parent: Option<AsfNodeKey>,
    left: Option<AsfNodeKey>,
    right: Option<AsfNodeKey>,
}

/// Automatically Symmetric-Feasible B*-tree for one symmetry group.
///
/// The tree spans the group's *representatives*: one member per symmetry
/// pair plus every self-symmetric module. Packing places the
/// representatives in a local frame whose origin is the symmetry axis and
/// derives the mirror partners by reflection, so any structurally feasible
/// tree packs to a symmetric island.
///
/// For a vertical axis the local frame is the island's right half:
/// self-symmetric modules occupy half their width on the right-child chain
/// from the root (left edge on the axis) and everything else packs at
/// `x >= 0`. Horizontal-axis groups transpose this, with the self-symmetric
/// chain on the left-child boundary.
#[derive(Clone, Debug)]
pub struct AsfBStarTree {
    group: SymmetryGroup,
    nodes: SlotMap<AsfNodeKey, AsfNode>,
    root: Option<AsfNodeKey>,
    /// Per pair: whether the first-listed member currently acts as representative.
    rep_is_first: Vec<bool>,
    /// Node carrying pair `i`'s representative.
    pair_nodes: Vec<AsfNodeKey>,
    /// Nodes of the self-symmetric modules, in group order.
    self_nodes: Vec<AsfNodeKey>,
    members: HashMap<String, ModuleKey>,
    self_keys: HashSet<ModuleKey>,
    axis_position: f64,
}

impl AsfBStarTree {
    /// Resolves the group's members against the tree's module registry.
    pub fn new(
        group: SymmetryGroup,
        module_index: &HashMap<String, ModuleKey>,
    ) -> Result<Self, PlaceError> {
        let mut members = HashMap::new();
        for name in group.members() {
            let &key = module_index
                .get(name)
                .ok_or_else(|| PlaceError::UnknownModule(name.to_string()))?;
            members.insert(name.to_string(), key);
        }
        let self_keys = group
            .self_symmetric()
            .iter()
            .map(|name| members[name])
            .collect();
        let rep_is_first = vec![true; group.pairs().len()];
        Ok(AsfBStarTree {
            group,
            nodes: SlotMap::with_key(),
            root: None,
            rep_is_first,
            pair_nodes: Vec::new(),
            self_nodes: Vec::new(),
            members,
            self_keys,
            axis_position: 0.0,
        })
    }

    pub fn group(&self) -> &SymmetryGroup {
        &self.group
    }

    pub fn axis(&self) -> SymAxis {
        self.group.axis
    }

    /// Absolute position of the symmetry axis, valid after the island has
    /// been packed and translated into the enclosing frame.
    pub fn axis_position(&self) -> f64 {
        self.axis_position
    }

    /// Keys of every module in the group, pair partners included.
    pub fn member_keys(&self) -> impl Iterator<Item = ModuleKey> + '_ {
        self.members.values().copied()
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Builds the canonical initial topology: self-symmetric modules chained
    /// along the axis boundary, pair representatives in an area-descending
    /// skewed chain off the root.
    pub fn construct_initial_tree(&mut self, modules: &SlotMap<ModuleKey, Module>) {
        self.nodes.clear();
        self.root = None;
        self.pair_nodes.clear();
        self.self_nodes.clear();

        let self_keys = self
            .group
            .self_symmetric()
            .iter()
            .map(|name| self.members[name])
            .collect_vec();

        let rep_keys = (0..self.group.pairs().len())
            .sorted_by_cached_key(|&i| {
                let m = &modules[self.rep_key(i)];
                (Reverse(m.area()), m.name.clone())
            })
            .collect_vec();

        // self-symmetric boundary chain
        let mut prev: Option<AsfNodeKey> = None;
        let mut self_nodes = vec![AsfNodeKey::default(); self_keys.len()];
        for (i, &key) in self_keys.iter().enumerate() {
            let node = self.insert_node(key);
            match prev {
                None => self.root = Some(node),
                Some(p) => match self.group.axis {
                    SymAxis::Vertical => self.link_right(p, node),
                    SymAxis::Horizontal => self.link_left(p, node),
                },
            }
            self_nodes[i] = node;
            prev = Some(node);
        }
        // restore group order for the bookkeeping vector
        self.self_nodes = self_nodes;

        // representative chain off the root, on the non-boundary side
        let mut prev = self.root;
        let mut pair_nodes = vec![AsfNodeKey::default(); self.group.pairs().len()];
        for &pair_idx in &rep_keys {
            let node = self.insert_node(self.rep_key(pair_idx));
            match prev {
                None => self.root = Some(node),
                Some(p) => match self.group.axis {
                    SymAxis::Vertical => self.link_left(p, node),
                    SymAxis::Horizontal => self.link_right(p, node),
                },
            }
            pair_nodes[pair_idx] = node;
            prev = Some(node);
        }
        self.pair_nodes = pair_nodes;

        debug_assert!(self.is_symmetric_feasible());
    }

    /// Packs the island in its local frame: the axis sits at coordinate 0,
    /// representatives at non-negative coordinates, mirror partners
    /// reflected to the negative side. Module positions are written into
    /// the registry; the caller translates them into the enclosing frame.
    pub fn pack(&mut self, modules: &mut SlotMap<ModuleKey, Module>) -> Result<(), PlaceError> {
        let root = self.root.ok_or(PlaceError::EmptyTree)?;
        debug_assert!(self.is_symmetric_feasible());

        let mut contour = Contour::new();
        contour.add_segment(0, i64::MAX, 0);

        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let node = &self.nodes[key];
            let mkey = node.module;
            let (ew, eh) = self.effective_dims(&modules[mkey]);
            let x = match node.parent {
                None => 0,
                Some(p) => {
                    let pnode = &self.nodes[p];
                    let pm = &modules[pnode.module];
                    if pnode.left == Some(key) {
                        pm.x + self.effective_dims(pm).0
                    } else {
                        pm.x
                    }
                }
            };
            let y = contour.get_height(x, x + ew);
            modules[mkey].set_position(x, y);
            contour.add_segment(x, x + ew, y + eh);

            let node = &self.nodes[key];
            if let Some(r) = node.right {
                stack.push(r);
            }
            if let Some(l) = node.left {
                stack.push(l);
            }
        }

        // derive the mirror half
        for i in 0..self.group.pairs().len() {
            let rep = self.rep_key(i);
            let partner = self.partner_key(i);
            let (rx, ry) = (modules[rep].x, modules[rep].y);
            let (rw, rh) = (modules[rep].width(), modules[rep].height());
            match self.group.axis {
                SymAxis::Vertical => modules[partner].set_position(-(rx + rw), ry),
                SymAxis::Horizontal => modules[partner].set_position(rx, -(ry + rh)),
            }
            debug_assert_eq!(modules[partner].width(), rw);
            debug_assert_eq!(modules[partner].height(), rh);
        }
        // self-symmetric modules straddle the axis
        for &node in &self.self_nodes {
            let mkey = self.nodes[node].module;
            let m = &mut modules[mkey];
            match self.group.axis {
                SymAxis::Vertical => m.x = -(m.width() / 2),
                SymAxis::Horizontal => m.y = -(m.height() / 2),
            }
        }

        self.axis_position = 0.0;
        Ok(())
    }

    /// Shifts the packed island (modules and axis) by `(dx, dy)`.
    pub fn translate(&mut self, modules: &mut SlotMap<ModuleKey, Module>, dx: i64, dy: i64) {
        for key in self.members.values() {
            let m = &mut modules[*key];
            m.x += dx;
            m.y += dy;
        }
        self.axis_position += match self.group.axis {
            SymAxis::Vertical => dx as f64,
            SymAxis::Horizontal => dy as f64,
        };
    }

    /// The island's skylines at the modules' current positions:
    /// maximum y over x-intervals, and maximum x over y-intervals.
    pub fn get_contours(&self, modules: &SlotMap<ModuleKey, Module>) -> (Contour, Contour) {
        let mut horizontal = Contour::new();
        let mut vertical = Contour::new();
        for key in self.members.values() {
            let m = &modules[*key];
            horizontal.raise(m.x, m.x_max(), m.y_max());
            vertical.raise(m.y, m.y_max(), m.x_max());
        }
        (horizontal, vertical)
    }

    /// Rotates both members of a pair in lock-step, or a self-symmetric
    /// module on its own.
    pub fn rotate_module(
        &mut self,
        name: &str,
        modules: &mut SlotMap<ModuleKey, Module>,
    ) -> Result<(), PlaceError> {
        if let Some(i) = self.group.pair_index_of(name) {
            modules[self.rep_key(i)].rotate();
            modules[self.partner_key(i)].rotate();
            Ok(())
        } else if self.group.is_self_symmetric(name) {
            modules[self.members[name]].rotate();
            Ok(())
        } else {
            Err(PlaceError::UnknownModule(name.to_string()))
        }
    }

    /// Within the pair containing `name`, exchanges which member is the
    /// representative.
    pub fn change_representative(&mut self, name: &str) -> Result<(), PlaceError> {
        let i = self
            .group
            .pair_index_of(name)
            .ok_or_else(|| PlaceError::UnknownModule(name.to_string()))?;
        self.rep_is_first[i] = !self.rep_is_first[i];
        self.nodes[self.pair_nodes[i]].module = self.rep_key(i);
        if !self.is_symmetric_feasible() {
            return Err(PlaceError::InfeasibleSymmetry(self.group.name.clone()));
        }
        Ok(())
    }

    /// Toggles between vertical- and horizontal-axis symmetry and rebuilds
    /// the canonical topology under the new boundary constraints.
    pub fn convert_symmetry_type(
        &mut self,
        modules: &SlotMap<ModuleKey, Module>,
    ) -> Result<(), PlaceError> {
        self.group.axis = self.group.axis.flipped();
        self.construct_initial_tree(modules);
        if !self.is_symmetric_feasible() {
            return Err(PlaceError::InfeasibleSymmetry(self.group.name.clone()));
        }
        Ok(())
    }

    /// Structural feasibility: every self-symmetric module must lie on the
    /// boundary chain from the root (right-child chain for a vertical axis,
    /// left-child chain for a horizontal one), which packs flush against
    /// the axis.
    pub fn is_symmetric_feasible(&self) -> bool {
        if self.self_nodes.is_empty() {
            return self.root.is_some() || self.group.pairs().is_empty();
        }
        let mut chain = HashSet::new();
        let mut cursor = self.root;
        while let Some(key) = cursor {
            chain.insert(key);
            cursor = match self.group.axis {
                SymAxis::Vertical => self.nodes[key].right,
                SymAxis::Horizontal => self.nodes[key].left,
            };
        }
        self.self_nodes.iter().all(|n| chain.contains(n))
    }

    /// Dimensions a node occupies in the local half-frame: self-symmetric
    /// modules contribute only the half that lies on the packed side of
    /// the axis.
    fn effective_dims(&self, module: &Module) -> (i64, i64) {
        let (w, h) = (module.width(), module.height());
        if self.is_self_key(module) {
            match self.group.axis {
                SymAxis::Vertical => ((w + 1) / 2, h),
                SymAxis::Horizontal => (w, (h + 1) / 2),
            }
        } else {
            (w, h)
        }
    }

    fn is_self_key(&self, module: &Module) -> bool {
        self.members
            .get(&module.name)
            .is_some_and(|key| self.self_keys.contains(key))
    }

    fn rep_key(&self, pair_idx: usize) -> ModuleKey {
        let (a, b) = &self.group.pairs()[pair_idx];
        let name = if self.rep_is_first[pair_idx] { a } else { b };
        self.members[name]
    }

    fn partner_key(&self, pair_idx: usize) -> ModuleKey {
        let (a, b) = &self.group.pairs()[pair_idx];
        let name = if self.rep_is_first[pair_idx] { b } else { a };
        self.members[name]
    }

    fn insert_node(&mut self, module: ModuleKey) -> AsfNodeKey {
        self.nodes.insert(AsfNode {
            module,
            parent: None,
            left: None,
            right: None,
        })
    }

    fn link_left(&mut self, parent: AsfNodeKey, child: AsfNodeKey) {
        self.nodes[parent].left = Some(child);
        self.nodes[child].parent = Some(parent);
    }

    fn link_right(&mut self, parent: AsfNodeKey, child: AsfNodeKey) {
        self.nodes[parent].right = Some(child);
        self.nodes[child].parent = Some(parent);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::SymmetryGroup;

    fn registry(
        specs: &[(&str, i64, i64)],
    ) -> (SlotMap<ModuleKey, Module>, HashMap<String, ModuleKey>) {
        let mut modules = SlotMap::with_key();
        let mut index = HashMap::new();
        for &(name, w, h) in specs {
            let key = modules.insert(Module::try_new(name, w, h).unwrap());
            index.insert(name.to_string(), key);
        }
        (modules, index)
    }

    fn vertical_pair_group() -> SymmetryGroup {
        SymmetryGroup::try_new(
            "sg0",
            SymAxis::Vertical,
            vec![("a".into(), "b".into())],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn packs_single_pair_mirror_symmetric() {
        let (mut modules, index) = registry(&[("a", 20, 10), ("b", 20, 10)]);
        let mut asf = AsfBStarTree::new(vertical_pair_group(), &index).unwrap();
        asf.construct_initial_tree(&modules);
        asf.pack(&mut modules).unwrap();

        let a = &modules[index["a"]];
        let b = &modules[index["b"]];
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (-20, 0));
        assert_eq!(asf.axis_position(), 0.0);
        // centers mirror about the axis
        assert_eq!((a.x + a.x_max()) + (b.x + b.x_max()), 0);
    }

    #[test]
    fn self_symmetric_module_straddles_axis() {
        let group = SymmetryGroup::try_new("sg0", SymAxis::Vertical, vec![], vec!["s".into()])
            .unwrap();
        let (mut modules, index) = registry(&[("s", 30, 10)]);
        let mut asf = AsfBStarTree::new(group, &index).unwrap();
        asf.construct_initial_tree(&modules);
        asf.pack(&mut modules).unwrap();

        let s = &modules[index["s"]];
        assert_eq!((s.x, s.y), (-15, 0));
        assert_eq!(s.x + s.x_max(), 0); // center on the axis
    }

    #[test]
    fn pair_and_self_symmetric_island() {
        let group = SymmetryGroup::try_new(
            "sg0",
            SymAxis::Vertical,
            vec![("a".into(), "b".into())],
            vec!["s".into()],
        )
        .unwrap();
        let (mut modules, index) = registry(&[("a", 8, 6), ("b", 8, 6), ("s", 10, 10)]);
        let mut asf = AsfBStarTree::new(group, &index).unwrap();
        asf.construct_initial_tree(&modules);
        asf.pack(&mut modules).unwrap();

        let s = &modules[index["s"]];
        let a = &modules[index["a"]];
        let b = &modules[index["b"]];
        // the self-symmetric module occupies [-5, 5), the representative
        // packs to the right of its half-width
        assert_eq!((s.x, s.y), (-5, 0));
        assert_eq!((a.x, a.y), (5, 0));
        assert_eq!((b.x, b.y), (-13, 0));
    }

    #[test]
    fn horizontal_axis_mirrors_in_y() {
        let group = SymmetryGroup::try_new(
            "sg0",
            SymAxis::Horizontal,
            vec![("a".into(), "b".into())],
            vec![],
        )
        .unwrap();
        let (mut modules, index) = registry(&[("a", 10, 8), ("b", 10, 8)]);
        let mut asf = AsfBStarTree::new(group, &index).unwrap();
        asf.construct_initial_tree(&modules);
        asf.pack(&mut modules).unwrap();

        let a = &modules[index["a"]];
        let b = &modules[index["b"]];
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (0, -8));
        assert_eq!((a.y + a.y_max()) + (b.y + b.y_max()), 0);
    }

    #[test]
    fn rotates_pair_in_lock_step() {
        let (mut modules, index) = registry(&[("a", 20, 10), ("b", 20, 10)]);
        let mut asf = AsfBStarTree::new(vertical_pair_group(), &index).unwrap();
        asf.construct_initial_tree(&modules);
        asf.rotate_module("a", &mut modules).unwrap();
        assert_eq!(
            (modules[index["a"]].width(), modules[index["a"]].height()),
            (10, 20)
        );
        assert_eq!(
            (modules[index["b"]].width(), modules[index["b"]].height()),
            (10, 20)
        );
    }

    #[test]
    fn change_representative_swaps_packed_sides() {
        let (mut modules, index) = registry(&[("a", 20, 10), ("b", 20, 10)]);
        let mut asf = AsfBStarTree::new(vertical_pair_group(), &index).unwrap();
        asf.construct_initial_tree(&modules);
        asf.change_representative("a").unwrap();
        asf.pack(&mut modules).unwrap();

        // "b" is now the representative and packs on the positive side
        assert_eq!(modules[index["b"]].x, 0);
        assert_eq!(modules[index["a"]].x, -20);
    }

    #[test]
    fn convert_symmetry_type_toggles_axis_and_stays_feasible() {
        let group = SymmetryGroup::try_new(
            "sg0",
            SymAxis::Vertical,
            vec![("a".into(), "b".into())],
            vec!["s".into()],
        )
        .unwrap();
        let (mut modules, index) = registry(&[("a", 8, 6), ("b", 8, 6), ("s", 10, 10)]);
        let mut asf = AsfBStarTree::new(group, &index).unwrap();
        asf.construct_initial_tree(&modules);

        asf.convert_symmetry_type(&modules).unwrap();
        assert_eq!(asf.axis(), SymAxis::Horizontal);
        assert!(asf.is_symmetric_feasible());

        asf.pack(&mut modules).unwrap();
        let s = &modules[index["s"]];
        assert_eq!(s.y + s.y_max(), 0); // center on the horizontal axis
    }

    #[test]
    fn broken_boundary_chain_is_infeasible() {
        let group = SymmetryGroup::try_new(
            "sg0",
            SymAxis::Vertical,
            vec![("a".into(), "b".into())],
            vec!["s".into()],
        )
        .unwrap();
        let (modules, index) = registry(&[("a", 8, 6), ("b", 8, 6), ("s", 10, 10)]);
        let mut asf = AsfBStarTree::new(group, &index).unwrap();
        asf.construct_initial_tree(&modules);
        assert!(asf.is_symmetric_feasible());

        // rewire: representative as root, self-symmetric node hanging off
        // the left chain, away from the vertical boundary
        let self_node = asf.self_nodes[0];
        let rep_node = asf.pair_nodes[0];
        for node in [self_node, rep_node] {
            asf.nodes[node].parent = None;
            asf.nodes[node].left = None;
            asf.nodes[node].right = None;
        }
        asf.root = Some(rep_node);
        asf.link_left(rep_node, self_node);
        assert!(!asf.is_symmetric_feasible());
    }
}
