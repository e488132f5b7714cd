use crate::entities::{Module, ModuleKey, SymmetryGroup};
use crate::error::PlaceError;
use crate::geometry::Contour;
use crate::tree::{AsfBStarTree, HbNode, NodeKey, NodeKind};
use itertools::Itertools;
use slotmap::SlotMap;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// Hierarchical B*-tree over a set of modules and symmetry groups.
///
/// Symmetry groups are wrapped in hierarchy nodes owning an
/// [`AsfBStarTree`]; free modules are module nodes placed among the
/// islands. Packing (see `pack.rs`) assigns coordinates and regenerates
/// the contour nodes that expose each island's top skyline to the rest of
/// the tree.
#[derive(Clone, Debug)]
pub struct HbTree {
    pub(crate) modules: SlotMap<ModuleKey, Module>,
    pub(crate) module_index: HashMap<String, ModuleKey>,
    pub(crate) symmetry_groups: Vec<SymmetryGroup>,
    pub(crate) nodes: SlotMap<NodeKey, HbNode>,
    pub(crate) root: Option<NodeKey>,
    pub(crate) horizontal_contour: Contour,
    pub(crate) vertical_contour: Contour,
    /// Module nodes of free (non-symmetry) modules, by module name.
    pub(crate) module_nodes: HashMap<String, NodeKey>,
    /// Hierarchy nodes by symmetry group name.
    pub(crate) group_nodes: HashMap<String, NodeKey>,
    /// Every module and hierarchy node currently in the tree, by name.
    /// Contour nodes are scaffolding and are never registered here.
    pub(crate) node_map: HashMap<String, NodeKey>,
    /// Nodes whose subtrees may be stale since the last pack.
    pub(crate) modified: HashSet<NodeKey>,
    pub(crate) total_area: i64,
    pub(crate) is_packed: bool,
}

impl Default for HbTree {
    fn default() -> Self {
        HbTree::new()
    }
}

impl HbTree {
    pub fn new() -> Self {
        HbTree {
            modules: SlotMap::with_key(),
            module_index: HashMap::new(),
            symmetry_groups: Vec::new(),
            nodes: SlotMap::with_key(),
            root: None,
            horizontal_contour: Contour::new(),
            vertical_contour: Contour::new(),
            module_nodes: HashMap::new(),
            group_nodes: HashMap::new(),
            node_map: HashMap::new(),
            modified: HashSet::new(),
            total_area: 0,
            is_packed: false,
        }
    }

    /// Registers a module; a module with the same name is replaced.
    pub fn add_module(&mut self, module: Module) {
        match self.module_index.get(&module.name) {
            Some(&key) => self.modules[key] = module,
            None => {
                let name = module.name.clone();
                let key = self.modules.insert(module);
                self.module_index.insert(name, key);
            }
        }
    }

    pub fn add_symmetry_group(&mut self, group: SymmetryGroup) {
        self.symmetry_groups.push(group);
    }

    /// Builds the initial left-skewed tree: hierarchy nodes in group
    /// insertion order, then free-module nodes in area-descending order,
    /// each the left child of its predecessor.
    pub fn construct_initial_tree(&mut self) -> Result<(), PlaceError> {
        self.clear_tree();

        let groups = self.symmetry_groups.clone();
        for group in &groups {
            let mut asf = AsfBStarTree::new(group.clone(), &self.module_index)?;
            asf.construct_initial_tree(&self.modules);
            let name = group.name.clone();
            let key = self
                .nodes
                .insert(HbNode::new(name.clone(), NodeKind::Hierarchy(asf)));
            self.group_nodes.insert(name.clone(), key);
            self.node_map.insert(name, key);
        }

        let grouped: HashSet<&str> = groups.iter().flat_map(|g| g.members()).collect();
        let free = self
            .module_index
            .iter()
            .filter(|(name, _)| !grouped.contains(name.as_str()))
            .map(|(name, &key)| (name.clone(), key))
            .sorted_by_cached_key(|(name, key)| (Reverse(self.modules[*key].area()), name.clone()))
            .collect_vec();

        let mut chain = groups
            .iter()
            .map(|g| self.group_nodes[&g.name])
            .collect_vec();
        for (name, key) in free {
            let node = self
                .nodes
                .insert(HbNode::new(name.clone(), NodeKind::Module(key)));
            self.module_nodes.insert(name.clone(), node);
            self.node_map.insert(name, node);
            chain.push(node);
        }

        self.root = chain.first().copied();
        for (&parent, &child) in chain.iter().tuple_windows() {
            self.set_child(parent, true, Some(child));
        }
        Ok(())
    }

    /// Destroys all nodes; modules and symmetry groups are retained.
    pub fn clear_tree(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.module_nodes.clear();
        self.group_nodes.clear();
        self.node_map.clear();
        self.modified.clear();
        self.is_packed = false;
    }

    pub fn find_node(&self, name: &str) -> Option<NodeKey> {
        self.node_map.get(name).copied()
    }

    pub fn node(&self, key: NodeKey) -> &HbNode {
        &self.nodes[key]
    }

    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    pub fn root_name(&self) -> Option<&str> {
        self.root.map(|key| self.nodes[key].name.as_str())
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.module_index.get(name).map(|&key| &self.modules[key])
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn n_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn symmetry_groups(&self) -> &[SymmetryGroup] {
        &self.symmetry_groups
    }

    /// Names of all module and hierarchy nodes currently in the tree.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.node_map.keys().map(String::as_str)
    }

    pub fn hierarchy_node(&self, group: &str) -> Option<NodeKey> {
        self.group_nodes.get(group).copied()
    }

    /// Absolute axis position of a packed symmetry group.
    pub fn symmetry_axis(&self, group: &str) -> Option<f64> {
        let key = self.hierarchy_node(group)?;
        self.nodes[key].asf().map(AsfBStarTree::axis_position)
    }

    /// True when every symmetry island still satisfies the structural
    /// feasibility constraints of its ASF-B*-tree.
    pub fn symmetry_islands_feasible(&self) -> bool {
        self.group_nodes.values().all(|&key| {
            self.nodes[key]
                .asf()
                .is_some_and(AsfBStarTree::is_symmetric_feasible)
        })
    }

    /// Area of the enclosing bounding box after the last pack.
    pub fn area(&self) -> i64 {
        self.total_area
    }

    pub fn is_packed(&self) -> bool {
        self.is_packed
    }

    pub fn horizontal_contour(&self) -> &Contour {
        &self.horizontal_contour
    }

    pub fn vertical_contour(&self) -> &Contour {
        &self.vertical_contour
    }

    /// Width and height of the packed placement.
    pub fn extent(&self) -> (i64, i64) {
        let mut max_x = 0;
        let mut max_y = 0;
        for m in self.modules.values() {
            max_x = max_x.max(m.x_max());
            max_y = max_y.max(m.y_max());
        }
        (max_x, max_y)
    }

    /// Whether the node named `ancestor` lies strictly above the node named
    /// `descendant`. False when either name is unknown.
    ///
    /// `move_node` performs no cycle check; callers use this to avoid
    /// requesting a move that would make a node its own ancestor.
    pub fn is_ancestor_of(&self, ancestor: &str, descendant: &str) -> bool {
        let (Some(a), Some(d)) = (self.find_node(ancestor), self.find_node(descendant)) else {
            return false;
        };
        let mut cursor = self.nodes[d].parent;
        while let Some(k) = cursor {
            if k == a {
                return true;
            }
            cursor = self.nodes[k].parent;
        }
        false
    }

    pub fn is_left_child(&self, key: NodeKey) -> bool {
        self.nodes[key]
            .parent
            .is_some_and(|p| self.nodes[p].left == Some(key))
    }

    pub fn is_right_child(&self, key: NodeKey) -> bool {
        self.nodes[key]
            .parent
            .is_some_and(|p| self.nodes[p].right == Some(key))
    }

    // ---- perturbations ------------------------------------------------

    /// Rotates a module. Symmetry-group members are delegated to their
    /// group's ASF-B*-tree so pairs rotate in lock-step.
    pub fn rotate_module(&mut self, name: &str) -> Result<(), PlaceError> {
        let &mkey = self
            .module_index
            .get(name)
            .ok_or_else(|| PlaceError::UnknownModule(name.to_string()))?;

        let owning_group = self
            .symmetry_groups
            .iter()
            .find(|g| g.contains(name))
            .map(|g| g.name.clone());

        let marked = match owning_group {
            Some(group) => {
                let &hnode = self
                    .group_nodes
                    .get(&group)
                    .ok_or(PlaceError::UnknownGroup(group))?;
                let Self {
                    nodes, modules, ..
                } = self;
                let asf = nodes[hnode].asf_mut().expect("hierarchy node owns an ASF tree");
                asf.rotate_module(name, modules)?;
                hnode
            }
            None => {
                self.modules[mkey].rotate();
                *self
                    .module_nodes
                    .get(name)
                    .ok_or_else(|| PlaceError::UnknownNode(name.to_string()))?
            }
        };

        self.mark_subtree_for_repack(marked);
        if self.is_packed {
            self.repack_affected_subtrees()?;
        }
        Ok(())
    }

    /// Detaches a node and re-attaches it as the left or right child of
    /// `new_parent`. A child already occupying the target slot is relocated
    /// into the moved node's free slot, or failing that to the end of the
    /// corresponding skewed chain.
    ///
    /// No cycle check is performed: callers must not move a node below its
    /// own subtree (see [`HbTree::is_ancestor_of`]).
    pub fn move_node(
        &mut self,
        node_name: &str,
        new_parent_name: &str,
        as_left_child: bool,
    ) -> Result<(), PlaceError> {
        let node = self
            .find_node(node_name)
            .ok_or_else(|| PlaceError::UnknownNode(node_name.to_string()))?;
        let new_parent = self
            .find_node(new_parent_name)
            .ok_or_else(|| PlaceError::UnknownNode(new_parent_name.to_string()))?;
        debug_assert_ne!(node, new_parent, "cannot move a node onto itself");

        // detach; removing the root promotes one of its children
        if let Some(old_parent) = self.nodes[node].parent {
            let slot = self.nodes[old_parent].left == Some(node);
            self.set_child(old_parent, slot, None);
            self.nodes[node].parent = None;
            self.mark_subtree_for_repack(old_parent);
        } else if self.root == Some(node) {
            let promoted = self.nodes[node].left.or(self.nodes[node].right);
            if let Some(p) = promoted {
                if self.nodes[node].left == Some(p) {
                    self.nodes[node].left = None;
                } else {
                    self.nodes[node].right = None;
                }
                self.nodes[p].parent = None;
            }
            self.root = promoted;
        }

        // relocate whatever occupies the target slot
        let occupant = if as_left_child {
            self.nodes[new_parent].left
        } else {
            self.nodes[new_parent].right
        };
        if let Some(existing) = occupant {
            if self.nodes[node].left.is_none() {
                self.set_child(node, true, Some(existing));
            } else if self.nodes[node].right.is_none() {
                self.set_child(node, false, Some(existing));
            } else {
                let mut cursor = if as_left_child {
                    self.nodes[node].left.unwrap()
                } else {
                    self.nodes[node].right.unwrap()
                };
                loop {
                    let next = if as_left_child {
                        self.nodes[cursor].left
                    } else {
                        self.nodes[cursor].right
                    };
                    match next {
                        Some(n) => cursor = n,
                        None => break,
                    }
                }
                self.set_child(cursor, as_left_child, Some(existing));
            }
            self.mark_subtree_for_repack(existing);
        }

        self.set_child(new_parent, as_left_child, Some(node));
        self.mark_subtree_for_repack(new_parent);
        self.mark_subtree_for_repack(node);
        if self.is_packed {
            self.repack_affected_subtrees()?;
        }
        Ok(())
    }

    /// Swaps two nodes. A direct parent-child pair exchanges roles in
    /// place; otherwise children and parents are exchanged wholesale. The
    /// root is reassigned when either node was the root.
    pub fn swap_nodes(&mut self, name_a: &str, name_b: &str) -> Result<(), PlaceError> {
        let a = self
            .find_node(name_a)
            .ok_or_else(|| PlaceError::UnknownNode(name_a.to_string()))?;
        let b = self
            .find_node(name_b)
            .ok_or_else(|| PlaceError::UnknownNode(name_b.to_string()))?;
        if a == b {
            return Ok(());
        }

        self.mark_subtree_for_repack(a);
        self.mark_subtree_for_repack(b);

        if self.nodes[a].left == Some(b) || self.nodes[a].right == Some(b) {
            self.swap_with_child(a, b);
        } else if self.nodes[b].left == Some(a) || self.nodes[b].right == Some(a) {
            self.swap_with_child(b, a);
        } else {
            self.swap_distinct(a, b);
        }

        if self.is_packed {
            self.repack_affected_subtrees()?;
        }
        Ok(())
    }

    /// Toggles a group's symmetry axis between vertical and horizontal.
    pub fn convert_symmetry_type(&mut self, group_name: &str) -> Result<(), PlaceError> {
        let &hnode = self
            .group_nodes
            .get(group_name)
            .ok_or_else(|| PlaceError::UnknownGroup(group_name.to_string()))?;
        {
            let Self {
                nodes, modules, ..
            } = self;
            let asf = nodes[hnode].asf_mut().expect("hierarchy node owns an ASF tree");
            asf.convert_symmetry_type(modules)?;
        }
        // keep the registry's copy of the group in sync
        if let Some(group) = self
            .symmetry_groups
            .iter_mut()
            .find(|g| g.name == group_name)
        {
            group.axis = group.axis.flipped();
        }

        self.mark_subtree_for_repack(hnode);
        if self.is_packed {
            self.repack_affected_subtrees()?;
        }
        Ok(())
    }

    /// Exchanges which member of `module_name`'s pair is the representative.
    pub fn change_representative(
        &mut self,
        group_name: &str,
        module_name: &str,
    ) -> Result<(), PlaceError> {
        let &hnode = self
            .group_nodes
            .get(group_name)
            .ok_or_else(|| PlaceError::UnknownGroup(group_name.to_string()))?;
        self.nodes[hnode]
            .asf_mut()
            .expect("hierarchy node owns an ASF tree")
            .change_representative(module_name)?;

        self.mark_subtree_for_repack(hnode);
        if self.is_packed {
            self.repack_affected_subtrees()?;
        }
        Ok(())
    }

    // ---- internals -----------------------------------------------------

    /// Marks `node` and all its ancestors as needing a repack.
    pub(crate) fn mark_subtree_for_repack(&mut self, node: NodeKey) {
        let mut cursor = Some(node);
        while let Some(key) = cursor {
            if !self.modified.insert(key) {
                break; // ancestors of an already-marked node are marked too
            }
            cursor = self.nodes[key].parent;
        }
    }

    /// Sets a child slot and maintains the child's parent back-link.
    /// Clearing a slot leaves the former child's parent link untouched.
    pub(crate) fn set_child(&mut self, parent: NodeKey, left: bool, child: Option<NodeKey>) {
        if left {
            self.nodes[parent].left = child;
        } else {
            self.nodes[parent].right = child;
        }
        if let Some(c) = child {
            self.nodes[c].parent = Some(parent);
        }
    }

    pub(crate) fn depth(&self, key: NodeKey) -> usize {
        let mut depth = 0;
        let mut cursor = self.nodes[key].parent;
        while let Some(k) = cursor {
            depth += 1;
            cursor = self.nodes[k].parent;
        }
        depth
    }

    /// Exchanges the roles of a node and one of its direct children:
    /// the child takes the parent's place (slot under the grandparent, or
    /// the root), the parent steps into the slot the child occupied, the
    /// parent's other child keeps its slot, and the parent inherits the
    /// child's children.
    fn swap_with_child(&mut self, parent: NodeKey, child: NodeKey) {
        let child_was_left = self.nodes[parent].left == Some(child);
        let sibling = if child_was_left {
            self.nodes[parent].right
        } else {
            self.nodes[parent].left
        };
        let (child_left, child_right) = (self.nodes[child].left, self.nodes[child].right);
        let grandparent = self.nodes[parent].parent;
        let parent_was_left = grandparent.map(|g| self.nodes[g].left == Some(parent));

        match grandparent {
            Some(g) => self.set_child(g, parent_was_left.unwrap(), Some(child)),
            None => {
                self.root = Some(child);
                self.nodes[child].parent = None;
            }
        }
        self.set_child(child, child_was_left, Some(parent));
        self.set_child(child, !child_was_left, sibling);
        self.set_child(parent, true, child_left);
        self.set_child(parent, false, child_right);
    }

    /// Straight swap of two unrelated nodes: children and parent slots are
    /// exchanged.
    fn swap_distinct(&mut self, a: NodeKey, b: NodeKey) {
        let parent_a = self.nodes[a].parent;
        let a_was_left = parent_a.map(|p| self.nodes[p].left == Some(a));
        let parent_b = self.nodes[b].parent;
        let b_was_left = parent_b.map(|p| self.nodes[p].left == Some(b));

        if let Some(p) = parent_a {
            self.set_child(p, a_was_left.unwrap(), None);
            self.nodes[a].parent = None;
        }
        if let Some(p) = parent_b {
            self.set_child(p, b_was_left.unwrap(), None);
            self.nodes[b].parent = None;
        }

        let (a_left, a_right) = (self.nodes[a].left, self.nodes[a].right);
        let (b_left, b_right) = (self.nodes[b].left, self.nodes[b].right);
        self.set_child(a, true, b_left);
        self.set_child(a, false, b_right);
        self.set_child(b, true, a_left);
        self.set_child(b, false, a_right);

        match parent_a {
            Some(p) => self.set_child(p, a_was_left.unwrap(), Some(b)),
            None => {
                self.root = Some(b);
                self.nodes[b].parent = None;
            }
        }
        match parent_b {
            Some(p) => self.set_child(p, b_was_left.unwrap(), Some(a)),
            None => {
                self.root = Some(a);
                self.nodes[a].parent = None;
            }
        }
    }
}
