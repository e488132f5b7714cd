use crate::error::PlaceError;
use crate::tree::{ContourSpan, HbNode, HbTree, NodeKey, NodeKind};
use crate::util::assertions;
use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::VecDeque;

impl HbTree {
    /// Computes coordinates for every module.
    ///
    /// With pending modifications only the affected subtrees are repacked;
    /// otherwise the global contours are reset and the whole tree is packed
    /// from scratch. Either way the total area is recomputed and the
    /// contour nodes are regenerated to mirror each island's skyline.
    pub fn pack(&mut self) -> Result<(), PlaceError> {
        let root = self.root.ok_or(PlaceError::EmptyTree)?;
        if !self.modified.is_empty() {
            return self.repack_affected_subtrees();
        }
        self.reset_contours();
        self.pack_subtree(root)?;
        self.finish_pack();
        Ok(())
    }

    /// Repacks the maximal modified subtrees, deepest first so nested
    /// repacks are not overwritten by shallower ones.
    ///
    /// Marking walks to the root, so in practice the root is the unique
    /// maximal node; repacking it resets the global contours, making the
    /// incremental path coincide with a from-scratch pack.
    pub(crate) fn repack_affected_subtrees(&mut self) -> Result<(), PlaceError> {
        if self.modified.is_empty() {
            return Ok(());
        }
        let mut roots: Vec<NodeKey> = self
            .modified
            .iter()
            .copied()
            .filter(|&node| {
                let mut cursor = self.nodes[node].parent;
                loop {
                    match cursor {
                        Some(p) if self.modified.contains(&p) => break false,
                        Some(p) => cursor = self.nodes[p].parent,
                        None => break true,
                    }
                }
            })
            .collect();
        roots.sort_by_cached_key(|&node| Reverse(self.depth(node)));
        self.modified.clear();

        for node in roots {
            if self.root == Some(node) {
                self.reset_contours();
            }
            self.pack_subtree(node)?;
        }
        self.finish_pack();
        Ok(())
    }

    fn reset_contours(&mut self) {
        self.horizontal_contour.clear();
        self.horizontal_contour.add_segment(0, i64::MAX, 0);
        self.vertical_contour.clear();
        self.vertical_contour.add_segment(0, i64::MAX, 0);
    }

    /// Places every node of the subtree in depth-first, left-then-right
    /// order. Iterative to keep the stack flat on skewed chains.
    fn pack_subtree(&mut self, start: NodeKey) -> Result<(), PlaceError> {
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            self.place_node(key)?;
            let node = &self.nodes[key];
            if let Some(r) = node.right {
                stack.push(r);
            }
            if let Some(l) = node.left {
                stack.push(l);
            }
        }
        Ok(())
    }

    fn place_node(&mut self, key: NodeKey) -> Result<(), PlaceError> {
        if let Some(mkey) = self.nodes[key].module_key() {
            let (w, h) = (self.modules[mkey].width(), self.modules[mkey].height());
            let x = self.derive_x(key);
            let y = self.horizontal_contour.get_height(x, x + w);
            self.modules[mkey].set_position(x, y);
            self.horizontal_contour.add_segment(x, x + w, y + h);
            self.vertical_contour.add_segment(y, y + h, x + w);
            return Ok(());
        }
        if self.nodes[key].is_hierarchy() {
            // nested pack in the island's local frame
            {
                let Self {
                    nodes, modules, ..
                } = self;
                let asf = nodes[key].asf_mut().expect("hierarchy node owns an ASF tree");
                asf.pack(modules)?;
            }
            let (min_x, min_y, max_x, max_y) = self.island_bbox(key);
            let (w, h) = (max_x - min_x, max_y - min_y);
            let x = self.derive_x(key);
            let y = self.horizontal_contour.get_height(x, x + w);
            {
                let Self {
                    nodes, modules, ..
                } = self;
                let asf = nodes[key].asf_mut().expect("hierarchy node owns an ASF tree");
                asf.translate(modules, x - min_x, y - min_y);
            }
            self.horizontal_contour.add_segment(x, x + w, y + h);
            self.vertical_contour.add_segment(y, y + h, x + w);
            return Ok(());
        }
        // contour nodes carry no geometry of their own
        Ok(())
    }

    /// B*-tree x-rule, specialized by the parent's kind: left children sit
    /// to the right of their parent (for a hierarchy parent, to the right
    /// of its symmetry axis; for a contour parent, at the segment's right
    /// end), right children share the parent's left edge.
    fn derive_x(&self, key: NodeKey) -> i64 {
        let Some(p) = self.nodes[key].parent else {
            return 0;
        };
        let parent = &self.nodes[p];
        let as_left = parent.left == Some(key);
        match (&parent.kind, as_left) {
            (NodeKind::Module(pm), true) => self.modules[*pm].x_max(),
            (NodeKind::Module(pm), false) => self.modules[*pm].x,
            (NodeKind::Hierarchy(asf), true) => asf.axis_position() as i64,
            (NodeKind::Hierarchy(_), false) => 0,
            (NodeKind::Contour(span), true) => span.x2,
            (NodeKind::Contour(span), false) => span.x1,
        }
    }

    fn island_bbox(&self, key: NodeKey) -> (i64, i64, i64, i64) {
        let asf = self.nodes[key].asf().expect("hierarchy node owns an ASF tree");
        let (mut min_x, mut min_y) = (i64::MAX, i64::MAX);
        let (mut max_x, mut max_y) = (i64::MIN, i64::MIN);
        for mkey in asf.member_keys() {
            let m = &self.modules[mkey];
            min_x = min_x.min(m.x);
            min_y = min_y.min(m.y);
            max_x = max_x.max(m.x_max());
            max_y = max_y.max(m.y_max());
        }
        (min_x, min_y, max_x, max_y)
    }

    fn finish_pack(&mut self) {
        let (max_x, max_y) = self.extent();
        self.total_area = max_x * max_y;
        self.update_contour_nodes();
        self.is_packed = true;

        debug_assert!(assertions::placement_in_first_quadrant(self));
        debug_assert!(assertions::no_module_overlap(self));
        debug_assert!(assertions::symmetry_groups_satisfied(self));
        debug_assert!(assertions::total_area_matches(self));
    }

    /// Destroys every contour node and rebuilds, for each hierarchy node, a
    /// fresh left-linked chain of contour nodes off its right child
    /// mirroring the island's current top skyline. Subtrees that hung off
    /// destroyed contour nodes (or off a hierarchy node's right slot) are
    /// re-attached below the nearest contour node.
    fn update_contour_nodes(&mut self) {
        let Some(root) = self.root else {
            return;
        };

        // sweep the whole tree: stale contour nodes may have been displaced
        // anywhere by perturbations
        let mut old_contours = Vec::new();
        let mut danglers = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(key) = queue.pop_front() {
            let node = &self.nodes[key];
            let (left, right) = (node.left, node.right);
            if node.is_contour() {
                old_contours.push(key);
                for child in [left, right].into_iter().flatten() {
                    if !self.nodes[child].is_contour() {
                        danglers.push(child);
                    }
                    queue.push_back(child);
                }
            } else {
                if node.is_hierarchy() {
                    if let Some(rc) = right {
                        if !self.nodes[rc].is_contour() {
                            danglers.push(rc);
                        }
                    }
                }
                for child in [left, right].into_iter().flatten() {
                    queue.push_back(child);
                }
            }
        }

        for &d in &danglers {
            if let Some(p) = self.nodes[d].parent {
                if let Some(pnode) = self.nodes.get_mut(p) {
                    if pnode.left == Some(d) {
                        pnode.left = None;
                    } else if pnode.right == Some(d) {
                        pnode.right = None;
                    }
                }
            }
            self.nodes[d].parent = None;
        }
        for &c in &old_contours {
            if let Some(p) = self.nodes[c].parent {
                if let Some(pnode) = self.nodes.get_mut(p) {
                    if pnode.left == Some(c) {
                        pnode.left = None;
                    } else if pnode.right == Some(c) {
                        pnode.right = None;
                    }
                }
            }
            self.nodes.remove(c);
        }

        // fresh chain per island
        let group_names = self
            .symmetry_groups
            .iter()
            .map(|g| g.name.clone())
            .collect_vec();
        for gname in group_names {
            let Some(&hnode) = self.group_nodes.get(&gname) else {
                continue;
            };
            let segments = {
                let asf = self.nodes[hnode].asf().expect("hierarchy node owns an ASF tree");
                let (horizontal, _) = asf.get_contours(&self.modules);
                horizontal.segments().to_vec()
            };
            let mut prev: Option<NodeKey> = None;
            for (i, seg) in segments.iter().enumerate() {
                let span = ContourSpan {
                    x1: seg.start,
                    y1: seg.height,
                    x2: seg.end,
                    y2: seg.height,
                };
                let node = self
                    .nodes
                    .insert(HbNode::new(format!("{gname}_contour_{i}"), NodeKind::Contour(span)));
                match prev {
                    None => self.set_child(hnode, false, Some(node)),
                    Some(p) => self.set_child(p, true, Some(node)),
                }
                prev = Some(node);
            }
        }

        // re-attach danglers: directly as the nearest contour node's right
        // child when free, else at the leftmost descendant of that subtree
        for d in danglers {
            let Some(nearest) = self.find_nearest_contour_node(root) else {
                debug_assert!(false, "danglers can only exist below symmetry islands");
                continue;
            };
            match self.nodes[nearest].right {
                None => self.set_child(nearest, false, Some(d)),
                Some(occupied) => {
                    let leftmost = self.find_leftmost_skewed_child(occupied);
                    self.set_child(leftmost, true, Some(d));
                }
            }
        }
    }

    /// First contour node encountered in a breadth-first traversal from
    /// `from`.
    pub fn find_nearest_contour_node(&self, from: NodeKey) -> Option<NodeKey> {
        let mut queue = VecDeque::from([from]);
        while let Some(key) = queue.pop_front() {
            let node = &self.nodes[key];
            if node.is_contour() {
                return Some(key);
            }
            queue.extend(node.left);
            queue.extend(node.right);
        }
        None
    }

    /// Walks left links until a node without a left child is reached.
    pub fn find_leftmost_skewed_child(&self, from: NodeKey) -> NodeKey {
        let mut cursor = from;
        while let Some(l) = self.nodes[cursor].left {
            cursor = l;
        }
        cursor
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{Instance, Module, SymAxis, SymmetryGroup};
    use crate::util::assertions;

    fn module(name: &str, w: i64, h: i64) -> Module {
        Module::try_new(name, w, h).unwrap()
    }

    fn pair_group(name: &str, a: &str, b: &str, axis: SymAxis) -> SymmetryGroup {
        SymmetryGroup::try_new(name, axis, vec![(a.into(), b.into())], vec![]).unwrap()
    }

    fn coordinates(tree: &HbTree) -> Vec<(String, i64, i64, i64, i64)> {
        let mut coords: Vec<_> = tree
            .modules()
            .map(|m| (m.name.clone(), m.x, m.y, m.width(), m.height()))
            .collect();
        coords.sort();
        coords
    }

    fn assert_valid(tree: &HbTree) {
        assert!(assertions::placement_in_first_quadrant(tree));
        assert!(assertions::no_module_overlap(tree));
        assert!(assertions::symmetry_groups_satisfied(tree));
        assert!(assertions::total_area_matches(tree));
        assert!(assertions::contour_matches_placement(tree));
    }

    #[test]
    fn packs_two_free_modules_side_by_side() {
        let instance = Instance::new(vec![module("m1", 10, 10), module("m2", 10, 10)], vec![]);
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let m1 = tree.module("m1").unwrap();
        let m2 = tree.module("m2").unwrap();
        assert_eq!((m1.x, m1.y), (0, 0));
        assert_eq!((m2.x, m2.y), (10, 0));
        assert_eq!(tree.area(), 200);
        assert_valid(&tree);
    }

    #[test]
    fn packs_pair_island_with_abutting_free_module() {
        let instance = Instance::new(
            vec![module("a", 20, 10), module("b", 20, 10), module("c", 10, 10)],
            vec![pair_group("sg0", "a", "b", SymAxis::Vertical)],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let a = tree.module("a").unwrap();
        let b = tree.module("b").unwrap();
        let c = tree.module("c").unwrap();
        // the island spans [0, 40) with its axis at 20
        assert_eq!((a.x, a.y), (20, 0));
        assert_eq!((b.x, b.y), (0, 0));
        assert_eq!(tree.symmetry_axis("sg0"), Some(20.0));
        // the free module is a left child of the island: placed at the
        // axis, on top of the island's bounding box
        assert_eq!((c.x, c.y), (20, 10));
        assert_eq!(tree.area(), 40 * 20);
        assert_valid(&tree);
    }

    #[test]
    fn self_symmetric_module_is_centered_on_its_axis() {
        let instance = Instance::new(
            vec![module("s", 30, 10)],
            vec![SymmetryGroup::try_new(
                "sg0",
                SymAxis::Vertical,
                vec![],
                vec!["s".into()],
            )
            .unwrap()],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let s = tree.module("s").unwrap();
        let axis = tree.symmetry_axis("sg0").unwrap();
        assert_eq!((s.x, s.y), (0, 0));
        assert_eq!(axis, 15.0);
        assert_eq!(s.x as f64 + s.width() as f64 / 2.0, axis);
        assert_valid(&tree);
    }

    #[test]
    fn rotation_repacks_incrementally() {
        let instance = Instance::new(vec![module("m1", 10, 20), module("m2", 10, 10)], vec![]);
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        tree.rotate_module("m1").unwrap();
        let m1 = tree.module("m1").unwrap();
        assert_eq!((m1.width(), m1.height()), (20, 10));
        assert!(tree.is_packed());
        assert_valid(&tree);

        tree.rotate_module("m1").unwrap();
        let m1 = tree.module("m1").unwrap();
        assert_eq!((m1.width(), m1.height()), (10, 20));
        assert_valid(&tree);
    }

    #[test]
    fn converted_group_packs_symmetric_about_horizontal_axis() {
        let instance = Instance::new(
            vec![module("a", 20, 10), module("b", 20, 10), module("c", 10, 10)],
            vec![pair_group("sg0", "a", "b", SymAxis::Vertical)],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        tree.convert_symmetry_type("sg0").unwrap();
        assert_eq!(tree.symmetry_groups()[0].axis, SymAxis::Horizontal);

        tree.pack().unwrap();
        let a = tree.module("a").unwrap();
        let b = tree.module("b").unwrap();
        let axis = tree.symmetry_axis("sg0").unwrap();
        assert_eq!(a.x, b.x);
        assert_eq!(
            (a.y as f64 + a.height() as f64 / 2.0) + (b.y as f64 + b.height() as f64 / 2.0),
            2.0 * axis
        );
        assert_valid(&tree);
    }

    #[test]
    fn pack_is_idempotent() {
        let instance = Instance::new(
            vec![
                module("a", 8, 8),
                module("b", 8, 8),
                module("s", 12, 6),
                module("c", 10, 20),
                module("d", 14, 4),
            ],
            vec![SymmetryGroup::try_new(
                "sg0",
                SymAxis::Vertical,
                vec![("a".into(), "b".into())],
                vec!["s".into()],
            )
            .unwrap()],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();
        let first = coordinates(&tree);
        tree.pack().unwrap();
        assert_eq!(coordinates(&tree), first);
        assert_valid(&tree);
    }

    #[test]
    fn clone_packs_to_the_same_placement() {
        let instance = Instance::new(
            vec![module("a", 16, 8), module("b", 16, 8), module("c", 10, 20)],
            vec![pair_group("sg0", "a", "b", SymAxis::Vertical)],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let mut clone = tree.clone();
        clone.pack().unwrap();
        assert_eq!(clone.area(), tree.area());
        assert_eq!(coordinates(&clone), coordinates(&tree));
    }

    #[test]
    fn contour_nodes_mirror_island_skyline() {
        // island with a three-step skyline: pair (20x10 each) around a
        // tall, narrow self-symmetric module (10x30)
        let instance = Instance::new(
            vec![module("a", 20, 10), module("b", 20, 10), module("s", 10, 30)],
            vec![SymmetryGroup::try_new(
                "sg0",
                SymAxis::Vertical,
                vec![("a".into(), "b".into())],
                vec!["s".into()],
            )
            .unwrap()],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let hnode = tree.hierarchy_node("sg0").unwrap();
        let mut spans = Vec::new();
        let mut cursor = tree.node(hnode).right;
        while let Some(key) = cursor {
            let node = tree.node(key);
            assert!(node.is_contour());
            spans.push(node.contour_span());
            cursor = node.left;
        }
        assert_eq!(
            spans
                .iter()
                .map(|s| (s.x1, s.x2, s.y1))
                .collect::<Vec<_>>(),
            vec![(0, 20, 10), (20, 30, 30), (30, 50, 10)]
        );
        assert_valid(&tree);
    }

    #[test]
    fn subtree_moved_above_island_hangs_off_a_contour_node() {
        let instance = Instance::new(
            vec![module("a", 20, 10), module("b", 20, 10), module("c", 10, 10)],
            vec![pair_group("sg0", "a", "b", SymAxis::Vertical)],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        // parking c on the island's right slot displaces the contour chain;
        // the next regeneration re-attaches c below a fresh contour node
        tree.move_node("c", "sg0", false).unwrap();
        let c = tree.find_node("c").unwrap();
        let parent = tree.node(c).parent.unwrap();
        assert!(tree.node(parent).is_contour());
        assert_valid(&tree);
    }

    #[test]
    fn incremental_repack_matches_packing_from_scratch() {
        let build = || {
            Instance::new(
                vec![
                    module("p", 16, 8),
                    module("q", 16, 8),
                    module("c", 10, 20),
                    module("d", 12, 12),
                    module("e", 8, 4),
                ],
                vec![pair_group("sg0", "p", "q", SymAxis::Vertical)],
            )
            .build_tree()
            .unwrap()
        };
        let perturb = |tree: &mut HbTree| {
            tree.rotate_module("c").unwrap();
            tree.move_node("d", "sg0", false).unwrap();
            tree.swap_nodes("c", "e").unwrap();
            tree.rotate_module("p").unwrap();
            tree.change_representative("sg0", "p").unwrap();
        };

        // incremental: perturbations repack a packed tree as they happen
        let mut incremental = build();
        incremental.pack().unwrap();
        perturb(&mut incremental);

        // from scratch: same perturbations, then one full pack
        let mut scratch = build();
        perturb(&mut scratch);
        scratch.pack().unwrap();

        assert_eq!(coordinates(&incremental), coordinates(&scratch));
        assert_eq!(incremental.area(), scratch.area());
        assert_valid(&incremental);
    }

    #[test]
    fn packing_an_empty_tree_fails() {
        let mut tree = HbTree::new();
        assert_eq!(tree.pack(), Err(PlaceError::EmptyTree));
    }
}
