use crate::entities::ModuleKey;
use crate::tree::AsfBStarTree;
use slotmap::new_key_type;

new_key_type! {
    /// Key to an [`HbNode`] in the tree's node arena.
    pub struct NodeKey;
}

/// One horizontal segment of a symmetry island's top skyline, carried by a
/// contour node. `(x1, y1)` is the left endpoint and `(x2, y2)` the right
/// endpoint of a flat top, so `y1 == y2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContourSpan {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

/// Kind-specific payload of an [`HbNode`].
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// Placeholder for an externally registered module.
    Module(ModuleKey),
    /// A packed symmetry island, represented by its ASF-B*-tree.
    Hierarchy(AsfBStarTree),
    /// One segment of an island's top skyline. Contour nodes are generated
    /// from the most recent pack and are destroyed and rebuilt between packs.
    Contour(ContourSpan),
}

/// Node of the hierarchical B*-tree.
///
/// The left child is placed immediately to the right of its parent, the
/// right child on top of it. Parent links are non-owning arena keys,
/// maintained by the owning [`crate::tree::HbTree`].
#[derive(Clone, Debug)]
pub struct HbNode {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeKey>,
    pub left: Option<NodeKey>,
    pub right: Option<NodeKey>,
}

impl HbNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        HbNode {
            name: name.into(),
            kind,
            parent: None,
            left: None,
            right: None,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self.kind, NodeKind::Module(_))
    }

    pub fn is_hierarchy(&self) -> bool {
        matches!(self.kind, NodeKind::Hierarchy(_))
    }

    pub fn is_contour(&self) -> bool {
        matches!(self.kind, NodeKind::Contour(_))
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn module_key(&self) -> Option<ModuleKey> {
        match self.kind {
            NodeKind::Module(key) => Some(key),
            _ => None,
        }
    }

    pub fn asf(&self) -> Option<&AsfBStarTree> {
        match &self.kind {
            NodeKind::Hierarchy(asf) => Some(asf),
            _ => None,
        }
    }

    pub fn asf_mut(&mut self) -> Option<&mut AsfBStarTree> {
        match &mut self.kind {
            NodeKind::Hierarchy(asf) => Some(asf),
            _ => None,
        }
    }

    /// The contour segment carried by this node; all zeroes for other kinds.
    pub fn contour_span(&self) -> ContourSpan {
        match self.kind {
            NodeKind::Contour(span) => span,
            _ => ContourSpan::default(),
        }
    }
}
