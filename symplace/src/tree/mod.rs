mod asf;
mod hb_tree;
mod node;
mod pack;

pub use asf::AsfBStarTree;
pub use hb_tree::HbTree;
pub use node::{ContourSpan, HbNode, NodeKey, NodeKind};
