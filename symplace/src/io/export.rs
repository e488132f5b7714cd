use crate::tree::HbTree;
use anyhow::{Context, Result};
use itertools::Itertools;
use std::fs;
use std::path::Path;

/// Renders the packed placement: the total bounding-box area followed by
/// one `<name> <x> <y> <width> <height>` line per module, sorted by name.
pub fn format_placement(tree: &HbTree) -> String {
    let mut out = format!("Area {}\n", tree.area());
    for m in tree.modules().sorted_by_key(|m| m.name.clone()) {
        out.push_str(&format!(
            "{} {} {} {} {}\n",
            m.name,
            m.x,
            m.y,
            m.width(),
            m.height()
        ));
    }
    out
}

/// Writes the packed placement to `path`. See [`format_placement`].
pub fn write_placement(path: &Path, tree: &HbTree) -> Result<()> {
    fs::write(path, format_placement(tree))
        .with_context(|| format!("could not write placement to {path:?}"))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{Instance, Module};

    #[test]
    fn placement_lists_area_and_sorted_modules() {
        let instance = Instance::new(
            vec![
                Module::try_new("beta", 10, 10).unwrap(),
                Module::try_new("alpha", 20, 10).unwrap(),
            ],
            vec![],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let text = format_placement(&tree);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("Area {}", tree.area()));
        assert!(lines[1].starts_with("alpha "));
        assert!(lines[2].starts_with("beta "));
    }
}
