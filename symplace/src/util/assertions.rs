use crate::entities::Module;
use crate::tree::HbTree;
use itertools::Itertools;

//Various checks to verify the correctness of a packed placement.
//Used in debug_assert!() blocks and in tests.

/// Every module lies in the first quadrant.
pub fn placement_in_first_quadrant(tree: &HbTree) -> bool {
    tree.modules().all(|m| m.x >= 0 && m.y >= 0)
}

/// No two placed modules share any area.
pub fn no_module_overlap(tree: &HbTree) -> bool {
    let modules = tree.modules().collect_vec();
    for (i, a) in modules.iter().enumerate() {
        for b in &modules[i + 1..] {
            let x_overlap = a.x.max(b.x) < a.x_max().min(b.x_max());
            let y_overlap = a.y.max(b.y) < a.y_max().min(b.y_max());
            if x_overlap && y_overlap {
                log::error!(
                    "modules '{}' and '{}' overlap: ({},{})x{}x{} vs ({},{})x{}x{}",
                    a.name,
                    b.name,
                    a.x,
                    a.y,
                    a.width(),
                    a.height(),
                    b.x,
                    b.y,
                    b.width(),
                    b.height()
                );
                return false;
            }
        }
    }
    true
}

/// The stored total area equals the bounding box of all modules.
pub fn total_area_matches(tree: &HbTree) -> bool {
    let (max_x, max_y) = tree.extent();
    tree.area() == max_x * max_y
}

/// Every symmetry group is placed symmetric about its packed axis: paired
/// modules mirror each other with matching extents, self-symmetric modules
/// are centered on the axis (to within the integer grid for odd
/// dimensions).
pub fn symmetry_groups_satisfied(tree: &HbTree) -> bool {
    for group in tree.symmetry_groups() {
        let Some(axis) = tree.symmetry_axis(&group.name) else {
            return false;
        };
        let center = |m: &Module| match group.axis {
            crate::entities::SymAxis::Vertical => m.x as f64 + m.width() as f64 / 2.0,
            crate::entities::SymAxis::Horizontal => m.y as f64 + m.height() as f64 / 2.0,
        };
        for (a, b) in group.pairs() {
            let (Some(a), Some(b)) = (tree.module(a), tree.module(b)) else {
                return false;
            };
            let mirrored = (center(a) + center(b) - 2.0 * axis).abs() < 1e-6;
            let aligned = match group.axis {
                crate::entities::SymAxis::Vertical => a.y == b.y && a.height() == b.height(),
                crate::entities::SymAxis::Horizontal => a.x == b.x && a.width() == b.width(),
            };
            if !mirrored || !aligned {
                log::error!(
                    "pair ('{}', '{}') of group '{}' is not mirror-symmetric about {axis}",
                    a.name,
                    b.name,
                    group.name
                );
                return false;
            }
        }
        for name in group.self_symmetric() {
            let Some(m) = tree.module(name) else {
                return false;
            };
            if (center(m) - axis).abs() > 0.5 {
                log::error!(
                    "self-symmetric '{}' of group '{}' is off its axis at {axis}",
                    m.name,
                    group.name
                );
                return false;
            }
        }
    }
    true
}

/// The horizontal contour equals the top profile of the placement: free
/// modules contribute their own tops, symmetry islands their bounding box.
pub fn contour_matches_placement(tree: &HbTree) -> bool {
    let grouped: std::collections::HashSet<&str> = tree
        .symmetry_groups()
        .iter()
        .flat_map(|g| g.members())
        .collect();

    // rectangles the packer pushed into the contour
    let mut rects: Vec<(i64, i64, i64)> = tree
        .modules()
        .filter(|m| !grouped.contains(m.name.as_str()))
        .map(|m| (m.x, m.x_max(), m.y_max()))
        .collect();
    for group in tree.symmetry_groups() {
        let members = group.members().filter_map(|n| tree.module(n)).collect_vec();
        let min_x = members.iter().map(|m| m.x).min().unwrap_or(0);
        let max_x = members.iter().map(|m| m.x_max()).max().unwrap_or(0);
        let max_y = members.iter().map(|m| m.y_max()).max().unwrap_or(0);
        rects.push((min_x, max_x, max_y));
    }

    let samples = rects
        .iter()
        .flat_map(|&(x0, x1, _)| [x0, x1 - 1])
        .unique()
        .collect_vec();
    for x in samples {
        let expected = rects
            .iter()
            .filter(|&&(x0, x1, _)| x0 <= x && x < x1)
            .map(|&(_, _, top)| top)
            .max()
            .unwrap_or(0);
        if tree.horizontal_contour().get_height(x, x + 1) != expected {
            log::error!("contour mismatch at x={x}");
            return false;
        }
    }
    true
}
