use svg::node::element::{Group, Line, Rectangle, Text, Title};
use svg::Document;
use symplace::entities::SymAxis;
use symplace::tree::HbTree;

const FREE_FILL: &str = "#C8C8C8";
const GROUP_FILLS: [&str; 6] = [
    "#FFC879", "#8FBF8F", "#8FAFD4", "#D49FD4", "#D4B88F", "#9FD4C8",
];

/// Renders the packed placement as an SVG document: one rectangle per
/// module (colored by symmetry group) and a dashed line per symmetry axis.
/// The y-axis is flipped so the origin sits at the bottom-left.
pub fn placement_to_svg(tree: &HbTree) -> Document {
    let (width, height) = tree.extent();
    let margin = (width.max(height) as f64 * 0.05).max(1.0);
    let flip = |y: f64| height as f64 - y;

    let stroke_width = (width.min(height) as f64 * 0.005).max(0.1);
    let font_size = (width.min(height) as f64 * 0.03).max(1.0);

    let group_of = |name: &str| {
        tree.symmetry_groups()
            .iter()
            .position(|g| g.contains(name))
    };

    let mut modules_group = Group::new().set("id", "modules");
    for m in tree.modules() {
        let fill = match group_of(&m.name) {
            Some(i) => GROUP_FILLS[i % GROUP_FILLS.len()],
            None => FREE_FILL,
        };
        let rect = Rectangle::new()
            .set("x", m.x)
            .set("y", flip(m.y_max() as f64))
            .set("width", m.width())
            .set("height", m.height())
            .set("fill", fill)
            .set("stroke", "black")
            .set("stroke-width", stroke_width)
            .add(Title::new(format!(
                "{}: ({}, {}) {}x{}",
                m.name,
                m.x,
                m.y,
                m.width(),
                m.height()
            )));
        let label = Text::new(&m.name)
            .set("x", m.x as f64 + m.width() as f64 / 2.0)
            .set("y", flip(m.y as f64 + m.height() as f64 / 2.0))
            .set("font-size", font_size)
            .set("font-family", "monospace")
            .set("text-anchor", "middle")
            .set("dominant-baseline", "middle");
        modules_group = modules_group.add(rect).add(label);
    }

    let mut axes_group = Group::new().set("id", "symmetry_axes");
    for group in tree.symmetry_groups() {
        let Some(axis) = tree.symmetry_axis(&group.name) else {
            continue;
        };
        let line = match group.axis {
            SymAxis::Vertical => Line::new()
                .set("x1", axis)
                .set("y1", flip(0.0))
                .set("x2", axis)
                .set("y2", flip(height as f64)),
            SymAxis::Horizontal => Line::new()
                .set("x1", 0)
                .set("y1", flip(axis))
                .set("x2", width)
                .set("y2", flip(axis)),
        };
        axes_group = axes_group.add(
            line.set("stroke", "black")
                .set("stroke-width", stroke_width)
                .set("stroke-dasharray", format!("{0} {0}", 2.0 * stroke_width)),
        );
    }

    Document::new()
        .set(
            "viewBox",
            format!(
                "{} {} {} {}",
                -margin,
                -margin,
                width as f64 + 2.0 * margin,
                height as f64 + 2.0 * margin
            ),
        )
        .add(modules_group)
        .add(axes_group)
}

#[cfg(test)]
mod test {
    use super::*;
    use symplace::entities::{Instance, Module, SymmetryGroup};

    #[test]
    fn renders_every_module_and_axis() {
        let instance = Instance::new(
            vec![
                Module::try_new("a", 16, 8).unwrap(),
                Module::try_new("b", 16, 8).unwrap(),
                Module::try_new("c", 10, 10).unwrap(),
            ],
            vec![SymmetryGroup::try_new(
                "sg0",
                SymAxis::Vertical,
                vec![("a".into(), "b".into())],
                vec![],
            )
            .unwrap()],
        );
        let mut tree = instance.build_tree().unwrap();
        tree.pack().unwrap();

        let rendered = placement_to_svg(&tree).to_string();
        assert_eq!(rendered.matches("<rect").count(), 3);
        assert_eq!(rendered.matches("<text").count(), 3);
        // one dashed axis line for the single vertical-axis group
        assert_eq!(rendered.matches("stroke-dasharray").count(), 1);
        assert!(rendered.contains("viewBox"));
    }
}
