use rand::prelude::SmallRng;
use rand::SeedableRng;
use saplace::config::SAConfig;
use saplace::optimizer::SAOptimizer;
use symplace::io::parse_instance;
use symplace::util::assertions;

const INSTANCE: &str = "\
# differential stage around a vertical axis, bias stage around a
# horizontal one, three free modules
Module in1  16 24
Module in2  16 24
Module tail 20 12
Module b1   12 10
Module b2   12 10
Module r1   30 8
Module r2   18 18
Module c1   6 40

SymGroup diff vertical
SymPair in1 in2
SelfSym tail

SymGroup bias horizontal
SymPair b1 b2
";

fn quick_config() -> SAConfig {
    SAConfig {
        initial_temperature: 1000.0,
        final_temperature: 250.0,
        iterations_per_temperature: 30,
        no_improvement_limit: 400,
        ..SAConfig::default()
    }
}

#[test]
fn end_to_end_placement_run() {
    let instance = parse_instance(INSTANCE).unwrap();
    let mut optimizer =
        SAOptimizer::new(&instance, quick_config(), SmallRng::seed_from_u64(42)).unwrap();
    optimizer.solve().unwrap();

    let tree = optimizer.tree();
    assert!(tree.is_packed());
    assert!(tree.symmetry_islands_feasible());
    assert!(tree.area() >= instance.module_area());
    assert!(assertions::placement_in_first_quadrant(tree));
    assert!(assertions::no_module_overlap(tree));
    assert!(assertions::symmetry_groups_satisfied(tree));
    assert!(assertions::total_area_matches(tree));

    let placement = symplace::io::format_placement(tree);
    assert!(placement.starts_with(&format!("Area {}", tree.area())));
    assert_eq!(placement.lines().count(), 1 + tree.n_modules());
}

#[test]
fn wirelength_blend_accepts_full_range() {
    let instance = parse_instance(INSTANCE).unwrap();
    for area_ratio in [0.0, 0.5, 1.0] {
        let config = quick_config().with_area_ratio(area_ratio);
        let mut optimizer =
            SAOptimizer::new(&instance, config, SmallRng::seed_from_u64(1)).unwrap();
        optimizer.solve().unwrap();
        assert!(assertions::no_module_overlap(optimizer.tree()));
        assert!(assertions::symmetry_groups_satisfied(optimizer.tree()));
    }
}

#[test]
fn annealing_does_not_regress_the_best_solution() {
    let instance = parse_instance(INSTANCE).unwrap();

    // the initial packed area of the deterministic starting tree
    let mut initial = instance.build_tree().unwrap();
    initial.pack().unwrap();
    let initial_area = initial.area();

    let mut optimizer =
        SAOptimizer::new(&instance, quick_config(), SmallRng::seed_from_u64(42)).unwrap();
    optimizer.solve().unwrap();
    // pure-area cost: the kept best can never be worse than the start
    assert!(optimizer.tree().area() <= initial_area);
}
