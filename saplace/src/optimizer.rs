use crate::config::SAConfig;
use crate::timeout::TimeoutFlag;
use anyhow::Result;
use itertools::Itertools;
use log::{debug, info};
use rand::prelude::SmallRng;
use rand::Rng;
use std::time::Instant;
use symplace::entities::Instance;
use symplace::tree::HbTree;

/// How often a random perturbation target is re-drawn before the attempt
/// is abandoned.
const MAX_DRAWS: usize = 50;

/// Counters over one annealing run.
#[derive(Debug, Default, Clone, Copy)]
pub struct SAStats {
    pub iterations: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub no_improvement: usize,
}

/// Simulated-annealing search over HB*-tree perturbations.
///
/// Each iteration perturbs a clone of the current tree, evaluates the
/// blended area/wirelength cost, and accepts or rejects the candidate by
/// the Metropolis criterion. The best tree seen is checkpointed by
/// `clone()` and restored at the end of the run.
pub struct SAOptimizer {
    tree: HbTree,
    config: SAConfig,
    /// SmallRng is a fast, non-cryptographic PRNG, seeded for reproducible runs.
    rng: SmallRng,
    timeout: Option<TimeoutFlag>,
    stats: SAStats,
}

impl SAOptimizer {
    pub fn new(instance: &Instance, config: SAConfig, rng: SmallRng) -> Result<Self> {
        let tree = instance.build_tree()?;
        Ok(SAOptimizer {
            tree,
            config,
            rng,
            timeout: None,
            stats: SAStats::default(),
        })
    }

    /// Polls `flag` between iterations and temperature steps; on timeout
    /// the best solution found so far is kept.
    pub fn with_timeout(mut self, flag: TimeoutFlag) -> Self {
        self.timeout = Some(flag);
        self
    }

    pub fn tree(&self) -> &HbTree {
        &self.tree
    }

    pub fn config(&self) -> &SAConfig {
        &self.config
    }

    pub fn stats(&self) -> &SAStats {
        &self.stats
    }

    /// Runs the annealing schedule and leaves the best placement packed in
    /// the optimizer's tree.
    pub fn solve(&mut self) -> Result<()> {
        let start = Instant::now();
        self.tree.pack()?;
        info!("initial area: {}", self.tree.area());

        let probs = self.config.normalized_probabilities();
        let mut current = self.tree.clone();
        let mut current_cost = self.cost(&current);
        let mut best = current.clone();
        let mut best_cost = current_cost;
        let mut temperature = self.config.initial_temperature;
        let mut since_improvement = 0usize;

        'cooling: while temperature > self.config.final_temperature {
            for _ in 0..self.config.iterations_per_temperature {
                if self.timed_out() {
                    info!("timeout reached, stopping the search");
                    break 'cooling;
                }
                self.stats.iterations += 1;

                let mut candidate = current.clone();
                if !self.perturb(&mut candidate, probs) {
                    self.stats.rejected += 1;
                    continue;
                }
                if !candidate.is_packed() {
                    candidate.pack()?;
                }

                let cost = self.cost(&candidate);
                let delta = cost - current_cost;
                // Metropolis criterion
                if delta < 0.0 || self.rng.gen::<f64>() < (-delta / temperature).exp() {
                    current = candidate;
                    current_cost = cost;
                    self.stats.accepted += 1;
                    if cost < best_cost {
                        debug!("new best cost: {cost:.1}");
                        best = current.clone();
                        best_cost = cost;
                        since_improvement = 0;
                        continue;
                    }
                } else {
                    self.stats.rejected += 1;
                }

                since_improvement += 1;
                if since_improvement >= self.config.no_improvement_limit {
                    info!("no improvement in {since_improvement} iterations, stopping");
                    break 'cooling;
                }
            }
            temperature *= self.config.cooling_rate;
        }
        self.stats.no_improvement = since_improvement;

        self.tree = best;
        info!(
            "annealing finished in {}ms: area {}, {} iterations ({} accepted, {} rejected)",
            start.elapsed().as_millis(),
            self.tree.area(),
            self.stats.iterations,
            self.stats.accepted,
            self.stats.rejected,
        );
        Ok(())
    }

    fn timed_out(&self) -> bool {
        self.timeout
            .as_ref()
            .is_some_and(TimeoutFlag::has_timed_out)
    }

    fn cost(&self, tree: &HbTree) -> f64 {
        self.config.area_weight * tree.area() as f64
            + self.config.wirelength_weight * estimate_wirelength(tree)
    }

    /// Applies one randomly chosen perturbation. Returns false when no
    /// applicable target was found or the tree rejected the operation;
    /// the caller counts that as a rejected iteration.
    fn perturb(&mut self, tree: &mut HbTree, probs: [f64; 5]) -> bool {
        let roll: f64 = self.rng.gen();
        let mut threshold = 0.0;
        for (i, p) in probs.into_iter().enumerate() {
            threshold += p;
            if roll < threshold {
                return match i {
                    0 => self.random_rotate(tree),
                    1 => self.random_move(tree),
                    2 => self.random_swap(tree),
                    3 => self.random_change_rep(tree),
                    _ => self.random_convert_sym(tree),
                };
            }
        }
        self.random_convert_sym(tree)
    }

    fn random_rotate(&mut self, tree: &mut HbTree) -> bool {
        let names = tree.modules().map(|m| m.name.clone()).sorted().collect_vec();
        if names.is_empty() {
            return false;
        }
        let name = &names[self.rng.gen_range(0..names.len())];
        tree.rotate_module(name).is_ok()
    }

    fn random_move(&mut self, tree: &mut HbTree) -> bool {
        let names = tree.node_names().map(str::to_string).sorted().collect_vec();
        if names.len() < 2 {
            return false;
        }
        for _ in 0..MAX_DRAWS {
            let node = &names[self.rng.gen_range(0..names.len())];
            let parent = &names[self.rng.gen_range(0..names.len())];
            if node == parent {
                continue;
            }
            // moving the root would orphan its subtree, and moving a node
            // below itself would create a cycle; both are caller contracts
            if tree.root_name() == Some(node.as_str()) {
                continue;
            }
            if tree.is_ancestor_of(node, parent) {
                continue;
            }
            let as_left = self.rng.gen();
            return tree.move_node(node, parent, as_left).is_ok();
        }
        false
    }

    fn random_swap(&mut self, tree: &mut HbTree) -> bool {
        let names = tree.node_names().map(str::to_string).sorted().collect_vec();
        if names.len() < 2 {
            return false;
        }
        for _ in 0..MAX_DRAWS {
            let a = &names[self.rng.gen_range(0..names.len())];
            let b = &names[self.rng.gen_range(0..names.len())];
            if a == b {
                continue;
            }
            return tree.swap_nodes(a, b).is_ok();
        }
        false
    }

    fn random_change_rep(&mut self, tree: &mut HbTree) -> bool {
        let options = tree
            .symmetry_groups()
            .iter()
            .flat_map(|g| {
                g.pairs()
                    .iter()
                    .map(|(a, _)| (g.name.clone(), a.clone()))
            })
            .collect_vec();
        if options.is_empty() {
            return false;
        }
        let (group, member) = &options[self.rng.gen_range(0..options.len())];
        tree.change_representative(group, member).is_ok()
    }

    fn random_convert_sym(&mut self, tree: &mut HbTree) -> bool {
        let groups = tree
            .symmetry_groups()
            .iter()
            .map(|g| g.name.clone())
            .collect_vec();
        if groups.is_empty() {
            return false;
        }
        let group = &groups[self.rng.gen_range(0..groups.len())];
        tree.convert_symmetry_type(group).is_ok()
    }
}

/// Netlist-free wirelength proxy: total Manhattan spread of module centers
/// around the placement centroid. Keeps the `area_ratio` blend observable
/// without netlist information.
pub fn estimate_wirelength(tree: &HbTree) -> f64 {
    let centers = tree
        .modules()
        .map(|m| {
            (
                m.x as f64 + m.width() as f64 / 2.0,
                m.y as f64 + m.height() as f64 / 2.0,
            )
        })
        .collect_vec();
    if centers.is_empty() {
        return 0.0;
    }
    let n = centers.len() as f64;
    let (gx, gy) = centers
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (gx, gy) = (gx / n, gy / n);
    centers
        .iter()
        .map(|(x, y)| (x - gx).abs() + (y - gy).abs())
        .sum()
}
