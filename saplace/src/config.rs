use serde::{Deserialize, Serialize};

/// Configuration for the simulated-annealing placer.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct SAConfig {
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Multiplied into the temperature after every temperature step.
    pub cooling_rate: f64,
    pub iterations_per_temperature: usize,
    /// Stop after this many consecutive iterations without a new best.
    pub no_improvement_limit: usize,
    /// Relative probabilities of the five perturbations; normalized to sum
    /// to 1 before use.
    pub prob_rotate: f64,
    pub prob_move: f64,
    pub prob_swap: f64,
    pub prob_change_rep: f64,
    pub prob_convert_sym: f64,
    /// Cost blend: `area_weight * area + wirelength_weight * wirelength`.
    pub area_weight: f64,
    pub wirelength_weight: f64,
    /// Seed for the PRNG. If undefined, the placer runs in
    /// non-deterministic mode using entropy.
    pub prng_seed: Option<u64>,
}

impl Default for SAConfig {
    fn default() -> Self {
        SAConfig {
            initial_temperature: 1000.0,
            final_temperature: 0.1,
            cooling_rate: 0.95,
            iterations_per_temperature: 100,
            no_improvement_limit: 1000,
            prob_rotate: 0.3,
            prob_move: 0.3,
            prob_swap: 0.3,
            prob_change_rep: 0.05,
            prob_convert_sym: 0.05,
            area_weight: 1.0,
            wirelength_weight: 0.0,
            prng_seed: Some(0),
        }
    }
}

impl SAConfig {
    /// Perturbation probabilities normalized to sum to 1, in
    /// (rotate, move, swap, change representative, convert symmetry) order.
    /// A non-positive sum falls back to the default vector.
    pub fn normalized_probabilities(&self) -> [f64; 5] {
        let probs = [
            self.prob_rotate,
            self.prob_move,
            self.prob_swap,
            self.prob_change_rep,
            self.prob_convert_sym,
        ];
        let sum: f64 = probs.iter().sum();
        if sum <= 0.0 {
            let defaults = SAConfig::default();
            return [
                defaults.prob_rotate,
                defaults.prob_move,
                defaults.prob_swap,
                defaults.prob_change_rep,
                defaults.prob_convert_sym,
            ];
        }
        probs.map(|p| p / sum)
    }

    /// Sets the cost blend from the CLI's `area_ratio`:
    /// `wirelength_weight = 1 - area_ratio`.
    pub fn with_area_ratio(mut self, area_ratio: f64) -> Self {
        self.area_weight = area_ratio;
        self.wirelength_weight = 1.0 - area_ratio;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn probabilities_are_normalized() {
        let config = SAConfig {
            prob_rotate: 2.0,
            prob_move: 1.0,
            prob_swap: 1.0,
            prob_change_rep: 0.0,
            prob_convert_sym: 0.0,
            ..SAConfig::default()
        };
        let probs = config.normalized_probabilities();
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((probs[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_probabilities_fall_back_to_defaults() {
        let config = SAConfig {
            prob_rotate: 0.0,
            prob_move: 0.0,
            prob_swap: 0.0,
            prob_change_rep: 0.0,
            prob_convert_sym: 0.0,
            ..SAConfig::default()
        };
        assert_eq!(
            config.normalized_probabilities(),
            [0.3, 0.3, 0.3, 0.05, 0.05]
        );
    }

    #[test]
    fn area_ratio_sets_complementary_weights() {
        let config = SAConfig::default().with_area_ratio(0.75);
        assert_eq!(config.area_weight, 0.75);
        assert_eq!(config.wirelength_weight, 0.25);
    }
}
