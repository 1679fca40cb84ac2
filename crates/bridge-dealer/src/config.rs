//! Tunables for the biased deal builder.

use std::time::Duration;

/// Knobs controlling the attempt loop, pre-allocation, and adaptive behaviour.
///
/// Defaults are the production values; tests override individual fields.
/// `reseed_enabled` exists so the wall-clock entropy re-seed can be switched
/// off when byte-for-byte reproducibility is required.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Inner-loop cap per board retry.
    pub max_board_attempts: u32,
    /// Outer board retries in `generate_deals`.
    pub max_board_retries: u32,
    /// Starting interval (in failed attempts) before sub-profiles re-roll.
    pub sub_reroll_initial: u32,
    /// Floor the sub-profile re-roll interval decays down to.
    pub sub_reroll_min: u32,
    /// Multiplicative decay applied to the sub-profile re-roll interval.
    pub sub_reroll_decay: f64,
    /// RS re-roll interval as a fraction of the sub-profile interval.
    pub rs_reroll_ratio: f64,
    /// Cutoff on `P_GE_N` under which a minimum-card requirement is tight.
    pub dispersion_threshold: f64,
    /// Fraction of a standard suit minimum to pre-allocate.
    pub prealloc_std_fraction: f64,
    /// Fraction of an RS suit minimum to pre-allocate.
    pub rs_prealloc_fraction: f64,
    /// HCP-targeted rejection retries during RS/contingent pre-allocation.
    pub rs_hcp_retries: u32,
    /// Width of the HCP feasibility gate window, in standard deviations.
    pub hcp_feasibility_num_sd: f64,
    /// Wall-clock budget per board before the RNG is re-seeded from entropy.
    pub reseed_threshold: Duration,
    /// Cross-seat feasibility retries per sub-profile selection.
    pub max_selection_retries: u32,
    /// Adaptive entropy re-seed on slow boards. Disable for reproducibility.
    pub reseed_enabled: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            max_board_attempts: 10_000,
            max_board_retries: 50,
            sub_reroll_initial: 150,
            sub_reroll_min: 50,
            sub_reroll_decay: 0.7,
            rs_reroll_ratio: 0.7,
            dispersion_threshold: 0.19,
            prealloc_std_fraction: 0.75,
            rs_prealloc_fraction: 1.0,
            rs_hcp_retries: 10,
            hcp_feasibility_num_sd: 1.0,
            reseed_threshold: Duration::from_millis(1750),
            max_selection_retries: 100,
            reseed_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = BuilderConfig::default();
        assert_eq!(cfg.max_board_attempts, 10_000);
        assert_eq!(cfg.max_board_retries, 50);
        assert_eq!(cfg.sub_reroll_initial, 150);
        assert_eq!(cfg.sub_reroll_min, 50);
        assert_eq!(cfg.sub_reroll_decay, 0.7);
        assert_eq!(cfg.rs_reroll_ratio, 0.7);
        assert_eq!(cfg.dispersion_threshold, 0.19);
        assert_eq!(cfg.prealloc_std_fraction, 0.75);
        assert_eq!(cfg.rs_prealloc_fraction, 1.0);
        assert_eq!(cfg.rs_hcp_retries, 10);
        assert_eq!(cfg.hcp_feasibility_num_sd, 1.0);
        assert_eq!(cfg.reseed_threshold, Duration::from_millis(1750));
        assert_eq!(cfg.max_selection_retries, 100);
        assert!(cfg.reseed_enabled);
    }
}
