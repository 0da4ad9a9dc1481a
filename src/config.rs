use std::fs;
use std::path::Path;

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};

/// Geometric scale factors applied to the reference box when enumerating
/// candidate windows, ratio 1.2 between neighbours.
pub const SCALES: [f64; 21] = [
    0.16151, 0.19381, 0.23257, 0.27908, 0.33490, 0.40188, 0.48225, 0.57870, 0.69444, 0.83333, 1.,
    1.20000, 1.44000, 1.72800, 2.07360, 2.48832, 2.98598, 3.58318, 4.29982, 5.15978, 6.19174,
];

/// Candidate windows advance by this fraction of their shorter side
pub const SHIFT: f64 = 0.1;
pub const GRID_SPARSITY: usize = 10;
pub const PATCH_SIZE: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, clap::Args)]
#[serde(default)]
pub struct TldParams {
    /// Lucas-Kanade window side in pixels, odd
    #[clap(long, default_value = "15")]
    pub win_size: usize,

    /// Pyramid levels above the original frame
    #[clap(long, default_value = "5")]
    pub level: usize,

    /// Minimum eigenvalue of the per-pixel structure tensor, intensities in [0, 1]
    #[clap(long, default_value = "0.0001")]
    pub min_eigen: f64,

    #[clap(long, default_value = "20")]
    pub lk_iterations: usize,

    /// Stop iterating once the update is shorter than this many pixels
    #[clap(long, default_value = "0.03")]
    pub lk_epsilon: f64,

    /// Tracking fails when the median squared forward-backward error reaches this
    #[clap(long, default_value = "100")]
    pub min_forward_backward_error: f64,

    /// Shortest admissible candidate window side
    #[clap(long, default_value = "20")]
    pub min_win: usize,

    #[clap(long, default_value = "0.7")]
    pub include_overlap: f64,

    #[clap(long, default_value = "0.2")]
    pub exclude_overlap: f64,

    #[clap(long, default_value = "0.1")]
    pub shift: f64,

    /// Number of ferns
    #[clap(long, default_value = "10")]
    pub structs: usize,

    /// Pixel comparisons per fern
    #[clap(long, default_value = "13")]
    pub features: usize,

    #[clap(long, default_value = "10")]
    pub grid_sparsity: usize,

    #[clap(long, default_value = "10")]
    pub patch_size: usize,

    #[clap(long, default_value = "0")]
    pub seed: u64,

    #[clap(skip = SCALES.to_vec())]
    pub scales: Vec<f64>,
}

impl Default for TldParams {
    fn default() -> Self {
        TldParams {
            win_size: 15,
            level: 5,
            min_eigen: 1e-4,
            lk_iterations: 20,
            lk_epsilon: 0.03,
            min_forward_backward_error: 100.,
            min_win: 20,
            include_overlap: 0.7,
            exclude_overlap: 0.2,
            shift: SHIFT,
            structs: 10,
            features: 13,
            grid_sparsity: GRID_SPARSITY,
            patch_size: PATCH_SIZE,
            seed: 0,
            scales: SCALES.to_vec(),
        }
    }
}

impl TldParams {
    /// Load parameters from a JSON object. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<TldParams> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read parameters from {}", path.display()))?;
        let params: TldParams = serde_json::from_str(&text)
            .with_context(|| format!("invalid parameter file {}", path.display()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.win_size < 3 || self.win_size % 2 == 0 {
            bail!("win_size must be odd and at least 3, got {}", self.win_size);
        }
        if self.lk_iterations == 0 {
            bail!("lk_iterations must be positive");
        }
        if !(self.lk_epsilon > 0.) {
            bail!("lk_epsilon must be positive, got {}", self.lk_epsilon);
        }
        if self.min_win == 0 {
            bail!("min_win must be positive");
        }
        if !(0. ..=1.).contains(&self.exclude_overlap) || !(0. ..=1.).contains(&self.include_overlap) {
            bail!("overlap thresholds must lie in [0, 1]");
        }
        if self.exclude_overlap > self.include_overlap {
            bail!(
                "exclude_overlap {} is above include_overlap {}",
                self.exclude_overlap,
                self.include_overlap
            );
        }
        if !(self.shift > 0.) {
            bail!("shift must be positive, got {}", self.shift);
        }
        if self.structs == 0 {
            bail!("structs must be positive");
        }
        if self.features == 0 || self.features > 20 {
            bail!("features must lie in 1..=20, got {}", self.features);
        }
        if self.grid_sparsity == 0 || self.patch_size == 0 {
            bail!("grid_sparsity and patch_size must be positive");
        }
        if self.scales.is_empty() || self.scales.iter().any(|s| !(*s > 0.)) {
            bail!("scales must be a non-empty list of positive factors");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        TldParams::default().validate().unwrap();
        assert_eq!(TldParams::default().scales.len(), 21);
    }

    #[test]
    fn test_partial_json() {
        let params: TldParams = serde_json::from_str(r#"{"win_size": 11, "seed": 7}"#).unwrap();
        assert_eq!(params.win_size, 11);
        assert_eq!(params.seed, 7);
        assert_eq!(params.level, TldParams::default().level);
        assert_eq!(params.scales, SCALES.to_vec());
    }

    #[test]
    fn test_cli_defaults_match() {
        use clap::Parser;

        #[derive(clap::Parser)]
        struct Args {
            #[clap(flatten)]
            params: TldParams,
        }

        let args = Args::parse_from(["tld"]);
        assert_eq!(args.params, TldParams::default());
        let args = Args::parse_from(["tld", "--min-win", "12", "--include-overlap", "0.6"]);
        assert_eq!(args.params.min_win, 12);
        assert_eq!(args.params.include_overlap, 0.6);
    }

    #[test]
    fn test_validate() {
        let mut params = TldParams::default();
        params.win_size = 14;
        assert!(params.validate().is_err());

        let mut params = TldParams::default();
        params.exclude_overlap = 0.8;
        assert!(params.validate().is_err());

        let mut params = TldParams::default();
        params.scales.clear();
        assert!(params.validate().is_err());

        let mut params = TldParams::default();
        params.shift = 0.;
        assert!(params.validate().is_err());
    }
}
