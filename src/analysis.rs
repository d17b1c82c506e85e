//! The whole pipeline: synthetic data -> derived features -> HMM -> decoded regimes.
//! The result is plain data, to be handed to a renderer.
use crate::candle::Candle;
use crate::config::{AnalysisConfig, StationDataset};
use crate::error::Result;
use crate::gen_seq::ShiftPanel;
use crate::ghmm::{FitReport, GaussianHmm};
use crate::regime_shift::RegimeShiftMatrix;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

/// Parameters of a fitted model, in the order of its state labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub means: Vec<f64>,
    pub variances: Vec<f64>,
    pub initial_distribution: Vec<f64>,
    pub transition_matrix: Vec<Vec<f64>>,
}

impl From<&GaussianHmm> for ModelSummary {
    fn from(model: &GaussianHmm) -> Self {
        Self {
            means: model.means().to_vec(),
            variances: model.variances().to_vec(),
            initial_distribution: model.initial_distribution().to_vec(),
            transition_matrix: (0..model.states())
                .map(|s| model.transitions(s).to_vec())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub dataset: StationDataset,
    pub panel: ShiftPanel,
    pub candles: Vec<Candle>,
    pub regime_shift: RegimeShiftMatrix,
    pub fit: FitReport,
    pub model: ModelSummary,
    /// One hidden state per value of the dataset.
    pub states: Vec<usize>,
}

pub fn run(config: &AnalysisConfig) -> Result<Report> {
    let dataset = &config.dataset;
    dataset.validate()?;
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(config.seed);
    let panel = ShiftPanel::generate(&mut rng, &config.panel)?;
    let candles = Candle::from_series(&mut rng, &dataset.values, dataset.drought_threshold)?;
    let regime_shift = RegimeShiftMatrix::new(&dataset.values)?;
    debug!("Regime-shift matrix\n{}", regime_shift);
    let hmm_seed = config.hmm.seed.unwrap_or_else(|| rng.gen());
    let mut hmm_rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(hmm_seed);
    let (model, fit) = GaussianHmm::fit_with_rng(&dataset.values, &config.hmm, &mut hmm_rng)?;
    debug!("Fitted model\n{}", model);
    let states = model.decode(&dataset.values)?;
    info!(
        "{}: {} values, {} states, LK:{:.3}, converged:{}",
        dataset.station,
        dataset.values.len(),
        model.states(),
        fit.log_likelihood,
        fit.converged
    );
    Ok(Report {
        dataset: dataset.clone(),
        panel,
        candles,
        regime_shift,
        fit,
        model: ModelSummary::from(&model),
        states,
    })
}
