//! Gaussian hidden Markov models on a univariate series.
//! Each hidden state emits a normal distribution with its own mean and variance
//! (i.e., diagonal covariance in one dimension).
//! Parameters are estimated by the Baum-Welch algorithm, and the most likely state
//! sequence is decoded by the Viterbi algorithm.
//! The DP tables are tiny (#observations x #states), so every table is kept in log-space
//! and combined by log-sum-exp instead of being scaled.
use crate::error::{HmmClimateError, Result};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};

// Log(0).
const EP: f64 = -100000000000000000000000f64;
const LN_2PI: f64 = 1.8378770664093453;
const KMEANS_ITER: usize = 100;

fn log(x: &f64) -> f64 {
    assert!(0f64 <= *x, "{}", x);
    if f64::EPSILON < x.abs() {
        x.ln()
    } else {
        EP
    }
}

fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return EP;
    }
    let max = xs.iter().fold(f64::NEG_INFINITY, |x, &y| x.max(y));
    xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln() + max
}

// The first maximum wins.
fn argmax<I: Iterator<Item = f64>>(xs: I) -> (usize, f64) {
    xs.enumerate()
        .fold((0, f64::NEG_INFINITY), |(argmax, max), (i, x)| {
            if max < x {
                (i, x)
            } else {
                (argmax, max)
            }
        })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Configurations
#[serde(default)]
pub struct HmmConfig {
    /// Number of hidden states.
    pub states: usize,
    /// Maximum number of EM iterations.
    pub max_iter: usize,
    /// The EM stops when the gain of the log-likelihood is smaller than this value.
    pub tol: f64,
    /// Added to each estimated variance, so no variance falls below this value.
    pub min_var: f64,
    /// Seed of the initialization. If `None`, a seed is drawn from the entropy.
    pub seed: Option<u64>,
    /// Relabel the states by ascending means after fitting.
    pub sort_states: bool,
}

impl HmmConfig {
    pub fn new(states: usize, max_iter: usize) -> Self {
        Self {
            states,
            max_iter,
            tol: 0.01,
            min_var: 0.001,
            seed: None,
            sort_states: false,
        }
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn sorted(mut self, sort_states: bool) -> Self {
        self.sort_states = sort_states;
        self
    }
    fn validate(&self) -> Result<()> {
        if self.states == 0 {
            return Err(HmmClimateError::invalid("the number of states should be positive"));
        }
        if self.max_iter == 0 {
            return Err(HmmClimateError::invalid(
                "the maximum number of iterations should be positive",
            ));
        }
        if !(0f64 < self.min_var && self.min_var.is_finite()) {
            return Err(HmmClimateError::invalid(format!(
                "the variance floor should be positive, found {}",
                self.min_var
            )));
        }
        if !(0f64 <= self.tol) {
            return Err(HmmClimateError::invalid(format!(
                "the tolerance should be non-negative, found {}",
                self.tol
            )));
        }
        Ok(())
    }
}

impl std::default::Default for HmmConfig {
    fn default() -> Self {
        Self::new(3, 1000)
    }
}

/// Summary of a Baum-Welch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub iterations: usize,
    /// Log-likelihood of the data under the returned model.
    pub log_likelihood: f64,
    /// False if the iteration cap was reached first. The returned model is still usable.
    pub converged: bool,
    /// Log-likelihood before each M-step.
    pub history: Vec<f64>,
}

/// A Gaussian hidden Markov model.
/// A value of this type is either fitted to data or built from explicit parameters,
/// so there is no "not yet fitted" model to decode with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianHiddenMarkovModel {
    states: usize,
    // By accessing from * self.states + to, we get the transition probability from `from` to `to`.
    transition_matrix: Vec<f64>,
    // Should be normalized to 1.
    initial_distribution: Vec<f64>,
    means: Vec<f64>,
    variances: Vec<f64>,
}

pub type GaussianHmm = GaussianHiddenMarkovModel;

fn check_observations(observations: &[f64]) -> Result<()> {
    if observations.is_empty() {
        return Err(HmmClimateError::invalid("empty observation series"));
    }
    if let Some(pos) = observations.iter().position(|x| !x.is_finite()) {
        return Err(HmmClimateError::invalid(format!(
            "non-finite observation {} at {}",
            observations[pos], pos
        )));
    }
    // Squared distances between any two points and their sums should stay finite.
    let len = observations.len() as f64;
    let scale = observations.iter().map(|x| x * x).sum::<f64>() * 4f64 * len;
    if !scale.is_finite() {
        return Err(HmmClimateError::invalid(
            "observations are too large to compute their variance",
        ));
    }
    Ok(())
}

fn check_distribution(probs: &[f64], name: &str) -> Result<()> {
    let sum: f64 = probs.iter().sum();
    if probs.iter().any(|p| !(0f64..=1f64).contains(p)) || 0.000001 < (sum - 1f64).abs() {
        Err(HmmClimateError::invalid(format!(
            "{} is not a probability distribution: {:?}",
            name, probs
        )))
    } else {
        Ok(())
    }
}

impl std::fmt::Display for GaussianHmm {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "States:{}", self.states)?;
        writeln!(f, "Transition:")?;
        for from in 0..self.states {
            let probs: Vec<_> = self
                .transitions(from)
                .iter()
                .map(|x| format!("{:.3}", x))
                .collect();
            writeln!(f, "{}", probs.join("\t"))?;
        }
        writeln!(f, "Emission:")?;
        for (mean, var) in self.means.iter().zip(self.variances.iter()) {
            writeln!(f, "N({:.3},{:.3})", mean, var)?;
        }
        let probs: Vec<_> = self
            .initial_distribution
            .iter()
            .map(|x| format!("{:.3}", x))
            .collect();
        write!(f, "Initial:{}", probs.join("\t"))
    }
}

impl GaussianHmm {
    /// Create a model from explicit parameters.
    /// 1. `transition_matrix` should be a states x states matrix, each row summing to 1.
    /// 2. `initial_distribution` should sum to 1.
    /// 3. `means` and `variances` should have one entry per state, variances being positive.
    pub fn from_params(
        initial_distribution: &[f64],
        transition_matrix: &[Vec<f64>],
        means: &[f64],
        variances: &[f64],
    ) -> Result<Self> {
        let states = initial_distribution.len();
        if states == 0 {
            return Err(HmmClimateError::invalid("the number of states should be positive"));
        }
        let shapes_ok = transition_matrix.len() == states
            && transition_matrix.iter().all(|row| row.len() == states)
            && means.len() == states
            && variances.len() == states;
        if !shapes_ok {
            return Err(HmmClimateError::invalid(format!(
                "parameter shapes do not agree with {} states",
                states
            )));
        }
        check_distribution(initial_distribution, "initial distribution")?;
        for row in transition_matrix.iter() {
            check_distribution(row, "transition row")?;
        }
        if means.iter().any(|m| !m.is_finite()) {
            return Err(HmmClimateError::invalid("means should be finite"));
        }
        if variances.iter().any(|v| !(0f64 < *v && v.is_finite())) {
            return Err(HmmClimateError::invalid("variances should be positive"));
        }
        Ok(Self {
            states,
            transition_matrix: transition_matrix.iter().flatten().copied().collect(),
            initial_distribution: initial_distribution.to_vec(),
            means: means.to_vec(),
            variances: variances.to_vec(),
        })
    }
    /// Fit a fresh model to `observations`. Initialization is seeded by `config.seed`,
    /// or by a random seed if it is `None`.
    pub fn fit(observations: &[f64], config: &HmmConfig) -> Result<(Self, FitReport)> {
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        debug!("Initialization seed:{}", seed);
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
        Self::fit_with_rng(observations, config, &mut rng)
    }
    /// Same as `fit`, but the initialization draws from `rng`. `config.seed` is ignored.
    pub fn fit_with_rng<R: Rng>(
        observations: &[f64],
        config: &HmmConfig,
        rng: &mut R,
    ) -> Result<(Self, FitReport)> {
        config.validate()?;
        check_observations(observations)?;
        if observations.len() < config.states {
            return Err(HmmClimateError::InsufficientData {
                observations: observations.len(),
                states: config.states,
            });
        }
        let init = Self::initialize(observations, config, rng);
        trace!("Initial model\n{}", init);
        Ok(init.baum_welch(observations, config))
    }
    /// Run Baum-Welch starting from this model, instead of a random initialization.
    /// `config.states` and `config.seed` are ignored.
    pub fn refit(&self, observations: &[f64], config: &HmmConfig) -> Result<(Self, FitReport)> {
        let config = HmmConfig {
            states: self.states,
            ..config.clone()
        };
        config.validate()?;
        check_observations(observations)?;
        if observations.len() < self.states {
            return Err(HmmClimateError::InsufficientData {
                observations: observations.len(),
                states: self.states,
            });
        }
        Ok(self.clone().baum_welch(observations, &config))
    }
    // Uniform initial/transition probabilities, k-means for the means,
    // and the variance of the whole data for every state.
    fn initialize<R: Rng>(observations: &[f64], config: &HmmConfig, rng: &mut R) -> Self {
        let states = config.states;
        let means = kmeans(observations, states, rng);
        let len = observations.len() as f64;
        let mean = observations.iter().sum::<f64>() / len;
        let var = observations.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / len;
        Self {
            states,
            transition_matrix: vec![1f64 / states as f64; states * states],
            initial_distribution: vec![1f64 / states as f64; states],
            means,
            variances: vec![var + config.min_var; states],
        }
    }
    fn baum_welch(self, observations: &[f64], config: &HmmConfig) -> (Self, FitReport) {
        let mut model = self;
        let mut history: Vec<f64> = Vec::with_capacity(config.max_iter.min(1024));
        let mut converged = false;
        for t in 0..config.max_iter {
            let (next, lk) = model.em_step(observations, config.min_var);
            model = next;
            let gain = history.last().map(|&prev| lk - prev);
            history.push(lk);
            trace!("EM\t{}\t{:.4}", t, lk);
            if gain.map(|gain| gain < config.tol).unwrap_or(false) {
                converged = true;
                break;
            }
        }
        if config.sort_states {
            model = model.sorted_by_mean().0;
        }
        let log_likelihood = model.log_likelihood_inner(observations);
        if converged {
            debug!(
                "Converged after {} iterations. LK:{:.4}",
                history.len(),
                log_likelihood
            );
        } else {
            warn!(
                "Baum-Welch did not converge in {} iterations (tol={}). LK:{:.4}",
                config.max_iter, config.tol, log_likelihood
            );
        }
        let report = FitReport {
            iterations: history.len(),
            log_likelihood,
            converged,
            history,
        };
        (model, report)
    }
    pub fn states(&self) -> usize {
        self.states
    }
    /// get transition probability from `from` to `to`
    pub fn transition(&self, from: usize, to: usize) -> f64 {
        self.transition_matrix[from * self.states + to]
    }
    /// Return transition probabilities from `from`.
    pub fn transitions(&self, from: usize) -> &[f64] {
        &self.transition_matrix[from * self.states..(from + 1) * self.states]
    }
    pub fn initial_distribution(&self) -> &[f64] {
        &self.initial_distribution
    }
    pub fn means(&self) -> &[f64] {
        &self.means
    }
    pub fn variances(&self) -> &[f64] {
        &self.variances
    }
    // To obtain log Pr(t->s), index by [t][s]
    fn get_log_transition(&self) -> Vec<Vec<f64>> {
        (0..self.states)
            .map(|t| self.transitions(t).iter().map(log).collect())
            .collect()
    }
    // [t][s] = log N(x_t; mean_s, var_s)
    fn get_log_emission(&self, observations: &[f64]) -> Vec<Vec<f64>> {
        observations
            .iter()
            .map(|x| {
                self.means
                    .iter()
                    .zip(self.variances.iter())
                    .map(|(m, v)| (-0.5 * (LN_2PI + v.ln() + (x - m).powi(2) / v)).max(EP))
                    .collect()
            })
            .collect()
    }
    // Forward table [t][s] = log Pr{x_0..=x_t, state_t = s}.
    fn forward(&self, log_transit: &[Vec<f64>], log_emit: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut dp: Vec<Vec<f64>> = Vec::with_capacity(log_emit.len());
        let first: Vec<_> = (0..self.states)
            .map(|s| log(&self.initial_distribution[s]) + log_emit[0][s])
            .collect();
        dp.push(first);
        let mut buffer = vec![0f64; self.states];
        for emit in log_emit.iter().skip(1) {
            let prev = dp.last().unwrap();
            let current: Vec<_> = (0..self.states)
                .map(|s| {
                    buffer
                        .iter_mut()
                        .enumerate()
                        .for_each(|(t, x)| *x = prev[t] + log_transit[t][s]);
                    logsumexp(&buffer) + emit[s]
                })
                .collect();
            dp.push(current);
        }
        dp
    }
    // Backward table [t][s] = log Pr{x_t+1.. | state_t = s}.
    fn backward(&self, log_transit: &[Vec<f64>], log_emit: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let len = log_emit.len();
        let mut dp = vec![vec![0f64; self.states]; len];
        let mut buffer = vec![0f64; self.states];
        for t in (0..len.saturating_sub(1)).rev() {
            for s in 0..self.states {
                buffer.iter_mut().enumerate().for_each(|(u, x)| {
                    *x = log_transit[s][u] + log_emit[t + 1][u] + dp[t + 1][u];
                });
                dp[t][s] = logsumexp(&buffer);
            }
        }
        dp
    }
    // One E-step and one M-step. Return the updated model and the log-likelihood of `self`.
    fn em_step(&self, observations: &[f64], min_var: f64) -> (Self, f64) {
        let log_transit = self.get_log_transition();
        let log_emit = self.get_log_emission(observations);
        let forward = self.forward(&log_transit, &log_emit);
        let backward = self.backward(&log_transit, &log_emit);
        let lk = logsumexp(forward.last().unwrap());
        let gamma: Vec<Vec<f64>> = forward
            .iter()
            .zip(backward.iter())
            .map(|(f, b)| {
                f.iter()
                    .zip(b.iter())
                    .map(|(f, b)| (f + b - lk).exp())
                    .collect()
            })
            .collect();
        let initial_distribution = self.estimate_initial_distribution(&gamma);
        let transition_matrix =
            self.estimate_transition_prob(&forward, &backward, &log_transit, &log_emit, lk);
        let (means, variances) = self.estimate_emission(observations, &gamma, min_var);
        let model = Self {
            states: self.states,
            transition_matrix,
            initial_distribution,
            means,
            variances,
        };
        (model, lk)
    }
    fn estimate_initial_distribution(&self, gamma: &[Vec<f64>]) -> Vec<f64> {
        let sum: f64 = gamma[0].iter().sum();
        if 0.00001 < sum {
            gamma[0].iter().map(|x| x / sum).collect()
        } else {
            self.initial_distribution.clone()
        }
    }
    fn estimate_transition_prob(
        &self,
        forward: &[Vec<f64>],
        backward: &[Vec<f64>],
        log_transit: &[Vec<f64>],
        log_emit: &[Vec<f64>],
        lk: f64,
    ) -> Vec<f64> {
        let states = self.states;
        let mut buffer = vec![0f64; states * states];
        for t in 0..forward.len().saturating_sub(1) {
            for from in 0..states {
                for to in 0..states {
                    let xi = forward[t][from]
                        + log_transit[from][to]
                        + log_emit[t + 1][to]
                        + backward[t + 1][to]
                        - lk;
                    buffer[from * states + to] += xi.exp();
                }
            }
        }
        // Rows without any mass keep their previous values.
        for (from, probs) in buffer.chunks_mut(states).enumerate() {
            let sum: f64 = probs.iter().sum();
            if 0.00001 < sum {
                probs.iter_mut().for_each(|x| *x /= sum);
            } else {
                probs.copy_from_slice(self.transitions(from));
            }
        }
        buffer
    }
    fn estimate_emission(
        &self,
        observations: &[f64],
        gamma: &[Vec<f64>],
        min_var: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        (0..self.states)
            .map(|s| {
                let weight: f64 = gamma.iter().map(|g| g[s]).sum();
                if weight < 0.00001 {
                    return (self.means[s], self.variances[s]);
                }
                let mean = gamma
                    .iter()
                    .zip(observations)
                    .map(|(g, x)| g[s] * x)
                    .sum::<f64>()
                    / weight;
                let var = gamma
                    .iter()
                    .zip(observations)
                    .map(|(g, x)| g[s] * (x - mean).powi(2))
                    .sum::<f64>()
                    / weight;
                (mean, var + min_var)
            })
            .unzip()
    }
    fn log_likelihood_inner(&self, observations: &[f64]) -> f64 {
        let log_transit = self.get_log_transition();
        let log_emit = self.get_log_emission(observations);
        logsumexp(self.forward(&log_transit, &log_emit).last().unwrap())
    }
    /// Log-likelihood of `observations`.
    pub fn log_likelihood(&self, observations: &[f64]) -> Result<f64> {
        check_observations(observations)?;
        Ok(self.log_likelihood_inner(observations))
    }
    /// Posterior probability of each state at each time step; [t][s].
    pub fn posteriors(&self, observations: &[f64]) -> Result<Vec<Vec<f64>>> {
        check_observations(observations)?;
        let log_transit = self.get_log_transition();
        let log_emit = self.get_log_emission(observations);
        let forward = self.forward(&log_transit, &log_emit);
        let backward = self.backward(&log_transit, &log_emit);
        let lk = logsumexp(forward.last().unwrap());
        let posteriors = forward
            .iter()
            .zip(backward.iter())
            .map(|(f, b)| {
                f.iter()
                    .zip(b.iter())
                    .map(|(f, b)| (f + b - lk).exp())
                    .collect()
            })
            .collect();
        Ok(posteriors)
    }
    /// The most likely state sequence (Viterbi). The labels are not ordered by any means
    /// unless the model was sorted by `sorted_by_mean`.
    pub fn decode(&self, observations: &[f64]) -> Result<Vec<usize>> {
        check_observations(observations)?;
        let (_, states) = self.viterbi(observations);
        Ok(states)
    }
    /// Return the log-probability of the most likely path and the path itself.
    pub fn viterbi(&self, observations: &[f64]) -> (f64, Vec<usize>) {
        if observations.is_empty() {
            return (0f64, vec![]);
        }
        let log_transit = self.get_log_transition();
        let log_emit = self.get_log_emission(observations);
        let mut dp: Vec<Vec<f64>> = Vec::with_capacity(observations.len());
        let mut traceback: Vec<Vec<usize>> = Vec::with_capacity(observations.len());
        let first: Vec<_> = (0..self.states)
            .map(|s| log(&self.initial_distribution[s]) + log_emit[0][s])
            .collect();
        dp.push(first);
        traceback.push(vec![0; self.states]);
        for emit in log_emit.iter().skip(1) {
            let prev = dp.last().unwrap();
            let (current, pointers): (Vec<_>, Vec<_>) = (0..self.states)
                .map(|s| {
                    let (t, max) = argmax((0..self.states).map(|t| prev[t] + log_transit[t][s]));
                    (max + emit[s], t)
                })
                .unzip();
            dp.push(current);
            traceback.push(pointers);
        }
        let (mut state, max_lk) = argmax(dp.last().unwrap().iter().copied());
        let mut states = vec![state];
        for pointers in traceback.iter().skip(1).rev() {
            state = pointers[state];
            states.push(state);
        }
        states.reverse();
        (max_lk, states)
    }
    /// Relabel the states so that the means are in ascending order.
    /// Also return the map from old labels to new labels.
    pub fn sorted_by_mean(&self) -> (Self, Vec<usize>) {
        let mut order: Vec<usize> = (0..self.states).collect();
        order.sort_by(|&i, &j| {
            self.means[i]
                .partial_cmp(&self.means[j])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut relabel = vec![0; self.states];
        for (new, &old) in order.iter().enumerate() {
            relabel[old] = new;
        }
        let transition_matrix = order
            .iter()
            .flat_map(|&from| order.iter().map(move |&to| (from, to)))
            .map(|(from, to)| self.transition(from, to))
            .collect();
        let model = Self {
            states: self.states,
            transition_matrix,
            initial_distribution: order.iter().map(|&s| self.initial_distribution[s]).collect(),
            means: order.iter().map(|&s| self.means[s]).collect(),
            variances: order.iter().map(|&s| self.variances[s]).collect(),
        };
        (model, relabel)
    }
}

/// Fit a model with `config`, then decode `observations` by the fitted model.
pub fn fit_decode(observations: &[f64], config: &HmmConfig) -> Result<(Vec<usize>, FitReport)> {
    let (model, report) = GaussianHmm::fit(observations, config)?;
    debug!("Fitted model\n{}", model);
    let states = model.decode(observations)?;
    Ok((states, report))
}

fn nearest(x: f64, centers: &[f64]) -> usize {
    argmax(centers.iter().map(|c| -(x - c).powi(2))).0
}

// k-means++ seeding followed by Lloyd's iterations. Empty clusters keep their centers.
fn kmeans<R: Rng>(xs: &[f64], k: usize, rng: &mut R) -> Vec<f64> {
    let mut centers = vec![xs[rng.gen_range(0..xs.len())]];
    while centers.len() < k {
        let weights: Vec<f64> = xs
            .iter()
            .map(|x| {
                centers
                    .iter()
                    .map(|c| (x - c).powi(2))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let next = match WeightedIndex::new(&weights) {
            Ok(distr) if total.is_finite() => distr.sample(rng),
            // All points are on the centers, or the distances overflow.
            _ => rng.gen_range(0..xs.len()),
        };
        centers.push(xs[next]);
    }
    let mut assignments: Vec<usize> = xs.iter().map(|&x| nearest(x, &centers)).collect();
    for _ in 0..KMEANS_ITER {
        let mut sums = vec![(0f64, 0usize); k];
        for (&x, &cl) in xs.iter().zip(assignments.iter()) {
            sums[cl].0 += x;
            sums[cl].1 += 1;
        }
        for (center, &(sum, count)) in centers.iter_mut().zip(sums.iter()) {
            if 0 < count {
                *center = sum / count as f64;
            }
        }
        let next: Vec<usize> = xs.iter().map(|&x| nearest(x, &centers)).collect();
        if next == assignments {
            break;
        }
        assignments = next;
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoroshiro128PlusPlus;
    const MONTHLY: [f64; 12] = [7., 8., 9., 10., 14., 15., 16., 17., 18., 19., 20., 21.];
    // Check xs and ys are the same partition of the time steps.
    fn same_up_to_relabel(xs: &[usize], ys: &[usize]) -> bool {
        use std::collections::HashMap;
        let (mut fwd, mut bwd) = (HashMap::new(), HashMap::new());
        xs.len() == ys.len()
            && xs.iter().zip(ys.iter()).all(|(x, y)| {
                *fwd.entry(x).or_insert(y) == y && *bwd.entry(y).or_insert(x) == x
            })
    }
    fn three_clusters() -> (Vec<f64>, Vec<usize>) {
        let offsets = [-0.1, 0.05, 0.1, -0.05];
        let centers = [0f64, 100f64, 200f64];
        let xs: Vec<_> = centers
            .iter()
            .flat_map(|c| offsets.iter().map(move |o| c + o))
            .collect();
        let answer: Vec<_> = (0..3).flat_map(|s| vec![s; 4]).collect();
        (xs, answer)
    }
    #[test]
    fn logsumexp_test() {
        let xs = [0.1f64.ln(), 0.2f64.ln(), 0.7f64.ln()];
        assert!(logsumexp(&xs).abs() < 0.000001);
        assert_eq!(logsumexp(&[]), EP);
        assert!(logsumexp(&[EP, EP]).is_finite());
    }
    #[test]
    fn monthly_series() {
        let config = HmmConfig::default().with_seed(42);
        let (states, report) = fit_decode(&MONTHLY, &config).unwrap();
        assert_eq!(states.len(), 12);
        assert!(states.iter().all(|&s| s < 3), "{:?}", states);
        assert!(0 < report.iterations && report.iterations <= 1000);
        assert!(report.log_likelihood.is_finite());
    }
    #[test]
    fn huge_observations() {
        let xs = [0f64, 1e200, 2e200, 3e200];
        for sort in [false, true] {
            let config = HmmConfig::new(2, 20).with_seed(1).sorted(sort);
            assert!(matches!(
                GaussianHmm::fit(&xs, &config),
                Err(HmmClimateError::InvalidInput(_))
            ));
        }
        // Large but tractable values are fitted without overflow.
        let xs: Vec<_> = (0..8).map(|i| (i / 4) as f64 * 1e100 + i as f64).collect();
        let config = HmmConfig::new(2, 20).with_seed(1).sorted(true);
        let (model, report) = GaussianHmm::fit(&xs, &config).unwrap();
        assert!(model.means().iter().all(|m| m.is_finite()));
        assert!(model.variances().iter().all(|v| v.is_finite()));
        assert!(!report.log_likelihood.is_nan());
        assert_eq!(model.decode(&xs).unwrap().len(), 8);
    }
    #[test]
    fn insufficient_data() {
        let config = HmmConfig::new(5, 1000).with_seed(1);
        match fit_decode(&[1f64, 2f64, 3f64], &config) {
            Err(HmmClimateError::InsufficientData {
                observations,
                states,
            }) => {
                assert_eq!(observations, 3);
                assert_eq!(states, 5);
            }
            x => panic!("{:?}", x),
        }
    }
    #[test]
    fn invalid_input() {
        let config = HmmConfig::default().with_seed(1);
        assert!(matches!(
            GaussianHmm::fit(&[1f64, f64::NAN, 3f64, 4f64], &config),
            Err(HmmClimateError::InvalidInput(_))
        ));
        assert!(matches!(
            GaussianHmm::fit(&MONTHLY, &HmmConfig::new(0, 10)),
            Err(HmmClimateError::InvalidInput(_))
        ));
        assert!(matches!(
            GaussianHmm::fit(&MONTHLY, &HmmConfig::new(3, 0)),
            Err(HmmClimateError::InvalidInput(_))
        ));
        let (model, _) = GaussianHmm::fit(&MONTHLY, &config).unwrap();
        assert!(model.decode(&[]).is_err());
    }
    #[test]
    fn deterministic_under_seed() {
        for seed in 0..10u64 {
            let config = HmmConfig::default().with_seed(seed);
            let (xs, _) = fit_decode(&MONTHLY, &config).unwrap();
            let (ys, _) = fit_decode(&MONTHLY, &config).unwrap();
            assert_eq!(xs, ys);
            let (model1, report1) = GaussianHmm::fit(&MONTHLY, &config).unwrap();
            let (model2, report2) = GaussianHmm::fit(&MONTHLY, &config).unwrap();
            assert_eq!(model1, model2);
            assert_eq!(report1, report2);
        }
    }
    #[test]
    fn fitted_parameters_are_stochastic() {
        for seed in 0..5u64 {
            let config = HmmConfig::default().with_seed(seed);
            let (model, _) = GaussianHmm::fit(&MONTHLY, &config).unwrap();
            let init: f64 = model.initial_distribution().iter().sum();
            assert!((init - 1f64).abs() < 0.000001);
            for from in 0..model.states() {
                let sum: f64 = model.transitions(from).iter().sum();
                assert!((sum - 1f64).abs() < 0.000001, "{}", model);
            }
            assert!(model.variances().iter().all(|&v| config.min_var <= v));
            let posteriors = model.posteriors(&MONTHLY).unwrap();
            assert_eq!(posteriors.len(), 12);
            for probs in posteriors {
                assert!((probs.iter().sum::<f64>() - 1f64).abs() < 0.0001);
            }
        }
    }
    #[test]
    fn recover_clusters() {
        let (xs, answer) = three_clusters();
        for seed in 0..5u64 {
            let config = HmmConfig::default().with_seed(seed);
            let (states, report) = fit_decode(&xs, &config).unwrap();
            assert!(same_up_to_relabel(&states, &answer), "{:?}", states);
            assert!(report.converged);
        }
    }
    #[test]
    fn sorted_states() {
        let (xs, answer) = three_clusters();
        let config = HmmConfig::default().with_seed(3).sorted(true);
        let (model, _) = GaussianHmm::fit(&xs, &config).unwrap();
        assert!(model.means().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(model.decode(&xs).unwrap(), answer);
    }
    #[test]
    fn relabel() {
        let model = GaussianHmm::from_params(
            &[0.2, 0.3, 0.5],
            &[
                vec![0.8, 0.1, 0.1],
                vec![0.2, 0.7, 0.1],
                vec![0.3, 0.3, 0.4],
            ],
            &[10f64, -5f64, 0f64],
            &[1f64, 2f64, 3f64],
        )
        .unwrap();
        let (sorted, relabel) = model.sorted_by_mean();
        assert_eq!(relabel, vec![2, 0, 1]);
        assert_eq!(sorted.means(), &[-5f64, 0f64, 10f64]);
        assert_eq!(sorted.variances(), &[2f64, 3f64, 1f64]);
        assert_eq!(sorted.initial_distribution(), &[0.3, 0.5, 0.2]);
        for from in 0..3 {
            for to in 0..3 {
                assert_eq!(
                    sorted.transition(relabel[from], relabel[to]),
                    model.transition(from, to)
                );
            }
        }
        let xs = [10.1, -4.9, 0.2, 9.8];
        let decoded = model.decode(&xs).unwrap();
        let decoded_sorted = sorted.decode(&xs).unwrap();
        let mapped: Vec<_> = decoded.iter().map(|&s| relabel[s]).collect();
        assert_eq!(mapped, decoded_sorted);
    }
    #[test]
    fn fixed_initialization() {
        let (xs, answer) = three_clusters();
        let uniform = vec![vec![1f64 / 3f64; 3]; 3];
        let model = GaussianHmm::from_params(
            &[1f64 / 3f64; 3],
            &uniform,
            &[1f64, 90f64, 210f64],
            &[100f64, 100f64, 100f64],
        )
        .unwrap();
        let config = HmmConfig::default();
        let (fit1, report1) = model.refit(&xs, &config).unwrap();
        let (fit2, report2) = model.refit(&xs, &config).unwrap();
        assert_eq!(fit1, fit2);
        assert_eq!(report1, report2);
        assert_eq!(fit1.decode(&xs).unwrap(), answer);
        assert!((fit1.means()[1] - 100f64).abs() < 0.1);
    }
    #[test]
    fn from_params_validation() {
        let ok = GaussianHmm::from_params(&[1f64], &[vec![1f64]], &[0f64], &[1f64]);
        assert!(ok.is_ok());
        let bad_row = GaussianHmm::from_params(
            &[0.5, 0.5],
            &[vec![0.5, 0.6], vec![0.5, 0.5]],
            &[0f64, 1f64],
            &[1f64, 1f64],
        );
        assert!(bad_row.is_err());
        let bad_shape =
            GaussianHmm::from_params(&[0.5, 0.5], &[vec![1f64]], &[0f64, 1f64], &[1f64, 1f64]);
        assert!(bad_shape.is_err());
        let bad_var = GaussianHmm::from_params(&[1f64], &[vec![1f64]], &[0f64], &[0f64]);
        assert!(bad_var.is_err());
        assert!(GaussianHmm::from_params(&[], &[], &[], &[]).is_err());
    }
    #[test]
    fn iteration_cap_is_not_fatal() {
        let config = HmmConfig::new(3, 1).with_seed(7);
        let (model, report) = GaussianHmm::fit(&MONTHLY, &config).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 1);
        assert_eq!(model.decode(&MONTHLY).unwrap().len(), 12);
    }
    #[test]
    fn likelihood_does_not_decrease() {
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(9);
        let xs: Vec<f64> = (0..60)
            .map(|i| {
                let center = if i % 20 < 10 { 0f64 } else { 5f64 };
                center + rng.gen_range(-1f64..1f64)
            })
            .collect();
        let config = HmmConfig::new(2, 50).with_seed(2);
        let (_, report) = GaussianHmm::fit(&xs, &config).unwrap();
        for w in report.history.windows(2) {
            assert!(w[0] <= w[1] + 0.01, "{:?}", report.history);
        }
    }
    #[test]
    fn viterbi_single_state() {
        let model = GaussianHmm::from_params(&[1f64], &[vec![1f64]], &[0f64], &[1f64]).unwrap();
        let (lk, states) = model.viterbi(&[0f64, 1f64]);
        assert_eq!(states, vec![0, 0]);
        let lkt = model.log_likelihood(&[0f64, 1f64]).unwrap();
        assert!((lk - lkt).abs() < 0.000001);
    }
}
