//! Synthetic DNA/climate datasets and latent regime detection by Gaussian hidden Markov models.
//!
//! The computational parts are:
//! 1. [gen_seq]: random symbol sequences and their frequency tables,
//! 2. [regime_shift]: the super-diagonal matrix of step-to-step changes of a series,
//! 3. [ghmm]: Baum-Welch fitting and Viterbi decoding of a Gaussian HMM.
//!
//! [analysis::run] chains them on a [config::StationDataset], and [render] prints the result.
#[macro_use]
extern crate log;
pub mod analysis;
pub mod candle;
pub mod config;
pub mod error;
pub mod gen_seq;
pub mod ghmm;
pub mod regime_shift;
pub mod render;

pub use error::{HmmClimateError, Result};
pub use ghmm::{fit_decode, FitReport, GaussianHmm, HmmConfig};
