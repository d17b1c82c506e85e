//! This module is to generate random symbol sequences and to summarize them by
//! their symbol frequencies. The "shift panel" mimics an environmental change:
//! a set of sequences over the full alphabet followed by a set of sequences whose
//! symbols are restricted to a subset of it.
use crate::error::{HmmClimateError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

pub const DNA: &[u8] = b"ACGT";

/// A non-empty, ordered set of distinct symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Alphabet {
    symbols: Vec<u8>,
}

impl Alphabet {
    pub fn new(symbols: &[u8]) -> Result<Self> {
        if symbols.is_empty() {
            return Err(HmmClimateError::invalid("empty alphabet"));
        }
        for (i, s) in symbols.iter().enumerate() {
            if symbols[..i].contains(s) {
                return Err(HmmClimateError::invalid(format!(
                    "duplicated symbol {} in alphabet",
                    *s as char
                )));
            }
        }
        Ok(Self {
            symbols: symbols.to_vec(),
        })
    }
    /// A, C, G, and T.
    pub fn dna() -> Self {
        Self {
            symbols: DNA.to_vec(),
        }
    }
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }
    pub fn len(&self) -> usize {
        self.symbols.len()
    }
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
    pub fn contains(&self, symbol: u8) -> bool {
        self.symbols.contains(&symbol)
    }
}

impl std::default::Default for Alphabet {
    fn default() -> Self {
        Self::dna()
    }
}

impl From<Alphabet> for String {
    fn from(alphabet: Alphabet) -> Self {
        String::from_utf8_lossy(&alphabet.symbols).to_string()
    }
}

impl TryFrom<String> for Alphabet {
    type Error = HmmClimateError;
    fn try_from(symbols: String) -> Result<Self> {
        Self::new(symbols.as_bytes())
    }
}

impl std::fmt::Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.symbols))
    }
}

/// Random sequence of length `len`, each symbol drawn uniformly from `alphabet`.
pub fn generate_seq_over<T: rand::Rng>(
    rng: &mut T,
    len: usize,
    alphabet: &Alphabet,
) -> Result<Vec<u8>> {
    if len == 0 {
        return Err(HmmClimateError::invalid("sequence length should be positive"));
    }
    Ok((0..len)
        .filter_map(|_| alphabet.symbols.choose(rng))
        .copied()
        .collect())
}

/// Relative frequency of each symbol of a reference alphabet in a sequence.
/// Symbols outside of the reference alphabet are counted in the length but not reported,
/// so the values sum to one only if the sequence is over the alphabet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyTable {
    alphabet: Alphabet,
    freqs: Vec<f64>,
}

impl FrequencyTable {
    pub fn from_seq(seq: &[u8], alphabet: &Alphabet) -> Result<Self> {
        if seq.is_empty() {
            return Err(HmmClimateError::invalid(
                "can not compute frequencies of an empty sequence",
            ));
        }
        let total = seq.len() as f64;
        let freqs = alphabet
            .symbols
            .iter()
            .map(|&s| bytecount::count(seq, s) as f64 / total)
            .collect();
        Ok(Self {
            alphabet: alphabet.clone(),
            freqs,
        })
    }
    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }
    /// Frequency of `symbol`. Zero if the symbol is not in the reference alphabet.
    pub fn get(&self, symbol: u8) -> f64 {
        self.alphabet
            .symbols
            .iter()
            .position(|&s| s == symbol)
            .map(|i| self.freqs[i])
            .unwrap_or(0f64)
    }
    pub fn iter(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.alphabet
            .symbols
            .iter()
            .copied()
            .zip(self.freqs.iter().copied())
    }
    pub fn sum(&self) -> f64 {
        self.freqs.iter().sum()
    }
}

impl std::fmt::Display for FrequencyTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells: Vec<_> = self
            .iter()
            .map(|(s, freq)| format!("{}:{:.3}", s as char, freq))
            .collect();
        write!(f, "{}", cells.join("\t"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    PreChange,
    PostChange,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::PreChange => write!(f, "Pre-change"),
            Phase::PostChange => write!(f, "Post-change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Configurations of the shift panel.
#[serde(default)]
pub struct PanelConfig {
    pub seq_len: usize,
    pub pre_num: usize,
    pub post_num: usize,
    pub alphabet: Alphabet,
    pub shifted_alphabet: Alphabet,
}

impl PanelConfig {
    pub fn new(
        seq_len: usize,
        pre_num: usize,
        post_num: usize,
        alphabet: Alphabet,
        shifted_alphabet: Alphabet,
    ) -> Self {
        Self {
            seq_len,
            pre_num,
            post_num,
            alphabet,
            shifted_alphabet,
        }
    }
    /// Check the sequence length is positive and every shifted symbol is in `alphabet`.
    pub fn validate(&self) -> Result<()> {
        if self.seq_len == 0 {
            return Err(HmmClimateError::invalid("sequence length should be positive"));
        }
        if let Some(&b) = self
            .shifted_alphabet
            .symbols()
            .iter()
            .find(|&&b| !self.alphabet.contains(b))
        {
            return Err(HmmClimateError::invalid(format!(
                "shifted symbol {} is not in the alphabet {}",
                b as char, self.alphabet
            )));
        }
        Ok(())
    }
}

impl std::default::Default for PanelConfig {
    fn default() -> Self {
        Self {
            seq_len: 1000,
            pre_num: 10,
            post_num: 10,
            alphabet: Alphabet::dna(),
            shifted_alphabet: Alphabet {
                symbols: b"AC".to_vec(),
            },
        }
    }
}

/// Frequency tables of sequences before and after the change.
/// Every row is reported over the full alphabet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftPanel {
    pub rows: Vec<(Phase, FrequencyTable)>,
}

impl ShiftPanel {
    pub fn generate<R: Rng>(rng: &mut R, config: &PanelConfig) -> Result<Self> {
        use rayon::prelude::*;
        config.validate()?;
        // Seeds are fixed before the parallel part, so the panel does not depend on scheduling.
        let jobs: Vec<(Phase, u64)> = std::iter::repeat(Phase::PreChange)
            .take(config.pre_num)
            .chain(std::iter::repeat(Phase::PostChange).take(config.post_num))
            .map(|phase| (phase, rng.gen()))
            .collect();
        let rows = jobs
            .into_par_iter()
            .map(|(phase, seed)| {
                let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
                let alphabet = match phase {
                    Phase::PreChange => &config.alphabet,
                    Phase::PostChange => &config.shifted_alphabet,
                };
                let seq = generate_seq_over(&mut rng, config.seq_len, alphabet)?;
                let freqs = FrequencyTable::from_seq(&seq, &config.alphabet)?;
                Ok((phase, freqs))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Generated {} sequences ({} pre, {} post)",
            rows.len(),
            config.pre_num,
            config.post_num
        );
        Ok(Self { rows })
    }
    /// Mean frequency of `symbol` in the given phase.
    pub fn mean(&self, phase: Phase, symbol: u8) -> Option<f64> {
        let freqs: Vec<_> = self
            .rows
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, table)| table.get(symbol))
            .collect();
        if freqs.is_empty() {
            None
        } else {
            Some(freqs.iter().sum::<f64>() / freqs.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoroshiro128PlusPlus;
    #[test]
    fn alphabet_test() {
        assert!(Alphabet::new(b"").is_err());
        assert!(Alphabet::new(b"ACA").is_err());
        let alphabet = Alphabet::new(b"AC").unwrap();
        assert_eq!(alphabet.len(), 2);
        assert!(alphabet.contains(b'C'));
        assert!(!alphabet.contains(b'G'));
        assert_eq!(Alphabet::default(), Alphabet::dna());
        assert_eq!(format!("{}", Alphabet::dna()), "ACGT");
    }
    #[test]
    fn generate_test() {
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(4);
        let seq = generate_seq_over(&mut rng, 100, &Alphabet::dna()).unwrap();
        assert_eq!(seq.len(), 100);
        assert!(seq.iter().all(|b| DNA.contains(b)));
        let alphabet = Alphabet::new(b"GT").unwrap();
        let seq = generate_seq_over(&mut rng, 50, &alphabet).unwrap();
        assert_eq!(seq.len(), 50);
        assert!(seq.iter().all(|&b| b == b'G' || b == b'T'));
        assert!(generate_seq_over(&mut rng, 0, &alphabet).is_err());
    }
    #[test]
    fn frequency_sum_test() {
        let dna = Alphabet::dna();
        for seed in 0..20u64 {
            let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(seed);
            let len = 1 + seed as usize * 37;
            let seq = generate_seq_over(&mut rng, len, &dna).unwrap();
            let freqs = FrequencyTable::from_seq(&seq, &dna).unwrap();
            assert!((freqs.sum() - 1f64).abs() < 0.000001, "{}", freqs);
            assert!(freqs.iter().all(|(_, f)| (0f64..=1f64).contains(&f)));
        }
    }
    #[test]
    fn frequency_restricted_test() {
        let dna = Alphabet::dna();
        let ac = Alphabet::new(b"AC").unwrap();
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(10);
        let seq = generate_seq_over(&mut rng, 1000, &ac).unwrap();
        let freqs = FrequencyTable::from_seq(&seq, &dna).unwrap();
        assert_eq!(freqs.get(b'G'), 0f64);
        assert_eq!(freqs.get(b'T'), 0f64);
        assert!((freqs.get(b'A') + freqs.get(b'C') - 1f64).abs() < 0.000001);
    }
    #[test]
    fn frequency_exact_test() {
        let dna = Alphabet::dna();
        let freqs = FrequencyTable::from_seq(b"AACG", &dna).unwrap();
        assert_eq!(freqs.get(b'A'), 0.5);
        assert_eq!(freqs.get(b'C'), 0.25);
        assert_eq!(freqs.get(b'G'), 0.25);
        assert_eq!(freqs.get(b'T'), 0f64);
        assert_eq!(freqs.get(b'N'), 0f64);
        assert!(FrequencyTable::from_seq(b"", &dna).is_err());
    }
    #[test]
    fn shift_panel_test() {
        let config = PanelConfig::new(200, 4, 3, Alphabet::dna(), Alphabet::new(b"AC").unwrap());
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(32);
        let panel = ShiftPanel::generate(&mut rng, &config).unwrap();
        assert_eq!(panel.rows.len(), 7);
        assert!(panel.rows[..4].iter().all(|(p, _)| *p == Phase::PreChange));
        assert!(panel.rows[4..].iter().all(|(p, _)| *p == Phase::PostChange));
        for (_, table) in panel.rows[4..].iter() {
            assert_eq!(table.get(b'G'), 0f64);
            assert_eq!(table.get(b'T'), 0f64);
        }
        assert_eq!(panel.mean(Phase::PostChange, b'T'), Some(0f64));
        assert!(panel.mean(Phase::PreChange, b'T').unwrap() > 0f64);
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(32);
        let again = ShiftPanel::generate(&mut rng, &config).unwrap();
        assert_eq!(panel, again);
    }
    #[test]
    fn shift_panel_alphabet_test() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(32);
        let config = PanelConfig::new(100, 2, 2, Alphabet::dna(), Alphabet::new(b"XY").unwrap());
        assert!(config.validate().is_err());
        assert!(matches!(
            ShiftPanel::generate(&mut rng, &config),
            Err(HmmClimateError::InvalidInput(_))
        ));
        let config = PanelConfig::new(100, 2, 2, Alphabet::dna(), Alphabet::new(b"AN").unwrap());
        assert!(ShiftPanel::generate(&mut rng, &config).is_err());
        let config = PanelConfig {
            seq_len: 0,
            ..PanelConfig::default()
        };
        assert!(ShiftPanel::generate(&mut rng, &config).is_err());
        assert!(PanelConfig::default().validate().is_ok());
    }
}
