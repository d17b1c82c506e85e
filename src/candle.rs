//! Synthetic candlesticks around each observation of a series.
use crate::error::{HmmClimateError, Result};
use serde::{Deserialize, Serialize};

/// How the candle should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Rising,
    Falling,
    Drought,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub value: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub drought: bool,
}

impl Candle {
    /// open/close = v + U(-2,2), high = v + U(0,5), low = v - U(0,5).
    /// A value strictly below `drought_threshold` is a drought.
    pub fn new<R: rand::Rng>(rng: &mut R, value: f64, drought_threshold: f64) -> Self {
        let open = value + rng.gen_range(-2f64..2f64);
        let high = value + rng.gen_range(0f64..5f64);
        let low = value - rng.gen_range(0f64..5f64);
        let close = value + rng.gen_range(-2f64..2f64);
        Self {
            value,
            open,
            high,
            low,
            close,
            drought: value < drought_threshold,
        }
    }
    pub fn from_series<R: rand::Rng>(
        rng: &mut R,
        series: &[f64],
        drought_threshold: f64,
    ) -> Result<Vec<Self>> {
        if series.is_empty() {
            return Err(HmmClimateError::invalid("candles of an empty series"));
        }
        Ok(series
            .iter()
            .map(|&v| Self::new(rng, v, drought_threshold))
            .collect())
    }
    pub fn tone(&self) -> Tone {
        if self.drought {
            Tone::Drought
        } else if self.open < self.close {
            Tone::Rising
        } else {
            Tone::Falling
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    #[test]
    fn candle_range() {
        let series = [7., 8., 9., 10., 14., 15., 16., 17., 18., 19., 20., 21.];
        for seed in 0..20u64 {
            let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(seed);
            let candles = Candle::from_series(&mut rng, &series, 10f64).unwrap();
            assert_eq!(candles.len(), 12);
            for (c, &v) in candles.iter().zip(series.iter()) {
                assert!(c.low <= v && v <= c.high);
                assert!((c.open - v).abs() <= 2f64);
                assert!((c.close - v).abs() <= 2f64);
                assert_eq!(c.drought, v < 10f64);
            }
            let droughts = candles.iter().filter(|c| c.tone() == Tone::Drought).count();
            assert_eq!(droughts, 3);
        }
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(0);
        assert!(Candle::from_series(&mut rng, &[], 10f64).is_err());
    }
    #[test]
    fn tone() {
        let candle = |open, close, drought| Candle {
            value: 1f64,
            open,
            high: 3f64,
            low: 0f64,
            close,
            drought,
        };
        assert_eq!(candle(1f64, 2f64, false).tone(), Tone::Rising);
        assert_eq!(candle(2f64, 1f64, false).tone(), Tone::Falling);
        assert_eq!(candle(1f64, 1f64, false).tone(), Tone::Falling);
        assert_eq!(candle(1f64, 2f64, true).tone(), Tone::Drought);
    }
}
