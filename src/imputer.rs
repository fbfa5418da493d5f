use serde::{Deserialize, Serialize};

/// Fills a missing value with the mean of the values seen at fit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    fill: f64,
}

impl MeanImputer {
    /// Returns `None` when every value is missing.
    pub fn fit<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let (sum, n) = values
            .into_iter()
            .flatten()
            .fold((0.0_f64, 0_usize), |(sum, n), v| (sum + v, n + 1));
        if n == 0 {
            return None;
        }
        Some(Self {
            fill: sum / n as f64,
        })
    }

    pub fn fill_value(&self) -> f64 {
        self.fill
    }

    pub fn apply(&self, value: Option<f64>) -> f64 {
        value.unwrap_or(self.fill)
    }
}
