//! Class predictions derived from classifier logits.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::labels::ForgeryClass;

/// Numerically stable softmax over one logits row.
///
/// Subtracts the row maximum before exponentiating so large logits do not
/// overflow.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Index of the largest value. Ties resolve to the lowest index.
#[must_use]
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// A single classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// Index of the predicted class.
    pub class_id: usize,
    /// Label of the predicted class.
    pub class_name: String,
    /// Softmax probability of the predicted class.
    pub confidence: f32,
    /// Softmax probabilities of every class, in wire order.
    pub scores: Vec<f32>,
}

impl Prediction {
    /// Build a prediction from one row of logits.
    ///
    /// # Errors
    ///
    /// Returns an error if the row is empty, contains non-finite values, or
    /// has more entries than there are known classes.
    pub fn from_logits(logits: &[f32]) -> Result<Self> {
        if logits.is_empty() {
            return Err(CoreError::EmptyLogits);
        }
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(CoreError::NonFiniteLogits(logits.to_vec()));
        }

        let scores = softmax(logits);
        let class_id = argmax(&scores);
        let class = ForgeryClass::from_index(class_id)?;

        Ok(Self {
            class_id,
            class_name: class.name().to_string(),
            confidence: scores[class_id],
            scores,
        })
    }

    /// The predicted class.
    pub fn class(&self) -> Result<ForgeryClass> {
        ForgeryClass::from_index(self.class_id)
    }
}
