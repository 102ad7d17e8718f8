// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Linear rule: `a' = slope * input + bias`, optionally clipped.

use super::{clip, NeuronUpdateRule};
use crate::error::RuleError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRule {
    pub slope: f64,
    pub bias: f64,
    /// `Some((lower, upper))` clips the output
    pub clipping: Option<(f64, f64)>,
}

impl LinearRule {
    pub fn new(slope: f64, bias: f64) -> Self {
        Self {
            slope,
            bias,
            clipping: None,
        }
    }

    pub fn with_clipping(mut self, lower: f64, upper: f64) -> Self {
        self.clipping = Some((lower, upper));
        self
    }
}

impl Default for LinearRule {
    fn default() -> Self {
        Self::new(1.0, 0.0).with_clipping(-1.0, 1.0)
    }
}

impl NeuronUpdateRule for LinearRule {
    fn name(&self) -> &str {
        "Linear"
    }

    fn apply(&self, net_input: f64, _activation: f64, _time_step: f64) -> Result<f64, RuleError> {
        let value = self.slope * net_input + self.bias;
        Ok(match self.clipping {
            Some((lower, upper)) => clip(value, lower, upper),
            None => value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_clips_by_default() {
        let rule = LinearRule::default();
        assert_eq!(rule.apply(0.25, 0.0, 0.1).unwrap(), 0.25);
        assert_eq!(rule.apply(5.0, 0.0, 0.1).unwrap(), 1.0);
        assert_eq!(rule.apply(-5.0, 0.0, 0.1).unwrap(), -1.0);
    }

    #[test]
    fn test_linear_unclipped() {
        let rule = LinearRule::new(2.0, 1.0);
        assert_eq!(rule.apply(3.0, 0.0, 0.1).unwrap(), 7.0);
    }
}
