// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Threshold rule switching between two output levels.

use super::NeuronUpdateRule;
use crate::error::RuleError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryRule {
    pub threshold: f64,
    pub bias: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Default for BinaryRule {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            bias: 0.0,
            lower: 0.0,
            upper: 1.0,
        }
    }
}

impl NeuronUpdateRule for BinaryRule {
    fn name(&self) -> &str {
        "Binary"
    }

    fn apply(&self, net_input: f64, _activation: f64, _time_step: f64) -> Result<f64, RuleError> {
        if net_input + self.bias > self.threshold {
            Ok(self.upper)
        } else {
            Ok(self.lower)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let rule = BinaryRule::default();
        assert_eq!(rule.apply(0.5, 0.0, 0.1).unwrap(), 0.0);
        assert_eq!(rule.apply(0.51, 0.0, 0.1).unwrap(), 1.0);
    }
}
