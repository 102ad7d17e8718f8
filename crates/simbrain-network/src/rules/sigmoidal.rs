// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! Logistic rule scaled into `[lower, upper]`.

use super::NeuronUpdateRule;
use crate::error::RuleError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidalRule {
    pub slope: f64,
    pub bias: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Default for SigmoidalRule {
    fn default() -> Self {
        Self {
            slope: 1.0,
            bias: 0.0,
            lower: 0.0,
            upper: 1.0,
        }
    }
}

impl NeuronUpdateRule for SigmoidalRule {
    fn name(&self) -> &str {
        "Sigmoidal"
    }

    fn apply(&self, net_input: f64, _activation: f64, _time_step: f64) -> Result<f64, RuleError> {
        if self.upper < self.lower {
            return Err(RuleError::Failed {
                rule: self.name().to_string(),
                reason: format!("upper bound {} below lower bound {}", self.upper, self.lower),
            });
        }
        let logistic = 1.0 / (1.0 + (-(self.slope * net_input + self.bias)).exp());
        Ok(self.lower + (self.upper - self.lower) * logistic)
    }
}
