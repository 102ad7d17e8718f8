// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Neurons and Synapses
//!
//! Every neuron carries two activation slots:
//! - `current`: the value every other neuron reads during a tick
//! - `next`: the value this neuron's update writes during a tick
//!
//! A tick is `compute_next` on every neuron followed by `commit` on every
//! neuron. Because `compute_next` only ever reads `current` slots and only
//! ever writes its own `next` slot, the result does not depend on the order
//! (or the thread) in which neurons are computed.
//!
//! Synapses live in their target's fan-in list and are updated as part of
//! the target's `compute_next`, right before the target's rule runs.

use crate::activation::AtomicActivation;
use crate::error::RuleError;
use crate::ids::{NeuronId, SynapseId};
use crate::rules::NeuronUpdateRule;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Shared handle to a neuron. The update engine treats neurons opaquely
/// through this handle.
pub type NeuronHandle = Arc<Neuron>;

/// A directed connection feeding a target neuron.
pub struct Synapse {
    id: SynapseId,
    source: Weak<Neuron>,
    source_id: NeuronId,
    target_id: NeuronId,
    strength: AtomicActivation,
    /// Post-synaptic response computed during the last update
    psr: AtomicActivation,
}

impl Synapse {
    pub(crate) fn new(id: SynapseId, source: &NeuronHandle, target_id: NeuronId, strength: f64) -> Self {
        Self {
            id,
            source: Arc::downgrade(source),
            source_id: source.id(),
            target_id,
            strength: AtomicActivation::new(strength),
            psr: AtomicActivation::default(),
        }
    }

    pub fn id(&self) -> SynapseId {
        self.id
    }

    pub fn source_id(&self) -> NeuronId {
        self.source_id
    }

    pub fn target_id(&self) -> NeuronId {
        self.target_id
    }

    pub fn strength(&self) -> f64 {
        self.strength.load()
    }

    pub fn set_strength(&self, strength: f64) {
        self.strength.store(strength);
    }

    /// Last computed post-synaptic response
    pub fn psr(&self) -> f64 {
        self.psr.load()
    }

    /// Recompute the post-synaptic response from the source's *current*
    /// activation. A source that no longer exists contributes nothing.
    #[inline]
    pub fn update(&self) -> f64 {
        let source_activation = self
            .source
            .upgrade()
            .map(|source| source.activation())
            .unwrap_or(0.0);
        let psr = self.strength.load() * source_activation;
        self.psr.store(psr);
        psr
    }
}

impl fmt::Debug for Synapse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synapse")
            .field("id", &self.id)
            .field("source", &self.source_id)
            .field("target", &self.target_id)
            .field("strength", &self.strength())
            .finish()
    }
}

/// A neuron with a double-buffered activation.
pub struct Neuron {
    id: NeuronId,
    label: String,
    rule: RwLock<Arc<dyn NeuronUpdateRule>>,
    current: AtomicActivation,
    next: AtomicActivation,
    /// Clamped neurons keep their activation; input groups drive them.
    clamped: AtomicBool,
    fan_in: RwLock<Vec<Arc<Synapse>>>,
}

impl Neuron {
    pub fn new(id: NeuronId, rule: Arc<dyn NeuronUpdateRule>) -> Self {
        Self::with_label(id, format!("n{}", id.0), rule)
    }

    pub fn with_label(id: NeuronId, label: impl Into<String>, rule: Arc<dyn NeuronUpdateRule>) -> Self {
        Self {
            id,
            label: label.into(),
            rule: RwLock::new(rule),
            current: AtomicActivation::default(),
            next: AtomicActivation::default(),
            clamped: AtomicBool::new(false),
            fan_in: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current (committed) activation
    #[inline]
    pub fn activation(&self) -> f64 {
        self.current.load()
    }

    /// Value staged by the last `compute_next`, not yet committed
    pub fn buffered_activation(&self) -> f64 {
        self.next.load()
    }

    /// Write both slots. Used to set initial conditions and by input groups;
    /// must not be called while a tick is computing.
    pub fn force_set_activation(&self, value: f64) {
        self.current.store(value);
        self.next.store(value);
    }

    pub fn is_clamped(&self) -> bool {
        self.clamped.load(Ordering::Acquire)
    }

    pub fn set_clamped(&self, clamped: bool) {
        self.clamped.store(clamped, Ordering::Release);
    }

    pub fn rule_name(&self) -> String {
        self.rule.read().name().to_string()
    }

    pub fn set_update_rule(&self, rule: Arc<dyn NeuronUpdateRule>) {
        *self.rule.write() = rule;
    }

    pub fn fan_in_len(&self) -> usize {
        self.fan_in.read().len()
    }

    /// Snapshot of the afferent synapses
    pub fn fan_in(&self) -> Vec<Arc<Synapse>> {
        self.fan_in.read().clone()
    }

    pub(crate) fn push_afferent(&self, synapse: Arc<Synapse>) {
        self.fan_in.write().push(synapse);
    }

    /// Drop afferents whose source is `source`; returns how many were removed.
    pub(crate) fn remove_afferents_from(&self, source: NeuronId) -> usize {
        let mut fan_in = self.fan_in.write();
        let before = fan_in.len();
        fan_in.retain(|s| s.source_id() != source);
        before - fan_in.len()
    }

    /// Phase one of a buffered update: update afferent synapses, run the rule
    /// and stage the result in `next`. Reads only `current` slots.
    pub fn compute_next(&self, time_step: f64) -> Result<f64, RuleError> {
        let activation = self.current.load();
        if self.is_clamped() {
            self.next.store(activation);
            return Ok(activation);
        }

        let net_input: f64 = self.fan_in.read().iter().map(|s| s.update()).sum();

        let rule = Arc::clone(&self.rule.read());
        let value = rule.apply(net_input, activation, time_step)?;
        if !value.is_finite() {
            return Err(RuleError::NonFinite {
                rule: rule.name().to_string(),
                value,
            });
        }
        self.next.store(value);
        Ok(value)
    }

    /// Phase two: publish the staged value.
    #[inline]
    pub fn commit(&self) {
        self.current.store(self.next.load());
    }
}

impl fmt::Debug for Neuron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neuron")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("activation", &self.activation())
            .field("clamped", &self.is_clamped())
            .field("fan_in", &self.fan_in_len())
            .finish()
    }
}
