// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Network
//!
//! The live neuron/synapse graph. Editing happens from any thread (editor,
//! scripts, simulation) and every membership change is announced to the
//! registered [`NetworkListener`]s on the calling thread.
//!
//! Listeners are held weakly: dropping the listener is enough to stop
//! receiving events, `remove_listener` just makes it explicit.

use crate::activation::AtomicActivation;
use crate::error::{NetworkError, Result};
use crate::groups::NeuronGroup;
use crate::ids::{ListenerId, NeuronId, SynapseId};
use crate::neuron::{Neuron, NeuronHandle, Synapse};
use crate::rules::NeuronUpdateRule;
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Receives neuron membership changes.
///
/// Called synchronously from whichever thread edited the network, possibly
/// while a tick is running, so implementations must be cheap and thread-safe.
pub trait NetworkListener: Send + Sync {
    fn neuron_added(&self, neuron: &NeuronHandle);
    fn neuron_removed(&self, neuron: &NeuronHandle);
}

pub struct Network {
    neurons: RwLock<AHashMap<NeuronId, NeuronHandle>>,
    next_neuron_id: AtomicU32,
    next_synapse_id: AtomicU32,
    synapse_count: AtomicU64,
    time_step: AtomicActivation,
    listeners: RwLock<Vec<(ListenerId, Weak<dyn NetworkListener>)>>,
    next_listener_id: AtomicU64,
}

impl Network {
    pub fn new(time_step: f64) -> Result<Self> {
        validate_time_step(time_step)?;
        Ok(Self {
            neurons: RwLock::new(AHashMap::new()),
            next_neuron_id: AtomicU32::new(0),
            next_synapse_id: AtomicU32::new(0),
            synapse_count: AtomicU64::new(0),
            time_step: AtomicActivation::new(time_step),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        })
    }

    pub fn time_step(&self) -> f64 {
        self.time_step.load()
    }

    pub fn set_time_step(&self, time_step: f64) -> Result<()> {
        validate_time_step(time_step)?;
        self.time_step.store(time_step);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Listeners
    // ═══════════════════════════════════════════════════════════

    pub fn add_listener(&self, listener: Weak<dyn NetworkListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().iter().filter(|(_, l)| l.strong_count() > 0).count()
    }

    /// Upgrade live listeners and prune dead ones. Events are delivered
    /// without holding the listener lock.
    fn live_listeners(&self) -> Vec<Arc<dyn NetworkListener>> {
        let mut live = Vec::new();
        let mut saw_dead = false;
        for (_, listener) in self.listeners.read().iter() {
            match listener.upgrade() {
                Some(l) => live.push(l),
                None => saw_dead = true,
            }
        }
        if saw_dead {
            self.listeners.write().retain(|(_, l)| l.strong_count() > 0);
        }
        live
    }

    fn emit_added(&self, neurons: &[NeuronHandle]) {
        for listener in self.live_listeners() {
            for neuron in neurons {
                listener.neuron_added(neuron);
            }
        }
    }

    fn emit_removed(&self, neurons: &[NeuronHandle]) {
        for listener in self.live_listeners() {
            for neuron in neurons {
                listener.neuron_removed(neuron);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Neurons
    // ═══════════════════════════════════════════════════════════

    fn create_neuron(&self, label: Option<String>, rule: Arc<dyn NeuronUpdateRule>) -> NeuronHandle {
        let id = NeuronId(self.next_neuron_id.fetch_add(1, Ordering::Relaxed));
        let neuron = match label {
            Some(label) => Neuron::with_label(id, label, rule),
            None => Neuron::new(id, rule),
        };
        let handle = Arc::new(neuron);
        self.neurons.write().insert(id, Arc::clone(&handle));
        handle
    }

    pub fn add_neuron(&self, rule: Arc<dyn NeuronUpdateRule>) -> NeuronHandle {
        let handle = self.create_neuron(None, rule);
        trace!("[NETWORK] Added {}", handle.id());
        self.emit_added(std::slice::from_ref(&handle));
        handle
    }

    /// Add `count` neurons sharing one rule; listeners see one event per neuron.
    pub fn add_neuron_group(
        &self,
        label: impl Into<String>,
        count: usize,
        rule: Arc<dyn NeuronUpdateRule>,
    ) -> NeuronGroup {
        let label = label.into();
        let neurons: Vec<NeuronHandle> = (0..count)
            .map(|i| self.create_neuron(Some(format!("{}[{}]", label, i)), Arc::clone(&rule)))
            .collect();
        debug!("[NETWORK] Added group '{}' with {} neurons", label, neurons.len());
        self.emit_added(&neurons);
        NeuronGroup::new(label, neurons)
    }

    /// Remove a neuron and every synapse it sources.
    pub fn remove_neuron(&self, id: NeuronId) -> Result<NeuronHandle> {
        let removed = self
            .neurons
            .write()
            .remove(&id)
            .ok_or(NetworkError::NeuronNotFound(id))?;
        self.strip_efferents(&[id]);
        self.synapse_count
            .fetch_sub(removed.fan_in_len() as u64, Ordering::Relaxed);
        trace!("[NETWORK] Removed {}", id);
        self.emit_removed(std::slice::from_ref(&removed));
        Ok(removed)
    }

    /// Remove every neuron of `group` still present in the network.
    pub fn remove_neuron_group(&self, group: &NeuronGroup) -> Vec<NeuronHandle> {
        let removed: Vec<NeuronHandle> = {
            let mut neurons = self.neurons.write();
            group
                .neurons()
                .iter()
                .filter_map(|n| neurons.remove(&n.id()))
                .collect()
        };
        let ids: Vec<NeuronId> = removed.iter().map(|n| n.id()).collect();
        self.strip_efferents(&ids);
        let fan_in: usize = removed.iter().map(|n| n.fan_in_len()).sum();
        self.synapse_count.fetch_sub(fan_in as u64, Ordering::Relaxed);
        debug!("[NETWORK] Removed group '{}' ({} neurons)", group.label(), removed.len());
        self.emit_removed(&removed);
        removed
    }

    fn strip_efferents(&self, sources: &[NeuronId]) {
        if sources.is_empty() {
            return;
        }
        let remaining: Vec<NeuronHandle> = self.neurons.read().values().cloned().collect();
        let mut stripped = 0usize;
        for neuron in &remaining {
            for source in sources {
                stripped += neuron.remove_afferents_from(*source);
            }
        }
        self.synapse_count.fetch_sub(stripped as u64, Ordering::Relaxed);
    }

    pub fn neuron(&self, id: NeuronId) -> Option<NeuronHandle> {
        self.neurons.read().get(&id).cloned()
    }

    /// Snapshot of all neurons ordered by id
    pub fn neurons(&self) -> Vec<NeuronHandle> {
        let mut neurons: Vec<NeuronHandle> = self.neurons.read().values().cloned().collect();
        neurons.sort_unstable_by_key(|n| n.id());
        neurons
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.read().len()
    }

    // ═══════════════════════════════════════════════════════════
    // Synapses
    // ═══════════════════════════════════════════════════════════

    /// Connect `source -> target`; the synapse is appended to the target's fan-in.
    pub fn connect(&self, source: NeuronId, target: NeuronId, strength: f64) -> Result<SynapseId> {
        let (source, target) = {
            let neurons = self.neurons.read();
            let source = neurons
                .get(&source)
                .cloned()
                .ok_or(NetworkError::NeuronNotFound(source))?;
            let target = neurons
                .get(&target)
                .cloned()
                .ok_or(NetworkError::NeuronNotFound(target))?;
            (source, target)
        };
        let id = SynapseId(self.next_synapse_id.fetch_add(1, Ordering::Relaxed));
        target.push_afferent(Arc::new(Synapse::new(id, &source, target.id(), strength)));
        self.synapse_count.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    pub fn synapse_count(&self) -> u64 {
        self.synapse_count.load(Ordering::Relaxed)
    }

    /// Activations of every neuron, ordered by id
    pub fn activations(&self) -> Vec<(NeuronId, f64)> {
        self.neurons()
            .iter()
            .map(|n| (n.id(), n.activation()))
            .collect()
    }
}

fn validate_time_step(time_step: f64) -> Result<()> {
    if time_step.is_finite() && time_step > 0.0 {
        Ok(())
    } else {
        Err(NetworkError::InvalidTimeStep(time_step))
    }
}
