// Copyright 2025 Simbrain Developers
// SPDX-License-Identifier: Apache-2.0

//! # Neuron Groups
//!
//! Groups that need work around a tick implement [`UpdatableGroup`]:
//! - input groups pull the next externally supplied values before any neuron
//!   is computed
//! - output groups flush recorded activations after every neuron committed
//!
//! The engine only sees the capability trait; which kind of group it is never
//! matters to the scheduler.

use crate::error::GroupError;
use crate::ids::NeuronId;
use crate::neuron::NeuronHandle;
use parking_lot::Mutex;

/// Ordered collection of neurons sharing a label
#[derive(Debug, Clone)]
pub struct NeuronGroup {
    label: String,
    neurons: Vec<NeuronHandle>,
}

impl NeuronGroup {
    pub fn new(label: impl Into<String>, neurons: Vec<NeuronHandle>) -> Self {
        Self {
            label: label.into(),
            neurons,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn neurons(&self) -> &[NeuronHandle] {
        &self.neurons
    }

    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    pub fn ids(&self) -> Vec<NeuronId> {
        self.neurons.iter().map(|n| n.id()).collect()
    }

    pub fn activations(&self) -> Vec<f64> {
        self.neurons.iter().map(|n| n.activation()).collect()
    }
}

/// Work a group needs done before dispatch or after commit.
pub trait UpdatableGroup: Send + Sync {
    fn label(&self) -> &str;

    /// Runs on the ticking thread before any neuron update reads activations.
    fn pull_inputs(&self) -> Result<(), GroupError> {
        Ok(())
    }

    /// Runs on the ticking thread after every neuron has committed.
    fn flush_outputs(&self) -> Result<(), GroupError> {
        Ok(())
    }

    /// Undo the most recent `pull_inputs`. Called when the tick that pulled
    /// fails, so its inputs are applied again by the next tick.
    fn rollback_inputs(&self) {}
}

/// A group driven row by row from an input table.
///
/// Its neurons are clamped so the buffered update carries the injected values
/// through the tick unchanged.
pub struct InputGroup {
    group: NeuronGroup,
    table: Vec<Vec<f64>>,
    looping: bool,
    cursor: Mutex<InputCursor>,
}

#[derive(Debug, Default)]
struct InputCursor {
    next_row: usize,
    /// Cursor and activations as they were before the last pull
    undo: Option<(usize, Vec<f64>)>,
}

impl InputGroup {
    pub fn new(group: NeuronGroup, table: Vec<Vec<f64>>, looping: bool) -> Result<Self, GroupError> {
        if table.is_empty() {
            return Err(GroupError::EmptyTable(group.label().to_string()));
        }
        for (row, values) in table.iter().enumerate() {
            if values.len() != group.len() {
                return Err(GroupError::RowWidthMismatch {
                    group: group.label().to_string(),
                    row,
                    expected: group.len(),
                    actual: values.len(),
                });
            }
        }
        for neuron in group.neurons() {
            neuron.set_clamped(true);
        }
        Ok(Self {
            group,
            table,
            looping,
            cursor: Mutex::new(InputCursor::default()),
        })
    }

    pub fn group(&self) -> &NeuronGroup {
        &self.group
    }

    /// Index of the row the next pull will apply
    pub fn cursor(&self) -> usize {
        self.cursor.lock().next_row
    }

    /// Release the clamp on every neuron
    pub fn release(&self) {
        for neuron in self.group.neurons() {
            neuron.set_clamped(false);
        }
    }
}

impl UpdatableGroup for InputGroup {
    fn label(&self) -> &str {
        self.group.label()
    }

    fn pull_inputs(&self) -> Result<(), GroupError> {
        let mut cursor = self.cursor.lock();
        let mut row = cursor.next_row;
        if row >= self.table.len() {
            if !self.looping {
                return Err(GroupError::InputExhausted {
                    group: self.group.label().to_string(),
                    rows: self.table.len(),
                });
            }
            row = 0;
        }
        cursor.undo = Some((cursor.next_row, self.group.activations()));
        for (neuron, value) in self.group.neurons().iter().zip(&self.table[row]) {
            neuron.force_set_activation(*value);
        }
        cursor.next_row = row + 1;
        Ok(())
    }

    fn rollback_inputs(&self) {
        let mut cursor = self.cursor.lock();
        if let Some((next_row, activations)) = cursor.undo.take() {
            for (neuron, value) in self.group.neurons().iter().zip(activations) {
                neuron.force_set_activation(value);
            }
            cursor.next_row = next_row;
        }
    }
}

/// Records a group's activations once per tick.
pub struct ActivationRecorder {
    group: NeuronGroup,
    /// When set, activations above the threshold record as 1.0, others as 0.0
    spike_threshold: Option<f64>,
    records: Mutex<Vec<Vec<f64>>>,
}

impl ActivationRecorder {
    pub fn new(group: NeuronGroup) -> Self {
        Self {
            group,
            spike_threshold: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn recording_spikes(mut self, threshold: f64) -> Self {
        self.spike_threshold = Some(threshold);
        self
    }

    pub fn group(&self) -> &NeuronGroup {
        &self.group
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Drain recorded rows (oldest first)
    pub fn take_records(&self) -> Vec<Vec<f64>> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl UpdatableGroup for ActivationRecorder {
    fn label(&self) -> &str {
        self.group.label()
    }

    fn flush_outputs(&self) -> Result<(), GroupError> {
        let row = match self.spike_threshold {
            Some(threshold) => self
                .group
                .neurons()
                .iter()
                .map(|n| if n.activation() > threshold { 1.0 } else { 0.0 })
                .collect(),
            None => self.group.activations(),
        };
        self.records.lock().push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::Neuron;
    use crate::rules::LinearRule;
    use std::sync::Arc;

    fn group(n: u32) -> NeuronGroup {
        let neurons = (0..n)
            .map(|i| Arc::new(Neuron::new(NeuronId(i), Arc::new(LinearRule::default()))))
            .collect();
        NeuronGroup::new("test", neurons)
    }

    #[test]
    fn test_input_group_clamps_and_applies_rows() {
        let input = InputGroup::new(group(2), vec![vec![0.1, 0.2], vec![0.3, 0.4]], false).unwrap();
        assert!(input.group().neurons().iter().all(|n| n.is_clamped()));

        input.pull_inputs().unwrap();
        assert_eq!(input.group().activations(), vec![0.1, 0.2]);
        input.pull_inputs().unwrap();
        assert_eq!(input.group().activations(), vec![0.3, 0.4]);
        assert!(matches!(
            input.pull_inputs(),
            Err(GroupError::InputExhausted { rows: 2, .. })
        ));
    }

    #[test]
    fn test_looping_input_wraps() {
        let input = InputGroup::new(group(1), vec![vec![1.0], vec![2.0]], true).unwrap();
        for _ in 0..3 {
            input.pull_inputs().unwrap();
        }
        assert_eq!(input.group().activations(), vec![1.0]);
        assert_eq!(input.cursor(), 1);
    }

    #[test]
    fn test_rollback_restores_activations_and_cursor() {
        let input = InputGroup::new(group(2), vec![vec![0.7, 0.9], vec![0.1, 0.2]], true).unwrap();
        input.pull_inputs().unwrap();
        input.pull_inputs().unwrap();
        input.rollback_inputs();
        assert_eq!(input.group().activations(), vec![0.7, 0.9]);
        assert_eq!(input.cursor(), 1);

        // Only the last pull is undone
        input.rollback_inputs();
        assert_eq!(input.cursor(), 1);

        // Undoing a wrapped pull restores the end-of-table cursor
        input.pull_inputs().unwrap();
        input.pull_inputs().unwrap();
        assert_eq!(input.cursor(), 1);
        input.rollback_inputs();
        assert_eq!(input.cursor(), 2);
        assert_eq!(input.group().activations(), vec![0.1, 0.2]);
    }

    #[test]
    fn test_input_row_width_checked() {
        let err = InputGroup::new(group(2), vec![vec![1.0]], false).err().unwrap();
        assert!(matches!(err, GroupError::RowWidthMismatch { expected: 2, actual: 1, .. }));
        assert!(matches!(
            InputGroup::new(group(2), Vec::new(), false),
            Err(GroupError::EmptyTable(_))
        ));
    }

    #[test]
    fn test_recorder_spike_mode() {
        let g = group(3);
        g.neurons()[1].force_set_activation(0.9);
        let recorder = ActivationRecorder::new(g).recording_spikes(0.5);
        recorder.flush_outputs().unwrap();
        recorder.flush_outputs().unwrap();
        let rows = recorder.take_records();
        assert_eq!(rows, vec![vec![0.0, 1.0, 0.0]; 2]);
        assert_eq!(recorder.record_count(), 0);
    }
}
