//! The [`Processor`] contract (§4.1 of the engine's design): a fixed-arity
//! DAG node that reads `poly_float` inputs and writes its own `poly_float`
//! outputs once per block.
//!
//! This generalizes [`crate::Effect`] (mono, single in/single out, one
//! sample at a time) to multi-port, block-based, lane-parallel processing —
//! the shape every voice-graph and modulation node in [`crate::graph`] needs.
//! [`crate::Effect`] is unaffected and stays the right fit for the leaf
//! catalogue in `sonido-effects`, which wraps into a [`Processor`] via
//! [`crate::graph::EffectProcessor`].

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::poly::{PolyFloat, PolyMask};

/// A discrete event annotation on an [`Output`], carrying the in-block
/// sample offset at which it fires (§3 `Output`, §GLOSSARY `Trigger`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    /// The value carried by the trigger (e.g. a new MIDI note, a retrigger
    /// phase reset flag).
    pub value: f32,
    /// Sample offset within the current block, in `[0, block_size)`.
    pub offset: usize,
    /// Which lanes this trigger applies to.
    pub mask: PolyMask,
}

/// An owned output buffer belonging to exactly one [`Processor`] (§3
/// `Output`).
///
/// Audio-rate outputs hold one `PolyFloat` per sample of the current
/// (possibly oversampled) block. Control-rate outputs only ever populate
/// index 0; downstream consumers are expected to treat that single sample
/// as constant across the block.
pub struct Output {
    buffer: Vec<PolyFloat>,
    control_rate: bool,
    trigger: Option<Trigger>,
}

impl Output {
    /// Creates a new zeroed output sized for `max_block` samples.
    pub fn new(max_block: usize, control_rate: bool) -> Self {
        let len = if control_rate { 1 } else { max_block.max(1) };
        Self {
            buffer: vec![PolyFloat::ZERO; len],
            control_rate,
            trigger: None,
        }
    }

    /// Whether this output is control-rate (§4.1 scheduling).
    #[inline]
    pub fn is_control_rate(&self) -> bool {
        self.control_rate
    }

    /// Resizes the backing buffer for a new block length. No-op for
    /// control-rate outputs, which are always length 1.
    pub fn resize(&mut self, block_len: usize) {
        if !self.control_rate {
            self.buffer.resize(block_len.max(1), PolyFloat::ZERO);
        }
    }

    /// Read access to the written samples.
    #[inline]
    pub fn as_slice(&self) -> &[PolyFloat] {
        &self.buffer
    }

    /// Write access to the output's buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [PolyFloat] {
        &mut self.buffer
    }

    /// The value a control-rate output broadcasts for the whole block, or
    /// the first sample of an audio-rate output.
    #[inline]
    pub fn constant_value(&self) -> PolyFloat {
        self.buffer.first().copied().unwrap_or(PolyFloat::ZERO)
    }

    /// Clears the buffer to silence.
    pub fn clear(&mut self) {
        for s in &mut self.buffer {
            *s = PolyFloat::ZERO;
        }
    }

    /// Records a trigger on this output for the current block.
    pub fn emit_trigger(&mut self, value: f32, offset: usize, mask: PolyMask) {
        self.trigger = Some(Trigger { value, offset, mask });
    }

    /// Takes (and clears) any trigger emitted this block.
    pub fn take_trigger(&mut self) -> Option<Trigger> {
        self.trigger.take()
    }
}

/// Abstract processing node: fixed input/output arity, per-block `process`,
/// reset semantics, sample-rate/oversample awareness (§4.1).
///
/// Object-safe so a [`crate::graph::ProcessorRouter`] can hold a
/// heterogeneous arena of `Box<dyn Processor>`.
pub trait Processor: Send {
    /// Number of input ports this processor reads.
    fn num_inputs(&self) -> usize;

    /// Number of output ports this processor writes.
    fn num_outputs(&self) -> usize;

    /// Processes `n` samples.
    ///
    /// `inputs[i]` is the current source buffer for input port `i`, sliced
    /// to exactly `n` samples (control-rate sources are broadcast by the
    /// caller — see [`crate::graph::ProcessorRouter`]). `outputs[i]` is this
    /// processor's own output port `i`; implementations must write all `n`
    /// samples of every audio-rate output and index 0 of every control-rate
    /// output.
    ///
    /// # Preconditions
    /// `n` is in `[1, max_block * oversample]`; every input has a connected
    /// source; this is not called re-entrantly.
    fn process(&mut self, inputs: &[&[PolyFloat]], outputs: &mut [Output], n: usize);

    /// Per-lane reinitialization to quiescent state (filter states zeroed,
    /// phase zeroed, etc.) for the lanes selected by `mask`.
    fn reset(&mut self, mask: PolyMask);

    /// Equivalent to `reset(PolyMask::ALL)` plus clearing any delay/reverb
    /// memory. Default forwards to `reset`; processors with long memories
    /// (delay, reverb) override this to also clear that memory.
    fn hard_reset(&mut self) {
        self.reset(PolyMask::ALL);
    }

    /// Recomputes rate-dependent coefficients. Must not allocate on the
    /// audio path.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Recomputes oversample-dependent state. Default is a no-op for
    /// processors with no oversample-dependent behavior.
    fn set_oversample(&mut self, _factor: usize) {}

    /// Reported latency in samples, for router-level latency accounting.
    fn latency_samples(&self) -> usize {
        0
    }

    /// Whether output port `index` is control-rate. Declared per processor
    /// because mixed control/audio outputs are legal (e.g. an envelope's
    /// `value` output is audio-rate, its `phase` status output is
    /// control-rate).
    fn is_control_rate_output(&self, _index: usize) -> bool {
        false
    }

    /// Downcasting hook so a graph owner can reach a specific node's
    /// concrete type (e.g. to deliver a voice trigger) without widening
    /// `process`'s object-safe contract. Implementations return `self`.
    fn as_any_mut(&mut self) -> &mut dyn core::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_rate_output_is_length_one() {
        let out = Output::new(256, true);
        assert_eq!(out.as_slice().len(), 1);
    }

    #[test]
    fn audio_rate_output_matches_block_len() {
        let out = Output::new(256, false);
        assert_eq!(out.as_slice().len(), 256);
    }

    #[test]
    fn resize_is_noop_for_control_rate() {
        let mut out = Output::new(256, true);
        out.resize(512);
        assert_eq!(out.as_slice().len(), 1);
    }

    #[test]
    fn trigger_round_trips_once() {
        let mut out = Output::new(64, false);
        assert!(out.take_trigger().is_none());
        out.emit_trigger(1.0, 12, PolyMask::ALL);
        let t = out.take_trigger().unwrap();
        assert_eq!(t.offset, 12);
        assert!(out.take_trigger().is_none());
    }
}
