//! Per-voice audio-rate DSP and its `Processor` wrapper for the shared
//! voice graph (§4.3 "Polyphony packing", §4.8).
//!
//! [`VoiceDsp`] is the payload: two detuned oscillators, a state-variable
//! filter, and amplitude/filter envelopes — the same shape the old
//! per-voice scalar loop used. [`AggregateVoiceProcessor`] wraps a pair of
//! them (one `AggregateVoice`'s worth) as a [`sonido_core::Processor`] node
//! so [`sonido_core::graph::ProcessorRouter`] can schedule it alongside
//! every other aggregate, writing a genuinely independent stereo pair per
//! voice into the lanes `AggregateVoice::lane_mask` describes rather than
//! duplicating one mono sum into both channels.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sonido_core::{Effect, Output, PolyFloat, PolyMask, Processor, StateVariableFilter};

use crate::envelope::{AdsrEnvelope, EnvelopeState};
use crate::oscillator::{Oscillator, OscillatorWaveform};
use crate::voice::{cents_to_ratio, midi_to_freq};

/// Fixed per-slot pan gains `(left, right)`. Slot 0 biased left, slot 1
/// biased right — a modest, constant-power-ish width so two voices packed
/// into one aggregate read as a stereo pair rather than a mono duplicate.
/// Not dynamically controllable; a wider per-voice pan control is future
/// work, not required by anything this engine currently exposes.
const PAN_GAINS: [(f32, f32); 2] = [(1.0, 0.82), (0.82, 1.0)];

/// Audio-rate state for a single voice: two detuned oscillators, a
/// state-variable filter, and amplitude/filter envelopes.
#[derive(Debug, Clone)]
pub struct VoiceDsp {
    osc1: Oscillator,
    osc2: Oscillator,
    filter: StateVariableFilter,
    amp_env: AdsrEnvelope,
    filter_env: AdsrEnvelope,
    base_note: u8,
    osc2_detune_cents: f32,
    osc_mix: f32,
    filter_base_cutoff: f32,
    filter_env_amount: f32,
    velocity_gain: f32,
}

impl VoiceDsp {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            osc1: Oscillator::new(sample_rate),
            osc2: Oscillator::new(sample_rate),
            filter: StateVariableFilter::new(sample_rate),
            amp_env: AdsrEnvelope::new(sample_rate),
            filter_env: AdsrEnvelope::new(sample_rate),
            base_note: 60,
            osc2_detune_cents: 0.0,
            osc_mix: 0.0,
            filter_base_cutoff: 1000.0,
            filter_env_amount: 0.0,
            velocity_gain: 1.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.osc1.set_sample_rate(sample_rate);
        self.osc2.set_sample_rate(sample_rate);
        self.filter.set_sample_rate(sample_rate);
        self.amp_env.set_sample_rate(sample_rate);
        self.filter_env.set_sample_rate(sample_rate);
    }

    pub fn apply_trigger(&mut self, note: u8, velocity: u8, reset: bool, retrigger: bool) {
        self.base_note = note;
        self.velocity_gain = f32::from(velocity) / 127.0;
        self.refresh_pitch();
        if reset {
            self.osc1.sync();
            self.osc2.sync();
        }
        if !retrigger {
            self.amp_env.gate_on();
            self.filter_env.gate_on();
        }
    }

    fn refresh_pitch(&mut self) {
        let freq1 = midi_to_freq(self.base_note);
        let ratio = cents_to_ratio(self.osc2_detune_cents);
        self.osc1.set_frequency(freq1);
        self.osc2.set_frequency(freq1 * ratio);
    }

    pub fn release(&mut self) {
        self.amp_env.gate_off();
        self.filter_env.gate_off();
    }

    pub fn is_silent(&self) -> bool {
        self.amp_env.state() == EnvelopeState::Idle
    }

    pub fn hard_reset(&mut self) {
        self.amp_env.reset();
        self.filter_env.reset();
        self.osc1.reset();
        self.osc2.reset();
        self.filter.reset();
    }

    pub fn set_osc1_waveform(&mut self, waveform: OscillatorWaveform) {
        self.osc1.set_waveform(waveform);
    }

    pub fn set_osc2_waveform(&mut self, waveform: OscillatorWaveform) {
        self.osc2.set_waveform(waveform);
    }

    pub fn set_osc2_detune(&mut self, cents: f32) {
        self.osc2_detune_cents = cents;
        self.refresh_pitch();
    }

    pub fn set_osc_mix(&mut self, mix: f32) {
        self.osc_mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_filter_cutoff(&mut self, freq: f32) {
        self.filter_base_cutoff = freq;
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        self.filter.set_resonance(resonance);
    }

    pub fn set_filter_env_amount(&mut self, amount: f32) {
        self.filter_env_amount = amount;
    }

    pub fn set_amp_attack_ms(&mut self, ms: f32) {
        self.amp_env.set_attack_ms(ms);
    }

    pub fn set_amp_decay_ms(&mut self, ms: f32) {
        self.amp_env.set_decay_ms(ms);
    }

    pub fn set_amp_sustain(&mut self, level: f32) {
        self.amp_env.set_sustain(level);
    }

    pub fn set_amp_release_ms(&mut self, ms: f32) {
        self.amp_env.set_release_ms(ms);
    }

    /// Advances one sample, applying `extra_pitch_semitones`/`extra_filter_hz`
    /// (global LFO/mod-bank routing) on top of this voice's own envelope
    /// modulation, returning its mono contribution before panning.
    fn advance(&mut self, extra_pitch_semitones: f32, extra_filter_hz: f32) -> f32 {
        if extra_pitch_semitones != 0.0 {
            let ratio = cents_to_ratio(extra_pitch_semitones * 100.0);
            let base = midi_to_freq(self.base_note);
            let detune = cents_to_ratio(self.osc2_detune_cents);
            self.osc1.set_frequency(base * ratio);
            self.osc2.set_frequency(base * ratio * detune);
        }

        let s1 = self.osc1.advance();
        let s2 = self.osc2.advance();
        let osc_out = s1 * (1.0 - self.osc_mix) + s2 * self.osc_mix;

        let filter_env_level = self.filter_env.advance();
        let cutoff =
            (self.filter_base_cutoff + extra_filter_hz + filter_env_level * self.filter_env_amount)
                .clamp(20.0, 20_000.0);
        self.filter.set_cutoff(cutoff);
        let filtered = self.filter.process(osc_out);

        let amp = self.amp_env.advance();
        filtered * amp * self.velocity_gain
    }
}

/// The shared voice graph's per-[`crate::voice::AggregateVoice`] node: two
/// [`VoiceDsp`]s, panned and packed into one [`PolyFloat`]'s four lanes
/// (`(slot0_l, slot0_r, slot1_l, slot1_r)`) per sample (§4.3, §4.8).
///
/// Inputs are the engine's shared pitch- and filter-modulation buses (one
/// scalar value per sample, broadcast across lanes); output is the panned
/// stereo pair for both voices this node owns.
pub struct AggregateVoiceProcessor {
    voices: [VoiceDsp; 2],
    aftertouch: [f32; 2],
}

impl AggregateVoiceProcessor {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: [VoiceDsp::new(sample_rate), VoiceDsp::new(sample_rate)],
            aftertouch: [1.0, 1.0],
        }
    }

    pub fn trigger(&mut self, slot: usize, note: u8, velocity: u8, reset: bool, retrigger: bool) {
        self.voices[slot].apply_trigger(note, velocity, reset, retrigger);
        self.aftertouch[slot] = 1.0;
    }

    pub fn release(&mut self, slot: usize) {
        self.voices[slot].release();
    }

    pub fn is_silent(&self, slot: usize) -> bool {
        self.voices[slot].is_silent()
    }

    pub fn hard_reset_voice(&mut self, slot: usize) {
        self.voices[slot].hard_reset();
        self.aftertouch[slot] = 1.0;
    }

    /// `pressure` in `[0, 1]`; maps to a gentle amplitude boost up to +25%,
    /// the classic poly-aftertouch-to-loudness mapping.
    pub fn set_aftertouch(&mut self, slot: usize, pressure: f32) {
        self.aftertouch[slot] = 1.0 + pressure.clamp(0.0, 1.0) * 0.25;
    }

    pub fn set_osc1_waveform(&mut self, waveform: OscillatorWaveform) {
        for v in &mut self.voices {
            v.set_osc1_waveform(waveform);
        }
    }

    pub fn set_osc2_waveform(&mut self, waveform: OscillatorWaveform) {
        for v in &mut self.voices {
            v.set_osc2_waveform(waveform);
        }
    }

    pub fn set_osc2_detune(&mut self, cents: f32) {
        for v in &mut self.voices {
            v.set_osc2_detune(cents);
        }
    }

    pub fn set_osc_mix(&mut self, mix: f32) {
        for v in &mut self.voices {
            v.set_osc_mix(mix);
        }
    }

    pub fn set_filter_cutoff(&mut self, freq: f32) {
        for v in &mut self.voices {
            v.set_filter_cutoff(freq);
        }
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        for v in &mut self.voices {
            v.set_filter_resonance(resonance);
        }
    }

    pub fn set_filter_env_amount(&mut self, amount: f32) {
        for v in &mut self.voices {
            v.set_filter_env_amount(amount);
        }
    }

    pub fn set_amp_attack_ms(&mut self, ms: f32) {
        for v in &mut self.voices {
            v.set_amp_attack_ms(ms);
        }
    }

    pub fn set_amp_decay_ms(&mut self, ms: f32) {
        for v in &mut self.voices {
            v.set_amp_decay_ms(ms);
        }
    }

    pub fn set_amp_sustain(&mut self, level: f32) {
        for v in &mut self.voices {
            v.set_amp_sustain(level);
        }
    }

    pub fn set_amp_release_ms(&mut self, ms: f32) {
        for v in &mut self.voices {
            v.set_amp_release_ms(ms);
        }
    }
}

impl Processor for AggregateVoiceProcessor {
    fn num_inputs(&self) -> usize {
        2
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn process(&mut self, inputs: &[&[PolyFloat]], outputs: &mut [Output], n: usize) {
        let pitch_bus = inputs[0];
        let filter_bus = inputs[1];
        let out = outputs[0].as_mut_slice();
        let (a_l, a_r) = PAN_GAINS[0];
        let (b_l, b_r) = PAN_GAINS[1];
        for i in 0..n {
            let pitch_mod = pitch_bus[i].lane(0);
            let filter_mod = filter_bus[i].lane(0);
            let a = self.voices[0].advance(pitch_mod, filter_mod) * self.aftertouch[0];
            let b = self.voices[1].advance(pitch_mod, filter_mod) * self.aftertouch[1];
            out[i] = PolyFloat::ZERO
                .with_lane(0, a * a_l)
                .with_lane(1, a * a_r)
                .with_lane(2, b * b_l)
                .with_lane(3, b * b_r);
        }
    }

    fn reset(&mut self, mask: PolyMask) {
        if mask.lane(0) || mask.lane(1) {
            self.voices[0].hard_reset();
        }
        if mask.lane(2) || mask.lane(3) {
            self.voices[1].hard_reset();
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for v in &mut self.voices {
            v.set_sample_rate(sample_rate);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

/// Stages the engine's per-sample pitch/filter modulation buses (computed
/// at the oversampled internal rate) onto the graph's input ports. Holds no
/// state of its own beyond the block the engine hands it each call; exists
/// only so the modulation buses are graph inputs like everything else
/// rather than a side channel every [`AggregateVoiceProcessor`] would
/// otherwise need bespoke plumbing to read.
pub struct ModBusSource {
    pitch: Vec<f32>,
    filter: Vec<f32>,
}

impl ModBusSource {
    pub fn new(max_block: usize) -> Self {
        Self { pitch: vec![0.0; max_block.max(1)], filter: vec![0.0; max_block.max(1)] }
    }

    pub fn set_values(&mut self, pitch: &[f32], filter: &[f32]) {
        self.pitch[..pitch.len()].copy_from_slice(pitch);
        self.filter[..filter.len()].copy_from_slice(filter);
    }
}

impl Processor for ModBusSource {
    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn process(&mut self, _inputs: &[&[PolyFloat]], outputs: &mut [Output], n: usize) {
        let (pitch_out, rest) = outputs.split_at_mut(1);
        let pitch_slice = pitch_out[0].as_mut_slice();
        let filter_slice = rest[0].as_mut_slice();
        for i in 0..n {
            pitch_slice[i] = PolyFloat::splat(self.pitch[i]);
            filter_slice[i] = PolyFloat::splat(self.filter[i]);
        }
    }

    fn reset(&mut self, _mask: PolyMask) {}

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn as_any_mut(&mut self) -> &mut dyn core::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_voice_dsp_reports_silent() {
        let voice = VoiceDsp::new(48000.0);
        assert!(voice.is_silent());
    }

    #[test]
    fn triggered_aggregate_produces_distinct_stereo_lanes() {
        let mut agg = AggregateVoiceProcessor::new(48000.0);
        agg.set_amp_attack_ms(0.01);
        agg.trigger(0, 60, 127, true, false);
        agg.trigger(1, 67, 127, true, false);

        let mut out = Output::new(8, false);
        let pitch = [PolyFloat::ZERO; 8];
        let filter = [PolyFloat::ZERO; 8];
        let inputs: [&[PolyFloat]; 2] = [&pitch, &filter];
        agg.process(&inputs, core::slice::from_mut(&mut out), 8);

        let sample = out.as_slice()[4];
        // Different notes at different pan gains should not collapse to a
        // mono duplicate across the two voice pairs.
        assert_ne!(sample.lane(0), sample.lane(2));
    }

    #[test]
    fn aftertouch_boosts_gain() {
        let mut agg = AggregateVoiceProcessor::new(48000.0);
        agg.set_amp_attack_ms(0.01);
        agg.trigger(0, 60, 127, true, false);
        agg.set_aftertouch(0, 1.0);
        assert!(agg.aftertouch[0] > 1.0);
    }

    #[test]
    fn mod_bus_source_broadcasts_scalar_into_all_lanes() {
        let mut src = ModBusSource::new(4);
        src.set_values(&[0.5, 0.5, 0.5, 0.5], &[100.0, 100.0, 100.0, 100.0]);
        let mut pitch_out = Output::new(4, false);
        let mut filter_out = Output::new(4, false);
        let mut outs = [pitch_out, filter_out];
        src.process(&[], &mut outs, 4);
        assert_eq!(outs[0].as_slice()[0].lane(0), 0.5);
        assert_eq!(outs[1].as_slice()[0].lane(3), 100.0);
        pitch_out = Output::new(1, false);
        let _ = pitch_out;
    }
}
