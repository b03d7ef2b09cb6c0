//! Top-level synthesizer assembly (§4.8): voice handler driving a shared
//! [`ProcessorRouter`] voice graph, global LFOs, a modulation bank, a
//! reorderable effect chain running at the oversampled internal rate,
//! master gain, DC blocking, and peak metering.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec, vec::Vec};

use sonido_core::graph::{NodeId, ProcessorRouter};
use sonido_core::oversample_fir::MAX_HOST_BLOCK;
use sonido_core::{
    DcBlocker, Effect, Lfo, LfoWaveform, ModulationConnectionBank, ModulationError, PolyFloat,
    SmoothedParam, TempoManager, VoiceGraphOversampler,
};

use crate::oscillator::OscillatorWaveform;
use crate::voice::{AggregateVoice, Voice, VoiceHandler, VoiceKeyState, VoiceOverride, VoicePriority};
use crate::voice_graph::{AggregateVoiceProcessor, ModBusSource};

/// Named modulation sources the engine exposes to the [`ModulationConnectionBank`].
pub const SOURCE_LFO1: &str = "lfo1";
/// See [`SOURCE_LFO1`].
pub const SOURCE_LFO2: &str = "lfo2";

/// Named modulation destinations the engine exposes.
pub const DEST_PITCH: &str = "pitch";
/// See [`DEST_PITCH`].
pub const DEST_FILTER_CUTOFF: &str = "filter_cutoff";

/// Pitch wheel full-deflection range, a common default bend width.
const PITCH_BEND_RANGE_SEMITONES: f32 = 2.0;

/// Names addressable through [`SoundEngine::controls`].
pub const CONTROL_NAMES: [&str; 9] = [
    "master_gain",
    "filter_cutoff",
    "filter_resonance",
    "filter_env_amount",
    "osc_mix",
    "osc2_detune_cents",
    "lfo1_rate",
    "lfo2_rate",
    "bpm",
];

/// A snapshot of named, slow-rate-readable control values (§6
/// `controls()[name]`), indexable by name; an unknown name reads as `0.0`
/// rather than panicking, matching `get_status_output`'s "absent means
/// none" contract.
#[derive(Debug, Clone, Copy)]
pub struct Controls {
    values: [f32; CONTROL_NAMES.len()],
}

impl core::ops::Index<&str> for Controls {
    type Output = f32;

    fn index(&self, name: &str) -> &f32 {
        const ZERO: f32 = 0.0;
        match CONTROL_NAMES.iter().position(|&n| n == name) {
            Some(i) => &self.values[i],
            None => &ZERO,
        }
    }
}

/// Simple peak-hold-with-decay meter, read by a UI at a slow rate. Not
/// present in the teacher's crate; grounded on [`sonido_core::EnvelopeFollower`]'s
/// one-pole-decay shape, applied to `abs(sample)` instead of a rectified
/// envelope follower so it reports true peaks rather than a smoothed RMS-ish
/// contour.
#[derive(Debug, Clone, Copy)]
pub struct PeakMeter {
    peak: f32,
    decay_coeff: f32,
}

impl PeakMeter {
    /// Builds a meter whose peak falls to roughly -60dB over `decay_ms`.
    pub fn new(sample_rate: f32, decay_ms: f32) -> Self {
        let samples = (decay_ms * sample_rate / 1000.0).max(1.0);
        Self {
            peak: 0.0,
            decay_coeff: libm::expf(-1.0 / samples),
        }
    }

    fn update(&mut self, sample: f32) {
        let a = sample.abs();
        self.peak = if a > self.peak { a } else { self.peak * self.decay_coeff };
    }

    /// Current peak reading, linear scale.
    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn reset(&mut self) {
        self.peak = 0.0;
    }
}

/// Downcasts node `id`'s boxed processor to the concrete aggregate-voice
/// type. Free function (not a `&mut self` method) so callers can hold an
/// outstanding borrow of `engine.voices` — a disjoint field — across the
/// call.
///
/// # Panics
/// Panics if `id` does not name a live node, or names one that isn't an
/// [`AggregateVoiceProcessor`]. Both are internal invariants: every ID in
/// [`SoundEngine::aggregates`] is constructed by [`build_router`] and never
/// removed.
fn aggregate_processor(router: &mut ProcessorRouter, id: NodeId) -> &mut AggregateVoiceProcessor {
    router
        .processor_mut(id)
        .expect("aggregate node must be live")
        .as_any_mut()
        .downcast_mut::<AggregateVoiceProcessor>()
        .expect("node must be an AggregateVoiceProcessor")
}

fn mod_bus_processor(router: &mut ProcessorRouter, id: NodeId) -> &mut ModBusSource {
    router
        .processor_mut(id)
        .expect("mod bus node must be live")
        .as_any_mut()
        .downcast_mut::<ModBusSource>()
        .expect("node must be a ModBusSource")
}

/// Builds the static voice graph topology: one [`ModBusSource`] feeding
/// `aggregate_count` [`AggregateVoiceProcessor`]s in parallel. Never mutated
/// again after construction — `AGGREGATES` is fixed at the type level, so
/// there is no reason to add or remove a node later (§4.3 "Polyphony
/// packing").
fn build_router(internal_rate: f32, aggregate_count: usize) -> (ProcessorRouter, NodeId, Vec<NodeId>) {
    let max_internal_block = MAX_HOST_BLOCK * 8;
    let mut router = ProcessorRouter::new(internal_rate, max_internal_block);
    let mod_bus = router.add_processor(Box::new(ModBusSource::new(max_internal_block)));
    let mut aggregates = Vec::with_capacity(aggregate_count);
    for _ in 0..aggregate_count {
        let agg = router.add_processor(Box::new(AggregateVoiceProcessor::new(internal_rate)));
        router.connect(mod_bus, 0, agg, 0).expect("mod bus pitch port must connect");
        router.connect(mod_bus, 1, agg, 1).expect("mod bus filter port must connect");
        aggregates.push(agg);
    }
    router.compile().expect("static voice graph topology must compile");
    (router, mod_bus, aggregates)
}

/// The complete polyphonic synthesis engine: `2 * AGGREGATES` voices routed
/// through a shared [`ProcessorRouter`] voice graph, global LFOs routed
/// through a modulation bank, a reorderable effect chain running at the
/// oversampled internal rate, master gain, DC blocking, and peak metering
/// (§4.8).
pub struct SoundEngine<const AGGREGATES: usize> {
    voices: VoiceHandler<AGGREGATES>,
    router: ProcessorRouter,
    mod_bus: NodeId,
    aggregates: Vec<NodeId>,

    lfo1: Lfo,
    lfo2: Lfo,
    mod_bank: ModulationConnectionBank,
    lfo1_to_pitch: f32,
    lfo1_to_filter: f32,
    lfo2_to_pitch: f32,
    lfo2_to_filter: f32,
    mod_wheel: f32,
    pitch_bend_semitones: f32,
    global_tuning_cents: f32,
    tempo: TempoManager,

    effects: Vec<Box<dyn Effect>>,
    oversampler: VoiceGraphOversampler,
    mod_oversampler: VoiceGraphOversampler,
    input_oversampler: VoiceGraphOversampler,
    oversample_factor: usize,

    master_gain: SmoothedParam,
    dc_blocker_l: DcBlocker,
    dc_blocker_r: DcBlocker,
    peak_meter_l: PeakMeter,
    peak_meter_r: PeakMeter,

    sample_rate: f32,

    // §6 controls() readback cache - the per-voice-broadcast model has no
    // other path to recover a previously-set value.
    master_gain_cached: f32,
    cutoff_cached: f32,
    resonance_cached: f32,
    filter_env_amount_cached: f32,
    osc_mix_cached: f32,
    osc2_detune_cached: f32,
    lfo1_rate_cached: f32,
    lfo2_rate_cached: f32,

    // Scratch buffers, sized once to the worst case (host block capped at
    // MAX_HOST_BLOCK, oversample factor up to 8x) so the audio path never
    // allocates.
    mod_pitch_host: Vec<f32>,
    mod_filter_host: Vec<f32>,
    packed_mod_host: Vec<PolyFloat>,
    packed_mod_internal: Vec<PolyFloat>,
    mod_pitch_internal: Vec<f32>,
    mod_filter_internal: Vec<f32>,
    voice_mix_internal: Vec<PolyFloat>,
    extra_packed_host: Vec<PolyFloat>,
    extra_packed_internal: Vec<PolyFloat>,
    stereo_internal: Vec<PolyFloat>,
    left_internal: Vec<f32>,
    right_internal: Vec<f32>,
    stereo_down: Vec<PolyFloat>,
}

impl<const AGGREGATES: usize> SoundEngine<AGGREGATES> {
    /// Builds an engine with `2 * AGGREGATES` voices of polyphony at
    /// `sample_rate`, oversample factor 1 (no oversampling) by default.
    pub fn new(sample_rate: f32) -> Self {
        let max_internal_block = MAX_HOST_BLOCK * 8;
        let (router, mod_bus, aggregates) = build_router(sample_rate, AGGREGATES);
        let mut tempo = TempoManager::new(sample_rate, 120.0);
        tempo.play();
        Self {
            voices: VoiceHandler::new(sample_rate, 64),
            router,
            mod_bus,
            aggregates,
            lfo1: Lfo::new(sample_rate, 5.0),
            lfo2: Lfo::new(sample_rate, 0.5),
            mod_bank: ModulationConnectionBank::new(),
            lfo1_to_pitch: 0.0,
            lfo1_to_filter: 0.0,
            lfo2_to_pitch: 0.0,
            lfo2_to_filter: 0.0,
            mod_wheel: 1.0,
            pitch_bend_semitones: 0.0,
            global_tuning_cents: 0.0,
            tempo,
            effects: Vec::new(),
            oversampler: VoiceGraphOversampler::new(1, sample_rate),
            mod_oversampler: VoiceGraphOversampler::new(1, sample_rate),
            input_oversampler: VoiceGraphOversampler::new(1, sample_rate),
            oversample_factor: 1,
            master_gain: SmoothedParam::with_config(1.0, sample_rate, 5.0),
            dc_blocker_l: DcBlocker::new(sample_rate),
            dc_blocker_r: DcBlocker::new(sample_rate),
            peak_meter_l: PeakMeter::new(sample_rate, 300.0),
            peak_meter_r: PeakMeter::new(sample_rate, 300.0),
            sample_rate,
            master_gain_cached: 1.0,
            cutoff_cached: 1000.0,
            resonance_cached: 0.707,
            filter_env_amount_cached: 0.0,
            osc_mix_cached: 0.0,
            osc2_detune_cached: 0.0,
            lfo1_rate_cached: 5.0,
            lfo2_rate_cached: 0.5,
            mod_pitch_host: vec![0.0; MAX_HOST_BLOCK],
            mod_filter_host: vec![0.0; MAX_HOST_BLOCK],
            packed_mod_host: vec![PolyFloat::ZERO; MAX_HOST_BLOCK],
            packed_mod_internal: vec![PolyFloat::ZERO; max_internal_block],
            mod_pitch_internal: vec![0.0; max_internal_block],
            mod_filter_internal: vec![0.0; max_internal_block],
            voice_mix_internal: vec![PolyFloat::ZERO; max_internal_block],
            extra_packed_host: vec![PolyFloat::ZERO; MAX_HOST_BLOCK],
            extra_packed_internal: vec![PolyFloat::ZERO; max_internal_block],
            stereo_internal: vec![PolyFloat::ZERO; max_internal_block],
            left_internal: vec![0.0; max_internal_block],
            right_internal: vec![0.0; max_internal_block],
            stereo_down: vec![PolyFloat::ZERO; MAX_HOST_BLOCK],
        }
    }

    fn internal_sample_rate(&self) -> f32 {
        self.sample_rate * self.oversample_factor as f32
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.voices.set_sample_rate_and_block(sample_rate, 64);
        let internal_rate = self.internal_sample_rate();
        self.router.set_sample_rate(internal_rate);
        self.lfo1.set_sample_rate(sample_rate);
        self.lfo2.set_sample_rate(sample_rate);
        for effect in &mut self.effects {
            effect.set_sample_rate(internal_rate);
        }
        self.oversampler.reconfigure(self.oversample_factor, sample_rate);
        self.mod_oversampler.reconfigure(self.oversample_factor, sample_rate);
        self.input_oversampler.reconfigure(self.oversample_factor, sample_rate);
        self.master_gain.set_sample_rate(sample_rate);
        self.tempo.set_sample_rate(sample_rate);
    }

    /// Sets the internal oversample multiplier the voice graph and effect
    /// chain run at (one of 1, 2, 4, 8). Per §4.6, changing this hard-resets
    /// the oversamplers' filter memory and every rate-dependent downstream
    /// processor (the voice graph and every effect).
    pub fn set_oversample(&mut self, factor: usize) {
        self.oversample_factor = factor;
        self.oversampler.reconfigure(factor, self.sample_rate);
        self.mod_oversampler.reconfigure(factor, self.sample_rate);
        self.input_oversampler.reconfigure(factor, self.sample_rate);
        let internal_rate = self.internal_sample_rate();
        self.router.set_sample_rate(internal_rate);
        self.router.hard_reset();
        for effect in &mut self.effects {
            effect.set_sample_rate(internal_rate);
            effect.reset();
        }
    }

    pub fn set_voice_override(&mut self, mode: VoiceOverride) {
        self.voices.set_voice_override(mode);
    }

    pub fn set_voice_priority(&mut self, priority: VoicePriority) {
        self.voices.set_voice_priority(priority);
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.voices.set_legato(legato);
    }

    pub fn polyphony(&self) -> usize {
        self.voices.polyphony()
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.active_voice_count()
    }

    /// Broadcasts oscillator/filter/detune parameters to every voice.
    pub fn set_osc1_waveform(&mut self, waveform: OscillatorWaveform) {
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_osc1_waveform(waveform);
        }
    }

    pub fn set_osc2_waveform(&mut self, waveform: OscillatorWaveform) {
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_osc2_waveform(waveform);
        }
    }

    pub fn set_osc2_detune(&mut self, cents: f32) {
        self.osc2_detune_cached = cents;
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_osc2_detune(cents);
        }
    }

    pub fn set_osc_mix(&mut self, mix: f32) {
        self.osc_mix_cached = mix.clamp(0.0, 1.0);
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_osc_mix(mix);
        }
    }

    pub fn set_filter_cutoff(&mut self, freq: f32) {
        self.cutoff_cached = freq;
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_filter_cutoff(freq);
        }
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        self.resonance_cached = resonance;
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_filter_resonance(resonance);
        }
    }

    pub fn set_filter_env_amount(&mut self, amount: f32) {
        self.filter_env_amount_cached = amount;
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_filter_env_amount(amount);
        }
    }

    pub fn set_amp_attack_ms(&mut self, ms: f32) {
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_amp_attack_ms(ms);
        }
    }

    pub fn set_amp_decay_ms(&mut self, ms: f32) {
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_amp_decay_ms(ms);
        }
    }

    pub fn set_amp_sustain(&mut self, level: f32) {
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_amp_sustain(level);
        }
    }

    pub fn set_amp_release_ms(&mut self, ms: f32) {
        for &id in &self.aggregates {
            aggregate_processor(&mut self.router, id).set_amp_release_ms(ms);
        }
    }

    pub fn set_lfo1_waveform(&mut self, waveform: LfoWaveform) {
        self.lfo1.set_waveform(waveform);
    }

    pub fn set_lfo1_rate(&mut self, hz: f32) {
        self.lfo1_rate_cached = hz;
        self.lfo1.set_frequency(hz);
    }

    pub fn set_lfo1_to_pitch(&mut self, semitones: f32) {
        self.lfo1_to_pitch = semitones;
    }

    pub fn set_lfo1_to_filter(&mut self, hz: f32) {
        self.lfo1_to_filter = hz;
    }

    pub fn set_lfo2_waveform(&mut self, waveform: LfoWaveform) {
        self.lfo2.set_waveform(waveform);
    }

    pub fn set_lfo2_rate(&mut self, hz: f32) {
        self.lfo2_rate_cached = hz;
        self.lfo2.set_frequency(hz);
    }

    pub fn set_lfo2_to_pitch(&mut self, semitones: f32) {
        self.lfo2_to_pitch = semitones;
    }

    pub fn set_lfo2_to_filter(&mut self, hz: f32) {
        self.lfo2_to_filter = hz;
    }

    pub fn set_master_gain(&mut self, gain: f32) {
        self.master_gain_cached = gain;
        self.master_gain.set_target(gain);
    }

    /// MIDI pitch wheel, `[-1, 1]`, scaled to `±`[`PITCH_BEND_RANGE_SEMITONES`].
    pub fn set_pitch_wheel(&mut self, value: f32) {
        self.pitch_bend_semitones = value.clamp(-1.0, 1.0) * PITCH_BEND_RANGE_SEMITONES;
    }

    /// MIDI mod wheel, `[0, 1]`, scaling every direct `lfoN_to_*` routing.
    /// Defaults to `1.0` so existing `lfoN_to_*` routings stay at full
    /// depth until a host explicitly drives the wheel (most synths default
    /// the physical wheel to 0, but this engine's routings were previously
    /// the sole depth control with no separate wheel gate).
    pub fn set_mod_wheel(&mut self, value: f32) {
        self.mod_wheel = value.clamp(0.0, 1.0);
    }

    /// Global tuning offset in cents, applied to every voice's pitch.
    pub fn set_tuning(&mut self, cents: f32) {
        self.global_tuning_cents = cents;
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.tempo.set_bpm(bpm);
    }

    /// Appends an effect to the end of the chain, syncing it to the current
    /// internal (oversampled) rate immediately.
    pub fn push_effect(&mut self, mut effect: Box<dyn Effect>) {
        effect.set_sample_rate(self.internal_sample_rate());
        self.effects.push(effect);
    }

    /// Removes and returns the effect at `index`.
    pub fn remove_effect(&mut self, index: usize) -> Option<Box<dyn Effect>> {
        if index < self.effects.len() { Some(self.effects.remove(index)) } else { None }
    }

    /// Moves the effect at `from` to position `to`, reordering the chain.
    /// Per §9's Open Question decision, the new order takes effect at the
    /// next block boundary rather than mid-block.
    pub fn move_effect(&mut self, from: usize, to: usize) {
        if from < self.effects.len() && to < self.effects.len() {
            let effect = self.effects.remove(from);
            self.effects.insert(to, effect);
        }
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    /// Wires `source_name` to `destination_name` in the modulation bank
    /// (§4.4), defaulting to bipolar source interpretation and unity
    /// destination scale — the right defaults for every source/destination
    /// pair this engine currently evaluates ([`SOURCE_LFO1`]/[`SOURCE_LFO2`]
    /// into [`DEST_PITCH`]/[`DEST_FILTER_CUTOFF`]). Other names are accepted
    /// by the bank (for inspection/serialization) but have no live effect.
    pub fn connect_modulation(
        &mut self,
        source_name: &str,
        destination_name: &str,
    ) -> Result<usize, ModulationError> {
        self.mod_bank.connect(source_name, destination_name, true, false, 1.0)
    }

    pub fn disconnect_modulation(&mut self, index: usize) -> Result<(), ModulationError> {
        self.mod_bank.disconnect(index)
    }

    pub fn clear_modulations(&mut self) {
        self.mod_bank.clear();
    }

    pub fn note_on(&mut self, note: u8, velocity: u8, channel: u8, offset: usize) {
        self.voices.note_on(note, velocity, channel, offset);
    }

    pub fn note_off(&mut self, note: u8, channel: u8) {
        self.voices.note_off(note, channel);
    }

    pub fn sustain_on(&mut self) {
        self.voices.sustain_on();
    }

    pub fn sustain_off(&mut self) {
        self.voices.sustain_off();
    }

    pub fn sostenuto_on(&mut self) {
        self.voices.sostenuto_on();
    }

    pub fn sostenuto_off(&mut self) {
        self.voices.sostenuto_off();
    }

    /// Polyphonic aftertouch for whichever voice is currently playing
    /// `note`/`channel`; a no-op if none is.
    pub fn set_aftertouch(&mut self, note: u8, channel: u8, pressure: f32) {
        if let Some((agg, slot)) = self.voices.find_slot(note, channel) {
            aggregate_processor(&mut self.router, self.aggregates[agg]).set_aftertouch(slot, pressure);
        }
    }

    /// Channel-wide (monophonic) aftertouch: applies to every active voice
    /// on `channel`.
    pub fn set_channel_aftertouch(&mut self, channel: u8, pressure: f32) {
        for (idx, voice) in self.voices.voices().enumerate() {
            if !voice.is_free() && voice.channel() == channel {
                let (agg, slot) = (idx / 2, idx % 2);
                aggregate_processor(&mut self.router, self.aggregates[agg]).set_aftertouch(slot, pressure);
            }
        }
    }

    /// Releases every currently sounding note as if its key had been
    /// lifted — respects the sustain pedal/sostenuto and the release
    /// envelope, same as individually releasing each one.
    pub fn all_notes_off(&mut self) {
        let active: Vec<(u8, u8)> =
            self.voices.voices().filter(|v| !v.is_free()).map(|v| (v.note(), v.channel())).collect();
        for (note, channel) in active {
            self.voices.note_off(note, channel);
        }
    }

    /// Immediately silences every voice, bypassing the release envelope —
    /// distinct from [`Self::all_notes_off`], which still runs each
    /// voice's release tail.
    pub fn all_sounds_off(&mut self) {
        self.voices.hard_reset();
        for &id in &self.aggregates {
            let agg = aggregate_processor(&mut self.router, id);
            agg.hard_reset_voice(0);
            agg.hard_reset_voice(1);
        }
    }

    pub fn kill_all(&mut self) {
        self.voices.kill_all();
    }

    /// Read-only access to per-voice key-state bookkeeping, for
    /// introspection (UI voice displays, tests) rather than audio control.
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.voices()
    }

    pub fn reset(&mut self) {
        self.voices.hard_reset();
        self.router.hard_reset();
        self.lfo1.reset();
        self.lfo2.reset();
        for effect in &mut self.effects {
            effect.reset();
        }
        self.oversampler.hard_reset();
        self.mod_oversampler.hard_reset();
        self.input_oversampler.hard_reset();
        self.master_gain.snap_to_target();
        self.peak_meter_l.reset();
        self.peak_meter_r.reset();
        self.tempo.reset();
    }

    /// Sums every active bank slot routing `source` to `destination`,
    /// applying each slot's transform to the (already unipolar) `source_value`
    /// (§4.4).
    fn mod_amount(&self, source: &str, destination: &str, source_value: f32) -> f32 {
        self.mod_bank
            .active_slots()
            .filter(|(_, slot)| slot.source_name() == Some(source) && slot.destination_name() == Some(destination))
            .map(|(_, slot)| slot.processor.apply(source_value, false))
            .sum()
    }

    /// A snapshot of named control values (§6 `controls()[name]`).
    pub fn controls(&self) -> Controls {
        Controls {
            values: [
                self.master_gain_cached,
                self.cutoff_cached,
                self.resonance_cached,
                self.filter_env_amount_cached,
                self.osc_mix_cached,
                self.osc2_detune_cached,
                self.lfo1_rate_cached,
                self.lfo2_rate_cached,
                self.tempo.bpm(),
            ],
        }
    }

    /// Slow-rate status readback by name (§6 `get_status_output`); `None`
    /// for an unrecognized name.
    pub fn get_status_output(&self, name: &str) -> Option<f32> {
        match name {
            "peak_left" => Some(self.peak_meter_l.peak()),
            "peak_right" => Some(self.peak_meter_r.peak()),
            "active_voices" => Some(self.active_voice_count() as f32),
            "bpm" => Some(self.tempo.bpm()),
            "beat_position" => Some(self.tempo.beat_position()),
            _ => None,
        }
    }

    /// Current peak levels, for a slow-rate status/metering surface.
    pub fn peak_levels(&self) -> (f32, f32) {
        (self.peak_meter_l.peak(), self.peak_meter_r.peak())
    }

    /// Renders `out_left`/`out_right` (equal length = the block size) of
    /// stereo audio.
    pub fn process(&mut self, out_left: &mut [f32], out_right: &mut [f32]) {
        self.process_inner(None, None, out_left, out_right);
    }

    /// Same as [`Self::process`], mixing `extra_left`/`extra_right` (host-
    /// rate external input, e.g. a sidechain or audio-rate modulation
    /// source) into the bus ahead of the effect chain.
    pub fn process_with_input(
        &mut self,
        extra_left: &[f32],
        extra_right: &[f32],
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) {
        self.process_inner(Some(extra_left), Some(extra_right), out_left, out_right);
    }

    /// Renders one block: applies pending note triggers at their sample-
    /// accurate offsets, computes global LFO/mod-bank modulation at host
    /// rate, upsamples it to the internal rate, runs the voice graph and
    /// effect chain entirely at that oversampled rate (§4.6), downsamples
    /// the result back to host rate, then applies master gain, DC
    /// blocking, and peak metering.
    fn process_inner(
        &mut self,
        extra_left: Option<&[f32]>,
        extra_right: Option<&[f32]>,
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) {
        let block_size = out_left.len();
        debug_assert_eq!(block_size, out_right.len());
        debug_assert!(block_size <= MAX_HOST_BLOCK, "block size exceeds MAX_HOST_BLOCK");

        let fired = self.voices.prepare_triggers(block_size);
        for prepared in &fired {
            let slot = if prepared.mask == AggregateVoice::lane_mask(0) { 0 } else { 1 };
            aggregate_processor(&mut self.router, self.aggregates[prepared.aggregate]).trigger(
                slot,
                prepared.trigger.note,
                prepared.trigger.velocity,
                prepared.trigger.reset,
                prepared.trigger.retrigger,
            );
        }

        for (idx, voice) in self.voices.voices().enumerate() {
            if voice.key_state() == VoiceKeyState::Released {
                let (agg, slot) = (idx / 2, idx % 2);
                aggregate_processor(&mut self.router, self.aggregates[agg]).release(slot);
            }
        }

        for i in 0..block_size {
            let lfo1_val = self.lfo1.next();
            let lfo2_val = self.lfo2.next();
            // §4.4 fix: normalize the bipolar LFO value to [0, 1] before
            // handing it to `apply`, which itself re-expands a bipolar slot
            // back out - feeding it the raw bipolar value clipped the
            // negative half before that expansion ever ran.
            let lfo1_unipolar = (lfo1_val + 1.0) * 0.5;
            let lfo2_unipolar = (lfo2_val + 1.0) * 0.5;

            let pitch_mod = (lfo1_val * self.lfo1_to_pitch + lfo2_val * self.lfo2_to_pitch) * self.mod_wheel
                + self.mod_amount(SOURCE_LFO1, DEST_PITCH, lfo1_unipolar)
                + self.mod_amount(SOURCE_LFO2, DEST_PITCH, lfo2_unipolar)
                + self.pitch_bend_semitones
                + self.global_tuning_cents / 100.0;
            let filter_mod = (lfo1_val * self.lfo1_to_filter + lfo2_val * self.lfo2_to_filter) * self.mod_wheel
                + self.mod_amount(SOURCE_LFO1, DEST_FILTER_CUTOFF, lfo1_unipolar)
                + self.mod_amount(SOURCE_LFO2, DEST_FILTER_CUTOFF, lfo2_unipolar);

            self.mod_pitch_host[i] = pitch_mod;
            self.mod_filter_host[i] = filter_mod;
            self.tempo.advance();
        }

        for i in 0..block_size {
            self.packed_mod_host[i] =
                PolyFloat::ZERO.with_lane(0, self.mod_pitch_host[i]).with_lane(1, self.mod_filter_host[i]);
        }

        let internal_n = self.oversampler.internal_block_len(block_size);
        self.mod_oversampler
            .upsample_block(&self.packed_mod_host[..block_size], &mut self.packed_mod_internal[..internal_n]);
        for i in 0..internal_n {
            self.mod_pitch_internal[i] = self.packed_mod_internal[i].lane(0);
            self.mod_filter_internal[i] = self.packed_mod_internal[i].lane(1);
        }

        mod_bus_processor(&mut self.router, self.mod_bus)
            .set_values(&self.mod_pitch_internal[..internal_n], &self.mod_filter_internal[..internal_n]);
        self.router.process_block(internal_n);

        for s in self.voice_mix_internal[..internal_n].iter_mut() {
            *s = PolyFloat::ZERO;
        }
        for &id in &self.aggregates {
            let out = self.router.output(id, 0).expect("aggregate output must exist");
            for i in 0..internal_n {
                self.voice_mix_internal[i] += out.as_slice()[i];
            }
        }

        for i in 0..internal_n {
            let mix = self.voice_mix_internal[i];
            self.stereo_internal[i] =
                PolyFloat::ZERO.with_lane(0, mix.lane(0) + mix.lane(2)).with_lane(1, mix.lane(1) + mix.lane(3));
        }

        if let (Some(extra_left), Some(extra_right)) = (extra_left, extra_right) {
            for i in 0..block_size {
                self.extra_packed_host[i] = PolyFloat::ZERO.with_lane(0, extra_left[i]).with_lane(1, extra_right[i]);
            }
            self.input_oversampler
                .upsample_block(&self.extra_packed_host[..block_size], &mut self.extra_packed_internal[..internal_n]);
            for i in 0..internal_n {
                self.stereo_internal[i] += self.extra_packed_internal[i];
            }
        }

        for i in 0..internal_n {
            self.left_internal[i] = self.stereo_internal[i].lane(0);
            self.right_internal[i] = self.stereo_internal[i].lane(1);
        }

        for effect in &mut self.effects {
            effect.process_block_inplace(&mut self.left_internal[..internal_n]);
            effect.process_block_inplace(&mut self.right_internal[..internal_n]);
        }

        for i in 0..internal_n {
            self.stereo_internal[i] =
                PolyFloat::ZERO.with_lane(0, self.left_internal[i]).with_lane(1, self.right_internal[i]);
        }
        self.oversampler.downsample_block(&self.stereo_internal[..internal_n], &mut self.stereo_down[..block_size]);

        for i in 0..block_size {
            out_left[i] = self.stereo_down[i].lane(0);
            out_right[i] = self.stereo_down[i].lane(1);
        }

        let mut newly_dead = Vec::new();
        for (idx, voice) in self.voices.voices().enumerate() {
            if voice.key_state() == VoiceKeyState::Released {
                let (agg, slot) = (idx / 2, idx % 2);
                if aggregate_processor(&mut self.router, self.aggregates[agg]).is_silent(slot) {
                    newly_dead.push((agg, slot));
                }
            }
        }
        for (agg, slot) in newly_dead {
            self.voices.mark_silent(agg, slot);
            aggregate_processor(&mut self.router, self.aggregates[agg]).hard_reset_voice(slot);
        }

        for (l, r) in out_left.iter_mut().zip(out_right.iter_mut()) {
            let gain = self.master_gain.advance();
            *l = self.dc_blocker_l.process(*l * gain);
            *r = self.dc_blocker_r.process(*r * gain);
            self.peak_meter_l.update(*l);
            self.peak_meter_r.update(*r);
        }
    }
}
