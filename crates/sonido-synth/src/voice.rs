//! Voice key-state machine and polyphonic voice handling (§4.3).
//!
//! Generalizes the old flat `Voice`/`VoiceManager<const N>` pool (linear
//! active/inactive, steal-by-age-or-pitch) into the richer model: a five-
//! state key machine per voice, voices packed two-to-a-lane into
//! [`AggregateVoice`]s so a [`sonido_core::PolyFloat`] carries two voices'
//! stereo pairs at once, and a [`VoiceHandler`] that walks pending note
//! events into sample-accurate triggers once per block.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
#[cfg(feature = "std")]
use std::vec::Vec;

use sonido_core::PolyMask;

/// A voice's position in its note lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceKeyState {
    /// Just triggered this block; the graph hasn't seen the new note yet.
    /// Advances to `Held` at the end of the block the trigger fires in.
    Triggering,
    /// Playing, key down.
    Held,
    /// Key released but held open by the sustain pedal or sostenuto.
    Sustained,
    /// Key (and pedal, if any) released; running its release tail.
    Released,
    /// Silent and available for reallocation.
    Dead,
}

/// What happens when a `note_on` arrives with no free voice (§4.3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceOverride {
    /// Ramp the victim to silence over `kVoiceKillTime`, then reassign.
    #[default]
    Kill,
    /// Reassign an already-`Held` voice in place, without retriggering its
    /// envelopes, when the incoming note is legato.
    Steal,
}

/// Tie-break order used to pick a victim (for stealing) or to decide which
/// voice reactivates first when voices free up (§4.3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoicePriority {
    /// Most recently triggered voice first.
    #[default]
    Newest,
    /// Least recently triggered voice first.
    Oldest,
    /// Highest MIDI note first.
    Highest,
    /// Lowest MIDI note first.
    Lowest,
    /// Cycle through voice slots in a fixed rotation.
    RoundRobin,
}

/// Time, in seconds, a forcibly-killed voice takes to ramp to silence
/// before being reassigned. Not specified numerically in the engine
/// design; 5ms is short enough to be inaudible as a click but long enough
/// that a release-shaped fade, not a hard cut, reaches zero.
pub const VOICE_KILL_TIME_SECONDS: f32 = 0.005;

/// A pending key event not yet surfaced as a trigger, carrying the
/// in-block sample offset it should fire at.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingEvent {
    offset: isize,
    velocity: u8,
    channel: u8,
    retrigger: bool,
    reset: bool,
}

/// A note-on that arrived with every voice busy. Its victim was handed to
/// [`Voice::kill`] to ramp to silence; this sits in
/// [`VoiceHandler::pending_steals`] until [`VoiceHandler::prepare_triggers`]
/// sees a voice go `Dead` and can hand it the freed slot (§4.3 Kill,
/// `kVoiceKillTime`).
#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingSteal {
    note: u8,
    velocity: u8,
    channel: u8,
}

/// The trigger values the handler surfaces onto the shared graph's input
/// ports for the block a voice's pending event fires in (§4.3 "Trigger
/// preparation").
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceTrigger {
    /// Offset within the current block, in `[0, block_size)`.
    pub offset: usize,
    /// The new MIDI note.
    pub note: u8,
    /// The note this voice was playing before, if any (for legato glide).
    pub last_note: u8,
    pub velocity: u8,
    pub channel: u8,
    /// True if this is a same-voice reassignment (legato steal), not a
    /// fresh key-down — downstream envelopes should not restart.
    pub retrigger: bool,
    /// True if oscillator phase should reset to zero on this trigger.
    pub reset: bool,
    /// True on note-off: a "lift" trigger, independent of `note`/`velocity`.
    pub lift: bool,
}

/// A single voice's key-state bookkeeping. No per-voice DSP state lives
/// here — the shared voice graph (built from [`sonido_core::Processor`]s
/// behind a [`sonido_core::graph::ProcessorRouter`]) is what actually
/// generates audio, keyed by the lane mask this voice owns within its
/// [`AggregateVoice`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voice {
    key_state: VoiceKeyState,
    note: u8,
    last_note: u8,
    velocity: u8,
    channel: u8,
    sostenuto: bool,
    insertion: u64,
    pending: Option<PendingEvent>,
    kill_fade_remaining: f32,
}

impl Voice {
    const fn new() -> Self {
        Self {
            key_state: VoiceKeyState::Dead,
            note: 0,
            last_note: 0,
            velocity: 0,
            channel: 0,
            sostenuto: false,
            insertion: 0,
            pending: None,
            kill_fade_remaining: 0.0,
        }
    }

    /// Whether this voice is available for (re)allocation.
    pub fn is_free(&self) -> bool {
        self.key_state == VoiceKeyState::Dead
    }

    /// Whether this voice is currently ramping to silence ahead of a
    /// `VoiceOverride::Kill` reassignment — such a voice should not be
    /// picked as a victim again until its fade completes.
    pub fn is_killing(&self) -> bool {
        self.kill_fade_remaining > 0.0
    }

    pub fn key_state(&self) -> VoiceKeyState {
        self.key_state
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn insertion(&self) -> u64 {
        self.insertion
    }

    fn trigger(
        &mut self,
        note: u8,
        velocity: u8,
        channel: u8,
        insertion: u64,
        offset: usize,
        retrigger: bool,
    ) {
        self.last_note = if self.key_state == VoiceKeyState::Dead { note } else { self.note };
        self.note = note;
        self.velocity = velocity;
        self.channel = channel;
        self.insertion = insertion;
        self.sostenuto = false;
        self.key_state = VoiceKeyState::Triggering;
        self.kill_fade_remaining = 0.0;
        self.pending = Some(PendingEvent {
            offset: offset as isize,
            velocity,
            channel,
            retrigger,
            reset: !retrigger,
        });
    }

    /// Key-up. A voice held by the sustain pedal or latched by sostenuto
    /// parks in `Sustained` instead of releasing immediately.
    fn note_off(&mut self, sustain_down: bool) {
        match self.key_state {
            VoiceKeyState::Triggering | VoiceKeyState::Held => {
                if self.sostenuto || sustain_down {
                    self.key_state = VoiceKeyState::Sustained;
                } else {
                    self.key_state = VoiceKeyState::Released;
                }
            }
            _ => {}
        }
    }

    fn sustain_off(&mut self) {
        if self.key_state == VoiceKeyState::Sustained && !self.sostenuto {
            self.key_state = VoiceKeyState::Released;
        }
    }

    fn mark_sostenuto(&mut self) {
        if matches!(self.key_state, VoiceKeyState::Triggering | VoiceKeyState::Held) {
            self.sostenuto = true;
        }
    }

    /// Clears the sostenuto latch. A voice held `Sustained` only by
    /// sostenuto releases unless the sustain pedal is also down.
    fn sostenuto_off(&mut self, sustain_down: bool) {
        if self.sostenuto {
            self.sostenuto = false;
            if self.key_state == VoiceKeyState::Sustained && !sustain_down {
                self.key_state = VoiceKeyState::Released;
            }
        }
    }

    /// Starts an immediate fade-to-silence ahead of reassignment (§4.3
    /// `VoiceOverride::Kill`). The voice stays `Released` — and therefore
    /// still counted as active and still audible, ramping down — until
    /// [`Self::advance_kill_fade`] finalizes it as `Dead`.
    fn kill(&mut self) {
        self.key_state = VoiceKeyState::Released;
        self.kill_fade_remaining = VOICE_KILL_TIME_SECONDS;
        self.pending = None;
    }

    fn hard_reset(&mut self) {
        *self = Self::new();
    }

    /// Advances kill-fade bookkeeping and, once it reaches zero, finalizes
    /// the voice as `Dead`. Called once per block with the block's
    /// duration in seconds; real silence detection (envelope reaching
    /// `kT60Amplitude`) happens in the shared graph and is reported back
    /// via [`VoiceHandler::mark_silent`] for voices that release normally
    /// rather than via a forced kill.
    fn advance_kill_fade(&mut self, block_seconds: f32) {
        if self.kill_fade_remaining > 0.0 {
            self.kill_fade_remaining = (self.kill_fade_remaining - block_seconds).max(0.0);
            if self.kill_fade_remaining == 0.0 {
                self.key_state = VoiceKeyState::Dead;
            }
        }
    }
}

/// Two voices sharing one `sonido_core::PolyFloat`'s lanes — lane pair
/// `(0,1)` for the first, `(2,3)` for the second (§4.3 "Polyphony packing").
#[derive(Clone, Copy, Debug)]
pub struct AggregateVoice {
    voices: [Voice; 2],
}

impl AggregateVoice {
    const fn new() -> Self {
        Self { voices: [Voice::new(), Voice::new()] }
    }

    /// The lane mask this slot's voice occupies in the shared `PolyFloat`.
    pub fn lane_mask(slot: usize) -> PolyMask {
        if slot == 0 { PolyMask::VOICE_A } else { PolyMask::VOICE_B }
    }

    pub fn voice(&self, slot: usize) -> &Voice {
        &self.voices[slot]
    }

    fn free_slot(&self) -> Option<usize> {
        self.voices.iter().position(Voice::is_free)
    }

    fn is_fully_free(&self) -> bool {
        self.voices.iter().all(Voice::is_free)
    }

    fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_free()).count()
    }
}

impl Default for AggregateVoice {
    fn default() -> Self {
        Self::new()
    }
}

/// A trigger ready to be written onto the shared graph's input ports this
/// block, plus which aggregate/lane it belongs to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreparedTrigger {
    pub aggregate: usize,
    pub mask: PolyMask,
    pub trigger: VoiceTrigger,
}

/// Pool of `AGGREGATES` [`AggregateVoice`]s (`2 * AGGREGATES` voices total)
/// with key-state tracking, stealing, and per-block trigger emission
/// (§4.3).
#[derive(Debug)]
pub struct VoiceHandler<const AGGREGATES: usize> {
    aggregates: [AggregateVoice; AGGREGATES],
    voice_override: VoiceOverride,
    voice_priority: VoicePriority,
    legato: bool,
    sustain_down: bool,
    insertion_counter: u64,
    round_robin_idx: usize,
    block_seconds: f32,
    pending_steals: Vec<PendingSteal>,
}

impl<const AGGREGATES: usize> VoiceHandler<AGGREGATES> {
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            aggregates: [AggregateVoice::new(); AGGREGATES],
            voice_override: VoiceOverride::default(),
            voice_priority: VoicePriority::default(),
            legato: false,
            sustain_down: false,
            insertion_counter: 0,
            round_robin_idx: 0,
            block_seconds: block_size as f32 / sample_rate,
            pending_steals: Vec::new(),
        }
    }

    pub fn set_sample_rate_and_block(&mut self, sample_rate: f32, block_size: usize) {
        self.block_seconds = block_size as f32 / sample_rate;
    }

    pub fn set_voice_override(&mut self, mode: VoiceOverride) {
        self.voice_override = mode;
    }

    pub fn set_voice_priority(&mut self, priority: VoicePriority) {
        self.voice_priority = priority;
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    pub fn polyphony(&self) -> usize {
        AGGREGATES * 2
    }

    pub fn active_voice_count(&self) -> usize {
        self.aggregates.iter().map(AggregateVoice::active_count).sum()
    }

    /// Grabs a voice for `note` and returns where its trigger landed.
    ///
    /// Allocation order (§4.3 "Polyphony packing"): a free lane in an
    /// already-active aggregate first (keeps the SIMD-packed graph dense),
    /// then a fully free aggregate, then a legato in-place reuse of a
    /// `Held` voice under `VoiceOverride::Steal`, then — if none of those
    /// apply — a `VoiceOverride::Kill`-style fade: the chosen victim is
    /// handed to [`Voice::kill`] to ramp to silence over
    /// `VOICE_KILL_TIME_SECONDS`, and the new note queues in
    /// [`Self::pending_steals`] until [`Self::prepare_triggers`] sees that
    /// fade finish and can hand it the freed slot, rather than hard-cutting
    /// the victim by overwriting its still-playing slot immediately.
    pub fn note_on(&mut self, note: u8, velocity: u8, channel: u8, offset: usize) {
        self.insertion_counter += 1;
        let insertion = self.insertion_counter;

        if let Some((agg, slot)) = self.find_active_lane_with_free_slot() {
            self.aggregates[agg].voices[slot].trigger(note, velocity, channel, insertion, offset, false);
            return;
        }
        if let Some(agg) = self.aggregates.iter().position(AggregateVoice::is_fully_free) {
            self.aggregates[agg].voices[0].trigger(note, velocity, channel, insertion, offset, false);
            return;
        }

        if self.legato && self.voice_override == VoiceOverride::Steal {
            if let Some((agg, slot)) = self.find_by_state(VoiceKeyState::Held) {
                self.aggregates[agg].voices[slot].trigger(note, velocity, channel, insertion, offset, true);
                return;
            }
        }

        if let Some((agg, slot)) = self.choose_victim() {
            self.aggregates[agg].voices[slot].kill();
        }
        self.pending_steals.push(PendingSteal { note, velocity, channel });
    }

    fn find_active_lane_with_free_slot(&self) -> Option<(usize, usize)> {
        self.aggregates
            .iter()
            .enumerate()
            .find(|(_, agg)| !agg.is_fully_free() && agg.free_slot().is_some())
            .map(|(i, agg)| (i, agg.free_slot().unwrap()))
    }

    /// Picks a victim to ramp out, skipping any voice already mid-
    /// kill-fade. Returns `None` only if every voice is currently killing
    /// (e.g. several steals landed in the same block with no voices to
    /// spare) — the caller then simply queues the new note to wait for
    /// one of those fades to finish.
    fn choose_victim(&mut self) -> Option<(usize, usize)> {
        if self.voice_override == VoiceOverride::Kill {
            if let Some(found) = self.find_by_state(VoiceKeyState::Released) {
                return Some(found);
            }
            if let Some(found) = self.find_by_state(VoiceKeyState::Sustained) {
                return Some(found);
            }
        }

        match self.voice_priority {
            VoicePriority::RoundRobin => {
                let total = AGGREGATES * 2;
                let idx = self.round_robin_idx;
                self.round_robin_idx = (self.round_robin_idx + 1) % total.max(1);
                Some((idx / 2, idx % 2))
            }
            VoicePriority::Oldest => self.extreme_by(|v| v.insertion(), true),
            VoicePriority::Newest => self.extreme_by(|v| v.insertion(), false),
            VoicePriority::Lowest => self.extreme_by(|v| v.note(), true),
            VoicePriority::Highest => self.extreme_by(|v| v.note(), false),
        }
    }

    /// First voice in `state`, excluding any already mid-kill-fade.
    fn find_by_state(&self, state: VoiceKeyState) -> Option<(usize, usize)> {
        for (i, agg) in self.aggregates.iter().enumerate() {
            for (s, voice) in agg.voices.iter().enumerate() {
                if voice.key_state() == state && !voice.is_killing() {
                    return Some((i, s));
                }
            }
        }
        None
    }

    fn extreme_by<K: Ord>(&self, key: impl Fn(&Voice) -> K, smallest: bool) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize, K)> = None;
        for (i, agg) in self.aggregates.iter().enumerate() {
            for (s, voice) in agg.voices.iter().enumerate() {
                if voice.is_killing() {
                    continue;
                }
                let k = key(voice);
                let better = match &best {
                    None => true,
                    Some((_, _, cur)) => {
                        if smallest {
                            k < *cur
                        } else {
                            k > *cur
                        }
                    }
                };
                if better {
                    best = Some((i, s, k));
                }
            }
        }
        best.map(|(i, s, _)| (i, s))
    }

    /// Releases the first matching `Held`/`Triggering` voice on `note`.
    /// Sustain-held or sostenuto-held voices park in `Sustained` instead of
    /// releasing until the pedal (or sostenuto flag) clears.
    pub fn note_off(&mut self, note: u8, channel: u8) {
        let sustain_down = self.sustain_down;
        for agg in &mut self.aggregates {
            for voice in &mut agg.voices {
                if !voice.is_free() && voice.note == note && voice.channel == channel {
                    voice.note_off(sustain_down);
                    return;
                }
            }
        }
    }

    /// Sustain pedal down: a later `note_off` on a `Held`/`Triggering`
    /// voice parks it in `Sustained` instead of releasing (§4.3).
    pub fn sustain_on(&mut self) {
        self.sustain_down = true;
    }

    /// Sustain pedal up: releases every `Sustained` voice not also latched
    /// by sostenuto.
    pub fn sustain_off(&mut self) {
        self.sustain_down = false;
        for agg in &mut self.aggregates {
            for voice in &mut agg.voices {
                voice.sustain_off();
            }
        }
    }

    /// Sostenuto pedal: latches every currently-`Held`/`Triggering` voice
    /// so a later `note_off` parks it in `Sustained` instead of releasing.
    pub fn sostenuto_on(&mut self) {
        for agg in &mut self.aggregates {
            for voice in &mut agg.voices {
                voice.mark_sostenuto();
            }
        }
    }

    /// Clears the sostenuto latch. A voice held `Sustained` only by
    /// sostenuto releases unless the sustain pedal is also down.
    pub fn sostenuto_off(&mut self) {
        let sustain_down = self.sustain_down;
        for agg in &mut self.aggregates {
            for voice in &mut agg.voices {
                voice.sostenuto_off(sustain_down);
            }
        }
    }

    pub fn kill_all(&mut self) {
        for agg in &mut self.aggregates {
            for voice in &mut agg.voices {
                if !voice.is_free() {
                    voice.kill();
                }
            }
        }
    }

    pub fn hard_reset(&mut self) {
        for agg in &mut self.aggregates {
            for voice in &mut agg.voices {
                voice.hard_reset();
            }
        }
        self.insertion_counter = 0;
        self.round_robin_idx = 0;
        self.sustain_down = false;
        self.pending_steals.clear();
    }

    /// Called by the engine once the shared graph reports a voice's
    /// envelope has decayed past `kT60Amplitude` — finalizes it as `Dead`
    /// so it becomes available again.
    pub fn mark_silent(&mut self, aggregate: usize, slot: usize) {
        if let Some(agg) = self.aggregates.get_mut(aggregate) {
            if agg.voices[slot].key_state() == VoiceKeyState::Released {
                agg.voices[slot].hard_reset();
            }
        }
    }

    /// Walks every voice's pending event, surfacing a [`PreparedTrigger`]
    /// for any event landing in this block and advancing (or clearing) the
    /// rest (§4.3 "Trigger preparation per block"). Also advances every
    /// voice's kill fade and, for any voice that just went `Dead` as a
    /// result, assigns the oldest queued [`PendingSteal`] to its now-free
    /// slot.
    pub fn prepare_triggers(&mut self, block_size: usize) -> Vec<PreparedTrigger> {
        let mut fired = Vec::new();
        for (agg_idx, agg) in self.aggregates.iter_mut().enumerate() {
            agg.voices[0].advance_kill_fade(self.block_seconds);
            agg.voices[1].advance_kill_fade(self.block_seconds);
            for (slot, voice) in agg.voices.iter_mut().enumerate() {
                let Some(pending) = voice.pending else { continue };
                if pending.offset >= 0 && (pending.offset as usize) < block_size {
                    fired.push(PreparedTrigger {
                        aggregate: agg_idx,
                        mask: AggregateVoice::lane_mask(slot),
                        trigger: VoiceTrigger {
                            offset: pending.offset as usize,
                            note: voice.note,
                            last_note: voice.last_note,
                            velocity: pending.velocity,
                            channel: pending.channel,
                            retrigger: pending.retrigger,
                            reset: pending.reset,
                            lift: false,
                        },
                    });
                    voice.pending = None;
                    voice.key_state = VoiceKeyState::Held;
                } else {
                    voice.pending = Some(PendingEvent {
                        offset: pending.offset - block_size as isize,
                        ..pending
                    });
                }
            }
        }

        for agg_idx in 0..AGGREGATES {
            for slot in 0..2 {
                if self.pending_steals.is_empty() {
                    return fired;
                }
                if !self.aggregates[agg_idx].voices[slot].is_free() {
                    continue;
                }
                let steal = self.pending_steals.remove(0);
                self.insertion_counter += 1;
                let insertion = self.insertion_counter;
                {
                    let voice = &mut self.aggregates[agg_idx].voices[slot];
                    voice.trigger(steal.note, steal.velocity, steal.channel, insertion, 0, false);
                    voice.pending = None;
                    voice.key_state = VoiceKeyState::Held;
                }
                fired.push(PreparedTrigger {
                    aggregate: agg_idx,
                    mask: AggregateVoice::lane_mask(slot),
                    trigger: VoiceTrigger {
                        offset: 0,
                        note: steal.note,
                        last_note: steal.note,
                        velocity: steal.velocity,
                        channel: steal.channel,
                        retrigger: false,
                        reset: true,
                        lift: false,
                    },
                });
            }
        }
        fired
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.aggregates.iter().flat_map(|agg| agg.voices.iter())
    }

    /// Locates the (aggregate, slot) holding `note`/`channel`, for routing
    /// a per-voice event (e.g. polyphonic aftertouch) to the right lane.
    pub fn find_slot(&self, note: u8, channel: u8) -> Option<(usize, usize)> {
        for (i, agg) in self.aggregates.iter().enumerate() {
            for (s, voice) in agg.voices.iter().enumerate() {
                if !voice.is_free() && voice.note == note && voice.channel == channel {
                    return Some((i, s));
                }
            }
        }
        None
    }
}

/// Convert MIDI note number to frequency in Hz.
///
/// Uses standard tuning: A4 (note 69) = 440 Hz.
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * libm::powf(2.0, (note as f32 - 69.0) / 12.0)
}

/// Convert frequency in Hz to MIDI note number.
#[inline]
pub fn freq_to_midi(freq: f32) -> f32 {
    69.0 + 12.0 * libm::log2f(freq / 440.0)
}

/// Convert cents to frequency ratio.
///
/// 100 cents = 1 semitone.
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    libm::powf(2.0, cents / 1200.0)
}
