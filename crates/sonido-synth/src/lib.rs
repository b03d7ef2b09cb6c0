//! Sonido Synth - Synthesis engine for the sonido DSP framework
//!
//! This crate provides synthesis building blocks including oscillators,
//! envelopes, voice management, and complete synthesizer implementations.
//!
//! # Core Components
//!
//! ## Oscillators
//!
//! Audio-rate oscillators with PolyBLEP anti-aliasing:
//!
//! - [`Oscillator`] - Main audio oscillator with multiple waveforms
//! - [`OscillatorWaveform`] - Waveform types (Sine, Triangle, Saw, Square, Pulse, Noise)
//!
//! ```rust
//! use sonido_synth::{Oscillator, OscillatorWaveform};
//!
//! let mut osc = Oscillator::new(48000.0);
//! osc.set_frequency(440.0);
//! osc.set_waveform(OscillatorWaveform::Saw);
//!
//! let sample = osc.advance();
//! ```
//!
//! ## Envelopes
//!
//! ADSR envelope generators:
//!
//! - [`AdsrEnvelope`] - Attack-Decay-Sustain-Release envelope
//! - [`EnvelopeState`] - Envelope stage tracking
//!
//! ```rust
//! use sonido_synth::{AdsrEnvelope, EnvelopeState};
//!
//! let mut env = AdsrEnvelope::new(48000.0);
//! env.set_attack_ms(10.0);
//! env.set_decay_ms(100.0);
//! env.set_sustain(0.7);
//! env.set_release_ms(200.0);
//!
//! env.gate_on();
//! let level = env.advance();
//! ```
//!
//! ## Voice Management
//!
//! For building polyphonic synthesizers:
//!
//! - [`Voice`] - Single voice's key-state bookkeeping
//! - [`VoiceHandler`] - Polyphonic voice allocation, stealing, and trigger scheduling
//! - [`VoiceOverride`] / [`VoicePriority`] - Voice stealing strategies
//!
//! ## Modulation
//!
//! Flexible modulation routing:
//!
//! - [`ModulationMatrix`] - Route modulation sources to destinations
//! - [`ModSourceId`] / [`ModDestination`] - Source and destination identifiers
//! - [`AudioModSource`] - Use audio input as modulation
//!
//! ## Complete Synthesizer
//!
//! The full assembly, voice handler through output stage:
//!
//! - [`SoundEngine`] - Polyphonic synth: voices, global LFOs, modulation
//!   bank, effect chain, oversampling, master gain, DC blocking, metering
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible. Disable the default `std` feature:
//!
//! ```toml
//! [dependencies]
//! sonido-synth = { version = "0.1", default-features = false }
//! ```
//!
//! # Example: Simple Polyphonic Synth
//!
//! ```rust
//! use sonido_synth::{SoundEngine, OscillatorWaveform};
//!
//! // Create a 4-aggregate (8-voice) engine
//! let mut engine: SoundEngine<4> = SoundEngine::new(48000.0);
//!
//! // Configure sound
//! engine.set_osc1_waveform(OscillatorWaveform::Saw);
//! engine.set_osc2_waveform(OscillatorWaveform::Saw);
//! engine.set_osc2_detune(7.0); // 7 cents detune for thickness
//! engine.set_filter_cutoff(2000.0);
//! engine.set_filter_resonance(2.0);
//! engine.set_amp_attack_ms(10.0);
//! engine.set_amp_release_ms(500.0);
//!
//! // Play a chord
//! engine.note_on(60, 100, 0, 0); // C4
//! engine.note_on(64, 100, 0, 0); // E4
//! engine.note_on(67, 100, 0, 0); // G4
//!
//! // Generate a block of stereo audio
//! let mut left = vec![0.0; 1024];
//! let mut right = vec![0.0; 1024];
//! engine.process(&mut left, &mut right);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod audio_mod;
pub mod engine;
pub mod envelope;
pub mod mod_matrix;
pub mod oscillator;
pub mod voice;
pub mod voice_graph;

// Re-export main types at crate root
pub use audio_mod::{AudioGate, AudioModSource};
pub use engine::{PeakMeter, SoundEngine};
pub use envelope::{AdsrEnvelope, EnvelopeState};
pub use mod_matrix::{
    ModDestination, ModSourceId, ModulationMatrix, ModulationRoute, ModulationValues,
};
pub use oscillator::{Oscillator, OscillatorWaveform};
pub use voice::{
    AggregateVoice, PreparedTrigger, Voice, VoiceHandler, VoiceKeyState, VoiceOverride,
    VoicePriority, VoiceTrigger, cents_to_ratio, freq_to_midi, midi_to_freq,
};

pub use voice_graph::{AggregateVoiceProcessor, ModBusSource};

// Re-export commonly used types from sonido-core
pub use sonido_core::{Lfo, LfoWaveform, ModulationSource, StateVariableFilter, SvfOutput};
