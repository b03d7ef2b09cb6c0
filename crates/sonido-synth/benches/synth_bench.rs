//! Criterion benchmarks for sonido-synth components
//!
//! Run with: cargo bench -p sonido-synth

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sonido_synth::{AdsrEnvelope, Oscillator, OscillatorWaveform, SoundEngine, VoicePriority};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

// ============================================================================
// Oscillator benchmarks
// ============================================================================

fn bench_oscillator_waveforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("Oscillator");

    let waveforms = [
        ("Sine", OscillatorWaveform::Sine),
        ("Saw", OscillatorWaveform::Saw),
        ("Square", OscillatorWaveform::Square),
        ("Triangle", OscillatorWaveform::Triangle),
        ("Pulse50", OscillatorWaveform::Pulse(0.5)),
        ("Pulse25", OscillatorWaveform::Pulse(0.25)),
        ("Noise", OscillatorWaveform::Noise),
    ];

    for (name, waveform) in &waveforms {
        for &block_size in BLOCK_SIZES {
            let mut osc = Oscillator::new(SAMPLE_RATE);
            osc.set_frequency(440.0);
            osc.set_waveform(*waveform);

            group.bench_with_input(
                BenchmarkId::new(*name, block_size),
                &block_size,
                |b, &size| {
                    b.iter(|| {
                        let mut sum = 0.0f32;
                        for _ in 0..size {
                            sum += osc.advance();
                        }
                        black_box(sum)
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_oscillator_phase_modulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Oscillator_PM");

    for &block_size in BLOCK_SIZES {
        let mut carrier = Oscillator::new(SAMPLE_RATE);
        carrier.set_frequency(440.0);
        carrier.set_waveform(OscillatorWaveform::Sine);

        let mut modulator = Oscillator::new(SAMPLE_RATE);
        modulator.set_frequency(220.0);
        modulator.set_waveform(OscillatorWaveform::Sine);

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &size| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for _ in 0..size {
                        let mod_val = modulator.advance();
                        sum += carrier.advance_with_pm(mod_val * 2.0);
                    }
                    black_box(sum)
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Envelope benchmarks
// ============================================================================

fn bench_envelope_adsr(c: &mut Criterion) {
    let mut group = c.benchmark_group("AdsrEnvelope");

    for &block_size in BLOCK_SIZES {
        let mut env = AdsrEnvelope::new(SAMPLE_RATE);
        env.set_attack_ms(10.0);
        env.set_decay_ms(50.0);
        env.set_sustain(0.7);
        env.set_release_ms(200.0);
        env.gate_on();

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &size| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for _ in 0..size {
                        sum += env.advance();
                    }
                    black_box(sum)
                })
            },
        );
    }

    group.finish();
}

fn bench_envelope_full_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("AdsrEnvelope_FullCycle");

    // Benchmark a complete attack-decay-sustain-release cycle
    group.bench_function("1sec_cycle", |b| {
        let mut env = AdsrEnvelope::new(SAMPLE_RATE);
        env.set_attack_ms(50.0);
        env.set_decay_ms(100.0);
        env.set_sustain(0.6);
        env.set_release_ms(300.0);

        b.iter(|| {
            env.reset();
            env.gate_on();

            let mut sum = 0.0f32;
            // Attack + decay + sustain
            for _ in 0..24000 {
                sum += env.advance();
            }
            // Release
            env.gate_off();
            for _ in 0..24000 {
                sum += env.advance();
            }
            black_box(sum)
        })
    });

    group.finish();
}

// ============================================================================
// Single-voice engine benchmarks
// ============================================================================

fn bench_single_voice_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_1Voice");

    for &block_size in BLOCK_SIZES {
        let mut engine: SoundEngine<1> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.set_osc2_waveform(OscillatorWaveform::Saw);
        engine.set_osc2_detune(7.0);
        engine.set_filter_cutoff(2000.0);
        engine.set_filter_resonance(2.0);
        engine.note_on(60, 100, 0, 0);

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    engine.process(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_single_voice_engine_modulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_1Voice_Modulation");

    for &block_size in BLOCK_SIZES {
        let mut engine: SoundEngine<1> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.set_osc2_waveform(OscillatorWaveform::Square);
        engine.set_osc2_detune(5.0);
        engine.set_osc_mix(0.5);
        engine.set_filter_cutoff(1500.0);
        engine.set_filter_resonance(3.0);
        engine.set_filter_env_amount(2000.0);
        engine.set_lfo1_rate(5.0);
        engine.set_lfo1_to_pitch(0.5);
        engine.set_lfo1_to_filter(500.0);
        engine.note_on(60, 100, 0, 0);

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    engine.process(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Polyphonic engine benchmarks
// ============================================================================

fn bench_engine_4_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_4Voice");

    for &block_size in BLOCK_SIZES {
        let mut engine: SoundEngine<2> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.set_filter_cutoff(2000.0);

        // Play a chord (all 4 voices active)
        engine.note_on(60, 100, 0, 0); // C
        engine.note_on(64, 100, 0, 0); // E
        engine.note_on(67, 100, 0, 0); // G
        engine.note_on(72, 100, 0, 0); // C octave

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    engine.process(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_engine_8_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_8Voice");

    for &block_size in BLOCK_SIZES {
        let mut engine: SoundEngine<4> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.set_osc2_waveform(OscillatorWaveform::Saw);
        engine.set_osc2_detune(7.0);
        engine.set_filter_cutoff(2000.0);
        engine.set_filter_resonance(2.0);

        // Play all 8 voices
        for note in [48, 52, 55, 60, 64, 67, 72, 76] {
            engine.note_on(note, 100, 0, 0);
        }

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    engine.process(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_engine_16_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_16Voice");

    for &block_size in BLOCK_SIZES {
        let mut engine: SoundEngine<8> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.set_osc2_waveform(OscillatorWaveform::Square);
        engine.set_osc2_detune(5.0);
        engine.set_osc_mix(0.3);
        engine.set_filter_cutoff(3000.0);
        engine.set_filter_resonance(1.5);

        // Play all 16 voices
        for i in 0..16 {
            engine.note_on(36 + i * 3, 100, 0, 0);
        }

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    engine.process(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

fn bench_engine_voice_stealing(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_VoiceStealing");

    // Test voice stealing performance
    group.bench_function("voice_stealing_8voice", |b| {
        let mut engine: SoundEngine<4> = SoundEngine::new(SAMPLE_RATE);
        engine.set_voice_priority(VoicePriority::Oldest);

        let mut left = vec![0.0f32; 64];
        let mut right = vec![0.0f32; 64];

        b.iter(|| {
            // Play more notes than voices, forcing stealing
            for i in 0..12 {
                engine.note_on(48 + i * 2, 100, 0, 0);
                engine.process(&mut left, &mut right);
                black_box(left[0]);
            }
            engine.kill_all();
        })
    });

    group.finish();
}

fn bench_engine_with_lfo(c: &mut Criterion) {
    let mut group = c.benchmark_group("SoundEngine_LFO");

    for &block_size in BLOCK_SIZES {
        let mut engine: SoundEngine<4> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.set_filter_cutoff(2000.0);
        engine.set_lfo1_rate(5.0);
        engine.set_lfo1_to_pitch(0.5);
        engine.set_lfo1_to_filter(500.0);

        // Play 4 voices
        engine.note_on(60, 100, 0, 0);
        engine.note_on(64, 100, 0, 0);
        engine.note_on(67, 100, 0, 0);
        engine.note_on(72, 100, 0, 0);

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, _| {
                b.iter(|| {
                    engine.process(&mut left, &mut right);
                    black_box(left[0])
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Voice scaling benchmark
// ============================================================================

fn bench_voice_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("VoiceScaling");
    let block_size = 256;

    // 1 voice
    {
        let mut engine: SoundEngine<1> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.note_on(60, 100, 0, 0);

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_function("1_voice", |b| {
            b.iter(|| {
                engine.process(&mut left, &mut right);
                black_box(left[0])
            })
        });
    }

    // 2 voices
    {
        let mut engine: SoundEngine<1> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        engine.note_on(60, 100, 0, 0);
        engine.note_on(64, 100, 0, 0);

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_function("2_voices", |b| {
            b.iter(|| {
                engine.process(&mut left, &mut right);
                black_box(left[0])
            })
        });
    }

    // 4 voices
    {
        let mut engine: SoundEngine<2> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        for note in [60, 64, 67, 72] {
            engine.note_on(note, 100, 0, 0);
        }

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_function("4_voices", |b| {
            b.iter(|| {
                engine.process(&mut left, &mut right);
                black_box(left[0])
            })
        });
    }

    // 8 voices
    {
        let mut engine: SoundEngine<4> = SoundEngine::new(SAMPLE_RATE);
        engine.set_osc1_waveform(OscillatorWaveform::Saw);
        for note in [48, 52, 55, 60, 64, 67, 72, 76] {
            engine.note_on(note, 100, 0, 0);
        }

        let mut left = vec![0.0f32; block_size];
        let mut right = vec![0.0f32; block_size];

        group.bench_function("8_voices", |b| {
            b.iter(|| {
                engine.process(&mut left, &mut right);
                black_box(left[0])
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_oscillator_waveforms,
    bench_oscillator_phase_modulation,
    bench_envelope_adsr,
    bench_envelope_full_cycle,
    bench_single_voice_engine,
    bench_single_voice_engine_modulation,
    bench_engine_4_voices,
    bench_engine_8_voices,
    bench_engine_16_voices,
    bench_engine_voice_stealing,
    bench_engine_with_lfo,
    bench_voice_scaling,
);

criterion_main!(benches);
