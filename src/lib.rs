//! # Loveless Granular Delay — An AU/VST3/CLAP Delay Plugin
//!
//! A two-mode delay built with [nih-plug](https://github.com/robbert-vdh/nih-plug).
//! In standard mode it is a classic feedback delay; in granular mode the
//! same delay history is played back as a cloud of short, enveloped,
//! pitch-shifted grains.
//!
//! All DSP lives in [`dsp`] and has no knowledge of the plugin framework:
//! [`DelayEngine`] can be driven from any host (or test) that hands it
//! blocks of `f32` samples.
//!
//! ## Signal Flow
//!
//! ```text
//! Input ──┬─────────────────────────────────────── × (1 - mix) ─────┐
//!         │                                                         │
//!         │      ┌──────── FEEDBACK ─────────┐                      │
//!         │      ▼                           │                      │
//!         └──►(+)──► [Ring Buffer] ──┬──► delay tap ──┐ × gain ramp │
//!                   (delay history)  │                ├──► × mix ──(+)──► Output
//!                                    └──► grains ─────┘
//!                                  (granular mode)
//! ```

pub mod dsp;
mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use nih_plug::prelude::*;

pub use dsp::{DelayEngine, DelayMode, DelayParams};
use dsp::engine::MAX_DELAY_SECONDS;
use params::PluginParams;

/// The main plugin struct.
///
/// `params` is shared with the host; everything else belongs to the audio
/// thread and is only touched in `initialize()`, `reset()` and `process()`.
struct LovelessGranularDelay {
    params: Arc<PluginParams>,

    /// Current sample rate in Hz, set in `initialize()`.
    sample_rate: f32,

    /// Delay history, both delay modes and their scratch memory.
    engine: DelayEngine,
}

impl Default for LovelessGranularDelay {
    fn default() -> Self {
        Self {
            params: Arc::new(PluginParams::default()),
            // Placeholder until the host tells us the real rate.
            sample_rate: 44100.0,
            // Unprepared: allocated in initialize().
            engine: DelayEngine::new(),
        }
    }
}

impl Plugin for LovelessGranularDelay {
    const NAME: &'static str = "Loveless Granular Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first, mono as a fallback. Input and output always match.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Parameters are read once per block, so splitting blocks at
    // automation points would only cost us: every split is a fresh gain
    // ramp.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocate the delay history (10 s per channel), the grain pool and
    /// scratch buffers sized for the host's largest block. Nothing is
    /// allocated after this.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        self.sample_rate = buffer_config.sample_rate;

        let num_channels = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(2);
        let max_block_size = buffer_config.max_buffer_size.max(1) as usize;

        if self.sample_rate <= 0.0 {
            nih_error!("Refusing to initialize at a sample rate of {} Hz", self.sample_rate);
            return false;
        }

        self.engine.prepare_with_block_size(
            self.sample_rate as f64,
            num_channels,
            MAX_DELAY_SECONDS,
            max_block_size,
        );

        nih_log!(
            "Initialized: {} Hz, {} channel(s), {} samples max per block, {} samples of history",
            self.sample_rate,
            num_channels,
            max_block_size,
            self.engine.history().max_capacity(),
        );

        true
    }

    /// Silence the delay history and retire all grains so stale audio
    /// doesn't bleed into the next playback.
    fn reset(&mut self) {
        self.engine.reset();
    }

    /// Process one block in place.
    ///
    /// The parameters are snapshotted once, then the engine does all the
    /// work: resize on delay changes, standard or granular processing,
    /// feedback and cursor bookkeeping.
    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        let params = self.params.snapshot();
        self.engine
            .process(buffer.as_slice(), &params, self.sample_rate as f64);

        ProcessStatus::Tail(tail_samples(&params, self.sample_rate))
    }
}

/// How long the host should keep calling `process()` after the input goes
/// silent.
///
/// Each repeat is `feedback` times the previous one, so after N repeats
/// the level is `feedback^N`. Solving `feedback^N = 0.001` (-60 dB):
///
/// ```text
/// N = log10(0.001) / log10(feedback) = -3 / log10(feedback)
/// ```
///
/// Granular mode plays grains from anywhere in the history, so its tail is
/// the same number of delay periods.
fn tail_samples(params: &DelayParams, sample_rate: f32) -> u32 {
    let params = params.clamped();
    let delay_samples = params.delay_seconds * sample_rate;

    // At 100% feedback the echoes never die out.
    let feedback = params.feedback.min(0.999);

    if feedback > 0.001 {
        let repeats = -3.0 / feedback.log10();
        (repeats * delay_samples) as u32
    } else {
        // No feedback: a single echo.
        delay_samples as u32
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for LovelessGranularDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.loveless-granular-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("A feedback delay with a granular resynthesis mode");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
        ClapFeature::Granular,
    ];
}

impl Vst3Plugin for LovelessGranularDelay {
    // 16 ASCII bytes, unique to this plugin.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssGrnDelay001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────

nih_export_clap!(LovelessGranularDelay);
nih_export_vst3!(LovelessGranularDelay);

// AUv2 entry point for Logic Pro, wrapping the CLAP build.
clap_wrapper::export_auv2!();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_without_feedback_is_one_delay() {
        let params = DelayParams {
            delay_seconds: 0.5,
            feedback: 0.0,
            ..DelayParams::default()
        };
        assert_eq!(tail_samples(&params, 48000.0), 24000);
    }

    #[test]
    fn test_tail_grows_with_feedback() {
        let short = DelayParams {
            feedback: 0.1,
            ..DelayParams::default()
        };
        let long = DelayParams {
            feedback: 0.9,
            ..DelayParams::default()
        };

        // 0.1^3 = -60 dB: three repeats.
        let sample_rate = 1000.0;
        assert!((2999..=3001).contains(&tail_samples(&short, sample_rate)));
        assert!(tail_samples(&long, sample_rate) > tail_samples(&short, sample_rate));
    }

    #[test]
    fn test_tail_is_finite_at_full_feedback() {
        let params = DelayParams {
            feedback: 1.0,
            delay_seconds: 10.0,
            ..DelayParams::default()
        };
        let tail = tail_samples(&params, 48000.0);
        assert!(tail > 0 && tail < u32::MAX);
    }
}
