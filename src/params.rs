//! # Plugin Parameters
//!
//! Parameters are the knobs and sliders the user sees in the DAW. Each
//! parameter has:
//!
//! - A **unique string ID** (`#[id = "..."]`) that the host uses to
//!   save and recall presets. Once published, never change these IDs
//!   or existing presets will break.
//! - A **human-readable name** shown in the DAW's UI.
//! - A **range** and a **default value**.
//!
//! ## No Smoothers
//!
//! Unlike most plugins, nothing here is smoothed. The engine reads one
//! snapshot per block ([`PluginParams::snapshot`]); clicks from level
//! changes are handled by the explicit Gain Begin / Gain End ramp, and a
//! delay time change deliberately restarts the delay line from silence.

use nih_plug::prelude::*;

use crate::dsp::{DelayMode, DelayParams};

/// All user-facing parameters for the Loveless Granular Delay plugin.
#[derive(Params)]
pub struct PluginParams {
    /// **Delay Time** in seconds, 10 ms to 10 s.
    ///
    /// Skewed so that the first half of the knob covers roughly the first
    /// second, where small changes are easiest to hear.
    #[id = "delay"]
    pub delay_time: FloatParam,

    /// **Feedback**: how much of each echo goes around again.
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// **Mix**: 0% is the dry input only, 100% the delayed signal only.
    #[id = "mix"]
    pub mix: FloatParam,

    /// **Gain Begin / Gain End**: the wet level ramps from the first to
    /// the second across every block.
    #[id = "gbeg"]
    pub gain_begin: FloatParam,

    #[id = "gend"]
    pub gain_end: FloatParam,

    /// **Granular Mode**: replace the single delay tap by a cloud of
    /// grains read from the same history.
    #[id = "gran"]
    pub granular_mode: BoolParam,

    /// **Grain Size** in milliseconds.
    #[id = "gsize"]
    pub grain_size: FloatParam,

    /// **Grain Density**: grains started per second, per channel.
    #[id = "gdens"]
    pub grain_density: FloatParam,

    /// **Grain Pitch**: playback speed of every grain. 2.0 is an octave
    /// up, 0.5 an octave down.
    #[id = "gpitch"]
    pub grain_pitch: FloatParam,

    /// **Grain Spread**: random jitter on where grains start, in
    /// milliseconds.
    #[id = "gsprd"]
    pub grain_spread: FloatParam,
}

impl PluginParams {
    /// Read every parameter once, for one block of audio.
    pub fn snapshot(&self) -> DelayParams {
        DelayParams {
            delay_seconds: self.delay_time.value(),
            feedback: self.feedback.value(),
            wet_dry: self.mix.value(),
            gain_begin: self.gain_begin.value(),
            gain_end: self.gain_end.value(),
            mode: DelayMode::from(self.granular_mode.value()),
            grain_size_ms: self.grain_size.value(),
            grain_density_hz: self.grain_density.value(),
            grain_pitch_ratio: self.grain_pitch.value(),
            grain_spread_ms: self.grain_spread.value(),
        }
    }
}

/// A 0..1 parameter displayed as a percentage.
fn percentage_param(name: &str, default: f32) -> FloatParam {
    FloatParam::new(name, default, FloatRange::Linear { min: 0.0, max: 1.0 })
        .with_unit("%")
        .with_value_to_string(formatters::v2s_f32_percentage(1))
        .with_string_to_value(formatters::s2v_f32_percentage())
}

impl Default for PluginParams {
    fn default() -> Self {
        let defaults = DelayParams::default();

        Self {
            delay_time: FloatParam::new(
                "Delay Time",
                defaults.delay_seconds,
                FloatRange::Skewed {
                    min: 0.01,
                    max: 10.0,
                    // Negative = more resolution at the low end.
                    factor: FloatRange::skew_factor(-2.0),
                },
            )
            .with_unit(" s")
            .with_step_size(0.001),

            feedback: percentage_param("Feedback", defaults.feedback),
            mix: percentage_param("Mix", defaults.wet_dry),
            gain_begin: percentage_param("Gain Begin", defaults.gain_begin),
            gain_end: percentage_param("Gain End", defaults.gain_end),

            granular_mode: BoolParam::new("Granular Mode", defaults.mode == DelayMode::Granular),

            grain_size: FloatParam::new(
                "Grain Size",
                defaults.grain_size_ms,
                FloatRange::Skewed {
                    min: 10.0,
                    max: 500.0,
                    factor: FloatRange::skew_factor(-1.0),
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),

            grain_density: FloatParam::new(
                "Grain Density",
                defaults.grain_density_hz,
                FloatRange::Linear {
                    min: 1.0,
                    max: 50.0,
                },
            )
            .with_unit(" Hz")
            .with_step_size(0.1),

            grain_pitch: FloatParam::new(
                "Grain Pitch",
                defaults.grain_pitch_ratio,
                // Centered on 1.0 so unity pitch sits at 12 o'clock, with
                // two octaves either way.
                FloatRange::SymmetricalSkewed {
                    min: 0.25,
                    max: 4.0,
                    factor: FloatRange::skew_factor(-1.0),
                    center: 1.0,
                },
            )
            .with_unit("x")
            .with_step_size(0.01),

            grain_spread: FloatParam::new(
                "Grain Spread",
                defaults.grain_spread_ms,
                FloatRange::Linear {
                    min: 0.0,
                    max: 200.0,
                },
            )
            .with_unit(" ms")
            .with_step_size(0.1),
        }
    }
}
