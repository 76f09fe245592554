//! Scalar defect shapes along the track.
//!
//! A waveform is a function `w(x)` of the local coordinate `x = s - start`
//! measured from the beginning of the defect window. Profiles need `w` and
//! its first three derivatives; all are given in closed form. The generic
//! evaluators (`value`, `slope`) exist so the derivative audit can push
//! dual numbers through the same formulas.

use crate::error::{TrackError, TrackResult};
use crate::traits::Scalar;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Defect shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Waveform {
    /// One-minus-cosine dip `A (cos(kx) - 1)`, zero with zero slope at
    /// `x = 0`, trough depth `2A`.
    Cosine { amplitude: f64, wavelength: f64 },
    /// Pure sinusoid `A sin(kx + phase)`.
    Harmonic {
        amplitude: f64,
        wavelength: f64,
        #[serde(default)]
        phase: f64,
    },
}

/// `w` and its first three derivatives at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveSample {
    pub w: f64,
    pub w1: f64,
    pub w2: f64,
    pub w3: f64,
}

impl Waveform {
    pub fn validate(&self) -> TrackResult<()> {
        let (amplitude, wavelength) = self.amplitude_and_wavelength();
        if !amplitude.is_finite() {
            return Err(TrackError::InvalidWaveform(format!(
                "amplitude must be finite, got {amplitude}"
            )));
        }
        if !(wavelength.is_finite() && wavelength > 0.0) {
            return Err(TrackError::InvalidWaveform(format!(
                "wavelength must be finite and positive, got {wavelength}"
            )));
        }
        if let Waveform::Harmonic { phase, .. } = self {
            if !phase.is_finite() {
                return Err(TrackError::InvalidWaveform(format!(
                    "phase must be finite, got {phase}"
                )));
            }
        }
        Ok(())
    }

    fn amplitude_and_wavelength(&self) -> (f64, f64) {
        match *self {
            Waveform::Cosine {
                amplitude,
                wavelength,
            }
            | Waveform::Harmonic {
                amplitude,
                wavelength,
                ..
            } => (amplitude, wavelength),
        }
    }

    /// Wavenumber `k = 2π / λ`.
    pub fn wavenumber(&self) -> f64 {
        2.0 * PI / self.amplitude_and_wavelength().1
    }

    /// Upper bound of `|w|` over the whole real line.
    pub fn peak_value(&self) -> f64 {
        let (amplitude, _) = self.amplitude_and_wavelength();
        match self {
            Waveform::Cosine { .. } => 2.0 * amplitude.abs(),
            Waveform::Harmonic { .. } => amplitude.abs(),
        }
    }

    /// Upper bound of `|w'|` over the whole real line.
    pub fn peak_slope(&self) -> f64 {
        self.amplitude_and_wavelength().0.abs() * self.wavenumber()
    }

    pub fn sample(&self, x: f64) -> WaveSample {
        let k = self.wavenumber();
        match *self {
            Waveform::Cosine { amplitude: a, .. } => {
                let (sin, cos) = (k * x).sin_cos();
                WaveSample {
                    w: a * (cos - 1.0),
                    w1: -a * k * sin,
                    w2: -a * k * k * cos,
                    w3: a * k * k * k * sin,
                }
            }
            Waveform::Harmonic {
                amplitude: a,
                phase,
                ..
            } => {
                let (sin, cos) = (k * x + phase).sin_cos();
                WaveSample {
                    w: a * sin,
                    w1: a * k * cos,
                    w2: -a * k * k * sin,
                    w3: -a * k * k * k * cos,
                }
            }
        }
    }

    /// `w(x)` for any scalar type.
    pub fn value<T: Scalar>(&self, x: T) -> T {
        let k = constant::<T>(self.wavenumber());
        match *self {
            Waveform::Cosine { amplitude, .. } => {
                constant::<T>(amplitude) * ((k * x).cos() - T::one())
            }
            Waveform::Harmonic {
                amplitude, phase, ..
            } => constant::<T>(amplitude) * (k * x + constant::<T>(phase)).sin(),
        }
    }

    /// `w'(x)` for any scalar type.
    pub fn slope<T: Scalar>(&self, x: T) -> T {
        let k = constant::<T>(self.wavenumber());
        match *self {
            Waveform::Cosine { amplitude, .. } => -constant::<T>(amplitude) * k * (k * x).sin(),
            Waveform::Harmonic {
                amplitude, phase, ..
            } => constant::<T>(amplitude) * k * (k * x + constant::<T>(phase)).cos(),
        }
    }
}

fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual2;
    use approx::assert_relative_eq;

    fn cosine() -> Waveform {
        Waveform::Cosine {
            amplitude: 0.01,
            wavelength: 10.0,
        }
    }

    #[test]
    fn cosine_matches_closed_form_constants() {
        // 0.01 cos(π x / 5) - 0.01 and its derivative chain.
        let x = 1.3;
        let sample = cosine().sample(x);
        let arg = PI * x / 5.0;
        assert_relative_eq!(sample.w, 0.01 * arg.cos() - 0.01, max_relative = 1e-14);
        assert_relative_eq!(sample.w1, -2e-3 * PI * arg.sin(), max_relative = 1e-14);
        assert_relative_eq!(sample.w2, -4e-4 * PI * PI * arg.cos(), max_relative = 1e-14);
        assert_relative_eq!(sample.w3, 8e-5 * PI.powi(3) * arg.sin(), max_relative = 1e-14);
    }

    #[test]
    fn cosine_starts_flat() {
        let sample = cosine().sample(0.0);
        assert_eq!(sample.w, 0.0);
        assert_eq!(sample.w1, 0.0);
    }

    #[test]
    fn derivatives_agree_with_automatic_differentiation() {
        let shapes = [
            cosine(),
            Waveform::Harmonic {
                amplitude: 0.004,
                wavelength: 25.0,
                phase: 0.4,
            },
        ];
        for shape in shapes {
            for &x in &[0.0, 0.37, 2.5, 7.9, 18.2] {
                let sample = shape.sample(x);
                let w = shape.value(Dual2::second_order(x));
                let w1 = shape.slope(Dual2::second_order(x));
                assert_relative_eq!(w.value(), sample.w, epsilon = 1e-15, max_relative = 1e-12);
                assert_relative_eq!(w.first(), sample.w1, epsilon = 1e-15, max_relative = 1e-12);
                assert_relative_eq!(w.second(), sample.w2, epsilon = 1e-15, max_relative = 1e-12);
                assert_relative_eq!(w1.second(), sample.w3, epsilon = 1e-15, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn peaks_bound_the_samples() {
        let shape = cosine();
        for i in 0..200 {
            let sample = shape.sample(i as f64 * 0.05);
            assert!(sample.w.abs() <= shape.peak_value() + 1e-15);
            assert!(sample.w1.abs() <= shape.peak_slope() + 1e-15);
        }
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        let bad_wavelength = Waveform::Cosine {
            amplitude: 0.01,
            wavelength: 0.0,
        };
        assert!(matches!(
            bad_wavelength.validate(),
            Err(TrackError::InvalidWaveform(_))
        ));
        let bad_amplitude = Waveform::Harmonic {
            amplitude: f64::NAN,
            wavelength: 3.0,
            phase: 0.0,
        };
        assert!(bad_amplitude.validate().is_err());
        assert!(cosine().validate().is_ok());
    }

    #[test]
    fn deserializes_tagged_shapes() {
        let shape: Waveform =
            serde_json::from_str(r#"{"shape":"harmonic","amplitude":0.002,"wavelength":12.0}"#)
                .expect("waveform should parse");
        assert_eq!(
            shape,
            Waveform::Harmonic {
                amplitude: 0.002,
                wavelength: 12.0,
                phase: 0.0
            }
        );
    }
}
