//! Configurable defect profiles.
//!
//! A [`TrackDefect`] pairs a [`Waveform`] with a [`DefectKind`] that says
//! which pose rows the waveform perturbs. Translational rows take the
//! waveform directly; rotational rows take `±asin(u)` of a waveform-derived
//! argument `u`, which is where the chain rule gets interesting:
//!
//! ```text
//! φ   = σ asin(u)
//! φ'  = σ u' / √(1 − u²)
//! φ'' = σ (u''(1 − u²) + u u'²) / (1 − u²)^{3/2}
//! ```

use crate::error::{TrackError, TrackResult};
use crate::pose::{Pose6, PoseRow, PoseTiers, RowMask};
use crate::traits::{DefectProfile, Scalar};
use crate::waveform::{WaveSample, Waveform};
use serde::{Deserialize, Serialize};

/// Closed arc-length interval where a defect is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefectWindow {
    pub start: f64,
    pub end: f64,
}

impl DefectWindow {
    pub fn new(start: f64, end: f64) -> TrackResult<Self> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    pub fn validate(&self) -> TrackResult<()> {
        if !(self.start.is_finite() && self.end.is_finite() && self.start < self.end) {
            return Err(TrackError::InvalidWindow {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Both bounds are inside. NaN is outside.
    pub fn contains(&self, s: f64) -> bool {
        self.start <= s && s <= self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Which geometric quantity a defect perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefectKind {
    /// Vertical profile: `z += w`, `pitch += −asin(w')`.
    LongitudinalLevel,
    /// Lateral line: `y += w`, `yaw += asin(w')`.
    Alignment,
    /// Height difference between the rails over `gauge`:
    /// `roll += asin(w / gauge)`.
    Crosslevel { gauge: f64 },
}

impl DefectKind {
    pub fn rows(&self) -> RowMask {
        match self {
            DefectKind::LongitudinalLevel => RowMask::of(&[PoseRow::Z, PoseRow::Pitch]),
            DefectKind::Alignment => RowMask::of(&[PoseRow::Y, PoseRow::Yaw]),
            DefectKind::Crosslevel { .. } => RowMask::of(&[PoseRow::Roll]),
        }
    }

    fn translation_row(&self) -> Option<PoseRow> {
        match self {
            DefectKind::LongitudinalLevel => Some(PoseRow::Z),
            DefectKind::Alignment => Some(PoseRow::Y),
            DefectKind::Crosslevel { .. } => None,
        }
    }

    fn rotation_row(&self) -> PoseRow {
        match self {
            DefectKind::LongitudinalLevel => PoseRow::Pitch,
            DefectKind::Alignment => PoseRow::Yaw,
            DefectKind::Crosslevel { .. } => PoseRow::Roll,
        }
    }

    /// Sign of the rotation: a rising vertical slope pitches the frame
    /// nose-up, which is a negative rotation about the lateral axis.
    fn rotation_sign(&self) -> f64 {
        match self {
            DefectKind::LongitudinalLevel => -1.0,
            DefectKind::Alignment | DefectKind::Crosslevel { .. } => 1.0,
        }
    }

    /// asin argument `(u, u', u'')` from the waveform sample.
    fn angle_argument(&self, wave: &WaveSample) -> (f64, f64, f64) {
        match *self {
            DefectKind::LongitudinalLevel | DefectKind::Alignment => (wave.w1, wave.w2, wave.w3),
            DefectKind::Crosslevel { gauge } => (wave.w / gauge, wave.w1 / gauge, wave.w2 / gauge),
        }
    }

    /// Upper bound of `|u|` for the given waveform.
    fn peak_angle_argument(&self, waveform: &Waveform) -> f64 {
        match *self {
            DefectKind::LongitudinalLevel | DefectKind::Alignment => waveform.peak_slope(),
            DefectKind::Crosslevel { gauge } => waveform.peak_value() / gauge,
        }
    }
}

/// A waveform applied to one kind of track geometry over a window.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDefect {
    name: String,
    window: DefectWindow,
    kind: DefectKind,
    waveform: Waveform,
}

impl TrackDefect {
    /// Builds a defect, rejecting parameters that would take an `asin`
    /// argument to unit magnitude anywhere on the track.
    pub fn new(
        name: impl Into<String>,
        window: DefectWindow,
        kind: DefectKind,
        waveform: Waveform,
    ) -> TrackResult<Self> {
        let name = name.into();
        window.validate()?;
        waveform.validate()?;
        if let DefectKind::Crosslevel { gauge } = kind {
            if !(gauge.is_finite() && gauge > 0.0) {
                return Err(TrackError::InvalidConfig(format!(
                    "defect `{name}`: gauge must be finite and positive, got {gauge}"
                )));
            }
        }
        let peak = kind.peak_angle_argument(&waveform);
        if !(peak < 1.0) {
            return Err(TrackError::DomainViolation { name, peak });
        }
        Ok(Self {
            name,
            window,
            kind,
            waveform,
        })
    }

    /// The cosine longitudinal level dip: 10 m wavelength, 10 mm
    /// amplitude (20 mm trough), active on the given window.
    pub fn cosine_level(name: impl Into<String>, window: DefectWindow) -> TrackResult<Self> {
        Self::new(
            name,
            window,
            DefectKind::LongitudinalLevel,
            Waveform::Cosine {
                amplitude: 0.01,
                wavelength: 10.0,
            },
        )
    }

    pub fn kind(&self) -> DefectKind {
        self.kind
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    fn local(&self, s: f64) -> f64 {
        s - self.window.start
    }

    /// Pose increment for any scalar type, ignoring the window.
    pub fn pose_generic<T: Scalar>(&self, s: T) -> [T; 6] {
        let mut pose = [T::zero(); 6];
        let x = s - T::from_f64(self.window.start).unwrap_or_else(T::nan);
        let sign = T::from_f64(self.kind.rotation_sign()).unwrap_or_else(T::nan);
        if let Some(row) = self.kind.translation_row() {
            pose[row.index()] = self.waveform.value(x);
        }
        let u = match self.kind {
            DefectKind::LongitudinalLevel | DefectKind::Alignment => self.waveform.slope(x),
            DefectKind::Crosslevel { gauge } => {
                self.waveform.value(x) / T::from_f64(gauge).unwrap_or_else(T::nan)
            }
        };
        pose[self.kind.rotation_row().index()] = sign * u.asin();
        pose
    }

    /// Pose inside the window.
    fn eval_pose(&self, wave: &WaveSample) -> Pose6 {
        let mut pose = Pose6::zeros();
        if let Some(row) = self.kind.translation_row() {
            pose[row.index()] = wave.w;
        }
        let (u, _, _) = self.kind.angle_argument(wave);
        pose[self.kind.rotation_row().index()] = self.kind.rotation_sign() * u.asin();
        pose
    }

    /// `d pose/ds` inside the window.
    fn eval_pose_ds(&self, wave: &WaveSample) -> Pose6 {
        let mut pose_ds = Pose6::zeros();
        if let Some(row) = self.kind.translation_row() {
            pose_ds[row.index()] = wave.w1;
        }
        let (u, u1, _) = self.kind.angle_argument(wave);
        pose_ds[self.kind.rotation_row().index()] =
            self.kind.rotation_sign() * u1 / (1.0 - u * u).sqrt();
        pose_ds
    }

    /// `d²pose/ds²` inside the window, unscaled.
    fn eval_pose_dss(&self, wave: &WaveSample) -> Pose6 {
        let mut pose_dss = Pose6::zeros();
        if let Some(row) = self.kind.translation_row() {
            pose_dss[row.index()] = wave.w2;
        }
        let (u, u1, u2) = self.kind.angle_argument(wave);
        let q = 1.0 - u * u;
        pose_dss[self.kind.rotation_row().index()] =
            self.kind.rotation_sign() * (u2 * q + u * u1 * u1) / (q * q.sqrt());
        pose_dss
    }
}

impl DefectProfile for TrackDefect {
    fn name(&self) -> &str {
        &self.name
    }

    fn window(&self) -> DefectWindow {
        self.window
    }

    fn affected_rows(&self) -> RowMask {
        self.kind.rows()
    }

    fn pose_in_window(&self, s: f64) -> Pose6 {
        self.eval_pose(&self.waveform.sample(self.local(s)))
    }

    fn pose_ds_in_window(&self, s: f64) -> Pose6 {
        self.eval_pose_ds(&self.waveform.sample(self.local(s)))
    }

    fn pose_dss_in_window(&self, s: f64) -> Pose6 {
        self.eval_pose_dss(&self.waveform.sample(self.local(s)))
    }

    fn tiers(&self, s: f64, sd: f64) -> Option<PoseTiers> {
        if !self.window.contains(s) {
            return None;
        }
        let wave = self.waveform.sample(self.local(s));
        Some(PoseTiers {
            pose: self.eval_pose(&wave),
            pose_ds: self.eval_pose_ds(&wave),
            velocity_term: self.eval_pose_dss(&wave) * (sd * sd),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn dip() -> TrackDefect {
        TrackDefect::cosine_level("dip", DefectWindow::new(100.0, 200.0).unwrap()).unwrap()
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: TrackResult<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn window_is_closed_and_validated() {
        let window = DefectWindow::new(1.0, 2.0).unwrap();
        assert!(window.contains(1.0));
        assert!(window.contains(2.0));
        assert!(!window.contains(0.999_999));
        assert!(!window.contains(f64::NAN));
        assert_eq!(window.length(), 1.0);
        assert!(DefectWindow::new(2.0, 2.0).is_err());
        assert!(DefectWindow::new(f64::NEG_INFINITY, 2.0).is_err());
    }

    #[test]
    fn cosine_level_reproduces_reference_formulas() {
        let defect = dip();
        let s = 137.3;
        let arg = PI * (s - 100.0) / 5.0;
        let g = -2e-3 * PI * arg.sin();
        let g1 = -0.01 * PI * PI * arg.cos() / 25.0;

        let pose = defect.delta_pose(s);
        assert_relative_eq!(pose[2], 0.01 * arg.cos() - 0.01, max_relative = 1e-12);
        assert_relative_eq!(pose[4], -g.asin(), max_relative = 1e-12);

        let pose_ds = defect.delta_pose_ds(s);
        assert_relative_eq!(pose_ds[2], g, max_relative = 1e-12);
        assert_relative_eq!(pose_ds[4], -g1 / (1.0 - g * g).sqrt(), max_relative = 1e-12);

        for row in [0, 1, 3, 5] {
            assert_eq!(pose[row], 0.0);
            assert_eq!(pose_ds[row], 0.0);
        }
    }

    #[test]
    fn velocity_term_uses_quotient_rule() {
        let defect = dip();
        let s = 101.0;
        let sd = 2.0;
        let term = defect.delta_pose_velocity_term(s, sd);
        // Independent evaluation of d²(-asin(g))/ds².
        let x = s - 100.0;
        let k = PI / 5.0;
        let g = -0.01 * k * (k * x).sin();
        let g1 = -0.01 * k * k * (k * x).cos();
        let g2 = 0.01 * k * k * k * (k * x).sin();
        let q = 1.0 - g * g;
        let expected = -(g2 * q + g * g1 * g1) / q.powf(1.5);
        assert_relative_eq!(term[4], expected * sd * sd, max_relative = 1e-12);
        assert_relative_eq!(term[2], g1 * sd * sd, max_relative = 1e-12);
        assert_relative_eq!(term[4], -1.45797484213782400e-03 * 4.0, max_relative = 1e-9);
    }

    #[test]
    fn outside_window_is_exact_zero() {
        let defect = dip();
        for s in [99.999, 200.0001, -5.0, 1e9] {
            assert_eq!(defect.delta_pose(s), Pose6::zeros());
            assert_eq!(defect.delta_pose_ds(s), Pose6::zeros());
            assert_eq!(defect.delta_pose_velocity_term(s, 3.0), Pose6::zeros());
            assert!(defect.tiers(s, 3.0).is_none());
        }
    }

    #[test]
    fn tiers_match_individual_calls() {
        let defect = dip();
        let tiers = defect.tiers(123.4, -1.7).expect("inside window");
        assert_eq!(tiers.pose, defect.delta_pose(123.4));
        assert_eq!(tiers.pose_ds, defect.delta_pose_ds(123.4));
        assert_eq!(tiers.velocity_term, defect.delta_pose_velocity_term(123.4, -1.7));
    }

    #[test]
    fn alignment_yaws_with_the_lateral_slope() {
        let defect = TrackDefect::new(
            "kink",
            DefectWindow::new(0.0, 50.0).unwrap(),
            DefectKind::Alignment,
            Waveform::Harmonic {
                amplitude: 0.005,
                wavelength: 20.0,
                phase: 0.0,
            },
        )
        .unwrap();
        let pose = defect.delta_pose(1.0);
        let slope = defect.delta_pose_ds(1.0)[1];
        assert!(slope > 0.0);
        assert_relative_eq!(pose[3], slope.asin(), max_relative = 1e-12);
        assert_eq!(pose[2], 0.0);
        assert_eq!(defect.affected_rows(), RowMask::of(&[PoseRow::Y, PoseRow::Yaw]));
    }

    #[test]
    fn crosslevel_rolls_by_height_over_gauge() {
        let gauge = 1.5;
        let defect = TrackDefect::new(
            "twist",
            DefectWindow::new(10.0, 40.0).unwrap(),
            DefectKind::Crosslevel { gauge },
            Waveform::Harmonic {
                amplitude: 0.02,
                wavelength: 30.0,
                phase: 0.0,
            },
        )
        .unwrap();
        let s = 14.0;
        let w = 0.02 * (2.0 * PI * 4.0 / 30.0).sin();
        let pose = defect.delta_pose(s);
        assert_relative_eq!(pose[5], (w / gauge).asin(), max_relative = 1e-12);
        assert_eq!(pose[2], 0.0);
        assert_eq!(defect.affected_rows(), RowMask::of(&[PoseRow::Roll]));
    }

    #[test]
    fn rejects_out_of_domain_amplitude() {
        // A k = 0.2 * 2π / 1 > 1
        let result = TrackDefect::new(
            "steep",
            DefectWindow::new(0.0, 10.0).unwrap(),
            DefectKind::LongitudinalLevel,
            Waveform::Cosine {
                amplitude: 0.2,
                wavelength: 1.0,
            },
        );
        assert!(matches!(result, Err(TrackError::DomainViolation { .. })));
        assert_err_contains(result, "steep");

        let result = TrackDefect::new(
            "tall",
            DefectWindow::new(0.0, 10.0).unwrap(),
            DefectKind::Crosslevel { gauge: 1.435 },
            Waveform::Cosine {
                amplitude: 0.8,
                wavelength: 100.0,
            },
        );
        assert_err_contains(result, "asin domain");
    }

    #[test]
    fn rejects_bad_gauge() {
        let result = TrackDefect::new(
            "flat",
            DefectWindow::new(0.0, 10.0).unwrap(),
            DefectKind::Crosslevel { gauge: 0.0 },
            Waveform::Cosine {
                amplitude: 0.01,
                wavelength: 10.0,
            },
        );
        assert_err_contains(result, "gauge must be finite and positive");
    }

    #[test]
    fn generic_pose_matches_closed_form() {
        let defect = dip();
        let generic = defect.pose_generic(155.5_f64);
        let closed = defect.delta_pose(155.5);
        for row in 0..6 {
            assert_relative_eq!(generic[row], closed[row], epsilon = 1e-18, max_relative = 1e-13);
        }
    }

    #[test]
    fn staged_evaluators_match_combined_tiers() {
        let crosslevel = TrackDefect::new(
            "twist",
            DefectWindow::new(100.0, 200.0).unwrap(),
            DefectKind::Crosslevel { gauge: 1.5 },
            Waveform::Harmonic {
                amplitude: 0.02,
                wavelength: 18.0,
                phase: 0.2,
            },
        )
        .unwrap();
        let sd = 12.5;
        for defect in [dip(), crosslevel] {
            for s in [100.0, 101.0, 137.3, 200.0] {
                let tiers = defect.tiers(s, sd).expect("inside window");
                assert_eq!(tiers.pose, defect.pose_in_window(s));
                assert_eq!(tiers.pose_ds, defect.pose_ds_in_window(s));
                assert_eq!(tiers.velocity_term, defect.delta_pose_velocity_term(s, sd));
            }
        }
    }
}
