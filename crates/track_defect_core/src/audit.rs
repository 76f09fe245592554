//! Cross-checks a defect's analytic derivative tiers against forward-mode
//! automatic differentiation of its pose.
//!
//! The analytic tiers are what the simulation uses; a sign or chain-rule
//! slip in them corrupts the dynamics silently. The audit differentiates
//! the pose map itself with second-order dual numbers and compares.

use crate::autodiff::Dual2;
use crate::error::{TrackError, TrackResult};
use crate::profile::TrackDefect;
use crate::traits::DefectProfile;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub enabled: bool,
    /// Evaluation points spread over the window.
    pub samples: usize,
    pub relative_tolerance: f64,
    pub absolute_tolerance: f64,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 16,
            relative_tolerance: 1e-9,
            absolute_tolerance: 1e-12,
        }
    }
}

/// Largest discrepancies seen during a passing audit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AuditReport {
    pub samples: usize,
    pub max_value_error: f64,
    pub max_first_error: f64,
    pub max_second_error: f64,
}

/// Reference `(pose, d/ds, d²/ds²)` at `s` by automatic differentiation.
pub fn reference_tiers(defect: &TrackDefect, s: f64) -> [[f64; 6]; 3] {
    let pose = defect.pose_generic(Dual2::second_order(s));
    let mut out = [[0.0; 6]; 3];
    for (row, value) in pose.iter().enumerate() {
        out[0][row] = value.value();
        out[1][row] = value.first();
        out[2][row] = value.second();
    }
    out
}

/// Audits any profile against reference tiers supplied by `reference`.
pub fn audit_profile<F>(
    profile: &dyn DefectProfile,
    reference: F,
    settings: &AuditSettings,
) -> TrackResult<AuditReport>
where
    F: Fn(f64) -> [[f64; 6]; 3],
{
    let window = profile.window();
    let samples = settings.samples.max(1);
    let mut report = AuditReport {
        samples,
        ..AuditReport::default()
    };

    for i in 0..samples {
        // Interior points: (i + 1/2) / n of the window.
        let s = window.start + window.length() * (i as f64 + 0.5) / samples as f64;
        let expected = reference(s);
        let analytic = [
            profile.pose_in_window(s),
            profile.pose_ds_in_window(s),
            profile.pose_dss_in_window(s),
        ];
        for (tier, name) in ["pose", "first derivative", "second derivative"]
            .into_iter()
            .enumerate()
        {
            for row in 0..6 {
                let a = analytic[tier][row];
                let r = expected[tier][row];
                let error = (a - r).abs();
                let allowed =
                    settings.absolute_tolerance + settings.relative_tolerance * a.abs().max(r.abs());
                if !(error <= allowed) {
                    return Err(TrackError::DerivativeMismatch {
                        name: profile.name().to_string(),
                        s,
                        tier: name,
                        row,
                        analytic: a,
                        reference: r,
                    });
                }
                let slot = match tier {
                    0 => &mut report.max_value_error,
                    1 => &mut report.max_first_error,
                    _ => &mut report.max_second_error,
                };
                *slot = slot.max(error);
            }
        }
    }

    debug!(
        profile = profile.name(),
        samples,
        max_second_error = report.max_second_error,
        "derivative audit passed"
    );
    Ok(report)
}

/// Audits a configured defect against its own dual-number pose.
pub fn audit_defect(defect: &TrackDefect, settings: &AuditSettings) -> TrackResult<AuditReport> {
    audit_profile(defect, |s| reference_tiers(defect, s), settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Pose6, RowMask};
    use crate::profile::{DefectKind, DefectWindow};
    use crate::waveform::Waveform;

    fn variants() -> Vec<TrackDefect> {
        let window = DefectWindow::new(100.0, 200.0).unwrap();
        vec![
            TrackDefect::cosine_level("level", window).unwrap(),
            TrackDefect::new(
                "alignment",
                window,
                DefectKind::Alignment,
                Waveform::Harmonic {
                    amplitude: 0.03,
                    wavelength: 8.0,
                    phase: 1.0,
                },
            )
            .unwrap(),
            TrackDefect::new(
                "crosslevel",
                window,
                DefectKind::Crosslevel { gauge: 1.5 },
                Waveform::Cosine {
                    amplitude: 0.4,
                    wavelength: 30.0,
                },
            )
            .unwrap(),
        ]
    }

    #[test]
    fn every_variant_passes() {
        let settings = AuditSettings {
            samples: 64,
            ..AuditSettings::default()
        };
        for defect in variants() {
            let report = audit_defect(&defect, &settings).expect("audit should pass");
            assert_eq!(report.samples, 64);
            assert!(report.max_second_error < 1e-9);
        }
    }

    /// Correct pose and slope, but the second derivative of the rotation
    /// flips the sign of its `u''` term.
    #[derive(Debug)]
    struct SignSlip(TrackDefect);

    impl DefectProfile for SignSlip {
        fn name(&self) -> &str {
            "sign_slip"
        }
        fn window(&self) -> DefectWindow {
            self.0.window()
        }
        fn affected_rows(&self) -> RowMask {
            self.0.affected_rows()
        }
        fn pose_in_window(&self, s: f64) -> Pose6 {
            self.0.pose_in_window(s)
        }
        fn pose_ds_in_window(&self, s: f64) -> Pose6 {
            self.0.pose_ds_in_window(s)
        }
        fn pose_dss_in_window(&self, s: f64) -> Pose6 {
            let wave = self.0.waveform().sample(s - self.0.window().start);
            let (g, g1, g2) = (wave.w1, wave.w2, wave.w3);
            let q = 1.0 - g * g;
            let mut out = self.0.pose_dss_in_window(s);
            out[4] = -(g * g1 * g1 - q * g2) / q.powf(1.5);
            out
        }
    }

    #[test]
    fn sign_slip_in_second_derivative_is_caught() {
        let defect = variants().remove(0);
        let slipped = SignSlip(defect.clone());
        let err = audit_profile(&slipped, |s| reference_tiers(&defect, s), &AuditSettings::default())
            .expect_err("audit should fail");
        match err {
            TrackError::DerivativeMismatch { tier, row, .. } => {
                assert_eq!(tier, "second derivative");
                assert_eq!(row, 4);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn reference_tiers_agree_with_finite_differences() {
        let defect = variants().remove(0);
        let h = 1e-5;
        let s = 133.3;
        let tiers = reference_tiers(&defect, s);
        let fd = (defect.pose_in_window(s + h)[4] - defect.pose_in_window(s - h)[4]) / (2.0 * h);
        assert!((tiers[1][4] - fd).abs() < 1e-9);
    }
}
