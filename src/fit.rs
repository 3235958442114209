/// Grid-search fitting of the annual leaf-cover sinusoid.
///
/// The model is fixed except for its phase:
///
/// ```text
/// intensity(t) = 0.5 * sin(2π/365 * t + b) + 0.5
/// ```
///
/// Amplitude and offset pin the curve to [0, 1]; the period assumes an
/// annual cycle. For each candidate `b` the sum of squared residuals over a
/// group's `(t, intensity)` points is computed and the smallest wins. On an
/// exact tie the earliest candidate in grid order wins.

use std::f64::consts::PI;

use rayon::prelude::*;
use serde::Deserialize;

use crate::model::{FitOutcome, FitResult, Granularity, PhaseFit, PhenoError};

pub const AMPLITUDE: f64 = 0.5;
pub const OFFSET: f64 = 0.5;
pub const PERIOD_DAYS: f64 = 365.0;
/// Upper bound on grid size; each candidate is evaluated for every group.
pub const MAX_CANDIDATES: usize = 1_000_000;

/// Model prediction at day offset `t` for phase `b`.
pub fn predict(t: f64, phase: f64) -> f64 {
    AMPLITUDE * (2.0 * PI / PERIOD_DAYS * t + phase).sin() + OFFSET
}

// ---------------------------------------------------------------------------
// Phase grid
// ---------------------------------------------------------------------------

/// Evenly spaced candidate phases over `[start, stop]`, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhaseGrid {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for PhaseGrid {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 1.1,
            step: 0.01,
        }
    }
}

impl PhaseGrid {
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, PhenoError> {
        let grid = Self { start, stop, step };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<(), PhenoError> {
        if !(self.start.is_finite() && self.stop.is_finite() && self.step.is_finite()) {
            return Err(PhenoError::InvalidGrid(format!(
                "bounds must be finite (start={}, stop={}, step={})",
                self.start, self.stop, self.step
            )));
        }
        if self.step <= 0.0 {
            return Err(PhenoError::InvalidGrid(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if self.stop < self.start {
            return Err(PhenoError::InvalidGrid(format!(
                "stop {} is below start {}",
                self.stop, self.start
            )));
        }
        let count = self.candidate_count();
        if !(count.is_finite() && count <= MAX_CANDIDATES as f64) {
            return Err(PhenoError::InvalidGrid(format!(
                "step {} gives more than {} candidates over [{}, {}]",
                self.step, MAX_CANDIDATES, self.start, self.stop
            )));
        }
        Ok(())
    }

    fn candidate_count(&self) -> f64 {
        ((self.stop - self.start) / self.step + 1e-9).floor() + 1.0
    }

    /// Candidate phases in ascending order.
    ///
    /// Each value is `start + i * step`, so rounding never accumulates along
    /// the grid. `stop` is included when it lies on the grid up to a small
    /// relative slack.
    pub fn candidates(&self) -> Result<Vec<f64>, PhenoError> {
        self.validate()?;
        // validated above to be finite and within MAX_CANDIDATES
        let count = self.candidate_count() as usize;
        Ok((0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Sum of squared residuals of `points` against the model at `phase`.
pub fn sum_squared_residuals(points: &[(f64, f64)], phase: f64) -> f64 {
    points
        .iter()
        .map(|&(t, y)| {
            let residual = predict(t, phase) - y;
            residual * residual
        })
        .sum()
}

/// Fits one group. `points` are `(day offset, midpoint intensity)` pairs
/// with missing intensities already removed.
///
/// An empty group, or an empty candidate list, yields `FitOutcome::NoFit`.
pub fn fit_phase(points: &[(f64, f64)], candidates: &[f64]) -> FitOutcome {
    if points.is_empty() {
        return FitOutcome::NoFit {
            reason: "no observations with a usable intensity".to_string(),
        };
    }

    let curve: Vec<(f64, f64)> = candidates
        .iter()
        .map(|&phase| (phase, sum_squared_residuals(points, phase)))
        .collect();

    let mut best: Option<(f64, f64)> = None;
    for &(phase, sse) in &curve {
        if sse.is_nan() {
            continue;
        }
        // Strictly smaller, so the first of several equal minima is kept.
        let improves = match best {
            Some((_, best_sse)) => sse < best_sse,
            None => true,
        };
        if improves {
            best = Some((phase, sse));
        }
    }

    match best {
        Some((phase, sse)) => FitOutcome::Fitted(PhaseFit {
            phase,
            sse,
            n_obs: points.len(),
            curve,
        }),
        None => FitOutcome::NoFit {
            reason: "no candidate produced a finite residual".to_string(),
        },
    }
}

/// Fits every group independently, in parallel.
///
/// `groups` must already be in the desired output order; results keep it.
pub fn fit_groups(
    granularity: Granularity,
    groups: &[(String, Vec<(f64, f64)>)],
    grid: &PhaseGrid,
) -> Result<Vec<FitResult>, PhenoError> {
    let candidates = grid.candidates()?;
    Ok(groups
        .par_iter()
        .map(|(key, points)| FitResult {
            granularity,
            group_key: key.clone(),
            outcome: fit_phase(points, &candidates),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
