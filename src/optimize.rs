//! Tilt Angle Optimization
//!
//! Searches the tilt that maximizes daily or annual energy for one site.
//! Four strategies are available: an exhaustive grid scan, ternary search,
//! golden-section search and gradient ascent. Every search records the ordered
//! list of points it evaluated (its trace) and returns it with the result; the
//! [`Optimizer`] itself holds nothing but a shared reference to the model, so a
//! single instance can serve concurrent searches.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{OptimizeError, OptimizeResult};
use crate::solar_panel::{EnergyMode, EnergyUnit, SolarPanelModel, grid_len};

// ===================== CONSTANTS =====================

/// Default grid spacing for the exhaustive scan (degrees)
pub const DEFAULT_GRID_STEP: f64 = 0.5;

/// Default bracket width / step size at which searches stop (degrees)
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Default gradient ascent step multiplier
pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Default half-width of the sensitivity window, as a percentage of the angle
pub const DEFAULT_SENSITIVITY_PERCENT: f64 = 10.0;

/// Iteration cap for ternary and golden-section search
pub const BRACKET_MAX_ITERATIONS: usize = 100;

/// Iteration cap for gradient ascent
pub const GRADIENT_MAX_ITERATIONS: usize = 1000;

/// Half-step of the centered finite difference (degrees)
pub const GRADIENT_STEP_DEG: f64 = 0.01;

/// Settings used by [`Optimizer::compare_methods`]
const COMPARE_GRID_STEP: f64 = 1.0;
const COMPARE_TOLERANCE: f64 = 1e-2;

/// Number of samples across the sensitivity window (odd, so the center is sampled)
const SENSITIVITY_SAMPLES: usize = 21;

/// Valid tilt range (degrees)
const MIN_TILT: f64 = 0.0;
const MAX_TILT: f64 = 90.0;

// ===================== RESULT TYPES =====================

/// One energy evaluation recorded during a search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationPoint {
    pub angle_deg: f64,
    pub energy: f64,
}

/// Ordered search path of one run
pub type OptimizationTrace = Vec<EvaluationPoint>;

/// Search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    BruteForce,
    TernarySearch,
    GoldenSection,
    GradientAscent,
}

impl SearchMethod {
    /// All methods in the order [`Optimizer::compare_methods`] runs them
    pub const ALL: [SearchMethod; 4] = [
        SearchMethod::BruteForce,
        SearchMethod::TernarySearch,
        SearchMethod::GoldenSection,
        SearchMethod::GradientAscent,
    ];

    /// Stable identifier
    pub fn name(&self) -> &'static str {
        match self {
            SearchMethod::BruteForce => "brute_force",
            SearchMethod::TernarySearch => "ternary_search",
            SearchMethod::GoldenSection => "golden_section",
            SearchMethod::GradientAscent => "gradient_ascent",
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a search terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Bracket width or step size fell within tolerance
    Converged,
    /// Iteration cap reached; the result is the best estimate so far
    MaxIterations,
    /// Exhaustive scan evaluated its whole grid
    Exhausted,
}

/// Outcome of a single search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub method: SearchMethod,
    pub mode: EnergyMode,
    /// Optimal tilt (degrees)
    pub angle_deg: f64,
    /// Energy at `angle_deg`, in `mode.unit()`
    pub energy: f64,
    pub status: SearchStatus,
    /// Loop iterations executed (grid size for the exhaustive scan)
    pub iterations: usize,
    pub trace: OptimizationTrace,
}

impl OptimizationResult {
    /// Number of recorded evaluations
    pub fn evaluations(&self) -> usize {
        self.trace.len()
    }

    pub fn unit(&self) -> EnergyUnit {
        self.mode.unit()
    }
}

/// Energy at a perturbed angle and its loss against the reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensitivityPoint {
    pub angle_deg: f64,
    pub energy: f64,
    /// `(reference - energy) / reference * 100`
    pub loss_percent: f64,
}

/// Per-method outcomes of [`Optimizer::compare_methods`].
///
/// Entries keep the order of [`SearchMethod::ALL`]. A failed method holds its
/// error and does not affect the others.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodComparison {
    entries: Vec<(SearchMethod, OptimizeResult<OptimizationResult>)>,
}

impl MethodComparison {
    pub fn get(&self, method: SearchMethod) -> Option<&OptimizeResult<OptimizationResult>> {
        self.entries.iter().find(|(m, _)| *m == method).map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SearchMethod, &OptimizeResult<OptimizationResult>)> {
        self.entries.iter().map(|(method, outcome)| (*method, outcome))
    }

    /// Successful results in run order
    pub fn successes(&self) -> impl Iterator<Item = &OptimizationResult> {
        self.entries.iter().filter_map(|(_, outcome)| outcome.as_ref().ok())
    }

    /// Successful result with the highest energy; the earliest wins on ties
    pub fn best(&self) -> Option<&OptimizationResult> {
        self.successes().fold(None, |best: Option<&OptimizationResult>, candidate| match best {
            Some(current) if current.energy >= candidate.energy => Some(current),
            _ => Some(candidate),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for MethodComparison {
    type Item = (SearchMethod, OptimizeResult<OptimizationResult>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Optimum found for one latitude in [`latitude_sweep`]
#[derive(Debug, Clone, PartialEq)]
pub struct LatitudeOptimum {
    pub latitude_deg: f64,
    pub outcome: OptimizeResult<OptimizationResult>,
}

// ===================== OPTIMIZER =====================

/// Tilt optimizer bound to one energy model.
///
/// All searches take `&self` and build their trace locally, so one optimizer
/// can be shared across threads.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer<'a> {
    model: &'a SolarPanelModel,
}

impl<'a> Optimizer<'a> {
    pub fn new(model: &'a SolarPanelModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &'a SolarPanelModel {
        self.model
    }

    /// Objective for one search, bound once to the mode
    fn objective(&self, mode: EnergyMode) -> impl Fn(f64) -> f64 + 'a {
        let model = self.model;
        move |angle| model.energy(angle, mode)
    }

    /// Exhaustive scan over a uniform grid.
    ///
    /// Evaluates `min, min + step, ...` up to `max` inclusive when it falls on
    /// the grid, and returns the first grid point with the highest energy.
    ///
    /// # Errors
    /// [`OptimizeError::InvalidBracket`], or [`OptimizeError::InvalidStep`] when
    /// the step is not positive or the grid would exceed
    /// [`MAX_GRID_POINTS`](crate::solar_panel::MAX_GRID_POINTS) points.
    pub fn brute_force_search(
        &self,
        min_angle: f64,
        max_angle: f64,
        step: f64,
        mode: EnergyMode,
    ) -> OptimizeResult<OptimizationResult> {
        validate_bracket(min_angle, max_angle)?;
        validate_step(min_angle, max_angle, step)?;
        debug!(min_angle, max_angle, step, ?mode, "starting brute force search");

        let search = grid_scan(min_angle, max_angle, step, self.objective(mode));
        Ok(self.finish(SearchMethod::BruteForce, mode, search))
    }

    /// Ternary search on `[min_angle, max_angle]`.
    ///
    /// Assumes the energy is unimodal on the bracket. This holds for brackets
    /// around the expected optimum but not for arbitrary wide ranges; on a
    /// multimodal objective the search settles on some local maximum.
    ///
    /// # Errors
    /// [`OptimizeError::InvalidBracket`] or [`OptimizeError::InvalidTolerance`].
    pub fn ternary_search(
        &self,
        min_angle: f64,
        max_angle: f64,
        tolerance: f64,
        mode: EnergyMode,
    ) -> OptimizeResult<OptimizationResult> {
        validate_bracket(min_angle, max_angle)?;
        validate_tolerance(tolerance)?;
        debug!(min_angle, max_angle, tolerance, ?mode, "starting ternary search");

        let search = ternary(min_angle, max_angle, tolerance, self.objective(mode));
        Ok(self.finish(SearchMethod::TernarySearch, mode, search))
    }

    /// Golden-section search on `[min_angle, max_angle]`.
    ///
    /// Same unimodality assumption as [`Optimizer::ternary_search`], with one
    /// new evaluation per iteration instead of two.
    ///
    /// # Errors
    /// [`OptimizeError::InvalidBracket`] or [`OptimizeError::InvalidTolerance`].
    pub fn golden_section_search(
        &self,
        min_angle: f64,
        max_angle: f64,
        tolerance: f64,
        mode: EnergyMode,
    ) -> OptimizeResult<OptimizationResult> {
        validate_bracket(min_angle, max_angle)?;
        validate_tolerance(tolerance)?;
        debug!(min_angle, max_angle, tolerance, ?mode, "starting golden section search");

        let search = golden_section(min_angle, max_angle, tolerance, self.objective(mode));
        Ok(self.finish(SearchMethod::GoldenSection, mode, search))
    }

    /// Gradient ascent from `initial_angle` with a centered finite difference.
    ///
    /// The angle is clamped into [0, 90] after each step. With a fixed
    /// learning rate the iterate can keep bouncing off a bound; that run ends
    /// on the iteration cap with [`SearchStatus::MaxIterations`].
    ///
    /// # Errors
    /// [`OptimizeError::AngleOutOfRange`], [`OptimizeError::InvalidLearningRate`]
    /// or [`OptimizeError::InvalidTolerance`].
    pub fn gradient_ascent(
        &self,
        initial_angle: f64,
        learning_rate: f64,
        tolerance: f64,
        mode: EnergyMode,
    ) -> OptimizeResult<OptimizationResult> {
        validate_angle(initial_angle)?;
        if !learning_rate.is_finite() || learning_rate <= 0.0 {
            return Err(OptimizeError::InvalidLearningRate(learning_rate));
        }
        validate_tolerance(tolerance)?;
        debug!(initial_angle, learning_rate, tolerance, ?mode, "starting gradient ascent");

        let search = gradient(initial_angle, learning_rate, tolerance, self.objective(mode));
        Ok(self.finish(SearchMethod::GradientAscent, mode, search))
    }

    /// Runs all four methods on the same bracket.
    ///
    /// Brute force uses a 1° grid, ternary and golden section a 0.01°
    /// tolerance, and gradient ascent starts at the bracket midpoint with the
    /// default learning rate and a 0.01° tolerance.
    pub fn compare_methods(&self, min_angle: f64, max_angle: f64, mode: EnergyMode) -> MethodComparison {
        let entries = SearchMethod::ALL
            .iter()
            .map(|&method| {
                let outcome = match method {
                    SearchMethod::BruteForce => {
                        self.brute_force_search(min_angle, max_angle, COMPARE_GRID_STEP, mode)
                    }
                    SearchMethod::TernarySearch => {
                        self.ternary_search(min_angle, max_angle, COMPARE_TOLERANCE, mode)
                    }
                    SearchMethod::GoldenSection => {
                        self.golden_section_search(min_angle, max_angle, COMPARE_TOLERANCE, mode)
                    }
                    SearchMethod::GradientAscent => self.gradient_ascent(
                        (min_angle + max_angle) / 2.0,
                        DEFAULT_LEARNING_RATE,
                        COMPARE_TOLERANCE,
                        mode,
                    ),
                };
                if let Err(err) = &outcome {
                    warn!(%method, %err, "method failed during comparison");
                }
                (method, outcome)
            })
            .collect();

        MethodComparison { entries }
    }

    /// Energy loss around a reference angle.
    ///
    /// Samples 21 evenly spaced angles over `angle ± angle * range_percent / 100`,
    /// drops those outside [0, 90] and reports each sample's loss relative to
    /// the energy at `reference_angle`.
    ///
    /// # Errors
    /// [`OptimizeError::AngleOutOfRange`], [`OptimizeError::InvalidRangePercent`],
    /// or [`OptimizeError::ZeroReferenceEnergy`] when the reference produces no
    /// energy (polar night, for instance).
    pub fn sensitivity_analysis(
        &self,
        reference_angle: f64,
        range_percent: f64,
        mode: EnergyMode,
    ) -> OptimizeResult<Vec<SensitivityPoint>> {
        validate_angle(reference_angle)?;
        if !range_percent.is_finite() || range_percent < 0.0 {
            return Err(OptimizeError::InvalidRangePercent(range_percent));
        }

        let f = self.objective(mode);
        let reference_energy = f(reference_angle);
        if reference_energy == 0.0 {
            return Err(OptimizeError::ZeroReferenceEnergy { angle_deg: reference_angle });
        }

        let window = reference_angle * range_percent / 100.0;
        let half = (SENSITIVITY_SAMPLES / 2) as f64;
        let points = (0..SENSITIVITY_SAMPLES)
            .map(|i| reference_angle + window * (i as f64 - half) / half)
            .filter(|angle| (MIN_TILT..=MAX_TILT).contains(angle))
            .map(|angle_deg| {
                let energy = f(angle_deg);
                SensitivityPoint {
                    angle_deg,
                    energy,
                    loss_percent: (reference_energy - energy) / reference_energy * 100.0,
                }
            })
            .collect::<Vec<_>>();

        debug!(reference_angle, range_percent, samples = points.len(), "sensitivity analysis done");
        Ok(points)
    }

    /// Energy on a uniform tilt grid, without searching
    ///
    /// # Errors
    /// Same as [`Optimizer::brute_force_search`].
    pub fn energy_profile(
        &self,
        min_angle: f64,
        max_angle: f64,
        step: f64,
        mode: EnergyMode,
    ) -> OptimizeResult<Vec<EvaluationPoint>> {
        validate_bracket(min_angle, max_angle)?;
        validate_step(min_angle, max_angle, step)?;

        let f = self.objective(mode);
        Ok(grid(min_angle, max_angle, step)
            .map(|angle_deg| EvaluationPoint { angle_deg, energy: f(angle_deg) })
            .collect())
    }

    fn finish(&self, method: SearchMethod, mode: EnergyMode, search: Search) -> OptimizationResult {
        match search.status {
            SearchStatus::MaxIterations => warn!(
                %method,
                iterations = search.iterations,
                angle = search.angle_deg,
                "iteration cap reached before convergence"
            ),
            _ => debug!(
                %method,
                iterations = search.iterations,
                evaluations = search.trace.len(),
                angle = search.angle_deg,
                energy = search.energy,
                status = ?search.status,
                "search finished"
            ),
        }

        OptimizationResult {
            method,
            mode,
            angle_deg: search.angle_deg,
            energy: search.energy,
            status: search.status,
            iterations: search.iterations,
            trace: search.trace,
        }
    }
}

/// Golden-section optimum for each latitude with a shared panel and bracket.
///
/// Invalid latitudes or search inputs are reported per entry and do not stop
/// the sweep.
pub fn latitude_sweep(
    latitudes: &[f64],
    area_m2: f64,
    efficiency: f64,
    bracket: (f64, f64),
    tolerance: f64,
    mode: EnergyMode,
) -> Vec<LatitudeOptimum> {
    latitudes
        .iter()
        .map(|&latitude_deg| {
            let outcome = SolarPanelModel::from_site(latitude_deg, area_m2, efficiency)
                .map_err(OptimizeError::from)
                .and_then(|model| {
                    Optimizer::new(&model).golden_section_search(bracket.0, bracket.1, tolerance, mode)
                });
            if let Err(err) = &outcome {
                warn!(latitude_deg, %err, "latitude skipped");
            }
            LatitudeOptimum { latitude_deg, outcome }
        })
        .collect()
}

// ===================== VALIDATION =====================

fn validate_bracket(min: f64, max: f64) -> OptimizeResult<()> {
    let in_range = |x: f64| x.is_finite() && (MIN_TILT..=MAX_TILT).contains(&x);
    if in_range(min) && in_range(max) && min < max {
        Ok(())
    } else {
        Err(OptimizeError::InvalidBracket { min, max })
    }
}

fn validate_step(min: f64, max: f64, step: f64) -> OptimizeResult<()> {
    grid_len(max - min, step).map(|_| ()).ok_or(OptimizeError::InvalidStep(step))
}

fn validate_tolerance(tolerance: f64) -> OptimizeResult<()> {
    if tolerance.is_finite() && tolerance > 0.0 {
        Ok(())
    } else {
        Err(OptimizeError::InvalidTolerance(tolerance))
    }
}

fn validate_angle(angle: f64) -> OptimizeResult<()> {
    if angle.is_finite() && (MIN_TILT..=MAX_TILT).contains(&angle) {
        Ok(())
    } else {
        Err(OptimizeError::AngleOutOfRange(angle))
    }
}

// ===================== SEARCH CORES =====================

/// Raw outcome of a search core, before it is tagged with method and mode
struct Search {
    angle_deg: f64,
    energy: f64,
    status: SearchStatus,
    iterations: usize,
    trace: OptimizationTrace,
}

fn record(trace: &mut OptimizationTrace, angle_deg: f64, energy: f64) {
    trace!(angle_deg, energy, "evaluated");
    trace.push(EvaluationPoint { angle_deg, energy });
}

/// Grid points `min + i * step` not exceeding `max`
fn grid(min: f64, max: f64, step: f64) -> impl Iterator<Item = f64> {
    let count = grid_len(max - min, step).unwrap_or(0);
    (0..count).map(move |i| min + i as f64 * step)
}

fn grid_scan<F>(min: f64, max: f64, step: f64, f: F) -> Search
where
    F: Fn(f64) -> f64,
{
    let mut trace = OptimizationTrace::new();
    for angle in grid(min, max, step) {
        record(&mut trace, angle, f(angle));
    }

    // Strict comparison keeps the first occurrence on ties
    let best = trace
        .iter()
        .copied()
        .reduce(|best, point| if point.energy > best.energy { point } else { best })
        .unwrap_or_else(|| EvaluationPoint { angle_deg: min, energy: f(min) });

    Search {
        angle_deg: best.angle_deg,
        energy: best.energy,
        status: SearchStatus::Exhausted,
        iterations: trace.len(),
        trace,
    }
}

fn ternary<F>(min: f64, max: f64, tol: f64, f: F) -> Search
where
    F: Fn(f64) -> f64,
{
    let mut left = min;
    let mut right = max;
    let mut trace = OptimizationTrace::new();
    let mut iterations = 0;

    while right - left > tol && iterations < BRACKET_MAX_ITERATIONS {
        let m1 = left + (right - left) / 3.0;
        let m2 = right - (right - left) / 3.0;
        let f1 = f(m1);
        let f2 = f(m2);
        record(&mut trace, m1, f1);
        record(&mut trace, m2, f2);

        if f1 < f2 {
            // Max is in [m1, right]
            left = m1;
        } else {
            // Max is in [left, m2]
            right = m2;
        }
        iterations += 1;
    }

    let status = if right - left > tol { SearchStatus::MaxIterations } else { SearchStatus::Converged };
    let angle = (left + right) / 2.0;
    let energy = f(angle);
    record(&mut trace, angle, energy);

    Search { angle_deg: angle, energy, status, iterations, trace }
}

fn golden_section<F>(min: f64, max: f64, tol: f64, f: F) -> Search
where
    F: Fn(f64) -> f64,
{
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let resphi = 2.0 - phi; // approx 0.382

    let mut a = min;
    let mut b = max;
    let mut trace = OptimizationTrace::new();

    // Initialize internal points
    let mut x1 = a + resphi * (b - a);
    let mut x2 = b - resphi * (b - a);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    record(&mut trace, x1, f1);
    record(&mut trace, x2, f2);

    let mut iterations = 0;
    while (b - a).abs() > tol && iterations < BRACKET_MAX_ITERATIONS {
        if f1 > f2 {
            // Max is in [a, x2]
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = a + resphi * (b - a);
            f1 = f(x1);
            record(&mut trace, x1, f1);
        } else {
            // Max is in [x1, b]
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = b - resphi * (b - a);
            f2 = f(x2);
            record(&mut trace, x2, f2);
        }
        iterations += 1;
    }

    let status =
        if (b - a).abs() > tol { SearchStatus::MaxIterations } else { SearchStatus::Converged };

    // The midpoint was never evaluated; its energy is reported, not traced
    let angle = (a + b) / 2.0;
    Search { angle_deg: angle, energy: f(angle), status, iterations, trace }
}

fn gradient<F>(initial: f64, learning_rate: f64, tol: f64, f: F) -> Search
where
    F: Fn(f64) -> f64,
{
    let h = GRADIENT_STEP_DEG;
    let mut current = initial;
    let mut trace = OptimizationTrace::new();
    let mut iterations = 0;
    let mut status = SearchStatus::MaxIterations;

    while iterations < GRADIENT_MAX_ITERATIONS {
        record(&mut trace, current, f(current));

        let slope = (f(current + h) - f(current - h)) / (2.0 * h);
        let next = (current + learning_rate * slope).clamp(MIN_TILT, MAX_TILT);

        if (next - current).abs() < tol {
            status = SearchStatus::Converged;
            break;
        }
        current = next;
        iterations += 1;
    }

    Search { angle_deg: current, energy: f(current), status, iterations, trace }
}

// ===================== TESTS =====================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const SOLSTICE: EnergyMode = EnergyMode::Daily { day_of_year: 172 };

    fn madrid() -> SolarPanelModel {
        SolarPanelModel::from_site(40.4, 2.0, 0.22).unwrap()
    }

    fn parabola(x: f64) -> f64 {
        -(x - 3.0).powi(2) + 10.0
    }

    #[test]
    fn test_golden_section_core_on_parabola() {
        let search = golden_section(0.0, 6.0, 1e-6, parabola);

        assert!((search.angle_deg - 3.0).abs() < 1e-6, "Expected maximum at x=3.0, got x={:.8}", search.angle_deg);
        assert!((search.energy - 10.0).abs() < 1e-8, "Expected max value y=10.0, got y={:.8}", search.energy);
        assert_eq!(search.status, SearchStatus::Converged);
        assert_eq!(search.trace.len(), search.iterations + 2);
    }

    #[test]
    fn test_ternary_core_on_parabola() {
        let search = ternary(0.0, 6.0, 1e-6, parabola);

        assert!((search.angle_deg - 3.0).abs() < 1e-6, "Expected maximum at x=3.0, got x={:.8}", search.angle_deg);
        assert_eq!(search.trace.len(), 2 * search.iterations + 1);
        let last = search.trace.last().unwrap();
        assert_eq!(last.angle_deg, search.angle_deg, "Final midpoint should close the trace");
    }

    #[test]
    fn test_gradient_core_on_parabola() {
        let search = gradient(1.0, 0.1, 1e-6, parabola);
        assert_abs_diff_eq!(search.angle_deg, 3.0, epsilon = 1e-4);
        assert_eq!(search.status, SearchStatus::Converged);
        assert_eq!(search.trace.len(), search.iterations + 1);
    }

    #[test]
    fn test_bracket_cores_hit_iteration_cap() {
        // Peak on the lower bound keeps the bracket representable while it shrinks
        let peak_at_zero = |x: f64| -x * x;

        let search = ternary(0.0, 90.0, 1e-300, peak_at_zero);
        assert_eq!(search.iterations, BRACKET_MAX_ITERATIONS);
        assert_eq!(search.status, SearchStatus::MaxIterations);

        let search = golden_section(0.0, 90.0, 1e-300, peak_at_zero);
        assert_eq!(search.iterations, BRACKET_MAX_ITERATIONS);
        assert_eq!(search.status, SearchStatus::MaxIterations);
        assert_eq!(search.trace.len(), BRACKET_MAX_ITERATIONS + 2);
    }

    #[test]
    fn test_gradient_oscillation_hits_cap() {
        // Huge learning rate on a steep slope: bounces between 0 and 90
        let search = gradient(45.0, 1e6, 1e-3, parabola);
        assert_eq!(search.status, SearchStatus::MaxIterations);
        assert_eq!(search.iterations, GRADIENT_MAX_ITERATIONS);
        assert_eq!(search.trace.len(), GRADIENT_MAX_ITERATIONS);
        assert!(search.trace.iter().all(|p| (0.0..=90.0).contains(&p.angle_deg)));
    }

    #[test]
    fn test_grid_points() {
        let points: Vec<f64> = grid(20.0, 60.0, 1.0).collect();
        assert_eq!(points.len(), 41);
        assert_eq!(points[0], 20.0);
        assert_eq!(points[40], 60.0);

        // Max off the grid is not exceeded
        let points: Vec<f64> = grid(0.0, 10.0, 3.0).collect();
        assert_eq!(points, vec![0.0, 3.0, 6.0, 9.0]);

        // Floating error in (max - min) / step must not drop the last point
        assert_eq!(grid(0.0, 0.3, 0.1).count(), 4);
    }

    #[test]
    fn test_grid_scan_keeps_first_of_ties() {
        let search = grid_scan(0.0, 4.0, 1.0, |_| 5.0);
        assert_eq!(search.angle_deg, 0.0);
        assert_eq!(search.status, SearchStatus::Exhausted);
        assert_eq!(search.iterations, 5);
    }

    #[test]
    fn test_brute_force_search_solstice() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let result = optimizer.brute_force_search(20.0, 60.0, 1.0, SOLSTICE).unwrap();
        assert_eq!(result.method, SearchMethod::BruteForce);
        assert_eq!(result.angle_deg, 20.0, "Summer optimum at 40.4°N lies below the bracket");
        assert_eq!(result.evaluations(), 41);
        assert_relative_eq!(result.energy, model.daily_energy(20.0, 172));

        let full = optimizer.brute_force_search(0.0, 90.0, 1.0, SOLSTICE).unwrap();
        assert_eq!(full.angle_deg, 8.0);
        assert_relative_eq!(full.energy, 3884.191, max_relative = 1e-5);
    }

    #[test]
    fn test_ternary_beats_brute_force_within_step_margin() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let ternary = optimizer.ternary_search(20.0, 60.0, 0.1, SOLSTICE).unwrap();
        let brute = optimizer.brute_force_search(20.0, 60.0, 1.0, SOLSTICE).unwrap();

        assert!((20.0..=60.0).contains(&ternary.angle_deg));
        assert_eq!(ternary.status, SearchStatus::Converged);
        assert_eq!(ternary.iterations, 15);
        assert_eq!(ternary.evaluations(), 31);

        // One grid step of slope at the bracket edge bounds the grid error
        let margin = (model.daily_energy(20.0, 172) - model.daily_energy(21.0, 172)).abs();
        assert!(
            ternary.energy > brute.energy - margin,
            "ternary {:.3} Wh vs brute {:.3} Wh (margin {:.3})",
            ternary.energy,
            brute.energy,
            margin
        );
    }

    #[test]
    fn test_golden_section_solstice() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let result = optimizer.golden_section_search(20.0, 60.0, 0.1, SOLSTICE).unwrap();
        assert_eq!(result.iterations, 13);
        assert_eq!(result.evaluations(), 15);
        assert_abs_diff_eq!(result.angle_deg, 20.0384, epsilon = 1e-3);
        assert_relative_eq!(result.energy, 3816.3786, max_relative = 1e-6);
    }

    #[test]
    fn test_methods_agree_on_full_range() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let brute = optimizer.brute_force_search(0.0, 90.0, 1.0, SOLSTICE).unwrap();
        let ternary = optimizer.ternary_search(0.0, 90.0, 1e-2, SOLSTICE).unwrap();
        let golden = optimizer.golden_section_search(0.0, 90.0, 1e-2, SOLSTICE).unwrap();

        assert!((brute.angle_deg - ternary.angle_deg).abs() <= 1.0);
        assert!((brute.angle_deg - golden.angle_deg).abs() <= 1.0);
        assert!((ternary.angle_deg - golden.angle_deg).abs() <= 2e-2);
    }

    #[test]
    fn test_golden_uses_fewer_evaluations_than_ternary() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        for (min, max, tol) in [(0.0, 90.0, 1e-2), (20.0, 60.0, 0.1), (10.0, 30.0, 1e-3)] {
            let ternary = optimizer.ternary_search(min, max, tol, SOLSTICE).unwrap();
            let golden = optimizer.golden_section_search(min, max, tol, SOLSTICE).unwrap();
            assert!(
                golden.evaluations() < ternary.evaluations(),
                "[{}, {}] tol {}: golden {} vs ternary {}",
                min,
                max,
                tol,
                golden.evaluations(),
                ternary.evaluations()
            );
        }
    }

    #[test]
    fn test_reported_energy_matches_model_at_reported_angle() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);
        let comparison = optimizer.compare_methods(0.0, 90.0, SOLSTICE);

        assert_eq!(comparison.successes().count(), 4);
        for result in comparison.successes() {
            assert_eq!(
                result.energy,
                model.daily_energy(result.angle_deg, 172),
                "{} reported a stale energy",
                result.method
            );
        }
    }

    #[test]
    fn test_gradient_ascent_solstice() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let result = optimizer.gradient_ascent(30.0, 0.1, 1e-2, SOLSTICE).unwrap();
        assert_eq!(result.status, SearchStatus::Converged);
        assert_abs_diff_eq!(result.angle_deg, 8.2227, epsilon = 1e-3);
        assert_eq!(result.evaluations(), 55);
        assert_eq!(result.trace[0].angle_deg, 30.0);
        assert_eq!(result.evaluations(), result.iterations + 1);
    }

    #[test]
    fn test_equator_annual_optimum_near_flat() {
        let model = SolarPanelModel::from_site(0.0, 1.0, 0.2).unwrap();
        let optimizer = Optimizer::new(&model);

        let golden = optimizer.golden_section_search(0.0, 30.0, 1e-3, EnergyMode::Annual).unwrap();
        assert!(golden.angle_deg < 2.0, "Equator optimum should be near flat, got {:.3}°", golden.angle_deg);
        assert_eq!(golden.unit(), EnergyUnit::KilowattHours);
        assert_relative_eq!(golden.energy, 538.901, max_relative = 1e-5);
    }

    #[test]
    fn test_compare_methods_order_and_best() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);
        let comparison = optimizer.compare_methods(0.0, 90.0, SOLSTICE);

        let order: Vec<SearchMethod> = comparison.iter().map(|(m, _)| m).collect();
        assert_eq!(order, SearchMethod::ALL.to_vec());
        assert_eq!(comparison.len(), 4);

        let brute = comparison.get(SearchMethod::BruteForce).unwrap().as_ref().unwrap();
        assert_eq!(brute.evaluations(), 91);

        let best = comparison.best().unwrap();
        assert!(comparison.successes().all(|r| r.energy <= best.energy));
    }

    #[test]
    fn test_compare_methods_isolates_failures() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);
        let comparison = optimizer.compare_methods(30.0, 30.0, SOLSTICE);

        let expected = OptimizeError::InvalidBracket { min: 30.0, max: 30.0 };
        assert_eq!(comparison.get(SearchMethod::BruteForce), Some(&Err(expected)));
        assert_eq!(comparison.get(SearchMethod::TernarySearch), Some(&Err(expected)));
        assert_eq!(comparison.get(SearchMethod::GoldenSection), Some(&Err(expected)));

        // Gradient ascent only needs a valid start angle
        let gradient = comparison.get(SearchMethod::GradientAscent).unwrap();
        assert!(gradient.is_ok(), "gradient ascent should still run: {:?}", gradient);
    }

    #[test]
    fn test_validation_errors() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        assert_eq!(
            optimizer.brute_force_search(60.0, 20.0, 1.0, SOLSTICE),
            Err(OptimizeError::InvalidBracket { min: 60.0, max: 20.0 })
        );
        assert!(matches!(
            optimizer.ternary_search(-5.0, 20.0, 0.1, SOLSTICE),
            Err(OptimizeError::InvalidBracket { .. })
        ));
        assert!(matches!(
            optimizer.golden_section_search(0.0, f64::INFINITY, 0.1, SOLSTICE),
            Err(OptimizeError::InvalidBracket { .. })
        ));
        assert_eq!(
            optimizer.brute_force_search(0.0, 90.0, 0.0, SOLSTICE),
            Err(OptimizeError::InvalidStep(0.0))
        );
        assert_eq!(
            optimizer.ternary_search(0.0, 90.0, -1.0, SOLSTICE),
            Err(OptimizeError::InvalidTolerance(-1.0))
        );
        assert_eq!(
            optimizer.gradient_ascent(95.0, 0.1, 1e-3, SOLSTICE),
            Err(OptimizeError::AngleOutOfRange(95.0))
        );
        assert_eq!(
            optimizer.gradient_ascent(30.0, 0.0, 1e-3, SOLSTICE),
            Err(OptimizeError::InvalidLearningRate(0.0))
        );
        assert_eq!(
            optimizer.sensitivity_analysis(30.0, -1.0, SOLSTICE),
            Err(OptimizeError::InvalidRangePercent(-1.0))
        );
    }

    #[test]
    fn test_grid_step_too_fine_is_rejected() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        for step in [1e-300, f64::MIN_POSITIVE, 1e-9] {
            assert_eq!(
                optimizer.brute_force_search(0.0, 90.0, step, SOLSTICE),
                Err(OptimizeError::InvalidStep(step)),
                "step {:e} must not reach the grid scan",
                step
            );
            assert_eq!(
                optimizer.energy_profile(0.0, 90.0, step, EnergyMode::Annual),
                Err(OptimizeError::InvalidStep(step))
            );
        }

        // Cap depends on the bracket width, not the step alone
        assert_eq!(optimizer.energy_profile(0.0, 1e-6, 1e-9, SOLSTICE).map(|points| points.len()), Ok(1001));
        assert_eq!(grid(0.0, 90.0, 1e-300).count(), 0);
    }

    #[test]
    fn test_sensitivity_analysis_around_optimum() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);
        let optimum = optimizer.golden_section_search(0.0, 90.0, 1e-2, SOLSTICE).unwrap();

        let points = optimizer
            .sensitivity_analysis(optimum.angle_deg, DEFAULT_SENSITIVITY_PERCENT, SOLSTICE)
            .unwrap();
        assert_eq!(points.len(), 21);

        let center = points[10];
        assert_eq!(center.angle_deg, optimum.angle_deg);
        assert_eq!(center.loss_percent, 0.0);
        assert!(points.iter().all(|p| p.loss_percent >= -1e-9), "Loss must be non-negative at an optimum");

        // Loss grows moving away from the center on both sides
        for i in 10..20 {
            assert!(points[i + 1].loss_percent >= points[i].loss_percent);
        }
        for i in 1..=10 {
            assert!(points[i - 1].loss_percent >= points[i].loss_percent);
        }
    }

    #[test]
    fn test_sensitivity_analysis_drops_out_of_range_samples() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        // 85° ± 8.5°: samples above 90 are discarded
        let points = optimizer.sensitivity_analysis(85.0, 10.0, SOLSTICE).unwrap();
        assert!(points.len() < 21);
        assert!(points.iter().all(|p| p.angle_deg <= 90.0));

        // Zero window: all samples collapse onto the reference
        let points = optimizer.sensitivity_analysis(0.0, 10.0, SOLSTICE).unwrap();
        assert_eq!(points.len(), 21);
        assert!(points.iter().all(|p| p.loss_percent == 0.0));
    }

    #[test]
    fn test_sensitivity_analysis_zero_reference_energy() {
        let model = SolarPanelModel::from_site(-80.0, 1.0, 0.2).unwrap();
        let optimizer = Optimizer::new(&model);

        assert_eq!(
            optimizer.sensitivity_analysis(30.0, 10.0, SOLSTICE),
            Err(OptimizeError::ZeroReferenceEnergy { angle_deg: 30.0 })
        );
    }

    #[test]
    fn test_energy_profile() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let profile = optimizer.energy_profile(0.0, 90.0, 10.0, SOLSTICE).unwrap();
        assert_eq!(profile.len(), 10);
        assert_relative_eq!(profile[3].energy, 3657.454525861344, max_relative = 1e-9);
        assert!(optimizer.energy_profile(0.0, 90.0, -1.0, SOLSTICE).is_err());
    }

    #[test]
    fn test_latitude_sweep() {
        let sweep = latitude_sweep(&[20.0, 40.4, 60.0, 120.0], 1.0, 0.2, (0.0, 90.0), 0.1, EnergyMode::Annual);
        assert_eq!(sweep.len(), 4);

        let angles: Vec<f64> =
            sweep[..3].iter().map(|entry| entry.outcome.as_ref().unwrap().angle_deg).collect();
        assert!(angles[0] < angles[1] && angles[1] < angles[2], "Optimal tilt should grow with latitude: {:?}", angles);
        assert_abs_diff_eq!(angles[1], 34.0, epsilon = 1.0);

        assert!(matches!(sweep[3].outcome, Err(OptimizeError::Config(_))));
    }

    #[test]
    fn test_traces_do_not_accumulate_across_calls() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);

        let first = optimizer.golden_section_search(20.0, 60.0, 0.1, SOLSTICE).unwrap();
        let _ = optimizer.brute_force_search(0.0, 90.0, 1.0, SOLSTICE).unwrap();
        let second = optimizer.golden_section_search(20.0, 60.0, 0.1, SOLSTICE).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_shared_optimizer_across_threads() {
        let model = madrid();
        let optimizer = Optimizer::new(&model);
        let expected = optimizer.golden_section_search(0.0, 90.0, 1e-2, SOLSTICE).unwrap();

        let results: Vec<OptimizationResult> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| optimizer.golden_section_search(0.0, 90.0, 1e-2, SOLSTICE).unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        for result in results {
            assert_eq!(result, expected);
            assert_eq!(result.evaluations(), 21);
        }
    }
}
