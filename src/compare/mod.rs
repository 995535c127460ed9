//! Pairwise configuration comparison
//!
//! Given two aggregate tables over the same instance-classes, computes the
//! solved counts of each side, a divergence scalar (sum of per-class log2
//! ratios of penalty-substituted means), a one-sided Mann-Whitney U p-value,
//! and the point set handed to external plotting code.
//!
//! Unsolved classes get a fixed penalty value that must exceed every real
//! observation, so ratios stay defined and always favour the side that
//! solved.

mod mann_whitney;

pub use mann_whitney::{mann_whitney_greater, MannWhitney, MwuMethod, EXACT_MAX_SIZE};

use crate::aggregate::AggregateTable;
use crate::error::{AnalysisError, Result};
use crate::record::{ConfigLabel, InstanceClass};
use serde::{Deserialize, Serialize};

/// How the noise floor decides that a class is "too fast"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseFloorRule {
    /// Every configuration in the comparison set solved below the floor
    #[default]
    AllBelow,
    /// At least one configuration solved below the floor
    AnyBelow,
}

/// Comparison policy
///
/// # Example
/// ```
/// use runcompare::compare::ComparisonOptions;
///
/// let options = ComparisonOptions::default();
/// assert_eq!(options.resolved_penalty().unwrap(), 1.0e6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonOptions {
    /// Value substituted for an unsolved class
    ///
    /// Must exceed the largest real observation in the comparison set.
    /// Mutually exclusive with `time_budget`.
    pub penalty: Option<f64>,
    /// Derive the penalty as `time_budget * penalty_factor`
    pub time_budget: Option<f64>,
    pub penalty_factor: f64,
    /// Classes below this floor are left out of the plotted points
    pub noise_floor_plot: Option<f64>,
    /// Classes below this floor are left out of the significance test input
    pub noise_floor_test: Option<f64>,
    pub noise_floor_rule: NoiseFloorRule,
    pub significance_level: f64,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            penalty: Some(1.0e6),
            time_budget: None,
            penalty_factor: 1000.0,
            noise_floor_plot: None,
            noise_floor_test: None,
            noise_floor_rule: NoiseFloorRule::AllBelow,
            significance_level: 0.05,
        }
    }
}

impl ComparisonOptions {
    pub fn with_penalty(penalty: f64) -> Self {
        Self {
            penalty: Some(penalty),
            ..Self::default()
        }
    }

    pub fn with_time_budget(time_budget: f64) -> Self {
        Self {
            penalty: None,
            time_budget: Some(time_budget),
            ..Self::default()
        }
    }

    /// The penalty value in effect
    pub fn resolved_penalty(&self) -> Result<f64> {
        match (self.penalty, self.time_budget) {
            (Some(_), Some(_)) => Err(AnalysisError::Config(
                "set either penalty or time_budget, not both".to_string(),
            )),
            (Some(p), None) => Ok(p),
            (None, Some(budget)) => Ok(budget * self.penalty_factor),
            (None, None) => Err(AnalysisError::Config(
                "a penalty or a time_budget is required".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let penalty = self.resolved_penalty()?;
        if !penalty.is_finite() || penalty <= 0.0 {
            return Err(AnalysisError::Config(format!(
                "penalty must be positive and finite, got {}",
                penalty
            )));
        }
        if self.time_budget.is_some() && self.penalty_factor <= 1.0 {
            return Err(AnalysisError::Config(format!(
                "penalty_factor must be > 1 so the penalty exceeds the budget, got {}",
                self.penalty_factor
            )));
        }

        for (name, floor) in [
            ("noise_floor_plot", self.noise_floor_plot),
            ("noise_floor_test", self.noise_floor_test),
        ] {
            if let Some(f) = floor {
                if !(0.0..penalty).contains(&f) {
                    return Err(AnalysisError::Config(format!(
                        "{} must be in [0, penalty), got {}",
                        name, f
                    )));
                }
            }
        }

        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(AnalysisError::Config(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }
        Ok(())
    }
}

/// One plotted instance-class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub class: InstanceClass,
    /// Penalty-substituted value of A
    pub a: f64,
    /// Penalty-substituted value of B
    pub b: f64,
    pub a_solved: bool,
    pub b_solved: bool,
}

/// Outcome of comparing configuration B against configuration A
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub label: Option<String>,
    pub config_a: ConfigLabel,
    pub config_b: ConfigLabel,
    /// Instance-classes in the shared universe
    pub classes: usize,
    pub solved_a: usize,
    pub solved_b: usize,
    pub penalty: f64,
    /// Σ log2(B) - log2(A) over all classes; positive means B is slower
    pub divergence: f64,
    /// Same sum restricted to the plotted points
    pub plotted_divergence: f64,
    /// One-sided Mann-Whitney U p-value for "B greater than A"
    pub p_value: f64,
    pub mwu_method: MwuMethod,
    pub significant: bool,
    /// Two-sided Welch t-test p-value over the same input, as a parametric
    /// cross-check
    pub welch_p_value: Option<f32>,
    /// Size of the significance-test input per side
    pub test_samples: usize,
    pub points: Vec<ComparisonPoint>,
    pub noise_floor_excluded: usize,
}

impl ComparisonResult {
    /// `solved_a - solved_b`
    pub fn solved_delta(&self) -> i64 {
        self.solved_a as i64 - self.solved_b as i64
    }
}

/// Compare configuration `b` against `a`
///
/// `context` is the broader comparison set consulted by the noise floor and
/// the penalty check; `a` and `b` are always part of it.
///
/// # Errors
/// - `UniverseMismatch` when `a` and `b` cover different instance-classes
/// - `InvalidPenalty` when the penalty does not exceed every real observation
/// - `Config` for invalid options
pub fn compare(
    a: &AggregateTable,
    b: &AggregateTable,
    context: &[&AggregateTable],
    options: &ComparisonOptions,
) -> Result<ComparisonResult> {
    options.validate()?;
    let penalty = options.resolved_penalty()?;

    check_same_classes(a, b)?;

    let observed_max = context
        .iter()
        .copied()
        .chain([a, b])
        .filter_map(AggregateTable::max_observed)
        .reduce(f64::max);
    if let Some(max) = observed_max {
        if penalty <= max {
            return Err(AnalysisError::InvalidPenalty {
                penalty,
                observed_max: max,
            });
        }
    }

    let below = |class: &InstanceClass, floor: f64| -> bool {
        let mut means = context
            .iter()
            .copied()
            .chain([a, b])
            .map(|t| t.get(class).and_then(|c| c.mean));
        match options.noise_floor_rule {
            NoiseFloorRule::AllBelow => means.all(|m| m.is_some_and(|v| v < floor)),
            NoiseFloorRule::AnyBelow => means.any(|m| m.is_some_and(|v| v < floor)),
        }
    };

    let mut solved_a = 0;
    let mut solved_b = 0;
    let mut divergence = 0.0;
    let mut plotted_divergence = 0.0;
    let mut points = Vec::new();
    let mut noise_floor_excluded = 0;
    let mut sample_a = Vec::new();
    let mut sample_b = Vec::new();

    for (class, cell_a) in &a.cells {
        let cell_b = b.get(class).ok_or_else(|| AnalysisError::UniverseMismatch {
            left: a.configuration.to_string(),
            right: b.configuration.to_string(),
            detail: format!("class {} missing", class),
        })?;

        if cell_a.is_solved() {
            solved_a += 1;
        }
        if cell_b.is_solved() {
            solved_b += 1;
        }

        let va = cell_a.mean.unwrap_or(penalty);
        let vb = cell_b.mean.unwrap_or(penalty);
        let log_ratio = vb.log2() - va.log2();
        divergence += log_ratio;

        if options.noise_floor_plot.is_some_and(|f| below(class, f)) {
            noise_floor_excluded += 1;
        } else {
            plotted_divergence += log_ratio;
            points.push(ComparisonPoint {
                class: class.clone(),
                a: va,
                b: vb,
                a_solved: cell_a.is_solved(),
                b_solved: cell_b.is_solved(),
            });
        }

        if !options.noise_floor_test.is_some_and(|f| below(class, f)) {
            sample_a.push(va);
            sample_b.push(vb);
        }
    }

    let mwu = mann_whitney_greater(&sample_b, &sample_a)?;
    let welch_p_value = welch_cross_check(&sample_b, &sample_a);

    tracing::info!(
        a = %a.configuration,
        b = %b.configuration,
        divergence,
        p_value = mwu.p_value,
        solved_a,
        solved_b,
        "compared configurations"
    );

    Ok(ComparisonResult {
        label: None,
        config_a: a.configuration.clone(),
        config_b: b.configuration.clone(),
        classes: a.len(),
        solved_a,
        solved_b,
        penalty,
        divergence,
        plotted_divergence,
        p_value: mwu.p_value,
        mwu_method: mwu.method,
        significant: mwu.p_value < options.significance_level,
        welch_p_value,
        test_samples: sample_a.len(),
        points,
        noise_floor_excluded,
    })
}

fn check_same_classes(a: &AggregateTable, b: &AggregateTable) -> Result<()> {
    let only_a: Vec<&InstanceClass> = a.classes().filter(|c| b.get(c).is_none()).collect();
    let only_b: Vec<&InstanceClass> = b.classes().filter(|c| a.get(c).is_none()).collect();
    if only_a.is_empty() && only_b.is_empty() {
        return Ok(());
    }

    let first = only_a
        .first()
        .or(only_b.first())
        .map(|c| c.to_string())
        .unwrap_or_default();
    Err(AnalysisError::UniverseMismatch {
        left: a.configuration.to_string(),
        right: b.configuration.to_string(),
        detail: format!(
            "{} class(es) only in '{}', {} only in '{}', first: {}",
            only_a.len(),
            a.configuration,
            only_b.len(),
            b.configuration,
            first
        ),
    })
}

/// Welch's t-test via aprender; `None` when it cannot be computed
fn welch_cross_check(x: &[f64], y: &[f64]) -> Option<f32> {
    if x.len() < 2 || y.len() < 2 {
        return None;
    }
    let x: Vec<f32> = x.iter().map(|v| *v as f32).collect();
    let y: Vec<f32> = y.iter().map(|v| *v as f32).collect();
    match aprender::stats::hypothesis::ttest_ind(&x, &y, false) {
        Ok(result) if result.pvalue.is_finite() => Some(result.pvalue),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Welch t-test unavailable: {}", e);
            None
        }
    }
}
