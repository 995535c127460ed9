// One-sided Mann-Whitney U test
//
// H1: values of `x` are stochastically greater than values of `y`.
//
// Method selection:
// - exact null distribution when either sample has at most 8 values and
//   there are no ties
// - otherwise the normal approximation with tie-corrected variance and a
//   continuity correction of 0.5

use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};

/// Largest sample size on either side for which the exact test is used
pub const EXACT_MAX_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MwuMethod {
    Exact,
    Asymptotic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MannWhitney {
    /// U statistic of `x`
    pub u: f64,
    /// P(U >= u) under H0
    pub p_value: f64,
    pub method: MwuMethod,
}

/// Test whether `x` is stochastically greater than `y`
///
/// # Errors
/// `Statistics` when either sample is empty or contains NaN.
///
/// # Example
/// ```
/// use runcompare::compare::mann_whitney_greater;
///
/// let slower = [12.0, 18.0, 1000.0];
/// let faster = [10.0, 20.0, 30.0];
/// let result = mann_whitney_greater(&slower, &faster).unwrap();
/// assert_eq!(result.u, 5.0);
/// assert!((result.p_value - 0.5).abs() < 1e-12);
/// ```
pub fn mann_whitney_greater(x: &[f64], y: &[f64]) -> Result<MannWhitney> {
    if x.is_empty() || y.is_empty() {
        return Err(AnalysisError::Statistics(
            "Mann-Whitney U needs at least one value per sample".to_string(),
        ));
    }
    if x.iter().chain(y).any(|v| v.is_nan()) {
        return Err(AnalysisError::Statistics(
            "Mann-Whitney U input contains NaN".to_string(),
        ));
    }

    let (rank_sum_x, tie_term) = rank_sum(x, y);
    let nx = x.len() as f64;
    let ny = y.len() as f64;
    let u = rank_sum_x - nx * (nx + 1.0) / 2.0;

    let has_ties = tie_term > 0.0;
    let small = x.len() <= EXACT_MAX_SIZE || y.len() <= EXACT_MAX_SIZE;

    if small && !has_ties {
        let p_value = exact_upper_tail(u.round() as usize, x.len(), y.len());
        return Ok(MannWhitney {
            u,
            p_value,
            method: MwuMethod::Exact,
        });
    }

    let n = nx + ny;
    let mu = nx * ny / 2.0;
    let variance = nx * ny / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    let p_value = if variance <= 0.0 {
        // Every value tied: no evidence in either direction
        1.0
    } else {
        let z = (u - mu - 0.5) / variance.sqrt();
        normal_sf(z)
    };

    Ok(MannWhitney {
        u,
        p_value: p_value.clamp(0.0, 1.0),
        method: MwuMethod::Asymptotic,
    })
}

/// Sum of mid-ranks of `x` in the pooled sample, and Σ(t³ - t) over tie groups
fn rank_sum(x: &[f64], y: &[f64]) -> (f64, f64) {
    let mut pooled: Vec<(f64, bool)> = x
        .iter()
        .map(|v| (*v, true))
        .chain(y.iter().map(|v| (*v, false)))
        .collect();
    pooled.sort_by(|left, right| left.0.total_cmp(&right.0));

    let mut rank_sum_x = 0.0;
    let mut tie_term = 0.0;
    let mut start = 0usize;
    while start < pooled.len() {
        let mut end = start + 1;
        while end < pooled.len() && pooled[end].0 == pooled[start].0 {
            end += 1;
        }
        let avg_rank = ((start + 1 + end) as f64) * 0.5;
        let in_x = pooled[start..end].iter().filter(|(_, is_x)| *is_x).count();
        rank_sum_x += avg_rank * in_x as f64;

        let t = (end - start) as f64;
        tie_term += t * t * t - t;
        start = end;
    }
    (rank_sum_x, tie_term)
}

/// P(U >= u) for sample sizes m, n without ties
///
/// The number of orderings with U = k is the k-th coefficient of the
/// Gaussian binomial [m+n choose m]_q = Π_{i=1..m} (1 - q^(n+i)) / (1 - q^i).
fn exact_upper_tail(u: usize, m: usize, n: usize) -> f64 {
    // The distribution is symmetric in (m, n); iterate over the smaller side
    let (m, n) = if m <= n { (m, n) } else { (n, m) };
    let max_u = m * n;
    if u > max_u {
        return 0.0;
    }

    let mut coeffs = vec![0.0f64; max_u + 1];
    coeffs[0] = 1.0;
    for i in 1..=m {
        let shift = n + i;
        for k in (shift..=max_u).rev() {
            coeffs[k] -= coeffs[k - shift];
        }
        for k in i..=max_u {
            coeffs[k] += coeffs[k - i];
        }
    }

    let total: f64 = coeffs.iter().sum();
    let tail: f64 = coeffs[u..].iter().sum();
    (tail / total).clamp(0.0, 1.0)
}

/// Upper tail of the standard normal distribution
pub(crate) fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

/// Complementary error function (Chebyshev fit, fractional error < 1.2e-7)
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}
