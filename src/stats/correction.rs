//! Multiple testing correction
//!
//! When testing every term of a gene set library, the raw p-values must be
//! adjusted for the number of tests. The default method is the
//! Benjamini-Hochberg procedure that controls the false discovery rate.
//!
//! # Examples
//!
//! ```
//! use gsenrich::stats::correction::benjamini_hochberg;
//!
//! let correction = benjamini_hochberg(&[0.001, 0.02, 0.03, 0.5], 0.05).unwrap();
//!
//! assert!((correction.adjusted()[0] - 0.004).abs() < 1e-12);
//! assert!((correction.adjusted()[1] - 0.04).abs() < 1e-12);
//! assert!((correction.adjusted()[2] - 0.04).abs() < 1e-12);
//! assert!((correction.adjusted()[3] - 0.5).abs() < 1e-12);
//! assert_eq!(correction.reject(), &[true, true, true, false]);
//! ```

use crate::{f64_from_usize, EnrichError, EnrichResult};

/// Multiple testing correction method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorrectionMethod {
    /// Benjamini-Hochberg procedure, controls the false discovery rate
    #[default]
    BenjaminiHochberg,
    /// Bonferroni correction, controls the family-wise error rate
    Bonferroni,
}

/// Adjusted p-values and reject flags, in the order of the raw p-values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correction {
    adjusted: Vec<f64>,
    reject: Vec<bool>,
}

impl Correction {
    fn new(adjusted: Vec<f64>, alpha: f64) -> Self {
        let reject = adjusted.iter().map(|p| *p <= alpha).collect();
        Self { adjusted, reject }
    }

    /// The adjusted p-values
    pub fn adjusted(&self) -> &[f64] {
        &self.adjusted
    }

    /// `true` for every test with an adjusted p-value of `alpha` or lower
    pub fn reject(&self) -> &[bool] {
        &self.reject
    }

    /// Returns the number of tests
    pub fn len(&self) -> usize {
        self.adjusted.len()
    }

    /// Returns `true` if there are no tests
    pub fn is_empty(&self) -> bool {
        self.adjusted.is_empty()
    }

    /// Consumes the correction and returns the adjusted p-values and reject flags
    pub fn into_parts(self) -> (Vec<f64>, Vec<bool>) {
        (self.adjusted, self.reject)
    }
}

/// Applies a multiple testing correction to `pvalues`
///
/// # Errors
///
/// [`EnrichError::InvalidInput`] if a p-value is not within `[0, 1]`
pub fn correct(pvalues: &[f64], alpha: f64, method: CorrectionMethod) -> EnrichResult<Correction> {
    match method {
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(pvalues, alpha),
        CorrectionMethod::Bonferroni => bonferroni(pvalues, alpha),
    }
}

/// Benjamini-Hochberg procedure for controlling the false discovery rate
///
/// The p-values are ranked in ascending order (ties keep their relative
/// order) and adjusted to `p * m / rank`. Scanning from the highest rank
/// downwards, every value is capped by the value of the next higher rank
/// and by `1.0`.
///
/// The returned values are in the same order as `pvalues`.
///
/// # Errors
///
/// [`EnrichError::InvalidInput`] if a p-value is not within `[0, 1]`
pub fn benjamini_hochberg(pvalues: &[f64], alpha: f64) -> EnrichResult<Correction> {
    validate(pvalues)?;
    let m = pvalues.len();

    let mut order: Vec<usize> = (0..m).collect();
    // `sort_by` is stable, ties keep their input order
    order.sort_by(|a, b| pvalues[*a].total_cmp(&pvalues[*b]));

    let total = f64_from_usize(m);
    let mut adjusted = vec![0.0; m];
    let mut previous = 1.0_f64;
    for (rank0, idx) in order.iter().enumerate().rev() {
        let rank = f64_from_usize(rank0 + 1);
        let adj = (pvalues[*idx] * total / rank).min(previous).clamp(0.0, 1.0);
        adjusted[*idx] = adj;
        previous = adj;
    }

    Ok(Correction::new(adjusted, alpha))
}

/// Bonferroni correction: `min(p * m, 1.0)`
///
/// # Errors
///
/// [`EnrichError::InvalidInput`] if a p-value is not within `[0, 1]`
pub fn bonferroni(pvalues: &[f64], alpha: f64) -> EnrichResult<Correction> {
    validate(pvalues)?;
    let total = f64_from_usize(pvalues.len());
    let adjusted = pvalues.iter().map(|p| (p * total).min(1.0)).collect();
    Ok(Correction::new(adjusted, alpha))
}

fn validate(pvalues: &[f64]) -> EnrichResult<()> {
    match pvalues
        .iter()
        .enumerate()
        .find(|(_, p)| !(0.0..=1.0).contains(*p))
    {
        Some((idx, p)) => Err(EnrichError::InvalidInput(format!(
            "p-value at index {idx} is not within [0, 1]: {p}"
        ))),
        None => Ok(()),
    }
}
