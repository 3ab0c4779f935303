//! The hypergeometric distribution, restricted to what the enrichment needs
//!
//! All probabilities are accumulated from log-binomial coefficients so that
//! populations of tens of thousands of genes don't overflow.
use std::cmp;

use statrs::function::factorial::ln_binomial;

use crate::{EnrichError, EnrichResult};

/// Hypergeometric distribution of drawing `draws` genes without
/// replacement from a `population` that contains `successes` term genes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Hypergeometric {
    population: u64,
    successes: u64,
    draws: u64,
}

impl Hypergeometric {
    /// Constructs a new hypergeometric distribution
    /// with a population (N) of `population`, number
    /// of successes (K) of `successes`, and number of draws
    /// (n) of `draws`
    ///
    /// # Errors
    ///
    /// If `successes > population` or `draws > population`
    pub fn new(population: u64, successes: u64, draws: u64) -> EnrichResult<Hypergeometric> {
        if successes > population || draws > population {
            Err(EnrichError::InvalidInput(format!(
                "population {population} is smaller than successes {successes} or draws {draws}"
            )))
        } else {
            Ok(Hypergeometric {
                population,
                successes,
                draws,
            })
        }
    }

    /// Returns the minimum possible number of observed successes
    ///
    /// # Formula
    ///
    /// ```text
    /// max(0, n + K - N)
    /// ```
    pub fn min(&self) -> u64 {
        (self.draws + self.successes).saturating_sub(self.population)
    }

    /// Returns the maximum possible number of observed successes
    ///
    /// # Formula
    ///
    /// ```text
    /// min(K, n)
    /// ```
    pub fn max(&self) -> u64 {
        cmp::min(self.successes, self.draws)
    }

    /// Natural logarithm of the probability mass at `x`
    fn ln_pmf(&self, x: u64, ln_denom: f64) -> f64 {
        ln_binomial(self.successes, x) + ln_binomial(self.population - self.successes, self.draws - x)
            - ln_denom
    }

    /// The probability of observing `observed` **or more** successes
    ///
    /// # Formula
    ///
    /// ```text
    /// sum_{i=k}^{min(n,K)} C(K,i) * C(N-K, n-i) / C(N,n)
    /// ```
    ///
    /// The p-value is exactly `1.0` if there are no successes, no draws
    /// or nothing was observed.
    pub fn pvalue(&self, observed: u64) -> f64 {
        if self.successes == 0 || self.draws == 0 || observed == 0 || observed <= self.min() {
            return 1.0;
        }
        if observed > self.max() {
            return 0.0;
        }
        let ln_denom = ln_binomial(self.population, self.draws);
        let p = (observed..=self.max()).fold(0.0, |acc, i| acc + self.ln_pmf(i, ln_denom).exp());
        p.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use statrs::distribution::DiscreteCDF;

    #[test]
    fn build() {
        assert!(Hypergeometric::new(2, 2, 2).is_ok());
        assert!(Hypergeometric::new(2, 3, 2).is_err());
        assert!(Hypergeometric::new(2, 2, 3).is_err());
    }

    #[test]
    fn max() {
        let hyper = Hypergeometric::new(50, 25, 13).unwrap();
        assert_eq!(hyper.max(), 13);

        let hyper = Hypergeometric::new(50, 10, 13).unwrap();
        assert_eq!(hyper.max(), 10);
    }

    #[test]
    fn min() {
        let hyper = Hypergeometric::new(50, 25, 30).unwrap();
        assert_eq!(hyper.min(), 5);

        let hyper = Hypergeometric::new(50, 40, 30).unwrap();
        assert_eq!(hyper.min(), 20);

        let hyper = Hypergeometric::new(50, 10, 13).unwrap();
        assert_eq!(hyper.min(), 0);
    }

    #[test]
    fn known_values() {
        // Numbers calculated here https://statisticsbyjim.com/probability/hypergeometric-distribution/
        let hyper = Hypergeometric::new(50, 25, 13).unwrap();

        assert!((hyper.pvalue(2) - 0.9996189832542451).abs() < 1e-12);
        assert!((hyper.pvalue(4) - 0.9746644799047702).abs() < 1e-12);
        assert!((hyper.pvalue(8) - 0.26009737477738537).abs() < 1e-12);
        assert!((hyper.pvalue(13) - 0.000014654490222007184).abs() < 1e-12);
        assert!(hyper.pvalue(14) < f64::EPSILON);
    }

    #[test]
    fn closed_form() {
        // N=20, K=5, n=4, k=3
        // (C(5,3) * C(15,1) + C(5,4) * C(15,0)) / C(20,4) = (150 + 5) / 4845
        let hyper = Hypergeometric::new(20, 5, 4).unwrap();
        let expected = 155.0 / 4845.0;
        assert!((hyper.pvalue(3) - expected).abs() < 1e-12);
    }

    #[test]
    fn degenerate_inputs() {
        assert!((Hypergeometric::new(20, 0, 4).unwrap().pvalue(0) - 1.0).abs() < f64::EPSILON);
        assert!((Hypergeometric::new(20, 5, 0).unwrap().pvalue(0) - 1.0).abs() < f64::EPSILON);
        assert!((Hypergeometric::new(20, 5, 4).unwrap().pvalue(0) - 1.0).abs() < f64::EPSILON);
        // query and term cover the full population
        assert!((Hypergeometric::new(20, 20, 20).unwrap().pvalue(20) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn large_population() {
        let hyper = Hypergeometric::new(20_000, 300, 150).unwrap();
        let p = hyper.pvalue(40);
        assert!(p > 0.0);
        assert!(p < 1e-20);
        assert!(hyper.pvalue(2) <= 1.0);
    }

    #[test]
    fn same_as_statrs() {
        for (population, successes, draws, observed) in [
            (100, 10, 20, 5),
            (1000, 50, 30, 3),
            (17_000, 250, 400, 12),
            (60, 30, 30, 16),
        ] {
            let ours = Hypergeometric::new(population, successes, draws)
                .unwrap()
                .pvalue(observed);
            let theirs = statrs::distribution::Hypergeometric::new(population, successes, draws)
                .unwrap()
                .sf(observed - 1);
            assert!(
                (ours - theirs).abs() < 1e-10,
                "{population} {successes} {draws} {observed}: {ours} != {theirs}"
            );
        }
    }
}
