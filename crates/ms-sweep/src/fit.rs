//! Ordinary least-squares line through the swept ω(V) characteristic.
//!
//! Statistics follow the usual simple-regression definitions with population
//! (divide-by-n) moments:
//!
//! ```text
//! slope     = Sxy / Sxx
//! intercept = ȳ − slope·x̄
//! r         = Sxy / √(Sxx·Syy)
//! t         = r·√(df / ((1 − r)(1 + r))),   df = n − 2
//! ```

use std::fmt;

use crate::error::SweepError;
use crate::executor::SweepResult;
use crate::special::student_t_two_sided_p;

/// Guards the t statistic against division by zero for a perfect fit.
const TINY: f64 = 1e-20;

/// Result of a least-squares line fit.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitResult {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient, in [-1, 1]
    pub r_value: f64,
    /// Two-sided p-value for the null hypothesis of zero slope
    pub p_value: f64,
    /// Standard error of the slope
    pub slope_stderr: f64,
    /// Standard error of the intercept
    pub intercept_stderr: f64,
    /// Number of points fitted
    pub n: usize,
}

impl FitResult {
    /// Value of the fitted line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn r_squared(&self) -> f64 {
        self.r_value * self.r_value
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slope = {:.4} ± {:.2e}, intercept = {:.4} ± {:.2e}, r = {:.6}, p = {:.3e} (n = {})",
            self.slope,
            self.slope_stderr,
            self.intercept,
            self.intercept_stderr,
            self.r_value,
            self.p_value,
            self.n
        )
    }
}

/// Fit ω against V over the successful points of a sweep.
pub fn fit(sweep: &SweepResult) -> Result<FitResult, SweepError> {
    linear_regression(&sweep.voltages(), &sweep.omegas())
}

/// Least-squares regression of `y` on `x`.
///
/// Needs at least two points and two distinct `x` values.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<FitResult, SweepError> {
    if x.len() != y.len() {
        return Err(SweepError::InvalidConfiguration {
            what: "fit inputs must have equal length",
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(SweepError::InvalidConfiguration {
            what: "fit inputs must be finite",
        });
    }

    let n = x.len();
    let insufficient = || SweepError::InsufficientData {
        points: n,
        distinct: count_distinct(x),
    };
    if n < 2 {
        return Err(insufficient());
    }

    let nf = n as f64;
    let xmean = x.iter().sum::<f64>() / nf;
    let ymean = y.iter().sum::<f64>() / nf;

    let (mut ssxm, mut ssym, mut ssxym) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - xmean;
        let dy = yi - ymean;
        ssxm += dx * dx;
        ssym += dy * dy;
        ssxym += dx * dy;
    }
    ssxm /= nf;
    ssym /= nf;
    ssxym /= nf;

    if ssxm == 0.0 {
        return Err(insufficient());
    }

    let r_den = (ssxm * ssym).sqrt();
    let r = if r_den == 0.0 {
        0.0
    } else {
        (ssxym / r_den).clamp(-1.0, 1.0)
    };

    let slope = ssxym / ssxm;
    let intercept = ymean - slope * xmean;

    let (p_value, slope_stderr, intercept_stderr) = if n == 2 {
        // Two points always lie on a line; the slope is significant unless flat.
        let p = if y[0] == y[1] { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        let df = (n - 2) as f64;
        let t = r * (df / ((1.0 - r + TINY) * (1.0 + r + TINY))).sqrt();
        let p = student_t_two_sided_p(t, df);
        let slope_se = ((1.0 - r * r) * ssym / ssxm / df).sqrt();
        let intercept_se = slope_se * (ssxm + xmean * xmean).sqrt();
        (p, slope_se, intercept_se)
    };

    Ok(FitResult {
        slope,
        intercept,
        r_value: r,
        p_value,
        slope_stderr,
        intercept_stderr,
        n,
    })
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SweepPoint;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn textbook_dataset() {
        let fit = linear_regression(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 5.0, 4.0, 5.0]).unwrap();
        assert!(close(fit.slope, 0.6, 1e-12));
        assert!(close(fit.intercept, 2.2, 1e-12));
        assert!(close(fit.r_value, 0.6_f64.sqrt(), 1e-12));
        assert!(close(fit.r_squared(), 0.6, 1e-12));
        assert!(close(fit.slope_stderr, 0.08_f64.sqrt(), 1e-12));
        assert!(close(fit.intercept_stderr, (0.08_f64 * 11.0).sqrt(), 1e-12));
        assert!(close(fit.p_value, 0.124_027_062_657_554_6, 1e-9));
        assert_eq!(fit.n, 5);
    }

    #[test]
    fn perfect_line_has_unit_correlation() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let fit = linear_regression(&x, &y).unwrap();
        assert!(close(fit.slope, 3.0, 1e-12));
        assert!(close(fit.intercept, -2.0, 1e-12));
        assert!(close(fit.r_value, 1.0, 1e-12));
        assert!(fit.p_value < 1e-12);
        assert!(fit.slope_stderr < 1e-6);
        assert!(close(fit.predict(10.0), 28.0, 1e-10));
    }

    #[test]
    fn decreasing_line_has_negative_correlation() {
        let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[5.0, 3.1, 0.9, -1.0]).unwrap();
        assert!(fit.slope < 0.0);
        assert!(fit.r_value < -0.99);
    }

    #[test]
    fn two_points() {
        let fit = linear_regression(&[1.0, 3.0], &[2.0, 6.0]).unwrap();
        assert!(close(fit.slope, 2.0, 1e-15));
        assert!(close(fit.intercept, 0.0, 1e-15));
        assert_eq!(fit.p_value, 0.0);
        assert_eq!(fit.slope_stderr, 0.0);
        assert_eq!(fit.intercept_stderr, 0.0);

        let flat = linear_regression(&[1.0, 3.0], &[4.0, 4.0]).unwrap();
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_value, 0.0);
        assert_eq!(flat.p_value, 1.0);
    }

    #[test]
    fn constant_response_has_zero_correlation() {
        let fit = linear_regression(&[1.0, 2.0, 3.0], &[7.0, 7.0, 7.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 7.0);
        assert_eq!(fit.r_value, 0.0);
        assert!(close(fit.p_value, 1.0, 1e-12));
    }

    #[test]
    fn insufficient_data() {
        assert_eq!(
            linear_regression(&[2.0], &[5.0]),
            Err(SweepError::InsufficientData {
                points: 1,
                distinct: 1
            })
        );
        assert_eq!(
            linear_regression(&[], &[]),
            Err(SweepError::InsufficientData {
                points: 0,
                distinct: 0
            })
        );
        assert_eq!(
            linear_regression(&[4.0, 4.0, 4.0], &[1.0, 2.0, 3.0]),
            Err(SweepError::InsufficientData {
                points: 3,
                distinct: 1
            })
        );
    }

    #[test]
    fn mismatched_or_non_finite_inputs_rejected() {
        assert!(matches!(
            linear_regression(&[1.0, 2.0], &[1.0]),
            Err(SweepError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            linear_regression(&[1.0, 2.0, 3.0], &[1.0, f64::NAN, 3.0]),
            Err(SweepError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn fit_uses_sweep_points() {
        let sweep = SweepResult {
            probe_time: 1.0,
            points: vec![
                SweepPoint {
                    voltage: 1.0,
                    omega: 10.0,
                },
                SweepPoint {
                    voltage: 2.0,
                    omega: 20.0,
                },
                SweepPoint {
                    voltage: 4.0,
                    omega: 40.0,
                },
            ],
            skipped: Vec::new(),
        };
        let fit = fit(&sweep).unwrap();
        assert!(close(fit.slope, 10.0, 1e-12));
        assert!(close(fit.intercept, 0.0, 1e-12));
        assert_eq!(fit.n, 3);
    }

    #[test]
    fn display_includes_statistics() {
        let fit = linear_regression(&[1.0, 2.0, 3.0, 4.0, 5.0], &[2.0, 4.0, 5.0, 4.0, 5.0]).unwrap();
        let text = fit.to_string();
        assert!(text.contains("slope = 0.6000"));
        assert!(text.contains("n = 5"));
    }
}
