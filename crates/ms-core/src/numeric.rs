use crate::CoreError;

/// Floating point type used throughout system
pub type Real = f64;

/// Absolute/relative tolerance pair.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Error-control scale for one component: `abs + rel * magnitude`.
    #[inline]
    pub fn scale(&self, magnitude: Real) -> Real {
        self.abs + self.rel * magnitude
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, CoreError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(CoreError::NotPositive { what, value: v })
    }
}

/// `n` evenly spaced values from `start` to `end`, both inclusive.
///
/// The last value is set to `end` exactly.
pub fn linspace(start: Real, end: Real, n: usize) -> Vec<Real> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (end - start) / (n - 1) as Real;
            let mut points: Vec<Real> = (0..n).map(|i| start + i as Real * delta).collect();
            points[n - 1] = end;
            points
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
    }

    #[test]
    fn ensure_positive_rejects_zero_and_negative() {
        assert!(ensure_positive(0.0, "inertia").is_err());
        assert!(ensure_positive(-1.0, "inertia").is_err());
        assert_eq!(ensure_positive(2.5, "inertia").unwrap(), 2.5);
        assert!(matches!(
            ensure_positive(Real::INFINITY, "inertia"),
            Err(CoreError::NonFinite { .. })
        ));
    }

    #[test]
    fn tolerance_scale() {
        let tol = Tolerances {
            abs: 1e-8,
            rel: 1e-6,
        };
        assert!((tol.scale(100.0) - (1e-8 + 1e-4)).abs() < 1e-18);
    }

    #[test]
    fn linspace_endpoints_and_spacing() {
        let pts = linspace(1.0, 10.0, 100);
        assert_eq!(pts.len(), 100);
        assert_eq!(pts[0], 1.0);
        assert_eq!(pts[99], 10.0);
        assert!((pts[1] - pts[0] - 9.0 / 99.0).abs() < 1e-12);
    }

    #[test]
    fn linspace_degenerate_counts() {
        assert!(linspace(1.0, 2.0, 0).is_empty());
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn linspace_is_monotone(start in -100.0_f64..100.0, span in 0.001_f64..100.0, n in 2usize..200) {
            let pts = linspace(start, start + span, n);
            prop_assert_eq!(pts.len(), n);
            prop_assert!(pts.windows(2).all(|w| w[1] > w[0]));
        }
    }
}
