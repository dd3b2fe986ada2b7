//! Cached cost function wrapper for eliminating redundant computations.
//!
//! Optimization loops frequently ask for the value and gradient at a point
//! they have just evaluated (the accepted trial of a line search, the
//! starting point of the next iteration). This wrapper remembers the last
//! evaluated point together with its value and gradient.

use crate::{cost_function::CostFunction, error::Result, types::{DVector, Scalar}};
use std::cell::RefCell;
use std::fmt::Debug;

/// A caching wrapper for cost functions that eliminates redundant computations.
///
/// Only the most recent point is remembered. Points are compared
/// component-wise for exact equality.
///
/// # Example
///
/// ```rust
/// use secant_core::prelude::*;
///
/// #[derive(Debug)]
/// struct Parabola;
///
/// impl CostFunction<f64> for Parabola {
///     fn cost(&self, x: &DVector<f64>) -> Result<f64> {
///         Ok(x.dot(x))
///     }
///     fn cost_and_gradient(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
///         Ok((x.dot(x), x * 2.0))
///     }
/// }
///
/// let cached = CachedCostFunction::new(Parabola);
/// let point = DVector::from_vec(vec![1.0, 2.0, 3.0]);
///
/// let first = cached.cost_and_gradient(&point).unwrap();
/// let second = cached.cost(&point).unwrap();
/// assert_eq!(first.0, second);
/// assert_eq!(cached.cache_stats(), (1, 1));
/// ```
#[derive(Debug)]
pub struct CachedCostFunction<C, T>
where
    T: Scalar,
{
    inner: C,
    cache: RefCell<CacheStorage<T>>,
}

#[derive(Debug)]
struct CacheStorage<T: Scalar> {
    point: Option<DVector<T>>,
    cost: Option<T>,
    gradient: Option<DVector<T>>,
    hits: usize,
    misses: usize,
}

impl<T: Scalar> Default for CacheStorage<T> {
    fn default() -> Self {
        Self {
            point: None,
            cost: None,
            gradient: None,
            hits: 0,
            misses: 0,
        }
    }
}

impl<T: Scalar> CacheStorage<T> {
    fn matches(&self, point: &DVector<T>) -> bool {
        self.point.as_ref().is_some_and(|p| p == point)
    }

    fn reset_to(&mut self, point: &DVector<T>) {
        if !self.matches(point) {
            self.point = Some(point.clone());
            self.cost = None;
            self.gradient = None;
        }
    }
}

impl<C, T> CachedCostFunction<C, T>
where
    C: CostFunction<T>,
    T: Scalar,
{
    /// Creates a new cached cost function wrapper.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: RefCell::new(CacheStorage::default()),
        }
    }

    /// Returns the underlying cost function.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Returns cache statistics as `(hits, misses)`.
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits, cache.misses)
    }

    /// Drops the cached point.
    pub fn clear(&self) {
        let mut cache = self.cache.borrow_mut();
        cache.point = None;
        cache.cost = None;
        cache.gradient = None;
    }
}

impl<C, T> CostFunction<T> for CachedCostFunction<C, T>
where
    C: CostFunction<T>,
    T: Scalar,
{
    fn cost(&self, point: &DVector<T>) -> Result<T> {
        {
            let mut cache = self.cache.borrow_mut();
            if cache.matches(point) {
                if let Some(cost) = cache.cost {
                    cache.hits += 1;
                    return Ok(cost);
                }
            }
            cache.misses += 1;
        }

        let cost = self.inner.cost(point)?;
        let mut cache = self.cache.borrow_mut();
        cache.reset_to(point);
        cache.cost = Some(cost);
        Ok(cost)
    }

    fn cost_and_gradient(&self, point: &DVector<T>) -> Result<(T, DVector<T>)> {
        {
            let mut cache = self.cache.borrow_mut();
            if cache.matches(point) {
                if let (Some(cost), Some(gradient)) = (cache.cost, cache.gradient.clone()) {
                    cache.hits += 1;
                    return Ok((cost, gradient));
                }
            }
            cache.misses += 1;
        }

        let (cost, gradient) = self.inner.cost_and_gradient(point)?;
        let mut cache = self.cache.borrow_mut();
        cache.reset_to(point);
        cache.cost = Some(cost);
        cache.gradient = Some(gradient.clone());
        Ok((cost, gradient))
    }

    fn gradient(&self, point: &DVector<T>) -> Result<DVector<T>> {
        {
            let mut cache = self.cache.borrow_mut();
            if cache.matches(point) {
                if let Some(gradient) = cache.gradient.clone() {
                    cache.hits += 1;
                    return Ok(gradient);
                }
            }
            cache.misses += 1;
        }

        let gradient = self.inner.gradient(point)?;
        let mut cache = self.cache.borrow_mut();
        cache.reset_to(point);
        cache.gradient = Some(gradient.clone());
        Ok(gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_function::CountingCostFunction;

    #[derive(Debug)]
    struct Shifted(f64);

    impl CostFunction<f64> for Shifted {
        fn cost(&self, x: &DVector<f64>) -> Result<f64> {
            Ok(x.iter().map(|v| (v - self.0).powi(2)).sum())
        }

        fn cost_and_gradient(&self, x: &DVector<f64>) -> Result<(f64, DVector<f64>)> {
            let grad = x.map(|v| 2.0 * (v - self.0));
            Ok((self.cost(x)?, grad))
        }
    }

    #[test]
    fn test_repeated_point_is_served_from_cache() {
        let cached = CachedCostFunction::new(CountingCostFunction::new(Shifted(1.0)));
        let x = DVector::from_vec(vec![0.0, 2.0]);

        let (v1, g1) = cached.cost_and_gradient(&x).unwrap();
        let (v2, g2) = cached.cost_and_gradient(&x).unwrap();
        let v3 = cached.cost(&x).unwrap();
        let g3 = cached.gradient(&x).unwrap();

        assert_eq!(v1, v2);
        assert_eq!(v1, v3);
        assert_eq!(g1, g2);
        assert_eq!(g1, g3);
        assert_eq!(cached.inner().counts(), (1, 1));
        assert_eq!(cached.cache_stats(), (3, 1));
    }

    #[test]
    fn test_new_point_invalidates_cache() {
        let cached = CachedCostFunction::new(CountingCostFunction::new(Shifted(0.0)));
        let x = DVector::from_vec(vec![1.0]);
        let y = DVector::from_vec(vec![2.0]);

        cached.cost(&x).unwrap();
        cached.cost(&y).unwrap();
        cached.cost(&x).unwrap();
        assert_eq!(cached.inner().counts(), (3, 0));

        // A value-only entry does not satisfy a gradient request.
        cached.cost_and_gradient(&x).unwrap();
        assert_eq!(cached.inner().counts(), (4, 1));

        cached.clear();
        cached.cost(&x).unwrap();
        assert_eq!(cached.inner().counts(), (5, 1));
    }
}
