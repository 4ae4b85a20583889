//! Model abstraction shared by every integrator.

use crate::error::SimResult;

/// An ODE system `dx/dt = f(t, x)` with its own state arithmetic.
///
/// Integrators only ever combine states through [`add`](Self::add),
/// [`scale`](Self::scale) and [`add_scaled`](Self::add_scaled), and read the
/// components through `AsRef<[f64]>` for error control.
///
/// `rhs` takes `&self`: integrators may call it any number of times and in any
/// order, so it must not depend on hidden mutable state.
pub trait TransientModel {
    type State: Clone + AsRef<[f64]>;

    /// State at the start of the span.
    fn initial_state(&self) -> Self::State;

    /// Derivative `f(t, x)`.
    fn rhs(&self, t: f64, x: &Self::State) -> SimResult<Self::State>;

    /// `a + b`
    fn add(&self, a: &Self::State, b: &Self::State) -> Self::State;

    /// `scale * a`
    fn scale(&self, a: &Self::State, scale: f64) -> Self::State;

    /// `a + scale * b`
    fn add_scaled(&self, a: &Self::State, scale: f64, b: &Self::State) -> Self::State {
        self.add(a, &self.scale(b, scale))
    }
}
