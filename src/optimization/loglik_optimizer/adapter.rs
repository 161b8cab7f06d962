//! Bridge from [`LogLikelihood`] to Argmin's minimization traits.
//!
//! The cost is `c(θ) = −ℓ(θ)`. An analytic `∇ℓ` is validated and negated;
//! without one, the cost itself is differenced by
//! [`fd_gradient`](super::finite_diff::fd_gradient), so no sign flip is
//! needed on that path.
use argmin::core::{CostFunction, Error, Gradient};

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        finite_diff::fd_gradient,
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};

#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        ArgMinAdapter { f, data }
    }

    /// `−ℓ(θ)`, rejecting non-finite values.
    pub fn neg_loglik(&self, theta: &Theta) -> OptResult<Cost> {
        let value = self.f.value(theta, self.data)?;
        if !value.is_finite() {
            return Err(OptError::NonFiniteCost { value });
        }
        Ok(-value)
    }

    /// `∇c(θ)`, analytic when the model provides it.
    pub fn cost_gradient(&self, theta: &Theta) -> OptResult<Grad> {
        match self.f.grad(theta, self.data) {
            Ok(g) => {
                validate_grad(&g, theta.len())?;
                Ok(-g)
            }
            Err(OptError::GradientNotImplemented) => {
                let cost = |t: &Theta| self.neg_loglik(t);
                fd_gradient(theta, &cost)
            }
            Err(e) => Err(e),
        }
    }
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.neg_loglik(theta)?)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        Ok(self.cost_gradient(theta)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    struct Parabola {
        analytic: bool,
    }

    impl LogLikelihood for Parabola {
        type Data = f64;

        fn value(&self, theta: &Theta, centre: &f64) -> OptResult<Cost> {
            Ok(-(theta[0] - centre).powi(2))
        }

        fn check(&self, _theta: &Theta, _data: &f64) -> OptResult<()> {
            Ok(())
        }

        fn grad(&self, theta: &Theta, centre: &f64) -> OptResult<Grad> {
            if self.analytic {
                Ok(array![-2.0 * (theta[0] - centre)])
            } else {
                Err(OptError::GradientNotImplemented)
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Check sign conventions on both gradient paths.
    //
    // Given
    // -----
    // - ℓ(θ) = −(θ − 1)² at θ = 3, with and without an analytic gradient.
    //
    // Expect
    // ------
    // - Cost 4 and cost gradient 4 on both paths.
    fn cost_and_gradient_flip_signs() {
        for analytic in [true, false] {
            let model = Parabola { analytic };
            let adapter = ArgMinAdapter::new(&model, &1.0);
            let theta = array![3.0];
            assert_relative_eq!(adapter.cost(&theta).unwrap(), 4.0);
            assert_relative_eq!(adapter.gradient(&theta).unwrap()[0], 4.0, epsilon = 1e-5);
        }
    }
}
