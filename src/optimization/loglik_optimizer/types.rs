//! Numeric aliases shared by the optimizer and its callers.
//!
//! `Theta` and `Grad` have length equal to the number of free parameters;
//! `Hessian` is square in that dimension. The L-BFGS aliases pin Argmin's
//! generics to these shapes.
use argmin::solver::{
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};

/// Unconstrained parameter vector.
pub type Theta = Array1<f64>;

/// Gradient with the shape of [`Theta`].
pub type Grad = Array1<f64>;

/// Dense second-derivative matrix.
pub type Hessian = Array2<f64>;

/// Scalar objective; the solver sees `−ℓ(θ)`.
pub type Cost = f64;

/// L-BFGS history length used when [`MLEOptions::lbfgs_mem`] is `None`.
///
/// [`MLEOptions::lbfgs_mem`]: super::traits::MLEOptions::lbfgs_mem
pub const DEFAULT_LBFGS_MEM: usize = 7;

pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;
