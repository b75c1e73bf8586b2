//! Preconditioned biconjugate gradient stabilized (BiCGSTAB) for general square operators.
use crate::{
    apply_operator, IdentityOperator, LinearOperator, SolveError, SolveErrorKind, SolveOutput, StoppingCriterion,
};
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use num::Zero;

#[derive(Debug, Clone)]
pub struct BiCgStabWorkspace<T: Scalar> {
    r: DVector<T>,
    r_hat: DVector<T>,
    p: DVector<T>,
    v: DVector<T>,
    s: DVector<T>,
    t: DVector<T>,
    y: DVector<T>,
    z: DVector<T>,
}

impl<T: Scalar + Zero> Default for BiCgStabWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            r_hat: DVector::zeros(0),
            p: DVector::zeros(0),
            v: DVector::zeros(0),
            s: DVector::zeros(0),
            t: DVector::zeros(0),
            y: DVector::zeros(0),
            z: DVector::zeros(0),
        }
    }
}

impl<T: Scalar + Zero> BiCgStabWorkspace<T> {
    fn resize(&mut self, dim: usize) {
        for buffer in [
            &mut self.r,
            &mut self.r_hat,
            &mut self.p,
            &mut self.v,
            &mut self.s,
            &mut self.t,
            &mut self.y,
            &mut self.z,
        ] {
            buffer.resize_vertically_mut(dim, T::zero());
            buffer.fill(T::zero());
        }
    }
}

/// Right-preconditioned BiCGSTAB.
///
/// The builder mirrors [`ConjugateGradient`](crate::ConjugateGradient). The preconditioner is
/// applied as an approximate inverse, `z = P r`.
#[derive(Debug)]
pub struct BiConjugateGradientStabilized<T, A, P, Criterion>
where
    T: Scalar,
{
    workspace: BiCgStabWorkspace<T>,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl<T: Scalar + Zero> BiConjugateGradientStabilized<T, (), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            workspace: BiCgStabWorkspace::default(),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<T: Scalar + Zero> Default for BiConjugateGradientStabilized<T, (), IdentityOperator, ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, P, Criterion> BiConjugateGradientStabilized<T, (), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> BiConjugateGradientStabilized<T, A, P, Criterion> {
        BiConjugateGradientStabilized {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<T: Scalar, A, P, Criterion> BiConjugateGradientStabilized<T, A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> BiConjugateGradientStabilized<T, A, P2, Criterion> {
        BiConjugateGradientStabilized {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<T: Scalar, A, P> BiConjugateGradientStabilized<T, A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(
        self,
        stopping_criterion: Criterion,
    ) -> BiConjugateGradientStabilized<T, A, P, Criterion> {
        BiConjugateGradientStabilized {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<T, A, P, Criterion> BiConjugateGradientStabilized<T, A, P, Criterion>
where
    T: RealField,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    Criterion: StoppingCriterion<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<SolveOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(&mut self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<SolveOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());

        let mut output = SolveOutput::new();
        self.workspace.resize(x.len());
        let BiCgStabWorkspace {
            r,
            r_hat,
            p,
            v,
            s,
            t,
            y,
            z,
        } = &mut self.workspace;

        self.stopping_criterion
            .reset(&self.operator, (&x).into(), (&b).into());

        // r = b - Ax
        if let Err(err) = apply_operator(&mut *r, &self.operator, &x) {
            return Err(SolveError::new(output, OperatorError(err)));
        }
        r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - ax_i.clone());
        r_hat.copy_from(r);

        let b_norm = b.norm();
        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(output);
        }

        let mut rho = T::one();
        let mut alpha = T::one();
        let mut omega = T::one();

        loop {
            let convergence = self.stopping_criterion.has_converged(
                &self.operator,
                (&x).into(),
                (&b).into(),
                b_norm.clone(),
                output.num_iterations,
                (&*r).into(),
            );
            match convergence {
                Ok(true) => break,
                Ok(false) => {}
                Err(error_kind) => return Err(SolveError::new(output, error_kind)),
            }
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(output, MaxIterationsReached { max_iter }));
                }
            }

            let rho_next = r_hat.dot(r);
            if rho_next == T::zero() || omega == T::zero() || !rho_next.is_finite() {
                return Err(SolveError::new(output, Breakdown));
            }
            let beta = (rho_next.clone() / rho) * (alpha.clone() / omega.clone());
            rho = rho_next;

            // p <- r + beta * (p - omega * v)
            p.zip_apply(&*v, |p_i, v_i| *p_i = p_i.clone() - omega.clone() * v_i);
            p.zip_apply(&*r, |p_i, r_i| *p_i = r_i + beta.clone() * p_i.clone());

            // y = P p, v = A y
            if let Err(err) = apply_operator(&mut *y, &self.preconditioner, &*p) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut *v, &self.operator, &*y) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let r_hat_v = r_hat.dot(v);
            if r_hat_v == T::zero() || !r_hat_v.is_finite() {
                return Err(SolveError::new(output, Breakdown));
            }
            alpha = rho.clone() / r_hat_v;

            // s = r - alpha * v
            s.copy_from(r);
            s.zip_apply(&*v, |s_i, v_i| *s_i -= alpha.clone() * v_i);

            // z = P s, t = A z
            if let Err(err) = apply_operator(&mut *z, &self.preconditioner, &*s) {
                return Err(SolveError::new(output, PreconditionerError(err)));
            }
            if let Err(err) = apply_operator(&mut *t, &self.operator, &*z) {
                return Err(SolveError::new(output, OperatorError(err)));
            }

            let t_t = t.dot(t);
            omega = if t_t > T::zero() {
                t.dot(s) / t_t
            } else {
                T::zero()
            };

            // x <- x + alpha * y + omega * z
            x.zip_apply(&*y, |x_i, y_i| *x_i += alpha.clone() * y_i);
            x.zip_apply(&*z, |x_i, z_i| *x_i += omega.clone() * z_i);

            // r <- s - omega * t
            r.copy_from(s);
            r.zip_apply(&*t, |r_i, t_i| *r_i -= omega.clone() * t_i);

            output.num_iterations += 1;
        }

        Ok(output)
    }
}
