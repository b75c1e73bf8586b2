use crate::element::ReferenceElement;
use crate::quadrature::{quadrilateral_gauss, QuadratureRule};
use nalgebra::{DMatrix, DVector};

/// Bilinear quadrilateral with four corner nodes, numbered counter-clockwise.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Quad4;

/// Quadratic serendipity quadrilateral.
///
/// Nodes 0-3 are the corners (counter-clockwise), nodes 4-7 the midpoints of the edges
/// 0-1, 1-2, 2-3 and 3-0.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Quad8;

#[rustfmt::skip]
const QUAD_CORNERS: [[f64; 2]; 4] = [
    [-1.0, -1.0],
    [ 1.0, -1.0],
    [ 1.0,  1.0],
    [-1.0,  1.0],
];

#[rustfmt::skip]
const QUAD_EDGE_MIDPOINTS: [[f64; 2]; 4] = [
    [ 0.0, -1.0],
    [ 1.0,  0.0],
    [ 0.0,  1.0],
    [-1.0,  0.0],
];

impl ReferenceElement for Quad4 {
    const DIM: usize = 2;
    const NUM_NODES: usize = 4;
    const NAME: &'static str = "Quad4";

    fn reference_nodes() -> DMatrix<f64> {
        DMatrix::from_fn(4, 2, |i, j| QUAD_CORNERS[i][j])
    }

    fn basis(xi: &[f64]) -> DVector<f64> {
        // N_{alpha, beta}([alpha, beta]) = 1 with alpha, beta = 1 or -1
        let phi = |[alpha, beta]: [f64; 2]| (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) / 4.0;
        DVector::from_iterator(4, QUAD_CORNERS.iter().copied().map(phi))
    }

    #[rustfmt::skip]
    fn gradients(xi: &[f64]) -> DMatrix<f64> {
        let mut g = DMatrix::zeros(2, 4);
        for (mut column, [alpha, beta]) in g.column_iter_mut().zip(QUAD_CORNERS) {
            column[0] = alpha * (1.0 + beta * xi[1]) / 4.0;
            column[1] = beta * (1.0 + alpha * xi[0]) / 4.0;
        }
        g
    }

    fn quadrature() -> QuadratureRule {
        quadrilateral_gauss(2)
    }
}

impl ReferenceElement for Quad8 {
    const DIM: usize = 2;
    const NUM_NODES: usize = 8;
    const NAME: &'static str = "Quad8";

    fn reference_nodes() -> DMatrix<f64> {
        DMatrix::from_fn(8, 2, |i, j| {
            if i < 4 {
                QUAD_CORNERS[i][j]
            } else {
                QUAD_EDGE_MIDPOINTS[i - 4][j]
            }
        })
    }

    #[rustfmt::skip]
    fn basis(xi: &[f64]) -> DVector<f64> {
        let phi_corner = |[alpha, beta]: [f64; 2]|
            0.25 * (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1])
                * (alpha * xi[0] + beta * xi[1] - 1.0);

        // Also valid for corners with alpha = 0 or beta = 0, which is what the edge nodes are
        let phi_edge = |[alpha, beta]: [f64; 2]|
            0.5 * (1.0 - (1.0 - alpha * alpha) * xi[0] * xi[0])
                * (1.0 - (1.0 - beta * beta) * xi[1] * xi[1])
                * (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]);

        let corners = QUAD_CORNERS.iter().copied().map(phi_corner);
        let edges = QUAD_EDGE_MIDPOINTS.iter().copied().map(phi_edge);
        DVector::from_iterator(8, corners.chain(edges))
    }

    #[rustfmt::skip]
    fn gradients(xi: &[f64]) -> DMatrix<f64> {
        let phi_grad_corner = |[alpha, beta]: [f64; 2]| {
            // phi = (1/4) f g with
            //  f = alpha xi_0 + beta xi_1 - 1
            //  g = (1 + alpha xi_0) (1 + beta xi_1)
            let f = alpha * xi[0] + beta * xi[1] - 1.0;
            let g = (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]);
            [
                0.25 * (alpha * g + f * alpha * (1.0 + beta * xi[1])),
                0.25 * (beta * g + f * beta * (1.0 + alpha * xi[0])),
            ]
        };

        let phi_grad_edge = |[alpha, beta]: [f64; 2]| {
            // phi = (1/2) h g with
            //  h = prod_i (1 - (1 - alpha_i^2) xi_i^2)
            //  g = prod_i (1 + alpha_i xi_i)
            let a = 1.0 - (1.0 - alpha * alpha) * xi[0] * xi[0];
            let b = 1.0 - (1.0 - beta * beta) * xi[1] * xi[1];
            let h = a * b;
            let g = (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]);
            let dh_xi0 = -2.0 * (1.0 - alpha * alpha) * xi[0] * b;
            let dh_xi1 = -2.0 * (1.0 - beta * beta) * xi[1] * a;
            [
                0.5 * (dh_xi0 * g + h * alpha * (1.0 + beta * xi[1])),
                0.5 * (dh_xi1 * g + h * beta * (1.0 + alpha * xi[0])),
            ]
        };

        let corners = QUAD_CORNERS.iter().copied().map(phi_grad_corner);
        let edges = QUAD_EDGE_MIDPOINTS.iter().copied().map(phi_grad_edge);
        let mut g = DMatrix::zeros(2, 8);
        for (mut column, grad) in g.column_iter_mut().zip(corners.chain(edges)) {
            column[0] = grad[0];
            column[1] = grad[1];
        }
        g
    }

    fn quadrature() -> QuadratureRule {
        quadrilateral_gauss(3)
    }
}
