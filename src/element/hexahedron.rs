use crate::element::ReferenceElement;
use crate::quadrature::{hexahedron_gauss, QuadratureRule};
use nalgebra::{DMatrix, DVector};

/// Trilinear hexahedron.
///
/// Nodes 0-3 are the bottom face (`z = -1`, counter-clockwise seen from above), nodes 4-7 the top
/// face in the same order.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Hex8;

/// Quadratic serendipity hexahedron.
///
/// Nodes 0-7 are the corners as for [`Hex8`]. Nodes 8-11 are the midpoints of the bottom edges
/// 0-1, 1-2, 2-3, 3-0, nodes 12-15 the midpoints of the top edges 4-5, 5-6, 6-7, 7-4 and
/// nodes 16-19 the midpoints of the vertical edges 0-4, 1-5, 2-6, 3-7.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Hex20;

#[rustfmt::skip]
const HEX_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [ 1.0, -1.0, -1.0],
    [ 1.0,  1.0, -1.0],
    [-1.0,  1.0, -1.0],
    [-1.0, -1.0,  1.0],
    [ 1.0, -1.0,  1.0],
    [ 1.0,  1.0,  1.0],
    [-1.0,  1.0,  1.0],
];

#[rustfmt::skip]
const HEX_EDGE_MIDPOINTS: [[f64; 3]; 12] = [
    [ 0.0, -1.0, -1.0],
    [ 1.0,  0.0, -1.0],
    [ 0.0,  1.0, -1.0],
    [-1.0,  0.0, -1.0],
    [ 0.0, -1.0,  1.0],
    [ 1.0,  0.0,  1.0],
    [ 0.0,  1.0,  1.0],
    [-1.0,  0.0,  1.0],
    [-1.0, -1.0,  0.0],
    [ 1.0, -1.0,  0.0],
    [ 1.0,  1.0,  0.0],
    [-1.0,  1.0,  0.0],
];

fn gradient_matrix(columns: impl Iterator<Item = [f64; 3]>, num_nodes: usize) -> DMatrix<f64> {
    let mut g = DMatrix::zeros(3, num_nodes);
    for (mut column, grad) in g.column_iter_mut().zip(columns) {
        column[0] = grad[0];
        column[1] = grad[1];
        column[2] = grad[2];
    }
    g
}

impl ReferenceElement for Hex8 {
    const DIM: usize = 3;
    const NUM_NODES: usize = 8;
    const NAME: &'static str = "Hex8";

    fn reference_nodes() -> DMatrix<f64> {
        DMatrix::from_fn(8, 3, |i, j| HEX_CORNERS[i][j])
    }

    #[rustfmt::skip]
    fn basis(xi: &[f64]) -> DVector<f64> {
        let phi = |[alpha, beta, gamma]: [f64; 3]|
            (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2]) / 8.0;
        DVector::from_iterator(8, HEX_CORNERS.iter().copied().map(phi))
    }

    #[rustfmt::skip]
    fn gradients(xi: &[f64]) -> DMatrix<f64> {
        let phi_grad = |[alpha, beta, gamma]: [f64; 3]| [
            alpha * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2]) / 8.0,
            beta * (1.0 + alpha * xi[0]) * (1.0 + gamma * xi[2]) / 8.0,
            gamma * (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) / 8.0,
        ];
        gradient_matrix(HEX_CORNERS.iter().copied().map(phi_grad), 8)
    }

    fn quadrature() -> QuadratureRule {
        hexahedron_gauss(2)
    }
}

impl ReferenceElement for Hex20 {
    const DIM: usize = 3;
    const NUM_NODES: usize = 20;
    const NAME: &'static str = "Hex20";

    fn reference_nodes() -> DMatrix<f64> {
        DMatrix::from_fn(20, 3, |i, j| {
            if i < 8 {
                HEX_CORNERS[i][j]
            } else {
                HEX_EDGE_MIDPOINTS[i - 8][j]
            }
        })
    }

    #[rustfmt::skip]
    fn basis(xi: &[f64]) -> DVector<f64> {
        let phi_corner = |[alpha, beta, gamma]: [f64; 3]|
            (1.0 / 8.0) * (1.0 + alpha * xi[0])
                * (1.0 + beta * xi[1])
                * (1.0 + gamma * xi[2])
                * (alpha * xi[0] + beta * xi[1] + gamma * xi[2] - 2.0);

        let phi_edge = |[alpha, beta, gamma]: [f64; 3]|
            (1.0 / 4.0) * (1.0 - (1.0 - alpha * alpha) * xi[0] * xi[0])
                * (1.0 - (1.0 - beta * beta) * xi[1] * xi[1])
                * (1.0 - (1.0 - gamma * gamma) * xi[2] * xi[2])
                * (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2]);

        let corners = HEX_CORNERS.iter().copied().map(phi_corner);
        let edges = HEX_EDGE_MIDPOINTS.iter().copied().map(phi_edge);
        DVector::from_iterator(20, corners.chain(edges))
    }

    #[rustfmt::skip]
    fn gradients(xi: &[f64]) -> DMatrix<f64> {
        let phi_grad_corner = |[alpha, beta, gamma]: [f64; 3]| {
            // phi = (1/8) f g with
            //  f = sum_i alpha_i xi_i - 2
            //  g = prod_i (1 + alpha_i xi_i)
            let f = alpha * xi[0] + beta * xi[1] + gamma * xi[2] - 2.0;
            let g = (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2]);
            let s = 1.0 / 8.0;
            [
                s * (alpha * g + f * alpha * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2])),
                s * (beta * g + f * beta * (1.0 + alpha * xi[0]) * (1.0 + gamma * xi[2])),
                s * (gamma * g + f * gamma * (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1])),
            ]
        };

        let phi_grad_edge = |[alpha, beta, gamma]: [f64; 3]| {
            // phi = (1/4) h g with
            //  h = prod_i (1 - (1 - alpha_i^2) xi_i^2)
            //  g = prod_i (1 + alpha_i xi_i)
            let a = 1.0 - (1.0 - alpha * alpha) * xi[0] * xi[0];
            let b = 1.0 - (1.0 - beta * beta) * xi[1] * xi[1];
            let c = 1.0 - (1.0 - gamma * gamma) * xi[2] * xi[2];
            let h = a * b * c;
            let g = (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2]);
            let s = 1.0 / 4.0;
            let dh_xi0 = -2.0 * (1.0 - alpha * alpha) * xi[0] * b * c;
            let dh_xi1 = -2.0 * (1.0 - beta * beta) * xi[1] * a * c;
            let dh_xi2 = -2.0 * (1.0 - gamma * gamma) * xi[2] * a * b;
            [
                s * (dh_xi0 * g + h * alpha * (1.0 + beta * xi[1]) * (1.0 + gamma * xi[2])),
                s * (dh_xi1 * g + h * beta * (1.0 + alpha * xi[0]) * (1.0 + gamma * xi[2])),
                s * (dh_xi2 * g + h * gamma * (1.0 + alpha * xi[0]) * (1.0 + beta * xi[1])),
            ]
        };

        let corners = HEX_CORNERS.iter().copied().map(phi_grad_corner);
        let edges = HEX_EDGE_MIDPOINTS.iter().copied().map(phi_grad_edge);
        gradient_matrix(corners.chain(edges), 20)
    }

    fn quadrature() -> QuadratureRule {
        hexahedron_gauss(3)
    }
}
