use matrixcompare::assert_scalar_eq;
use nalgebra::{DMatrix, DVector};
use paste::paste;
use unitcell::element::{Hex20, Hex8, Quad4, Quad8, ReferenceElement};
use unitcell::error::InvalidGeometry;
use util::assert_approx_matrix_eq;

/// A few points inside the reference domain, including the quadrature points.
fn sample_points<E: ReferenceElement>() -> Vec<Vec<f64>> {
    let mut points: Vec<Vec<f64>> = vec![vec![0.0; E::DIM], [0.3, -0.7, 0.2][..E::DIM].to_vec()];
    points.extend(E::quadrature().iter().map(|(_, xi)| xi.to_vec()));
    points
}

/// Nodes of the reference element under the affine map `x = A xi + b`.
fn affine_nodes<E: ReferenceElement>() -> (DMatrix<f64>, DMatrix<f64>) {
    let a = match E::DIM {
        2 => DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.0, 1.5]),
        _ => DMatrix::from_row_slice(3, 3, &[2.0, 0.5, 0.0, 0.0, 1.5, 0.25, 0.1, 0.0, 0.5]),
    };
    let b = DVector::from_fn(E::DIM, |i, _| 1.0 + i as f64);
    let mut nodes = E::reference_nodes() * a.transpose();
    for mut row in nodes.row_iter_mut() {
        row += b.transpose();
    }
    (nodes, a)
}

fn check_basis_is_nodal<E: ReferenceElement>() {
    let nodes = E::reference_nodes();
    assert_eq!(nodes.shape(), (E::NUM_NODES, E::DIM));
    for (i, node) in nodes.row_iter().enumerate() {
        let xi: Vec<f64> = node.iter().copied().collect();
        let expected = DVector::from_fn(E::NUM_NODES, |j, _| if i == j { 1.0 } else { 0.0 });
        assert_approx_matrix_eq!(E::basis(&xi), &expected, abstol = 1e-14);
    }
}

fn check_partition_of_unity<E: ReferenceElement>() {
    for xi in sample_points::<E>() {
        assert_scalar_eq!(E::basis(&xi).sum(), 1.0, comp = abs, tol = 1e-14);
        let gradient_sums = E::gradients(&xi).column_sum();
        assert_approx_matrix_eq!(&gradient_sums, DVector::<f64>::zeros(E::DIM), abstol = 1e-14);
    }
}

fn check_gradients_match_finite_differences<E: ReferenceElement>() {
    let h = 1e-6;
    for xi in sample_points::<E>() {
        let gradients = E::gradients(&xi);
        for axis in 0..E::DIM {
            let mut forward = xi.clone();
            let mut backward = xi.clone();
            forward[axis] += h;
            backward[axis] -= h;
            let approx = (E::basis(&forward) - E::basis(&backward)) / (2.0 * h);
            let exact = gradients.row(axis).transpose();
            assert_approx_matrix_eq!(&exact, &approx, abstol = 1e-8);
        }
    }
}

fn check_affine_geometry<E: ReferenceElement>() {
    let (nodes, a) = affine_nodes::<E>();
    let expected_measure = a.determinant() * 2f64.powi(E::DIM as i32);
    assert_scalar_eq!(E::measure(&nodes), expected_measure, comp = abs, tol = 1e-12);

    for xi in sample_points::<E>() {
        let x = E::map_reference_coords(&xi, &nodes);
        let expected = &a * DVector::from_column_slice(&xi) + DVector::from_fn(E::DIM, |i, _| 1.0 + i as f64);
        assert_approx_matrix_eq!(&x, &expected, abstol = 1e-12);

        // The physical gradients of the coordinate functions form the identity
        let (dn_x, det_j) = E::physical_gradients(&xi, &nodes).unwrap();
        assert_scalar_eq!(det_j, a.determinant(), comp = abs, tol = 1e-12);
        assert_approx_matrix_eq!(&dn_x * &nodes, DMatrix::<f64>::identity(E::DIM, E::DIM), abstol = 1e-12);
    }
}

fn check_invalid_geometry<E: ReferenceElement>() {
    let xi = vec![0.0; E::DIM];

    let mut mirrored = E::reference_nodes();
    mirrored.column_mut(0).neg_mut();
    assert_eq!(
        E::physical_gradients(&xi, &mirrored).unwrap_err(),
        InvalidGeometry::Inverted
    );

    let collapsed = DMatrix::zeros(E::NUM_NODES, E::DIM);
    assert_eq!(
        E::physical_gradients(&xi, &collapsed).unwrap_err(),
        InvalidGeometry::Degenerate
    );
}

macro_rules! element_tests {
    ($($element:ident),*) => {
        paste! {
            $(
                #[test]
                fn [<$element:snake _basis_is_nodal>]() {
                    check_basis_is_nodal::<$element>();
                }

                #[test]
                fn [<$element:snake _partition_of_unity>]() {
                    check_partition_of_unity::<$element>();
                }

                #[test]
                fn [<$element:snake _gradients_match_finite_differences>]() {
                    check_gradients_match_finite_differences::<$element>();
                }

                #[test]
                fn [<$element:snake _affine_geometry>]() {
                    check_affine_geometry::<$element>();
                }

                #[test]
                fn [<$element:snake _rejects_invalid_geometry>]() {
                    check_invalid_geometry::<$element>();
                }
            )*
        }
    };
}

element_tests!(Quad4, Quad8, Hex8, Hex20);

#[test]
fn element_constants() {
    assert_eq!((Quad4::DIM, Quad4::NUM_NODES), (2, 4));
    assert_eq!((Quad8::DIM, Quad8::NUM_NODES), (2, 8));
    assert_eq!((Hex8::DIM, Hex8::NUM_NODES), (3, 8));
    assert_eq!((Hex20::DIM, Hex20::NUM_NODES), (3, 20));
    assert_eq!(Quad4::quadrature().len(), 4);
    assert_eq!(Quad8::quadrature().len(), 9);
    assert_eq!(Hex8::quadrature().len(), 8);
    assert_eq!(Hex20::quadrature().len(), 27);
}

#[test]
fn hex20_edge_nodes_follow_vtk_ordering() {
    let nodes = Hex20::reference_nodes();
    let node = |i: usize| nodes.row(i).iter().copied().collect::<Vec<_>>();
    // Midpoints of the bottom edge 0-1, the top edge 4-5 and the vertical edge 0-4
    assert_eq!(node(8), vec![0.0, -1.0, -1.0]);
    assert_eq!(node(12), vec![0.0, -1.0, 1.0]);
    assert_eq!(node(16), vec![-1.0, -1.0, 0.0]);
}
