use nalgebra::DMatrix;
use paste::paste;
use unitcell::element::{Hex20, Hex8, Quad4, Quad8, ReferenceElement};
use unitcell::error::InvalidGeometry;
use unitcell::grid::Grid;
use unitcell::kernel::{
    linear_elastic_kernel, linear_piezoelectric_kernel, linear_scalar_diffusive_kernel, strain_displacement_matrix,
    GradientConvention, ReferenceOperator,
};
use unitcell::material::{
    voigt_shear_pairs, voigt_size, LinearElasticMaterial, LinearPiezoelectricMaterial, LinearTransportMaterial,
};
use unitcell::util::{is_psd, is_symmetric};
use unitcell::HomogenizationError;
use util::{assert_approx_matrix_eq, assert_relative_matrix_eq, dense_matrix, spd_matrix};

/// Nodes of the first element of a grid with a non-square cell.
fn element_nodes<E: ReferenceElement>() -> DMatrix<f64> {
    let size = [2.0, 1.0, 0.5];
    let resolution = vec![2; E::DIM];
    Grid::<E>::new(&resolution, &size[..E::DIM])
        .unwrap()
        .element_nodes(0)
}

fn element_measure<E: ReferenceElement>() -> f64 {
    E::measure(&element_nodes::<E>())
}

/// Unit macroscopic strains evaluated at the element nodes, interleaved per node.
fn local_macro_displacements(nodes: &DMatrix<f64>) -> DMatrix<f64> {
    let (num_nodes, dim) = nodes.shape();
    let pairs = voigt_shear_pairs(dim);
    let mut field = DMatrix::zeros(dim * num_nodes, voigt_size(dim));
    for node in 0..num_nodes {
        for axis in 0..dim {
            field[(dim * node + axis, axis)] = nodes[(node, axis)];
        }
        for (column, &(a, b)) in pairs.iter().enumerate() {
            field[(dim * node + a, dim + column)] = 0.5 * nodes[(node, b)];
            field[(dim * node + b, dim + column)] = 0.5 * nodes[(node, a)];
        }
    }
    field
}

fn local_macro_potentials(nodes: &DMatrix<f64>, sign: f64) -> DMatrix<f64> {
    sign * nodes
}

/// The source must be the load produced by the macroscopic field, and the energy of the
/// macroscopic field must reproduce the material tensor.
fn check_macroscopic_consistency(operator: &ReferenceOperator, local_macro: &DMatrix<f64>, tensor: &DMatrix<f64>, measure: f64) {
    let k = &operator.stiffness;
    assert_relative_matrix_eq!(&operator.source, -(k * local_macro), reltol = 1e-10);
    let energy = local_macro.transpose() * k * local_macro;
    assert_relative_matrix_eq!(&energy, tensor * measure, reltol = 1e-10);
}

fn check_elastic_kernel<E: ReferenceElement>() {
    let nodes = element_nodes::<E>();
    let c = spd_matrix(voigt_size(E::DIM), 11);
    let material = LinearElasticMaterial::from_tensor(c.clone()).unwrap();
    let operator = linear_elastic_kernel::<E>(&material, &nodes).unwrap();

    let num_dofs = E::DIM * E::NUM_NODES;
    assert_eq!(operator.stiffness.shape(), (num_dofs, num_dofs));
    assert_eq!(operator.source.shape(), (num_dofs, voigt_size(E::DIM)));
    assert!(is_symmetric(&operator.stiffness));
    assert!(is_psd(&operator.stiffness));

    // Rigid translations and infinitesimal rotations carry no energy and no load
    let mut rigid_modes = Vec::new();
    for axis in 0..E::DIM {
        rigid_modes.push(DMatrix::from_fn(num_dofs, 1, |i, _| if i % E::DIM == axis { 1.0 } else { 0.0 }));
    }
    for &(a, b) in voigt_shear_pairs(E::DIM) {
        let mut rotation = DMatrix::zeros(num_dofs, 1);
        for node in 0..E::NUM_NODES {
            rotation[E::DIM * node + a] = -nodes[(node, b)];
            rotation[E::DIM * node + b] = nodes[(node, a)];
        }
        rigid_modes.push(rotation);
    }
    for mode in &rigid_modes {
        assert_approx_matrix_eq!(&operator.stiffness * mode, DMatrix::<f64>::zeros(num_dofs, 1), abstol = 1e-10);
        assert_approx_matrix_eq!(mode.transpose() * &operator.source, DMatrix::<f64>::zeros(1, c.ncols()), abstol = 1e-10);
    }

    check_macroscopic_consistency(&operator, &local_macro_displacements(&nodes), &c, element_measure::<E>());
}

fn check_diffusive_kernel<E: ReferenceElement>() {
    let nodes = element_nodes::<E>();
    let a = spd_matrix(E::DIM, 12);
    let material = LinearTransportMaterial::from_tensor(a.clone()).unwrap();

    for convention in [GradientConvention::Negative, GradientConvention::Positive] {
        let operator = linear_scalar_diffusive_kernel::<E>(&material, convention, &nodes).unwrap();
        assert_eq!(operator.stiffness.shape(), (E::NUM_NODES, E::NUM_NODES));
        assert_eq!(operator.source.shape(), (E::NUM_NODES, E::DIM));
        assert!(is_psd(&operator.stiffness));

        let constant = DMatrix::from_element(E::NUM_NODES, 1, 1.0);
        assert_approx_matrix_eq!(&operator.stiffness * &constant, DMatrix::<f64>::zeros(E::NUM_NODES, 1), abstol = 1e-10);
        assert_approx_matrix_eq!(constant.transpose() * &operator.source, DMatrix::<f64>::zeros(1, E::DIM), abstol = 1e-10);

        let local_macro = local_macro_potentials(&nodes, convention.sign());
        check_macroscopic_consistency(&operator, &local_macro, &a, element_measure::<E>());
    }
}

fn piezoelectric_material(dim: usize) -> LinearPiezoelectricMaterial {
    let v = voigt_size(dim);
    let elastic = LinearElasticMaterial::from_tensor(spd_matrix(v, 13) * 10.0).unwrap();
    let dielectric = LinearTransportMaterial::from_tensor(spd_matrix(dim, 14)).unwrap();
    LinearPiezoelectricMaterial::new(elastic, dielectric, dense_matrix(dim, v, 15) * 0.5).unwrap()
}

fn check_piezoelectric_kernel<E: ReferenceElement>() {
    let nodes = element_nodes::<E>();
    let material = piezoelectric_material(E::DIM);
    let operator = linear_piezoelectric_kernel::<E>(&material, &nodes).unwrap();

    let num_dofs = (E::DIM + 1) * E::NUM_NODES;
    let v = voigt_size(E::DIM);
    assert_eq!(operator.stiffness.shape(), (num_dofs, num_dofs));
    assert_eq!(operator.source.shape(), (num_dofs, v + E::DIM));
    assert!(is_symmetric(&operator.stiffness));
    assert!(!is_psd(&operator.stiffness));

    let displacements = local_macro_displacements(&nodes);
    let potentials = local_macro_potentials(&nodes, GradientConvention::Negative.sign());
    let mut local_macro = DMatrix::zeros(num_dofs, v + E::DIM);
    local_macro
        .view_mut((0, 0), displacements.shape())
        .copy_from(&displacements);
    local_macro
        .view_mut(displacements.shape(), potentials.shape())
        .copy_from(&potentials);

    check_macroscopic_consistency(&operator, &local_macro, material.material_tensor(), element_measure::<E>());
}

macro_rules! kernel_tests {
    ($($element:ident),*) => {
        paste! {
            $(
                #[test]
                fn [<$element:snake _elastic_kernel>]() {
                    check_elastic_kernel::<$element>();
                }

                #[test]
                fn [<$element:snake _diffusive_kernel>]() {
                    check_diffusive_kernel::<$element>();
                }

                #[test]
                fn [<$element:snake _piezoelectric_kernel>]() {
                    check_piezoelectric_kernel::<$element>();
                }
            )*
        }
    };
}

kernel_tests!(Quad4, Quad8, Hex8, Hex20);

#[test]
fn strain_displacement_matrix_layout() {
    // Gradients of two nodes in 3D
    let dn_x = DMatrix::from_row_slice(3, 2, &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    let b = strain_displacement_matrix(&dn_x);
    assert_eq!(b.shape(), (6, 6));
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(6, 6, &[
        1.0, 0.0, 0.0, 4.0, 0.0, 0.0,
        0.0, 2.0, 0.0, 0.0, 5.0, 0.0,
        0.0, 0.0, 3.0, 0.0, 0.0, 6.0,
        2.0, 1.0, 0.0, 5.0, 4.0, 0.0,
        3.0, 0.0, 1.0, 6.0, 0.0, 4.0,
        0.0, 3.0, 2.0, 0.0, 6.0, 5.0,
    ]);
    assert_eq!(b, expected);
}

#[test]
fn kernels_reject_invalid_elements() {
    let material = LinearElasticMaterial::from_tensor(spd_matrix(3, 1)).unwrap();

    let collapsed = DMatrix::zeros(4, 2);
    assert!(matches!(
        linear_elastic_kernel::<Quad4>(&material, &collapsed),
        Err(HomogenizationError::InvalidInput(InvalidGeometry::Degenerate))
    ));

    let mut mirrored = Quad4::reference_nodes();
    mirrored.column_mut(1).neg_mut();
    let err = linear_elastic_kernel::<Quad4>(&material, &mirrored).unwrap_err();
    assert!(matches!(err, HomogenizationError::InvalidInput(InvalidGeometry::Inverted)));
    assert_eq!(err.to_string(), "Element Jacobian determinant is negative. The element is inverted.");

    // Wrong node matrix shape and material dimension
    assert!(matches!(
        linear_elastic_kernel::<Quad8>(&material, &Quad4::reference_nodes()),
        Err(HomogenizationError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        linear_elastic_kernel::<Hex8>(&material, &Hex8::reference_nodes()),
        Err(HomogenizationError::InvalidConfiguration(_))
    ));
}
