use super::small_cell;
use nalgebra::{DMatrix, DVector};
use paste::paste;
use unitcell::element::{Hex20, Hex8, Quad4, Quad8, ReferenceElement};
use unitcell::error::ConvergenceFailureReason;
use unitcell::grid::Grid;
use unitcell::material::{LinearElasticMaterial, PlaneCondition, YoungPoisson};
use unitcell::solver::{FieldSave, LinearElasticSolver, SolverOptions};
use unitcell::util::{is_pd, is_symmetric, NUMERICAL_ZERO};
use unitcell::HomogenizationError;
use util::{assert_approx_matrix_eq, assert_relative_matrix_eq, spd_matrix};

fn plane_stress() -> LinearElasticMaterial {
    let parameters = YoungPoisson {
        young: 10.0,
        poisson: 0.3,
    };
    LinearElasticMaterial::isotropic_2d(parameters, PlaneCondition::PlaneStress).unwrap()
}

fn options() -> SolverOptions {
    SolverOptions::default().with_tolerance(1e-10)
}

fn homogenize_2d<E: ReferenceElement>(grid: &Grid<E>, material: &LinearElasticMaterial) -> DMatrix<f64> {
    LinearElasticSolver::<E, 2>::new(grid, material.clone())
        .unwrap()
        .solve(&options())
        .unwrap()
        .c_bar
}

#[test]
fn uniform_density_recovers_material_tensor() {
    let material = LinearElasticMaterial::from_tensor(spd_matrix(3, 11)).unwrap();
    let mut grid = small_cell::<Quad4>(&[2, 2]);
    grid.set_densities_ones();
    let c_bar = homogenize_2d(&grid, &material);
    assert_relative_matrix_eq!(&c_bar, material.material_tensor(), reltol = 1e-8);

    let mut grid = small_cell::<Quad8>(&[2, 3]);
    grid.set_densities_constant(0.25).unwrap();
    let c_bar = homogenize_2d(&grid, &material);
    assert_relative_matrix_eq!(&c_bar, &(0.25 * material.material_tensor()), reltol = 1e-8);
}

#[test]
fn uniform_density_recovers_material_tensor_3d() {
    let material = LinearElasticMaterial::isotropic_3d(YoungPoisson {
        young: 2.0,
        poisson: 0.25,
    })
    .unwrap();
    let mut grid = small_cell::<Hex8>(&[2, 2, 2]);
    grid.set_densities_ones();
    let c_bar = LinearElasticSolver::<Hex8, 3>::new(&grid, material.clone())
        .unwrap()
        .solve(&options())
        .unwrap()
        .c_bar;
    assert_relative_matrix_eq!(&c_bar, material.material_tensor(), reltol = 1e-8);
}

#[test]
fn void_cell_has_vanishing_stiffness() {
    let material = plane_stress();
    let mut grid = small_cell::<Quad4>(&[2, 2]);
    grid.set_densities_zeros();
    let c_bar = homogenize_2d(&grid, &material);
    let expected = NUMERICAL_ZERO * material.material_tensor();
    assert_approx_matrix_eq!(&c_bar, &expected, abstol = 10.0 * NUMERICAL_ZERO);
}

#[test]
fn seeded_cell_is_bounded_by_voigt_and_reuss() {
    let material = LinearElasticMaterial::from_tensor(spd_matrix(3, 3)).unwrap();
    let mut grid = small_cell::<Quad4>(&[2, 2]);
    grid.set_densities_random(Some(1234));
    let c_bar = LinearElasticSolver::<Quad4, 2>::new(&grid, material.clone())
        .unwrap()
        .solve(&SolverOptions::default())
        .unwrap()
        .c_bar;

    assert!(is_symmetric(&c_bar));
    assert!(is_pd(&c_bar));
    let upper = material.voigt(&grid).trace();
    let lower = material.reuss(&grid).unwrap().trace();
    assert!(lower < c_bar.trace(), "{} >= {}", lower, c_bar.trace());
    assert!(c_bar.trace() < upper, "{} >= {}", c_bar.trace(), upper);
}

#[test]
fn random_cells_are_bounded_by_voigt_and_reuss() {
    let material = plane_stress();
    for seed in 0..4 {
        let mut grid = small_cell::<Quad8>(&[3, 3]);
        grid.set_densities_random(Some(seed));
        let c_bar = homogenize_2d(&grid, &material);
        assert!(is_pd(&c_bar));
        assert!(material.reuss(&grid).unwrap().trace() <= c_bar.trace() + 1e-8);
        assert!(c_bar.trace() <= material.voigt(&grid).trace() + 1e-8);
    }
}

#[test]
fn homogenized_stiffness_is_invariant_under_translation() {
    let material = plane_stress();
    let mut grid = small_cell::<Quad4>(&[4, 3]);
    grid.set_densities_random(Some(5));
    let c_bar = homogenize_2d(&grid, &material);

    grid.translate(&[1, 2]).unwrap();
    let translated = homogenize_2d(&grid, &material);
    assert_relative_matrix_eq!(&translated, &c_bar, reltol = 1e-6);
}

fn check_iteration_cap_is_reported_as_no_convergence<E: ReferenceElement, const D: usize>() {
    let material = LinearElasticMaterial::from_tensor(spd_matrix(D * (D + 1) / 2, 3)).unwrap();
    let mut grid = small_cell::<E>(&[2; D]);
    grid.set_densities_random(Some(1234));
    let solver = LinearElasticSolver::<E, D>::new(&grid, material).unwrap();
    let err = solver
        .solve(&SolverOptions::default().with_max_iterations(1))
        .unwrap_err();
    assert!(matches!(
        err,
        HomogenizationError::ConvergenceFailure {
            reason: ConvergenceFailureReason::NoConvergence,
            iterations: 1,
            ..
        }
    ));
}

macro_rules! iteration_cap_tests {
    ($($element:ident => $dim:literal),*) => {
        paste! {
            $(
                #[test]
                fn [<$element:snake _iteration_cap_is_reported_as_no_convergence>]() {
                    check_iteration_cap_is_reported_as_no_convergence::<$element, $dim>();
                }
            )*
        }
    };
}

iteration_cap_tests!(Quad4 => 2, Quad8 => 2, Hex8 => 3, Hex20 => 3);

#[test]
fn invalid_options_are_rejected() {
    let grid = small_cell::<Quad4>(&[2, 2]);
    let solver = LinearElasticSolver::<Quad4, 2>::new(&grid, plane_stress()).unwrap();
    for options in [
        SolverOptions::default().with_max_iterations(0),
        SolverOptions::default().with_tolerance(0.0),
        SolverOptions::default().with_tolerance(f64::NAN),
    ] {
        assert!(matches!(
            solver.solve(&options),
            Err(HomogenizationError::InvalidConfiguration(_))
        ));
    }
}

#[test]
fn dimension_mismatch_is_rejected() {
    let grid = small_cell::<Quad4>(&[2, 2]);
    let material_3d = LinearElasticMaterial::isotropic_3d(YoungPoisson {
        young: 1.0,
        poisson: 0.3,
    })
    .unwrap();
    assert!(matches!(
        LinearElasticSolver::<Quad4, 2>::new(&grid, material_3d.clone()),
        Err(HomogenizationError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        LinearElasticSolver::<Quad4, 3>::new(&grid, material_3d),
        Err(HomogenizationError::InvalidConfiguration(_))
    ));
}

#[test]
fn requested_fields_are_returned() {
    let mut grid = small_cell::<Quad4>(&[2, 2]);
    grid.set_densities_random(Some(9));
    let solver = LinearElasticSolver::<Quad4, 2>::new(&grid, plane_stress()).unwrap();

    let results = solver.solve(&options()).unwrap();
    assert!(results.u.is_empty() && results.u_macro.is_empty() && results.u_micro.is_empty());

    let results = solver
        .solve(&options().with_fields(FieldSave::TOTAL | FieldSave::MICRO))
        .unwrap();
    assert_eq!(results.u.len(), 3);
    assert!(results.u_macro.is_empty());
    assert_eq!(results.u_micro.len(), 3);

    let all = solver.solve(&options().with_fields(FieldSave::ALL)).unwrap();
    assert_eq!(all.c_bar, results.c_bar);
    for ((u, u_macro), u_micro) in all.u.iter().zip(&all.u_macro).zip(&all.u_micro) {
        assert_eq!(u.shape(), (grid.num_nodes(), 2));
        assert_approx_matrix_eq!(u, u_macro + u_micro, abstol = 1e-14);
    }
}

#[test]
fn fields_follow_macroscopic_strain_and_periodicity() {
    let mut grid = small_cell::<Quad4>(&[2, 2]);
    grid.set_densities_random(Some(17));
    let solver = LinearElasticSolver::<Quad4, 2>::new(&grid, plane_stress()).unwrap();
    let results = solver.solve(&options().with_fields(FieldSave::ALL)).unwrap();

    // Shear loading at the corner node (0.5, 0.5)
    let shear = &results.u_macro[2];
    assert_approx_matrix_eq!(shear.row(8).transpose(), DVector::from_vec(vec![0.25, 0.25]), abstol = 1e-14);

    // Corner nodes share a periodic node, whose displacement dofs are fixed
    for u_micro in &results.u_micro {
        for corner in [0, 2, 6, 8] {
            assert!(u_micro.row(corner).amax() <= NUMERICAL_ZERO);
        }
        assert_approx_matrix_eq!(u_micro.row(1), u_micro.row(7), abstol = 1e-14);
        assert_approx_matrix_eq!(u_micro.row(3), u_micro.row(5), abstol = 1e-14);
    }
}
