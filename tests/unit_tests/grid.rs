use super::data_output_path;
use matrixcompare::assert_scalar_eq;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use unitcell::element::{Hex20, Hex8, Quad4, Quad8, ReferenceElement};
use unitcell::grid::Grid;
use unitcell::util::NUMERICAL_ZERO;
use unitcell::HomogenizationError;

#[test]
fn grid_construction_validates_input() {
    assert!(Grid::<Quad4>::new(&[2, 2], &[1.0, 1.0]).is_ok());
    assert!(matches!(
        Grid::<Quad4>::new(&[2, 2, 2], &[1.0, 1.0]),
        Err(HomogenizationError::InvalidConfiguration(_))
    ));
    assert!(Grid::<Hex8>::new(&[2, 2], &[1.0, 1.0]).is_err());
    assert!(Grid::<Quad4>::new(&[0, 2], &[1.0, 1.0]).is_err());
    assert!(Grid::<Quad4>::new(&[2, 2], &[1.0, -1.0]).is_err());
    assert!(Grid::<Quad4>::new(&[2, 2], &[f64::NAN, 1.0]).is_err());
}

#[test]
fn node_counts() {
    let grid = Grid::<Quad4>::new(&[3, 2], &[1.0, 1.0]).unwrap();
    assert_eq!((grid.num_elements(), grid.num_nodes(), grid.num_periodic_nodes()), (6, 12, 6));

    let grid = Grid::<Quad8>::new(&[3, 2], &[1.0, 1.0]).unwrap();
    assert_eq!((grid.num_elements(), grid.num_nodes(), grid.num_periodic_nodes()), (6, 29, 18));

    let grid = Grid::<Hex8>::new(&[2, 2, 2], &[1.0, 1.0, 1.0]).unwrap();
    assert_eq!((grid.num_elements(), grid.num_nodes(), grid.num_periodic_nodes()), (8, 27, 8));

    let grid = Grid::<Hex20>::new(&[2, 2, 2], &[1.0, 1.0, 1.0]).unwrap();
    assert_eq!((grid.num_elements(), grid.num_nodes(), grid.num_periodic_nodes()), (8, 81, 32));
}

#[test]
fn quad4_connectivity() {
    let grid = Grid::<Quad4>::new(&[2, 2], &[1.0, 1.0]).unwrap();
    assert_eq!(grid.element(0), vec![0, 1, 4, 3]);
    assert_eq!(grid.element(3), vec![4, 5, 8, 7]);
    assert_eq!(grid.periodic_element(0), vec![0, 1, 3, 2]);
    assert_eq!(grid.periodic_element(3), vec![3, 2, 0, 1]);

    assert_eq!(grid.node(4).as_slice(), &[0.5, 0.5]);
    assert_eq!(grid.node(8).as_slice(), &[1.0, 1.0]);
    assert_eq!(grid.nodes().nrows(), 9);
}

#[test]
fn quad8_connectivity() {
    let grid = Grid::<Quad8>::new(&[1, 1], &[2.0, 1.0]).unwrap();
    assert_eq!(grid.element(0), vec![0, 1, 3, 2, 4, 7, 5, 6]);
    assert_eq!(grid.periodic_element(0), vec![0, 0, 0, 0, 1, 2, 1, 2]);
    assert_eq!(grid.node(5).as_slice(), &[1.0, 1.0]);
    assert_eq!(grid.node(7).as_slice(), &[2.0, 0.5]);
}

fn check_consistent_numbering<E: ReferenceElement>(resolution: &[usize]) {
    let size = vec![1.0; E::DIM];
    let grid = Grid::<E>::new(resolution, &size).unwrap();

    let mut global = BTreeSet::new();
    let mut periodic = BTreeSet::new();
    for (nodes, periodic_nodes) in grid.elements().zip(grid.periodic_elements()) {
        assert_eq!(nodes.len(), E::NUM_NODES);
        global.extend(nodes.iter().copied());
        periodic.extend(periodic_nodes.iter().copied());
    }
    // Every node is used, and no index is out of bounds
    assert_eq!(global, (0..grid.num_nodes()).collect());
    assert_eq!(periodic, (0..grid.num_periodic_nodes()).collect());

    // Element nodes coincide with the mapped reference nodes
    for element in 0..grid.num_elements() {
        let nodes = grid.element_nodes(element);
        let centroid = E::map_reference_coords(&vec![0.0; E::DIM], &nodes);
        for (i, reference) in E::reference_nodes().row_iter().enumerate() {
            let xi: Vec<f64> = reference.iter().copied().collect();
            let mapped = E::map_reference_coords(&xi, &nodes);
            assert!((mapped - nodes.row(i).transpose()).norm() < 1e-12);
        }
        assert!(centroid.iter().all(|&x| x > 0.0 && x < 1.0));
    }

    assert_scalar_eq!(grid.measure(), 1.0, comp = abs, tol = 1e-12);
}

#[test]
fn numbering_is_consistent() {
    check_consistent_numbering::<Quad4>(&[3, 2]);
    check_consistent_numbering::<Quad8>(&[2, 3]);
    check_consistent_numbering::<Hex8>(&[2, 3, 2]);
    check_consistent_numbering::<Hex20>(&[2, 1, 3]);
}

#[test]
fn periodic_nodes_share_coordinates_modulo_cell_size() {
    let grid = Grid::<Quad8>::new(&[3, 2], &[1.5, 1.0]).unwrap();
    let size = [1.5, 1.0];
    let mut positions = vec![None; grid.num_periodic_nodes()];
    for (nodes, periodic_nodes) in grid.elements().zip(grid.periodic_elements()) {
        for (&node, &periodic_node) in nodes.iter().zip(&periodic_nodes) {
            let x = grid.node(node);
            let wrapped: Vec<f64> = x.iter().zip(&size).map(|(x, l)| (x % l * 1e9).round()).collect();
            match &positions[periodic_node] {
                None => positions[periodic_node] = Some(wrapped),
                Some(existing) => assert_eq!(existing, &wrapped),
            }
        }
    }
}

#[test]
fn densities_are_validated_and_clamped() {
    let mut grid = Grid::<Quad4>::new(&[2, 2], &[1.0, 1.0]).unwrap();
    assert!(grid.densities().iter().all(|&d| d == NUMERICAL_ZERO));

    grid.set_density(1, 0.5).unwrap();
    assert_eq!(grid.density(1), 0.5);
    grid.set_density(2, 0.0).unwrap();
    assert_eq!(grid.density(2), NUMERICAL_ZERO);
    assert!(grid.set_density(0, 1.5).is_err());
    assert!(grid.set_density(0, -0.1).is_err());
    assert!(grid.set_density(4, 0.5).is_err());

    let before = grid.densities().to_vec();
    assert!(grid.set_densities(&[0.1, 0.2, 2.0, 0.3]).is_err());
    assert_eq!(grid.densities(), before.as_slice());
    assert!(grid.set_densities(&[0.1, 0.2]).is_err());

    grid.set_densities(&[0.1, 0.2, 0.3, 0.4]).unwrap();
    assert_eq!(grid.densities(), &[0.1, 0.2, 0.3, 0.4]);

    grid.set_densities_ones();
    assert!(grid.densities().iter().all(|&d| d == 1.0));
    grid.set_densities_zeros();
    assert!(grid.densities().iter().all(|&d| d == NUMERICAL_ZERO));
    grid.set_densities_constant(0.25).unwrap();
    assert!(grid.densities().iter().all(|&d| d == 0.25));
    assert!(grid.set_densities_constant(1.25).is_err());
}

#[test]
fn random_densities_are_reproducible() {
    let mut a = Grid::<Hex8>::new(&[3, 3, 3], &[1.0, 1.0, 1.0]).unwrap();
    let mut b = a.clone();
    a.set_densities_random(Some(1234));
    b.set_densities_random(Some(1234));
    assert_eq!(a, b);
    assert!(a
        .densities()
        .iter()
        .all(|&d| (NUMERICAL_ZERO..=1.0).contains(&d)));

    b.set_densities_random(Some(4321));
    assert_ne!(a, b);

    b.set_densities_random(None);
    assert!(b
        .densities()
        .iter()
        .all(|&d| (NUMERICAL_ZERO..=1.0).contains(&d)));
}

#[test]
fn densities_from_function_are_element_averages() {
    let mut grid = Grid::<Quad4>::new(&[2, 1], &[2.0, 1.0]).unwrap();
    grid.set_densities_function(|x| if x[0] < 1.0 { 1.0 } else { 0.0 })
        .unwrap();
    assert_eq!(grid.densities(), &[1.0, NUMERICAL_ZERO]);

    // Linear functions are averaged exactly
    grid.set_densities_function(|x| x[0] / 2.0).unwrap();
    assert_scalar_eq!(grid.density(0), 0.25, comp = abs, tol = 1e-14);
    assert_scalar_eq!(grid.density(1), 0.75, comp = abs, tol = 1e-14);

    assert!(grid.set_densities_function(|x| x[0]).is_err());
}

#[test]
fn densities_from_csv() {
    let output_dir = data_output_path("densities_from_csv");
    let valid = output_dir.join("valid.csv");
    let mut file = File::create(&valid).unwrap();
    writeln!(file, "0.1, 0.2, 0.3").unwrap();
    writeln!(file, "0.4, 0.5, 0.6").unwrap();

    let mut grid = Grid::<Quad4>::new(&[3, 2], &[1.0, 1.0]).unwrap();
    grid.set_densities_csv(&valid).unwrap();
    // The first row of the file is the top row of the grid
    assert_eq!(grid.densities(), &[0.4, 0.5, 0.6, 0.1, 0.2, 0.3]);

    let mut wrong_shape = Grid::<Quad4>::new(&[2, 2], &[1.0, 1.0]).unwrap();
    let err = wrong_shape.set_densities_csv(&valid).unwrap_err();
    assert!(err.to_string().contains("number of columns (3)"));

    let non_numeric = output_dir.join("non_numeric.csv");
    let mut file = File::create(&non_numeric).unwrap();
    writeln!(file, "0.1, abc, 0.3").unwrap();
    writeln!(file, "0.4, 0.5, 0.6").unwrap();
    let err = grid.set_densities_csv(&non_numeric).unwrap_err();
    assert!(err.to_string().contains("non-numeric"));

    let err = grid.set_densities_csv("does/not/exist.csv").unwrap_err();
    assert!(matches!(err, HomogenizationError::Io(_)));

    let mut grid_3d = Grid::<Hex8>::new(&[1, 1, 1], &[1.0, 1.0, 1.0]).unwrap();
    assert!(grid_3d.set_densities_csv(&valid).is_err());
}

#[test]
fn translation_is_cyclic() {
    let mut grid = Grid::<Quad4>::new(&[3, 2], &[1.0, 1.0]).unwrap();
    grid.set_densities(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
    grid.translate(&[1, 0]).unwrap();
    assert_eq!(grid.densities(), &[0.3, 0.1, 0.2, 0.6, 0.4, 0.5]);
    grid.translate(&[2, 1]).unwrap();
    assert_eq!(grid.densities(), &[0.4, 0.5, 0.6, 0.1, 0.2, 0.3]);
    assert!(grid.translate(&[1]).is_err());
}

#[test]
fn translation_by_huge_shift_wraps_without_overflow() {
    let mut grid = Grid::<Quad4>::new(&[3, 2], &[1.0, 1.0]).unwrap();
    grid.set_densities(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
    // usize::MAX is 0 mod 3 and 1 mod 2
    grid.translate(&[usize::MAX, usize::MAX]).unwrap();
    assert_eq!(grid.densities(), &[0.4, 0.5, 0.6, 0.1, 0.2, 0.3]);
}

proptest! {
    #[test]
    fn translating_by_the_resolution_is_the_identity(grid in unitcell::proptest::grid::<Hex8>(3)) {
        let mut translated = grid.clone();
        let resolution = grid.resolution().to_vec();
        translated.translate(&resolution).unwrap();
        prop_assert_eq!(translated, grid);
    }
}
