//! Structured grids of congruent elements covering a rectangular or box-shaped unit cell.
//!
//! Besides the usual global node numbering, every grid provides a *periodic* numbering in which
//! nodes on opposite faces of the cell are identified. Elements are numbered with the x index
//! varying fastest, and the origin of the cell is at its lower-left (-back) corner.
use crate::element::ReferenceElement;
use crate::error::{HomogenizationError, Result};
use crate::util::NUMERICAL_ZERO;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;
use std::path::Path;

mod lattice;

use lattice::NodeLattice;

/// A structured grid with one material density per element.
///
/// Densities live in `[NUMERICAL_ZERO, 1]`. Values are validated against `[0, 1]` and then
/// clamped from below, so that no element is completely void.
#[derive(Debug, Clone)]
pub struct Grid<E> {
    lattice: NodeLattice,
    size: Vec<f64>,
    densities: Vec<f64>,
    element: PhantomData<E>,
}

impl<E> PartialEq for Grid<E> {
    fn eq(&self, other: &Self) -> bool {
        self.lattice.resolution() == other.lattice.resolution()
            && self.size == other.size
            && self.densities == other.densities
    }
}

fn check_density(density: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&density) {
        Ok(density.max(NUMERICAL_ZERO))
    } else {
        Err(HomogenizationError::invalid_configuration(format!(
            "Density ({}) is out of range [0,1].",
            density
        )))
    }
}

impl<E: ReferenceElement> Grid<E> {
    /// Creates a grid with `resolution[a]` elements along axis `a` and side lengths `size`.
    ///
    /// All densities are initialized to zero (that is, clamped to `NUMERICAL_ZERO`).
    pub fn new(resolution: &[usize], size: &[f64]) -> Result<Self> {
        if resolution.len() != E::DIM || size.len() != E::DIM {
            return Err(HomogenizationError::invalid_configuration(format!(
                "{} grid requires {} resolution and size entries, got {} and {}.",
                E::NAME,
                E::DIM,
                resolution.len(),
                size.len()
            )));
        }
        if resolution.iter().any(|&n| n == 0) {
            return Err(HomogenizationError::invalid_configuration(
                "Grid resolution must be positive in every direction.",
            ));
        }
        if size.iter().any(|&l| l <= 0.0 || !l.is_finite()) {
            return Err(HomogenizationError::invalid_configuration(
                "Grid size must be positive and finite in every direction.",
            ));
        }

        let lattice = NodeLattice::from_reference_nodes(&E::reference_nodes(), resolution);
        let num_elements = lattice.num_cells();
        Ok(Self {
            lattice,
            size: size.to_vec(),
            densities: vec![NUMERICAL_ZERO; num_elements],
            element: PhantomData,
        })
    }

    pub fn dim(&self) -> usize {
        E::DIM
    }

    pub fn resolution(&self) -> &[usize] {
        self.lattice.resolution()
    }

    pub fn size(&self) -> &[f64] {
        &self.size
    }

    pub fn num_elements(&self) -> usize {
        self.lattice.num_cells()
    }

    pub fn num_nodes(&self) -> usize {
        self.lattice.num_nodes()
    }

    pub fn num_periodic_nodes(&self) -> usize {
        self.lattice.num_periodic_nodes()
    }

    /// Coordinates of the global node with the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.num_nodes()`.
    pub fn node(&self, index: usize) -> DVector<f64> {
        let mut x = DVector::zeros(E::DIM);
        self.lattice
            .populate_node_coordinates(index, &self.size, x.as_mut_slice());
        x
    }

    /// All node coordinates, one node per row.
    pub fn nodes(&self) -> DMatrix<f64> {
        let mut nodes = DMatrix::zeros(self.num_nodes(), E::DIM);
        for i in 0..self.num_nodes() {
            nodes.row_mut(i).tr_copy_from(&self.node(i));
        }
        nodes
    }

    fn check_element_index(&self, index: usize) {
        assert!(
            index < self.num_elements(),
            "Index ({}) is out of range [0,{}).",
            index,
            self.num_elements()
        );
    }

    /// Writes the global node indices of an element to `output`.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds, or if `output.len() != E::NUM_NODES`.
    pub fn populate_element(&self, index: usize, output: &mut [usize]) {
        self.check_element_index(index);
        self.lattice.populate_cell_nodes(index, output);
    }

    /// Writes the periodic node indices of an element to `output`.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds, or if `output.len() != E::NUM_NODES`.
    pub fn populate_periodic_element(&self, index: usize, output: &mut [usize]) {
        self.check_element_index(index);
        self.lattice.populate_periodic_cell_nodes(index, output);
    }

    /// Global node indices of an element.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds.
    pub fn element(&self, index: usize) -> Vec<usize> {
        let mut nodes = vec![0; E::NUM_NODES];
        self.populate_element(index, &mut nodes);
        nodes
    }

    /// Periodic node indices of an element.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds.
    pub fn periodic_element(&self, index: usize) -> Vec<usize> {
        let mut nodes = vec![0; E::NUM_NODES];
        self.populate_periodic_element(index, &mut nodes);
        nodes
    }

    pub fn elements(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.num_elements()).map(move |i| self.element(i))
    }

    pub fn periodic_elements(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        (0..self.num_elements()).map(move |i| self.periodic_element(i))
    }

    /// Node coordinates of an element, one node per row.
    ///
    /// # Panics
    ///
    /// Panics if the element index is out of bounds.
    pub fn element_nodes(&self, index: usize) -> DMatrix<f64> {
        let mut nodes = DMatrix::zeros(E::NUM_NODES, E::DIM);
        for (i, node) in self.element(index).into_iter().enumerate() {
            nodes.row_mut(i).tr_copy_from(&self.node(node));
        }
        nodes
    }

    /// Total area (2D) or volume (3D) of the grid.
    pub fn measure(&self) -> f64 {
        E::measure(&self.element_nodes(0)) * self.num_elements() as f64
    }

    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    /// # Panics
    ///
    /// Panics if the element index is out of bounds.
    pub fn density(&self, index: usize) -> f64 {
        self.check_element_index(index);
        self.densities[index]
    }

    pub fn set_density(&mut self, index: usize, density: f64) -> Result<()> {
        if index >= self.num_elements() {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Index ({}) is out of range [0,{}).",
                index,
                self.num_elements()
            )));
        }
        self.densities[index] = check_density(density)?;
        Ok(())
    }

    /// Replaces all densities. The grid is left untouched if any value is rejected.
    pub fn set_densities(&mut self, densities: &[f64]) -> Result<()> {
        if densities.len() != self.num_elements() {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Densities size ({}) must equal number of grid elements ({}).",
                densities.len(),
                self.num_elements()
            )));
        }
        let checked = densities
            .iter()
            .map(|&d| check_density(d))
            .collect::<Result<Vec<_>>>()?;
        self.densities = checked;
        Ok(())
    }

    pub fn set_densities_constant(&mut self, density: f64) -> Result<()> {
        let density = check_density(density)?;
        self.densities.fill(density);
        Ok(())
    }

    pub fn set_densities_zeros(&mut self) {
        self.densities.fill(NUMERICAL_ZERO);
    }

    pub fn set_densities_ones(&mut self) {
        self.densities.fill(1.0);
    }

    /// Draws densities uniformly from `[NUMERICAL_ZERO, 1]`.
    ///
    /// With a seed, the densities are reproducible. Without one, the generator is seeded from
    /// system entropy.
    pub fn set_densities_random(&mut self, seed: Option<u64>) {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        for density in &mut self.densities {
            *density = rng.gen_range(NUMERICAL_ZERO..=1.0);
        }
    }

    /// Sets each density to the element average of `f`, computed by quadrature.
    ///
    /// `f` is evaluated at physical coordinates and must take values in `[0, 1]`.
    pub fn set_densities_function(&mut self, f: impl Fn(&[f64]) -> f64) -> Result<()> {
        let quadrature = E::quadrature();
        let mut densities = Vec::with_capacity(self.num_elements());
        for index in 0..self.num_elements() {
            let nodes = self.element_nodes(index);
            let mut integral = 0.0;
            for (w, xi) in quadrature.iter() {
                let x = E::map_reference_coords(xi, &nodes);
                let value = f(x.as_slice());
                if !(0.0..=1.0).contains(&value) {
                    return Err(HomogenizationError::invalid_configuration(format!(
                        "Function value ({}) is outside range [0,1].",
                        value
                    )));
                }
                integral += w * value * E::jacobian(xi, &nodes).determinant().abs();
            }
            densities.push(integral / E::measure(&nodes));
        }
        self.set_densities(&densities)
    }

    /// Reads densities from a CSV file with one row of values per grid row.
    ///
    /// Only supported for 2D grids. The first row of the file is the top row of the grid, i.e.
    /// the file reads like an image of the cell with the origin at the bottom-left.
    pub fn set_densities_csv(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if E::DIM != 2 {
            return Err(HomogenizationError::invalid_configuration(
                "Reading densities from CSV is only supported for 2D grids.",
            ));
        }
        let content = std::fs::read_to_string(path)?;
        let (nx, ny) = (self.resolution()[0], self.resolution()[1]);
        let display = path.display();

        let mut rows = Vec::with_capacity(ny);
        for line in content.lines() {
            let mut row = Vec::with_capacity(nx);
            for cell in line.split(',').map(str::trim).filter(|cell| !cell.is_empty()) {
                let value: f64 = cell.parse().map_err(|_| {
                    HomogenizationError::invalid_configuration(format!("File {} contains non-numeric data.", display))
                })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(HomogenizationError::invalid_configuration(format!(
                        "File {} contains data outside the range [0,1].",
                        display
                    )));
                }
                row.push(value);
            }
            if row.is_empty() {
                continue;
            }
            if row.len() != nx {
                return Err(HomogenizationError::invalid_configuration(format!(
                    "File {} number of columns ({}) does not equal grid x-resolution ({}).",
                    display,
                    row.len(),
                    nx
                )));
            }
            rows.push(row);
        }
        if rows.len() != ny {
            return Err(HomogenizationError::invalid_configuration(format!(
                "File {} number of rows ({}) does not equal grid y-resolution ({}).",
                display,
                rows.len(),
                ny
            )));
        }

        let mut densities = vec![0.0; nx * ny];
        for (i, row) in rows.iter().enumerate() {
            let row_start = nx * (ny - 1 - i);
            densities[row_start..row_start + nx].copy_from_slice(row);
        }
        self.set_densities(&densities)
    }

    /// Cyclically shifts the densities by `shift[a]` elements along each axis `a`.
    pub fn translate(&mut self, shift: &[usize]) -> Result<()> {
        if shift.len() != E::DIM {
            return Err(HomogenizationError::invalid_configuration(format!(
                "Shift must have {} entries, got {}.",
                E::DIM,
                shift.len()
            )));
        }
        let mut shifted = vec![0.0; self.num_elements()];
        for (old_index, &density) in self.densities.iter().enumerate() {
            let mut coords = self.lattice.cell_coords(old_index);
            for ((c, &s), &n) in coords.iter_mut().zip(shift).zip(self.resolution()) {
                *c = (*c + s % n) % n;
            }
            shifted[self.lattice.cell_index(&coords[..E::DIM])] = density;
        }
        self.densities = shifted;
        Ok(())
    }
}
