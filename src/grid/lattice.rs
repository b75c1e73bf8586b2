//! Node numbering of structured grids.
//!
//! Nodes are grouped into families: the cell corners, and for quadratic elements one family of
//! edge midpoints per axis. Each family forms a regular lattice whose nodes are numbered with
//! the x index varying fastest. Families are numbered consecutively, corners first.
//!
//! In the periodic numbering, every family has exactly one node per cell, since the nodes on the
//! upper boundary of each axis coincide with the nodes on the lower boundary.
use nalgebra::DMatrix;

const MAX_DIM: usize = 3;

/// Position of an element-local node relative to the lower corner of its cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct LocalNode {
    family: usize,
    shift: [usize; MAX_DIM],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeLattice {
    resolution: Vec<usize>,
    /// For every family, the axis along which its nodes sit at edge midpoints (`None` for corners).
    families: Vec<Option<usize>>,
    /// Index of the first global node of each family, with a final entry for the total count.
    family_offsets: Vec<usize>,
    local_nodes: Vec<LocalNode>,
}

impl NodeLattice {
    /// Derives the lattice from the reference node coordinates of an element type.
    ///
    /// Every reference coordinate must be `-1`, `0` or `1`, with at most one zero per node.
    pub fn from_reference_nodes(reference_nodes: &DMatrix<f64>, resolution: &[usize]) -> Self {
        let dim = resolution.len();
        assert_eq!(reference_nodes.ncols(), dim);
        assert!(dim <= MAX_DIM);

        let midpoint_axes: Vec<Option<usize>> = reference_nodes
            .row_iter()
            .map(|xi| xi.iter().position(|&x| x == 0.0))
            .collect();

        let mut families = midpoint_axes.clone();
        families.sort_unstable();
        families.dedup();

        let local_nodes = reference_nodes
            .row_iter()
            .zip(&midpoint_axes)
            .map(|(xi, midpoint_axis)| {
                let mut shift = [0; MAX_DIM];
                for (s, &x) in shift.iter_mut().zip(xi.iter()) {
                    *s = usize::from(x > 0.0);
                }
                let family = families
                    .iter()
                    .position(|f| f == midpoint_axis)
                    .unwrap_or_default();
                LocalNode { family, shift }
            })
            .collect();

        let mut lattice = Self {
            resolution: resolution.to_vec(),
            families,
            family_offsets: Vec::new(),
            local_nodes,
        };

        let mut offset = 0;
        lattice.family_offsets.push(offset);
        for family in 0..lattice.families.len() {
            offset += lattice.family_extents(family).iter().product::<usize>();
            lattice.family_offsets.push(offset);
        }
        lattice
    }

    pub fn resolution(&self) -> &[usize] {
        &self.resolution
    }

    pub fn num_cells(&self) -> usize {
        self.resolution.iter().product()
    }

    pub fn num_nodes(&self) -> usize {
        self.family_offsets.last().copied().unwrap_or(0)
    }

    pub fn num_periodic_nodes(&self) -> usize {
        self.families.len() * self.num_cells()
    }

    pub fn nodes_per_cell(&self) -> usize {
        self.local_nodes.len()
    }

    /// Number of lattice points of a family along each axis.
    fn family_extents(&self, family: usize) -> Vec<usize> {
        let midpoint_axis = self.families[family];
        self.resolution
            .iter()
            .enumerate()
            .map(|(axis, &n)| if Some(axis) == midpoint_axis { n } else { n + 1 })
            .collect()
    }

    /// Lattice coordinates of a cell, with the x index varying fastest.
    pub fn cell_coords(&self, cell: usize) -> [usize; MAX_DIM] {
        let mut coords = [0; MAX_DIM];
        let mut remainder = cell;
        for (c, &n) in coords.iter_mut().zip(&self.resolution) {
            *c = remainder % n;
            remainder /= n;
        }
        coords
    }

    pub fn cell_index(&self, coords: &[usize]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for (&c, &n) in coords.iter().zip(&self.resolution) {
            index += c * stride;
            stride *= n;
        }
        index
    }

    fn global_node(&self, family: usize, coords: &[usize; MAX_DIM]) -> usize {
        let extents = self.family_extents(family);
        let mut index = self.family_offsets[family];
        let mut stride = 1;
        for (&c, &extent) in coords.iter().zip(&extents) {
            index += c * stride;
            stride *= extent;
        }
        index
    }

    fn periodic_node(&self, family: usize, coords: &[usize; MAX_DIM]) -> usize {
        let wrapped: Vec<usize> = coords
            .iter()
            .zip(&self.resolution)
            .map(|(&c, &n)| c % n)
            .collect();
        family * self.num_cells() + self.cell_index(&wrapped)
    }

    fn populate_with(&self, cell: usize, output: &mut [usize], node_index: impl Fn(usize, &[usize; MAX_DIM]) -> usize) {
        assert_eq!(output.len(), self.nodes_per_cell());
        let base = self.cell_coords(cell);
        for (out, local) in output.iter_mut().zip(&self.local_nodes) {
            let mut coords = [0; MAX_DIM];
            for axis in 0..MAX_DIM {
                coords[axis] = base[axis] + local.shift[axis];
            }
            *out = node_index(local.family, &coords);
        }
    }

    pub fn populate_cell_nodes(&self, cell: usize, output: &mut [usize]) {
        self.populate_with(cell, output, |family, coords| self.global_node(family, coords));
    }

    pub fn populate_periodic_cell_nodes(&self, cell: usize, output: &mut [usize]) {
        self.populate_with(cell, output, |family, coords| self.periodic_node(family, coords));
    }

    /// Physical coordinates of a global node for a grid of the given size.
    pub fn populate_node_coordinates(&self, node: usize, size: &[f64], output: &mut [f64]) {
        assert!(node < self.num_nodes());
        let family = self.family_offsets.partition_point(|&offset| offset <= node) - 1;
        let midpoint_axis = self.families[family];
        let mut remainder = node - self.family_offsets[family];
        let extents = self.family_extents(family);
        for (axis, ((x, &extent), (&length, &n))) in output
            .iter_mut()
            .zip(&extents)
            .zip(size.iter().zip(&self.resolution))
            .enumerate()
        {
            let c = (remainder % extent) as f64;
            remainder /= extent;
            let c = if Some(axis) == midpoint_axis { c + 0.5 } else { c };
            *x = c * length / n as f64;
        }
    }
}
