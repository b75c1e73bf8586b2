//! Degree of freedom bookkeeping.
//!
//! Three index spaces are involved in a periodic cell problem:
//!
//! - *global* dofs, attached to the global nodes of the grid,
//! - *periodic* dofs, attached to the periodic nodes, where opposite faces share nodes,
//! - *reduced* dofs, which are the periodic dofs minus a small set of *fixed* dofs that removes
//!   the null space of the operator (rigid translations, or an additive constant potential).
//!
//! Types implementing [`DofTraits`] map between these spaces for a particular field type. The
//! same maps are used for global and periodic node numberings, with `num_nodes` being the number
//! of nodes in the respective numbering.
use std::marker::PhantomData;

pub trait DofTraits: Send + Sync + 'static {
    /// Number of dofs attached to each node.
    const NUM_NODE_DOFS: usize;
    /// Number of fixed dofs, i.e. the dimension of the null space being removed.
    const NUM_FIXED_DOFS: usize;

    /// Appends the dofs of an element with the given node indices to `dofs`.
    fn populate_dofs(nodes: &[usize], num_nodes: usize, dofs: &mut Vec<usize>);

    fn is_fixed_dof(dof: usize, num_nodes: usize) -> bool;

    /// Maps a (periodic) dof to its reduced index, or `None` if the dof is fixed.
    fn reduced_dof(dof: usize, num_nodes: usize) -> Option<usize>;

    /// Maps a reduced dof back to the (periodic) dof it was obtained from.
    fn expanded_dof(reduced_dof: usize, num_nodes: usize) -> usize;

    fn dofs(nodes: &[usize], num_nodes: usize) -> Vec<usize> {
        let mut dofs = Vec::with_capacity(Self::NUM_NODE_DOFS * nodes.len());
        Self::populate_dofs(nodes, num_nodes, &mut dofs);
        dofs
    }

    fn num_dofs(num_nodes: usize) -> usize {
        Self::NUM_NODE_DOFS * num_nodes
    }

    fn num_reduced_dofs(num_nodes: usize) -> usize {
        Self::num_dofs(num_nodes) - Self::NUM_FIXED_DOFS
    }
}

/// One dof per node. Dof `0` is fixed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ScalarDofs;

impl DofTraits for ScalarDofs {
    const NUM_NODE_DOFS: usize = 1;
    const NUM_FIXED_DOFS: usize = 1;

    fn populate_dofs(nodes: &[usize], _num_nodes: usize, dofs: &mut Vec<usize>) {
        dofs.extend_from_slice(nodes);
    }

    fn is_fixed_dof(dof: usize, _num_nodes: usize) -> bool {
        dof == 0
    }

    fn reduced_dof(dof: usize, _num_nodes: usize) -> Option<usize> {
        dof.checked_sub(1)
    }

    fn expanded_dof(reduced_dof: usize, _num_nodes: usize) -> usize {
        reduced_dof + 1
    }
}

/// `D` dofs per node, stored contiguously per node. The `D` dofs of node `0` are fixed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct VectorDofs<const D: usize>;

impl<const D: usize> DofTraits for VectorDofs<D> {
    const NUM_NODE_DOFS: usize = D;
    const NUM_FIXED_DOFS: usize = D;

    fn populate_dofs(nodes: &[usize], _num_nodes: usize, dofs: &mut Vec<usize>) {
        for &node in nodes {
            dofs.extend((0..D).map(|i| D * node + i));
        }
    }

    fn is_fixed_dof(dof: usize, _num_nodes: usize) -> bool {
        dof < D
    }

    fn reduced_dof(dof: usize, _num_nodes: usize) -> Option<usize> {
        dof.checked_sub(D)
    }

    fn expanded_dof(reduced_dof: usize, _num_nodes: usize) -> usize {
        reduced_dof + D
    }
}

/// Concatenation of two fields.
///
/// All dofs of `A` come first, followed by the dofs of `B` offset by the number of dofs of `A`.
/// In the reduced space, the reduced dofs of `B` are likewise offset by the number of reduced
/// dofs of `A`. Products can be nested.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ProductDofs<A, B>(PhantomData<fn() -> (A, B)>);

impl<A: DofTraits, B: DofTraits> DofTraits for ProductDofs<A, B> {
    const NUM_NODE_DOFS: usize = A::NUM_NODE_DOFS + B::NUM_NODE_DOFS;
    const NUM_FIXED_DOFS: usize = A::NUM_FIXED_DOFS + B::NUM_FIXED_DOFS;

    fn populate_dofs(nodes: &[usize], num_nodes: usize, dofs: &mut Vec<usize>) {
        A::populate_dofs(nodes, num_nodes, dofs);
        let offset = A::num_dofs(num_nodes);
        let start = dofs.len();
        B::populate_dofs(nodes, num_nodes, dofs);
        for dof in &mut dofs[start..] {
            *dof += offset;
        }
    }

    fn is_fixed_dof(dof: usize, num_nodes: usize) -> bool {
        let offset = A::num_dofs(num_nodes);
        if dof < offset {
            A::is_fixed_dof(dof, num_nodes)
        } else {
            B::is_fixed_dof(dof - offset, num_nodes)
        }
    }

    fn reduced_dof(dof: usize, num_nodes: usize) -> Option<usize> {
        let offset = A::num_dofs(num_nodes);
        if dof < offset {
            A::reduced_dof(dof, num_nodes)
        } else {
            B::reduced_dof(dof - offset, num_nodes).map(|r| r + A::num_reduced_dofs(num_nodes))
        }
    }

    fn expanded_dof(reduced_dof: usize, num_nodes: usize) -> usize {
        let reduced_offset = A::num_reduced_dofs(num_nodes);
        if reduced_dof < reduced_offset {
            A::expanded_dof(reduced_dof, num_nodes)
        } else {
            B::expanded_dof(reduced_dof - reduced_offset, num_nodes) + A::num_dofs(num_nodes)
        }
    }
}

pub type ElasticDofs<const D: usize> = VectorDofs<D>;
pub type DiffusiveDofs = ScalarDofs;
/// Displacements followed by the electric potential.
pub type PiezoelectricDofs<const D: usize> = ProductDofs<VectorDofs<D>, ScalarDofs>;
