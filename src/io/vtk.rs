//! Export of grids and nodal fields to legacy VTK files.
use crate::element::ReferenceElement;
use crate::grid::Grid;
use eyre::eyre;
use nalgebra::{DMatrix, DVector};
use std::convert::TryInto;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, Piece, UnstructuredGridPiece,
    Version, VertexNumbers, Vtk,
};

/// VTK cell type of an element.
///
/// The node ordering of the supported elements already matches VTK.
pub fn vtk_cell_type<E: ReferenceElement>() -> eyre::Result<CellType> {
    match (E::DIM, E::NUM_NODES) {
        (2, 4) => Ok(CellType::Quad),
        (2, 8) => Ok(CellType::QuadraticQuad),
        (3, 8) => Ok(CellType::Hexahedron),
        (3, 20) => Ok(CellType::QuadraticHexahedron),
        _ => Err(eyre!("{} elements have no VTK counterpart", E::NAME)),
    }
}

#[derive(Debug, Clone)]
enum Location {
    Point,
    Cell,
}

#[derive(Debug, Clone)]
struct PendingAttribute {
    name: String,
    location: Location,
    num_rows: usize,
    num_components: usize,
    /// Row-major, padded to three components for vectors.
    data: Vec<f64>,
}

impl PendingAttribute {
    fn into_attribute(self) -> Attribute {
        let elem = if self.num_components == 3 {
            ElementType::Vectors
        } else {
            ElementType::Scalars {
                num_comp: self.num_components as u32,
                lookup_table: None,
            }
        };
        Attribute::DataArray(DataArray {
            name: self.name,
            elem,
            data: self.data.into(),
        })
    }
}

/// Builds a VTK unstructured grid data set from a [`Grid`].
///
/// Attributes are checked against the number of nodes or elements of the grid when the data set
/// is built. Vector fields with two components are padded with zeros, since VTK vectors always
/// have three components.
pub struct GridDataSetBuilder<'a, E> {
    grid: &'a Grid<E>,
    title: Option<String>,
    with_densities: bool,
    attributes: Vec<PendingAttribute>,
}

impl<'a, E: ReferenceElement> GridDataSetBuilder<'a, E> {
    pub fn from_grid(grid: &'a Grid<E>) -> Self {
        Self {
            grid,
            title: None,
            with_densities: true,
            attributes: Vec::new(),
        }
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..self
        }
    }

    /// Whether to write the element densities as a cell attribute named `density`. Enabled by
    /// default.
    pub fn with_densities(self, with_densities: bool) -> Self {
        Self { with_densities, ..self }
    }

    /// Adds a scalar nodal field, one entry per global node.
    pub fn with_point_scalar_attribute(mut self, name: impl Into<String>, values: &DVector<f64>) -> Self {
        self.attributes.push(PendingAttribute {
            name: name.into(),
            location: Location::Point,
            num_rows: values.len(),
            num_components: 1,
            data: values.as_slice().to_vec(),
        });
        self
    }

    /// Adds a vector nodal field given as a `num_nodes x dim` matrix.
    pub fn with_point_vector_attribute(mut self, name: impl Into<String>, values: &DMatrix<f64>) -> Self {
        let mut data = Vec::with_capacity(3 * values.nrows());
        for row in values.row_iter() {
            data.extend(row.iter().copied());
            data.extend(std::iter::repeat(0.0).take(3usize.saturating_sub(row.len())));
        }
        self.attributes.push(PendingAttribute {
            name: name.into(),
            location: Location::Point,
            num_rows: values.nrows(),
            num_components: values.ncols().max(3),
            data,
        });
        self
    }

    /// Adds a scalar field with one entry per element.
    pub fn with_cell_scalar_attribute(mut self, name: impl Into<String>, values: &[f64]) -> Self {
        self.attributes.push(PendingAttribute {
            name: name.into(),
            location: Location::Cell,
            num_rows: values.len(),
            num_components: 1,
            data: values.to_vec(),
        });
        self
    }

    pub fn try_build(&self) -> eyre::Result<DataSet> {
        let grid = self.grid;
        let cell_type = vtk_cell_type::<E>()?;

        let mut points = Vec::with_capacity(3 * grid.num_nodes());
        for node in 0..grid.num_nodes() {
            let x = grid.node(node);
            points.extend(x.iter().copied());
            points.extend(std::iter::repeat(0.0).take(3 - E::DIM));
        }

        // Legacy layout: N, i_1, ..., i_N for every cell
        let mut vertices: Vec<u32> = Vec::with_capacity((E::NUM_NODES + 1) * grid.num_elements());
        for element in grid.elements() {
            vertices.push(element.len().try_into()?);
            for node in element {
                vertices.push(node.try_into()?);
            }
        }

        let mut data = Attributes::new();
        if self.with_densities {
            data.cell.push(Attribute::DataArray(DataArray {
                name: "density".to_string(),
                elem: ElementType::Scalars {
                    num_comp: 1,
                    lookup_table: None,
                },
                data: grid.densities().to_vec().into(),
            }));
        }
        for attribute in &self.attributes {
            let (expected, attributes) = match attribute.location {
                Location::Point => (grid.num_nodes(), &mut data.point),
                Location::Cell => (grid.num_elements(), &mut data.cell),
            };
            if attribute.num_rows != expected {
                return Err(eyre!(
                    "Attribute '{}' has {} entries, expected {}",
                    attribute.name,
                    attribute.num_rows,
                    expected
                ));
            }
            attributes.push(attribute.clone().into_attribute());
        }

        let piece = UnstructuredGridPiece {
            points: points.into(),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: grid.num_elements().try_into()?,
                    vertices,
                },
                types: vec![cell_type; grid.num_elements()],
            },
            data,
        };

        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }

    /// Builds the data set and writes it to a legacy VTK file.
    ///
    /// Without an explicit title, the file stem is used.
    pub fn try_export(&self, filename: impl AsRef<Path>) -> eyre::Result<()> {
        let filepath = filename.as_ref();
        let fallback_title = filepath
            .file_stem()
            .map(|os_str| os_str.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());
        let dataset = self.try_build()?;
        Vtk {
            version: Version { major: 4, minor: 1 },
            title: self.title.clone().unwrap_or(fallback_title),
            byte_order: ByteOrder::BigEndian,
            data: dataset,
            file_path: None,
        }
        .export(filepath)
        .map_err(|err| eyre!("Failed to export {}: {}", filepath.display(), err))?;
        Ok(())
    }
}
