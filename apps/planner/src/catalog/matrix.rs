//! Dense row-major embedding matrix. Row order is candidate identity.

use thiserror::Error;

/// A row whose length differs from the first row of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("row {row} has dimension {found}, expected {expected}")]
pub struct RaggedRows {
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

/// A query vector whose length differs from the matrix row length.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query has dimension {query}, rows have dimension {matrix}")]
pub struct DimensionMismatch {
    pub query: usize,
    pub matrix: usize,
}

/// Stacked embeddings, one row per candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingMatrix {
    data: Vec<f64>,
    dim: usize,
    rows: usize,
}

impl EmbeddingMatrix {
    /// Stacks rows in iteration order. Fails on the first row whose length
    /// differs from the first row's.
    pub fn from_rows<'a, I>(rows: I) -> Result<Self, RaggedRows>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut data = Vec::new();
        let mut dim: Option<usize> = None;
        let mut count = 0usize;

        for (row, values) in rows.into_iter().enumerate() {
            let expected = *dim.get_or_insert(values.len());
            if values.len() != expected {
                return Err(RaggedRows {
                    row,
                    expected,
                    found: values.len(),
                });
            }
            data.extend_from_slice(values);
            count += 1;
        }

        Ok(Self {
            data,
            dim: dim.unwrap_or(0),
            rows: count,
        })
    }

    /// Concatenates matrices vertically, preserving part order then row order.
    pub fn concat<'a, I>(parts: I) -> Result<Self, RaggedRows>
    where
        I: IntoIterator<Item = &'a EmbeddingMatrix>,
    {
        Self::from_rows(parts.into_iter().flat_map(|m| m.rows()))
    }

    /// Builds a new matrix from the given row indices, in the given order.
    /// Indices out of range are skipped.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.dim);
        let mut rows = 0usize;
        for &i in indices {
            if let Some(row) = self.row(i) {
                data.extend_from_slice(row);
                rows += 1;
            }
        }
        Self {
            data,
            dim: self.dim,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Row length. Zero for an empty matrix.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |i| &self.data[i * self.dim..(i + 1) * self.dim])
    }

    /// Computes `M · q`: one plain dot product per row.
    ///
    /// An empty matrix accepts a query of any length.
    pub fn dot(&self, query: &[f64]) -> Result<Vec<f64>, DimensionMismatch> {
        if !self.is_empty() && query.len() != self.dim {
            return Err(DimensionMismatch {
                query: query.len(),
                matrix: self.dim,
            });
        }

        Ok(self
            .rows()
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum())
            .collect())
    }
}
