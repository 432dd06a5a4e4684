use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Label {
	Positive,
	Negative,
}

impl Label {
	pub fn value(self) -> f32 {
		match self {
			Label::Positive => 1.0,
			Label::Negative => -1.0,
		}
	}
}

impl fmt::Display for Label {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Label::Positive => write!(f, "positive"),
			Label::Negative => write!(f, "negative"),
		}
	}
}

/// Row-major matrix of feature vectors, every row `width` values long.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
	rows: usize,
	width: usize,
	data: Vec<f32>,
}

impl FeatureMatrix {
	pub fn zeros(rows: usize, width: usize) -> Self {
		Self {
			rows,
			width,
			data: vec![0.0; rows * width],
		}
	}

	pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
		let width = rows.first().map_or(0, Vec::len);
		let mut data = Vec::with_capacity(rows.len() * width);

		for row in rows {
			if row.len() != width {
				return Err(Error::Training(format!(
					"ragged feature rows: expected {} values, got {}",
					width,
					row.len()
				)));
			}
			data.extend_from_slice(row);
		}

		Ok(Self {
			rows: rows.len(),
			width,
			data,
		})
	}

	pub(crate) fn from_raw(rows: usize, width: usize, data: Vec<f32>) -> Self {
		debug_assert_eq!(rows * width, data.len());
		Self { rows, width, data }
	}

	pub fn rows_len(&self) -> usize {
		self.rows
	}

	pub fn features_len(&self) -> usize {
		self.width
	}

	pub fn row(&self, i: usize) -> &[f32] {
		&self.data[i * self.width..(i + 1) * self.width]
	}

	pub fn rows(&self) -> impl '_ + Iterator<Item = &[f32]> {
		(0..self.rows).map(move |i| self.row(i))
	}

	/// Mutable view over `count` rows starting at row `start`.
	pub fn row_range_mut(&mut self, start: usize, count: usize) -> &mut [f32] {
		&mut self.data[start * self.width..(start + count) * self.width]
	}

	pub fn as_slice(&self) -> &[f32] {
		&self.data
	}
}

/// A feature matrix together with one label per row.
///
/// Label `i` always belongs to row `i`; the pairing can only be built through
/// [`LabeledDataset::new`] or the assembler and never reordered separately.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
	matrix: FeatureMatrix,
	labels: Vec<Label>,
}

impl LabeledDataset {
	pub fn new(matrix: FeatureMatrix, labels: Vec<Label>) -> Result<Self> {
		if matrix.rows_len() != labels.len() {
			return Err(Error::Training(format!(
				"{} feature rows but {} labels",
				matrix.rows_len(),
				labels.len()
			)));
		}

		Ok(Self { matrix, labels })
	}

	pub fn matrix(&self) -> &FeatureMatrix {
		&self.matrix
	}

	pub fn labels(&self) -> &[Label] {
		&self.labels
	}

	pub fn rows_len(&self) -> usize {
		self.labels.len()
	}

	pub fn features_len(&self) -> usize {
		self.matrix.features_len()
	}

	pub fn rows(&self) -> impl '_ + Iterator<Item = (&[f32], Label)> {
		self.matrix.rows().zip(self.labels.iter().copied())
	}

	pub fn targets(&self) -> impl '_ + Iterator<Item = f32> {
		self.labels.iter().map(|label| label.value())
	}

	pub fn positives(&self) -> usize {
		self.labels.iter().filter(|&&l| l == Label::Positive).count()
	}

	pub fn negatives(&self) -> usize {
		self.rows_len() - self.positives()
	}

	/// Copies the given rows, in the given order, into a new dataset.
	pub fn subset(&self, indices: &[usize]) -> Self {
		let width = self.features_len();
		let mut data = Vec::with_capacity(indices.len() * width);
		let mut labels = Vec::with_capacity(indices.len());

		for &i in indices {
			data.extend_from_slice(self.matrix.row(i));
			labels.push(self.labels[i]);
		}

		Self {
			matrix: FeatureMatrix::from_raw(indices.len(), width, data),
			labels,
		}
	}
}
