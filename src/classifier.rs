use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use num_derive::FromPrimitive;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::dataset::{Label, LabeledDataset};
use crate::error::{Error, Result};

pub trait Classifier: Sized {
	fn predict(&self, x: &[f32]) -> Label;

	/// Length of the feature vectors the model was trained on.
	fn dimension(&self) -> usize;
	fn describe(&self) -> Hyperparameters;

	fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;
	fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self>;
}

pub trait Trainer {
	type Model: Classifier;

	fn fit(&self, dataset: &LabeledDataset) -> Result<Self::Model>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum SvmType {
	CSvc = 100,
	NuSvc = 101,
	OneClass = 102,
	EpsSvr = 103,
	NuSvr = 104,
}

impl fmt::Display for SvmType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SvmType::CSvc => "C-Support Vector Classification",
			SvmType::NuSvc => "Nu-Support Vector Classification",
			SvmType::OneClass => "Distribution Estimation (One-class SVM)",
			SvmType::EpsSvr => "Epsilon-Support Vector Regression",
			SvmType::NuSvr => "Nu-Support Vector Regression",
		})
	}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum Kernel {
	Linear = 0,
	Polynomial = 1,
	Rbf = 2,
	Sigmoid = 3,
}

impl fmt::Display for Kernel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Kernel::Linear => "Linear",
			Kernel::Polynomial => "Polynomial",
			Kernel::Rbf => "Radial Basis Function",
			Kernel::Sigmoid => "Sigmoid",
		})
	}
}

/// The descriptive part of a trained model, for reporting.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hyperparameters {
	pub svm_type: SvmType,
	pub kernel: Kernel,
	pub c: f64,
}

impl fmt::Display for Hyperparameters {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Type: {}", self.svm_type)?;
		writeln!(f, "Kernel: {}", self.kernel)?;
		write!(f, "C: {}", self.c)
	}
}

/// Fraction of rows the classifier labels correctly.
pub fn accuracy<C: Classifier + Sync>(classifier: &C, dataset: &LabeledDataset) -> f64 {
	if dataset.rows_len() == 0 {
		return 0.0;
	}

	dataset
		.rows()
		.collect::<Vec<_>>()
		.into_par_iter()
		.filter(|(x, y)| classifier.predict(x) == *y)
		.count() as f64 / dataset.rows_len() as f64
}

pub fn save_model<C: Classifier>(model: &C, path: &Path) -> Result<()> {
	let file = File::create(path).map_err(|source| Error::UnreadableFile {
		label: "model",
		path: path.to_path_buf(),
		source,
	})?;

	let mut writer = BufWriter::new(file);
	model.serialize(&mut writer)?;
	writer.flush()?;

	Ok(())
}

pub fn load_model<C: Classifier>(path: &Path) -> Result<C> {
	let file = File::open(path).map_err(|source| Error::UnreadableFile {
		label: "model",
		path: path.to_path_buf(),
		source,
	})?;

	C::deserialize(&mut BufReader::new(file)).map_err(|source| Error::InvalidModel {
		path: path.to_path_buf(),
		source,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names_match_the_model_kinds() {
		assert_eq!(SvmType::CSvc.to_string(), "C-Support Vector Classification");
		assert_eq!(SvmType::OneClass.to_string(), "Distribution Estimation (One-class SVM)");
		assert_eq!(Kernel::Linear.to_string(), "Linear");
		assert_eq!(Kernel::Rbf.to_string(), "Radial Basis Function");
	}

	#[test]
	fn hyperparameters_render_one_per_line() {
		let params = Hyperparameters {
			svm_type: SvmType::CSvc,
			kernel: Kernel::Linear,
			c: 0.5,
		};

		assert_eq!(params.to_string(), "Type: C-Support Vector Classification\nKernel: Linear\nC: 0.5");
	}
}
