use std::cmp::Reverse;
use std::fmt;
use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use linfa::prelude::ToConfusionMatrix;
use linfa::Dataset;
use linfa_svm::{Svm, SvmError};
use ndarray::{Array1, Array2, Axis, Ix1};
use num_traits::FromPrimitive as _;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::SeedableRng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::classifier::{Classifier, Hyperparameters, Kernel, SvmType, Trainer};
use crate::dataset::{Label, LabeledDataset};
use crate::error::{Error, Result};

type Examples = Dataset<f64, bool, Ix1>;

/// Copies a labelled dataset into the records and boolean targets `linfa` trains on.
fn to_examples(dataset: &LabeledDataset) -> Result<Examples> {
	let values = dataset.matrix().as_slice().iter().map(|&v| f64::from(v)).collect::<Vec<_>>();
	let records = Array2::from_shape_vec((dataset.rows_len(), dataset.features_len()), values)
		.map_err(|e| Error::Training(e.to_string()))?;
	let targets = dataset.labels().iter().map(|&label| label == Label::Positive).collect::<Array1<_>>();

	Ok(Dataset::new(records, targets))
}

fn both_classes(targets: &Array1<bool>) -> bool {
	targets.iter().any(|&t| t) && targets.iter().any(|&t| !t)
}

fn invalid_data<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> io::Error {
	io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Linear C-SVC fitted by `linfa-svm`, with the penalty and width it was trained with.
///
/// Model files start with a big-endian header (type tag, kernel tag, `C`,
/// feature width) followed by the `bincode` encoding of the fitted machine.
pub struct LinearSvm {
	c: f64,
	dimension: usize,
	model: Svm<f64, bool>,
}

impl fmt::Debug for LinearSvm {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LinearSvm")
			.field("c", &self.c)
			.field("dimension", &self.dimension)
			.finish_non_exhaustive()
	}
}

impl Classifier for LinearSvm {
	fn predict(&self, x: &[f32]) -> Label {
		use linfa::traits::Predict;

		let sample = x.iter().map(|&v| f64::from(v)).collect::<Array1<_>>().insert_axis(Axis(0));
		let prediction: Array1<bool> = self.model.predict(&sample);

		if prediction[0] {
			Label::Positive
		} else {
			Label::Negative
		}
	}

	fn dimension(&self) -> usize {
		self.dimension
	}

	fn describe(&self) -> Hyperparameters {
		Hyperparameters {
			svm_type: SvmType::CSvc,
			kernel: Kernel::Linear,
			c: self.c,
		}
	}

	fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
		let dimension = u32::try_from(self.dimension)
			.map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many features"))?;

		writer.write_u16::<BigEndian>(SvmType::CSvc as u16)?;
		writer.write_u16::<BigEndian>(Kernel::Linear as u16)?;
		writer.write_f64::<BigEndian>(self.c)?;
		writer.write_u32::<BigEndian>(dimension)?;

		bincode::serialize_into(writer, &self.model).map_err(invalid_data)
	}

	fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
		let svm_type = reader.read_u16::<BigEndian>()?;
		let kernel = reader.read_u16::<BigEndian>()?;

		match (SvmType::from_u16(svm_type), Kernel::from_u16(kernel)) {
			(Some(SvmType::CSvc), Some(Kernel::Linear)) => {}
			(t, k) => {
				return Err(invalid_data(format!(
					"unsupported model type {:?} ({}) with kernel {:?} ({})",
					t, svm_type, k, kernel
				)))
			}
		}

		let c = reader.read_f64::<BigEndian>()?;
		let dimension = reader.read_u32::<BigEndian>()? as usize;

		// decoded from what the stream actually holds, never sized from the header
		let mut payload = Vec::new();
		reader.read_to_end(&mut payload)?;
		let model = bincode::deserialize(&payload).map_err(invalid_data)?;

		Ok(Self { c, dimension, model })
	}
}

/// Cross-validated search over the penalty `C`.
#[derive(Debug, Clone)]
pub struct AutoTune {
	pub folds: usize,
	pub grid: Vec<f64>,
}

impl Default for AutoTune {
	fn default() -> Self {
		Self {
			folds: 5,
			grid: vec![0.01, 0.1, 1.0, 10.0, 100.0],
		}
	}
}

impl AutoTune {
	/// Mean validation accuracy of `c` over the folds whose training part holds both classes.
	fn cross_validate(&self, builder: &LinearSvmBuilder, examples: &Examples, folds: usize, c: f64) -> Option<f64> {
		use linfa::traits::Predict;

		let scores = examples
			.fold(folds)
			.into_iter()
			.filter(|(train, _)| both_classes(train.targets()))
			.filter_map(|(train, valid)| {
				let model = builder.train(&train, c).ok()?;
				let prediction: Array1<bool> = model.predict(&valid);
				let matrix = prediction.confusion_matrix(&valid).ok()?;
				Some(f64::from(matrix.accuracy()))
			})
			.collect::<Vec<_>>();

		if scores.is_empty() {
			None
		} else {
			Some(scores.iter().sum::<f64>() / scores.len() as f64)
		}
	}

	/// Returns the best scoring `C` of the grid, the smaller one on ties, or
	/// `None` when no fold could be scored.
	pub fn search(&self, builder: &LinearSvmBuilder, dataset: &LabeledDataset) -> Result<Option<f64>> {
		let folds = self.folds.min(dataset.rows_len());
		if folds < 2 {
			return Ok(None);
		}

		// folds are cut from consecutive rows, and the positives come first
		let mut order = (0..dataset.rows_len()).collect::<Vec<_>>();
		order.shuffle(&mut StdRng::seed_from_u64(builder.seed));
		let examples = to_examples(&dataset.subset(&order))?;

		let scores = self
			.grid
			.clone()
			.into_par_iter()
			.filter_map(|c| self.cross_validate(builder, &examples, folds, c).map(|score| (c, score)))
			.collect::<Vec<_>>();

		for (c, score) in &scores {
			log::debug!("C = {}: cross-validated accuracy {:.4}", c, score);
		}

		Ok(scores
			.into_iter()
			.max_by_key(|&(c, score)| (OrderedFloat(score), Reverse(OrderedFloat(c))))
			.map(|(c, _)| c))
	}
}

pub struct LinearSvmBuilder {
	pub c: f64,
	/// Tolerance of the solver's stopping criterion.
	pub epsilon: f64,
	/// Seeds the shuffle that precedes cross-validation.
	pub seed: u64,
	pub auto: Option<AutoTune>,
}

impl Default for LinearSvmBuilder {
	fn default() -> Self {
		Self {
			c: 1.0,
			epsilon: 1e-3,
			seed: 0,
			auto: None,
		}
	}
}

impl LinearSvmBuilder {
	fn train(&self, examples: &Examples, c: f64) -> std::result::Result<Svm<f64, bool>, SvmError> {
		use linfa::traits::Fit;

		Svm::<f64, bool>::params()
			.pos_neg_weights(c, c)
			.linear_kernel()
			.eps(self.epsilon)
			.fit(examples)
	}

	pub fn fit_c(&self, dataset: &LabeledDataset, c: f64) -> Result<LinearSvm> {
		if dataset.positives() == 0 || dataset.negatives() == 0 {
			return Err(Error::Training(format!(
				"need examples of both classes, got {} positive and {} negative",
				dataset.positives(),
				dataset.negatives()
			)));
		}
		if !(c > 0.0) {
			return Err(Error::Training(format!("C must be positive, got {}", c)));
		}

		let examples = to_examples(dataset)?;
		let model = self.train(&examples, c).map_err(|e| Error::Training(e.to_string()))?;

		Ok(LinearSvm {
			c,
			dimension: dataset.features_len(),
			model,
		})
	}
}

impl Trainer for LinearSvmBuilder {
	type Model = LinearSvm;

	fn fit(&self, dataset: &LabeledDataset) -> Result<LinearSvm> {
		let c = match &self.auto {
			Some(auto) => match auto.search(self, dataset)? {
				Some(c) => {
					log::info!("Auto-training picked C = {}", c);
					c
				}
				None => {
					log::warn!("Auto-training found no usable fold, falling back to C = {}", self.c);
					self.c
				}
			},
			None => self.c,
		};

		self.fit_c(dataset, c)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::classifier::accuracy;
	use crate::dataset::FeatureMatrix;
	use std::io::Cursor;

	fn separable(n: usize) -> LabeledDataset {
		let mut rows = Vec::new();
		let mut labels = Vec::new();
		for i in 0..n {
			let offset = i as f32 * 0.1;
			rows.push(vec![1.0 + offset, 0.5 - offset]);
			labels.push(Label::Positive);
			rows.push(vec![-1.0 - offset, 0.3 + offset]);
			labels.push(Label::Negative);
		}

		LabeledDataset::new(FeatureMatrix::from_rows(&rows).unwrap(), labels).unwrap()
	}

	fn to_bytes(model: &LinearSvm) -> Vec<u8> {
		let mut bytes = Vec::new();
		model.serialize(&mut bytes).unwrap();
		bytes
	}

	#[test]
	fn separates_separable_data() {
		let dataset = separable(10);
		let model = LinearSvmBuilder::default().fit(&dataset).unwrap();

		assert_eq!(accuracy(&model, &dataset), 1.0);
		assert_eq!(model.predict(&[3.0, 0.0]), Label::Positive);
		assert_eq!(model.predict(&[-3.0, 0.0]), Label::Negative);
		assert_eq!(model.dimension(), 2);
	}

	#[test]
	fn training_is_reproducible() {
		let dataset = separable(6);
		let builder = LinearSvmBuilder::default();

		assert_eq!(to_bytes(&builder.fit(&dataset).unwrap()), to_bytes(&builder.fit(&dataset).unwrap()));
	}

	#[test]
	fn one_class_is_not_enough() {
		let matrix = FeatureMatrix::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
		let dataset = LabeledDataset::new(matrix, vec![Label::Positive, Label::Positive]).unwrap();

		assert!(matches!(LinearSvmBuilder::default().fit(&dataset), Err(Error::Training(_))));
	}

	#[test]
	fn penalty_must_be_positive() {
		let builder = LinearSvmBuilder::default();
		assert!(matches!(builder.fit_c(&separable(2), 0.0), Err(Error::Training(_))));
	}

	#[test]
	fn serialization_round_trips() {
		let dataset = separable(4);
		let model = LinearSvmBuilder { c: 0.25, ..Default::default() }.fit(&dataset).unwrap();

		let restored = LinearSvm::deserialize(&mut Cursor::new(to_bytes(&model))).unwrap();

		assert_eq!(restored.describe(), model.describe());
		assert_eq!(restored.describe().c, 0.25);
		assert_eq!(restored.dimension(), 2);
		for (x, _) in dataset.rows() {
			assert_eq!(restored.predict(x), model.predict(x));
		}
		assert_eq!(to_bytes(&restored), to_bytes(&model));
	}

	#[test]
	fn unknown_model_kinds_are_refused() {
		let mut bytes = Vec::new();
		bytes.write_u16::<BigEndian>(SvmType::NuSvr as u16).unwrap();
		bytes.write_u16::<BigEndian>(Kernel::Rbf as u16).unwrap();

		let err = LinearSvm::deserialize(&mut Cursor::new(bytes)).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}

	#[test]
	fn truncated_model_is_refused() {
		let mut bytes = to_bytes(&LinearSvmBuilder::default().fit(&separable(3)).unwrap());
		bytes.pop();

		assert!(LinearSvm::deserialize(&mut Cursor::new(bytes)).is_err());
	}

	#[test]
	fn huge_declared_width_is_refused() {
		let mut bytes = Vec::new();
		bytes.write_u16::<BigEndian>(SvmType::CSvc as u16).unwrap();
		bytes.write_u16::<BigEndian>(Kernel::Linear as u16).unwrap();
		bytes.write_f64::<BigEndian>(1.0).unwrap();
		bytes.write_u32::<BigEndian>(u32::MAX).unwrap();
		bytes.extend_from_slice(&[0xff; 8]);

		let err = LinearSvm::deserialize(&mut Cursor::new(bytes)).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}

	#[test]
	fn auto_tuning_picks_from_the_grid() {
		let dataset = separable(10);
		let auto = AutoTune::default();
		let builder = LinearSvmBuilder { auto: Some(auto.clone()), ..Default::default() };

		let model = builder.fit(&dataset).unwrap();
		assert!(auto.grid.contains(&model.describe().c));
		assert!(accuracy(&model, &dataset) >= 0.9);
	}

	#[test]
	fn single_grid_value_is_chosen() {
		let auto = AutoTune { folds: 5, grid: vec![10.0] };
		let builder = LinearSvmBuilder::default();

		assert_eq!(auto.search(&builder, &separable(10)).unwrap(), Some(10.0));
	}

	#[test]
	fn auto_tuning_falls_back_without_usable_folds() {
		let dataset = separable(1);
		let builder = LinearSvmBuilder {
			c: 0.5,
			auto: Some(AutoTune::default()),
			..Default::default()
		};

		assert_eq!(AutoTune::default().search(&builder, &dataset).unwrap(), None);
		assert_eq!(builder.fit(&dataset).unwrap().describe().c, 0.5);
	}
}
