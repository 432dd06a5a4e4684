//! The three tool drivers: extract features, train a model, evaluate a model.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::assembler::assemble;
use crate::classifier::{save_model, Classifier, Hyperparameters, Trainer};
use crate::codec::FeatureSetWriter;
use crate::config::{EvaluateConfig, ExtractConfig, TrainConfig};
use crate::dataset::Label;
use crate::error::{Error, Result};
use crate::hog::{load_window, FeatureExtractor};
use crate::image_set::resolve;
use crate::progress::Progress;

/// Decodes and describes a batch of images in parallel. Results keep the input order.
fn describe_chunk<E: FeatureExtractor + Sync>(extractor: &E, paths: &[PathBuf]) -> Vec<Result<Vec<f32>>> {
	paths
		.par_iter()
		.map(|path| load_window(path, extractor.window()).map(|image| extractor.extract(&image)))
		.collect()
}

/// Undecodable images are skipped; anything else aborts the run.
fn skip_unreadable(result: Result<Vec<f32>>) -> Result<Option<Vec<f32>>> {
	match result {
		Ok(features) => Ok(Some(features)),
		Err(Error::Image { path, source }) => {
			log::warn!("Skipping unreadable image '{}': {}", path.display(), source);
			Ok(None)
		}
		Err(e) => Err(e),
	}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
	pub found: usize,
	pub written: usize,
	pub skipped: usize,
	pub width: usize,
}

/// Writes one feature row per readable image in `paths`, in order, then finalizes the header.
pub fn extract_paths<E, W, P>(
	paths: &[PathBuf],
	extractor: &E,
	writer: W,
	chunk_size: usize,
	progress: &mut Progress<P>,
) -> Result<(W, ExtractSummary)>
where
	E: FeatureExtractor + Sync,
	W: Write + Seek,
	P: Write,
{
	let mut writer = FeatureSetWriter::new(writer)?;
	let mut skipped = 0;
	let mut current = 0;

	for chunk in paths.chunks(chunk_size.max(1)) {
		for result in describe_chunk(extractor, chunk) {
			progress.tick(current);
			current += 1;

			match skip_unreadable(result)? {
				Some(features) => writer.append(&features)?,
				None => skipped += 1,
			}
		}
	}

	let summary = ExtractSummary {
		found: paths.len(),
		written: writer.rows_len(),
		skipped,
		width: writer.features_len().unwrap_or(0),
	};

	Ok((writer.finish()?, summary))
}

pub fn extract<E: FeatureExtractor + Sync>(config: &ExtractConfig, extractor: &E, output: &Path) -> Result<ExtractSummary> {
	log::info!("Using image directory '{}'...", config.source_dir.display());
	let paths = resolve(&config.source_dir)?;
	log::info!("Found {} examples.", paths.len());

	let file = File::create(output).map_err(|source| Error::UnreadableFile {
		label: "output features",
		path: output.to_path_buf(),
		source,
	})?;

	let mut progress = Progress::stderr(paths.len(), "Processing examples...");
	let (writer, summary) = extract_paths(&paths, extractor, BufWriter::new(file), config.chunk_size, &mut progress)?;
	progress.done();

	writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
	log::info!("Wrote {} x {} features to '{}'.", summary.written, summary.width, output.display());

	Ok(summary)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TrainSummary {
	pub positives: usize,
	pub negatives: usize,
	pub width: usize,
}

pub fn train<T: Trainer>(config: &TrainConfig, trainer: &T) -> Result<(T::Model, TrainSummary)> {
	let dataset = assemble(&config.positive, &config.negative)?;
	let summary = TrainSummary {
		positives: dataset.positives(),
		negatives: dataset.negatives(),
		width: dataset.features_len(),
	};

	log::info!(
		"Training on {} positive and {} negative examples of {} features...",
		summary.positives,
		summary.negatives,
		summary.width
	);
	let model = trainer.fit(&dataset)?;

	Ok((model, summary))
}

pub fn train_to<T: Trainer>(config: &TrainConfig, trainer: &T, model_path: &Path) -> Result<(T::Model, TrainSummary)> {
	let (model, summary) = train(config, trainer)?;

	log::info!("Writing trained model to '{}'...", model_path.display());
	save_model(&model, model_path)?;

	Ok((model, summary))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SetReport {
	pub label: Label,
	pub total: usize,
	pub misclassified: usize,
	pub skipped: usize,
}

impl SetReport {
	/// Misclassification percentage, 0 for an empty set.
	pub fn rate(&self) -> f64 {
		if self.total == 0 {
			0.0
		} else {
			self.misclassified as f64 / self.total as f64 * 100.0
		}
	}
}

impl fmt::Display for SetReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"Misclassified {} of {} {} images ({:.2}%).",
			self.misclassified,
			self.total,
			self.label,
			self.rate()
		)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
	pub model: Hyperparameters,
	pub positive: SetReport,
	pub negative: SetReport,
}

impl fmt::Display for EvaluationReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.model)?;
		writeln!(f, "{}", self.positive)?;
		write!(f, "{}", self.negative)
	}
}

/// Predicts every image in `paths` and counts those not labelled `label`.
pub fn classify_paths<C, E, P>(
	model: &C,
	extractor: &E,
	paths: &[PathBuf],
	label: Label,
	chunk_size: usize,
	progress: &mut Progress<P>,
) -> Result<SetReport>
where
	C: Classifier,
	E: FeatureExtractor + Sync,
	P: Write,
{
	let mut report = SetReport {
		label,
		total: 0,
		misclassified: 0,
		skipped: 0,
	};
	let mut current = 0;

	for chunk in paths.chunks(chunk_size.max(1)) {
		for result in describe_chunk(extractor, chunk) {
			progress.tick(current);
			current += 1;

			match skip_unreadable(result)? {
				Some(features) => {
					report.total += 1;
					if model.predict(&features) != label {
						report.misclassified += 1;
					}
				}
				None => report.skipped += 1,
			}
		}
	}

	Ok(report)
}

pub fn evaluate<C, E>(model: &C, extractor: &E, config: &EvaluateConfig) -> Result<EvaluationReport>
where
	C: Classifier,
	E: FeatureExtractor + Sync,
{
	if model.dimension() != extractor.feature_len() {
		return Err(Error::ModelWidth {
			model: model.dimension(),
			features: extractor.feature_len(),
		});
	}

	log::info!("Using positive test image directory '{}'...", config.positive_dir.display());
	let positives = resolve(&config.positive_dir)?;
	log::info!("Found {} positive test images.", positives.len());

	log::info!("Using negative test image directory '{}'...", config.negative_dir.display());
	let negatives = resolve(&config.negative_dir)?;
	log::info!("Found {} negative test images.", negatives.len());

	let mut reports = Vec::with_capacity(2);
	for (paths, label) in [(&positives, Label::Positive), (&negatives, Label::Negative)] {
		let mut progress = Progress::new(io::stderr(), paths.len(), format!("Testing against {} images...", label));
		reports.push(classify_paths(model, extractor, paths, label, config.chunk_size, &mut progress)?);
		progress.done();
	}

	Ok(EvaluationReport {
		model: model.describe(),
		positive: reports[0],
		negative: reports[1],
	})
}
