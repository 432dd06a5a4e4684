use std::path::PathBuf;

use crate::error::Result;
use crate::hog::{HogDescriptor, HogGeometry, DEFAULT_WINDOW};
use crate::svm::{AutoTune, LinearSvmBuilder};

#[derive(Debug, Clone)]
pub struct ExtractConfig {
	pub source_dir: PathBuf,
	pub window: (u32, u32),
	pub geometry: HogGeometry,
	/// Images decoded and described in parallel before their rows are written.
	pub chunk_size: usize,
}

impl Default for ExtractConfig {
	fn default() -> Self {
		Self {
			source_dir: PathBuf::from("pos"),
			window: DEFAULT_WINDOW,
			geometry: HogGeometry::default(),
			chunk_size: 64,
		}
	}
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
	pub positive: PathBuf,
	pub negative: PathBuf,
	pub auto_train: bool,
}

impl Default for TrainConfig {
	fn default() -> Self {
		Self {
			positive: PathBuf::from("positive.bin"),
			negative: PathBuf::from("negative.bin"),
			auto_train: false,
		}
	}
}

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
	pub positive_dir: PathBuf,
	pub negative_dir: PathBuf,
	pub window: (u32, u32),
	pub geometry: HogGeometry,
	pub chunk_size: usize,
}

impl Default for EvaluateConfig {
	fn default() -> Self {
		Self {
			positive_dir: PathBuf::from("pos"),
			negative_dir: PathBuf::from("neg"),
			window: DEFAULT_WINDOW,
			geometry: HogGeometry::default(),
			chunk_size: 64,
		}
	}
}

impl ExtractConfig {
	pub fn descriptor(&self) -> Result<HogDescriptor> {
		HogDescriptor::new(self.window, self.geometry)
	}
}

impl TrainConfig {
	pub fn svm(&self) -> LinearSvmBuilder {
		LinearSvmBuilder {
			auto: if self.auto_train { Some(AutoTune::default()) } else { None },
			..LinearSvmBuilder::default()
		}
	}
}

impl EvaluateConfig {
	pub fn descriptor(&self) -> Result<HogDescriptor> {
		HogDescriptor::new(self.window, self.geometry)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::hog::FeatureExtractor;

	#[test]
	fn defaults_match_the_tools() {
		let extract = ExtractConfig::default();
		assert_eq!(extract.source_dir, PathBuf::from("pos"));
		assert_eq!(extract.window, (64, 128));

		let train = TrainConfig::default();
		assert_eq!(train.positive, PathBuf::from("positive.bin"));
		assert_eq!(train.negative, PathBuf::from("negative.bin"));
		assert!(train.svm().auto.is_none());

		let evaluate = EvaluateConfig::default();
		assert_eq!(evaluate.positive_dir, PathBuf::from("pos"));
		assert_eq!(evaluate.negative_dir, PathBuf::from("neg"));
	}

	#[test]
	fn extract_and_evaluate_describe_alike() {
		let extract = ExtractConfig::default().descriptor().unwrap();
		let evaluate = EvaluateConfig::default().descriptor().unwrap();
		assert_eq!(extract.feature_len(), evaluate.feature_len());
	}

	#[test]
	fn auto_train_enables_the_search() {
		let config = TrainConfig { auto_train: true, ..Default::default() };
		assert!(config.svm().auto.is_some());
	}
}
