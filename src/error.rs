use std::path::PathBuf;

use crate::codec::CodecError;
use crate::dataset::Label;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("couldn't open image directory '{}': {source}", path.display())]
	DirectoryUnreadable {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("couldn't open {label} file '{}': {source}", path.display())]
	UnreadableFile {
		label: &'static str,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("invalid {label} features file '{}': {source}", path.display())]
	FeatureSet {
		label: Label,
		path: PathBuf,
		#[source]
		source: CodecError,
	},
	#[error("positive features are {positive} wide but negative features are {negative} wide")]
	WidthMismatch { positive: usize, negative: usize },
	#[error("model expects {model} features but the extractor produces {features}")]
	ModelWidth { model: usize, features: usize },
	#[error("couldn't decode image '{}': {source}", path.display())]
	Image {
		path: PathBuf,
		#[source]
		source: image::ImageError,
	},
	#[error("invalid descriptor geometry: {0}")]
	Geometry(String),
	#[error("training failed: {0}")]
	Training(String),
	#[error("invalid model file '{}': {source}", path.display())]
	InvalidModel {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}
