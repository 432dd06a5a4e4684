use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::codec::FeatureSetReader;
use crate::dataset::{FeatureMatrix, Label, LabeledDataset};
use crate::error::{Error, Result};

struct Opened {
	label: Label,
	path: PathBuf,
	reader: FeatureSetReader<BufReader<File>>,
}

fn open_features(path: &Path, label: Label) -> Result<Opened> {
	let file = File::open(path).map_err(|source| Error::UnreadableFile {
		label: match label {
			Label::Positive => "positive features",
			Label::Negative => "negative features",
		},
		path: path.to_path_buf(),
		source,
	})?;
	log::info!("Using {} features file '{}'...", label, path.display());

	let reader = FeatureSetReader::open(BufReader::new(file)).map_err(|source| Error::FeatureSet {
		label,
		path: path.to_path_buf(),
		source,
	})?;
	log::info!("Found {} {} examples...", reader.header().rows, label);

	Ok(Opened {
		label,
		path: path.to_path_buf(),
		reader,
	})
}

impl Opened {
	fn read_into(self, matrix: &mut FeatureMatrix, start: usize) -> Result<()> {
		let Opened { label, path, reader } = self;
		let rows = reader.header().rows;

		log::info!("Reading {} examples...", label);
		reader
			.read_into(matrix.row_range_mut(start, rows))
			.map_err(|source| Error::FeatureSet { label, path, source })?;

		Ok(())
	}
}

/// Loads a positive and a negative feature file into one labelled dataset.
///
/// Positive rows come first and are labelled +1, negative rows follow with -1.
/// Both headers are validated and their widths compared before anything is allocated.
pub fn assemble<P: AsRef<Path>, N: AsRef<Path>>(positive: P, negative: N) -> Result<LabeledDataset> {
	let positive = open_features(positive.as_ref(), Label::Positive)?;
	let negative = open_features(negative.as_ref(), Label::Negative)?;

	let pos = positive.reader.header();
	let neg = negative.reader.header();

	// an empty set is written with width 0 and constrains nothing
	let width = match (pos.rows, neg.rows) {
		(0, _) => neg.width,
		(_, 0) => pos.width,
		_ if pos.width == neg.width => pos.width,
		_ => {
			return Err(Error::WidthMismatch {
				positive: pos.width,
				negative: neg.width,
			})
		}
	};

	let mut matrix = FeatureMatrix::zeros(pos.rows + neg.rows, width);
	positive.read_into(&mut matrix, 0)?;
	negative.read_into(&mut matrix, pos.rows)?;

	let labels = std::iter::repeat(Label::Positive)
		.take(pos.rows)
		.chain(std::iter::repeat(Label::Negative).take(neg.rows))
		.collect();

	LabeledDataset::new(matrix, labels)
}
