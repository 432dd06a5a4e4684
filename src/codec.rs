//! Binary feature-set files.
//!
//! ```text
//! offset 0   7 bytes  magic, "HOGSNRT" once finished, "INVALID" while being written
//! offset 7   i32      row count
//! offset 11  i32      feature width
//! offset 15  f32 * rows * width, row-major
//! ```
//!
//! All numbers are in native byte order. The header is reserved with the
//! placeholder magic before any row is written and back-patched by
//! [`FeatureSetWriter::finish`], so an interrupted write never reads back as valid.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};

use crate::dataset::FeatureMatrix;

pub const MAGIC: &[u8; 7] = b"HOGSNRT";
pub const PLACEHOLDER: &[u8; 7] = b"INVALID";
pub const HEADER_LEN: u64 = 15;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
	#[error("bad feature file header")]
	InvalidFormat,
	#[error("prematurely truncated feature file")]
	TruncatedFile,
	#[error("row {row} has {found} features, expected {expected}")]
	RaggedRow { row: usize, expected: usize, found: usize },
	#[error("{0} doesn't fit in the header")]
	TooLarge(&'static str),
	#[error("destination holds {found} values but the file has {expected}")]
	Destination { expected: usize, found: usize },
	#[error(transparent)]
	Io(#[from] io::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Header {
	pub rows: usize,
	pub width: usize,
}

impl Header {
	pub fn values_len(&self) -> usize {
		self.rows * self.width
	}
}

fn write_header<W: Write + Seek>(writer: &mut W, magic: &[u8; 7], rows: usize, width: usize) -> Result<(), CodecError> {
	let rows = i32::try_from(rows).map_err(|_| CodecError::TooLarge("row count"))?;
	let width = i32::try_from(width).map_err(|_| CodecError::TooLarge("feature width"))?;

	writer.seek(SeekFrom::Start(0))?;
	writer.write_all(magic)?;
	writer.write_i32::<NativeEndian>(rows)?;
	writer.write_i32::<NativeEndian>(width)?;

	Ok(())
}

/// Streams feature rows into a seekable sink.
///
/// Construction reserves the header, [`append`](Self::append) adds rows and
/// [`finish`](Self::finish) consumes the writer to back-patch the header.
pub struct FeatureSetWriter<W: Write + Seek> {
	inner: W,
	rows: usize,
	width: Option<usize>,
}

impl<W: Write + Seek> FeatureSetWriter<W> {
	pub fn new(mut inner: W) -> Result<Self, CodecError> {
		write_header(&mut inner, PLACEHOLDER, 0, 0)?;

		Ok(Self {
			inner,
			rows: 0,
			width: None,
		})
	}

	pub fn append(&mut self, row: &[f32]) -> Result<(), CodecError> {
		let width = *self.width.get_or_insert(row.len());
		if row.len() != width {
			return Err(CodecError::RaggedRow {
				row: self.rows,
				expected: width,
				found: row.len(),
			});
		}

		for &value in row {
			self.inner.write_f32::<NativeEndian>(value)?;
		}
		self.rows += 1;

		Ok(())
	}

	pub fn rows_len(&self) -> usize {
		self.rows
	}

	pub fn features_len(&self) -> Option<usize> {
		self.width
	}

	pub fn finish(mut self) -> Result<W, CodecError> {
		write_header(&mut self.inner, MAGIC, self.rows, self.width.unwrap_or(0))?;
		self.inner.seek(SeekFrom::End(0))?;
		self.inner.flush()?;

		Ok(self.inner)
	}
}

/// A feature-set stream whose header has been validated.
///
/// The rows can be consumed once, either into caller storage with
/// [`read_into`](Self::read_into) or into a new matrix with [`read_set`](Self::read_set).
#[derive(Debug)]
pub struct FeatureSetReader<R: Read> {
	inner: R,
	header: Header,
}

impl<R: Read + Seek> FeatureSetReader<R> {
	/// Validates the header and checks that the stream holds the whole body
	/// before anything is allocated for it.
	pub fn open(mut inner: R) -> Result<Self, CodecError> {
		let mut magic = [0u8; 7];
		inner.read_exact(&mut magic).map_err(|e| match e.kind() {
			io::ErrorKind::UnexpectedEof => CodecError::InvalidFormat,
			_ => CodecError::Io(e),
		})?;

		if &magic != MAGIC {
			return Err(CodecError::InvalidFormat);
		}

		let rows = inner.read_i32::<NativeEndian>().map_err(truncated)?;
		let width = inner.read_i32::<NativeEndian>().map_err(truncated)?;

		let rows = usize::try_from(rows).map_err(|_| CodecError::InvalidFormat)?;
		let width = usize::try_from(width).map_err(|_| CodecError::InvalidFormat)?;
		if rows > 0 && width == 0 {
			return Err(CodecError::InvalidFormat);
		}

		let body = (rows as u64)
			.checked_mul(width as u64)
			.and_then(|values| values.checked_mul(4))
			.ok_or(CodecError::InvalidFormat)?;
		usize::try_from(body).map_err(|_| CodecError::TruncatedFile)?;

		let here = inner.stream_position()?;
		let end = inner.seek(SeekFrom::End(0))?;
		inner.seek(SeekFrom::Start(here))?;
		if end.saturating_sub(here) < body {
			return Err(CodecError::TruncatedFile);
		}

		Ok(Self {
			inner,
			header: Header { rows, width },
		})
	}

	pub fn header(&self) -> Header {
		self.header
	}

	/// Reads every value of the body into `dst`, which must be exactly
	/// `rows * width` long. Slice a larger matrix to place rows at an offset.
	pub fn read_into(mut self, dst: &mut [f32]) -> Result<R, CodecError> {
		let expected = self.header.values_len();
		if dst.len() != expected {
			return Err(CodecError::Destination {
				expected,
				found: dst.len(),
			});
		}

		self.inner.read_f32_into::<NativeEndian>(dst).map_err(truncated)?;

		Ok(self.inner)
	}

	pub fn read_set(self) -> Result<FeatureMatrix, CodecError> {
		let Header { rows, width } = self.header;
		let mut matrix = FeatureMatrix::zeros(rows, width);
		self.read_into(matrix.row_range_mut(0, rows))?;

		Ok(matrix)
	}
}

fn truncated(e: io::Error) -> CodecError {
	match e.kind() {
		io::ErrorKind::UnexpectedEof => CodecError::TruncatedFile,
		_ => CodecError::Io(e),
	}
}

pub fn read_header<P: AsRef<Path>>(path: P) -> Result<Header, CodecError> {
	let file = File::open(path)?;
	Ok(FeatureSetReader::open(BufReader::new(file))?.header())
}
