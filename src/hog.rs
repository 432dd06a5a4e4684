//! Histogram-of-oriented-gradients features.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::error::{Error, Result};

pub const DEFAULT_WINDOW: (u32, u32) = (64, 128);

/// Turns a window-sized grayscale image into a feature vector.
///
/// Two calls with images of the same window size must return vectors of the same length.
pub trait FeatureExtractor {
	fn window(&self) -> (u32, u32);
	fn feature_len(&self) -> usize;
	fn extract(&self, image: &GrayImage) -> Vec<f32>;
}

/// Decodes the image at `path` as 8-bit grayscale and resizes it to `window`.
pub fn load_window(path: &Path, window: (u32, u32)) -> Result<GrayImage> {
	let image = image::open(path).map_err(|source| Error::Image {
		path: path.to_path_buf(),
		source,
	})?;

	let gray = image.to_luma8();
	if gray.dimensions() == window {
		return Ok(gray);
	}

	Ok(imageops::resize(&gray, window.0, window.1, FilterType::Triangle))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HogGeometry {
	pub block: (u32, u32),
	pub block_stride: (u32, u32),
	pub cell: (u32, u32),
	pub bins: usize,
}

impl Default for HogGeometry {
	fn default() -> Self {
		Self {
			block: (8, 8),
			block_stride: (4, 4),
			cell: (4, 4),
			bins: 9,
		}
	}
}

#[derive(Debug, Clone)]
pub struct HogDescriptor {
	window: (u32, u32),
	geometry: HogGeometry,
}

impl HogDescriptor {
	pub fn new(window: (u32, u32), geometry: HogGeometry) -> Result<Self> {
		let HogGeometry { block, block_stride, cell, bins } = geometry;
		let axes = [
			("width", window.0, block.0, block_stride.0, cell.0),
			("height", window.1, block.1, block_stride.1, cell.1),
		];

		if bins == 0 {
			return Err(Error::Geometry("at least one orientation bin is needed".into()));
		}

		for &(axis, window, block, stride, cell) in &axes {
			if cell == 0 || stride == 0 {
				return Err(Error::Geometry(format!("cell and stride {} must be positive", axis)));
			}
			if block < cell || block % cell != 0 {
				return Err(Error::Geometry(format!("block {} {} is not a multiple of cell {} {}", axis, block, axis, cell)));
			}
			if stride % cell != 0 {
				return Err(Error::Geometry(format!("block stride {} {} is not a multiple of cell {} {}", axis, stride, axis, cell)));
			}
			if window < block || (window - block) % stride != 0 {
				return Err(Error::Geometry(format!("window {} {} doesn't fit whole blocks", axis, window)));
			}
		}

		Ok(Self { window, geometry })
	}

	pub fn geometry(&self) -> HogGeometry {
		self.geometry
	}

	fn blocks(&self) -> (usize, usize) {
		let g = &self.geometry;
		(
			((self.window.0 - g.block.0) / g.block_stride.0 + 1) as usize,
			((self.window.1 - g.block.1) / g.block_stride.1 + 1) as usize,
		)
	}

	fn cells_per_block(&self) -> (usize, usize) {
		let g = &self.geometry;
		((g.block.0 / g.cell.0) as usize, (g.block.1 / g.cell.1) as usize)
	}

	fn block_len(&self) -> usize {
		let (cx, cy) = self.cells_per_block();
		cx * cy * self.geometry.bins
	}

	/// Per-cell orientation histograms, cells stored row by row.
	fn cell_histograms(&self, image: &GrayImage) -> Vec<f32> {
		let (width, height) = image.dimensions();
		let (cell_w, cell_h) = self.geometry.cell;
		let bins = self.geometry.bins;
		let cells_x = (width / cell_w) as usize;
		let cells_y = (height / cell_h) as usize;
		let bin_width = 180.0 / bins as f32;

		let pixel = |x: i64, y: i64| -> f32 {
			let x = x.clamp(0, width as i64 - 1) as u32;
			let y = y.clamp(0, height as i64 - 1) as u32;
			image.get_pixel(x, y)[0] as f32
		};

		let mut histograms = vec![0.0f32; cells_x * cells_y * bins];
		for y in 0..cells_y as u32 * cell_h {
			for x in 0..cells_x as u32 * cell_w {
				let (xi, yi) = (x as i64, y as i64);
				let dx = pixel(xi + 1, yi) - pixel(xi - 1, yi);
				let dy = pixel(xi, yi + 1) - pixel(xi, yi - 1);

				let magnitude = (dx * dx + dy * dy).sqrt();
				if magnitude == 0.0 {
					continue;
				}

				let mut angle = dy.atan2(dx).to_degrees();
				if angle < 0.0 {
					angle += 180.0;
				}
				if angle >= 180.0 {
					angle -= 180.0;
				}

				let position = angle / bin_width - 0.5;
				let low = position.floor();
				let fraction = position - low;
				let low_bin = (low as i64).rem_euclid(bins as i64) as usize;
				let high_bin = (low_bin + 1) % bins;

				let cell = (y / cell_h) as usize * cells_x + (x / cell_w) as usize;
				let histogram = &mut histograms[cell * bins..(cell + 1) * bins];
				histogram[low_bin] += magnitude * (1.0 - fraction);
				histogram[high_bin] += magnitude * fraction;
			}
		}

		histograms
	}
}

/// L2 normalisation, clipping at 0.2, then L2 again.
fn normalize_l2_hys(block: &mut [f32]) {
	let epsilon = block.len() as f32 * 0.1;
	let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
	let scale = 1.0 / (norm + epsilon);
	for v in block.iter_mut() {
		*v = (*v * scale).min(0.2);
	}

	let norm = block.iter().map(|v| v * v).sum::<f32>().sqrt();
	let scale = 1.0 / (norm + 1e-3);
	for v in block.iter_mut() {
		*v *= scale;
	}
}

impl FeatureExtractor for HogDescriptor {
	fn window(&self) -> (u32, u32) {
		self.window
	}

	fn feature_len(&self) -> usize {
		let (blocks_x, blocks_y) = self.blocks();
		blocks_x * blocks_y * self.block_len()
	}

	fn extract(&self, image: &GrayImage) -> Vec<f32> {
		let resized;
		let image = if image.dimensions() == self.window {
			image
		} else {
			resized = imageops::resize(image, self.window.0, self.window.1, FilterType::Triangle);
			&resized
		};

		let histograms = self.cell_histograms(image);
		let bins = self.geometry.bins;
		let cells_x = (self.window.0 / self.geometry.cell.0) as usize;
		let (blocks_x, blocks_y) = self.blocks();
		let (block_cells_x, block_cells_y) = self.cells_per_block();
		let stride_cells_x = (self.geometry.block_stride.0 / self.geometry.cell.0) as usize;
		let stride_cells_y = (self.geometry.block_stride.1 / self.geometry.cell.1) as usize;

		let mut features = Vec::with_capacity(self.feature_len());
		let mut block = Vec::with_capacity(self.block_len());

		for bx in 0..blocks_x {
			for by in 0..blocks_y {
				block.clear();
				for cx in bx * stride_cells_x..bx * stride_cells_x + block_cells_x {
					for cy in by * stride_cells_y..by * stride_cells_y + block_cells_y {
						let cell = cy * cells_x + cx;
						block.extend_from_slice(&histograms[cell * bins..(cell + 1) * bins]);
					}
				}

				normalize_l2_hys(&mut block);
				features.extend_from_slice(&block);
			}
		}

		features
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use image::Luma;

	fn descriptor() -> HogDescriptor {
		HogDescriptor::new(DEFAULT_WINDOW, HogGeometry::default()).unwrap()
	}

	fn stripes(width: u32, height: u32, vertical: bool) -> GrayImage {
		GrayImage::from_fn(width, height, |x, y| {
			let band = if vertical { x / 8 } else { y / 8 };
			Luma([if band % 2 == 0 { 30 } else { 220 }])
		})
	}

	#[test]
	fn default_window_length() {
		// 15 x 31 blocks of 2 x 2 cells with 9 bins each
		assert_eq!(descriptor().feature_len(), 16740);
	}

	#[test]
	fn extracted_length_matches_feature_len() {
		let hog = descriptor();
		assert_eq!(hog.extract(&stripes(64, 128, true)).len(), hog.feature_len());

		let small = HogDescriptor::new((16, 16), HogGeometry::default()).unwrap();
		assert_eq!(small.feature_len(), 3 * 3 * 4 * 9);
		assert_eq!(small.extract(&stripes(16, 16, false)).len(), small.feature_len());
	}

	#[test]
	fn flat_image_has_no_gradients() {
		let flat = GrayImage::from_pixel(64, 128, Luma([128]));
		assert!(descriptor().extract(&flat).iter().all(|&v| v == 0.0));
	}

	#[test]
	fn orientation_is_captured() {
		let hog = descriptor();
		let vertical = hog.extract(&stripes(64, 128, true));
		let horizontal = hog.extract(&stripes(64, 128, false));

		assert!(vertical.iter().any(|&v| v > 0.0));
		assert_ne!(vertical, horizontal);
		assert!(vertical.iter().all(|&v| v.is_finite() && v >= 0.0 && v <= 1.0));
	}

	#[test]
	fn extraction_is_deterministic() {
		let hog = descriptor();
		let image = stripes(64, 128, true);
		assert_eq!(hog.extract(&image), hog.extract(&image));
	}

	#[test]
	fn off_size_images_are_resized() {
		let hog = descriptor();
		assert_eq!(hog.extract(&stripes(100, 50, true)).len(), hog.feature_len());
	}

	#[test]
	fn bad_geometry_is_rejected() {
		assert!(matches!(HogDescriptor::new((4, 4), HogGeometry::default()), Err(Error::Geometry(_))));
		assert!(matches!(HogDescriptor::new((66, 128), HogGeometry::default()), Err(Error::Geometry(_))));

		let geometry = HogGeometry { cell: (3, 3), ..HogGeometry::default() };
		assert!(matches!(HogDescriptor::new(DEFAULT_WINDOW, geometry), Err(Error::Geometry(_))));

		let geometry = HogGeometry { bins: 0, ..HogGeometry::default() };
		assert!(matches!(HogDescriptor::new(DEFAULT_WINDOW, geometry), Err(Error::Geometry(_))));
	}

	#[test]
	fn load_window_converts_and_resizes() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("wide.png");
		image::RgbImage::from_pixel(40, 20, image::Rgb([10, 200, 30])).save(&path).unwrap();

		let window = load_window(&path, DEFAULT_WINDOW).unwrap();
		assert_eq!(window.dimensions(), DEFAULT_WINDOW);
	}

	#[test]
	fn load_window_reports_corrupt_images() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("broken.png");
		std::fs::write(&path, b"definitely not a png").unwrap();

		assert!(matches!(load_window(&path, DEFAULT_WINDOW), Err(Error::Image { .. })));
	}
}
