use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "jpg", "jpeg", "png", "ppm", "pgm"];

/// Everything after the last `.`, lower-cased. A name without a dot is its own extension.
fn extension(file_name: &str) -> String {
	file_name
		.rsplit('.')
		.next()
		.unwrap_or(file_name)
		.to_lowercase()
}

pub fn is_image_file_name(file_name: &str) -> bool {
	IMAGE_EXTENSIONS.contains(&extension(file_name).as_str())
}

/// Lists the image files directly inside `dir`, in the order the filesystem
/// returns them. Subdirectories are ignored and other files are skipped with a warning.
pub fn resolve<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
	let dir = dir.as_ref();
	let unreadable = |source| Error::DirectoryUnreadable {
		path: dir.to_path_buf(),
		source,
	};

	let mut paths = Vec::new();
	for entry in fs::read_dir(dir).map_err(unreadable)? {
		let entry = entry.map_err(unreadable)?;

		if entry.file_type().map_err(unreadable)?.is_dir() {
			continue;
		}

		let file_name = entry.file_name();
		let file_name = file_name.to_string_lossy();
		if !is_image_file_name(&file_name) {
			log::warn!("Skipping {}...", file_name);
			continue;
		}

		paths.push(entry.path());
	}

	Ok(paths)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;

	#[test]
	fn extensions_are_case_insensitive() {
		assert!(is_image_file_name("a.PNG"));
		assert!(is_image_file_name("photo.final.JpEg"));
		assert!(is_image_file_name("scan.pgm"));
		assert!(!is_image_file_name("b.txt"));
		assert!(!is_image_file_name("c"));
		assert!(!is_image_file_name("png"));
		assert!(!is_image_file_name("archive.png.gz"));
	}

	#[test]
	fn only_image_files_are_resolved() {
		let dir = tempfile::tempdir().unwrap();
		File::create(dir.path().join("a.PNG")).unwrap();
		File::create(dir.path().join("b.txt")).unwrap();
		File::create(dir.path().join("c")).unwrap();
		fs::create_dir(dir.path().join("d")).unwrap();

		let paths = resolve(dir.path()).unwrap();

		assert_eq!(paths, vec![dir.path().join("a.PNG")]);
	}

	#[test]
	fn directories_named_like_images_are_skipped() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir(dir.path().join("nested.jpg")).unwrap();

		assert!(resolve(dir.path()).unwrap().is_empty());
	}

	#[test]
	fn missing_directory_is_unreadable() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("nope");

		match resolve(&missing) {
			Err(Error::DirectoryUnreadable { path, .. }) => assert_eq!(path, missing),
			other => panic!("unexpected result {:?}", other),
		}
	}
}
