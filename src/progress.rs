use std::io::{self, Write};

/// Percentage progress line for one loop, redrawn only when the percentage changes.
pub struct Progress<W: Write = io::Stderr> {
	out: W,
	total: usize,
	message: String,
	last: Option<usize>,
}

impl Progress<io::Stderr> {
	pub fn stderr(total: usize, message: impl Into<String>) -> Self {
		Self::new(io::stderr(), total, message)
	}
}

impl<W: Write> Progress<W> {
	pub fn new(out: W, total: usize, message: impl Into<String>) -> Self {
		Self {
			out,
			total,
			message: message.into(),
			last: None,
		}
	}

	/// Reports that item `current` (zero based) is being processed.
	pub fn tick(&mut self, current: usize) {
		if self.total == 0 {
			return;
		}

		let percent = (current + 1) * 100 / self.total;
		if self.last != Some(percent) {
			self.last = Some(percent);
			// progress output is best effort
			let _ = write!(self.out, "\r[{:3}%] {}", percent, self.message);
			let _ = self.out.flush();
		}
	}

	pub fn done(mut self) -> W {
		let _ = writeln!(self.out, " Done.");
		self.out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redraws_once_per_percent() {
		let mut progress = Progress::new(Vec::new(), 200, "Processing examples...");
		for i in 0..200 {
			progress.tick(i);
		}
		let out = String::from_utf8(progress.done()).unwrap();

		assert_eq!(out.matches('\r').count(), 101);
		assert!(out.starts_with("\r[  0%] Processing examples..."));
		assert!(out.ends_with("\r[100%] Processing examples... Done.\n"));
	}

	#[test]
	fn small_totals_print_every_step() {
		let mut progress = Progress::new(Vec::new(), 3, "x");
		for i in 0..3 {
			progress.tick(i);
		}
		let out = String::from_utf8(progress.done()).unwrap();

		assert_eq!(out, "\r[ 33%] x\r[ 66%] x\r[100%] x Done.\n");
	}

	#[test]
	fn reporters_do_not_share_state() {
		let mut first = Progress::new(Vec::new(), 1, "a");
		first.tick(0);
		let mut second = Progress::new(Vec::new(), 1, "b");
		second.tick(0);

		assert_eq!(String::from_utf8(first.done()).unwrap(), "\r[100%] a Done.\n");
		assert_eq!(String::from_utf8(second.done()).unwrap(), "\r[100%] b Done.\n");
	}

	#[test]
	fn empty_loops_only_finish() {
		let progress = Progress::new(Vec::new(), 0, "nothing");
		assert_eq!(String::from_utf8(progress.done()).unwrap(), " Done.\n");
	}
}
