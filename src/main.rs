use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use hogsnort::classifier::{load_model, Classifier};
use hogsnort::codec;
use hogsnort::config::{EvaluateConfig, ExtractConfig, TrainConfig};
use hogsnort::pipeline;
use hogsnort::svm::LinearSvm;
use hogsnort::Result;

#[derive(Parser)]
#[command(name = "hogsnort", about = "HOG feature extraction, SVM training and testing")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Extract HOG features for every image in a directory into a feature file.
	Extract {
		feature_file: PathBuf,

		/// Directory holding the image examples.
		#[arg(short = 'p', long = "path", default_value = "pos")]
		path: PathBuf,

		#[arg(long, default_value = "64")]
		width: u32,

		#[arg(long, default_value = "128")]
		height: u32,
	},
	/// Train a linear SVM from a positive and a negative feature file.
	Train {
		svm_file: PathBuf,

		#[arg(short = 'p', long = "pos", default_value = "positive.bin")]
		pos: PathBuf,

		#[arg(short = 'n', long = "neg", default_value = "negative.bin")]
		neg: PathBuf,

		/// Pick C by cross-validation instead of using the default.
		#[arg(short = 'a', long = "auto")]
		auto: bool,
	},
	/// Test a trained SVM against positive and negative image directories.
	Run {
		svm_file: PathBuf,

		#[arg(short = 'p', long = "pos", default_value = "pos")]
		pos: PathBuf,

		#[arg(short = 'n', long = "neg", default_value = "neg")]
		neg: PathBuf,

		#[arg(long, default_value = "64")]
		width: u32,

		#[arg(long, default_value = "128")]
		height: u32,
	},
	/// Print the header of a feature file.
	Inspect { feature_file: PathBuf },
}

fn extract(feature_file: &Path, config: ExtractConfig) -> Result<()> {
	let hog = config.descriptor()?;
	let summary = pipeline::extract(&config, &hog, feature_file)?;

	if summary.skipped > 0 {
		log::warn!("Skipped {} unreadable images.", summary.skipped);
	}
	println!("Wrote features to '{}'.", feature_file.display());

	Ok(())
}

fn train(svm_file: &Path, config: TrainConfig) -> Result<()> {
	let (model, _) = pipeline::train_to(&config, &config.svm(), svm_file)?;
	println!("Trained model written to '{}' (C = {}).", svm_file.display(), model.describe().c);

	Ok(())
}

fn evaluate(svm_file: &Path, config: EvaluateConfig) -> Result<()> {
	let model: LinearSvm = load_model(svm_file)?;
	println!("Using SVM model: '{}'", svm_file.display());

	let hog = config.descriptor()?;
	let report = pipeline::evaluate(&model, &hog, &config)?;
	println!("{}", report);

	Ok(())
}

fn inspect(feature_file: &Path) -> Result<()> {
	let header = codec::read_header(feature_file)?;
	println!("{}: {} rows x {} features", feature_file.display(), header.rows, header.width);

	Ok(())
}

fn dispatch(command: Command) -> Result<()> {
	match command {
		Command::Extract { feature_file, path, width, height } => extract(
			&feature_file,
			ExtractConfig {
				source_dir: path,
				window: (width, height),
				..Default::default()
			},
		),
		Command::Train { svm_file, pos, neg, auto } => train(
			&svm_file,
			TrainConfig {
				positive: pos,
				negative: neg,
				auto_train: auto,
			},
		),
		Command::Run { svm_file, pos, neg, width, height } => evaluate(
			&svm_file,
			EvaluateConfig {
				positive_dir: pos,
				negative_dir: neg,
				window: (width, height),
				..Default::default()
			},
		),
		Command::Inspect { feature_file } => inspect(&feature_file),
	}
}

/// Parses `args` and runs the command, returning the process exit status:
/// 0 for success and help, 1 for usage and pipeline errors.
fn exit_code<I, T>(args: I) -> i32
where
	I: IntoIterator<Item = T>,
	T: Into<OsString> + Clone,
{
	let cli = match Cli::try_parse_from(args) {
		Ok(cli) => cli,
		Err(e) => {
			let _ = e.print();
			return if e.use_stderr() { 1 } else { 0 };
		}
	};

	match dispatch(cli.command) {
		Ok(()) => 0,
		Err(e) => {
			log::error!("{}", e);
			1
		}
	}
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	process::exit(exit_code(std::env::args_os()));
}
