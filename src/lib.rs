//! Train and test a binary HOG + linear SVM image classifier.
//!
//! Features for a directory of images are extracted into a feature-set file
//! ([`codec`]), a positive and a negative feature set are assembled into one
//! labelled dataset ([`assembler`]) to train a [`svm::LinearSvm`], and the model
//! is evaluated against held-out image directories ([`pipeline`]).

pub mod assembler;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod hog;
pub mod image_set;
pub mod pipeline;
pub mod progress;
pub mod svm;

pub use error::{Error, Result};
