//! Core library: text extraction, rule-based classification, file naming.

pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod renamer;
pub mod rules;
pub mod split;

#[cfg(all(test, feature = "pdf"))]
mod test_support;
