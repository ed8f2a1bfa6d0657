//! # curate CLI
//!
//! Command-line interface for the dataset curator.
//!
//! ## Usage
//! ```bash
//! curate scan ~/datasets/raw
//! curate export ~/datasets/raw --out ~/datasets/curated --verbose
//! ```

mod cli;

use dataset_curator::Result;

fn main() -> Result<()> {
    cli::run()
}
