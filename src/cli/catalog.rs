//! Catalog command - print the quality model

use super::Session;
use anyhow::Result;
use archqual::measures::MeasureLibrary;
use archqual::reporters::{render_catalog, OutputFormat};

pub fn run(session: &Session, format: OutputFormat) -> Result<()> {
    let library = MeasureLibrary::builtin();
    println!("{}", render_catalog(&session.quality_model, &library, format)?);
    Ok(())
}
