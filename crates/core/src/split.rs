use crate::error::SplitError;
use crate::renamer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes every page of `pdf_path` to its own file in `output_dir`, named
/// `{stem}_{prefix}_{NNN}.pdf`. Existing files are never overwritten.
#[cfg(feature = "pdf")]
pub fn split_pdf(pdf_path: &Path, output_dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, SplitError> {
    let pdf_err = |e: lopdf::Error| SplitError::Pdf {
        path: pdf_path.to_path_buf(),
        message: e.to_string(),
    };
    let bytes = fs::read(pdf_path)?;
    let source = lopdf::Document::load_mem(&bytes).map_err(pdf_err)?;
    let page_numbers: Vec<u32> = source.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(SplitError::Pdf {
            path: pdf_path.to_path_buf(),
            message: "document has no pages".to_string(),
        });
    }
    fs::create_dir_all(output_dir)?;

    let stem = pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(renamer::sanitize_component)
        .unwrap_or_else(|| "document".to_string());
    let prefix = renamer::sanitize_component(prefix);

    let mut outputs = Vec::with_capacity(page_numbers.len());
    for &page in &page_numbers {
        let mut doc = source.clone();
        let others: Vec<u32> = page_numbers.iter().copied().filter(|&p| p != page).collect();
        doc.delete_pages(&others);
        doc.prune_objects();

        let name = format!("{stem}_{prefix}_{page:03}.pdf");
        let plan = renamer::next_available(
            renamer::plan(pdf_path, name, output_dir),
            Path::exists,
        );
        doc.save(&plan.new_path)?;
        info!(page, output = %plan.new_path.display(), "wrote page");
        outputs.push(plan.new_path);
    }
    Ok(outputs)
}

#[cfg(not(feature = "pdf"))]
pub fn split_pdf(_pdf_path: &Path, _output_dir: &Path, _prefix: &str) -> Result<Vec<PathBuf>, SplitError> {
    Err(SplitError::NotAvailable)
}
