use chapex_core::chapters::{resolve_all_items, resolve_top_level};
use chapex_core::error::ChapexError;
use chapex_core::extraction::poppler::PopplerProvider;
use chapex_core::extraction::DocumentGuard;
use std::path::Path;

use crate::output;

pub fn run(pdf: &Path, all: bool, output_format: &str) -> Result<(), ChapexError> {
    let provider = PopplerProvider::new();
    let doc = DocumentGuard::open(&provider, pdf)?;
    let toc = doc.table_of_contents()?;
    let page_count = doc.page_count();

    if all {
        let items = resolve_all_items(&toc, page_count)?;
        match output_format {
            "json" => output::json::print(&items)?,
            _ => output::table::print_items(&items),
        }
    } else {
        let chapters = resolve_top_level(&toc, page_count)?;
        match output_format {
            "json" => output::json::print(&chapters)?,
            _ => output::table::print_chapters(&chapters),
        }
    }

    Ok(())
}
