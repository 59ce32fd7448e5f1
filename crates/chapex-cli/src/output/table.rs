use chapex_core::chapters::{ChapterRange, TocItem};
use chapex_core::pipeline::ExtractionReport;

pub fn print_chapters(chapters: &[ChapterRange]) {
    println!("{} chapter(s)\n", chapters.len());
    for ch in chapters {
        println!(
            "  {:>3}  pp. {:>4}-{:<4}  {}",
            ch.index,
            ch.start_page + 1,
            ch.end_page + 1,
            ch.title
        );
    }
}

pub fn print_items(items: &[TocItem]) {
    println!("{} TOC item(s)\n", items.len());
    for item in items {
        let indent = "  ".repeat(item.level.saturating_sub(1));
        println!(
            "  {:>3}  pp. {:>4}-{:<4}  {}{}",
            item.index,
            item.start_page + 1,
            item.end_page + 1,
            indent,
            item.title
        );
    }
}

pub fn print_report(report: &ExtractionReport) {
    if !report.written.is_empty() {
        println!("Written:\n");
        let max_title = report
            .written
            .iter()
            .map(|w| w.title.chars().count())
            .max()
            .unwrap_or(10);
        for w in &report.written {
            println!(
                "  {:>3}  {:<width$}  {:>3} page(s)  {:>3} figure(s)  {}",
                w.chapter_index,
                w.title,
                w.pages,
                w.images,
                w.path.display(),
                width = max_title
            );
        }
        println!();
    }

    if !report.failed.is_empty() {
        println!("Failed:\n");
        for f in &report.failed {
            println!("  {:>3}  {}", f.chapter_index, f.title);
            println!("       {}", f.error);
        }
        println!();
    }

    if report.cancelled {
        println!("Extraction was cancelled before all chapters were processed.");
    }
}
