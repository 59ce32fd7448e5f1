use chapex_core::annotate::Domain;
use chapex_core::chapters::{parse_page_range, ChapterPlan, ChapterRange};
use chapex_core::config::{self, ExtractOptions};
use chapex_core::error::ChapexError;
use chapex_core::extraction::poppler::PopplerProvider;
use chapex_core::pipeline::{extract_document, CancelToken};
use std::path::PathBuf;
use tracing::info;

use crate::output;

pub struct ExtractArgs {
    pub pdf: PathBuf,
    pub out: PathBuf,
    pub domain: Option<String>,
    pub config: Option<PathBuf>,
    pub items: Vec<usize>,
    pub groups: Vec<String>,
    pub ranges: Vec<String>,
    pub output: String,
}

pub fn run(args: ExtractArgs) -> Result<(), ChapexError> {
    let mut options = match &args.config {
        Some(path) => config::load_options(path)?,
        None => ExtractOptions::default(),
    };
    if let Some(domain) = &args.domain {
        options.domain = domain.parse::<Domain>().map_err(ChapexError::ConfigInvalid)?;
    }
    config::validate_options(&options)?;

    let plan = build_plan(&args.items, &args.groups, &args.ranges)?;
    let provider = PopplerProvider::new();

    let mut last_logged = 0;
    let report = extract_document(
        &provider,
        &args.pdf,
        &plan,
        &args.out,
        &options,
        &CancelToken::new(),
        &mut |fraction: f32| {
            let percent = (fraction * 100.0).round() as u32;
            if percent > last_logged {
                info!("progress {percent}%");
                last_logged = percent;
            }
        },
    )?;

    match args.output.as_str() {
        "json" => output::json::print(&report)?,
        _ => output::table::print_report(&report),
    }

    if !report.failed.is_empty() {
        return Err(ChapexError::Extraction(format!(
            "{} of {} chapter(s) failed",
            report.failed.len(),
            report.failed.len() + report.written.len()
        )));
    }
    Ok(())
}

/// Manual ranges win over groups, groups over single items, and with
/// nothing selected every top-level chapter is extracted.
fn build_plan(
    items: &[usize],
    groups: &[String],
    ranges: &[String],
) -> Result<ChapterPlan, ChapexError> {
    if !ranges.is_empty() {
        let ranges = ranges
            .iter()
            .enumerate()
            .map(|(i, r)| parse_manual_range(r, i + 1))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ChapterPlan::Manual(ranges));
    }
    if !groups.is_empty() {
        let groups = groups
            .iter()
            .map(|g| parse_group(g))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ChapterPlan::Groups(groups));
    }
    if !items.is_empty() {
        return Ok(ChapterPlan::Items(items.to_vec()));
    }
    Ok(ChapterPlan::TopLevel)
}

/// `START-END` or `START-END:TITLE`, 1-based inclusive.
fn parse_manual_range(arg: &str, index: usize) -> Result<ChapterRange, ChapexError> {
    let (span, title) = match arg.split_once(':') {
        Some((span, title)) => (span, title.trim().to_string()),
        None => (arg, String::new()),
    };
    let (start_page, end_page) = parse_page_range(span)?;
    let title = if title.is_empty() {
        format!("Pages {}-{}", start_page + 1, end_page + 1)
    } else {
        title
    };
    Ok(ChapterRange {
        index,
        title,
        start_page,
        end_page,
    })
}

/// `A-B` expands to every item in between; `A,B,C` is taken as listed.
fn parse_group(arg: &str) -> Result<Vec<usize>, ChapexError> {
    let bad = || ChapexError::ConfigInvalid(format!("invalid group '{arg}'. Use A-B or A,B,C"));
    if let Some((a, b)) = arg.split_once('-') {
        let a: usize = a.trim().parse().map_err(|_| bad())?;
        let b: usize = b.trim().parse().map_err(|_| bad())?;
        if b < a {
            return Err(bad());
        }
        return Ok((a..=b).collect());
    }
    arg.split(',')
        .map(|s| s.trim().parse().map_err(|_| bad()))
        .collect()
}
