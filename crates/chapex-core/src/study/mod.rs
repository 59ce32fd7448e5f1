//! Study material generation from chapter records.
//!
//! Text generation itself is delegated to a [`TextGenerator`] supplied by the
//! caller; this module only prepares requests and stores the results.

pub mod prompt;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::error::ChapexError;
use crate::pipeline::{CancelToken, ChapterFailure};
use crate::record::load_chapter;

pub use prompt::build_request;

pub const MIN_QUIZ_QUESTIONS: usize = 5;
pub const MAX_QUIZ_QUESTIONS: usize = 8;

/// What to produce for a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyKind {
    Explanation,
    Quiz,
}

impl StudyKind {
    pub fn output_file(&self) -> &'static str {
        match self {
            StudyKind::Explanation => "easy_explanation.html",
            StudyKind::Quiz => "quiz.html",
        }
    }
}

impl fmt::Display for StudyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyKind::Explanation => write!(f, "explanation"),
            StudyKind::Quiz => write!(f, "quiz"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudyOptions {
    pub include_images: bool,
    /// Keep figures only, dropping tables.
    pub diagram_only: bool,
    /// Appended after every other instruction.
    pub user_instruction: String,
    pub quiz_questions: usize,
}

impl Default for StudyOptions {
    fn default() -> Self {
        StudyOptions {
            include_images: true,
            diagram_only: false,
            user_instruction: String::new(),
            quiz_questions: 6,
        }
    }
}

impl StudyOptions {
    pub fn question_count(&self) -> usize {
        self.quiz_questions
            .clamp(MIN_QUIZ_QUESTIONS, MAX_QUIZ_QUESTIONS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
}

/// An external text-generation service.
pub trait TextGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, ChapexError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<ChapterFailure>,
    pub cancelled: bool,
}

/// Wrap generator output in a minimal HTML document unless it already is one.
pub fn ensure_html_document(body: &str, title: &str) -> String {
    if body
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("<!doctype html")
    {
        return body.to_string();
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

fn generate_one(
    generator: &dyn TextGenerator,
    dir: &Path,
    kind: StudyKind,
    options: &StudyOptions,
) -> Result<PathBuf, ChapexError> {
    let record = load_chapter(dir)?;
    let request = build_request(&record, kind, options);
    let output = generator.generate(&request)?;
    if output.trim().is_empty() {
        return Err(ChapexError::Generation("generator returned no text".into()));
    }
    let html = ensure_html_document(&output, &record.title);
    let path = dir.join(kind.output_file());
    std::fs::write(&path, html)?;
    Ok(path)
}

/// Generate `kind` for each chapter directory in order.
pub fn generate_study_material(
    generator: &dyn TextGenerator,
    chapter_dirs: &[PathBuf],
    kind: StudyKind,
    options: &StudyOptions,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> StudyReport {
    let mut report = StudyReport::default();
    let total = chapter_dirs.len();
    progress(0.0);

    for (done, dir) in chapter_dirs.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(completed = done, total, "generation cancelled");
            report.cancelled = true;
            return report;
        }
        match generate_one(generator, dir, kind, options) {
            Ok(path) => {
                info!(kind = %kind, path = %path.display(), "wrote study material");
                report.written.push(path);
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "study material failed");
                report.failed.push(ChapterFailure {
                    chapter_index: done + 1,
                    title: dir.display().to_string(),
                    error: e.to_string(),
                });
            }
        }
        progress((done + 1) as f32 / total as f32);
    }

    progress(1.0);
    report
}
