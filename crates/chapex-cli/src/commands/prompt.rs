use chapex_core::error::ChapexError;
use chapex_core::record::load_chapter;
use chapex_core::study::{build_request, StudyKind, StudyOptions};
use std::path::Path;

pub fn run(
    chapter_dir: &Path,
    kind: &str,
    include_images: bool,
    diagram_only: bool,
    instruction: Option<String>,
    questions: usize,
) -> Result<(), ChapexError> {
    let kind = match kind {
        "explanation" => StudyKind::Explanation,
        "quiz" => StudyKind::Quiz,
        other => {
            return Err(ChapexError::ConfigInvalid(format!(
                "unknown kind '{other}'. Expected explanation or quiz"
            )))
        }
    };
    let options = StudyOptions {
        include_images,
        diagram_only,
        user_instruction: instruction.unwrap_or_default(),
        quiz_questions: questions,
    };

    let record = load_chapter(chapter_dir)?;
    let request = build_request(&record, kind, &options);

    println!("=== system ===\n");
    println!("{}\n", request.system);
    println!("=== prompt ({kind}) ===\n");
    println!("{}", request.prompt);
    Ok(())
}
