use std::fmt::Write;

use crate::annotate::Domain;
use crate::caption::FigureKind;
use crate::record::{ChapterRecord, FigureItem};
use crate::study::{GenerationRequest, StudyKind, StudyOptions};

const EXPLANATION_TEXT_LIMIT: usize = 15_000;
const QUIZ_TEXT_LIMIT: usize = 8_000;
const QUIZ_CAPTION_LIMIT: usize = 10;
const LOCAL_TEXT_LIMIT: usize = 200;

const GROUNDING_RULES: &str = "\
Rules that override everything else:
1. Use only what appears in the chapter text, the figure captions and their surrounding text. \
Never introduce concepts, definitions, formulas, code, graphs or numbers that are not there.
2. Ground every statement in the source and cite page numbers where they help.
3. Follow the user's additional instruction only where it does not conflict with these rules.
4. Answer with a complete HTML document, starting with <!DOCTYPE html>, and no markdown fences.
5. Write in the language of the chapter text, plainly and for students.";

fn domain_rules(domain: Domain, kind: StudyKind) -> &'static str {
    match (kind, domain) {
        (StudyKind::Explanation, Domain::Math) => {
            "- Separate definitions, theorems and formulas and explain each intuitively.\n\
             - Keep only the key steps of calculations and lean on the figures for intuition.\n\
             - Do not produce theorems, formulas or proofs absent from the text."
        }
        (StudyKind::Explanation, Domain::It) => {
            "- Explain concepts step by step with analogies.\n\
             - Describe the role of functions and structures as a flow, citing only the source.\n\
             - Never add code examples that are not in the text."
        }
        (StudyKind::Explanation, Domain::Biz) => {
            "- Explain key concepts with the cases the text gives.\n\
             - Walk through tables and diagrams by their points of comparison.\n\
             - Mention only figures and graphs that appear in the text."
        }
        (StudyKind::Explanation, Domain::Default) => {
            "- Explain the core concepts first in simple sentences.\n\
             - Refer to the diagrams and tables where they aid understanding.\n\
             - Do not create concepts or examples absent from the text."
        }
        (StudyKind::Quiz, Domain::Math) => {
            "- Include questions on definitions and theorems.\n\
             - Include one or two short calculations and a reasoning question.\n\
             - Ask for the idea of a proof or the direction of a solution."
        }
        (StudyKind::Quiz, Domain::It) => {
            "- Include questions defining the key concepts.\n\
             - Mix predicting program output, writing short code and finding bugs.\n\
             - Give example code or inputs so students can work by hand."
        }
        (StudyKind::Quiz, Domain::Biz) => {
            "- Include term definitions, case-based judgement and concept comparison."
        }
        (StudyKind::Quiz, Domain::Default) => {
            "- Mix questions on core concepts with example-based questions."
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Figures worth showing the generator: captioned figures and tables.
pub fn select_images<'a>(record: &'a ChapterRecord, options: &StudyOptions) -> Vec<&'a FigureItem> {
    if !options.include_images {
        return Vec::new();
    }
    record
        .images
        .iter()
        .filter(|img| !img.caption.trim().is_empty())
        .filter(|img| !options.diagram_only || img.kind == FigureKind::Figure)
        .collect()
}

fn describe_images(images: &[&FigureItem]) -> String {
    if images.is_empty() {
        return "none".into();
    }
    let mut out = String::new();
    for (i, img) in images.iter().enumerate() {
        let context = img.local_text.join(" ");
        let _ = writeln!(
            out,
            "{}) [{}] {} (p.{})\n   context: {}\n   file: {}",
            i + 1,
            img.kind,
            img.caption.trim(),
            img.page_number,
            truncate_chars(&context, LOCAL_TEXT_LIMIT),
            img.file
        );
    }
    out
}

/// Build the system message and prompt for one chapter.
pub fn build_request(
    record: &ChapterRecord,
    kind: StudyKind,
    options: &StudyOptions,
) -> GenerationRequest {
    let text = record.text_blocks().collect::<Vec<_>>().join("\n");
    let images = select_images(record, options);
    let mut prompt = String::new();

    match kind {
        StudyKind::Explanation => {
            let _ = write!(
                prompt,
                "Write an easy explanation guide for the chapter \"{}\".\n\n\
                 [Chapter text]\n{}\n\n\
                 [Domain rules: {}]\n{}\n\n\
                 [Figures and tables]\n{}",
                record.title,
                truncate_chars(&text, EXPLANATION_TEXT_LIMIT),
                record.domain,
                domain_rules(record.domain, kind),
                describe_images(&images),
            );
        }
        StudyKind::Quiz => {
            let questions = options.question_count();
            let captions = images
                .iter()
                .take(QUIZ_CAPTION_LIMIT)
                .map(|img| format!("- {}", img.caption.trim()))
                .collect::<Vec<_>>();
            let captions = if captions.is_empty() {
                "none".to_string()
            } else {
                captions.join("\n")
            };
            let _ = write!(
                prompt,
                "Write a self-check quiz for the chapter \"{}\".\n\n\
                 [Domain rules: {}]\n{}\n\n\
                 [Chapter text]\n{}\n\n\
                 [Figure and table captions]\n{}\n\n\
                 [Output]\n\
                 - Exactly {questions} questions, mixing short answer, essay, code and calculation as the domain suits.\n\
                 - Hide each answer in <details><summary>Answer</summary>...</details>.\n\
                 - Allowed tags: html, head, meta, title, style, body, h1, h2, p, section, details, summary, img, figure, figcaption.",
                record.title,
                record.domain,
                domain_rules(record.domain, kind),
                truncate_chars(&text, QUIZ_TEXT_LIMIT),
                captions,
            );
        }
    }

    let instruction = options.user_instruction.trim();
    if !instruction.is_empty() {
        let _ = write!(prompt, "\n\n[Additional instruction from the user]\n{instruction}");
    }

    GenerationRequest {
        system: GROUNDING_RULES.to_string(),
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::record::{ChapterMeta, PageRecord};

    fn image(kind: FigureKind, caption: &str) -> FigureItem {
        FigureItem {
            file: "chapter01_p0001_diagram01.png".into(),
            page_number: 1,
            bounding_box: BBox::new(0.0, 0.0, 100.0, 100.0),
            caption: caption.into(),
            local_text: vec!["주변 설명".into()],
            kind,
        }
    }

    fn record(text: &str, images: Vec<FigureItem>) -> ChapterRecord {
        ChapterRecord {
            chapter_index: 1,
            title: "정렬".into(),
            start_page: 1,
            end_page: 1,
            domain: Domain::It,
            pages: vec![PageRecord {
                page_number: 1,
                text_blocks: vec![text.into()],
            }],
            images,
            meta: ChapterMeta::default(),
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("가나다라", 2), "가나");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }

    #[test]
    fn test_image_selection() {
        let rec = record(
            "본문",
            vec![
                image(FigureKind::Figure, "그림 1-1 병합 정렬"),
                image(FigureKind::Table, "표 1-1 복잡도"),
                image(FigureKind::Figure, "   "),
            ],
        );
        let all = select_images(&rec, &StudyOptions::default());
        assert_eq!(all.len(), 2);

        let diagrams = StudyOptions {
            diagram_only: true,
            ..Default::default()
        };
        assert_eq!(select_images(&rec, &diagrams).len(), 1);

        let none = StudyOptions {
            include_images: false,
            ..Default::default()
        };
        assert!(select_images(&rec, &none).is_empty());
    }

    #[test]
    fn test_explanation_text_is_truncated() {
        let long = "가".repeat(20_000);
        let request = build_request(&record(&long, Vec::new()), StudyKind::Explanation, &StudyOptions::default());
        assert!(request.prompt.contains(&"가".repeat(15_000)));
        assert!(!request.prompt.contains(&"가".repeat(15_001)));
    }

    #[test]
    fn test_quiz_caps_captions_and_text() {
        let images = (1..=12)
            .map(|i| image(FigureKind::Figure, &format!("그림 1-{i} 단계")))
            .collect();
        let long = "x".repeat(9_000);
        let request = build_request(&record(&long, images), StudyKind::Quiz, &StudyOptions::default());
        assert!(request.prompt.contains("그림 1-10 단계"));
        assert!(!request.prompt.contains("그림 1-11 단계"));
        assert!(!request.prompt.contains(&"x".repeat(8_001)));
        assert!(request.prompt.contains("Exactly 6 questions"));
    }

    #[test]
    fn test_user_instruction_comes_last() {
        let options = StudyOptions {
            user_instruction: "예시를 더 들어줘".into(),
            ..Default::default()
        };
        let request = build_request(
            &record("본문", vec![image(FigureKind::Figure, "그림 1-1 트리")]),
            StudyKind::Explanation,
            &options,
        );
        assert!(request.prompt.ends_with("예시를 더 들어줘"));
        assert!(request.prompt.contains("[Domain rules: it]"));
        assert!(request.prompt.contains("[figure] 그림 1-1 트리 (p.1)"));
        assert!(request.system.contains("Never introduce concepts"));
    }
}
