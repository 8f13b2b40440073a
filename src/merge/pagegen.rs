//! Generated pages: placeholders for unavailable flyers and rendered
//! advertisement pages.
//!
//! Everything here produces plain text pages on an A4 canvas through a
//! shared Helvetica resource owned by the assembler. Layout is deliberately
//! simple: a vertical cursor, one text operation per line.

use lopdf::content::{Content, Operation};
use lopdf::Object;

use crate::error::SourceError;
use crate::model::{Advertisement, Flyer};

/// A4 page width in points.
pub const PAGE_WIDTH: i64 = 595;

/// A4 page height in points.
pub const PAGE_HEIGHT: i64 = 842;

const MARGIN_LEFT: i64 = 56;
const MARGIN_TOP: i64 = 72;
const LINE_GAP: i64 = 10;

/// A single line of a generated page.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// Text content. Empty text renders as vertical whitespace.
    pub text: String,

    /// Font size in points.
    pub size: i64,

    /// Extra left indentation in points.
    pub indent: i64,
}

impl TextLine {
    /// A heading line.
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: 22,
            indent: 0,
        }
    }

    /// A body line.
    pub fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: 12,
            indent: 0,
        }
    }

    /// An indented body line.
    pub fn detail(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: 12,
            indent: 16,
        }
    }

    /// An empty spacer line.
    pub fn blank() -> Self {
        Self {
            text: String::new(),
            size: 12,
            indent: 0,
        }
    }
}

/// Encode lines into a PDF content stream using the font named `/F1`.
pub fn render_lines(lines: &[TextLine]) -> Content {
    let mut operations = Vec::with_capacity(lines.len() * 5 + 2);
    let mut cursor = PAGE_HEIGHT - MARGIN_TOP;

    for line in lines {
        cursor -= line.size;
        if !line.text.is_empty() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), line.size.into()]));
            operations.push(Operation::new(
                "Td",
                vec![(MARGIN_LEFT + line.indent).into(), cursor.into()],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(line.text.as_str())],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        cursor -= LINE_GAP;
    }

    Content { operations }
}

/// Wrap text at word boundaries to at most `max_chars` per line.
///
/// Width is approximated by character count; generated pages only carry
/// short metadata strings, so glyph-exact metrics buy nothing here.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

/// Lines for the placeholder page substituting an unretrievable flyer.
///
/// Carries the store, city, category, validity window and a reason derived
/// from the failure classification.
pub fn placeholder_lines(flyer: &Flyer, error: &SourceError) -> Vec<TextLine> {
    let mut lines = vec![
        TextLine::heading("Flyer unavailable"),
        TextLine::blank(),
        TextLine::body(format!("{} - {}", flyer.store, flyer.location.city)),
        TextLine::detail(format!("Category: {}", flyer.category)),
        TextLine::detail(format!(
            "Valid {} to {}",
            flyer.valid_from.format("%Y-%m-%d"),
            flyer.valid_to.format("%Y-%m-%d")
        )),
        TextLine::blank(),
    ];
    for wrapped in wrap_text(
        &format!("This flyer is {}.", error.kind.reason_label()),
        70,
    ) {
        lines.push(TextLine::body(wrapped));
    }
    lines
}

/// Lines for the placeholder page substituting a flyer id the store does
/// not know (deleted or never existed).
pub fn missing_record_lines(flyer_id: &str) -> Vec<TextLine> {
    vec![
        TextLine::heading("Flyer unavailable"),
        TextLine::blank(),
        TextLine::body(format!("Flyer {flyer_id}")),
        TextLine::blank(),
        TextLine::body("This flyer is no longer available."),
    ]
}

/// Lines for a rendered advertisement page. Exactly one page per ad.
pub fn ad_lines(ad: &Advertisement) -> Vec<TextLine> {
    let mut lines = vec![
        TextLine::heading(ad.title.clone()),
        TextLine::blank(),
        TextLine::body(format!("Sponsored - {}", ad.category)),
    ];
    if !ad.targeting.is_empty() {
        lines.push(TextLine::detail(ad.targeting.join(", ")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SourceError, SourceErrorKind};
    use crate::model::ad::tests::sample_ad;
    use crate::model::flyer::tests::sample_flyer;
    use crate::model::AdPosition;

    #[test]
    fn test_render_lines_emits_text_operations() {
        let content = render_lines(&[TextLine::heading("Title"), TextLine::body("Body")]);
        let text_shows: Vec<&Operation> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .collect();
        assert_eq!(text_shows.len(), 2);
    }

    #[test]
    fn test_blank_lines_render_no_text() {
        let content = render_lines(&[TextLine::blank(), TextLine::blank()]);
        assert!(content.operations.is_empty());
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);

        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(wrap_text("single", 80), vec!["single"]);
    }

    #[test]
    fn test_placeholder_mentions_classified_reason() {
        let flyer = sample_flyer();
        let error = SourceError::new(
            SourceErrorKind::FileNotFound,
            &flyer.id,
            "uploads/x.pdf",
            "ENOENT",
        );

        let lines = placeholder_lines(&flyer, &error);
        let all_text: String = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
        assert!(all_text.contains("Eurospin - Milano"));
        assert!(all_text.contains("Supermercato"));
        assert!(all_text.contains("file missing on server"));
        assert!(all_text.contains("2025-01-10"));
    }

    #[test]
    fn test_ad_lines_carry_title_and_category() {
        let mut ad = sample_ad("a1", AdPosition::Cover);
        ad.targeting = vec!["Milano".to_string(), "20121".to_string()];

        let lines = ad_lines(&ad);
        let all_text: String = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
        assert!(all_text.contains("Sponsor a1"));
        assert!(all_text.contains("food"));
        assert!(all_text.contains("Milano, 20121"));
    }
}
