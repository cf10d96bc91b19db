//! Narrative document parsing.
//!
//! The narrative is a separately authored markdown document (typically the
//! project README) that fronts the typeset output. Only the structure the
//! renderer can place is extracted: headings and paragraphs of inline
//! runs. Lists, block quotes, html and images are ignored.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

// ============================================================================
// Block Model
// ============================================================================

/// One inline run within a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Strong(String),
    Emphasis(String),
    Code(String),
}

/// One typesettable narrative block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Heading with its 1-based level and flattened text.
    Heading { level: u8, text: String },
    /// Paragraph of inline runs, in source order.
    Paragraph(Vec<Inline>),
}

// ============================================================================
// Parsing
// ============================================================================

/// Extract the typesettable blocks of a markdown narrative.
pub fn parse_narrative(source: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut heading: Option<(u8, String)> = None;
    let mut paragraph: Option<Vec<Inline>> = None;
    // Inline markers currently open inside the paragraph.
    let mut strong_depth = 0usize;
    let mut emphasis_depth = 0usize;
    // Loose list items wrap their text in paragraph events; anything
    // inside a list stays ignored.
    let mut list_depth = 0usize;

    for event in Parser::new(source) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading.take() {
                    blocks.push(Block::Heading { level, text });
                }
            }
            Event::Start(Tag::List(_)) => list_depth += 1,
            Event::End(TagEnd::List(_)) => list_depth = list_depth.saturating_sub(1),
            Event::Start(Tag::Paragraph) => {
                if list_depth == 0 {
                    paragraph = Some(Vec::new());
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if let Some(inlines) = paragraph.take() {
                    blocks.push(Block::Paragraph(inlines));
                }
            }
            Event::Start(Tag::Strong) => strong_depth += 1,
            Event::End(TagEnd::Strong) => strong_depth = strong_depth.saturating_sub(1),
            Event::Start(Tag::Emphasis) => emphasis_depth += 1,
            Event::End(TagEnd::Emphasis) => emphasis_depth = emphasis_depth.saturating_sub(1),
            Event::Text(text) => {
                if let Some((_, heading_text)) = heading.as_mut() {
                    heading_text.push_str(&text);
                } else if let Some(inlines) = paragraph.as_mut() {
                    let run = text.into_string();
                    if strong_depth > 0 {
                        inlines.push(Inline::Strong(run));
                    } else if emphasis_depth > 0 {
                        inlines.push(Inline::Emphasis(run));
                    } else {
                        inlines.push(Inline::Text(run));
                    }
                }
            }
            Event::Code(code) => {
                if let Some((_, heading_text)) = heading.as_mut() {
                    heading_text.push_str(&code);
                } else if let Some(inlines) = paragraph.as_mut() {
                    inlines.push(Inline::Code(code.into_string()));
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(inlines) = paragraph.as_mut() {
                    inlines.push(Inline::Text(" ".to_string()));
                }
            }
            _ => {}
        }
    }
    blocks
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_carry_level_and_text() {
        let blocks = parse_narrative("# Title\n\n## Details\n");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, text: "Title".to_string() },
                Block::Heading { level: 2, text: "Details".to_string() },
            ]
        );
    }

    #[test]
    fn paragraph_splits_inline_runs() {
        let blocks = parse_narrative("plain **bold** and *leaning* text\n");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines,
            &vec![
                Inline::Text("plain ".to_string()),
                Inline::Strong("bold".to_string()),
                Inline::Text(" and ".to_string()),
                Inline::Emphasis("leaning".to_string()),
                Inline::Text(" text".to_string()),
            ]
        );
    }

    #[test]
    fn inline_code_is_kept() {
        let blocks = parse_narrative("run `featpress typeset` now\n");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(inlines.contains(&Inline::Code("featpress typeset".to_string())));
    }

    #[test]
    fn lists_and_code_blocks_are_ignored() {
        let blocks = parse_narrative("- one\n- two\n\n```\ncode\n```\n\n# Kept\n");
        assert_eq!(
            blocks,
            vec![Block::Heading { level: 1, text: "Kept".to_string() }]
        );
    }

    #[test]
    fn loose_list_items_are_not_captured_as_paragraphs() {
        // A blank line between items makes the parser emit paragraph
        // events inside them; those must stay ignored like tight lists.
        let blocks = parse_narrative("- one\n\n- two\n\nafter\n");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![Inline::Text("after".to_string())])]
        );
    }

    #[test]
    fn soft_breaks_become_spaces() {
        let blocks = parse_narrative("line one\nline two\n");
        let Block::Paragraph(inlines) = &blocks[0] else {
            panic!("expected paragraph");
        };
        let text: String = inlines
            .iter()
            .map(|inline| match inline {
                Inline::Text(s) => s.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(text, "line one line two");
    }

    #[test]
    fn empty_source_yields_no_blocks() {
        assert!(parse_narrative("").is_empty());
    }
}
