//! LaTeX rendering of the narrative and the denormalized document tree.
//!
//! The renderer is a plain consumer of projection output: it walks the
//! reference-free tree by field access and never touches the store. Layout
//! follows the original package format: a `preview`-based article, a title
//! block, the narrative, then one preview block per document with
//! `\section*` for the feature, `\subsection*` per scenario, and the steps
//! as italic-keyword lines.

use std::io::{self, Write};

use thiserror::Error;

use crate::narrative::{Block, Inline};
use crate::value::Node;

// ============================================================================
// Options & Errors
// ============================================================================

/// Document metadata for the LaTeX preamble.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Title for the leading preview block and the PDF metadata.
    pub title: String,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            title: "Documentation Package".to_string(),
            author: None,
            subject: None,
            keywords: None,
        }
    }
}

/// Faults raised while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    /// The document tree is missing a field the layout needs, or a value
    /// has the wrong shape (e.g. a reference survived denormalization).
    #[error("document tree: expected {expected} at {path}")]
    Shape { path: String, expected: &'static str },
}

fn shape(path: impl Into<String>, expected: &'static str) -> RenderError {
    RenderError::Shape {
        path: path.into(),
        expected,
    }
}

// ============================================================================
// Escaping
// ============================================================================

/// Escape user text for LaTeX.
///
/// Covers the characters that occur in gherkin text in practice:
/// backslash, underscore and braces.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '_' => out.push_str("\\_"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// Rendering
// ============================================================================

/// Typeset the narrative and the denormalized documents root into a
/// complete LaTeX article.
pub fn render_package<W: Write>(
    narrative: &[Block],
    documents: &Node,
    options: &RenderOptions,
    out: &mut W,
) -> Result<(), RenderError> {
    write_preamble(options, out)?;

    writeln!(out, "\\begin{{preview}}\n")?;
    writeln!(out, "\\section*{{{}}}\n", escape_latex(&options.title))?;
    writeln!(out, "\\end{{preview}}\n")?;

    writeln!(out, "\\begin{{preview}}\n")?;
    for block in narrative {
        write_block(block, out)?;
    }
    writeln!(out, "\\end{{preview}}\n")?;

    let docs = documents
        .as_seq()
        .ok_or_else(|| shape("documents", "sequence"))?;
    for (doc_index, doc) in docs.iter().enumerate() {
        write_document(doc, doc_index, out)?;
    }

    writeln!(out, "\\end{{document}}")?;
    Ok(())
}

fn write_preamble<W: Write>(options: &RenderOptions, out: &mut W) -> Result<(), RenderError> {
    writeln!(out, "\\documentclass{{article}}\n")?;
    writeln!(out, "\\usepackage[active,tightpage]{{preview}}")?;
    writeln!(out, "\\usepackage{{fontspec}}\n")?;
    writeln!(out, "\\setmainfont{{IBM Plex Sans}}\n")?;
    writeln!(out, "\\usepackage{{setspace}}")?;
    writeln!(out, "\\setstretch{{1.3}}\n")?;
    writeln!(out, "\\renewcommand{{\\PreviewBorder}}{{0.5in}}\n")?;
    writeln!(out, "\\usepackage[]{{hyperref}}\n")?;
    writeln!(out, "\\hypersetup{{")?;
    writeln!(out, "  pdftitle={{{}}},", escape_latex(&options.title))?;
    if let Some(author) = &options.author {
        writeln!(out, "  pdfauthor={{{}}},", escape_latex(author))?;
    }
    if let Some(subject) = &options.subject {
        writeln!(out, "  pdfsubject={{{}}},", escape_latex(subject))?;
    }
    if let Some(keywords) = &options.keywords {
        writeln!(out, "  pdfkeywords={{{}}},", escape_latex(keywords))?;
    }
    writeln!(out, "  pdfpagemode=UseOutlines,")?;
    writeln!(out, "  bookmarksnumbered=true,")?;
    writeln!(out, "  bookmarksopen=true,")?;
    writeln!(out, "  bookmarksopenlevel=1,")?;
    writeln!(out, "  colorlinks=true,")?;
    writeln!(out, "  pdfstartview=Fit,")?;
    writeln!(out, "  allcolors=blue")?;
    writeln!(out, "}}\n")?;
    writeln!(out, "\\usepackage{{hypcap}}\n")?;
    writeln!(out, "\\begin{{document}}\n")?;
    Ok(())
}

fn write_block<W: Write>(block: &Block, out: &mut W) -> Result<(), RenderError> {
    match block {
        // Narrative headings all render as unnumbered sections; the
        // subsection level is kept for scenarios within a feature.
        Block::Heading { text, .. } => {
            writeln!(out, "\\section*{{{}}}", escape_latex(text))?;
        }
        Block::Paragraph(inlines) => {
            for inline in inlines {
                match inline {
                    Inline::Text(text) => write!(out, "{}", escape_latex(text))?,
                    Inline::Strong(text) => write!(out, "\\textbf{{{}}}", escape_latex(text))?,
                    Inline::Emphasis(text) => write!(out, "\\textit{{{}}}", escape_latex(text))?,
                    Inline::Code(text) => write!(out, "\\texttt{{{}}}", escape_latex(text))?,
                }
            }
            writeln!(out, "\n")?;
        }
    }
    Ok(())
}

fn write_document<W: Write>(doc: &Node, doc_index: usize, out: &mut W) -> Result<(), RenderError> {
    let path = format!("documents[{doc_index}]");
    let feature = doc
        .get("feature")
        .ok_or_else(|| shape(format!("{path}.feature"), "map"))?;
    let keyword = require_str(feature, "keyword", &format!("{path}.feature"))?;
    let name = require_str(feature, "name", &format!("{path}.feature"))?;

    writeln!(out, "\\begin{{preview}}\n")?;
    writeln!(
        out,
        "\\section*{{{}: {}}}",
        escape_latex(keyword),
        escape_latex(name)
    )?;

    let scenarios = feature
        .get("scenarios")
        .and_then(Node::as_seq)
        .ok_or_else(|| shape(format!("{path}.feature.scenarios"), "sequence"))?;
    for (scenario_index, scenario) in scenarios.iter().enumerate() {
        let scenario_path = format!("{path}.feature.scenarios[{scenario_index}]");
        let keyword = require_str(scenario, "keyword", &scenario_path)?;
        let name = require_str(scenario, "name", &scenario_path)?;
        writeln!(
            out,
            "\n\\subsection*{{{}: {}}}",
            escape_latex(keyword),
            escape_latex(name)
        )?;

        let steps = scenario
            .get("steps")
            .and_then(Node::as_seq)
            .ok_or_else(|| shape(format!("{scenario_path}.steps"), "sequence"))?;
        let mut lines = Vec::with_capacity(steps.len());
        for (step_index, step) in steps.iter().enumerate() {
            let step_path = format!("{scenario_path}.steps[{step_index}]");
            let keyword = require_str(step, "keyword", &step_path)?;
            let text = require_str(step, "text", &step_path)?;
            lines.push(format!(
                "\\textit{{{}}}{}",
                escape_latex(keyword),
                escape_latex(text)
            ));
        }
        writeln!(out, "{}", lines.join("\\\\\n"))?;
    }

    writeln!(out, "\n\\end{{preview}}\n")?;
    Ok(())
}

fn require_str<'a>(node: &'a Node, field: &str, path: &str) -> Result<&'a str, RenderError> {
    node.get(field)
        .and_then(Node::as_str)
        .ok_or_else(|| shape(format!("{path}.{field}"), "string"))
}

// ============================================================================
// Tests
// ============================================================================
