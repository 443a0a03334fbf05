//! The extraction prompt sent to the summarization model.
//!
//! [`PromptBuilder`] renders a fixed template with two interpolated fields:
//! the document body and an optional focus context. Rendering is a pure
//! function of its inputs, so `build("", context)` measures exactly the
//! static overhead that surrounds the real document. The
//! [`BudgetCalculator`](super::budget::BudgetCalculator) relies on this.

const TASK: &str = "\
You are a high-fidelity snippet extractor. Read the web page below, \
converted to markdown, and output a clean list of the excerpts that matter.";

const RULES: &str = "\
- VERBATIM ONLY: copy passages exactly; do not rewrite or fix grammar.
- NO WEB NOISE: drop navigation menus, footers, sign-up forms, related-article lists and cookie banners.
- FACTUAL: keep technical details such as code snippets, numbers and names when they are relevant.
- DENSITY: prefer whole paragraphs over sentence fragments.
- Output markdown only, nothing else.";

const DOCUMENT_START: &str = "<DOCUMENT_START>";
const DOCUMENT_END: &str = "<DOCUMENT_END>";

/// Renders the summarization prompt.
///
/// Sections are joined with blank lines under `###` headings. The focus
/// section is omitted when the context is absent or blank.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_output_tokens: usize,
}

impl PromptBuilder {
    /// `max_output_tokens` is stated in the task framing as the length cap.
    pub fn new(max_output_tokens: usize) -> Self {
        Self { max_output_tokens }
    }

    /// Render the full prompt for `content`.
    pub fn build(&self, content: &str, context: Option<&str>) -> String {
        let mut sections = vec![format!(
            "{TASK}\nKeep the output under a MAXIMUM of {} tokens.",
            self.max_output_tokens
        )];

        push_section(&mut sections, "RULES", RULES);

        if let Some(focus) = context.map(str::trim).filter(|c| !c.is_empty()) {
            push_section(
                &mut sections,
                "FOCUS CONTEXT",
                &format!(
                    "The user is looking for information matching this description:\n\"{focus}\""
                ),
            );
        }

        push_section(
            &mut sections,
            "SOURCE DOCUMENT",
            &format!("{DOCUMENT_START}\n{content}\n{DOCUMENT_END}"),
        );

        sections.push("Generate the list of verbatim excerpts from the SOURCE DOCUMENT now.\nOutput:".into());

        sections.join("\n\n")
    }

    /// The prompt with an empty document: everything but the content.
    pub fn static_prompt(&self, context: Option<&str>) -> String {
        self.build("", context)
    }
}

fn push_section(sections: &mut Vec<String>, heading: &str, body: &str) {
    sections.push(format!("### {heading}\n{body}"));
}
