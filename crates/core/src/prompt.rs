use crate::error::ConfigError;
use crate::models::ScoredChunk;
use regex::Regex;
use std::sync::OnceLock;

pub const CONTEXT_PLACEHOLDER: &str = "context";
pub const QUESTION_PLACEHOLDER: &str = "question";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Context,
    Question,
}

/// A prompt with `{context}` and `{question}` slots. `{{` and `}}` render as
/// literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([^{}]*)\}").expect("placeholder pattern is valid")
    })
}

impl PromptTemplate {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for capture in placeholder_re().captures_iter(source) {
            let Some(whole) = capture.get(0) else {
                continue;
            };
            literal.push_str(&source[last..whole.start()]);
            last = whole.end();

            match (whole.as_str(), capture.get(1)) {
                ("{{", _) => literal.push('{'),
                ("}}", _) => literal.push('}'),
                (_, Some(name)) => {
                    let segment = match name.as_str().trim() {
                        CONTEXT_PLACEHOLDER => Segment::Context,
                        QUESTION_PLACEHOLDER => Segment::Question,
                        other => {
                            return Err(ConfigError::Template(format!(
                                "unknown placeholder {{{other}}}"
                            )))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                }
                _ => literal.push_str(whole.as_str()),
            }
        }

        literal.push_str(&source[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        for (required, segment) in [
            (CONTEXT_PLACEHOLDER, Segment::Context),
            (QUESTION_PLACEHOLDER, Segment::Question),
        ] {
            if !segments.contains(&segment) {
                return Err(ConfigError::Template(format!(
                    "missing {{{required}}} placeholder"
                )));
            }
        }

        Ok(Self { segments })
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Context => rendered.push_str(context),
                Segment::Question => rendered.push_str(question),
            }
        }
        rendered
    }
}

pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
