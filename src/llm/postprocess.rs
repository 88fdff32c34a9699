//! Cleanup of accumulated generation output.
//!
//! Pure and total: extract an optional reasoning block, strip every control
//! token any supported prompt family could leak, drop leftover role-label
//! lines, trim.

/// Paired delimiters models use around a "thinking" block. Multiple literal
/// spellings for cross-family compatibility; only the first block found is
/// extracted.
const REASONING_DELIMITERS: &[(&str, &str)] = &[
    ("<think>", "</think>"),
    ("<thinking>", "</thinking>"),
    ("<thought>", "</thought>"),
];

/// Every literal control token the prompt builder's families use.
const CONTROL_TOKENS: &[&str] = &[
    "<|im_start|>",
    "<|im_end|>",
    "<|begin_of_text|>",
    "<|start_header_id|>",
    "<|end_header_id|>",
    "<|eot_id|>",
    "[INST]",
    "[/INST]",
    "<s>",
    "</s>",
    "<start_of_turn>",
    "<end_of_turn>",
    "<bos>",
    "<eos>",
    "<|system|>",
    "<|user|>",
    "<|assistant|>",
    "<|end|>",
    "<|endoftext|>",
    "### Instruction:",
    "### Input:",
    "### Response:",
];

const ROLE_LABELS: &[&str] = &["assistant", "user", "system", "model"];

/// A finalized answer: cleaned content plus the optional reasoning block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedResponse {
    pub content: String,
    pub reasoning: Option<String>,
}

/// Turn raw accumulated output into the final answer.
pub fn finalize(raw: &str) -> ProcessedResponse {
    let (text, reasoning) = extract_reasoning(raw);

    let mut cleaned = text;
    for token in CONTROL_TOKENS {
        cleaned = cleaned.replace(token, "");
    }

    let content = cleaned
        .lines()
        .filter(|line| !is_leftover_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    ProcessedResponse { content, reasoning }
}

/// Remove the first reasoning block, if any, and return it separately.
fn extract_reasoning(text: &str) -> (String, Option<String>) {
    for (open, close) in REASONING_DELIMITERS {
        if let Some(start) = text.find(open) {
            let body_start = start + open.len();
            if let Some(body_len) = text[body_start..].find(close) {
                let reasoning = text[body_start..body_start + body_len].trim().to_string();
                let mut remainder = String::with_capacity(text.len());
                remainder.push_str(&text[..start]);
                remainder.push_str(&text[body_start + body_len + close.len()..]);
                let reasoning = if reasoning.is_empty() {
                    None
                } else {
                    Some(reasoning)
                };
                return (remainder, reasoning);
            }
        }
    }
    (text.to_string(), None)
}

/// Lines that are only delimiter debris or a bare role name.
fn is_leftover_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        // Blank lines inside the answer are kept; edge blanks go with the
        // final trim.
        return false;
    }
    if ROLE_LABELS
        .iter()
        .any(|role| trimmed.eq_ignore_ascii_case(role))
    {
        return true;
    }
    // Mangled token remains like `<|` or `]>`. A line must contain actual
    // bracket machinery before it counts; `---` and `###` are legitimate
    // markdown and stay.
    trimmed
        .chars()
        .any(|c| matches!(c, '<' | '>' | '|' | '[' | ']'))
        && trimmed
            .chars()
            .all(|c| matches!(c, '<' | '>' | '|' | '[' | ']' | '/' | '#' | ':' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_response() {
        let response = finalize("");
        assert_eq!(response.content, "");
        assert!(response.reasoning.is_none());
    }

    #[test]
    fn reasoning_block_is_extracted_and_removed() {
        let response = finalize("<think>A</think>B");
        assert_eq!(response.content, "B");
        assert_eq!(response.reasoning.as_deref(), Some("A"));
    }

    #[test]
    fn alternate_reasoning_spellings_are_recognized() {
        let response = finalize("<thinking>weighing options</thinking>The answer is 4.");
        assert_eq!(response.content, "The answer is 4.");
        assert_eq!(response.reasoning.as_deref(), Some("weighing options"));
    }

    #[test]
    fn only_the_first_reasoning_block_is_extracted() {
        let response = finalize("<think>first</think>body<think>second</think>tail");
        assert_eq!(response.reasoning.as_deref(), Some("first"));
        assert!(response.content.contains("second"));
    }

    #[test]
    fn control_tokens_alone_reduce_to_nothing() {
        let response = finalize("<|im_end|>\n<|eot_id|><|endoftext|>\n</s>");
        assert_eq!(response.content, "");
        assert!(response.reasoning.is_none());
    }

    #[test]
    fn bare_role_labels_are_dropped() {
        let response = finalize("assistant\nThe capital is Paris.\nuser");
        assert_eq!(response.content, "The capital is Paris.");
    }

    #[test]
    fn embedded_control_tokens_are_stripped_from_content() {
        let response = finalize("Paris is the capital.<|im_end|>\n<|im_start|>assistant");
        assert_eq!(response.content, "Paris is the capital.");
    }

    #[test]
    fn an_unclosed_reasoning_tag_is_left_in_place() {
        let response = finalize("<think>never closed, so treated as content");
        assert!(response.reasoning.is_none());
        assert!(response.content.contains("never closed"));
    }

    #[test]
    fn markdown_rules_and_headings_are_not_debris() {
        let response = finalize("Above\n\n---\n\nBelow\n###\nEnd.");
        assert!(response.content.contains("---"));
        assert!(response.content.contains("###"));
    }

    #[test]
    fn mangled_delimiter_fragments_are_dropped() {
        let response = finalize("Fine line.\n<|\n]>");
        assert_eq!(response.content, "Fine line.");
    }

    #[test]
    fn interior_blank_lines_survive() {
        let response = finalize("First paragraph.\n\nSecond paragraph.");
        assert_eq!(response.content, "First paragraph.\n\nSecond paragraph.");
    }
}
