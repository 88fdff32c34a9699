use serde::{Deserialize, Serialize};

/// The closed set of supported prompt layouts. Exactly one is active per
/// loaded model; it is persisted only in export snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptFormat {
    /// `<|im_start|>role ... <|im_end|>` markup (Qwen, DeepSeek, Hermes; the
    /// generic fallback).
    ChatMl,
    /// Llama 3 header-id tags.
    Llama3,
    /// `[INST] ... [/INST]` bracket instructions (Mistral, Mixtral).
    Mistral,
    /// `<start_of_turn>` markup, no system role.
    Gemma,
    /// `<|user|>` / `<|assistant|>` tags (Phi).
    Phi,
    /// `### Instruction:` / `### Response:` plain-text style, no control
    /// tokens and a shorter history window.
    Alpaca,
}

/// Ordered substring rules over the lowercased model name. More specific
/// families come first; ChatML is the fallback for anything unmatched.
const DETECTION_RULES: &[(&str, PromptFormat)] = &[
    ("llama-3", PromptFormat::Llama3),
    ("llama3", PromptFormat::Llama3),
    ("meta-llama", PromptFormat::Llama3),
    ("mixtral", PromptFormat::Mistral),
    ("mistral", PromptFormat::Mistral),
    ("gemma", PromptFormat::Gemma),
    ("phi-4", PromptFormat::Phi),
    ("phi-3", PromptFormat::Phi),
    ("phi3", PromptFormat::Phi),
    ("alpaca", PromptFormat::Alpaca),
    ("guanaco", PromptFormat::Alpaca),
    ("qwen", PromptFormat::ChatMl),
    ("deepseek", PromptFormat::ChatMl),
    ("hermes", PromptFormat::ChatMl),
    ("smollm", PromptFormat::ChatMl),
];

impl PromptFormat {
    /// Pick a format from a model filename or path, case-insensitively.
    /// Users can override the result; this is only the load-time heuristic.
    pub fn detect(model_name: &str) -> Self {
        let name = model_name.to_lowercase();
        for (needle, format) in DETECTION_RULES {
            if name.contains(needle) {
                return *format;
            }
        }
        PromptFormat::ChatMl
    }

    /// How many recent history messages are replayed into the prompt.
    pub(crate) fn history_window(self) -> usize {
        match self {
            PromptFormat::Alpaca => 4,
            _ => 6,
        }
    }
}
