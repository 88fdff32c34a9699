use crate::chat::Message;

use super::format::PromptFormat;

/// Appended once, immediately after injected context, so the model cites the
/// documents it drew from.
const ATTRIBUTION_INSTRUCTION: &str =
    "When answering from the context above, attribute facts to their source as [source_name].";

const ALPACA_PREAMBLE: &str = "Below is an instruction that describes a task. \
Write a response that appropriately completes the request.";

/// Renders conversation history plus optional retrieved context into the
/// token layout of one model family. Rendering is total: every format value
/// produces a string, there is no error path.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn render(
        format: PromptFormat,
        history: &[Message],
        user_message: &str,
        context: Option<&str>,
    ) -> String {
        let window = recent_history(history, format.history_window());
        match format {
            PromptFormat::ChatMl => render_chatml(&window, user_message, context),
            PromptFormat::Llama3 => render_llama3(&window, user_message, context),
            PromptFormat::Mistral => render_mistral(&window, user_message, context),
            PromptFormat::Gemma => render_gemma(&window, user_message, context),
            PromptFormat::Phi => render_phi(&window, user_message, context),
            PromptFormat::Alpaca => render_alpaca(&window, user_message, context),
        }
    }
}

/// The most recent eligible messages, oldest first. Error-flagged messages
/// are never replayed into a prompt.
fn recent_history(history: &[Message], window: usize) -> Vec<&Message> {
    let eligible: Vec<&Message> = history.iter().filter(|m| !m.is_error).collect();
    let start = eligible.len().saturating_sub(window);
    eligible[start..].to_vec()
}

fn context_block(context: &str) -> String {
    format!(
        "Context:\n{}\n\n{}",
        context.trim(),
        ATTRIBUTION_INSTRUCTION
    )
}

/// For system-free formats: fold the pending context block into the first
/// user turn that gets rendered.
fn merge_context(pending: &mut Option<String>, content: &str) -> String {
    match pending.take() {
        Some(block) => format!("{}\n\n{}", block, content),
        None => content.to_string(),
    }
}

fn render_chatml(history: &[&Message], user_message: &str, context: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(ctx) = context {
        prompt.push_str("<|im_start|>system\n");
        prompt.push_str(&context_block(ctx));
        prompt.push_str("<|im_end|>\n");
    }
    for msg in history {
        let role = if msg.is_user { "user" } else { "assistant" };
        prompt.push_str("<|im_start|>");
        prompt.push_str(role);
        prompt.push('\n');
        if !msg.is_user {
            // Reasoning-style models expect their earlier thinking replayed
            // verbatim for multi-turn coherence.
            if let Some(reasoning) = &msg.reasoning {
                prompt.push_str("<think>");
                prompt.push_str(reasoning);
                prompt.push_str("</think>\n");
            }
        }
        prompt.push_str(&msg.content);
        prompt.push_str("<|im_end|>\n");
    }
    prompt.push_str("<|im_start|>user\n");
    prompt.push_str(user_message);
    prompt.push_str("<|im_end|>\n<|im_start|>assistant\n");
    prompt
}

fn render_llama3(history: &[&Message], user_message: &str, context: Option<&str>) -> String {
    let mut prompt = String::from("<|begin_of_text|>");
    if let Some(ctx) = context {
        prompt.push_str("<|start_header_id|>system<|end_header_id|>\n\n");
        prompt.push_str(&context_block(ctx));
        prompt.push_str("<|eot_id|>");
    }
    for msg in history {
        let role = if msg.is_user { "user" } else { "assistant" };
        prompt.push_str("<|start_header_id|>");
        prompt.push_str(role);
        prompt.push_str("<|end_header_id|>\n\n");
        prompt.push_str(&msg.content);
        prompt.push_str("<|eot_id|>");
    }
    prompt.push_str("<|start_header_id|>user<|end_header_id|>\n\n");
    prompt.push_str(user_message);
    prompt.push_str("<|eot_id|><|start_header_id|>assistant<|end_header_id|>\n\n");
    prompt
}

fn render_mistral(history: &[&Message], user_message: &str, context: Option<&str>) -> String {
    let mut pending = context.map(context_block);
    let mut prompt = String::from("<s>");
    for msg in history {
        if msg.is_user {
            let content = merge_context(&mut pending, &msg.content);
            prompt.push_str("[INST] ");
            prompt.push_str(&content);
            prompt.push_str(" [/INST]");
        } else {
            prompt.push(' ');
            prompt.push_str(&msg.content);
            prompt.push_str("</s>");
        }
    }
    let content = merge_context(&mut pending, user_message);
    prompt.push_str("[INST] ");
    prompt.push_str(&content);
    prompt.push_str(" [/INST]");
    prompt
}

fn render_gemma(history: &[&Message], user_message: &str, context: Option<&str>) -> String {
    let mut pending = context.map(context_block);
    let mut prompt = String::new();
    for msg in history {
        if msg.is_user {
            let content = merge_context(&mut pending, &msg.content);
            prompt.push_str("<start_of_turn>user\n");
            prompt.push_str(&content);
            prompt.push_str("<end_of_turn>\n");
        } else {
            prompt.push_str("<start_of_turn>model\n");
            prompt.push_str(&msg.content);
            prompt.push_str("<end_of_turn>\n");
        }
    }
    let content = merge_context(&mut pending, user_message);
    prompt.push_str("<start_of_turn>user\n");
    prompt.push_str(&content);
    prompt.push_str("<end_of_turn>\n<start_of_turn>model\n");
    prompt
}

fn render_phi(history: &[&Message], user_message: &str, context: Option<&str>) -> String {
    let mut prompt = String::new();
    if let Some(ctx) = context {
        prompt.push_str("<|system|>\n");
        prompt.push_str(&context_block(ctx));
        prompt.push_str("<|end|>\n");
    }
    for msg in history {
        let tag = if msg.is_user { "<|user|>" } else { "<|assistant|>" };
        prompt.push_str(tag);
        prompt.push('\n');
        prompt.push_str(&msg.content);
        prompt.push_str("<|end|>\n");
    }
    prompt.push_str("<|user|>\n");
    prompt.push_str(user_message);
    prompt.push_str("<|end|>\n<|assistant|>\n");
    prompt
}

fn render_alpaca(history: &[&Message], user_message: &str, context: Option<&str>) -> String {
    let mut pending = context.map(context_block);
    let mut prompt = String::from(ALPACA_PREAMBLE);
    prompt.push_str("\n\n");
    for msg in history {
        if msg.is_user {
            let content = merge_context(&mut pending, &msg.content);
            prompt.push_str("### Instruction:\n");
            prompt.push_str(&content);
            prompt.push_str("\n\n");
        } else {
            prompt.push_str("### Response:\n");
            prompt.push_str(&msg.content);
            prompt.push_str("\n\n");
        }
    }
    let content = merge_context(&mut pending, user_message);
    prompt.push_str("### Instruction:\n");
    prompt.push_str(&content);
    prompt.push_str("\n\n### Response:\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: [PromptFormat; 6] = [
        PromptFormat::ChatMl,
        PromptFormat::Llama3,
        PromptFormat::Mistral,
        PromptFormat::Gemma,
        PromptFormat::Phi,
        PromptFormat::Alpaca,
    ];

    fn sample_history(turns: usize) -> Vec<Message> {
        let mut history = Vec::new();
        for i in 0..turns {
            history.push(Message::user(format!("question number {}", i)));
            history.push(Message::assistant(format!("answer number {}", i), None, None));
        }
        history
    }

    #[test]
    fn new_user_message_appears_exactly_once() {
        let history = sample_history(2);
        for format in FORMATS {
            let prompt =
                PromptBuilder::render(format, &history, "a brand new question", None);
            assert_eq!(
                prompt.matches("a brand new question").count(),
                1,
                "format {:?}",
                format
            );
        }
    }

    #[test]
    fn error_messages_are_never_replayed() {
        let mut history = sample_history(1);
        history.push(Message::error("generation failed: model exploded"));
        for format in FORMATS {
            let prompt = PromptBuilder::render(format, &history, "next question", None);
            assert!(
                !prompt.contains("model exploded"),
                "format {:?} leaked an error message",
                format
            );
        }
    }

    #[test]
    fn context_and_attribution_appear_exactly_once() {
        let history = sample_history(8);
        for format in FORMATS {
            let prompt = PromptBuilder::render(
                format,
                &history,
                "what does the manual say?",
                Some("[manual.pdf] Press the red button."),
            );
            assert_eq!(
                prompt.matches("Press the red button.").count(),
                1,
                "format {:?}",
                format
            );
            assert_eq!(
                prompt.matches(ATTRIBUTION_INSTRUCTION).count(),
                1,
                "format {:?}",
                format
            );
        }
    }

    #[test]
    fn history_window_drops_old_turns() {
        let history = sample_history(8); // 16 messages
        let prompt = PromptBuilder::render(PromptFormat::ChatMl, &history, "latest", None);

        // Window of 6: the last three exchanges survive.
        assert!(prompt.contains("question number 7"));
        assert!(prompt.contains("answer number 5"));
        assert!(!prompt.contains("question number 0"));
        assert!(!prompt.contains("answer number 4"));
    }

    #[test]
    fn alpaca_window_is_shorter() {
        let history = sample_history(8);
        let prompt = PromptBuilder::render(PromptFormat::Alpaca, &history, "latest", None);

        assert!(prompt.contains("question number 7"));
        assert!(!prompt.contains("question number 5"));
    }

    #[test]
    fn every_format_ends_with_an_open_assistant_turn() {
        let history = sample_history(1);
        let cases = [
            (PromptFormat::ChatMl, "<|im_start|>assistant\n"),
            (
                PromptFormat::Llama3,
                "<|start_header_id|>assistant<|end_header_id|>\n\n",
            ),
            (PromptFormat::Mistral, " [/INST]"),
            (PromptFormat::Gemma, "<start_of_turn>model\n"),
            (PromptFormat::Phi, "<|assistant|>\n"),
            (PromptFormat::Alpaca, "### Response:\n"),
        ];
        for (format, suffix) in cases {
            let prompt = PromptBuilder::render(format, &history, "go on", None);
            assert!(
                prompt.ends_with(suffix),
                "format {:?} ended with {:?}",
                format,
                &prompt[prompt.len().saturating_sub(40)..]
            );
        }
    }

    #[test]
    fn chatml_replays_stored_reasoning() {
        let history = vec![
            Message::user("why is the sky blue?"),
            Message::assistant(
                "Rayleigh scattering.",
                Some("Shorter wavelengths scatter more.".to_string()),
                None,
            ),
        ];
        let prompt = PromptBuilder::render(PromptFormat::ChatMl, &history, "and sunsets?", None);
        assert!(prompt.contains("<think>Shorter wavelengths scatter more.</think>"));

        // Other families never saw the reasoning and must not replay it.
        let prompt = PromptBuilder::render(PromptFormat::Llama3, &history, "and sunsets?", None);
        assert!(!prompt.contains("Shorter wavelengths"));
    }

    #[test]
    fn system_free_formats_put_context_in_first_user_turn() {
        let history = sample_history(2);
        let prompt = PromptBuilder::render(
            PromptFormat::Mistral,
            &history,
            "latest",
            Some("[doc] context payload"),
        );
        let context_pos = prompt.find("context payload").unwrap();
        let first_turn_pos = prompt.find("question number 0").unwrap();
        assert!(context_pos < first_turn_pos);
    }
}
