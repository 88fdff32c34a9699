//! Diagnostic-stream triage.
//!
//! llama.cpp-style executables log everything to stderr: model load timings,
//! sampler echoes, tensor placement, performance counters. Those lines are
//! informational. Anything that matches none of the known patterns is held as
//! a candidate real error and surfaced only if the run produced no output.

use std::sync::OnceLock;

use regex::RegexSet;

use crate::errors::CoreError;

/// Line patterns the executable emits during a healthy run.
const INFORMATIONAL_PATTERNS: &[&str] = &[
    r"^build\s*:",
    r"^main\s*:",
    r"^system_info\s*:",
    r"^sampler",
    r"^sampling",
    r"^generate\s*:",
    r"^llama_",
    r"^llm_load_",
    r"^load\s*:",
    r"^load_tensors\s*:",
    r"^print_info\s*:",
    r"^init\s*:",
    r"^ggml_",
    r"^gguf_",
    r"^common_",
    r"^clip_",
    r"^mtmd_",
    r"^log_",
    r"n_ctx",
    r"n_batch",
    r"^warning\s*:",
    r"^\s*$",
    r"^\.+\s*$",
    r"^\s*-+\s*$",
];

fn informational_set() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new(INFORMATIONAL_PATTERNS).expect("informational patterns must compile")
    })
}

/// Accumulates stderr lines during a run and classifies them after exit.
#[derive(Debug, Default)]
pub(crate) struct StderrTriage {
    suspicious: Vec<String>,
}

impl StderrTriage {
    pub fn observe(&mut self, line: &str) {
        if informational_set().is_match(line) {
            tracing::debug!("[inference] {}", line);
        } else {
            tracing::warn!("[inference] unrecognized diagnostic: {}", line);
            self.suspicious.push(line.to_string());
        }
    }

    pub fn is_clean(&self) -> bool {
        self.suspicious.is_empty()
    }

    /// Turn accumulated residue into an error, if any. Context-window
    /// overflows get a dedicated, friendlier variant.
    pub fn into_failure(self) -> Option<CoreError> {
        if self.suspicious.is_empty() {
            return None;
        }

        let joined = self.suspicious.join("\n");
        let lowered = joined.to_lowercase();
        let overflow = lowered.contains("context")
            && (lowered.contains("exceed") || lowered.contains("too long") || lowered.contains("too large"));

        if overflow {
            Some(CoreError::ContextOverflow)
        } else {
            Some(CoreError::Generation(joined))
        }
    }
}
