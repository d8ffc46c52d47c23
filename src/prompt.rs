/// Marker the assistant is instructed to put in front of each usable prompt.
pub const FINAL_PROMPT_MARKER: &str = "Final prompt:";

/// Ordered prompt blocks extracted from an assistant reply. Each marker
/// occurrence starts a block running to the next marker; empty blocks are
/// skipped.
pub fn extract_final_prompts(reply: &str) -> Vec<String> {
    reply
        .split(FINAL_PROMPT_MARKER)
        .skip(1)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

/// The prompt a "use this prompt" action submits: the first marker block when
/// the marker is present, the reply unchanged otherwise.
#[allow(dead_code)]
pub fn select_final_prompt(reply: &str) -> String {
    let mut parts = reply.split(FINAL_PROMPT_MARKER);
    let _leading = parts.next();
    match parts.next() {
        Some(block) => block.trim().to_string(),
        None => reply.to_string(),
    }
}
