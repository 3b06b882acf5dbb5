//! Prompt construction for the news search model.
//!
//! Templates carry `{source}` and `{topic}` placeholders. After substitution
//! the prompt is strengthened so the model answers with a JSON array of
//! articles, unless the template already asks for that.

/// Appended when the prompt says nothing about JSON.
const JSON_FORMAT_BLOCK: &str = r#"

IMPORTANT: Return the response as a JSON array. Each news article should be a JSON object with these fields: "title", "description", "date", "source", "canonical_url". Example: [{"title":"Title","description":"Description","date":"2024-01-15","source":"Source","canonical_url":"https://example.com"}]"#;

/// Appended when the prompt mentions JSON without insisting on it.
const JSON_ONLY_DIRECTIVE: &str =
    "\n\nCRITICAL: Return ONLY the JSON array, no additional text or explanation.";

/// How many characters of the original answer are sent back for re-conversion.
pub const RECONVERT_INPUT_CHARS: usize = 2000;

/// Substitute every `{source}` and `{topic}` placeholder in `template`.
pub fn build_prompt(template: &str, source: &str, topic: &str) -> String {
    template.replace("{source}", source).replace("{topic}", topic)
}

/// Make sure `prompt` asks for a JSON array of articles.
///
/// - No JSON hint at all (`json`, `JSON`, `[`, `{`): append the full format block.
/// - A hint but no emphasis (`ONLY`, `exactly`): append a short directive.
/// - Otherwise the prompt is returned unchanged.
pub fn enhance_for_json(prompt: &str) -> String {
    let has_json_hint = ["json", "JSON", "[", "{"].iter().any(|t| prompt.contains(t));

    if !has_json_hint {
        return format!("{prompt}{JSON_FORMAT_BLOCK}");
    }

    if !prompt.contains("ONLY") && !prompt.contains("exactly") {
        return format!("{prompt}{JSON_ONLY_DIRECTIVE}");
    }

    prompt.to_string()
}

/// Build the prompt asking the model to reformat its own previous answer.
///
/// Only the first [`RECONVERT_INPUT_CHARS`] characters of `response` are embedded.
pub fn reconversion_prompt(response: &str, source: &str, topic: &str) -> String {
    let excerpt = crate::utils::take_chars(response, RECONVERT_INPUT_CHARS);
    format!(
        "Convert the following text about {topic} news from {source} into a JSON array format.\n\
         Extract any news articles mentioned and format them as JSON objects with these fields: title, description, date, source, canonical_url.\n\
         Return ONLY the JSON array, no additional text.\n\
         \n\
         Text to convert:\n\
         {excerpt}"
    )
}
