use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

// Body text cap, in characters
pub const MAX_INPUT_CHARS: usize = 2000;

lazy_static! {
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?i)<script[^>]*>.*?</script>").unwrap();
    static ref JS_PROTOCOL: Regex = Regex::new(r"(?i)javascript:").unwrap();
}

/// Strip `<script>` blocks and `javascript:` URIs, trim, and cap at
/// [`MAX_INPUT_CHARS`] characters. Non-string values sanitize to an empty string.
pub fn sanitize_input(input: &Value) -> String {
    match input {
        Value::String(s) => sanitize_str(s),
        _ => String::new(),
    }
}

pub fn sanitize_str(input: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(input, "");
    let cleaned = JS_PROTOCOL.replace_all(&without_scripts, "");

    // truncate on char boundaries, not bytes
    cleaned.trim().chars().take(MAX_INPUT_CHARS).collect()
}
