use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)</?[a-zA-Z!][^>]*>").expect("valid regex"));
static CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid regex"));
static OCTET: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[a-fA-F0-9]{2}").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\r\n\t ]+").expect("valid regex"));

/// Reduce a submitted field to a single line of plain text: markup and
/// script/style bodies removed, control characters and percent-encoded
/// octets dropped, whitespace collapsed and trimmed.
pub fn sanitize_text_field(input: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(input, "");
    let text = TAG.replace_all(&text, "");
    let text = CONTROL.replace_all(&text, "");

    let mut text = text.into_owned();
    while OCTET.is_match(&text) {
        text = OCTET.replace_all(&text, "").into_owned();
    }

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
