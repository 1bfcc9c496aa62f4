//! Whitespace normalization shared by parsers and the chunker

/// Collapse every whitespace run (newlines included) to one space and trim the ends
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
