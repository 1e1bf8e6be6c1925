/// Characters that may follow a backslash in a JSON string escape.
const JSON_ESCAPES: &[char] = &['"', '\\', '/', 'b', 'f', 'n', 'r', 't', 'u'];

/// Drops every backslash that does not start a valid JSON escape.
///
/// Script blocks on the source pages carry JavaScript string escapes such as
/// `\'` or `\x` that JSON decoders reject. The offending backslash is deleted and
/// the character after it is kept as-is. Valid escapes are copied through
/// untouched, so already-valid JSON comes back unchanged.
pub fn repair_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.peek() {
            Some(next) if JSON_ESCAPES.contains(next) => {
                // Consume the pair so `\\` never re-arms the following char.
                out.push('\\');
                out.push(*next);
                chars.next();
            }
            _ => {}
        }
    }

    out
}
