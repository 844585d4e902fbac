// ABOUTME: Expands :shortcode: emoji names into the emoji characters they stand for
// ABOUTME: Shared by the outbound renderers of both platforms

/// Replace every known `:name:` shortcode in `text` with its emoji.
/// Unknown names and stray colons are left as they are.
pub fn expand_shortcodes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let name_len = after
            .find(|c: char| !is_shortcode_char(c))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        if !name.is_empty() && after[name_len..].starts_with(':') {
            if let Some(emoji) = emojis::get_by_shortcode(name) {
                out.push_str(emoji.as_str());
                rest = &after[name_len + 1..];
                continue;
            }
        }

        // The closing colon may open the next shortcode
        out.push(':');
        rest = after;
    }

    out.push_str(rest);
    out
}

fn is_shortcode_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '+' | '-')
}
