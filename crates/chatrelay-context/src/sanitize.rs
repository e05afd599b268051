//! Reply cleanup before relaying to a chat channel

/// Collapses every whitespace run (newlines included) to a single space,
/// trims both ends and caps the result at `max_chars` characters.
///
/// The cap counts Unicode scalar values and always cuts on a character
/// boundary. Whitespace exposed at the end by the cut is trimmed as well, so
/// sanitizing an already sanitized string returns it unchanged.
///
/// The cap is in characters, not bytes: 420 CJK characters encode to 1260
/// bytes, which overruns the 512-byte IRC line and gets cut by the server.
pub fn sanitize(raw: &str, max_chars: usize) -> String {
    let mut cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some((cut, _)) = cleaned.char_indices().nth(max_chars) {
        cleaned.truncate(cut);
        let kept = cleaned.trim_end().len();
        cleaned.truncate(kept);
    }

    cleaned
}
