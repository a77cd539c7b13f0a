use regex::RegexBuilder;

use super::parse_search;

/// Char offsets of `text` covered by any whitespace-separated term of `search`
///
/// Matching is case-insensitive and literal. Matches are found left to right
/// without overlap, so the offsets come out ascending. Blank search or text
/// gives no offsets.
pub fn get_match_positions(text: &str, search: &str) -> Vec<usize> {
    let parsed = parse_search(search);

    if text.is_empty() || parsed.is_empty() {
        return Vec::new();
    }

    let alternation = parsed
        .terms
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|");

    let regex = match RegexBuilder::new(&format!("({})", alternation))
        .case_insensitive(true)
        .build()
    {
        Ok(regex) => regex,
        Err(e) => {
            log::warn!("Cannot highlight search {:?}: {}", search, e);
            return Vec::new();
        }
    };

    let mut positions = Vec::new();
    let mut chars = text.char_indices().enumerate().peekable();

    for found in regex.find_iter(text) {
        // Walk the char cursor forward, collecting chars inside the match
        while let Some(&(char_idx, (byte_idx, _))) = chars.peek() {
            if byte_idx >= found.end() {
                break;
            }
            if byte_idx >= found.start() {
                positions.push(char_idx);
            }
            chars.next();
        }
    }

    positions
}
