/// Search term split into literal terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Lowercased terms, first occurrence order, no duplicates
    pub terms: Vec<String>,
}

/// Split a search string on whitespace into lowercased literal terms
///
/// Terms are OR-ed together by both the index and the highlighter,
/// so duplicates are dropped.
pub fn parse_search(search: &str) -> ParsedQuery {
    let mut terms: Vec<String> = Vec::new();

    for part in search.split_whitespace() {
        let term = part.to_lowercase();
        if !terms.contains(&term) {
            terms.push(term);
        }
    }

    ParsedQuery { terms }
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Fragments to look up in an n-gram index with grams up to `resolution` chars
    ///
    /// A term that fits in one gram is looked up as is. A longer term becomes
    /// every `resolution`-wide window of it, all of which must be present.
    pub fn term_fragments(&self, resolution: usize) -> Vec<Vec<String>> {
        let resolution = resolution.max(1);

        self.terms
            .iter()
            .map(|term| {
                let chars: Vec<char> = term.chars().collect();
                if chars.len() <= resolution {
                    return vec![term.clone()];
                }
                let mut fragments: Vec<String> = Vec::new();
                for window in chars.windows(resolution) {
                    let fragment: String = window.iter().collect();
                    if !fragments.contains(&fragment) {
                        fragments.push(fragment);
                    }
                }
                fragments
            })
            .collect()
    }
}
