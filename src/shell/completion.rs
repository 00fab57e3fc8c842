//! Tab completion over the precomputed completion index.

use super::registry::CompletionIndex;

/// Candidates for the word being typed at the end of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Byte offset where the partial word starts.
    pub start: usize,
    /// The partial word itself.
    pub partial: String,
    /// Matching candidates, sorted.
    pub candidates: Vec<String>,
}

/// Completes the last word of `line`.
///
/// Command words complete against the children of the path typed so far.
/// Once the path reaches a leaf, words starting with `-` complete against
/// its `--long` options.
pub fn complete(index: &CompletionIndex, line: &str) -> Completion {
    let start = line
        .rfind(char::is_whitespace)
        .map(|i| i + line[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    let partial = &line[start..];

    let head = line[..start].trim_start();
    let head = head.strip_prefix('/').unwrap_or(head);
    let (start, partial) = match partial.strip_prefix('/') {
        Some(rest) if head.trim().is_empty() => (start + 1, rest),
        _ => (start, partial),
    };

    let mut path = String::new();
    let mut path_complete = true;
    for word in head.split_whitespace() {
        if index.children(&path).iter().any(|child| *child == word) {
            if !path.is_empty() {
                path.push(' ');
            }
            path.push_str(word);
        } else {
            path_complete = false;
            break;
        }
    }

    let mut candidates: Vec<String> = if partial.starts_with('-') {
        index
            .options(&path)
            .iter()
            .filter(|o| o.starts_with(partial))
            .cloned()
            .collect()
    } else if path_complete {
        index
            .children(&path)
            .iter()
            .filter(|c| c.starts_with(partial))
            .map(|c| c.to_string())
            .collect()
    } else {
        Vec::new()
    };
    candidates.sort();

    Completion {
        start,
        partial: partial.to_string(),
        candidates,
    }
}

/// Applies a completion to `line`.
///
/// A unique candidate replaces the partial word and adds a space. Several
/// candidates extend the word to their longest common prefix. Returns
/// `None` when the line would not change.
pub fn apply(line: &str, completion: &Completion) -> Option<String> {
    match completion.candidates.as_slice() {
        [] => None,
        [only] => Some(format!("{}{only} ", &line[..completion.start])),
        many => {
            let prefix = common_prefix(many);
            (prefix.len() > completion.partial.len())
                .then(|| format!("{}{prefix}", &line[..completion.start]))
        }
    }
}

fn common_prefix(words: &[String]) -> &str {
    let Some(first) = words.first() else {
        return "";
    };
    let mut end = first.len();
    for word in &words[1..] {
        end = first
            .char_indices()
            .zip(word.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(end);
    }
    &first[..end]
}
