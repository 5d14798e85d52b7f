//! Snippet sources: where each round's target text comes from.
//!
//! The room asks its [`SnippetSource`] for a new snippet once at creation
//! and once per completed round, always while holding the room lock.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::RoomError;

/// Built-in snippets used when no custom list is configured.
const BUILTIN_SNIPPETS: &[&str] = &[
    "fn main() {\n\tprintln!(\"hello, world\");\n}",
    "let total: u64 = items.iter().map(|i| i.price).sum();",
    "for (i, line) in text.lines().enumerate() {\n\tprintln!(\"{i}: {line}\");\n}",
    "if let Some(user) = users.get(&id) {\n\treturn Ok(user.clone());\n}",
    "match cmd {\n\tCommand::Start => start(),\n\tCommand::Stop => stop(),\n}",
    "func add(a, b int) int {\n\treturn a + b\n}",
    "const sum = xs.reduce((acc, x) => acc + x, 0)",
    "while queue:\n\tnode = queue.pop(0)\n\tvisit(node)",
];

/// Supplies the target text of each round.
///
/// Implementations must return a non-empty string: a round over an empty
/// snippet would be completed by any report of zero characters.
pub trait SnippetSource: Send + Sync + 'static {
    /// Returns the snippet for the next round.
    fn next_snippet(&self) -> String;
}

impl<S: SnippetSource + ?Sized> SnippetSource for Box<S> {
    fn next_snippet(&self) -> String {
        (**self).next_snippet()
    }
}

/// Drops empty entries and fails if nothing usable is left.
fn usable(snippets: Vec<String>) -> Result<Vec<String>, RoomError> {
    let snippets: Vec<String> =
        snippets.into_iter().filter(|s| !s.is_empty()).collect();
    if snippets.is_empty() {
        return Err(RoomError::NoSnippets);
    }
    Ok(snippets)
}

/// Splits a text file into snippets separated by blank lines.
///
/// Trailing whitespace of each snippet is trimmed; the leading
/// indentation of its lines is kept.
pub fn parse_snippets(text: &str) -> Vec<String> {
    let mut snippets = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                snippets.push(current.join("\n").trim_end().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        snippets.push(current.join("\n").trim_end().to_string());
    }
    snippets
}

// ---------------------------------------------------------------------------
// RandomSnippets
// ---------------------------------------------------------------------------

/// Picks a snippet uniformly at random, never the same one twice in a
/// row when more than one is available.
#[derive(Debug)]
pub struct RandomSnippets {
    snippets: Vec<String>,
    /// Index of the previous pick, `usize::MAX` before the first one.
    last: AtomicUsize,
}

impl RandomSnippets {
    /// Creates a source over the given snippets.
    ///
    /// # Errors
    /// Returns [`RoomError::NoSnippets`] if no non-empty snippet is given.
    pub fn new(snippets: Vec<String>) -> Result<Self, RoomError> {
        Ok(Self {
            snippets: usable(snippets)?,
            last: AtomicUsize::new(usize::MAX),
        })
    }

    /// Creates a source over the built-in code snippets.
    pub fn builtin() -> Self {
        Self {
            snippets: BUILTIN_SNIPPETS.iter().map(|s| (*s).to_string()).collect(),
            last: AtomicUsize::new(usize::MAX),
        }
    }

    /// Number of snippets to choose from.
    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    /// Always `false`: construction rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

impl Default for RandomSnippets {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SnippetSource for RandomSnippets {
    fn next_snippet(&self) -> String {
        let n = self.snippets.len();
        let last = self.last.load(Ordering::Relaxed);
        let mut rng = rand::rng();

        let idx = if n > 1 && last < n {
            // Draw from the other n - 1 entries, skipping over `last`.
            let i = rng.random_range(0..n - 1);
            if i >= last { i + 1 } else { i }
        } else {
            rng.random_range(0..n)
        };

        self.last.store(idx, Ordering::Relaxed);
        self.snippets[idx].clone()
    }
}

// ---------------------------------------------------------------------------
// SnippetDeck
// ---------------------------------------------------------------------------

/// Hands out snippets in order, wrapping around at the end.
///
/// Deterministic, which makes it the source of choice for tests and
/// scripted demos.
#[derive(Debug)]
pub struct SnippetDeck {
    snippets: Vec<String>,
    cursor: AtomicUsize,
}

impl SnippetDeck {
    /// Creates a deck over the given snippets.
    ///
    /// # Errors
    /// Returns [`RoomError::NoSnippets`] if no non-empty snippet is given.
    pub fn new<I, S>(snippets: I) -> Result<Self, RoomError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            snippets: usable(snippets.into_iter().map(Into::into).collect())?,
            cursor: AtomicUsize::new(0),
        })
    }
}

impl SnippetSource for SnippetDeck {
    fn next_snippet(&self) -> String {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.snippets[i % self.snippets.len()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_cycles_in_order() {
        let deck = SnippetDeck::new(["a", "b"]).unwrap();
        let drawn: Vec<String> = (0..5).map(|_| deck.next_snippet()).collect();
        assert_eq!(drawn, ["a", "b", "a", "b", "a"]);
    }

    #[test]
    fn test_deck_skips_empty_entries() {
        let deck = SnippetDeck::new(["", "x", ""]).unwrap();
        assert_eq!(deck.next_snippet(), "x");
        assert_eq!(deck.next_snippet(), "x");
    }

    #[test]
    fn test_deck_rejects_all_empty() {
        assert!(matches!(
            SnippetDeck::new(Vec::<String>::new()),
            Err(RoomError::NoSnippets)
        ));
        assert!(matches!(SnippetDeck::new([""]), Err(RoomError::NoSnippets)));
    }

    #[test]
    fn test_random_never_repeats_previous() {
        let source =
            RandomSnippets::new(vec!["one".into(), "two".into(), "three".into()]).unwrap();
        let mut prev = source.next_snippet();
        for _ in 0..200 {
            let next = source.next_snippet();
            assert_ne!(next, prev);
            prev = next;
        }
    }

    #[test]
    fn test_random_single_snippet_repeats() {
        let source = RandomSnippets::new(vec!["only".into()]).unwrap();
        assert_eq!(source.next_snippet(), "only");
        assert_eq!(source.next_snippet(), "only");
    }

    #[test]
    fn test_builtin_snippets_are_non_empty() {
        let source = RandomSnippets::builtin();
        assert!(!source.is_empty());
        for _ in 0..20 {
            assert!(!source.next_snippet().is_empty());
        }
    }

    #[test]
    fn test_boxed_source_delegates() {
        let source: Box<dyn SnippetSource> =
            Box::new(SnippetDeck::new(["x", "y"]).unwrap());
        assert_eq!(source.next_snippet(), "x");
        assert_eq!(source.next_snippet(), "y");
    }

    #[test]
    fn test_parse_snippets_splits_on_blank_lines() {
        let text = "fn a() {}\n\n  \nlet x = 1;\n    x + 1\n\n\nend  \n";
        assert_eq!(
            parse_snippets(text),
            ["fn a() {}", "let x = 1;\n    x + 1", "end"]
        );
    }
}
