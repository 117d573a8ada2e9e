use std::collections::HashSet;

use rustrict::CensorStr;

/// Decides whether a chat message may be relayed.
///
/// Any `Fn(&str) -> bool` closure works as a filter, which keeps tests and
/// ad-hoc rules cheap to write.
pub trait ContentFilter: Send + Sync {
    fn is_profane(&self, text: &str) -> bool;
}

impl<F> ContentFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_profane(&self, text: &str) -> bool {
        self(text)
    }
}

/// Flags anything `rustrict` deems inappropriate, plus a deny list of
/// extra words matched whole and case-insensitively.
///
/// `rustrict` already copes with leetspeak, repeated letters and masking
/// characters; the deny list is for site-specific terms it does not know.
#[derive(Default)]
pub struct ProfanityFilter {
    blocked: HashSet<String>,
}

impl ProfanityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() {
                self.blocked.insert(word);
            }
        }
        self
    }

    fn is_blocked(&self, text: &str) -> bool {
        !self.blocked.is_empty()
            && text
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .any(|w| self.blocked.contains(&w.to_lowercase()))
    }
}

impl ContentFilter for ProfanityFilter {
    fn is_profane(&self, text: &str) -> bool {
        self.is_blocked(text) || text.is_inappropriate()
    }
}
