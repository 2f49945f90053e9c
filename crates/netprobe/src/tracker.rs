//! Redirect loop guard, scoped to one probe call.

use std::collections::HashSet;
use url::Url;

/// Normalized URLs that already answered with a redirect.
#[derive(Debug, Default)]
pub struct RedirectTracker {
    visited: HashSet<String>,
}

impl RedirectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url`; returns `false` if it was already visited.
    pub fn visit(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn clear(&mut self) {
        self.visited.clear();
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_visit_is_detected() {
        let url = Url::parse("http://172.20.0.3/").unwrap();
        let mut tracker = RedirectTracker::new();
        assert!(tracker.visit(&url));
        assert!(!tracker.visit(&url));
        assert!(tracker.contains(&url));

        tracker.clear();
        assert!(tracker.is_empty());
    }
}
