use std::cmp::Ordering;

/// One URL with its priority; higher scores are fetched first
#[derive(Debug, Clone)]
pub struct ScoredItem {
    pub url: String,
    pub score: f64,
}

impl ScoredItem {
    pub fn new(url: impl Into<String>, score: f64) -> Self {
        Self {
            url: url.into(),
            score,
        }
    }
}

impl PartialEq for ScoredItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredItem {}

impl PartialOrd for ScoredItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Greater means more urgent: higher score, then lexicographically smaller URL
impl Ord for ScoredItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.url.cmp(&self.url))
    }
}
