//! In-process crawl statistics
//!
//! `CrawlStats` implements [`Counters`] with one atomic per counter, so it
//! can be shared by the grouping stage and every worker without locking.

use super::traits::{Counter, Counters};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one run
#[derive(Debug, Default)]
pub struct CrawlStats {
    values: [AtomicU64; Counter::COUNT],
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.values[index(counter)].load(Ordering::Relaxed)
    }

    /// Copies the current values
    pub fn snapshot(&self) -> CrawlStatistics {
        let counts = Counter::ALL
            .iter()
            .map(|&counter| (counter, self.get(counter)))
            .collect();
        CrawlStatistics { counts }
    }
}

impl Counters for CrawlStats {
    fn increment(&self, counter: Counter, delta: u64) {
        self.values[index(counter)].fetch_add(delta, Ordering::Relaxed);
    }
}

fn index(counter: Counter) -> usize {
    counter as usize
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    pub counts: HashMap<Counter, u64>,
}

impl CrawlStatistics {
    pub fn count(&self, counter: Counter) -> u64 {
        self.counts.get(&counter).copied().unwrap_or(0)
    }

    /// Items that reached a terminal outcome
    pub fn total_processed(&self) -> u64 {
        [
            Counter::Fetched,
            Counter::Failed,
            Counter::Deferred,
            Counter::Skipped,
            Counter::Blocked,
            Counter::Invalid,
            Counter::UnknownHost,
            Counter::Aborted,
        ]
        .iter()
        .map(|&c| self.count(c))
        .sum()
    }

    /// Returns the success rate as a percentage of processed items
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.count(Counter::Fetched) as f64 / total as f64) * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Fetch Statistics ===\n");

    println!("Overview:");
    println!("  Items queued: {}", stats.count(Counter::Queued));
    println!("  Items processed: {}", stats.total_processed());
    println!("  robots.txt fetched: {}", stats.count(Counter::RobotsFetched));
    println!();

    println!("Items by Outcome:");
    let mut outcome_counts: Vec<_> = stats
        .counts
        .iter()
        .filter(|(counter, count)| {
            **count > 0
                && !matches!(
                    counter,
                    Counter::Queued | Counter::Fetching | Counter::RobotsFetched
                )
        })
        .collect();
    outcome_counts.sort_by(|a, b| b.1.cmp(a.1));

    let total = stats.total_processed();
    for (counter, count) in outcome_counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", counter.name(), count, percentage);
    }
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} items fetched)",
        stats.success_rate(),
        stats.count(Counter::Fetched),
        total
    );
}
