//! Robots.txt parser implementation
//!
//! Line-oriented and lenient: malformed lines are logged and skipped, never
//! fatal. Only the first group naming our agent is honored; the wildcard
//! group applies when no group names us.

use super::rules::{decode_path, RobotRule, RobotsRules};
use crate::SumiError;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Warnings logged per robots file before the rest are suppressed
pub const MAX_WARNINGS_PER_FILE: usize = 5;

/// Crawl delays above this are treated as a refusal to be crawled
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(300);

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

fn html_tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"))
}

/// Recognized robots.txt fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    UserAgent,
    Disallow,
    Allow,
    CrawlDelay,
    Sitemap,
    Unknown,
}

impl Directive {
    fn from_name(name: &str) -> Self {
        match name {
            "user-agent" | "useragent" | "user agent" => Self::UserAgent,
            "disallow" | "dissallow" | "dissalow" | "disalow" => Self::Disallow,
            "allow" => Self::Allow,
            "crawl-delay" | "crawldelay" | "crawl delay" => Self::CrawlDelay,
            "sitemap" | "site-map" => Self::Sitemap,
            _ => Self::Unknown,
        }
    }
}

/// Splits a line into its field and value
///
/// Accepts `field: value` and, for known fields, `field value` with the
/// colon missing.
fn tokenize(line: &str) -> Option<(Directive, &str)> {
    if let Some((name, value)) = line.split_once(':') {
        let name = name.trim().to_lowercase();
        return Some((Directive::from_name(&name), value.trim()));
    }

    let (name, value) = line.split_once(char::is_whitespace)?;
    match Directive::from_name(&name.to_lowercase()) {
        Directive::Unknown => None,
        directive => Some((directive, value.trim())),
    }
}

/// Accumulated parse state for one file
#[derive(Debug, Default)]
struct ParseState {
    matched_real_name: bool,
    matched_wildcard: bool,
    adding_rules: bool,
    finished_agent_fields: bool,
    done: bool,
    rules: Vec<RobotRule>,
    crawl_delay: Option<Duration>,
    sitemaps: Vec<String>,
    warnings: usize,
}

/// Parses robots.txt content for one agent name
#[derive(Debug, Clone)]
pub struct RobotsRulesParser {
    agent_name: String,
}

impl RobotsRulesParser {
    /// Creates a parser matching groups against `agent_name`
    ///
    /// A group applies when our lowercased name contains one of its agent tokens.
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_lowercase(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Maps a failed robots.txt fetch to a policy
    ///
    /// | Status | Result |
    /// |--------|--------|
    /// | 2xx | error, the fetch did not fail |
    /// | 3xx | deferred |
    /// | 4xx | allow all |
    /// | other | deferred |
    pub fn failed_fetch(status: u16) -> crate::Result<RobotsRules> {
        match status {
            200..=299 => Err(SumiError::Robots(format!(
                "status {} is not a failed robots.txt fetch",
                status
            ))),
            300..=399 => Ok(RobotsRules::deferred()),
            400..=499 => Ok(RobotsRules::allow_all()),
            _ => Ok(RobotsRules::deferred()),
        }
    }

    /// Parses raw robots.txt bytes fetched for `target_url`
    pub fn parse_content(&self, target_url: &Url, content: &[u8], content_type: &str) -> RobotsRules {
        let text = decode_content(content);
        let lowered = text.to_lowercase();

        let is_html = lowered.contains("<html")
            || lowered.contains("<head")
            || lowered.contains("<body")
            || content_type.to_lowercase().contains("html");
        if is_html && !lowered.contains("user-agent:") {
            debug!(url = %target_url, "robots.txt looks like HTML, allowing all");
            return RobotsRules::allow_all();
        }

        let mut state = ParseState::default();
        let lines = text.split(['\n', '\r', '\u{85}', '\u{2028}', '\u{2029}']);
        for raw in lines {
            let without_comment = match raw.find('#') {
                Some(idx) => &raw[..idx],
                None => raw,
            };
            let stripped;
            let line = if is_html {
                stripped = html_tag_regex().replace_all(without_comment, "");
                stripped.trim()
            } else {
                without_comment.trim()
            };
            if line.is_empty() {
                continue;
            }

            match tokenize(line) {
                Some((Directive::UserAgent, value)) => self.handle_user_agent(&mut state, value),
                Some((Directive::Disallow, value)) => handle_rule(&mut state, value, false),
                Some((Directive::Allow, value)) => handle_rule(&mut state, value, true),
                Some((Directive::CrawlDelay, value)) => {
                    handle_crawl_delay(&mut state, target_url, value)
                }
                Some((Directive::Sitemap, value)) => {
                    if !value.is_empty() {
                        state.sitemaps.push(value.to_string());
                    }
                }
                Some((Directive::Unknown, _)) => {
                    report_warning(&mut state, target_url, "unknown field", line)
                }
                None => report_warning(&mut state, target_url, "line without field", line),
            }

            if state.done {
                break;
            }
        }

        if let Some(delay) = state.crawl_delay {
            if delay > MAX_CRAWL_DELAY {
                warn!(
                    url = %target_url,
                    delay_ms = delay.as_millis() as u64,
                    "Crawl delay above maximum, treating target as disallowed"
                );
                return RobotsRules::allow_none();
            }
        }

        RobotsRules::from_parts(state.rules, state.crawl_delay, state.sitemaps)
    }

    fn handle_user_agent(&self, state: &mut ParseState, value: &str) {
        if state.matched_real_name {
            // A later group after we already had ours: nothing else applies
            if state.finished_agent_fields {
                state.done = true;
            }
            return;
        }

        if state.finished_agent_fields {
            state.finished_agent_fields = false;
            state.adding_rules = false;
        }

        let agents = value
            .split([' ', '\t', ','])
            .map(|agent| agent.trim().to_lowercase())
            .filter(|agent| !agent.is_empty());
        for agent in agents {
            if agent == "*" {
                if !state.matched_wildcard {
                    state.matched_wildcard = true;
                    state.adding_rules = true;
                }
            } else if self.agent_name.contains(&agent) {
                if state.matched_wildcard {
                    state.rules.clear();
                    state.crawl_delay = None;
                }
                state.matched_real_name = true;
                state.adding_rules = true;
                break;
            }
        }
    }
}

fn handle_rule(state: &mut ParseState, value: &str, allow: bool) {
    state.finished_agent_fields = true;
    if !state.adding_rules {
        return;
    }

    let path = decode_path(value).to_lowercase();
    if path.is_empty() {
        state.rules.clear();
    } else {
        state.rules.push(RobotRule::new(path, allow));
    }
}

fn handle_crawl_delay(state: &mut ParseState, target_url: &Url, value: &str) {
    state.finished_agent_fields = true;
    if !state.adding_rules {
        return;
    }

    match value.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => {
            let millis = (seconds * 1000.0).round().min(u64::MAX as f64) as u64;
            state.crawl_delay = Some(Duration::from_millis(millis));
        }
        _ => report_warning(state, target_url, "invalid crawl delay", value),
    }
}

fn report_warning(state: &mut ParseState, target_url: &Url, problem: &str, line: &str) {
    state.warnings += 1;
    if state.warnings <= MAX_WARNINGS_PER_FILE {
        warn!(url = %target_url, line, "robots.txt {}", problem);
    } else if state.warnings == MAX_WARNINGS_PER_FILE + 1 {
        debug!(url = %target_url, "Further robots.txt warnings suppressed");
    }
}

/// Decodes robots bytes: UTF-8 after a BOM, otherwise US-ASCII
fn decode_content(content: &[u8]) -> String {
    match content.strip_prefix(UTF8_BOM) {
        Some(rest) => String::from_utf8_lossy(rest).into_owned(),
        None => content
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    }
}
