//! Petition classifier: decides whether an email is a simple one-click
//! petition worth auto-signing.
//!
//! Rules are an ordered table; the first rule with a matching marker wins.
//! Survey and multi-step rules sit ahead of the acceptance rule so an email
//! that says both "petition" and "select all that apply" is still rejected.
//! Anything that matches no rule is rejected.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Characters of body checked for survey and petition markers.
pub const BODY_WINDOW: usize = 2000;

/// Characters of body checked for multi-step form markers.
pub const LAYERED_BODY_WINDOW: usize = 3000;

/// Reason given when no rule matches.
pub const NO_SIGNAL_REASON: &str = "No clear petition signal; skipping to avoid complex forms";

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?://[^\s<>"']+"#).expect("valid URL regex"));

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default_rules);

/// Which family of markers a rule represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    Survey,
    Layered,
    SimplePetition,
}

impl RuleCategory {
    fn describe(&self) -> &'static str {
        match self {
            RuleCategory::Survey => "Looks like a survey",
            RuleCategory::Layered => "Layered form",
            RuleCategory::SimplePetition => "Simple petition",
        }
    }
}

/// What a matching rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// A marker: a literal phrase, or a pattern such as "step N of".
#[derive(Debug, Clone)]
pub struct Marker {
    regex: Regex,
}

impl Marker {
    /// Literal, case-insensitive substring.
    pub fn phrase(phrase: &str) -> Self {
        Self {
            regex: Regex::new(&format!("(?i){}", regex::escape(phrase)))
                .expect("escaped phrase is a valid regex"),
        }
    }

    /// `"<word> N of"` where N is any run of digits.
    pub fn numbered(word: &str) -> Self {
        Self {
            regex: Regex::new(&format!(r"(?i){}\s+\d+\s+of", regex::escape(word)))
                .expect("numbered marker is a valid regex"),
        }
    }

    /// The matched marker text, lower-cased.
    fn find(&self, haystack: &str) -> Option<String> {
        self.regex.find(haystack).map(|m| m.as_str().to_lowercase())
    }
}

/// One row of the rule table.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    pub category: RuleCategory,
    pub verdict: Verdict,
    pub markers: Vec<Marker>,
    /// Whether the subject line is checked.
    pub check_subject: bool,
    /// How many leading body characters are checked.
    pub body_window: usize,
}

/// Result of classifying one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub accepted: bool,
    pub reason: String,
    /// `None` when no rule matched.
    pub category: Option<RuleCategory>,
}

/// Ordered rule table.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
}

impl Classifier {
    /// The standard survey → layered → petition table.
    pub fn default_rules() -> Self {
        let phrases = |list: &[&str]| list.iter().map(|p| Marker::phrase(p)).collect::<Vec<_>>();

        let mut layered = phrases(&[
            "select all that apply",
            "multiple choice",
            "rate each",
            "on a scale of",
        ]);
        layered.push(Marker::numbered("section"));
        layered.push(Marker::numbered("step"));

        Self {
            rules: vec![
                ClassifierRule {
                    category: RuleCategory::Survey,
                    verdict: Verdict::Reject,
                    markers: phrases(&["survey", "poll", "quiz", "feedback form", "tell us about"]),
                    check_subject: true,
                    body_window: BODY_WINDOW,
                },
                ClassifierRule {
                    category: RuleCategory::Layered,
                    verdict: Verdict::Reject,
                    markers: layered,
                    check_subject: false,
                    body_window: LAYERED_BODY_WINDOW,
                },
                ClassifierRule {
                    category: RuleCategory::SimplePetition,
                    verdict: Verdict::Accept,
                    markers: phrases(&[
                        "sign the petition",
                        "add your name",
                        "sign now",
                        "petition",
                        "email your senator",
                        "contact your representative",
                        "tell congress",
                        "one click",
                        "quick action",
                    ]),
                    check_subject: true,
                    body_window: BODY_WINDOW,
                },
            ],
        }
    }

    /// Build a classifier from an explicit rule table.
    pub fn with_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Evaluate the rules in order; first match wins.
    pub fn classify(&self, subject: &str, body: &str) -> Classification {
        for rule in &self.rules {
            let window = prefix_chars(body, rule.body_window);
            for marker in &rule.markers {
                let hit = rule
                    .check_subject
                    .then(|| marker.find(subject))
                    .flatten()
                    .or_else(|| marker.find(window));

                if let Some(matched) = hit {
                    debug!(
                        category = ?rule.category,
                        marker = %matched,
                        "Classifier rule matched"
                    );
                    return Classification {
                        accepted: rule.verdict == Verdict::Accept,
                        reason: format!("{} (contains '{}')", rule.category.describe(), matched),
                        category: Some(rule.category),
                    };
                }
            }
        }

        Classification {
            accepted: false,
            reason: NO_SIGNAL_REASON.to_string(),
            category: None,
        }
    }
}

/// Classify with the default rule table.
pub fn classify(subject: &str, body: &str) -> Classification {
    DEFAULT_CLASSIFIER.classify(subject, body)
}

/// All `http(s)://` URLs in the body, in document order.
pub fn extract_urls(body: &str) -> Vec<String> {
    URL_RE
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The first `n` characters of `s`.
fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
