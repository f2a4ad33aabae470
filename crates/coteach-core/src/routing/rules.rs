//! Rule-based router.
//!
//! Resolves a request to a responder by pattern matching, without a model
//! call. Rules are evaluated in a fixed priority order and the first match
//! wins; there is no voting or accumulation. The router holds only
//! compiled regexes, so [`RuleRouter::classify`] is pure.
//!
//! Priority order:
//! 1. predict patterns (0.90)
//! 2. admin patterns (0.90)
//! 3. student patterns (0.95)
//! 4. strategy patterns (0.90)
//! 5. student name detection (0.85)
//! 6. keyword sets at 0.75: predict, strategy, admin, student

use coteach_types::ResponderId;
use coteach_types::routing::RoutingDecision;
use regex::{Regex, RegexBuilder};
use tracing::warn;

const PATTERN_CONFIDENCE: f64 = 0.90;
const STUDENT_PATTERN_CONFIDENCE: f64 = 0.95;
const NAME_CONFIDENCE: f64 = 0.85;
const KEYWORD_CONFIDENCE: f64 = 0.75;

/// A pattern rule: label, regex source, responder.
///
/// Patterns that capture a student use the named group `name`.
struct PatternRule {
    label: &'static str,
    pattern: &'static str,
    responder: ResponderId,
}

const fn rule(label: &'static str, pattern: &'static str, responder: ResponderId) -> PatternRule {
    PatternRule {
        label,
        pattern,
        responder,
    }
}

const PREDICT_PATTERNS: &[PatternRule] = &[
    rule("predict:watch-today", r"what.*(?:watch|prepare|expect).*today", ResponderId::PredictAgent),
    rule(
        "predict:concerns",
        r"any.*(?:concerns?|issues?|challenges?|risks?).*(?:today|this\s+week)",
        ResponderId::PredictAgent,
    ),
    rule("predict:briefing", r"(?:daily|morning)\s+(?:briefing|summary|heads\s+up)", ResponderId::PredictAgent),
    rule(
        "predict:who-might-struggle",
        r"who\s+(?:might|may|could|will)\s+(?:struggle|have\s+trouble|be\s+affected)",
        ResponderId::PredictAgent,
    ),
    rule(
        "predict:predictions-for",
        r"predictions?\s+for\s+(?:today|tomorrow|this\s+week)",
        ResponderId::PredictAgent,
    ),
    rule("predict:happening-today", r"what(?:'s|\s+is)\s+happening\s+today", ResponderId::PredictAgent),
    rule("predict:prepare-today", r"prepare\s+(?:me\s+)?for\s+today", ResponderId::PredictAgent),
];

const ADMIN_PATTERNS: &[PatternRule] = &[
    rule(
        "admin:draft-document",
        r"(?:draft|write|prepare|create)\s+(?:an?\s+)?(?:report|email|letter|message|summary|iep)",
        ResponderId::AdminAgent,
    ),
    rule("admin:send-to-parent", r"(?:send|prepare)\s+.+?\s+(?:to|for)\s+(?:the\s+)?parents?", ResponderId::AdminAgent),
    rule("admin:parent-communication", r"parent\s+(?:communication|update|message|email)", ResponderId::AdminAgent),
    rule("admin:iep-action", r"iep\s+(?:report|update|draft|summary|meeting|goal)", ResponderId::AdminAgent),
    rule(
        "admin:summary-period",
        r"summary\s+(?:of|for)\s+(?:the\s+)?(?:day|week|month|today|yesterday)",
        ResponderId::AdminAgent,
    ),
    rule("admin:periodic-report", r"(?:daily|weekly|monthly)\s+(?:report|summary|update)", ResponderId::AdminAgent),
];

const STUDENT_PATTERNS: &[PatternRule] = &[
    rule(
        "student:possessive",
        r"\b(?P<name>[a-z]+)['’]s\s+(?:profile|triggers?|history|behaviou?r|parents?)",
        ResponderId::StudentAgent,
    ),
    rule("student:profile-for", r"profile\s+(?:for|of)\s+(?P<name>[a-z]+)", ResponderId::StudentAgent),
    rule(
        "student:about",
        r"(?:about|check\s+on|how\s+is|update\s+on)\s+(?P<name>[a-z]+)\b",
        ResponderId::StudentAgent,
    ),
    rule("student:what-works", r"what\s+works\s+for\s+(?P<name>[a-z]+)\b", ResponderId::StudentAgent),
    rule(
        "student:is-having",
        r"\b(?P<name>[a-z]+)\s+(?:is\s+having|had\s+a|has\s+been|was\s+having|started\s+having)",
        ResponderId::StudentAgent,
    ),
    rule("student:help-with", r"help\s+(?P<name>[a-z]+)\s+with", ResponderId::StudentAgent),
    rule(
        "student:advice-for",
        r"(?:strategies?|methods?|tips?|advice)\s+for\s+(?P<name>[a-z]+)\s*[?.]?\s*$",
        ResponderId::StudentAgent,
    ),
];

const STRATEGY_PATTERNS: &[PatternRule] = &[
    rule(
        "strategy:how-do-i",
        r"how\s+(?:do|can|should)\s+i\s+(?:teach|help|support|engage|motivate|accommodate|handle|manage|deal\s+with)",
        ResponderId::RagAgent,
    ),
    rule(
        "strategy:best-way",
        r"what(?:'s|\s+is)\s+the\s+best\s+(?:way|approach|method)\s+to",
        ResponderId::RagAgent,
    ),
    rule("strategy:strategies-for", r"strateg(?:y|ies)\s+for\s+(?:teaching\s+)?.+", ResponderId::RagAgent),
    rule(
        "strategy:what-works",
        r"what\s+(?:strategies|strategy|methods?|techniques?)\s+(?:work|help)",
        ResponderId::RagAgent,
    ),
    rule("strategy:how-to", r"how\s+to\s+(?:handle|manage|deal\s+with|address)", ResponderId::RagAgent),
    rule(
        "strategy:help-with-situation",
        r"help\s+(?:me\s+)?with\s+(?:an?\s+)?(?:meltdown|crisis|behaviou?r|outburst|tantrum|situation)",
        ResponderId::RagAgent,
    ),
    rule("strategy:techniques", r"techniques?\s+(?:for|that\s+help\s+with)\s+.+", ResponderId::RagAgent),
    rule(
        "strategy:suggest",
        r"(?:suggest|recommend)\s+(?:some\s+)?(?:methods?|strateg(?:y|ies)|techniques?)",
        ResponderId::RagAgent,
    ),
];

/// Keyword sets, checked by substring on the lower-cased text.
struct KeywordRule {
    label: &'static str,
    keywords: &'static [&'static str],
    responder: ResponderId,
}

const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        label: "predict:keywords",
        keywords: &[
            "predict",
            "forecast",
            "warning",
            "heads up",
            "watch for",
            "today's schedule",
            "upcoming",
            "any concerns",
            "prepare for",
            "morning briefing",
            "daily briefing",
            "what to expect",
            "any risks",
            "who might struggle",
            "potential issues",
            "fire drill",
            "field trip",
            "assembly",
        ],
        responder: ResponderId::PredictAgent,
    },
    KeywordRule {
        label: "strategy:keywords",
        keywords: &[
            "strategy",
            "strategies",
            "method",
            "technique",
            "how to teach",
            "suggest",
            "recommend",
            "approach",
            "intervention",
            "accommodat",
            "adaptation",
            "modify",
            "differentiate",
            "best practice",
            "evidence-based",
            "research",
            "effective",
            "meltdown",
            "crisis",
            "behavior",
            "de-escalat",
            "calm down",
            "sensory overload",
            "outburst",
            "tantrum",
            "dysregulation",
        ],
        responder: ResponderId::RagAgent,
    },
    KeywordRule {
        label: "admin:keywords",
        keywords: &[
            "draft",
            "iep",
            "report",
            "parent",
            "email",
            "message",
            "summary",
            "documentation",
            "letter",
            "update",
            "meeting",
            "write",
            "prepare",
            "create",
            "send",
            "communicate",
            "incident",
        ],
        responder: ResponderId::AdminAgent,
    },
    KeywordRule {
        label: "student:keywords",
        keywords: &[
            "profile",
            "trigger",
            "history",
            "what works for",
            "learning style",
            "iep goal",
            "struggling with",
        ],
        responder: ResponderId::StudentAgent,
    },
];

/// Words that look like names in the capture patterns but are not students.
const NAME_EXCLUSIONS: &[&str] = &[
    // pronouns
    "i", "me", "my", "he", "she", "they", "we", "you", "it", "him", "her", "them", "his", "their",
    // question words
    "what", "who", "where", "when", "how", "why", "which",
    // education terms
    "students", "student", "adhd", "autism", "autistic", "dyslexia", "children", "kids",
    "learners", "teachers", "parents", "class", "iep", "goals", "reading", "math", "writing",
    "behavior", "behaviour",
    // calendar
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "january",
    "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december", "today", "yesterday", "tomorrow",
    // imperative verbs
    "check", "update", "draft", "write", "prepare", "create", "send", "get", "show", "tell",
    "help", "suggest", "recommend",
    // filler
    "the", "a", "an", "this", "that", "meeting", "had", "have", "with", "someone", "everyone",
];

fn is_excluded(name: &str) -> bool {
    let lower = name.to_lowercase();
    NAME_EXCLUSIONS.contains(&lower.as_str())
}

/// `"taylor"` -> `"Taylor"`, `"mary ann"` -> `"Mary Ann"`.
fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

struct CompiledRule {
    label: &'static str,
    regex: Regex,
    responder: ResponderId,
    confidence: f64,
}

/// Outcome of matching one compiled rule.
struct RuleMatch<'a> {
    rule: &'a CompiledRule,
    name: Option<String>,
}

/// Deterministic, model-free request router.
pub struct RuleRouter {
    rules: Vec<CompiledRule>,
    /// Case-sensitive: "for Alex?" / "for Mary Ann" at the end of the text.
    trailing_name: Regex,
    /// Case-sensitive: "Alex's" anywhere but the start of a sentence.
    possessive_name: Regex,
}

impl RuleRouter {
    /// Compile the rule table.
    ///
    /// Rules whose pattern fails to compile are logged and skipped.
    pub fn new() -> Self {
        let groups: [(&[PatternRule], f64); 4] = [
            (PREDICT_PATTERNS, PATTERN_CONFIDENCE),
            (ADMIN_PATTERNS, PATTERN_CONFIDENCE),
            (STUDENT_PATTERNS, STUDENT_PATTERN_CONFIDENCE),
            (STRATEGY_PATTERNS, PATTERN_CONFIDENCE),
        ];

        let rules = groups
            .iter()
            .flat_map(|(group, confidence)| group.iter().map(move |r| (r, *confidence)))
            .filter_map(|(r, confidence)| {
                match RegexBuilder::new(r.pattern).case_insensitive(true).build() {
                    Ok(regex) => Some(CompiledRule {
                        label: r.label,
                        regex,
                        responder: r.responder,
                        confidence,
                    }),
                    Err(e) => {
                        warn!(rule = r.label, error = %e, "skipping routing rule with invalid regex");
                        None
                    }
                }
            })
            .collect();

        Self {
            rules,
            trailing_name: compile_name_pattern(
                r"(?:for|with)\s+(?P<name>[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\s*\??\s*$",
            ),
            possessive_name: compile_name_pattern(r"\b(?P<name>[A-Z][a-z]+)['’]s\b"),
        }
    }

    /// Number of compiled pattern rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Classify `text`.
    ///
    /// Returns the first matching rule's responder and confidence, or
    /// [`RoutingDecision::unresolved`] (confidence 0) when nothing matches.
    /// Any student name found in the text is attached to the decision.
    pub fn classify(&self, text: &str) -> RoutingDecision {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return RoutingDecision::unresolved();
        }

        if let Some(m) = self.first_pattern_match(trimmed) {
            let name = m.name.or_else(|| self.extract_student_name(trimmed));
            return RoutingDecision::rule(m.rule.responder, m.rule.confidence, m.rule.label)
                .with_student_name(name);
        }

        if let Some(name) = self.detect_name(trimmed) {
            return RoutingDecision::rule(ResponderId::StudentAgent, NAME_CONFIDENCE, "student:name")
                .with_student_name(Some(name));
        }

        let lower = trimmed.to_lowercase();
        for kw in KEYWORD_RULES {
            if kw.keywords.iter().any(|k| lower.contains(k)) {
                return RoutingDecision::rule(kw.responder, KEYWORD_CONFIDENCE, kw.label);
            }
        }

        RoutingDecision::unresolved()
    }

    /// Extract a student name from `text`, if one is present.
    ///
    /// Tries the proper-noun detectors first, then the name-capturing
    /// student patterns.
    pub fn extract_student_name(&self, text: &str) -> Option<String> {
        if let Some(name) = self.detect_name(text) {
            return Some(name);
        }
        self.rules
            .iter()
            .filter(|r| r.responder == ResponderId::StudentAgent)
            .find_map(|r| capture_name(&r.regex, text))
    }

    fn first_pattern_match(&self, text: &str) -> Option<RuleMatch<'_>> {
        for rule in &self.rules {
            if rule.regex.capture_names().flatten().any(|n| n == "name") {
                // A rule that captures a name only fires when the capture is
                // a plausible student name.
                if let Some(name) = capture_name(&rule.regex, text) {
                    return Some(RuleMatch {
                        rule,
                        name: Some(name),
                    });
                }
            } else if rule.regex.is_match(text) {
                return Some(RuleMatch { rule, name: None });
            }
        }
        None
    }

    /// Proper-noun name detection (case-sensitive).
    fn detect_name(&self, text: &str) -> Option<String> {
        if let Some(name) = capture_name(&self.trailing_name, text) {
            return Some(name);
        }
        for caps in self.possessive_name.captures_iter(text) {
            let Some(m) = caps.name("name") else { continue };
            // A capitalised word opening a sentence is not evidence of a name.
            let before = &text[..m.start()];
            if before.is_empty() || before.ends_with(". ") || before.ends_with("? ") {
                continue;
            }
            if !is_excluded(m.as_str()) {
                return Some(title_case(m.as_str()));
            }
        }
        None
    }
}

impl Default for RuleRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRouter")
            .field("rules", &self.rules.len())
            .finish()
    }
}

fn compile_name_pattern(pattern: &str) -> Regex {
    // Both patterns are fixed literals; a failure here is a programming error
    // caught by the unit tests.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid name pattern {pattern}: {e}"))
}

/// First non-excluded `name` capture of `regex` in `text`, title-cased.
fn capture_name(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures_iter(text)
        .filter_map(|caps| caps.name("name").map(|m| m.as_str().to_string()))
        .find(|name| !is_excluded(name))
        .map(|name| title_case(&name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coteach_types::routing::RoutingMethod;

    fn router() -> RuleRouter {
        RuleRouter::new()
    }

    #[test]
    fn all_rules_compile() {
        let expected = PREDICT_PATTERNS.len()
            + ADMIN_PATTERNS.len()
            + STUDENT_PATTERNS.len()
            + STRATEGY_PATTERNS.len();
        assert_eq!(router().rule_count(), expected);
    }

    #[test]
    fn possessive_triggers_route_to_student_with_high_confidence() {
        let d = router().classify("What are Alex's triggers?");
        assert_eq!(d.responder, Some(ResponderId::StudentAgent));
        assert_eq!(d.confidence, 0.95);
        assert_eq!(d.method, RoutingMethod::Rule);
        assert_eq!(d.matched_pattern.as_deref(), Some("student:possessive"));
        assert_eq!(d.student_name.as_deref(), Some("Alex"));
    }

    #[test]
    fn meltdown_question_routes_to_strategy() {
        let d = router().classify("How do I handle a meltdown?");
        assert_eq!(d.responder, Some(ResponderId::RagAgent));
        assert_eq!(d.confidence, 0.90);
        assert_eq!(d.matched_pattern.as_deref(), Some("strategy:how-do-i"));
        assert!(d.student_name.is_none());
    }

    #[test]
    fn predict_patterns_win_over_later_groups() {
        let d = router().classify("What should I watch for today?");
        assert_eq!(d.responder, Some(ResponderId::PredictAgent));
        assert_eq!(d.confidence, 0.90);

        let d = router().classify("Give me the morning briefing");
        assert_eq!(d.responder, Some(ResponderId::PredictAgent));
    }

    #[test]
    fn admin_pattern_keeps_student_name() {
        let d = router().classify("Draft a parent email about Maya's progress");
        assert_eq!(d.responder, Some(ResponderId::AdminAgent));
        assert_eq!(d.matched_pattern.as_deref(), Some("admin:parent-communication"));
        assert_eq!(d.student_name.as_deref(), Some("Maya"));
    }

    #[test]
    fn excluded_words_do_not_fire_name_rules() {
        // "the" is excluded so "about the ..." must not be a student rule.
        let d = router().classify("Tell me about the schedule");
        assert_ne!(d.responder, Some(ResponderId::StudentAgent));
    }

    #[test]
    fn lowercase_names_are_title_cased() {
        let d = router().classify("what works for taylor");
        assert_eq!(d.responder, Some(ResponderId::StudentAgent));
        assert_eq!(d.student_name.as_deref(), Some("Taylor"));
    }

    #[test]
    fn trailing_proper_noun_is_name_detection() {
        let d = router().classify("Any ideas to try with Jordan?");
        assert_eq!(d.responder, Some(ResponderId::StudentAgent));
        assert_eq!(d.confidence, 0.85);
        assert_eq!(d.matched_pattern.as_deref(), Some("student:name"));
        assert_eq!(d.student_name.as_deref(), Some("Jordan"));
    }

    #[test]
    fn sentence_initial_possessive_is_not_a_name() {
        assert_eq!(router().detect_name("Monday's plan looks full"), None);
        assert_eq!(
            router().detect_name("Thanks. Today's plan, and then Sam's notes").as_deref(),
            Some("Sam")
        );
    }

    #[test]
    fn keyword_rules_use_medium_confidence_in_order() {
        let d = router().classify("Is there an upcoming assembly?");
        assert_eq!(d.responder, Some(ResponderId::PredictAgent));
        assert_eq!(d.confidence, 0.75);

        let d = router().classify("Any research on sensory overload");
        assert_eq!(d.responder, Some(ResponderId::RagAgent));
        assert_eq!(d.matched_pattern.as_deref(), Some("strategy:keywords"));

        let d = router().classify("Log an incident please");
        assert_eq!(d.responder, Some(ResponderId::AdminAgent));
    }

    #[test]
    fn no_match_is_unresolved() {
        let d = router().classify("hello there");
        assert!(d.responder.is_none());
        assert_eq!(d.confidence, 0.0);
        assert!(router().classify("   ").responder.is_none());
    }

    #[test]
    fn classify_is_deterministic() {
        let r = router();
        let text = "What strategies work for Alex with transitions?";
        assert_eq!(r.classify(text), r.classify(text));
    }

    #[test]
    fn title_case_handles_multiword() {
        assert_eq!(title_case("mary ann"), "Mary Ann");
        assert_eq!(title_case("ALEX"), "Alex");
    }
}
