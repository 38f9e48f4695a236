//! Keyword-rule responder for free-form visitor speech.
//!
//! Deliberately not a reasoning engine: an ordered list of keyword rules,
//! first match wins, with an optional fallback line. Rules are plain serde
//! structs so deployments can load their own set from configuration.

use serde::{Deserialize, Serialize};

/// One reply rule: if any keyword appears in the input, answer with
/// `response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub keywords: Vec<String>,
    pub response: String,
}

/// Matches visitor utterances against an ordered rule list.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    rules: Vec<Rule>,
    fallback: Option<String>,
}

impl Responder {
    /// Builds a responder. Keywords match case-insensitively; `fallback`
    /// is spoken when no rule matches (`None` stays silent).
    pub fn new(mut rules: Vec<Rule>, fallback: Option<String>) -> Self {
        for rule in &mut rules {
            for keyword in &mut rule.keywords {
                *keyword = keyword.to_lowercase();
            }
        }
        Self { rules, fallback }
    }

    /// The stock rule set: greetings, thanks, goodbyes, help.
    pub fn with_defaults() -> Self {
        Self::new(
            vec![
                rule(
                    "greeting",
                    &["hello", "hi there", "good morning", "good afternoon", "good evening"],
                    "Hello! How can I help you today?",
                ),
                rule(
                    "thanks",
                    &["thank you", "thanks"],
                    "You're welcome! Happy to help.",
                ),
                rule(
                    "goodbye",
                    &["goodbye", "bye", "see you"],
                    "Goodbye! Have a great day.",
                ),
                rule(
                    "help",
                    &["help", "assist", "support"],
                    "I can greet visitors, enroll new faces, and answer simple questions.",
                ),
            ],
            Some("I heard you, but I'm not sure how to help with that.".to_string()),
        )
    }

    /// Returns the reply for the input, or the fallback.
    pub fn respond(&self, input: &str) -> Option<String> {
        let input = input.to_lowercase();
        for rule in &self.rules {
            if rule.keywords.iter().any(|k| input.contains(k.as_str())) {
                return Some(rule.response.clone());
            }
        }
        self.fallback.clone()
    }
}

fn rule(name: &str, keywords: &[&str], response: &str) -> Rule {
    Rule {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        response: response.to_string(),
    }
}
