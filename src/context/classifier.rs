use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// What kind of context a question needs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Intent {
    /// What was recently said or discussed
    JustSaid,
    /// Who or what the video, or someone in it, is
    Identity,
    /// Anything else
    General,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::JustSaid => "just-said",
            Intent::Identity => "identity",
            Intent::General => "general",
        };
        f.write_str(name)
    }
}

const JUST_SAID_PATTERNS: &[&str] = &[
    r"what (did|was) (he|she|they|it|the speaker|the narrator|the person|the presenter|the host|the guy|the woman|the man) (just|recently) (say|said|talking about|referring to|refer to|mean|meant|mention|mentioned)",
    r"what was (just|recently) said",
];

const IDENTITY_PATTERNS: &[&str] = &[
    r"who is|who are|who was",
    r"what is this (video|about)",
    r"what is the (topic|subject|name|title)",
    r"(who|what) (is|are|was|were) (the|this|these|that|those) [a-z]+",
];

/// Case-insensitive phrase-template matcher mapping questions to [`Intent`]
#[derive(Debug, Clone)]
pub struct QuestionClassifier {
    just_said: Vec<Regex>,
    identity: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid question pattern {}: {}", pattern, e);
                    None
                }
            }
        })
        .collect()
}

impl QuestionClassifier {
    pub fn new() -> Self {
        Self {
            just_said: compile(JUST_SAID_PATTERNS),
            identity: compile(IDENTITY_PATTERNS),
        }
    }

    /// Classify a question. `JustSaid` wins over `Identity`, which wins over `General`.
    pub fn classify(&self, question: &str) -> Intent {
        let question = question.trim();
        if question.is_empty() {
            return Intent::General;
        }

        let intent = if self.just_said.iter().any(|re| re.is_match(question)) {
            Intent::JustSaid
        } else if self.identity.iter().any(|re| re.is_match(question)) {
            Intent::Identity
        } else {
            Intent::General
        };

        debug!("Classified question as {}", intent);
        intent
    }
}

impl Default for QuestionClassifier {
    fn default() -> Self {
        Self::new()
    }
}
