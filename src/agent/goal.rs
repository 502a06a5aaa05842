//! Goal description consumed by the rule-based policy.
//!
//! A goal is an ordered list of steps, each naming a target element and what
//! to do with it. Steps can be written on the command line as
//! `click:<id>`, `click-text:<text>`, `click-re:<regex>` or `type:<id>=<text>`.

use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

use super::snapshot::UiElement;

/// Goal parsing errors.
#[derive(Error, Debug)]
pub enum GoalParseError {
    #[error("Missing ':' in goal step: {0}")]
    MissingSeparator(String),
    #[error("Unknown goal verb: {0}")]
    UnknownVerb(String),
    #[error("Empty target in goal step: {0}")]
    EmptyTarget(String),
    #[error("Missing '=' in type step: {0}")]
    MissingText(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Predicate selecting a target element.
#[derive(Debug, Clone)]
pub enum TargetMatcher {
    /// Full resource id or its short `:id/` name.
    Id(String),
    /// Element text, compared case-insensitively after trimming.
    Text(String),
    /// Regex tried against the text, then the identifier.
    Pattern(Regex),
}

impl TargetMatcher {
    pub fn matches(&self, element: &UiElement) -> bool {
        match self {
            TargetMatcher::Id(id) => element.has_identifier(id),
            TargetMatcher::Text(text) => element.text.trim().eq_ignore_ascii_case(text.trim()),
            TargetMatcher::Pattern(re) => {
                re.is_match(&element.text)
                    || element
                        .identifier
                        .as_deref()
                        .map(|id| re.is_match(id))
                        .unwrap_or(false)
            }
        }
    }
}

impl std::fmt::Display for TargetMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetMatcher::Id(id) => write!(f, "id={}", id),
            TargetMatcher::Text(text) => write!(f, "text={:?}", text),
            TargetMatcher::Pattern(re) => write!(f, "pattern=/{}/", re.as_str()),
        }
    }
}

/// What to do with the matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Click,
    SetText(String),
}

/// One goal step.
#[derive(Debug, Clone)]
pub struct GoalStep {
    pub target: TargetMatcher,
    pub intent: Intent,
}

impl GoalStep {
    pub fn click(target: TargetMatcher) -> Self {
        Self {
            target,
            intent: Intent::Click,
        }
    }

    pub fn set_text(target: TargetMatcher, text: impl Into<String>) -> Self {
        Self {
            target,
            intent: Intent::SetText(text.into()),
        }
    }

    /// Whether `element` is a valid target for this step.
    ///
    /// Besides matching, the element must support the intent: clickable for
    /// clicks, editable for text entry.
    pub fn accepts(&self, element: &UiElement) -> bool {
        let capable = match self.intent {
            Intent::Click => element.clickable,
            Intent::SetText(_) => element.editable,
        };
        capable && self.target.matches(element)
    }
}

impl FromStr for GoalStep {
    type Err = GoalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = s
            .split_once(':')
            .ok_or_else(|| GoalParseError::MissingSeparator(s.to_string()))?;
        if rest.is_empty() {
            return Err(GoalParseError::EmptyTarget(s.to_string()));
        }

        match verb.trim() {
            "click" => Ok(GoalStep::click(TargetMatcher::Id(rest.to_string()))),
            "click-text" => Ok(GoalStep::click(TargetMatcher::Text(rest.to_string()))),
            "click-re" => Ok(GoalStep::click(TargetMatcher::Pattern(Regex::new(rest)?))),
            "type" => {
                let (id, text) = rest
                    .split_once('=')
                    .ok_or_else(|| GoalParseError::MissingText(s.to_string()))?;
                if id.is_empty() {
                    return Err(GoalParseError::EmptyTarget(s.to_string()));
                }
                Ok(GoalStep::set_text(TargetMatcher::Id(id.to_string()), text))
            }
            other => Err(GoalParseError::UnknownVerb(other.to_string())),
        }
    }
}

impl std::fmt::Display for GoalStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.intent {
            Intent::Click => write!(f, "click {}", self.target),
            Intent::SetText(text) => write!(f, "type {:?} into {}", text, self.target),
        }
    }
}

/// Ordered list of goal steps.
#[derive(Debug, Clone, Default)]
pub struct Goal {
    steps: Vec<GoalStep>,
}

impl Goal {
    pub fn new(steps: Vec<GoalStep>) -> Self {
        Self { steps }
    }

    /// Parse one step per string.
    pub fn parse<I, S>(steps: I) -> Result<Self, GoalParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let steps = steps
            .into_iter()
            .map(|s| s.as_ref().parse())
            .collect::<Result<Vec<GoalStep>, _>>()?;
        Ok(Self::new(steps))
    }

    pub fn steps(&self) -> &[GoalStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&GoalStep> {
        self.steps.get(index)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
