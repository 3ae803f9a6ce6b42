use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A validated rule: all `conditions` must hold for its `suggestions` to
/// apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<String>,
    pub suggestions: Vec<String>,
    /// When set, the rule holds two time-series conditions and triggers only
    /// if their bursts occur within this many seconds of each other.
    pub overlap_window_secs: Option<u64>,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rule: {} has conditions:: {}",
            self.name,
            self.conditions.join(" AND ")
        )?;
        if let Some(secs) = self.overlap_window_secs {
            write!(f, " (within {secs}s)")?;
        }
        write!(f, "\nsuggestions:: {}", self.suggestions.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionAction {
    Set,
    Increase,
    Decrease,
}

impl FromStr for SuggestionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Self::Set),
            "increase" => Ok(Self::Increase),
            "decrease" => Ok(Self::Decrease),
            _ => Err(format!("unknown suggestion action: {s}")),
        }
    }
}

impl fmt::Display for SuggestionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set => write!(f, "set"),
            Self::Increase => write!(f, "increase"),
            Self::Decrease => write!(f, "decrease"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionBody {
    Description(String),
    Change {
        option: String,
        action: SuggestionAction,
        /// Always present for [`SuggestionAction::Set`].
        suggested_value: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub body: SuggestionBody,
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            SuggestionBody::Description(text) => f.write_str(text),
            SuggestionBody::Change {
                option,
                action: SuggestionAction::Set,
                suggested_value,
            } => write!(
                f,
                "{} suggests setting {} to {}",
                self.name,
                option,
                suggested_value.as_deref().unwrap_or("?")
            ),
            SuggestionBody::Change {
                option,
                action,
                suggested_value,
            } => {
                write!(f, "{} suggests {} in {}.", self.name, action, option)?;
                if let Some(value) = suggested_value {
                    write!(f, " The suggested value is {value}")?;
                }
                Ok(())
            }
        }
    }
}
