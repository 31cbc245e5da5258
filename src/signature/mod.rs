pub mod bind;
pub mod classify;
pub mod merge;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::{Error, Result};

/// How a formal parameter may be supplied at call time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParameterKind {
    /// True for parameters that consume positional values
    pub fn is_positional(self) -> bool {
        matches!(self, Self::PositionalOnly | Self::PositionalOrKeyword)
    }

    pub fn is_variadic(self) -> bool {
        matches!(self, Self::VarPositional | Self::VarKeyword)
    }

    /// Declaration-order group. Kinds must appear in non-decreasing group
    /// order inside a valid signature.
    pub(crate) fn group(self) -> u8 {
        match self {
            Self::PositionalOnly => 0,
            Self::PositionalOrKeyword => 1,
            Self::VarPositional => 2,
            Self::KeywordOnly => 3,
            Self::VarKeyword => 4,
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionalOnly => write!(f, "positional-only"),
            Self::PositionalOrKeyword => write!(f, "positional-or-keyword"),
            Self::VarPositional => write!(f, "var-positional"),
            Self::KeywordOnly => write!(f, "keyword-only"),
            Self::VarKeyword => write!(f, "var-keyword"),
        }
    }
}

/// One formal argument descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<Value>,
    pub annotation: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            annotation: None,
        }
    }

    /// Required positional-or-keyword parameter
    pub fn required(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::PositionalOrKeyword)
    }

    /// Positional-or-keyword parameter with a default value
    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        Self::new(name, ParameterKind::PositionalOrKeyword).with_default(default)
    }

    pub fn positional_only(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::PositionalOnly)
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::VarPositional)
    }

    pub fn keyword_only(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::KeywordOnly)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name, ParameterKind::VarKeyword)
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParameterKind::VarPositional => write!(f, "*{}", self.name)?,
            ParameterKind::VarKeyword => write!(f, "**{}", self.name)?,
            _ => write!(f, "{}", self.name)?,
        }
        if let Some(annotation) = &self.annotation {
            write!(f, ": {annotation}")?;
        }
        if let Some(default) = &self.default {
            write!(f, "={default}")?;
        }
        Ok(())
    }
}

/// Validated, ordered formal parameter list of a dynamic function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    parameters: Vec<Parameter>,
}

impl Signature {
    /// Build a signature, rejecting parameter lists that violate the
    /// calling-convention invariants:
    /// - parameter kinds appear in declaration-group order
    /// - no required positional parameter follows an optional one
    /// - at most one var-positional and one var-keyword parameter
    /// - names are unique, variadic parameters carry no default
    pub fn new(parameters: Vec<Parameter>) -> Result<Self> {
        validate(&parameters)?;
        Ok(Self { parameters })
    }

    pub fn empty() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Number of parameters that must be supplied at call time
    pub fn required_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| !p.kind.is_variadic() && !p.has_default())
            .count()
    }

    pub fn keyword_only_count(&self) -> usize {
        self.parameters
            .iter()
            .filter(|p| p.kind == ParameterKind::KeywordOnly)
            .count()
    }

    pub fn var_positional(&self) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.kind == ParameterKind::VarPositional)
    }

    pub fn var_keyword(&self) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.kind == ParameterKind::VarKeyword)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut wrote_any = false;
        let mut last_positional_only = false;
        let mut star_written = self.var_positional().is_some();
        for parameter in &self.parameters {
            if last_positional_only && parameter.kind != ParameterKind::PositionalOnly {
                write!(f, ", /")?;
                last_positional_only = false;
            }
            if parameter.kind == ParameterKind::KeywordOnly && !star_written {
                if wrote_any {
                    write!(f, ", ")?;
                }
                write!(f, "*")?;
                star_written = true;
                wrote_any = true;
            }
            if wrote_any {
                write!(f, ", ")?;
            }
            write!(f, "{parameter}")?;
            wrote_any = true;
            last_positional_only = parameter.kind == ParameterKind::PositionalOnly;
        }
        if last_positional_only {
            write!(f, ", /")?;
        }
        write!(f, ")")
    }
}

fn validate(parameters: &[Parameter]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    let mut last_group = 0u8;
    let mut saw_positional_default = false;
    let mut var_positional_count = 0usize;
    let mut var_keyword_count = 0usize;

    for parameter in parameters {
        if !seen.insert(parameter.name.as_str()) {
            return Err(Error::configuration(format!(
                "duplicate parameter name `{}`",
                parameter.name
            )));
        }
        let group = parameter.kind.group();
        if group < last_group {
            return Err(Error::configuration(format!(
                "{} parameter `{}` declared after a later-group parameter",
                parameter.kind, parameter.name
            )));
        }
        last_group = group;

        match parameter.kind {
            ParameterKind::VarPositional => var_positional_count += 1,
            ParameterKind::VarKeyword => var_keyword_count += 1,
            _ => {}
        }
        if parameter.kind.is_variadic() && parameter.has_default() {
            return Err(Error::configuration(format!(
                "{} parameter `{}` cannot carry a default",
                parameter.kind, parameter.name
            )));
        }

        if parameter.kind.is_positional() {
            if parameter.has_default() {
                saw_positional_default = true;
            } else if saw_positional_default {
                return Err(Error::configuration(format!(
                    "required parameter `{}` follows a parameter with a default",
                    parameter.name
                )));
            }
        }
    }

    if var_positional_count > 1 {
        return Err(Error::configuration(
            "more than one var-positional parameter",
        ));
    }
    if var_keyword_count > 1 {
        return Err(Error::configuration("more than one var-keyword parameter"));
    }
    Ok(())
}
