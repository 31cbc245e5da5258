//! Runtime type validation over dynamic values.
//!
//! Each validator answers "does this value satisfy the contract", optionally
//! converting the value first (string to number, JSON text to container).
//! `check_parameters` wires validators onto a function's bound arguments.

use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::adapter::RoutingTable;
use crate::core::{BoundArgs, Error, Result};
use crate::check::CheckFormula;
use crate::function::{Body, DynFunction};
use crate::signature::Signature;

/// Result of one validation: ok flag, converted value when conversion
/// applied, error messages otherwise
#[derive(Debug, Clone, Default)]
pub struct CheckOutcome {
    pub ok: bool,
    pub value: Option<Value>,
    pub errors: Vec<String>,
}

impl CheckOutcome {
    pub fn pass(value: Option<Value>) -> Self {
        Self {
            ok: true,
            value,
            errors: Vec::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self::fail_all(vec![error.into()])
    }

    pub fn fail_all(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            value: None,
            errors,
        }
    }
}

/// Contract of a value validator
pub trait TypeCheck: Send + Sync {
    fn check(&self, value: &Value) -> CheckOutcome;

    /// Type tag used to annotate checked parameters
    fn annotation(&self) -> &'static str;
}

/// Integer with an optional numeric limit formula
pub struct TypeInt {
    limit: CheckFormula,
    convert: bool,
}

impl TypeInt {
    pub fn new(limit: &str, convert: bool) -> Result<Self> {
        Ok(Self {
            limit: CheckFormula::parse(limit)?,
            convert,
        })
    }
}

impl TypeCheck for TypeInt {
    fn check(&self, value: &Value) -> CheckOutcome {
        let number = match extract_int(value, self.convert) {
            Ok(number) => number,
            Err(message) => return CheckOutcome::fail(message),
        };
        if self.limit.check(number as f64) {
            CheckOutcome::pass(self.convert.then(|| Value::from(number)))
        } else {
            CheckOutcome::fail(format!("{number} violates `{}`", self.limit.formula()))
        }
    }

    fn annotation(&self) -> &'static str {
        if self.convert {
            "int | str"
        } else {
            "int"
        }
    }
}

fn extract_int(value: &Value, convert: bool) -> std::result::Result<i64, String> {
    if let Some(number) = value.as_i64() {
        return Ok(number);
    }
    if convert {
        if let Some(number) = value.as_f64() {
            return Ok(number.trunc() as i64);
        }
        if let Some(text) = value.as_str() {
            if let Ok(number) = text.trim().parse::<i64>() {
                return Ok(number);
            }
        }
    }
    Err(format!("`{value}` is not an integer"))
}

/// Float with an optional numeric limit formula
pub struct TypeFloat {
    limit: CheckFormula,
    convert: bool,
}

impl TypeFloat {
    pub fn new(limit: &str, convert: bool) -> Result<Self> {
        Ok(Self {
            limit: CheckFormula::parse(limit)?,
            convert,
        })
    }
}

impl TypeCheck for TypeFloat {
    fn check(&self, value: &Value) -> CheckOutcome {
        let number = match extract_float(value, self.convert) {
            Ok(number) => number,
            Err(message) => return CheckOutcome::fail(message),
        };
        if self.limit.check(number) {
            CheckOutcome::pass(self.convert.then(|| Value::from(number)))
        } else {
            CheckOutcome::fail(format!("{number} violates `{}`", self.limit.formula()))
        }
    }

    fn annotation(&self) -> &'static str {
        if self.convert {
            "float | str"
        } else {
            "float"
        }
    }
}

fn extract_float(value: &Value, convert: bool) -> std::result::Result<f64, String> {
    if let Some(number) = value.as_f64() {
        return Ok(number);
    }
    if convert {
        if let Some(text) = value.as_str() {
            if let Ok(number) = text.trim().parse::<f64>() {
                return Ok(number);
            }
        }
    }
    Err(format!("`{value}` is not a number"))
}

/// Integer or float; conversion prefers the integer rendering when exact
pub struct TypeNumber {
    limit: CheckFormula,
    convert: bool,
}

impl TypeNumber {
    pub fn new(limit: &str, convert: bool) -> Result<Self> {
        Ok(Self {
            limit: CheckFormula::parse(limit)?,
            convert,
        })
    }
}

impl TypeCheck for TypeNumber {
    fn check(&self, value: &Value) -> CheckOutcome {
        let number = match extract_float(value, self.convert) {
            Ok(number) => number,
            Err(message) => return CheckOutcome::fail(message),
        };
        if !self.limit.check(number) {
            return CheckOutcome::fail(format!("{number} violates `{}`", self.limit.formula()));
        }
        let converted = self.convert.then(|| {
            if number.fract() == 0.0 && number.is_finite() {
                Value::from(number as i64)
            } else {
                Value::from(number)
            }
        });
        CheckOutcome::pass(converted)
    }

    fn annotation(&self) -> &'static str {
        if self.convert {
            "int | float | str"
        } else {
            "int | float"
        }
    }
}

/// String with optional character-set, length, and pattern constraints
pub struct TypeStr {
    chars: Option<String>,
    length: CheckFormula,
    pattern: Option<Regex>,
    convert: bool,
}

impl TypeStr {
    pub fn new(
        chars: Option<&str>,
        length: &str,
        pattern: Option<&str>,
        convert: bool,
    ) -> Result<Self> {
        let pattern = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| Error::configuration(format!("invalid pattern: {e}")))?;
        Ok(Self {
            chars: chars.map(str::to_string),
            length: CheckFormula::parse(length)?,
            pattern,
            convert,
        })
    }
}

impl TypeCheck for TypeStr {
    fn check(&self, value: &Value) -> CheckOutcome {
        let text = match value {
            Value::String(text) => text.clone(),
            other if self.convert => other.to_string(),
            other => return CheckOutcome::fail(format!("`{other}` is not a string")),
        };
        let mut errors = Vec::new();
        if let Some(chars) = &self.chars {
            if !text.chars().all(|ch| chars.contains(ch)) {
                errors.push(format!("`{text}` uses characters outside `{chars}`"));
            }
        }
        if !self.length.check(text.chars().count() as f64) {
            errors.push(format!(
                "length {} violates `{}`",
                text.chars().count(),
                self.length.formula()
            ));
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&text) {
                errors.push(format!("`{text}` does not match `{pattern}`"));
            }
        }
        if errors.is_empty() {
            CheckOutcome::pass(self.convert.then(|| Value::String(text)))
        } else {
            CheckOutcome::fail_all(errors)
        }
    }

    fn annotation(&self) -> &'static str {
        "str"
    }
}

/// List with an optional length formula; converts from JSON text
pub struct TypeList {
    length: CheckFormula,
    convert: bool,
}

impl TypeList {
    pub fn new(length: &str, convert: bool) -> Result<Self> {
        Ok(Self {
            length: CheckFormula::parse(length)?,
            convert,
        })
    }
}

impl TypeCheck for TypeList {
    fn check(&self, value: &Value) -> CheckOutcome {
        let items = match value {
            Value::Array(items) => items.clone(),
            Value::String(text) if self.convert => {
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::Array(items)) => items,
                    _ => return CheckOutcome::fail(format!("`{text}` is not a list")),
                }
            }
            other => return CheckOutcome::fail(format!("`{other}` is not a list")),
        };
        if self.length.check(items.len() as f64) {
            CheckOutcome::pass(self.convert.then(|| Value::Array(items)))
        } else {
            CheckOutcome::fail(format!(
                "length {} violates `{}`",
                items.len(),
                self.length.formula()
            ))
        }
    }

    fn annotation(&self) -> &'static str {
        if self.convert {
            "list | str"
        } else {
            "list"
        }
    }
}

/// Mapping with an optional length formula; converts from JSON text
pub struct TypeDict {
    length: CheckFormula,
    convert: bool,
}

impl TypeDict {
    pub fn new(length: &str, convert: bool) -> Result<Self> {
        Ok(Self {
            length: CheckFormula::parse(length)?,
            convert,
        })
    }
}

impl TypeCheck for TypeDict {
    fn check(&self, value: &Value) -> CheckOutcome {
        let entries = match value {
            Value::Object(entries) => entries.clone(),
            Value::String(text) if self.convert => {
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::Object(entries)) => entries,
                    _ => return CheckOutcome::fail(format!("`{text}` is not a mapping")),
                }
            }
            other => return CheckOutcome::fail(format!("`{other}` is not a mapping")),
        };
        if self.length.check(entries.len() as f64) {
            CheckOutcome::pass(self.convert.then(|| Value::Object(entries)))
        } else {
            CheckOutcome::fail(format!(
                "length {} violates `{}`",
                entries.len(),
                self.length.formula()
            ))
        }
    }

    fn annotation(&self) -> &'static str {
        if self.convert {
            "dict | str"
        } else {
            "dict"
        }
    }
}

/// A filesystem path that must exist
pub struct TypePath {
    convert: bool,
}

impl TypePath {
    pub fn new(convert: bool) -> Self {
        Self { convert }
    }
}

impl TypeCheck for TypePath {
    fn check(&self, value: &Value) -> CheckOutcome {
        let text = match value {
            Value::String(text) => text.clone(),
            other if self.convert => other.to_string(),
            other => return CheckOutcome::fail(format!("`{other}` is not a path")),
        };
        if Path::new(&text).exists() {
            CheckOutcome::pass(self.convert.then(|| Value::String(text)))
        } else {
            CheckOutcome::fail(format!("path `{text}` does not exist"))
        }
    }

    fn annotation(&self) -> &'static str {
        "str"
    }
}

/// Wrap a function so named checkers validate (and possibly convert) its
/// bound arguments before the body runs. Failures aggregate into one
/// validation error; checked parameters pick up the checker's type tag as
/// their annotation.
pub fn check_parameters(
    func: &DynFunction,
    checkers: Vec<(String, Arc<dyn TypeCheck>)>,
) -> Result<DynFunction> {
    for (name, _) in &checkers {
        if !func.signature().contains(name) {
            return Err(Error::configuration(format!(
                "no parameter `{name}` to check on `{}`",
                func.name()
            )));
        }
    }

    let mut parameters = func.signature().parameters().to_vec();
    for parameter in &mut parameters {
        if let Some((_, checker)) = checkers.iter().find(|(name, _)| *name == parameter.name) {
            parameter.annotation = Some(checker.annotation().to_string());
        }
    }
    let signature = Signature::new(parameters)?;

    let table = RoutingTable::from_signature(func.signature());
    let target = func.clone();
    let body: Arc<Body> = Arc::new(move |bound: &BoundArgs| {
        let mut checked = bound.clone();
        let mut errors = Vec::new();
        for (name, checker) in &checkers {
            let Some(value) = checked.get(name) else {
                continue;
            };
            let outcome = checker.check(value);
            if !outcome.ok {
                errors.extend(outcome.errors.into_iter().map(|e| format!("{name}: {e}")));
            } else if let Some(converted) = outcome.value {
                checked.insert(name.clone(), converted);
            }
        }
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        target.call(&table.dispatch(&checked))
    });

    Ok(DynFunction::from_parts(
        func.name().to_string(),
        func.doc().map(str::to_string),
        signature,
        body,
        func.attrs().clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_limit_and_conversion() {
        let checker = TypeInt::new("0<=100", true).unwrap();
        let outcome = checker.check(&json!("42"));
        assert!(outcome.ok);
        assert_eq!(outcome.value, Some(json!(42)));

        let outcome = checker.check(&json!(200));
        assert!(!outcome.ok);

        let strict = TypeInt::new("", false).unwrap();
        assert!(!strict.check(&json!("42")).ok);
        assert!(strict.check(&json!(42)).ok);
    }

    #[test]
    fn test_number_prefers_integer_rendering() {
        let checker = TypeNumber::new("", true).unwrap();
        assert_eq!(checker.check(&json!("3.0")).value, Some(json!(3)));
        assert_eq!(checker.check(&json!("3.5")).value, Some(json!(3.5)));
    }

    #[test]
    fn test_str_constraints() {
        let checker = TypeStr::new(Some("abc"), "1<=3", None, false).unwrap();
        assert!(checker.check(&json!("ab")).ok);
        assert!(!checker.check(&json!("abcd")).ok);
        assert!(!checker.check(&json!("xy")).ok);

        let pattern = TypeStr::new(None, "", Some(r"^\d+$"), false).unwrap();
        assert!(pattern.check(&json!("123")).ok);
        assert!(!pattern.check(&json!("12a")).ok);
    }

    #[test]
    fn test_list_converts_from_json_text() {
        let checker = TypeList::new("2<=", true).unwrap();
        let outcome = checker.check(&json!("[1, 2, 3]"));
        assert!(outcome.ok);
        assert_eq!(outcome.value, Some(json!([1, 2, 3])));
        assert!(!checker.check(&json!("[1]")).ok);
        assert!(!checker.check(&json!("not json")).ok);
    }

    #[test]
    fn test_dict_length() {
        let checker = TypeDict::new("0<", false).unwrap();
        assert!(checker.check(&json!({"a": 1})).ok);
        assert!(!checker.check(&json!({})).ok);
    }
}
