//! Partition a parameter list into its calling-convention buckets.

use indexmap::IndexMap;

use crate::core::{Error, Result};
use crate::signature::{Parameter, ParameterKind, Signature};

/// The five ordered buckets of a parameter list. Derived from a signature,
/// recomputed on demand, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct ParameterClassification {
    pub positional_only: IndexMap<String, Parameter>,
    pub positional_or_keyword: IndexMap<String, Parameter>,
    pub var_positional: Option<Parameter>,
    pub keyword_only: IndexMap<String, Parameter>,
    pub var_keyword: Option<Parameter>,
}

impl ParameterClassification {
    pub fn from_signature(signature: &Signature) -> Self {
        let mut classification = Self::default();
        for parameter in signature.parameters() {
            let name = parameter.name.clone();
            match parameter.kind {
                ParameterKind::PositionalOnly => {
                    classification.positional_only.insert(name, parameter.clone());
                }
                ParameterKind::PositionalOrKeyword => {
                    classification
                        .positional_or_keyword
                        .insert(name, parameter.clone());
                }
                ParameterKind::VarPositional => {
                    classification.var_positional = Some(parameter.clone());
                }
                ParameterKind::KeywordOnly => {
                    classification.keyword_only.insert(name, parameter.clone());
                }
                ParameterKind::VarKeyword => {
                    classification.var_keyword = Some(parameter.clone());
                }
            }
        }
        classification
    }

    /// All positional parameters in declaration order
    pub fn positional(&self) -> impl Iterator<Item = &Parameter> {
        self.positional_only
            .values()
            .chain(self.positional_or_keyword.values())
    }

    pub fn has_positional(&self, name: &str) -> bool {
        self.positional_only.contains_key(name) || self.positional_or_keyword.contains_key(name)
    }

    /// Which bucket, if any, a name occupies
    pub fn bucket_of(&self, name: &str) -> Option<ParameterKind> {
        if self.positional_only.contains_key(name) {
            Some(ParameterKind::PositionalOnly)
        } else if self.positional_or_keyword.contains_key(name) {
            Some(ParameterKind::PositionalOrKeyword)
        } else if self.var_positional.as_ref().is_some_and(|p| p.name == name) {
            Some(ParameterKind::VarPositional)
        } else if self.keyword_only.contains_key(name) {
            Some(ParameterKind::KeywordOnly)
        } else if self.var_keyword.as_ref().is_some_and(|p| p.name == name) {
            Some(ParameterKind::VarKeyword)
        } else {
            None
        }
    }
}

/// Ordering priority of a parameter: positional-only, then required
/// positional-or-keyword, then defaulted, then var-positional, keyword-only,
/// var-keyword.
pub fn parameter_priority(parameter: &Parameter) -> u8 {
    match parameter.kind {
        ParameterKind::PositionalOnly => 1,
        ParameterKind::PositionalOrKeyword => {
            if parameter.has_default() {
                3
            } else {
                2
            }
        }
        ParameterKind::VarPositional => 5,
        ParameterKind::KeywordOnly => 6,
        ParameterKind::VarKeyword => 10,
    }
}

/// Insert new parameters into an existing declaration-ordered list, each at
/// the end of its priority group, keeping the list well ordered.
pub fn insert_parameters(parameters: &mut Vec<Parameter>, additions: Vec<Parameter>) -> Result<()> {
    for addition in additions {
        if parameters.iter().any(|p| p.name == addition.name) {
            return Err(Error::configuration(format!(
                "parameter `{}` already declared",
                addition.name
            )));
        }
        let priority = parameter_priority(&addition);
        let position = parameters
            .iter()
            .position(|p| parameter_priority(p) > priority)
            .unwrap_or(parameters.len());
        parameters.insert(position, addition);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_signature() -> Signature {
        Signature::new(vec![
            Parameter::positional_only("a"),
            Parameter::required("b"),
            Parameter::optional("c", json!(3)),
            Parameter::var_positional("args"),
            Parameter::keyword_only("k"),
            Parameter::var_keyword("kwargs"),
        ])
        .unwrap()
    }

    #[test]
    fn test_buckets_follow_declaration_order() {
        let classification = ParameterClassification::from_signature(&sample_signature());
        assert_eq!(
            classification.positional().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(classification.var_positional.unwrap().name, "args");
        assert_eq!(classification.keyword_only.len(), 1);
        assert_eq!(classification.var_keyword.unwrap().name, "kwargs");
    }

    #[test]
    fn test_insert_lands_at_end_of_priority_group() {
        let mut parameters = sample_signature().parameters().to_vec();
        insert_parameters(&mut parameters, vec![Parameter::required("d")]).unwrap();
        let names: Vec<_> = parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "d", "c", "args", "k", "kwargs"]);
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut parameters = sample_signature().parameters().to_vec();
        let result = insert_parameters(&mut parameters, vec![Parameter::required("b")]);
        assert!(result.is_err());
    }
}
