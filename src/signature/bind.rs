//! Bind actual call values against a signature's formal parameters.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;

use crate::core::{BoundArgs, CallArgs, Error, Kwargs, Result};
use crate::signature::{ParameterKind, Signature};

impl Signature {
    /// Bind positional and keyword values to this signature's parameters,
    /// producing the bound locals of one invocation.
    ///
    /// Follows the usual calling convention: positional-only parameters
    /// cannot be supplied by keyword, defaults fill unsupplied optional
    /// parameters, a var-positional parameter collects surplus positionals,
    /// a var-keyword parameter collects surplus keywords. `function` names
    /// the callee in arity errors.
    pub fn bind(&self, function: &str, args: &CallArgs) -> Result<BoundArgs> {
        let mut bound = BoundArgs::new();
        let mut consumed: HashSet<&str> = HashSet::new();
        let mut position = 0usize;

        for parameter in self.parameters() {
            match parameter.kind {
                ParameterKind::PositionalOnly => {
                    if position < args.positional.len() {
                        bound.insert(parameter.name.clone(), args.positional[position].clone());
                        position += 1;
                    } else if let Some(default) = &parameter.default {
                        bound.insert(parameter.name.clone(), default.clone());
                    } else {
                        return Err(Error::arity(
                            function,
                            format!(
                                "missing required positional-only argument `{}`",
                                parameter.name
                            ),
                        ));
                    }
                }
                ParameterKind::PositionalOrKeyword => {
                    if position < args.positional.len() {
                        if args.keyword.contains_key(&parameter.name) {
                            return Err(Error::arity(
                                function,
                                format!("got multiple values for argument `{}`", parameter.name),
                            ));
                        }
                        bound.insert(parameter.name.clone(), args.positional[position].clone());
                        position += 1;
                    } else if let Some(value) = args.keyword.get(&parameter.name) {
                        bound.insert(parameter.name.clone(), value.clone());
                        consumed.insert(parameter.name.as_str());
                    } else if let Some(default) = &parameter.default {
                        bound.insert(parameter.name.clone(), default.clone());
                    } else {
                        return Err(Error::arity(
                            function,
                            format!("missing required argument `{}`", parameter.name),
                        ));
                    }
                }
                ParameterKind::VarPositional => {
                    let rest: Vec<Value> = args.positional[position.min(args.positional.len())..]
                        .to_vec();
                    position = args.positional.len();
                    bound.insert(parameter.name.clone(), Value::Array(rest));
                }
                ParameterKind::KeywordOnly => {
                    if let Some(value) = args.keyword.get(&parameter.name) {
                        bound.insert(parameter.name.clone(), value.clone());
                        consumed.insert(parameter.name.as_str());
                    } else if let Some(default) = &parameter.default {
                        bound.insert(parameter.name.clone(), default.clone());
                    } else {
                        return Err(Error::arity(
                            function,
                            format!("missing required keyword-only argument `{}`", parameter.name),
                        ));
                    }
                }
                ParameterKind::VarKeyword => {
                    let mut surplus = serde_json::Map::new();
                    for (name, value) in &args.keyword {
                        if !consumed.contains(name.as_str()) {
                            surplus.insert(name.clone(), value.clone());
                        }
                    }
                    bound.insert(parameter.name.clone(), Value::Object(surplus));
                }
            }
        }

        if position < args.positional.len() && self.var_positional().is_none() {
            return Err(Error::arity(
                function,
                format!(
                    "takes {} positional arguments but {} were given",
                    position,
                    args.positional.len()
                ),
            ));
        }
        if self.var_keyword().is_none() {
            for name in args.keyword.keys() {
                if !consumed.contains(name.as_str()) {
                    return Err(Error::arity(
                        function,
                        format!("got an unexpected keyword argument `{name}`"),
                    ));
                }
            }
        }

        Ok(bound)
    }
}

/// Actual argument values of one call, partitioned by the bucket each value
/// lands in for the given signature.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedValues {
    pub positional: IndexMap<String, Value>,
    pub var_positional: Option<(String, Vec<Value>)>,
    pub keyword: IndexMap<String, Value>,
    pub var_keyword: Option<(String, Kwargs)>,
}

impl ClassifiedValues {
    /// One flat name-to-value view: positional values, the var-positional
    /// sequence under its own name, keyword-only values, then the contents
    /// of the var-keyword bag.
    pub fn flatten(&self) -> IndexMap<String, Value> {
        let mut flat = self.positional.clone();
        if let Some((name, values)) = &self.var_positional {
            flat.insert(name.clone(), Value::Array(values.clone()));
        }
        for (name, value) in &self.keyword {
            flat.insert(name.clone(), value.clone());
        }
        if let Some((_, bag)) = &self.var_keyword {
            for (name, value) in bag {
                flat.insert(name.clone(), value.clone());
            }
        }
        flat
    }
}

/// Partition the supplied values of one call by the signature's buckets,
/// without applying defaults. Every declared positional and keyword-only
/// parameter must be supplied.
pub fn classify_call_values(
    signature: &Signature,
    function: &str,
    args: &CallArgs,
) -> Result<ClassifiedValues> {
    let mut classified = ClassifiedValues::default();
    let mut position = 0usize;

    for parameter in signature.parameters() {
        match parameter.kind {
            ParameterKind::PositionalOnly | ParameterKind::PositionalOrKeyword => {
                let value = args.positional.get(position).ok_or_else(|| {
                    Error::arity(
                        function,
                        format!("no positional value for `{}`", parameter.name),
                    )
                })?;
                classified.positional.insert(parameter.name.clone(), value.clone());
                position += 1;
            }
            ParameterKind::VarPositional => {
                let rest = args.positional[position.min(args.positional.len())..].to_vec();
                position = args.positional.len();
                classified.var_positional = Some((parameter.name.clone(), rest));
            }
            ParameterKind::KeywordOnly => {
                let value = args.keyword.get(&parameter.name).ok_or_else(|| {
                    Error::arity(
                        function,
                        format!("no keyword value for `{}`", parameter.name),
                    )
                })?;
                classified.keyword.insert(parameter.name.clone(), value.clone());
            }
            ParameterKind::VarKeyword => {
                let mut bag = Kwargs::new();
                for (name, value) in &args.keyword {
                    if !classified.keyword.contains_key(name) && !signature.contains(name) {
                        bag.insert(name.clone(), value.clone());
                    }
                }
                classified.var_keyword = Some((parameter.name.clone(), bag));
            }
        }
    }

    Ok(classified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Parameter;
    use serde_json::json;

    fn target_signature() -> Signature {
        Signature::new(vec![
            Parameter::positional_only("a"),
            Parameter::required("b"),
            Parameter::required("c"),
            Parameter::optional("d", json!(4)),
            Parameter::optional("e", json!(5)),
            Parameter::keyword_only("f").with_default(json!(6)),
            Parameter::keyword_only("g").with_default(json!(7)),
        ])
        .unwrap()
    }

    #[test]
    fn test_bind_fills_defaults() {
        let bound = target_signature()
            .bind(
                "target",
                &CallArgs::positional(vec![json!(1), json!(2), json!(3)]),
            )
            .unwrap();
        let expected: Vec<(&str, Value)> = vec![
            ("a", json!(1)),
            ("b", json!(2)),
            ("c", json!(3)),
            ("d", json!(4)),
            ("e", json!(5)),
            ("f", json!(6)),
            ("g", json!(7)),
        ];
        for (name, value) in expected {
            assert_eq!(bound.get(name), Some(&value), "mismatch for {name}");
        }
    }

    #[test]
    fn test_bind_missing_required_is_arity_error() {
        let result = target_signature().bind(
            "target",
            &CallArgs::positional(vec![json!(1)]).kwarg("b", json!(2)),
        );
        assert!(matches!(result, Err(Error::Arity { .. })));
    }

    #[test]
    fn test_bind_positional_only_by_keyword_is_rejected() {
        let sig = Signature::new(vec![Parameter::positional_only("a")]).unwrap();
        let result = sig.bind("target", &CallArgs::new().kwarg("a", json!(1)));
        assert!(matches!(result, Err(Error::Arity { .. })));
    }

    #[test]
    fn test_bind_collects_variadics() {
        let sig = Signature::new(vec![
            Parameter::required("a"),
            Parameter::var_positional("args"),
            Parameter::var_keyword("kwargs"),
        ])
        .unwrap();
        let bound = sig
            .bind(
                "target",
                &CallArgs::positional(vec![json!(1), json!(2), json!(3)]).kwarg("x", json!(9)),
            )
            .unwrap();
        assert_eq!(bound.get("args"), Some(&json!([2, 3])));
        assert_eq!(bound.get("kwargs"), Some(&json!({"x": 9})));
    }

    #[test]
    fn test_bind_duplicate_value_is_rejected() {
        let sig = Signature::new(vec![Parameter::required("a")]).unwrap();
        let result = sig.bind(
            "target",
            &CallArgs::positional(vec![json!(1)]).kwarg("a", json!(2)),
        );
        assert!(matches!(result, Err(Error::Arity { .. })));
    }

    #[test]
    fn test_classify_partitions_by_bucket() {
        let sig = Signature::new(vec![
            Parameter::required("a"),
            Parameter::var_positional("rest"),
            Parameter::keyword_only("k"),
            Parameter::var_keyword("kw"),
        ])
        .unwrap();
        let classified = classify_call_values(
            &sig,
            "target",
            &CallArgs::positional(vec![json!(1), json!(2)])
                .kwarg("k", json!(3))
                .kwarg("other", json!(4)),
        )
        .unwrap();
        assert_eq!(classified.positional.get("a"), Some(&json!(1)));
        assert_eq!(classified.var_positional, Some(("rest".to_string(), vec![json!(2)])));
        assert_eq!(classified.keyword.get("k"), Some(&json!(3)));
        let (_, bag) = classified.var_keyword.unwrap();
        assert_eq!(bag.get("other"), Some(&json!(4)));
    }
}
