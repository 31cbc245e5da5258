//! Rule registry deciding which stack frames count as infrastructure.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::core::{Error, Result};
use crate::stack::StackFrame;

/// Module names that are not stable identities across processes and must
/// never key an ignore rule
pub const RESERVED_MODULES: &[&str] = &["__main__", "<unresolved>"];

/// One registered ignore rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgnoreRule {
    /// Minimum walk severity at which the rule applies
    pub level: u32,
    /// Source file backing the rule, for self-checking
    pub file: Option<PathBuf>,
    /// Exact text of the registered line, for self-checking
    pub check_text: Option<String>,
}

/// All rules registered for one module path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleRules {
    pub by_line: IndexMap<u32, IgnoreRule>,
    pub wildcard: Option<IgnoreRule>,
}

/// Mapping from module path to its ignore rules. Grows monotonically; never
/// pruned.
#[derive(Debug, Default)]
pub struct IgnoreRegistry {
    modules: HashMap<String, ModuleRules>,
}

/// Split a module path on either separator style
pub(crate) fn split_module(module: &str) -> Vec<String> {
    module
        .split("::")
        .flat_map(|part| part.split('.'))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_module(module: &str) -> String {
    split_module(module).join("::")
}

fn validate_module(module: &str) -> Result<()> {
    if RESERVED_MODULES.contains(&module) {
        return Err(Error::configuration(format!(
            "cannot register ignore rules for reserved module `{module}`"
        )));
    }
    if normalize_module(module).is_empty() {
        return Err(Error::configuration(
            "cannot register ignore rules for an empty module path",
        ));
    }
    Ok(())
}

impl IgnoreRegistry {
    /// Register a wildcard rule covering a module and all its submodules
    pub fn register_module(&mut self, module: &str, level: u32) -> Result<()> {
        validate_module(module)?;
        let key = normalize_module(module);
        log::debug!("ignoring module {key} at level {level}");
        self.modules.entry(key).or_default().wildcard = Some(IgnoreRule {
            level,
            file: None,
            check_text: None,
        });
        Ok(())
    }

    /// Register a rule for one exact line of a module
    pub fn register_line(
        &mut self,
        module: &str,
        file: PathBuf,
        line: u32,
        level: u32,
        check_text: Option<String>,
    ) -> Result<()> {
        validate_module(module)?;
        if line == 0 {
            return Err(Error::configuration("line numbers are 1-based"));
        }
        let key = normalize_module(module);
        log::debug!("ignoring {key}:{line} at level {level}");
        self.modules.entry(key).or_default().by_line.insert(
            line,
            IgnoreRule {
                level,
                file: Some(file),
                check_text,
            },
        );
        Ok(())
    }

    /// Find the rule governing a frame, if any: longest registered
    /// module-path prefix wins; within it an exact-line rule beats the
    /// wildcard, and no match at that prefix means no match at all.
    pub fn match_rule(&self, module: &str, line: Option<u32>) -> Option<&IgnoreRule> {
        let parts = split_module(module);
        for length in (1..=parts.len()).rev() {
            let key = parts[..length].join("::");
            if let Some(rules) = self.modules.get(&key) {
                if let Some(line) = line {
                    if let Some(rule) = rules.by_line.get(&line) {
                        return Some(rule);
                    }
                }
                return rules.wildcard.as_ref();
            }
        }
        None
    }

    /// Whether a frame is infrastructure at the given walk severity
    pub fn should_ignore(&self, frame: &StackFrame, threshold: u32) -> bool {
        self.match_rule(frame.module(), frame.line())
            .is_some_and(|rule| threshold >= rule.level)
    }

    /// Total number of registered rules
    pub fn len(&self) -> usize {
        self.modules
            .values()
            .map(|rules| rules.by_line.len() + usize::from(rules.wildcard.is_some()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read the source line behind every rule that recorded its text and
    /// fail on the first mismatch. Catches line numbers gone stale after
    /// source edits.
    pub fn self_check(&self) -> Result<()> {
        for (module, rules) in &self.modules {
            for (line, rule) in &rules.by_line {
                let (Some(file), Some(expected)) = (&rule.file, &rule.check_text) else {
                    continue;
                };
                let reader = BufReader::new(File::open(file)?);
                let found = reader
                    .lines()
                    .nth(*line as usize - 1)
                    .transpose()?
                    .unwrap_or_default();
                if found.trim() != expected.trim() {
                    return Err(Error::StaleRule {
                        module: module.clone(),
                        file: file.clone(),
                        line: *line,
                        expected: expected.trim().to_string(),
                        found: found.trim().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
