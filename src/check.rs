//! Numeric range checks and boolean formulas over them.
//!
//! A `NumberCheck` is one leaf comparison (`"5"`, `">3"`, `"1<=5"`); a
//! `CheckFormula` combines leaves with `!`, `&`, `|` and brackets, with an
//! implicit OR between adjacent atoms.

use std::str::FromStr;

use crate::core::{Error, Result};

/// A boolean test over one number
pub trait Predicate {
    fn check(&self, value: f64) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bound {
    value: f64,
    inclusive: bool,
}

impl Bound {
    fn admits_low(self, value: f64) -> bool {
        if self.inclusive {
            value >= self.value
        } else {
            value > self.value
        }
    }

    fn admits_high(self, value: f64) -> bool {
        if self.inclusive {
            value <= self.value
        } else {
            value < self.value
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NumberTest {
    Exact(f64),
    Range {
        low: Option<Bound>,
        high: Option<Bound>,
    },
}

/// One range or equality comparison parsed from a formula atom.
///
/// Grammar: optional `!` prefixes toggle negation; a bare number tests
/// equality; a single `<` or `>` with an optional number on each side and an
/// optional `=` on the bounded side tests a range. `"1<"` means greater than
/// one, `"<=5"` at most five, `"5>=3"` at least three and below five.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberCheck {
    formula: String,
    negated: bool,
    test: NumberTest,
}

impl NumberCheck {
    pub fn parse(formula: &str) -> Result<Self> {
        let original = formula.trim().to_string();
        let mut rest = original.as_str();
        let mut negated = false;
        while let Some(stripped) = rest.strip_prefix('!') {
            rest = stripped;
            negated = !negated;
        }
        let test = if let Some((left, right)) = rest.split_once('>') {
            parse_range(left, right, true)?
        } else if let Some((left, right)) = rest.split_once('<') {
            parse_range(left, right, false)?
        } else {
            NumberTest::Exact(parse_number(rest)?)
        };
        Ok(Self {
            formula: original,
            negated,
            test,
        })
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }
}

impl Predicate for NumberCheck {
    fn check(&self, value: f64) -> bool {
        let inside = match &self.test {
            NumberTest::Exact(expected) => value == *expected,
            NumberTest::Range { low, high } => {
                low.map_or(true, |bound| bound.admits_low(value))
                    && high.map_or(true, |bound| bound.admits_high(value))
            }
        };
        inside != self.negated
    }
}

impl FromStr for NumberCheck {
    type Err = Error;

    fn from_str(formula: &str) -> Result<Self> {
        Self::parse(formula)
    }
}

fn parse_number(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| Error::configuration(format!("`{}` is not a number", text.trim())))
}

fn parse_optional_number(text: &str) -> Result<Option<f64>> {
    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        parse_number(text).map(Some)
    }
}

/// `reverse` maps a `>` comparison onto the same low/high form as `<`
fn parse_range(left: &str, right: &str, reverse: bool) -> Result<NumberTest> {
    let mut left = left.trim();
    let mut right = right.trim();
    let mut left_inclusive = false;
    let mut right_inclusive = false;
    if let Some(stripped) = left.strip_suffix('=') {
        left = stripped;
        left_inclusive = true;
    }
    if let Some(stripped) = right.strip_prefix('=') {
        right = stripped;
        right_inclusive = true;
    }
    let left_bound = parse_optional_number(left)?.map(|value| Bound {
        value,
        inclusive: left_inclusive,
    });
    let right_bound = parse_optional_number(right)?.map(|value| Bound {
        value,
        inclusive: right_inclusive,
    });
    let (low, high) = if reverse {
        (right_bound, left_bound)
    } else {
        (left_bound, right_bound)
    };
    Ok(NumberTest::Range { low, high })
}

/// Boolean expression tree over leaf predicates
#[derive(Debug, Clone, PartialEq)]
pub enum BoolExpr<P> {
    Leaf(P),
    Not(Box<BoolExpr<P>>),
    And(Vec<BoolExpr<P>>),
    Or(Vec<BoolExpr<P>>),
}

impl<P: Predicate> BoolExpr<P> {
    pub fn eval(&self, value: f64) -> bool {
        match self {
            Self::Leaf(predicate) => predicate.check(value),
            Self::Not(inner) => !inner.eval(value),
            Self::And(items) => items.iter().all(|item| item.eval(value)),
            Self::Or(items) => items.iter().any(|item| item.eval(value)),
        }
    }
}

const LEFT_BRACKETS: &[char] = &['(', '[', '{', '（', '【'];
const RIGHT_BRACKETS: &[char] = &[')', ']', '}', '）', '】'];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Atom(String),
    Or,
    And,
    Not,
    Open,
    Close,
}

fn tokenize(formula: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut atom = String::new();
    let flush = |atom: &mut String, tokens: &mut Vec<Token>| {
        if !atom.is_empty() {
            tokens.push(Token::Atom(std::mem::take(atom)));
        }
    };
    for ch in formula.chars() {
        if LEFT_BRACKETS.contains(&ch) {
            flush(&mut atom, &mut tokens);
            tokens.push(Token::Open);
        } else if RIGHT_BRACKETS.contains(&ch) {
            flush(&mut atom, &mut tokens);
            tokens.push(Token::Close);
        } else if ch == '|' {
            flush(&mut atom, &mut tokens);
            tokens.push(Token::Or);
        } else if ch == '&' {
            flush(&mut atom, &mut tokens);
            tokens.push(Token::And);
        } else if ch == '!' {
            flush(&mut atom, &mut tokens);
            tokens.push(Token::Not);
        } else if ch.is_whitespace() {
            flush(&mut atom, &mut tokens);
        } else {
            atom.push(ch);
        }
    }
    flush(&mut atom, &mut tokens);
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    // or_expr := and_expr ((`|` | implicit) and_expr)*
    fn or_expr<P: Predicate + FromStr<Err = Error>>(&mut self) -> Result<BoolExpr<P>> {
        let mut items = vec![self.and_expr()?];
        loop {
            match self.peek() {
                Some(Token::Or) => {
                    self.position += 1;
                    items.push(self.and_expr()?);
                }
                // adjacent operands combine with the implicit OR
                Some(Token::Atom(_)) | Some(Token::Not) | Some(Token::Open) => {
                    items.push(self.and_expr()?);
                }
                _ => break,
            }
        }
        Ok(if items.len() == 1 {
            items.pop().expect("one item")
        } else {
            BoolExpr::Or(items)
        })
    }

    fn and_expr<P: Predicate + FromStr<Err = Error>>(&mut self) -> Result<BoolExpr<P>> {
        let mut items = vec![self.not_expr()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.position += 1;
            items.push(self.not_expr()?);
        }
        Ok(if items.len() == 1 {
            items.pop().expect("one item")
        } else {
            BoolExpr::And(items)
        })
    }

    fn not_expr<P: Predicate + FromStr<Err = Error>>(&mut self) -> Result<BoolExpr<P>> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.position += 1;
            Ok(BoolExpr::Not(Box::new(self.not_expr()?)))
        } else {
            self.primary()
        }
    }

    fn primary<P: Predicate + FromStr<Err = Error>>(&mut self) -> Result<BoolExpr<P>> {
        match self.advance() {
            Some(Token::Atom(text)) => Ok(BoolExpr::Leaf(text.parse::<P>()?)),
            Some(Token::Open) => {
                let expr = self.or_expr()?;
                match self.advance() {
                    Some(Token::Close) => Ok(expr),
                    _ => Err(Error::configuration("unclosed bracket in formula")),
                }
            }
            other => Err(Error::configuration(format!(
                "expected a value in formula, found {other:?}"
            ))),
        }
    }
}

/// A boolean formula over leaf predicates. An empty formula is always true.
#[derive(Debug, Clone)]
pub struct CheckFormula<P = NumberCheck> {
    formula: String,
    expr: Option<BoolExpr<P>>,
}

impl<P> CheckFormula<P>
where
    P: Predicate + FromStr<Err = Error>,
{
    pub fn parse(formula: &str) -> Result<Self> {
        let tokens = tokenize(formula);
        let expr = if tokens.is_empty() {
            None
        } else {
            let mut parser = Parser { tokens, position: 0 };
            let expr = parser.or_expr::<P>()?;
            if let Some(leftover) = parser.peek() {
                return Err(Error::configuration(format!(
                    "unexpected {leftover:?} in formula `{formula}`"
                )));
            }
            Some(expr)
        };
        Ok(Self {
            formula: formula.trim().to_string(),
            expr,
        })
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn check(&self, value: f64) -> bool {
        self.expr.as_ref().map_or(true, |expr| expr.eval(value))
    }
}

impl<P> Predicate for CheckFormula<P>
where
    P: Predicate + FromStr<Err = Error>,
{
    fn check(&self, value: f64) -> bool {
        CheckFormula::check(self, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_check(formula: &str) -> NumberCheck {
        NumberCheck::parse(formula).unwrap()
    }

    fn formula(text: &str) -> CheckFormula {
        CheckFormula::parse(text).unwrap()
    }

    #[test]
    fn test_exact_and_negation() {
        assert!(number_check("5").check(5.0));
        assert!(!number_check("5").check(4.0));
        assert!(!number_check("!5").check(5.0));
        assert!(number_check("!!5").check(5.0));
    }

    #[test]
    fn test_open_and_closed_ranges() {
        assert!(number_check("1<").check(2.0));
        assert!(!number_check("1<").check(1.0));
        assert!(number_check("1<=").check(1.0));
        assert!(number_check("<5").check(4.0));
        assert!(!number_check("<5").check(5.0));
        assert!(number_check("<=5").check(5.0));
        assert!(number_check("1<5").check(3.0));
        assert!(!number_check("1<5").check(0.0));
    }

    #[test]
    fn test_reversed_comparison() {
        // "5>=3" reads: below five, at least three
        let check = number_check("5>=3");
        assert!(check.check(3.0));
        assert!(check.check(4.0));
        assert!(!check.check(5.0));
        assert!(!check.check(2.0));
    }

    #[test]
    fn test_non_number_is_rejected() {
        assert!(NumberCheck::parse("abc").is_err());
        assert!(NumberCheck::parse("1<abc").is_err());
    }

    #[test]
    fn test_formula_precedence() {
        // `&` binds tighter than `|`
        let check = formula("5 | 1<3 & 2<4");
        assert!(check.check(5.0));
        assert!(check.check(2.5));
        assert!(!check.check(3.5));
    }

    #[test]
    fn test_implicit_or_between_atoms() {
        let check = formula("1 2 3");
        assert!(check.check(2.0));
        assert!(!check.check(4.0));
    }

    #[test]
    fn test_not_binds_tightest() {
        let check = formula("!1 & !2");
        assert!(check.check(3.0));
        assert!(!check.check(1.0));
        assert!(!check.check(2.0));
    }

    #[test]
    fn test_brackets_group() {
        let check = formula("!(1 | 2)");
        assert!(check.check(3.0));
        assert!(!check.check(1.0));
    }

    #[test]
    fn test_empty_formula_is_always_true() {
        assert!(formula("").check(123.0));
        assert!(formula("   ").check(-1.0));
    }

    #[test]
    fn test_dangling_operator_is_rejected() {
        assert!(CheckFormula::<NumberCheck>::parse("1 &").is_err());
        assert!(CheckFormula::<NumberCheck>::parse("(1").is_err());
        assert!(CheckFormula::<NumberCheck>::parse("1)").is_err());
    }
}
