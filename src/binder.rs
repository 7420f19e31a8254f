//! Placeholder scanning and parameter binding.
//!
//! Query text declares its parameters inline: ordinal markers of the form
//! `?n` (1-based) or named markers of the form `:identifier`. The two styles
//! must not be mixed within one query. Scanning skips string literals,
//! quoted identifiers, comments, and `::` casts so that e.g.
//! `'it''s :ok'` or `value::uuid` never declare a parameter.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use crate::error::Error;
use crate::error::Result;
use crate::value::IntoValue;
use crate::value::Value;

/// A single declared query parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// `?n` marker; the index is 1-based.
    Positional(usize),
    /// `:identifier` marker.
    Named(String),
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Positional(n) => write!(f, "?{}", n),
            Parameter::Named(name) => write!(f, ":{}", name),
        }
    }
}

/// Which marker style a query text uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterStyle {
    #[default]
    None,
    Positional,
    Named,
}

/// The outcome of scanning a query text: every marker occurrence with its
/// byte span, plus the distinct parameters in first-appearance order.
#[derive(Clone, Debug)]
pub struct ScannedQuery {
    text:        String,
    style:       ParameterStyle,
    occurrences: Vec<(Parameter, Range<usize>)>,
    distinct:    Vec<Parameter>,
}

impl ScannedQuery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> ParameterStyle {
        self.style
    }

    pub fn occurrences(&self) -> &[(Parameter, Range<usize>)] {
        &self.occurrences
    }

    /// Distinct declared parameters, ordered by first appearance.
    pub fn parameters(&self) -> &[Parameter] {
        &self.distinct
    }

    /// Highest ordinal referenced, 0 when there are no positional markers.
    pub fn max_ordinal(&self) -> usize {
        self.distinct
            .iter()
            .filter_map(|p| match p {
                Parameter::Positional(n) => Some(*n),
                Parameter::Named(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Scans `text` left to right for `?n` and `:identifier` markers.
pub fn scan(text: &str) -> Result<ScannedQuery> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut occurrences: Vec<(Parameter, Range<usize>)> = Vec::new();
    let mut i = 0;

    let char_at = |idx: usize| chars.get(idx).map(|(_, c)| *c);
    let byte_at = |idx: usize| chars.get(idx).map(|(b, _)| *b).unwrap_or(text.len());

    while i < chars.len() {
        let (start, c) = chars[i];
        match c {
            '\'' | '"' => {
                // String literal or quoted identifier; a doubled quote is an
                // escape, not a terminator.
                let quote = c;
                i += 1;
                while i < chars.len() {
                    if chars[i].1 == quote {
                        if char_at(i + 1) == Some(quote) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if char_at(i + 1) == Some('-') => {
                while i < chars.len() && chars[i].1 != '\n' {
                    i += 1;
                }
            }
            '/' if char_at(i + 1) == Some('*') => {
                i += 2;
                while i < chars.len() {
                    if chars[i].1 == '*' && char_at(i + 1) == Some('/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            '?' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_ascii_digit() {
                    j += 1;
                }
                if j == i + 1 {
                    return Err(Error::InvalidPlaceholder(
                        "bare `?` is not allowed; use an explicit ordinal like `?1`".to_string(),
                    ));
                }
                let digits = &text[byte_at(i + 1)..byte_at(j)];
                let ordinal: usize = digits
                    .parse()
                    .map_err(|_| Error::InvalidPlaceholder(format!("unparseable ordinal `?{}`", digits)))?;
                if ordinal == 0 {
                    return Err(Error::InvalidPlaceholder("ordinal parameters are 1-based; `?0` is invalid".to_string()));
                }
                occurrences.push((Parameter::Positional(ordinal), start..byte_at(j)));
                i = j;
            }
            ':' => {
                if char_at(i + 1) == Some(':') {
                    // PostgreSQL-style cast, not a parameter.
                    i += 2;
                    continue;
                }
                let is_ident_start = char_at(i + 1).map(|c| c.is_alphabetic() || c == '_').unwrap_or(false);
                if !is_ident_start {
                    i += 1;
                    continue;
                }
                let mut j = i + 1;
                while j < chars.len() && (chars[j].1.is_alphanumeric() || chars[j].1 == '_') {
                    j += 1;
                }
                let name = text[byte_at(i + 1)..byte_at(j)].to_string();
                occurrences.push((Parameter::Named(name), start..byte_at(j)));
                i = j;
            }
            _ => i += 1,
        }
    }

    let has_positional = occurrences.iter().any(|(p, _)| matches!(p, Parameter::Positional(_)));
    let has_named = occurrences.iter().any(|(p, _)| matches!(p, Parameter::Named(_)));
    let style = match (has_positional, has_named) {
        (true, true) => return Err(Error::MixedParameterStyle),
        (true, false) => ParameterStyle::Positional,
        (false, true) => ParameterStyle::Named,
        (false, false) => ParameterStyle::None,
    };

    let mut distinct = Vec::new();
    for (parameter, _) in &occurrences {
        if !distinct.contains(parameter) {
            distinct.push(parameter.clone());
        }
    }

    Ok(ScannedQuery { text: text.to_string(), style, occurrences, distinct })
}

/// Call-site arguments: an ordered sequence for ordinal queries, a mapping
/// for named queries.
#[derive(Clone, Debug, Default)]
pub enum Arguments {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl Arguments {
    pub fn positional<V: IntoValue>(values: impl IntoIterator<Item = V>) -> Self {
        Arguments::Positional(values.into_iter().map(IntoValue::into_value).collect())
    }

    pub fn named<K: Into<String>, V: IntoValue>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Arguments::Named(entries.into_iter().map(|(k, v)| (k.into(), v.into_value())).collect())
    }

    fn positional_values(&self) -> &[Value] {
        match self {
            Arguments::Positional(values) => values,
            _ => &[],
        }
    }

    fn named_value(&self, name: &str) -> Option<&Value> {
        match self {
            Arguments::Named(map) => map.get(name),
            _ => None,
        }
    }
}

/// An immutable, fully-resolved parameter set, ready for execution.
#[derive(Clone, Debug)]
pub struct BoundParameterSet {
    scanned:  ScannedQuery,
    bindings: Vec<(Parameter, Value)>,
}

impl BoundParameterSet {
    /// Matches the scanned parameters against the supplied arguments.
    ///
    /// Ordinal queries require the argument sequence to reach the highest
    /// referenced index; named queries require every identifier to be
    /// supplied. Extra supplied arguments are never an error.
    pub fn bind(scanned: ScannedQuery, arguments: &Arguments) -> Result<Self> {
        let mut bindings = Vec::with_capacity(scanned.parameters().len());

        match scanned.style() {
            ParameterStyle::None => {}
            ParameterStyle::Positional => {
                let supplied = scanned_positional_len(arguments);
                let referenced = scanned.max_ordinal();
                if referenced > supplied {
                    return Err(Error::ParameterCountMismatch { referenced, supplied });
                }
                for parameter in scanned.parameters() {
                    if let Parameter::Positional(n) = parameter {
                        let value = arguments.positional_values()[n - 1].clone();
                        bindings.push((parameter.clone(), value));
                    }
                }
            }
            ParameterStyle::Named => {
                for parameter in scanned.parameters() {
                    if let Parameter::Named(name) = parameter {
                        match arguments.named_value(name) {
                            Some(value) => bindings.push((parameter.clone(), value.clone())),
                            None => return Err(Error::UnboundParameter(name.clone())),
                        }
                    }
                }
            }
        }

        Ok(Self { scanned, bindings })
    }

    pub fn scanned(&self) -> &ScannedQuery {
        &self.scanned
    }

    /// Distinct `(parameter, value)` pairs in first-appearance order.
    pub fn bindings(&self) -> &[(Parameter, Value)] {
        &self.bindings
    }

    pub fn value_of(&self, parameter: &Parameter) -> Option<&Value> {
        self.bindings.iter().find(|(p, _)| p == parameter).map(|(_, v)| v)
    }

    /// Rewrites every marker to the substrate's anonymous `?` placeholder
    /// and emits values in occurrence order, so a parameter that appears
    /// twice contributes its value twice.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let text = self.scanned.text();
        let mut sql = String::with_capacity(text.len());
        let mut values = Vec::with_capacity(self.scanned.occurrences().len());
        let mut cursor = 0;

        for (parameter, span) in self.scanned.occurrences() {
            sql.push_str(&text[cursor..span.start]);
            sql.push('?');
            cursor = span.end;
            // Bind validation guarantees a value for every occurrence.
            if let Some(value) = self.value_of(parameter) {
                values.push(value.clone());
            }
        }
        sql.push_str(&text[cursor..]);

        (sql, values)
    }
}

fn scanned_positional_len(arguments: &Arguments) -> usize {
    match arguments {
        Arguments::Positional(values) => values.len(),
        _ => 0,
    }
}

/// Scans and binds in one step.
pub fn bind(text: &str, arguments: &Arguments) -> Result<BoundParameterSet> {
    BoundParameterSet::bind(scan(text)?, arguments)
}
