//! Compile-time parameter mapping handed to the kernel build step.
//!
//! Parameters stay structured until the very edge: solvers fill a
//! [`CompileParams`] map with typed values and only [`CompileParams::render`]
//! turns them into the textual flags the assembler or HIP compiler expects.
//! Values are integers or booleans, so a rendered value can never contain the
//! `=` or whitespace separators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Int(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(true) => f.write_str("1"),
            ParamValue::Bool(false) => f.write_str("0"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(value as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// How a single `name=value` pair is spelled on the build command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSyntax {
    /// `-Wa,-defsym,name=value` for the clang assembler.
    AssemblerDefsym,
    /// `-Dname=value` for the C++ preprocessor.
    PreprocessorDefine,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompileParams {
    values: BTreeMap<String, ParamValue>,
}

impl CompileParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name = value`. Each name is defined exactly once per kernel.
    pub fn define(&mut self, name: &str, value: impl Into<ParamValue>) -> &mut Self {
        debug_assert!(is_identifier(name), "invalid compile parameter name {name:?}");
        let previous = self.values.insert(name.to_string(), value.into());
        debug_assert!(previous.is_none(), "compile parameter {name} defined twice");
        self
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_int())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Space-separated flags in name order.
    pub fn render(&self, syntax: ParamSyntax) -> String {
        self.iter()
            .map(|(name, value)| match syntax {
                ParamSyntax::AssemblerDefsym => format!("-Wa,-defsym,{name}={value}"),
                ParamSyntax::PreprocessorDefine => format!("-D{name}={value}"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
