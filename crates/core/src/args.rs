//! Argument vector filtering and parsing.
//!
//! [`filter_args`] splits an argv into the tokens a consumer accepts and the
//! tokens it does not; nothing is dropped without being reported.
//! [`ParsedArgs`] is a lightweight option map used to inspect an argv
//! (watch flags, orchestrator options) without changing what gets forwarded.

use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};

/// Options consumed by toolrig itself and never forwarded to a wrapped tool.
pub const ORCHESTRATOR_OPTIONS: &[&str] = &[
    "--workspaces",
    "--concurrency",
    "--graph",
    "--no-graph",
    "--parallel",
];

/// Orchestrator options that never take a value.
pub const ORCHESTRATOR_SWITCHES: &[&str] = &["--graph", "--no-graph"];

/// Which options [`filter_args`] keeps.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    allow: Option<HashSet<String>>,
    block: Option<HashSet<String>>,
    switches: HashSet<String>,
}

impl FilterOptions {
    /// Keep only the listed options.
    #[must_use]
    pub fn allow<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: Some(options.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Drop the listed options.
    #[must_use]
    pub fn block<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            block: Some(options.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Mark options that never consume the following token as a value.
    #[must_use]
    pub fn with_switches<I, S>(mut self, switches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.switches.extend(switches.into_iter().map(Into::into));
        self
    }

    fn is_invalid(&self, option: &str) -> bool {
        self.allow.as_ref().is_some_and(|allow| !allow.contains(option))
            || self.block.as_ref().is_some_and(|block| block.contains(option))
    }
}

/// Result of [`filter_args`]; both lists keep the input's relative order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredArgs {
    /// Tokens that passed the filter.
    pub filtered: Vec<String>,
    /// Rejected options and the values they consumed.
    pub unknown: Vec<String>,
}

/// Split `argv` into accepted and rejected tokens.
///
/// An option written as `--name=value` is checked by its name. A rejected
/// option written without `=` also takes the next token with it, unless that
/// token is itself an option.
///
/// ```
/// use toolrig_core::args::{FilterOptions, filter_args};
///
/// let argv: Vec<String> = ["--foo", "123", "--bar=456", "-w"].map(String::from).to_vec();
/// let result = filter_args(&argv, &FilterOptions::allow(["-w"]));
///
/// assert_eq!(result.filtered, ["-w"]);
/// assert_eq!(result.unknown, ["--foo", "123", "--bar=456"]);
/// ```
#[must_use]
pub fn filter_args(argv: &[String], options: &FilterOptions) -> FilteredArgs {
    let mut result = FilteredArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = &argv[i];
        i += 1;

        if !arg.starts_with('-') {
            result.filtered.push(arg.clone());
            continue;
        }

        let (name, inline_value) = match arg.split_once('=') {
            Some((name, _)) => (name, true),
            None => (arg.as_str(), false),
        };

        if !options.is_invalid(name) {
            result.filtered.push(arg.clone());
            continue;
        }

        result.unknown.push(arg.clone());
        if !inline_value
            && !options.switches.contains(name)
            && let Some(value) = argv.get(i)
            && !value.starts_with('-')
        {
            result.unknown.push(value.clone());
            i += 1;
        }
    }

    result
}

/// Remove toolrig's own options from an argv before forwarding it.
#[must_use]
pub fn strip_orchestrator_options(argv: &[String]) -> FilteredArgs {
    filter_args(
        argv,
        &FilterOptions::block(ORCHESTRATOR_OPTIONS.iter().copied())
            .with_switches(ORCHESTRATOR_SWITCHES.iter().copied()),
    )
}

/// Split a `--parallel` value into argv tokens using POSIX shell rules.
///
/// # Errors
///
/// Returns a configuration error for unbalanced quotes.
pub fn split_parallel(value: &str) -> Result<Vec<String>> {
    shlex::split(value).ok_or_else(|| {
        Error::configuration(format!("Cannot split --parallel value `{value}`: unbalanced quotes"))
    })
}

/// A parsed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// `--flag` or `--no-flag`.
    Flag(bool),
    /// `--name value` or `--name=value`.
    Value(String),
    /// An option given more than once.
    List(Vec<String>),
}

impl ArgValue {
    /// Whether the option is enabled.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Flag(on) => *on,
            Self::Value(v) => !matches!(v.as_str(), "false" | "0" | ""),
            Self::List(values) => !values.is_empty(),
        }
    }

    /// The last string value, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Flag(_) => None,
            Self::Value(v) => Some(v),
            Self::List(values) => values.last().map(String::as_str),
        }
    }

    /// Every string value.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Flag(_) => vec![],
            Self::Value(v) => vec![v.clone()],
            Self::List(values) => values.clone(),
        }
    }

    fn push(&mut self, value: String) {
        *self = match std::mem::replace(self, Self::Flag(false)) {
            Self::Flag(_) => Self::Value(value),
            Self::Value(first) => Self::List(vec![first, value]),
            Self::List(mut values) => {
                values.push(value);
                Self::List(values)
            }
        };
    }
}

/// Option/positional view of an argv.
///
/// Keys are stored without leading dashes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    /// Options by name.
    pub options: BTreeMap<String, ArgValue>,
    /// Tokens that are not options or option values.
    pub positionals: Vec<String>,
}

impl ParsedArgs {
    /// Parse an argv where any option may take a value.
    #[must_use]
    pub fn parse(argv: &[String]) -> Self {
        Self::parse_with_switches(argv, &[])
    }

    /// Parse an argv; options listed in `switches` never consume a value.
    #[must_use]
    pub fn parse_with_switches(argv: &[String], switches: &[&str]) -> Self {
        let mut parsed = Self::default();
        let mut i = 0;

        while i < argv.len() {
            let arg = &argv[i];
            i += 1;

            if arg == "--" {
                parsed.positionals.extend(argv[i..].iter().cloned());
                break;
            }

            if let Some(long) = arg.strip_prefix("--") {
                if let Some((name, value)) = long.split_once('=') {
                    parsed.insert_value(name, value.to_string());
                } else if let Some(negated) = long.strip_prefix("no-") {
                    parsed.options.insert(negated.to_string(), ArgValue::Flag(false));
                } else if !switches.contains(&arg.as_str())
                    && let Some(value) = argv.get(i).filter(|v| !v.starts_with('-'))
                {
                    parsed.insert_value(long, value.clone());
                    i += 1;
                } else {
                    parsed.options.insert(long.to_string(), ArgValue::Flag(true));
                }
                continue;
            }

            match arg.strip_prefix('-') {
                Some(short) if short.chars().count() == 1 => {
                    if !switches.contains(&arg.as_str())
                        && let Some(value) = argv.get(i).filter(|v| !v.starts_with('-'))
                    {
                        parsed.insert_value(short, value.clone());
                        i += 1;
                    } else {
                        parsed.options.insert(short.to_string(), ArgValue::Flag(true));
                    }
                }
                Some(group) if !group.is_empty() => {
                    for c in group.chars() {
                        parsed.options.insert(c.to_string(), ArgValue::Flag(true));
                    }
                }
                _ => parsed.positionals.push(arg.clone()),
            }
        }

        parsed
    }

    fn insert_value(&mut self, name: &str, value: String) {
        match self.options.get_mut(name) {
            Some(existing) => existing.push(value),
            None => {
                self.options.insert(name.to_string(), ArgValue::Value(value));
            }
        }
    }

    /// Look up an option by name, with or without leading dashes.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.options.get(name.trim_start_matches('-'))
    }

    /// Whether an option is present and enabled.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.get(name).is_some_and(ArgValue::is_truthy)
    }

    /// Merge `other` without overwriting anything already set.
    pub fn merge(&mut self, other: Self) {
        for (key, value) in other.options {
            self.options.entry(key).or_insert(value);
        }
        for positional in other.positionals {
            if !self.positionals.contains(&positional) {
                self.positionals.push(positional);
            }
        }
    }
}
