//! Line tokenizer for device configuration text.
//!
//! Produces logical lines tagged with their indentation depth. Blank lines and
//! `!` comment lines are skipped; physical lines that continue a previous
//! command (for example `switchport trunk allowed vlan add 40`) are joined
//! onto it according to the continuation rules a grammar declares.

use regex::Regex;
use std::str::Lines;

/// One logical configuration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based number of the first physical line.
    pub number: usize,
    /// Count of leading whitespace characters.
    pub indent: usize,
    /// Content with surrounding whitespace removed.
    pub text: String,
}

impl Line {
    pub fn is_top_level(&self) -> bool {
        self.indent == 0
    }
}

/// Joins a physical line onto the preceding logical line.
#[derive(Debug, Clone)]
pub struct Continuation {
    /// Matched against the trimmed physical line; must capture `rest`.
    pattern: Regex,
    /// The preceding logical line must match this, when set.
    follows: Option<Regex>,
    /// Minimum indentation of the continuing physical line.
    min_indent: usize,
    separator: &'static str,
}

impl Continuation {
    pub fn new(pattern: Regex, separator: &'static str) -> Self {
        Self {
            pattern,
            follows: None,
            min_indent: 0,
            separator,
        }
    }

    pub fn after(mut self, follows: Regex) -> Self {
        self.follows = Some(follows);
        self
    }

    pub fn min_indent(mut self, indent: usize) -> Self {
        self.min_indent = indent;
        self
    }

    fn join<'t>(&self, previous: &Line, candidate: &'t Line) -> Option<&'t str> {
        if candidate.indent < self.min_indent {
            return None;
        }
        if let Some(follows) = &self.follows {
            if !follows.is_match(&previous.text) {
                return None;
            }
        }
        self.pattern
            .captures(&candidate.text)
            .and_then(|caps| caps.name("rest"))
            .map(|rest| rest.as_str())
    }
}

/// Lazy iterator over logical lines. Cloning it restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    raw: std::iter::Enumerate<Lines<'a>>,
    continuations: &'a [Continuation],
    pending: Option<Line>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str, continuations: &'a [Continuation]) -> Self {
        Self {
            raw: text.lines().enumerate(),
            continuations,
            pending: None,
        }
    }

    fn next_physical(&mut self) -> Option<Line> {
        for (index, raw) in self.raw.by_ref() {
            let text = raw.trim();
            if text.is_empty() || text.starts_with('!') {
                continue;
            }
            let indent = raw.len() - raw.trim_start().len();
            return Some(Line {
                number: index + 1,
                indent,
                text: text.to_string(),
            });
        }
        None
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Line;

    fn next(&mut self) -> Option<Line> {
        loop {
            let Some(line) = self.next_physical() else {
                return self.pending.take();
            };

            if let Some(previous) = self.pending.as_mut() {
                let joined = self.continuations.iter().find_map(|rule| {
                    rule.join(previous, &line)
                        .map(|rest| (rule.separator, rest.to_string()))
                });
                if let Some((separator, rest)) = joined {
                    previous.text.push_str(separator);
                    previous.text.push_str(&rest);
                    continue;
                }
            }

            if let Some(previous) = self.pending.replace(line) {
                return Some(previous);
            }
        }
    }
}

/// Tokenize `text` with no continuation rules.
pub fn tokenize(text: &str) -> Tokenizer<'_> {
    Tokenizer::new(text, &[])
}
