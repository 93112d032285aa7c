//! # Route Matching
//!
//! URL templates with `{name}` placeholders, compiled once into matchers
//! that capture named path parameters. The table matches concrete URLs in
//! registration order.
//!
//! # Ordering Contract
//! Matching is first-match over registration order. Callers must register
//! more specific templates before more general ones sharing a prefix; the
//! table performs no specificity ranking of its own.

use std::collections::HashMap;

use regex::Regex;

/// A successful match: the extracted path parameters and the canonical
/// template that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub parameters: HashMap<String, String>,
    pub template: String,
}

/// A single compiled URL template.
///
/// Compilation is deterministic and total: every literal span is escaped and
/// every `{name}` placeholder becomes a named single-segment capture, so any
/// template string compiles.
#[derive(Debug)]
struct RoutePattern {
    template: String,
    matcher: Regex,
    names: Vec<String>,
}

impl RoutePattern {
    fn compile(template: &str) -> Self {
        let mut pattern = String::from("^");
        let mut names = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let (literal, tail) = rest.split_at(open);
            pattern.push_str(&regex::escape(literal));
            match tail[1..].find('}') {
                Some(close) => {
                    let name = &tail[1..1 + close];
                    // Group indices stay stable even for repeated names.
                    pattern.push_str(&format!("(?P<p{}>[^/]+)", names.len()));
                    names.push(name.to_string());
                    rest = &tail[close + 2..];
                }
                None => {
                    // Unterminated brace: treat the remainder as a literal.
                    pattern.push_str(&regex::escape(tail));
                    rest = "";
                }
            }
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');
        // The pattern is built from escaped literals and fixed group syntax
        // only, so compilation cannot fail.
        let matcher = Regex::new(&pattern).unwrap_or_else(|_| Regex::new("^$").unwrap());
        Self {
            template: template.to_string(),
            matcher,
            names,
        }
    }

    fn matches(&self, url: &str) -> Option<RouteMatch> {
        let captures = self.matcher.captures(url)?;
        let mut parameters = HashMap::new();
        for (i, name) in self.names.iter().enumerate() {
            if let Some(m) = captures.name(&format!("p{i}")) {
                parameters.insert(name.clone(), m.as_str().to_string());
            }
        }
        Some(RouteMatch {
            parameters,
            template: self.template.clone(),
        })
    }
}

/// An ordered table of compiled templates, each bound to a value.
#[derive(Debug, Default)]
pub struct RouteTable<T> {
    routes: Vec<(RoutePattern, T)>,
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers a template. Registration order is match order.
    pub fn connect(&mut self, template: &str, value: T) {
        self.routes.push((RoutePattern::compile(template), value));
    }

    /// Returns the first matching route and its bound value.
    pub fn matches(&self, url: &str) -> Option<(RouteMatch, &T)> {
        self.routes
            .iter()
            .find_map(|(pattern, value)| pattern.matches(url).map(|m| (m, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
