//! Selector-cascade extraction engine
//!
//! Scraped forecast pages drift: class names change, icons lose their `alt`,
//! numbers move in and out of nested spans. Adapters therefore describe each
//! logical field as an ordered list of [`Rule`]s. [`extract`] evaluates the
//! rules in order and returns the first non-empty value; later rules are never
//! evaluated. [`extract_rows`] is the tabular companion used to read hourly
//! tables row by row.

use regex::Regex;
use scraper::{ElementRef, Selector};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use crate::Result;
use crate::error::MeteoError;

type CustomFn = dyn Fn(ElementRef<'_>) -> Option<String> + Send + Sync;

/// Where a [`Rule::Regex`] reads the text it post-processes from
#[derive(Debug, Clone)]
pub enum RegexSource {
    Text(Selector),
    Attribute(Selector, String),
}

/// One typed extraction attempt
#[derive(Clone)]
pub enum Rule {
    /// Whitespace-collapsed text content of the first matching element
    Text { selector: Selector },
    /// Attribute value of the first matching element carrying it
    Attribute { selector: Selector, attribute: String },
    /// Post-process a text or attribute value: capture group 1, or the whole match
    Regex { source: RegexSource, pattern: Regex },
    /// Computed value from the node itself
    Custom(Arc<CustomFn>),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Text { .. } => f.write_str("Rule::Text"),
            Rule::Attribute { attribute, .. } => write!(f, "Rule::Attribute({attribute})"),
            Rule::Regex { pattern, .. } => write!(f, "Rule::Regex({})", pattern.as_str()),
            Rule::Custom(_) => f.write_str("Rule::Custom"),
        }
    }
}

/// Compile a CSS selector, turning parse failures into configuration errors
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| MeteoError::config(format!("Invalid selector '{css}': {e}")))
}

impl Rule {
    pub fn text(css: &str) -> Result<Self> {
        Ok(Rule::Text {
            selector: selector(css)?,
        })
    }

    pub fn attr(css: &str, attribute: &str) -> Result<Self> {
        Ok(Rule::Attribute {
            selector: selector(css)?,
            attribute: attribute.to_string(),
        })
    }

    pub fn text_regex(css: &str, pattern: &str) -> Result<Self> {
        Ok(Rule::Regex {
            source: RegexSource::Text(selector(css)?),
            pattern: compile(pattern)?,
        })
    }

    pub fn attr_regex(css: &str, attribute: &str, pattern: &str) -> Result<Self> {
        Ok(Rule::Regex {
            source: RegexSource::Attribute(selector(css)?, attribute.to_string()),
            pattern: compile(pattern)?,
        })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(ElementRef<'_>) -> Option<String> + Send + Sync + 'static,
    {
        Rule::Custom(Arc::new(f))
    }

    /// Evaluate this rule alone against `node`
    #[must_use]
    pub fn apply(&self, node: ElementRef<'_>) -> Option<String> {
        let value = match self {
            Rule::Text { selector } => first_text(node, selector),
            Rule::Attribute {
                selector,
                attribute,
            } => first_attr(node, selector, attribute),
            Rule::Regex { source, pattern } => {
                let raw = match source {
                    RegexSource::Text(selector) => first_text(node, selector),
                    RegexSource::Attribute(selector, attribute) => {
                        first_attr(node, selector, attribute)
                    }
                }?;
                pattern.captures(&raw).and_then(|caps| {
                    caps.get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| collapse_whitespace(m.as_str()))
                })
            }
            Rule::Custom(f) => f(node).map(|v| collapse_whitespace(&v)),
        };
        value.filter(|v| !v.is_empty())
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MeteoError::config(format!("Invalid pattern '{pattern}': {e}")))
}

/// Collapse runs of whitespace (including NBSP) into single spaces and trim
#[must_use]
pub fn collapse_whitespace(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of an element with whitespace collapsed
///
/// Text nodes are joined with a space so sibling tags never glue words
/// together ("18°" + "Sereno").
#[must_use]
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn matches_self(node: ElementRef<'_>, selector: &Selector) -> bool {
    selector.matches(&node)
}

fn candidates<'a, 'b>(
    node: ElementRef<'a>,
    selector: &'b Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'b
where
    'a: 'b,
{
    // `select` only walks descendants; cells handed to a cascade are often the
    // element the rule targets, so the node itself is tried first.
    let own = matches_self(node, selector).then_some(node);
    own.into_iter().chain(node.select(selector))
}

fn first_text(node: ElementRef<'_>, selector: &Selector) -> Option<String> {
    candidates(node, selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn first_attr(node: ElementRef<'_>, selector: &Selector, attribute: &str) -> Option<String> {
    candidates(node, selector)
        .filter_map(|el| el.value().attr(attribute))
        .map(collapse_whitespace)
        .find(|value| !value.is_empty())
}

/// Evaluate `rules` in order and return the first non-empty result
#[must_use]
pub fn extract(node: ElementRef<'_>, rules: &[Rule]) -> Option<String> {
    for (index, rule) in rules.iter().enumerate() {
        if let Some(value) = rule.apply(node) {
            trace!("rule #{index} ({rule:?}) matched: {value}");
            return Some(value);
        }
    }
    None
}

/// First element matching any of `selectors`, tried in order
///
/// Used to find the container (summary card, hourly table) a page keeps its
/// data in when the markup has moved between releases.
#[must_use]
pub fn locate<'a>(root: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|selector| candidates(root, selector).next())
}

/// Compile a list of selectors
pub fn selectors(css: &[&str]) -> Result<Vec<Selector>> {
    css.iter().map(|c| selector(c)).collect()
}

/// One body row of a table, cells in document order
#[derive(Debug, Clone)]
pub struct Row<'a> {
    pub cells: Vec<ElementRef<'a>>,
}

impl<'a> Row<'a> {
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<ElementRef<'a>> {
        self.cells.get(index).copied()
    }

    /// Run a cascade against the cell at `index`
    #[must_use]
    pub fn extract(&self, index: usize, rules: &[Rule]) -> Option<String> {
        self.cell(index).and_then(|cell| extract(cell, rules))
    }

    /// Collapsed text of every cell joined, used for keyword scans
    #[must_use]
    pub fn text(&self) -> String {
        collapse_whitespace(
            &self
                .cells
                .iter()
                .map(|c| element_text(*c))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

/// Rows owned by `table` itself, directly or through its `thead`, `tbody`
/// and `tfoot` sections; rows of nested tables are not included
fn direct_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .flat_map(|child| match child.value().name() {
            "tr" => vec![child],
            "thead" | "tbody" | "tfoot" => child
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| el.value().name() == "tr")
                .collect(),
            _ => Vec::new(),
        })
}

/// Read the body rows of `table`
///
/// The first `skip_header_rows` rows are skipped and rows with fewer than
/// `min_columns` cells are rejected.
pub fn extract_rows<'a>(
    table: ElementRef<'a>,
    min_columns: usize,
    skip_header_rows: usize,
) -> Result<Vec<Row<'a>>> {
    let cell = selector("td, th")?;
    let mut rows = Vec::new();
    for (index, tr_el) in direct_rows(table).enumerate().skip(skip_header_rows) {
        let cells: Vec<ElementRef<'a>> = tr_el
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| cell.matches(el))
            .collect();
        if cells.len() < min_columns {
            trace!(
                "rejecting row #{index}: {} cells, need {min_columns}",
                cells.len()
            );
            continue;
        }
        rows.push(Row { cells });
    }
    Ok(rows)
}
