//! Sort keys, comparison and the column toggle state machine

use super::column::{SortDirection, SortSpec, SortType, Sorter, Strategy};
use crate::text_format::strip_markup;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::LazyLock;

/// Numbers inside free text. A leading minus only counts when it does not
/// follow a digit, so ranges like `2-3` yield two positive numbers.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9.])(-?[0-9]+(?:\.[0-9]+)?)|([0-9]+(?:\.[0-9]+)?)")
        .expect("valid number pattern")
});

/// Keys recognized as an author-supplied sort override on an object cell
const OVERRIDE_KEYS: &[&str] = &["sortValue", "sort_value", "sort"];

/// The sortable value of one cell
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    Text(String),
    /// No usable value; ordered after everything else in both directions
    Missing,
}

impl SortKey {
    /// Value for a `data-sort-value` attribute
    pub fn attribute_value(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(format_number(*n)),
            Self::Text(text) => Some(text.clone()),
            Self::Missing => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// The author-supplied sort override of a cell, if any
pub fn sort_override(cell: &Value) -> Option<&Value> {
    let Value::Object(object) = cell else {
        return None;
    };
    OVERRIDE_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .filter(|value| !value.is_null())
}

/// Textual content of a cell
///
/// Lists and objects are searched recursively; markup contributes its
/// rendered text.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(object) => {
            if let Some(html) = object.get("html").and_then(Value::as_str) {
                strip_markup(html)
            } else if let Some(inner) = object.get("text").or_else(|| object.get("value")) {
                cell_text(inner)
            } else if let Some(items) = object.get("items") {
                cell_text(items)
            } else {
                String::new()
            }
        }
    }
}

/// Every number found in a cell, in document order
pub fn numbers_in(cell: &Value) -> Vec<f64> {
    let mut out = Vec::new();
    collect_numbers(cell, &mut out);
    out
}

fn collect_numbers(cell: &Value, out: &mut Vec<f64>) {
    match cell {
        Value::Number(n) => out.extend(n.as_f64()),
        Value::Array(items) => {
            for item in items {
                collect_numbers(item, out);
            }
        }
        Value::Object(_) => out.extend(numbers_in_text(&cell_text(cell))),
        Value::String(s) => out.extend(numbers_in_text(s)),
        Value::Null | Value::Bool(_) => {}
    }
}

/// Every numeric substring of `text`
pub fn numbers_in_text(text: &str) -> Vec<f64> {
    NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}

/// Reduce several numbers to one
pub fn reduce(numbers: &[f64], strategy: Strategy) -> Option<f64> {
    let finite = numbers.iter().copied().filter(|n| n.is_finite());
    match strategy {
        Strategy::First => finite.into_iter().next(),
        Strategy::Min => finite.reduce(f64::min),
        Strategy::Max => finite.reduce(f64::max),
        Strategy::Sum => {
            let values: Vec<f64> = finite.collect();
            (!values.is_empty()).then(|| values.iter().sum())
        }
    }
}

/// Derive the sort key of one cell
///
/// Priority: an explicit override on the cell, then numbers found in the
/// content (number columns), then trimmed text (text columns).
pub fn sort_key(cell: Option<&Value>, spec: &SortSpec) -> SortKey {
    let Some(cell) = cell else {
        return SortKey::Missing;
    };

    if let Some(explicit) = sort_override(cell) {
        return key_from_value(explicit, spec);
    }

    key_from_value(cell, spec)
}

fn key_from_value(value: &Value, spec: &SortSpec) -> SortKey {
    match spec.kind {
        SortType::Number => reduce(&numbers_in(value), spec.strategy)
            .map(SortKey::Number)
            .unwrap_or(SortKey::Missing),
        SortType::Text => {
            let text = cell_text(value);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                SortKey::Missing
            } else {
                SortKey::Text(trimmed.to_string())
            }
        }
    }
}

/// Case-insensitive comparison that orders embedded digit runs numerically
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let ordering = compare_digit_runs(&l_run, &r_run);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }

    // Equal ignoring case: fall back to a deterministic case-sensitive order
    a.cmp(b)
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Compare two keys for the given direction
///
/// Missing keys sort last whichever way the column is ordered.
pub fn compare_keys(a: &SortKey, b: &SortKey, direction: SortDirection, sorter: Sorter) -> Ordering {
    let ordering = match (a, b) {
        (SortKey::Missing, SortKey::Missing) => return Ordering::Equal,
        (SortKey::Missing, _) => return Ordering::Greater,
        (_, SortKey::Missing) => return Ordering::Less,
        (SortKey::Number(x), SortKey::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (SortKey::Text(x), SortKey::Text(y)) => match sorter {
            Sorter::Natural => natural_cmp(x, y),
            Sorter::Plain => x.cmp(y),
        },
        // Mixed keys only arise from overrides; numbers first
        (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
        (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
    };
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Stable ordering of row indices by key
///
/// Equal keys keep their original relative order in both directions.
pub fn sorted_order(keys: &[SortKey], direction: SortDirection, sorter: Sorter) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| {
        compare_keys(&keys[a], &keys[b], direction, sorter).then_with(|| a.cmp(&b))
    });
    order
}

/// Which column is active and in which direction
///
/// At most one column is active. Re-activating the active column flips the
/// direction; activating another column starts at that column's initial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    active: Option<(usize, SortDirection)>,
}

impl SortState {
    /// The active column and its direction
    pub fn active(&self) -> Option<(usize, SortDirection)> {
        self.active
    }

    /// Activate `column`, returning the direction to sort in
    pub fn activate(&mut self, column: usize, initial_order: SortDirection) -> SortDirection {
        let direction = match self.active {
            Some((current, direction)) if current == column => direction.toggled(),
            _ => initial_order,
        };
        self.active = Some((column, direction));
        direction
    }

    /// Forget the active column
    pub fn clear(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number_spec(strategy: Strategy) -> SortSpec {
        SortSpec {
            kind: SortType::Number,
            strategy,
            ..Default::default()
        }
    }

    #[test]
    fn test_numeric_strategies() {
        let cell = json!("3 hits, 120 dmg, 45 extra");
        assert_eq!(sort_key(Some(&cell), &number_spec(Strategy::Max)), SortKey::Number(120.0));
        assert_eq!(sort_key(Some(&cell), &number_spec(Strategy::Sum)), SortKey::Number(168.0));
        assert_eq!(sort_key(Some(&cell), &number_spec(Strategy::First)), SortKey::Number(3.0));
        assert_eq!(sort_key(Some(&cell), &number_spec(Strategy::Min)), SortKey::Number(3.0));
    }

    #[test]
    fn test_numbers_in_text() {
        assert_eq!(numbers_in_text("-5 then 2-3, 1.5x"), vec![-5.0, 2.0, 3.0, 1.5]);
        assert!(numbers_in_text("none").is_empty());
    }

    #[test]
    fn test_numbers_recurse_into_lists_and_markup() {
        let cell = json!([10, "5 and 7", { "html": "<b>30</b>" }, { "text": "2" }]);
        assert_eq!(numbers_in(&cell), vec![10.0, 5.0, 7.0, 30.0, 2.0]);
        assert_eq!(
            sort_key(Some(&cell), &number_spec(Strategy::Max)),
            SortKey::Number(30.0)
        );
    }

    #[test]
    fn test_override_takes_priority() {
        let cell = json!({ "text": "about 900", "sortValue": 12 });
        assert_eq!(
            sort_key(Some(&cell), &number_spec(Strategy::First)),
            SortKey::Number(12.0)
        );
        let text_cell = json!({ "text": "Zed", "sort_value": "Alpha" });
        assert_eq!(
            sort_key(Some(&text_cell), &SortSpec::default()),
            SortKey::Text("Alpha".to_string())
        );
    }

    #[test]
    fn test_missing_values() {
        let spec = number_spec(Strategy::First);
        assert_eq!(sort_key(None, &spec), SortKey::Missing);
        assert_eq!(sort_key(Some(&json!("n/a")), &spec), SortKey::Missing);
        assert_eq!(sort_key(Some(&json!("   ")), &SortSpec::default()), SortKey::Missing);
    }

    #[test]
    fn test_text_key_is_trimmed() {
        assert_eq!(
            sort_key(Some(&json!("  Combo X ")), &SortSpec::default()),
            SortKey::Text("Combo X".to_string())
        );
    }

    #[test]
    fn test_missing_sorts_last_in_both_directions() {
        let keys = vec![SortKey::Missing, SortKey::Number(2.0), SortKey::Number(1.0)];
        assert_eq!(
            sorted_order(&keys, SortDirection::Ascending, Sorter::Natural),
            vec![2, 1, 0]
        );
        assert_eq!(
            sorted_order(&keys, SortDirection::Descending, Sorter::Natural),
            vec![1, 2, 0]
        );
    }

    #[test]
    fn test_sort_is_stable() {
        let keys = vec![
            SortKey::Number(1.0),
            SortKey::Number(1.0),
            SortKey::Number(0.0),
        ];
        assert_eq!(
            sorted_order(&keys, SortDirection::Ascending, Sorter::Natural),
            vec![2, 0, 1]
        );
        assert_eq!(
            sorted_order(&keys, SortDirection::Descending, Sorter::Natural),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("item 2", "item 10"), Ordering::Less);
        assert_eq!(natural_cmp("alpha", "Beta"), Ordering::Less);
        assert_eq!(natural_cmp("a", "a1"), Ordering::Less);
        assert_eq!(natural_cmp("x007", "x7"), Ordering::Greater);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_plain_sorter_is_case_sensitive() {
        let keys = vec![SortKey::Text("b".to_string()), SortKey::Text("B".to_string())];
        assert_eq!(
            sorted_order(&keys, SortDirection::Ascending, Sorter::Plain),
            vec![1, 0]
        );
    }

    #[test]
    fn test_sort_state_toggles_and_resets() {
        let mut state = SortState::default();
        assert_eq!(state.activate(1, SortDirection::Ascending), SortDirection::Ascending);
        assert_eq!(state.activate(1, SortDirection::Ascending), SortDirection::Descending);
        assert_eq!(state.activate(1, SortDirection::Ascending), SortDirection::Ascending);

        // Switching columns starts at that column's initial order
        assert_eq!(state.activate(2, SortDirection::Descending), SortDirection::Descending);
        assert_eq!(state.active(), Some((2, SortDirection::Descending)));

        // And coming back resets column 1 as well
        assert_eq!(state.activate(1, SortDirection::Ascending), SortDirection::Ascending);
    }
}
