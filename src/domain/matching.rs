//! Pure trajectory-matching algorithms.
//!
//! Everything in this module is a pure function of `(expected, actual,
//! options)`: no side effects, no clocks, no errors. Malformed input (an
//! empty expected list) degrades to a perfect score -- there is nothing to
//! check.
//!
//! Two matchers exist:
//!
//! - [`match_steps`] compares whole step sequences under three ordering
//!   semantics ([`MatchMode`]).
//! - [`match_tool_calls`] compares tool invocations only, with optional
//!   argument constraints and numeric tolerance. Its ordered form is a
//!   **prefix** match: the first divergence stops forward matching, which is
//!   what makes early wrong-tool detection possible.
//!
//! Score arithmetic lives on the report types so scorers share one formula:
//! `matched_required / total_required`, minus `extra * penalize_extra`,
//! clamped to `[0, 1]`. The clamp here is the one place in the engine where
//! clamping (rather than validation) is intentional.

use serde_json::{Map, Value};

use crate::domain::models::expectation::{ExpectedStep, ExpectedToolCall, MatchMode};
use crate::domain::models::trajectory::TrajectoryStep;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One matched pair of expected/actual indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedPair {
    /// Index into the expected sequence.
    pub expected_index: usize,
    /// Index into the actual sequence.
    pub actual_index: usize,
}

/// Result of matching an actual step sequence against an expected one.
#[derive(Debug, Clone, Default)]
pub struct StepMatchReport {
    /// Matched expected/actual index pairs, in expected order.
    pub matched: Vec<MatchedPair>,
    /// Indices of required expected items that went unmatched.
    pub missing: Vec<usize>,
    /// Indices of actual items no expected item claimed.
    pub extra: Vec<usize>,
    /// Count of matched items that were required.
    pub matched_required: usize,
    /// Count of required expected items.
    pub total_required: usize,
}

impl StepMatchReport {
    /// Ratio of matched required items, 1.0 when nothing was required.
    pub fn base_score(&self) -> f64 {
        if self.total_required == 0 {
            1.0
        } else {
            self.matched_required as f64 / self.total_required as f64
        }
    }

    /// Base score minus the extra-step penalty, clamped to `[0, 1]`.
    pub fn score(&self, penalize_extra: f64) -> f64 {
        (self.base_score() - self.extra.len() as f64 * penalize_extra).clamp(0.0, 1.0)
    }

    /// Whether every required expected item was matched.
    pub fn all_required_matched(&self) -> bool {
        self.matched_required == self.total_required
    }
}

/// Result of matching actual tool calls against expected tool calls.
#[derive(Debug, Clone, Default)]
pub struct ToolMatchReport {
    /// Matched expected/actual index pairs, in expected order.
    pub matched: Vec<MatchedPair>,
    /// Indices of required expected calls that went unmatched.
    pub missing: Vec<usize>,
    /// Indices of actual calls no expected call claimed.
    pub extra: Vec<usize>,
    /// Count of matched calls that were required.
    pub matched_required: usize,
    /// Count of required expected calls.
    pub total_required: usize,
    /// In ordered (prefix) mode, the actual index where the sequence first
    /// diverged from the expectation. `None` when the prefix is consistent.
    pub diverged_at: Option<usize>,
}

impl ToolMatchReport {
    /// Ratio of matched required calls, 1.0 when nothing was required.
    pub fn base_score(&self) -> f64 {
        if self.total_required == 0 {
            1.0
        } else {
            self.matched_required as f64 / self.total_required as f64
        }
    }

    /// Whether every required expected call was matched.
    pub fn all_required_matched(&self) -> bool {
        self.matched_required == self.total_required
    }
}

/// Options for tool-call matching.
#[derive(Debug, Clone, Copy)]
pub struct ToolMatchOptions {
    /// Prefix matching (ordered) vs. greedy order-free matching.
    pub ordered: bool,
    /// When > 0, numeric argument values compare with `|a - b| <= tolerance`
    /// instead of exact equality.
    pub numeric_tolerance: f64,
}

impl Default for ToolMatchOptions {
    fn default() -> Self {
        Self {
            ordered: true,
            numeric_tolerance: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Step matching
// ---------------------------------------------------------------------------

/// Match an actual step sequence against an expected specification.
///
/// See [`MatchMode`] for the three ordering semantics. For `Exact` mode with
/// mismatched lengths, each element is accounted exactly once: positions up
/// to the shorter length compare one-to-one, then the longer tail is counted
/// as extra (actual) or missing (required expected) -- never both.
pub fn match_steps(
    expected: &[ExpectedStep],
    actual: &[TrajectoryStep],
    mode: MatchMode,
) -> StepMatchReport {
    match mode {
        MatchMode::Exact => match_steps_exact(expected, actual),
        MatchMode::Subset => match_steps_subset(expected, actual),
        MatchMode::OrderedSubset => match_steps_ordered_subset(expected, actual),
    }
}

fn match_steps_exact(expected: &[ExpectedStep], actual: &[TrajectoryStep]) -> StepMatchReport {
    let mut report = StepMatchReport {
        total_required: count_required_steps(expected),
        ..Default::default()
    };

    let overlap = expected.len().min(actual.len());
    for i in 0..overlap {
        if expected[i].matches(&actual[i]) {
            report.matched.push(MatchedPair {
                expected_index: i,
                actual_index: i,
            });
            if expected[i].required {
                report.matched_required += 1;
            }
        } else {
            report.extra.push(i);
            if expected[i].required {
                report.missing.push(i);
            }
        }
    }

    for i in overlap..actual.len() {
        report.extra.push(i);
    }
    for (i, step) in expected.iter().enumerate().skip(overlap) {
        if step.required {
            report.missing.push(i);
        }
    }

    report
}

fn match_steps_subset(expected: &[ExpectedStep], actual: &[TrajectoryStep]) -> StepMatchReport {
    let mut report = StepMatchReport {
        total_required: count_required_steps(expected),
        ..Default::default()
    };
    let mut claimed = vec![false; actual.len()];

    for (ei, exp) in expected.iter().enumerate() {
        let found = actual
            .iter()
            .enumerate()
            .find(|(ai, step)| !claimed[*ai] && exp.matches(step))
            .map(|(ai, _)| ai);

        match found {
            Some(ai) => {
                claimed[ai] = true;
                report.matched.push(MatchedPair {
                    expected_index: ei,
                    actual_index: ai,
                });
                if exp.required {
                    report.matched_required += 1;
                }
            }
            None => {
                if exp.required {
                    report.missing.push(ei);
                }
            }
        }
    }

    collect_unclaimed(&claimed, &mut report.extra);
    report
}

fn match_steps_ordered_subset(
    expected: &[ExpectedStep],
    actual: &[TrajectoryStep],
) -> StepMatchReport {
    let mut report = StepMatchReport {
        total_required: count_required_steps(expected),
        ..Default::default()
    };
    let mut claimed = vec![false; actual.len()];

    // The cursor only ever moves forward; once an expected item matches at
    // index i, nothing before i+1 can match a later expected item.
    let mut cursor = 0;
    for (ei, exp) in expected.iter().enumerate() {
        let found = (cursor..actual.len()).find(|&ai| exp.matches(&actual[ai]));

        match found {
            Some(ai) => {
                claimed[ai] = true;
                cursor = ai + 1;
                report.matched.push(MatchedPair {
                    expected_index: ei,
                    actual_index: ai,
                });
                if exp.required {
                    report.matched_required += 1;
                }
            }
            None => {
                // An unmatched expectation does not advance the cursor: a
                // later expected item may still match at the current position.
                if exp.required {
                    report.missing.push(ei);
                }
            }
        }
    }

    collect_unclaimed(&claimed, &mut report.extra);
    report
}

fn count_required_steps(expected: &[ExpectedStep]) -> usize {
    expected.iter().filter(|e| e.required).count()
}

fn collect_unclaimed(claimed: &[bool], extra: &mut Vec<usize>) {
    for (i, taken) in claimed.iter().enumerate() {
        if !taken {
            extra.push(i);
        }
    }
}

// ---------------------------------------------------------------------------
// Tool-call matching
// ---------------------------------------------------------------------------

/// Match actual tool invocations against expected tool calls.
///
/// `actual` should contain only tool steps (see
/// [`Trajectory::tool_calls`](crate::domain::models::Trajectory::tool_calls)).
///
/// Ordered mode is a prefix match: position `i` of the actual sequence must
/// satisfy position `i` of the expectation. The first divergence is recorded
/// in [`ToolMatchReport::diverged_at`] and stops forward matching; every
/// later actual call is extra and every later required expectation is
/// missing. No call after the divergence can retroactively match an earlier
/// expected position.
pub fn match_tool_calls(
    expected: &[ExpectedToolCall],
    actual: &[&TrajectoryStep],
    options: &ToolMatchOptions,
) -> ToolMatchReport {
    if options.ordered {
        match_tool_calls_prefix(expected, actual, options.numeric_tolerance)
    } else {
        match_tool_calls_unordered(expected, actual, options.numeric_tolerance)
    }
}

fn match_tool_calls_prefix(
    expected: &[ExpectedToolCall],
    actual: &[&TrajectoryStep],
    tolerance: f64,
) -> ToolMatchReport {
    let mut report = ToolMatchReport {
        total_required: count_required_calls(expected),
        ..Default::default()
    };

    let overlap = expected.len().min(actual.len());
    let mut aligned = 0;
    while aligned < overlap {
        if call_matches(&expected[aligned], actual[aligned], tolerance) {
            report.matched.push(MatchedPair {
                expected_index: aligned,
                actual_index: aligned,
            });
            if expected[aligned].required {
                report.matched_required += 1;
            }
            aligned += 1;
        } else {
            report.diverged_at = Some(aligned);
            break;
        }
    }

    for i in aligned..actual.len() {
        report.extra.push(i);
    }
    for (i, call) in expected.iter().enumerate().skip(aligned) {
        if call.required {
            report.missing.push(i);
        }
    }

    report
}

fn match_tool_calls_unordered(
    expected: &[ExpectedToolCall],
    actual: &[&TrajectoryStep],
    tolerance: f64,
) -> ToolMatchReport {
    let mut report = ToolMatchReport {
        total_required: count_required_calls(expected),
        ..Default::default()
    };
    let mut claimed = vec![false; actual.len()];

    for (ei, exp) in expected.iter().enumerate() {
        let found = actual
            .iter()
            .enumerate()
            .find(|(ai, step)| !claimed[*ai] && call_matches(exp, step, tolerance))
            .map(|(ai, _)| ai);

        match found {
            Some(ai) => {
                claimed[ai] = true;
                report.matched.push(MatchedPair {
                    expected_index: ei,
                    actual_index: ai,
                });
                if exp.required {
                    report.matched_required += 1;
                }
            }
            None => {
                if exp.required {
                    report.missing.push(ei);
                }
            }
        }
    }

    collect_unclaimed(&claimed, &mut report.extra);
    report
}

fn count_required_calls(expected: &[ExpectedToolCall]) -> usize {
    expected.iter().filter(|e| e.required).count()
}

/// Whether an actual tool step satisfies one expected call: name matches
/// (empty expected name is a wildcard) and every constrained argument is
/// present and equal.
fn call_matches(expected: &ExpectedToolCall, actual: &TrajectoryStep, tolerance: f64) -> bool {
    if !expected.name_matches(&actual.name) {
        return false;
    }
    match &expected.arguments {
        None => true,
        Some(constraints) => arguments_match(constraints, actual.argument_map(), tolerance),
    }
}

/// Every key in `constraints` must appear in `actual` with a matching value.
/// Extra actual keys are ignored: expected arguments are a constraint, not
/// an exhaustive description of the call.
fn arguments_match(
    constraints: &Map<String, Value>,
    actual: Option<&Map<String, Value>>,
    tolerance: f64,
) -> bool {
    if constraints.is_empty() {
        return true;
    }
    let Some(actual) = actual else {
        return false;
    };
    constraints.iter().all(|(key, expected_value)| {
        actual
            .get(key)
            .is_some_and(|actual_value| values_match(expected_value, actual_value, tolerance))
    })
}

/// Numeric values compare within tolerance when one is configured; all other
/// values (and numeric values at zero tolerance) fall back to deep equality.
fn values_match(expected: &Value, actual: &Value, tolerance: f64) -> bool {
    if tolerance > 0.0 {
        if let (Some(a), Some(b)) = (expected.as_f64(), actual.as_f64()) {
            return (a - b).abs() <= tolerance;
        }
    }
    expected == actual
}
