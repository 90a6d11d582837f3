//! # Expression Rewriter
//!
//! Maps Zig access syntax onto expressions LLDB's C-family evaluator accepts.
//!
//! | Zig | rewritten | when |
//! |-----|-----------|------|
//! | `xs[i]` | `xs.ptr[i]` | `xs` is a slice |
//! | `list[i]` | `list.items.ptr[i]` | `list` is an `ArrayList` |
//! | `m.?` | `m.data` | `m` is an optional |
//! | `r catch d` | `(r.tag == 0 ? r.value : d)` | `r` is an error union |
//!
//! Each rule looks the path up in the current frame and only fires when the
//! value has the expected shape. Anything that does not resolve is left alone.
//! Subscripts are matched bracket by bracket, so an index may itself contain
//! subscripts (`xs[xs[0]]`); those are rewritten too.
//!
//! The optional unwrap is not guarded: `m.?` on a null optional reads whatever
//! is in the payload slot instead of reporting an error.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{ZdbError, ZdbResult};
use crate::host::{HostFrame, HostValue};
use crate::shapes;

/// Timeout handed to the host evaluator.
pub const EVALUATION_TIMEOUT: Duration = Duration::from_secs(2);

macro_rules! path {
    () => {
        r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*"
    };
}

/// A path directly followed by an opening bracket; the index is found by
/// bracket matching.
static SUBSCRIPT_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(concat!(r"(?P<path>", path!(), r")\[")).expect("valid regex"));

static OPTIONAL_UNWRAP: Lazy<Regex> = Lazy::new(|| Regex::new(concat!(r"(?P<path>", path!(), r")\.\?")).expect("valid regex"));

static ERROR_CATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<path>",
        path!(),
        r")\s+catch\s+(?P<default>[^,;()\s](?:[^,;()]*[^,;()\s])?)"
    ))
    .expect("valid regex")
});

/// One syntactic form and how to rewrite it.
pub struct RewriteRule
{
    /// Rule name, for logging
    pub name: &'static str,
    rewrite: fn(&str, &dyn HostFrame) -> String,
}

impl RewriteRule
{
    /// Rewrite every occurrence of this rule's form in `expression`.
    pub fn apply(&self, expression: &str, frame: &dyn HostFrame) -> String
    {
        (self.rewrite)(expression, frame)
    }
}

/// Rules in the order they are applied.
pub static RULES: [RewriteRule; 3] = [
    RewriteRule {
        name: "subscript",
        rewrite: rewrite_subscripts,
    },
    RewriteRule {
        name: "optional-unwrap",
        rewrite: rewrite_optionals,
    },
    RewriteRule {
        name: "error-catch",
        rewrite: rewrite_catches,
    },
];

/// Rewrite `expression` for evaluation in `frame`.
///
/// Returns the input unchanged when no rule applies.
pub fn rewrite(expression: &str, frame: &dyn HostFrame) -> String
{
    RULES
        .iter()
        .fold(expression.to_string(), |text, rule| rule.apply(&text, frame))
}

/// Evaluate `expression`, preferring its rewritten form.
///
/// If the rewritten expression fails the original is tried. When both fail the
/// error carries the original expression's message.
///
/// ## Errors
///
/// `EvaluationFailed` when no form of the expression evaluates.
pub fn evaluate<'f>(frame: &'f dyn HostFrame, expression: &str, timeout: Duration) -> ZdbResult<Box<dyn HostValue + 'f>>
{
    let rewritten = rewrite(expression, frame);
    if rewritten != expression {
        match frame.evaluate(&rewritten, timeout) {
            Ok(value) => return Ok(value),
            Err(message) => debug!(%rewritten, %message, "rewritten expression failed, retrying original"),
        }
    }

    frame
        .evaluate(expression, timeout)
        .map_err(|message| ZdbError::EvaluationFailed {
            expression: expression.to_string(),
            message,
        })
}

/// Replace every match of `pattern` that `apply` accepts.
fn replace_matches(
    rule: &str,
    pattern: &Regex,
    expression: &str,
    frame: &dyn HostFrame,
    apply: fn(&Captures<'_>, &dyn HostFrame) -> Option<String>,
) -> String
{
    let mut out = String::with_capacity(expression.len() + 16);
    let mut last = 0;

    for caps in pattern.captures_iter(expression) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if continues_expression(expression, whole.start()) {
            continue;
        }
        if let Some(replacement) = apply(&caps, frame) {
            trace!(rule, from = whole.as_str(), to = %replacement, "rewrite");
            out.push_str(&expression[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
        }
    }

    out.push_str(&expression[last..]);
    out
}

fn rewrite_optionals(expression: &str, frame: &dyn HostFrame) -> String
{
    replace_matches("optional-unwrap", &OPTIONAL_UNWRAP, expression, frame, rewrite_optional)
}

fn rewrite_catches(expression: &str, frame: &dyn HostFrame) -> String
{
    replace_matches("error-catch", &ERROR_CATCH, expression, frame, rewrite_catch)
}

/// `path[index]` to `path.ptr[index]` or `path.items.ptr[index]`, indices first.
///
/// A subscript whose brackets never close is left as typed; subscripts inside
/// it are still rewritten.
fn rewrite_subscripts(expression: &str, frame: &dyn HostFrame) -> String
{
    let mut out = String::with_capacity(expression.len() + 16);
    let mut last = 0;
    let mut search = 0;

    while let Some(caps) = SUBSCRIPT_OPEN.captures_at(expression, search) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.name("path")) else {
            break;
        };
        let open = whole.end();
        let Some(close) = closing_bracket(expression, open) else {
            search = open;
            continue;
        };

        let index = rewrite_subscripts(&expression[open..close], frame);
        let access = if continues_expression(expression, whole.start()) || index.trim().is_empty() {
            None
        } else {
            subscript_access(frame, path.as_str())
        };

        out.push_str(&expression[last..path.start()]);
        out.push_str(path.as_str());
        if let Some(access) = access {
            trace!(rule = "subscript", path = path.as_str(), access, "rewrite");
            out.push('.');
            out.push_str(access);
        }
        out.push('[');
        out.push_str(&index);
        out.push(']');

        last = close + 1;
        search = last;
    }

    out.push_str(&expression[last..]);
    out
}

/// Byte offset of the `]` closing the bracket opened just before `from`.
fn closing_bracket(text: &str, from: usize) -> Option<usize>
{
    let mut depth = 1usize;
    for (at, c) in text[from..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + at);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether a match at `start` is the tail of a longer expression, e.g. `x` in `f().x`.
fn continues_expression(text: &str, start: usize) -> bool
{
    text[..start]
        .chars()
        .next_back()
        .is_some_and(|c| c == '.' || c == '_' || c == ')' || c == ']' || c.is_ascii_alphanumeric())
}

/// Run `f` on the value `path` names in `frame`.
fn with_value<R>(frame: &dyn HostFrame, path: &str, f: impl FnOnce(&dyn HostValue) -> R) -> Option<R>
{
    let segments: SmallVec<[&str; 4]> = path.split('.').collect();
    let (root, members) = segments.split_first()?;
    let root = frame.find_variable(root)?;
    visit(root.as_ref(), members, f)
}

fn visit<R>(value: &dyn HostValue, members: &[&str], f: impl FnOnce(&dyn HostValue) -> R) -> Option<R>
{
    match members.split_first() {
        None => Some(f(value)),
        Some((head, tail)) => {
            let child = value.child_member_with_name(head)?;
            visit(child.as_ref(), tail, f)
        }
    }
}

fn subscript_access(frame: &dyn HostFrame, path: &str) -> Option<&'static str>
{
    with_value(frame, path, |value| {
        if shapes::is_slice(value) {
            Some("ptr")
        } else if shapes::is_growable_list(value) {
            Some("items.ptr")
        } else {
            None
        }
    })?
}

fn rewrite_optional(caps: &Captures<'_>, frame: &dyn HostFrame) -> Option<String>
{
    let path = caps.name("path")?.as_str();
    let payload = with_value(frame, path, shapes::optional_payload)??;
    Some(format!("{path}.{payload}"))
}

fn rewrite_catch(caps: &Captures<'_>, frame: &dyn HostFrame) -> Option<String>
{
    let path = caps.name("path")?.as_str();
    let default = caps.name("default")?.as_str();
    let (tag, payload) = with_value(frame, path, shapes::error_union_fields)??;
    Some(format!("({path}.{tag} == 0 ? {path}.{payload} : {default})"))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::testing::{slice, FakeFrame, FakeValue};

    fn frame() -> FakeFrame
    {
        let list = FakeValue::record("array_list.ArrayList(u32)")
            .with_child(slice(0x2000, 3).named("items"))
            .with_child(FakeValue::scalar("capacity", 8));
        let optional = FakeValue::record("?u32")
            .with_child(FakeValue::scalar("some", 1))
            .with_child(FakeValue::scalar("data", 5));
        let result = FakeValue::record("anyerror!u32")
            .with_child(FakeValue::scalar("tag", 0))
            .with_child(FakeValue::scalar("value", 7));
        let holder = FakeValue::record("main.Holder").with_child(slice(0x3000, 2).named("buf"));

        FakeFrame::new()
            .with_variable("xs", slice(0x1000, 4))
            .with_variable("lst", list)
            .with_variable("n", FakeValue::scalar("n", 3))
            .with_variable("m", optional)
            .with_variable("r", result)
            .with_variable("h", holder)
    }

    #[test]
    fn test_slice_subscript()
    {
        assert_eq!(rewrite("xs[2]", &frame()), "xs.ptr[2]");
        assert_eq!(rewrite("xs[i + 1] * 2", &frame()), "xs.ptr[i + 1] * 2");
    }

    #[test]
    fn test_list_subscript()
    {
        assert_eq!(rewrite("lst[0]", &frame()), "lst.items.ptr[0]");
    }

    #[test]
    fn test_member_path_subscript()
    {
        assert_eq!(rewrite("h.buf[1]", &frame()), "h.buf.ptr[1]");
    }

    #[test]
    fn test_non_slice_left_alone()
    {
        assert_eq!(rewrite("n[0]", &frame()), "n[0]");
        assert_eq!(rewrite("missing[0]", &frame()), "missing[0]");
        assert_eq!(rewrite("h.nope[0]", &frame()), "h.nope[0]");
        assert_eq!(rewrite("get().xs[0]", &frame()), "get().xs[0]");
    }

    #[test]
    fn test_optional_unwrap_is_unguarded()
    {
        // No null check is inserted: a null `m` reads the payload slot as is.
        assert_eq!(rewrite("m.?", &frame()), "m.data");
        assert_eq!(rewrite("m.? + 1", &frame()), "m.data + 1");
        assert_eq!(rewrite("n.?", &frame()), "n.?");
    }

    #[test]
    fn test_error_catch()
    {
        assert_eq!(rewrite("r catch 99", &frame()), "(r.tag == 0 ? r.value : 99)");
        assert_eq!(rewrite("n catch 99", &frame()), "n catch 99");
    }

    #[test]
    fn test_rules_compose()
    {
        assert_eq!(rewrite("xs[0] + m.?", &frame()), "xs.ptr[0] + m.data");
    }

    #[test]
    fn test_evaluate_uses_rewrite()
    {
        let frame = frame().with_result("(r.tag == 0 ? r.value : 99)", Ok(FakeValue::scalar("$0", 7)));
        let value = evaluate(&frame, "r catch 99", EVALUATION_TIMEOUT).unwrap();
        assert_eq!(value.value_as_unsigned(), Some(7));
        assert_eq!(frame.evaluated(), vec!["(r.tag == 0 ? r.value : 99)"]);
    }

    #[test]
    fn test_evaluate_falls_back_to_original()
    {
        let frame = frame()
            .with_result("xs.ptr[9]", Err("error: memory read failed"))
            .with_result("xs[9]", Ok(FakeValue::scalar("$0", 1)));
        let value = evaluate(&frame, "xs[9]", EVALUATION_TIMEOUT).unwrap();
        assert_eq!(value.value_as_unsigned(), Some(1));
        assert_eq!(frame.evaluated(), vec!["xs.ptr[9]", "xs[9]"]);
    }

    #[test]
    fn test_evaluate_reports_original_error()
    {
        let frame = frame()
            .with_result("xs.ptr[9]", Err("rewritten failed"))
            .with_result("xs[9]", Err("error: subscripted value is not an array"));
        let err = evaluate(&frame, "xs[9]", EVALUATION_TIMEOUT).err().expect("evaluation should fail");
        assert_eq!(err.to_string(), "error: subscripted value is not an array");
    }

    #[test]
    fn test_unrewritten_evaluated_once()
    {
        let frame = frame().with_result("n + 1", Ok(FakeValue::scalar("$0", 4)));
        evaluate(&frame, "n + 1", EVALUATION_TIMEOUT).unwrap();
        assert_eq!(frame.evaluated(), vec!["n + 1"]);
    }

    #[test]
    fn test_nested_subscripts()
    {
        assert_eq!(rewrite("xs[xs[0]]", &frame()), "xs.ptr[xs.ptr[0]]");
        assert_eq!(rewrite("lst[xs[1] + xs[2]]", &frame()), "lst.items.ptr[xs.ptr[1] + xs.ptr[2]]");
        assert_eq!(rewrite("h.buf[lst[xs[0]]]", &frame()), "h.buf.ptr[lst.items.ptr[xs.ptr[0]]]");
    }

    #[test]
    fn test_index_rewritten_under_unshaped_subscript()
    {
        assert_eq!(rewrite("n[xs[0]]", &frame()), "n[xs.ptr[0]]");
        assert_eq!(rewrite("(n)[xs[1]]", &frame()), "(n)[xs.ptr[1]]");
        assert_eq!(rewrite("get().xs[xs[0]]", &frame()), "get().xs[xs.ptr[0]]");
    }

    #[test]
    fn test_unbalanced_subscript()
    {
        assert_eq!(rewrite("xs[0", &frame()), "xs[0");
        assert_eq!(rewrite("xs[xs[0]", &frame()), "xs[xs.ptr[0]");
        assert_eq!(rewrite("xs[]", &frame()), "xs[]");
        assert_eq!(rewrite("xs[0]]", &frame()), "xs.ptr[0]]");
    }
}
