//! # Zig Summary Callbacks
//!
//! One-line summaries for Zig runtime types, computed from the member layout
//! the Zig compiler emits in debug info.
//!
//! Every callback returns `false` only when the value does not have the shape
//! it was written for, letting LLDB fall back to its default display. Anything
//! partially readable still produces a summary.

use std::fmt::Write;

use crate::host::{HostValue, SummaryOptions};
use crate::shapes;

/// `[]T`: `len=3 ptr=0x1000`
pub fn slice(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let (Some(len), Some(ptr)) = (value.member_unsigned("len"), value.member_unsigned("ptr")) else {
        return false;
    };
    write!(out, "len={len} ptr=0x{ptr:x}").is_ok()
}

/// `[]u8` / `[]const u8`: quoted contents when short enough to read.
pub fn string(value: &dyn HostValue, options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let (Some(len), Some(ptr)) = (value.member_unsigned("len"), value.member_unsigned("ptr")) else {
        return false;
    };

    if len > 0 && len < options.max_string_len && ptr != 0 {
        if let Some(bytes) = usize::try_from(len).ok().and_then(|len| value.read_memory(ptr, len)) {
            return write_quoted(&bytes, out).is_ok();
        }
    }
    write!(out, "len={len} ptr=0x{ptr:x}").is_ok()
}

/// `?T`: `null` or the payload.
pub fn optional(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let Some(child) = value.child_at_index(0) else {
        return out.write_str("null").is_ok();
    };
    if child.name().as_deref() == Some("null") {
        return out.write_str("null").is_ok();
    }
    match non_empty(child.summary()).or_else(|| non_empty(child.value())) {
        Some(text) => out.write_str(&text).is_ok(),
        None => out.write_str("(has value)").is_ok(),
    }
}

/// `E!T`: `error.Name`, `error(n)` or the payload.
pub fn error_union(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let Some(error) = shapes::error_tag(value).and_then(|tag| value.child_member_with_name(tag)) else {
        return false;
    };

    let code = error.value_as_unsigned().unwrap_or(0);
    if code != 0 {
        return match non_empty(error.value()) {
            Some(name) if name != code.to_string() => write!(out, "error.{name}").is_ok(),
            _ => write!(out, "error({code})").is_ok(),
        };
    }

    let payload = shapes::error_union_fields(value).and_then(|(_, payload)| value.child_member_with_name(payload));
    match payload.and_then(|payload| non_empty(payload.summary()).or_else(|| non_empty(payload.value()))) {
        Some(text) => out.write_str(&text).is_ok(),
        None => out.write_str("(success)").is_ok(),
    }
}

/// `union(enum)`: `.tag` plus the active payload's summary.
pub fn tagged_union(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let Some(tag) = value.child_member_with_name("tag") else {
        return false;
    };
    let Some(tag_name) = non_empty(tag.value()) else {
        return false;
    };
    if write!(out, ".{tag_name}").is_err() {
        return false;
    }

    let active = value
        .child_member_with_name("payload")
        .and_then(|payload| payload.child_member_with_name(&tag_name).and_then(|active| non_empty(active.summary())));
    match active {
        Some(summary) => write!(out, " = {summary}").is_ok(),
        None => true,
    }
}

/// `std.ArrayList(T)`: `len=2 capacity=8`
pub fn array_list(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let len = value
        .child_member_with_name("items")
        .and_then(|items| items.member_unsigned("len"));
    match len {
        Some(len) => {
            if write!(out, "len={len}").is_err() {
                return false;
            }
            match value.member_unsigned("capacity") {
                Some(capacity) => write!(out, " capacity={capacity}").is_ok(),
                None => true,
            }
        }
        None => out.write_str("(ArrayList)").is_ok(),
    }
}

/// `std.HashMap(K, V)`: `size=4`
pub fn hash_map(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    match value.member_unsigned("size").or_else(|| value.member_unsigned("count")) {
        Some(size) => write!(out, "size={size}").is_ok(),
        None => out.write_str("(HashMap)").is_ok(),
    }
}

/// `std.BoundedArray(T, n)`: `len=3`
pub fn bounded_array(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    len_only(value, "(BoundedArray)", out)
}

/// `std.SegmentedList(T, n)`: `len=3`
pub fn segmented_list(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    len_only(value, "(SegmentedList)", out)
}

/// `std.MultiArrayList(T)`: `len=3 capacity=4`
pub fn multi_array_list(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    match value.member_unsigned("len") {
        Some(len) => {
            if write!(out, "len={len}").is_err() {
                return false;
            }
            match value.member_unsigned("capacity") {
                Some(capacity) => write!(out, " capacity={capacity}").is_ok(),
                None => true,
            }
        }
        None => out.write_str("(MultiArrayList)").is_ok(),
    }
}

/// `[*:0]u8`: quoted contents, `null`, or the raw address.
pub fn c_string(value: &dyn HostValue, options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let ptr = value.value_as_unsigned().unwrap_or(0);
    if ptr == 0 {
        return out.write_str("null").is_ok();
    }
    match value.read_c_string(ptr, options.max_c_string_len) {
        Some(bytes) if !bytes.is_empty() => write_quoted(&bytes, out).is_ok(),
        _ => write!(out, "0x{ptr:x}").is_ok(),
    }
}

/// `[N]T`: `[N]...`
pub fn array(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    write!(out, "[{}]...", value.num_children()).is_ok()
}

/// `*T`, `[*]T`, `[*:s]T`: `null`, `-> pointee`, or the raw address.
pub fn pointer(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let ptr = value.value_as_unsigned().unwrap_or(0);
    if ptr == 0 {
        return out.write_str("null").is_ok();
    }
    let pointee = value
        .dereference()
        .and_then(|target| non_empty(target.summary()).or_else(|| non_empty(target.value())));
    match pointee {
        Some(text) => write!(out, "-> {text}").is_ok(),
        None => write!(out, "0x{ptr:x}").is_ok(),
    }
}

/// Structs and enums: `.variant`, `{ .a=1, .b=2 }` or `{ 7 fields }`.
pub fn structure(value: &dyn HostValue, _options: &SummaryOptions, out: &mut dyn Write) -> bool
{
    let count = value.num_children();
    if count == 0 {
        return match non_empty(value.value()) {
            Some(variant) => write!(out, ".{variant}").is_ok(),
            None => out.write_str("{}").is_ok(),
        };
    }
    if count > 3 {
        return write!(out, "{{ {count} fields }}").is_ok();
    }

    let fields: Vec<String> = (0..count)
        .filter_map(|index| value.child_at_index(index))
        .filter_map(|child| {
            let name = child.name().unwrap_or_else(|| "?".to_string());
            non_empty(child.summary())
                .or_else(|| non_empty(child.value()))
                .map(|text| format!(".{name}={text}"))
        })
        .collect();
    write!(out, "{{ {} }}", fields.join(", ")).is_ok()
}

fn len_only(value: &dyn HostValue, fallback: &str, out: &mut dyn Write) -> bool
{
    match value.member_unsigned("len") {
        Some(len) => write!(out, "len={len}").is_ok(),
        None => out.write_str(fallback).is_ok(),
    }
}

fn non_empty(text: Option<String>) -> Option<String>
{
    text.filter(|text| !text.is_empty())
}

fn write_quoted(bytes: &[u8], out: &mut dyn Write) -> std::fmt::Result
{
    out.write_char('"')?;
    for &byte in bytes {
        match byte {
            b'"' => out.write_str("\\\"")?,
            b'\\' => out.write_str("\\\\")?,
            b'\n' => out.write_str("\\n")?,
            b'\r' => out.write_str("\\r")?,
            b'\t' => out.write_str("\\t")?,
            0x20..=0x7e => out.write_char(char::from(byte))?,
            _ => write!(out, "\\x{byte:02x}")?,
        }
    }
    out.write_char('"')
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::testing::FakeValue;

    fn render(callback: crate::host::SummaryFn, value: &FakeValue) -> Option<String>
    {
        let mut out = String::new();
        callback(value, &SummaryOptions::default(), &mut out).then_some(out)
    }

    fn slice_value(ptr: u64, len: u64) -> FakeValue
    {
        FakeValue::record("[]const u8")
            .with_child(FakeValue::scalar("ptr", ptr))
            .with_child(FakeValue::scalar("len", len))
    }

    #[test]
    fn test_slice()
    {
        assert_eq!(render(slice, &slice_value(0x1000, 3)).as_deref(), Some("len=3 ptr=0x1000"));
        assert_eq!(render(slice, &FakeValue::scalar("n", 1)), None);
    }

    #[test]
    fn test_string_reads_and_escapes()
    {
        let value = slice_value(0x2000, 6).with_memory(0x2000, b"a\"b\n\x01z");
        assert_eq!(render(string, &value).as_deref(), Some("\"a\\\"b\\n\\x01z\""));
    }

    #[test]
    fn test_string_falls_back_when_unreadable()
    {
        assert_eq!(render(string, &slice_value(0x3000, 4)).as_deref(), Some("len=4 ptr=0x3000"));
        assert_eq!(render(string, &slice_value(0x3000, 0)).as_deref(), Some("len=0 ptr=0x3000"));
    }

    #[test]
    fn test_optional()
    {
        let none = FakeValue::record("?u32");
        assert_eq!(render(optional, &none).as_deref(), Some("null"));

        let null_child = FakeValue::record("?u32").with_child(FakeValue::record("null"));
        assert_eq!(render(optional, &null_child).as_deref(), Some("null"));

        let some = FakeValue::record("?u32").with_child(FakeValue::scalar("data", 42));
        assert_eq!(render(optional, &some).as_deref(), Some("42"));
    }

    #[test]
    fn test_error_union()
    {
        let failed = FakeValue::record("anyerror!u32").with_child(FakeValue::scalar("error", 3).with_text("OutOfMemory"));
        assert_eq!(render(error_union, &failed).as_deref(), Some("error.OutOfMemory"));

        let coded = FakeValue::record("anyerror!u32").with_child(FakeValue::scalar("err", 5));
        assert_eq!(render(error_union, &coded).as_deref(), Some("error(5)"));

        let ok = FakeValue::record("anyerror!u32")
            .with_child(FakeValue::scalar("error", 0))
            .with_child(FakeValue::scalar("value", 7));
        assert_eq!(render(error_union, &ok).as_deref(), Some("7"));

        assert_eq!(render(error_union, &FakeValue::record("u32")), None);
    }

    #[test]
    fn test_error_union_payload_spellings()
    {
        let payload = FakeValue::record("anyerror!u32")
            .with_child(FakeValue::scalar("tag", 0))
            .with_child(FakeValue::scalar("payload", 9));
        assert_eq!(render(error_union, &payload).as_deref(), Some("9"));

        let data = FakeValue::record("anyerror!u32")
            .with_child(FakeValue::scalar("err", 0))
            .with_child(FakeValue::scalar("data", 11));
        assert_eq!(render(error_union, &data).as_deref(), Some("11"));

        let bare = FakeValue::record("anyerror!void").with_child(FakeValue::scalar("tag", 0));
        assert_eq!(render(error_union, &bare).as_deref(), Some("(success)"));
    }

    #[test]
    fn test_tagged_union()
    {
        let value = FakeValue::record("union(enum)")
            .with_child(FakeValue::scalar("tag", 1).with_text("circle"))
            .with_child(
                FakeValue::record("payload").with_child(FakeValue::record("circle").with_summary("{ .radius=2 }")),
            );
        assert_eq!(render(tagged_union, &value).as_deref(), Some(".circle = { .radius=2 }"));
    }

    #[test]
    fn test_containers()
    {
        let list = FakeValue::record("array_list.ArrayListAligned(u8,null)")
            .with_child(FakeValue::record("items").with_child(FakeValue::scalar("len", 2)))
            .with_child(FakeValue::scalar("capacity", 8));
        assert_eq!(render(array_list, &list).as_deref(), Some("len=2 capacity=8"));

        let map = FakeValue::record("hash_map.HashMap").with_child(FakeValue::scalar("count", 4));
        assert_eq!(render(hash_map, &map).as_deref(), Some("size=4"));

        assert_eq!(render(bounded_array, &FakeValue::record("b")).as_deref(), Some("(BoundedArray)"));
    }

    #[test]
    fn test_c_string()
    {
        let value = FakeValue::scalar("s", 0x4000).with_memory(0x4000, b"hi\0junk");
        assert_eq!(render(c_string, &value).as_deref(), Some("\"hi\""));
        assert_eq!(render(c_string, &FakeValue::scalar("s", 0)).as_deref(), Some("null"));
    }

    #[test]
    fn test_pointer()
    {
        let target = FakeValue::scalar("x", 9);
        assert_eq!(render(pointer, &FakeValue::scalar("p", 0x10).with_pointee(target)).as_deref(), Some("-> 9"));
        assert_eq!(render(pointer, &FakeValue::scalar("p", 0x10)).as_deref(), Some("0x10"));
        assert_eq!(render(pointer, &FakeValue::scalar("p", 0)).as_deref(), Some("null"));
    }

    #[test]
    fn test_structure()
    {
        let small = FakeValue::record("main.Point")
            .with_child(FakeValue::scalar("x", 1))
            .with_child(FakeValue::scalar("y", 2));
        assert_eq!(render(structure, &small).as_deref(), Some("{ .x=1, .y=2 }"));

        let variant = FakeValue::record("main.Color").with_text("red");
        assert_eq!(render(structure, &variant).as_deref(), Some(".red"));

        let mut big = FakeValue::record("main.Big");
        for name in ["a", "b", "c", "d"] {
            big = big.with_child(FakeValue::scalar(name, 0));
        }
        assert_eq!(render(structure, &big).as_deref(), Some("{ 4 fields }"));
    }
}
