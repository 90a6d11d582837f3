//! Structural recognition of Zig runtime values.
//!
//! Zig's debug info gives slices, optionals and error unions as plain structs,
//! so they are recognised by their member names rather than their type names.
//! The member vocabularies cover what different Zig releases have emitted.

use crate::host::HostValue;

/// Discriminant member names of an optional.
pub const OPTIONAL_FLAGS: [&str; 3] = ["some", "has_value", "is_some"];
/// Payload member names of an optional, in preference order.
pub const OPTIONAL_PAYLOADS: [&str; 3] = ["data", "payload", "value"];
/// Error code member names of an error union, in preference order.
pub const ERROR_TAGS: [&str; 3] = ["tag", "error", "err"];
/// Payload member names of an error union, in preference order.
pub const ERROR_PAYLOADS: [&str; 3] = ["value", "payload", "data"];

/// `[]T`: a `ptr` and a `len`.
pub fn is_slice(value: &dyn HostValue) -> bool
{
    value.has_field("ptr") && value.has_field("len")
}

/// `std.ArrayList(T)`: a slice-shaped `items` and a `capacity`.
pub fn is_growable_list(value: &dyn HostValue) -> bool
{
    value.has_field("capacity")
        && value
            .child_member_with_name("items")
            .is_some_and(|items| is_slice(items.as_ref()))
}

/// `?T`: the payload member name, if `value` is optional-shaped.
pub fn optional_payload(value: &dyn HostValue) -> Option<&'static str>
{
    if !OPTIONAL_FLAGS.iter().any(|name| value.has_field(name)) {
        return None;
    }
    first_field(value, &OPTIONAL_PAYLOADS)
}

/// `E!T`: the error code member name, present whether or not a payload is.
pub fn error_tag(value: &dyn HostValue) -> Option<&'static str>
{
    first_field(value, &ERROR_TAGS)
}

/// `E!T`: the `(tag, payload)` member names, if `value` is error-union-shaped.
pub fn error_union_fields(value: &dyn HostValue) -> Option<(&'static str, &'static str)>
{
    let tag = error_tag(value)?;
    let payload = ERROR_PAYLOADS
        .into_iter()
        .find(|name| *name != tag && value.has_field(name))?;
    Some((tag, payload))
}

fn first_field(value: &dyn HostValue, names: &[&'static str]) -> Option<&'static str>
{
    names.iter().copied().find(|name| value.has_field(name))
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::testing::{slice, FakeValue};

    #[test]
    fn test_slice_shape()
    {
        assert!(is_slice(&slice(0x1000, 3)));
        assert!(!is_slice(&FakeValue::record("x").with_child(FakeValue::scalar("ptr", 1))));
    }

    #[test]
    fn test_growable_list_shape()
    {
        let list = FakeValue::record("array_list.ArrayList(u32)")
            .with_child(slice(0x1000, 2).named("items"))
            .with_child(FakeValue::scalar("capacity", 8));
        assert!(is_growable_list(&list));
        assert!(!is_slice(&list));

        let no_capacity = FakeValue::record("l").with_child(slice(0x1000, 2).named("items"));
        assert!(!is_growable_list(&no_capacity));
    }

    #[test]
    fn test_optional_shape()
    {
        let opt = FakeValue::record("?u32")
            .with_child(FakeValue::scalar("some", 1))
            .with_child(FakeValue::scalar("data", 5));
        assert_eq!(optional_payload(&opt), Some("data"));

        let alt = FakeValue::record("?u32")
            .with_child(FakeValue::scalar("has_value", 1))
            .with_child(FakeValue::scalar("payload", 5));
        assert_eq!(optional_payload(&alt), Some("payload"));

        let plain = FakeValue::record("S").with_child(FakeValue::scalar("data", 5));
        assert_eq!(optional_payload(&plain), None);
    }

    #[test]
    fn test_error_union_shape()
    {
        let eu = FakeValue::record("anyerror!u32")
            .with_child(FakeValue::scalar("tag", 0))
            .with_child(FakeValue::scalar("value", 7));
        assert_eq!(error_union_fields(&eu), Some(("tag", "value")));

        let alt = FakeValue::record("anyerror!u32")
            .with_child(FakeValue::scalar("err", 0))
            .with_child(FakeValue::scalar("data", 7));
        assert_eq!(error_union_fields(&alt), Some(("err", "data")));

        let tag_only = FakeValue::record("E").with_child(FakeValue::scalar("tag", 0));
        assert_eq!(error_union_fields(&tag_only), None);
    }
}
