//! In-memory stand-ins for the host API, used by unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::ptr::{self, NonNull};
use std::time::Duration;

use regex::Regex;

use crate::abi::{CategoryHandle, MatchKind, SharedPtrLayout};
use crate::error::{ZdbError, ZdbResult};
use crate::host::{CommandHandler, HostDebugger, HostFrame, HostValue, SummaryWrapper};
use crate::offsets::InternalSymbol;
use crate::registrar::{FormatterBackend, FormatterSpec};

/// A debuggee value built by hand.
#[derive(Debug, Clone, Default)]
pub struct FakeValue
{
    name: Option<String>,
    type_name: Option<String>,
    value: Option<String>,
    summary: Option<String>,
    unsigned: Option<u64>,
    children: Vec<FakeValue>,
    pointee: Option<Box<FakeValue>>,
    memory: Vec<(u64, Vec<u8>)>,
}

impl FakeValue
{
    /// Aggregate with no scalar value; `name` doubles as its type name.
    pub fn record(name: &str) -> Self
    {
        Self {
            name: Some(name.to_string()),
            type_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Integer member.
    pub fn scalar(name: &str, value: u64) -> Self
    {
        Self {
            name: Some(name.to_string()),
            type_name: Some("usize".to_string()),
            value: Some(value.to_string()),
            unsigned: Some(value),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: &str) -> Self
    {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_child(mut self, child: FakeValue) -> Self
    {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, value: &str) -> Self
    {
        self.value = Some(value.to_string());
        self
    }

    pub fn with_summary(mut self, summary: &str) -> Self
    {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_pointee(mut self, pointee: FakeValue) -> Self
    {
        self.pointee = Some(Box::new(pointee));
        self
    }

    pub fn with_memory(mut self, address: u64, bytes: &[u8]) -> Self
    {
        self.memory.push((address, bytes.to_vec()));
        self
    }

    fn region(&self, address: u64) -> Option<&[u8]>
    {
        self.memory.iter().find_map(|(start, bytes)| {
            let offset = usize::try_from(address.checked_sub(*start)?).ok()?;
            bytes.get(offset..)
        })
    }
}

impl HostValue for FakeValue
{
    fn name(&self) -> Option<String>
    {
        self.name.clone()
    }

    fn type_name(&self) -> Option<String>
    {
        self.type_name.clone()
    }

    fn value(&self) -> Option<String>
    {
        self.value.clone()
    }

    fn summary(&self) -> Option<String>
    {
        self.summary.clone()
    }

    fn value_as_unsigned(&self) -> Option<u64>
    {
        self.unsigned
    }

    fn num_children(&self) -> usize
    {
        self.children.len()
    }

    fn child_at_index(&self, index: usize) -> Option<Box<dyn HostValue + '_>>
    {
        self.children
            .get(index)
            .map(|child| Box::new(child.clone()) as Box<dyn HostValue>)
    }

    fn child_member_with_name(&self, name: &str) -> Option<Box<dyn HostValue + '_>>
    {
        self.children
            .iter()
            .find(|child| child.name.as_deref() == Some(name))
            .map(|child| Box::new(child.clone()) as Box<dyn HostValue>)
    }

    fn dereference(&self) -> Option<Box<dyn HostValue + '_>>
    {
        self.pointee
            .as_deref()
            .map(|pointee| Box::new(pointee.clone()) as Box<dyn HostValue>)
    }

    fn read_memory(&self, address: u64, len: usize) -> Option<Vec<u8>>
    {
        self.region(address)?.get(..len).map(<[u8]>::to_vec)
    }

    fn read_c_string(&self, address: u64, max_len: usize) -> Option<Vec<u8>>
    {
        let bytes = self.region(address)?;
        let bytes = &bytes[..bytes.len().min(max_len)];
        let end = bytes.iter().position(|&byte| byte == 0).unwrap_or(bytes.len());
        Some(bytes[..end].to_vec())
    }
}

/// A stopped frame with fixed locals and canned evaluation results.
#[derive(Debug, Default)]
pub struct FakeFrame
{
    variables: HashMap<String, FakeValue>,
    results: HashMap<String, Result<FakeValue, String>>,
    evaluated: RefCell<Vec<String>>,
}

impl FakeFrame
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn with_variable(mut self, name: &str, value: FakeValue) -> Self
    {
        self.variables.insert(name.to_string(), value);
        self
    }

    /// Make `expression` evaluate to `result`. Anything else fails.
    pub fn with_result(mut self, expression: &str, result: Result<FakeValue, &str>) -> Self
    {
        self.results
            .insert(expression.to_string(), result.map_err(str::to_string));
        self
    }

    /// Expressions passed to `evaluate`, in order.
    pub fn evaluated(&self) -> Vec<String>
    {
        self.evaluated.borrow().clone()
    }
}

impl HostFrame for FakeFrame
{
    fn find_variable(&self, name: &str) -> Option<Box<dyn HostValue + '_>>
    {
        self.variables
            .get(name)
            .map(|value| Box::new(value.clone()) as Box<dyn HostValue>)
    }

    fn evaluate(&self, expression: &str, _timeout: Duration) -> Result<Box<dyn HostValue + '_>, String>
    {
        self.evaluated.borrow_mut().push(expression.to_string());
        match self.results.get(expression) {
            Some(Ok(value)) => Ok(Box::new(value.clone())),
            Some(Err(message)) => Err(message.clone()),
            None => Err(format!("error: use of undeclared identifier in '{expression}'")),
        }
    }
}

/// A slice-shaped value: `{ ptr, len }`.
pub fn slice(ptr: u64, len: u64) -> FakeValue
{
    FakeValue::record("[]u32")
        .with_child(FakeValue::scalar("ptr", ptr))
        .with_child(FakeValue::scalar("len", len))
}

/// Summary wrapper whose only member is the two `shared_ptr` words.
#[repr(C)]
pub struct FakeWrapper
{
    words: [usize; 2],
}

impl SummaryWrapper for FakeWrapper
{
    fn wrapper_ptr(&self) -> NonNull<c_void>
    {
        NonNull::from(self).cast()
    }
}

/// Debugger that hands out wrappers whose implementation pointer is `index + 1`.
pub struct FakeHost
{
    pub banner: String,
    pub refuse: Option<usize>,
    pub commands: RefCell<Vec<String>>,
}

impl Default for FakeHost
{
    fn default() -> Self
    {
        Self {
            banner: "lldb version 21.1.7".to_string(),
            refuse: None,
            commands: RefCell::new(Vec::new()),
        }
    }
}

impl FakeHost
{
    pub fn with_banner(mut self, banner: &str) -> Self
    {
        self.banner = banner.to_string();
        self
    }

    /// Refuse to create the wrapper for plan entry `index`.
    pub fn refusing(mut self, index: usize) -> Self
    {
        self.refuse = Some(index);
        self
    }
}

impl HostDebugger for FakeHost
{
    fn version_banner(&self) -> String
    {
        self.banner.clone()
    }

    fn create_summary(&self, index: usize, _formatter: &FormatterSpec) -> Option<Box<dyn SummaryWrapper>>
    {
        (self.refuse != Some(index)).then(|| Box::new(FakeWrapper { words: [index + 1, 0] }) as Box<dyn SummaryWrapper>)
    }

    fn register_command(&self, name: &str, _help: &str, _handler: Box<dyn CommandHandler>) -> bool
    {
        self.commands.borrow_mut().push(name.to_string());
        true
    }
}

/// A formatter category that resolves type names the way LLDB does: last match wins.
#[derive(Debug, Default)]
pub struct FakeCategory
{
    /// Internal entry to pretend is absent from the offset table
    pub missing: Option<InternalSymbol>,
    pub entries: Vec<(String, MatchKind, usize)>,
    pub enabled: bool,
}

impl FakeCategory
{
    /// Plan index of the formatter LLDB would pick for `type_name`.
    pub fn lookup(&self, type_name: &str) -> Option<usize>
    {
        self.entries
            .iter()
            .rev()
            .find(|(pattern, kind, _)| match kind {
                MatchKind::Exact => pattern == type_name,
                MatchKind::Regex => Regex::new(pattern).is_ok_and(|re| re.is_match(type_name)),
            })
            .map(|(_, _, implementation)| implementation - 1)
    }
}

impl FormatterBackend for FakeCategory
{
    fn check_required(&self) -> ZdbResult<()>
    {
        match self.missing {
            Some(symbol @ (InternalSymbol::GetCategory | InternalSymbol::AddTypeSummary)) => {
                Err(ZdbError::MissingSymbol(symbol))
            }
            _ => Ok(()),
        }
    }

    fn category(&mut self, name: &'static CStr) -> ZdbResult<CategoryHandle>
    {
        let shared = SharedPtrLayout {
            ptr: NonNull::<u8>::dangling().as_ptr().cast(),
            ctrl: ptr::null_mut(),
        };
        CategoryHandle::new(name, shared).ok_or_else(|| ZdbError::CategoryUnavailable(name.to_string_lossy().into_owned()))
    }

    fn add_summary(
        &mut self,
        _category: &CategoryHandle,
        pattern: &str,
        kind: MatchKind,
        summary: NonNull<SharedPtrLayout>,
    ) -> ZdbResult<()>
    {
        let implementation = unsafe { summary.as_ptr().read() }.ptr as usize;
        self.entries.push((pattern.to_string(), kind, implementation));
        Ok(())
    }

    fn enable(&mut self, _category: &CategoryHandle) -> ZdbResult<()>
    {
        if self.missing == Some(InternalSymbol::EnableCategory) {
            return Err(ZdbError::MissingSymbol(InternalSymbol::EnableCategory));
        }
        self.enabled = true;
        Ok(())
    }

    fn describe(&self) -> &'static str
    {
        "fake"
    }
}
