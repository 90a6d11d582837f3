//! Stand-in frame for previewing rewrites without a running process.
//!
//! Variables are declared on the command line with the shape the rewriter
//! should see; their members are synthesised from the same vocabulary Zig's
//! debug info uses.

use std::time::Duration;

use zdb_core::host::{HostFrame, HostValue};

/// Shape of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape
{
    Slice,
    List,
    Optional,
    ErrorUnion,
    Scalar,
}

impl Shape
{
    fn members(self) -> &'static [(&'static str, Shape)]
    {
        match self {
            Shape::Slice => &[("ptr", Shape::Scalar), ("len", Shape::Scalar)],
            Shape::List => &[("items", Shape::Slice), ("capacity", Shape::Scalar)],
            Shape::Optional => &[("some", Shape::Scalar), ("data", Shape::Scalar)],
            Shape::ErrorUnion => &[("tag", Shape::Scalar), ("value", Shape::Scalar)],
            Shape::Scalar => &[],
        }
    }

    fn type_name(self) -> &'static str
    {
        match self {
            Shape::Slice => "[]T",
            Shape::List => "array_list.ArrayList(T)",
            Shape::Optional => "?T",
            Shape::ErrorUnion => "anyerror!T",
            Shape::Scalar => "T",
        }
    }
}

/// A member-only value; it has no contents to read.
#[derive(Debug, Clone)]
struct SyntheticValue
{
    name: String,
    shape: Shape,
}

impl SyntheticValue
{
    fn boxed(name: &str, shape: Shape) -> Box<dyn HostValue>
    {
        Box::new(Self {
            name: name.to_string(),
            shape,
        })
    }
}

impl HostValue for SyntheticValue
{
    fn name(&self) -> Option<String>
    {
        Some(self.name.clone())
    }

    fn type_name(&self) -> Option<String>
    {
        Some(self.shape.type_name().to_string())
    }

    fn value(&self) -> Option<String>
    {
        None
    }

    fn summary(&self) -> Option<String>
    {
        None
    }

    fn value_as_unsigned(&self) -> Option<u64>
    {
        None
    }

    fn num_children(&self) -> usize
    {
        self.shape.members().len()
    }

    fn child_at_index(&self, index: usize) -> Option<Box<dyn HostValue + '_>>
    {
        let (name, shape) = self.shape.members().get(index)?;
        Some(Self::boxed(name, *shape))
    }

    fn child_member_with_name(&self, name: &str) -> Option<Box<dyn HostValue + '_>>
    {
        let (name, shape) = self.shape.members().iter().find(|(member, _)| *member == name)?;
        Some(Self::boxed(name, *shape))
    }

    fn dereference(&self) -> Option<Box<dyn HostValue + '_>>
    {
        None
    }

    fn read_memory(&self, _address: u64, _len: usize) -> Option<Vec<u8>>
    {
        None
    }

    fn read_c_string(&self, _address: u64, _max_len: usize) -> Option<Vec<u8>>
    {
        None
    }
}

/// Frame holding only the declared variables. Nothing evaluates.
#[derive(Debug, Default)]
pub struct DeclaredFrame
{
    variables: Vec<(String, Shape)>,
}

impl DeclaredFrame
{
    pub fn declare(&mut self, names: &[String], shape: Shape)
    {
        self.variables
            .extend(names.iter().map(|name| (name.clone(), shape)));
    }
}

impl HostFrame for DeclaredFrame
{
    fn find_variable(&self, name: &str) -> Option<Box<dyn HostValue + '_>>
    {
        let (name, shape) = self.variables.iter().rev().find(|(declared, _)| declared == name)?;
        Some(SyntheticValue::boxed(name, *shape))
    }

    fn evaluate(&self, expression: &str, _timeout: Duration) -> Result<Box<dyn HostValue + '_>, String>
    {
        Err(format!("no process to evaluate '{expression}' in"))
    }
}
