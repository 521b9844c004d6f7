//! Parameter codec adapter
//!
//! Describes the input and output layout of one method and turns a decoding
//! cursor into the method's argument vector.

use dcom_ndr::{
    DecodingCursor, Flags, NdrError, NdrWriter, SessionContext, Shape, Value, ValueKind,
};

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Wire layout
    pub shape: Shape,
    /// Representation flags applied when the parameter is read or written
    pub flags: Flags,
}

/// Input and output layout of a method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamsDescriptor {
    inputs: Vec<Param>,
    outputs: Vec<Param>,
}

impl ParamsDescriptor {
    /// Empty descriptor (no arguments, no declared outputs)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input parameter
    pub fn input(mut self, shape: Shape, flags: Flags) -> Self {
        self.inputs.push(Param { shape, flags });
        self
    }

    /// Append an output parameter
    pub fn output(mut self, shape: Shape, flags: Flags) -> Self {
        self.outputs.push(Param { shape, flags });
        self
    }

    pub fn inputs(&self) -> &[Param] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Param] {
        &self.outputs
    }

    /// Kinds of the input parameters, in order
    ///
    /// Handlers are looked up by method name together with this signature.
    pub fn signature(&self) -> Vec<ValueKind> {
        self.inputs.iter().map(|p| ValueKind::from(&p.shape)).collect()
    }

    /// Read the argument vector from `cursor`, in declaration order
    pub fn read(
        &self,
        cursor: &mut dyn DecodingCursor,
        session: Option<&SessionContext>,
    ) -> dcom_ndr::Result<Vec<Value>> {
        let mut args = Vec::with_capacity(self.inputs.len());
        for param in &self.inputs {
            args.push(cursor.read(&param.shape, param.flags, session)?);
        }
        Ok(args)
    }
}

/// Write `values` laid out as `outputs`
///
/// A method without declared outputs has every value written with its
/// inferred shape. Otherwise there must be one declared shape per value.
pub(crate) fn write_results(
    values: &[Value],
    outputs: &[Param],
    writer: &mut NdrWriter,
) -> dcom_ndr::Result<()> {
    if outputs.is_empty() {
        for value in values {
            writer.write_inferred(value)?;
        }
        return Ok(());
    }
    if outputs.len() != values.len() {
        return Err(NdrError::ArraySizeMismatch {
            expected: outputs.len(),
            got: values.len(),
        });
    }
    for (value, param) in values.iter().zip(outputs) {
        writer.write(value, &param.shape, param.flags)?;
    }
    Ok(())
}
