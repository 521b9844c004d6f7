//! IDispatch methods serviced by the engine itself
//!
//! GetIDsOfNames and Invoke are decoded here; GetTypeInfoCount and
//! GetTypeInfo need no arguments and are answered by the caller.

use dcom_ndr::{DecodingCursor, Flags, SessionContext, Shape, StringRepr, Value};
use tracing::debug;

use super::EncodedResults;
use crate::catalog::{MethodDescriptor, ParamsDescriptor};
use crate::interface::InterfaceDefinition;
use crate::types::{hresult, DispatchError, Result};

/// GetIDsOfNames(riid, rgszNames, cNames, lcid)
fn ids_of_names_params() -> ParamsDescriptor {
    ParamsDescriptor::new()
        .input(Shape::Uuid, Flags::NULL)
        .input(
            Shape::conformant_array(Shape::String(StringRepr::Wide)),
            Flags::NULL,
        )
        .input(Shape::I32, Flags::NULL)
        .input(Shape::I32, Flags::NULL)
}

/// DISPPARAMS { rgvarg, rgdispidNamedArgs, cArgs, cNamedArgs }
pub(crate) fn dispparams_shape() -> Shape {
    Shape::Struct(vec![
        Shape::pointer(Shape::conformant_array(Shape::Variant)),
        Shape::pointer(Shape::conformant_array(Shape::I32)),
        Shape::I32,
        Shape::I32,
    ])
}

/// Invoke(dispIdMember, riid, lcid, dwFlags, pDispParams, cVarRef, rgVarRefIdx, rgVarRef)
fn invoke_params() -> ParamsDescriptor {
    ParamsDescriptor::new()
        .input(Shape::I32, Flags::NULL)
        .input(Shape::Uuid, Flags::NULL)
        .input(Shape::I32, Flags::NULL)
        .input(Shape::I32, Flags::NULL)
        .input(dispparams_shape(), Flags::REPRESENTATION_DISPATCH_INVOKE)
        .input(Shape::I32, Flags::NULL)
        .input(Shape::conformant_array(Shape::I32), Flags::NULL)
        .input(Shape::conformant_array(Shape::Variant), Flags::NULL)
}

/// Resolve a method name to the DISPID that Invoke accepts
///
/// The reply is one array: the member id (or `DISP_E_UNKNOWNNAME`) followed by
/// `0, 1, ...` for each parameter name. An unknown name is still a
/// successful call.
pub(crate) fn ids_of_names(
    definition: &InterfaceDefinition,
    cursor: &mut dyn DecodingCursor,
    session: Option<&SessionContext>,
) -> Result<EncodedResults> {
    let mut decoded = ids_of_names_params().read(cursor, session)?;
    let names = match decoded.swap_remove(1) {
        Value::Array(names) => names,
        other => {
            return Err(DispatchError::invalid_argument(format!(
                "expected name array, got {}",
                other.kind()
            )))
        }
    };

    let method = names
        .first()
        .ok_or_else(|| DispatchError::invalid_argument("GetIDsOfNames without a name"))?
        .as_str()
        .ok_or_else(|| DispatchError::invalid_argument("method name is not a string"))?;

    let member_id = definition
        .catalog()
        .lookup_by_name(method)
        .and_then(MethodDescriptor::member_id);
    let head = match member_id {
        Some(member_id) => member_id,
        None => {
            debug!("GetIDsOfNames: {} unknown on {}", method, definition.iid());
            hresult::DISP_E_UNKNOWNNAME as i32
        }
    };

    let mut ids = Vec::with_capacity(names.len());
    ids.push(Value::I32(head));
    ids.extend((1..names.len()).map(|i| Value::I32(i as i32 - 1)));
    Ok(EncodedResults::new(vec![Value::Array(ids)]))
}

/// Decode an Invoke request into the target method and its arguments
///
/// Positional arguments arrive last-to-first; the returned vector is in the
/// method's declaration order, with by-reference values substituted at the
/// positions listed in `rgVarRefIdx`.
pub(crate) fn invoke_arguments<'a>(
    definition: &'a InterfaceDefinition,
    cursor: &mut dyn DecodingCursor,
    session: Option<&SessionContext>,
) -> Result<(&'a MethodDescriptor, Vec<Value>)> {
    let decoded = invoke_params().read(cursor, session)?;
    let [dispid, _riid, _lcid, _flags, dispparams, var_ref_count, var_ref_idx, var_ref]: [Value; 8] =
        decoded
            .try_into()
            .map_err(|_| DispatchError::invalid_argument("malformed Invoke request"))?;

    let dispid = int(&dispid, "dispIdMember")?;
    let descriptor = definition
        .catalog()
        .lookup_by_member_id(dispid)
        .ok_or(DispatchError::MemberNotFound(dispid))?;

    let mut args = positional_arguments(dispparams)?;

    if int(&var_ref_count, "cVarRef")? != 0 {
        let indices = array(var_ref_idx, "rgVarRefIdx")?;
        let values = array(var_ref, "rgVarRef")?;
        if indices.len() != values.len() {
            return Err(DispatchError::invalid_argument(format!(
                "{} by-reference indices for {} values",
                indices.len(),
                values.len()
            )));
        }
        let count = args.len();
        for (index, value) in indices.iter().zip(values) {
            let index = int(index, "rgVarRefIdx element")?;
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| args.get_mut(i))
                .ok_or_else(|| {
                    DispatchError::invalid_argument(format!(
                        "by-reference index {} outside {} argument(s)",
                        index, count
                    ))
                })?;
            *slot = value.into_inner();
        }
    }

    args.reverse();
    debug!(
        "Invoke DISPID {} -> {} with {} argument(s)",
        dispid,
        descriptor.name(),
        args.len()
    );
    Ok((descriptor, args))
}

/// Unwrapped variants of `rgvarg`, empty when the pointer is null
fn positional_arguments(dispparams: Value) -> Result<Vec<Value>> {
    let members = match dispparams {
        Value::Struct(members) => members,
        other => {
            return Err(DispatchError::invalid_argument(format!(
                "expected DISPPARAMS, got {}",
                other.kind()
            )))
        }
    };
    match members.into_iter().next() {
        Some(Value::Pointer(None)) => Ok(Vec::new()),
        Some(Value::Pointer(Some(referent))) => Ok(array(*referent, "rgvarg")?
            .into_iter()
            .map(Value::into_inner)
            .collect()),
        _ => Err(DispatchError::invalid_argument("DISPPARAMS without rgvarg")),
    }
}

fn int(value: &Value, what: &str) -> Result<i32> {
    value
        .as_i32()
        .ok_or_else(|| DispatchError::invalid_argument(format!("{} is not a long", what)))
}

fn array(value: Value, what: &str) -> Result<Vec<Value>> {
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(DispatchError::invalid_argument(format!(
            "{} is not an array (got {})",
            what,
            other.kind()
        ))),
    }
}
