//! Invocation of a resolved method against the bound callee

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use dcom_ndr::Value;
use tracing::{debug, warn};

use super::EncodedResults;
use crate::catalog::MethodDescriptor;
use crate::interface::{CallError, InterfaceDefinition};
use crate::types::{DispatchError, Result};

pub(crate) fn invoke(
    definition: &InterfaceDefinition,
    descriptor: &MethodDescriptor,
    args: Vec<Value>,
) -> Result<EncodedResults> {
    let iid = definition.iid();
    let callee = definition.callee().ok_or_else(|| {
        warn!("{}: no instance or type bound", iid);
        DispatchError::unexpected(format!("no callee bound to {}", iid))
    })?;

    let signature = descriptor.params().signature();
    let handler = callee
        .handler(descriptor.name(), &signature)
        .ok_or_else(|| {
            warn!("{}: no handler for {}{:?}", iid, descriptor.name(), signature);
            DispatchError::ProcedureOutOfRange(format!(
                "{} has no handler for {}",
                iid,
                descriptor.name()
            ))
        })?;

    if args.len() != signature.len() {
        return Err(DispatchError::invalid_argument(format!(
            "{} takes {} argument(s), got {}",
            descriptor.name(),
            signature.len(),
            args.len()
        )));
    }
    if let Some((position, (kind, arg))) = signature
        .iter()
        .zip(&args)
        .enumerate()
        .find(|(_, (kind, arg))| !kind.accepts(arg))
    {
        return Err(DispatchError::invalid_argument(format!(
            "{} argument {}: expected {}, got {}",
            descriptor.name(),
            position,
            kind,
            arg.kind()
        )));
    }

    debug!("invoking {} on {} ({:?})", descriptor.name(), iid, callee.kind());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(args)));

    let reply = match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(CallError::Construct(err))) => {
            warn!("{}: cannot construct callee: {}", iid, err);
            return Err(DispatchError::from_construction(iid, err));
        }
        Ok(Err(CallError::Invoke(err))) => {
            warn!("{}: {} failed: {}", iid, descriptor.name(), err);
            return Err(err.into());
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("{}: {} panicked: {}", iid, descriptor.name(), message);
            return Err(DispatchError::unexpected(format!(
                "{} panicked: {}",
                descriptor.name(),
                message
            )));
        }
    };

    Ok(EncodedResults::with_layout(
        reply.into_values(),
        descriptor.params().outputs().to_vec(),
    ))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
