//! Dispatch engine
//!
//! Routes one incoming call `(IPID, opnum, cursor)` to a bound method:
//!
//! 1. IPID -> IID through the servant's identity map
//! 2. IID -> interface definition (primary definition as fallback)
//! 3. classify the opnum by the definition's calling convention
//! 4. decode arguments, invoke, normalize the reply
//!
//! Every failure leaves this module as a [`DispatchError`].

mod invoke;
mod late_bound;

use dcom_ndr::{DecodingCursor, NdrWriter, SessionContext, Value};
use tracing::{debug, info, warn};

use crate::catalog::{write_results, Param};
use crate::interface::{CallingConvention, InterfaceDefinition};
use crate::servant::LocalServant;
use crate::types::{DispatchError, Ipid, Result};

/// Opnums taken by IUnknown (QueryInterface, AddRef, Release)
pub const IUNKNOWN_METHOD_COUNT: u32 = 3;

/// Opnums taken by IDispatch on top of IUnknown
pub const IDISPATCH_METHOD_COUNT: u32 = 4;

/// What an opnum asks for once the calling convention is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    /// IDispatch::GetTypeInfoCount
    TypeInfoCount,
    /// IDispatch::GetTypeInfo
    TypeInfo,
    /// IDispatch::GetIDsOfNames
    IdsOfNames,
    /// IDispatch::Invoke
    Invoke,
    /// Method at `ordinal` in the catalog
    Standard { ordinal: u32 },
}

/// Classify `opnum` under `convention`
///
/// Returns `None` for the IUnknown slots, which are never routed to user
/// methods.
pub fn classify(convention: CallingConvention, opnum: u32) -> Option<CallClass> {
    match convention {
        CallingConvention::FixedTable => opnum
            .checked_sub(IUNKNOWN_METHOD_COUNT)
            .map(|ordinal| CallClass::Standard { ordinal }),
        CallingConvention::LateBound => match opnum {
            3 => Some(CallClass::TypeInfoCount),
            4 => Some(CallClass::TypeInfo),
            5 => Some(CallClass::IdsOfNames),
            6 => Some(CallClass::Invoke),
            _ => opnum
                .checked_sub(IDISPATCH_METHOD_COUNT + IUNKNOWN_METHOD_COUNT)
                .map(|ordinal| CallClass::Standard { ordinal }),
        },
    }
}

/// Result vector of a successful call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedResults {
    values: Vec<Value>,
    layout: Vec<Param>,
}

impl EncodedResults {
    /// Results written with inferred shapes
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            layout: Vec::new(),
        }
    }

    /// Results written with the method's declared output shapes
    pub fn with_layout(values: Vec<Value>, layout: Vec<Param>) -> Self {
        Self { values, layout }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Marshal the results into `writer`
    pub fn encode(&self, writer: &mut NdrWriter) -> dcom_ndr::Result<()> {
        write_results(&self.values, &self.layout, writer)
    }
}

pub(crate) fn dispatch(
    servant: &LocalServant,
    ipid: &Ipid,
    opnum: u32,
    cursor: &mut dyn DecodingCursor,
) -> Result<EncodedResults> {
    let iid = servant
        .iid_for(ipid)
        .ok_or_else(|| DispatchError::InvalidObjectReference(ipid.clone()))?;

    let definition = match servant.interface_definition_for(&iid) {
        Some(definition) => definition,
        None => {
            warn!(
                "servant {}: no definition for {}, falling back to primary {}",
                servant.id(),
                iid,
                servant.primary_iid()
            );
            servant.primary_definition()
        }
    };

    let class = classify(definition.convention(), opnum).ok_or_else(|| {
        DispatchError::ProcedureOutOfRange(format!("opnum {} is reserved on {}", opnum, iid))
    })?;
    debug!("dispatch {} opnum {} on {}: {:?}", ipid, opnum, iid, class);

    let session = servant.session();
    let result = match class {
        CallClass::TypeInfoCount => Ok(EncodedResults::new(vec![Value::I32(0)])),
        CallClass::TypeInfo => Err(DispatchError::NotImplemented(format!(
            "GetTypeInfo on {}",
            iid
        ))),
        CallClass::IdsOfNames => late_bound::ids_of_names(&definition, cursor, session),
        CallClass::Invoke => late_bound::invoke_arguments(&definition, cursor, session)
            .and_then(|(descriptor, args)| invoke::invoke(&definition, descriptor, args)),
        CallClass::Standard { ordinal } => {
            if definition.is_late_bound() {
                info!("standard call on {}: opnum {} -> ordinal {}", iid, opnum, ordinal);
            }
            standard_call(&definition, ordinal, cursor, session)
        }
    };

    if let Err(err) = &result {
        debug!("dispatch {} opnum {} failed: {}", ipid, opnum, err);
    }
    result
}

fn standard_call(
    definition: &InterfaceDefinition,
    ordinal: u32,
    cursor: &mut dyn DecodingCursor,
    session: Option<&SessionContext>,
) -> Result<EncodedResults> {
    let descriptor = definition
        .catalog()
        .lookup_by_ordinal(ordinal)
        .ok_or_else(|| {
            DispatchError::ProcedureOutOfRange(format!(
                "no method at ordinal {} on {}",
                ordinal,
                definition.iid()
            ))
        })?;
    let args = descriptor.params().read(cursor, session)?;
    invoke::invoke(definition, descriptor, args)
}
