//! Servant host
//!
//! Hosting-framework glue between a transport and [`LocalServant`]s: exports
//! interfaces under fresh IPIDs, owns the resulting interface pointer
//! records, and turns request stubs into response stubs.
//!
//! # Example
//!
//! ```ignore
//! let host = ServantHost::new(HostConfig::default());
//! let servant = Arc::new(LocalServant::new(definition));
//! let pointer = host.export(&servant, CALCULATOR_IID).unwrap();
//! let response = host.dispatch(pointer.ipid(), 3, request_stub)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use dcom_ndr::{Flags, NdrCursor, NdrWriter, SessionContext, Shape, Value};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::servant::LocalServant;
use crate::types::{hresult, DispatchError, Iid, InterfacePointer, Ipid, Oid, Result};

/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Byte order of request and response stubs
    pub little_endian: bool,
    /// Append an `S_OK` status word after the results of a successful call
    pub append_status: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            little_endian: true,
            append_status: true,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stub byte order
    pub fn little_endian(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    /// Set whether successful responses end with a status word
    pub fn append_status(mut self, append: bool) -> Self {
        self.append_status = append;
        self
    }
}

struct Export {
    servant: Arc<LocalServant>,
    pointer: Arc<InterfacePointer>,
}

/// Hosts servants for one session
pub struct ServantHost {
    config: HostConfig,
    session: SessionContext,
    exports: RwLock<HashMap<Ipid, Export>>,
}

impl ServantHost {
    /// Create a host with a fresh session
    pub fn new(config: HostConfig) -> Self {
        Self::with_session(config, SessionContext::new())
    }

    /// Create a host bound to an existing session
    pub fn with_session(config: HostConfig, session: SessionContext) -> Self {
        Self {
            config,
            session,
            exports: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Export `iid` of `servant` under a new IPID
    ///
    /// The first export of a servant assigns its OID and session. Returns
    /// `None` when the servant does not support `iid`.
    pub fn export(&self, servant: &Arc<LocalServant>, iid: impl Into<Iid>) -> Option<InterfacePointer> {
        let iid = iid.into();
        if !servant.is_supported(&iid) {
            debug!("servant {} does not support {}", servant.id(), iid);
            return None;
        }

        let mut exports = self.exports.write();

        if !servant.is_already_exported() {
            servant.set_object_id(Oid::generate());
            servant.set_session(self.session.clone());
            info!(
                "first export of servant {} (OID {:?})",
                servant.id(),
                servant.object_id()
            );
        }

        let ipid = Ipid::generate();
        let pointer = Arc::new(InterfacePointer::new(
            iid.clone(),
            ipid.clone(),
            servant.object_id(),
        ));
        let stale = servant.ipid_for(&iid);
        servant.associate_pointer(&pointer);

        if let Some(stale) = stale {
            exports.remove(&stale);
        }
        exports.insert(
            ipid.clone(),
            Export {
                servant: servant.clone(),
                pointer: pointer.clone(),
            },
        );
        info!("exported {} of servant {} as {}", iid, servant.id(), ipid);

        Some(InterfacePointer::clone(&pointer))
    }

    /// Drop the record for `ipid`; returns whether it was exported
    pub fn release(&self, ipid: &Ipid) -> bool {
        let released = self.exports.write().remove(ipid);
        match released {
            Some(export) => {
                debug!("released {} ({})", ipid, export.pointer.iid());
                true
            }
            None => false,
        }
    }

    /// Servant exported under `ipid`
    pub fn servant_for(&self, ipid: &Ipid) -> Option<Arc<LocalServant>> {
        self.exports.read().get(ipid).map(|e| e.servant.clone())
    }

    /// Number of live exports
    pub fn export_count(&self) -> usize {
        self.exports.read().len()
    }

    /// Service one request stub
    ///
    /// The response holds the encoded results, followed by `S_OK` when
    /// [`HostConfig::append_status`] is set.
    pub fn dispatch(&self, ipid: &Ipid, opnum: u16, stub: Bytes) -> Result<Bytes> {
        let servant = self
            .servant_for(ipid)
            .ok_or_else(|| DispatchError::InvalidObjectReference(ipid.clone()))?;

        let mut cursor = NdrCursor::with_byte_order(stub, self.config.little_endian);
        let results = servant.dispatch(ipid, u32::from(opnum), &mut cursor)?;

        let mut writer = NdrWriter::with_byte_order(self.config.little_endian);
        results
            .encode(&mut writer)
            .map_err(|e| DispatchError::unexpected_with("cannot encode results", e))?;
        if self.config.append_status {
            writer
                .write(&Value::U32(hresult::S_OK), &Shape::U32, Flags::NULL)
                .map_err(|e| DispatchError::unexpected_with("cannot encode status", e))?;
        }
        Ok(writer.finish())
    }

    /// Response stub for a failed call: the HRESULT of `error`
    pub fn encode_fault(&self, error: &DispatchError) -> Bytes {
        let code = error.hresult();
        let bytes = if self.config.little_endian {
            code.to_le_bytes()
        } else {
            code.to_be_bytes()
        };
        Bytes::copy_from_slice(&bytes)
    }
}
