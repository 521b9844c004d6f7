//! Local servant
//!
//! A [`LocalServant`] binds one primary interface definition (plus any added
//! ones) to the identities it has been exported under. It is the entry point
//! the hosting framework calls into for every incoming request.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dcom_ndr::{DecodingCursor, SessionContext};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::dispatch::{self, EncodedResults};
use crate::identity::IdentityMapper;
use crate::interface::InterfaceDefinition;
use crate::types::{Iid, InterfacePointer, Ipid, Oid, Result, ServantId};

#[derive(Debug)]
struct InterfaceSet {
    supported: Vec<Iid>,
    events: Vec<Iid>,
    definitions: HashMap<Iid, Arc<InterfaceDefinition>>,
}

impl InterfaceSet {
    /// Add `iid` to the supported list, keeping registration order
    fn support(&mut self, iid: &Iid) {
        if !self.supported.contains(iid) {
            self.supported.push(iid.clone());
        }
    }

    fn add_event(&mut self, iid: &Iid) {
        self.support(iid);
        if !self.events.contains(iid) {
            self.events.push(iid.clone());
        }
    }
}

/// Servant registry entry
///
/// Lock order: interface set, then identities.
#[derive(Debug)]
pub struct LocalServant {
    id: ServantId,
    primary: Arc<InterfaceDefinition>,
    real_iid: bool,
    interfaces: RwLock<InterfaceSet>,
    identities: IdentityMapper,
    exported: AtomicBool,
    pointer: Mutex<Weak<InterfacePointer>>,
    session: OnceLock<SessionContext>,
    oid: OnceLock<Oid>,
}

impl LocalServant {
    /// Create a servant for `primary`
    pub fn new(primary: InterfaceDefinition) -> Self {
        Self::with_real_iid(primary, false)
    }

    /// Create a servant, choosing whether the transport binds under the
    /// primary IID instead of IUnknown
    pub fn with_real_iid(primary: InterfaceDefinition, real_iid: bool) -> Self {
        let primary = Arc::new(primary);
        let primary_iid = primary.iid().clone();

        let mut set = InterfaceSet {
            supported: Vec::new(),
            events: Vec::new(),
            definitions: HashMap::new(),
        };
        set.support(&Iid::idispatch());
        set.support(&Iid::iremunknown());
        set.support(&primary_iid);
        set.definitions.insert(primary_iid, primary.clone());

        Self {
            id: ServantId::generate(),
            primary,
            real_iid,
            interfaces: RwLock::new(set),
            identities: IdentityMapper::new(),
            exported: AtomicBool::new(false),
            pointer: Mutex::new(Weak::new()),
            session: OnceLock::new(),
            oid: OnceLock::new(),
        }
    }

    pub fn id(&self) -> ServantId {
        self.id
    }

    /// IID of the primary interface
    pub fn primary_iid(&self) -> &Iid {
        self.primary.iid()
    }

    pub fn primary_definition(&self) -> Arc<InterfaceDefinition> {
        self.primary.clone()
    }

    /// Whether the transport binds under the primary IID
    pub fn is_under_real_iid(&self) -> bool {
        self.real_iid
    }

    /// Register interfaces used only to receive event callbacks
    ///
    /// They are serviced by the primary definition.
    pub fn set_supported_event_interfaces<I, S>(&self, iids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Iid>,
    {
        let mut set = self.interfaces.write();
        for iid in iids {
            let iid = iid.into();
            set.add_event(&iid);
            set.definitions.insert(iid, self.primary.clone());
        }
    }

    /// Attach another interface with its own catalog and callee
    pub fn add_interface_definition(&self, definition: InterfaceDefinition) {
        let iid = definition.iid().clone();
        debug!("servant {}: adding interface {}", self.id, iid);
        let mut set = self.interfaces.write();
        set.add_event(&iid);
        set.definitions.insert(iid, Arc::new(definition));
    }

    /// Supported IIDs in registration order, IDispatch and IRemUnknown first
    pub fn supported_interfaces(&self) -> Vec<Iid> {
        self.interfaces.read().supported.clone()
    }

    pub fn event_interfaces(&self) -> Vec<Iid> {
        self.interfaces.read().events.clone()
    }

    pub fn is_event_interface(&self, iid: impl Into<Iid>) -> bool {
        self.interfaces.read().events.contains(&iid.into())
    }

    /// Whether `iid` is supported (case-insensitive)
    pub fn is_supported(&self, iid: impl Into<Iid>) -> bool {
        self.interfaces.read().supported.contains(&iid.into())
    }

    /// Bind `iid` to `ipid`
    ///
    /// Returns `false` without touching any binding when `iid` is not
    /// supported. A previous IPID of `iid` stops resolving.
    pub fn export(&self, iid: impl Into<Iid>, ipid: impl Into<Ipid>) -> bool {
        let iid = iid.into();
        let ipid = ipid.into();

        let set = self.interfaces.read();
        if !set.supported.contains(&iid) {
            debug!("servant {}: refusing export of unsupported {}", self.id, iid);
            return false;
        }
        if let Some(retired) = self.identities.bind(iid.clone(), ipid.clone()) {
            debug!("servant {}: {} re-exported, retired {}", self.id, iid, retired);
        }
        drop(set);

        self.exported.store(true, Ordering::Release);
        true
    }

    /// Definition registered for `iid`
    pub fn interface_definition_for(&self, iid: impl Into<Iid>) -> Option<Arc<InterfaceDefinition>> {
        self.interfaces.read().definitions.get(&iid.into()).cloned()
    }

    /// Definition of the interface `ipid` is bound to
    pub fn interface_definition_for_ipid(&self, ipid: impl Into<Ipid>) -> Option<Arc<InterfaceDefinition>> {
        let set = self.interfaces.read();
        let iid = self.identities.resolve_interface(&ipid.into())?;
        set.definitions.get(&iid).cloned()
    }

    /// IPID `iid` is currently exported under
    pub fn ipid_for(&self, iid: impl Into<Iid>) -> Option<Ipid> {
        self.identities.resolve_instance(&iid.into())
    }

    /// IID bound to `ipid`
    pub fn iid_for(&self, ipid: impl Into<Ipid>) -> Option<Iid> {
        self.identities.resolve_interface(&ipid.into())
    }

    /// Snapshot of the current IID/IPID bindings
    pub fn exports(&self) -> Vec<(Iid, Ipid)> {
        self.identities.bindings()
    }

    /// Associate the exported pointer record owned by the hosting framework
    ///
    /// Binds the pointer's IID and IPID and marks the servant exported. Only a
    /// weak reference is kept.
    pub fn associate_pointer(&self, pointer: &Arc<InterfacePointer>) {
        let _set = self.interfaces.read();
        self.identities
            .bind(pointer.iid().clone(), pointer.ipid().clone());
        *self.pointer.lock() = Arc::downgrade(pointer);
        self.exported.store(true, Ordering::Release);
    }

    /// Whether the associated pointer record is still owned elsewhere
    pub fn is_associated_reference_alive(&self) -> bool {
        self.pointer.lock().strong_count() > 0
    }

    /// Whether any identity has ever been bound
    pub fn is_already_exported(&self) -> bool {
        self.exported.load(Ordering::Acquire)
    }

    /// Set the session context; returns `false` if one was already set
    pub fn set_session(&self, session: SessionContext) -> bool {
        self.session.set(session).is_ok()
    }

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.get()
    }

    /// Set the object id; returns `false` if one was already set
    pub fn set_object_id(&self, oid: Oid) -> bool {
        self.oid.set(oid).is_ok()
    }

    pub fn object_id(&self) -> Option<Oid> {
        self.oid.get().copied()
    }

    /// Service one call arriving on `ipid`
    pub fn dispatch(
        &self,
        ipid: &Ipid,
        opnum: u32,
        cursor: &mut dyn DecodingCursor,
    ) -> Result<EncodedResults> {
        dispatch::dispatch(self, ipid, opnum, cursor)
    }
}

impl PartialEq for LocalServant {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalServant {}

impl Hash for LocalServant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
