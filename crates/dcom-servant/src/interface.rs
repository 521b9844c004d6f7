//! Interface definitions and their dispatch tables
//!
//! An [`InterfaceDefinition`] pairs a method catalog with the object that
//! services it. Methods are bound through a [`MethodTable`]: a static table of
//! handlers keyed by method name and argument signature, built once when the
//! callee is attached.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dcom_ndr::{Value, ValueKind};

use crate::catalog::{MethodCatalog, MethodDescriptor};
use crate::types::{ConfigError, Iid, InvokeError};

/// Calling convention of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallingConvention {
    /// IUnknown-derived: user methods start at opnum 3
    FixedTable,
    /// IDispatch-derived: opnums 3..=6 are the IDispatch methods, user methods start at 7
    LateBound,
}

/// Value returned by a bound method
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// No result
    Void,
    /// A single result
    Single(Value),
    /// Several results, passed through as-is
    Multiple(Vec<Value>),
}

impl Reply {
    /// Normalize into a result vector
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Reply::Void => Vec::new(),
            Reply::Single(value) => vec![value],
            Reply::Multiple(values) => values,
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Single(value)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Void
    }
}

/// Result of a bound method
pub type InvokeResult = Result<Reply, InvokeError>;

type Handler<T> = Arc<dyn Fn(&T, Vec<Value>) -> InvokeResult + Send + Sync>;

/// Handlers for one receiver type, keyed by name and argument signature
pub struct MethodTable<T> {
    entries: Vec<(String, Vec<ValueKind>, Handler<T>)>,
}

impl<T: Send + Sync + 'static> MethodTable<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Add a handler for `name` taking arguments of the given kinds
    pub fn method<F>(mut self, name: &str, signature: &[ValueKind], handler: F) -> Self
    where
        F: Fn(&T, Vec<Value>) -> InvokeResult + Send + Sync + 'static,
    {
        self.entries
            .push((name.to_string(), signature.to_vec(), Arc::new(handler)));
        self
    }
}

impl<T: Send + Sync + 'static> Default for MethodTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure of a bound call before or during the method body
pub(crate) enum CallError {
    /// The callee could not be constructed
    Construct(InvokeError),
    /// The method returned an error
    Invoke(InvokeError),
}

/// Handler with its receiver already captured
pub(crate) type BoundHandler = Arc<dyn Fn(Vec<Value>) -> Result<Reply, CallError> + Send + Sync>;

/// How the receiver of a call is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalleeKind {
    /// One shared instance
    Instance,
    /// A fresh instance constructed per call
    Type,
}

pub(crate) struct Callee {
    kind: CalleeKind,
    handlers: HashMap<String, Vec<(Vec<ValueKind>, BoundHandler)>>,
}

impl Callee {
    pub(crate) fn kind(&self) -> CalleeKind {
        self.kind
    }

    /// Handler registered under `name` with exactly `signature`
    pub(crate) fn handler(&self, name: &str, signature: &[ValueKind]) -> Option<&BoundHandler> {
        self.handlers
            .get(name)?
            .iter()
            .find(|(sig, _)| sig.as_slice() == signature)
            .map(|(_, handler)| handler)
    }

    fn build<T, R>(kind: CalleeKind, table: MethodTable<T>, receiver: R) -> Self
    where
        T: Send + Sync + 'static,
        R: Fn() -> Result<Arc<T>, InvokeError> + Send + Sync + 'static,
    {
        let receiver = Arc::new(receiver);
        let mut handlers: HashMap<String, Vec<(Vec<ValueKind>, BoundHandler)>> = HashMap::new();
        for (name, signature, handler) in table.entries {
            let receiver = receiver.clone();
            let bound: BoundHandler = Arc::new(move |args: Vec<Value>| -> Result<Reply, CallError> {
                let target = receiver().map_err(CallError::Construct)?;
                handler(&*target, args).map_err(CallError::Invoke)
            });
            handlers.entry(name).or_default().push((signature, bound));
        }
        Self { kind, handlers }
    }
}

/// One interface a servant exposes
pub struct InterfaceDefinition {
    iid: Iid,
    convention: CallingConvention,
    catalog: MethodCatalog,
    callee: Option<Callee>,
}

impl InterfaceDefinition {
    /// Create an empty definition
    pub fn new(iid: impl Into<Iid>, convention: CallingConvention) -> Self {
        let iid = iid.into();
        Self {
            catalog: MethodCatalog::new(iid.clone()),
            iid,
            convention,
            callee: None,
        }
    }

    /// IUnknown-derived interface
    pub fn fixed_table(iid: impl Into<Iid>) -> Self {
        Self::new(iid, CallingConvention::FixedTable)
    }

    /// IDispatch-derived interface
    pub fn late_bound(iid: impl Into<Iid>) -> Self {
        Self::new(iid, CallingConvention::LateBound)
    }

    pub fn iid(&self) -> &Iid {
        &self.iid
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn is_late_bound(&self) -> bool {
        self.convention == CallingConvention::LateBound
    }

    pub fn catalog(&self) -> &MethodCatalog {
        &self.catalog
    }

    /// Register a method in this interface's catalog
    pub fn add_method(&mut self, descriptor: MethodDescriptor) -> Result<u32, ConfigError> {
        self.catalog.register(descriptor)
    }

    /// Service calls with one shared instance
    pub fn bind_instance<T>(&mut self, instance: Arc<T>, table: MethodTable<T>)
    where
        T: Send + Sync + 'static,
    {
        let receiver = move || Ok(instance.clone());
        self.callee = Some(Callee::build(CalleeKind::Instance, table, receiver));
    }

    /// Service each call with a freshly defaulted `T`
    pub fn bind_type<T>(&mut self, table: MethodTable<T>)
    where
        T: Default + Send + Sync + 'static,
    {
        self.bind_constructor(|| Ok(T::default()), table);
    }

    /// Service each call with a `T` built by `constructor`
    ///
    /// A constructor failure fails the call; `InvokeError::AccessDenied` is
    /// reported as access denied, anything else as unexpected.
    pub fn bind_constructor<T, C>(&mut self, constructor: C, table: MethodTable<T>)
    where
        T: Send + Sync + 'static,
        C: Fn() -> Result<T, InvokeError> + Send + Sync + 'static,
    {
        let receiver = move || constructor().map(Arc::new);
        self.callee = Some(Callee::build(CalleeKind::Type, table, receiver));
    }

    /// Whether an instance or type has been bound
    pub fn has_callee(&self) -> bool {
        self.callee.is_some()
    }

    pub fn callee_kind(&self) -> Option<CalleeKind> {
        self.callee.as_ref().map(Callee::kind)
    }

    pub(crate) fn callee(&self) -> Option<&Callee> {
        self.callee.as_ref()
    }
}

impl fmt::Debug for InterfaceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceDefinition")
            .field("iid", &self.iid)
            .field("convention", &self.convention)
            .field("methods", &self.catalog.len())
            .field("callee", &self.callee_kind())
            .finish()
    }
}
