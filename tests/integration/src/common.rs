//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Once};

use bytes::Bytes;
use uuid::Uuid;

use dcom_servant::ndr::{Flags, NdrWriter, Shape, StringRepr, Value, ValueKind};
use dcom_servant::{
    CallingConvention, InterfaceDefinition, InvokeError, MethodDescriptor, MethodTable,
    ParamsDescriptor, Reply,
};

static INIT: Once = Once::new();

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Deterministic IID for the `n`th test interface
pub fn test_iid(n: usize) -> String {
    format!("6b0c4d2e-51a7-4c3e-9f20-{:012x}", n)
}

pub const COUNTER_IID: &str = "6b0c4d2e-51a7-4c3e-9f20-c0c0c0c0c0c0";

/// Success and failure counts shared between tasks
#[derive(Default)]
pub struct ConcurrentStats {
    success: AtomicU64,
    failure: AtomicU64,
}

impl ConcurrentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }
}

/// Running total shared by every call on one interface
#[derive(Default)]
pub struct Counter {
    total: AtomicI64,
}

impl Counter {
    pub fn total(&self) -> i64 {
        self.total.load(Ordering::SeqCst)
    }
}

/// Counter interface: `Add(long) -> hyper`, `Get() -> hyper`, `Fail()`
pub fn counter_definition(
    iid: &str,
    convention: CallingConvention,
    counter: Arc<Counter>,
) -> InterfaceDefinition {
    let mut def = InterfaceDefinition::new(iid, convention);
    def.add_method(MethodDescriptor::new(
        "Add",
        ParamsDescriptor::new()
            .input(Shape::I32, Flags::NULL)
            .output(Shape::I64, Flags::NULL),
    ))
    .unwrap();
    def.add_method(MethodDescriptor::new(
        "Get",
        ParamsDescriptor::new().output(Shape::I64, Flags::NULL),
    ))
    .unwrap();
    def.add_method(MethodDescriptor::new("Fail", ParamsDescriptor::new()))
        .unwrap();
    def.bind_instance(
        counter,
        MethodTable::new()
            .method("Add", &[ValueKind::I32], |c: &Counter, args| {
                let delta = args[0].as_i32().unwrap_or_default() as i64;
                let total = c.total.fetch_add(delta, Ordering::SeqCst) + delta;
                Ok(Reply::Single(Value::I64(total)))
            })
            .method("Get", &[], |c: &Counter, _| Ok(Value::I64(c.total()).into()))
            .method("Fail", &[], |_: &Counter, _| {
                Err(InvokeError::AccessDenied("counter is read-only".into()))
            }),
    );
    def
}

pub fn i32_stub(values: &[i32]) -> Bytes {
    let mut w = NdrWriter::new();
    for v in values {
        w.write(&Value::I32(*v), &Shape::I32, Flags::NULL).unwrap();
    }
    w.finish()
}

/// GetIDsOfNames request
pub fn ids_of_names_stub(names: &[&str]) -> Bytes {
    let mut w = NdrWriter::new();
    w.write(&Value::Uuid(Uuid::nil()), &Shape::Uuid, Flags::NULL).unwrap();
    w.write(
        &Value::Array(names.iter().map(|n| Value::wide(*n)).collect()),
        &Shape::conformant_array(Shape::String(StringRepr::Wide)),
        Flags::NULL,
    )
    .unwrap();
    w.write(&Value::I32(names.len() as i32), &Shape::I32, Flags::NULL).unwrap();
    w.write(&Value::I32(0), &Shape::I32, Flags::NULL).unwrap();
    w.finish()
}

/// Invoke request; `args` in wire order (last argument first)
pub fn invoke_stub(dispid: i32, args: &[Value], by_ref: &[(i32, Value)]) -> Bytes {
    let rgvarg = if args.is_empty() {
        Value::null_pointer()
    } else {
        Value::pointer(Value::Array(args.iter().cloned().map(Value::variant).collect()))
    };
    let dispparams = Value::Struct(vec![
        rgvarg,
        Value::null_pointer(),
        Value::I32(args.len() as i32),
        Value::I32(0),
    ]);
    let dispparams_shape = Shape::Struct(vec![
        Shape::pointer(Shape::conformant_array(Shape::Variant)),
        Shape::pointer(Shape::conformant_array(Shape::I32)),
        Shape::I32,
        Shape::I32,
    ]);

    let mut w = NdrWriter::new();
    w.write(&Value::I32(dispid), &Shape::I32, Flags::NULL).unwrap();
    w.write(&Value::Uuid(Uuid::nil()), &Shape::Uuid, Flags::NULL).unwrap();
    w.write(&Value::I32(0), &Shape::I32, Flags::NULL).unwrap();
    w.write(&Value::I32(1), &Shape::I32, Flags::NULL).unwrap();
    w.write(&dispparams, &dispparams_shape, Flags::REPRESENTATION_DISPATCH_INVOKE)
        .unwrap();
    w.write(&Value::I32(by_ref.len() as i32), &Shape::I32, Flags::NULL).unwrap();
    w.write(
        &Value::Array(by_ref.iter().map(|(i, _)| Value::I32(*i)).collect()),
        &Shape::conformant_array(Shape::I32),
        Flags::NULL,
    )
    .unwrap();
    w.write(
        &Value::Array(by_ref.iter().map(|(_, v)| Value::variant(v.clone())).collect()),
        &Shape::conformant_array(Shape::Variant),
        Flags::NULL,
    )
    .unwrap();
    w.finish()
}
