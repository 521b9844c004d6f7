//! Dispatch Tests - End-to-end calls through a servant host
//!
//! Request stubs go in as bytes and response stubs (or fault codes) come
//! out, covering both calling conventions.

mod common;

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use common::*;
use dcom_servant::ndr::{
    DecodingCursor, Flags, NdrCursor, SessionContext, Shape, StringRepr, Value, ValueKind,
};
use dcom_servant::types::hresult;
use dcom_servant::{
    CallingConvention, ErrorKind, HostConfig, Ipid, LocalServant, MethodDescriptor, MethodTable,
    ParamsDescriptor, Reply, ServantHost,
};

const EVENTS_IID: &str = "6b0c4d2e-51a7-4c3e-9f20-e0e0e0e0e0e0";

fn counter_host(convention: CallingConvention) -> (ServantHost, Arc<LocalServant>, Arc<Counter>) {
    init_logging();
    let counter = Arc::new(Counter::default());
    let servant = Arc::new(LocalServant::new(counter_definition(
        COUNTER_IID,
        convention,
        counter.clone(),
    )));
    (ServantHost::new(HostConfig::default()), servant, counter)
}

fn read(response: Bytes, shapes: &[Shape]) -> Vec<Value> {
    let mut cursor = NdrCursor::new(response);
    let values = shapes
        .iter()
        .map(|shape| cursor.read(shape, Flags::NULL, None).unwrap())
        .collect();
    assert_eq!(cursor.remaining(), 0);
    values
}

#[test]
fn test_fixed_table_round_trip() {
    let (host, servant, counter) = counter_host(CallingConvention::FixedTable);
    let pointer = host.export(&servant, COUNTER_IID).unwrap();

    let response = host.dispatch(pointer.ipid(), 3, i32_stub(&[40])).unwrap();
    assert_eq!(read(response, &[Shape::I64, Shape::U32]), vec![Value::I64(40), Value::U32(0)]);

    host.dispatch(pointer.ipid(), 3, i32_stub(&[2])).unwrap();
    let response = host.dispatch(pointer.ipid(), 4, Bytes::new()).unwrap();
    assert_eq!(read(response, &[Shape::I64, Shape::U32])[0], Value::I64(42));
    assert_eq!(counter.total(), 42);
}

#[test]
fn test_fault_codes() {
    let (host, servant, _) = counter_host(CallingConvention::FixedTable);
    let pointer = host.export(&servant, COUNTER_IID).unwrap();

    let err = host.dispatch(&Ipid::generate(), 3, i32_stub(&[1])).unwrap_err();
    assert_eq!(host.encode_fault(&err), Bytes::copy_from_slice(&hresult::RPC_E_INVALID_OBJECT.to_le_bytes()));

    let err = host.dispatch(pointer.ipid(), 0, Bytes::new()).unwrap_err();
    assert_eq!(err.hresult(), hresult::RPC_S_PROCNUM_OUT_OF_RANGE);

    let err = host.dispatch(pointer.ipid(), 5, Bytes::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(err.hresult(), hresult::E_ACCESSDENIED);

    // Add without its argument
    let err = host.dispatch(pointer.ipid(), 3, Bytes::new()).unwrap_err();
    assert_eq!(err.hresult(), hresult::E_INVALIDARG);
}

#[test]
fn test_late_bound_round_trip() {
    let (host, servant, counter) = counter_host(CallingConvention::LateBound);
    let pointer = host.export(&servant, COUNTER_IID).unwrap();

    let response = host.dispatch(pointer.ipid(), 3, Bytes::new()).unwrap();
    assert_eq!(read(response, &[Shape::I32, Shape::U32])[0], Value::I32(0));

    let err = host.dispatch(pointer.ipid(), 4, Bytes::new()).unwrap_err();
    assert_eq!(err.hresult(), hresult::E_NOTIMPL);

    let response = host
        .dispatch(pointer.ipid(), 5, ids_of_names_stub(&["Add", "delta"]))
        .unwrap();
    let ids = read(response, &[Shape::conformant_array(Shape::I32), Shape::U32]);
    assert_eq!(ids[0], Value::Array(vec![Value::I32(0), Value::I32(0)]));

    let response = host
        .dispatch(pointer.ipid(), 6, invoke_stub(0, &[Value::I32(5)], &[]))
        .unwrap();
    assert_eq!(read(response, &[Shape::I64, Shape::U32])[0], Value::I64(5));

    // Direct call at opnum 7 + ordinal
    let response = host.dispatch(pointer.ipid(), 8, Bytes::new()).unwrap();
    assert_eq!(read(response, &[Shape::I64, Shape::U32])[0], Value::I64(5));
    assert_eq!(counter.total(), 5);
}

#[test]
fn test_late_bound_unknown_members() {
    let (host, servant, _) = counter_host(CallingConvention::LateBound);
    let pointer = host.export(&servant, COUNTER_IID).unwrap();

    let response = host
        .dispatch(pointer.ipid(), 5, ids_of_names_stub(&["Multiply"]))
        .unwrap();
    let ids = read(response, &[Shape::conformant_array(Shape::I32), Shape::U32]);
    assert_eq!(ids[0], Value::Array(vec![Value::I32(hresult::DISP_E_UNKNOWNNAME as i32)]));

    let err = host
        .dispatch(pointer.ipid(), 6, invoke_stub(42, &[], &[]))
        .unwrap_err();
    assert_eq!(err.hresult(), hresult::DISP_E_MEMBERNOTFOUND);
}

#[test]
fn test_invoke_argument_order() {
    init_logging();
    let seen = Arc::new(Mutex::new(Vec::<Vec<Value>>::new()));

    let mut def = dcom_servant::InterfaceDefinition::late_bound(COUNTER_IID);
    def.add_method(MethodDescriptor::new(
        "Concat",
        ParamsDescriptor::new()
            .input(Shape::String(StringRepr::Bstr), Flags::NULL)
            .input(Shape::I32, Flags::NULL)
            .input(Shape::String(StringRepr::Bstr), Flags::NULL)
            .output(Shape::String(StringRepr::Wide), Flags::NULL),
    ))
    .unwrap();
    def.bind_instance(
        seen.clone(),
        MethodTable::new().method(
            "Concat",
            &[ValueKind::String, ValueKind::I32, ValueKind::String],
            |seen: &Mutex<Vec<Vec<Value>>>, args| {
                let joined = format!(
                    "{}{}{}",
                    args[0].as_str().unwrap_or_default(),
                    args[1].as_i32().unwrap_or_default(),
                    args[2].as_str().unwrap_or_default()
                );
                seen.lock().push(args);
                Ok(Reply::Single(Value::wide(joined)))
            },
        ),
    );
    let host = ServantHost::new(HostConfig::default());
    let pointer = host.export(&Arc::new(LocalServant::new(def)), COUNTER_IID).unwrap();

    // Wire order is last-to-first
    let wire = [Value::bstr("c"), Value::I32(2), Value::bstr("a")];
    let response = host.dispatch(pointer.ipid(), 6, invoke_stub(0, &wire, &[])).unwrap();
    assert_eq!(
        read(response, &[Shape::String(StringRepr::Wide), Shape::U32])[0],
        Value::wide("a2c")
    );

    // By-reference value replaces wire slot 1 before reordering
    let response = host
        .dispatch(pointer.ipid(), 6, invoke_stub(0, &wire, &[(1, Value::I32(7))]))
        .unwrap();
    assert_eq!(
        read(response, &[Shape::String(StringRepr::Wide), Shape::U32])[0],
        Value::wide("a7c")
    );
    assert_eq!(seen.lock().len(), 2);

    let err = host
        .dispatch(pointer.ipid(), 6, invoke_stub(0, &wire, &[(5, Value::I32(7))]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_event_interface_uses_primary() {
    let (host, servant, counter) = counter_host(CallingConvention::FixedTable);
    servant.set_supported_event_interfaces([EVENTS_IID]);
    assert!(servant.is_event_interface(EVENTS_IID));

    let pointer = host.export(&servant, EVENTS_IID).unwrap();
    host.dispatch(pointer.ipid(), 3, i32_stub(&[9])).unwrap();
    assert_eq!(counter.total(), 9);
}

#[test]
fn test_host_session_reaches_servant() {
    init_logging();
    let session = SessionContext::with_peer("10.0.0.7:49152");
    let host = ServantHost::with_session(HostConfig::default(), session.clone());
    let servant = Arc::new(LocalServant::new(counter_definition(
        COUNTER_IID,
        CallingConvention::FixedTable,
        Arc::new(Counter::default()),
    )));

    host.export(&servant, COUNTER_IID).unwrap();
    assert_eq!(servant.session(), Some(&session));

    // A second host cannot rebind an exported servant
    let other = ServantHost::new(HostConfig::default());
    other.export(&servant, COUNTER_IID).unwrap();
    assert_eq!(servant.session(), Some(&session));
}

#[test]
fn test_release_and_reexport() {
    let (host, servant, _) = counter_host(CallingConvention::FixedTable);
    let first = host.export(&servant, COUNTER_IID).unwrap();
    let oid = first.oid();

    assert!(host.release(first.ipid()));
    assert!(!servant.is_associated_reference_alive());

    let second = host.export(&servant, COUNTER_IID).unwrap();
    assert_eq!(second.oid(), oid);
    assert!(servant.is_associated_reference_alive());
    assert!(host.dispatch(second.ipid(), 4, Bytes::new()).is_ok());
    assert!(host.dispatch(first.ipid(), 4, Bytes::new()).is_err());
}
