//! Servant demo
//!
//! Exports a small greeter servant on an in-process host and drives it with
//! hand-built request stubs, first through the fixed method table and then
//! through IDispatch.
//!
//! Run with: cargo run --bin servant-demo -- --name World

use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use dcom_servant::ndr::{DecodingCursor, Flags, NdrCursor, NdrWriter, Shape, StringRepr, Value, ValueKind};
use dcom_servant::{
    HostConfig, InterfaceDefinition, InvokeError, InvokeResult, LocalServant, MethodDescriptor,
    MethodTable, ParamsDescriptor, Reply, ServantHost,
};

const IGREETER_UUID: &str = "7a3c1e90-52b4-4f1a-8e67-0d9b5c2f4a11";
const DGREETER_UUID: &str = "7a3c1e90-52b4-4f1a-8e67-0d9b5c2f4a12";

#[derive(Default)]
struct Greeter;

impl Greeter {
    fn say_hello(&self, args: Vec<Value>) -> InvokeResult {
        let name = args
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| InvokeError::InvalidArgument("name is not a string".into()))?;
        info!("SayHello called with name: {}", name);
        Ok(Reply::Single(Value::wide(format!("Hello, {}!", name))))
    }

    fn echo(&self, args: Vec<Value>) -> InvokeResult {
        let message = args.first().and_then(Value::as_str).unwrap_or_default();
        Ok(Reply::Single(Value::wide(format!("ECHO: {}", message))))
    }
}

fn greeter_methods() -> MethodTable<Greeter> {
    MethodTable::new()
        .method("SayHello", &[ValueKind::String], Greeter::say_hello)
        .method("Echo", &[ValueKind::String], Greeter::echo)
}

fn add_greeter_methods(definition: &mut InterfaceDefinition, repr: StringRepr) -> Result<(), Box<dyn std::error::Error>> {
    for name in ["SayHello", "Echo"] {
        let params = ParamsDescriptor::new()
            .input(Shape::String(repr), Flags::NULL)
            .output(Shape::String(StringRepr::Wide), Flags::NULL);
        definition.add_method(MethodDescriptor::new(name, params))?;
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "servant-demo")]
#[command(about = "Export a greeter servant and call it in-process")]
struct Args {
    /// Name passed to SayHello
    #[arg(short, long, default_value = "World")]
    name: String,

    /// Encode stubs big-endian
    #[arg(long)]
    big_endian: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let little_endian = !args.big_endian;
    let host = ServantHost::new(HostConfig::new().little_endian(little_endian));

    let mut greeter = InterfaceDefinition::fixed_table(IGREETER_UUID);
    add_greeter_methods(&mut greeter, StringRepr::Wide)?;
    greeter.bind_type(greeter_methods());

    let mut dispatch = InterfaceDefinition::late_bound(DGREETER_UUID);
    add_greeter_methods(&mut dispatch, StringRepr::Bstr)?;
    dispatch.bind_instance(Arc::new(Greeter), greeter_methods());

    let servant = Arc::new(LocalServant::new(greeter));
    servant.add_interface_definition(dispatch);

    let fixed = host
        .export(&servant, IGREETER_UUID)
        .ok_or("greeter interface not supported")?;
    let late = host
        .export(&servant, DGREETER_UUID)
        .ok_or("dispatch interface not supported")?;
    info!("servant {} has OID {:?}", servant.id(), fixed.oid());

    // SayHello is the first user method: opnum 3
    let mut w = NdrWriter::with_byte_order(little_endian);
    w.write(&Value::wide(args.name.as_str()), &Shape::String(StringRepr::Wide), Flags::NULL)?;
    let response = host.dispatch(fixed.ipid(), 3, w.finish())?;
    info!("SayHello -> {}", read_greeting(response, little_endian)?);

    // GetIDsOfNames(IID_NULL, ["Echo"], 1, LOCALE_USER_DEFAULT)
    let mut w = NdrWriter::with_byte_order(little_endian);
    w.write_inferred(&Value::Uuid(Uuid::nil()))?;
    w.write(
        &Value::Array(vec![Value::wide("Echo")]),
        &Shape::conformant_array(Shape::String(StringRepr::Wide)),
        Flags::NULL,
    )?;
    w.write(&Value::I32(1), &Shape::I32, Flags::NULL)?;
    w.write(&Value::I32(0x400), &Shape::I32, Flags::NULL)?;
    let response = host.dispatch(late.ipid(), 5, w.finish())?;
    let mut cursor = NdrCursor::with_byte_order(response, little_endian);
    let ids = cursor.read(&Shape::conformant_array(Shape::I32), Flags::NULL, None)?;
    let dispid = ids
        .as_array()
        .and_then(|ids| ids.first())
        .and_then(Value::as_i32)
        .ok_or("GetIDsOfNames returned no DISPID")?;
    info!("GetIDsOfNames(Echo) -> {}", dispid);

    // Invoke(dispid, IID_NULL, lcid, DISPATCH_METHOD, [args.name], 0, [], [])
    let mut w = NdrWriter::with_byte_order(little_endian);
    w.write(&Value::I32(dispid), &Shape::I32, Flags::NULL)?;
    w.write_inferred(&Value::Uuid(Uuid::nil()))?;
    w.write(&Value::I32(0x400), &Shape::I32, Flags::NULL)?;
    w.write(&Value::I32(1), &Shape::I32, Flags::NULL)?;
    let rgvarg = Value::Array(vec![Value::variant(Value::bstr(args.name.as_str()))]);
    w.write(
        &Value::Struct(vec![
            Value::pointer(rgvarg),
            Value::null_pointer(),
            Value::I32(1),
            Value::I32(0),
        ]),
        &Shape::Struct(vec![
            Shape::pointer(Shape::conformant_array(Shape::Variant)),
            Shape::pointer(Shape::conformant_array(Shape::I32)),
            Shape::I32,
            Shape::I32,
        ]),
        Flags::REPRESENTATION_DISPATCH_INVOKE,
    )?;
    w.write(&Value::I32(0), &Shape::I32, Flags::NULL)?;
    w.write(&Value::Array(Vec::new()), &Shape::conformant_array(Shape::I32), Flags::NULL)?;
    w.write(&Value::Array(Vec::new()), &Shape::conformant_array(Shape::Variant), Flags::NULL)?;
    let response = host.dispatch(late.ipid(), 6, w.finish())?;
    info!("Invoke(Echo) -> {}", read_greeting(response, little_endian)?);

    // Opnum 2 is IUnknown::Release and never reaches the servant
    if let Err(err) = host.dispatch(fixed.ipid(), 2, Bytes::new()) {
        warn!("opnum 2 rejected: {} (fault {:#010x})", err, err.hresult());
    }

    host.release(fixed.ipid());
    host.release(late.ipid());
    info!(
        "released all exports; reference alive: {}",
        servant.is_associated_reference_alive()
    );
    Ok(())
}

fn read_greeting(response: Bytes, little_endian: bool) -> Result<String, Box<dyn std::error::Error>> {
    let mut cursor = NdrCursor::with_byte_order(response, little_endian);
    let greeting = cursor.read(&Shape::String(StringRepr::Wide), Flags::NULL, None)?;
    let status = cursor.read(&Shape::U32, Flags::NULL, None)?;
    info!("status {:?}", status);
    Ok(greeting.as_str().unwrap_or_default().to_string())
}
