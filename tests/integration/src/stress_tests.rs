//! Stress Tests - Concurrent export and dispatch
//!
//! Many tasks exporting interfaces of one servant at once must leave the
//! identity map consistent, and concurrent calls through a host must not
//! lose updates.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Barrier;

use common::*;
use dcom_servant::ndr::{DecodingCursor, Flags, NdrCursor, Shape, Value};
use dcom_servant::{
    CallingConvention, HostConfig, Iid, InterfaceDefinition, Ipid, LocalServant, ServantHost,
};

fn servant_with_interfaces(count: usize) -> Arc<LocalServant> {
    let primary = counter_definition(
        COUNTER_IID,
        CallingConvention::FixedTable,
        Arc::new(Counter::default()),
    );
    let servant = LocalServant::new(primary);
    for n in 0..count {
        servant.add_interface_definition(InterfaceDefinition::fixed_table(test_iid(n)));
    }
    Arc::new(servant)
}

/// Test: N exporters on N distinct interfaces
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_exports_bind_correctly() {
    init_logging();

    const NUM_INTERFACES: usize = 64;

    let servant = servant_with_interfaces(NUM_INTERFACES);
    let barrier = Arc::new(Barrier::new(NUM_INTERFACES));

    let handles = (0..NUM_INTERFACES).map(|n| {
        let servant = servant.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            tokio::task::spawn_blocking(move || {
                let iid = Iid::new(test_iid(n));
                let ipid = Ipid::generate();
                assert!(servant.export(iid.clone(), ipid.clone()));
                (iid, ipid)
            })
            .await
            .unwrap()
        })
    });
    let bindings: Vec<(Iid, Ipid)> = join_all(handles)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    for (iid, ipid) in &bindings {
        assert_eq!(servant.iid_for(ipid), Some(iid.clone()));
        assert_eq!(servant.ipid_for(iid), Some(ipid.clone()));
        let def = servant.interface_definition_for_ipid(ipid).unwrap();
        assert_eq!(def.iid(), iid);
    }
    assert_eq!(servant.exports().len(), NUM_INTERFACES);
    assert!(servant.is_already_exported());
}

/// Test: many tasks re-exporting the same interface
/// Exactly one IPID survives and it resolves back to the interface
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_reexport_single_interface() {
    init_logging();

    const NUM_TASKS: usize = 32;
    const EXPORTS_PER_TASK: usize = 50;

    let servant = servant_with_interfaces(1);
    let barrier = Arc::new(Barrier::new(NUM_TASKS));
    let iid = Iid::new(test_iid(0));

    let handles = (0..NUM_TASKS).map(|_| {
        let servant = servant.clone();
        let barrier = barrier.clone();
        let iid = iid.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            tokio::task::spawn_blocking(move || {
                let mut issued = Vec::with_capacity(EXPORTS_PER_TASK);
                for _ in 0..EXPORTS_PER_TASK {
                    let ipid = Ipid::generate();
                    assert!(servant.export(iid.clone(), ipid.clone()));
                    issued.push(ipid);
                }
                issued
            })
            .await
            .unwrap()
        })
    });
    let issued: Vec<Ipid> = join_all(handles)
        .await
        .into_iter()
        .flat_map(Result::unwrap)
        .collect();
    assert_eq!(issued.len(), NUM_TASKS * EXPORTS_PER_TASK);

    let live: Vec<&Ipid> = issued.iter().filter(|ipid| servant.iid_for(*ipid).is_some()).collect();
    assert_eq!(live.len(), 1);
    assert_eq!(servant.ipid_for(&iid).as_ref(), Some(live[0]));
    assert_eq!(servant.exports(), vec![(iid, live[0].clone())]);
}

/// Test: concurrent calls through one host
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_dispatch_through_host() {
    init_logging();

    const NUM_CLIENTS: usize = 16;
    const REQUESTS_PER_CLIENT: usize = 100;

    let counter = Arc::new(Counter::default());
    let servant = Arc::new(LocalServant::new(counter_definition(
        COUNTER_IID,
        CallingConvention::FixedTable,
        counter.clone(),
    )));
    let host = Arc::new(ServantHost::new(HostConfig::default()));
    let pointer = host.export(&servant, COUNTER_IID).unwrap();

    let stats = Arc::new(ConcurrentStats::new());
    let barrier = Arc::new(Barrier::new(NUM_CLIENTS));

    let handles = (0..NUM_CLIENTS).map(|_| {
        let host = host.clone();
        let ipid = pointer.ipid().clone();
        let stats = stats.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            barrier.wait().await;
            tokio::task::spawn_blocking(move || {
                for _ in 0..REQUESTS_PER_CLIENT {
                    match host.dispatch(&ipid, 3, i32_stub(&[1])) {
                        Ok(response) if response.len() == 12 => stats.record_success(),
                        Ok(response) => {
                            eprintln!("short response: {} bytes", response.len());
                            stats.record_failure();
                        }
                        Err(e) => {
                            eprintln!("Add failed: {}", e);
                            stats.record_failure();
                        }
                    }
                }
            })
            .await
            .unwrap()
        })
    });
    join_all(handles).await;

    let expected = (NUM_CLIENTS * REQUESTS_PER_CLIENT) as u64;
    println!("\n=== Concurrent Dispatch Results ===");
    println!("Successful: {} / {}", stats.success_count(), expected);

    assert_eq!(stats.failure_count(), 0);
    assert_eq!(stats.success_count(), expected);
    assert_eq!(counter.total(), expected as i64);

    let response = host.dispatch(pointer.ipid(), 4, i32_stub(&[])).unwrap();
    let mut cursor = NdrCursor::new(response);
    let total = cursor.read(&Shape::I64, Flags::NULL, None).unwrap();
    assert_eq!(total, Value::I64(expected as i64));
}

/// Test: exports racing across many servants on one host
/// Every servant gets exactly one OID and all OIDs are distinct
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_first_exports_assign_one_oid() {
    init_logging();

    const NUM_SERVANTS: usize = 16;
    const NUM_INTERFACES: usize = 4;

    let host = Arc::new(ServantHost::new(HostConfig::default()));
    let servants: Vec<Arc<LocalServant>> =
        (0..NUM_SERVANTS).map(|_| servant_with_interfaces(NUM_INTERFACES)).collect();
    let barrier = Arc::new(Barrier::new(NUM_SERVANTS * NUM_INTERFACES));

    let mut handles = Vec::new();
    for servant in &servants {
        for n in 0..NUM_INTERFACES {
            let host = host.clone();
            let servant = servant.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                tokio::task::spawn_blocking(move || {
                    let pointer = host.export(&servant, test_iid(n)).unwrap();
                    (servant.id(), pointer.oid())
                })
                .await
                .unwrap()
            }));
        }
    }
    let results: Vec<_> = join_all(handles).await.into_iter().map(Result::unwrap).collect();

    for servant in &servants {
        let oid = servant.object_id().unwrap();
        assert!(results
            .iter()
            .filter(|(id, _)| *id == servant.id())
            .all(|(_, pointer_oid)| *pointer_oid == Some(oid)));
        assert_eq!(servant.session().map(|s| s.id()), Some(host.session().id()));
    }
    let distinct: HashSet<_> = servants.iter().filter_map(|s| s.object_id()).collect();
    assert_eq!(distinct.len(), NUM_SERVANTS);
    assert_eq!(host.export_count(), NUM_SERVANTS * NUM_INTERFACES);
}
