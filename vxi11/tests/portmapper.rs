mod common;

use std::{
    collections::{HashMap, HashSet},
    net::Ipv4Addr,
};

use testlab_vxi11::{
    client::portmapper::prelude::*,
    common::{
        onc_rpc::RpcError,
        vxi11::{Channel, DEVICE_ASYNC, DEVICE_CORE, DEVICE_INTR},
    },
    ClientConfig, Error,
};

use common::*;

#[async_std::test]
async fn portmap_tcp_null() {
    let portmap = spawn_portmap(HashMap::new(), HashSet::new()).await;
    let mut client =
        PortMapperClient::connect_tcp((Ipv4Addr::LOCALHOST, portmap.port), &ClientConfig::default())
            .await
            .unwrap();
    client.null().await.unwrap();
    client.close().await.unwrap();
}

#[async_std::test]
async fn find_ports_in_order() {
    let portmap = spawn_portmap(vxi11_ports(), HashSet::new()).await;
    let config = ClientConfig::default().portmapper_port(portmap.port);

    let ports = find_ports("127.0.0.1", &config).await.unwrap();
    assert_eq!(ports.as_array(), [1024, 1025, 1026]);
    assert_eq!(
        *portmap.queried.lock().unwrap(),
        vec![DEVICE_CORE, DEVICE_ASYNC, DEVICE_INTR]
    );
}

#[async_std::test]
async fn find_ports_stops_at_first_failure() {
    let portmap = spawn_portmap(vxi11_ports(), HashSet::from([DEVICE_ASYNC])).await;

    let err = find_ports_at((Ipv4Addr::LOCALHOST, portmap.port), &ClientConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Discovery {
            channel: Channel::Abort,
            cause: RpcError::SystemErr
        }
    ));
    // Interrupt channel is never asked for
    assert_eq!(
        *portmap.queried.lock().unwrap(),
        vec![DEVICE_CORE, DEVICE_ASYNC]
    );
}

#[async_std::test]
async fn unregistered_program() {
    let ports = HashMap::from([(DEVICE_CORE, CORE_PORT), (DEVICE_ASYNC, ABORT_PORT)]);
    let portmap = spawn_portmap(ports, HashSet::new()).await;

    let err = find_ports_at((Ipv4Addr::LOCALHOST, portmap.port), &ClientConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Discovery {
            channel: Channel::Interrupt,
            cause: RpcError::ProgUnavail
        }
    ));
}

#[async_std::test]
async fn no_portmapper() {
    // Bind and drop to get a port nobody listens on
    let port = {
        let listener = async_std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .unwrap();
        listener.local_addr().unwrap().port()
    };

    let err = find_ports_at((Ipv4Addr::LOCALHOST, port), &ClientConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Discovery {
            channel: Channel::Core,
            cause: RpcError::Io(_)
        }
    ));
}
