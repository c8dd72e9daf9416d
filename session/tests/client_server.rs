use std::cell::{Cell, RefCell};
use std::net::SocketAddr;
use std::rc::Rc;

use session::{ClientSession, DeliveryMode, PeerState, ServerSession, SessionError};
use transport::{
    ConnectionDecision, DisconnectReason, MemoryNetwork, MemoryTransport, Transport,
    TransportError, TransportEvent,
};

fn server_addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

/// Hosts on `port` and connects one client, settling all handshake events.
fn connected_pair(
    net: &MemoryNetwork,
    port: u16,
) -> (ServerSession<MemoryTransport>, ClientSession<MemoryTransport>) {
    let mut server = ServerSession::new(net.endpoint());
    server.host(port).unwrap();
    let mut client = ClientSession::new(net.endpoint());
    client.connect(server_addr(port), |_| {}).unwrap();
    settle(&mut server, &mut [&mut client]);
    assert!(client.is_connected());
    (server, client)
}

/// Ticks everything a few times so in-flight events drain.
fn settle(server: &mut ServerSession<MemoryTransport>, clients: &mut [&mut ClientSession<MemoryTransport>]) {
    for _ in 0..3 {
        server.tick();
        for client in clients.iter_mut() {
            client.tick();
        }
    }
}

#[test]
fn connect_fails_without_a_host() {
    let net = MemoryNetwork::new();
    let mut client = ClientSession::new(net.endpoint());
    let addr = server_addr(7777);
    let result = client.connect(addr, |_| {});
    assert_eq!(
        result,
        Err(SessionError::Transport(TransportError::NoRoute { addr }))
    );
    assert_eq!(client.connection_state(), PeerState::Disconnected);
}

#[test]
fn host_bind_conflict_surfaces_as_error() {
    let net = MemoryNetwork::new();
    let mut first = ServerSession::new(net.endpoint());
    first.host(7777).unwrap();
    let mut second = ServerSession::new(net.endpoint());
    assert_eq!(
        second.host(7777),
        Err(SessionError::Transport(TransportError::BindFailed {
            port: 7777
        }))
    );
}

#[test]
fn connection_state_transitions_through_connecting() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.host(7777).unwrap();
    let mut client = ClientSession::new(net.endpoint());
    client.connect(server_addr(7777), |_| {}).unwrap();

    assert_eq!(client.connection_state(), PeerState::Connecting);
    server.tick();
    client.tick();
    assert_eq!(client.connection_state(), PeerState::Connected);
}

#[test]
fn connection_started_fires_synchronously() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.host(7777).unwrap();

    let started = Rc::new(Cell::new(false));
    let mut client = ClientSession::new(net.endpoint());
    let flag = Rc::clone(&started);
    client.on_connection_started(move || flag.set(true));
    client.connect(server_addr(7777), |_| {}).unwrap();
    assert!(started.get(), "must fire before connect returns");
}

#[test]
fn duplicate_connect_is_rejected() {
    let net = MemoryNetwork::new();
    let (_server, mut client) = connected_pair(&net, 7777);
    let result = client.connect(server_addr(7777), |_| {});
    assert_eq!(result, Err(SessionError::AlreadyConnected));
    // The original connection is untouched.
    assert!(client.is_connected());
}

#[test]
fn message_reaches_server_handler_with_payload() {
    let net = MemoryNetwork::new();
    let (mut server, mut client) = connected_pair(&net, 7777);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    server.register_handler(2, move |_, reader| {
        sink.borrow_mut().push(reader.read_remaining().to_vec());
    });

    client.send(2, DeliveryMode::ReliableOrdered, |writer| {
        writer.write_u8(9);
        writer.write_u8(9);
    });
    settle(&mut server, &mut [&mut client]);
    assert_eq!(seen.borrow()[..], [vec![9, 9]]);
}

#[test]
fn composed_wire_bytes_are_id_then_payload() {
    // A raw endpoint stands in for the server so the exact bytes the
    // session emits are observable.
    let net = MemoryNetwork::new();
    let mut listener = net.endpoint();
    listener.listen(7777).unwrap();
    let mut client = ClientSession::new(net.endpoint());
    client.connect(server_addr(7777), |_| {}).unwrap();
    for event in listener.poll() {
        if let TransportEvent::ConnectionRequest { token, .. } = event {
            listener.respond(token, ConnectionDecision::Accept);
        }
    }
    listener.poll();
    client.tick();

    client.send(2, DeliveryMode::Unreliable, |writer| {
        writer.write_u8(9);
        writer.write_u8(9);
    });
    let events = listener.poll();
    assert!(matches!(
        &events[..],
        [TransportEvent::Receive { payload, .. }] if payload == &[2, 9, 9]
    ));
}

#[test]
fn reply_reaches_client_handler() {
    let net = MemoryNetwork::new();
    let (mut server, mut client) = connected_pair(&net, 7777);

    server.register_handler(1, |peer, reader| {
        let _ = (peer, reader.read_remaining());
    });
    let replies = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&replies);
    client.register_handler(3, move |reader| {
        sink.borrow_mut().push(reader.read_u16().unwrap());
    });

    let peer = server.peers()[0];
    server.send_to(peer, 3, DeliveryMode::ReliableOrdered, |writer| {
        writer.write_u16(512);
    });
    settle(&mut server, &mut [&mut client]);
    assert_eq!(replies.borrow()[..], [512]);
}

#[test]
fn overwritten_handler_is_the_only_one_invoked() {
    let net = MemoryNetwork::new();
    let (mut server, mut client) = connected_pair(&net, 7777);

    let hits = Rc::new(RefCell::new((0u32, 0u32)));
    let first = Rc::clone(&hits);
    client.register_handler(5, move |_| first.borrow_mut().0 += 1);
    let second = Rc::clone(&hits);
    client.register_handler(5, move |_| second.borrow_mut().1 += 1);

    server.send_to_all(5, DeliveryMode::ReliableOrdered, |_| {});
    settle(&mut server, &mut [&mut client]);
    assert_eq!(*hits.borrow(), (0, 1));
}

#[test]
fn unregistered_id_is_dropped_silently() {
    let net = MemoryNetwork::new();
    let (mut server, mut client) = connected_pair(&net, 7777);

    let hits = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&hits);
    client.register_handler(5, move |_| sink.set(sink.get() + 1));
    assert!(client.unregister_handler(5));

    let other = Rc::new(Cell::new(0u32));
    let sink = Rc::clone(&other);
    client.register_handler(6, move |_| sink.set(sink.get() + 1));

    server.send_to_all(5, DeliveryMode::ReliableOrdered, |_| {});
    server.send_to_all(6, DeliveryMode::ReliableOrdered, |_| {});
    settle(&mut server, &mut [&mut client]);
    assert_eq!(hits.get(), 0);
    assert_eq!(other.get(), 1);
}

#[test]
fn roster_tracks_connects_and_disconnects() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.host(7777).unwrap();

    let joined = Rc::new(Cell::new(0u32));
    let left = Rc::new(Cell::new(0u32));
    let joined_sink = Rc::clone(&joined);
    server.on_peer_connected(move |_| joined_sink.set(joined_sink.get() + 1));
    let left_sink = Rc::clone(&left);
    server.on_peer_disconnected(move |_, _| left_sink.set(left_sink.get() + 1));

    let mut a = ClientSession::new(net.endpoint());
    let mut b = ClientSession::new(net.endpoint());
    a.connect(server_addr(7777), |_| {}).unwrap();
    b.connect(server_addr(7777), |_| {}).unwrap();
    settle(&mut server, &mut [&mut a, &mut b]);
    assert_eq!(server.peer_count(), 2);
    assert_eq!(joined.get(), 2);

    a.disconnect(|_| {});
    settle(&mut server, &mut [&mut a, &mut b]);
    assert_eq!(server.peer_count(), 1);
    assert_eq!(left.get(), 1);
    assert_eq!(a.connection_state(), PeerState::Disconnected);
    assert!(b.is_connected());
}

#[test]
fn filtered_send_respects_predicate() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.host(7777).unwrap();

    let mut clients = Vec::new();
    let mut counters = Vec::new();
    for _ in 0..3 {
        let mut client = ClientSession::new(net.endpoint());
        client.connect(server_addr(7777), |_| {}).unwrap();
        let count = Rc::new(Cell::new(0u32));
        let sink = Rc::clone(&count);
        client.register_handler(1, move |_| sink.set(sink.get() + 1));
        clients.push(client);
        counters.push(count);
    }
    {
        let mut refs: Vec<&mut ClientSession<MemoryTransport>> = clients.iter_mut().collect();
        settle(&mut server, &mut refs);
    }
    assert_eq!(server.peer_count(), 3);

    // Always-false delivers to nobody.
    server.send_to_filtered(|_| false, 1, DeliveryMode::ReliableOrdered, |_| {});
    // Always-true delivers to the whole roster snapshot.
    server.send_to_filtered(|_| true, 1, DeliveryMode::ReliableOrdered, |_| {});
    // A real predicate delivers to the matching subset.
    let chosen = server.peers()[1];
    server.send_to_filtered(
        move |peer| peer == chosen,
        1,
        DeliveryMode::ReliableOrdered,
        |_| {},
    );
    {
        let mut refs: Vec<&mut ClientSession<MemoryTransport>> = clients.iter_mut().collect();
        settle(&mut server, &mut refs);
    }
    assert_eq!(counters[0].get(), 1);
    assert_eq!(counters[1].get(), 2);
    assert_eq!(counters[2].get(), 1);
}

#[test]
fn connection_filter_rejects_bad_handshakes() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.set_connection_filter(|_, handshake| {
        if handshake.first() == Some(&0x4D) {
            ConnectionDecision::Accept
        } else {
            ConnectionDecision::Reject
        }
    });
    server.host(7777).unwrap();

    let rejected_reason = Rc::new(RefCell::new(None));
    let mut bad = ClientSession::new(net.endpoint());
    let sink = Rc::clone(&rejected_reason);
    bad.on_disconnected(move |reason| *sink.borrow_mut() = Some(reason));
    bad.connect(server_addr(7777), |writer| writer.write_u8(0)).unwrap();

    let mut good = ClientSession::new(net.endpoint());
    good.connect(server_addr(7777), |writer| writer.write_u8(0x4D))
        .unwrap();

    settle(&mut server, &mut [&mut bad, &mut good]);
    assert_eq!(server.peer_count(), 1);
    assert!(good.is_connected());
    assert_eq!(bad.connection_state(), PeerState::Disconnected);
    assert_eq!(*rejected_reason.borrow(), Some(DisconnectReason::Rejected));
}

#[test]
fn clearing_the_filter_reverts_to_accept_all() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.set_connection_filter(|_, _| ConnectionDecision::Reject);
    server.clear_connection_filter();
    server.host(7777).unwrap();

    let mut client = ClientSession::new(net.endpoint());
    client.connect(server_addr(7777), |_| {}).unwrap();
    settle(&mut server, &mut [&mut client]);
    assert!(client.is_connected());
}

#[test]
fn close_disconnects_every_client() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    server.host(7777).unwrap();

    let closed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&closed);
    server.on_closed(move || flag.set(true));

    let mut a = ClientSession::new(net.endpoint());
    let mut b = ClientSession::new(net.endpoint());
    a.connect(server_addr(7777), |_| {}).unwrap();
    b.connect(server_addr(7777), |_| {}).unwrap();
    settle(&mut server, &mut [&mut a, &mut b]);

    server.close(|writer| writer.write_str("maintenance").unwrap()).unwrap();
    assert!(closed.get());
    assert!(!server.is_running());
    assert_eq!(server.peer_count(), 0);

    a.tick();
    b.tick();
    assert_eq!(a.connection_state(), PeerState::Disconnected);
    assert_eq!(b.connection_state(), PeerState::Disconnected);
}

#[test]
fn close_when_not_hosting_is_an_error() {
    let net = MemoryNetwork::new();
    let mut server: ServerSession<MemoryTransport> = ServerSession::new(net.endpoint());
    assert_eq!(server.close(|_| {}), Err(SessionError::NotRunning));
}

#[test]
fn client_reconnects_after_remote_close() {
    let net = MemoryNetwork::new();
    let (mut server, mut client) = connected_pair(&net, 7777);

    server.close(|_| {}).unwrap();
    settle(&mut server, &mut [&mut client]);
    assert_eq!(client.connection_state(), PeerState::Disconnected);
    assert_eq!(client.ping_ms(), None);

    // A fresh host on the same port accepts the same client again.
    let mut server = ServerSession::new(net.endpoint());
    server.host(7777).unwrap();
    client.connect(server_addr(7777), |_| {}).unwrap();
    settle(&mut server, &mut [&mut client]);
    assert!(client.is_connected());
}

#[test]
fn ping_reflects_transport_rtt() {
    let net = MemoryNetwork::new();
    net.set_rtt_ms(23);
    let (server, client) = connected_pair(&net, 7777);
    assert_eq!(client.ping_ms(), Some(23));
    assert_eq!(server.rtt_ms(server.peers()[0]), Some(23));
}

#[test]
fn disconnect_without_peer_is_a_no_op() {
    let net = MemoryNetwork::new();
    let mut client: ClientSession<MemoryTransport> = ClientSession::new(net.endpoint());
    client.disconnect(|_| {});
    client.send(1, DeliveryMode::ReliableOrdered, |writer| writer.write_u8(1));
    assert_eq!(client.connection_state(), PeerState::Disconnected);
}

#[test]
fn handshake_payload_reaches_the_filter() {
    let net = MemoryNetwork::new();
    let mut server = ServerSession::new(net.endpoint());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    server.set_connection_filter(move |_, handshake| {
        sink.borrow_mut().push(handshake.to_vec());
        ConnectionDecision::Accept
    });
    server.host(7777).unwrap();

    let mut client = ClientSession::new(net.endpoint());
    client
        .connect(server_addr(7777), |writer| {
            writer.write_str("token").unwrap();
        })
        .unwrap();
    settle(&mut server, &mut [&mut client]);

    let frames = seen.borrow();
    assert_eq!(frames.len(), 1);
    let mut reader = session::PayloadReader::new(&frames[0]);
    assert_eq!(reader.read_str().unwrap(), "token");
}
