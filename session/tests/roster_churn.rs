//! Roster membership under arbitrary connect/disconnect interleavings.

use std::collections::HashSet;

use proptest::prelude::*;
use session::{ClientSession, PeerState, ServerSession};
use transport::{MemoryNetwork, MemoryTransport};

const SLOTS: usize = 4;
const PORT: u16 = 7777;

#[derive(Clone, Copy, Debug)]
enum ChurnOp {
    Connect(usize),
    Disconnect(usize),
    Tick,
}

fn op_strategy() -> impl Strategy<Value = ChurnOp> {
    prop_oneof![
        (0..SLOTS).prop_map(ChurnOp::Connect),
        (0..SLOTS).prop_map(ChurnOp::Disconnect),
        Just(ChurnOp::Tick),
    ]
}

fn tick_all(server: &mut ServerSession<MemoryTransport>, clients: &mut [ClientSession<MemoryTransport>]) {
    server.tick();
    for client in clients.iter_mut() {
        client.tick();
    }
}

proptest! {
    #[test]
    fn prop_roster_mirrors_connection_events(ops in prop::collection::vec(op_strategy(), 1..48)) {
        let net = MemoryNetwork::new();
        let mut server = ServerSession::new(net.endpoint());
        server.host(PORT).unwrap();
        let mut clients: Vec<ClientSession<MemoryTransport>> =
            (0..SLOTS).map(|_| ClientSession::new(net.endpoint())).collect();

        for op in ops {
            match op {
                ChurnOp::Connect(slot) => {
                    // Ignore the duplicate-connect guard; racing connects
                    // are part of the churn being exercised.
                    let _ = clients[slot].connect(format!("127.0.0.1:{PORT}").parse().unwrap(), |_| {});
                }
                ChurnOp::Disconnect(slot) => {
                    clients[slot].disconnect(|_| {});
                }
                ChurnOp::Tick => {
                    tick_all(&mut server, &mut clients);
                }
            }
        }

        // Drain everything in flight.
        for _ in 0..4 {
            tick_all(&mut server, &mut clients);
        }

        // Membership equals peers connected minus peers disconnected: every
        // client in Connected state accounts for exactly one roster entry.
        let connected = clients
            .iter()
            .filter(|client| client.connection_state() == PeerState::Connected)
            .count();
        prop_assert_eq!(server.peer_count(), connected);

        // No duplicates, regardless of interleaving.
        let unique: HashSet<_> = server.peers().iter().copied().collect();
        prop_assert_eq!(unique.len(), server.peers().len());

        // A client's tracked peer is live iff its latest connected event
        // has not been followed by a disconnected event.
        for client in &clients {
            let state = client.connection_state();
            prop_assert!(
                matches!(
                    state,
                    PeerState::Connected | PeerState::Connecting | PeerState::Disconnected
                ),
                "settled sessions never stay in shutdown, got {:?}",
                state
            );
            if state == PeerState::Connected {
                prop_assert!(client.ping_ms().is_some());
            }
        }
    }
}
