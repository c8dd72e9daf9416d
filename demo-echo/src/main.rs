use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use session::{ClientSession, DeliveryMode, Peer, ServerSession};
use transport::{MemoryNetwork, MemoryTransport};

/// Client-to-server ping carrying a sequence number.
const MSG_PING: u8 = 1;
/// Server-to-client echo of the same sequence number.
const MSG_PONG: u8 = 2;

#[derive(Parser)]
#[command(
    name = "demo-echo",
    version,
    about = "Deterministic echo demo over the in-process transport"
)]
struct Cli {
    /// Number of clients to connect.
    #[arg(long, default_value_t = 4)]
    clients: u16,
    /// Number of ticks to run.
    #[arg(long, default_value_t = 60)]
    ticks: u32,
    /// Port the server hosts on.
    #[arg(long, default_value_t = 7777)]
    port: u16,
    /// Optional output path for a JSON summary.
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary {
    clients: u16,
    ticks: u32,
    pings_sent: u64,
    pongs_received: u64,
    out_of_order: u64,
}

struct Client {
    session: ClientSession<MemoryTransport>,
    sent: u32,
    received: Rc<RefCell<Vec<u32>>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let net = MemoryNetwork::new();

    let mut server = ServerSession::new(net.endpoint());
    server
        .host(cli.port)
        .with_context(|| format!("host port {}", cli.port))?;

    // Handlers cannot reach back into the session that owns them; echoes
    // are queued and flushed after each server tick.
    let echo_queue: Rc<RefCell<Vec<(Peer, u32)>>> = Rc::new(RefCell::new(Vec::new()));
    let queue = Rc::clone(&echo_queue);
    server.register_handler(MSG_PING, move |peer, reader| {
        if let Ok(seq) = reader.read_u32() {
            queue.borrow_mut().push((peer, seq));
        }
    });

    let mut clients = Vec::new();
    for _ in 0..cli.clients {
        let mut session = ClientSession::new(net.endpoint());
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        session.register_handler(MSG_PONG, move |reader| {
            if let Ok(seq) = reader.read_u32() {
                sink.borrow_mut().push(seq);
            }
        });
        session
            .connect(format!("127.0.0.1:{}", cli.port).parse()?, |_| {})
            .context("connect client")?;
        clients.push(Client {
            session,
            sent: 0,
            received,
        });
    }

    for _ in 0..cli.ticks {
        for client in &mut clients {
            client.session.tick();
            if client.session.is_connected() {
                let seq = client.sent;
                client
                    .session
                    .send(MSG_PING, DeliveryMode::ReliableOrdered, |writer| {
                        writer.write_u32(seq);
                    });
                client.sent += 1;
            }
        }
        server.tick();
        flush_echoes(&mut server, &echo_queue);
    }

    // Let in-flight echoes drain.
    for _ in 0..3 {
        server.tick();
        flush_echoes(&mut server, &echo_queue);
        for client in &mut clients {
            client.session.tick();
        }
    }

    let mut summary = Summary {
        clients: cli.clients,
        ticks: cli.ticks,
        pings_sent: 0,
        pongs_received: 0,
        out_of_order: 0,
    };
    println!("client  sent  received  ping");
    for (index, client) in clients.iter().enumerate() {
        let received = client.received.borrow();
        let out_of_order = received.windows(2).filter(|pair| pair[0] >= pair[1]).count();
        summary.pings_sent += u64::from(client.sent);
        summary.pongs_received += received.len() as u64;
        summary.out_of_order += out_of_order as u64;
        println!(
            "{index:>6}  {:>4}  {:>8}  {:>4}",
            client.sent,
            received.len(),
            client
                .session
                .ping_ms()
                .map_or_else(|| "-".to_string(), |ms| format!("{ms}ms")),
        );
    }

    if summary.pongs_received != summary.pings_sent {
        anyhow::bail!(
            "echo mismatch: {} pings but {} pongs",
            summary.pings_sent,
            summary.pongs_received
        );
    }
    if summary.out_of_order != 0 {
        anyhow::bail!("{} echoes arrived out of order", summary.out_of_order);
    }

    if let Some(path) = &cli.summary {
        let contents = serde_json::to_string_pretty(&summary).context("serialize summary")?;
        fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    }

    Ok(())
}

fn flush_echoes(server: &mut ServerSession<MemoryTransport>, queue: &Rc<RefCell<Vec<(Peer, u32)>>>) {
    for (peer, seq) in queue.borrow_mut().drain(..) {
        server.send_to(peer, MSG_PONG, DeliveryMode::ReliableOrdered, |writer| {
            writer.write_u32(seq);
        });
    }
}
