//! A line-echoing TCP server built on `netreact::net`.
//!
//! ```text
//! $ cargo run --example tcp_server
//! $ nc 127.0.0.1 13265
//! ```

use std::io;
use std::sync::Arc;

use netreact::net::{AcceptorOptions, TcpAcceptor, TcpConnection};
use netreact::{Address, EventLoop, Family};

fn main() -> io::Result<()> {
    env_logger::init();

    let event_loop = EventLoop::new().expect("create event loop");
    let acceptor = TcpAcceptor::new(&event_loop);

    let loop_for_accept = Arc::clone(&event_loop);
    acceptor.set_accepted_callback(move |_acceptor, socket, peer| {
        println!("accepted connection from {peer}");
        let conn = match TcpConnection::from_accepted(&loop_for_accept, socket, peer) {
            Ok(conn) => conn,
            Err(e) => {
                eprintln!("failed to adopt accepted socket: {e}");
                return false;
            }
        };
        conn.set_received_callback(|conn, inbound| {
            while let Some(line) = inbound.read_to(b'\n') {
                print!("{}", String::from_utf8_lossy(&line));
                let _ = conn.send(&line);
            }
        });
        conn.set_connected_callback(|conn, ok| {
            if !ok {
                println!("connection to {:?} dropped", conn.peer_address());
            }
        });
        true
    });

    let addr = Address::parse("127.0.0.1", 13265, Family::V4).expect("valid address");
    acceptor
        .open(&addr, AcceptorOptions::default())
        .expect("bind/listen on 127.0.0.1:13265");

    println!("You can connect to the server using `nc`:");
    println!(" $ nc 127.0.0.1 13265");
    println!("You'll see anything you type echoed back.");

    event_loop.run().expect("event loop run");
    Ok(())
}
