//! Loopback end-to-end scenarios over the real OS network stack.

use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use netreact::net::{
    AcceptorOptions, ConnectionOptions, TcpAcceptor, TcpConnection, UdpEndpoint, UdpOptions,
};
use netreact::{Address, EventLoop, Family};

fn run_loop_in_background(event_loop: &Arc<EventLoop>) -> thread::JoinHandle<()> {
    let event_loop = Arc::clone(event_loop);
    thread::spawn(move || {
        event_loop.run().expect("event loop run");
    })
}

fn loopback(port: u16) -> Address {
    Address::loopback(Family::V4, port)
}

/// Run `f` on the loop thread and wait for its result. `invoke`/`invoke_later`
/// fire-and-forget; tests need the bound ephemeral port back, so this pairs
/// `invoke` with a one-shot channel.
fn call_on_loop<T, F>(event_loop: &Arc<EventLoop>, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    event_loop.invoke(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("loop did not respond in time")
}

#[test]
fn loopback_echo_tcp() {
    let event_loop = EventLoop::new().expect("new loop");
    let handle = run_loop_in_background(&event_loop);

    let (connected_tx, connected_rx) = mpsc::channel();
    let (received_tx, received_rx) = mpsc::channel();

    let acceptor = TcpAcceptor::new(&event_loop);
    let server_loop = Arc::clone(&event_loop);
    acceptor.set_accepted_callback(move |_acceptor, socket, peer| {
        let conn = TcpConnection::from_accepted(&server_loop, socket, peer).unwrap();
        conn.set_received_callback(|conn, inbound| {
            let bytes = inbound.read(inbound.readable()).unwrap();
            conn.send(&bytes).unwrap();
        });
        true
    });

    let acceptor_open = Arc::clone(&acceptor);
    let bound_port = call_on_loop(&event_loop, move || {
        acceptor_open
            .open(&loopback(0), AcceptorOptions::default())
            .unwrap();
        acceptor_open.local_address().unwrap().port()
    });

    let client = TcpConnection::new(&event_loop);
    client.set_connected_callback(move |_conn, ok| {
        let _ = connected_tx.send(ok);
    });
    client.set_received_callback(move |_conn, inbound| {
        let bytes = inbound.read(inbound.readable()).unwrap();
        let _ = received_tx.send(bytes);
    });

    let addr = loopback(bound_port);
    let client_connect = Arc::clone(&client);
    event_loop.invoke(move || {
        client_connect
            .connect(&addr, ConnectionOptions::default())
            .unwrap();
        client_connect.send(b"hello").unwrap();
    });

    assert!(connected_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    let echoed = received_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(echoed, b"hello");

    event_loop.stop();
    handle.join().unwrap();
}

#[test]
fn cross_thread_send_ordering() {
    let event_loop = EventLoop::new().expect("new loop");
    let handle = run_loop_in_background(&event_loop);

    let received = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = mpsc::channel();

    let acceptor = TcpAcceptor::new(&event_loop);
    let server_loop = Arc::clone(&event_loop);
    let received_srv = Arc::clone(&received);
    acceptor.set_accepted_callback(move |_acceptor, socket, peer| {
        let conn = TcpConnection::from_accepted(&server_loop, socket, peer).unwrap();
        let received_srv = Arc::clone(&received_srv);
        let done_tx = done_tx.clone();
        conn.set_received_callback(move |_conn, inbound| {
            let bytes = inbound.read(inbound.readable()).unwrap();
            let mut received = received_srv.lock().unwrap();
            received.extend_from_slice(&bytes);
            if received.len() >= 2 {
                let _ = done_tx.send(received.clone());
            }
        });
        true
    });

    let acceptor_open = Arc::clone(&acceptor);
    let bound_port = call_on_loop(&event_loop, move || {
        acceptor_open
            .open(&loopback(0), AcceptorOptions::default())
            .unwrap();
        acceptor_open.local_address().unwrap().port()
    });

    let client = TcpConnection::new(&event_loop);
    let addr = loopback(bound_port);
    let client_connect = Arc::clone(&client);

    // Connect synchronously (through the loop) so the socket is established
    // before any sends are scheduled.
    call_on_loop(&event_loop, move || {
        client_connect
            .connect(&addr, ConnectionOptions::default())
            .unwrap();
    });
    thread::sleep(Duration::from_millis(100));

    let barrier = Arc::new(Barrier::new(2));
    let barrier2 = Arc::clone(&barrier);

    let client_for_a = Arc::clone(&client);
    event_loop.invoke_later(move || {
        client_for_a.send(b"A").unwrap();
    });

    let client_for_b = Arc::clone(&client);
    let other_thread = thread::spawn(move || {
        barrier2.wait();
        client_for_b.send(b"B").unwrap();
    });
    barrier.wait();
    other_thread.join().unwrap();

    let final_bytes = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(final_bytes, b"AB");

    event_loop.stop();
    handle.join().unwrap();
}

#[test]
fn self_pipe_wakeup_stops_promptly() {
    let event_loop = EventLoop::new().expect("new loop");
    let handle = run_loop_in_background(&event_loop);

    // Give the loop a moment to block in `select`.
    thread::sleep(Duration::from_millis(50));

    let start = std::time::Instant::now();
    event_loop.stop();
    handle.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn acceptor_rejects_connection() {
    let event_loop = EventLoop::new().expect("new loop");
    let handle = run_loop_in_background(&event_loop);

    let acceptor = TcpAcceptor::new(&event_loop);
    acceptor.set_accepted_callback(|_acceptor, _socket, _peer| false);

    let acceptor_open = Arc::clone(&acceptor);
    let bound_port = call_on_loop(&event_loop, move || {
        acceptor_open
            .open(&loopback(0), AcceptorOptions::default())
            .unwrap();
        acceptor_open.local_address().unwrap().port()
    });

    let client = TcpConnection::new(&event_loop);
    let (closed_tx, closed_rx) = mpsc::channel();
    client.set_connected_callback(move |_conn, ok| {
        if !ok {
            let _ = closed_tx.send(());
        }
    });

    let addr = loopback(bound_port);
    let client_connect = Arc::clone(&client);
    event_loop.invoke(move || {
        client_connect
            .connect(&addr, ConnectionOptions::default())
            .unwrap();
        client_connect.send(b"x").unwrap();
    });

    closed_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The listener itself must still be accepting new connections.
    let acceptor_check = Arc::clone(&acceptor);
    let second_bound = call_on_loop(&event_loop, move || {
        acceptor_check.local_address().unwrap().port()
    });
    assert_eq!(second_bound, bound_port);

    event_loop.stop();
    handle.join().unwrap();
}

#[test]
fn udp_send_to_after_open() {
    let event_loop = EventLoop::new().expect("new loop");
    let handle = run_loop_in_background(&event_loop);

    let u = UdpEndpoint::new(&event_loop);
    let v = UdpEndpoint::new(&event_loop);

    let (received_tx, received_rx) = mpsc::channel();
    v.set_received_callback(move |_endpoint, data, source| {
        let _ = received_tx.send((data.to_vec(), source));
    });

    let u_open = Arc::clone(&u);
    let u_port = call_on_loop(&event_loop, move || {
        u_open.open(&loopback(0), UdpOptions::default()).unwrap();
        u_open.local_address().unwrap().port()
    });
    let v_open = Arc::clone(&v);
    let v_port = call_on_loop(&event_loop, move || {
        v_open.open(&loopback(0), UdpOptions::default()).unwrap();
        v_open.local_address().unwrap().port()
    });

    let v_addr = loopback(v_port);
    let u_send = Arc::clone(&u);
    event_loop.invoke(move || {
        u_send.send_to(b"ping", &v_addr).unwrap();
    });

    let (data, source) = received_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(data, b"ping");
    assert_eq!(source.port(), u_port);

    event_loop.stop();
    handle.join().unwrap();
}
