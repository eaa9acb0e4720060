//! A UDP echo server built on `netreact::net`.
//!
//! ```text
//! $ cargo run --example udp_server
//! $ nc -u 127.0.0.1 9000
//! ```

use std::io;

use netreact::net::{UdpEndpoint, UdpOptions};
use netreact::{Address, EventLoop, Family};

fn main() -> io::Result<()> {
    env_logger::init();

    let event_loop = EventLoop::new().expect("create event loop");
    let endpoint = UdpEndpoint::new(&event_loop);

    endpoint.set_received_callback(|endpoint, data, source| {
        println!("got packet ({} bytes) from {source}", data.len());
        if let Err(e) = endpoint.send_to(data, &source) {
            eprintln!("echo failed: {e}");
        }
    });

    let addr = Address::parse("127.0.0.1", 9000, Family::V4).expect("valid address");
    endpoint
        .open(&addr, UdpOptions::default())
        .expect("bind 127.0.0.1:9000");

    println!("You can connect to the server using `nc`:");
    println!(" $ nc -u 127.0.0.1 9000");
    println!("Anything you type will be echoed back to you.");

    event_loop.run().expect("event loop run");
    Ok(())
}
