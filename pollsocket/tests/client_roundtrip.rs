#![cfg(feature = "server")]

use pollsocket::handshake::{client_request, compute_accept_key, generate_key};
use pollsocket::prelude::*;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing_test::traced_test;

fn roundtrip(addr: std::net::SocketAddr, text: &str) -> std::io::Result<Frame> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let key = generate_key();
    stream.write_all(client_request("localhost", "/echo", &key).as_bytes())?;
    stream.write_all(&Frame::text(text.to_string()).masked().to_bytes())?;

    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk)?;
        assert!(n > 0, "server closed early");
        received.extend_from_slice(&chunk[..n]);

        let Some(end) = pollsocket::handshake::find_head_end(&received) else {
            continue;
        };
        let head = String::from_utf8_lossy(&received[..end]);
        assert!(head.contains(&compute_accept_key(&key)));
        let mut parser = FrameParser::new(MaskPolicy::Forbidden, 1 << 20);
        parser.extend(&received[end..]);
        if let Some(frame) = parser.next_frame().expect("valid server frame") {
            return Ok(frame);
        }
    }
}

#[test]
#[traced_test]
fn ws_echo_roundtrip() {
    let token = ShutdownToken::new();
    let mut server = Server::builder()
        .bind("127.0.0.1:0")
        .handle_signals(false)
        .shutdown_token(token.clone())
        .build()
        .unwrap();

    let (addr_tx, addr_rx) = mpsc::channel();
    server
        .on_start(move |state| {
            addr_tx.send(state.local_addr().unwrap()).unwrap();
        })
        .on_receive(|agent, opcode, payload| {
            let _ = agent.send(opcode, payload.clone());
        });

    let client = thread::spawn(move || {
        let addr = addr_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let result = roundtrip(addr, "ping through the facade");
        token.cancel();
        result
    });

    server.run().unwrap();
    let frame = client.join().unwrap().unwrap();

    assert_eq!(frame.opcode, Opcode::Text);
    assert_eq!(frame.payload, "ping through the facade");
    assert!(logs_contain("listening on"));
    assert!(logs_contain("connected to /echo"));
}
