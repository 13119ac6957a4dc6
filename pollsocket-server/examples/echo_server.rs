//! Echo Server Example
//!
//! Echoes every text and binary frame back to its sender, greets clients
//! that join `/chat`, and closes connections that stayed quiet for a whole
//! poll interval.
//!
//! Run with `RUST_LOG=debug cargo run --example echo_server`.

use pollsocket_server::logging::init_logging;
use pollsocket_server::prelude::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let mut server = Server::builder()
        .bind("127.0.0.1:8080")
        .poll_interval_secs(30.0)?
        .max_connections(1000)
        .build()?;

    // Agents that sent something since the last idle tick
    let active = Rc::new(RefCell::new(HashSet::new()));

    let seen = Rc::clone(&active);
    let idle = Rc::clone(&active);
    let gone = Rc::clone(&active);

    server
        .on_start(|state| {
            if let Some(addr) = state.local_addr() {
                println!("🚀 Echo server listening on ws://{}", addr);
            }
        })
        .on_connect(|agent| {
            println!("📡 New connection from {} on {}", agent.id(), agent.uri());
            if agent.uri() == "/chat" {
                let _ = agent.send_text("welcome to /chat");
            }
        })
        .on_receive(move |agent, opcode, payload| {
            seen.borrow_mut().insert(agent.key());
            match opcode {
                Opcode::Text => {
                    let text = String::from_utf8_lossy(payload);
                    println!("📨 Received text: {}", text);
                    let _ = agent.send_text(&format!("Echo: {}", text));
                }
                _ => {
                    println!("📨 Received {:?}: {} bytes", opcode, payload.len());
                    let _ = agent.send(opcode, payload.clone());
                }
            }
        })
        .on_idle(move |agent| {
            if !idle.borrow_mut().remove(&agent.key()) {
                println!("💤 Closing quiet connection {}", agent.id());
                let _ = agent.close(CloseCode::Away);
            }
        })
        .on_disconnect(move |agent| {
            gone.borrow_mut().remove(&agent.key());
            println!("🔌 {} closed ({:?})", agent.id(), agent.close_reason());
        })
        .on_error(|_, err| eprintln!("⚠️  {}", err))
        .on_stop(|_| println!("👋 Server stopped"));

    server.run()?;
    Ok(())
}
