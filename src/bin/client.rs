use std::env;
use std::net::Ipv4Addr;

use reliable_udp::{connect, Variant};

fn usage() -> ! {
    eprintln!("usage: client <ip> <port> <stopwait|gbn|sr|reno> <message>");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let ip: Ipv4Addr = args.next().and_then(|a| a.parse().ok()).unwrap_or_else(|| usage());
    let port: u16 = args.next().and_then(|a| a.parse().ok()).unwrap_or_else(|| usage());
    let variant = match args.next().as_deref() {
        Some("stopwait") => Variant::StopWait,
        Some("gbn") => Variant::Gbn,
        Some("sr") => Variant::Sr,
        Some("reno") => Variant::Reno,
        _ => usage(),
    };
    let message = args.next().unwrap_or_else(|| usage());

    println!(">>> connecting to {ip}:{port} ({variant:?})");
    let channel = connect(ip.into(), port, variant).unwrap();
    println!(">>> handshake complete, sending {} byte(s)", message.len());

    let ok = channel.send_all(message.as_bytes());
    println!(">>> send_all returned {ok}");
}
