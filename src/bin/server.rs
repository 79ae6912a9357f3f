use std::env;

use reliable_udp::{listen, Variant};

fn usage() -> ! {
    eprintln!("usage: server <port> <stopwait|gbn|sr|reno> [buffer-size]");
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let port: u16 = args.next().and_then(|a| a.parse().ok()).unwrap_or_else(|| usage());
    let variant = match args.next().as_deref() {
        Some("stopwait") => Variant::StopWait,
        Some("gbn") => Variant::Gbn,
        Some("sr") => Variant::Sr,
        Some("reno") => Variant::Reno,
        _ => usage(),
    };
    let buffer_size: usize = args.next().and_then(|a| a.parse().ok()).unwrap_or(1 << 20);

    println!(">>> listening on 0.0.0.0:{port} ({variant:?})");
    let channel = listen(port, variant).unwrap();
    println!(">>> handshake complete, awaiting data");

    let mut buf = vec![0u8; buffer_size];
    let n = channel.recv_all(&mut buf).unwrap();

    println!(">>> received {n} byte(s)");
    println!("{:?}", String::from_utf8_lossy(&buf[..n.min(256)]));
}
