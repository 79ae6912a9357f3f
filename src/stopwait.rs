//! Stop-and-wait channel: a window of size one with a single alternating
//! bit of sequence number.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::endpoint::DatagramEndpoint;
use crate::error::{Error, Result};
use crate::packet::{PacketType, MAX_PAYLOAD};
use crate::teardown::send_fin_and_await_ack;

const TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub struct StopWait {
    endpoint: Arc<DatagramEndpoint>,
}

fn flip(seq: u32) -> u32 {
    (!seq) & 1
}

impl StopWait {
    pub fn new(endpoint: Arc<DatagramEndpoint>) -> Self {
        StopWait { endpoint }
    }

    pub fn send_all(&self, buf: &[u8]) -> bool {
        let mut seq: u32 = 0;

        for slice in buf.chunks(MAX_PAYLOAD) {
            self.send_slice(seq, slice);
            seq = flip(seq);
        }

        send_fin_and_await_ack(&self.endpoint)
    }

    /// Runs the sender/ACK-receiver thread pair for one slice and joins
    /// both before returning, matching `original_source/reliable.cpp`'s
    /// per-slice `sender`/`ackReceiver` threads.
    fn send_slice(&self, seq: u32, slice: &[u8]) {
        let state = Arc::new((Mutex::new(false), Condvar::new()));

        let sender = {
            let endpoint = Arc::clone(&self.endpoint);
            let state = Arc::clone(&state);
            let slice = slice.to_vec();
            thread::spawn(move || {
                let (lock, cvar) = &*state;
                let mut acked = lock.lock().unwrap();
                loop {
                    log::trace!("stopwait: sending slice {seq}");
                    endpoint.send_packet(PacketType::Data, seq, &slice);
                    let (guard, _timeout) =
                        cvar.wait_timeout_while(acked, TIMEOUT, |acked| !*acked).unwrap();
                    acked = guard;
                    if *acked {
                        break;
                    }
                }
                log::trace!("stopwait: slice {seq} acked");
            })
        };

        let ack_receiver = {
            let endpoint = Arc::clone(&self.endpoint);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                loop {
                    let Some(packet) = endpoint.recv() else {
                        continue;
                    };
                    if packet.typ == PacketType::Ack && packet.num == seq {
                        let (lock, cvar) = &*state;
                        let mut acked = lock.lock().unwrap();
                        *acked = true;
                        cvar.notify_one();
                        break;
                    }
                }
            })
        };

        sender.join().unwrap();
        ack_receiver.join().unwrap();
    }

    pub fn recv_all(&self, buf: &mut [u8]) -> Result<usize> {
        let mut expected: u32 = 0;
        let mut written = 0usize;

        loop {
            let Some(packet) = self.endpoint.recv() else {
                continue;
            };

            match packet.typ {
                PacketType::Data if packet.num == expected => {
                    if written + packet.payload.len() > buf.len() {
                        return Err(Error::BufferOverflow { capacity: buf.len() });
                    }
                    buf[written..written + packet.payload.len()].copy_from_slice(&packet.payload);
                    written += packet.payload.len();

                    self.endpoint.send_packet(PacketType::Ack, expected, &[]);
                    expected = flip(expected);
                }
                PacketType::Fin => {
                    self.endpoint.send_packet(PacketType::FinAck, 0, &[]);
                    return Ok(written);
                }
                _ => {
                    // duplicate DATA, or anything else: force a retransmit
                    // by re-acking the previous sequence number.
                    self.endpoint.send_packet(PacketType::Ack, flip(expected), &[]);
                }
            }
        }
    }
}
