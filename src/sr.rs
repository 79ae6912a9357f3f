//! Selective Repeat channel: per-slice-ACK pipelined reliability.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::endpoint::DatagramEndpoint;
use crate::error::{Error, Result};
use crate::packet::{self, PacketType, MAX_PAYLOAD};
use crate::teardown::send_fin_and_await_ack;

pub const WINDOW_N: usize = 3;
const RETRANSMIT_INTERVAL: Duration = Duration::from_millis(50);

/// One in-flight slice: its own ack flag and wakeup, so the per-slice
/// sender thread can stop independently of every other slice.
struct Task {
    seq: u32,
    bytes: Vec<u8>,
    acked: Mutex<bool>,
    cv: Condvar,
}

struct Inner {
    base: u32,
    queue: VecDeque<Arc<Task>>,
}

struct WindowSr {
    n: usize,
    inner: Mutex<Inner>,
    cv_queue: Condvar,
}

impl WindowSr {
    fn new(base: u32, n: usize) -> Self {
        WindowSr {
            n,
            inner: Mutex::new(Inner {
                base,
                queue: VecDeque::new(),
            }),
            cv_queue: Condvar::new(),
        }
    }

    /// Waits for room, records `task` at `seq - base`, and spawns its
    /// per-slice sender thread.
    fn push(&self, endpoint: Arc<DatagramEndpoint>, task: Arc<Task>) -> JoinHandle<()> {
        let mut guard = self.inner.lock().unwrap();
        guard = self
            .cv_queue
            .wait_while(guard, |inner| inner.queue.len() >= self.n)
            .unwrap();
        guard.queue.push_back(Arc::clone(&task));
        drop(guard);

        thread::spawn(move || {
            let mut acked = task.acked.lock().unwrap();
            loop {
                log::trace!("sr: sending slice {}", task.seq);
                endpoint.send_raw(&task.bytes);
                let (guard, _) = task
                    .cv
                    .wait_timeout_while(acked, RETRANSMIT_INTERVAL, |acked| !*acked)
                    .unwrap();
                acked = guard;
                if *acked {
                    break;
                }
            }
        })
    }

    /// ACKs exactly one slice by sequence number, then advances `base`
    /// past the maximal acked prefix.
    fn on_ack(&self, a: u32) {
        let mut guard = self.inner.lock().unwrap();

        if a < guard.base || a >= guard.base + guard.queue.len() as u32 {
            return;
        }

        let idx = (a - guard.base) as usize;
        {
            let task = &guard.queue[idx];
            let mut acked = task.acked.lock().unwrap();
            *acked = true;
            task.cv.notify_all();
        }

        let mut moving = 0usize;
        for task in guard.queue.iter() {
            if *task.acked.lock().unwrap() {
                moving += 1;
            } else {
                break;
            }
        }

        if moving > 0 {
            for _ in 0..moving {
                guard.queue.pop_front();
            }
            guard.base += moving as u32;
            log::trace!("sr: window advanced to base {}", guard.base);
            self.cv_queue.notify_all();
        }
    }
}

#[derive(Debug)]
pub struct Sr {
    endpoint: Arc<DatagramEndpoint>,
}

impl Sr {
    pub fn new(endpoint: Arc<DatagramEndpoint>) -> Self {
        Sr { endpoint }
    }

    pub fn send_all(&self, buf: &[u8]) -> bool {
        let end = crate::gbn::slice_count(buf.len());
        let window = Arc::new(WindowSr::new(0, WINDOW_N));
        let outstanding: Arc<Mutex<HashSet<u32>>> = Arc::new(Mutex::new((0..end).collect()));

        let ack_handle = {
            let endpoint = Arc::clone(&self.endpoint);
            let window = Arc::clone(&window);
            let outstanding = Arc::clone(&outstanding);
            thread::spawn(move || loop {
                if outstanding.lock().unwrap().is_empty() {
                    break;
                }
                let Some(packet) = endpoint.recv() else {
                    continue;
                };
                if packet.typ != PacketType::Ack {
                    continue;
                }
                log::trace!("sr: received ACK {}", packet.num);
                window.on_ack(packet.num);

                let mut outstanding = outstanding.lock().unwrap();
                outstanding.remove(&packet.num);
                if outstanding.is_empty() {
                    break;
                }
            })
        };

        let mut sender_handles = Vec::new();
        for (seq, slice) in buf.chunks(MAX_PAYLOAD).enumerate() {
            let task = Arc::new(Task {
                seq: seq as u32,
                bytes: packet::encode(PacketType::Data, seq as u32, slice),
                acked: Mutex::new(false),
                cv: Condvar::new(),
            });
            sender_handles.push(window.push(Arc::clone(&self.endpoint), task));
        }

        ack_handle.join().unwrap();
        for handle in sender_handles {
            handle.join().unwrap();
        }

        send_fin_and_await_ack(&self.endpoint)
    }

    pub fn recv_all(&self, buf: &mut [u8]) -> Result<usize> {
        let mut received = 0usize;

        loop {
            let Some(packet) = self.endpoint.recv() else {
                continue;
            };

            match packet.typ {
                PacketType::Data => {
                    let offset = packet.num as usize * MAX_PAYLOAD;
                    let end = offset + packet.payload.len();
                    if end > buf.len() {
                        return Err(Error::BufferOverflow { capacity: buf.len() });
                    }
                    buf[offset..end].copy_from_slice(&packet.payload);
                    received = received.max(end);

                    self.endpoint.send_packet(PacketType::Ack, packet.num, &[]);
                }
                PacketType::Fin => {
                    self.endpoint.send_packet(PacketType::FinAck, 0, &[]);
                    return Ok(received);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::endpoint_pair;

    /// Slices delivered out of order reassemble at the right offsets.
    #[test]
    fn reordering_assembles_correctly() {
        let (server_ep, client_ep) = endpoint_pair();
        let sr = Sr::new(Arc::new(server_ep));

        let slices: Vec<Vec<u8>> = (0..5u32).map(|i| vec![i as u8; 4]).collect();
        let server_thread = thread::spawn(move || {
            let mut buf = vec![0u8; 4 * 5];
            sr.recv_all(&mut buf).map(|n| (buf, n))
        });

        for &i in &[4usize, 2, 0, 3, 1] {
            client_ep.send_packet(PacketType::Data, i as u32, &slices[i]);
            let ack = client_ep.recv().unwrap();
            assert_eq!(ack.typ, PacketType::Ack);
            assert_eq!(ack.num, i as u32);
        }
        client_ep.send_packet(PacketType::Fin, 0, &[]);
        assert_eq!(client_ep.recv().unwrap().typ, PacketType::FinAck);

        let (buf, n) = server_thread.join().unwrap().unwrap();
        assert_eq!(n, 20);
        for i in 0..5 {
            assert_eq!(&buf[i * 4..i * 4 + 4], &slices[i][..]);
        }
    }

    #[test]
    fn receiver_buffer_overflow_is_fatal() {
        let (server_ep, client_ep) = endpoint_pair();
        let sr = Sr::new(Arc::new(server_ep));
        let server_thread = thread::spawn(move || {
            let mut buf = vec![0u8; 4];
            sr.recv_all(&mut buf)
        });

        client_ep.send_packet(PacketType::Data, 0, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(matches!(
            server_thread.join().unwrap(),
            Err(Error::BufferOverflow { .. })
        ));
    }

    /// Window bound (invariant 8) and duplicate-ACK idempotency: acking the
    /// same slice twice never advances `base` twice.
    #[test]
    fn window_never_exceeds_capacity_and_duplicate_ack_is_idempotent() {
        let (server_ep, client_ep) = endpoint_pair();
        let client_ep = Arc::new(client_ep);
        let window = Arc::new(WindowSr::new(0, 2));

        let mut handles = Vec::new();
        for seq in 0..2u32 {
            let task = Arc::new(Task {
                seq,
                bytes: packet::encode(PacketType::Data, seq, &[seq as u8]),
                acked: Mutex::new(false),
                cv: Condvar::new(),
            });
            handles.push(window.push(Arc::clone(&client_ep), task));
        }
        assert_eq!(window.inner.lock().unwrap().queue.len(), 2);

        for _ in 0..2 {
            server_ep.recv().unwrap();
        }

        window.on_ack(0);
        window.on_ack(0); // duplicate: a < base now, must be ignored
        assert_eq!(window.inner.lock().unwrap().base, 1);

        window.on_ack(1);
        assert_eq!(window.inner.lock().unwrap().base, 2);

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
