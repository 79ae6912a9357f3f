//! RENO-style congestion control overlaid on GBN.
//!
//! The receiver is identical to GBN's, so `recv_all` delegates straight to
//! [`crate::gbn::Gbn`]. The sender side needs its own window, since the
//! fixed-`N` GBN window can't express a floating-point `cwnd` — a sibling
//! implementation rather than a shared base with virtual hooks.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::endpoint::DatagramEndpoint;
use crate::gbn::{slice_count, Gbn};
use crate::packet::{self, PacketType, MAX_PAYLOAD};
use crate::teardown::send_fin_and_await_ack;

const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(50);
const INITIAL_THRESHOLD: f64 = 16.0;

struct Inner {
    base: u32,
    end: u32,
    queue: VecDeque<(u32, Vec<u8>)>,
    cwnd: f64,
    threshold: f64,
    prev_ack: Option<u32>,
    dup_cnt: u32,
}

struct WindowReno {
    inner: Mutex<Inner>,
    cv_queue: Condvar,
    cv_timer: Condvar,
}

impl WindowReno {
    fn new(base: u32, end: u32) -> Self {
        WindowReno {
            inner: Mutex::new(Inner {
                base,
                end,
                queue: VecDeque::new(),
                cwnd: 1.0,
                threshold: INITIAL_THRESHOLD,
                prev_ack: None,
                dup_cnt: 0,
            }),
            cv_queue: Condvar::new(),
            cv_timer: Condvar::new(),
        }
    }

    fn push(&self, endpoint: &DatagramEndpoint, seq: u32, bytes: Vec<u8>) {
        let mut guard = self
            .inner
            .lock()
            .unwrap();
        guard = self
            .cv_queue
            .wait_while(guard, |inner| inner.queue.len() >= inner.cwnd.floor() as usize)
            .unwrap();

        endpoint.send_raw(&bytes);
        guard.queue.push_back((seq, bytes));
    }

    fn on_ack(&self, endpoint: &DatagramEndpoint, a: u32) {
        let mut guard = self.inner.lock().unwrap();

        if guard.prev_ack == Some(a) {
            guard.dup_cnt += 1;

            if guard.dup_cnt == 3 {
                guard.threshold = guard.cwnd / 2.0;
                guard.cwnd = guard.threshold + 3.0;
                log::debug!(
                    "reno: fast retransmit at ack {a}, cwnd={:.2} threshold={:.2}",
                    guard.cwnd,
                    guard.threshold
                );
                if let Some((_, bytes)) = guard.queue.iter().find(|(seq, _)| *seq == a) {
                    endpoint.send_raw(bytes);
                }
                self.cv_queue.notify_all();
            } else if guard.dup_cnt > 3 {
                guard.cwnd += 1.0;
                self.cv_queue.notify_all();
            }
        } else {
            guard.dup_cnt = 0;
            if guard.cwnd < guard.threshold {
                guard.cwnd += 1.0;
            } else {
                guard.cwnd += 1.0 / guard.cwnd;
            }
        }
        guard.prev_ack = Some(a);

        if guard.base < a {
            let advance = (a - guard.base) as usize;
            for _ in 0..advance {
                guard.queue.pop_front();
            }
            guard.base = a;
            log::trace!("reno: window advanced to base {a}");
            self.cv_timer.notify_all();
            self.cv_queue.notify_all();
        }
    }

    fn retransmit_loop(&self, endpoint: &DatagramEndpoint) {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if guard.base == guard.end {
                break;
            }

            let (g, wait_result) = self.cv_timer.wait_timeout(guard, RETRANSMIT_TIMEOUT).unwrap();
            guard = g;

            if guard.base == guard.end {
                break;
            }

            if wait_result.timed_out() {
                log::debug!("reno: retransmit timeout, resending {} packet(s)", guard.queue.len());
                for (_, bytes) in guard.queue.iter() {
                    endpoint.send_raw(bytes);
                }
                guard.threshold = guard.cwnd / 2.0;
                guard.cwnd = 1.0;
                guard.dup_cnt = 0;
                guard.prev_ack = None;
                self.cv_queue.notify_all();
            }
        }
    }

    fn wait_for_drain(&self) {
        let guard = self.inner.lock().unwrap();
        let _ = self
            .cv_queue
            .wait_while(guard, |inner| inner.base != inner.end)
            .unwrap();
    }
}

#[derive(Debug)]
pub struct Reno {
    endpoint: Arc<DatagramEndpoint>,
    gbn: Gbn,
}

impl Reno {
    pub fn new(endpoint: Arc<DatagramEndpoint>) -> Self {
        let gbn = Gbn::new(Arc::clone(&endpoint));
        Reno { endpoint, gbn }
    }

    pub fn send_all(&self, buf: &[u8]) -> bool {
        let end = slice_count(buf.len());
        let window = Arc::new(WindowReno::new(0, end));

        let retransmit_handle = {
            let endpoint = Arc::clone(&self.endpoint);
            let window = Arc::clone(&window);
            thread::spawn(move || window.retransmit_loop(&endpoint))
        };

        let ack_handle = {
            let endpoint = Arc::clone(&self.endpoint);
            let window = Arc::clone(&window);
            thread::spawn(move || loop {
                let Some(packet) = endpoint.recv() else {
                    continue;
                };
                if packet.typ != PacketType::Ack {
                    continue;
                }
                window.on_ack(&endpoint, packet.num);
                if packet.num == end {
                    break;
                }
            })
        };

        for (seq, slice) in buf.chunks(MAX_PAYLOAD).enumerate() {
            let bytes = packet::encode(PacketType::Data, seq as u32, slice);
            window.push(&self.endpoint, seq as u32, bytes);
        }

        ack_handle.join().unwrap();
        window.wait_for_drain();
        retransmit_handle.join().unwrap();

        send_fin_and_await_ack(&self.endpoint)
    }

    pub fn recv_all(&self, buf: &mut [u8]) -> crate::error::Result<usize> {
        self.gbn.recv_all(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::endpoint_pair;

    /// Three duplicate cumulative ACKs (slice 0 missing, 1-3 arrived at
    /// the receiver) trigger fast retransmit of the missing slice and
    /// halve the threshold.
    #[test]
    fn three_duplicate_acks_trigger_fast_retransmit() {
        let (server_ep, client_ep) = endpoint_pair();
        let window = WindowReno::new(0, 4);
        {
            let mut guard = window.inner.lock().unwrap();
            for seq in 0..4u32 {
                let bytes = packet::encode(PacketType::Data, seq, &[seq as u8]);
                client_ep.send_raw(&bytes);
                guard.queue.push_back((seq, bytes));
            }
        }
        for _ in 0..4 {
            server_ep.recv().unwrap();
        }

        // receiver keeps reporting "next expected = 0" while slice 0 is
        // missing: the first call just establishes prev_ack, the next
        // three are the duplicates that complete the fast-retransmit count.
        window.on_ack(&client_ep, 0);
        window.on_ack(&client_ep, 0);
        window.on_ack(&client_ep, 0);
        window.on_ack(&client_ep, 0);

        {
            let guard = window.inner.lock().unwrap();
            assert_eq!(guard.dup_cnt, 3);
            assert_eq!(guard.threshold, 1.0);
            assert_eq!(guard.cwnd, 4.0);
        }

        let retransmit = server_ep.recv().unwrap();
        assert_eq!(retransmit.num, 0);
    }

    /// A retransmit timeout halves the threshold from the pre-timeout
    /// `cwnd` and drops `cwnd` back to the slow-start floor.
    #[test]
    fn timeout_halves_threshold_and_resets_cwnd() {
        let (server_ep, client_ep) = endpoint_pair();
        let client_ep = Arc::new(client_ep);
        let window = Arc::new(WindowReno::new(0, 1));
        {
            let mut guard = window.inner.lock().unwrap();
            guard.cwnd = 8.0;
            let bytes = packet::encode(PacketType::Data, 0, b"x");
            client_ep.send_raw(&bytes);
            guard.queue.push_back((0, bytes));
        }
        server_ep.recv().unwrap();

        let handle = {
            let window = Arc::clone(&window);
            let client_ep = Arc::clone(&client_ep);
            thread::spawn(move || window.retransmit_loop(&client_ep))
        };

        server_ep.recv().unwrap(); // resent after the 50ms timeout

        {
            let guard = window.inner.lock().unwrap();
            assert_eq!(guard.threshold, 4.0);
            assert_eq!(guard.cwnd, 1.0);
        }

        window.on_ack(&client_ep, 1);
        handle.join().unwrap();
    }
}
