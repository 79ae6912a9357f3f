//! Go-Back-N channel: cumulative-ACK pipelined reliability.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::endpoint::DatagramEndpoint;
use crate::error::{Error, Result};
use crate::packet::{self, PacketType, MAX_PAYLOAD};
use crate::teardown::send_fin_and_await_ack;

pub const WINDOW_N: usize = 3;
const RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(50);
const ACK_EMIT_INTERVAL: Duration = Duration::from_millis(10);

struct Inner {
    base: u32,
    end: u32,
    queue: VecDeque<Vec<u8>>,
}

/// Sender-side sliding window, shared between the feeder, the ACK
/// receiver, and the retransmit timer behind one mutex.
pub(crate) struct Window {
    n: usize,
    inner: Mutex<Inner>,
    cv_queue: Condvar,
    cv_timer: Condvar,
}

impl Window {
    fn new(base: u32, end: u32, n: usize) -> Self {
        Window {
            n,
            inner: Mutex::new(Inner {
                base,
                end,
                queue: VecDeque::new(),
            }),
            cv_queue: Condvar::new(),
            cv_timer: Condvar::new(),
        }
    }

    /// Waits until the queue has room, transmits immediately, and enqueues.
    fn push(&self, endpoint: &DatagramEndpoint, bytes: Vec<u8>) {
        let mut guard = self
            .inner
            .lock()
            .unwrap();
        guard = self
            .cv_queue
            .wait_while(guard, |inner| inner.queue.len() >= self.n)
            .unwrap();

        endpoint.send_raw(&bytes);
        guard.queue.push_back(bytes);
    }

    /// `a` is the next-expected sequence number the receiver reports
    /// (cumulative ACK). Advances `base` to `a`, dropping the acked prefix.
    fn on_ack(&self, a: u32) {
        let mut guard = self.inner.lock().unwrap();
        if a > guard.base {
            let advance = (a - guard.base) as usize;
            for _ in 0..advance {
                guard.queue.pop_front();
            }
            guard.base = a;
            log::trace!("gbn: window advanced to base {a}");
            self.cv_timer.notify_all();
            self.cv_queue.notify_all();
        }
    }

    /// Blocks until `base == end`.
    fn wait_for_drain(&self) {
        let guard = self.inner.lock().unwrap();
        let _ = self
            .cv_queue
            .wait_while(guard, |inner| inner.base != inner.end)
            .unwrap();
    }

    /// Periodic retransmit loop. Each wake is either a real 50ms timeout
    /// (retransmit the whole queue) or an early wake from `on_ack`
    /// resetting the timer — either way the post-wake state is rechecked
    /// before acting. Exits once the window has fully drained.
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

            if wait_result.timed_out() && !guard.queue.is_empty() {
                log::debug!("gbn: retransmit timeout, resending {} packet(s)", guard.queue.len());
                for bytes in &guard.queue {
                    endpoint.send_raw(bytes);
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct Gbn {
    endpoint: Arc<DatagramEndpoint>,
}

impl Gbn {
    pub fn new(endpoint: Arc<DatagramEndpoint>) -> Self {
        Gbn { endpoint }
    }

    pub fn send_all(&self, buf: &[u8]) -> bool {
        let end = slice_count(buf.len());
        let window = Arc::new(Window::new(0, end, WINDOW_N));

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
                window.on_ack(packet.num);
                if packet.num == end {
                    break;
                }
            })
        };

        for (seq, slice) in buf.chunks(MAX_PAYLOAD).enumerate() {
            let bytes = packet::encode(PacketType::Data, seq as u32, slice);
            window.push(&self.endpoint, bytes);
        }

        ack_handle.join().unwrap();
        window.wait_for_drain();
        retransmit_handle.join().unwrap();

        send_fin_and_await_ack(&self.endpoint)
    }

    pub fn recv_all(&self, buf: &mut [u8]) -> Result<usize> {
        let expected = Arc::new(Mutex::new(0u32));
        let stop = Arc::new(Mutex::new(false));

        let ack_emitter = {
            let endpoint = Arc::clone(&self.endpoint);
            let expected = Arc::clone(&expected);
            let stop = Arc::clone(&stop);
            thread::spawn(move || loop {
                thread::sleep(ACK_EMIT_INTERVAL);
                if *stop.lock().unwrap() {
                    break;
                }
                let e = *expected.lock().unwrap();
                endpoint.send_packet(PacketType::Ack, e, &[]);
            })
        };

        let mut written = 0usize;
        let result = loop {
            let Some(packet) = self.endpoint.recv() else {
                continue;
            };

            match packet.typ {
                PacketType::Data => {
                    let mut e = expected.lock().unwrap();
                    if packet.num == *e {
                        if written + packet.payload.len() > buf.len() {
                            break Err(Error::BufferOverflow { capacity: buf.len() });
                        }
                        buf[written..written + packet.payload.len()].copy_from_slice(&packet.payload);
                        written += packet.payload.len();
                        *e += 1;
                    }
                }
                PacketType::Fin => {
                    self.endpoint.send_packet(PacketType::FinAck, 0, &[]);
                    break Ok(written);
                }
                _ => {}
            }
        };

        *stop.lock().unwrap() = true;
        ack_emitter.join().unwrap();

        result
    }
}

pub(crate) fn slice_count(len: usize) -> u32 {
    len.div_ceil(MAX_PAYLOAD) as u32
}
