use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;
const DEFAULT_MAX_POOLED: usize = 64;

/// Free list of reusable byte buffers for request and response bodies.
///
/// Buffers are handed out as [`PooledBuffer`] guards and return to the pool,
/// cleared, when the guard drops. At most `max_pooled` idle buffers are kept.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
    buffer_capacity: usize,
    max_pooled: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_POOLED)
    }
}

impl BufferPool {
    pub fn new(buffer_capacity: usize, max_pooled: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            buffer_capacity,
            max_pooled,
        }
    }

    /// Take a buffer from the free list, allocating one if it is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.buffer_capacity));
        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffers.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut buf: BytesMut) {
        buf.clear();
        // Reclaims the original allocation once frozen views of it are gone.
        buf.reserve(self.buffer_capacity);
        let mut free = self.free.lock();
        if free.len() < self.max_pooled {
            free.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_reused_and_cleared() {
        let pool = Arc::new(BufferPool::new(64, 4));
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"secret body");
        }
        assert_eq!(pool.available(), 1);

        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn idle_buffers_are_bounded() {
        let pool = Arc::new(BufferPool::new(16, 2));
        let guards: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(guards);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn frozen_views_outlive_the_guard() {
        let pool = Arc::new(BufferPool::default());
        let mut buf = pool.acquire();
        buf.extend_from_slice(b"{\"a\":1}");
        let view = buf.split().freeze();
        drop(buf);
        assert_eq!(&view[..], b"{\"a\":1}");
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = Arc::new(BufferPool::new(32, 8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = pool.acquire();
                        assert!(buf.is_empty());
                        buf.extend_from_slice(&[i; 16]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(pool.available() <= 8);
    }
}
