//! IO buffers
//!
//! Memory-aligned buffers (O_DIRECT needs sector alignment) and a per-worker
//! pool that hands each in-flight operation its own buffer, so no two
//! outstanding operations ever share memory.

use crate::Result;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::VecDeque;

/// Default alignment; satisfies O_DIRECT on 512e and 4Kn devices
pub const DEFAULT_ALIGNMENT: usize = 4096;

/// Memory-aligned, zero-initialised buffer suitable for O_DIRECT operations
pub struct AlignedBuffer {
    ptr: *mut u8,
    size: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate a buffer of `size` bytes aligned to `alignment`
    ///
    /// # Errors
    ///
    /// Fails if `size` is zero, `alignment` is not a power of two, or the
    /// allocation itself fails.
    pub fn new(size: usize, alignment: usize) -> Result<Self> {
        if size == 0 {
            anyhow::bail!("Buffer size must be greater than 0");
        }
        if !alignment.is_power_of_two() {
            anyhow::bail!("Alignment must be a power of 2, got {}", alignment);
        }

        let layout = Layout::from_size_align(size, alignment)
            .map_err(|e| anyhow::anyhow!("Invalid buffer layout ({} bytes, {} aligned): {}", size, alignment, e))?;

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            anyhow::bail!("Failed to allocate {} byte aligned buffer", size);
        }

        Ok(AlignedBuffer { ptr, size, layout })
    }

    /// Get a mutable raw pointer to the buffer
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    /// Get the buffer as a mutable slice
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for size initialised bytes for the buffer's
        // lifetime, and &mut self guarantees exclusivity
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.size) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr was allocated with exactly this layout
        unsafe {
            dealloc(self.ptr, self.layout);
        }
    }
}

// AlignedBuffer is Send because it owns its memory
unsafe impl Send for AlignedBuffer {}

/// Pre-allocated pool of aligned buffers
///
/// A worker allocates one buffer per slot of its in-flight window up front, so
/// the dispatch loop never allocates and never hands one buffer to two
/// outstanding operations.
pub struct BufferPool {
    buffers: Vec<AlignedBuffer>,
    available: VecDeque<usize>,
}

impl BufferPool {
    /// Create a pool of `num_buffers` buffers of `buffer_size` bytes each
    pub fn new(num_buffers: usize, buffer_size: usize, alignment: usize) -> Result<Self> {
        let mut buffers = Vec::with_capacity(num_buffers);
        let mut available = VecDeque::with_capacity(num_buffers);

        for i in 0..num_buffers {
            buffers.push(AlignedBuffer::new(buffer_size, alignment)?);
            available.push_back(i);
        }

        Ok(BufferPool { buffers, available })
    }

    /// Fill every buffer with random bytes
    ///
    /// Done once before a write phase so written data is not trivially
    /// compressible or deduplicated by the device.
    pub fn prefill_random(&mut self) {
        use rand::RngCore;
        let mut rng = rand::thread_rng();

        for buffer in &mut self.buffers {
            rng.fill_bytes(buffer.as_mut_slice());
        }
    }

    /// Take a free buffer, or `None` if every buffer is in use
    #[inline(always)]
    pub fn get(&mut self) -> Option<usize> {
        self.available.pop_front()
    }

    /// Return a buffer obtained from `get()`
    #[inline(always)]
    pub fn return_buffer(&mut self, index: usize) {
        debug_assert!(index < self.buffers.len(), "Invalid buffer index");
        debug_assert!(!self.available.contains(&index), "Buffer returned twice");
        self.available.push_back(index);
    }

    /// Get a mutable reference to a buffer by index
    ///
    /// # Panics
    /// Panics if the index is out of bounds
    #[inline(always)]
    pub fn get_buffer_mut(&mut self, index: usize) -> &mut AlignedBuffer {
        &mut self.buffers[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_buffer_creation() {
        let mut buffer = AlignedBuffer::new(8192, 4096).unwrap();
        assert_eq!(buffer.as_mut_ptr() as usize % 4096, 0);
        assert_eq!(buffer.as_mut_slice().len(), 8192);
        assert!(buffer.as_mut_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_alignment() {
        assert!(AlignedBuffer::new(4096, 513).is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(AlignedBuffer::new(0, 512).is_err());
    }

    #[test]
    fn test_buffer_pool_get_return() {
        let mut pool = BufferPool::new(3, 1024, 512).unwrap();

        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        let c = pool.get().unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(pool.get().is_none());

        pool.return_buffer(b);
        assert_eq!(pool.get(), Some(b));
        assert!(pool.get().is_none());
    }

    #[test]
    fn test_buffer_pool_buffers_are_distinct() {
        let mut pool = BufferPool::new(2, 4096, 4096).unwrap();
        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        let pa = pool.get_buffer_mut(a).as_mut_ptr();
        let pb = pool.get_buffer_mut(b).as_mut_ptr();
        assert_ne!(pa, pb);
        assert_eq!(pa as usize % 4096, 0);
        assert_eq!(pb as usize % 4096, 0);
    }

    #[test]
    fn test_prefill_random() {
        let mut pool = BufferPool::new(1, 4096, 512).unwrap();
        pool.prefill_random();
        let idx = pool.get().unwrap();
        // 4096 random bytes being all zero is not a realistic outcome
        assert!(pool.get_buffer_mut(idx).as_mut_slice().iter().any(|&b| b != 0));
    }
}
