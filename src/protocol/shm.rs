//! wl_shm protocol implementation
//!
//! Clients share pixel data through memory pools backed by a file
//! descriptor. Pools are mapped read-only on first use and remapped when the
//! client grows them. On commit the buffer contents are copied out, so the
//! client can reuse its buffer as soon as it is released.

use std::collections::HashMap;
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use memmap2::{Mmap, MmapOptions};

use crate::renderer::{PixelBuffer, PixelFormat};

/// Unique identifier for shm pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShmPoolId(pub u64);

impl ShmPoolId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ShmPoolId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unique identifier for shm buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShmBufferId(pub u64);

impl ShmBufferId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ShmBufferId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Supported pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmFormat {
    /// 32-bit ARGB (A in high byte)
    Argb8888,
    /// 32-bit XRGB (X in high byte, alpha ignored)
    Xrgb8888,
    /// Other format with raw value
    Other(u32),
}

impl ShmFormat {
    /// Create from Wayland format value
    pub fn from_wayland(format: u32) -> Self {
        match format {
            0 => ShmFormat::Argb8888,
            1 => ShmFormat::Xrgb8888,
            other => ShmFormat::Other(other),
        }
    }

    /// Convert to Wayland format value
    pub fn to_wayland(&self) -> u32 {
        match self {
            ShmFormat::Argb8888 => 0,
            ShmFormat::Xrgb8888 => 1,
            ShmFormat::Other(v) => *v,
        }
    }

    /// Get bytes per pixel
    pub fn bytes_per_pixel(&self) -> u32 {
        4
    }

    /// Matching compositor pixel format
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        match self {
            ShmFormat::Argb8888 => Some(PixelFormat::Argb8888),
            ShmFormat::Xrgb8888 => Some(PixelFormat::Xrgb8888),
            ShmFormat::Other(_) => None,
        }
    }
}

/// A shared memory pool
#[derive(Debug)]
pub struct ShmPool {
    /// Unique identifier
    pub id: ShmPoolId,
    fd: OwnedFd,
    /// Size of the pool in bytes
    pub size: usize,
    map: Option<Mmap>,
    /// Buffers still created from this pool
    buffers: usize,
    /// The client destroyed its wl_shm_pool
    destroyed: bool,
}

impl ShmPool {
    /// Create a new shm pool
    pub fn new(fd: OwnedFd, size: usize) -> Self {
        Self {
            id: ShmPoolId::new(),
            fd,
            size,
            map: None,
            buffers: 0,
            destroyed: false,
        }
    }

    /// Grow the pool; pools never shrink
    pub fn resize(&mut self, new_size: usize) -> Result<(), ShmError> {
        if new_size < self.size {
            return Err(ShmError::ShrinkPool);
        }
        if new_size > self.size {
            check_backing(&self.fd, new_size)?;
            self.size = new_size;
            // Re-map happens on next access
            self.map = None;
        }
        Ok(())
    }

    fn data(&mut self) -> Result<&[u8], ShmError> {
        if self.map.is_none() {
            check_backing(&self.fd, self.size)?;
            // SAFETY: the mapping is read-only and only ever copied out of.
            // The file covered the pool when it was mapped; a client
            // truncating it afterwards can still fault the compositor.
            let map = unsafe { MmapOptions::new().len(self.size).map(self.fd.as_raw_fd())? };
            self.map = Some(map);
        }
        Ok(self.map.as_deref().unwrap_or_default())
    }
}

/// Fail when the file behind `fd` is shorter than `size` bytes
fn check_backing(fd: &impl AsFd, size: usize) -> Result<(), ShmError> {
    let stat = rustix::fs::fstat(fd).map_err(std::io::Error::from)?;
    let len = u64::try_from(stat.st_size).unwrap_or(0);
    if size as u64 > len {
        return Err(ShmError::PoolExceedsFile { size, len });
    }
    Ok(())
}

/// A buffer created from an shm pool
#[derive(Debug, Clone)]
pub struct ShmBuffer {
    /// Unique identifier
    pub id: ShmBufferId,
    /// Parent pool
    pub pool_id: ShmPoolId,
    /// Offset into the pool
    pub offset: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Stride (bytes per row)
    pub stride: u32,
    /// Pixel format
    pub format: ShmFormat,
}

impl ShmBuffer {
    /// Get the size of the buffer data in bytes
    pub fn data_size(&self) -> usize {
        self.stride as usize * self.height as usize
    }
}

/// Handler for wl_shm protocol
#[derive(Debug)]
pub struct WlShmHandler {
    pools: HashMap<ShmPoolId, ShmPool>,
    buffers: HashMap<ShmBufferId, ShmBuffer>,
}

impl WlShmHandler {
    /// Create a new shm handler
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    /// Get supported formats
    pub fn formats(&self) -> Vec<ShmFormat> {
        vec![ShmFormat::Argb8888, ShmFormat::Xrgb8888]
    }

    /// Create a new shm pool
    pub fn create_pool(&mut self, fd: OwnedFd, size: i32) -> Result<ShmPoolId, ShmError> {
        if size <= 0 {
            return Err(ShmError::InvalidSize);
        }
        check_backing(&fd, size as usize)?;
        let pool = ShmPool::new(fd, size as usize);
        let id = pool.id;
        self.pools.insert(id, pool);
        debug!("Created shm pool {:?}, size {}", id, size);
        Ok(id)
    }

    /// Resize a pool
    pub fn resize_pool(&mut self, pool_id: ShmPoolId, new_size: i32) -> Result<(), ShmError> {
        let pool = self.pools.get_mut(&pool_id).ok_or(ShmError::InvalidPool)?;
        pool.resize(new_size.max(0) as usize)?;
        debug!("Resized shm pool {:?} to {}", pool_id, new_size);
        Ok(())
    }

    /// Destroy a pool; its memory stays mapped while buffers use it
    pub fn destroy_pool(&mut self, pool_id: ShmPoolId) {
        let Some(pool) = self.pools.get_mut(&pool_id) else {
            return;
        };
        pool.destroyed = true;
        if pool.buffers == 0 {
            self.pools.remove(&pool_id);
        }
        debug!("Destroyed shm pool {:?}", pool_id);
    }

    /// Create a buffer from a pool
    pub fn create_buffer(
        &mut self,
        pool_id: ShmPoolId,
        offset: i32,
        width: i32,
        height: i32,
        stride: i32,
        format: u32,
    ) -> Result<ShmBufferId, ShmError> {
        let pool = self.pools.get_mut(&pool_id).ok_or(ShmError::InvalidPool)?;

        let format = ShmFormat::from_wayland(format);
        if format.pixel_format().is_none() {
            return Err(ShmError::InvalidFormat);
        }

        if offset < 0 || width <= 0 || height <= 0 || stride <= 0 {
            return Err(ShmError::InvalidSize);
        }
        let (offset, width, height, stride) = (offset as u32, width as u32, height as u32, stride as u32);

        let min_stride = width
            .checked_mul(format.bytes_per_pixel())
            .ok_or(ShmError::InvalidStride)?;
        if stride < min_stride {
            return Err(ShmError::InvalidStride);
        }

        let buffer_end = stride
            .checked_mul(height)
            .and_then(|len| len.checked_add(offset))
            .ok_or(ShmError::InvalidSize)?;
        if buffer_end as usize > pool.size {
            return Err(ShmError::BufferTooLarge);
        }

        pool.buffers += 1;
        let buffer = ShmBuffer {
            id: ShmBufferId::new(),
            pool_id,
            offset,
            width,
            height,
            stride,
            format,
        };
        let id = buffer.id;
        self.buffers.insert(id, buffer);

        debug!(
            "Created shm buffer {:?}, {}x{}, format {:?}",
            id, width, height, format
        );

        Ok(id)
    }

    /// Destroy a buffer
    pub fn destroy_buffer(&mut self, buffer_id: ShmBufferId) {
        let Some(buffer) = self.buffers.remove(&buffer_id) else {
            return;
        };
        if let Some(pool) = self.pools.get_mut(&buffer.pool_id) {
            pool.buffers = pool.buffers.saturating_sub(1);
            if pool.destroyed && pool.buffers == 0 {
                self.pools.remove(&buffer.pool_id);
            }
        }
        debug!("Destroyed shm buffer {:?}", buffer_id);
    }

    /// Get a buffer by ID
    pub fn get_buffer(&self, id: ShmBufferId) -> Option<&ShmBuffer> {
        self.buffers.get(&id)
    }

    /// Get a pool by ID
    pub fn get_pool(&self, id: ShmPoolId) -> Option<&ShmPool> {
        self.pools.get(&id)
    }

    /// Copy a buffer's current contents out of the client's pool
    pub fn read_pixels(&mut self, buffer_id: ShmBufferId) -> Result<PixelBuffer, ShmError> {
        let buffer = self.buffers.get(&buffer_id).ok_or(ShmError::InvalidBuffer)?;
        let pool = self.pools.get_mut(&buffer.pool_id).ok_or(ShmError::InvalidPool)?;
        let format = buffer.format.pixel_format().ok_or(ShmError::InvalidFormat)?;

        let start = buffer.offset as usize;
        let end = start + buffer.data_size();
        let data = pool.data()?.get(start..end).ok_or(ShmError::BufferTooLarge)?;

        Ok(PixelBuffer::new(
            buffer.width,
            buffer.height,
            buffer.stride,
            format,
            data.to_vec(),
        ))
    }
}

impl Default for WlShmHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// SHM errors
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("Invalid pool")]
    InvalidPool,
    #[error("Invalid buffer")]
    InvalidBuffer,
    #[error("Buffer too large for pool")]
    BufferTooLarge,
    #[error("Invalid stride")]
    InvalidStride,
    #[error("Invalid size")]
    InvalidSize,
    #[error("Invalid format")]
    InvalidFormat,
    #[error("Pools cannot shrink")]
    ShrinkPool,
    #[error("Pool of {size} bytes exceeds its {len} byte file")]
    PoolExceedsFile { size: usize, len: u64 },
    #[error("Failed to map pool: {0}")]
    Map(#[from] std::io::Error),
}
