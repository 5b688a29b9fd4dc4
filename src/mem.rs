//! Physical memory access.
//!
//! This module maps segments of physical memory through `/dev/mem` so the
//! FPGA register block and the BRAM capture buffers can be accessed from
//! userspace. An anonymous-mapping constructor provides RAM-backed regions
//! of the same shape for running off-target.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::io::AsRawFd;

/// Open handle on `/dev/mem`.
///
/// The handle must outlive the mappings created from it only for clarity of
/// teardown ordering; the kernel keeps mapped regions alive independently.
#[derive(Debug)]
pub struct DevMem {
    file: fs::File,
}

/// A mapped region of physical (or anonymous) memory.
///
/// Dropping the region unmaps it.
#[derive(Debug)]
pub struct Mapping {
    base: *mut libc::c_void,
    map_size: usize,
}

unsafe impl Send for Mapping {}

impl DevMem {
    /// Opens `/dev/mem` for read/write access.
    pub fn open() -> Result<DevMem> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/mem")
            .context("failed to open /dev/mem")?;
        Ok(DevMem { file })
    }

    /// Maps `len` bytes of physical memory starting at `phys_addr` as a
    /// shared read/write region. The length is rounded up to a whole
    /// number of system pages; `phys_addr` must be page aligned.
    pub fn map(&self, phys_addr: usize, len: usize) -> Result<Mapping> {
        let map_size = round_to_pages(len);
        let base = unsafe {
            match libc::mmap(
                std::ptr::null_mut::<libc::c_void>(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.file.as_raw_fd(),
                phys_addr as libc::off_t,
            ) {
                libc::MAP_FAILED => anyhow::bail!(
                    "mmap of {len:#x} bytes at physical address {phys_addr:#x} failed"
                ),
                x => x,
            }
        };
        Ok(Mapping { base, map_size })
    }
}

impl Mapping {
    /// Maps `len` bytes of zeroed anonymous memory. The region has the same
    /// shape as a physical mapping but is plain RAM, which makes the
    /// register facade usable on machines without the FPGA.
    pub fn anonymous(len: usize) -> Result<Mapping> {
        let map_size = round_to_pages(len);
        let base = unsafe {
            match libc::mmap(
                std::ptr::null_mut::<libc::c_void>(),
                map_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            ) {
                libc::MAP_FAILED => anyhow::bail!("anonymous mmap of {len:#x} bytes failed"),
                x => x,
            }
        };
        Ok(Mapping { base, map_size })
    }

    /// Virtual address of the start of the region.
    pub fn addr(&self) -> *mut libc::c_void {
        self.base
    }

    /// Size of the region in bytes, after page rounding.
    pub fn len(&self) -> usize {
        self.map_size
    }

    /// True if the region is empty (it never is; present for completeness).
    pub fn is_empty(&self) -> bool {
        self.map_size == 0
    }

    /// Reads the 32-bit word at `offset` bytes into the region.
    ///
    /// The read is volatile: device registers may change between reads and
    /// reads of some registers have FPGA-visible effects.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not 4-byte aligned or lies outside the region.
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset % 4 == 0 && offset + 4 <= self.map_size);
        unsafe { (self.base as *const u32).add(offset / 4).read_volatile() }
    }

    /// Writes the 32-bit word at `offset` bytes into the region.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is not 4-byte aligned or lies outside the region.
    pub fn write_u32(&self, offset: usize, value: u32) {
        assert!(offset % 4 == 0 && offset + 4 <= self.map_size);
        unsafe {
            (self.base as *mut u32).add(offset / 4).write_volatile(value);
        }
    }
}

fn round_to_pages(len: usize) -> usize {
    let page = page_size::get();
    len.div_ceil(page) * page
}

impl Drop for Mapping {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base, self.map_size);
        }
    }
}
