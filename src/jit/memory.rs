//! Executable memory management using mmap.
//!
//! Pages are mapped read-write, filled with code, then flipped to
//! read-execute. A mapping is never writable and executable at once.

use std::ptr::NonNull;

/// Error type for memory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    AllocationFailed,
    ProtectionFailed,
    InvalidSize,
    /// The host has no mmap/mprotect.
    Unsupported,
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::AllocationFailed => write!(f, "memory allocation failed"),
            MemoryError::ProtectionFailed => write!(f, "memory protection change failed"),
            MemoryError::InvalidSize => write!(f, "invalid memory size"),
            MemoryError::Unsupported => write!(f, "executable memory is not supported on this host"),
        }
    }
}

impl std::error::Error for MemoryError {}

/// A block of page-aligned memory allocated via mmap.
///
/// The memory starts out writable. `make_executable()` makes it executable
/// and read-only; from then on `write` is rejected.
pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    size: usize,
    executable: bool,
}

impl ExecutableMemory {
    /// Allocate a block of at least `size` bytes, rounded up to whole pages.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size == 0 {
            return Err(MemoryError::InvalidSize);
        }

        let page_size = Self::page_size();
        let aligned_size = (size + page_size - 1) & !(page_size - 1);

        let ptr = Self::mmap_alloc(aligned_size)?;

        Ok(Self {
            ptr,
            size: aligned_size,
            executable: false,
        })
    }

    #[cfg(unix)]
    fn page_size() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size <= 0 { 4096 } else { size as usize }
    }

    #[cfg(not(unix))]
    fn page_size() -> usize {
        4096
    }

    #[cfg(unix)]
    fn mmap_alloc(size: usize) -> Result<NonNull<u8>, MemoryError> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed);
        }

        NonNull::new(ptr as *mut u8).ok_or(MemoryError::AllocationFailed)
    }

    #[cfg(not(unix))]
    fn mmap_alloc(_size: usize) -> Result<NonNull<u8>, MemoryError> {
        Err(MemoryError::Unsupported)
    }

    /// Get a pointer to the start of the block.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Size of the mapping in bytes (a whole number of pages).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `data` into the block at `offset`.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), MemoryError> {
        if self.executable {
            return Err(MemoryError::ProtectionFailed);
        }

        let end = offset.checked_add(data.len()).ok_or(MemoryError::InvalidSize)?;
        if end > self.size {
            return Err(MemoryError::InvalidSize);
        }

        // SAFETY: bounds checked above; the mapping is writable until made executable.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr().add(offset), data.len());
        }

        Ok(())
    }

    /// Make the memory executable (and read-only).
    #[cfg(unix)]
    pub fn make_executable(&mut self) -> Result<(), MemoryError> {
        if self.executable {
            return Ok(());
        }

        let result = unsafe {
            libc::mprotect(
                self.ptr.as_ptr() as *mut libc::c_void,
                self.size,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };

        if result != 0 {
            return Err(MemoryError::ProtectionFailed);
        }

        self.executable = true;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn make_executable(&mut self) -> Result<(), MemoryError> {
        Err(MemoryError::Unsupported)
    }

    /// Check if the memory is executable.
    pub fn is_executable(&self) -> bool {
        self.executable
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
        }
    }
}

// The mapping is exclusively owned and immutable once executable.
unsafe impl Send for ExecutableMemory {}
unsafe impl Sync for ExecutableMemory {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_rounds_to_page() {
        let mem = ExecutableMemory::new(10).unwrap();
        assert!(mem.size() >= 10);
        assert_eq!(mem.size() % ExecutableMemory::page_size(), 0);
        assert!(!mem.is_executable());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(ExecutableMemory::new(0), Err(MemoryError::InvalidSize)));
    }

    #[test]
    fn test_write_out_of_bounds() {
        let mut mem = ExecutableMemory::new(16).unwrap();
        let size = mem.size();
        assert_eq!(mem.write(size - 1, &[0x90, 0x90]), Err(MemoryError::InvalidSize));
        assert_eq!(mem.write(usize::MAX, &[0x90]), Err(MemoryError::InvalidSize));
    }

    #[test]
    fn test_cannot_write_after_executable() {
        let mut mem = ExecutableMemory::new(4096).unwrap();
        mem.write(0, &[0xC3]).unwrap(); // RET
        mem.make_executable().unwrap();
        assert!(mem.is_executable());
        assert_eq!(mem.write(0, &[0x90]), Err(MemoryError::ProtectionFailed));
    }
}
