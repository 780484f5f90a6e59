use crate::error::{PipelineError, Result};

/// A contiguous, 8-byte-aligned byte region backing a ring.
///
/// The region hands out a raw base pointer; all mutation goes through the
/// ring's atomic field accessors, so `&self` access from both sides of the
/// ring is sound.
pub trait Region: Send + Sync {
    fn base(&self) -> *mut u8;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local region for tests and single-process hosts. Backed by
/// `u64` storage so the base is 8-byte aligned; the cells make writes
/// through the shared base pointer legal.
pub struct HeapRegion {
    words: Box<[std::cell::UnsafeCell<u64>]>,
}

// All access goes through the ring's atomic field accessors.
unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    pub fn new(len: usize) -> Self {
        let words = (0..len.div_ceil(8))
            .map(|_| std::cell::UnsafeCell::new(0u64))
            .collect();
        Self { words }
    }
}

impl Region for HeapRegion {
    fn base(&self) -> *mut u8 {
        // UnsafeCell<u64> is repr(transparent) over u64
        self.words.as_ptr() as *mut u8
    }

    fn len(&self) -> usize {
        self.words.len() * 8
    }
}

/// Named POSIX shared-memory region (`shm_open` + `mmap`).
///
/// The creator truncates the object to size and unlinks it on drop; an
/// attaching consumer maps the existing object and leaves the name alone.
#[cfg(unix)]
pub struct SharedMemoryRegion {
    ptr: *mut u8,
    len: usize,
    name: std::ffi::CString,
    owner: bool,
}

#[cfg(unix)]
unsafe impl Send for SharedMemoryRegion {}
#[cfg(unix)]
unsafe impl Sync for SharedMemoryRegion {}

#[cfg(unix)]
impl SharedMemoryRegion {
    fn cname(name: &str) -> Result<std::ffi::CString> {
        let shm_name = if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/{name}")
        };
        std::ffi::CString::new(shm_name)
            .map_err(|_| PipelineError::Config("shm name contains NUL".to_string()))
    }

    fn last_error(op: &str) -> PipelineError {
        PipelineError::RingDetached(format!("{op}: {}", std::io::Error::last_os_error()))
    }

    /// Create (or replace) a named region of the given size.
    pub fn create(name: &str, len: usize) -> Result<Self> {
        let cname = Self::cname(name)?;
        unsafe {
            // Replace any stale object from a crashed session
            libc::shm_unlink(cname.as_ptr());

            let fd = libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            );
            if fd < 0 {
                return Err(Self::last_error("shm_open"));
            }

            if libc::ftruncate(fd, len as libc::off_t) != 0 {
                let err = Self::last_error("ftruncate");
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
                return Err(err);
            }

            let ptr = Self::map(fd, len);
            libc::close(fd);
            let ptr = match ptr {
                Ok(p) => p,
                Err(e) => {
                    libc::shm_unlink(cname.as_ptr());
                    return Err(e);
                }
            };

            Ok(Self {
                ptr,
                len,
                name: cname,
                owner: true,
            })
        }
    }

    /// Map an existing named region.
    pub fn open(name: &str) -> Result<Self> {
        let cname = Self::cname(name)?;
        unsafe {
            let fd = libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0);
            if fd < 0 {
                return Err(Self::last_error("shm_open"));
            }

            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) != 0 {
                let err = Self::last_error("fstat");
                libc::close(fd);
                return Err(err);
            }
            let len = stat.st_size as usize;

            let ptr = Self::map(fd, len);
            libc::close(fd);

            Ok(Self {
                ptr: ptr?,
                len,
                name: cname,
                owner: false,
            })
        }
    }

    unsafe fn map(fd: libc::c_int, len: usize) -> Result<*mut u8> {
        if len == 0 {
            return Err(PipelineError::RingDetached("zero-sized region".to_string()));
        }
        let ptr = libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        );
        if ptr == libc::MAP_FAILED {
            return Err(Self::last_error("mmap"));
        }
        Ok(ptr as *mut u8)
    }

    pub fn name(&self) -> &str {
        self.name.to_str().unwrap_or("")
    }
}

#[cfg(unix)]
impl Region for SharedMemoryRegion {
    fn base(&self) -> *mut u8 {
        self.ptr
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(unix)]
impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.len);
            if self.owner {
                libc::shm_unlink(self.name.as_ptr());
            }
        }
    }
}
