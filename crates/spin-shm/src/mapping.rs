//! Named POSIX shared-memory segment holding the two slots.
//!
//! Layout (one page by default):
//!
//! ```text
//! offset 0     client slot: written by the client, polled by the server
//! offset 2048  server slot: written by the server, polled by the client
//! ```
//!
//! The slots sit on separate cache lines so the two writers never contend.
//! Whoever starts first creates the segment and zeroes both slots; the other
//! side opens it and leaves the values alone.

use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::fd::FromRawFd;
use std::os::unix::io::AsRawFd;
use std::sync::Arc;

use spin_primitives::{SharedSlot, SlotPair, SlotRef};

use crate::error::SetupError;

/// Segment name used when none is configured.
pub const DEFAULT_SHM_NAME: &str = "/spinnmem";

/// Byte offset of the client-written slot.
pub const CLIENT_SLOT_OFFSET: usize = 0;

/// Byte offset of the server-written slot.
pub const SERVER_SLOT_OFFSET: usize = 2048;

const SLOT_SIZE: usize = std::mem::size_of::<u64>();

/// Smallest segment that holds both slots.
pub const MIN_SEGMENT_SIZE: usize = SERVER_SLOT_OFFSET + SLOT_SIZE;

const _: () = assert!(CLIENT_SLOT_OFFSET % SLOT_SIZE == 0);
const _: () = assert!(SERVER_SLOT_OFFSET % SLOT_SIZE == 0);
const _: () = assert!(SERVER_SLOT_OFFSET - CLIENT_SLOT_OFFSET >= 128);

/// Segment parameters.
#[derive(Debug, Clone)]
pub struct ShmConfig {
    /// POSIX shared memory name, `/` followed by no further slashes.
    pub name: String,
    /// Create the segment (and zero the slots) instead of opening it.
    pub create: bool,
    /// Segment size in bytes. `None` means one page.
    pub size: Option<usize>,
}

impl Default for ShmConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SHM_NAME.to_string(),
            create: false,
            size: None,
        }
    }
}

/// System page size.
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

fn shm_name(name: &str) -> Result<CString, SetupError> {
    let valid = name.len() > 1
        && name.len() <= 255
        && name.starts_with('/')
        && !name[1..].contains('/');
    if !valid {
        return Err(SetupError::InvalidName(name.to_string()));
    }
    CString::new(name).map_err(|_| SetupError::InvalidName(name.to_string()))
}

/// An mmapped segment.
struct Mapping {
    /// Base address of the mapping.
    base: *mut u8,
    /// Length of the mapping.
    len: usize,
    /// The shm descriptor (kept open).
    _file: File,
}

// SAFETY: the mapping is only accessed through atomic slot operations.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Drop for Mapping {
    fn drop(&mut self) {
        // SAFETY: base and len were returned by / passed to a successful mmap.
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.len);
        }
    }
}

/// The client and server slots in a named shared-memory segment.
///
/// As a [`SlotPair`] it is the server's view: it reads the client slot and
/// writes the server slot. Clients use [`client_slot`](Self::client_slot) and
/// [`server_slot`](Self::server_slot) directly.
#[derive(Clone)]
pub struct MappedSlots {
    mapping: Arc<Mapping>,
    name: String,
}

impl MappedSlots {
    /// Create (or reuse) the named segment, size it and zero both slots.
    pub fn create(name: &str) -> Result<Self, SetupError> {
        Self::with_config(&ShmConfig {
            name: name.to_string(),
            create: true,
            size: None,
        })
    }

    /// Open an existing segment without touching the slot values.
    pub fn open(name: &str) -> Result<Self, SetupError> {
        Self::with_config(&ShmConfig {
            name: name.to_string(),
            create: false,
            size: None,
        })
    }

    pub fn with_config(config: &ShmConfig) -> Result<Self, SetupError> {
        let c_name = shm_name(&config.name)?;
        let required = config.size.unwrap_or_else(page_size);
        if required < MIN_SEGMENT_SIZE {
            return Err(SetupError::TooSmall {
                size: required,
                required: MIN_SEGMENT_SIZE,
            });
        }

        let flags = if config.create {
            libc::O_CREAT | libc::O_RDWR
        } else {
            libc::O_RDWR
        };
        let mode = libc::S_IRUSR | libc::S_IWUSR | libc::S_IRGRP | libc::S_IWGRP;
        // SAFETY: c_name is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, mode as libc::c_uint) };
        if fd < 0 {
            return Err(SetupError::ShmOpen {
                name: config.name.clone(),
                source: io::Error::last_os_error(),
            });
        }
        // SAFETY: shm_open just returned this descriptor and nothing else owns it.
        let file = unsafe { File::from_raw_fd(fd) };

        let len = if config.create {
            file.set_len(required as u64)
                .map_err(SetupError::Truncate)?;
            required
        } else {
            let size = file.metadata().map_err(SetupError::Truncate)?.len() as usize;
            if size < MIN_SEGMENT_SIZE {
                return Err(SetupError::TooSmall {
                    size,
                    required: MIN_SEGMENT_SIZE,
                });
            }
            size
        };

        // SAFETY: mapping a descriptor we own, with a length it has been sized to.
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(SetupError::Map(io::Error::last_os_error()));
        }

        let slots = Self {
            mapping: Arc::new(Mapping {
                base: base as *mut u8,
                len,
                _file: file,
            }),
            name: config.name.clone(),
        };

        // Opening must not clobber values a running peer already wrote.
        if config.create {
            slots.client_slot().store(0);
            slots.server_slot().store(0);
        }

        tracing::debug!(
            name = %config.name,
            create = config.create,
            len,
            "mapped shared memory"
        );
        Ok(slots)
    }

    /// Slot written by the client.
    pub fn client_slot(&self) -> MappedSlot {
        MappedSlot {
            mapping: self.mapping.clone(),
            offset: CLIENT_SLOT_OFFSET,
        }
    }

    /// Slot written by the server.
    pub fn server_slot(&self) -> MappedSlot {
        MappedSlot {
            mapping: self.mapping.clone(),
            offset: SERVER_SLOT_OFFSET,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the mapping in bytes.
    pub fn size(&self) -> usize {
        self.mapping.len
    }

    /// Remove the segment name. Existing mappings stay valid until dropped.
    pub fn unlink(&self) -> Result<(), SetupError> {
        let c_name = shm_name(&self.name)?;
        // SAFETY: c_name is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(c_name.as_ptr()) } != 0 {
            return Err(SetupError::Unlink {
                name: self.name.clone(),
                source: io::Error::last_os_error(),
            });
        }
        tracing::debug!(name = %self.name, "unlinked shared memory");
        Ok(())
    }
}

impl SlotPair for MappedSlots {
    type Slot = MappedSlot;

    fn read_slot(&self) -> MappedSlot {
        self.client_slot()
    }

    fn write_slot(&self) -> MappedSlot {
        self.server_slot()
    }
}

impl std::fmt::Debug for MappedSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedSlots")
            .field("name", &self.name)
            .field("len", &self.mapping.len)
            .finish()
    }
}

/// One slot inside a [`MappedSlots`] segment. Keeps the mapping alive.
#[derive(Clone)]
pub struct MappedSlot {
    mapping: Arc<Mapping>,
    offset: usize,
}

impl MappedSlot {
    #[inline(always)]
    fn slot(&self) -> SlotRef<'_> {
        // SAFETY: offset is 8-byte aligned and inside the page-aligned mapping,
        // which lives as long as `self`. Both sides only touch it atomically.
        unsafe { SlotRef::from_raw(self.mapping.base.add(self.offset) as *mut u64) }
    }
}

impl SharedSlot for MappedSlot {
    #[inline(always)]
    fn load(&self) -> u64 {
        self.slot().load()
    }

    #[inline(always)]
    fn store(&self, value: u64) {
        self.slot().store(value)
    }
}

impl std::fmt::Debug for MappedSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedSlot")
            .field("offset", &self.offset)
            .field("value", &self.load())
            .finish()
    }
}
