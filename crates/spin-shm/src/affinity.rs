use std::io;

use crate::error::SetupError;

/// Bind the calling thread to `cpu`.
///
/// Spinning only pays off when the poller has a core to itself, so the
/// binaries call this before entering their loops.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> Result<(), SetupError> {
    if cpu >= libc::CPU_SETSIZE as usize {
        return Err(SetupError::Affinity {
            cpu,
            source: io::Error::new(io::ErrorKind::InvalidInput, "CPU index out of range"),
        });
    }

    // SAFETY: `set` is a plain bitmask on our stack; pid 0 is this thread.
    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };
    if rc != 0 {
        return Err(SetupError::Affinity {
            cpu,
            source: io::Error::last_os_error(),
        });
    }

    tracing::debug!(cpu, "pinned current thread");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(cpu: usize) -> Result<(), SetupError> {
    Err(SetupError::Affinity {
        cpu,
        source: io::Error::new(
            io::ErrorKind::Unsupported,
            "thread pinning is only implemented on Linux",
        ),
    })
}

/// Pin like [`pin_current_thread`], but run unpinned where the platform has
/// no thread affinity. Returns whether the thread was pinned.
pub fn try_pin_current_thread(cpu: usize) -> Result<bool, SetupError> {
    tolerate_unsupported(cpu, pin_current_thread(cpu))
}

fn tolerate_unsupported(cpu: usize, pinned: Result<(), SetupError>) -> Result<bool, SetupError> {
    match pinned {
        Ok(()) => Ok(true),
        Err(error) if error.is_unsupported() => {
            tracing::warn!(cpu, %error, "running unpinned");
            Ok(false)
        }
        Err(error) => Err(error),
    }
}

/// The CPU the calling thread is running on, if the platform reports it.
#[cfg(target_os = "linux")]
pub fn current_cpu() -> Option<usize> {
    // SAFETY: sched_getcpu has no preconditions.
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> Option<usize> {
    None
}
