//! Linux-specific shared memory and signal objects
//!
//! Named objects are plain files in the shm root (`/dev/shm` on Linux),
//! memory-mapped shared. Signals are a mapped generation word slept on with
//! a process-shared futex.

use super::{NamedSignal, SharedRegion, SignalTicket};
use crate::error::{StreamError, StreamResult};
use common::consts::{OBJECT_MODE, shm_root};
use memmap2::{MmapMut, MmapOptions};
use nix::time::{ClockId, clock_gettime};
use nix::unistd::getpid;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Memory-mapped file in the shm root
pub struct ShmRegion {
    name: String,
    path: PathBuf,
    mmap: MmapMut,
    base: NonNull<u8>,
    owner: bool,
}

// SAFETY: the mapping is process-shared memory; every concurrently mutated
// location in it is accessed through atomics or under the chunk protocol.
unsafe impl Send for ShmRegion {}
// SAFETY: see `Send`.
unsafe impl Sync for ShmRegion {}

impl ShmRegion {
    fn map(name: &str, path: PathBuf, mut mmap: MmapMut, owner: bool) -> StreamResult<Self> {
        let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| StreamError::Io {
            source: std::io::Error::other("mapping returned a null address"),
        })?;
        Ok(Self {
            name: name.to_string(),
            path,
            mmap,
            base,
            owner,
        })
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SharedRegion for ShmRegion {
    fn create(name: &str, size: usize) -> StreamResult<Self> {
        let path = shm_root().join(name);

        let file = OpenOptions::new()
            .create_new(true) // Fail if already exists
            .read(true)
            .write(true)
            .mode(OBJECT_MODE)
            .open(&path)
            .map_err(|e| StreamError::from_io(name, e))?;

        // From here on the file is ours; remove it again if mapping fails.
        let mapped = file
            .set_len(size as u64)
            .and_then(|()| unsafe { MmapOptions::new().len(size).map_mut(&file) });
        let mmap = match mapped {
            Ok(mmap) => mmap,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(StreamError::from_io(name, e));
            }
        };

        Self::map(name, path, mmap, true)
    }

    fn open(name: &str) -> StreamResult<Self> {
        let path = shm_root().join(name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| StreamError::from_io(name, e))?;

        if file.metadata()?.len() == 0 {
            return Err(StreamError::CorruptHeader {
                name: name.to_string(),
                reason: "object is empty".to_string(),
            });
        }

        let mmap = unsafe { MmapOptions::new().map_mut(&file)? };
        Self::map(name, path, mmap, false)
    }

    fn base(&self) -> NonNull<u8> {
        self.base
    }

    fn len(&self) -> usize {
        self.mmap.len()
    }

    fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        // The creator owns the name; existing mappings stay valid.
        if self.owner {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Shared layout of a signal object
#[repr(C, align(64))]
struct SignalWord {
    generation: AtomicU32,
    waiters: AtomicU32,
}

/// Named wake-up signal backed by a mapped futex word
pub struct ShmSignal {
    region: ShmRegion,
}

impl ShmSignal {
    fn word(&self) -> &SignalWord {
        // SAFETY: the region is at least `size_of::<SignalWord>()` bytes
        // (checked at open) and page aligned.
        unsafe { &*self.region.base().as_ptr().cast::<SignalWord>() }
    }
}

impl NamedSignal for ShmSignal {
    fn create(name: &str) -> StreamResult<Self> {
        let region = ShmRegion::create(name, std::mem::size_of::<SignalWord>())?;
        Ok(Self { region })
    }

    fn open(name: &str) -> StreamResult<Self> {
        let region = ShmRegion::open(name)?;
        if region.len() < std::mem::size_of::<SignalWord>() {
            return Err(StreamError::CorruptHeader {
                name: name.to_string(),
                reason: format!("signal object is only {} bytes", region.len()),
            });
        }
        Ok(Self { region })
    }

    fn raise(&self) {
        let word = self.word();
        word.generation.fetch_add(1, Ordering::SeqCst);
        if word.waiters.load(Ordering::SeqCst) > 0 {
            futex_wake_all(&word.generation, self.region.name());
        }
    }

    fn prepare(&self) -> SignalTicket {
        SignalTicket(self.word().generation.load(Ordering::SeqCst))
    }

    fn wait(&self, ticket: SignalTicket, deadline: Option<Instant>) {
        let word = self.word();
        word.waiters.fetch_add(1, Ordering::SeqCst);
        if word.generation.load(Ordering::SeqCst) == ticket.0 {
            let timeout = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            futex_wait(&word.generation, ticket.0, timeout);
        }
        word.waiters.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(target_os = "linux")]
fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<std::time::Duration>) {
    let timespec = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs() as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let timespec_ptr = timespec
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);

    // Shared futex: the word lives in a mapping other processes see.
    // EAGAIN, EINTR and ETIMEDOUT all mean "re-check", so the result is dropped.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT,
            expected,
            timespec_ptr,
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}

#[cfg(target_os = "linux")]
fn futex_wake_all(word: &AtomicU32, name: &str) {
    let woken = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        )
    };
    if woken < 0 {
        tracing::warn!(
            signal = name,
            error = %std::io::Error::last_os_error(),
            "futex wake failed"
        );
    }
}

/// Fallback for non-Linux systems: bounded sleeps instead of a futex
#[cfg(not(target_os = "linux"))]
fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<std::time::Duration>) {
    const NAP: std::time::Duration = std::time::Duration::from_micros(100);
    if word.load(Ordering::SeqCst) == expected {
        std::thread::sleep(timeout.map_or(NAP, |t| t.min(NAP)));
    }
}

#[cfg(not(target_os = "linux"))]
fn futex_wake_all(_word: &AtomicU32, _name: &str) {}

/// Get current process ID
pub fn get_current_pid() -> u32 {
    getpid().as_raw() as u32
}

/// Milliseconds on the monotonic clock
pub fn monotonic_millis() -> u64 {
    clock_gettime(ClockId::CLOCK_MONOTONIC)
        .map(|ts| ts.tv_sec() as u64 * 1_000 + ts.tv_nsec() as u64 / 1_000_000)
        .unwrap_or(0)
}
