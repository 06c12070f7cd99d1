// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The system call boundary: `allow`, `subscribe`, `command` and `wait`.
//!
//! [`Syscalls`] is the only point of contact with the kernel. Everything
//! above it goes through the typed wrappers in this module, which turn the
//! kernel's negative return values into [`ErrorCode`]s and trace each call
//! when `trace_syscalls` is configured. None of them blocks.

use core::marker::PhantomData;
use core::mem;
use core::ptr;

use log::debug;

use crate::callback::{CallbackTag, SubscribeCb};
use crate::config;
use crate::errorcode::{into_result, ErrorCode};

/// The kernel's system call ABI as seen by a process.
pub trait Syscalls {
    /// Shares `ptr[0..len)` with driver `driver_num` under `allow_num`.
    /// A `len` of zero revokes the previous allow for that slot.
    ///
    /// # Safety
    ///
    /// Until the allow is revoked (or the driver signals it is done with the
    /// buffer) the kernel may read and write the region at any time. The
    /// caller must keep it valid and must not access it, nor allow it to
    /// another driver, for that whole period.
    unsafe fn allow(&self, driver_num: usize, allow_num: usize, ptr: *mut u8, len: usize)
        -> isize;

    /// Registers `callback` with `appdata` for event `subscribe_num` of
    /// driver `driver_num`, replacing any previous registration. `None`
    /// removes the registration.
    fn subscribe(
        &self,
        driver_num: usize,
        subscribe_num: usize,
        callback: Option<SubscribeCb>,
        appdata: usize,
    ) -> isize;

    /// Asks driver `driver_num` to perform `command_num` with `arg1`.
    fn command(&self, driver_num: usize, command_num: usize, arg1: usize) -> isize;

    /// Blocks until the kernel has run one subscribed callback and returns the
    /// tag that callback produced.
    fn yield_wait(&self) -> CallbackTag;
}

fn trace(kind: &str, driver_num: usize, num: usize, arg: usize, rc: isize) {
    if config::CONFIG.trace_syscalls {
        debug!("{}[{:#x}:{}]({:#x}) = {}", kind, driver_num, num, arg, rc);
    }
}

/// Grants `ptr[0..len)` to a driver. Returns the driver's non-negative result.
///
/// # Safety
///
/// See [`Syscalls::allow`].
pub unsafe fn allow<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    allow_num: usize,
    ptr: *mut u8,
    len: usize,
) -> Result<usize, ErrorCode> {
    let rc = syscalls.allow(driver_num, allow_num, ptr, len);
    trace("allow", driver_num, allow_num, len, rc);
    into_result(rc)
}

/// Grants a buffer the kernel may only read. A `'static` immutable buffer
/// stays valid and unaliased-by-writers for as long as the kernel holds it.
pub fn allow_readonly<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    allow_num: usize,
    buf: &'static [u8],
) -> Result<usize, ErrorCode> {
    // SAFETY: the buffer lives forever and the drivers only read through
    // read-only allow slots.
    unsafe { allow(syscalls, driver_num, allow_num, buf.as_ptr() as *mut u8, buf.len()) }
}

/// Grants a buffer the kernel may write. The buffer is handed over for good;
/// the application gets at the data through the driver's callback.
pub fn allow_readwrite<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    allow_num: usize,
    buf: &'static mut [u8],
) -> Result<usize, ErrorCode> {
    // SAFETY: the exclusive `'static` borrow is consumed here, nothing else
    // in the process can reach the buffer anymore.
    unsafe { allow(syscalls, driver_num, allow_num, buf.as_mut_ptr(), buf.len()) }
}

/// Revokes whatever buffer is allowed in `allow_num`.
pub fn unallow<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    allow_num: usize,
) -> Result<(), ErrorCode> {
    // SAFETY: a zero-length allow shares no memory.
    unsafe { allow(syscalls, driver_num, allow_num, ptr::null_mut(), 0) }.map(|_| ())
}

/// Registers `callback` to run with `appdata` for `subscribe_num`, replacing
/// any earlier registration.
pub fn subscribe<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    subscribe_num: usize,
    callback: SubscribeCb,
    appdata: usize,
) -> Result<usize, ErrorCode> {
    let rc = syscalls.subscribe(driver_num, subscribe_num, Some(callback), appdata);
    trace("subscribe", driver_num, subscribe_num, appdata, rc);
    into_result(rc)
}

/// Removes the registration for `subscribe_num`. Upcalls for it that are
/// still queued are dropped by the kernel.
pub fn unsubscribe<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    subscribe_num: usize,
) -> Result<(), ErrorCode> {
    let rc = syscalls.subscribe(driver_num, subscribe_num, None, 0);
    trace("unsubscribe", driver_num, subscribe_num, 0, rc);
    into_result(rc).map(|_| ())
}

/// Asks the driver to perform `command_num` with `arg1`.
pub fn command<S: Syscalls + ?Sized>(
    syscalls: &S,
    driver_num: usize,
    command_num: usize,
    arg1: usize,
) -> Result<usize, ErrorCode> {
    let rc = syscalls.command(driver_num, command_num, arg1);
    trace("command", driver_num, command_num, arg1, rc);
    into_result(rc)
}

/// An outstanding allow of a borrowed buffer.
///
/// The borrow is held for as long as the `Grant` exists and the allow is
/// revoked when it is dropped, so the buffer cannot go out of scope while the
/// kernel still has it.
pub struct Grant<'a, S: Syscalls + ?Sized> {
    syscalls: &'a S,
    driver_num: usize,
    allow_num: usize,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a, S: Syscalls + ?Sized> Grant<'a, S> {
    /// Grants `buf` for the kernel to read.
    ///
    /// # Safety
    ///
    /// The returned `Grant` must be dropped or revoked, never leaked: a leaked
    /// grant outlives the borrow of `buf`.
    pub unsafe fn readonly(
        syscalls: &'a S,
        driver_num: usize,
        allow_num: usize,
        buf: &'a [u8],
    ) -> Result<Grant<'a, S>, ErrorCode> {
        allow(syscalls, driver_num, allow_num, buf.as_ptr() as *mut u8, buf.len())?;
        Ok(Grant {
            syscalls,
            driver_num,
            allow_num,
            _buffer: PhantomData,
        })
    }

    /// Grants `buf` for the kernel to read and write.
    ///
    /// # Safety
    ///
    /// Same as [`Grant::readonly`].
    pub unsafe fn readwrite(
        syscalls: &'a S,
        driver_num: usize,
        allow_num: usize,
        buf: &'a mut [u8],
    ) -> Result<Grant<'a, S>, ErrorCode> {
        allow(syscalls, driver_num, allow_num, buf.as_mut_ptr(), buf.len())?;
        Ok(Grant {
            syscalls,
            driver_num,
            allow_num,
            _buffer: PhantomData,
        })
    }

    /// Revokes the allow and reports whether the kernel accepted that.
    pub fn revoke(self) -> Result<(), ErrorCode> {
        let res = unallow(self.syscalls, self.driver_num, self.allow_num);
        mem::forget(self);
        res
    }
}

impl<S: Syscalls + ?Sized> Drop for Grant<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = unallow(self.syscalls, self.driver_num, self.allow_num) {
            debug!(
                "revoking allow[{:#x}:{}] failed: {:?}",
                self.driver_num, self.allow_num, err
            );
        }
    }
}

#[cfg(target_os = "none")]
mod tock {
    use super::Syscalls;
    use crate::callback::{CallbackTag, SubscribeCb};

    extern "C" {
        fn __allow(driver_num: usize, allownum: usize, ptr: *mut u8, len: usize) -> isize;
        fn __subscribe(driver_num: usize, subnum: usize, cb: usize, appdata: usize) -> isize;
        fn __command(driver_num: usize, cmdnum: usize, arg1: usize) -> isize;
        fn __wait() -> isize;
    }

    /// System calls issued to the Tock kernel through the `svc` entry points
    /// provided by the process runtime.
    pub struct TockSyscalls;

    impl Syscalls for TockSyscalls {
        unsafe fn allow(
            &self,
            driver_num: usize,
            allow_num: usize,
            ptr: *mut u8,
            len: usize,
        ) -> isize {
            __allow(driver_num, allow_num, ptr, len)
        }

        fn subscribe(
            &self,
            driver_num: usize,
            subscribe_num: usize,
            callback: Option<SubscribeCb>,
            appdata: usize,
        ) -> isize {
            let cb = callback.map_or(0, |cb| cb as usize);
            unsafe { __subscribe(driver_num, subscribe_num, cb, appdata) }
        }

        fn command(&self, driver_num: usize, command_num: usize, arg1: usize) -> isize {
            unsafe { __command(driver_num, command_num, arg1) }
        }

        fn yield_wait(&self) -> CallbackTag {
            CallbackTag::from_raw(unsafe { __wait() })
        }
    }
}

#[cfg(target_os = "none")]
pub use tock::TockSyscalls;
