// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Console output and input.
//!
//! The asynchronous write hands a `'static` buffer to the console driver and
//! returns; the driver starts transmitting once the write-done callback is
//! subscribed. The blocking [`Console::putstr`] copies the string first, so
//! the caller's data is free to go as soon as the call returns.

use core::fmt;

use crate::callback::{CallbackTag, SubscribeCb, UpcallId};
use crate::errorcode::ErrorCode;
use crate::loan::{lend_and_wait, LoanLedger, LoanStats, TransferBuffer};
use crate::syscalls::{self, Syscalls};

pub const DRIVER_NUM: usize = 1;

/// Allow numbers.
pub mod allow {
    pub const READ: usize = 0;
    pub const WRITE: usize = 1;
}

/// Subscribe numbers.
pub mod subscribe {
    pub const READ_DONE: usize = 0;
    pub const WRITE_DONE: usize = 1;
}

/// Command numbers.
pub mod command {
    pub const PUTC: usize = 0;
}

const WRITE_DONE_TAG: Option<CallbackTag> =
    CallbackTag::for_upcall(UpcallId::new(DRIVER_NUM, subscribe::WRITE_DONE));

extern "C" fn putstr_cb(_: usize, _: usize, _: usize, appdata: usize) -> CallbackTag {
    match WRITE_DONE_TAG {
        // SAFETY: `appdata` is the transfer buffer `putnstr` is blocked on.
        Some(tag) => unsafe { TransferBuffer::complete(appdata, tag) },
        None => CallbackTag::Ignored,
    }
}

pub struct Console<'a, S: Syscalls + ?Sized> {
    syscalls: &'a S,
    loans: LoanLedger,
}

impl<'a, S: Syscalls + ?Sized> Console<'a, S> {
    pub fn new(syscalls: &'a S) -> Console<'a, S> {
        Console {
            syscalls,
            loans: LoanLedger::new(),
        }
    }

    /// Starts writing `buf`; `callback` runs with `appdata` when the driver
    /// is done with it.
    pub fn putnstr_async(
        &self,
        buf: &'static [u8],
        callback: SubscribeCb,
        appdata: usize,
    ) -> Result<(), ErrorCode> {
        syscalls::allow_readonly(self.syscalls, DRIVER_NUM, allow::WRITE, buf)?;
        syscalls::subscribe(self.syscalls, DRIVER_NUM, subscribe::WRITE_DONE, callback, appdata)?;
        Ok(())
    }

    /// Writes `s` and blocks until the driver has transmitted it.
    pub fn putnstr(&self, s: &[u8]) -> Result<(), ErrorCode> {
        let tag = WRITE_DONE_TAG.ok_or(ErrorCode::FAIL)?;
        lend_and_wait(
            self.syscalls,
            s,
            &self.loans,
            tag,
            |ptr, len, appdata| {
                // SAFETY: the copy stays alive and untouched until `putstr_cb`
                // releases it.
                unsafe { syscalls::allow(self.syscalls, DRIVER_NUM, allow::WRITE, ptr, len)? };
                if let Err(err) = syscalls::subscribe(
                    self.syscalls,
                    DRIVER_NUM,
                    subscribe::WRITE_DONE,
                    putstr_cb,
                    appdata,
                ) {
                    // Already failing; `err` is what the caller needs to see.
                    let _ = syscalls::unallow(self.syscalls, DRIVER_NUM, allow::WRITE);
                    return Err(err);
                }
                Ok(())
            },
            || {
                // Both always run: a subscription left behind would point the
                // kernel at a record on this stack frame.
                let unallowed = syscalls::unallow(self.syscalls, DRIVER_NUM, allow::WRITE);
                let unsubscribed =
                    syscalls::unsubscribe(self.syscalls, DRIVER_NUM, subscribe::WRITE_DONE);
                unallowed.and(unsubscribed)
            },
        )
    }

    pub fn putstr(&self, s: &str) -> Result<(), ErrorCode> {
        self.putnstr(s.as_bytes())
    }

    /// Writes one byte immediately, without a buffer or callback.
    pub fn putc(&self, c: u8) -> Result<usize, ErrorCode> {
        syscalls::command(self.syscalls, DRIVER_NUM, command::PUTC, c as usize)
    }

    /// Hands `buf` to the driver for incoming data; `callback` runs when it
    /// has been filled, with the number of bytes read as its first argument.
    pub fn read_async(
        &self,
        buf: &'static mut [u8],
        callback: SubscribeCb,
        appdata: usize,
    ) -> Result<(), ErrorCode> {
        syscalls::allow_readwrite(self.syscalls, DRIVER_NUM, allow::READ, buf)?;
        syscalls::subscribe(self.syscalls, DRIVER_NUM, subscribe::READ_DONE, callback, appdata)?;
        Ok(())
    }

    pub fn loans(&self) -> LoanStats {
        self.loans.stats()
    }
}

impl<S: Syscalls + ?Sized> fmt::Write for Console<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.putstr(s).map_err(|_| fmt::Error)
    }
}
