// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! SPI master transfers.
//!
//! A transfer is composed of up to four system calls: allow the read buffer,
//! allow the write buffer, subscribe to completion, and the transfer command.
//! The first one that fails ends the composition and its error is returned;
//! later steps are never issued.
//!
//! The blocking variants borrow the caller's buffers, wait for the transfer
//! to complete and revoke both allows before returning, so the borrows can
//! end safely.

use crate::callback::{CallbackTag, SubscribeCb, UpcallId};
use crate::errorcode::ErrorCode;
use crate::syscalls::{self, Grant, Syscalls};
use crate::wait::wait_for;

pub const DRIVER_NUM: usize = 4;

/// Allow numbers.
pub mod allow {
    pub const READ: usize = 0;
    pub const WRITE: usize = 1;
}

/// Subscribe numbers.
pub mod subscribe {
    pub const TRANSFER_DONE: usize = 0;
}

/// Command numbers.
pub mod command {
    pub const WRITE_BYTE: usize = 0;
    /// Transfers `arg1` bytes from the write buffer, filling the read buffer
    /// if one is allowed.
    pub const TRANSFER: usize = 1;
}

const TRANSFER_TAG: Option<CallbackTag> =
    CallbackTag::for_upcall(UpcallId::new(DRIVER_NUM, subscribe::TRANSFER_DONE));

extern "C" fn spi_cb(_: usize, _: usize, _: usize, _: usize) -> CallbackTag {
    TRANSFER_TAG.unwrap_or(CallbackTag::Ignored)
}

pub struct Spi<'a, S: Syscalls + ?Sized> {
    syscalls: &'a S,
}

impl<'a, S: Syscalls + ?Sized> Spi<'a, S> {
    pub fn new(syscalls: &'a S) -> Spi<'a, S> {
        Spi { syscalls }
    }

    pub fn write_byte(&self, byte: u8) -> Result<usize, ErrorCode> {
        syscalls::command(self.syscalls, DRIVER_NUM, command::WRITE_BYTE, byte as usize)
    }

    /// Gives the driver a buffer to fill during the following transfers.
    pub fn read_buf(&self, buf: &'static mut [u8]) -> Result<usize, ErrorCode> {
        syscalls::allow_readwrite(self.syscalls, DRIVER_NUM, allow::READ, buf)
    }

    fn start(&self, len: usize, callback: SubscribeCb) -> Result<usize, ErrorCode> {
        syscalls::subscribe(self.syscalls, DRIVER_NUM, subscribe::TRANSFER_DONE, callback, 0)?;
        syscalls::command(self.syscalls, DRIVER_NUM, command::TRANSFER, len)
    }

    /// Writes the first `len` bytes of `buf`; `callback` runs when done.
    pub fn write(
        &self,
        buf: &'static [u8],
        len: usize,
        callback: SubscribeCb,
    ) -> Result<usize, ErrorCode> {
        if len > buf.len() {
            return Err(ErrorCode::SIZE);
        }
        syscalls::allow_readonly(self.syscalls, DRIVER_NUM, allow::WRITE, buf)?;
        self.start(len, callback)
    }

    /// Writes `len` bytes of `write` while reading as many into `read`.
    pub fn read_write(
        &self,
        write: &'static [u8],
        read: &'static mut [u8],
        len: usize,
        callback: SubscribeCb,
    ) -> Result<usize, ErrorCode> {
        if len > write.len() || len > read.len() {
            return Err(ErrorCode::SIZE);
        }
        self.read_buf(read)?;
        self.write(write, len, callback)
    }

    /// Writes all of `buf` and blocks until the transfer has completed.
    pub fn block_write(&self, buf: &[u8]) -> Result<usize, ErrorCode> {
        let tag = TRANSFER_TAG.ok_or(ErrorCode::FAIL)?;
        // A zero-length allow is a revoke, and the driver never calls back.
        if buf.is_empty() {
            return Ok(0);
        }
        // SAFETY: the grant is revoked below or dropped on the error path,
        // never leaked.
        let write = unsafe { Grant::readonly(self.syscalls, DRIVER_NUM, allow::WRITE, buf)? };
        let res = self.start(buf.len(), spi_cb)?;
        wait_for(self.syscalls, tag);
        write.revoke()?;
        Ok(res)
    }

    /// Clocks out `write` while filling `read`, blocking until done.
    pub fn block_read_write(&self, write: &[u8], read: &mut [u8]) -> Result<usize, ErrorCode> {
        let tag = TRANSFER_TAG.ok_or(ErrorCode::FAIL)?;
        let len = write.len();
        if len > read.len() {
            return Err(ErrorCode::SIZE);
        }
        if len == 0 {
            return Ok(0);
        }
        // SAFETY: both grants are revoked below or dropped on the error path,
        // never leaked.
        let read = unsafe { Grant::readwrite(self.syscalls, DRIVER_NUM, allow::READ, read)? };
        let write = unsafe { Grant::readonly(self.syscalls, DRIVER_NUM, allow::WRITE, write)? };
        let res = self.start(len, spi_cb)?;
        wait_for(self.syscalls, tag);
        write.revoke()?;
        read.revoke()?;
        Ok(res)
    }
}
