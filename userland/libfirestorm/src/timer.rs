// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Millisecond timer.
//!
//! There is one fired callback per process, so [`Timer::delay_ms`] replaces
//! whatever callback the application had subscribed.

use crate::callback::{CallbackTag, SubscribeCb, UpcallId};
use crate::errorcode::ErrorCode;
use crate::syscalls::{self, Syscalls};
use crate::wait::wait_for;

pub const DRIVER_NUM: usize = 3;

/// Subscribe numbers.
pub mod subscribe {
    pub const FIRED: usize = 0;
}

/// Command numbers.
pub mod command {
    pub const ONESHOT: usize = 0;
    pub const REPEATING: usize = 1;
    pub const STOP: usize = 2;
}

const DELAY_TAG: Option<CallbackTag> =
    CallbackTag::for_upcall(UpcallId::new(DRIVER_NUM, subscribe::FIRED));

extern "C" fn delay_cb(_: usize, _: usize, _: usize, _: usize) -> CallbackTag {
    DELAY_TAG.unwrap_or(CallbackTag::Ignored)
}

pub struct Timer<'a, S: Syscalls + ?Sized> {
    syscalls: &'a S,
}

impl<'a, S: Syscalls + ?Sized> Timer<'a, S> {
    pub fn new(syscalls: &'a S) -> Timer<'a, S> {
        Timer { syscalls }
    }

    /// `callback` receives the current time as its first argument.
    pub fn subscribe(&self, callback: SubscribeCb, appdata: usize) -> Result<usize, ErrorCode> {
        syscalls::subscribe(self.syscalls, DRIVER_NUM, subscribe::FIRED, callback, appdata)
    }

    pub fn oneshot(&self, interval_ms: u32) -> Result<usize, ErrorCode> {
        syscalls::command(self.syscalls, DRIVER_NUM, command::ONESHOT, interval_ms as usize)
    }

    pub fn start_repeating(&self, interval_ms: u32) -> Result<usize, ErrorCode> {
        syscalls::command(self.syscalls, DRIVER_NUM, command::REPEATING, interval_ms as usize)
    }

    pub fn stop(&self) -> Result<usize, ErrorCode> {
        syscalls::command(self.syscalls, DRIVER_NUM, command::STOP, 0)
    }

    /// Blocks for `ms` milliseconds.
    pub fn delay_ms(&self, ms: u32) -> Result<(), ErrorCode> {
        let tag = DELAY_TAG.ok_or(ErrorCode::FAIL)?;
        self.subscribe(delay_cb, 0)?;
        self.oneshot(ms)?;
        wait_for(self.syscalls, tag);
        Ok(())
    }
}
