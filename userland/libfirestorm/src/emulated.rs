// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! A host-side kernel for exercising the library in unit tests.
//!
//! `EmulatedKernel` keeps the per-process state the real kernel keeps (allowed
//! buffers, subscriptions, the queue of pending upcalls) and models the four
//! drivers closely enough to drive the facades:
//!
//! - console: subscribing to write-done while a write buffer is allowed
//!   transmits the buffer and queues the completion; `putc` transmits at once.
//! - timer: oneshot and repeating queue a fired upcall; a repeating timer
//!   queues the next one each time it fires; stop drops the queued ones.
//! - SPI: a transfer clocks out the write buffer, loops it back into the read
//!   buffer if there is one, and queues the completion.
//! - serialization: a write transmits the TX buffer and queues the event.
//!
//! Allowing a region that overlaps a buffer allowed in another slot fails
//! with `BUSY`. Unsubscribing drops the upcalls queued for that event. Every
//! call is logged, and a failure can be scripted for the next matching call.

// This module requires libstd.
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ptr;
use std::slice;

use crate::callback::{CallbackTag, SubscribeCb, UpcallId};
use crate::errorcode::ErrorCode;
use crate::syscalls::Syscalls;
use crate::{console, nrf51822_serialization, spi, timer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    Allow,
    Subscribe,
    Command,
}

/// One system call as the kernel saw it. `arg` is the length for an allow,
/// the appdata for a subscribe and the argument for a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Call {
    pub syscall: Syscall,
    pub driver_num: usize,
    pub num: usize,
    pub arg: usize,
}

impl Call {
    pub fn new(syscall: Syscall, driver_num: usize, num: usize, arg: usize) -> Call {
        Call {
            syscall,
            driver_num,
            num,
            arg,
        }
    }
}

#[derive(Clone, Copy)]
struct Region {
    start: usize,
    len: usize,
}

impl Region {
    fn overlaps(&self, other: &Region) -> bool {
        self.start < other.start + other.len && other.start < self.start + self.len
    }
}

#[derive(Clone, Copy)]
struct Subscription {
    id: UpcallId,
    callback: SubscribeCb,
    appdata: usize,
}

#[derive(Clone, Copy)]
struct Upcall {
    id: UpcallId,
    r0: usize,
    r1: usize,
    r2: usize,
}

pub struct EmulatedKernel {
    grants: RefCell<Vec<((usize, usize), Region)>>,
    subscriptions: RefCell<Vec<Subscription>>,
    upcalls: RefCell<VecDeque<Upcall>>,
    failures: RefCell<Vec<(Syscall, usize, usize, isize)>>,
    calls: RefCell<Vec<Call>>,
    dispatched: RefCell<Vec<(UpcallId, CallbackTag)>>,
    repeating: Cell<Option<usize>>,
    console_output: RefCell<Vec<u8>>,
    spi_output: RefCell<Vec<u8>>,
    serial_output: RefCell<Vec<u8>>,
}

fn valid(syscall: Syscall, driver_num: usize, num: usize) -> Result<(), ErrorCode> {
    let nums: &[usize] = match (driver_num, syscall) {
        (console::DRIVER_NUM, Syscall::Allow) => &[console::allow::READ, console::allow::WRITE],
        (console::DRIVER_NUM, Syscall::Subscribe) => {
            &[console::subscribe::READ_DONE, console::subscribe::WRITE_DONE]
        }
        (console::DRIVER_NUM, Syscall::Command) => &[console::command::PUTC],
        (timer::DRIVER_NUM, Syscall::Allow) => &[],
        (timer::DRIVER_NUM, Syscall::Subscribe) => &[timer::subscribe::FIRED],
        (timer::DRIVER_NUM, Syscall::Command) => &[
            timer::command::ONESHOT,
            timer::command::REPEATING,
            timer::command::STOP,
        ],
        (spi::DRIVER_NUM, Syscall::Allow) => &[spi::allow::READ, spi::allow::WRITE],
        (spi::DRIVER_NUM, Syscall::Subscribe) => &[spi::subscribe::TRANSFER_DONE],
        (spi::DRIVER_NUM, Syscall::Command) => &[spi::command::WRITE_BYTE, spi::command::TRANSFER],
        (nrf51822_serialization::DRIVER_NUM, Syscall::Allow) => &[
            nrf51822_serialization::allow::RX,
            nrf51822_serialization::allow::TX,
        ],
        (nrf51822_serialization::DRIVER_NUM, Syscall::Subscribe) => {
            &[nrf51822_serialization::subscribe::EVENT]
        }
        (nrf51822_serialization::DRIVER_NUM, Syscall::Command) => {
            &[nrf51822_serialization::command::WRITE]
        }
        _ => return Err(ErrorCode::NODEVICE),
    };
    if nums.contains(&num) {
        Ok(())
    } else {
        Err(ErrorCode::NOSUPPORT)
    }
}

impl EmulatedKernel {
    pub fn new() -> EmulatedKernel {
        EmulatedKernel {
            grants: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
            upcalls: RefCell::new(VecDeque::new()),
            failures: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            dispatched: RefCell::new(Vec::new()),
            repeating: Cell::new(None),
            console_output: RefCell::new(Vec::new()),
            spi_output: RefCell::new(Vec::new()),
            serial_output: RefCell::new(Vec::new()),
        }
    }

    /// Makes the next matching call fail with `rc` without side effects.
    pub fn fail_next(&self, syscall: Syscall, driver_num: usize, num: usize, rc: isize) {
        self.failures.borrow_mut().push((syscall, driver_num, num, rc));
    }

    /// Queues an upcall as a driver would.
    pub fn schedule(
        &self,
        driver_num: usize,
        subscribe_num: usize,
        r0: usize,
        r1: usize,
        r2: usize,
    ) {
        self.upcalls.borrow_mut().push_back(Upcall {
            id: UpcallId::new(driver_num, subscribe_num),
            r0,
            r1,
            r2,
        });
    }

    pub fn pending(&self) -> usize {
        self.upcalls.borrow().len()
    }

    /// Every upcall run so far, with the tag its callback returned.
    pub fn dispatched(&self) -> Vec<(UpcallId, CallbackTag)> {
        self.dispatched.borrow().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, syscall: Syscall) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.syscall == syscall)
            .count()
    }

    /// Length of the buffer currently allowed in a slot.
    pub fn granted(&self, driver_num: usize, allow_num: usize) -> Option<usize> {
        self.region(driver_num, allow_num).map(|region| region.len)
    }

    pub fn subscribed(&self, driver_num: usize, subscribe_num: usize) -> bool {
        let id = UpcallId::new(driver_num, subscribe_num);
        self.subscriptions.borrow().iter().any(|sub| sub.id == id)
    }

    pub fn console_output(&self) -> Vec<u8> {
        self.console_output.borrow().clone()
    }

    pub fn spi_transmitted(&self) -> Vec<u8> {
        self.spi_output.borrow().clone()
    }

    pub fn serial_transmitted(&self) -> Vec<u8> {
        self.serial_output.borrow().clone()
    }

    fn enter(&self, call: Call) -> Result<(), isize> {
        self.calls.borrow_mut().push(call);
        let scripted = {
            let mut failures = self.failures.borrow_mut();
            failures
                .iter()
                .position(|&(syscall, driver_num, num, _)| {
                    syscall == call.syscall && driver_num == call.driver_num && num == call.num
                })
                .map(|i| failures.remove(i).3)
        };
        if let Some(rc) = scripted {
            return Err(rc);
        }
        valid(call.syscall, call.driver_num, call.num).map_err(isize::from)
    }

    fn region(&self, driver_num: usize, allow_num: usize) -> Option<Region> {
        self.grants
            .borrow()
            .iter()
            .find(|(slot, _)| *slot == (driver_num, allow_num))
            .map(|&(_, region)| region)
    }

    /// Copies the allowed buffer out of process memory.
    fn read_region(&self, driver_num: usize, allow_num: usize) -> Option<Vec<u8>> {
        self.region(driver_num, allow_num).map(|region| {
            // SAFETY: the process keeps allowed memory valid until it revokes
            // the allow.
            unsafe { slice::from_raw_parts(region.start as *const u8, region.len).to_vec() }
        })
    }

    fn purge(&self, id: UpcallId) {
        self.upcalls.borrow_mut().retain(|upcall| upcall.id != id);
    }

    fn console_write(&self) {
        if let Some(bytes) = self.read_region(console::DRIVER_NUM, console::allow::WRITE) {
            let len = bytes.len();
            self.console_output.borrow_mut().extend(bytes);
            self.schedule(console::DRIVER_NUM, console::subscribe::WRITE_DONE, len, 0, 0);
        }
    }

    fn spi_transfer(&self, len: usize) -> isize {
        let bytes = match self.read_region(spi::DRIVER_NUM, spi::allow::WRITE) {
            Some(bytes) => bytes,
            None => return ErrorCode::INVAL.into(),
        };
        if len > bytes.len() {
            return ErrorCode::SIZE.into();
        }
        if let Some(read) = self.region(spi::DRIVER_NUM, spi::allow::READ) {
            let n = len.min(read.len);
            // SAFETY: the read buffer is allowed, so the process is not using
            // it, and it cannot overlap the write buffer.
            unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), read.start as *mut u8, n) };
        }
        self.spi_output.borrow_mut().extend_from_slice(&bytes[..len]);
        self.schedule(spi::DRIVER_NUM, spi::subscribe::TRANSFER_DONE, len, 0, 0);
        0
    }

    fn serial_write(&self) -> isize {
        let tx = self.read_region(
            nrf51822_serialization::DRIVER_NUM,
            nrf51822_serialization::allow::TX,
        );
        match tx {
            Some(bytes) => {
                let len = bytes.len();
                self.serial_output.borrow_mut().extend(bytes);
                self.schedule(
                    nrf51822_serialization::DRIVER_NUM,
                    nrf51822_serialization::subscribe::EVENT,
                    len,
                    0,
                    0,
                );
                0
            }
            None => ErrorCode::INVAL.into(),
        }
    }
}

impl Syscalls for EmulatedKernel {
    unsafe fn allow(&self, driver_num: usize, allow_num: usize, ptr: *mut u8, len: usize) -> isize {
        if let Err(rc) = self.enter(Call::new(Syscall::Allow, driver_num, allow_num, len)) {
            return rc;
        }
        let slot = (driver_num, allow_num);
        let mut grants = self.grants.borrow_mut();
        if len == 0 {
            grants.retain(|(s, _)| *s != slot);
            return 0;
        }
        let region = Region {
            start: ptr as usize,
            len,
        };
        if grants
            .iter()
            .any(|(s, other)| *s != slot && other.overlaps(&region))
        {
            return ErrorCode::BUSY.into();
        }
        grants.retain(|(s, _)| *s != slot);
        grants.push((slot, region));
        0
    }

    fn subscribe(
        &self,
        driver_num: usize,
        subscribe_num: usize,
        callback: Option<SubscribeCb>,
        appdata: usize,
    ) -> isize {
        let call = Call::new(Syscall::Subscribe, driver_num, subscribe_num, appdata);
        if let Err(rc) = self.enter(call) {
            return rc;
        }
        let id = UpcallId::new(driver_num, subscribe_num);
        self.subscriptions.borrow_mut().retain(|sub| sub.id != id);
        match callback {
            Some(callback) => {
                self.subscriptions.borrow_mut().push(Subscription {
                    id,
                    callback,
                    appdata,
                });
                if id == UpcallId::new(console::DRIVER_NUM, console::subscribe::WRITE_DONE) {
                    self.console_write();
                }
            }
            None => self.purge(id),
        }
        0
    }

    fn command(&self, driver_num: usize, command_num: usize, arg1: usize) -> isize {
        if let Err(rc) = self.enter(Call::new(Syscall::Command, driver_num, command_num, arg1)) {
            return rc;
        }
        match (driver_num, command_num) {
            (console::DRIVER_NUM, console::command::PUTC) => {
                self.console_output.borrow_mut().push(arg1 as u8);
                0
            }
            (timer::DRIVER_NUM, timer::command::ONESHOT) => {
                self.repeating.set(None);
                self.schedule(timer::DRIVER_NUM, timer::subscribe::FIRED, arg1, 0, 0);
                0
            }
            (timer::DRIVER_NUM, timer::command::REPEATING) => {
                self.repeating.set(Some(arg1));
                self.schedule(timer::DRIVER_NUM, timer::subscribe::FIRED, arg1, 0, 0);
                0
            }
            (timer::DRIVER_NUM, timer::command::STOP) => {
                self.repeating.set(None);
                self.purge(UpcallId::new(timer::DRIVER_NUM, timer::subscribe::FIRED));
                0
            }
            (spi::DRIVER_NUM, spi::command::WRITE_BYTE) => {
                self.spi_output.borrow_mut().push(arg1 as u8);
                0
            }
            (spi::DRIVER_NUM, spi::command::TRANSFER) => self.spi_transfer(arg1),
            (nrf51822_serialization::DRIVER_NUM, nrf51822_serialization::command::WRITE) => {
                self.serial_write()
            }
            _ => ErrorCode::NOSUPPORT.into(),
        }
    }

    fn yield_wait(&self) -> CallbackTag {
        loop {
            let upcall = match self.upcalls.borrow_mut().pop_front() {
                Some(upcall) => upcall,
                None => panic!("yield with no upcall pending: the process would block forever"),
            };
            let subscription = self
                .subscriptions
                .borrow()
                .iter()
                .find(|sub| sub.id == upcall.id)
                .copied();
            // Upcalls for events nobody subscribes to are dropped.
            let subscription = match subscription {
                Some(subscription) => subscription,
                None => continue,
            };

            let timer_fired = UpcallId::new(timer::DRIVER_NUM, timer::subscribe::FIRED);
            if upcall.id == timer_fired {
                if let Some(interval) = self.repeating.get() {
                    self.schedule(timer::DRIVER_NUM, timer::subscribe::FIRED, interval, 0, 0);
                }
            }

            // No borrows are held while the process runs.
            let callback = subscription.callback;
            let tag = callback(upcall.r0, upcall.r1, upcall.r2, subscription.appdata);
            self.dispatched.borrow_mut().push((upcall.id, tag));
            return tag;
        }
    }
}
