// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Userland driver library for the Firestorm board.
//!
//! Tock drivers are asynchronous: a process allows buffers to a driver,
//! subscribes a callback, and issues a command; the kernel calls back when
//! the operation is done. This crate wraps those system calls for the console,
//! timer, SPI and nRF51822 serialization drivers, and builds blocking calls
//! on top of them.
//!
//! A blocking call waits on the [`CallbackTag`] of its own operation, so
//! completions of unrelated operations arriving in between run their
//! callbacks without ending the wait. Blocking calls that need a private copy
//! of caller data loan it to the kernel through [`loan`]; the copy is freed by
//! the completion callback, exactly once.
//!
//! The process provides a global allocator for those copies.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod callback;
mod config;
pub mod console;
pub mod errorcode;
pub mod loan;
pub mod nrf51822_serialization;
pub mod spi;
pub mod syscalls;
pub mod timer;
pub mod wait;

#[cfg(test)]
mod emulated;

pub use crate::callback::{CallbackTag, SubscribeCb, UpcallId};
pub use crate::errorcode::ErrorCode;
pub use crate::syscalls::Syscalls;
pub use crate::wait::wait_for;
