// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Callback tags and the registry of which upcall produces which tag.
//!
//! A callback subscribed through this library reports, by its return value,
//! which class of asynchronous operation it completed. The blocking wait in
//! [`crate::wait`] compares that tag against the one it is waiting for, so
//! two outstanding operations of different classes can never be confused.

use crate::{console, nrf51822_serialization, spi, timer};

/// Signature of a function the kernel invokes as an upcall.
///
/// The first three arguments are driver-defined; the last is the opaque
/// `appdata` passed to `subscribe`.
pub type SubscribeCb = extern "C" fn(usize, usize, usize, usize) -> CallbackTag;

/// Class of asynchronous completion a callback run reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum CallbackTag {
    /// The callback completed nothing a wait could be interested in, e.g. a
    /// duplicate completion for a buffer already released.
    Ignored = 0,
    /// A console write buffer has been transmitted.
    PutStr = 1,
    /// A timer armed for a blocking delay has fired.
    Delay = 2,
    /// An SPI transfer has finished.
    SpiBuf = 3,
    /// The serialization UART finished a transmission or received data.
    Serialization = 4,
}

impl TryFrom<isize> for CallbackTag {
    type Error = ();

    fn try_from(raw: isize) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(CallbackTag::Ignored),
            1 => Ok(CallbackTag::PutStr),
            2 => Ok(CallbackTag::Delay),
            3 => Ok(CallbackTag::SpiBuf),
            4 => Ok(CallbackTag::Serialization),
            _ => Err(()),
        }
    }
}

/// Type to uniquely identify an upcall subscription across all drivers.
///
/// This contains the driver number and the subscribe number within the driver.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct UpcallId {
    pub driver_num: usize,
    pub subscribe_num: usize,
}

impl UpcallId {
    pub const fn new(driver_num: usize, subscribe_num: usize) -> UpcallId {
        UpcallId {
            driver_num,
            subscribe_num,
        }
    }
}

/// Every upcall whose completion a blocking call can wait on, and the tag its
/// callback yields.
pub const REGISTRY: [(UpcallId, CallbackTag); 4] = [
    (
        UpcallId::new(console::DRIVER_NUM, console::subscribe::WRITE_DONE),
        CallbackTag::PutStr,
    ),
    (
        UpcallId::new(timer::DRIVER_NUM, timer::subscribe::FIRED),
        CallbackTag::Delay,
    ),
    (
        UpcallId::new(spi::DRIVER_NUM, spi::subscribe::TRANSFER_DONE),
        CallbackTag::SpiBuf,
    ),
    (
        UpcallId::new(
            nrf51822_serialization::DRIVER_NUM,
            nrf51822_serialization::subscribe::EVENT,
        ),
        CallbackTag::Serialization,
    ),
];

impl CallbackTag {
    /// Tag registered for `upcall`, if any blocking call waits on it.
    pub const fn for_upcall(upcall: UpcallId) -> Option<CallbackTag> {
        let mut i = 0;
        while i < REGISTRY.len() {
            let (id, tag) = REGISTRY[i];
            if id.driver_num == upcall.driver_num && id.subscribe_num == upcall.subscribe_num {
                return Some(tag);
            }
            i += 1;
        }
        None
    }

    /// Decodes the value the raw wait system call returns. Values that are
    /// not a known tag complete nothing.
    pub fn from_raw(raw: isize) -> CallbackTag {
        CallbackTag::try_from(raw).unwrap_or(CallbackTag::Ignored)
    }
}
