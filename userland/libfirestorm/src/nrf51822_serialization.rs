// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! UART link to an nRF51822 co-processor running the BLE serialization
//! firmware.
//!
//! Purely asynchronous: the serialization library on top of this keeps an RX
//! buffer allowed permanently and is called back for every completed TX and
//! every received packet.

use crate::callback::SubscribeCb;
use crate::errorcode::ErrorCode;
use crate::syscalls::{self, Syscalls};

pub const DRIVER_NUM: usize = 5;

/// Allow numbers.
pub mod allow {
    pub const RX: usize = 0;
    pub const TX: usize = 1;
}

/// Subscribe numbers.
pub mod subscribe {
    /// TX done or RX data available.
    pub const EVENT: usize = 0;
}

/// Command numbers.
pub mod command {
    pub const WRITE: usize = 0;
}

pub struct Nrf51822Serialization<'a, S: Syscalls + ?Sized> {
    syscalls: &'a S,
}

impl<'a, S: Syscalls + ?Sized> Nrf51822Serialization<'a, S> {
    pub fn new(syscalls: &'a S) -> Nrf51822Serialization<'a, S> {
        Nrf51822Serialization { syscalls }
    }

    pub fn subscribe(&self, callback: SubscribeCb, appdata: usize) -> Result<usize, ErrorCode> {
        syscalls::subscribe(self.syscalls, DRIVER_NUM, subscribe::EVENT, callback, appdata)
    }

    /// Passes the buffer the UART fills with incoming bytes.
    pub fn setup_rx_buffer(&self, rx: &'static mut [u8]) -> Result<usize, ErrorCode> {
        syscalls::allow_readwrite(self.syscalls, DRIVER_NUM, allow::RX, rx)
    }

    /// Sends all of `tx`.
    pub fn write(&self, tx: &'static [u8]) -> Result<usize, ErrorCode> {
        syscalls::allow_readonly(self.syscalls, DRIVER_NUM, allow::TX, tx)?;
        syscalls::command(self.syscalls, DRIVER_NUM, command::WRITE, 0)
    }
}
