// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Standard error enum for system call results.

/// Standard errors in Tock.
///
/// The discriminants are the negative values the kernel places in the return
/// register, so for codes in this table `isize::from(err)` is exactly the code
/// the kernel returned. The mapping is lossy outside the table: any other
/// negative value decodes to `FAIL`, and `isize::from` then yields -1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(isize)]
pub enum ErrorCode {
    /// Generic failure condition
    FAIL = -1,
    /// Underlying system is busy; retry
    BUSY = -2,
    /// The state requested is already set
    ALREADY = -3,
    /// The component is powered down
    OFF = -4,
    /// Reservation required before use
    RESERVE = -5,
    /// An invalid parameter was passed
    INVAL = -6,
    /// Parameter passed was too large
    SIZE = -7,
    /// Operation canceled by a call
    CANCEL = -8,
    /// Memory required not available
    NOMEM = -9,
    /// Operation or command is unsupported
    NOSUPPORT = -10,
    /// Device does not exist
    NODEVICE = -11,
    /// Device is not physically installed
    UNINSTALLED = -12,
    /// Packet transmission not acknowledged
    NOACK = -13,
}

impl ErrorCode {
    /// Decodes a negative kernel return value. Values outside the table are
    /// reported as `FAIL`.
    pub fn from_raw(rc: isize) -> ErrorCode {
        match rc {
            -2 => ErrorCode::BUSY,
            -3 => ErrorCode::ALREADY,
            -4 => ErrorCode::OFF,
            -5 => ErrorCode::RESERVE,
            -6 => ErrorCode::INVAL,
            -7 => ErrorCode::SIZE,
            -8 => ErrorCode::CANCEL,
            -9 => ErrorCode::NOMEM,
            -10 => ErrorCode::NOSUPPORT,
            -11 => ErrorCode::NODEVICE,
            -12 => ErrorCode::UNINSTALLED,
            -13 => ErrorCode::NOACK,
            _ => ErrorCode::FAIL,
        }
    }
}

impl From<ErrorCode> for isize {
    fn from(err: ErrorCode) -> isize {
        err as isize
    }
}

/// Splits a raw system call return value into its success payload or error.
pub fn into_result(rc: isize) -> Result<usize, ErrorCode> {
    if rc < 0 {
        Err(ErrorCode::from_raw(rc))
    } else {
        Ok(rc as usize)
    }
}
