// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Compile-time configuration options for the userland library.
//!
//! Options are fields of a `const` object rather than `#[cfg]` blocks so that
//! every code path is type-checked whether or not it is enabled. The compiler
//! folds the constants and removes disabled paths from the binary.

/// Data structure holding compile-time configuration options.
pub(crate) struct Config {
    /// Whether each `allow`, `subscribe` and `command` is traced with its
    /// arguments and result, along with every callback a blocking wait
    /// dispatches.
    pub(crate) trace_syscalls: bool,

    /// Whether owned transfer buffers log their state transitions
    /// (allocated, loaned to the kernel, released by the completion callback).
    pub(crate) debug_loans: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined. This is the only place in the crate where cargo features are
/// consulted.
pub(crate) const CONFIG: Config = Config {
    trace_syscalls: cfg!(feature = "trace_syscalls"),
    debug_loans: cfg!(feature = "debug_loans"),
};
