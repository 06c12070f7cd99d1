// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Blocking on the completion of one class of asynchronous operation.
//!
//! A process has a single thread of control. Blocking means handing that
//! thread to the kernel, which runs queued callbacks one at a time. Every
//! callback runs to completion, side effects included, and reports a
//! [`CallbackTag`]; [`wait_for`] keeps yielding until the tag it wants shows
//! up. Callbacks for other operations run normally in the meantime but do
//! not end the wait.
//!
//! There is no timeout and no cancellation. A caller that needs a bound has
//! to wait on an operation that is itself bounded, such as a timer oneshot.
//! Only one wait may be outstanding; callbacks must not block.

use log::debug;

use crate::callback::CallbackTag;
use crate::config;
use crate::syscalls::Syscalls;

/// Suspends the caller until a callback yielding `tag` has run.
pub fn wait_for<S: Syscalls + ?Sized>(syscalls: &S, tag: CallbackTag) {
    loop {
        let fired = syscalls.yield_wait();
        if fired == tag {
            return;
        }
        if config::CONFIG.trace_syscalls {
            debug!("wait_for({:?}): dispatched {:?}, still waiting", tag, fired);
        }
    }
}
