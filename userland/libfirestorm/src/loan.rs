// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Private copies of caller data loaned to the kernel.
//!
//! Some blocking calls take data the caller may drop as soon as the call
//! returns, but the kernel needs a stable buffer for the whole operation. The
//! call copies the data into a [`TransferBuffer`], grants the copy, and
//! blocks. The copy is freed by the completion callback and by nothing else:
//!
//! ```text
//!   copy_from()         loan()            complete()
//!  ------------> Owned --------> Loaned -------------> Released
//!                  ^               |
//!                  +---------------+
//!                    reclaim() (grant failed)
//! ```
//!
//! A completion for a buffer that is not `Loaned` is a no-op: it is counted as
//! spurious and yields [`CallbackTag::Ignored`], which no wait accepts.

use alloc::boxed::Box;
use core::cell::Cell;
use core::mem;

use log::{debug, warn};
use tock_cells::map_cell::MapCell;

use crate::callback::CallbackTag;
use crate::config;
use crate::errorcode::ErrorCode;
use crate::syscalls::Syscalls;
use crate::wait::wait_for;

/// Who may free a transfer buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoanState {
    /// Held by the process, which may free it at will.
    Owned,
    /// Granted to the kernel; only the completion callback may free it.
    Loaned,
    /// Freed by the completion callback.
    Released,
}

/// Counters a facade keeps for the buffers it loans out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoanStats {
    pub allocations: usize,
    pub releases: usize,
    pub spurious: usize,
}

pub struct LoanLedger {
    allocations: Cell<usize>,
    releases: Cell<usize>,
    spurious: Cell<usize>,
}

impl LoanLedger {
    pub const fn new() -> LoanLedger {
        LoanLedger {
            allocations: Cell::new(0),
            releases: Cell::new(0),
            spurious: Cell::new(0),
        }
    }

    pub fn stats(&self) -> LoanStats {
        LoanStats {
            allocations: self.allocations.get(),
            releases: self.releases.get(),
            spurious: self.spurious.get(),
        }
    }

    fn bump(counter: &Cell<usize>) {
        counter.set(counter.get() + 1);
    }
}

/// A heap copy of caller data together with its loan state.
pub struct TransferBuffer<'a> {
    state: Cell<LoanState>,
    data: MapCell<Box<[u8]>>,
    ledger: &'a LoanLedger,
}

impl<'a> TransferBuffer<'a> {
    /// Allocates a private copy of `src`.
    pub fn copy_from(src: &[u8], ledger: &'a LoanLedger) -> TransferBuffer<'a> {
        let data: Box<[u8]> = Box::from(src);
        LoanLedger::bump(&ledger.allocations);
        if config::CONFIG.debug_loans {
            debug!("transfer buffer: allocated {} bytes", data.len());
        }
        TransferBuffer {
            state: Cell::new(LoanState::Owned),
            data: MapCell::new(data),
            ledger,
        }
    }

    pub fn state(&self) -> LoanState {
        self.state.get()
    }

    /// Value to pass as `appdata` so the completion callback can find this
    /// buffer again.
    pub fn appdata(&self) -> usize {
        self as *const TransferBuffer<'_> as usize
    }

    /// Marks the buffer as loaned and returns the region to grant.
    pub fn loan(&self) -> Result<(*mut u8, usize), ErrorCode> {
        if self.state.get() != LoanState::Owned {
            return Err(ErrorCode::ALREADY);
        }
        let region = self
            .data
            .map(|data| (data.as_mut_ptr(), data.len()))
            .ok_or(ErrorCode::FAIL)?;
        self.transition(LoanState::Loaned);
        Ok(region)
    }

    /// Takes the buffer back after the kernel refused it. The caller must
    /// have revoked any allow it did get through.
    pub fn reclaim(&self) {
        if self.state.get() == LoanState::Loaned {
            self.transition(LoanState::Owned);
        }
    }

    /// Frees the copy. Only a loaned buffer can be released, and only once.
    fn release(&self) -> Result<(), LoanState> {
        match self.state.get() {
            LoanState::Loaned => {
                drop(self.data.take());
                self.transition(LoanState::Released);
                LoanLedger::bump(&self.ledger.releases);
                Ok(())
            }
            state => Err(state),
        }
    }

    /// Body of every completion callback for a loaned buffer: frees the
    /// buffer behind `appdata` and yields `tag`, or yields
    /// [`CallbackTag::Ignored`] if the buffer is not on loan.
    ///
    /// # Safety
    ///
    /// `appdata` must come from [`TransferBuffer::appdata`] of a buffer that
    /// is still alive.
    pub unsafe fn complete(appdata: usize, tag: CallbackTag) -> CallbackTag {
        let buffer = &*(appdata as *const TransferBuffer<'_>);
        match buffer.release() {
            Ok(()) => tag,
            Err(state) => {
                LoanLedger::bump(&buffer.ledger.spurious);
                warn!("spurious {:?} completion for transfer buffer in state {:?}", tag, state);
                CallbackTag::Ignored
            }
        }
    }

    fn transition(&self, next: LoanState) {
        if config::CONFIG.debug_loans {
            debug!("transfer buffer: {:?} -> {:?}", self.state.get(), next);
        }
        self.state.set(next);
    }
}

impl Drop for TransferBuffer<'_> {
    fn drop(&mut self) {
        if self.state.get() == LoanState::Loaned {
            // The kernel may still be using the copy; leaking it is the only
            // safe option left.
            if let Some(data) = self.data.take() {
                warn!("transfer buffer dropped while loaned, leaking {} bytes", data.len());
                mem::forget(data);
            }
        }
    }
}

/// Copies `data`, loans the copy to the kernel and blocks until the completion
/// callback has freed it.
///
/// `grant` receives the region and the `appdata` to subscribe with, and must
/// issue the allow and subscribe whose callback calls
/// [`TransferBuffer::complete`] with `tag`. If it fails, it must leave no
/// allow behind; its error is returned unchanged. `revoke` runs after the
/// completion, while the buffer record is still alive, and should remove the
/// allow and the subscription.
pub fn lend_and_wait<S, G, R>(
    syscalls: &S,
    data: &[u8],
    ledger: &LoanLedger,
    tag: CallbackTag,
    grant: G,
    revoke: R,
) -> Result<(), ErrorCode>
where
    S: Syscalls + ?Sized,
    G: FnOnce(*mut u8, usize, usize) -> Result<(), ErrorCode>,
    R: FnOnce() -> Result<(), ErrorCode>,
{
    // A zero-length allow is a revoke; nothing would ever complete.
    if data.len() == 0 {
        return Ok(());
    }

    let buffer = TransferBuffer::copy_from(data, ledger);
    let (ptr, len) = buffer.loan()?;
    if let Err(err) = grant(ptr, len, buffer.appdata()) {
        buffer.reclaim();
        return Err(err);
    }

    wait_for(syscalls, tag);
    revoke()
}
