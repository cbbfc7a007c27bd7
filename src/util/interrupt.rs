//! Process interrupt (Ctrl+C) tracking.
//!
//! Only the coordinating thread looks at this flag. Worker tasks never
//! observe the interrupt directly; they are stopped through the cancel
//! token of the pool that runs them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;

/// The run was interrupted before it could finish.
#[derive(Debug, Error)]
#[error("interrupted")]
pub struct Interrupted;

/// Shared flag set when the user interrupts the process.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create a flag that is never set by a signal.
    pub fn new() -> Self {
        Interrupt::default()
    }

    /// Create a flag set by Ctrl+C.
    pub fn install() -> Result<Self> {
        let interrupt = Interrupt::new();
        let flag = interrupt.flag.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .context("failed to install interrupt handler")?;
        Ok(interrupt)
    }

    /// Mark the run as interrupted.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with [`Interrupted`] if the flag is set.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_triggered() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared_between_clones() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        assert!(interrupt.check().is_ok());

        clone.trigger();
        assert!(interrupt.is_triggered());
        assert!(interrupt.check().is_err());
    }
}
