//! # FIFO Configuration
//!
//! Preemption budgets. Defaults match production silicon; tests shrink
//! them through the `with_*` setters.

use magma_core::{Error, Result};

/// Context-switch timeout budget for one preempt call
pub const DEFAULT_CTXSW_TIMEOUT_MS: u32 = 3000;

/// Preempt attempts before giving up
pub const PREEMPT_RETRY_COUNT: u32 = 10;

/// FIFO subsystem configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoConfig {
    /// Total context-switch timeout budget, split across attempts
    pub ctxsw_timeout_ms: u32,
    /// Number of preempt attempts
    pub preempt_retry_count: u32,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            ctxsw_timeout_ms: DEFAULT_CTXSW_TIMEOUT_MS,
            preempt_retry_count: PREEMPT_RETRY_COUNT,
        }
    }
}

impl FifoConfig {
    /// Override the context-switch budget
    pub const fn with_ctxsw_timeout_ms(mut self, ms: u32) -> Self {
        self.ctxsw_timeout_ms = ms;
        self
    }

    /// Override the attempt count
    pub const fn with_preempt_retry_count(mut self, count: u32) -> Self {
        self.preempt_retry_count = count;
        self
    }

    /// Full budget for one preempt call
    #[inline]
    pub const fn preempt_timeout_ms(&self) -> u32 {
        self.ctxsw_timeout_ms
    }

    /// Budget for one attempt
    #[inline]
    pub const fn preempt_retry_timeout_ms(&self) -> u32 {
        if self.preempt_retry_count == 0 {
            return self.ctxsw_timeout_ms;
        }
        self.ctxsw_timeout_ms / self.preempt_retry_count
    }

    /// Reject configurations the coordinator cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.preempt_retry_count == 0 {
            log::error!("fifo: preempt retry count must be non-zero");
            return Err(Error::InvalidParameter);
        }
        // A zero wait timeout means "unbounded" to the interrupt drain
        if self.preempt_retry_timeout_ms() == 0 {
            log::error!(
                "fifo: ctxsw timeout {} ms too small for {} attempts",
                self.ctxsw_timeout_ms,
                self.preempt_retry_count
            );
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }
}
