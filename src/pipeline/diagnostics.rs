use crate::Error;

/// Once-only warnings owned by the pipeline instance, so a stream of frames
/// hitting the same degraded path logs one line instead of one per frame.
/// Re-armed on every source registration.
#[derive(Debug, Default)]
pub struct Diagnostics {
    swap_warned: bool,
    restore_warned: bool,
    embed_warned: bool,
}

impl Diagnostics {
    /// True when the warning was actually emitted.
    pub fn warn_swap_fallback(&mut self, reason: &Error) -> bool {
        let first = !std::mem::replace(&mut self.swap_warned, true);
        if first {
            tracing::warn!("model swap failed, continuing on the geometric fallback: {reason}");
        }
        first
    }

    /// True when the warning was actually emitted.
    pub fn warn_restore_failure(&mut self, reason: &Error) -> bool {
        let first = !std::mem::replace(&mut self.restore_warned, true);
        if first {
            tracing::warn!("restoration failed, continuing with the unrestored face: {reason}");
        }
        first
    }

    /// True when the warning was actually emitted.
    pub fn warn_embed_failure(&mut self, reason: &Error) -> bool {
        let first = !std::mem::replace(&mut self.embed_warned, true);
        if first {
            tracing::warn!("embedding failed, continuing without identity traces: {reason}");
        }
        first
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
