use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::BufferError;

/// Cooperative cancellation flag shared with the embedding host
///
/// Decoders poll it between units of work (top-level chunks, dex classes)
/// and bail out with [`BufferError::Interrupted`] once it is raised.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Option<Arc<AtomicBool>>);

impl Interrupt {
    /// A flag that is never raised
    #[inline]
    pub const fn none() -> Interrupt {
        Interrupt(None)
    }

    #[inline]
    pub fn new(flag: Arc<AtomicBool>) -> Interrupt {
        Interrupt(Some(flag))
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn check(&self) -> Result<(), BufferError> {
        if self.is_set() {
            return Err(BufferError::Interrupted);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_never_set() {
        assert!(Interrupt::none().check().is_ok());
    }

    #[test]
    fn raised_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let interrupt = Interrupt::new(flag.clone());
        assert!(interrupt.check().is_ok());

        flag.store(true, Ordering::Relaxed);
        assert_eq!(interrupt.check(), Err(BufferError::Interrupted));
    }
}
