//! SelectorLease - 1 selector、1 message、1 release
//!
//! # 学習ポイント
//! - RAII（Drop による後始末）
//! - 明示的 release と Drop の二重実行防止

use std::sync::Arc;

use tracing::{trace, warn};

use crate::domain::BoxError;
use crate::ports::{HandlerSelector, SelectorFactory};

/// SelectorLease は 1 message 分の selector を保持する
///
/// [`release`](Self::release) reports the release outcome to the caller.
/// If the lease is dropped first (the dispatch future was cancelled), `Drop`
/// releases instead and logs any failure. Either way a releasable selector
/// is released exactly once.
pub struct SelectorLease {
    selector: Arc<dyn HandlerSelector>,
    released: bool,
}

impl SelectorLease {
    /// Calls the factory once and leases what it returns.
    pub fn acquire(factory: &SelectorFactory) -> Self {
        Self {
            selector: factory(),
            released: false,
        }
    }

    /// この message の handler 解決に使う selector。
    pub fn selector(&self) -> &dyn HandlerSelector {
        &*self.selector
    }

    /// selector を release し、失敗を呼び出し元に返す。
    ///
    /// release を持たない selector では何もしない。
    pub fn release(mut self) -> Result<(), BoxError> {
        self.released = true;
        release_selector(&*self.selector)
    }
}

fn release_selector(selector: &dyn HandlerSelector) -> Result<(), BoxError> {
    match selector.releasable() {
        Some(release) => {
            trace!("releasing handler selector");
            release.release()
        }
        None => Ok(()),
    }
}

impl Drop for SelectorLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(error) = release_selector(&*self.selector) {
            warn!(%error, "releasing handler selector failed during cancellation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use crate::ports::{Release, SelectedHandler, constant_selector, selector_factory};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        releases: AtomicUsize,
        fail: bool,
    }

    impl HandlerSelector for Counting {
        fn select(&self, _message: &dyn Message) -> Option<SelectedHandler> {
            None
        }

        fn releasable(&self) -> Option<&dyn Release> {
            Some(self)
        }
    }

    impl Release for Counting {
        fn release(&self) -> Result<(), BoxError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("release failed".into());
            }
            Ok(())
        }
    }

    struct Plain;

    impl HandlerSelector for Plain {
        fn select(&self, _message: &dyn Message) -> Option<SelectedHandler> {
            None
        }
    }

    #[test]
    fn explicit_release_happens_once() {
        let selector = Arc::new(Counting::default());
        let lease = SelectorLease::acquire(&constant_selector(selector.clone()));

        lease.release().unwrap();
        assert_eq!(selector.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases_an_unreleased_lease() {
        let selector = Arc::new(Counting::default());
        drop(SelectorLease::acquire(&constant_selector(selector.clone())));

        assert_eq!(selector.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_failure_is_returned_to_the_caller() {
        let selector = Arc::new(Counting {
            fail: true,
            ..Counting::default()
        });
        let lease = SelectorLease::acquire(&constant_selector(selector.clone()));

        let err = lease.release().unwrap_err();
        assert_eq!(err.to_string(), "release failed");
        assert_eq!(selector.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn selectors_without_release_are_left_alone() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = selector_factory({
            let calls = Arc::clone(&calls);
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Arc::new(Plain) as Arc<dyn HandlerSelector>
            }
        });

        SelectorLease::acquire(&factory).release().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
