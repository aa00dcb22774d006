//! Skipped-entry collection for tree walks.
//!
//! Walking user input never aborts on a single unreadable file or directory.
//! Each skip is pushed into a task-local list so the caller can surface a
//! single batch-level notice afterwards.

use std::cell::RefCell;

tokio::task_local! {
    static SKIPPED: RefCell<Vec<String>>;
}

/// Record a skipped entry. Outside of [`collect_warnings`] this is a no-op.
pub fn collect(message: impl Into<String>) {
    let _ = SKIPPED.try_with(|skipped| {
        skipped.borrow_mut().push(message.into());
    });
}

/// Drive `f` with skip collection enabled and return what was skipped.
pub async fn collect_warnings<F, T>(f: F) -> (T, Vec<String>)
where
    F: Future<Output = T>,
{
    SKIPPED
        .scope(RefCell::new(Vec::new()), async {
            let result = f.await;
            let skipped = SKIPPED.with(|skipped| std::mem::take(&mut *skipped.borrow_mut()));
            (result, skipped)
        })
        .await
}

#[macro_export]
macro_rules! warn_entry {
    ($($arg:tt)*) => {
        $crate::warning::collect(format!($($arg)*))
    };
}
