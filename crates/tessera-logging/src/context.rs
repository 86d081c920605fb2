//! Account context for log entries
//!
//! A thread-local slot holding the account a scope acts for. The
//! [`AccountContextLayer`](crate::layers::AccountContextLayer) copies it onto
//! every span opened inside the scope.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use tessera_core::AccountId;

/// Account context stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountContextData {
    pub account: AccountId,
    /// Short form used in log lines
    pub account_short: String,
    pub entered_at: DateTime<Utc>,
}

thread_local! {
    static ACCOUNT_CONTEXT: RefCell<Option<AccountContextData>> = const { RefCell::new(None) };
}

/// RAII guard for the account context.
///
/// Sets the account for the current thread and restores the previous one on
/// drop, so guards nest.
///
/// # Example
///
/// ```ignore
/// use tessera_logging::AccountContextGuard;
///
/// let _guard = AccountContextGuard::new(session.account());
/// tracing::info!("Registering file");
/// ```
///
/// The slot is per thread: async code that should carry it must run on a
/// current-thread runtime.
pub struct AccountContextGuard {
    previous: Option<AccountContextData>,
}

impl AccountContextGuard {
    pub fn new(account: AccountId) -> Self {
        let data = AccountContextData {
            account,
            account_short: account.short_id(),
            entered_at: Utc::now(),
        };
        let previous = ACCOUNT_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// The current account context, if any
    pub fn current() -> Option<AccountContextData> {
        ACCOUNT_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_account() -> Option<AccountId> {
        Self::current().map(|ctx| ctx.account)
    }
}

impl Drop for AccountContextGuard {
    fn drop(&mut self) {
        ACCOUNT_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run `$body` with `$account` as the account context.
#[macro_export]
macro_rules! with_account_context {
    ($account:expr, $body:block) => {{
        let _guard = $crate::context::AccountContextGuard::new($account);
        $body
    }};
}
