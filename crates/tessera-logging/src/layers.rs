//! Tracing layers for Tessera
//!
//! [`AccountContextLayer`] attaches the active account context to spans;
//! [`jsonl_layer`] builds the JSON lines formatter used for console and
//! file output.

use tracing::{Subscriber, span};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{
    Layer,
    layer::Context,
    registry::{LookupSpan, SpanRef},
};

use crate::config::JsonFormat;
use crate::context::{AccountContextData, AccountContextGuard};

/// Layer that stores the active [`AccountContextGuard`] data on new spans.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccountContextLayer;

impl AccountContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct AccountContextExtension {
    pub data: AccountContextData,
}

impl<S> Layer<S> for AccountContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        // Explicit context wins; otherwise inherit the parent's
        let data = AccountContextGuard::current().or_else(|| {
            span.parent()
                .and_then(|parent| account_of(&parent))
        });
        if let Some(data) = data {
            span.extensions_mut().insert(AccountContextExtension { data });
        }
    }
}

/// Account context recorded on `span`, if any.
pub fn account_of<'a, R>(span: &SpanRef<'a, R>) -> Option<AccountContextData>
where
    R: LookupSpan<'a>,
{
    span.extensions()
        .get::<AccountContextExtension>()
        .map(|ext| ext.data.clone())
}

/// JSON lines formatting layer over `writer`.
pub fn jsonl_layer<S, W>(writer: W, format: &JsonFormat) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(format.current_span)
        .with_span_list(format.span_list)
        .flatten_event(format.flatten)
        .with_file(format.source_location)
        .with_line_number(format.source_location)
        .with_thread_ids(format.thread_info)
        .with_thread_names(format.thread_info)
        .with_ansi(false)
        .with_writer(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::AccountId;
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    fn recorded_account(id: &span::Id) -> Option<AccountId> {
        tracing::dispatcher::get_default(|dispatch| {
            let registry = dispatch.downcast_ref::<Registry>()?;
            let span = registry.span(id)?;
            account_of(&span).map(|data| data.account)
        })
    }

    #[test]
    fn test_span_carries_account_context() {
        let subscriber = Registry::default().with(AccountContextLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            let alice = AccountId::from_label("alice");
            let _guard = AccountContextGuard::new(alice);

            let span = tracing::info_span!("register_file");
            let id = span.id().unwrap();
            assert_eq!(recorded_account(&id), Some(alice));
        });
    }

    #[test]
    fn test_child_span_inherits_account() {
        let subscriber = Registry::default().with(AccountContextLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            let alice = AccountId::from_label("alice");
            let parent = {
                let _guard = AccountContextGuard::new(alice);
                tracing::info_span!("session")
            };
            let child = parent.in_scope(|| tracing::info_span!("confirm"));

            assert_eq!(recorded_account(&child.id().unwrap()), Some(alice));
        });
    }

    #[test]
    fn test_span_without_context() {
        let subscriber = Registry::default().with(AccountContextLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("list_artifacts");
            assert_eq!(recorded_account(&span.id().unwrap()), None);
        });
    }
}
