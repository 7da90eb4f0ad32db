use async_trait::async_trait;

/// Template selector for outgoing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    CreateRequested,
    UpdateRequested,
    DeleteRequested,
    ClaimRequested,
    PromoteRequested,
    RequestApproved,
    RequestDeclined,
}

/// Fire-and-forget notification dispatch. Delivery failures are logged by
/// the implementation and never propagated; governance operations must not
/// fail because a mail could not be sent.
#[async_trait]
pub trait Notifier
where
    Self: Clone + std::fmt::Debug + Send + Sync + 'static,
{
    async fn send(
        &self,
        resource_name: &str,
        recipient: &str,
        kind: NotificationKind,
        detail: Option<&str>,
        login_url: &str,
    );
}

/// Notifier that records the dispatch in the log stream only. Default
/// wiring when no mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        resource_name: &str,
        recipient: &str,
        kind: NotificationKind,
        detail: Option<&str>,
        login_url: &str,
    ) {
        tracing::info!(
            resource_name,
            recipient,
            template = %kind,
            detail,
            login_url,
            "Dispatching notification"
        );
    }
}
