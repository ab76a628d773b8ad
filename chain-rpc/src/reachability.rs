//! Network reachability collaborator
//!
//! An optional notifier that reports whether the node's network is currently
//! reachable. When a "became reachable" signal arrives while the engine is
//! waiting out a backoff delay, the engine cancels the timer and reconnects
//! immediately.

use tokio::sync::mpsc;

/// Reports reachability changes of the underlying network.
///
/// Implementations are platform-specific (netlink, SCNetworkReachability,
/// polling) and shared read-only across engine instances.
pub trait ReachabilityNotifier: Send + Sync + 'static {
    /// Current best-effort reachability.
    ///
    /// The engine consults this once at attach time, so attaching on an
    /// already-reachable network while mid-backoff also reconnects.
    fn is_reachable(&self) -> bool;

    /// Stream of reachability transitions; `true` means "became reachable".
    fn watch(&self) -> mpsc::UnboundedReceiver<bool>;
}
