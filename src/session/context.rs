//! Task-local "current session" binding.
//!
//! The session handling a given invocation or notification is bound for
//! exactly the lifetime of that call's future, via [`scope`]. The binding is
//! task-local, never process-wide: concurrent tasks each see only their own
//! session, and unbinding is structural rather than best-effort since the
//! scope ends with the future on every exit path.

use crate::session::session::Session;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT_SESSION: Arc<Session>;
}

/// Run `fut` with `session` bound as the current session.
pub async fn scope<F>(session: Arc<Session>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_SESSION.scope(session, fut).await
}

/// The session bound to the executing task, or `None` outside any scope.
///
/// A `None` here is a valid state, not an error: handlers running without a
/// session silently skip session-dependent side effects.
pub fn current() -> Option<Arc<Session>> {
    CURRENT_SESSION.try_with(Arc::clone).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::session::SessionId;

    fn make_session(id: &str) -> Arc<Session> {
        let (session, _rx) = Session::new(SessionId::new(id), SessionConfig::default());
        session
    }

    #[tokio::test]
    async fn test_current_is_none_outside_scope() {
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_scope_binds_and_unbinds() {
        let session = make_session("s1");

        let seen = scope(Arc::clone(&session), async {
            current().map(|s| s.id().clone())
        })
        .await;

        assert_eq!(seen, Some("s1".into()));
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_tasks_see_own_binding() {
        let mut handles = Vec::new();
        for n in 0..16 {
            let session = make_session(&format!("s{}", n));
            handles.push(tokio::spawn(scope(session, async move {
                tokio::task::yield_now().await;
                let bound = current().expect("binding missing inside scope");
                assert_eq!(bound.id().as_str(), format!("s{}", n));
            })));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_nested_scope_restores_outer_binding() {
        let outer = make_session("outer");
        let inner = make_session("inner");

        scope(outer, async {
            assert_eq!(current().unwrap().id().as_str(), "outer");
            scope(inner, async {
                assert_eq!(current().unwrap().id().as_str(), "inner");
            })
            .await;
            assert_eq!(current().unwrap().id().as_str(), "outer");
        })
        .await;
    }
}
