mod util;

use std::sync::Arc;

use fee_sync::{Gateway, IdentityError, IdentityResolver, SessionContext};
use util::mock::MockNode;

fn resolver(node: &Arc<MockNode>) -> (IdentityResolver, Arc<SessionContext>) {
    let session = Arc::new(SessionContext::new());
    let resolver = IdentityResolver::new(
        node.collaborators().accounts,
        Gateway::default(),
        session.clone(),
    );
    (resolver, session)
}

#[tokio::test]
async fn first_registered_name_wins() {
    let node = MockNode::with_account("Q1", &["alice", "alice-alt"]);
    let (resolver, session) = resolver(&node);
    let mut rx = session.subscribe();

    let identity = resolver.resolve().await.unwrap();
    assert_eq!(identity.address, "Q1");
    assert_eq!(identity.registered_name, "alice");
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().as_ref(), Some(&identity));

    // A second resolution is served from the session.
    assert_eq!(resolver.resolve().await.unwrap(), identity);
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn empty_name_set_is_reported() {
    let node = MockNode::with_account("Q1", &[]);
    let (resolver, session) = resolver(&node);
    let err = resolver.resolve().await.unwrap_err();
    assert_eq!(
        err,
        IdentityError::NoRegisteredName {
            address: "Q1".into()
        }
    );
    // The address is still usable for the signing-status filter.
    assert_eq!(session.address(), Some("Q1"));
    assert!(session.identity().is_none());
}

#[tokio::test]
async fn account_failure_is_reported() {
    let node = MockNode::new();
    let (resolver, session) = resolver(&node);
    let err = resolver.resolve().await.unwrap_err();
    assert!(matches!(err, IdentityError::AccountUnavailable(_)));
    assert!(session.address().is_none());
}
