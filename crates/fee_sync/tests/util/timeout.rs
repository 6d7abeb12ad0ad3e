use std::future::Future;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

#[allow(dead_code)]
pub async fn expect_timeout<F, T>(fut: F) -> T
where
    F: Future<Output = T>,
{
    timeout(Duration::from_secs(10), fut)
        .await
        .expect("operation timed out")
}

/// Wait until the watched value satisfies `pred` and return it.
#[allow(dead_code)]
pub async fn wait_for<T: Clone>(rx: &mut watch::Receiver<T>, mut pred: impl FnMut(&T) -> bool) -> T {
    expect_timeout(async {
        loop {
            {
                let value = rx.borrow_and_update();
                if pred(&value) {
                    return value.clone();
                }
            }
            rx.changed().await.expect("watch sender dropped");
        }
    })
    .await
}

/// Yield to other tasks until `ready` holds.
#[allow(dead_code)]
pub async fn until(mut ready: impl FnMut() -> bool) {
    expect_timeout(async {
        while !ready() {
            tokio::task::yield_now().await;
        }
    })
    .await
}
