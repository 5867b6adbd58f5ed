use tokio::sync::watch;

/// Resolves once `true` has been published on `rx`, or once the sender is gone.
pub(crate) async fn requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
