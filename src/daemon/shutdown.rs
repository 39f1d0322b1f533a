use tokio::select;
use tokio_util::sync::CancellationToken;

/// Waits until the process is asked to stop. Either a signal arrives, in which case the token is
/// cancelled for everybody else, or another module cancels the token first (e.g. the browser
/// closed the message pipe).
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}
