use stowage_protocol::TransferProgress;
use tracing::info;

use crate::TransferState;

/// Owned progress callback, as stored by long-lived callers.
pub type ProgressCallback = Box<dyn Fn(TransferProgress) + Send + Sync>;

/// Borrowed progress callback, as taken by the streaming functions.
pub type ProgressFn<'a> = &'a (dyn Fn(TransferProgress) + Send + Sync);

/// Logs and forwards every percent tick crossed by `bytes`.
pub(crate) fn report(
    state: &mut TransferState,
    bytes: u64,
    remote_name: &str,
    callback: Option<ProgressFn<'_>>,
) {
    for percent in state.advance(bytes) {
        info!(remote = %remote_name, percent, "upload progress");
        if let Some(cb) = callback {
            cb(TransferProgress {
                remote_name: remote_name.to_string(),
                percent,
                transferred_bytes: state.transferred(),
                total_bytes: state.total(),
            });
        }
    }
}
