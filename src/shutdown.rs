use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::logger::{self, LogTag};

// ═══════════════════════════════════════════════════════════════════════════════
// SHUTDOWN HANDLING
// ═══════════════════════════════════════════════════════════════════════════════
//
// First Ctrl+C cancels the token: the running withdrawal stops at its next
// suspension point and reports how far it got. A confirmed instruction is never
// rolled back, and one already submitted may still land.
// Second Ctrl+C exits immediately.
// ═══════════════════════════════════════════════════════════════════════════════

/// Install the Ctrl+C handler feeding `cancel`
pub fn install_ctrlc_handler(cancel: CancellationToken) -> Result<(), ctrlc::Error> {
    let already_requested = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler(move || {
        if already_requested.swap(true, Ordering::SeqCst) {
            eprintln!("\n🛑 [SIGNAL] Second Ctrl+C, exiting without waiting");
            logger::flush();
            std::process::exit(130);
        }

        logger::warning(
            LogTag::System,
            "🛑 Received Ctrl+C, cancelling withdrawal (press again to force exit)",
        );
        cancel.cancel();
    })
}
