/// Concurrent runs across distinct positions
///
/// Each request gets its own convergence run; runs share the controller's
/// collaborators but no loop state. Two requests for the same (owner, pool)
/// would race on one position, so such a batch is rejected up front.
use futures::future::join_all;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

use super::controller::ConvergenceController;
use super::types::{DecreaseOutcome, DecreaseRequest};
use crate::errors::ControllerError;
use crate::logger::{self, LogTag};

impl ConvergenceController {
    /// Run every request concurrently; results come back in request order
    pub async fn decrease_many(
        &self,
        requests: &[DecreaseRequest],
        cancel: &CancellationToken,
    ) -> Result<Vec<Result<DecreaseOutcome, ControllerError>>, ControllerError> {
        let mut seen = HashSet::new();
        for request in requests {
            if !seen.insert((&request.owner, request.pool)) {
                return Err(ControllerError::InvalidRequest(format!(
                    "duplicate request for {} pool {}",
                    request.owner, request.pool
                )));
            }
        }

        logger::info(
            LogTag::Controller,
            &format!("🚀 Running {} withdrawals concurrently", requests.len()),
        );

        let results = join_all(requests.iter().map(|request| self.run(request, cancel))).await;

        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            logger::warning(
                LogTag::Controller,
                &format!("⚠️ {}/{} withdrawals failed", failed, results.len()),
            );
        }
        Ok(results)
    }
}
