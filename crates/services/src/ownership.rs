//! Author-only mutation guard.

use domains::{AppError, Principal, Result, UserId};
use tracing::warn;

/// Permits the operation only when `principal` authored the resource.
///
/// Callers load the resource first, so a missing resource is reported as
/// not-found before ownership is ever considered.
pub fn ensure_owner(principal: &Principal, author: UserId, resource: &str) -> Result<()> {
    if principal.user_id == author {
        return Ok(());
    }
    warn!(
        user = %principal.user_id,
        %author,
        resource,
        "rejected mutation by non-owner"
    );
    Err(AppError::Forbidden(format!(
        "only the author may modify this {resource}"
    )))
}
