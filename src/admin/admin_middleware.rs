use axum::{extract::Request, middleware::Next, response::Response};

use crate::{
    error::{AppError, Result},
    middleware::CurrentUser,
};

/// Runs after `auth_middleware`, which loads the role from the user store,
/// so a revoked admin loses access on their next request.
pub async fn admin_authorization(
    user: CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(next.run(request).await)
}
