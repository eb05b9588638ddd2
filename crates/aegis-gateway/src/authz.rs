//! Authorization (§4.11): `allow = has_all(required_roles) AND
//! has_all(required_permissions)`; a missing user fails unless the route
//! is anonymous.

use crate::entities::{RouteDescriptor, UserInfo};
use crate::error::{GatewayError, Result};

pub fn authorize(route: &RouteDescriptor, user: Option<&UserInfo>) -> Result<()> {
    let user = match user {
        Some(user) => user,
        None if route.is_anonymous() => return Ok(()),
        None => return Err(GatewayError::Unauthorized),
    };

    if !user.has_all_roles(&route.required_roles) || !user.has_all_permissions(&route.required_permissions) {
        return Err(GatewayError::Forbidden);
    }
    Ok(())
}
