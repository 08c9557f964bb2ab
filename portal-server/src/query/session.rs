//! Session queries

use async_graphql::{Context, Object, Result};
use session_core::Role;

use crate::portal::Portal;
use crate::view::{Authorization, SessionView};

#[derive(Debug, Default)]
pub struct SessionQueries;

#[Object]
impl SessionQueries {
    /// Current session snapshot
    async fn current(&self, ctx: &Context<'_>) -> Result<SessionView> {
        let portal: &Portal = ctx.data()?;
        Ok(portal.store().snapshot().into())
    }

    /// Decides if a protected view may render. Empty `allowed_roles` admit any logged in user.
    async fn authorize(
        &self,
        ctx: &Context<'_>,
        allowed_roles: Vec<String>,
    ) -> Result<Authorization> {
        let portal: &Portal = ctx.data()?;
        let allowed: Vec<Role> = allowed_roles.into_iter().map(Role::from).collect();
        Ok(portal.store().authorize(portal.routes(), &allowed).into())
    }

    /// Decides if a public-only view (login, registration, password reset) may render
    async fn authorize_public(&self, ctx: &Context<'_>) -> Result<Authorization> {
        let portal: &Portal = ctx.data()?;
        Ok(portal.store().authorize_public(portal.routes()).into())
    }

    /// Landing route of the current user, or the login route when logged out
    async fn landing(&self, ctx: &Context<'_>) -> Result<String> {
        let portal: &Portal = ctx.data()?;
        let session = portal.store().snapshot();
        let routes = portal.routes();

        let route = if session.is_authenticated() {
            routes.landing(session.role.as_ref())
        } else {
            routes.login.as_str()
        };
        Ok(route.to_owned())
    }
}
