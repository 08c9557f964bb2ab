//! Authentication mutations

use async_graphql::{Context, Json, Object, Result};
use session_core::gateway::Error as GatewayError;
use session_core::{Credentials, ProfileUpdate, Role, User};
use tracing::{info, instrument};

use crate::portal::Portal;
use crate::view::SessionView;

#[derive(Debug, Default)]
pub struct AuthMutations;

#[Object]
impl AuthMutations {
    /// Logs in. Rejected credentials are not an error - they end up in the returned session's
    /// `error` field.
    #[instrument(skip(self, ctx, password))]
    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
        #[graphql(default)] remember_me: bool,
    ) -> Result<SessionView> {
        let portal: &Portal = ctx.data()?;
        let credentials = Credentials::new(email, password);

        match portal.gateway().login(&credentials, remember_me).await {
            Ok(()) | Err(GatewayError::LoginFailed(_)) => Ok(portal.store().snapshot().into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Ends the current session
    #[instrument(skip(self, ctx))]
    async fn logout(&self, ctx: &Context<'_>) -> Result<SessionView> {
        let portal: &Portal = ctx.data()?;
        portal.gateway().logout().await;
        Ok(portal.store().snapshot().into())
    }

    /// Requests password reset instructions for the account
    #[instrument(skip(self, ctx))]
    async fn request_password_reset(
        &self,
        ctx: &Context<'_>,
        email: String,
        role: String,
    ) -> Result<bool> {
        let portal: &Portal = ctx.data()?;
        portal
            .gateway()
            .request_password_reset(&email, &Role::from(role))
            .await?;
        Ok(true)
    }

    /// Sets a new password with the token received in reset instructions
    #[instrument(skip_all)]
    async fn reset_password(
        &self,
        ctx: &Context<'_>,
        token: String,
        new_password: String,
    ) -> Result<bool> {
        let portal: &Portal = ctx.data()?;
        portal.gateway().reset_password(&token, &new_password).await?;
        Ok(true)
    }

    /// Updates profile fields of the logged in user. Returns the updated user.
    #[instrument(skip(self, ctx))]
    async fn update_profile(
        &self,
        ctx: &Context<'_>,
        fields: Json<ProfileUpdate>,
    ) -> Result<Json<User>> {
        let portal: &Portal = ctx.data()?;
        let user = portal.gateway().update_profile(&fields).await?;
        info!(user = %user.id, "Profile updated");
        Ok(Json(user))
    }
}
