//! Mutations main entry point

use async_graphql::Object;
use derivative::Derivative;

mod auth;

#[derive(Debug, Derivative)]
#[derivative(Default = "new")]
pub struct Mutation {
    /// Authentication related mutations
    auth: auth::AuthMutations,
}

#[Object]
impl Mutation {
    async fn auth(&self) -> &auth::AuthMutations {
        &self.auth
    }
}
