//! Main query entry point

use async_graphql::Object;
use derivative::Derivative;

mod session;

#[derive(Debug, Derivative)]
#[derivative(Default = "new")]
pub struct Query {
    /// Session related queries
    session: session::SessionQueries,
}

#[Object]
impl Query {
    async fn session(&self) -> &session::SessionQueries {
        &self.session
    }
}
