//! Utilities for services building

use actix_web::web::{Data, ServiceConfig};
use actix_web::{HttpResponse, Result, delete, get, post, web};
use async_graphql::EmptySubscription;
use async_graphql::http::GraphiQLSource;
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};


use crate::mutation::Mutation;
use crate::portal::Portal;
use crate::query::Query;

/// Root GraphQL schema
pub type Schema = async_graphql::Schema<Query, Mutation, EmptySubscription>;

/// Closes current session
#[delete("/session")]
async fn expire_session(portal: Data<Portal>) -> HttpResponse {
    portal.gateway().logout().await;
    HttpResponse::NoContent().finish()
}

/// ActixWeb GraphQL endpoint
#[post("/api")]
async fn api(schema: web::Data<Schema>, request: GraphQLRequest) -> GraphQLResponse {
    schema.execute(request.into_inner()).await.into()
}

/// ActixWeb GraphQLi endpoint
#[get("/pg")]
async fn graphiql() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(GraphiQLSource::build().endpoint("/api").finish()))
}

/// Returns configuration function for the ActixWeb services
pub async fn configure(
    graphiql_enabled: bool,
    portal: Portal,
) -> color_eyre::Result<impl Fn(&mut web::ServiceConfig) + Clone> {
    let cfg = move |cfg: &mut ServiceConfig| {
        cfg.app_data(Data::new(portal.schema()))
            .app_data(Data::new(portal.clone()))
            .service(api)
            .service(expire_session);

        if graphiql_enabled {
            cfg.service(graphiql);
        }
    };

    Ok(cfg)
}
