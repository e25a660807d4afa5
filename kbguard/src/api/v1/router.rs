use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;
use super::middleware::v1_auth_middleware;

pub fn v1_router(state: AppState) -> Router<AppState> {
    let knowledge = Router::new()
        .route(
            "/",
            get(handlers::knowledge::list_knowledge).post(handlers::knowledge::create_knowledge),
        )
        .route(
            "/{knowledgeId}",
            get(handlers::knowledge::get_knowledge).delete(handlers::knowledge::delete_knowledge),
        )
        .route(
            "/{knowledgeId}/items",
            get(handlers::knowledge::list_items)
                .post(handlers::knowledge::add_items)
                .put(handlers::knowledge::update_items),
        )
        .route(
            "/{knowledgeId}/items:remove",
            post(handlers::knowledge::remove_items),
        );

    let retrieval = Router::new().route("/query", post(handlers::retrieval::query));

    let public_routes = Router::new().route("/health", get(handlers::health_check));

    let protected_routes = Router::new()
        .nest("/knowledge", knowledge)
        .nest("/retrieval", retrieval)
        .route_layer(middleware::from_fn_with_state(state, v1_auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
