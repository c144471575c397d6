use super::{AppState, ticket_params, ticket_response};
use crate::service::Endpoint;
use crate::types::TicketParams;
use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    response::Response,
};

pub async fn get_variants(
    State(state): State<AppState>,
    Path(accession): Path<String>,
    params: Result<Query<TicketParams>, QueryRejection>,
) -> Response {
    ticket_response(
        &state,
        Endpoint::Variants,
        &state.default_namespace,
        &accession,
        ticket_params(params),
    )
    .await
}

pub async fn get_namespaced_variants(
    State(state): State<AppState>,
    Path((namespace, accession)): Path<(String, String)>,
    params: Result<Query<TicketParams>, QueryRejection>,
) -> Response {
    ticket_response(&state, Endpoint::Variants, &namespace, &accession, ticket_params(params)).await
}
