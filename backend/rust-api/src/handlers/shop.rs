use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};

use super::{current_user, ApiError};
use crate::{
    authz::{authorize, Action},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::shop::{OrderView, PurchaseRequest, PurchaseResponse, ShopItemView},
    services::{parse_object_id, shop_service::ShopService, AppState},
};

pub(crate) async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ShopItemView>>, ApiError> {
    let items = ShopService::new(state.mongo.clone()).list_items().await?;
    Ok(Json(items))
}

pub(crate) async fn buy(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    authorize(claims.role, Action::PurchaseItem)?;
    let student_id = current_user(&claims)?;
    // Malformed ids cannot name an item
    let item_id = parse_object_id(&req.item_id, "item_id")
        .map_err(|_| ApiError::NotFound("Item not found".to_string()))?;

    let response = ShopService::new(state.mongo.clone())
        .purchase(&student_id, &item_id)
        .await?;
    Ok(Json(response))
}

pub(crate) async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let student_id = current_user(&claims)?;
    let orders = ShopService::new(state.mongo.clone())
        .list_orders(&student_id)
        .await?;
    Ok(Json(orders))
}
