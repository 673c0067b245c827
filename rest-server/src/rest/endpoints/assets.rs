use actix_web::{
    get,
    http::{header::ContentType, StatusCode},
    post, put, web, HttpResponse, Responder,
};
use interfaces::asset_tracker::AssetTrackerError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{Debug, Formatter};

use crate::rest::web_app::AppState;

/// Request object for opening an account
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    #[serde(rename = "assetID")]
    pub asset_id: String,

    #[serde(rename = "dealerID")]
    pub dealer_id: String,

    pub msisdn: String,

    /// Stored as given, masked in `Debug`
    pub mpin: String,

    pub balance: i64,
    pub status: String,
    pub trans_amount: i64,
    pub trans_type: String,
    pub remarks: String,
}

impl Debug for CreateAssetRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateAssetRequest")
            .field("asset_id", &self.asset_id)
            .field("dealer_id", &self.dealer_id)
            .field("msisdn", &self.msisdn)
            .field("mpin", &"****")
            .field("balance", &self.balance)
            .field("status", &self.status)
            .field("trans_amount", &self.trans_amount)
            .field("trans_type", &self.trans_type)
            .field("remarks", &self.remarks)
            .finish()
    }
}

/// Request object for recording a transaction against an account
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssetRequest {
    pub balance: i64,
    pub status: String,
    pub trans_type: String,
    pub remarks: String,
    pub trans_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetChangedResponse {
    pub message: String,
    #[serde(rename = "assetID")]
    pub asset_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetExistsResponse {
    #[serde(rename = "assetID")]
    pub asset_id: String,
    pub exists: bool,
}

#[post("/assets")]
pub async fn create_asset(req: web::Json<CreateAssetRequest>, state: web::Data<AppState>) -> impl Responder {
    match state
        .asset_tracker
        .create_asset(
            &req.asset_id,
            &req.dealer_id,
            &req.msisdn,
            &req.mpin,
            req.balance,
            &req.status,
            req.trans_amount,
            &req.trans_type,
            &req.remarks,
        )
        .await
    {
        Ok(()) => asset_changed("Asset created successfully", &req.asset_id),
        Err(e) => error_response(e),
    }
}

#[get("/assets/{asset_id}")]
pub async fn read_asset(asset_id: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    match state.asset_tracker.read_asset(&asset_id).await {
        Ok(asset) => HttpResponse::Ok().content_type(ContentType::json()).json(asset),
        Err(e) => error_response(e),
    }
}

#[put("/assets/{asset_id}")]
pub async fn update_asset(
    asset_id: web::Path<String>,
    req: web::Json<UpdateAssetRequest>,
    state: web::Data<AppState>,
) -> impl Responder {
    match state
        .asset_tracker
        .update_asset(
            &asset_id,
            req.balance,
            &req.status,
            &req.trans_type,
            &req.remarks,
            req.trans_amount,
        )
        .await
    {
        Ok(()) => asset_changed("Asset updated successfully", &asset_id),
        Err(e) => error_response(e),
    }
}

#[get("/assets")]
pub async fn get_all_assets(state: web::Data<AppState>) -> impl Responder {
    match state.asset_tracker.get_all_assets().await {
        Ok(assets) => HttpResponse::Ok().content_type(ContentType::json()).json(assets),
        Err(e) => error_response(e),
    }
}

#[get("/assets/{asset_id}/history")]
pub async fn get_asset_history(asset_id: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    match state.asset_tracker.get_asset_history(&asset_id).await {
        Ok(history) => HttpResponse::Ok().content_type(ContentType::json()).json(history),
        Err(e) => error_response(e),
    }
}

#[get("/assets/{asset_id}/exists")]
pub async fn asset_exists(asset_id: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    match state.asset_tracker.asset_exists(&asset_id).await {
        Ok(exists) => {
            let resp = AssetExistsResponse { asset_id: asset_id.into_inner(), exists };
            HttpResponse::Ok().content_type(ContentType::json()).json(resp)
        }
        Err(e) => error_response(e),
    }
}

fn asset_changed(message: &str, asset_id: &str) -> HttpResponse {
    let resp = AssetChangedResponse { message: message.to_string(), asset_id: asset_id.to_string() };
    HttpResponse::Ok().content_type(ContentType::json()).json(resp)
}

fn error_response(e: AssetTrackerError) -> HttpResponse {
    let status = match &e {
        AssetTrackerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        AssetTrackerError::NotFound(_) => StatusCode::NOT_FOUND,
        AssetTrackerError::AlreadyExists(_) | AssetTrackerError::Conflict(_) => StatusCode::CONFLICT,
        AssetTrackerError::Deserialization { .. }
        | AssetTrackerError::Serialization { .. }
        | AssetTrackerError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Asset request failed: {e}");
    } else {
        tracing::debug!("Asset request rejected: {e}");
    }

    let payload = json!({
        "error": e.to_string(),
    });

    HttpResponse::build(status)
        .content_type(ContentType::json())
        .body(payload.to_string())
}
