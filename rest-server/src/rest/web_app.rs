use actix_web::web::{Data, ServiceConfig};
use actix_web::{App, HttpServer};
use interfaces::{asset_tracker::AssetTracker, world_state::WorldState};
use service::asset_tracker_impl::AssetTrackerImpl;
use std::{io, sync::Arc};
use storage::{world_state_memory::WorldStateMemory, world_state_pg::WorldStatePg};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use util::config::{Settings, WorldStateBackend};

use crate::rest::endpoints::assets::{
    asset_exists, create_asset, get_all_assets, get_asset_history, read_asset, update_asset,
};
use crate::rest::endpoints::health_check::health;

pub async fn start_up_rest_server(cfg: &Settings) -> io::Result<()> {
    info!("Starting server");

    let app_state = AppState::create_app_state(cfg).await;

    HttpServer::new(move || {
        App::new()
            .configure(app_state.make_endpoints())
            .wrap(TracingLogger::default())
    })
    .bind((cfg.rest_server.host, cfg.rest_server.port))?
    .run()
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub asset_tracker: Arc<dyn AssetTracker + Sync + Send>,
}

impl AppState {
    pub async fn create_app_state(cfg: &Settings) -> AppState {
        let world_state: Arc<dyn WorldState + Sync + Send> = match cfg.world_state.backend {
            WorldStateBackend::Memory => {
                warn!("Using in-memory world state, assets will be lost on restart");
                Arc::new(WorldStateMemory::new())
            }
            WorldStateBackend::Postgres => {
                let database = cfg
                    .database_cfg()
                    .unwrap_or_else(|e| panic!("Postgres world state requires database settings: {e}"));
                info!("Connecting world state to {:?}", database);

                let storage = WorldStatePg::new_from_cfg(database, cfg.world_state.scan_page_size)
                    .await
                    .unwrap_or_else(|e| panic!("Failed to init 'WorldStatePg' cause: {e}"));
                Arc::new(storage)
            }
        };

        AppState::from_world_state(world_state)
    }

    pub fn from_world_state(world_state: Arc<dyn WorldState + Sync + Send>) -> AppState {
        AppState { asset_tracker: Arc::new(AssetTrackerImpl::new(world_state)) }
    }

    pub fn make_endpoints(&self) -> impl FnOnce(&mut ServiceConfig) {
        let app_state = self.clone();

        move |serv_cfg: &mut ServiceConfig| {
            serv_cfg
                .app_data(Data::new(app_state))
                .service(health)
                .service(create_asset)
                .service(get_all_assets)
                .service(read_asset)
                .service(update_asset)
                .service(get_asset_history)
                .service(asset_exists);
        }
    }
}
