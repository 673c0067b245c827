pub mod asset_tracker;
pub mod world_state;
