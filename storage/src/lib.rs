pub mod world_state_memory;
pub mod world_state_pg;
