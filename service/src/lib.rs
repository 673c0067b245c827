pub mod asset_tracker_impl;
