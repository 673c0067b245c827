pub mod asset;
pub mod ledger;
