use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// Represents a financial account stored in the world state.
/// The asset id is the world state key and is not part of the record.
///
/// The serde names are the on-ledger wire format and must not change,
/// previously committed records are decoded with them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Dealer the account belongs to
    #[serde(rename = "DEALERID")]
    pub dealer_id: String,

    /// Subscriber number, opaque
    #[serde(rename = "MSISDN")]
    pub msisdn: String,

    /// Account PIN. Stored in cleartext as part of the record and of every historical version.
    #[serde(rename = "MPIN")]
    pub mpin: String,

    #[serde(rename = "BALANCE")]
    pub balance: i64,

    /// Free-form status label
    #[serde(rename = "STATUS")]
    pub status: String,

    /// Amount of the last applied transaction
    #[serde(rename = "TRANSAMOUNT")]
    pub trans_amount: i64,

    /// Type of the last applied transaction, e.g. "DEBIT"
    #[serde(rename = "TRANSTYPE")]
    pub trans_type: String,

    #[serde(rename = "REMARKS")]
    pub remarks: String,
}

impl Asset {
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Asset> {
        serde_json::from_slice(bytes)
    }

    /// Overwrites the fields a transaction is allowed to change.
    /// Dealer, MSISDN and PIN stay as they were at creation.
    pub fn apply_transaction(
        &mut self,
        balance: i64,
        status: &str,
        trans_type: &str,
        remarks: &str,
        trans_amount: i64,
    ) {
        self.balance = balance;
        self.status = status.to_string();
        self.trans_type = trans_type.to_string();
        self.remarks = remarks.to_string();
        self.trans_amount = trans_amount;
    }
}

impl Debug for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asset")
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
