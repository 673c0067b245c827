use entities::asset::Asset;
use rand::{distributions::Alphanumeric, Rng};

pub fn rand_asset_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("acct-{suffix}")
}

pub fn rand_msisdn() -> String {
    format!("999{:08}", rand::thread_rng().gen_range(0..100_000_000u32))
}

pub fn rand_asset() -> Asset {
    let mut rng = rand::thread_rng();

    Asset {
        dealer_id: format!("D{}", rng.gen_range(1..1000u32)),
        msisdn: rand_msisdn(),
        mpin: format!("{:04}", rng.gen_range(0..10_000u32)),
        balance: rng.gen_range(0..1_000_000i64),
        status: "active".to_string(),
        trans_amount: 0,
        trans_type: "".to_string(),
        remarks: "init".to_string(),
    }
}
