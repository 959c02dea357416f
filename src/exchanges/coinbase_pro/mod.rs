pub mod types;

pub mod builder;
pub mod rest;

// Re-export main components
pub use builder::{build_client, CoinbaseBuilder};
pub use rest::CoinbaseRest;
pub use types::{
    Account, AccountActivity, AccountHold, ActivityDetail, ActivityType, Amount, HoldType,
    ListAccount,
};
