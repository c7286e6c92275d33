pub mod join_codes;
pub mod membership;
pub mod mpesa;
pub mod sms;
pub mod voting;
