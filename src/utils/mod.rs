pub mod rpc;
pub mod units;
