pub mod audit;
pub mod forwarders;
