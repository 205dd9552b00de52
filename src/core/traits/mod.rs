pub mod audit;
pub mod forwarder;
