pub mod export_service;
pub mod integrity_service;
pub mod query_service;
pub mod report_service;
