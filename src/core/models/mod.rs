pub mod audit_event;
pub mod audit_query;
pub mod compliance_report;
pub mod integrity_report;
pub mod persisted_record;
