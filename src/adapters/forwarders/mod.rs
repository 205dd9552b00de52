pub mod stderr_alert;
pub mod syslog_forwarder;
