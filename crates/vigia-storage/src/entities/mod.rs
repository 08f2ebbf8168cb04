pub mod alert;
pub mod alert_config;
pub mod communication;
pub mod communication_template;
pub mod dispatch_log;
pub mod hospital;
pub mod notification;
pub mod project;
pub mod push_subscription;
pub mod recruitment_period;
pub mod user;
