// Application layer: use cases, CQRS buses, validation

pub mod command_bus;
pub mod command_handlers;
pub mod commands;
pub mod queries;
pub mod query_bus;
pub mod query_handlers;
pub mod services;
pub mod validators;
