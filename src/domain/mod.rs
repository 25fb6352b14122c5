// Domain layer: permission tree model, roles, users

pub mod permission;
pub mod permission_catalog;
pub mod role;
pub mod user;
