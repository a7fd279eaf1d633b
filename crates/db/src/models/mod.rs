pub mod feedback;
pub mod permission;
pub mod role;
pub mod system_log;
pub mod user;
