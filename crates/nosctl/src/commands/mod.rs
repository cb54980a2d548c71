pub mod create_admin;
pub mod doctor;
pub mod firewall;
pub mod login;
pub mod pool;
pub mod share;
pub mod tx;
pub mod updates;
pub mod user;
