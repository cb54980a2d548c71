mod ip;

pub use ip::{IpClass, classify_ip, resolve_client_ip};
