mod avahi;
mod nfs;
mod nftables;
mod samba;
mod sanitize;
mod systemd_unit;

pub use askama::Template;
pub use avahi::AvahiAdiskTemplate;
pub use nfs::{NfsExportTemplate, NfsNetworkEntry};
pub use nftables::NftablesTemplate;
pub use samba::SambaShareTemplate;
pub use sanitize::assert_safe_field;
pub use systemd_unit::SystemdUnitTemplate;
