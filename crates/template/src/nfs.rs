use askama::Template;

use crate::sanitize::assert_safe_field;

pub struct NfsNetworkEntry {
    pub network: String,
    pub read_only: bool,
}

impl NfsNetworkEntry {
    /// `network(opts)` with options ordered sec=sys, rw|ro, sync, root_squash,
    /// all_squash, anonuid=65534, anongid=65534.
    pub fn render_opts(&self) -> String {
        let rw = if self.read_only { "ro" } else { "rw" };
        format!("sec=sys,{rw},sync,root_squash,all_squash,anonuid=65534,anongid=65534")
    }
}

#[derive(Template)]
#[template(path = "nfs/export.jinja", ext = "txt")]
pub struct NfsExportTemplate {
    pub path: String,
    pub networks: Vec<NfsNetworkEntry>,
}

impl NfsExportTemplate {
    pub fn new(path: impl Into<String>, networks: Vec<NfsNetworkEntry>) -> anyhow::Result<Self> {
        let path = path.into();
        assert_safe_field("nfs.path", &path)?;
        for entry in &networks {
            assert_safe_field("nfs.network", &entry.network)?;
        }
        Ok(Self { path, networks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_path_and_options_in_order() {
        let tpl = NfsExportTemplate::new(
            "/srv/shares/docs",
            vec![NfsNetworkEntry { network: "192.168.1.0/24".into(), read_only: false }],
        )
        .unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("/srv/shares/docs"));
        assert!(out.contains("sec=sys,rw,sync,root_squash,all_squash,anonuid=65534,anongid=65534"));
    }

    #[test]
    fn read_only_entry_emits_ro() {
        let entry = NfsNetworkEntry { network: "10.0.0.0/8".into(), read_only: true };
        assert!(entry.render_opts().starts_with("sec=sys,ro,"));
    }
}
