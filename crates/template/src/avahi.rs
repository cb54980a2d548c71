use askama::Template;

use crate::sanitize::assert_safe_field;

#[derive(Template)]
#[template(path = "avahi/adisk.jinja", ext = "xml")]
pub struct AvahiAdiskTemplate {
    pub share_name: String,
}

impl AvahiAdiskTemplate {
    pub fn new(share_name: impl Into<String>) -> anyhow::Result<Self> {
        let share_name = share_name.into();
        assert_safe_field("share.name", &share_name)?;
        Ok(Self { share_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_adisk_service_type() {
        let tpl = AvahiAdiskTemplate::new("docs").unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("_adisk._tcp"));
        assert!(out.contains("docs"));
    }
}
