use askama::Template;

use crate::sanitize::assert_safe_field;

#[derive(Template)]
#[template(path = "systemd/unit.jinja", ext = "txt")]
pub struct SystemdUnitTemplate {
    pub description: String,
    pub exec_start: String,
    pub after: Vec<String>,
    pub user: Option<String>,
}

impl SystemdUnitTemplate {
    pub fn new(
        description: impl Into<String>,
        exec_start: impl Into<String>,
        after: Vec<String>,
        user: Option<String>,
    ) -> anyhow::Result<Self> {
        let description = description.into();
        let exec_start = exec_start.into();
        assert_safe_field("unit.description", &description)?;
        assert_safe_field("unit.exec_start", &exec_start)?;
        Ok(Self { description, exec_start, after, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_exec_start_and_description() {
        let tpl = SystemdUnitTemplate::new("nosd control daemon", "/usr/bin/nosd start", vec![], None)
            .unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("Description=nosd control daemon"));
        assert!(out.contains("ExecStart=/usr/bin/nosd start"));
    }
}
