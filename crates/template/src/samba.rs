use askama::Template;

use crate::sanitize::assert_safe_field;

#[derive(Template)]
#[template(path = "samba/share.jinja", ext = "txt")]
pub struct SambaShareTemplate {
    pub name: String,
    pub path: String,
    pub guest: bool,
    pub recycle_dir: Option<String>,
    pub time_machine: bool,
    pub comment: String,
}

impl SambaShareTemplate {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        guest: bool,
        recycle_dir: Option<String>,
        time_machine: bool,
        comment: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        let path = path.into();
        let comment = comment.into();
        assert_safe_field("share.name", &name)?;
        assert_safe_field("share.path", &path)?;
        assert_safe_field("share.comment", &comment)?;
        if let Some(dir) = &recycle_dir {
            assert_safe_field("share.recycle_dir", dir)?;
        }
        Ok(Self { name, path, guest, recycle_dir, time_machine, comment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_section_header_and_path() {
        let tpl = SambaShareTemplate::new("docs", "/srv/shares/docs", false, None, false, "Docs share")
            .unwrap();
        let out = tpl.render().unwrap();
        assert!(out.contains("[docs]"));
        assert!(out.contains("path = /srv/shares/docs"));
    }

    #[test]
    fn rejects_unsafe_comment() {
        assert!(
            SambaShareTemplate::new("docs", "/srv/shares/docs", false, None, false, "bad\"comment")
                .is_err()
        );
    }
}
