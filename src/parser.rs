//! INI-style unit file parser.
//!
//! Lines starting with `#` or `;` are comments. Section headers are
//! `[Name]`. Directives are `Key=Value`, split on the first `=` with
//! both sides trimmed. Repeated keys accumulate in order. Lines outside
//! any section are ignored.

use std::path::Path;

use crate::error::Result;
use crate::types::{Directive, Section, UnitFile, UnitKind};

/// Parse a unit file from disk.
pub fn parse_unit_file<P: AsRef<Path>>(path: P) -> Result<UnitFile> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    Ok(parse_unit_str(&path.to_string_lossy(), &content))
}

/// Parse unit file content. The path is only used to derive the unit
/// name and kind, and to record the origin of the unit.
pub fn parse_unit_str(path: &str, content: &str) -> UnitFile {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let kind = UnitKind::from_name(&name);

    let mut unit = UnitFile {
        name,
        path: path.to_string(),
        kind,
        sections: Default::default(),
        raw: content.to_string(),
    };

    let mut current: Option<String> = None;

    for (idx, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        let line_num = idx + 1;

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let section_name = &line[1..line.len() - 1];
            unit.sections
                .entry(section_name.to_string())
                .or_insert_with(|| Section::new(section_name));
            current = Some(section_name.to_string());
            continue;
        }

        let Some(section_name) = &current else {
            continue;
        };

        if let Some(eq) = line.find('=') {
            if eq == 0 {
                continue;
            }
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();

            let section = unit
                .sections
                .get_mut(section_name)
                .expect("current section always inserted");
            section
                .directives
                .entry(key.to_string())
                .or_default()
                .push(Directive {
                    key: key.to_string(),
                    value: value.to_string(),
                    line: line_num,
                });
        }
    }

    unit
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# A comment
; Another comment
[Unit]
Description=Test service
After=network.target

[Service]
ExecStart=/usr/bin/testd --flag
ExecStartPre=/bin/one
ExecStartPre=/bin/two
ExecStartPre=/bin/three
Restart=on-failure

[Install]
WantedBy=multi-user.target
"#;

    #[test]
    fn test_parse_basic() {
        let unit = parse_unit_str("/etc/systemd/system/test.service", SAMPLE);
        assert_eq!(unit.name, "test.service");
        assert_eq!(unit.kind, UnitKind::Service);
        assert_eq!(unit.directive("Unit", "Description"), "Test service");
        assert_eq!(unit.directive("Service", "Restart"), "on-failure");
        assert_eq!(unit.directive("Install", "WantedBy"), "multi-user.target");
    }

    #[test]
    fn test_repeated_directives_in_order() {
        let unit = parse_unit_str("/etc/systemd/system/test.service", SAMPLE);
        let pre = unit.directives("Service", "ExecStartPre");
        assert_eq!(pre.len(), 3);
        assert_eq!(pre[0].value, "/bin/one");
        assert_eq!(pre[1].value, "/bin/two");
        assert_eq!(pre[2].value, "/bin/three");
        assert!(pre[0].line < pre[1].line && pre[1].line < pre[2].line);
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let unit = parse_unit_str("/x/a.service", "# only\n; comments\n\n");
        assert!(unit.sections.is_empty());
    }

    #[test]
    fn test_lines_outside_sections_ignored() {
        let unit = parse_unit_str("/x/a.service", "Key=Value\n[Unit]\nDescription=d\n");
        assert_eq!(unit.directive("Unit", "Description"), "d");
        assert_eq!(unit.sections.len(), 1);
    }

    #[test]
    fn test_first_equals_splits() {
        let unit = parse_unit_str(
            "/x/a.service",
            "[Service]\nEnvironment=VAR=value=with=equals\n",
        );
        assert_eq!(
            unit.directive("Service", "Environment"),
            "VAR=value=with=equals"
        );
    }

    #[test]
    fn test_whitespace_trimmed() {
        let unit = parse_unit_str("/x/a.service", "[Unit]\n  Description  =  spaced out  \n");
        assert_eq!(unit.directive("Unit", "Description"), "spaced out");
    }

    #[test]
    fn test_line_numbers_recorded() {
        let unit = parse_unit_str("/x/a.service", "[Unit]\nAfter=b.service\n");
        let after = unit.directives("Unit", "After");
        assert_eq!(after[0].line, 2);
    }
}
