//! Checks a descriptor, and the local data it references, against the Frictionless data package rules
//!
use super::*;
use std::collections::HashSet;
use std::fmt;

/// Field types defined by Table Schema.
const FIELD_TYPES: [&str; 15] = [
    "string", "number", "integer", "boolean", "object", "array", "date", "time", "datetime",
    "year", "yearmonth", "duration", "geopoint", "geojson", "any",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// JSON pointer into the descriptor, e.g. `/resources/1/path`.
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level} at {}: {}", self.location, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    fn error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, location.into(), message.into());
    }

    fn warning(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, location.into(), message.into());
    }

    fn push(&mut self, severity: Severity, location: String, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            location,
            message,
        });
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.errors().count();
        write!(
            f,
            "{errors} error(s), {} warning(s)",
            self.diagnostics.len() - errors
        )?;
        for diagnostic in &self.diagnostics {
            write!(f, "\n  {diagnostic}")?;
        }
        Ok(())
    }
}

/// Validates `package`. Local files are only checked when the package has a local root.
pub fn validate(package: &Package) -> Report {
    let mut report = Report::default();
    let descriptor = &package.descriptor;

    match descriptor.name.as_deref() {
        None => report.warning("/name", "the package has no name"),
        Some(name) if !is_valid_name(name) => report.error(
            "/name",
            format!("`{name}` must be lowercase and only contain [a-z0-9._-]"),
        ),
        _ => {}
    }

    for (i, license) in descriptor.licenses.iter().enumerate() {
        if license.name.is_none() && license.path.is_none() {
            report.error(format!("/licenses/{i}"), "a license needs a name or a path");
        }
    }

    if descriptor.resources.is_empty() {
        report.error("/resources", "a package needs at least one resource");
    }

    let mut names = HashSet::new();
    for (i, resource) in descriptor.resources.iter().enumerate() {
        let at = format!("/resources/{i}");

        match resource.name.as_deref() {
            None => report.error(format!("{at}/name"), "the resource has no name"),
            Some(name) if !is_valid_name(name) => report.error(
                format!("{at}/name"),
                format!("`{name}` must be lowercase and only contain [a-z0-9._-]"),
            ),
            Some(name) if !names.insert(name) => report.error(
                format!("{at}/name"),
                format!("the resource name `{name}` is used more than once"),
            ),
            _ => {}
        }

        match (&resource.path, &resource.data) {
            (Some(_), Some(_)) => {
                report.error(&at, "a resource has either `path` or `data`, not both")
            }
            (None, None) => report.error(&at, "a resource needs `path` or `data`"),
            (Some(path), None) => check_paths(&mut report, &at, path),
            (None, Some(_)) => {}
        }

        match &resource.schema {
            Some(SchemaSource::Inline(schema)) => check_schema(&mut report, &at, schema),
            Some(SchemaSource::Reference(path)) => {
                check_path(&mut report, format!("{at}/schema"), path)
            }
            None => {}
        }

        if resource.is_local() {
            if package.root().is_some() {
                check_local_data(&mut report, &at, package, resource);
            } else if package.base.is_none() {
                report.warning(
                    format!("{at}/path"),
                    "relative paths cannot be checked without a package directory",
                );
            }
        }
    }

    report
}

pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
}

fn path_location(at: &str, path: &ResourcePath, i: usize) -> String {
    match path {
        ResourcePath::Single(_) => format!("{at}/path"),
        ResourcePath::Multipart(_) => format!("{at}/path/{i}"),
    }
}

fn check_paths(report: &mut Report, at: &str, path: &ResourcePath) {
    let parts = path.parts();
    if parts.is_empty() {
        report.error(format!("{at}/path"), "the path has no parts");
        return;
    }
    if parts.iter().any(|p| is_url(p)) && parts.iter().any(|p| !is_url(p)) {
        report.error(format!("{at}/path"), "the parts mix URLs and local paths");
    }
    for (i, part) in parts.iter().enumerate() {
        check_path(report, path_location(at, path, i), part);
    }
}

fn check_path(report: &mut Report, at: String, path: &str) {
    if path.is_empty() {
        report.error(at, "the path is empty");
    } else if is_url(path) {
        // remote data is not fetched
    } else if path.starts_with('/') || path.contains('\\') || path.contains(':') {
        report.error(at, format!("`{path}` must be a relative POSIX path"));
    } else if path.split('/').any(|segment| segment == "..") {
        report.error(at, format!("`{path}` must not point outside the package"));
    }
}

fn check_schema(report: &mut Report, at: &str, schema: &Schema) {
    let mut names = HashSet::new();
    for (i, field) in schema.fields.iter().enumerate() {
        let field_at = format!("{at}/schema/fields/{i}");
        if field.name.is_empty() {
            report.error(format!("{field_at}/name"), "the field has no name");
        } else if !names.insert(field.name.as_str()) {
            report.error(
                format!("{field_at}/name"),
                format!("the field name `{}` is used more than once", field.name),
            );
        }
        if let Some(field_type) = field.field_type.as_deref() {
            if !FIELD_TYPES.contains(&field_type) {
                report.error(
                    format!("{field_at}/type"),
                    format!("`{field_type}` is not a Table Schema type"),
                );
            }
        }
    }
}

fn check_local_data(report: &mut Report, at: &str, package: &Package, resource: &Resource) {
    let Some(path) = &resource.path else {
        return;
    };
    let mut files = vec![];
    let mut size = 0;
    let mut missing = false;
    for (i, part) in path.parts().iter().enumerate() {
        let Some(file) = package.local_file(part) else {
            continue;
        };
        match fs::metadata(&file) {
            Ok(metadata) if metadata.is_file() => {
                size += metadata.len();
                files.push(file);
            }
            _ => {
                report.error(
                    path_location(at, path, i),
                    format!("{} does not exist", file.display()),
                );
                missing = true;
            }
        }
    }
    if missing {
        return;
    }

    if let Some(bytes) = resource.bytes {
        if bytes != size {
            report.error(
                format!("{at}/bytes"),
                format!("declared {bytes} bytes but the data has {size}"),
            );
        }
    }

    let delimiter = match resource.format.as_deref() {
        Some("csv") => ',',
        Some("tsv") => '\t',
        _ => return,
    };
    let (Some(schema), Some(file)) = (resource.inline_schema(), files.first()) else {
        return;
    };
    match read_header(file, delimiter) {
        Ok(header) => {
            let expected = schema.fields.iter().map(|f| f.name.as_str());
            if !header.iter().map(String::as_str).eq(expected) {
                report.error(
                    format!("{at}/schema/fields"),
                    format!(
                        "the header [{}] does not match the schema fields",
                        header.join(", ")
                    ),
                );
            }
        }
        Err(e) => report.error(
            format!("{at}/path"),
            format!("cannot read {}: {e}", file.display()),
        ),
    }
}

fn read_header(file: &Path, delimiter: char) -> io::Result<Vec<String>> {
    use std::io::BufRead;

    let mut line = String::new();
    io::BufReader::new(fs::File::open(file)?).read_line(&mut line)?;
    let line = line.trim_start_matches('\u{feff}').trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Ok(vec![]);
    }
    Ok(init::split_row(line, delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn package_from(value: Value, root: Option<&Path>) -> Package {
        let descriptor = serde_json::from_value(value).unwrap();
        match root {
            Some(root) => Package::local(descriptor, root),
            None => Package::new(descriptor),
        }
    }

    fn locations(report: &Report) -> Vec<&str> {
        report.errors().map(|d| d.location.as_str()).collect()
    }

    #[test]
    fn well_formed_package_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x,y\n1,2\n").unwrap();
        let package = package_from(
            json!({
                "name": "demo",
                "licenses": [{"name": "ODC-PDDL-1.0"}],
                "resources": [
                    {"name": "a", "path": "a.csv", "format": "csv", "bytes": 8,
                     "schema": {"fields": [{"name": "x", "type": "integer"}, {"name": "y"}]}},
                    {"name": "inline", "data": [[1, 2]]},
                    {"name": "remote", "path": "https://example.com/r.csv"}
                ]
            }),
            Some(dir.path()),
        );

        let report = validate(&package);
        assert!(report.is_valid(), "{report}");
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn descriptor_problems_are_located() {
        let package = package_from(
            json!({
                "name": "Bad Name",
                "licenses": [{"title": "untitled"}],
                "resources": [
                    {"name": "a", "path": "../a.csv"},
                    {"name": "a", "data": [], "path": "b.csv"},
                    {"path": "/etc/passwd"},
                    {"name": "s", "data": [],
                     "schema": {"fields": [
                         {"name": "x", "type": "text"}, {"name": "x"}, {"name": ""}
                     ]}},
                    {"name": "m", "path": ["https://example.com/1.csv", "../2.csv"],
                     "schema": "/etc/schema.json"}
                ]
            }),
            None,
        );

        let report = validate(&package);
        assert!(!report.is_valid());
        assert_eq!(
            locations(&report),
            [
                "/name",
                "/licenses/0",
                "/resources/0/path",
                "/resources/1/name",
                "/resources/1",
                "/resources/2/name",
                "/resources/2/path",
                "/resources/3/schema/fields/0/type",
                "/resources/3/schema/fields/1/name",
                "/resources/3/schema/fields/2/name",
                "/resources/4/path",
                "/resources/4/path/1",
                "/resources/4/schema",
            ]
        );
    }

    #[test]
    fn empty_package_has_no_resources_and_no_name() {
        let report = validate(&Package::default());
        assert_eq!(locations(&report), ["/resources"]);
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
        assert_eq!(report.diagnostics[0].location, "/name");
    }

    #[test]
    fn local_data_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x,z\n1,2\n").unwrap();
        let package = package_from(
            json!({
                "name": "demo",
                "resources": [
                    {"name": "a", "path": "a.csv", "format": "csv", "bytes": 3,
                     "schema": {"fields": [{"name": "x"}, {"name": "y"}]}},
                    {"name": "gone", "path": "gone.csv"}
                ]
            }),
            Some(dir.path()),
        );

        let report = validate(&package);
        assert_eq!(
            locations(&report),
            ["/resources/0/bytes", "/resources/0/schema/fields", "/resources/1/path"]
        );
    }

    #[test]
    fn multipart_data_is_checked_part_by_part() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.csv"), "x\n1\n").unwrap();
        fs::write(dir.path().join("2.csv"), "2\n").unwrap();
        let package = package_from(
            json!({
                "name": "demo",
                "resources": [
                    {"name": "a", "path": ["1.csv", "2.csv"], "format": "csv", "bytes": 6,
                     "schema": {"fields": [{"name": "x"}]}},
                    {"name": "b", "path": ["1.csv", "3.csv"]}
                ]
            }),
            Some(dir.path()),
        );

        let report = validate(&package);
        assert_eq!(locations(&report), ["/resources/1/path/1"]);
    }

    #[test]
    fn relative_paths_without_a_directory_are_flagged() {
        let package = package_from(
            json!({"name": "demo", "resources": [{"name": "a", "path": "a.csv"}]}),
            None,
        );

        let report = validate(&package);
        assert!(report.is_valid());
        assert_eq!(report.diagnostics[0].severity, Severity::Warning);
        assert_eq!(report.diagnostics[0].location, "/resources/0/path");
    }
}
