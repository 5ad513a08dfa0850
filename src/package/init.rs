//! Creates a data package descriptor from a file or a directory, or updates an existing one
//!
use super::*;
use chrono::NaiveDate;
use dialoguer::Input;
use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
};
use walkdir::{DirEntry, WalkDir};

/// How many data rows are read to guess column types.
const SAMPLE_ROWS: usize = 100;

/// Asks a human operator for package metadata.
pub trait Prompter {
    /// Returns `None` to keep the default.
    fn ask(&mut self, question: &str, default: Option<&str>) -> io::Result<Option<String>>;
}

/// Never asks anything, every default is kept.
pub struct Defaults;

impl Prompter for Defaults {
    fn ask(&mut self, _: &str, _: Option<&str>) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// Asks on the terminal; pressing enter keeps the default.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str, default: Option<&str>) -> io::Result<Option<String>> {
        let mut input = Input::<String>::new()
            .with_prompt(question)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_owned());
        }
        let answer = input
            .interact_text()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(changed_answer(answer, default))
    }
}

/// `None` when the answer is blank or repeats the default.
fn changed_answer(answer: String, default: Option<&str>) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() || Some(answer) == default {
        None
    } else {
        Some(answer.to_owned())
    }
}

/// Builds the package for `path`.
///
/// * A file becomes the single resource of a package rooted at its parent directory.
/// * A directory has every non-hidden file under it added as a resource.
///
/// An existing `datapackage.json` in the package root is loaded and only gains the
/// resources it does not list yet. Nothing is written to disk.
pub fn init(path: impl AsRef<Path>, prompter: &mut dyn Prompter) -> Result<Package, Error> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::NotFound(path.to_owned()));
    }

    let root = if path.is_dir() {
        path.to_owned()
    } else {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_owned(),
            _ => PathBuf::from("."),
        }
    };

    let mut descriptor = match Package::load(&root) {
        Ok(existing) => existing.descriptor,
        Err(Error::NotFound(_)) => Descriptor::default(),
        Err(e) => return Err(e),
    };

    let files = if path.is_dir() {
        data_files(&root)?
    } else {
        vec![path.to_owned()]
    };

    let known_paths = descriptor
        .resources
        .iter()
        .flat_map(|r| r.paths().iter().cloned())
        .collect::<HashSet<_>>();
    let mut names = descriptor
        .resources
        .iter()
        .filter_map(|r| r.name.clone())
        .collect::<HashSet<_>>();

    for file in files {
        let relative = relative_path(&root, &file);
        if known_paths.contains(&relative) {
            continue;
        }
        let mut resource = infer_resource(&file, relative)?;
        resource.name = resource.name.map(|name| unique_name(name, &mut names));
        tracing::debug!(path = ?resource.path, name = ?resource.name, "added resource");
        descriptor.resources.push(resource);
    }

    if descriptor.name.is_none() {
        descriptor.name = Some(default_package_name(&root));
    }
    ask_metadata(&mut descriptor, prompter)?;

    Ok(Package::local(descriptor, root))
}

fn ask_metadata(descriptor: &mut Descriptor, prompter: &mut dyn Prompter) -> io::Result<()> {
    if let Some(name) = prompter.ask("Package name", descriptor.name.as_deref())? {
        descriptor.name = Some(slugify(&name));
    }
    if let Some(title) = prompter.ask("Title", descriptor.title.as_deref())? {
        descriptor.title = Some(title);
    }
    if let Some(description) = prompter.ask("Description", descriptor.description.as_deref())? {
        descriptor.description = Some(description);
    }

    let license = descriptor.licenses.first().and_then(|l| l.name.clone());
    if let Some(answer) = prompter.ask("License", license.as_deref())? {
        descriptor.licenses = vec![License::named(answer)];
    }
    Ok(())
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn data_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = vec![];
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.depth() == 1 && entry.file_name() == DESCRIPTOR_FILE {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

fn relative_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn infer_resource(file: &Path, relative: String) -> Result<Resource, Error> {
    let format = file
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let schema = match format.as_deref() {
        Some("csv") => Some(infer_schema(file, ',')?),
        Some("tsv") => Some(infer_schema(file, '\t')?),
        _ => None,
    };

    Ok(Resource {
        name: Some(slugify(&stem)),
        path: Some(relative.into()),
        mediatype: format.as_deref().and_then(mediatype).map(str::to_owned),
        encoding: schema.as_ref().map(|_| "utf-8".to_owned()),
        format,
        bytes: Some(fs::metadata(file)?.len()),
        schema: schema.map(SchemaSource::Inline),
        ..Default::default()
    })
}

fn mediatype(format: &str) -> Option<&'static str> {
    let mediatype = match format {
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        "geojson" => "application/geo+json",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => return None,
    };
    Some(mediatype)
}

/// Reads the header and a sample of rows; every column gets the narrowest type all its cells fit.
pub fn infer_schema(file: &Path, delimiter: char) -> Result<Schema, Error> {
    let mut lines = BufReader::new(File::open(file)?).lines();

    let header = match lines.next() {
        Some(line) => split_row(line?.trim_start_matches('\u{feff}'), delimiter),
        None => return Ok(Schema::default()),
    };

    let mut types: Vec<Option<CellType>> = vec![None; header.len()];
    for line in lines.take(SAMPLE_ROWS) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        for (slot, cell) in types.iter_mut().zip(split_row(&line, delimiter)) {
            if let Some(cell_type) = CellType::of(&cell) {
                *slot = Some(slot.map_or(cell_type, |t| t.merge(cell_type)));
            }
        }
    }

    let fields = header
        .into_iter()
        .zip(types)
        .map(|(name, t)| Field::new(name, t.unwrap_or(CellType::String).as_str()))
        .collect();

    Ok(Schema {
        fields,
        extra: Map::new(),
    })
}

/// Splits one delimited line; double quotes group cells and `""` escapes a quote.
pub(crate) fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = vec![];
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            c if c == delimiter && !quoted => cells.push(std::mem::take(&mut cell)),
            c => cell.push(c),
        }
    }
    cells.push(cell.trim_end_matches('\r').to_owned());

    cells.into_iter().map(|c| c.trim().to_owned()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Integer,
    Number,
    Boolean,
    Date,
    String,
}

impl CellType {
    fn of(cell: &str) -> Option<CellType> {
        if cell.is_empty() {
            return None;
        }
        let cell_type = if cell.parse::<i64>().is_ok() {
            CellType::Integer
        } else if is_number(cell) {
            CellType::Number
        } else if cell.eq_ignore_ascii_case("true") || cell.eq_ignore_ascii_case("false") {
            CellType::Boolean
        } else if is_date(cell) {
            CellType::Date
        } else {
            CellType::String
        };
        Some(cell_type)
    }

    fn merge(self, other: CellType) -> CellType {
        use CellType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Number) | (Number, Integer) => Number,
            _ => String,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            CellType::Integer => "integer",
            CellType::Number => "number",
            CellType::Boolean => "boolean",
            CellType::Date => "date",
            CellType::String => "string",
        }
    }
}

fn is_number(cell: &str) -> bool {
    // `f64::from_str` also takes "inf" and "NaN"
    cell.bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
        && cell.parse::<f64>().is_ok()
}

/// ISO 8601 calendar dates, the default Table Schema `date` format.
fn is_date(cell: &str) -> bool {
    cell.len() == 10 && NaiveDate::parse_from_str(cell, "%Y-%m-%d").is_ok()
}

/// Lowercases and replaces everything outside `[a-z0-9._-]` with `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '-'
        };
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "data".to_owned()
    } else {
        slug.to_owned()
    }
}

fn unique_name(name: String, taken: &mut HashSet<String>) -> String {
    let mut candidate = name.clone();
    let mut n = 2;
    while taken.contains(&candidate) {
        candidate = format!("{name}-{n}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

fn default_package_name(root: &Path) -> String {
    let named = root
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));
    slugify(&named.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Option<&'static str>>, Vec<String>);

    impl Prompter for Scripted {
        fn ask(&mut self, question: &str, _: Option<&str>) -> io::Result<Option<String>> {
            self.1.push(question.to_owned());
            Ok(self.0.pop_front().flatten().map(str::to_owned))
        }
    }

    fn write(dir: &Path, relative: &str, content: &str) -> PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn directory_becomes_a_package() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("My GDP Data");
        write(&root, "gdp.csv", "country,year,value\nFR,2020,2.6\nDE,2021,4\n");
        write(&root, "notes/README.md", "# notes\n");
        write(&root, ".hidden", "skip me");
        write(&root, ".git/config", "skip me too");

        let package = init(&root, &mut Defaults).unwrap();
        let descriptor = &package.descriptor;
        assert_eq!(descriptor.name.as_deref(), Some("my-gdp-data"));
        assert_eq!(package.root(), Some(root.as_path()));

        let paths = descriptor
            .resources
            .iter()
            .map(|r| r.paths()[0].as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, ["gdp.csv", "notes/README.md"]);

        let csv = &descriptor.resources[0];
        assert_eq!(csv.name.as_deref(), Some("gdp"));
        assert_eq!(csv.format.as_deref(), Some("csv"));
        assert_eq!(csv.mediatype.as_deref(), Some("text/csv"));
        assert_eq!(csv.bytes, Some(41));
        let fields = &csv.inline_schema().unwrap().fields;
        assert_eq!(
            fields,
            &vec![
                Field::new("country", "string"),
                Field::new("year", "integer"),
                Field::new("value", "number"),
            ]
        );
        assert!(descriptor.resources[1].schema.is_none());
    }

    #[test]
    fn existing_descriptor_is_updated_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.csv", "x\n1\n");
        write(dir.path(), "b/a.csv", "y\ntrue\n");
        write(
            dir.path(),
            DESCRIPTOR_FILE,
            r#"{"name": "kept", "resources": [{"name": "a", "path": "a.csv", "custom": 1}]}"#,
        );

        let package = init(dir.path(), &mut Defaults).unwrap();
        let resources = &package.descriptor.resources;
        assert_eq!(package.name(), Some("kept"));
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].extra["custom"], 1);
        assert_eq!(resources[1].paths(), ["b/a.csv"]);
        assert_eq!(resources[1].name.as_deref(), Some("a-2"));
        let fields = &resources[1].inline_schema().unwrap().fields;
        assert_eq!(fields[0].field_type.as_deref(), Some("boolean"));
    }

    #[test]
    fn single_file_is_rooted_at_its_parent() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "data.json", "{}");
        write(dir.path(), "other.csv", "a\n");

        let package = init(&file, &mut Defaults).unwrap();
        assert_eq!(package.root(), Some(dir.path()));
        assert_eq!(package.descriptor.resources.len(), 1);
        assert_eq!(
            package.descriptor.resources[0].mediatype.as_deref(),
            Some("application/json")
        );
    }

    #[test]
    fn prompter_answers_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "hello");

        let mut prompter = Scripted(
            VecDeque::from([Some("World Bank GDP"), Some("GDP"), None, Some("ODC-PDDL-1.0")]),
            vec![],
        );
        let package = init(dir.path(), &mut prompter).unwrap();
        let descriptor = &package.descriptor;
        assert_eq!(prompter.1, ["Package name", "Title", "Description", "License"]);
        assert_eq!(descriptor.name.as_deref(), Some("world-bank-gdp"));
        assert_eq!(descriptor.title.as_deref(), Some("GDP"));
        assert_eq!(descriptor.description, None);
        assert_eq!(descriptor.licenses, vec![License::named("ODC-PDDL-1.0")]);
    }

    #[test]
    fn missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            init(dir.path().join("nope"), &mut Defaults),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn rows_split_with_quotes() {
        assert_eq!(
            split_row(r#"a,"b, c","say ""hi""",d"#, ','),
            ["a", "b, c", r#"say "hi""#, "d"]
        );
        assert_eq!(split_row("x\ty\r", '\t'), ["x", "y"]);
    }

    #[test]
    fn cell_types_widen() {
        assert_eq!(CellType::of("12"), Some(CellType::Integer));
        assert_eq!(CellType::of("-1.5e3"), Some(CellType::Number));
        assert_eq!(CellType::of("inf"), Some(CellType::String));
        assert_eq!(CellType::of("2020-02-29"), Some(CellType::Date));
        assert_eq!(CellType::of("2021-02-29"), Some(CellType::String));
        assert_eq!(CellType::of("2021-04-31"), Some(CellType::String));
        assert_eq!(CellType::of("2020-13-01"), Some(CellType::String));
        assert_eq!(CellType::of("2020-1-1"), Some(CellType::String));
        assert_eq!(CellType::of(""), None);
        assert_eq!(CellType::Integer.merge(CellType::Number), CellType::Number);
        assert_eq!(CellType::Date.merge(CellType::Integer), CellType::String);
    }

    #[test]
    fn impossible_dates_are_strings() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(
            dir.path(),
            "days.csv",
            "day,when\n2021-02-30,2020-02-29\n2021-04-31,2021-12-31\n",
        );

        let fields = infer_schema(&file, ',').unwrap().fields;
        assert_eq!(fields, [Field::new("day", "string"), Field::new("when", "date")]);
    }

    #[test]
    fn unchanged_answers_keep_the_default() {
        assert_eq!(changed_answer("".into(), Some("gdp")), None);
        assert_eq!(changed_answer(" gdp ".into(), Some("gdp")), None);
        assert_eq!(changed_answer("GDP 2020".into(), Some("gdp")), Some("GDP 2020".into()));
        assert_eq!(changed_answer("MIT".into(), None), Some("MIT".into()));
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("My GDP Data"), "my-gdp-data");
        assert_eq!(slugify("  --ünï code--"), "n-code");
        assert_eq!(slugify("???"), "data");
    }
}
