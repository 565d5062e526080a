use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::record::{Format, Record};

/// Errors raised while writing generated records.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("error accessing output path {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error encoding records of {model}: {source}")]
    Csv {
        model: String,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, WriteError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> WriteError + '_ {
    move |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Resolve where a model's records go.
///
/// An empty path writes `<name>.<ext>` in the working directory. An existing directory, or a
/// missing path without the expected extension, is treated as a directory.
pub fn resolve_output_path(out: &str, name: &str, ext: &str) -> Result<PathBuf> {
    let file_name = format!("{name}.{ext}");
    if out.is_empty() {
        return Ok(PathBuf::from(file_name));
    }
    let path = Path::new(out);
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(path.join(file_name)),
        Ok(_) => Ok(path.to_path_buf()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let matches_ext = path
                .extension()
                .and_then(|found| found.to_str())
                .is_some_and(|found| found.eq_ignore_ascii_case(ext));
            if matches_ext {
                Ok(path.to_path_buf())
            } else {
                Ok(path.join(file_name))
            }
        }
        Err(err) => Err(io_error(path)(err)),
    }
}

fn create_output_file(out: &str, name: &str, ext: &str) -> Result<(PathBuf, File)> {
    let path = resolve_output_path(out, name, ext)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let file = File::create(&path).map_err(io_error(&path))?;
    Ok((path, file))
}

/// Write `records` of model `name` in `format`. Returns the file written, if any.
pub fn write_records(
    format: Format,
    name: &str,
    records: &[Box<dyn Record>],
    out: &str,
) -> Result<Option<PathBuf>> {
    match format {
        Format::Csv => write_csv(name, records, out).map(Some),
        Format::Json | Format::Xml | Format::Serialised => {
            write_lines(format, name, records, out).map(Some)
        }
        Format::Stdout => {
            let stdout = io::stdout();
            write_stdout(name, records, &mut stdout.lock())
                .map_err(io_error(Path::new("<stdout>")))?;
            Ok(None)
        }
    }
}

fn write_csv(name: &str, records: &[Box<dyn Record>], out: &str) -> Result<PathBuf> {
    let (path, file) = create_output_file(out, name, Format::Csv.extension())?;
    let csv_error = |source| WriteError::Csv {
        model: name.to_string(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    if let Some(first) = records.first() {
        writer.write_record(first.csv_headers()).map_err(csv_error)?;
    }
    for record in records {
        writer.write_record(record.to_csv()).map_err(csv_error)?;
    }
    writer.flush().map_err(io_error(&path))?;

    info!(path = %path.display(), records = records.len(), "generated CSV file");
    Ok(path)
}

fn write_lines(
    format: Format,
    name: &str,
    records: &[Box<dyn Record>],
    out: &str,
) -> Result<PathBuf> {
    let (path, file) = create_output_file(out, name, format.extension())?;
    let mut writer = BufWriter::new(file);
    for record in records {
        let line = record.encode(format).map_err(|source| WriteError::Csv {
            model: name.to_string(),
            source,
        })?;
        writer
            .write_all(&line)
            .and_then(|()| writer.write_all(b"\n"))
            .map_err(io_error(&path))?;
    }
    writer.flush().map_err(io_error(&path))?;

    info!(
        path = %path.display(),
        format = %format,
        records = records.len(),
        "generated output file"
    );
    Ok(path)
}

/// Print `<model> <json>` per record.
pub fn write_stdout<W: Write>(
    name: &str,
    records: &[Box<dyn Record>],
    out: &mut W,
) -> io::Result<()> {
    for record in records {
        writeln!(out, "{name} {}", record.to_json())?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    struct Row(i64);

    impl Record for Row {
        fn csv_headers(&self) -> Vec<&'static str> {
            vec!["id", "label"]
        }

        fn to_csv(&self) -> Vec<String> {
            vec![self.0.to_string(), format!("row {}", self.0)]
        }

        fn to_json(&self) -> Value {
            json!({ "id": self.0 })
        }

        fn to_xml(&self) -> String {
            format!("<row><id>{}</id></row>", self.0)
        }

        fn serialise(&self) -> Vec<u8> {
            self.0.to_be_bytes().to_vec()
        }
    }

    fn rows(n: i64) -> Vec<Box<dyn Record>> {
        (0..n).map(|i| Box::new(Row(i)) as Box<dyn Record>).collect()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("datagen-writers-{}", std::process::id()));
        let dir = dir.join(format!("{:?}", std::thread::current().id()).replace(['(', ')'], ""));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn resolves_output_paths() {
        let dir = temp_dir();
        let dir_str = dir.to_str().unwrap();

        assert_eq!(
            resolve_output_path("", "users", "csv").unwrap(),
            PathBuf::from("users.csv")
        );
        assert_eq!(
            resolve_output_path(dir_str, "users", "csv").unwrap(),
            dir.join("users.csv")
        );

        let explicit = dir.join("missing").join("out.CSV");
        assert_eq!(
            resolve_output_path(explicit.to_str().unwrap(), "users", "csv").unwrap(),
            explicit
        );

        let nested = dir.join("missing-dir");
        assert_eq!(
            resolve_output_path(nested.to_str().unwrap(), "users", "json").unwrap(),
            nested.join("users.json")
        );
    }

    #[test]
    fn csv_output_has_header_row() {
        let dir = temp_dir().join("csv");
        let path = write_records(Format::Csv, "users", &rows(2), dir.to_str().unwrap())
            .unwrap()
            .unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents, "id,label\n0,row 0\n1,row 1\n");
    }

    #[test]
    fn line_formats_write_one_record_per_line() {
        let dir = temp_dir().join("lines");
        let out = dir.to_str().unwrap();

        let json = write_records(Format::Json, "users", &rows(2), out).unwrap().unwrap();
        assert_eq!(fs::read_to_string(json).unwrap(), "{\"id\":0}\n{\"id\":1}\n");

        let xml = write_records(Format::Xml, "users", &rows(1), out).unwrap().unwrap();
        assert_eq!(fs::read_to_string(xml).unwrap(), "<row><id>0</id></row>\n");

        let bin = write_records(Format::Serialised, "users", &rows(1), out)
            .unwrap()
            .unwrap();
        assert!(bin.to_str().unwrap().ends_with("users.bin"));
        assert_eq!(fs::read(bin).unwrap().len(), 9);
    }

    #[test]
    fn stdout_lines_are_prefixed_with_model() {
        let mut buf = Vec::new();
        write_stdout("users", &rows(2), &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "users {\"id\":0}\nusers {\"id\":1}\n"
        );
    }
}
