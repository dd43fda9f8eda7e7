//! JSON I/O handling for CLI
//!
//! - Input: JSON documents from files, or a single query on stdin
//! - Output: single JSON object via stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read a JSON document from `path`, or from stdin when no path is given
pub fn read_json<T: DeserializeOwned>(path: Option<&Path>) -> CliResult<T> {
    let text = match path {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| CliError::io_error(format!("{}: {}", path.display(), e)))?,
        None => {
            let mut text = String::new();
            io::stdin().lock().read_to_string(&mut text)?;
            text
        }
    };

    if text.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    Ok(serde_json::from_str(&text)?)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_json_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query.json");
        fs::write(&path, r#"{"word":{"field":"title","value":"rust"}}"#).unwrap();

        let value: Value = read_json(Some(&path)).unwrap();
        assert_eq!(value["word"]["field"], "title");
    }

    #[test]
    fn test_read_json_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "  \n").unwrap();

        let err = read_json::<Value>(Some(&path)).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_IO_ERROR");
    }

    #[test]
    fn test_read_json_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_json::<Value>(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(err.message().contains("nope.json"));
    }
}
