//! Filesystem scans over a cloned repository.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::trace;

use repominer_lib::repominer_trace_time;

const JAVA_EXTENSION: &str = "java";

/// Every `.java` file under `root`. Symbolic links are not followed.
pub fn java_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if root.is_dir() {
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                files.extend(java_files(&path)?);
            } else if file_type.is_file() && path.extension().map_or(false, |ext| ext == JAVA_EXTENSION) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

pub fn count_java_files(root: &Path) -> io::Result<usize> {
    Ok(java_files(root)?.len())
}

/// Lines of code across every `.java` file under `root`. Unreadable files are skipped.
#[repominer_trace_time]
pub fn count_lines_of_code(root: &Path) -> io::Result<usize> {
    let mut total = 0;

    for file in java_files(root)? {
        match fs::read(&file) {
            Ok(bytes) => total += count_code_lines(&String::from_utf8_lossy(&bytes)),
            Err(e) => trace!("Skipping unreadable [{}]: {}", file.display(), e),
        }
    }

    Ok(total)
}

/// Non-blank lines that do not start (once trimmed) with `//`, `*` or `/*`.
pub fn count_code_lines(source: &str) -> usize {
    source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !(line.starts_with("//") || line.starts_with('*') || line.starts_with("/*")))
        .count()
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const SAMPLE: &str = r#"
/*
 * License header
 */
package demo;

// entry point
public class Main {
    /** Javadoc */
    public static void main(String[] args) {

        System.out.println("hi"); // trailing comments still count
    }
}
"#;

    #[test]
    fn comments_and_blank_lines_are_not_code() {
        assert_eq!(count_code_lines(SAMPLE), 6);
        assert_eq!(count_code_lines(""), 0);
    }

    #[test]
    fn only_java_files_are_scanned_recursively() {
        let root = tempdir().unwrap();
        let nested = root.path().join("src/main/java/demo");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Main.java"), SAMPLE).unwrap();
        fs::write(nested.join("Util.java"), "class Util {\n}\n").unwrap();
        fs::write(root.path().join("README.md"), "# demo\nline\n").unwrap();
        fs::write(root.path().join("build.gradle"), "plugins {}\n").unwrap();

        assert_eq!(count_java_files(root.path()).unwrap(), 2);
        assert_eq!(count_lines_of_code(root.path()).unwrap(), 8);
    }

    #[test]
    fn files_with_invalid_utf8_are_read_lossily() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("Latin1.java"), b"class Caf\xe9 {\n}\n").unwrap();

        assert_eq!(count_lines_of_code(root.path()).unwrap(), 2);
    }

    #[test]
    fn missing_roots_have_no_files() {
        let root = tempdir().unwrap();

        assert_eq!(count_java_files(&root.path().join("missing")).unwrap(), 0);
    }
}
