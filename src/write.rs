//! The output side of the build: mapping source paths to destination paths,
//! and creating files along with their parent directories.

use crate::urls::AMP_PREFIX;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const HTML_EXTENSION: &str = "html";

/// The destination tree.
#[derive(Clone, Debug)]
pub struct Output {
    root: PathBuf,
}

impl Output {
    pub fn new<P: Into<PathBuf>>(root: P) -> Output {
        Output { root: root.into() }
    }

    /// The destination of a page rendered from the document at `source`
    /// (relative to the source root): the same relative path with an `.html`
    /// extension, under `amp/` for AMP variants.
    pub fn page_path(&self, source: &Path, amp: bool) -> PathBuf {
        let relative = source.with_extension(HTML_EXTENSION);
        match amp {
            true => self.root.join(AMP_PREFIX).join(relative),
            false => self.root.join(relative),
        }
    }

    /// Copies the static file at `from` to `relative` under the output root.
    pub fn copy(&self, from: &Path, relative: &Path) -> io::Result<PathBuf> {
        let to = self.root.join(relative);
        create_parent(&to)?;
        fs::copy(from, &to)?;
        Ok(to)
    }
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) => fs::create_dir_all(dir),
        None => Ok(()),
    }
}

/// Writes `contents` to `path`, creating its parent directories first.
/// Existing directories are not an error.
pub fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    create_parent(path)?;
    fs::write(path, contents)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_page_path() {
        let output = Output::new("/dst");
        assert_eq!(
            PathBuf::from("/dst/blog/2023-05-01-hello.html"),
            output.page_path(Path::new("blog/2023-05-01-hello.md"), false)
        );
        assert_eq!(
            PathBuf::from("/dst/amp/blog/2023-05-01-hello.html"),
            output.page_path(Path::new("blog/2023-05-01-hello.md"), true)
        );
    }

    #[test]
    fn test_write_file_creates_directories() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a/b/c.html");
        write_file(&path, b"one")?;
        // the directories exist now; writing again must not fail
        write_file(&path, b"two")?;
        assert_eq!("two", fs::read_to_string(&path)?);
        Ok(())
    }

    #[test]
    fn test_copy() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let from = dir.path().join("logo.png");
        fs::write(&from, [0u8, 159, 146, 150])?;
        let output = Output::new(dir.path().join("out"));
        let to = output.copy(&from, Path::new("img/logo.png"))?;
        assert_eq!(dir.path().join("out/img/logo.png"), to);
        assert_eq!(vec![0u8, 159, 146, 150], fs::read(&to)?);
        Ok(())
    }
}
