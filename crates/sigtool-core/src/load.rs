//! Loading API files from disk.

use std::path::Path;

use tracing::info;

use crate::error::{SigError, SigResult};
use crate::format::{detect, FileFormat};
use crate::jdiff;
use crate::model::Codebase;
use crate::parser::parse_named;
use crate::sandbox::ReadSandbox;

/// A codebase together with the format it was read from.
#[derive(Debug, Clone)]
pub struct LoadedApi {
    pub codebase: Codebase,
    pub format: FileFormat,
}

/// Read `path` through `sandbox`, detect its format and parse it.
///
/// Signature files of every dialect and JDiff documents are accepted.
/// Unrecognized text is parsed with the newest signature grammar.
pub fn load_codebase(path: &Path, sandbox: &ReadSandbox) -> SigResult<LoadedApi> {
    if !path.exists() {
        return Err(SigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = sandbox.read_to_string(path)?;
    let file = path.display().to_string();
    let format = detect(&text);
    let codebase = match format {
        FileFormat::V1 | FileFormat::V2 | FileFormat::V3 | FileFormat::Unknown => {
            parse_named(&file, &text, format)?
        }
        FileFormat::Jdiff => jdiff::read(&file, &text)?,
        FileFormat::Baseline | FileFormat::SinceXml => {
            return Err(SigError::unsupported_format(format, "API input"));
        }
    };
    info!(
        file,
        format = %format,
        classes = codebase.class_count(),
        "loaded api"
    );
    Ok(LoadedApi { codebase, format })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn signature_and_jdiff_files_load() {
        let dir = TempDir::new().unwrap();
        let txt = dir.path().join("api.txt");
        std::fs::write(&txt, "// Signature format: 2.0\npackage a {\n  public class B {\n  }\n}\n").unwrap();
        let loaded = load_codebase(&txt, &ReadSandbox::unrestricted()).unwrap();
        assert_eq!(loaded.format, FileFormat::V2);
        assert!(loaded.codebase.contains_class("a.B"));

        let xml = dir.path().join("api.xml");
        std::fs::write(&xml, jdiff::write(&loaded.codebase, &Default::default())).unwrap();
        let loaded = load_codebase(&xml, &ReadSandbox::unrestricted()).unwrap();
        assert_eq!(loaded.format, FileFormat::Jdiff);
        assert!(loaded.codebase.contains_class("a.B"));
    }

    #[test]
    fn missing_and_unsupported_files_are_errors() {
        let dir = TempDir::new().unwrap();
        let missing = load_codebase(&dir.path().join("nope.txt"), &ReadSandbox::unrestricted());
        assert!(matches!(missing, Err(SigError::FileNotFound { .. })));

        let baseline = dir.path().join("baseline.txt");
        std::fs::write(&baseline, "// Baseline format: 1.0\n").unwrap();
        let err = load_codebase(&baseline, &ReadSandbox::unrestricted()).unwrap_err();
        assert!(matches!(err, SigError::UnsupportedFormat { .. }));
    }
}
