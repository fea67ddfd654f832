//! Annotation overlay XML.
//!
//! ```xml
//! <root>
//!   <item name="test.pkg.MyTest myNumber">
//!     <annotation name="android.support.annotation.Nullable"/>
//!   </item>
//!   <item name="test.pkg.MyTest void setMode(int) 0">
//!     <annotation name="androidx.annotation.IntDef">
//!       <val name="value" val="{test.pkg.MyTest.MODE_A, test.pkg.MyTest.MODE_B}"/>
//!     </annotation>
//!   </item>
//! </root>
//! ```

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use super::{Assignment, MergeError};
use crate::model::{Annotation, ElementKey};
use crate::xml::parse_document;

/// Read one overlay document into assignments.
pub(crate) fn read_overlay(file: &str, text: &str) -> Result<Vec<Assignment>, MergeError> {
    let root = parse_document(file, text)?;
    let mut out = Vec::new();
    for item in root.children_named("item") {
        let Some(name) = item.attr("name") else {
            warn!(file, offset = item.offset, "overlay item without a name");
            continue;
        };
        let Some(key) = ElementKey::parse(name) else {
            warn!(file, key = name, "malformed element key in overlay");
            continue;
        };
        for element in item.children_named("annotation") {
            let Some(annotation_name) = element.attr("name") else {
                continue;
            };
            let mut annotation = Annotation::new(annotation_name);
            for val in element.children_named("val") {
                if let (Some(attr), Some(value)) = (val.attr("name"), val.attr("val")) {
                    annotation.set_attribute(attr, value);
                }
            }
            out.push(Assignment::from_annotation(key.clone(), annotation));
        }
    }
    Ok(out)
}

/// The overlay files a path designates: the file itself, or every `*.xml`
/// below a directory in sorted order.
pub(crate) fn overlay_files(path: &Path) -> Result<Vec<PathBuf>, MergeError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| MergeError::Walk {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let is_xml = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if entry.file_type().is_file() && is_xml {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Nullness;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn nullness_items_become_nullness_assignments() {
        let assignments = read_overlay(
            "a.xml",
            r#"<root>
  <item name="test.pkg.MyTest myNumber">
    <annotation name="android.support.annotation.Nullable"/>
  </item>
  <item name="test.pkg.MyTest void setMode(int) 0">
    <annotation name="androidx.annotation.IntDef">
      <val name="value" val="{1, 2}"/>
    </annotation>
  </item>
  <item name="   ">
    <annotation name="androidx.annotation.Keep"/>
  </item>
</root>"#,
        )
        .unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(
            assignments[0],
            Assignment::Nullness {
                key: ElementKey::field("test.pkg.MyTest", "myNumber"),
                path: None,
                nullness: Nullness::Nullable,
            }
        );
        let Assignment::Annotate { key, annotation } = &assignments[1] else {
            panic!("expected annotation, got {:?}", assignments[1]);
        };
        assert_eq!(key.parameter, Some(0));
        assert_eq!(annotation.attribute("value"), Some("{1, 2}"));
    }

    #[test]
    fn directories_are_walked_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.xml"), "<root/>").unwrap();
        fs::write(dir.path().join("a.xml"), "<root/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        fs::write(dir.path().join("nested").join("c.XML"), "<root/>").unwrap();
        let files = overlay_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.xml", "b.xml", "nested/c.XML"]);
    }
}
