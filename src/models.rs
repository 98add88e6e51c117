use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::StartupError;

/// Route under which animation files are served.
pub const GIF_ROUTE: &str = "/gif";

/// Escapes everything but unreserved and sub-delim characters; `/` is escaped
/// too so the filename stays a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Gesture label to animation filename, read once at start-up.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(BTreeMap<String, String>);

impl LabelMap {
    pub fn from_path(path: &Path) -> Result<Self, StartupError> {
        let raw = fs::read_to_string(path).map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&raw).map_err(|source| StartupError::LabelMap {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive on the query side: the key is upper-cased before lookup.
    pub fn gif_for(&self, label: &str) -> Option<&str> {
        self.0.get(&label.to_uppercase()).map(String::as_str)
    }

    /// URL of the animation for `label`, if one is mapped.
    pub fn gif_url(&self, label: &str) -> Option<String> {
        self.gif_for(label).map(|filename| {
            format!(
                "{}/{}",
                GIF_ROUTE,
                utf8_percent_encode(filename, PATH_SEGMENT)
            )
        })
    }
}

#[cfg(test)]
impl<K, V> FromIterator<(K, V)> for LabelMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Classifier output index `i` denotes `ClassList[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassList(Vec<String>);

impl ClassList {
    #[cfg(test)]
    pub fn new(labels: Vec<String>) -> Self {
        ClassList(labels)
    }

    /// Sorted keys of the label map.
    pub fn from_label_map(map: &LabelMap) -> Self {
        // BTreeMap keys already iterate in sorted order.
        ClassList(map.0.keys().cloned().collect())
    }

    /// One label per line; blank lines are skipped.
    pub fn from_path(path: &Path) -> Result<Self, StartupError> {
        let raw = fs::read_to_string(path).map_err(|source| StartupError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let labels: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        if labels.is_empty() {
            return Err(StartupError::NoClasses(path.to_path_buf()));
        }

        Ok(ClassList(labels))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[cfg_attr(test, derive(Deserialize))]
pub struct PredictionResponse {
    pub gesture: String,
    pub gif: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[cfg_attr(test, derive(Deserialize))]
pub struct GifResponse {
    pub gif: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn lookup_upper_cases_the_query() {
        let map: LabelMap = [("HELLO", "hello.gif")].into_iter().collect();

        assert_eq!(map.gif_for("hello"), Some("hello.gif"));
        assert_eq!(map.gif_for("Hello"), Some("hello.gif"));
        assert_eq!(map.gif_url("HELLO").as_deref(), Some("/gif/hello.gif"));
        assert_eq!(map.gif_url("GOODBYE"), None);
    }

    #[test]
    fn gif_url_escapes_the_filename() {
        let map: LabelMap = [
            ("THANK YOU", "thank you.gif"),
            ("WHAT", "what?.gif"),
            ("HASH", "a#b/c.gif"),
            ("PLAIN", "good-bye_2.gif"),
        ]
        .into_iter()
        .collect();

        assert_eq!(map.gif_url("thank you").as_deref(), Some("/gif/thank%20you.gif"));
        assert_eq!(map.gif_url("what").as_deref(), Some("/gif/what%3F.gif"));
        assert_eq!(map.gif_url("hash").as_deref(), Some("/gif/a%23b%2Fc.gif"));
        assert_eq!(map.gif_url("plain").as_deref(), Some("/gif/good-bye_2.gif"));
    }

    #[test]
    fn lowercase_keys_are_never_matched() {
        let map: LabelMap = [("thanks", "thanks.gif")].into_iter().collect();
        assert_eq!(map.gif_for("thanks"), None);
    }

    #[test]
    fn class_list_is_sorted_map_keys() {
        let map: LabelMap = [("YES", "y.gif"), ("HELLO", "h.gif"), ("NO", "n.gif")]
            .into_iter()
            .collect();
        let classes = ClassList::from_label_map(&map);

        assert_eq!(classes.len(), 3);
        assert_eq!(classes.get(0), Some("HELLO"));
        assert_eq!(classes.get(1), Some("NO"));
        assert_eq!(classes.get(2), Some("YES"));
        assert_eq!(classes.get(3), None);
    }

    #[test]
    fn label_map_loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"HELLO": "hello.gif", "THANK YOU": "thanks.gif"}}"#).unwrap();

        let map = LabelMap::from_path(file.path()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.gif_for("thank you"), Some("thanks.gif"));
    }

    #[test]
    fn label_map_rejects_non_object_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["HELLO"]"#).unwrap();

        let err = LabelMap::from_path(file.path()).unwrap_err();
        assert!(matches!(err, StartupError::LabelMap { .. }));
    }

    #[test]
    fn missing_label_map_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LabelMap::from_path(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StartupError::Read { .. }));
    }

    #[test]
    fn class_file_keeps_line_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "HELLO\n\n  GOODBYE \nYES").unwrap();

        let classes = ClassList::from_path(file.path()).unwrap();
        assert_eq!(
            classes,
            ClassList::new(vec!["HELLO".into(), "GOODBYE".into(), "YES".into()])
        );
    }

    #[test]
    fn empty_class_file_is_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = ClassList::from_path(file.path()).unwrap_err();
        assert!(matches!(err, StartupError::NoClasses(_)));
    }

    #[test]
    fn absent_gif_serializes_as_null() {
        let body = serde_json::to_value(PredictionResponse {
            gesture: "GOODBYE".into(),
            gif: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"gesture": "GOODBYE", "gif": null}));
    }
}
