//! The document bridge (§4.F): a narrow, read-only visitor over an already
//! decoded JSON/YAML tree so the environment builder (§4.C) is generic over
//! which wire format produced the document.

/// A single node in a decoded document tree. Implemented for
/// `serde_json::Value` and `serde_yaml::Value` below; the environment
/// builder never needs to know which one it has.
pub trait DecodedNode {
    fn as_bool(&self) -> Option<bool>;
    fn as_i64(&self) -> Option<i64>;
    fn as_str(&self) -> Option<&str>;
    fn as_array(&self) -> Option<Vec<&Self>>;
    fn as_object(&self) -> Option<Vec<(&str, &Self)>>;
}

impl DecodedNode for serde_json::Value {
    fn as_bool(&self) -> Option<bool> {
        serde_json::Value::as_bool(self)
    }

    fn as_i64(&self) -> Option<i64> {
        serde_json::Value::as_i64(self)
    }

    fn as_str(&self) -> Option<&str> {
        serde_json::Value::as_str(self)
    }

    fn as_array(&self) -> Option<Vec<&Self>> {
        serde_json::Value::as_array(self).map(|items| items.iter().collect())
    }

    fn as_object(&self) -> Option<Vec<(&str, &Self)>> {
        serde_json::Value::as_object(self)
            .map(|map| map.iter().map(|(k, v)| (k.as_str(), v)).collect())
    }
}

impl DecodedNode for serde_yaml::Value {
    fn as_bool(&self) -> Option<bool> {
        serde_yaml::Value::as_bool(self)
    }

    fn as_i64(&self) -> Option<i64> {
        serde_yaml::Value::as_i64(self)
    }

    fn as_str(&self) -> Option<&str> {
        serde_yaml::Value::as_str(self)
    }

    fn as_array(&self) -> Option<Vec<&Self>> {
        serde_yaml::Value::as_sequence(self).map(|items| items.iter().collect())
    }

    fn as_object(&self) -> Option<Vec<(&str, &Self)>> {
        serde_yaml::Value::as_mapping(self).map(|map| {
            map.iter()
                .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
                .collect()
        })
    }
}

/// A document decoded from either JSON or YAML, picked by file extension
/// (falling back to trying JSON then YAML when the extension doesn't say).
pub enum Document {
    Json(serde_json::Value),
    Yaml(serde_yaml::Value),
}

impl Document {
    pub fn from_path_and_text(path: &std::path::Path, text: &str) -> crate::error::Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "json" => Ok(Document::Json(Self::parse_json(text)?)),
            "yaml" | "yml" => Ok(Document::Yaml(Self::parse_yaml(text)?)),
            _ => Self::parse_json(text)
                .map(Document::Json)
                .or_else(|_| Self::parse_yaml(text).map(Document::Yaml)),
        }
    }

    fn parse_json(text: &str) -> crate::error::Result<serde_json::Value> {
        serde_json::from_str(text).map_err(|e| {
            crate::error::FmtError::new(crate::error::ErrorKind::FileLoad, 0, format!("couldn't parse document as JSON: {e}"))
        })
    }

    fn parse_yaml(text: &str) -> crate::error::Result<serde_yaml::Value> {
        serde_yaml::from_str(text).map_err(|e| {
            crate::error::FmtError::new(crate::error::ErrorKind::FileLoad, 0, format!("couldn't parse document as YAML: {e}"))
        })
    }
}
