//! Portable, bytecode-free description of a compiled bundle's symbol table.

use serde::{Deserialize, Serialize};

use crate::{HeapHandle, Locator, SymbolKind};

/// Format version written by the bundle compiler and accepted by the loader.
pub const DATA_SEGMENT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSegment {
    pub version: u32,
    pub table: Vec<Descriptor>,
    /// Indices into `table` of the templates meant to be rendered directly.
    pub entry_points: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub locator: Locator,
    pub kind: SymbolKind,
    pub metadata: DescriptorMetadata,
}

/// Resolver-facing view of a symbol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMetadata {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<HeapHandle>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub builtin: bool,
}

impl DataSegment {
    pub fn new(table: Vec<Descriptor>, entry_points: Vec<u32>) -> Self {
        Self {
            version: DATA_SEGMENT_VERSION,
            table,
            entry_points,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// ES module whose default export is this segment.
    pub fn to_module_source(&self) -> serde_json::Result<String> {
        Ok(format!("export default {};\n", serde_json::to_string(self)?))
    }

    pub fn position(&self, locator: &Locator) -> Option<usize> {
        self.table.iter().position(|d| &d.locator == locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataSegment {
        DataSegment::new(
            vec![
                Descriptor {
                    locator: Locator::default_export("./src/ui/components/Main/template.hbs"),
                    kind: SymbolKind::Template,
                    metadata: DescriptorMetadata {
                        ty: "template".into(),
                        collection: Some("components".into()),
                        name: "Main".into(),
                        handle: Some(HeapHandle::new(0, 12)),
                        builtin: false,
                    },
                },
                Descriptor {
                    locator: Locator::builtin_helper("if"),
                    kind: SymbolKind::Helper,
                    metadata: DescriptorMetadata {
                        ty: "helper".into(),
                        collection: None,
                        name: "if".into(),
                        handle: None,
                        builtin: true,
                    },
                },
            ],
            vec![0],
        )
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["entryPoints"], serde_json::json!([0]));
        assert_eq!(json["table"][0]["metadata"]["type"], "template");
        assert_eq!(json["table"][0]["metadata"]["handle"]["length"], 12);
        assert!(json["table"][1]["metadata"].get("handle").is_none());
        assert!(json["table"][1]["metadata"].get("collection").is_none());
        assert_eq!(json["table"][1]["metadata"]["builtin"], true);
        assert!(json["table"][0]["metadata"].get("builtin").is_none());
    }

    #[test]
    fn test_json_is_read_back() {
        let segment = sample();
        let parsed = DataSegment::from_json(&segment.to_json().unwrap()).unwrap();
        assert_eq!(parsed, segment);
    }

    #[test]
    fn test_module_source() {
        let source = sample().to_module_source().unwrap();
        assert!(source.starts_with("export default {\"version\":1,"));
        assert!(source.ends_with("};\n"));
    }
}
