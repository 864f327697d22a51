//! Resolver map: how types and collections turn into registry keys

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ResolutionError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub name: String,
    pub root_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeConfig {
    pub definitive_collection: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    #[serde(default)]
    pub types: Vec<String>,
    /// Replaces the collection name in registry keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_type: Option<String>,
    /// Lookups in an unresolvable collection always come back empty.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unresolvable: bool,
}

impl CollectionConfig {
    pub fn contains(&self, ty: &str) -> bool {
        self.types.iter().any(|t| t == ty)
    }

    /// Name used for this collection in registry keys.
    pub fn key_segment<'a>(&'a self, name: &'a str) -> &'a str {
        self.group.as_deref().unwrap_or(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverMap {
    pub app: AppConfig,
    pub types: IndexMap<String, TypeConfig>,
    pub collections: IndexMap<String, CollectionConfig>,
}

impl ResolverMap {
    /// The standard layout: components, templates and helpers in the `ui`
    /// group, managers in `component-managers`, utilities unresolvable.
    pub fn module_unification(root_name: impl Into<String>) -> Self {
        let root_name = root_name.into();
        let types = [
            ("application", "main"),
            ("component", "components"),
            ("component-manager", "component-managers"),
            ("helper", "components"),
            ("renderer", "main"),
            ("template", "components"),
            ("util", "utils"),
        ]
        .into_iter()
        .map(|(ty, collection)| {
            (
                ty.to_owned(),
                TypeConfig {
                    definitive_collection: collection.to_owned(),
                },
            )
        })
        .collect();

        let strings = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut collections = IndexMap::new();
        collections.insert(
            "main".to_owned(),
            CollectionConfig {
                types: strings(&["application", "renderer"]),
                ..Default::default()
            },
        );
        collections.insert(
            "components".to_owned(),
            CollectionConfig {
                types: strings(&["component", "template", "helper"]),
                group: Some("ui".to_owned()),
                default_type: Some("component".to_owned()),
                unresolvable: false,
            },
        );
        collections.insert(
            "component-managers".to_owned(),
            CollectionConfig {
                types: strings(&["component-manager"]),
                ..Default::default()
            },
        );
        collections.insert(
            "utils".to_owned(),
            CollectionConfig {
                unresolvable: true,
                ..Default::default()
            },
        );

        ResolverMap {
            app: AppConfig {
                name: root_name.clone(),
                root_name,
            },
            types,
            collections,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Checks that every name the map refers to is declared.
    pub fn validate(&self) -> Result<(), ResolutionError> {
        for config in self.types.values() {
            if !self.collections.contains_key(&config.definitive_collection) {
                return Err(ResolutionError::UnknownCollection(
                    config.definitive_collection.clone(),
                ));
            }
        }
        for (name, collection) in &self.collections {
            for ty in collection.types.iter().chain(&collection.default_type) {
                if !self.types.contains_key(ty) {
                    return Err(ResolutionError::UnknownType(ty.clone()));
                }
            }
            if let Some(default_type) = &collection.default_type {
                if !collection.contains(default_type) {
                    return Err(ResolutionError::TypeNotInCollection {
                        ty: default_type.clone(),
                        collection: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_unification_map_is_valid() {
        let map = ResolverMap::module_unification("smoke");
        assert_eq!(map.validate(), Ok(()));
        assert_eq!(map.app.root_name, "smoke");
        assert!(map.collections["utils"].unresolvable);
        assert_eq!(
            map.collections["components"].key_segment("components"),
            "ui"
        );
        assert_eq!(
            map.collections["component-managers"].key_segment("component-managers"),
            "component-managers"
        );
    }

    #[test]
    fn test_json_round_trip_uses_camel_case() {
        let json = r#"{
            "app": { "name": "smoke", "rootName": "smoke" },
            "types": { "helper": { "definitiveCollection": "components" } },
            "collections": {
                "components": { "group": "ui", "types": ["helper"], "defaultType": "helper" }
            }
        }"#;
        let map = ResolverMap::from_json(json).unwrap();
        assert_eq!(map.types["helper"].definitive_collection, "components");
        assert_eq!(map.collections["components"].default_type.as_deref(), Some("helper"));
        assert!(!map.collections["components"].unresolvable);
        assert_eq!(map.validate(), Ok(()));

        let reparsed = ResolverMap::from_json(&serde_json::to_string(&map).unwrap()).unwrap();
        assert_eq!(reparsed, map);
    }

    #[test]
    fn test_validate_reports_dangling_names() {
        let mut map = ResolverMap::module_unification("app");
        map.types.insert(
            "service".into(),
            TypeConfig {
                definitive_collection: "services".into(),
            },
        );
        assert_eq!(
            map.validate(),
            Err(ResolutionError::UnknownCollection("services".into()))
        );

        let mut map = ResolverMap::module_unification("app");
        map.collections["main"].types.push("route".into());
        assert_eq!(map.validate(), Err(ResolutionError::UnknownType("route".into())));

        let mut map = ResolverMap::module_unification("app");
        map.collections["main"].default_type = Some("helper".into());
        assert_eq!(
            map.validate(),
            Err(ResolutionError::TypeNotInCollection {
                ty: "helper".into(),
                collection: "main".into(),
            })
        );
    }
}
