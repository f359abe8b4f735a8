//! Property tests over whole translations.

use cyphergen_common::types::Value;
use cyphergen_core::resolve_tree::ResolveTree;
use cyphergen_core::schema::SchemaModel;
use cyphergen_engine::{TranslationContext, translate};
use proptest::prelude::*;
use serde_json::json;

const SCHEMA: &str = r#"{
    "entities": [
        {
            "kind": "concrete",
            "name": "Actor",
            "attributes": [
                {"name": "name", "type": "String"},
                {"name": "born", "type": "Int"}
            ]
        },
        {
            "kind": "concrete",
            "name": "Movie",
            "attributes": [{"name": "title", "type": "String"}],
            "relationships": [
                {"name": "actors", "type": "ACTED_IN", "direction": "IN", "target": "Actor"}
            ]
        }
    ]
}"#;

fn actors(where_: serde_json::Value) -> ResolveTree {
    ResolveTree::new("actors")
        .with_arg("where", where_)
        .with_fields("Actor", [ResolveTree::new("name")])
}

proptest! {
    #[test]
    fn translation_is_deterministic(name in "[a-z]{1,10}", born in 1900i64..2020) {
        let schema = SchemaModel::from_json(SCHEMA).unwrap();
        let context = TranslationContext::default();
        let tree = actors(json!({"name_CONTAINS": name, "born_GT": born}));
        let first = translate(&schema, &tree, &context).unwrap();
        let second = translate(&schema, &tree, &context).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn values_only_travel_as_parameters(names in proptest::collection::vec("zz[a-z]{4,8}", 1..5)) {
        let schema = SchemaModel::from_json(SCHEMA).unwrap();
        let context = TranslationContext::default();
        let or: Vec<_> = names.iter().map(|name| json!({"name": name})).collect();
        let result = translate(&schema, &actors(json!({"OR": or})), &context).unwrap();

        prop_assert_eq!(result.params.len(), names.len());
        for (index, name) in names.iter().enumerate() {
            prop_assert!(!result.cypher.contains(name.as_str()));
            prop_assert_eq!(&result.params[&format!("param{index}")], &Value::from(name.as_str()));
        }
    }

    #[test]
    fn nested_and_translates_like_flat_and(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
        let schema = SchemaModel::from_json(SCHEMA).unwrap();
        let context = TranslationContext::default();
        let nested = actors(json!({"AND": [{"AND": [{"name": a}]}, {"name": b}]}));
        let flat = actors(json!({"AND": [{"name": a}, {"name": b}]}));
        prop_assert_eq!(
            translate(&schema, &nested, &context).unwrap().cypher,
            translate(&schema, &flat, &context).unwrap().cypher
        );
    }

    #[test]
    fn relationship_and_connection_quantifiers_agree(
        quantifier in prop_oneof![Just("SOME"), Just("ALL"), Just("NONE"), Just("SINGLE")],
        name in "[a-z]{1,8}",
    ) {
        let schema = SchemaModel::from_json(SCHEMA).unwrap();
        let context = TranslationContext::default();
        let movies = |key: String, filter: serde_json::Value| {
            let mut where_ = serde_json::Map::new();
            where_.insert(key, filter);
            ResolveTree::new("movies")
                .with_arg("where", serde_json::Value::Object(where_))
                .with_fields("Movie", [ResolveTree::new("title")])
        };
        let relationship = movies(format!("actors_{quantifier}"), json!({"name": name}));
        let connection = movies(format!("actorsConnection_{quantifier}"), json!({"node": {"name": name}}));
        prop_assert_eq!(
            translate(&schema, &relationship, &context).unwrap(),
            translate(&schema, &connection, &context).unwrap()
        );
    }
}
