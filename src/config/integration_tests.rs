// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod integration_tests {
    use serde_json::json;
    use std::io::Write;
    use std::sync::Arc;

    use crate::cep::ExpressionResult;
    use crate::config::{
        load_and_validate_config, load_config, FunctionRegistry, PipelineRegistry,
    };
    use crate::connectors::{MemoryEventStore, MemoryPublisher};
    use crate::engine::Handler;
    use crate::errors::{ConfigError, ValidationError};
    use crate::model::{ChangeImages, Discriminator, DomainEvent, UnitOfWork};
    use crate::traits::Connectors;

    fn thing_functions() -> FunctionRegistry {
        let mut functions = FunctionRegistry::new();
        functions
            .register_expression("created-then-updated", |uow, _rule| {
                let types: Vec<&str> =
                    uow.correlated.iter().map(|e| e.event_type.as_str()).collect();
                Ok(ExpressionResult::from(types == ["thing-created", "thing-updated"]))
            })
            .register_type_predicate("is-thing", |t| t.starts_with("thing-"))
            .register_emit("audit", |_uow, _rule, event| event.with_tag("audited", "true"));
        functions
    }

    fn memory_connectors() -> (Connectors, Arc<MemoryEventStore>, Arc<MemoryPublisher>) {
        let store = Arc::new(MemoryEventStore::new("events"));
        let publisher = Arc::new(MemoryPublisher::new("bus"));
        let connectors = Connectors {
            event_store: store.clone(),
            publisher: publisher.clone(),
            claim_check: None,
        };
        (connectors, store, publisher)
    }

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn stream_insert(row: serde_json::Value) -> UnitOfWork {
        let notification = DomainEvent {
            raw: Some(ChangeImages::inserted(row)),
            ..DomainEvent::new("stream", "aws:dynamodb", 0)
        };
        UnitOfWork::new(json!({}), notification)
    }

    /// Test that the YAML fixture loads with every section applied
    #[test]
    fn test_yaml_fixture_loading() {
        let config =
            load_and_validate_config("configs/thing-listener.yaml", &thing_functions()).unwrap();

        assert_eq!(config.function_name, "thing-listener");
        assert_eq!(config.source, "thing-service");
        assert_eq!(config.parallel, 2);
        assert_eq!(config.ttl_days, 7);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.batch.batch_size, 5);
        assert_eq!(config.faults.max_fault_size, 65536);
        let ids: Vec<&str> = config.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["thing-collected", "thing-correlated", "thing-paired", "thing-expired"]
        );
    }

    /// Test that the TOML fixture loads and its enabled list limits the pipelines
    #[test]
    fn test_toml_fixture_and_enabled_pipelines() {
        let functions = thing_functions();
        let config = load_and_validate_config("configs/thing-listener.toml", &functions).unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.rules[0].ttl, Some(30));

        let (connectors, _, _) = memory_connectors();
        let registry = PipelineRegistry::from_config(&config, &functions, connectors).unwrap();
        assert_eq!(registry.ids(), vec!["thing-collected"]);
    }

    /// Test that unresolved functions are reported through the loader
    #[test]
    fn test_unresolved_function_fails_validation() {
        let err = load_and_validate_config("configs/thing-listener.yaml", &FunctionRegistry::new())
            .unwrap_err();
        let ConfigError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ValidationError::UnresolvedFunction {
            rule_id: "thing-paired".into(),
            field: "expression".into(),
            function: "created-then-updated".into(),
        }));
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let file = write_temp(".yaml", "rules: [ { id: a, flavor: teleport, event_type: x } ]");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let file = write_temp(".toml", "rules = 7");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn test_handler_rejects_invalid_config() {
        let file = write_temp(
            ".yaml",
            r#"
pipelines: [ghost]
rules:
  - { id: a, flavor: correlate, event_type: x }
"#,
        );
        let config = load_config(file.path()).unwrap();
        let (connectors, _, _) = memory_connectors();

        let err = Handler::from_config(&config, &FunctionRegistry::new(), connectors).unwrap_err();
        let ConfigError::Invalid(errors) = err else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2);
    }

    /// Drive the YAML listener through collect, correlate and evaluate by
    /// feeding each invocation's table writes back in as stream inserts.
    #[tokio::test]
    async fn test_config_built_listener_end_to_end() {
        let functions = thing_functions();
        let config = load_and_validate_config("configs/thing-listener.yaml", &functions).unwrap();
        let (connectors, store, publisher) = memory_connectors();
        let handler = Handler::from_config(&config, &functions, connectors).unwrap();
        assert_eq!(handler.registry().len(), 4);

        let created = DomainEvent::new("1", "thing-created", 1_000)
            .with_field("thing", json!({ "id": "11" }));
        let updated = DomainEvent::new("2", "thing-updated", 2_000)
            .with_field("thing", json!({ "id": "11" }));
        let report = handler
            .handle(vec![
                UnitOfWork::new(json!({}), created),
                UnitOfWork::new(json!({}), updated),
            ])
            .await
            .unwrap();
        assert_eq!(report.faults().count(), 0);
        assert_eq!(store.len(), 2);

        let event_rows: Vec<UnitOfWork> = store
            .records()
            .into_iter()
            .map(|r| stream_insert(serde_json::to_value(r).unwrap()))
            .collect();
        handler.handle(event_rows).await.unwrap();

        let pointer = store.get("11.things", "2").unwrap();
        assert_eq!(pointer.discriminator, Discriminator::Correlation);
        assert_eq!(pointer.ttl, 2 + 7 * 86_400);
        assert!(publisher.published().is_empty());

        handler
            .handle(vec![stream_insert(serde_json::to_value(pointer).unwrap())])
            .await
            .unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].source, "thing-service");
        assert_eq!(published[0].detail_type, "thing-paired");
        assert_eq!(published[0].id, "2.thing-paired");
        assert_eq!(published[0].partition_key.as_deref(), Some("11"));
    }
}
