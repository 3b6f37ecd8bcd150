//! Database operations unit tests

#[cfg(test)]
mod tests {
    use crate::core::tool::{ParamDescriptor, ToolDescriptor, ToolSource};
    use crate::db::{queries, Database, DbError};
    use serde_json::json;

    fn tool(name: &str, source: ToolSource) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            origin_name: name.to_string(),
            description: format!("{name} description"),
            source,
            params: vec![],
            inputs: "{}".to_string(),
            output_type: "string".to_string(),
            class_name: name.to_string(),
            usage: None,
            category: None,
        }
    }

    #[test]
    fn test_upsert_catalog_is_idempotent() {
        let db = Database::open_in_memory().expect("in-memory DB");
        let tools = vec![
            tool("read_file", ToolSource::Local),
            tool("word_count", ToolSource::Langchain),
        ];

        queries::upsert_catalog(&db, "t1", "u1", &tools).unwrap();
        let first = queries::query_all_tools(&db, "t1").unwrap();
        queries::upsert_catalog(&db, "t1", "u1", &tools).unwrap();
        let second = queries::query_all_tools(&db, "t1").unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        let ids = |rows: &[queries::ToolInfoRow]| {
            rows.iter()
                .map(|r| (r.tool_id, r.name.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(first.as_slice()), ids(second.as_slice()));
        assert!(second.iter().all(|r| r.is_available));
    }

    #[test]
    fn test_upsert_catalog_retires_missing_tools_and_revives_them() {
        let db = Database::open_in_memory().expect("in-memory DB");
        let a = tool("a", ToolSource::Local);
        let b = tool("b", ToolSource::Local);

        queries::upsert_catalog(&db, "t1", "u1", &[a.clone(), b.clone()]).unwrap();
        let original_b = queries::query_all_tools(&db, "t1").unwrap()[1].tool_id;

        queries::upsert_catalog(&db, "t1", "u1", &[a.clone()]).unwrap();
        let rows = queries::query_all_tools(&db, "t1").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_available);
        assert!(!rows[1].is_available);
        assert_eq!(queries::count_available_tools(&db, "t1").unwrap(), 1);

        queries::upsert_catalog(&db, "t1", "u1", &[a, b]).unwrap();
        let rows = queries::query_all_tools(&db, "t1").unwrap();
        assert!(rows[1].is_available);
        assert_eq!(rows[1].tool_id, original_b);
    }

    #[test]
    fn test_upsert_catalog_refreshes_metadata_in_place() {
        let db = Database::open_in_memory().expect("in-memory DB");
        let mut t = tool("search", ToolSource::Mcp);
        t.usage = Some("srv".into());
        queries::upsert_catalog(&db, "t1", "u1", &[t.clone()]).unwrap();

        t.description = "new description".into();
        t.inputs = r#"{"q":{"type":"string","description":"query"}}"#.into();
        queries::upsert_catalog(&db, "t1", "u2", &[t.clone()]).unwrap();

        let rows = queries::query_all_tools(&db, "t1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "new description");
        assert_eq!(rows[0].created_by.as_deref(), Some("u1"));
        assert_eq!(rows[0].descriptor().unwrap(), t);
    }

    #[test]
    fn test_upsert_catalog_keeps_first_duplicate_and_separates_sources() {
        let db = Database::open_in_memory().expect("in-memory DB");
        let mut dup = tool("echo", ToolSource::Mcp);
        dup.description = "second".into();
        let written = queries::upsert_catalog(
            &db,
            "t1",
            "u1",
            &[
                tool("echo", ToolSource::Mcp),
                dup,
                tool("echo", ToolSource::Local),
            ],
        )
        .unwrap();

        assert_eq!(written, 2);
        let rows = queries::query_all_tools(&db, "t1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].description, "echo description");
    }

    #[test]
    fn test_catalog_is_tenant_scoped() {
        let db = Database::open_in_memory().expect("in-memory DB");
        queries::upsert_catalog(&db, "t1", "u1", &[tool("a", ToolSource::Local)]).unwrap();
        queries::upsert_catalog(&db, "t2", "u1", &[tool("b", ToolSource::Local)]).unwrap();
        queries::upsert_catalog(&db, "t1", "u1", &[]).unwrap();

        assert_eq!(queries::count_available_tools(&db, "t1").unwrap(), 0);
        assert_eq!(queries::count_available_tools(&db, "t2").unwrap(), 1);
    }

    #[test]
    fn test_params_survive_storage() {
        let db = Database::open_in_memory().expect("in-memory DB");
        let mut t = tool("create_file", ToolSource::Local);
        t.params = vec![
            ParamDescriptor {
                name: "init_path".into(),
                param_type: "string".into(),
                description: "Initial workspace path".into(),
                optional: true,
                default: Some(json!("/mnt/nexent")),
            },
            ParamDescriptor {
                name: "proxy".into(),
                param_type: "string".into(),
                description: "Optional proxy".into(),
                optional: true,
                default: Some(json!(null)),
            },
        ];
        queries::upsert_catalog(&db, "t1", "u1", &[t.clone()]).unwrap();

        let rows = queries::query_all_tools(&db, "t1").unwrap();
        let row = &rows[0];
        assert_eq!(row.params().unwrap(), t.params);
        let fetched = queries::get_tool_info(&db, row.tool_id, "t1").unwrap();
        assert!(fetched.is_some());
        assert!(queries::get_tool_info(&db, row.tool_id, "t2").unwrap().is_none());
    }

    #[test]
    fn test_tool_instance_upsert_updates_in_place() {
        let db = Database::open_in_memory().expect("in-memory DB");
        queries::upsert_catalog(&db, "t1", "u1", &[tool("a", ToolSource::Local)]).unwrap();
        let tool_id = queries::query_all_tools(&db, "t1").unwrap()[0].tool_id;

        let first = queries::upsert_tool_instance(
            &db,
            &queries::ToolInstanceUpsert {
                tool_id,
                agent_id: 7,
                params: json!({"init_path": "/tmp"}),
                enabled: true,
            },
            "t1",
            "u1",
        )
        .unwrap();
        let second = queries::upsert_tool_instance(
            &db,
            &queries::ToolInstanceUpsert {
                tool_id,
                agent_id: 7,
                params: json!({"init_path": "/srv"}),
                enabled: false,
            },
            "t1",
            "u1",
        )
        .unwrap();

        assert_eq!(first.tool_instance_id, second.tool_instance_id);
        assert!(!second.enabled);
        assert_eq!(second.params().unwrap(), json!({"init_path": "/srv"}));

        let found = queries::query_tool_instance(&db, 7, tool_id, "t1").unwrap();
        assert_eq!(found.map(|i| i.tool_instance_id), Some(first.tool_instance_id));
        assert!(queries::query_tool_instance(&db, 8, tool_id, "t1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_last_tool_instance_picks_latest_update() {
        let db = Database::open_in_memory().expect("in-memory DB");
        queries::upsert_catalog(&db, "t1", "u1", &[tool("a", ToolSource::Local)]).unwrap();
        let tool_id = queries::query_all_tools(&db, "t1").unwrap()[0].tool_id;

        for (agent_id, path) in [(1, "/one"), (2, "/two")] {
            queries::upsert_tool_instance(
                &db,
                &queries::ToolInstanceUpsert {
                    tool_id,
                    agent_id,
                    params: json!({ "init_path": path }),
                    enabled: true,
                },
                "t1",
                "u1",
            )
            .unwrap();
        }

        let last = queries::query_last_tool_instance(&db, tool_id, "t1", "u1")
            .unwrap()
            .expect("instance");
        assert_eq!(last.agent_id, 2);
        assert!(queries::query_last_tool_instance(&db, tool_id, "t1", "other")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_instances_survive_tool_retirement() {
        let db = Database::open_in_memory().expect("in-memory DB");
        queries::upsert_catalog(&db, "t1", "u1", &[tool("a", ToolSource::Local)]).unwrap();
        let tool_id = queries::query_all_tools(&db, "t1").unwrap()[0].tool_id;
        queries::upsert_tool_instance(
            &db,
            &queries::ToolInstanceUpsert {
                tool_id,
                agent_id: 1,
                params: json!({}),
                enabled: true,
            },
            "t1",
            "u1",
        )
        .unwrap();

        queries::upsert_catalog(&db, "t1", "u1", &[]).unwrap();

        assert!(queries::query_tool_instance(&db, 1, tool_id, "t1")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_mcp_records_and_status() {
        let db = Database::open_in_memory().expect("in-memory DB");
        queries::upsert_mcp_record(&db, "t1", "u1", "srv", "http://a/sse", false).unwrap();
        queries::upsert_mcp_record(&db, "t1", "u1", "srv", "http://b/sse", true).unwrap();
        queries::upsert_mcp_record(&db, "t2", "u1", "other", "http://c/sse", true).unwrap();

        let records = queries::get_mcp_records_by_tenant(&db, "t1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mcp_server, "http://b/sse");
        assert!(records[0].status);

        queries::update_mcp_record_status(&db, "t1", "srv", false).unwrap();
        assert!(!queries::get_mcp_records_by_tenant(&db, "t1").unwrap()[0].status);

        assert_eq!(
            queries::get_mcp_server_by_name_and_tenant(&db, "srv", "t1").unwrap(),
            Some("http://b/sse".to_string())
        );
        assert_eq!(
            queries::get_mcp_server_by_name_and_tenant(&db, "srv", "t2").unwrap(),
            None
        );

        let missing = queries::update_mcp_record_status(&db, "t1", "nope", true);
        assert!(matches!(missing, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_tenant_enumeration_preserves_registration_order() {
        let db = Database::open_in_memory().expect("in-memory DB");
        for tenant in ["beta", "alpha", "beta", "gamma"] {
            queries::insert_tenant(&db, tenant).unwrap();
        }
        assert_eq!(
            queries::list_all_tenant_ids(&db).unwrap(),
            vec!["beta", "alpha", "gamma"]
        );
    }
}
