//! Catalog, schema and table browsing plus catalog management.
//!
//! Every user-supplied name passes the identifier rule before a request is
//! made. Names returned by the platform are percent-encoded into paths.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::auth::CredentialManager;
use crate::errors::AppError;
use crate::lakehouse::client::CATALOGS_PATH;
use crate::lakehouse::LakehouseClient;
use crate::query::validation::validate_identifier;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCatalog {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub catalog_type: Option<String>,
    pub description: Option<String>,
    pub properties: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub catalog_name: String,
    pub schema_count: usize,
    pub table_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableNode {
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub tables: Vec<TableNode>,
}

pub struct CatalogService {
    client: Arc<LakehouseClient>,
    credentials: CredentialManager,
}

impl CatalogService {
    pub fn new(client: Arc<LakehouseClient>, credentials: CredentialManager) -> Self {
        Self { client, credentials }
    }

    pub async fn list_catalogs(&self) -> Result<Vec<Value>, AppError> {
        let token = self.credentials.acquire_token().await?;
        let resp = self.client.get_json(&token, CATALOGS_PATH, &[]).await.map_err(|e| {
            warn!(error = %e, "failed to list catalogs");
            e
        })?;
        Ok(list_field(&resp, "catalogs"))
    }

    pub async fn get_catalog(&self, name: &str) -> Result<Value, AppError> {
        let name = validate_identifier(name, "catalog")?;
        let token = self.credentials.acquire_token().await?;
        self.client.get_json(&token, &catalog_path(name), &[]).await
    }

    pub async fn create_catalog(&self, req: CreateCatalog) -> Result<Value, AppError> {
        let (name, catalog_type) = match (req.name.as_deref(), req.catalog_type.as_deref()) {
            (Some(n), Some(t)) if !n.is_empty() && !t.is_empty() => (n, t),
            _ => return Err(AppError::Validation("Catalog name and type are required".into())),
        };
        let name = validate_identifier(name, "catalog")?;
        let token = self.credentials.acquire_token().await?;

        info!(name, catalog_type, "creating catalog");
        let body = json!({
            "name": name,
            "type": catalog_type,
            "description": req.description.unwrap_or_default(),
            "properties": req.properties.unwrap_or_default(),
        });
        let created = self.client.post_json(&token, CATALOGS_PATH, &body).await?;
        info!(name, "catalog created");
        Ok(created)
    }

    /// The patch body is forwarded untouched.
    pub async fn update_catalog(&self, name: &str, patch: &Value) -> Result<Value, AppError> {
        let name = validate_identifier(name, "catalog")?;
        let token = self.credentials.acquire_token().await?;
        info!(name, "updating catalog");
        self.client.patch_json(&token, &catalog_path(name), patch).await
    }

    pub async fn delete_catalog(&self, name: &str) -> Result<(), AppError> {
        let name = validate_identifier(name, "catalog")?;
        let token = self.credentials.acquire_token().await?;
        info!(name, "deleting catalog");
        self.client.delete(&token, &catalog_path(name)).await?;
        Ok(())
    }

    pub async fn list_schemas(&self, catalog: &str) -> Result<Vec<Value>, AppError> {
        let catalog = validate_identifier(catalog, "catalog")?;
        let token = self.credentials.acquire_token().await?;
        self.schemas(&token, catalog).await
    }

    pub async fn list_tables(&self, catalog: &str, schema: &str) -> Result<Vec<Value>, AppError> {
        let catalog = validate_identifier(catalog, "catalog")?;
        let schema = validate_identifier(schema, "schema")?;
        let token = self.credentials.acquire_token().await?;
        self.tables(&token, catalog, schema).await
    }

    pub async fn table_metadata(&self, catalog: &str, schema: &str, table: &str) -> Result<Value, AppError> {
        let catalog = validate_identifier(catalog, "catalog")?;
        let schema = validate_identifier(schema, "schema")?;
        let table = validate_identifier(table, "table")?;
        let token = self.credentials.acquire_token().await?;
        let path = format!("{}/tables/{}", schema_path(catalog, schema), table);
        self.client.get_json(&token, &path, &[]).await
    }

    /// Schema and table counts. Schemas whose tables cannot be listed are
    /// logged and counted as empty.
    pub async fn stats(&self, catalog: &str) -> Result<CatalogStats, AppError> {
        let catalog = validate_identifier(catalog, "catalog")?;
        let token = self.credentials.acquire_token().await?;
        let schemas = self.schemas(&token, catalog).await?;

        let mut table_count = 0;
        for schema in schemas.iter().filter_map(entry_name) {
            match self.tables(&token, catalog, &schema).await {
                Ok(tables) => table_count += tables.len(),
                Err(e) => warn!(catalog, schema = %schema, error = %e, "failed to list tables for schema"),
            }
        }

        Ok(CatalogStats {
            catalog_name: catalog.to_string(),
            schema_count: schemas.len(),
            table_count,
        })
    }

    pub async fn tree(&self, catalog: &str) -> Result<Vec<SchemaNode>, AppError> {
        let catalog = validate_identifier(catalog, "catalog")?;
        let token = self.credentials.acquire_token().await?;
        let schemas = self.schemas(&token, catalog).await?;

        let mut tree = Vec::with_capacity(schemas.len());
        for schema in schemas.iter().filter_map(entry_name) {
            let tables = match self.tables(&token, catalog, &schema).await {
                Ok(tables) => tables
                    .iter()
                    .filter_map(|t| {
                        entry_name(t).map(|name| TableNode {
                            name,
                            table_type: t
                                .get("type")
                                .and_then(Value::as_str)
                                .unwrap_or("TABLE")
                                .to_string(),
                        })
                    })
                    .collect(),
                Err(e) => {
                    warn!(catalog, schema = %schema, error = %e, "failed to list tables for schema");
                    Vec::new()
                }
            };
            tree.push(SchemaNode {
                name: schema,
                node_type: "schema",
                tables,
            });
        }
        Ok(tree)
    }

    async fn schemas(&self, token: &str, catalog: &str) -> Result<Vec<Value>, AppError> {
        let path = format!("{}/schemas", catalog_path(catalog));
        let resp = self.client.get_json(token, &path, &[]).await?;
        Ok(list_field(&resp, "schemas"))
    }

    async fn tables(&self, token: &str, catalog: &str, schema: &str) -> Result<Vec<Value>, AppError> {
        let path = format!("{}/tables", schema_path(catalog, schema));
        let resp = self.client.get_json(token, &path, &[]).await?;
        Ok(list_field(&resp, "tables"))
    }
}

fn catalog_path(catalog: &str) -> String {
    format!("{}/{}", CATALOGS_PATH, urlencoding::encode(catalog))
}

fn schema_path(catalog: &str, schema: &str) -> String {
    format!("{}/schemas/{}", catalog_path(catalog), urlencoding::encode(schema))
}

fn list_field(resp: &Value, key: &str) -> Vec<Value> {
    resp.get(key).and_then(Value::as_array).cloned().unwrap_or_default()
}

/// Platform listings hold either bare names or objects with a `name` field.
fn entry_name(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenSettings;
    use crate::config::LakehouseConfig;
    use crate::lakehouse::client::AUTH_PATH;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn service(server: &MockServer) -> CatalogService {
        Mock::given(method("POST"))
            .and(path(AUTH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t", "expires_in": 3600})))
            .mount(server)
            .await;

        let cfg = LakehouseConfig {
            base_url: server.uri(),
            ..LakehouseConfig::default()
        };
        let client = Arc::new(LakehouseClient::new(&cfg).unwrap());
        let creds = CredentialManager::new(client.clone(), TokenSettings::from(&cfg));
        CatalogService::new(client, creds)
    }

    fn get(route: &str, body: Value) -> Mock {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
    }

    #[tokio::test]
    async fn test_stats_skips_failing_schema() {
        let server = MockServer::start().await;
        let svc = service(&server).await;

        get(
            "/lakehouse/api/v2/catalogs/iceberg_data/schemas",
            json!({"schemas": [{"name": "a"}, "b", {"name": "broken"}]}),
        )
        .mount(&server)
        .await;
        get(
            "/lakehouse/api/v2/catalogs/iceberg_data/schemas/a/tables",
            json!({"tables": [{"name": "t1"}, {"name": "t2"}]}),
        )
        .mount(&server)
        .await;
        get("/lakehouse/api/v2/catalogs/iceberg_data/schemas/b/tables", json!({"tables": ["t3"]}))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lakehouse/api/v2/catalogs/iceberg_data/schemas/broken/tables"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let stats = svc.stats("iceberg_data").await.unwrap();
        assert_eq!(
            stats,
            CatalogStats {
                catalog_name: "iceberg_data".into(),
                schema_count: 3,
                table_count: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_tree_defaults_table_type() {
        let server = MockServer::start().await;
        let svc = service(&server).await;

        get("/lakehouse/api/v2/catalogs/c/schemas", json!({"schemas": ["s"]}))
            .mount(&server)
            .await;
        get(
            "/lakehouse/api/v2/catalogs/c/schemas/s/tables",
            json!({"tables": [{"name": "v", "type": "VIEW"}, "t"]}),
        )
        .mount(&server)
        .await;

        let tree = svc.tree("c").await.unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].node_type, "schema");
        assert_eq!(
            tree[0].tables,
            vec![
                TableNode { name: "v".into(), table_type: "VIEW".into() },
                TableNode { name: "t".into(), table_type: "TABLE".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_names_make_no_requests() {
        let server = MockServer::start().await;
        let svc = service(&server).await;

        assert!(matches!(svc.get_catalog("a/b").await, Err(AppError::Validation(_))));
        assert!(matches!(svc.table_metadata("c", "s", "t;x").await, Err(AppError::Validation(_))));
        assert!(matches!(svc.delete_catalog("").await, Err(AppError::Validation(_))));

        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests.is_empty(), "unexpected requests: {}", requests.len());
    }

    #[tokio::test]
    async fn test_create_requires_name_and_type() {
        let server = MockServer::start().await;
        let svc = service(&server).await;

        let err = svc
            .create_catalog(CreateCatalog {
                name: Some("sales".into()),
                ..CreateCatalog::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Catalog name and type are required");
    }

    #[tokio::test]
    async fn test_create_fills_defaults() {
        let server = MockServer::start().await;
        let svc = service(&server).await;

        Mock::given(method("POST"))
            .and(path(CATALOGS_PATH))
            .and(body_json(json!({
                "name": "sales",
                "type": "iceberg",
                "description": "",
                "properties": {},
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"name": "sales"})))
            .expect(1)
            .mount(&server)
            .await;

        let created = svc
            .create_catalog(CreateCatalog {
                name: Some("sales".into()),
                catalog_type: Some("iceberg".into()),
                ..CreateCatalog::default()
            })
            .await
            .unwrap();
        assert_eq!(created["name"], "sales");
    }
}
