//! DynamoDB store backend.
//!
//! One table, composite `PK`/`SK` primary key, three status-scoped global
//! secondary indexes (see [`crate::schema`]). Queries always go through the
//! index matching the requested resolution; items that fail to decode are
//! skipped with a warning rather than failing the whole scan.

use crate::error::{Result, StoreError};
use crate::row::DriverRow;
use crate::schema::*;
use crate::store::{BatchBackend, LocationStore};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, GlobalSecondaryIndex, KeySchemaElement,
    KeyType, Projection, ProjectionType, PutRequest, ScalarAttributeType, TableStatus,
    WriteRequest,
};
use aws_sdk_dynamodb::Client;
use aws_smithy_types::timeout::TimeoutConfig;
use hail_core::{DriverStatus, unix_now};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

type Item = HashMap<String, AttributeValue>;

/// DynamoDB connection settings.
#[derive(Debug, Clone)]
pub struct DynamoConfig {
    pub table_name: String,
    /// AWS region; SDK default when empty.
    pub region: Option<String>,
    /// Endpoint override (e.g. a local DynamoDB).
    pub endpoint: Option<String>,
    /// Static credentials; ambient SDK credentials when absent.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Per-operation timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        DynamoConfig {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            timeout_ms: None,
        }
    }
}

/// DynamoDB-backed [`LocationStore`] and [`BatchBackend`].
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoStore {
    /// Build a client from SDK defaults plus the config overrides.
    pub async fn connect(config: DynamoConfig) -> Result<Self> {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        if let Some(region) = config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region));
        }
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if let (Some(access), Some(secret)) = (config.access_key, config.secret_key) {
            builder = builder.credentials_provider(aws_credential_types::Credentials::new(
                access, secret, None, None, "hail-config",
            ));
        }
        if let Some(timeout_ms) = config.timeout_ms {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_millis(timeout_ms))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        Ok(DynamoStore {
            client: Client::from_conf(builder.build()),
            table_name: config.table_name,
        })
    }

    /// Create from a pre-built client (for testing against local endpoints).
    pub fn from_client(client: Client, table_name: String) -> Self {
        DynamoStore { client, table_name }
    }

    /// Create the table with its three GSIs if it does not exist, then wait
    /// for it to become ACTIVE.
    pub async fn ensure_table(&self) -> Result<()> {
        match self
            .client
            .describe_table()
            .table_name(&self.table_name)
            .send()
            .await
        {
            Ok(_) => {
                info!(table = %self.table_name, "table already exists");
                return Ok(());
            }
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_resource_not_found_exception())
                    .unwrap_or(false);
                if !not_found {
                    return Err(StoreError::Bootstrap(format!(
                        "DescribeTable failed: {err}"
                    )));
                }
            }
        }

        info!(table = %self.table_name, "creating driver location table");
        self.create_table().await?;
        self.wait_for_active().await
    }

    async fn create_table(&self) -> Result<()> {
        let string_attr = |name: &str| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .expect("valid AttributeDefinition")
        };
        let key = |name: &str, key_type: KeyType| {
            KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(key_type)
                .build()
                .expect("valid KeySchemaElement")
        };
        let all_attrs = Projection::builder()
            .projection_type(ProjectionType::All)
            .build();

        let gsi1 = GlobalSecondaryIndex::builder()
            .index_name(STATUS_H3_INDEX)
            .key_schema(key(ATTR_GSI1PK, KeyType::Hash))
            .key_schema(key(ATTR_GSI1SK, KeyType::Range))
            .projection(all_attrs.clone())
            .build()
            .expect("valid GlobalSecondaryIndex");
        let gsi2 = GlobalSecondaryIndex::builder()
            .index_name(STATUS_H3_RES8_INDEX)
            .key_schema(key(ATTR_GSI2PK, KeyType::Hash))
            .projection(all_attrs.clone())
            .build()
            .expect("valid GlobalSecondaryIndex");
        let gsi3 = GlobalSecondaryIndex::builder()
            .index_name(STATUS_H3_RES7_INDEX)
            .key_schema(key(ATTR_GSI3PK, KeyType::Hash))
            .projection(all_attrs)
            .build()
            .expect("valid GlobalSecondaryIndex");

        self.client
            .create_table()
            .table_name(&self.table_name)
            .attribute_definitions(string_attr(ATTR_PK))
            .attribute_definitions(string_attr(ATTR_SK))
            .attribute_definitions(string_attr(ATTR_GSI1PK))
            .attribute_definitions(string_attr(ATTR_GSI1SK))
            .attribute_definitions(string_attr(ATTR_GSI2PK))
            .attribute_definitions(string_attr(ATTR_GSI3PK))
            .key_schema(key(ATTR_PK, KeyType::Hash))
            .key_schema(key(ATTR_SK, KeyType::Range))
            .global_secondary_indexes(gsi1)
            .global_secondary_indexes(gsi2)
            .global_secondary_indexes(gsi3)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| StoreError::Bootstrap(format!("CreateTable failed: {e}")))?;

        Ok(())
    }

    async fn wait_for_active(&self) -> Result<()> {
        for _ in 0..30 {
            let resp = self
                .client
                .describe_table()
                .table_name(&self.table_name)
                .send()
                .await;
            if let Ok(resp) = resp {
                if resp.table().and_then(|t| t.table_status())
                    == Some(&TableStatus::Active)
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        Err(StoreError::Bootstrap(
            "table did not become active in time".to_string(),
        ))
    }

    fn row_to_item(row: &DriverRow) -> Item {
        let s = |v: &str| AttributeValue::S(v.to_string());
        let n = |v: i64| AttributeValue::N(v.to_string());
        HashMap::from([
            (ATTR_PK.to_string(), s(&row.pk)),
            (ATTR_SK.to_string(), s(&row.sk)),
            (ATTR_GSI1PK.to_string(), s(&row.gsi1pk)),
            (ATTR_GSI1SK.to_string(), s(&row.gsi1sk)),
            (ATTR_GSI2PK.to_string(), s(&row.gsi2pk)),
            (ATTR_GSI3PK.to_string(), s(&row.gsi3pk)),
            (ATTR_DRIVER_ID.to_string(), s(&row.driver_id)),
            (ATTR_LOCATION.to_string(), s(&row.location)),
            (ATTR_H3_RES9.to_string(), s(&row.h3_res9)),
            (ATTR_H3_RES8.to_string(), s(&row.h3_res8)),
            (ATTR_H3_RES7.to_string(), s(&row.h3_res7)),
            (ATTR_VEHICLE_TYPE.to_string(), s(&row.vehicle_type)),
            (ATTR_STATUS.to_string(), s(row.status.as_str())),
            (ATTR_UPDATED_AT.to_string(), n(row.updated_at)),
            (ATTR_EXPIRES_AT.to_string(), n(row.expires_at)),
        ])
    }

    fn item_str(item: &Item, attr: &str) -> Option<String> {
        item.get(attr).and_then(|v| v.as_s().ok()).cloned()
    }

    fn item_num(item: &Item, attr: &str) -> Option<i64> {
        item.get(attr)
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok())
    }

    /// Decode one item; `None` (with a warning) for malformed rows.
    fn item_to_row(item: &Item) -> Option<DriverRow> {
        let status_str = Self::item_str(item, ATTR_STATUS)?;
        let Some(status) = DriverStatus::parse(&status_str) else {
            warn!(status = %status_str, "skipping row with unknown status");
            return None;
        };
        let row = DriverRow {
            pk: Self::item_str(item, ATTR_PK)?,
            sk: Self::item_str(item, ATTR_SK)?,
            gsi1pk: Self::item_str(item, ATTR_GSI1PK)?,
            gsi1sk: Self::item_str(item, ATTR_GSI1SK)?,
            gsi2pk: Self::item_str(item, ATTR_GSI2PK)?,
            gsi3pk: Self::item_str(item, ATTR_GSI3PK)?,
            driver_id: Self::item_str(item, ATTR_DRIVER_ID)?,
            location: Self::item_str(item, ATTR_LOCATION)?,
            h3_res9: Self::item_str(item, ATTR_H3_RES9)?,
            h3_res8: Self::item_str(item, ATTR_H3_RES8)?,
            h3_res7: Self::item_str(item, ATTR_H3_RES7)?,
            vehicle_type: Self::item_str(item, ATTR_VEHICLE_TYPE)?,
            status,
            updated_at: Self::item_num(item, ATTR_UPDATED_AT)?,
            expires_at: Self::item_num(item, ATTR_EXPIRES_AT)?,
        };
        if row.coordinates().is_err() {
            warn!(location = %row.location, "skipping row with bad location");
            return None;
        }
        Some(row)
    }
}

#[async_trait]
impl LocationStore for DynamoStore {
    async fn upsert(&self, row: &DriverRow) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::row_to_item(row)))
            .send()
            .await
            .map_err(|e| StoreError::Write(format!("PutItem failed: {e}")))?;
        Ok(())
    }

    async fn query_cell(
        &self,
        res: u8,
        prefix: &str,
        status: DriverStatus,
    ) -> Result<Vec<DriverRow>> {
        let (index_name, key_attr) = index_for_resolution(res)
            .ok_or_else(|| StoreError::Query(format!("unindexed resolution: {res}")))?;
        let key = crate::row::status_cell_key(status, res, prefix);

        let mut rows = Vec::new();
        let mut last_key = None;
        loop {
            let mut query = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index_name)
                .key_condition_expression("#pk = :pk")
                .expression_attribute_names("#pk", key_attr)
                .expression_attribute_values(":pk", AttributeValue::S(key.clone()));

            if let Some(k) = last_key.take() {
                query = query.set_exclusive_start_key(Some(k));
            }

            let response = query
                .send()
                .await
                .map_err(|e| StoreError::Query(format!("Query on {index_name} failed: {e}")))?;

            let now = unix_now();
            rows.extend(
                response
                    .items()
                    .iter()
                    .filter_map(Self::item_to_row)
                    // The TTL sweep lags; treat expired rows as invisible.
                    .filter(|row| row.expires_at > now),
            );

            match response.last_evaluated_key() {
                Some(k) if !k.is_empty() => last_key = Some(k.clone()),
                _ => break,
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl BatchBackend for DynamoStore {
    async fn write_batch(&self, rows: Vec<DriverRow>) -> Result<Vec<DriverRow>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // Index by key pair so unprocessed responses map back to rows.
        let mut by_key: HashMap<(String, String), DriverRow> = rows
            .iter()
            .map(|r| ((r.pk.clone(), r.sk.clone()), r.clone()))
            .collect();

        let requests: Vec<WriteRequest> = rows
            .iter()
            .map(|row| {
                WriteRequest::builder()
                    .put_request(
                        PutRequest::builder()
                            .set_item(Some(Self::row_to_item(row)))
                            .build()
                            .expect("valid PutRequest"),
                    )
                    .build()
            })
            .collect();

        let response = self
            .client
            .batch_write_item()
            .request_items(&self.table_name, requests)
            .send()
            .await
            .map_err(|e| StoreError::Write(format!("BatchWriteItem failed: {e}")))?;

        let mut unprocessed = Vec::new();
        if let Some(pending) = response
            .unprocessed_items()
            .and_then(|m| m.get(&self.table_name))
        {
            for request in pending {
                let item = request.put_request().map(|p| p.item());
                let key = item.and_then(|i| {
                    Some((
                        Self::item_str(i, ATTR_PK)?,
                        Self::item_str(i, ATTR_SK)?,
                    ))
                });
                if let Some(row) = key.and_then(|k| by_key.remove(&k)) {
                    unprocessed.push(row);
                }
            }
        }
        Ok(unprocessed)
    }
}
