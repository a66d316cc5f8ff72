//! Application catalog: where metric descriptors come from.
//!
//! An application owns groups, a group owns graphs, and a graph owns the
//! metrics plotted on it. [`MetricCatalog::descriptors`] flattens that tree
//! into the list the loader and poller work on.

use std::sync::Arc;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportError;
use crate::kind::MetricKind;
use crate::model::{MetricDescriptor, deserialize_id};
use crate::transport::{ApiRequest, Transport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub unit: String,
}

/// A metric as listed under a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetric {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub kind: MetricKind,
}

/// Paging and filtering for [`MetricCatalog::list_applications`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationQuery {
    pub limit: u32,
    pub offset: u32,
    pub order: String,
    pub is_asc: bool,
    pub keyword: String,
}

impl Default for ApplicationQuery {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: 0,
            order: "created_at".to_string(),
            is_asc: false,
            keyword: String::new(),
        }
    }
}

pub struct MetricCatalog {
    transport: Arc<dyn Transport>,
}

impl MetricCatalog {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Vec<Application>, TransportError> {
        let request = ApiRequest::get("applications")
            .query("limit", query.limit)
            .query("offset", query.offset)
            .query("order", &query.order)
            .query("isAsc", query.is_asc)
            .query("keyword", &query.keyword);
        self.get_list(request).await
    }

    pub async fn application(&self, id: &str) -> Result<Application, TransportError> {
        let value = self
            .transport
            .request(ApiRequest::get(format!("applications/{id}")))
            .await?;
        decode(value)
    }

    pub async fn groups(&self, app_id: &str) -> Result<Vec<Group>, TransportError> {
        self.get_list(ApiRequest::get(format!("applications/{app_id}/groups")))
            .await
    }

    pub async fn graphs(&self, group_id: &str) -> Result<Vec<Graph>, TransportError> {
        self.get_list(ApiRequest::get(format!(
            "applications/groups/{group_id}/graphs"
        )))
        .await
    }

    pub async fn graph_metrics(&self, graph_id: &str) -> Result<Vec<GraphMetric>, TransportError> {
        self.get_list(ApiRequest::get(format!(
            "applications/graphs/{graph_id}/metrics"
        )))
        .await
    }

    /// Every metric of an application, in group, graph, metric order.
    ///
    /// A metric without its own title is named after its graph.
    pub async fn descriptors(&self, app_id: &str) -> Result<Vec<MetricDescriptor>, TransportError> {
        let groups = self.groups(app_id).await?;

        let graph_lists = join_all(groups.iter().map(|g| self.graphs(&g.id))).await;
        let mut graphs = Vec::new();
        for list in graph_lists {
            graphs.extend(list?);
        }

        let metric_lists = join_all(graphs.iter().map(|g| self.graph_metrics(&g.id))).await;
        let mut descriptors = Vec::new();
        for (graph, metrics) in graphs.iter().zip(metric_lists) {
            for metric in metrics? {
                let title = if metric.title.is_empty() {
                    graph.title.clone()
                } else {
                    metric.title
                };
                descriptors.push(MetricDescriptor::new(metric.id, metric.kind, title));
            }
        }

        log::info!(
            "application {app_id}: {} groups, {} graphs, {} metrics",
            groups.len(),
            graphs.len(),
            descriptors.len()
        );
        Ok(descriptors)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Vec<T>, TransportError> {
        match self.transport.request(request).await? {
            Value::Null => Ok(Vec::new()),
            value => decode(value),
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, TransportError> {
    serde_json::from_value(value).map_err(|e| TransportError::Decode(e.to_string()))
}
