//! REST 客户端封装
//!
//! 下游服务以 JSON:API 文档返回资源：`{"data": {"type", "id", "attributes"}}`，
//! 集合接口的 `data` 为数组。此模块统一处理租户请求头、状态码映射和文档解码。

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::NpcError;
use crate::tenant::{HEADER_MAJOR_VERSION, HEADER_MINOR_VERSION, HEADER_REGION, HEADER_TENANT_ID, Tenant};

/// JSON:API 资源对象
#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    #[serde(default)]
    pub id: String,
    pub attributes: A,
}

#[derive(Debug, Deserialize)]
struct Document<D> {
    data: D,
}

/// 单个下游服务的 REST 客户端
#[derive(Clone)]
pub struct RestClient {
    service: String,
    base_url: String,
    client: reqwest::Client,
}

impl RestClient {
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NpcError> {
        let service = service.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NpcError::Internal(format!("创建 HTTP 客户端失败: {e}")))?;

        Ok(Self {
            service,
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 获取单个资源
    pub async fn get_one<A: DeserializeOwned>(
        &self,
        tenant: &Tenant,
        path: &str,
    ) -> Result<Resource<A>, NpcError> {
        let document: Document<Resource<A>> = self.get_document(tenant, path).await?;
        Ok(document.data)
    }

    /// 获取资源集合
    pub async fn get_many<A: DeserializeOwned>(
        &self,
        tenant: &Tenant,
        path: &str,
    ) -> Result<Vec<Resource<A>>, NpcError> {
        let document: Document<Vec<Resource<A>>> = self.get_document(tenant, path).await?;
        Ok(document.data)
    }

    async fn get_document<D: DeserializeOwned>(
        &self,
        tenant: &Tenant,
        path: &str,
    ) -> Result<D, NpcError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(service = %self.service, %url, "发起 REST 请求");

        let response = self
            .client
            .get(&url)
            .header(HEADER_TENANT_ID, tenant.id.to_string())
            .header(HEADER_REGION, &tenant.region)
            .header(HEADER_MAJOR_VERSION, tenant.major_version.to_string())
            .header(HEADER_MINOR_VERSION, tenant.minor_version.to_string())
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(NpcError::not_found(self.service.clone(), path)),
            status if !status.is_success() => Err(NpcError::ExternalService {
                service: self.service.clone(),
                message: format!("{url} 返回状态码 {status}"),
            }),
            _ => response
                .json::<D>()
                .await
                .map_err(|e| NpcError::ExternalService {
                    service: self.service.clone(),
                    message: format!("响应解码失败: {e}"),
                }),
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> NpcError {
        if err.is_timeout() {
            NpcError::ExternalServiceTimeout {
                service: self.service.clone(),
            }
        } else {
            NpcError::ExternalService {
                service: self.service.clone(),
                message: err.to_string(),
            }
        }
    }
}
