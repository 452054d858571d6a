//! 租户上下文
//!
//! 所有缓存、在店登记和商品数据都按租户隔离。租户信息通过消息头和 REST 请求头
//! 在服务之间传递。

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NpcError;

pub const HEADER_TENANT_ID: &str = "TENANT_ID";
pub const HEADER_REGION: &str = "REGION";
pub const HEADER_MAJOR_VERSION: &str = "MAJOR_VERSION";
pub const HEADER_MINOR_VERSION: &str = "MINOR_VERSION";

/// 租户（一个独立的游戏世界实例）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub region: String,
    pub major_version: u16,
    pub minor_version: u16,
}

impl Tenant {
    pub fn new(id: Uuid, region: impl Into<String>, major_version: u16, minor_version: u16) -> Self {
        Self {
            id,
            region: region.into(),
            major_version,
            minor_version,
        }
    }

    /// 从消息头解析租户，缺少任何一项都视为无效
    pub fn from_headers(headers: &HashMap<String, String>) -> Result<Self, NpcError> {
        let get = |name: &str| {
            headers
                .get(name)
                .ok_or_else(|| NpcError::InvalidTenant(format!("缺少消息头 {name}")))
        };

        let id = Uuid::parse_str(get(HEADER_TENANT_ID)?)
            .map_err(|e| NpcError::InvalidTenant(format!("租户 ID 无效: {e}")))?;
        let region = get(HEADER_REGION)?.clone();
        let major_version = get(HEADER_MAJOR_VERSION)?
            .parse()
            .map_err(|e| NpcError::InvalidTenant(format!("主版本号无效: {e}")))?;
        let minor_version = get(HEADER_MINOR_VERSION)?
            .parse()
            .map_err(|e| NpcError::InvalidTenant(format!("次版本号无效: {e}")))?;

        Ok(Self {
            id,
            region,
            major_version,
            minor_version,
        })
    }

    /// 生成出站消息头
    pub fn to_headers(&self) -> HashMap<String, String> {
        HashMap::from([
            (HEADER_TENANT_ID.to_string(), self.id.to_string()),
            (HEADER_REGION.to_string(), self.region.clone()),
            (HEADER_MAJOR_VERSION.to_string(), self.major_version.to_string()),
            (HEADER_MINOR_VERSION.to_string(), self.minor_version.to_string()),
        ])
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} v{}.{})",
            self.id, self.region, self.major_version, self.minor_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_round_trip() {
        let tenant = Tenant::new(Uuid::new_v4(), "GMS", 83, 1);
        let parsed = Tenant::from_headers(&tenant.to_headers()).unwrap();
        assert_eq!(parsed, tenant);
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let mut headers = Tenant::new(Uuid::new_v4(), "GMS", 83, 1).to_headers();
        headers.remove(HEADER_REGION);

        let err = Tenant::from_headers(&headers).unwrap_err();
        assert_eq!(err.code(), "INVALID_TENANT");
    }

    #[test]
    fn test_invalid_tenant_id_is_rejected() {
        let mut headers = Tenant::new(Uuid::new_v4(), "GMS", 83, 1).to_headers();
        headers.insert(HEADER_TENANT_ID.to_string(), "not-a-uuid".to_string());

        assert!(Tenant::from_headers(&headers).is_err());
    }
}
