#[cfg(feature = "cli")]
pub mod cli;
pub mod client;

pub use client::ClientConfig;

use crate::utils::error::ConfigError;
use crate::utils::validation::{
    validate_bucket_name, validate_non_empty_string, validate_region, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub search: Option<SearchConfig>,
    pub object: Option<ObjectStoreConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    /// COS 的 APPID，會接在 bucket 名稱之後
    pub app_id: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: Option<bool>,
}

impl SearchConfig {
    pub fn new<S: Into<String>>(urls: impl IntoIterator<Item = S>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            client: ClientConfig::default(),
        }
    }
}

impl ObjectStoreConfig {
    /// 從環境變數載入物件儲存設定
    pub fn from_env() -> Result<Self> {
        let optional = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());

        Ok(Self {
            bucket: env::var("OBJECT_STORE_BUCKET").map_err(|_| ConfigError::MissingConfig {
                field: "OBJECT_STORE_BUCKET".to_string(),
            })?,
            app_id: optional("OBJECT_STORE_APPID"),
            region: optional("OBJECT_STORE_REGION"),
            endpoint: optional("OBJECT_STORE_ENDPOINT"),
            access_key_id: optional("OBJECT_STORE_ACCESS_KEY_ID"),
            secret_access_key: optional("OBJECT_STORE_SECRET_ACCESS_KEY"),
            force_path_style: optional("OBJECT_STORE_FORCE_PATH_STYLE")
                .map(|v| v == "true" || v == "1"),
        })
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or("ap-beijing")
    }

    /// Bucket as addressed on the wire: `<bucket>-<appid>` for COS.
    pub fn bucket_name(&self) -> String {
        match &self.app_id {
            Some(app_id) => format!("{}-{}", self.bucket, app_id),
            None => self.bucket.clone(),
        }
    }

    /// Explicit endpoint, or the COS regional endpoint when an APPID is set.
    pub fn endpoint(&self) -> Option<String> {
        match (&self.endpoint, &self.app_id) {
            (Some(endpoint), _) => Some(endpoint.clone()),
            (None, Some(_)) => Some(format!("https://cos.{}.myqcloud.com", self.region())),
            (None, None) => None,
        }
    }

    pub fn force_path_style(&self) -> bool {
        self.force_path_style.unwrap_or(false)
    }
}

impl StoreConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ConfigError::ConfigValidation {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// 替換環境變數 (例如 ${ES_URL})；未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ConfigValidation {
        field: "env_substitution".to_string(),
        message: e.to_string(),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

impl Validate for SearchConfig {
    fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(ConfigError::MissingConfig {
                field: "search.urls".to_string(),
            });
        }
        for url in &self.urls {
            validate_url("search.urls", url)?;
        }
        self.client.validate()
    }
}

impl Validate for ObjectStoreConfig {
    fn validate(&self) -> Result<()> {
        validate_bucket_name("object.bucket", &self.bucket_name())?;
        validate_region("object.region", self.region())?;
        if let Some(endpoint) = &self.endpoint {
            validate_url("object.endpoint", endpoint)?;
        }
        if let Some(id) = &self.access_key_id {
            validate_non_empty_string("object.access_key_id", id)?;
            if self.secret_access_key.is_none() {
                return Err(ConfigError::MissingConfig {
                    field: "object.secret_access_key".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> Result<()> {
        if self.search.is_none() && self.object.is_none() {
            return Err(ConfigError::ConfigValidation {
                field: "store".to_string(),
                message: "at least one of [search] or [object] must be configured".to_string(),
            });
        }
        if let Some(search) = &self.search {
            search.validate()?;
        }
        if let Some(object) = &self.object {
            object.validate()?;
        }
        tracing::debug!("store configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_store_config() {
        let toml_content = r#"
[search]
urls = ["http://localhost:9200", "http://localhost:9201"]

[search.client]
request_timeout_secs = 30

[object]
bucket = "user-data"
app_id = "1250000000"
region = "ap-guangzhou"
"#;

        let config = StoreConfig::from_toml_str(toml_content).unwrap();
        let search = config.search.as_ref().unwrap();
        assert_eq!(search.urls.len(), 2);
        assert_eq!(search.client.request_timeout().as_secs(), 30);
        assert_eq!(search.client.max_idle_per_host(), 100);

        let object = config.object.as_ref().unwrap();
        assert_eq!(object.bucket_name(), "user-data-1250000000");
        assert_eq!(
            object.endpoint().as_deref(),
            Some("https://cos.ap-guangzhou.myqcloud.com")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DOCSTORE_TEST_ES_URL", "http://es.internal:9200");

        let toml_content = r#"
[search]
urls = ["${DOCSTORE_TEST_ES_URL}"]
"#;

        let config = StoreConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.search.unwrap().urls, vec!["http://es.internal:9200"]);

        std::env::remove_var("DOCSTORE_TEST_ES_URL");
    }

    #[test]
    fn test_config_validation() {
        let config = StoreConfig::from_toml_str(
            r#"
[search]
urls = ["invalid-url"]
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        assert!(StoreConfig::default().validate().is_err());

        let object = ObjectStoreConfig {
            bucket: "data".to_string(),
            access_key_id: Some("AKID".to_string()),
            ..ObjectStoreConfig::default()
        };
        assert!(matches!(
            object.validate(),
            Err(ConfigError::MissingConfig { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[object]\nbucket = \"archive\"\nendpoint = \"http://127.0.0.1:9000\"\nforce_path_style = true\n")
            .unwrap();

        let config = StoreConfig::from_file(temp_file.path()).unwrap();
        let object = config.object.unwrap();
        assert_eq!(object.region(), "ap-beijing");
        assert_eq!(object.endpoint().as_deref(), Some("http://127.0.0.1:9000"));
        assert!(object.force_path_style());
    }

    #[test]
    fn test_invalid_toml() {
        let err = StoreConfig::from_toml_str("[search\nurls = 1").unwrap_err();
        assert!(matches!(err, ConfigError::ConfigValidation { .. }));
    }
}
