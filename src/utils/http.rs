use serde::de::DeserializeOwned;

/// Thin GET-and-parse-JSON client shared by the API cogs. Each cog wraps
/// one of these with its base URL and typed methods.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            client: reqwest::Client::new(),
        }
    }

    /// GET `{base}{route}` with query parameters and deserialize the JSON
    /// body into `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        route: &str,
        params: &[(&str, &str)],
    ) -> Result<T, reqwest::Error> {
        self.client
            .get(format!("{}{}", self.base, route))
            .query(params)
            .send()
            .await?
            .json()
            .await
    }
}
