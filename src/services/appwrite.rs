use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::core::filters::matches_filter;
use crate::error::KindredError;
use crate::models::{CandidateFilter, Profile, ProfilePatch};
use crate::services::profile_store::ProfileStore;

/// Documents fetched per candidate page request
const CANDIDATE_PAGE_SIZE: usize = 500;

/// Errors that can occur when interacting with Appwrite
#[derive(Debug, Error)]
pub enum AppwriteError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Unauthorized: invalid API key or token")]
    Unauthorized,

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<AppwriteError> for KindredError {
    fn from(value: AppwriteError) -> Self {
        match value {
            AppwriteError::NotFound(msg) => KindredError::NotFound(msg),
            AppwriteError::AlreadyExists(msg) => KindredError::Conflict(msg),
            AppwriteError::RequestError(e) if e.is_timeout() => KindredError::StorageTimeout(e.to_string()),
            other => KindredError::Internal(other.to_string()),
        }
    }
}

/// Profile store backed by an Appwrite document collection
///
/// Each profile is one document whose id is the profile id and whose
/// attributes are the serialized profile. Appwrite narrows the candidate
/// query (age, gender, verification, soft delete); distance and the
/// remaining constraints are checked locally.
pub struct AppwriteProfileStore {
    base_url: String,
    api_key: String,
    project_id: String,
    database_id: String,
    collection_id: String,
    client: Client,
}

impl AppwriteProfileStore {
    /// Create a new Appwrite-backed store
    pub fn new(
        base_url: String,
        api_key: String,
        project_id: String,
        database_id: String,
        collection_id: String,
        request_timeout: Duration,
    ) -> Result<Self, AppwriteError> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            project_id,
            database_id,
            collection_id,
            client,
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.database_id,
            self.collection_id
        )
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.documents_url(), urlencoding::encode(id))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("X-Appwrite-Key", &self.api_key)
            .header("X-Appwrite-Project", &self.project_id)
    }

    /// Map a non-success response to an error
    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, AppwriteError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(AppwriteError::NotFound(what.to_string())),
            StatusCode::CONFLICT => Err(AppwriteError::AlreadyExists(what.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppwriteError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_else(|_| "Unable to read body".to_string());
                tracing::error!("Appwrite request for {} failed: {} - {}", what, status, body);
                Err(AppwriteError::ApiError(format!("{}: {}", what, status)))
            }
        }
    }

    /// Fetch one document, including soft-deleted ones
    async fn fetch_document(&self, id: &str) -> Result<Profile, AppwriteError> {
        tracing::debug!("Fetching profile document {}", id);

        let response = self.request(reqwest::Method::GET, &self.document_url(id)).send().await?;
        let response = Self::check(response, &format!("profile {}", id)).await?;
        let doc: Value = response.json().await?;

        parse_document(&doc)
    }

    async fn write_document(&self, profile: &Profile) -> Result<(), AppwriteError> {
        let data = serde_json::to_value(profile)
            .map_err(|e| AppwriteError::InvalidResponse(format!("Failed to encode profile: {}", e)))?;

        let response = self
            .request(reqwest::Method::PATCH, &self.document_url(&profile.id))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        Self::check(response, &format!("profile {}", profile.id)).await?;
        Ok(())
    }

    /// Documents and the server-side total for one candidate page
    async fn fetch_candidate_page(&self, queries: &[String]) -> Result<(Vec<Value>, u64), AppwriteError> {
        let queries_json = serde_json::to_string(queries)
            .map_err(|e| AppwriteError::InvalidResponse(format!("Failed to encode queries: {}", e)))?;
        let url = format!("{}?queries={}", self.documents_url(), urlencoding::encode(&queries_json));

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        let response = Self::check(response, "candidate query").await?;
        let mut json: Value = response.json().await?;

        let total = json.get("total").and_then(|t| t.as_u64()).unwrap_or(0);
        match json.get_mut("documents").map(Value::take) {
            Some(Value::Array(documents)) => Ok((documents, total)),
            _ => Err(AppwriteError::InvalidResponse("Missing documents array".into())),
        }
    }
}

/// Appwrite wraps attributes either at the top level or under `data`
fn parse_document(doc: &Value) -> Result<Profile, AppwriteError> {
    let data = doc.get("data").unwrap_or(doc);
    serde_json::from_value(data.clone())
        .map_err(|e| AppwriteError::InvalidResponse(format!("Failed to parse profile: {}", e)))
}

/// Server-side narrowing for a candidate filter
fn candidate_queries(filter: &CandidateFilter) -> Result<Vec<String>, AppwriteError> {
    let requester = serde_json::to_string(&filter.requester_id)
        .map_err(|e| AppwriteError::InvalidResponse(format!("Failed to encode requester id: {}", e)))?;

    let mut queries = vec![
        "isNull(\"deletedAt\")".to_string(),
        format!("notEqual(\"id\", {})", requester),
        format!("greaterThanEqual(\"age\", {})", filter.min_age),
        format!("lessThanEqual(\"age\", {})", filter.max_age),
    ];

    if !filter.genders.is_empty() {
        let genders = filter
            .genders
            .iter()
            .map(|g| serde_json::to_string(g).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        queries.push(format!("equal(\"gender\", [{}])", genders));
    }

    if filter.require_verified {
        queries.push("equal(\"isVerified\", true)".to_string());
    }

    Ok(queries)
}

/// One page of a candidate query
fn page_queries(base: &[String], offset: usize) -> Vec<String> {
    let mut queries = base.to_vec();
    queries.push(format!("limit({})", CANDIDATE_PAGE_SIZE));
    queries.push(format!("offset({})", offset));
    queries
}

#[async_trait]
impl ProfileStore for AppwriteProfileStore {
    async fn get_profile(&self, id: &str) -> Result<Profile, KindredError> {
        let profile = self.fetch_document(id).await?;
        if profile.is_deleted() {
            return Err(KindredError::profile_not_found(id));
        }
        Ok(profile)
    }

    /// Pages through every matching document; the local filter runs on the
    /// whole pool so nothing past the first page is silently dropped
    async fn list_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Profile>, KindredError> {
        let base = candidate_queries(filter)?;
        let mut profiles = Vec::new();
        let mut offset = 0usize;

        loop {
            let (documents, total) = self.fetch_candidate_page(&page_queries(&base, offset)).await?;
            let fetched = documents.len();
            offset += fetched;

            profiles.extend(
                documents
                    .iter()
                    .filter_map(|doc| match parse_document(doc) {
                        Ok(profile) => Some(profile),
                        Err(e) => {
                            tracing::warn!("Skipping unreadable profile document: {}", e);
                            None
                        }
                    })
                    .filter(|profile| matches_filter(profile, filter)),
            );

            if fetched == 0 || offset as u64 >= total {
                tracing::debug!("Queried {} candidates (total: {}, fetched: {})", profiles.len(), total, offset);
                return Ok(profiles);
            }
        }
    }

    async fn update_profile(&self, id: &str, patch: ProfilePatch) -> Result<Profile, KindredError> {
        let current = self.get_profile(id).await?;
        let updated = patch.apply_to(&current)?;
        self.write_document(&updated).await?;
        Ok(updated)
    }

    async fn insert_profile(&self, profile: Profile) -> Result<Profile, KindredError> {
        profile.validate()?;

        let data = serde_json::to_value(&profile)
            .map_err(|e| KindredError::Internal(format!("Failed to encode profile: {}", e)))?;
        let response = self
            .request(reqwest::Method::POST, &self.documents_url())
            .json(&json!({ "documentId": profile.id, "data": data }))
            .send()
            .await
            .map_err(AppwriteError::from)?;
        Self::check(response, &format!("profile {}", profile.id)).await?;

        tracing::debug!("Created profile document {}", profile.id);
        Ok(profile)
    }

    async fn delete_profile(&self, id: &str) -> Result<(), KindredError> {
        let mut profile = self.get_profile(id).await?;
        let now = Utc::now();
        profile.deleted_at = Some(now);
        profile.updated_at = now;
        self.write_document(&profile).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Location};
    use mockito::Matcher;
    use std::collections::HashSet;

    const DOCS_PATH: &str = "/databases/test_db/collections/profiles/documents";

    fn store(url: String) -> AppwriteProfileStore {
        AppwriteProfileStore::new(
            url,
            "test_key".to_string(),
            "test_project".to_string(),
            "test_db".to_string(),
            "profiles".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn document(profile: &Profile) -> String {
        let mut doc = serde_json::to_value(profile).unwrap();
        doc["$id"] = json!(profile.id);
        doc.to_string()
    }

    #[tokio::test]
    async fn test_get_profile() {
        let mut server = mockito::Server::new_async().await;
        let mut profile = Profile::new("u1", 29, Gender::Female);
        profile.location = Location::at(52.52, 13.405);

        let mock = server
            .mock("GET", format!("{}/u1", DOCS_PATH).as_str())
            .match_header("X-Appwrite-Key", "test_key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(document(&profile))
            .create_async()
            .await;

        let fetched = store(server.url()).get_profile("u1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(fetched.id, "u1");
        assert_eq!(fetched.age, 29);
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{}/ghost", DOCS_PATH).as_str())
            .with_status(404)
            .with_body(r#"{"message":"Document not found"}"#)
            .create_async()
            .await;

        let result = store(server.url()).get_profile("ghost").await;
        assert!(matches!(result, Err(KindredError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deleted_profile_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mut profile = Profile::new("gone", 40, Gender::Male);
        profile.deleted_at = Some(Utc::now());

        server
            .mock("GET", format!("{}/gone", DOCS_PATH).as_str())
            .with_status(200)
            .with_body(document(&profile))
            .create_async()
            .await;

        let result = store(server.url()).get_profile("gone").await;
        assert!(matches!(result, Err(KindredError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_candidates_applies_local_filter() {
        let mut server = mockito::Server::new_async().await;
        let near = {
            let mut p = Profile::new("near", 27, Gender::Female);
            p.location = Location::at(52.52, 13.40);
            p
        };
        let far = {
            let mut p = Profile::new("far", 27, Gender::Female);
            p.location = Location::at(48.13, 11.58);
            p
        };
        let body = json!({
            "total": 2,
            "documents": [
                serde_json::to_value(&near).unwrap(),
                serde_json::to_value(&far).unwrap(),
            ]
        });

        server
            .mock("GET", DOCS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let filter = CandidateFilter {
            requester_id: "me".to_string(),
            min_age: 18,
            max_age: 40,
            origin: Some(crate::models::Coordinates::new(52.52, 13.405)),
            max_distance_km: Some(25.0),
            genders: vec![Gender::Female],
            exclude_ids: HashSet::new(),
            ..CandidateFilter::default()
        };

        let pool = store(server.url()).list_candidates(&filter).await.unwrap();
        let ids: Vec<_> = pool.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["near"]);
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", DOCS_PATH)
            .with_status(409)
            .with_body(r#"{"message":"Document already exists"}"#)
            .create_async()
            .await;

        let result = store(server.url()).insert_profile(Profile::new("dup", 30, Gender::Other)).await;
        assert!(matches!(result, Err(KindredError::Conflict(_))));
    }

    #[test]
    fn test_candidate_queries() {
        let filter = CandidateFilter {
            requester_id: "me".to_string(),
            min_age: 21,
            max_age: 35,
            genders: vec![Gender::NonBinary],
            require_verified: true,
            ..CandidateFilter::default()
        };

        let queries = candidate_queries(&filter).unwrap();
        assert!(queries.contains(&"notEqual(\"id\", \"me\")".to_string()));
        assert!(queries.contains(&"greaterThanEqual(\"age\", 21)".to_string()));
        assert!(queries.contains(&"equal(\"gender\", [\"non_binary\"])".to_string()));
        assert!(queries.contains(&"equal(\"isVerified\", true)".to_string()));

        let paged = page_queries(&queries, 1000);
        assert_eq!(paged[paged.len() - 2], "limit(500)");
        assert_eq!(paged[paged.len() - 1], "offset(1000)");
    }

    #[test]
    fn test_candidate_queries_escape_requester_id() {
        let filter = CandidateFilter {
            requester_id: r#"me", "x"#.to_string(),
            ..CandidateFilter::default()
        };

        let queries = candidate_queries(&filter).unwrap();
        assert!(queries.contains(&r#"notEqual("id", "me\", \"x")"#.to_string()));
    }

    #[tokio::test]
    async fn test_list_candidates_reads_every_page() {
        let mut server = mockito::Server::new_async().await;
        let profile = |id: &str| serde_json::to_value(Profile::new(id, 30, Gender::Female)).unwrap();

        let first = server
            .mock("GET", DOCS_PATH)
            .match_query(Matcher::Regex("offset%280%29".to_string()))
            .with_status(200)
            .with_body(json!({ "total": 3, "documents": [profile("p1"), profile("p2")] }).to_string())
            .create_async()
            .await;
        let second = server
            .mock("GET", DOCS_PATH)
            .match_query(Matcher::Regex("offset%282%29".to_string()))
            .with_status(200)
            .with_body(json!({ "total": 3, "documents": [profile("p3")] }).to_string())
            .create_async()
            .await;

        let filter = CandidateFilter {
            requester_id: "me".to_string(),
            min_age: 18,
            max_age: 99,
            ..CandidateFilter::default()
        };
        let pool = store(server.url()).list_candidates(&filter).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let ids: Vec<_> = pool.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }
}
