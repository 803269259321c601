//! Content-addressed upload client.
//!
//! Packages a payload into a CAR archive with the external `ipfs-car` tool,
//! then performs a two-phase registration against the storage bridge API:
//!
//! 1. `store/add` reserves space for the archive (by shard CID and size).
//!    If the bridge signals that the bytes must be uploaded, the archive is
//!    PUT exactly once to the presigned URL it returns; if the bytes are
//!    already stored, no PUT occurs.
//! 2. `upload/add` registers the root content identifier against the shard.
//!
//! Authentication headers are generated once per client instance by invoking
//! the `w3` CLI and parsing its output; failing to find both header values is
//! fatal to construction. Bridge calls are single-attempt: a failed upload
//! leaves no partial state and a fresh attempt restarts from packaging.
//!
//! Temporary payload and archive files live in the OS temp directory under
//! randomized names and are removed best-effort on success and failure alike.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{Config, StorageConfig};
use crate::index::FlatIndex;
use crate::models::UploadReceipt;

/// Header values for the bridge API, parsed from `w3 bridge generate-tokens`.
#[derive(Debug, Clone)]
pub struct AuthHeaders {
    pub secret: String,
    pub authorization: String,
}

/// What the bridge asked for in response to a `store/add` reservation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    /// PUT the archive bytes to this presigned URL with this checksum header.
    Upload { url: String, checksum: String },
    /// The bytes are already stored; skip straight to registration.
    AlreadyStored,
}

pub struct BridgeClient {
    config: StorageConfig,
    auth: AuthHeaders,
    http: reqwest::Client,
}

impl BridgeClient {
    /// Construct a client and generate its auth tokens.
    ///
    /// Tokens are never regenerated within an instance; expiry is set
    /// `token_ttl_hours` ahead at construction time.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let auth = generate_tokens(config)?;

        Ok(Self {
            config: config.clone(),
            auth,
            http,
        })
    }

    /// Upload a text payload, packaged as `review_<title>_<suffix>.txt`.
    pub async fn upload_text(&self, text: &str, title: &str) -> Result<UploadReceipt> {
        let filename = format!("review_{}_{}.txt", clean_name(title), random_suffix());
        self.upload_bytes(text.as_bytes(), &filename).await
    }

    /// Upload an existing file's bytes under a sanitized name.
    pub async fn upload_file(&self, path: &Path, name: &str) -> Result<UploadReceipt> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read upload payload: {}", path.display()))?;
        let filename = format!("{}_{}", clean_name(name), random_suffix());
        self.upload_bytes(&bytes, &filename).await
    }

    async fn upload_bytes(&self, bytes: &[u8], filename: &str) -> Result<UploadReceipt> {
        let payload_path = std::env::temp_dir().join(filename);
        let car_path = std::env::temp_dir().join(format!("{}.car", filename));

        // Removes both files on every exit path below, including errors.
        let _artifacts = TempArtifacts {
            paths: vec![payload_path.clone(), car_path.clone()],
        };

        std::fs::write(&payload_path, bytes)
            .with_context(|| format!("Failed to write payload: {}", payload_path.display()))?;

        let archive = self.package(&payload_path, &car_path)?;

        let outcome = self.reserve(&archive).await?;
        if let ReserveOutcome::Upload { url, checksum } = outcome {
            self.put_archive(&car_path, &url, &checksum, archive.size)
                .await?;
        }

        self.register(&archive).await?;

        Ok(UploadReceipt {
            url: gateway_url(&self.config, &archive.root_cid),
            cid: archive.root_cid,
            filename: filename.to_string(),
        })
    }

    /// Package the payload into a CAR archive and read back its
    /// identifiers and size.
    fn package(&self, payload: &Path, car: &Path) -> Result<Archive> {
        let output = Command::new(&self.config.car_bin)
            .arg("pack")
            .arg(payload)
            .arg("-o")
            .arg(car)
            .output()
            .with_context(|| {
                format!(
                    "Failed to execute '{}'. Install with: npm install -g ipfs-car",
                    self.config.car_bin
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Archive packaging failed: {}", stderr.trim());
        }

        let shard_cid = self.car_stdout(&["hash"], car)?;
        let root_cid = self.car_stdout(&["roots"], car)?;
        let size = std::fs::metadata(car)
            .with_context(|| format!("Failed to stat archive: {}", car.display()))?
            .len();

        Ok(Archive {
            shard_cid,
            root_cid,
            size,
        })
    }

    /// Run an `ipfs-car` subcommand against the archive and return its
    /// trimmed stdout.
    fn car_stdout(&self, args: &[&str], car: &Path) -> Result<String> {
        let output = Command::new(&self.config.car_bin)
            .args(args)
            .arg(car)
            .output()
            .with_context(|| format!("Failed to execute '{}'", self.config.car_bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ipfs-car {} failed: {}", args.join(" "), stderr.trim());
        }

        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            bail!("ipfs-car {} produced no output", args.join(" "));
        }
        Ok(value)
    }

    /// Phase one: reserve storage for the archive.
    async fn reserve(&self, archive: &Archive) -> Result<ReserveOutcome> {
        let payload = serde_json::json!({
            "tasks": [[
                "store/add",
                self.config.space_did,
                { "link": { "/": archive.shard_cid }, "size": archive.size }
            ]]
        });

        let response = self
            .http
            .post(&self.config.bridge_url)
            .header("X-Auth-Secret", &self.auth.secret)
            .header("Authorization", &self.auth.authorization)
            .json(&payload)
            .send()
            .await
            .context("Bridge reserve request failed")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() != 200 {
            bail!("Store reservation failed: HTTP {}: {}", status, body);
        }

        let json: serde_json::Value =
            serde_json::from_str(&body).context("Bridge reserve response is not JSON")?;
        parse_reserve_response(&json)
    }

    /// PUT the archive bytes to the bridge-provided presigned URL.
    async fn put_archive(&self, car: &Path, url: &str, checksum: &str, size: u64) -> Result<()> {
        let bytes = std::fs::read(car)
            .with_context(|| format!("Failed to read archive: {}", car.display()))?;

        let response = self
            .http
            .put(url)
            .header("content-length", size.to_string())
            .header("x-amz-checksum-sha256", checksum)
            .header("content-type", "application/vnd.ipld.car")
            .body(bytes)
            .send()
            .await
            .context("Archive upload failed")?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let body = response.text().await.unwrap_or_default();
            bail!("Archive upload rejected: HTTP {}: {}", status, body);
        }

        Ok(())
    }

    /// Phase two: register the root identifier against the shard.
    async fn register(&self, archive: &Archive) -> Result<()> {
        let payload = serde_json::json!({
            "tasks": [[
                "upload/add",
                self.config.space_did,
                {
                    "root": { "/": archive.root_cid },
                    "shards": [{ "/": archive.shard_cid }]
                }
            ]]
        });

        let response = self
            .http
            .post(&self.config.bridge_url)
            .header("X-Auth-Secret", &self.auth.secret)
            .header("Authorization", &self.auth.authorization)
            .json(&payload)
            .send()
            .await
            .context("Bridge register request failed")?;

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            bail!("Upload registration failed: HTTP {}: {}", status, body);
        }

        Ok(())
    }
}

/// CAR archive identity: shard CID, root CID, and byte size.
struct Archive {
    shard_cid: String,
    root_cid: String,
    size: u64,
}

/// Best-effort removal of temp files when dropped. Failures are ignored;
/// there is nothing useful to report about a leftover temp file.
struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Generate bridge auth headers by invoking the `w3` CLI.
fn generate_tokens(config: &StorageConfig) -> Result<AuthHeaders> {
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(config.token_ttl_hours))
        .timestamp()
        .to_string();

    let output = Command::new(&config.w3_bin)
        .args([
            "bridge",
            "generate-tokens",
            &config.space_did,
            "--can",
            "store/add",
            "--can",
            "upload/add",
            "--can",
            "upload/list",
            "--expiration",
            &expiration,
        ])
        .output()
        .with_context(|| {
            format!(
                "Failed to execute '{}'. Install with: npm install -g @web3-storage/w3cli",
                config.w3_bin
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Token generation failed: {}", stderr.trim());
    }

    parse_bridge_tokens(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the two auth header values out of `w3 bridge generate-tokens`
/// output. Both must be present.
fn parse_bridge_tokens(stdout: &str) -> Result<AuthHeaders> {
    let mut secret = None;
    let mut authorization = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("X-Auth-Secret header:") {
            secret = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("Authorization header:") {
            authorization = Some(rest.trim().to_string());
        }
    }

    match (secret, authorization) {
        (Some(secret), Some(authorization)) if !secret.is_empty() && !authorization.is_empty() => {
            Ok(AuthHeaders {
                secret,
                authorization,
            })
        }
        _ => bail!("Token output did not contain both X-Auth-Secret and Authorization headers"),
    }
}

/// Decide what the reserve response asks for.
///
/// The response is an array of task receipts; the first receipt's
/// `p.out.ok` object carries a `status` field. `"upload"` means the bytes
/// must be PUT to `url` with the returned checksum header; anything else
/// means the bytes are already stored.
fn parse_reserve_response(json: &serde_json::Value) -> Result<ReserveOutcome> {
    let ok = json
        .get(0)
        .and_then(|receipt| receipt.pointer("/p/out/ok"))
        .ok_or_else(|| anyhow::anyhow!("Malformed reserve response: {}", json))?;

    let status = ok
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| anyhow::anyhow!("Reserve response missing status: {}", ok))?;

    if status != "upload" {
        return Ok(ReserveOutcome::AlreadyStored);
    }

    let url = ok
        .get("url")
        .and_then(|u| u.as_str())
        .ok_or_else(|| anyhow::anyhow!("Reserve response missing upload url"))?
        .to_string();

    let checksum = ok
        .pointer("/headers/x-amz-checksum-sha256")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("Reserve response missing checksum header"))?
        .to_string();

    Ok(ReserveOutcome::Upload { url, checksum })
}

/// Gateway URL where a root CID resolves.
fn gateway_url(config: &StorageConfig, cid: &str) -> String {
    format!("https://{}.{}", cid, config.gateway_suffix)
}

/// Sanitize a title into a filename fragment: alphanumerics, spaces, and
/// underscores only; spaces become underscores; capped at 50 chars before
/// the cap; repeated words dropped.
fn clean_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();

    let mut capped: String = sanitized.trim_end().replace(' ', "_");
    if let Some((byte_idx, _)) = capped.char_indices().nth(50) {
        capped.truncate(byte_idx);
    }

    let mut seen = Vec::new();
    for word in capped.split('_') {
        if !word.is_empty() && !seen.contains(&word) {
            seen.push(word);
        }
    }

    if seen.is_empty() {
        "untitled".to_string()
    } else {
        seen.join("_")
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Download previously uploaded content from the public gateway.
pub async fn fetch_from_gateway(
    http: &reqwest::Client,
    config: &StorageConfig,
    cid: &str,
) -> Result<Vec<u8>> {
    let url = gateway_url(config, cid);
    let response = http.get(&url).send().await?;

    let status = response.status();
    if status.as_u16() != 200 {
        bail!("Gateway fetch failed: HTTP {} for {}", status, url);
    }

    Ok(response.bytes().await?.to_vec())
}

fn storage_config(config: &Config) -> Result<&StorageConfig> {
    config
        .storage
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("[storage] is not configured"))
}

pub async fn run_upload(
    config: &Config,
    path: Option<PathBuf>,
    text: Option<String>,
    title: Option<String>,
) -> Result<()> {
    let storage = storage_config(config)?;
    let client = BridgeClient::new(storage)?;

    let receipt = match (path, text) {
        (Some(path), None) => {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "upload".to_string());
            client.upload_file(&path, &name).await?
        }
        (None, Some(text)) => {
            let title = title.unwrap_or_else(|| "untitled".to_string());
            client.upload_text(&text, &title).await?
        }
        _ => bail!("Provide either a file path or --text"),
    };

    println!("Upload complete.");
    println!("  filename: {}", receipt.filename);
    println!("  CID: {}", receipt.cid);
    println!("  {}", receipt.url);
    Ok(())
}

/// Upload the on-disk similarity index file to storage.
pub async fn run_index_push(config: &Config) -> Result<()> {
    let storage = storage_config(config)?;
    let index_path = &config.index.path;
    if !index_path.exists() {
        bail!("No index file at {}", index_path.display());
    }

    let client = BridgeClient::new(storage)?;
    let receipt = client.upload_file(index_path, "reviews_index").await?;

    println!("Index uploaded.");
    println!("  CID: {}", receipt.cid);
    println!("  {}", receipt.url);
    Ok(())
}

/// Download an index file from the gateway by CID and install it as the
/// local index, replacing any previous file wholesale.
pub async fn run_index_pull(config: &Config, cid: &str) -> Result<()> {
    let storage = storage_config(config)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(storage.timeout_secs))
        .build()?;

    let bytes = fetch_from_gateway(&http, storage, cid).await?;

    let path = &config.index.path;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write index file: {}", path.display()))?;

    let index = FlatIndex::load(path)?;
    println!("Index downloaded to {}", path.display());
    println!("  dims: {}", index.dims());
    println!("  vectors: {}", index.len());
    Ok(())
}
