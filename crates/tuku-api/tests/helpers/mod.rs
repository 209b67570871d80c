#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;
use tuku_api::setup::{build_state, routes::setup_routes, storage::provision};
use tuku_core::{
    Config, ContentCensor, DatabaseConfig, ModerationConfig, ModerationError, ModerationVerdict,
    ServerConfig, StorageConfig, UploadLimits, Verdict, VerdictDetail,
};
use tuku_db::InMemoryImageRepository;
use tuku_storage::{BlobStore, LocalBlobStore, MemoryBlobStore};

pub const PASSWORD: &str = "secret123";

/// Scripted moderation answers
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Pass,
    Flag,
    Unavailable,
    NoToken,
}

pub struct ScriptedCensor {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedCensor {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentCensor for ScriptedCensor {
    async fn censor(&self, _image: &[u8]) -> Result<ModerationVerdict, ModerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Pass => Ok(ModerationVerdict {
                verdict: Verdict::Compliant,
                conclusion: "合规".to_string(),
                conclusion_type: Some(1),
                log_id: Some(1),
                skipped: false,
            }),
            Script::Flag => Ok(ModerationVerdict {
                verdict: Verdict::NonCompliant(vec![VerdictDetail {
                    category: 1,
                    sub_category: Some(0),
                    message: "explicit content".to_string(),
                    probability: Some(0.98),
                }]),
                conclusion: "不合规".to_string(),
                conclusion_type: Some(2),
                log_id: Some(2),
                skipped: false,
            }),
            Script::Unavailable => Err(ModerationError::Unavailable("HTTP 503".to_string())),
            Script::NoToken => Err(ModerationError::TokenAcquisition(
                "token endpoint returned HTTP 401".to_string(),
            )),
        }
    }
}

pub fn test_config(dir: &TempDir) -> Config {
    let mut moderation = ModerationConfig::disabled();
    moderation.token_cache_path = dir.path().join("cache/token.json");
    Config {
        server: ServerConfig {
            port: 0,
            environment: "test".to_string(),
            public_base_url: String::new(),
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            timeout_seconds: 1,
        },
        storage: StorageConfig {
            root: dir.path().join("storage"),
            audit_log_dir: dir.path().join("logs"),
        },
        limits: UploadLimits::default(),
        moderation,
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub images: InMemoryImageRepository,
    pub store: Arc<dyn BlobStore>,
    /// Set when the app runs on the in-memory store
    pub memory: Option<MemoryBlobStore>,
    pub config: Config,
    pub dir: TempDir,
}

impl TestApp {
    /// App backed by a provisioned on-disk store, so `/uploads` serves real files.
    pub async fn local(censor: Arc<dyn ContentCensor>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let store = LocalBlobStore::new(&config.storage.root).await.unwrap();
        provision(&store, &config).await.unwrap();
        Self::build(dir, config, Arc::new(store), None, censor)
    }

    /// App backed by the in-memory store, for failure injection.
    pub async fn memory(censor: Arc<dyn ContentCensor>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let memory = MemoryBlobStore::new();
        Self::build(dir, config, Arc::new(memory.clone()), Some(memory), censor)
    }

    pub fn with_config(censor: Arc<dyn ContentCensor>, dir: TempDir, config: Config) -> Self {
        let memory = MemoryBlobStore::new();
        Self::build(dir, config, Arc::new(memory.clone()), Some(memory), censor)
    }

    fn build(
        dir: TempDir,
        config: Config,
        store: Arc<dyn BlobStore>,
        memory: Option<MemoryBlobStore>,
        censor: Arc<dyn ContentCensor>,
    ) -> Self {
        let images = InMemoryImageRepository::new();
        let state = build_state(config.clone(), Arc::new(images.clone()), store.clone(), censor);
        let server = TestServer::new(setup_routes(state)).unwrap();
        Self {
            server,
            images,
            store,
            memory,
            config,
            dir,
        }
    }

    pub fn memory_store(&self) -> &MemoryBlobStore {
        self.memory.as_ref().expect("app was not built on the memory store")
    }

    /// Every line of the current month's audit log
    pub fn audit_lines(&self) -> Vec<String> {
        let logs = self.dir.path().join("logs");
        let Ok(entries) = std::fs::read_dir(logs) else {
            return Vec::new();
        };
        let mut lines = Vec::new();
        for entry in entries {
            let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            lines.extend(content.lines().map(str::to_string));
        }
        lines
    }

    pub async fn upload(&self, data: Vec<u8>, name: &str, password: Option<&str>) -> axum_test::TestResponse {
        let mut form = MultipartForm::new().add_part(
            "image",
            Part::bytes(data).file_name(name).mime_type("image/jpeg"),
        );
        if let Some(password) = password {
            form = form.add_text("delete_password", password);
        }
        self.server.post("/api/upload").multipart(form).await
    }
}

pub fn encode_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 40, 90]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
    buffer
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_image(width, height, ImageFormat::Jpeg)
}
