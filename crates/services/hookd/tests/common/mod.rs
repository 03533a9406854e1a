#![allow(dead_code)]

use std::{path::Path, sync::Arc, time::Duration};

use hook_config::{ExecStep, JobSources};
use hook_store::{JobChannel, LogStore};
use hook_web::mw_token::AccessToken;
use hookd::{cli::Mode, context::Context};
use tempfile::TempDir;
use tokio::{net::TcpListener, sync::oneshot};

pub const TOKEN: &str = "test-token";

/// A daemon on an ephemeral port with its own configuration and scripts
/// directories.
pub struct TestServer {
    pub url: String,
    pub client: reqwest::Client,
    pub ctx: Arc<Context>,
    pub scripts: TempDir,
    config: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start(mode: Mode, steps: &[ExecStep]) -> Self {
        let config = tempfile::tempdir().expect("Failed to create config dir");
        let scripts = tempfile::tempdir().expect("Failed to create scripts dir");
        let config_file = config.path().join("jobs.json");
        std::fs::write(
            &config_file,
            serde_json::to_string(steps).expect("Failed to serialize jobs"),
        )
        .expect("Failed to write config file");

        let ctx = Arc::new(Context {
            sources: JobSources::new(Some(config_file), None),
            scripts_root: scripts.path().to_path_buf(),
            mode,
            token: AccessToken::new(TOKEN),
            store: LogStore::memory(Duration::from_secs(3600)),
            channel: JobChannel::local(),
            // Small batches so every log read spans several fetches.
            read_batch: 2,
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let (tx, rx) = oneshot::channel::<()>();
        let server = hookd::start(ctx.clone(), listener, async {
            let _ = rx.await;
        })
        .await
        .expect("Failed to start hookd");

        Self {
            url: format!("http://{}", server.local_addr),
            client: reqwest::Client::new(),
            ctx,
            scripts,
            config,
            shutdown: Some(tx),
        }
    }

    pub fn config_file(&self) -> std::path::PathBuf {
        self.config.path().join("jobs.json")
    }

    pub fn post(&self, job: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/", self.url))
            .header("X-HOOK-TOKEN", TOKEN)
            .header("X-HOOK-JOB", job)
    }

    /// Submit a job and return the response body.
    pub async fn submit(&self, job: &str) -> String {
        let response = self.post(job).send().await.expect("POST failed");
        response.text().await.expect("Failed to read body")
    }

    pub fn get_job(&self, handle: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/job/{handle}", self.url))
            .header("X-HOOK-TOKEN", TOKEN)
    }

    /// Poll a job's logs until its info log is complete.
    pub async fn wait_for_logs(&self, handle: &str) -> String {
        tokio::time::timeout(Duration::from_secs(15), async {
            loop {
                let response = self.get_job(handle).send().await.expect("GET failed");
                if response.status().is_success() {
                    let body = response.text().await.expect("Failed to read body");
                    if body.contains("EOL\n") {
                        return body;
                    }
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("job logs never completed")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn sh(job: &str, script: &str) -> ExecStep {
    ExecStep::new(job, "sh", vec!["-c", script])
}

pub fn marker(dir: &Path, name: &str) -> (std::path::PathBuf, String) {
    let path = dir.join(name);
    let script = format!("touch {}", path.display());
    (path, script)
}
