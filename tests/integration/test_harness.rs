// Test harness for integration tests
// Starts the mirror-cache binary against a scratch config and cache directory

use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;

use super::mock_upstream::unused_port;

/// Server instance that automatically starts and stops
pub struct ServerTestHarness {
    process: Option<Child>,
    pub port: u16,
    pub base_url: String,
    config_path: PathBuf,
    cache_dir: PathBuf,
    _scratch: tempfile::TempDir,
}

impl ServerTestHarness {
    /// Start a server fetching from `servers`
    pub fn start(servers: &[String]) -> Result<Self, String> {
        let scratch = tempfile::tempdir().map_err(|e| format!("Failed to create tempdir: {}", e))?;
        let port = unused_port();
        let config_path = scratch.path().join("mirror-cache.properties");
        let cache_dir = scratch.path().join("cache");

        let config = format!(
            "# written by the test harness\nservers={}\ncache-directory={}\naddress=127.0.0.1\nport={}\nrequest-timeout-ms=1000\n",
            servers.join(", "),
            cache_dir.display(),
            port
        );
        std::fs::write(&config_path, config)
            .map_err(|e| format!("Failed to write config: {}", e))?;

        let mut child = Command::new(env!("CARGO_BIN_EXE_mirror-cache"))
            .arg("--config-location")
            .arg(&config_path)
            .spawn()
            .map_err(|e| format!("Failed to start server: {}", e))?;

        // Wait until the listener accepts connections
        for _ in 0..50 {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(format!("Server exited immediately with status: {}", status));
            }
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                return Ok(Self {
                    process: Some(child),
                    port,
                    base_url: format!("http://127.0.0.1:{}", port),
                    config_path,
                    cache_dir,
                    _scratch: scratch,
                });
            }
            thread::sleep(Duration::from_millis(100));
        }

        let _ = child.kill();
        Err(format!("Server did not listen on port {}", port))
    }

    /// Get the URL for `path`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Stop the server (called automatically on drop)
    pub fn stop(&mut self) {
        if let Some(mut child) = self.process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ServerTestHarness {
    fn drop(&mut self) {
        self.stop();
    }
}
