use limitprobe::error::HarnessError;
use std::fs;
use std::net::TcpStream;
use std::process::Command;
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;
use tracing::debug;

const IMAGE: &str = "nginx:alpine";
const READINESS_ATTEMPTS: u32 = 100;
const READINESS_PAUSE: Duration = Duration::from_millis(100);

/// An nginx container enforcing an opaque `limit_req` policy.
///
/// The policy text is handed through unmodified as the container's whole
/// server configuration. Provisioning writes the config and a static page
/// into a temp dir, bind-mounts both into a fresh container with a random
/// host port, and waits until nginx is listening. The container is removed
/// on drop, success or failure path alike.
pub struct NginxTarget {
    container_id: String,
    base_url: String,
    _context: TempDir,
}

impl NginxTarget {
    pub fn start(policy: &str) -> Result<Self, HarnessError> {
        let context = provision_error(TempDir::new())?;
        let conf = context.path().join("default.conf");
        let index = context.path().join("index.html");
        provision_error(fs::write(&conf, policy))?;
        provision_error(fs::write(&index, "ok"))?;

        let output = provision_error(
            Command::new("docker")
                .args(["run", "-d", "--rm", "-p", "127.0.0.1:0:80"])
                .arg("-v")
                .arg(format!("{}:/etc/nginx/conf.d/default.conf:ro", conf.display()))
                .arg("-v")
                .arg(format!("{}:/etc/nginx/html/index.html:ro", index.display()))
                .arg(IMAGE)
                .output(),
        )?;
        if !output.status.success() {
            return Err(HarnessError::Provision(format!(
                "docker run failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();

        // From here on Drop owns container teardown, readiness failures
        // included.
        let mut target = Self {
            container_id,
            base_url: String::new(),
            _context: context,
        };
        let addr = target.mapped_addr()?;
        target.wait_until_listening(&addr)?;
        target.base_url = format!("http://{addr}");
        debug!("nginx target ready at {}", target.base_url);
        Ok(target)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn mapped_addr(&self) -> Result<String, HarnessError> {
        let output = provision_error(
            Command::new("docker")
                .args(["port", &self.container_id, "80/tcp"])
                .output(),
        )?;
        let addr = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if !output.status.success() || addr.is_empty() {
            return Err(HarnessError::Provision(format!(
                "no mapped host port for container {}",
                self.container_id
            )));
        }
        Ok(addr)
    }

    fn wait_until_listening(&self, addr: &str) -> Result<(), HarnessError> {
        // Bare TCP connects only: an HTTP readiness probe would already
        // consume rate-limiter budget before the first measured round.
        for _ in 0..READINESS_ATTEMPTS {
            if TcpStream::connect(addr).is_ok() {
                return Ok(());
            }
            sleep(READINESS_PAUSE);
        }
        Err(HarnessError::Provision(format!(
            "nginx never started listening on {addr}"
        )))
    }
}

impl Drop for NginxTarget {
    fn drop(&mut self) {
        let _ = Command::new("docker")
            .args(["rm", "-f", &self.container_id])
            .output();
    }
}

fn provision_error<T>(result: std::io::Result<T>) -> Result<T, HarnessError> {
    result.map_err(|e| HarnessError::Provision(e.to_string()))
}
