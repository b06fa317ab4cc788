// ABOUTME: Local runtime detection for Docker and Podman.
// ABOUTME: Honors an explicit socket, otherwise checks Podman sockets first, then Docker.

use super::types::{RuntimeConfig, RuntimeInfo, RuntimeType};
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("socket not found: {0}")]
    SocketNotFound(String),

    #[error("not a socket: {0}")]
    NotASocket(String),
}

/// Detect the container runtime on this host.
///
/// An explicit socket in `config` must exist and be a Unix socket; its
/// runtime type comes from `config.runtime`, or is guessed from the path.
/// Without one, detection order is:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
///
/// An explicit runtime without a socket selects that runtime's default socket.
pub fn detect_local(config: &RuntimeConfig) -> Result<RuntimeInfo, DetectionError> {
    if let Some(socket) = &config.socket {
        check_socket(socket)?;
        let runtime_type = config.runtime.unwrap_or_else(|| guess_runtime(socket));
        return Ok(RuntimeInfo {
            runtime_type,
            socket_path: socket.clone(),
        });
    }

    if let Some(runtime_type) = config.runtime {
        let socket_path = default_socket_path(runtime_type);
        check_socket(&socket_path)?;
        return Ok(RuntimeInfo {
            runtime_type,
            socket_path,
        });
    }

    let rootless = get_uid().map(|uid| format!("/run/user/{uid}/podman/podman.sock"));
    let candidates = rootless
        .into_iter()
        .map(|socket| (RuntimeType::Podman, socket))
        .chain([
            (RuntimeType::Podman, ROOTFUL_PODMAN.to_string()),
            (RuntimeType::Docker, DOCKER_SOCKET.to_string()),
        ]);

    for (runtime_type, socket_path) in candidates {
        if check_socket(&socket_path).is_ok() {
            tracing::debug!(socket = %socket_path, runtime = %runtime_type, "found runtime socket");
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path,
            });
        }
    }

    Err(DetectionError::NoRuntimeFound)
}

fn check_socket(path: &str) -> Result<(), DetectionError> {
    let metadata =
        std::fs::metadata(Path::new(path)).map_err(|_| DetectionError::SocketNotFound(path.to_string()))?;
    if metadata.file_type().is_socket() {
        Ok(())
    } else {
        Err(DetectionError::NotASocket(path.to_string()))
    }
}

fn guess_runtime(socket: &str) -> RuntimeType {
    if socket.contains("podman") {
        RuntimeType::Podman
    } else {
        RuntimeType::Docker
    }
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(str::to_string)
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    #[test]
    fn explicit_socket_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker.sock");
        let _listener = UnixListener::bind(&path).unwrap();
        let socket = path.to_string_lossy().to_string();

        let info = detect_local(&RuntimeConfig {
            runtime: None,
            socket: Some(socket.clone()),
        })
        .unwrap();

        assert_eq!(info.socket_path, socket);
        assert_eq!(info.runtime_type, RuntimeType::Docker);
    }

    #[test]
    fn runtime_is_guessed_from_podman_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podman.sock");
        let _listener = UnixListener::bind(&path).unwrap();

        let info = detect_local(&RuntimeConfig {
            runtime: None,
            socket: Some(path.to_string_lossy().to_string()),
        })
        .unwrap();

        assert_eq!(info.runtime_type, RuntimeType::Podman);
    }

    #[test]
    fn regular_file_is_not_a_socket() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = detect_local(&RuntimeConfig {
            runtime: Some(RuntimeType::Docker),
            socket: Some(file.path().to_string_lossy().to_string()),
        })
        .unwrap_err();

        assert!(matches!(err, DetectionError::NotASocket(_)));
    }

    #[test]
    fn missing_socket_is_reported() {
        let err = detect_local(&RuntimeConfig {
            runtime: None,
            socket: Some("/nonexistent/reimage/test.sock".to_string()),
        })
        .unwrap_err();

        assert!(matches!(err, DetectionError::SocketNotFound(_)));
    }
}
