// src/introspection.rs

use std::path::{Path, PathBuf};

use serde::Serialize;

const DRI_DIR: &str = "/dev/dri";
const DEFAULT_DRI_NAME: &str = "card0";

/// Runtime facts reported to the client on `connect`.
///
/// Field names on the wire match what existing frontends read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Introspection {
    #[serde(rename = "radi_version")]
    pub image_tag: String,
    pub ros_version: String,
    #[serde(rename = "gpu_avaliable")]
    pub gpu_available: bool,
    #[serde(skip)]
    pub gpu_device: Option<PathBuf>,
}

impl Introspection {
    /// Read `$IMAGE_TAG`, `$ROS_DISTRO` and probe `/dev/dri/$DRI_NAME`.
    pub fn detect() -> Self {
        let dri_name = std::env::var("DRI_NAME").unwrap_or_else(|_| DEFAULT_DRI_NAME.to_string());
        let device = Path::new(DRI_DIR).join(dri_name);
        let gpu_device = is_char_device(&device).then_some(device);

        Self {
            image_tag: env_or_unknown("IMAGE_TAG"),
            ros_version: env_or_unknown("ROS_DISTRO"),
            gpu_available: gpu_device.is_some(),
            gpu_device,
        }
    }
}

fn env_or_unknown(var: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Whether `path` is a character device (a usable DRI node).
pub fn is_char_device(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        std::fs::metadata(path)
            .map(|m| m.file_type().is_char_device())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        false
    }
}
