use crate::protocol::TaskData;

use anyhow::{Result, bail};
use serde_json::{Value, json};

pub const DEFAULT_WIDTH: u64 = 1920;
pub const DEFAULT_HEIGHT: u64 = 1080;
const MAX_DIMENSION: u64 = 7680;

/// Task handler: describes the capture for `url`.
///
/// No rendering engine ships with the service, so the result is a placeholder
/// descriptor carrying the requested viewport. A renderer can replace this
/// handler in the registry without touching the pool or the wire format.
pub async fn generate_screenshot(url: String, options: TaskData) -> Result<Value> {
    let dimension = |key: &str, default: u64| {
        options.get(key).and_then(Value::as_u64).unwrap_or(default)
    };
    let width = dimension("width", DEFAULT_WIDTH);
    let height = dimension("height", DEFAULT_HEIGHT);

    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        bail!("invalid viewport {}x{}", width, height);
    }

    tracing::info!("Screenshot placeholder generated for {} ({}x{})", url, width, height);

    Ok(json!({
        "url": url,
        "width": width,
        "height": height,
        "placeholder": true,
        "note": "no rendering engine configured",
    }))
}
