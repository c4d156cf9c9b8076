//! Blocking HTTP plumbing shared by the manifest client and the downloader.

use crate::error::{Result, UpdateError};
use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("kiosk-updater/", env!("CARGO_PKG_VERSION"));

/// Agent with a single overall deadline per request (manifest checks).
pub(crate) fn bounded_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Agent that bounds connect and each read, but not the whole transfer
/// (large artifacts may legitimately take longer than the timeout).
pub(crate) fn streaming_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout_read(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Issues a GET and insists on an exact `200 OK`.
pub(crate) fn get_ok(agent: &ureq::Agent, url: &str) -> Result<ureq::Response> {
    let resp = agent.get(url).call().map_err(|e| match e {
        ureq::Error::Status(code, _) => {
            UpdateError::Network(format!("{url} returned status {code}"))
        }
        ureq::Error::Transport(t) => UpdateError::Network(format!("request to {url} failed: {t}")),
    })?;

    if resp.status() != 200 {
        return Err(UpdateError::Network(format!(
            "{url} returned status {}",
            resp.status()
        )));
    }
    Ok(resp)
}
