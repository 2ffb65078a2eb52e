//! Hand-off point between the upgrade commands and the control-plane API.

use std::io::{self, Write};

use tracing::debug;

use crate::config::ConfigFile;
use crate::universe::upgrade::Child;

pub(crate) trait ControlPlane {
    fn submit(&mut self, universe: &str, task: &Child) -> Result<(), ControlPlaneError>;
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ControlPlaneError {
    #[error("failed to encode upgrade request: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("failed to write upgrade request: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, serde::Serialize)]
struct Request<'a> {
    host: &'a str,
    universe: &'a str,
    authenticated: bool,
    task: &'a Child,
}

/// Writes each request as a TOML document instead of sending it.
#[derive(Debug)]
pub(crate) struct DryRun<W> {
    host: String,
    authenticated: bool,
    out: W,
}

impl<W: Write> DryRun<W> {
    pub(crate) fn new(conf: &ConfigFile, out: W) -> Self {
        Self {
            host: conf.host.clone(),
            authenticated: conf.api_token.is_some(),
            out,
        }
    }
}

impl<W: Write> ControlPlane for DryRun<W> {
    fn submit(&mut self, universe: &str, task: &Child) -> Result<(), ControlPlaneError> {
        let request = Request {
            host: &self.host,
            universe,
            authenticated: self.authenticated,
            task,
        };
        let doc = toml::to_string(&request)?;
        debug!("Rendered {} upgrade request for {universe}", task.kind());
        self.out.write_all(doc.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}
