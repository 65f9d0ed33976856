//! Volume plugin operation surface.
//!
//! Typed requests and replies for the eight volume plugin operations. Field
//! names follow the plugin protocol (`Name`, `ID`, `Mountpoint`, `Err`, ...)
//! so a transport can decode requests and encode replies with serde
//! directly. Socket handling and endpoint routing live in the transport.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::coordinator::{Capabilities, MountCoordinator, Scope, VolumeInfo};
use crate::error::DriverError;

/// Request carrying only a volume name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameRequest {
    pub name: String,
}

impl NameRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Mount and unmount requests also carry the caller's mount session ID.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountRequest {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID", default)]
    pub id: String,
}

impl MountRequest {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// A decoded plugin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Capabilities,
    Create(NameRequest),
    List,
    Get(NameRequest),
    Remove(NameRequest),
    Mount(MountRequest),
    Unmount(MountRequest),
    Path(NameRequest),
}

impl Request {
    /// Operation name, for logs.
    pub fn operation(&self) -> &'static str {
        match self {
            Request::Capabilities => "Capabilities",
            Request::Create(_) => "Create",
            Request::List => "List",
            Request::Get(_) => "Get",
            Request::Remove(_) => "Remove",
            Request::Mount(_) => "Mount",
            Request::Unmount(_) => "Unmount",
            Request::Path(_) => "Path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesBody {
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<PathBuf>,
}

impl From<VolumeInfo> for VolumeBody {
    fn from(info: VolumeInfo) -> Self {
        Self {
            name: info.name,
            mountpoint: info.mountpoint,
        }
    }
}

/// Reply to a plugin request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    #[serde(rename_all = "PascalCase")]
    Capabilities { capabilities: CapabilitiesBody },
    #[serde(rename_all = "PascalCase")]
    List { volumes: Vec<VolumeBody> },
    #[serde(rename_all = "PascalCase")]
    Get { volume: VolumeBody },
    #[serde(rename_all = "PascalCase")]
    Mountpoint { mountpoint: PathBuf },
    #[serde(rename_all = "PascalCase")]
    Err { err: String },
    Empty {},
}

impl Reply {
    pub fn error(err: &DriverError) -> Self {
        Reply::Err {
            err: err.to_string(),
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Reply::Err { .. })
    }
}

impl From<Capabilities> for Reply {
    fn from(caps: Capabilities) -> Self {
        Reply::Capabilities {
            capabilities: CapabilitiesBody { scope: caps.scope },
        }
    }
}

/// Run one request against the coordinator.
///
/// Errors become `Err` replies; nothing is retried.
pub async fn dispatch(coordinator: &MountCoordinator, request: Request) -> Reply {
    let operation = request.operation();
    let result = match request {
        Request::Capabilities => Ok(coordinator.capabilities().into()),
        Request::Create(req) => coordinator.create(&req.name).await.map(|()| Reply::Empty {}),
        Request::List => coordinator.list().await.map(|volumes| Reply::List {
            volumes: volumes.into_iter().map(VolumeBody::from).collect(),
        }),
        Request::Get(req) => coordinator.get(&req.name).await.map(|info| Reply::Get {
            volume: info.into(),
        }),
        Request::Remove(req) => coordinator.remove(&req.name).await.map(|()| Reply::Empty {}),
        Request::Mount(req) => coordinator
            .mount(&req.name, &req.id)
            .await
            .map(|mountpoint| Reply::Mountpoint { mountpoint }),
        Request::Unmount(req) => coordinator
            .unmount(&req.name, &req.id)
            .await
            .map(|()| Reply::Empty {}),
        Request::Path(req) => coordinator
            .path(&req.name)
            .map(|mountpoint| Reply::Mountpoint { mountpoint }),
    };

    match result {
        Ok(reply) => reply,
        Err(e) => {
            warn!(operation, error = %e, "request failed");
            Reply::error(&e)
        }
    }
}
