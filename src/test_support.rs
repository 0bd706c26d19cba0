//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::api::{
    ApiError, ApiFuture, AttachmentRecord, BlockStorageApi, ComputeApi, CreateVolumeRequest,
    NetworkAddresses, ServerRecord, VolumeRecord,
};
use crate::ssh::{CommandOutput, CommandRunner, CommandSpec, SshError};

/// One control-plane call recorded by [`FakeCloud`], in issue order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CloudCall {
    /// Volume fetched by id.
    VolumeById(String),
    /// Volume name search.
    VolumesByName(String),
    /// Volume creation.
    CreateVolume {
        /// Requested size in gibibytes.
        size_gb: u64,
        /// Requested display name.
        display_name: Option<String>,
    },
    /// Volume deletion.
    DeleteVolume(String),
    /// Server fetched by id.
    ServerById(String),
    /// Server name search.
    ServersByName(String),
    /// Attachment issued through the compute plane.
    AttachVolume {
        /// Server receiving the volume.
        server_id: String,
        /// Volume being attached.
        volume_id: String,
        /// Requested device path.
        device: String,
    },
    /// Detachment issued through the compute plane.
    DetachVolume {
        /// Server the volume is detached from.
        server_id: String,
        /// Volume being detached.
        volume_id: String,
    },
    /// Address listing for a server.
    ServerAddresses(String),
}

/// A seeded compute instance with its network listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerStub {
    /// Server record returned by lookups.
    pub record: ServerRecord,
    /// Addresses grouped by network, in listing order.
    pub networks: Vec<NetworkAddresses>,
}

#[derive(Debug, Default)]
struct CloudState {
    volumes: Vec<VolumeRecord>,
    servers: Vec<ServerStub>,
    calls: Vec<CloudCall>,
    volume_lookup_errors: VecDeque<ApiError>,
    server_lookup_errors: VecDeque<ApiError>,
    next_volume: u32,
}

/// In-memory stand-in for both control planes.
///
/// Seed volumes and servers, hand [`FakeCloud::storage`] and
/// [`FakeCloud::compute`] to a helper, then assert on the recorded
/// [`CloudCall`] sequence. Attach and detach mutate the seeded volume
/// records so lifecycle flows behave like the platform.
#[derive(Clone, Debug, Default)]
pub struct FakeCloud {
    state: Arc<Mutex<CloudState>>,
}

impl FakeCloud {
    /// Creates an empty fake cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a volume record.
    pub fn seed_volume(&self, volume: VolumeRecord) {
        self.lock().volumes.push(volume);
    }

    /// Seeds a server record with its network listing.
    pub fn seed_server(&self, record: ServerRecord, networks: Vec<NetworkAddresses>) {
        self.lock().servers.push(ServerStub { record, networks });
    }

    /// Queues an error returned by the next volume id lookup.
    pub fn fail_next_volume_lookup(&self, error: ApiError) {
        self.lock().volume_lookup_errors.push_back(error);
    }

    /// Queues an error returned by the next server id lookup.
    pub fn fail_next_server_lookup(&self, error: ApiError) {
        self.lock().server_lookup_errors.push_back(error);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CloudCall> {
        self.lock().calls.clone()
    }

    /// Returns a snapshot of the current volume records.
    #[must_use]
    pub fn volumes(&self) -> Vec<VolumeRecord> {
        self.lock().volumes.clone()
    }

    /// Returns a block-storage handle backed by this fake.
    #[must_use]
    pub fn storage(&self) -> FakeBlockStorage {
        FakeBlockStorage {
            state: Arc::clone(&self.state),
        }
    }

    /// Returns a compute handle backed by this fake.
    #[must_use]
    pub fn compute(&self) -> FakeCompute {
        FakeCompute {
            state: Arc::clone(&self.state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock_state(state: &Mutex<CloudState>) -> MutexGuard<'_, CloudState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Block-storage handle over a [`FakeCloud`].
#[derive(Clone, Debug)]
pub struct FakeBlockStorage {
    state: Arc<Mutex<CloudState>>,
}

impl BlockStorageApi for FakeBlockStorage {
    fn volume_by_id<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, VolumeRecord> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::VolumeById(volume_id.to_owned()));
            if let Some(error) = state.volume_lookup_errors.pop_front() {
                return Err(error);
            }
            state
                .volumes
                .iter()
                .find(|volume| volume.id == volume_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("volume {volume_id}"),
                })
        })
    }

    fn volumes_by_display_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<VolumeRecord>> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::VolumesByName(name.to_owned()));
            Ok(state
                .volumes
                .iter()
                .filter(|volume| volume.display_name.as_deref() == Some(name))
                .cloned()
                .collect())
        })
    }

    fn create_volume<'a>(&'a self, request: &'a CreateVolumeRequest) -> ApiFuture<'a, VolumeRecord> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::CreateVolume {
                size_gb: request.size_gb,
                display_name: request.display_name.clone(),
            });
            state.next_volume += 1;
            let volume = VolumeRecord {
                id: format!("vol-{}", state.next_volume),
                display_name: request.display_name.clone(),
                status: String::from("available"),
                size_gb: request.size_gb,
                attachments: Vec::new(),
            };
            state.volumes.push(volume.clone());
            Ok(volume)
        })
    }

    fn delete_volume<'a>(&'a self, volume_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::DeleteVolume(volume_id.to_owned()));
            let before = state.volumes.len();
            state.volumes.retain(|volume| volume.id != volume_id);
            if state.volumes.len() == before {
                return Err(ApiError::NotFound {
                    resource: format!("volume {volume_id}"),
                });
            }
            Ok(())
        })
    }
}

/// Compute handle over a [`FakeCloud`].
#[derive(Clone, Debug)]
pub struct FakeCompute {
    state: Arc<Mutex<CloudState>>,
}

impl ComputeApi for FakeCompute {
    fn server_by_id<'a>(&'a self, server_id: &'a str) -> ApiFuture<'a, ServerRecord> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::ServerById(server_id.to_owned()));
            if let Some(error) = state.server_lookup_errors.pop_front() {
                return Err(error);
            }
            state
                .servers
                .iter()
                .find(|server| server.record.id == server_id)
                .map(|server| server.record.clone())
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("server {server_id}"),
                })
        })
    }

    fn servers_by_name<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<ServerRecord>> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::ServersByName(name.to_owned()));
            Ok(state
                .servers
                .iter()
                .filter(|server| server.record.name == name)
                .map(|server| server.record.clone())
                .collect())
        })
    }

    fn attach_volume<'a>(
        &'a self,
        server_id: &'a str,
        volume_id: &'a str,
        device: &'a str,
    ) -> ApiFuture<'a, AttachmentRecord> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::AttachVolume {
                server_id: server_id.to_owned(),
                volume_id: volume_id.to_owned(),
                device: device.to_owned(),
            });
            let attachment = AttachmentRecord {
                server_id: server_id.to_owned(),
                device: device.to_owned(),
            };
            if let Some(volume) = state
                .volumes
                .iter_mut()
                .find(|volume| volume.id == volume_id)
            {
                volume.attachments.push(attachment.clone());
            }
            Ok(attachment)
        })
    }

    fn detach_volume<'a>(&'a self, server_id: &'a str, volume_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state.calls.push(CloudCall::DetachVolume {
                server_id: server_id.to_owned(),
                volume_id: volume_id.to_owned(),
            });
            if let Some(volume) = state
                .volumes
                .iter_mut()
                .find(|volume| volume.id == volume_id)
            {
                volume
                    .attachments
                    .retain(|attachment| attachment.server_id != server_id);
            }
            Ok(())
        })
    }

    fn server_addresses<'a>(&'a self, server_id: &'a str) -> ApiFuture<'a, Vec<NetworkAddresses>> {
        Box::pin(async move {
            let mut state = lock_state(&self.state);
            state
                .calls
                .push(CloudCall::ServerAddresses(server_id.to_owned()));
            state
                .servers
                .iter()
                .find(|server| server.record.id == server_id)
                .map(|server| server.networks.clone())
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("server {server_id}"),
                })
        })
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandSpec>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Pushes a response with no exit code to simulate abnormal termination.
    pub fn push_missing_exit_code(&self) {
        self.push_output(None, "", "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(&self, code: Option<i32>, stdout: impl Into<String>, stderr: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, SshError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(spec.clone());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| SshError::Spawn {
                program: spec.program.clone(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Renders a [`CommandSpec`] as a shell-like string for assertions.
#[must_use]
pub fn command_string(spec: &CommandSpec) -> String {
    let mut parts = Vec::with_capacity(spec.args.len() + 1);
    parts.push(spec.program.clone());
    parts.extend(spec.args.iter().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }

    /// Sets a single environment variable while holding the global mutex.
    pub async fn set_var(key: &str, value: &str) -> Self {
        Self::set_vars(&[(key, value)]).await
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
