// SPDX-License-Identifier: MIT

//! §4.H Lifecycle & Stream Facade: the `Machine` handle callers actually
//! hold. Wires the Store(A)/Planner(B)/Executor(C)/Dispatcher(D)/
//! Scheduler(F) pieces into one serialized dispatch loop, publishes the
//! four public streams, and owns the lifecycle state machine
//! (`Constructed -> Starting -> Started -> Stopping -> Stopped`, plus the
//! `Disposed` sink reachable from anywhere).
//!
//! `Machine` is a cheap `Clone` handle over an `Arc<Inner>` (teacher's own
//! `Handle`-over-`Arc<Shared>` pattern, `crates/engine/src/handle.rs`) so a
//! nested-machine child (`nested.rs`) and its background watcher task can
//! each hold an owned copy without fighting a lifetime.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use tsm_core::config::{DisposalPolicy, MachineConfig};
use tsm_core::error::EngineError;
use tsm_core::key::StateKey;
use tsm_core::kind::NodeKind;
use tsm_core::message::{Message, Msg};
use tsm_core::result::{Lifecycle, ProcessResult, Transition};
use tsm_core::tree::Tree;

use crate::dispatcher::dispatch;
use crate::executor::{execute, ExecuteRequest};
use crate::pending::PendingQueue;
use crate::planner::plan_start;
use crate::scheduler::Scheduler;
use crate::store::DataStore;

const TRANSITIONS_CAPACITY: usize = 256;
const PROCESSED_CAPACITY: usize = 256;
const ERRORS_CAPACITY: usize = 64;

/// `current_leaf` while `Stopped` (§4.H: "transitions current leaf to a
/// designated stopped sentinel; no user handlers run"). Not a key in any
/// tree — `stop()` writes it directly, bypassing the Executor entirely,
/// since running exit/entry hooks is exactly what "no user handlers run"
/// rules out.
fn stopped_sentinel() -> StateKey {
    StateKey::new("<stopped>")
}

/// The error type every public `Machine` method surfaces. `EngineError`
/// doesn't implement `Clone` (it carries a boxed handler failure), so the
/// facade boundary wraps it once in an `Arc` here rather than reconstructing
/// an owned copy for each of "return it" and "publish it on `errors`".
pub type MachineError = Arc<EngineError>;

/// A caller-owned mpsc pair, obtainable before any `Machine` exists.
/// Required when a tree contains [`crate::nested::nested_leaf`]s: build this
/// first, hand `sender()` to every `nested_leaf` call while assembling the
/// tree, then finish construction with [`Machine::with_external_queue`].
/// The common, non-nested path never needs this — `Machine::new` builds its
/// own internally.
pub struct ExternalQueue {
    tx: mpsc::UnboundedSender<Msg>,
    rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<Msg>>>,
}

impl ExternalQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: parking_lot::Mutex::new(Some(rx)) }
    }

    /// A sender into this queue. Every tick/notification a [`Scheduler`] or
    /// nested-machine watcher produces lands on the dispatch loop through a
    /// clone of this.
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.tx.clone()
    }
}

impl Default for ExternalQueue {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    tree: Arc<Tree>,
    store: DataStore,
    pending: PendingQueue,
    scheduler: Scheduler,
    config: MachineConfig,

    current_leaf: RwLock<StateKey>,
    lifecycle_tx: watch::Sender<Lifecycle>,
    transitions_tx: broadcast::Sender<Transition>,
    processed_tx: broadcast::Sender<ProcessResult>,
    errors_tx: broadcast::Sender<MachineError>,

    /// Serializes every dispatch (send/start/stop/dispose) onto one loop
    /// (§5: "exactly one dispatch in flight at a time").
    dispatch_lock: AsyncMutex<()>,
    /// Guards `start()`'s idempotency separately from `dispatch_lock`, so a
    /// `send()` racing a concurrent `start()` call observes a consistent
    /// lifecycle rather than interleaving with the startup transition.
    start_lock: AsyncMutex<()>,

    pump: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// The running engine (§4.H). Thread-safe, cheaply cloneable; every clone
/// refers to the same machine.
#[derive(Clone)]
pub struct Machine(Arc<Inner>);

/// A point-in-time view of a [`Machine`], independent of the metrics
/// surface the spec excludes (§9 Non-goals) — just enough to answer "is
/// this machine stuck" without subscribing to any stream.
#[derive(Debug, Clone)]
pub struct MachineHealth {
    pub lifecycle: Lifecycle,
    pub current_leaf: StateKey,
    pub pending_len: usize,
}

/// A non-replaying view onto one data-bearing node's updates (§4.A
/// `data_stream`). Thin wrapper over the store's type-erased broadcast
/// channel so callers never see the `Arc<dyn Any>` underneath.
pub struct DataStream<D> {
    rx: broadcast::Receiver<Arc<dyn Any + Send + Sync>>,
    _marker: std::marker::PhantomData<fn() -> D>,
}

impl<D: Clone + Send + Sync + 'static> DataStream<D> {
    /// Await the next update. `None` once the owning node has exited (the
    /// store drops its sender) or the machine is disposed.
    pub async fn next(&mut self) -> Option<D> {
        loop {
            match self.rx.recv().await {
                Ok(value) => match value.downcast_ref::<D>() {
                    Some(d) => return Some(d.clone()),
                    None => continue,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "data stream lagged, skipping to latest");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Machine {
    /// The common path: build a tree, build a config, get a `Machine`. Owns
    /// its external-injection channel internally.
    pub fn new(tree: Arc<Tree>, config: MachineConfig) -> Self {
        Self::with_external_queue(tree, config, ExternalQueue::new())
    }

    /// Advanced path for trees containing [`crate::nested::nested_leaf`]
    /// entries: `queue` must be the same [`ExternalQueue`] whose `sender()`
    /// was handed to every such leaf while the tree was built.
    pub fn with_external_queue(tree: Arc<Tree>, config: MachineConfig, queue: ExternalQueue) -> Self {
        let store = DataStore::new(tree.clone());
        let pending = PendingQueue::new();
        let ext_tx = queue.sender();
        let scheduler = Scheduler::new(ext_tx);
        let (lifecycle_tx, _lifecycle_rx) = watch::channel(Lifecycle::Constructed);
        let (transitions_tx, _) = broadcast::channel(TRANSITIONS_CAPACITY);
        let (processed_tx, _) = broadcast::channel(PROCESSED_CAPACITY);
        let (errors_tx, _) = broadcast::channel(ERRORS_CAPACITY);
        let root = tree.root_key().clone();

        let inner = Arc::new(Inner {
            tree,
            store,
            pending,
            scheduler,
            config,
            current_leaf: RwLock::new(root),
            lifecycle_tx,
            transitions_tx,
            processed_tx,
            errors_tx,
            dispatch_lock: AsyncMutex::new(()),
            start_lock: AsyncMutex::new(()),
            pump: parking_lot::Mutex::new(None),
        });

        let ext_rx = queue.rx.lock().take().unwrap_or_else(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            drop(tx);
            rx
        });
        let handle = spawn_pump(inner.clone(), ext_rx);
        *inner.pump.lock() = Some(handle);

        Machine(inner)
    }

    /// §4.H `start`: idempotent ascent from `Constructed` through a
    /// synthetic root-to-initial-leaf transition to `Started`.
    pub async fn start(&self) -> Result<Transition, MachineError> {
        let _start_guard = self.0.start_lock.lock().await;
        let _dispatch_guard = self.0.dispatch_lock.lock().await;

        let current = *self.0.lifecycle_tx.borrow();
        if current == Lifecycle::Disposed {
            return Err(Arc::new(EngineError::Disposed));
        }
        if current != Lifecycle::Constructed {
            return Ok(Transition::empty(self.0.current_leaf.read().clone()));
        }

        let _ = self.0.lifecycle_tx.send(Lifecycle::Starting);
        debug!(target = ?self.0.config.initial_target, "starting machine");

        let plan = plan_start(&self.0.tree, self.0.config.initial_target.as_ref());
        let req = ExecuteRequest {
            tree: &self.0.tree,
            store: &self.0.store,
            pending: &self.0.pending,
            scheduler: &self.0.scheduler,
            plan,
            payload: None,
            action: None,
            receiving: self.0.tree.root_key().clone(),
            trigger: "start".to_string(),
        };

        let transition = match execute(req).await {
            Ok(t) => t,
            Err(err) => {
                let shared = Arc::new(err);
                let _ = self.0.errors_tx.send(shared.clone());
                return Err(shared);
            }
        };

        *self.0.current_leaf.write() = transition.to.clone();
        let _ = self.0.processed_tx.send(ProcessResult::Handled(tsm_core::result::Handled {
            receiving: transition.from.clone(),
            handling: transition.from.clone(),
            transition: Some(transition.clone()),
        }));
        let _ = self.0.transitions_tx.send(transition.clone());
        let _ = self.0.lifecycle_tx.send(Lifecycle::Started);
        info!(leaf = %transition.to, "machine started");

        self.drain_pending().await;
        Ok(transition)
    }

    /// §4.H `stop`: moves `current_leaf` to a stopped sentinel without
    /// running any exit/entry hooks. Scheduled tasks owned by the
    /// previously-active path are cancelled and their data cells released
    /// directly, since the normal exit path (which would do this as a side
    /// effect of `on_exit`) never runs.
    pub async fn stop(&self) -> Result<(), MachineError> {
        let _dispatch_guard = self.0.dispatch_lock.lock().await;

        let current = *self.0.lifecycle_tx.borrow();
        if current != Lifecycle::Started {
            return Ok(());
        }

        let _ = self.0.lifecycle_tx.send(Lifecycle::Stopping);
        let leaf = self.0.current_leaf.read().clone();
        for key in self.0.tree.ancestors_of(leaf) {
            self.0.scheduler.cancel_owner(&key);
            let _ = self.0.store.release(&key);
        }
        *self.0.current_leaf.write() = stopped_sentinel();
        let _ = self.0.lifecycle_tx.send(Lifecycle::Stopped);
        info!("machine stopped");
        Ok(())
    }

    /// §4.H `dispose`: valid from any lifecycle state, idempotent. Cancels
    /// every scheduled task, applies `disposal_policy` to whatever is still
    /// queued, releases every data cell still allocated, and stops the
    /// background pump that forwards scheduler ticks and nested-machine
    /// notifications into the dispatch loop.
    pub async fn dispose(&self) {
        let _dispatch_guard = self.0.dispatch_lock.lock().await;

        if *self.0.lifecycle_tx.borrow() == Lifecycle::Disposed {
            return;
        }

        match self.0.config.disposal_policy {
            DisposalPolicy::DropPending => {
                let dropped = self.0.pending.clear();
                if dropped > 0 {
                    debug!(dropped, "dropped pending messages on dispose");
                }
            }
            DisposalPolicy::DrainPending => {
                while let Some(msg) = self.0.pending.pop() {
                    let _ = self.run_one(msg).await;
                }
            }
        }

        self.0.scheduler.cancel_all();
        let leaf = self.0.current_leaf.read().clone();
        for key in self.0.tree.ancestors_of(leaf) {
            let _ = self.0.store.release(&key);
        }

        if let Some(handle) = self.0.pump.lock().take() {
            handle.abort();
        }

        let _ = self.0.lifecycle_tx.send(Lifecycle::Disposed);
        info!("machine disposed");
    }

    /// Public `send` (§4.D, §6): lifts `msg` into an envelope and runs it
    /// to completion, including any cascaded redirects and subsequently
    /// drained posted messages.
    pub async fn send<T: Message>(&self, msg: T) -> Result<ProcessResult, MachineError> {
        self.send_msg(Msg::new(msg)).await
    }

    pub(crate) async fn send_msg(&self, msg: Msg) -> Result<ProcessResult, MachineError> {
        let _guard = self.0.dispatch_lock.lock().await;
        if *self.0.lifecycle_tx.borrow() != Lifecycle::Started {
            return Err(Arc::new(EngineError::NotRunning));
        }
        let result = self.run_one(msg).await;
        self.drain_pending().await;
        result
    }

    /// Drain everything `ctx.post()` queued during the last dispatch (and,
    /// transitively, during each drained message's own dispatch), FIFO
    /// (§4.D "Concurrency contract"). Errors surfacing from a drained
    /// message have no direct caller to return to — they are only
    /// observable on the `errors` stream.
    async fn drain_pending(&self) {
        while let Some(msg) = self.0.pending.pop() {
            let _ = self.run_one(msg).await;
        }
    }

    /// Run exactly one message through the dispatcher, apply its transition
    /// (if any) to `current_leaf`, and publish streams in the order §5
    /// fixes: `processed_messages` before `transitions`.
    async fn run_one(&self, msg: Msg) -> Result<ProcessResult, MachineError> {
        let current = self.0.current_leaf.read().clone();
        match dispatch(&self.0.tree, &self.0.store, &self.0.pending, &self.0.scheduler, self.0.config.redirect_limit, &current, &msg)
            .await
        {
            Ok(result) => {
                let _ = self.0.processed_tx.send(result.clone());
                if let Some(transition) = result.transition() {
                    *self.0.current_leaf.write() = transition.to.clone();
                    let _ = self.0.transitions_tx.send(transition.clone());
                }
                Ok(result)
            }
            Err(err) => {
                let shared = Arc::new(err);
                let _ = self.0.errors_tx.send(shared.clone());
                Err(shared)
            }
        }
    }

    pub fn current_leaf(&self) -> StateKey {
        self.0.current_leaf.read().clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.0.lifecycle_tx.borrow()
    }

    pub fn is_active(&self, key: &StateKey) -> bool {
        self.0.tree.is_ancestor_or_self(key, &self.current_leaf())
    }

    pub(crate) fn is_final_leaf(&self, key: &StateKey) -> bool {
        self.0.tree.get(key).map(|def| def.kind == NodeKind::FinalLeaf).unwrap_or(false)
    }

    /// Data of the resolved node as of right now (§4.A, §6). Outside any
    /// in-flight handler, so resolution anchors on the current leaf.
    pub fn data<D: Clone + 'static>(&self, key: Option<&StateKey>) -> Result<D, MachineError> {
        let anchor = self.current_leaf();
        let mut out: Option<D> = None;
        self.0
            .store
            .read(&anchor, key, TypeId::of::<D>(), &mut |any| {
                out = any.downcast_ref::<D>().cloned();
            })
            .map_err(Arc::new)?;
        out.ok_or_else(|| {
            Arc::new(EngineError::DataUnavailable { key: key.cloned().unwrap_or(anchor), reason: "type mismatch after lookup" })
        })
    }

    pub fn data_stream<D: Clone + Send + Sync + 'static>(&self, key: &StateKey) -> Result<DataStream<D>, MachineError> {
        let rx = self.0.store.subscribe(key, TypeId::of::<D>()).map_err(Arc::new)?;
        Ok(DataStream { rx, _marker: std::marker::PhantomData })
    }

    pub fn transitions(&self) -> broadcast::Receiver<Transition> {
        self.0.transitions_tx.subscribe()
    }

    pub fn processed_messages(&self) -> broadcast::Receiver<ProcessResult> {
        self.0.processed_tx.subscribe()
    }

    pub fn errors(&self) -> broadcast::Receiver<MachineError> {
        self.0.errors_tx.subscribe()
    }

    /// `watch` rather than the literal `broadcast` §4.H wording: a
    /// subscriber that attaches after `start()` still needs to observe the
    /// current lifecycle without having raced the transition that produced
    /// it, which only `watch`'s replay-current-value semantics give for
    /// free (see DESIGN.md).
    pub fn lifecycle_stream(&self) -> watch::Receiver<Lifecycle> {
        self.0.lifecycle_tx.subscribe()
    }

    pub(crate) fn subscribe_transitions(&self) -> broadcast::Receiver<Transition> {
        self.transitions()
    }

    pub(crate) fn subscribe_lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle_stream()
    }

    pub fn health(&self) -> MachineHealth {
        MachineHealth { lifecycle: self.lifecycle(), current_leaf: self.current_leaf(), pending_len: self.0.pending.len() }
    }

    /// Build a snapshot of the active path and every node's data along it
    /// (§4.H persist/restore), ready for `tsm-storage` to serialize. Nodes
    /// without a `data_codec` are skipped — only explicitly codec-tagged
    /// nodes round-trip through a snapshot.
    pub fn save_snapshot(&self) -> Result<Snapshot, MachineError> {
        let leaf = self.current_leaf();
        let mut active_path: Vec<StateKey> = self.0.tree.ancestors_of(leaf).collect();
        active_path.reverse();

        let mut data = HashMap::new();
        for key in &active_path {
            let Some(def) = self.0.tree.get(key) else { continue };
            if !def.is_data_bearing() {
                continue;
            }
            let Some(codec) = def.data_codec.clone() else { continue };
            let Some(type_id) = def.data_type() else { continue };

            let mut encoded = None;
            self.0
                .store
                .visit(key, Some(key), type_id, &mut |any| {
                    encoded = Some(codec.encode(any));
                })
                .map_err(Arc::new)?;

            match encoded {
                Some(Ok(value)) => {
                    data.insert(key.clone(), value);
                }
                Some(Err(err)) => {
                    warn!(%key, %err, "skipping node in snapshot: codec encode failed");
                }
                None => {}
            }
        }

        Ok(Snapshot { schema_version: SNAPSHOT_SCHEMA_VERSION, active_path, data })
    }

    /// Restore a [`Snapshot`] taken earlier (§4.H persist/restore). Only
    /// legal from `Constructed`. Every key on `snapshot.active_path` must
    /// exist in this machine's tree with matching parent links; every
    /// codec-tagged node on that path must have a corresponding, decodable
    /// entry in `snapshot.data`. On success, moves directly to `Started`
    /// with the restored state active — unlike `start()`, no `on_enter`
    /// hooks run (the loaded data already reflects each node's entered
    /// state; re-running entry hooks against it would double-apply whatever
    /// side effects they perform, see DESIGN.md).
    pub fn load_snapshot(&self, snapshot: Snapshot) -> Result<(), MachineError> {
        if *self.0.lifecycle_tx.borrow() != Lifecycle::Constructed {
            return Err(Arc::new(EngineError::IncompatibleSnapshot {
                reason: "machine is not in the Constructed lifecycle state".to_string(),
            }));
        }
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(Arc::new(EngineError::IncompatibleSnapshot {
                reason: format!("unsupported schema_version {}", snapshot.schema_version),
            }));
        }

        let mut expected_parent: Option<StateKey> = None;
        for key in &snapshot.active_path {
            let def = self.0.tree.get(key).ok_or_else(|| {
                Arc::new(EngineError::IncompatibleSnapshot { reason: format!("unknown state key {key}") })
            })?;
            if def.parent != expected_parent {
                return Err(Arc::new(EngineError::IncompatibleSnapshot {
                    reason: format!("state {key} parent link does not match the saved path"),
                }));
            }
            expected_parent = Some(key.clone());

            if !def.is_data_bearing() {
                continue;
            }
            let Some(codec) = def.data_codec.clone() else { continue };
            let value = snapshot.data.get(key).ok_or_else(|| {
                Arc::new(EngineError::IncompatibleSnapshot { reason: format!("missing saved data for {key}") })
            })?;
            let decoded = codec.decode(value.clone()).map_err(|err| {
                Arc::new(EngineError::IncompatibleSnapshot { reason: format!("decode failed for {key}: {err}") })
            })?;
            self.0.store.allocate(key, decoded).map_err(Arc::new)?;
        }

        if let Some(leaf) = snapshot.active_path.last() {
            *self.0.current_leaf.write() = leaf.clone();
        }
        let _ = self.0.lifecycle_tx.send(Lifecycle::Started);
        info!(leaf = ?snapshot.active_path.last(), "machine restored from snapshot");
        Ok(())
    }
}

fn spawn_pump(inner: Arc<Inner>, mut ext_rx: mpsc::UnboundedReceiver<Msg>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = ext_rx.recv().await {
            let machine = Machine(inner.clone());
            if let Err(err) = machine.send_msg(msg).await {
                warn!(%err, "externally-injected message was not processed");
            }
        }
    })
}

/// Schema version bumped whenever [`Snapshot`]'s shape changes in a way
/// `load_snapshot` can't interpret under the old rules.
const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// §4.H "Persist/restore": `{schema_version, active_path, data}`, where
/// `data` holds one `serde_json::Value` per codec-tagged node on the active
/// path. `tsm-storage` owns turning this into bytes (and back); this type
/// is the boundary between the two crates.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub active_path: Vec<StateKey>,
    pub data: HashMap<StateKey, serde_json::Value>,
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
