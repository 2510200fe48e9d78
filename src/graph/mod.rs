//! Thread-safe bidirectional graph store with edit-notification fan-out
//!
//! The store is generic over its node and connection payloads; the builders
//! instantiate it with their own closed payload types, so lookups stay
//! exhaustively typed. All structural mutation is linearized by one mutex.
//! Edit events are decoupled from mutation through an internal unbounded
//! queue drained by a single dispatch task: a slow subscriber delays
//! delivery to subscribers, never a structural mutation.
//!
//! The mutex guards map structure only. Payloads stored here are either
//! passive values or cheap clone-able handles; mutable behavioral state
//! belongs to the owning actor and is reached through its channels.

pub mod events;

use std::sync::{Arc, Mutex, MutexGuard};

use ahash::AHashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::types::{ConnectionId, NodeId};

pub use events::{ConnectionEdit, EditAction, NodeEdit};

/// Outcome of an `add_connection` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The connection was created
    Success(ConnectionId),
    /// An edge already joins these nodes; the new payload was discarded
    /// and the existing connection's id is reported
    AlreadyExists(ConnectionId),
    /// Both endpoints name the same node; rejected whether or not it exists
    SelfLoop,
    /// At least one endpoint id is unknown
    NodesMissing,
}

struct NodeEntry<N> {
    payload: N,
    /// Neighbor node id -> connection joining us to it
    adjacency: AHashMap<NodeId, ConnectionId>,
}

struct ConnectionEntry<C> {
    first: NodeId,
    second: NodeId,
    payload: C,
}

struct GraphState<N, C> {
    nodes: AHashMap<NodeId, NodeEntry<N>>,
    connections: AHashMap<ConnectionId, ConnectionEntry<C>>,
    next_node: u32,
    next_connection: u32,
}

/// Handle to a shared graph store. Cheap to clone; all clones address the
/// same store and the same dispatch loop.
pub struct Graph<N, C> {
    state: Arc<Mutex<GraphState<N, C>>>,
    node_events: mpsc::UnboundedSender<NodeEdit<N>>,
    connection_events: mpsc::UnboundedSender<ConnectionEdit<C>>,
    node_subscriptions: mpsc::UnboundedSender<mpsc::Sender<NodeEdit<N>>>,
    connection_subscriptions: mpsc::UnboundedSender<mpsc::Sender<ConnectionEdit<C>>>,
    shutdown: mpsc::Sender<()>,
}

impl<N, C> Clone for Graph<N, C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            node_events: self.node_events.clone(),
            connection_events: self.connection_events.clone(),
            node_subscriptions: self.node_subscriptions.clone(),
            connection_subscriptions: self.connection_subscriptions.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<N, C> Graph<N, C>
where
    N: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    /// Create an empty store and spawn its dispatch loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (node_events, node_event_rx) = mpsc::unbounded_channel();
        let (connection_events, connection_event_rx) = mpsc::unbounded_channel();
        let (node_subscriptions, node_sub_rx) = mpsc::unbounded_channel();
        let (connection_subscriptions, connection_sub_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(dispatch(
            node_event_rx,
            connection_event_rx,
            node_sub_rx,
            connection_sub_rx,
            shutdown_rx,
        ));

        Self {
            state: Arc::new(Mutex::new(GraphState {
                nodes: AHashMap::new(),
                connections: AHashMap::new(),
                next_node: 0,
                next_connection: 0,
            })),
            node_events,
            connection_events,
            node_subscriptions,
            connection_subscriptions,
            shutdown,
        }
    }

    fn guard(&self) -> MutexGuard<'_, GraphState<N, C>> {
        // Recover from poisoning: map structure stays consistent because
        // every mutation completes before the guard drops
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a node, returning its id. Never fails.
    pub fn add_node(&self, payload: N) -> NodeId {
        self.add_node_with(|_| payload)
    }

    /// Add a node whose payload needs to know its own id (actor handles
    /// stamp their node id into forwarded messages).
    pub fn add_node_with(&self, build: impl FnOnce(NodeId) -> N) -> NodeId {
        let mut state = self.guard();
        let id = NodeId(state.next_node);
        state.next_node += 1;

        let payload = build(id);
        state.nodes.insert(
            id,
            NodeEntry {
                payload: payload.clone(),
                adjacency: AHashMap::new(),
            },
        );
        let _ = self.node_events.send(NodeEdit {
            action: EditAction::Added,
            node: id,
            payload,
        });
        id
    }

    /// Add an undirected connection between two existing nodes.
    ///
    /// Duplicate requests are rejected, not overwritten: the existing
    /// connection's id is reported and the new payload discarded.
    pub fn add_connection(&self, first: NodeId, second: NodeId, payload: C) -> ConnectionStatus {
        self.add_connection_with(first, second, |_| payload)
    }

    /// Add a connection whose payload needs to know its own id (line actors
    /// are spawned knowing the connection id they simulate). The builder is
    /// only invoked once the connection is actually created.
    pub fn add_connection_with(
        &self,
        first: NodeId,
        second: NodeId,
        build: impl FnOnce(ConnectionId) -> C,
    ) -> ConnectionStatus {
        if first == second {
            return ConnectionStatus::SelfLoop;
        }

        let mut state = self.guard();
        if !state.nodes.contains_key(&first) || !state.nodes.contains_key(&second) {
            return ConnectionStatus::NodesMissing;
        }
        if let Some(&existing) = state.nodes[&first].adjacency.get(&second) {
            return ConnectionStatus::AlreadyExists(existing);
        }

        let id = ConnectionId(state.next_connection);
        state.next_connection += 1;

        let payload = build(id);
        state.connections.insert(
            id,
            ConnectionEntry {
                first,
                second,
                payload: payload.clone(),
            },
        );
        if let Some(node) = state.nodes.get_mut(&first) {
            node.adjacency.insert(second, id);
        }
        if let Some(node) = state.nodes.get_mut(&second) {
            node.adjacency.insert(first, id);
        }

        let _ = self.connection_events.send(ConnectionEdit {
            action: EditAction::Added,
            connection: id,
            first,
            second,
            payload,
        });
        ConnectionStatus::Success(id)
    }

    /// Remove the connection between two nodes, in both adjacency
    /// directions. Returns whether anything was actually removed.
    pub fn delete_connection(&self, first: NodeId, second: NodeId) -> bool {
        let mut state = self.guard();
        let Some(id) = state
            .nodes
            .get(&first)
            .and_then(|node| node.adjacency.get(&second).copied())
        else {
            return false;
        };

        if let Some(node) = state.nodes.get_mut(&first) {
            node.adjacency.remove(&second);
        }
        if let Some(node) = state.nodes.get_mut(&second) {
            node.adjacency.remove(&first);
        }
        if let Some(entry) = state.connections.remove(&id) {
            let _ = self.connection_events.send(ConnectionEdit {
                action: EditAction::Removed,
                connection: id,
                first: entry.first,
                second: entry.second,
                payload: entry.payload,
            });
        }
        true
    }

    /// Remove a node and every incident connection. Each severed connection
    /// fires its own removal edit before the node-removed edit.
    pub fn delete_node(&self, node: NodeId) -> Option<NodeId> {
        let mut state = self.guard();
        let entry = state.nodes.remove(&node)?;

        for (neighbor, connection) in entry.adjacency {
            if let Some(other) = state.nodes.get_mut(&neighbor) {
                other.adjacency.remove(&node);
            }
            if let Some(severed) = state.connections.remove(&connection) {
                let _ = self.connection_events.send(ConnectionEdit {
                    action: EditAction::Removed,
                    connection,
                    first: severed.first,
                    second: severed.second,
                    payload: severed.payload,
                });
            }
        }

        let _ = self.node_events.send(NodeEdit {
            action: EditAction::Removed,
            node,
            payload: entry.payload,
        });
        Some(node)
    }

    /// Clone out a node payload.
    pub fn get_node(&self, node: NodeId) -> Option<N> {
        self.guard().nodes.get(&node).map(|n| n.payload.clone())
    }

    /// Clone out a connection payload.
    pub fn get_connection(&self, connection: ConnectionId) -> Option<C> {
        self.guard()
            .connections
            .get(&connection)
            .map(|c| c.payload.clone())
    }

    /// The connection joining two nodes, if any.
    pub fn connection_between(&self, first: NodeId, second: NodeId) -> Option<(ConnectionId, C)> {
        let state = self.guard();
        let id = state.nodes.get(&first)?.adjacency.get(&second).copied()?;
        let payload = state.connections.get(&id)?.payload.clone();
        Some((id, payload))
    }

    /// The two endpoints of a connection.
    pub fn connection_endpoints(&self, connection: ConnectionId) -> Option<(NodeId, NodeId)> {
        self.guard()
            .connections
            .get(&connection)
            .map(|c| (c.first, c.second))
    }

    /// Neighbors of a node, sorted by neighbor id for deterministic order.
    pub fn neighbors(&self, node: NodeId) -> Vec<(NodeId, ConnectionId)> {
        let state = self.guard();
        let Some(entry) = state.nodes.get(&node) else {
            return Vec::new();
        };
        let mut neighbors: Vec<_> = entry
            .adjacency
            .iter()
            .map(|(&neighbor, &connection)| (neighbor, connection))
            .collect();
        neighbors.sort_unstable_by_key(|&(neighbor, _)| neighbor);
        neighbors
    }

    pub fn node_count(&self) -> usize {
        self.guard().nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.guard().connections.len()
    }

    /// Register a subscriber for node edits. Every subscriber receives
    /// every subsequent edit, in mutation order.
    pub fn subscribe_node_edits(&self, tx: mpsc::Sender<NodeEdit<N>>) {
        let _ = self.node_subscriptions.send(tx);
    }

    /// Register a subscriber for connection edits.
    pub fn subscribe_connection_edits(&self, tx: mpsc::Sender<ConnectionEdit<C>>) {
        let _ = self.connection_subscriptions.send(tx);
    }

    /// Terminate the dispatch loop. Edits already queued are dropped.
    /// The loop also exits when every store handle has been dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown.try_send(());
    }
}

/// Dispatch loop: drains the internal edit queues and fans each edit out to
/// every registered subscriber. Subscribers whose channel has closed are
/// dropped from the list.
async fn dispatch<N: Clone, C: Clone>(
    mut node_events: mpsc::UnboundedReceiver<NodeEdit<N>>,
    mut connection_events: mpsc::UnboundedReceiver<ConnectionEdit<C>>,
    mut node_subscriptions: mpsc::UnboundedReceiver<mpsc::Sender<NodeEdit<N>>>,
    mut connection_subscriptions: mpsc::UnboundedReceiver<mpsc::Sender<ConnectionEdit<C>>>,
    mut shutdown: mpsc::Receiver<()>,
) {
    let mut node_subs: Vec<mpsc::Sender<NodeEdit<N>>> = Vec::new();
    let mut connection_subs: Vec<mpsc::Sender<ConnectionEdit<C>>> = Vec::new();

    loop {
        tokio::select! {
            Some(tx) = node_subscriptions.recv() => node_subs.push(tx),
            Some(tx) = connection_subscriptions.recv() => connection_subs.push(tx),
            Some(edit) = node_events.recv() => deliver(&mut node_subs, edit).await,
            Some(edit) = connection_events.recv() => deliver(&mut connection_subs, edit).await,
            _ = shutdown.recv() => break,
            else => break,
        }
    }
    debug!("graph dispatch loop exited");
}

async fn deliver<T: Clone>(subs: &mut Vec<mpsc::Sender<T>>, event: T) {
    let mut stale = Vec::new();
    for (idx, sub) in subs.iter().enumerate() {
        if sub.send(event.clone()).await.is_err() {
            stale.push(idx);
        }
    }
    for idx in stale.into_iter().rev() {
        subs.remove(idx);
    }
}
