use crate::utils::Event;
use log::{debug, info};
use mcsv_protocol::management::instance::ServerEvent;
use mcsv_protocol::minecraft::{Player, PlayerAction};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEvent {
    /// A player joined, or reconnected from a different address.
    PlayerAdded(Player),
    PlayerRemoved(Player),
    /// The run ended or a new one began; nobody is online.
    Cleared,
}

/// Connected players in join order, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    fn remove(&mut self, name: &str) -> Option<Player> {
        let pos = self.players.iter().position(|p| p.name == name)?;
        Some(self.players.remove(pos))
    }

    fn remove_named(&mut self, name: &str) -> Vec<RosterEvent> {
        self.remove(name)
            .map(RosterEvent::PlayerRemoved)
            .into_iter()
            .collect()
    }

    pub fn apply_action(&mut self, action: &PlayerAction) -> Vec<RosterEvent> {
        match action {
            PlayerAction::Join { name, ip } => {
                match self.players.iter_mut().find(|p| &p.name == name) {
                    Some(player) => {
                        // reconnect: only a newly known address changes anything
                        if ip.is_some() && player.ip != *ip {
                            player.ip = *ip;
                            vec![RosterEvent::PlayerAdded(player.clone())]
                        } else {
                            vec![]
                        }
                    }
                    None => {
                        let player = Player::new(name.clone(), *ip);
                        self.players.push(player.clone());
                        vec![RosterEvent::PlayerAdded(player)]
                    }
                }
            }
            PlayerAction::IpBan { name } => match name.parse::<IpAddr>() {
                Ok(ip) => {
                    let (banned, kept): (Vec<Player>, Vec<Player>) =
                        std::mem::take(&mut self.players)
                            .into_iter()
                            .partition(|p| p.ip == Some(ip));
                    self.players = kept;
                    banned.into_iter().map(RosterEvent::PlayerRemoved).collect()
                }
                Err(_) => self.remove_named(name),
            },
            PlayerAction::Leave { name }
            | PlayerAction::Kick { name }
            | PlayerAction::Ban { name } => self.remove_named(name),
        }
    }

    pub fn clear(&mut self) -> RosterEvent {
        self.players.clear();
        RosterEvent::Cleared
    }

    /// Reacts to one supervisor event.
    pub fn apply(&mut self, event: &ServerEvent) -> Vec<RosterEvent> {
        match event {
            ServerEvent::Started { .. }
            | ServerEvent::Stopped { .. }
            | ServerEvent::Crashed { .. } => vec![self.clear()],
            ServerEvent::Output(output) => match &output.line.action {
                Some(action) => self.apply_action(action),
                None => vec![],
            },
            _ => vec![],
        }
    }
}

/// Live roster fed by the supervisor's event stream.
///
/// The roster itself is owned by a single task; readers get immutable snapshots.
pub struct PlayerRoster {
    snapshot: watch::Receiver<Arc<Vec<Player>>>,
    events: Arc<Event<RosterEvent>>,
    task: JoinHandle<()>,
}

impl PlayerRoster {
    pub fn attach(server_events: &Event<ServerEvent>) -> Self {
        let (_, rx) = server_events.subscribe();
        let (snapshot_tx, snapshot) = watch::channel(Arc::new(vec![]));
        let events = Arc::new(Event::new());
        let task = tokio::spawn(Self::run(rx, snapshot_tx, events.clone()));
        Self {
            snapshot,
            events,
            task,
        }
    }

    async fn run(
        mut rx: mpsc::UnboundedReceiver<ServerEvent>,
        snapshot_tx: watch::Sender<Arc<Vec<Player>>>,
        events: Arc<Event<RosterEvent>>,
    ) {
        let mut roster = Roster::default();
        while let Some(event) = rx.recv().await {
            let changes = roster.apply(&event);
            if changes.is_empty() {
                continue;
            }
            snapshot_tx.send_replace(Arc::new(roster.players().to_vec()));
            for change in changes {
                match &change {
                    RosterEvent::PlayerAdded(player) => match player.ip {
                        Some(ip) => info!(target: "players", "{} joined from {}", player.name, ip),
                        None => info!(target: "players", "{} joined", player.name),
                    },
                    RosterEvent::PlayerRemoved(player) => {
                        info!(target: "players", "{} left", player.name)
                    }
                    RosterEvent::Cleared => debug!(target: "players", "roster cleared"),
                }
                events.invoke(change);
            }
        }
    }

    pub fn list(&self) -> Arc<Vec<Player>> {
        self.snapshot.borrow().clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot.borrow().iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<Player> {
        self.snapshot.borrow().iter().find(|p| p.name == name).cloned()
    }

    pub fn events(&self) -> Arc<Event<RosterEvent>> {
        self.events.clone()
    }
}

impl Drop for PlayerRoster {
    fn drop(&mut self) {
        self.task.abort();
    }
}
