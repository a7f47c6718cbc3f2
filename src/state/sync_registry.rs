use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::{
    config::LobbyConfig,
    dao::game_store::GameStore,
    services::sync_service::{self, SyncHandle},
    state::snapshot::GameSnapshot,
};

struct Entry {
    instance: Uuid,
    handle: SyncHandle,
    leases: usize,
}

/// One shared synchronizer per game id, reference-counted by [`SyncLease`]s.
#[derive(Clone, Default)]
pub struct SyncRegistry {
    entries: Arc<DashMap<Uuid, Entry>>,
}

impl SyncRegistry {
    /// Lease the synchronizer of `game_id`, starting it on first use.
    pub fn acquire(
        &self,
        store: Arc<dyn GameStore>,
        lobby: LobbyConfig,
        game_id: Uuid,
    ) -> SyncLease {
        let mut entry = self.entries.entry(game_id).or_insert_with(|| {
            debug!(game_id = %game_id, "starting game synchronizer");
            Entry {
                instance: Uuid::new_v4(),
                handle: sync_service::spawn(store, lobby, game_id),
                leases: 0,
            }
        });
        entry.leases += 1;

        SyncLease {
            game_id,
            instance: entry.instance,
            receiver: entry.handle.subscribe(),
            entries: self.entries.clone(),
        }
    }

    /// Number of games with a running synchronizer.
    pub fn active(&self) -> usize {
        self.entries.len()
    }

    /// Stop every synchronizer. Outstanding leases keep their last snapshot.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Shared access to a game's snapshots. The synchronizer stops when the
/// last lease is dropped.
pub struct SyncLease {
    game_id: Uuid,
    instance: Uuid,
    receiver: watch::Receiver<GameSnapshot>,
    entries: Arc<DashMap<Uuid, Entry>>,
}

impl SyncLease {
    /// Game the lease is bound to.
    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Receiver of the game's snapshots.
    pub fn receiver(&self) -> watch::Receiver<GameSnapshot> {
        self.receiver.clone()
    }
}

impl Drop for SyncLease {
    fn drop(&mut self) {
        let removed = self.entries.remove_if_mut(&self.game_id, |_, entry| {
            if entry.instance != self.instance {
                return false;
            }
            entry.leases = entry.leases.saturating_sub(1);
            entry.leases == 0
        });
        if removed.is_some() {
            debug!(game_id = %self.game_id, "last viewer left; synchronizer stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::{game_store::memory::MemoryGameStore, models::GameStatus},
        services::test_support::seed_game,
    };

    async fn wait_until_released(store: &MemoryGameStore) {
        for _ in 0..100 {
            if store.active_subscriptions() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscriptions still open");
    }

    #[tokio::test]
    async fn leases_share_one_synchronizer() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Pending).await;
        let registry = SyncRegistry::default();

        let first = registry.acquire(store.clone(), LobbyConfig::default(), game.id);
        let second = registry.acquire(store.clone(), LobbyConfig::default(), game.id);
        assert_eq!(registry.active(), 1);

        drop(first);
        assert_eq!(registry.active(), 1);

        drop(second);
        assert_eq!(registry.active(), 0);
        wait_until_released(&store).await;
    }

    #[tokio::test]
    async fn stale_lease_does_not_stop_a_newer_synchronizer() {
        let store = Arc::new(MemoryGameStore::new());
        let game = seed_game(&*store, GameStatus::Pending).await;
        let registry = SyncRegistry::default();

        let stale = registry.acquire(store.clone(), LobbyConfig::default(), game.id);
        registry.clear();
        let fresh = registry.acquire(store.clone(), LobbyConfig::default(), game.id);

        drop(stale);
        assert_eq!(registry.active(), 1);
        assert_eq!(fresh.game_id(), game.id);

        drop(fresh);
        assert_eq!(registry.active(), 0);
    }
}
