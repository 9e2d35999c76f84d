//! UE Registry
//!
//! Tracks the simulated user equipment population. Every mutation is
//! linearized by the registry lock; watcher events are queued under that lock
//! and delivered to the caller's sink by a per-watcher forwarding task, so a
//! slow consumer never holds up mutators.

use crate::cells::{Cell, CellSource};
use crate::StoreError;
use common::types::{Coordinate, Crnti, Ecgi, GEnbId, Imsi};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Lowest IMSI handed out to simulated UEs
pub const MIN_IMSI: u64 = 1_000_000;
/// Highest IMSI handed out to simulated UEs
pub const MAX_IMSI: u64 = 9_999_999;

const FIRST_CRNTI: u32 = 90125;
const DEFAULT_UE_TYPE: &str = "phone";

/// Serving cell association of a UE
#[derive(Debug, Clone, PartialEq)]
pub struct UeCell {
    pub gnb: GEnbId,
    pub ecgi: Ecgi,
    /// Received signal strength
    pub strength: f64,
}

/// Simulated UE
#[derive(Debug, Clone, PartialEq)]
pub struct Ue {
    pub imsi: Imsi,
    pub ue_type: String,
    pub location: Coordinate,
    /// Heading in degrees
    pub rotation: u32,
    pub cell: UeCell,
    pub crnti: Crnti,
    pub is_admitted: bool,
}

/// Kind of change carried by a [`UeEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeEventType {
    /// Replay of an existing UE, no change
    None,
    Added,
    Updated,
    Deleted,
}

/// Change in the UE inventory
#[derive(Debug, Clone, PartialEq)]
pub struct UeEvent {
    pub ue: Ue,
    pub event_type: UeEventType,
}

/// Tailors [`UeRegistry::watch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Emit a `None` event for every UE present when the watch starts
    pub replay: bool,
    /// Keep receiving events for subsequent mutations
    pub monitor: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            replay: false,
            monitor: true,
        }
    }
}

/// Identifies a registered watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

struct Watcher {
    handle: WatchHandle,
    queue: mpsc::UnboundedSender<UeEvent>,
}

struct Inner {
    ues: HashMap<Imsi, Ue>,
    watchers: Vec<Watcher>,
    next_crnti: u32,
    next_handle: u64,
}

impl Inner {
    fn notify(&mut self, ue: &Ue, event_type: UeEventType) {
        // Watchers whose forwarding task has ended are dropped here
        self.watchers.retain(|watcher| {
            watcher
                .queue
                .send(UeEvent {
                    ue: ue.clone(),
                    event_type,
                })
                .is_ok()
        });
    }

    fn insert_new(&mut self, cells: Vec<Cell>) -> Result<Vec<Imsi>, StoreError> {
        let capacity = (MAX_IMSI - MIN_IMSI + 1) as usize;
        if self.ues.len() + cells.len() > capacity {
            return Err(StoreError::ImsiSpaceExhausted);
        }

        let mut rng = rand::thread_rng();
        let mut created = Vec::with_capacity(cells.len());
        for cell in cells {
            // Collisions are retried until a free IMSI turns up
            let imsi = loop {
                let candidate = Imsi(rng.gen_range(MIN_IMSI..=MAX_IMSI));
                if !self.ues.contains_key(&candidate) {
                    break candidate;
                }
            };

            let crnti = Crnti(self.next_crnti);
            self.next_crnti = self.next_crnti.wrapping_add(1);

            let ue = Ue {
                imsi,
                ue_type: DEFAULT_UE_TYPE.to_string(),
                location: Coordinate::default(),
                rotation: 0,
                cell: UeCell {
                    gnb: GEnbId::from(cell.ecgi),
                    ecgi: cell.ecgi,
                    strength: rng.gen_range(0.0..100.0),
                },
                crnti,
                is_admitted: false,
            };

            self.notify(&ue, UeEventType::Added);
            self.ues.insert(imsi, ue);
            created.push(imsi);
        }
        Ok(created)
    }

    fn remove(&mut self, imsi: Imsi) -> Result<Ue, StoreError> {
        let ue = self
            .ues
            .remove(&imsi)
            .ok_or_else(|| StoreError::NotFound(format!("UE {}", imsi)))?;
        self.notify(&ue, UeEventType::Deleted);
        Ok(ue)
    }
}

/// Inventory of simulated UEs
pub struct UeRegistry {
    inner: RwLock<Inner>,
    cells: Arc<dyn CellSource>,
}

impl UeRegistry {
    /// Create a registry primed with `count` UEs spread over the cell source
    pub async fn new(count: usize, cells: Arc<dyn CellSource>) -> Result<Self, StoreError> {
        info!("Creating UE registry with {} UEs", count);

        let registry = Self {
            inner: RwLock::new(Inner {
                ues: HashMap::new(),
                watchers: Vec::new(),
                next_crnti: FIRST_CRNTI,
                next_handle: 0,
            }),
            cells,
        };
        registry.create(count).await?;

        info!("UE registry primed with {} UEs", registry.len().await);
        Ok(registry)
    }

    /// Create or destroy UEs until exactly `count` are live
    pub async fn set_count(&self, count: usize) -> Result<(), StoreError> {
        let current = self.len().await;
        if current < count {
            self.create(count - current).await?;
        } else if current > count {
            self.remove_some(current - count).await;
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.ues.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ues.is_empty()
    }

    /// Create `count` UEs, each on a random live cell
    ///
    /// Nothing is created when the cell source cannot provide a cell.
    pub async fn create(&self, count: usize) -> Result<Vec<Imsi>, StoreError> {
        let mut cells = Vec::with_capacity(count);
        for _ in 0..count {
            cells.push(self.cells.random_cell().await?);
        }

        let created = self.inner.write().await.insert_new(cells)?;
        debug!("Created {} UEs", created.len());
        Ok(created)
    }

    async fn remove_some(&self, count: usize) {
        let mut inner = self.inner.write().await;
        let victims: Vec<Imsi> = inner.ues.keys().take(count).copied().collect();
        let mut removed = 0;
        for imsi in victims {
            match inner.remove(imsi) {
                Ok(_) => removed += 1,
                Err(e) => warn!("Failed to remove UE {}: {}", imsi, e),
            }
        }
        debug!("Removed {} UEs", removed);
    }

    pub async fn get(&self, imsi: Imsi) -> Result<Ue, StoreError> {
        self.inner
            .read()
            .await
            .ues
            .get(&imsi)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("UE {}", imsi)))
    }

    pub async fn destroy(&self, imsi: Imsi) -> Result<Ue, StoreError> {
        let ue = self.inner.write().await.remove(imsi)?;
        debug!("Destroyed UE {}", imsi);
        Ok(ue)
    }

    /// Re-associate a UE with a live cell
    pub async fn move_ue(&self, imsi: Imsi, ecgi: Ecgi, strength: f64) -> Result<(), StoreError> {
        if !self.cells.contains(ecgi).await {
            return Err(StoreError::NotFound(format!("cell {}", ecgi)));
        }

        let mut inner = self.inner.write().await;
        let ue = inner
            .ues
            .get_mut(&imsi)
            .ok_or_else(|| StoreError::NotFound(format!("UE {}", imsi)))?;
        ue.cell.ecgi = ecgi;
        ue.cell.gnb = GEnbId::from(ecgi);
        ue.cell.strength = strength;
        let ue = ue.clone();
        inner.notify(&ue, UeEventType::Updated);

        debug!("Moved UE {} to cell {}", imsi, ecgi);
        Ok(())
    }

    /// All UEs ordered by IMSI
    pub async fn list_all(&self) -> Vec<Ue> {
        let mut list: Vec<Ue> = self.inner.read().await.ues.values().cloned().collect();
        list.sort_by_key(|ue| ue.imsi);
        list
    }

    /// UEs served by `ecgi`, ordered by IMSI
    pub async fn list_by_cell(&self, ecgi: Ecgi) -> Vec<Ue> {
        let mut list: Vec<Ue> = self
            .inner
            .read()
            .await
            .ues
            .values()
            .filter(|ue| ue.cell.ecgi == ecgi)
            .cloned()
            .collect();
        list.sort_by_key(|ue| ue.imsi);
        list
    }

    /// Watch inventory events through `sink`
    ///
    /// Replayed events precede any live event. Without `monitor` the sink is
    /// released once the replay is delivered.
    pub async fn watch(&self, sink: mpsc::Sender<UeEvent>, options: WatchOptions) -> WatchHandle {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        let handle = {
            let mut inner = self.inner.write().await;
            let handle = WatchHandle(inner.next_handle);
            inner.next_handle += 1;

            if options.replay {
                for ue in inner.ues.values() {
                    let _ = queue_tx.send(UeEvent {
                        ue: ue.clone(),
                        event_type: UeEventType::None,
                    });
                }
            }
            if options.monitor {
                inner.watchers.push(Watcher {
                    handle,
                    queue: queue_tx,
                });
            }
            info!("Watching UEs: {:?} ({} live, handle {})", options, inner.ues.len(), handle.0);
            handle
        };

        tokio::spawn(forward_events(queue_rx, sink));
        handle
    }

    /// Remove a watcher; its sink is released after queued events drain
    pub async fn unwatch(&self, handle: WatchHandle) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.watchers.len();
        inner.watchers.retain(|watcher| watcher.handle != handle);
        before != inner.watchers.len()
    }

    /// Live watcher count
    pub async fn watcher_count(&self) -> usize {
        self.inner.read().await.watchers.len()
    }

    /// IMSIs of all live UEs
    pub async fn imsis(&self) -> HashSet<Imsi> {
        self.inner.read().await.ues.keys().copied().collect()
    }
}

async fn forward_events(mut queue: mpsc::UnboundedReceiver<UeEvent>, sink: mpsc::Sender<UeEvent>) {
    while let Some(event) = queue.recv().await {
        if sink.send(event).await.is_err() {
            debug!("UE watcher sink closed");
            break;
        }
    }
}
