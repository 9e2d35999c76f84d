//! Cell Registry
//!
//! Inventory of the simulated cells; the UE registry draws serving cells from it.

use crate::StoreError;
use async_trait::async_trait;
use common::types::{Coordinate, Ecgi, Sector};
use rand::seq::IteratorRandom;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Simulated cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub ecgi: Ecgi,
    pub location: Coordinate,
    pub sector: Option<Sector>,
    /// Admission limit for UEs
    pub max_ues: u32,
    /// Transmit power in dB
    pub tx_power_db: f64,
}

/// Read-only view of the live cell set
#[async_trait]
pub trait CellSource: Send + Sync {
    /// Pick a live cell uniformly at random
    async fn random_cell(&self) -> Result<Cell, StoreError>;

    /// Whether the cell is live
    async fn contains(&self, ecgi: Ecgi) -> bool;
}

/// Cell registry keyed by ECGI
pub struct CellRegistry {
    cells: RwLock<HashMap<Ecgi, Cell>>,
}

impl CellRegistry {
    pub fn new(cells: Vec<Cell>) -> Self {
        info!("Creating cell registry with {} cells", cells.len());
        let cells = cells.into_iter().map(|cell| (cell.ecgi, cell)).collect();
        Self {
            cells: RwLock::new(cells),
        }
    }

    pub async fn add(&self, cell: Cell) -> Result<(), StoreError> {
        let mut cells = self.cells.write().await;
        if cells.contains_key(&cell.ecgi) {
            return Err(StoreError::AlreadyExists(format!("cell {}", cell.ecgi)));
        }
        debug!("Adding cell {}", cell.ecgi);
        cells.insert(cell.ecgi, cell);
        Ok(())
    }

    pub async fn get(&self, ecgi: Ecgi) -> Result<Cell, StoreError> {
        self.cells
            .read()
            .await
            .get(&ecgi)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("cell {}", ecgi)))
    }

    pub async fn remove(&self, ecgi: Ecgi) -> Result<Cell, StoreError> {
        self.cells
            .write()
            .await
            .remove(&ecgi)
            .ok_or_else(|| StoreError::NotFound(format!("cell {}", ecgi)))
    }

    /// All cells ordered by ECGI
    pub async fn list(&self) -> Vec<Cell> {
        let mut list: Vec<Cell> = self.cells.read().await.values().cloned().collect();
        list.sort_by_key(|cell| cell.ecgi);
        list
    }

    pub async fn len(&self) -> usize {
        self.cells.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cells.read().await.is_empty()
    }
}

#[async_trait]
impl CellSource for CellRegistry {
    async fn random_cell(&self) -> Result<Cell, StoreError> {
        let cells = self.cells.read().await;
        let choice = {
            let mut rng = rand::thread_rng();
            cells.values().choose(&mut rng).cloned()
        };
        choice.ok_or(StoreError::NoCells)
    }

    async fn contains(&self, ecgi: Ecgi) -> bool {
        self.cells.read().await.contains_key(&ecgi)
    }
}
