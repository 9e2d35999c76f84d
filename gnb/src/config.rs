//! Simulation Configuration
//!
//! Network layout of the simulated E2 nodes, loaded from YAML, TOML or JSON.

use anyhow::{anyhow, bail, Context};
use common::types::{CellId, Coordinate, Ecgi, Eci, EnbId, GnbId, PlmnId, Sector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use store::Cell;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimConfig {
    /// PLMN ID (MCC+MNC), e.g. "00101"
    #[serde(default = "default_plmn")]
    pub plmn: String,
    /// Number of simulated UEs
    #[serde(default = "default_ue_count")]
    pub ue_count: usize,
    /// RIC E2 terminations
    pub controllers: Vec<ControllerConfig>,
    /// Simulated E2 nodes
    pub nodes: Vec<NodeConfig>,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

fn default_plmn() -> String {
    "31400".to_string()
}

fn default_ue_count() -> usize {
    100
}

/// RIC E2 termination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    pub id: String,
    pub address: String,
    /// E2 SCTP/TCP port
    #[serde(default = "default_e2_port")]
    pub port: u16,
}

fn default_e2_port() -> u16 {
    36421
}

impl ControllerConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Simulated E2 node
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NodeConfig {
    /// gNB id (20 bits)
    pub gnb_id: u32,
    /// Ids of the controllers this node connects to
    pub controllers: Vec<String>,
    pub cells: Vec<CellConfig>,
}

/// Cell served by a node
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CellConfig {
    /// Cell id within the node (8 bits)
    pub cell_id: u8,
    pub location: LocationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<SectorConfig>,
    /// Maximum number of UEs
    #[serde(default = "default_max_ues")]
    pub max_ues: u32,
    /// Transmit power in dB
    #[serde(default = "default_tx_power_db")]
    pub tx_power_db: f64,
}

fn default_max_ues() -> u32 {
    99999
}

fn default_tx_power_db() -> f64 {
    10.0
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct LocationConfig {
    pub lat: f64,
    pub lng: f64,
}

/// Sector around the cell location
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SectorConfig {
    /// Degrees clockwise from north
    pub azimuth: i32,
    /// Degrees
    #[serde(default = "default_arc")]
    pub arc: i32,
}

fn default_arc() -> i32 {
    120
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl SimConfig {
    /// Load configuration; the format follows the file extension
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("yaml");
        Self::parse(&contents, extension)
    }

    /// Parse configuration text in the given format (yaml, yml, toml or json)
    pub fn parse(contents: &str, format: &str) -> anyhow::Result<Self> {
        let config: SimConfig = match format {
            "yaml" | "yml" => serde_yaml::from_str(contents)?,
            "toml" => toml::from_str(contents)?,
            "json" => serde_json::from_str(contents)?,
            other => bail!("Unsupported configuration format: {}", other),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.plmn_id()?;
        if self.nodes.is_empty() {
            bail!("No E2 nodes configured");
        }

        let controller_ids: HashSet<&str> = self.controllers.iter().map(|c| c.id.as_str()).collect();
        let mut gnb_ids = HashSet::new();
        for node in &self.nodes {
            EnbId::new(node.gnb_id)?;
            if !gnb_ids.insert(node.gnb_id) {
                bail!("Duplicate gNB id {}", node.gnb_id);
            }
            if node.controllers.is_empty() {
                bail!("gNB {} has no controller", node.gnb_id);
            }
            if let Some(unknown) = node.controllers.iter().find(|id| !controller_ids.contains(id.as_str())) {
                bail!("gNB {} references unknown controller {}", node.gnb_id, unknown);
            }
        }
        Ok(())
    }

    pub fn plmn_id(&self) -> anyhow::Result<PlmnId> {
        Ok(PlmnId::parse(&self.plmn)?)
    }

    pub fn controller(&self, id: &str) -> anyhow::Result<&ControllerConfig> {
        self.controllers
            .iter()
            .find(|controller| controller.id == id)
            .ok_or_else(|| anyhow!("Unknown controller {}", id))
    }

    /// Cells of every node, keyed by ECGI
    pub fn cells(&self) -> anyhow::Result<Vec<Cell>> {
        let plmn_id = self.plmn_id()?;
        let mut cells = Vec::new();
        for node in &self.nodes {
            let enb_id = EnbId::new(node.gnb_id)?;
            for cell in &node.cells {
                cells.push(cell.to_cell(plmn_id, enb_id));
            }
        }
        Ok(cells)
    }
}

impl NodeConfig {
    pub fn gnb_id(&self) -> GnbId {
        GnbId(u64::from(self.gnb_id))
    }
}

impl CellConfig {
    pub fn to_cell(&self, plmn_id: PlmnId, enb_id: EnbId) -> Cell {
        let location = Coordinate {
            lat: self.location.lat,
            lng: self.location.lng,
        };
        Cell {
            ecgi: Ecgi::new(plmn_id, Eci::new(enb_id, CellId(self.cell_id))),
            location,
            sector: self.sector.map(|sector| Sector {
                center: location,
                azimuth: sector.azimuth,
                arc: sector.arc,
            }),
            max_ues: self.max_ues,
            tx_power_db: self.tx_power_db,
        }
    }
}
