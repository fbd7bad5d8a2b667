//! Server configuration module
//!
//! Parses and manages the CHARACTER port configuration from YAML files.
//!
//! Uses serde_yaml for parsing - define the struct and serde handles
//! the parsing and type conversion, `validate` handles the rest.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::protocol::records::ParameterEntry;
use crate::protocol::{HEADER_SIZE, MAX_PACKET_SIZE};

/// Maximum number of ships the ship list packet can carry
pub const SHIP_MAX: usize = 32;

/// Ship names are sent in a 0x22 byte field
pub const SHIP_NAME_MAX: usize = 0x22;

/// Size of the persisted key config block (key config + joystick config)
pub const KEY_CONFIG_SIZE: usize = 420;

/// UTF-16 units a scroll message may hold: header, 8 reserved bytes and the
/// terminator must still fit one packet
pub const MAX_SCROLL_MESSAGE_UNITS: usize = (MAX_PACKET_SIZE - HEADER_SIZE - 8) / 2 - 1;

/// Parameter files whose entries fit one parameter header packet
pub const MAX_PARAM_FILES: usize =
    (MAX_PACKET_SIZE - HEADER_SIZE) / std::mem::size_of::<ParameterEntry>();

/// One entry of the ship select menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipEntry {
    pub id: u32,
    pub name: String,
}

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    // ============================================
    // MySQL Database Configuration
    // ============================================
    pub sql_ip: String,

    #[serde(default = "default_sql_port")]
    pub sql_port: u16,

    pub sql_id: String,
    pub sql_pw: String,
    pub sql_db: String,

    /// Apply the bundled schema migrations on startup
    #[serde(default)]
    pub run_migrations: bool,

    // ============================================
    // Character Port Configuration
    // ============================================
    /// Character server bind address
    pub character_ip: String,

    #[serde(default = "default_character_port")]
    pub character_port: u16,

    /// Hex dump every inbound packet at debug level
    #[serde(default)]
    pub debug_mode: bool,

    // ============================================
    // Login Flow Content
    // ============================================
    /// Name shown at the top of the ship select menu
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Ships offered once a character has been selected
    #[serde(default)]
    pub ships: Vec<ShipEntry>,

    /// Banner scrolled across the ship select screen
    #[serde(default)]
    pub scroll_message: String,

    /// Optional file holding the 420 byte default key config
    #[serde(default)]
    pub key_config_file: Option<String>,

    // ============================================
    // Parameter Files
    // ============================================
    #[serde(default = "default_param_dir")]
    pub param_dir: String,

    /// Parameter files, in the order they are concatenated
    #[serde(default = "default_param_files")]
    pub param_files: Vec<String>,
}

// ============================================
// Default value functions
// These are called by serde when a field is missing
// ============================================

fn default_sql_port() -> u16 {
    3306
}

fn default_character_port() -> u16 {
    12001
}

fn default_server_name() -> String {
    "Archon".to_string()
}

fn default_param_dir() -> String {
    "./data/param/".to_string()
}

fn default_param_files() -> Vec<String> {
    [
        "ItemMagEdit.prs",
        "ItemPMT.prs",
        "BattleParamEntry.dat",
        "BattleParamEntry_on.dat",
        "BattleParamEntry_lab.dat",
        "BattleParamEntry_lab_on.dat",
        "BattleParamEntry_ep4.dat",
        "BattleParamEntry_ep4_on.dat",
        "PlyLevelTbl.prs",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ServerConfig {
    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use archon::config::ServerConfig;
    ///
    /// let config = ServerConfig::from_file("conf/server.yaml")
    ///     .expect("Failed to load config");
    /// println!("SQL DB: {}", config.sql_db);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    ///
    /// Useful for testing
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: ServerConfig = serde_yaml::from_str(contents)
            .context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    /// Checks that required fields are set and values fit their wire fields
    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.sql_ip.is_empty(), "sql_ip cannot be empty");
        anyhow::ensure!(!self.sql_id.is_empty(), "sql_id cannot be empty");
        anyhow::ensure!(!self.sql_db.is_empty(), "sql_db cannot be empty");
        anyhow::ensure!(!self.character_ip.is_empty(), "character_ip cannot be empty");

        anyhow::ensure!(
            self.ships.len() <= SHIP_MAX,
            "Too many ships: {} (max {})",
            self.ships.len(),
            SHIP_MAX
        );
        for ship in &self.ships {
            anyhow::ensure!(
                ship.name.len() < SHIP_NAME_MAX,
                "ship name too long: {:?} (max {} chars)",
                ship.name,
                SHIP_NAME_MAX - 1
            );
        }
        anyhow::ensure!(
            self.server_name.len() < SHIP_NAME_MAX,
            "server_name too long: {} chars (max {})",
            self.server_name.len(),
            SHIP_NAME_MAX - 1
        );

        let units = self.scroll_message.encode_utf16().count();
        anyhow::ensure!(
            units <= MAX_SCROLL_MESSAGE_UNITS,
            "scroll_message too long: {} UTF-16 units (max {})",
            units,
            MAX_SCROLL_MESSAGE_UNITS
        );

        anyhow::ensure!(!self.param_files.is_empty(), "param_files cannot be empty");
        anyhow::ensure!(
            self.param_files.len() <= MAX_PARAM_FILES,
            "Too many param_files: {} (max {})",
            self.param_files.len(),
            MAX_PARAM_FILES
        );
        for name in &self.param_files {
            anyhow::ensure!(
                name.len() < 0x40,
                "parameter file name too long: {}",
                name
            );
        }

        Ok(())
    }

    /// Connection URL for the MySQL pool
    pub fn database_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.sql_id, self.sql_pw, self.sql_ip, self.sql_port, self.sql_db
        )
    }

    /// Reads the default key config block, or an all-zero block when none is configured.
    pub fn default_key_config(&self) -> Result<Vec<u8>> {
        let Some(path) = &self.key_config_file else {
            return Ok(vec![0u8; KEY_CONFIG_SIZE]);
        };
        let data = fs::read(path)
            .with_context(|| format!("Failed to read key config: {}", path))?;
        anyhow::ensure!(
            data.len() == KEY_CONFIG_SIZE,
            "key config {} is {} bytes (expected {})",
            path,
            data.len(),
            KEY_CONFIG_SIZE
        );
        Ok(data)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }
}
