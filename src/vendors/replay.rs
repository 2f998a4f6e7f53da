//! Replay vendor loaded from a YAML script
//!
//! A replay script captures what a controller reported so it can be played
//! back on any platform, without the vendor module:
//!
//! ```yaml
//! grades:
//!   1: Super
//!   2: Diesel
//! last_sale:
//!   - ~                          # no sale yet
//!   - TransactionId: "000412"
//!     PumpNumber: 3
//!     Volume: 25.4
//!   - error: controller busy     # vendor failure
//! hoses:
//!   3:
//!     - { SaleNumber: 1, DateOfTransaction: "2024-05-02 08:10:00", Amount: 5300 }
//! period_status: "DID=0142|SSD=2024-05-02"
//! period_sales: "QT=1|G1NR=1|G1MN=5300|G1VO=25.4"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::scripted::{ScriptStep, ScriptedLibrary};
use crate::types::SaleRecord;
use crate::{FusionError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ReplayScript {
    reject_connection: bool,
    grades: BTreeMap<u32, String>,
    last_sale: Vec<Option<ReplayStep>>,
    last_sale_on_fusion: Vec<Option<ReplayStep>>,
    hoses: BTreeMap<u32, Vec<SaleRecord>>,
    period_status: Option<String>,
    period_sales: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorStep {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionLostStep {
    connection_lost: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayStep {
    Error(ErrorStep),
    ConnectionLost(ConnectionLostStep),
    Sale(SaleRecord),
}

impl From<Option<ReplayStep>> for ScriptStep {
    fn from(step: Option<ReplayStep>) -> Self {
        match step {
            None => ScriptStep::NoSale,
            Some(ReplayStep::Error(e)) => ScriptStep::Fail(e.error),
            Some(ReplayStep::ConnectionLost(c)) => ScriptStep::ConnectionLost(c.connection_lost),
            Some(ReplayStep::Sale(sale)) => ScriptStep::Sale(sale),
        }
    }
}

/// Parse a replay script from a YAML string
pub fn parse(yaml: &str) -> std::result::Result<ScriptedLibrary, serde_yaml_ng::Error> {
    let script: ReplayScript = serde_yaml_ng::from_str(yaml)?;

    let mut library = ScriptedLibrary::new()
        .with_last_sales(script.last_sale.into_iter().map(ScriptStep::from))
        .with_last_sales_on_fusion(script.last_sale_on_fusion.into_iter().map(ScriptStep::from));

    for (grade, name) in script.grades {
        library = library.with_grade(grade, name);
    }
    for (hose_id, sales) in script.hoses {
        library = library.with_hose_sales(hose_id, sales);
    }
    if let Some(status) = script.period_status {
        library = library.with_period_status(status);
    }
    if let Some(sales) = script.period_sales {
        library = library.with_period_sales(sales);
    }
    if script.reject_connection {
        library = library.declining_connections();
    }

    Ok(library)
}

/// Load a replay script file as a vendor library
///
/// An unreadable or malformed script is a load failure: the "module" could
/// not be initialized.
pub fn load<P: AsRef<Path>>(path: P) -> Result<ScriptedLibrary> {
    let path = path.as_ref();
    info!("Loading replay script: {}", path.display());

    let yaml = std::fs::read_to_string(path).map_err(|e| FusionError::Load {
        path: path.to_path_buf(),
        reason: "cannot read replay script".to_string(),
        source: Some(Box::new(e)),
    })?;

    parse(&yaml).map_err(|e| FusionError::Load {
        path: path.to_path_buf(),
        reason: "invalid replay script".to_string(),
        source: Some(Box::new(e)),
    })
}
