//! Access to the datamined datatable tree.
//!
//! All paths are resolved against a single [`DataRoot`], the directory a
//! UE asset dump was extracted into. Datatable exports are JSON arrays
//! whose first element carries the row map; [`Datatable`] hides that
//! framing and preserves row order as written.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{DataResult, ErrorKind, failure_from_kind};

/// Directories probed for a datatable, in order. Game updates have moved
/// tables between these without renaming them.
const TABLE_DIRS: [&str; 4] = [
    "Output-UEx/Hotta/Content/Resources/CoreBlueprints/DataTable_MMO",
    "Output-UEx/Hotta/Content/Resources/CoreBlueprints/DataTable",
    "Output-UEx/Hotta/Content/Resources/CoreBlueprints/DataTable_Balance",
    "Output-UEx/Hotta/Content/Resources/CoreBlueprints/DataTable_Balance/Skill",
];

const PLAYER_ABILITY_DIR: &str = "Output-UEx/Hotta/Content/Resources/Abilities/Player";
const ICON_DIR: &str = "Output-UEx/Hotta/Content/Resources/UI/mingzou/icon";

/// Root directory of a datamined asset dump.
#[derive(Debug, Clone)]
pub struct DataRoot {
    root: PathBuf,
}

impl DataRoot {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a root-relative path.
    pub fn resolve<P: AsRef<Path>>(&self, rel: P) -> PathBuf {
        self.root.join(rel)
    }

    /// Find a datatable by name, probing each known directory.
    pub fn table_path(&self, name: &str) -> DataResult<PathBuf> {
        for dir in TABLE_DIRS {
            let candidate = self.root.join(dir).join(format!("{name}.json"));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(failure_from_kind(ErrorKind::TableNotFound {
            name: name.to_owned(),
        }))
    }

    pub fn load_table(&self, name: &str) -> DataResult<Datatable> {
        let path = self.table_path(name)?;
        debug!("loading datatable {name} from {}", path.display());
        Datatable::from_file(&path)
    }

    /// Directory names under the player abilities folder. Montage paths
    /// reference these with inconsistent casing; the listing restores the
    /// canonical form.
    pub fn player_ability_names(&self) -> DataResult<Vec<String>> {
        let dir = self.root.join(PLAYER_ABILITY_DIR);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Directory holding the element and category icon sheet.
    pub fn icon_dir(&self) -> PathBuf {
        self.root.join(ICON_DIR)
    }
}

/// Map a `/Game`-rooted asset reference onto the exported png, relative
/// to the data root. The reference's object suffix (everything from the
/// first `.`) is dropped.
pub fn local_asset(game_path: &str) -> String {
    let local = game_path.replace("/Game", "Output-UEx/Hotta/Content");
    let base = local.split_once('.').map_or(local.as_str(), |(head, _)| head);
    format!("{base}.png")
}

/// Render a curve figure the way game tooltips do: whole numbers without
/// a decimal part, otherwise minimal digits. Rounds at 1e-6 first to
/// absorb float noise from curve multiplication.
pub fn format_figure(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    format!("{rounded}")
}

/// An ordered row map parsed out of a datatable export.
#[derive(Debug, Clone)]
pub struct Datatable {
    rows: Map<String, Value>,
}

impl Datatable {
    pub fn from_file(path: &Path) -> DataResult<Self> {
        let text = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_value(value).ok_or_else(|| {
            failure_from_kind(ErrorKind::MalformedTable {
                path: path.to_owned(),
            })
        })
    }

    fn from_value(value: Value) -> Option<Self> {
        let Value::Array(mut items) = value else {
            return None;
        };
        if items.is_empty() {
            return None;
        }
        let Value::Object(mut head) = items.swap_remove(0) else {
            return None;
        };
        let Value::Object(rows) = head.remove("Rows")? else {
            return None;
        };
        Some(Self { rows })
    }

    pub fn from_rows(rows: Map<String, Value>) -> Self {
        Self { rows }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.rows.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Rows in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.rows.iter()
    }
}

/// The set of datatables the extraction pass reads.
pub struct Datatables {
    pub weapons: Datatable,
    pub imitations: Datatable,
    pub upgrades: Datatable,
    pub ability_tips: Datatable,
    pub skill_update_tips: Datatable,
    pub player_ability_names: Vec<String>,
}

impl Datatables {
    pub fn load(root: &DataRoot) -> DataResult<Self> {
        Ok(Self {
            weapons: root.load_table("StaticWeaponDataTable_MMO")?,
            imitations: root.load_table("DT_Imitation_MMO")?,
            upgrades: root.load_table("WeaponUpgradeStarData_MMO")?,
            ability_tips: root.load_table("GameplayAbilityTipsDataTable_Balance")?,
            skill_update_tips: root.load_table("SkillUpdateTips_balance")?,
            player_ability_names: root.player_ability_names()?,
        })
    }
}

/// Per-run cache of loaded curve tables. Advancement descriptions pull
/// dozens of figures from a handful of files, so each file is parsed
/// once and kept for the rest of the run.
#[derive(Default)]
pub struct CurveCache {
    tables: HashMap<String, Datatable>,
}

impl CurveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// First key value of `row` in the curve table at `object_path`. The
    /// object path's trailing `.N` index suffix is stripped before
    /// resolving.
    pub fn row_value(&mut self, root: &DataRoot, object_path: &str, row: &str) -> DataResult<f64> {
        let trimmed = match object_path.rsplit_once('.') {
            Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                head
            }
            _ => object_path,
        };
        if !self.tables.contains_key(trimmed) {
            let path = root.resolve(format!(
                "Output-UEx/{}.json",
                trimmed.trim_start_matches('/')
            ));
            debug!("loading curve table {}", path.display());
            let table = Datatable::from_file(&path)?;
            self.tables.insert(trimmed.to_owned(), table);
        }
        self.tables[trimmed]
            .get(row)
            .and_then(|v| v.get("Keys"))
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("Value"))
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                failure_from_kind(ErrorKind::CurveRowMissing {
                    table: trimmed.to_owned(),
                    row: row.to_owned(),
                })
            })
    }
}
