//! Export of linked weapons into the directory layout the website
//! consumes.
//!
//! A run produces one json document per character plus the referenced
//! images under `images/`, all paths in the documents rewritten to be
//! site-relative. Image copies are idempotent by destination name, so
//! re-running over an existing output directory only fills gaps.

pub mod archive;

use std::fs;
use std::path::{Path, PathBuf};

use bon::Builder;
use convert_case::{Case, Casing};
use rootcause::prelude::*;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{debug, info};

use crate::codec::ToValue;
use crate::data::{DataRoot, Datatables};
use crate::weapon::edit::EditTable;
use crate::weapon::link;
use crate::weapon::types::AbilityCategory;

/// Element icon sheet names and their exported names.
const ELEMENT_ICONS: [(&str, &str); 5] = [
    ("fire", "flame"),
    ("thunder", "volt"),
    ("physics", "physical"),
    ("ice", "frost"),
    ("powers", "altered"),
];

/// Category icon sheet names and their exported names.
const CATEGORY_ICONS: [(&str, &str); 3] = [
    ("fangyu", "tank"),
    ("qianggong", "dps"),
    ("zengyi", "sup"),
];

#[derive(Builder, Debug, Clone)]
pub struct ExportOptions {
    /// Directory the asset dump was extracted into.
    pub data_root: PathBuf,
    /// Where the run writes its output.
    #[builder(default = PathBuf::from("export"))]
    pub output_dir: PathBuf,
    /// Edit table applied to the linked weapons before writing.
    pub edits: Option<PathBuf>,
    /// Export per-character weapon documents and their images.
    #[builder(default = true)]
    pub weapons: bool,
    /// Export the element and category icon sets.
    #[builder(default = true)]
    pub icons: bool,
    /// Pack the output directory into a `.tar.zst` next to it and remove
    /// the directory.
    #[builder(default)]
    pub compress: bool,
    /// With `compress`, leave the output directory in place instead of
    /// removing it once the archive is written.
    #[builder(default)]
    pub keep_output: bool,
}

/// Run a full export.
pub fn export_assets(options: &ExportOptions) -> Result<(), Report> {
    let root = DataRoot::new(&options.data_root);

    if options.weapons {
        export_weapons(&root, options)?;
    }
    if options.icons {
        export_icons(&root, &options.output_dir)?;
    }
    if options.compress {
        let archive_file = archive_path(&options.output_dir);
        info!("compressing output into {}", archive_file.display());
        archive::compress_dir(
            &options.output_dir,
            &archive_file,
            archive::DEFAULT_LEVEL,
            !options.keep_output,
        )?;
    }
    Ok(())
}

fn export_weapons(root: &DataRoot, options: &ExportOptions) -> Result<(), Report> {
    let tables = Datatables::load(root)
        .map_err(|e| rootcause::report!("failed to load datatables: {}", e.kind))?;
    let mut weapons = link::weapons(root, &tables)
        .map_err(|e| rootcause::report!("failed to link weapons: {}", e.kind))?;

    if let Some(path) = &options.edits {
        let edits = EditTable::load(path).map_err(|e| {
            rootcause::report!("failed to load edit table {}: {}", path.display(), e.kind)
        })?;
        edits
            .apply(&mut weapons)
            .map_err(|e| rootcause::report!("edit pass failed: {e}"))?;
    }

    let out = &options.output_dir;
    let char_dir = out.join("images/char");
    let weapon_dir = out.join("images/weapon");
    let ability_dir = out.join("images/ability");
    for dir in [&char_dir, &weapon_dir, &ability_dir] {
        fs::create_dir_all(dir).context_with(|| format!("failed to create {}", dir.display()))?;
    }

    for weapon in &mut weapons {
        let slug = kebab_case(&weapon.char_name);
        debug!("exporting {slug}");

        let banner = char_dir.join(format!("{slug}-banner.png"));
        weapon.char_banner_image = export_image(root, &weapon.char_banner_image, &banner, out)?;
        let centered = char_dir.join(format!("{slug}.png"));
        weapon.char_centered_image =
            export_image(root, &weapon.char_centered_image, &centered, out)?;
        let image = weapon_dir.join(format!("{slug}.png"));
        weapon.image = export_image(root, &weapon.image, &image, out)?;

        for category in AbilityCategory::ALL {
            for id in weapon.ids(category).to_vec() {
                let icon = &weapon.ability(id).icon;
                let Some(file_name) = Path::new(icon).file_name() else {
                    bail!("ability icon has no file name: {icon}");
                };
                let dst = ability_dir.join(file_name);
                let rewritten = export_image(root, icon, &dst, out)?;
                weapon.ability_mut(id).icon = rewritten;
            }
        }

        let document = weapon
            .to_value()
            .map_err(|e| rootcause::report!("failed to serialize weapon for {slug}: {e}"))?;
        let path = out.join(format!("{slug}.json"));
        fs::write(&path, pretty_json(&document)?)
            .context_with(|| format!("failed to write {}", path.display()))?;
    }

    info!("exported {} weapons to {}", weapons.len(), out.display());
    Ok(())
}

/// Copy the element and category icon sheets under their exported names.
fn export_icons(root: &DataRoot, output_dir: &Path) -> Result<(), Report> {
    let element_dir = output_dir.join("images/element");
    let category_dir = output_dir.join("images/category");
    for dir in [&element_dir, &category_dir] {
        fs::create_dir_all(dir).context_with(|| format!("failed to create {}", dir.display()))?;
    }

    let icon_dir = root.icon_dir();
    for (source, target) in ELEMENT_ICONS {
        copy_icon(
            &icon_dir.join(format!("element_{source}.png")),
            &element_dir.join(format!("{target}.png")),
        )?;
    }
    for (source, target) in CATEGORY_ICONS {
        copy_icon(
            &icon_dir.join(format!("icon_{source}.png")),
            &category_dir.join(format!("{target}.png")),
        )?;
    }
    Ok(())
}

fn copy_icon(src: &Path, dst: &Path) -> Result<(), Report> {
    fs::copy(src, dst)
        .context_with(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Copy an image referenced by a weapon field into the output tree and
/// return the site-relative path that replaces the field. The copy is
/// skipped when the destination already exists.
fn export_image(
    root: &DataRoot,
    src: &str,
    dst: &Path,
    output_dir: &Path,
) -> Result<String, Report> {
    if !dst.exists() {
        let src_path = root.resolve(src);
        fs::copy(&src_path, dst).context_with(|| {
            format!("failed to copy {} to {}", src_path.display(), dst.display())
        })?;
    }
    let rel = dst.strip_prefix(output_dir).unwrap_or(dst);
    Ok(format!("/{}", rel.display().to_string().replace('\\', "/")))
}

/// Archive file written next to the output directory.
fn archive_path(output_dir: &Path) -> PathBuf {
    let mut name = output_dir.as_os_str().to_owned();
    name.push(".tar.zst");
    PathBuf::from(name)
}

/// Lowercased, hyphen-separated form of a character name, used for file
/// names.
pub fn kebab_case(name: &str) -> String {
    name.to_case(Case::Kebab)
}

/// Weapon documents render with the same four-space indent the site's
/// repository history expects, keeping diffs quiet across exports.
fn pretty_json(value: &Value) -> Result<Vec<u8>, Report> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| rootcause::report!("failed to render json: {e}"))?;
    Ok(buf)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    const TABLE_DIR: &str = "Output-UEx/Hotta/Content/Resources/CoreBlueprints/DataTable_MMO";
    const SHEET_DIR: &str = "Output-UEx/Hotta/Content/Resources/UI/mingzou/icon";

    /// Lay out a minimal asset dump with one fully linked character.
    fn fake_dump(root: &Path) {
        let tables = root.join(TABLE_DIR);
        fs::create_dir_all(&tables).unwrap();

        let name_image = "/Game/Resources/Name/Alpha.Alpha";
        write_table(
            &tables.join("StaticWeaponDataTable_MMO.json"),
            json!({
                "Weapon_Alpha": {
                    "ItemName": {"LocalizedString": "Nightblade"},
                    "WeaponMatchDes": {"LocalizedString": "A sword."},
                    "ItemLargeIcon": {"AssetPathName": "/Game/Resources/Icon/Weapon_Alpha.Weapon_Alpha"},
                    "ItemNameImage": {"AssetPathName": name_image},
                    "WeaponSkillList": ["GA_FPlayerAlphaSkill"],
                    "WeaponTypeData": {
                        "WeaponCategory": "EWeaponCategory::DPS",
                        "WeaponElementType": "EWeaponElementType::Thunder",
                    },
                },
            }),
        );
        write_table(
            &tables.join("DT_Imitation_MMO.json"),
            json!({
                "Imitation_A": {
                    "Name": {"LocalizedString": "Bai Ling"},
                    "Painting": {"AssetPathName": "/Game/Resources/UI/Banner.Banner"},
                    "CardAdvPage": {"AssetPathName": "/Game/Resources/UI/Card.Card"},
                    "Name3Picture": {"AssetPathName": name_image},
                    "AvatarId": "None",
                    "WeaponId": "Alpha_01",
                },
            }),
        );
        let mut upgrades = serde_json::Map::new();
        for tier in 1..=15 {
            upgrades.insert(
                format!("Alpha_{tier}"),
                json!({
                    "RemouldDetail": {"LocalizedString": format!("tier {tier}")},
                    "RemouldDetailParams": [],
                }),
            );
        }
        write_table(
            &tables.join("WeaponUpgradeStarData_MMO.json"),
            Value::Object(upgrades),
        );
        write_table(
            &tables.join("GameplayAbilityTipsDataTable_Balance.json"),
            json!({
                "GA_FPlayerAlphaSkill": {
                    "Scores": {"Curve": {"RowName": "WeaponSkill"}},
                    "Name": {"LocalizedString": ""},
                    "Desc": {"LocalizedString": ""},
                    "GABranchStruct": [
                        {
                            "Key": "alpha_skill",
                            "Value": {
                                "Name": {"LocalizedString": "Burst"},
                                "Desc": {"LocalizedString": "Deal damage."},
                                "Operations": [],
                                "Icon": {"AssetPathName": "/Game/Resources/Icon/skill_a.skill_a"},
                            },
                        },
                    ],
                },
            }),
        );
        write_table(&tables.join("SkillUpdateTips_balance.json"), json!({}));

        fs::create_dir_all(root.join("Output-UEx/Hotta/Content/Resources/Abilities/Player"))
            .unwrap();

        // The png stand-ins referenced by the tables above.
        for rel in [
            "Output-UEx/Hotta/Content/Resources/Icon/Weapon_Alpha.png",
            "Output-UEx/Hotta/Content/Resources/UI/Banner.png",
            "Output-UEx/Hotta/Content/Resources/UI/Card.png",
            "Output-UEx/Hotta/Content/Resources/Icon/skill_a.png",
        ] {
            write_file(&root.join(rel), rel.as_bytes());
        }
        let sheets = root.join(SHEET_DIR);
        for name in ["fire", "thunder", "physics", "ice", "powers"] {
            write_file(&sheets.join(format!("element_{name}.png")), name.as_bytes());
        }
        for name in ["fangyu", "qianggong", "zengyi"] {
            write_file(&sheets.join(format!("icon_{name}.png")), name.as_bytes());
        }
    }

    fn write_table(path: &Path, rows: Value) {
        let framed = json!([{"Rows": rows}]);
        write_file(path, framed.to_string().as_bytes());
    }

    fn write_file(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn kebab_case_handles_spaces_and_case() {
        assert_eq!(kebab_case("Bai Ling"), "bai-ling");
        assert_eq!(kebab_case("Meryl"), "meryl");
    }

    #[test]
    fn pretty_json_uses_four_space_indent() {
        let rendered = pretty_json(&json!({"a": [1]})).unwrap();
        assert_eq!(
            String::from_utf8(rendered).unwrap(),
            "{\n    \"a\": [\n        1\n    ]\n}"
        );
    }

    #[test]
    fn export_writes_documents_and_images() {
        let tmp = tempfile::tempdir().unwrap();
        fake_dump(tmp.path());
        let out = tmp.path().join("export");

        let options = ExportOptions::builder()
            .data_root(tmp.path().to_owned())
            .output_dir(out.clone())
            .build();
        export_assets(&options).unwrap();

        let document: Value =
            serde_json::from_str(&fs::read_to_string(out.join("bai-ling.json")).unwrap()).unwrap();
        assert_eq!(document["char"], "Bai Ling");
        assert_eq!(document["name"], "Nightblade");
        assert_eq!(document["element"], "VOLT");
        assert_eq!(
            document["char_banner_image"],
            "/images/char/bai-ling-banner.png"
        );
        assert_eq!(document["char_centered_image"], "/images/char/bai-ling.png");
        assert_eq!(document["image"], "/images/weapon/bai-ling.png");
        assert_eq!(document["skills"][0]["icon"], "/images/ability/skill_a.png");

        assert!(out.join("images/char/bai-ling-banner.png").exists());
        assert!(out.join("images/weapon/bai-ling.png").exists());
        assert!(out.join("images/ability/skill_a.png").exists());
        assert!(out.join("images/element/volt.png").exists());
        assert!(out.join("images/category/dps.png").exists());
    }

    #[test]
    fn existing_images_are_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        fake_dump(tmp.path());
        let out = tmp.path().join("export");
        let banner = out.join("images/char/bai-ling-banner.png");
        write_file(&banner, b"already here");

        let options = ExportOptions::builder()
            .data_root(tmp.path().to_owned())
            .output_dir(out.clone())
            .icons(false)
            .build();
        export_assets(&options).unwrap();

        assert_eq!(fs::read(&banner).unwrap(), b"already here");
    }

    #[test]
    fn edits_apply_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        fake_dump(tmp.path());
        let edits = tmp.path().join("edits.json");
        fs::write(
            &edits,
            json!({
                "Bai Ling": {
                    "Burst": {"MODIFY": {"desc": "Patched."}},
                },
            })
            .to_string(),
        )
        .unwrap();
        let out = tmp.path().join("export");

        let options = ExportOptions::builder()
            .data_root(tmp.path().to_owned())
            .output_dir(out.clone())
            .edits(edits)
            .icons(false)
            .build();
        export_assets(&options).unwrap();

        let document: Value =
            serde_json::from_str(&fs::read_to_string(out.join("bai-ling.json")).unwrap()).unwrap();
        assert_eq!(document["skills"][0]["desc"], "Patched.");
    }

    #[test]
    fn compress_replaces_directory_with_archive() {
        let tmp = tempfile::tempdir().unwrap();
        fake_dump(tmp.path());
        let out = tmp.path().join("export");

        let options = ExportOptions::builder()
            .data_root(tmp.path().to_owned())
            .output_dir(out.clone())
            .compress(true)
            .build();
        export_assets(&options).unwrap();

        assert!(!out.exists());
        assert!(tmp.path().join("export.tar.zst").exists());
    }

    #[test]
    fn keep_output_retains_directory_beside_archive() {
        let tmp = tempfile::tempdir().unwrap();
        fake_dump(tmp.path());
        let out = tmp.path().join("export");

        let options = ExportOptions::builder()
            .data_root(tmp.path().to_owned())
            .output_dir(out.clone())
            .compress(true)
            .keep_output(true)
            .build();
        export_assets(&options).unwrap();

        assert!(out.join("bai-ling.json").exists());
        assert!(tmp.path().join("export.tar.zst").exists());
    }
}
