//! Extraction passes over the datatables.
//!
//! Each pass walks one table and produces intermediate records for the
//! linker. Rows missing required fields are skipped with a diagnostic;
//! only an advancement series missing its final tier aborts a run.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::data::{CurveCache, DataRoot, Datatables, format_figure, local_asset};
use crate::error::{DataResult, ErrorKind, failure_from_kind};
use crate::weapon::types::{
    Abilities, AbilityCategory, AbilityItem, Advancements, Category, CharRefEntry, Control,
    Element, NameIntroEntry,
};

/// Pattern tying player ability ids back to a weapon reference name.
static REF_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^GA_F[Pp]layer(.*?)(?:ChangeSkill|BigSkill|Skill|Melee|Evade)").unwrap()
});

/// Walk nested objects by key, ending on a string.
fn str_at<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in keys {
        current = current.get(key)?;
    }
    current.as_str()
}

// ------------------------------------------------------------------------
// Static weapon table
// ------------------------------------------------------------------------

/// Weapon name, intro, images, and typing from the static weapon table.
/// Variant rows (fashion, imitation, ui, numbered reskins) are ignored.
pub fn name_intro_entries(tables: &Datatables) -> Vec<NameIntroEntry> {
    const SKIP_SUFFIXES: [&str; 6] = ["2", "3", "fashion", "imitation", "ui", "show"];

    let mut entries = Vec::new();
    for (key, row) in tables.weapons.iter() {
        let lowkey = key.to_lowercase();
        if SKIP_SUFFIXES.iter().any(|s| lowkey.ends_with(s))
            || lowkey.starts_with("breakfate")
            || lowkey.starts_with("dwsk")
        {
            continue;
        }

        if let Some(entry) = name_intro_entry(key, row) {
            entries.push(entry);
        }
    }
    entries
}

fn name_intro_entry(key: &str, row: &Value) -> Option<NameIntroEntry> {
    let (Some(weapon_name), Some(weapon_intro), Some(large_icon)) = (
        str_at(row, &["ItemName", "LocalizedString"]),
        str_at(row, &["WeaponMatchDes", "LocalizedString"]),
        str_at(row, &["ItemLargeIcon", "AssetPathName"]),
    ) else {
        warn!("cannot find weapon info for '{key}'");
        return None;
    };

    let Some(name_image_path) = str_at(row, &["ItemNameImage", "AssetPathName"]) else {
        warn!("missing name image for '{key}'");
        return None;
    };

    let extra_ref_name = row
        .get("WeaponSkillList")
        .and_then(Value::as_array)
        .and_then(|list| list.first())
        .and_then(Value::as_str)
        .and_then(|skill| REF_NAME_PATTERN.captures(skill))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .unwrap_or_default();

    let category = str_at(row, &["WeaponTypeData", "WeaponCategory"])
        .and_then(|token| token.split("::").nth(1))
        .and_then(Category::from_raw);
    let element = str_at(row, &["WeaponTypeData", "WeaponElementType"])
        .and_then(|token| token.split("::").nth(1))
        .and_then(Element::from_raw);
    let (Some(category), Some(element)) = (category, element) else {
        warn!("unrecognized weapon type data for '{key}'");
        return None;
    };

    Some(NameIntroEntry {
        weapon_name: weapon_name.to_owned(),
        weapon_intro: weapon_intro.to_owned(),
        weapon_image: local_asset(large_icon),
        element,
        category,
        name_image_path: name_image_path.to_owned(),
        extra_ref_name,
    })
}

// ------------------------------------------------------------------------
// Imitation table
// ------------------------------------------------------------------------

/// Character identity and candidate reference names from the imitation
/// table. `*L1` rows are awakening variants of their base row and only
/// contribute their avatar id.
pub fn char_ref_entries(tables: &Datatables) -> Vec<CharRefEntry> {
    let canonical: HashMap<String, &str> = tables
        .player_ability_names
        .iter()
        .map(|name| (name.to_lowercase(), name.as_str()))
        .collect();

    let mut entries = Vec::new();
    for (key, row) in tables.imitations.iter() {
        if key.ends_with("L1") {
            continue;
        }

        let (Some(char_name), Some(painting), Some(card_page), Some(name_image_path)) = (
            str_at(row, &["Name", "LocalizedString"]),
            str_at(row, &["Painting", "AssetPathName"]),
            str_at(row, &["CardAdvPage", "AssetPathName"]),
            str_at(row, &["Name3Picture", "AssetPathName"]),
        ) else {
            warn!("cannot find character info for '{key}'");
            continue;
        };

        let mut ref_names = BTreeSet::new();
        ref_names.insert(char_name.to_owned());

        // The montage path's seventh segment is the character's ability
        // folder, with unreliable casing.
        if let Some(segment) = str_at(row, &["Montage", "AssetPathName"])
            .and_then(|montage| montage.split('/').nth(7))
        {
            match canonical.get(&segment.to_lowercase()) {
                Some(name) => ref_names.insert((*name).to_owned()),
                None => ref_names.insert(segment.to_owned()),
            };
        }

        if let Some(avatar_id) = str_at(row, &["AvatarId"]).filter(|s| !s.is_empty()) {
            ref_names.insert(avatar_id.to_owned());
        }
        if let Some(l1_row) = tables.imitations.get(&format!("{key}L1"))
            && let Some(avatar_id) = str_at(l1_row, &["AvatarId"]).filter(|s| !s.is_empty())
        {
            ref_names.insert(avatar_id.to_owned());
        }
        if let Some(weapon_id) = str_at(row, &["WeaponId"])
            && let Some(prefix) = weapon_id.split('_').next()
        {
            ref_names.insert(prefix.to_owned());
        }

        ref_names.remove("None");

        entries.push(CharRefEntry {
            char_name: char_name.to_owned(),
            char_vertical_banner_image: local_asset(painting),
            char_centered_image: local_asset(card_page),
            ref_names,
            name_image_path: name_image_path.to_owned(),
        });
    }
    entries
}

// ------------------------------------------------------------------------
// Advancement table
// ------------------------------------------------------------------------

/// Advancement descriptions grouped by reference name, tiers 1..=15.
///
/// A series whose tier 15 row is absent aborts the run; a series with a
/// hole below 15 is dropped whole with a diagnostic. Numeric placeholders
/// are filled from the curve tables via `cache`.
pub fn advancement_entries(
    root: &DataRoot,
    tables: &Datatables,
    cache: &mut CurveCache,
) -> DataResult<Vec<Advancements>> {
    let mut entries = Vec::new();
    let mut done: HashSet<String> = HashSet::new();
    let mut skip: HashSet<String> = HashSet::new();

    for (key, _) in tables.upgrades.iter() {
        if key.starts_with("breakfate") {
            continue;
        }

        let ref_name = key.split('_').next().unwrap_or(key).to_owned();
        if done.contains(&ref_name) || skip.contains(&ref_name) {
            continue;
        }

        let key_base = key.trim_end_matches(|c: char| c.is_ascii_digit());
        if !tables.upgrades.contains_key(&format!("{key_base}15")) {
            return Err(failure_from_kind(ErrorKind::AdvancementIncomplete {
                reference: key_base.to_owned(),
            }));
        }

        let mut adv = BTreeMap::new();
        let mut complete = true;
        for tier in 1..=15u32 {
            let tier_key = format!("{key_base}{tier}");
            let Some(tier_row) = tables.upgrades.get(&tier_key) else {
                warn!("incomplete advancement info for '{key_base}'");
                complete = false;
                break;
            };
            match advancement_desc(root, cache, &tier_key, tier_row) {
                Some(desc) => {
                    adv.insert(tier, desc);
                }
                None => {
                    complete = false;
                    break;
                }
            }
        }

        if complete {
            entries.push(Advancements {
                ref_name: ref_name.clone(),
                adv,
            });
            done.insert(ref_name);
        } else {
            skip.insert(ref_name);
        }
    }
    Ok(entries)
}

fn advancement_desc(
    root: &DataRoot,
    cache: &mut CurveCache,
    key: &str,
    row: &Value,
) -> Option<String> {
    let Some(desc) = str_at(row, &["RemouldDetail", "LocalizedString"]) else {
        warn!("missing remould detail for '{key}'");
        return None;
    };

    let params = row
        .get("RemouldDetailParams")
        .and_then(Value::as_array)
        .filter(|params| !params.is_empty());
    let Some(params) = params else {
        return Some(desc.to_owned());
    };

    let figures = effect_figures(root, cache, key, params)?;
    match format_placeholders(desc, &figures) {
        Some(filled) => Some(filled),
        None => {
            warn!("placeholder substitution failed for '{key}'");
            None
        }
    }
}

/// Resolve one figure per remould param: a literal value, optionally
/// multiplied by the first key of a referenced curve row. Any failure,
/// including an unreadable curve table, drops the tier.
fn effect_figures(
    root: &DataRoot,
    cache: &mut CurveCache,
    key: &str,
    params: &[Value],
) -> Option<Vec<String>> {
    let mut figures = Vec::new();
    for item in params {
        let Some(mul) = item.get("Value").and_then(Value::as_f64) else {
            warn!("malformed remould params for '{key}'");
            return None;
        };
        let Some(row_name) = str_at(item, &["Curve", "RowName"]) else {
            warn!("malformed remould params for '{key}'");
            return None;
        };
        let curve_table = item
            .get("Curve")
            .and_then(|curve| curve.get("CurveTable"))
            .filter(|table| !table.is_null());

        let figure = match curve_table {
            None => format_figure(mul),
            Some(_) if row_name == "None" => format_figure(mul),
            Some(table) => {
                let Some(object_path) = str_at(table, &["ObjectPath"]) else {
                    warn!("malformed remould params for '{key}'");
                    return None;
                };
                match cache.row_value(root, object_path, row_name) {
                    Ok(value) => format_figure(value * mul),
                    Err(err) => {
                        warn!("curve lookup failed for '{key}': {}", err.kind);
                        return None;
                    }
                }
            }
        };
        figures.push(figure);
    }
    Some(figures)
}

/// Substitute `{0}`-style and bare `{}` placeholders; `{{` and `}}`
/// escape to literal braces. None when an index is out of range or a
/// placeholder never closes.
fn format_placeholders(template: &str, figures: &[String]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut spec = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => spec.push(ch),
                        None => return None,
                    }
                }
                let index = if spec.is_empty() {
                    let index = next_auto;
                    next_auto += 1;
                    index
                } else {
                    spec.parse().ok()?
                };
                out.push_str(figures.get(index)?);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                }
                out.push('}');
            }
            other => out.push(other),
        }
    }
    Some(out)
}

// ------------------------------------------------------------------------
// Ability tips table
// ------------------------------------------------------------------------

/// Ability lists grouped by reference name from the gameplay ability tips
/// table. When a row exists in both base and `_Balance` form, only the
/// `_Balance` row is read.
pub fn ability_entries(tables: &Datatables) -> HashMap<String, Abilities> {
    let mut entries: HashMap<String, Abilities> = HashMap::new();
    let mut skip: HashSet<String> = HashSet::new();

    for (key, row) in tables.ability_tips.iter() {
        let lowkey = key.to_lowercase();
        if lowkey.starts_with("ga_spawn")
            || lowkey.starts_with("ga_artifact")
            || lowkey.ends_with("breakfate")
        {
            continue;
        }

        let Some(ref_name) = REF_NAME_PATTERN
            .captures(key)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
        else {
            continue;
        };

        if skip.contains(&ref_name) {
            continue;
        }

        if !key.ends_with("_Balance") && tables.ability_tips.contains_key(&format!("{key}_Balance"))
        {
            continue;
        }

        entries
            .entry(ref_name.clone())
            .or_insert_with(|| Abilities::new(ref_name.clone()));

        let Some(category) = score_category(row, &lowkey) else {
            warn!("unrecognized score row name for '{key}'");
            continue;
        };

        let Some(branches) = row.get("GABranchStruct").and_then(Value::as_array) else {
            warn!("missing branch struct for '{key}'");
            continue;
        };
        let single_branch = branches.len() == 1;

        for item in branches {
            collect_branch(
                tables,
                &mut entries,
                &mut skip,
                &ref_name,
                key,
                row,
                item,
                category,
                single_branch,
            );
        }
    }
    entries
}

/// Category from `Scores.Curve.RowName`, inferred from the key when the
/// row carries the `None` sentinel. `changeskill` is probed before
/// `skill` because every changeskill key also contains `skill`.
fn score_category(row: &Value, lowkey: &str) -> Option<AbilityCategory> {
    let raw = str_at(row, &["Scores", "Curve", "RowName"]).unwrap_or("None");
    let row_name = if raw != "None" {
        raw
    } else if lowkey.contains("changeskill") {
        "WeaponChangeSkill"
    } else if lowkey.contains("skill") {
        "WeaponSkill"
    } else if lowkey.contains("evade") {
        "WeaponEvade"
    } else if lowkey.contains("melee") {
        "WeaponMelee"
    } else {
        return None;
    };

    match row_name {
        "WeaponSkill" => Some(AbilityCategory::Skills),
        "WeaponMelee" => Some(AbilityCategory::Normals),
        "WeaponEvade" => Some(AbilityCategory::Dodges),
        "WeaponChangeSkill" => Some(AbilityCategory::Discharges),
        _ => None,
    }
}

#[allow(clippy::too_many_arguments)]
fn collect_branch(
    tables: &Datatables,
    entries: &mut HashMap<String, Abilities>,
    skip: &mut HashSet<String>,
    ref_name: &str,
    key: &str,
    row: &Value,
    item: &Value,
    category: AbilityCategory,
    single_branch: bool,
) {
    let Some(value) = item.get("Value") else {
        warn!("branch without value in '{key}'");
        return;
    };

    let mut branch_name = str_at(value, &["Name", "LocalizedString"]).unwrap_or_default();
    if branch_name.is_empty() && single_branch {
        branch_name = str_at(row, &["Name", "LocalizedString"]).unwrap_or_default();
    }

    let raw_ops = value
        .get("Operations")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    // Normal attacks and dodges without an input sequence are stale rows
    // (sneak attacks, pre-rework values).
    if matches!(
        category,
        AbilityCategory::Normals | AbilityCategory::Dodges
    ) && raw_ops.is_empty()
    {
        return;
    }

    let mut control = Vec::with_capacity(raw_ops.len());
    for op in raw_ops {
        match op.as_i64().and_then(Control::from_raw) {
            Some(parsed) => control.push(parsed),
            None => {
                warn!("unknown control token {op} in '{branch_name}' of '{ref_name}'");
                return;
            }
        }
    }

    // A chord only makes sense between two different inputs.
    if control.contains(&Control::And)
        && let Some(window) = control
            .windows(3)
            .find(|w| w[1] == Control::And && w[0] == w[2])
    {
        warn!(
            "skipping invalid control combination {:?} in '{branch_name}' of '{ref_name}'",
            window
        );
        return;
    }

    let Some(list) = entries
        .get_mut(ref_name)
        .and_then(|entry| entry.list_mut(category))
    else {
        return;
    };

    // Re-listed abilities keep their first definition.
    if list.iter().any(|existing| existing.name == branch_name) {
        return;
    }

    let mut desc = str_at(value, &["Desc", "LocalizedString"])
        .unwrap_or_default()
        .to_owned();
    if desc.is_empty() && single_branch {
        desc = str_at(row, &["Desc", "LocalizedString"])
            .unwrap_or_default()
            .to_owned();
    }

    if desc.contains('{') {
        let Some(branch_key) = item.get("Key").and_then(Value::as_str) else {
            warn!("cannot find skill values for '{key}'");
            return;
        };
        let sut_prefix = format!("{branch_key}_");

        if !tables
            .skill_update_tips
            .contains_key(&format!("{sut_prefix}1"))
        {
            warn!("cannot find values for '{ref_name}' with key {sut_prefix}");
            return;
        }

        let mut figures = Vec::new();
        let mut index = 1;
        while let Some(tip_row) = tables.skill_update_tips.get(&format!("{sut_prefix}{index}")) {
            let Some(value) = tip_row
                .get("Keys")
                .and_then(|keys| keys.get(0))
                .and_then(|first| first.get("Value"))
                .and_then(Value::as_f64)
            else {
                break;
            };
            figures.push(format_figure(value));
            index += 1;
        }

        match format_placeholders(&desc, &figures) {
            Some(filled) => desc = filled,
            None => {
                warn!("skipping '{ref_name}' due to value substitution error");
                skip.insert(ref_name.to_owned());
                return;
            }
        }
    }

    let Some(icon) = str_at(value, &["Icon", "AssetPathName"]) else {
        warn!("missing icon for '{branch_name}' of '{ref_name}'");
        return;
    };

    // Reborrow after the skill-value lookups above.
    let Some(list) = entries
        .get_mut(ref_name)
        .and_then(|entry| entry.list_mut(category))
    else {
        return;
    };
    list.push(AbilityItem {
        name: branch_name.to_owned(),
        desc,
        icon: local_asset(icon),
        control,
    });
}
