//! Join the extraction passes into weapons.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::data::{CurveCache, DataRoot, Datatables};
use crate::error::{DataResult, Error, ErrorKind, failure_from_kind};
use crate::weapon::extract;
use crate::weapon::types::{Abilities, Advancements, NameIntroEntry, Weapon};

/// Link every character to its weapon info, advancement tiers, and
/// ability lists.
///
/// A character without a weapon row is skipped; the remaining weapon
/// data for MMO-only characters simply does not exist. A character that
/// matches a weapon but cannot be tied to advancement or ability data
/// aborts the run, because that means the reference names are stale.
pub fn weapons(root: &DataRoot, tables: &Datatables) -> DataResult<Vec<Weapon>> {
    let name_intro = extract::name_intro_entries(tables);
    let mut by_name_image: HashMap<&str, &NameIntroEntry> = HashMap::new();
    for entry in &name_intro {
        by_name_image
            .entry(entry.name_image_path.as_str())
            .or_insert(entry);
    }

    let mut curves = CurveCache::new();
    let advancements: HashMap<String, Advancements> =
        extract::advancement_entries(root, tables, &mut curves)?
            .into_iter()
            .map(|entry| (entry.ref_name.to_lowercase(), entry))
            .collect();
    let abilities: HashMap<String, Abilities> = extract::ability_entries(tables)
        .into_iter()
        .map(|(ref_name, entry)| (ref_name.to_lowercase(), entry))
        .collect();

    let mut weapons = Vec::new();
    for char_ref in extract::char_ref_entries(tables) {
        let entry = by_name_image
            .get(char_ref.name_image_path.as_str())
            .copied()
            .or_else(|| {
                // No image match; first weapon whose skill-derived
                // reference name the character also carries wins.
                name_intro.iter().find(|entry| {
                    !entry.extra_ref_name.is_empty()
                        && char_ref.ref_names.contains(&entry.extra_ref_name)
                })
            });
        let Some(entry) = entry else {
            warn!(
                "cannot match character {} {:?}",
                char_ref.char_name, char_ref.ref_names
            );
            continue;
        };

        let mut ref_names = char_ref.ref_names;
        if !entry.extra_ref_name.is_empty() {
            ref_names.insert(entry.extra_ref_name.clone());
        }

        let Some(adv) = probe(&advancements, &ref_names) else {
            return Err(missing_linkage(&char_ref.char_name, "advancements", &ref_names));
        };
        let Some(ability) = probe(&abilities, &ref_names) else {
            return Err(missing_linkage(&char_ref.char_name, "abilities", &ref_names));
        };

        weapons.push(
            Weapon::builder()
                .char_name(char_ref.char_name)
                .char_banner_image(char_ref.char_vertical_banner_image)
                .char_centered_image(char_ref.char_centered_image)
                .name(entry.weapon_name.clone())
                .image(entry.weapon_image.clone())
                .intro(entry.weapon_intro.clone())
                .element(entry.element)
                .category(entry.category)
                .normals(ability.attack.clone())
                .dodges(ability.dodge.clone())
                .skills(ability.skill.clone())
                .discharges(ability.discharge.clone())
                .enhancement(adv.adv.clone())
                .ref_names(ref_names)
                .build(),
        );
    }

    debug!("linked {} weapons", weapons.len());
    Ok(weapons)
}

/// First index hit over the reference names, probed case-insensitively
/// in set order.
fn probe<'a, T>(index: &'a HashMap<String, T>, ref_names: &BTreeSet<String>) -> Option<&'a T> {
    ref_names
        .iter()
        .find_map(|name| index.get(&name.to_lowercase()))
}

fn missing_linkage(char_name: &str, collection: &'static str, tried: &BTreeSet<String>) -> Error {
    failure_from_kind(ErrorKind::MissingLinkage {
        char_name: char_name.to_owned(),
        collection,
        tried: tried.iter().cloned().collect(),
    })
}
