//! Hand-authored corrections applied to linked weapons.
//!
//! Upstream descriptions sometimes pack several distinct abilities into
//! one blob of text, or carry trailing markup. A small edit table, keyed
//! by character and then by ability selector, patches those up after
//! linking. The table is data: it lives in a json file next to the run
//! configuration and round-trips through [`ToValue`]/[`FromValue`].

use std::fs;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::{self, CodecError, FromValue, OneOrMany, ToValue, value_kind};
use crate::error::DataResult;
use crate::weapon::types::{AbilityCategory, AbilityId, AbilityItem, Control, Weapon};

#[derive(Error, Debug)]
pub enum EditError {
    #[error("edit table names unknown weapon '{0}'")]
    WeaponNotFound(String),
    #[error("no ability named '{name}' on '{char_name}'")]
    AbilityNotFound { char_name: String, name: String },
    #[error("pattern '{pattern}' did not change {text:?}")]
    PatternNotFound { pattern: String, text: String },
    #[error("PREVIOUS used before any operation")]
    NoPreviousOperation,
    #[error("PREVIOUS cannot appear inside an operation list")]
    NestedPrevious,
    #[error("bad edit pattern '{pattern}'")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Edit patterns treat `.` as matching newlines, since descriptions are
/// multi-line blobs.
fn compile(pattern: &str) -> Result<Regex, EditError> {
    RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .build()
        .map_err(|source| EditError::BadPattern {
            pattern: pattern.to_owned(),
            source,
        })
}

// ------------------------------------------------------------------------
// Operations
// ------------------------------------------------------------------------

/// Pure text rewrites. Applied to a description, or to a captured
/// fragment as a [`MoveOp`] post-format step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOp {
    /// Delete the first match of the pattern. Fails if nothing changes.
    Remove(String),
    /// Trim leading and trailing whitespace.
    Strip,
    /// Insert a line break before each match of the pattern.
    InsertNewlines(String),
}

impl TextOp {
    pub fn apply(&self, text: &str) -> Result<String, EditError> {
        match self {
            TextOp::Strip => Ok(text.trim().to_owned()),
            TextOp::Remove(pattern) => {
                let matched = compile(pattern)?.find(text);
                match matched {
                    Some(m) if !m.range().is_empty() => {
                        let mut out = text.to_owned();
                        out.replace_range(m.range(), "");
                        Ok(out)
                    }
                    _ => Err(EditError::PatternNotFound {
                        pattern: pattern.clone(),
                        text: text.to_owned(),
                    }),
                }
            }
            TextOp::InsertNewlines(pattern) => {
                let re = compile(pattern)?;
                let mut out = String::with_capacity(text.len());
                let mut last = 0;
                for m in re.find_iter(text) {
                    out.push_str(&text[last..m.start()]);
                    out.push('\n');
                    out.push_str(m.as_str());
                    last = m.end();
                }
                out.push_str(&text[last..]);
                Ok(out)
            }
        }
    }
}

/// Relocate an ability, or split part of its description off into a new
/// ability in another category.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOp {
    pub to: AbilityCategory,
    /// Capture pattern over the description. Without one the whole
    /// ability moves; with one, the first match becomes the new ability's
    /// description and is cut from the original.
    pub regex: Option<String>,
    /// Formatting applied to the captured fragment.
    pub post_format: OneOrMany<TextOp>,
    /// Name for the split-off ability; defaults to the original's.
    pub name: Option<String>,
    /// Icon for the split-off ability; defaults to the original's.
    pub icon: Option<String>,
}

impl Default for MoveOp {
    fn default() -> Self {
        Self {
            to: AbilityCategory::Passives,
            regex: None,
            post_format: OneOrMany::One(TextOp::Strip),
            name: None,
            icon: None,
        }
    }
}

impl MoveOp {
    fn apply(&self, weapon: &mut Weapon, id: AbilityId) -> Result<(), EditError> {
        let Some(pattern) = &self.regex else {
            weapon.detach(id);
            weapon.ids_mut(self.to).push(id);
            return Ok(());
        };

        let desc = weapon.ability(id).desc.clone();
        let Some(m) = compile(pattern)?.find(&desc) else {
            return Err(EditError::PatternNotFound {
                pattern: pattern.clone(),
                text: desc,
            });
        };

        let mut captured = m.as_str().to_owned();
        for op in self.post_format.iter() {
            captured = op.apply(&captured)?;
        }

        let original = weapon.ability(id);
        let item = AbilityItem {
            name: self.name.clone().unwrap_or_else(|| original.name.clone()),
            desc: captured,
            icon: self.icon.clone().unwrap_or_else(|| original.icon.clone()),
            control: Vec::new(),
        };
        weapon.add_ability(self.to, item);
        weapon.ability_mut(id).desc.replace_range(m.range(), "");
        Ok(())
    }
}

/// Overwrite individual ability fields in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModifyOp {
    pub name: Option<String>,
    pub desc: Option<String>,
    pub icon: Option<String>,
    pub control: Option<Vec<Control>>,
}

impl ModifyOp {
    fn apply(&self, ability: &mut AbilityItem) {
        if let Some(name) = &self.name {
            ability.name = name.clone();
        }
        if let Some(desc) = &self.desc {
            ability.desc = desc.clone();
        }
        if let Some(icon) = &self.icon {
            ability.icon = icon.clone();
        }
        if let Some(control) = &self.control {
            ability.control = control.clone();
        }
    }
}

/// One edit operation as stored in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum ModOp {
    Text(TextOp),
    Move(MoveOp),
    Modify(ModifyOp),
    /// Reuse the operations of the preceding selector.
    Previous,
}

fn apply_op(op: &ModOp, weapon: &mut Weapon, id: AbilityId) -> Result<(), EditError> {
    match op {
        ModOp::Text(text_op) => {
            let desc = text_op.apply(&weapon.ability(id).desc)?;
            weapon.ability_mut(id).desc = desc;
            Ok(())
        }
        ModOp::Move(move_op) => move_op.apply(weapon, id),
        ModOp::Modify(modify_op) => {
            modify_op.apply(weapon.ability_mut(id));
            Ok(())
        }
        ModOp::Previous => Err(EditError::NestedPrevious),
    }
}

// ------------------------------------------------------------------------
// Selectors and the table
// ------------------------------------------------------------------------

/// What an edit entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A single ability, looked up by display name.
    Name(String),
    /// Every ability currently in one category.
    Category(AbilityCategory),
    /// Every ability across the four combat categories.
    All,
}

impl Selector {
    fn parse(key: &str) -> Selector {
        match key {
            "NORMALS" => Selector::Category(AbilityCategory::Normals),
            "DODGES" => Selector::Category(AbilityCategory::Dodges),
            "SKILLS" => Selector::Category(AbilityCategory::Skills),
            "DISCHARGES" => Selector::Category(AbilityCategory::Discharges),
            "PASSIVES" => Selector::Category(AbilityCategory::Passives),
            "*" => Selector::All,
            name => Selector::Name(name.to_owned()),
        }
    }

    fn wire_key(&self) -> String {
        match self {
            Selector::Name(name) => name.clone(),
            Selector::Category(AbilityCategory::Normals) => "NORMALS".to_owned(),
            Selector::Category(AbilityCategory::Dodges) => "DODGES".to_owned(),
            Selector::Category(AbilityCategory::Skills) => "SKILLS".to_owned(),
            Selector::Category(AbilityCategory::Discharges) => "DISCHARGES".to_owned(),
            Selector::Category(AbilityCategory::Passives) => "PASSIVES".to_owned(),
            Selector::All => "*".to_owned(),
        }
    }
}

/// The full edit table: character name to selector to operations, both
/// levels in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditTable {
    mods: Vec<(String, Vec<(Selector, OneOrMany<ModOp>)>)>,
}

impl EditTable {
    pub fn load(path: &Path) -> DataResult<Self> {
        let text = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Ok(Self::from_value(&value)?)
    }

    /// Apply every entry, in table order. Any failure aborts the pass:
    /// the table is hand-authored against a specific data drop growing
    /// stale, and a partial application would be worse than none.
    pub fn apply(&self, weapons: &mut [Weapon]) -> Result<(), EditError> {
        for (char_name, selectors) in &self.mods {
            let weapon = weapons
                .iter_mut()
                .find(|weapon| weapon.char_name == *char_name)
                .ok_or_else(|| EditError::WeaponNotFound(char_name.clone()))?;
            Self::apply_weapon(char_name, selectors, weapon)?;
            weapon.sort_ability_lists();
        }
        Ok(())
    }

    fn apply_weapon(
        char_name: &str,
        selectors: &[(Selector, OneOrMany<ModOp>)],
        weapon: &mut Weapon,
    ) -> Result<(), EditError> {
        // Name index over the combat lists. A later ability with the same
        // name takes over the handle but keeps the earlier slot, so `*`
        // iteration order stays stable.
        let mut index: Vec<(String, AbilityId)> = Vec::new();
        for category in [
            AbilityCategory::Normals,
            AbilityCategory::Dodges,
            AbilityCategory::Skills,
            AbilityCategory::Discharges,
        ] {
            for id in weapon.ids(category) {
                let name = &weapon.ability(*id).name;
                match index.iter_mut().find(|(indexed, _)| indexed == name) {
                    Some(slot) => slot.1 = *id,
                    None => index.push((name.clone(), *id)),
                }
            }
        }

        let mut previous: Option<&OneOrMany<ModOp>> = None;
        for (selector, ops) in selectors {
            let ops = if matches!(ops, OneOrMany::One(ModOp::Previous)) {
                previous.ok_or(EditError::NoPreviousOperation)?
            } else {
                ops
            };

            let targets: Vec<AbilityId> = match selector {
                Selector::Name(name) => {
                    let id = index
                        .iter()
                        .find(|(indexed, _)| indexed == name)
                        .map(|(_, id)| *id)
                        .ok_or_else(|| EditError::AbilityNotFound {
                            char_name: char_name.to_owned(),
                            name: name.clone(),
                        })?;
                    vec![id]
                }
                Selector::Category(category) => weapon.ids(*category).to_vec(),
                Selector::All => index.iter().map(|(_, id)| *id).collect(),
            };

            for id in targets {
                for op in ops.iter() {
                    apply_op(op, weapon, id)?;
                }
            }
            previous = Some(ops);
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------
// Wire format
// ------------------------------------------------------------------------
//
// Operations without parameters are bare strings ("STRIP", "PREVIOUS").
// Single-parameter operations are `{ "NAME": pattern }`; older tables
// wrapped the pattern in a one-entry object, which is still accepted.
// Move and Modify are `{ "NAME": { field: value, .. } }` with defaulted
// fields omitted.

fn single_param(arg: &Value) -> Result<String, CodecError> {
    match arg {
        Value::String(pattern) => Ok(pattern.clone()),
        Value::Object(obj) if obj.len() == 1 => match obj.values().next() {
            Some(Value::String(pattern)) => Ok(pattern.clone()),
            Some(other) => Err(CodecError::TypeMismatch {
                field: "",
                expected: "pattern string",
                found: value_kind(other),
            }),
            None => unreachable!(),
        },
        other => Err(CodecError::TypeMismatch {
            field: "",
            expected: "pattern string",
            found: value_kind(other),
        }),
    }
}

impl ToValue for TextOp {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(match self {
            TextOp::Strip => Value::String("STRIP".to_owned()),
            TextOp::Remove(pattern) => {
                let mut obj = Map::new();
                obj.insert("REMOVE".to_owned(), Value::String(pattern.clone()));
                Value::Object(obj)
            }
            TextOp::InsertNewlines(pattern) => {
                let mut obj = Map::new();
                obj.insert("INSERT_NEWLINES".to_owned(), Value::String(pattern.clone()));
                Value::Object(obj)
            }
        })
    }
}

impl FromValue for TextOp {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::String(token) => match token.as_str() {
                "STRIP" => Ok(TextOp::Strip),
                other => Err(CodecError::UnknownToken {
                    what: "text operation",
                    token: other.to_owned(),
                }),
            },
            Value::Object(obj) if obj.len() == 1 => {
                let (key, arg) = obj.iter().next().ok_or(CodecError::MissingField {
                    field: "operation",
                })?;
                match key.as_str() {
                    "REMOVE" => Ok(TextOp::Remove(single_param(arg)?)),
                    "INSERT_NEWLINES" => Ok(TextOp::InsertNewlines(single_param(arg)?)),
                    other => Err(CodecError::UnknownToken {
                        what: "text operation",
                        token: other.to_owned(),
                    }),
                }
            }
            other => Err(CodecError::AmbiguousUnion {
                union: "text operation",
                found: value_kind(other),
            }),
        }
    }
}

impl ToValue for MoveOp {
    fn to_value(&self) -> Result<Value, CodecError> {
        let mut obj = Map::new();
        obj.insert("to".to_owned(), self.to.to_value()?);
        if let Some(regex) = &self.regex {
            obj.insert("regex".to_owned(), Value::String(regex.clone()));
        }
        if !matches!(&self.post_format, OneOrMany::One(TextOp::Strip)) {
            obj.insert("post_format".to_owned(), self.post_format.to_value()?);
        }
        if let Some(name) = &self.name {
            obj.insert("name".to_owned(), Value::String(name.clone()));
        }
        if let Some(icon) = &self.icon {
            obj.insert("icon".to_owned(), Value::String(icon.clone()));
        }
        Ok(Value::Object(obj))
    }
}

impl FromValue for MoveOp {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let obj = codec::expect_object(value)?;
        Ok(MoveOp {
            to: codec::field(obj, "to")?,
            regex: codec::opt_field(obj, "regex")?,
            post_format: codec::opt_field(obj, "post_format")?
                .unwrap_or(OneOrMany::One(TextOp::Strip)),
            name: codec::opt_field(obj, "name")?,
            icon: codec::opt_field(obj, "icon")?,
        })
    }
}

impl ToValue for ModifyOp {
    fn to_value(&self) -> Result<Value, CodecError> {
        let mut obj = Map::new();
        if let Some(name) = &self.name {
            obj.insert("name".to_owned(), Value::String(name.clone()));
        }
        if let Some(desc) = &self.desc {
            obj.insert("desc".to_owned(), Value::String(desc.clone()));
        }
        if let Some(icon) = &self.icon {
            obj.insert("icon".to_owned(), Value::String(icon.clone()));
        }
        if let Some(control) = &self.control {
            obj.insert("control".to_owned(), control.to_value()?);
        }
        Ok(Value::Object(obj))
    }
}

impl FromValue for ModifyOp {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let obj = codec::expect_object(value)?;
        Ok(ModifyOp {
            name: codec::opt_field(obj, "name")?,
            desc: codec::opt_field(obj, "desc")?,
            icon: codec::opt_field(obj, "icon")?,
            control: codec::opt_field(obj, "control")?,
        })
    }
}

impl ToValue for ModOp {
    fn to_value(&self) -> Result<Value, CodecError> {
        match self {
            ModOp::Text(op) => op.to_value(),
            ModOp::Previous => Ok(Value::String("PREVIOUS".to_owned())),
            ModOp::Move(op) => {
                let mut obj = Map::new();
                obj.insert("MOVE".to_owned(), op.to_value()?);
                Ok(Value::Object(obj))
            }
            ModOp::Modify(op) => {
                let mut obj = Map::new();
                obj.insert("MODIFY".to_owned(), op.to_value()?);
                Ok(Value::Object(obj))
            }
        }
    }
}

impl FromValue for ModOp {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        match value {
            Value::String(token) => match token.as_str() {
                "STRIP" => Ok(ModOp::Text(TextOp::Strip)),
                "PREVIOUS" => Ok(ModOp::Previous),
                other => Err(CodecError::UnknownToken {
                    what: "edit operation",
                    token: other.to_owned(),
                }),
            },
            Value::Object(obj) if obj.len() == 1 => {
                let (key, arg) = obj.iter().next().ok_or(CodecError::MissingField {
                    field: "operation",
                })?;
                match key.as_str() {
                    "REMOVE" => Ok(ModOp::Text(TextOp::Remove(single_param(arg)?))),
                    "INSERT_NEWLINES" => {
                        Ok(ModOp::Text(TextOp::InsertNewlines(single_param(arg)?)))
                    }
                    "MOVE" => Ok(ModOp::Move(MoveOp::from_value(arg)?)),
                    "MODIFY" => Ok(ModOp::Modify(ModifyOp::from_value(arg)?)),
                    other => Err(CodecError::UnknownToken {
                        what: "edit operation",
                        token: other.to_owned(),
                    }),
                }
            }
            other => Err(CodecError::AmbiguousUnion {
                union: "edit operation",
                found: value_kind(other),
            }),
        }
    }
}

impl ToValue for EditTable {
    fn to_value(&self) -> Result<Value, CodecError> {
        let mut table = Map::new();
        for (char_name, selectors) in &self.mods {
            let mut entry = Map::new();
            for (selector, ops) in selectors {
                entry.insert(selector.wire_key(), ops.to_value()?);
            }
            table.insert(char_name.clone(), Value::Object(entry));
        }
        Ok(Value::Object(table))
    }
}

impl FromValue for EditTable {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let table = codec::expect_object(value)?;
        let mut mods = Vec::with_capacity(table.len());
        for (char_name, entry) in table {
            let entry = codec::expect_object(entry)?;
            let mut selectors = Vec::with_capacity(entry.len());
            for (key, ops) in entry {
                selectors.push((Selector::parse(key), OneOrMany::from_value(ops)?));
            }
            mods.push((char_name.clone(), selectors));
        }
        Ok(Self { mods })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::weapon::types::{AbilityItem, Weapon};

    fn ability(name: &str, desc: &str, control: &[Control]) -> AbilityItem {
        AbilityItem {
            name: name.to_owned(),
            desc: desc.to_owned(),
            icon: format!("icons/{name}.png"),
            control: control.to_vec(),
        }
    }

    fn test_weapon() -> Weapon {
        Weapon::builder()
            .char_name("Alice".to_owned())
            .normals(vec![
                ability("Combo", "Five-hit chain.", &[Control::Attack]),
                ability("Aerial", "Air chain.", &[Control::Jump, Control::Attack]),
            ])
            .dodges(vec![ability("Sidestep", "Dash away.", &[Control::Dodge])])
            .skills(vec![ability(
                "Burst",
                "Base text\r\n\r\nExtra info",
                &[],
            )])
            .discharges(vec![ability("Finale", "  padded  ", &[])])
            .build()
    }

    fn names(weapon: &Weapon, category: AbilityCategory) -> Vec<String> {
        weapon.items(category).map(|a| a.name.clone()).collect()
    }

    fn table(value: Value) -> EditTable {
        EditTable::from_value(&value).unwrap()
    }

    #[test]
    fn remove_deletes_first_match_only() {
        let op = TextOp::Remove("ba".to_owned());
        assert_eq!(op.apply("abaaba").unwrap(), "aaba");
    }

    #[test]
    fn remove_requires_a_change() {
        let op = TextOp::Remove("xyz".to_owned());
        let err = op.apply("abc").unwrap_err();
        assert!(matches!(err, EditError::PatternNotFound { .. }));
    }

    #[test]
    fn remove_matches_across_newlines() {
        let op = TextOp::Remove(r"\r\n.*".to_owned());
        assert_eq!(op.apply("keep\r\ndrop\r\nmore").unwrap(), "keep");
    }

    #[test]
    fn insert_newlines_before_each_match() {
        let op = TextOp::InsertNewlines(r"\d+\)".to_owned());
        assert_eq!(op.apply("1) first 2) second").unwrap(), "\n1) first \n2) second");
    }

    #[test]
    fn strip_trims_whitespace() {
        assert_eq!(TextOp::Strip.apply("  x \r\n").unwrap(), "x");
    }

    #[test]
    fn move_without_pattern_relocates_ability() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {
                "Burst": {"MOVE": {"to": "passives"}},
            },
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();
        assert!(names(&weapon, AbilityCategory::Skills).is_empty());
        assert_eq!(names(&weapon, AbilityCategory::Passives), ["Burst"]);
    }

    #[test]
    fn move_with_pattern_splits_description() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {
                "Burst": {"MOVE": {
                    "to": "passives",
                    "regex": r"\r\n\r\n.*",
                    "name": "Residual Effect",
                }},
            },
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();

        let skill = weapon.items(AbilityCategory::Skills).next().unwrap();
        assert_eq!(skill.name, "Burst");
        assert_eq!(skill.desc, "Base text");

        let passive = weapon.items(AbilityCategory::Passives).next().unwrap();
        assert_eq!(passive.name, "Residual Effect");
        assert_eq!(passive.desc, "Extra info");
        // Icon carries over from the source ability.
        assert_eq!(passive.icon, "icons/Burst.png");
        assert!(passive.control.is_empty());
    }

    #[test]
    fn previous_repeats_last_selector_ops() {
        let mut weapon = test_weapon();
        weapon.ability_mut(weapon.ids(AbilityCategory::Normals)[0]).desc =
            "x Five-hit chain.".to_owned();
        weapon.ability_mut(weapon.ids(AbilityCategory::Dodges)[0]).desc =
            "x Dash away.".to_owned();

        let edits = table(json!({
            "Alice": {
                "Combo": {"REMOVE": "x "},
                "Sidestep": "PREVIOUS",
            },
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();
        let combo = weapon
            .items(AbilityCategory::Normals)
            .find(|a| a.name == "Combo")
            .unwrap();
        assert_eq!(combo.desc, "Five-hit chain.");
        let sidestep = weapon.items(AbilityCategory::Dodges).next().unwrap();
        assert_eq!(sidestep.desc, "Dash away.");
    }

    #[test]
    fn previous_first_is_an_error() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {"Combo": "PREVIOUS"},
        }));

        let err = edits.apply(std::slice::from_mut(&mut weapon)).unwrap_err();
        assert!(matches!(err, EditError::NoPreviousOperation));
    }

    #[test]
    fn previous_inside_a_list_is_an_error() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {"Finale": ["STRIP", "PREVIOUS"]},
        }));

        let err = edits.apply(std::slice::from_mut(&mut weapon)).unwrap_err();
        assert!(matches!(err, EditError::NestedPrevious));
    }

    #[test]
    fn category_wildcards_cover_their_own_lists() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {
                "SKILLS": {"MODIFY": {"icon": "icons/skill.png"}},
                "DISCHARGES": {"MODIFY": {"icon": "icons/discharge.png"}},
            },
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();
        let skill = weapon.items(AbilityCategory::Skills).next().unwrap();
        assert_eq!(skill.icon, "icons/skill.png");
        let finale = weapon.items(AbilityCategory::Discharges).next().unwrap();
        assert_eq!(finale.icon, "icons/discharge.png");
        // Untouched categories keep their icons.
        let dodge = weapon.items(AbilityCategory::Dodges).next().unwrap();
        assert_eq!(dodge.icon, "icons/Sidestep.png");
    }

    #[test]
    fn star_covers_all_indexed_abilities() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {"*": {"MODIFY": {"desc": "wiped"}}},
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();
        for category in [
            AbilityCategory::Normals,
            AbilityCategory::Dodges,
            AbilityCategory::Skills,
            AbilityCategory::Discharges,
        ] {
            for item in weapon.items(category) {
                assert_eq!(item.desc, "wiped");
            }
        }
    }

    #[test]
    fn moved_lists_are_resorted() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {
                "Combo": {"MOVE": {"to": "dodges"}},
            },
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();
        // Combo ([ATTACK]) sorts before Sidestep ([DODGE]).
        assert_eq!(names(&weapon, AbilityCategory::Dodges), ["Combo", "Sidestep"]);
    }

    #[test]
    fn unknown_weapon_is_fatal() {
        let mut weapon = test_weapon();
        let edits = table(json!({"Bob": {"Combo": "STRIP"}}));
        let err = edits.apply(std::slice::from_mut(&mut weapon)).unwrap_err();
        assert!(matches!(err, EditError::WeaponNotFound(name) if name == "Bob"));
    }

    #[test]
    fn unknown_ability_is_fatal() {
        let mut weapon = test_weapon();
        let edits = table(json!({"Alice": {"Nope": "STRIP"}}));
        let err = edits.apply(std::slice::from_mut(&mut weapon)).unwrap_err();
        assert!(matches!(err, EditError::AbilityNotFound { name, .. } if name == "Nope"));
    }

    #[test]
    fn operations_round_trip_through_wire_form() {
        let ops = [
            ModOp::Text(TextOp::Strip),
            ModOp::Text(TextOp::Remove(r"\r\n.*".to_owned())),
            ModOp::Text(TextOp::InsertNewlines(r"\d+\)".to_owned())),
            ModOp::Previous,
            ModOp::Move(MoveOp {
                to: AbilityCategory::Passives,
                regex: Some("extra".to_owned()),
                post_format: OneOrMany::Many(vec![
                    TextOp::Strip,
                    TextOp::Remove("a".to_owned()),
                ]),
                name: Some("Split".to_owned()),
                icon: None,
            }),
            ModOp::Modify(ModifyOp {
                desc: Some("new".to_owned()),
                control: Some(vec![Control::Attack, Control::And, Control::Jump]),
                ..ModifyOp::default()
            }),
        ];
        for op in ops {
            let encoded = op.to_value().unwrap();
            let decoded = ModOp::from_value(&encoded).unwrap();
            assert_eq!(decoded, op);
        }
    }

    #[test]
    fn bare_ops_encode_as_strings() {
        assert_eq!(ModOp::Text(TextOp::Strip).to_value().unwrap(), json!("STRIP"));
        assert_eq!(ModOp::Previous.to_value().unwrap(), json!("PREVIOUS"));
        assert_eq!(
            ModOp::Text(TextOp::Remove("x".to_owned())).to_value().unwrap(),
            json!({"REMOVE": "x"})
        );
    }

    #[test]
    fn move_defaults_are_omitted_from_wire_form() {
        let op = ModOp::Move(MoveOp {
            to: AbilityCategory::Passives,
            ..MoveOp::default()
        });
        assert_eq!(op.to_value().unwrap(), json!({"MOVE": {"to": "passives"}}));
    }

    #[test]
    fn legacy_wrapped_remove_still_decodes() {
        let decoded = ModOp::from_value(&json!({"REMOVE": {"pattern": "x"}})).unwrap();
        assert_eq!(decoded, ModOp::Text(TextOp::Remove("x".to_owned())));
    }

    #[test]
    fn multi_key_operation_objects_are_rejected() {
        let value = json!({"REMOVE": "x", "MOVE": {"to": "passives"}});
        let err = ModOp::from_value(&value).unwrap_err();
        assert!(matches!(err, CodecError::AmbiguousUnion { .. }));
    }

    #[test]
    fn category_selectors_round_trip_through_wire_keys() {
        for category in AbilityCategory::ALL {
            let selector = Selector::Category(category);
            assert_eq!(Selector::parse(&selector.wire_key()), selector);
        }
        assert_eq!(Selector::parse("*"), Selector::All);
        assert_eq!(
            Selector::parse("Burst"),
            Selector::Name("Burst".to_owned())
        );
    }

    #[test]
    fn passives_wildcard_covers_moved_abilities() {
        let mut weapon = test_weapon();
        let edits = table(json!({
            "Alice": {
                "Burst": {"MOVE": {"to": "passives"}},
                "PASSIVES": {"MODIFY": {"icon": "icons/passive.png"}},
            },
        }));

        edits.apply(std::slice::from_mut(&mut weapon)).unwrap();
        let passive = weapon.items(AbilityCategory::Passives).next().unwrap();
        assert_eq!(passive.name, "Burst");
        assert_eq!(passive.icon, "icons/passive.png");
    }

    #[test]
    fn edit_table_round_trips_in_order() {
        let value = json!({
            "Alice": {
                "Burst": {"MOVE": {"to": "passives", "regex": "x"}},
                "NORMALS": "STRIP",
                "Sidestep": "PREVIOUS",
            },
            "Bob": {"*": {"REMOVE": "y"}},
        });
        let decoded = EditTable::from_value(&value).unwrap();
        assert_eq!(decoded.to_value().unwrap(), value);
    }
}
