//! Core weapon data model.
//!
//! Ability entries live in a per-weapon arena and the category lists hold
//! stable [`AbilityId`] handles into it, so edits can relocate an ability
//! between categories without invalidating anything that points at it.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use bon::bon;
use serde_json::{Map, Value};

use crate::codec::{self, CodecError, FromValue, ToValue};

// ------------------------------------------------------------------------
// Enums
// ------------------------------------------------------------------------

/// Weapon damage element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    Physical,
    Flame,
    Volt,
    Frost,
    Altered,
}

impl Element {
    /// Name used in exported json.
    pub fn name(&self) -> &'static str {
        match self {
            Element::Physical => "PHYSICAL",
            Element::Flame => "FLAME",
            Element::Volt => "VOLT",
            Element::Frost => "FROST",
            Element::Altered => "ALTERED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PHYSICAL" => Some(Element::Physical),
            "FLAME" => Some(Element::Flame),
            "VOLT" => Some(Element::Volt),
            "FROST" => Some(Element::Frost),
            "ALTERED" => Some(Element::Altered),
            _ => None,
        }
    }

    /// Token used by the datatables (`EWeaponElementType::Thunder` etc).
    pub fn from_raw(token: &str) -> Option<Self> {
        match token {
            "Physics" => Some(Element::Physical),
            "Flame" => Some(Element::Flame),
            "Thunder" => Some(Element::Volt),
            "Ice" => Some(Element::Frost),
            "Superpower" => Some(Element::Altered),
            _ => None,
        }
    }
}

impl ToValue for Element {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.name().to_owned()))
    }
}

impl FromValue for Element {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let token = codec::expect_str(value)?;
        Element::from_name(token).ok_or_else(|| CodecError::UnknownToken {
            what: "element",
            token: token.to_owned(),
        })
    }
}

/// Weapon combat role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Dps,
    Support,
    Tank,
}

impl Category {
    pub fn name(&self) -> &'static str {
        match self {
            Category::Dps => "DPS",
            Category::Support => "SUPPORT",
            Category::Tank => "TANK",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "DPS" => Some(Category::Dps),
            "SUPPORT" => Some(Category::Support),
            "TANK" => Some(Category::Tank),
            _ => None,
        }
    }

    /// Token used by the datatables (`EWeaponCategory::SUP` etc).
    pub fn from_raw(token: &str) -> Option<Self> {
        match token {
            "DPS" => Some(Category::Dps),
            "SUP" => Some(Category::Support),
            "Tank" => Some(Category::Tank),
            _ => None,
        }
    }
}

impl ToValue for Category {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.name().to_owned()))
    }
}

impl FromValue for Category {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let token = codec::expect_str(value)?;
        Category::from_name(token).ok_or_else(|| CodecError::UnknownToken {
            what: "category",
            token: token.to_owned(),
        })
    }
}

/// An input control in an ability's trigger sequence. The datatables
/// encode these as small integers; exported json uses the names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Attack,
    Jump,
    Dodge,
    Sneak,
    DirectionalKey,
    HoldAttack,
    And,
    Next,
    HoldDodge,
}

impl Control {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Control::Attack),
            1 => Some(Control::Jump),
            2 => Some(Control::Dodge),
            3 => Some(Control::Sneak),
            4 => Some(Control::DirectionalKey),
            5 => Some(Control::HoldAttack),
            6 => Some(Control::And),
            7 => Some(Control::Next),
            8 => Some(Control::HoldDodge),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Control::Attack => "ATTACK",
            Control::Jump => "JUMP",
            Control::Dodge => "DODGE",
            Control::Sneak => "SNEAK",
            Control::DirectionalKey => "DIRECTIONAL_KEY",
            Control::HoldAttack => "HOLD_ATTACK",
            Control::And => "AND",
            Control::Next => "NEXT",
            Control::HoldDodge => "HOLD_DODGE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ATTACK" => Some(Control::Attack),
            "JUMP" => Some(Control::Jump),
            "DODGE" => Some(Control::Dodge),
            "SNEAK" => Some(Control::Sneak),
            "DIRECTIONAL_KEY" => Some(Control::DirectionalKey),
            "HOLD_ATTACK" => Some(Control::HoldAttack),
            "AND" => Some(Control::And),
            "NEXT" => Some(Control::Next),
            "HOLD_DODGE" => Some(Control::HoldDodge),
            _ => None,
        }
    }

    /// Display ordering weight. A directional-key input sorts alongside
    /// jump rather than at its raw position.
    pub fn sort_value(self) -> u8 {
        match self {
            Control::DirectionalKey => 1,
            other => other as u8,
        }
    }
}

impl ToValue for Control {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.name().to_owned()))
    }
}

impl FromValue for Control {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let token = codec::expect_str(value)?;
        Control::from_name(token).ok_or_else(|| CodecError::UnknownToken {
            what: "control",
            token: token.to_owned(),
        })
    }
}

/// The five ability lists a weapon carries. Passives start empty and are
/// only populated by the edit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilityCategory {
    Normals,
    Dodges,
    Skills,
    Discharges,
    Passives,
}

impl AbilityCategory {
    pub const ALL: [AbilityCategory; 5] = [
        AbilityCategory::Normals,
        AbilityCategory::Dodges,
        AbilityCategory::Skills,
        AbilityCategory::Discharges,
        AbilityCategory::Passives,
    ];

    /// Field name in exported json, also the target name in edit tables.
    pub fn field_name(&self) -> &'static str {
        match self {
            AbilityCategory::Normals => "normals",
            AbilityCategory::Dodges => "dodges",
            AbilityCategory::Skills => "skills",
            AbilityCategory::Discharges => "discharges",
            AbilityCategory::Passives => "passives",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        match name {
            "normals" => Some(AbilityCategory::Normals),
            "dodges" => Some(AbilityCategory::Dodges),
            "skills" => Some(AbilityCategory::Skills),
            "discharges" => Some(AbilityCategory::Discharges),
            "passives" => Some(AbilityCategory::Passives),
            _ => None,
        }
    }
}

impl ToValue for AbilityCategory {
    fn to_value(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.field_name().to_owned()))
    }
}

impl FromValue for AbilityCategory {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let token = codec::expect_str(value)?;
        AbilityCategory::from_field_name(token).ok_or_else(|| CodecError::UnknownToken {
            what: "ability category",
            token: token.to_owned(),
        })
    }
}

// ------------------------------------------------------------------------
// Abilities
// ------------------------------------------------------------------------

/// A single ability: display name, description, icon path, and the input
/// sequence that triggers it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AbilityItem {
    pub name: String,
    pub desc: String,
    pub icon: String,
    pub control: Vec<Control>,
}

impl AbilityItem {
    /// Display order within an ability list: entries without an input
    /// sequence sort last, the rest compare control weights position by
    /// position with shorter sequences first on ties.
    pub fn control_cmp(&self, other: &AbilityItem) -> Ordering {
        match (self.control.is_empty(), other.control.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self
                .control
                .iter()
                .map(|c| c.sort_value())
                .cmp(other.control.iter().map(|c| c.sort_value())),
        }
    }
}

impl ToValue for AbilityItem {
    fn to_value(&self) -> Result<Value, CodecError> {
        let mut obj = Map::new();
        obj.insert("name".to_owned(), self.name.to_value()?);
        obj.insert("desc".to_owned(), self.desc.to_value()?);
        obj.insert("icon".to_owned(), self.icon.to_value()?);
        obj.insert("control".to_owned(), self.control.to_value()?);
        Ok(Value::Object(obj))
    }
}

impl FromValue for AbilityItem {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let obj = codec::expect_object(value)?;
        Ok(AbilityItem {
            name: codec::field(obj, "name")?,
            desc: codec::field(obj, "desc")?,
            icon: codec::field(obj, "icon")?,
            control: codec::opt_field(obj, "control")?.unwrap_or_default(),
        })
    }
}

/// Handle into a weapon's ability arena. Stable across category moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbilityId(pub(crate) usize);

// ------------------------------------------------------------------------
// Intermediate extraction records
// ------------------------------------------------------------------------

/// Per-weapon row of the static weapon table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameIntroEntry {
    pub weapon_name: String,
    pub weapon_intro: String,
    pub weapon_image: String,
    pub element: Element,
    pub category: Category,
    pub name_image_path: String,
    /// Reference name recovered from the row's first skill id, empty when
    /// the id does not match the player-ability pattern.
    pub extra_ref_name: String,
}

/// Per-character row of the imitation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRefEntry {
    pub char_name: String,
    pub char_vertical_banner_image: String,
    pub char_centered_image: String,
    pub ref_names: BTreeSet<String>,
    pub name_image_path: String,
}

/// Advancement descriptions for one reference name, keyed by tier 1..=15.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advancements {
    pub ref_name: String,
    pub adv: BTreeMap<u32, String>,
}

/// The four ability lists collected for one reference name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Abilities {
    pub ref_name: String,
    pub attack: Vec<AbilityItem>,
    pub dodge: Vec<AbilityItem>,
    pub skill: Vec<AbilityItem>,
    pub discharge: Vec<AbilityItem>,
}

impl Abilities {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn list_mut(&mut self, category: AbilityCategory) -> Option<&mut Vec<AbilityItem>> {
        match category {
            AbilityCategory::Normals => Some(&mut self.attack),
            AbilityCategory::Dodges => Some(&mut self.dodge),
            AbilityCategory::Skills => Some(&mut self.skill),
            AbilityCategory::Discharges => Some(&mut self.discharge),
            AbilityCategory::Passives => None,
        }
    }
}

// ------------------------------------------------------------------------
// Weapon
// ------------------------------------------------------------------------

/// A fully linked weapon: character identity, weapon info, ability lists,
/// and advancement descriptions.
///
/// The normal and dodge lists are sorted by [`AbilityItem::control_cmp`]
/// at construction; [`Weapon::sort_ability_lists`] restores the order
/// after edits.
#[derive(Debug, Clone)]
pub struct Weapon {
    pub char_name: String,
    pub char_banner_image: String,
    pub char_centered_image: String,
    pub name: String,
    pub image: String,
    pub intro: String,
    pub element: Element,
    pub category: Category,
    abilities: Vec<AbilityItem>,
    normals: Vec<AbilityId>,
    dodges: Vec<AbilityId>,
    skills: Vec<AbilityId>,
    discharges: Vec<AbilityId>,
    passives: Vec<AbilityId>,
    pub enhancement: BTreeMap<u32, String>,
    pub ref_names: BTreeSet<String>,
}

#[bon]
impl Weapon {
    #[builder]
    pub fn new(
        #[builder(default)] char_name: String,
        #[builder(default)] char_banner_image: String,
        #[builder(default)] char_centered_image: String,
        #[builder(default)] name: String,
        #[builder(default)] image: String,
        #[builder(default)] intro: String,
        #[builder(default = Element::Altered)] element: Element,
        #[builder(default = Category::Dps)] category: Category,
        #[builder(default)] normals: Vec<AbilityItem>,
        #[builder(default)] dodges: Vec<AbilityItem>,
        #[builder(default)] skills: Vec<AbilityItem>,
        #[builder(default)] discharges: Vec<AbilityItem>,
        #[builder(default)] passives: Vec<AbilityItem>,
        #[builder(default)] enhancement: BTreeMap<u32, String>,
        #[builder(default)] ref_names: BTreeSet<String>,
    ) -> Self {
        let mut weapon = Self {
            char_name,
            char_banner_image,
            char_centered_image,
            name,
            image,
            intro,
            element,
            category,
            abilities: Vec::new(),
            normals: Vec::new(),
            dodges: Vec::new(),
            skills: Vec::new(),
            discharges: Vec::new(),
            passives: Vec::new(),
            enhancement,
            ref_names,
        };
        for (category, items) in [
            (AbilityCategory::Normals, normals),
            (AbilityCategory::Dodges, dodges),
            (AbilityCategory::Skills, skills),
            (AbilityCategory::Discharges, discharges),
            (AbilityCategory::Passives, passives),
        ] {
            for item in items {
                weapon.add_ability(category, item);
            }
        }
        weapon.sort_ability_lists();
        weapon
    }
}

impl Weapon {
    pub fn ability(&self, id: AbilityId) -> &AbilityItem {
        &self.abilities[id.0]
    }

    pub fn ability_mut(&mut self, id: AbilityId) -> &mut AbilityItem {
        &mut self.abilities[id.0]
    }

    /// Handles currently in the given category, in display order.
    pub fn ids(&self, category: AbilityCategory) -> &[AbilityId] {
        match category {
            AbilityCategory::Normals => &self.normals,
            AbilityCategory::Dodges => &self.dodges,
            AbilityCategory::Skills => &self.skills,
            AbilityCategory::Discharges => &self.discharges,
            AbilityCategory::Passives => &self.passives,
        }
    }

    pub(crate) fn ids_mut(&mut self, category: AbilityCategory) -> &mut Vec<AbilityId> {
        match category {
            AbilityCategory::Normals => &mut self.normals,
            AbilityCategory::Dodges => &mut self.dodges,
            AbilityCategory::Skills => &mut self.skills,
            AbilityCategory::Discharges => &mut self.discharges,
            AbilityCategory::Passives => &mut self.passives,
        }
    }

    /// Abilities currently in the given category, in display order.
    pub fn items(&self, category: AbilityCategory) -> impl Iterator<Item = &AbilityItem> {
        self.ids(category).iter().map(|id| &self.abilities[id.0])
    }

    /// Append an ability to a category, returning its handle.
    pub fn add_ability(&mut self, category: AbilityCategory, item: AbilityItem) -> AbilityId {
        let id = AbilityId(self.abilities.len());
        self.abilities.push(item);
        self.ids_mut(category).push(id);
        id
    }

    /// Category currently holding `id`. Looked up live because edits move
    /// handles between lists.
    pub fn category_of(&self, id: AbilityId) -> Option<AbilityCategory> {
        AbilityCategory::ALL
            .into_iter()
            .find(|category| self.ids(*category).contains(&id))
    }

    /// Remove `id` from whichever category list holds it. The arena entry
    /// stays valid; the handle can be re-attached with
    /// [`Weapon::ids_mut`].
    pub(crate) fn detach(&mut self, id: AbilityId) -> Option<AbilityCategory> {
        for category in AbilityCategory::ALL {
            let ids = self.ids_mut(category);
            if let Some(pos) = ids.iter().position(|x| *x == id) {
                ids.remove(pos);
                return Some(category);
            }
        }
        None
    }

    /// Restore the control-order invariant on the normal and dodge lists.
    pub fn sort_ability_lists(&mut self) {
        let Self {
            abilities,
            normals,
            dodges,
            ..
        } = self;
        normals.sort_by(|a, b| abilities[a.0].control_cmp(&abilities[b.0]));
        dodges.sort_by(|a, b| abilities[a.0].control_cmp(&abilities[b.0]));
    }

    fn items_value(&self, category: AbilityCategory) -> Result<Value, CodecError> {
        let items = self
            .items(category)
            .map(|item| item.to_value())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Array(items))
    }
}

/// Weapons compare by their resolved ability sequences, not by arena
/// layout, so two weapons that went through different edit histories but
/// ended up with the same content are equal.
impl PartialEq for Weapon {
    fn eq(&self, other: &Self) -> bool {
        self.char_name == other.char_name
            && self.char_banner_image == other.char_banner_image
            && self.char_centered_image == other.char_centered_image
            && self.name == other.name
            && self.image == other.image
            && self.intro == other.intro
            && self.element == other.element
            && self.category == other.category
            && self.enhancement == other.enhancement
            && self.ref_names == other.ref_names
            && AbilityCategory::ALL
                .into_iter()
                .all(|category| self.items(category).eq(other.items(category)))
    }
}

impl Eq for Weapon {}

impl ToValue for Weapon {
    fn to_value(&self) -> Result<Value, CodecError> {
        let mut obj = Map::new();
        obj.insert("char".to_owned(), self.char_name.to_value()?);
        obj.insert(
            "char_banner_image".to_owned(),
            self.char_banner_image.to_value()?,
        );
        obj.insert(
            "char_centered_image".to_owned(),
            self.char_centered_image.to_value()?,
        );
        obj.insert("name".to_owned(), self.name.to_value()?);
        obj.insert("image".to_owned(), self.image.to_value()?);
        obj.insert("intro".to_owned(), self.intro.to_value()?);
        obj.insert("element".to_owned(), self.element.to_value()?);
        obj.insert("category".to_owned(), self.category.to_value()?);
        for category in AbilityCategory::ALL {
            obj.insert(
                category.field_name().to_owned(),
                self.items_value(category)?,
            );
        }
        obj.insert("enhancement".to_owned(), self.enhancement.to_value()?);
        obj.insert("ref_names".to_owned(), self.ref_names.to_value()?);
        Ok(Value::Object(obj))
    }
}

impl FromValue for Weapon {
    fn from_value(value: &Value) -> Result<Self, CodecError> {
        let obj = codec::expect_object(value)?;
        Ok(Weapon::builder()
            .maybe_char_name(codec::opt_field(obj, "char")?)
            .maybe_char_banner_image(codec::opt_field(obj, "char_banner_image")?)
            .maybe_char_centered_image(codec::opt_field(obj, "char_centered_image")?)
            .maybe_name(codec::opt_field(obj, "name")?)
            .maybe_image(codec::opt_field(obj, "image")?)
            .maybe_intro(codec::opt_field(obj, "intro")?)
            .maybe_element(codec::opt_field(obj, "element")?)
            .maybe_category(codec::opt_field(obj, "category")?)
            .maybe_normals(codec::opt_field(obj, "normals")?)
            .maybe_dodges(codec::opt_field(obj, "dodges")?)
            .maybe_skills(codec::opt_field(obj, "skills")?)
            .maybe_discharges(codec::opt_field(obj, "discharges")?)
            .maybe_passives(codec::opt_field(obj, "passives")?)
            .maybe_enhancement(codec::opt_field(obj, "enhancement")?)
            .maybe_ref_names(codec::opt_field(obj, "ref_names")?)
            .build())
    }
}
