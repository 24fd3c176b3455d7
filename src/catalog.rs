//! Local catalog of collectible objects. Used for the first object of every run and
//! whenever the object provider fails or has not delivered yet.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// (emoji, name, color, mantra). Entry 0 opens every session.
pub const MINDFUL_OBJECTS: &[(&str, &str, &str, &str)] = &[
    ("🍎", "Crimson Apple", "#ff4d4d", "Mindful Alignment"),
    ("💠", "Crystal Lozenge", "#00d2ff", "Clarity is the byproduct of pressure."),
    ("🍋", "Citrine Lemon", "#fef250", "Every sourness holds a hidden vitality."),
    ("⚪", "Infinite Circle", "#ffffff", "Only the present truly exists."),
    ("🍑", "Velvet Peach", "#ff9a9e", "Softness is a strength rarely understood."),
    ("🍊", "Golden Orange", "#ffa500", "Radiate the warmth you wish to find."),
    ("🔺", "Primal Triangle", "#ff5e62", "Stability is found in balanced focus."),
    ("🍇", "Royal Grapes", "#9370db", "Connection flows in clusters of grace."),
    ("🍓", "Wild Strawberry", "#ff69b4", "Cherish the sweetness of the fleeting moment."),
    ("★", "Radiant Star", "#f6d365", "Light travels far when the heart is clear."),
    ("🍈", "Dew Melon", "#90ee90", "Growth happens in the quiet hours."),
    ("💎", "Pure Diamond", "#e0ffff", "A steady heart reflects everything."),
    ("🍍", "Golden Pine", "#ffd700", "Stand tall, wear your own crown."),
    ("🟢", "Zen Sphere", "#00ff7f", "Balance is not something you find, it is something you create."),
    ("🫐", "Blueberry", "#4169e1", "Small moments create a grand life."),
];

/// A collectible shown in the centre of the ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindfulObject {
    #[serde(default)]
    pub id: String,
    pub emoji: String,
    pub name: String,
    pub color: String,
    pub mantra: String,
}

/// Build the catalog entry at `idx` (wrapped into range). Ids are 1-based.
pub fn catalog_object(idx: usize) -> MindfulObject {
    let i = idx % MINDFUL_OBJECTS.len();
    let (emoji, name, color, mantra) = MINDFUL_OBJECTS[i];
    MindfulObject {
        id: (i + 1).to_string(),
        emoji: emoji.to_string(),
        name: name.to_string(),
        color: color.to_string(),
        mantra: mantra.to_string(),
    }
}

pub fn starting_object() -> MindfulObject {
    catalog_object(0)
}

/// Pick a substitute when the provider can't deliver. Scans the catalog starting
/// at `level % len` for an emoji the player hasn't seen; if everything has been
/// seen, the entry at `level % len` is reused.
pub fn fallback_object(excluded: &HashSet<String>, level: u32) -> MindfulObject {
    let len = MINDFUL_OBJECTS.len();
    let start = level as usize % len;
    (0..len)
        .map(|off| (start + off) % len)
        .find(|&i| !excluded.contains(MINDFUL_OBJECTS[i].0))
        .map(catalog_object)
        .unwrap_or_else(|| catalog_object(start))
}
