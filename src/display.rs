//! Presentation helpers shared by list, detail and favorites output.

const SPRITES: &str = "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";

/// Official artwork image for an entry id
pub fn artwork_url(id: u32) -> String {
  format!("{SPRITES}/other/official-artwork/{id}.png")
}

/// Gen V static pixel sprite for an entry id
pub fn pixel_sprite_url(id: u32) -> String {
  format!("{SPRITES}/versions/generation-v/black-white/{id}.png")
}

/// Uppercase the first character
pub fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

/// Stat slug to label, e.g. `special-attack` to `Special Attack`
pub fn format_stat_name(stat: &str) -> String {
  match stat {
    "special-attack" => "Special Attack".to_string(),
    "special-defense" => "Special Defense".to_string(),
    other => capitalize(other),
  }
}

/// Ability slug to label, e.g. `lightning-rod` to `Lightning rod`
pub fn format_ability_name(ability: &str) -> String {
  capitalize(&ability.replace('-', " "))
}

/// Zero-padded catalog number, e.g. `025`
pub fn padded_number(id: u32) -> String {
  format!("{:03}", id)
}

pub fn share_text(id: u32, name: &str) -> String {
  format!("Check out {}! #{}", capitalize(name), padded_number(id))
}
