//! Ability tooltip rendering.
//!
//! Placeholders such as `{damage}` are resolved through a fixed table of named
//! fields. Unknown placeholders are left in the text untouched.

use crate::content::AbilityDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipField {
    Name,
    Damage,
    Healing,
    Duration,
    ManaCost,
    Cooldown,
    Range,
}

pub const TOOLTIP_FIELDS: &[(&str, TooltipField)] = &[
    ("name", TooltipField::Name),
    ("damage", TooltipField::Damage),
    ("healing", TooltipField::Healing),
    ("duration", TooltipField::Duration),
    ("mana_cost", TooltipField::ManaCost),
    ("cooldown", TooltipField::Cooldown),
    ("range", TooltipField::Range),
];

pub fn lookup_field(name: &str) -> Option<TooltipField> {
    TOOLTIP_FIELDS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, field)| *field)
}

fn format_number(value: f32) -> String {
    if value.fract().abs() < 0.001 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

pub fn field_value(ability: &AbilityDefinition, field: TooltipField, level: u32) -> String {
    match field {
        TooltipField::Name => ability.display_name.clone(),
        TooltipField::Damage => format_number(ability.damage.value(level)),
        TooltipField::Healing => format_number(ability.healing.value(level)),
        TooltipField::Duration => format_number(ability.duration.value(level)),
        TooltipField::ManaCost => format_number(ability.mana_cost.value(level)),
        TooltipField::Cooldown => format_number(ability.cooldown(level)),
        TooltipField::Range => format_number(ability.range),
    }
}

/// Fills the ability's description template for the given level
pub fn render_tooltip(ability: &AbilityDefinition, level: u32) -> String {
    let template = ability.description.as_str();
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match lookup_field(key) {
                    Some(field) => out.push_str(&field_value(ability, field, level)),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{AbilityType, DamageType, LinearScaling, TargetingMode};
    use crate::AbilityId;

    fn fireball() -> AbilityDefinition {
        AbilityDefinition {
            id: AbilityId::from("fireball"),
            display_name: "Fireball".to_string(),
            description: "{name}: {damage} damage, {mana_cost} mana, {cooldown}s".to_string(),
            ability_type: AbilityType::Active,
            targeting: TargetingMode::Enemy,
            range: 650.0,
            damage_type: DamageType::Magical,
            damage: LinearScaling::new(80.0, 45.0),
            healing: LinearScaling::default(),
            duration: LinearScaling::default(),
            mana_cost: LinearScaling::new(60.0, 5.0),
            base_cooldown: 5.0,
            cooldown_reduction_per_level: 0.5,
            effect: None,
        }
    }

    #[test]
    fn test_render_level_one() {
        assert_eq!(
            render_tooltip(&fireball(), 1),
            "Fireball: 80 damage, 60 mana, 5s"
        );
    }

    #[test]
    fn test_render_scales_with_level() {
        assert_eq!(
            render_tooltip(&fireball(), 2),
            "Fireball: 125 damage, 65 mana, 4.5s"
        );
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let mut ability = fireball();
        ability.description = "Deals {damage} and {mystery}".to_string();
        assert_eq!(render_tooltip(&ability, 1), "Deals 80 and {mystery}");
    }

    #[test]
    fn test_unclosed_brace() {
        let mut ability = fireball();
        ability.description = "Range {range} {oops".to_string();
        assert_eq!(render_tooltip(&ability, 1), "Range 650 {oops");
    }

    #[test]
    fn test_lookup_field() {
        assert_eq!(lookup_field("healing"), Some(TooltipField::Healing));
        assert_eq!(lookup_field("Healing"), None);
    }
}
