//! Printable hero list with tooltips filled in for a given level

use shared::content::GameContent;
use shared::tooltip::render_tooltip;

/// One line per hero followed by an indented line per ability
pub fn describe_heroes(content: &GameContent, level: u32) -> Vec<String> {
    let mut lines = Vec::new();
    for hero in content.heroes() {
        lines.push(format!("{} ({})", hero.display_name, hero.id));
        for (slot, ability) in content.abilities_for(hero).iter().enumerate() {
            lines.push(format!(
                "  [{}] {}: {}",
                slot,
                ability.display_name,
                render_tooltip(ability, level)
            ));
        }
    }
    lines
}
