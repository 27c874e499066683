//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s. Keys are
//! `KeyboardEvent.key` values; `ctrl` and `meta` both act as the command
//! modifier so the same map serves every platform.

use crate::input::Modifiers;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Structure ──
    AddChild,
    AddSibling,
    Delete,
    ToggleCollapse,
    StartEditing,

    // ── History ──
    Undo,
    Redo,

    // ── Selection ──
    SelectNext,
    SelectPrevious,
    Deselect,

    // ── View ──
    FitView,
}

pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action, or `None` if the combo is unbound.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.ctrl || modifiers.meta;

        if cmd && modifiers.shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "0" => Some(ShortcutAction::FitView),
                _ => None,
            };
        }

        match key {
            "Tab" => Some(ShortcutAction::AddChild),
            "Enter" => Some(ShortcutAction::AddSibling),
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            " " => Some(ShortcutAction::ToggleCollapse),
            "F2" => Some(ShortcutAction::StartEditing),
            "ArrowDown" => Some(ShortcutAction::SelectNext),
            "ArrowUp" => Some(ShortcutAction::SelectPrevious),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const META: Modifiers = Modifiers {
        meta: true,
        ..Modifiers::NONE
    };
    const CMD_SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::CTRL
    };

    #[test]
    fn resolve_structure_keys() {
        assert_eq!(
            ShortcutMap::resolve("Tab", Modifiers::NONE),
            Some(ShortcutAction::AddChild)
        );
        assert_eq!(
            ShortcutMap::resolve("Enter", Modifiers::NONE),
            Some(ShortcutAction::AddSibling)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", Modifiers::NONE),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve(" ", Modifiers::NONE),
            Some(ShortcutAction::ToggleCollapse)
        );
    }

    #[test]
    fn resolve_undo_redo() {
        assert_eq!(ShortcutMap::resolve("z", META), Some(ShortcutAction::Undo));
        assert_eq!(
            ShortcutMap::resolve("z", Modifiers::CTRL),
            Some(ShortcutAction::Undo)
        );
        assert_eq!(ShortcutMap::resolve("Z", CMD_SHIFT), Some(ShortcutAction::Redo));
        assert_eq!(ShortcutMap::resolve("y", META), Some(ShortcutAction::Redo));
    }

    #[test]
    fn resolve_navigation() {
        assert_eq!(
            ShortcutMap::resolve("ArrowDown", Modifiers::NONE),
            Some(ShortcutAction::SelectNext)
        );
        assert_eq!(
            ShortcutMap::resolve("ArrowUp", Modifiers::NONE),
            Some(ShortcutAction::SelectPrevious)
        );
        assert_eq!(
            ShortcutMap::resolve("Escape", Modifiers::NONE),
            Some(ShortcutAction::Deselect)
        );
        assert_eq!(ShortcutMap::resolve("0", META), Some(ShortcutAction::FitView));
    }

    #[test]
    fn resolve_unknown_key() {
        assert_eq!(ShortcutMap::resolve("q", Modifiers::NONE), None);
        assert_eq!(ShortcutMap::resolve("z", Modifiers::NONE), None);
        assert_eq!(ShortcutMap::resolve("Tab", META), None);
    }
}
