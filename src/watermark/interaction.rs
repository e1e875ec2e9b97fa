//! Pointer interaction: drag-to-place the watermark.
//!
//! A two-state machine over `{Idle, Dragging}`. Pointer-down starts a drag
//! and moves the anchor immediately, moves update it while dragging, and
//! pointer-up or pointer-leave end the drag. Events that have no transition
//! from the current state are ignored.
//!
//! The controller only ever writes the anchor in [`CompositionState`]; it
//! never touches the rendered surface.

use super::position::{normalize_pointer, CanvasRect};
use super::state::CompositionState;

/// Pointer event in device (client) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    state: DragState,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    /// Apply a pointer event against the canvas's on-screen rectangle.
    ///
    /// Returns `true` if the composition state changed.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        rect: &CanvasRect,
        composition: &mut CompositionState,
    ) -> bool {
        match (self.state, event) {
            (DragState::Idle, PointerEvent::Down { x, y }) => {
                self.state = DragState::Dragging;
                update_anchor(x, y, rect, composition)
            }
            (DragState::Dragging, PointerEvent::Move { x, y }) => {
                update_anchor(x, y, rect, composition)
            }
            (DragState::Dragging, PointerEvent::Up | PointerEvent::Leave) => {
                self.state = DragState::Idle;
                false
            }
            // A second down while dragging keeps dragging from the new point.
            (DragState::Dragging, PointerEvent::Down { x, y }) => {
                update_anchor(x, y, rect, composition)
            }
            (DragState::Idle, PointerEvent::Move { .. } | PointerEvent::Up | PointerEvent::Leave) => {
                false
            }
        }
    }

    /// Drop any drag in progress.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

fn update_anchor(x: f32, y: f32, rect: &CanvasRect, composition: &mut CompositionState) -> bool {
    match normalize_pointer(x, y, rect) {
        Some(anchor) if anchor != composition.params().anchor => {
            composition.set_anchor(anchor);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watermark::position::Anchor;

    fn rect() -> CanvasRect {
        CanvasRect::new(10.0, 20.0, 200.0, 100.0)
    }

    #[test]
    fn test_down_starts_drag_and_moves_anchor() {
        let mut controller = InteractionController::new();
        let mut state = CompositionState::new();

        let changed = controller.handle(PointerEvent::Down { x: 60.0, y: 45.0 }, &rect(), &mut state);

        assert!(changed);
        assert!(controller.is_dragging());
        assert_eq!(state.params().anchor, Anchor { x: 0.25, y: 0.25 });
    }

    #[test]
    fn test_move_while_dragging_updates_anchor() {
        let mut controller = InteractionController::new();
        let mut state = CompositionState::new();

        controller.handle(PointerEvent::Down { x: 10.0, y: 20.0 }, &rect(), &mut state);
        controller.handle(PointerEvent::Move { x: 160.0, y: 95.0 }, &rect(), &mut state);

        assert_eq!(state.params().anchor, Anchor { x: 0.75, y: 0.75 });
    }

    #[test]
    fn test_idle_move_and_up_are_noops() {
        let mut controller = InteractionController::new();
        let mut state = CompositionState::new();
        let revision = state.revision();

        assert!(!controller.handle(PointerEvent::Move { x: 0.0, y: 0.0 }, &rect(), &mut state));
        assert!(!controller.handle(PointerEvent::Up, &rect(), &mut state));
        assert!(!controller.handle(PointerEvent::Leave, &rect(), &mut state));

        assert_eq!(state.revision(), revision);
        assert_eq!(state.params().anchor, Anchor::center());
        assert_eq!(controller.drag_state(), DragState::Idle);
    }

    // Leave while dragging must end the drag exactly like up.
    #[test]
    fn test_leave_behaves_like_up() {
        for end in [PointerEvent::Up, PointerEvent::Leave] {
            let mut controller = InteractionController::new();
            let mut state = CompositionState::new();

            controller.handle(PointerEvent::Down { x: 10.0, y: 20.0 }, &rect(), &mut state);
            controller.handle(end, &rect(), &mut state);
            assert_eq!(controller.drag_state(), DragState::Idle);

            let after = state.params().anchor;
            controller.handle(PointerEvent::Move { x: 200.0, y: 110.0 }, &rect(), &mut state);
            assert_eq!(state.params().anchor, after);
        }
    }

    #[test]
    fn test_pointer_outside_canvas_is_clamped() {
        let mut controller = InteractionController::new();
        let mut state = CompositionState::new();

        controller.handle(PointerEvent::Down { x: 100.0, y: 50.0 }, &rect(), &mut state);
        controller.handle(PointerEvent::Move { x: -500.0, y: 900.0 }, &rect(), &mut state);

        assert_eq!(state.params().anchor, Anchor { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_degenerate_rect_changes_nothing() {
        let mut controller = InteractionController::new();
        let mut state = CompositionState::new();
        let empty = CanvasRect::new(0.0, 0.0, 0.0, 0.0);

        assert!(!controller.handle(PointerEvent::Down { x: 5.0, y: 5.0 }, &empty, &mut state));
        assert_eq!(state.params().anchor, Anchor::center());
    }

    #[test]
    fn test_unchanged_anchor_reports_no_change() {
        let mut controller = InteractionController::new();
        let mut state = CompositionState::new();

        // Center of the rect maps to the default anchor.
        let changed = controller.handle(PointerEvent::Down { x: 110.0, y: 70.0 }, &rect(), &mut state);
        assert!(!changed);
        assert!(controller.is_dragging());
    }
}
