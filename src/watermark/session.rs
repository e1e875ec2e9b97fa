//! One interactive compositing session.
//!
//! Ties the pieces together the way a single upload screen uses them:
//! assets are assigned and loaded, pointer events and setters mutate the
//! [`CompositionState`], every mutation schedules a redraw, and `pump`
//! renders at most once per frame into the session's surface.
//!
//! Loads are split into `assign_*` (returns a [`LoadTicket`]) and
//! `complete_*` so callers can await the fetch without borrowing the
//! session. Outcomes for superseded tickets, or arriving after
//! [`CompositionSession::teardown`], are dropped.

use super::asset::{AssetLoader, LoadTicket};
use super::compositor::Compositor;
use super::export::{ExportEncoder, ExportedImage};
use super::interaction::{InteractionController, PointerEvent};
use super::position::{Anchor, CanvasDimensions, CanvasRect};
use super::scheduler::RedrawScheduler;
use super::state::{CompositionState, PlacementParams, WatermarkKind};
use super::WatermarkError;
use image::RgbaImage;
use std::time::Instant;
use tracing::debug;

pub struct CompositionSession {
    state: CompositionState,
    controller: InteractionController,
    compositor: Compositor,
    scheduler: RedrawScheduler,
    canvas: CanvasDimensions,
    surface: Option<RgbaImage>,
    alive: bool,
}

impl CompositionSession {
    pub fn new(compositor: Compositor, canvas: CanvasDimensions, scheduler: RedrawScheduler) -> Self {
        Self {
            state: CompositionState::new(),
            controller: InteractionController::new(),
            compositor,
            scheduler,
            canvas,
            surface: None,
            alive: true,
        }
    }

    pub fn state(&self) -> &CompositionState {
        &self.state
    }

    pub fn canvas(&self) -> CanvasDimensions {
        self.canvas
    }

    /// The last rendered surface, if any frame has been drawn.
    pub fn surface(&self) -> Option<&RgbaImage> {
        self.surface.as_ref()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// A mutation is waiting for its frame.
    pub fn needs_redraw(&self) -> bool {
        self.alive && self.scheduler.has_pending()
    }

    pub fn is_dragging(&self) -> bool {
        self.controller.is_dragging()
    }

    fn schedule(&mut self) {
        self.scheduler.request(self.state.revision());
    }

    pub fn assign_base(&mut self, uri: &str) -> Option<LoadTicket> {
        if !self.alive {
            return None;
        }
        let ticket = self.state.begin_base_load(uri);
        self.schedule();
        Some(ticket)
    }

    pub fn complete_base(
        &mut self,
        ticket: &LoadTicket,
        outcome: Result<RgbaImage, WatermarkError>,
    ) -> bool {
        let applied = self.state.commit_base(ticket, outcome);
        if applied {
            self.schedule();
        }
        applied
    }

    /// Assign a watermark image. `filename` is the user's declared name for
    /// the uploaded file and later drives the export name.
    pub fn assign_watermark(&mut self, uri: &str, filename: Option<&str>) -> Option<LoadTicket> {
        if !self.alive {
            return None;
        }
        let ticket = self.state.begin_watermark_load(uri, filename);
        self.schedule();
        Some(ticket)
    }

    pub fn complete_watermark(
        &mut self,
        ticket: &LoadTicket,
        outcome: Result<RgbaImage, WatermarkError>,
    ) -> bool {
        let applied = self.state.commit_watermark(ticket, outcome);
        if applied {
            self.schedule();
        }
        applied
    }

    /// Assign and load the base asset in one step.
    ///
    /// Returns whether the outcome was committed. A failed load is committed
    /// too (the slot becomes `Failed`); it is not an error for the session.
    pub async fn load_base(&mut self, loader: &AssetLoader, uri: &str) -> bool {
        let Some(ticket) = self.assign_base(uri) else {
            return false;
        };
        let outcome = loader.fetch(&ticket).await;
        self.complete_base(&ticket, outcome)
    }

    pub async fn load_watermark(
        &mut self,
        loader: &AssetLoader,
        uri: &str,
        filename: Option<&str>,
    ) -> bool {
        let Some(ticket) = self.assign_watermark(uri, filename) else {
            return false;
        };
        let outcome = loader.fetch(&ticket).await;
        self.complete_watermark(&ticket, outcome)
    }

    pub fn set_text(&mut self, content: impl Into<String>) {
        if self.alive {
            self.state.set_text(content);
            self.schedule();
        }
    }

    pub fn switch_to(&mut self, kind: WatermarkKind) {
        if self.alive {
            self.state.switch_to(kind);
            self.schedule();
        }
    }

    pub fn set_opacity(&mut self, opacity: f32) -> Result<(), WatermarkError> {
        if self.alive {
            self.state.set_opacity(opacity)?;
            self.schedule();
        }
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), WatermarkError> {
        if self.alive {
            self.state.set_scale(scale)?;
            self.schedule();
        }
        Ok(())
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        if self.alive {
            self.state.set_anchor(anchor);
            self.schedule();
        }
    }

    pub fn set_params(&mut self, params: PlacementParams) -> Result<(), WatermarkError> {
        if self.alive {
            self.state.set_params(params)?;
            self.schedule();
        }
        Ok(())
    }

    pub fn reset_params(&mut self) {
        if self.alive {
            self.state.reset_params();
            self.schedule();
        }
    }

    /// Resize the target canvas. Forces a redraw even if nothing else changed.
    pub fn set_canvas(&mut self, canvas: CanvasDimensions) {
        if self.alive && canvas != self.canvas {
            self.canvas = canvas;
            self.scheduler.invalidate();
            self.schedule();
        }
    }

    /// Feed a pointer event. `rect` is the canvas's on-screen rectangle.
    pub fn pointer(&mut self, event: PointerEvent, rect: &CanvasRect) -> bool {
        if !self.alive {
            return false;
        }
        let changed = self.controller.handle(event, rect, &mut self.state);
        if changed {
            self.schedule();
        }
        changed
    }

    /// Render if a redraw is due at `now`. Returns whether a frame was drawn.
    pub fn pump(&mut self, now: Instant) -> Result<bool, WatermarkError> {
        if !self.alive {
            return Ok(false);
        }
        let Some(revision) = self.scheduler.poll(now) else {
            return Ok(false);
        };

        let started = Instant::now();
        self.surface = self.compositor.render(&self.state, self.canvas)?;
        debug!(
            revision,
            rendered = self.surface.is_some(),
            duration_us = started.elapsed().as_micros() as u64,
            "Redraw"
        );
        Ok(true)
    }

    /// Render the current state immediately, bypassing frame pacing.
    pub fn render_now(&mut self) -> Result<Option<&RgbaImage>, WatermarkError> {
        if !self.alive {
            return Ok(None);
        }
        self.surface = self.compositor.render(&self.state, self.canvas)?;
        Ok(self.surface.as_ref())
    }

    /// Encode the current composition.
    ///
    /// Always renders from state so the export reflects every mutation,
    /// even ones whose frame has not been drawn yet.
    pub fn export(&self, encoder: &ExportEncoder) -> Result<ExportedImage, WatermarkError> {
        if !self.alive {
            return Err(WatermarkError::RenderError("Session has been torn down".to_string()));
        }
        let surface = self
            .compositor
            .render(&self.state, self.canvas)?
            .ok_or_else(|| WatermarkError::RenderError("Base asset is not ready".to_string()))?;
        encoder.encode(&surface, self.state.original_filename())
    }

    /// Tear the session down. In-flight loads can no longer commit and
    /// every later call is a no-op.
    pub fn teardown(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.state.close();
        self.controller.cancel();
        self.surface = None;
        debug!(revision = self.state.revision(), "Composition session torn down");
    }
}
