//! Board orchestrator: routes input events to the log, camera, selection
//! and gesture state.
//!
//! All interaction state is per-instance; two boards in one process never
//! share gesture or selection state. The board runs in one of two modes:
//!
//! - uncontrolled: the board owns the canonical operation queue;
//! - controlled: the consumer owns it. Every durable append (and every
//!   completed lazy update) fires the change callback with the new
//!   operation plus the full raw queue; the consumer feeds the
//!   authoritative queue back through [`Board::set_external_ops`].

use crate::assets::AssetCache;
use crate::camera::Camera;
use crate::log::OperationLog;
use crate::ops::{
    Bounds, ImageOp, OpBody, OpId, OpPatch, Operation, PathOp, Rgba, ShapeKind, ShapeOp, TextOp,
};
use crate::raster::{flatten_scene, Pixmap, SaveError};
use crate::ops::ACCENT;
use crate::selection::{hit_test, hit_test_handles, ResizeState};
use kurbo::{BezPath, Point, Shape as _, Vec2};

/// Fallback size for images whose dimensions cannot be read.
const DEFAULT_IMAGE_SIZE: (f64, f64) = (320.0, 240.0);

/// Invoked after each durable log mutation with the operation that caused
/// it and the full raw queue.
pub type ChangeCallback = Box<dyn FnMut(&Operation, &[Operation])>;

/// The active tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Select,
    Stroke,
    Highlighter,
    Shape(ShapeKind),
    Text,
    Latex,
    Emoji,
    Formula,
    Image,
}

/// In-flight pointer gesture. One gesture at a time per board.
#[derive(Debug, Clone, Default)]
enum Gesture {
    #[default]
    Idle,
    /// Freehand stroke in progress; raw samples, not yet down-sampled.
    Drawing { samples: Vec<Point> },
    /// Shape drag in progress.
    Shaping { start: Point, current: Point },
    /// Dragging the selected operation.
    Moving { target: OpId, last: Point },
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct Board {
    log: OperationLog,
    camera: Camera,
    assets: AssetCache,
    user_id: String,

    tool: Tool,
    color: Rgba,
    size: f64,

    selection: Option<OpId>,
    /// Optimistic bounding box of the selection, updated every drag frame
    /// ahead of the reduction catching up.
    selection_bounds: Option<Bounds>,
    hovered: Option<OpId>,

    gesture: Gesture,
    resize: ResizeState,
    /// Target of an uncommitted coalesced `Update`, if any.
    pending_update: Option<OpId>,
    /// Anchor of a pending text placement, set by a pointer-down with a
    /// text-family tool and consumed by [`Board::commit_text`].
    text_anchor: Option<Point>,

    viewport: (u32, u32),
    on_change: Option<ChangeCallback>,
}

impl Board {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            log: OperationLog::new(),
            camera: Camera::new(),
            assets: AssetCache::new(),
            user_id: user_id.into(),
            tool: Tool::Select,
            color: Rgba::black(),
            size: 2.0,
            selection: None,
            selection_bounds: None,
            hovered: None,
            gesture: Gesture::Idle,
            resize: ResizeState::Idle,
            pending_update: None,
            text_anchor: None,
            viewport: (800, 600),
            on_change: None,
        }
    }

    /// Seed the board with an existing queue (uncontrolled mode restore).
    pub fn with_ops(user_id: impl Into<String>, ops: Vec<Operation>) -> Self {
        let mut board = Self::new(user_id);
        board.log = OperationLog::from_ops(ops);
        board.request_assets();
        board
    }

    // --- accessors ---------------------------------------------------------

    pub fn scene(&self) -> &[Operation] {
        self.log.visible()
    }

    pub fn raw_ops(&self) -> &[Operation] {
        self.log.raw()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selection(&self) -> Option<OpId> {
        self.selection
    }

    pub fn selection_bounds(&self) -> Option<Bounds> {
        self.selection_bounds
    }

    pub fn hovered(&self) -> Option<OpId> {
        self.hovered
    }

    /// Hover affordance for the embedding renderer: the hovered
    /// operation's outline path, the accent color, and a half line-width
    /// pen. Pathless operations (text family, images) outline their
    /// bounding box.
    pub fn hover_outline(&self) -> Option<(BezPath, Rgba, f64)> {
        let id = self.hovered?;
        let op = self.log.visible().iter().find(|op| op.id == id)?;
        let width = op.size().unwrap_or(2.0) / 2.0;
        let path = op
            .to_path()
            .unwrap_or_else(|| op.pos.to_rect().to_path(0.1));
        Some((path, ACCENT, width))
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        if tool != Tool::Select {
            self.selection = None;
            self.selection_bounds = None;
        }
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.color = color;
    }

    pub fn set_size(&mut self, size: f64) {
        self.size = size;
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    /// Enter controlled mode: the consumer owns the canonical queue.
    pub fn set_on_change(&mut self, callback: ChangeCallback) {
        self.on_change = Some(callback);
    }

    /// Mirror the consumer's authoritative queue. A length change means the
    /// queues diverged; the external one wins wholesale.
    pub fn set_external_ops(&mut self, ops: Vec<Operation>) {
        if ops.len() != self.log.len() {
            self.log.replace_all(ops);
            // The coalescing target is gone with the old queue tail; a
            // drag still in flight must append from here on.
            self.pending_update = None;
            self.request_assets();
            self.prune_selection();
        }
    }

    /// Drain pending asset decodes. Returns `true` when a redraw is needed.
    pub fn poll_assets(&mut self) -> bool {
        self.assets.poll()
    }

    // --- pointer input (window coordinates) --------------------------------

    pub fn pointer_down(&mut self, view_point: Point) {
        let model = self.camera.view_to_model(view_point);
        match self.tool {
            Tool::Select => self.select_down(model),
            Tool::Stroke | Tool::Highlighter => {
                self.gesture = Gesture::Drawing {
                    samples: vec![model],
                };
            }
            Tool::Shape(_) => {
                self.gesture = Gesture::Shaping {
                    start: model,
                    current: model,
                };
            }
            Tool::Text | Tool::Latex | Tool::Emoji | Tool::Formula => {
                self.text_anchor = Some(model);
            }
            Tool::Image => {}
        }
    }

    pub fn pointer_move(&mut self, view_point: Point) {
        let model = self.camera.view_to_model(view_point);
        if self.resize.is_active() {
            if let Some((target, bounds)) = self.resize.update(model) {
                self.selection_bounds = Some(bounds);
                self.lazy_update(target, OpPatch::position(bounds));
            }
            return;
        }
        match &mut self.gesture {
            Gesture::Idle => {
                if self.tool == Tool::Select {
                    self.hovered = hit_test(model, self.log.visible(), self.camera.scale());
                }
            }
            Gesture::Drawing { samples } => samples.push(model),
            Gesture::Shaping { current, .. } => *current = model,
            Gesture::Moving { target, last } => {
                let delta = model - *last;
                let (target, last_point) = (*target, model);
                if let Some(bounds) = self.selection_bounds {
                    let moved = bounds.translate(delta);
                    self.selection_bounds = Some(moved);
                    self.lazy_update(target, OpPatch::position(moved));
                }
                self.gesture = Gesture::Moving {
                    target,
                    last: last_point,
                };
            }
        }
    }

    pub fn pointer_up(&mut self, view_point: Point) {
        let model = self.camera.view_to_model(view_point);
        if self.resize.is_active() {
            self.resize.finish();
            self.complete_lazy_update();
            return;
        }
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => {}
            Gesture::Drawing { mut samples } => {
                samples.push(model);
                self.commit_stroke(&samples);
            }
            Gesture::Shaping { start, .. } => {
                if let Tool::Shape(kind) = self.tool {
                    self.commit_shape(kind, start, model);
                }
            }
            Gesture::Moving { .. } => self.complete_lazy_update(),
        }
    }

    /// Pointer left the surface: the in-flight gesture is abandoned, never
    /// partially committed. An already-logged lazy update is finalized.
    pub fn pointer_leave(&mut self) {
        self.gesture = Gesture::Idle;
        self.resize.finish();
        self.complete_lazy_update();
        self.hovered = None;
    }

    /// Double-click. A hit on a text-family operation re-enters edit mode;
    /// the returned id is the operation whose content should be edited.
    pub fn double_click(&mut self, view_point: Point) -> Option<OpId> {
        let model = self.camera.view_to_model(view_point);
        let id = hit_test(model, self.log.visible(), self.camera.scale())?;
        let op = self.log.visible().iter().find(|op| op.id == id)?;
        if !op.tool().is_text_like() {
            return None;
        }
        self.selection = Some(id);
        self.selection_bounds = Some(op.pos);
        Some(id)
    }

    /// Escape: abandon any in-flight gesture and drop the selection.
    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
        if self.resize.is_active() {
            self.resize.finish();
            self.complete_lazy_update();
        }
        self.text_anchor = None;
        self.selection = None;
        self.selection_bounds = None;
    }

    // --- viewport input -----------------------------------------------------

    pub fn pan(&mut self, delta: Vec2) {
        self.camera.pan(delta);
    }

    /// Zoom around a window-space pivot. Wheel/trackpad and pinch both land
    /// here; `discrete` marks notched wheel steps.
    pub fn zoom(&mut self, view_point: Point, raw_delta: f64, discrete: bool) {
        let device = Point::new(
            (view_point.x - self.camera.surface_offset.x) * self.camera.pixel_ratio,
            (view_point.y - self.camera.surface_offset.y) * self.camera.pixel_ratio,
        );
        self.camera.zoom_at(device, raw_delta, discrete);
    }

    // --- imperative surface -------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    pub fn undo(&mut self) {
        if self.log.can_undo() {
            self.commit(Bounds::default(), OpBody::Undo);
            self.prune_selection();
        }
    }

    pub fn redo(&mut self) {
        if self.log.can_redo() {
            self.commit(Bounds::default(), OpBody::Redo);
        }
    }

    pub fn clear(&mut self) {
        self.commit(Bounds::default(), OpBody::Clear);
        self.selection = None;
        self.selection_bounds = None;
        self.hovered = None;
    }

    /// Remove the selected operation by logging a `Remove` marker.
    pub fn delete_selection(&mut self) {
        if let Some(target) = self.selection.take() {
            self.selection_bounds = None;
            self.commit(Bounds::default(), OpBody::Remove { target });
        }
    }

    /// Place an image at the viewport center. Decodable assets size the
    /// operation to their pixel dimensions; everything else gets a default
    /// box and stays undrawn until (if ever) the renderer can decode it.
    pub fn select_image(&mut self, data_url: impl Into<String>) -> OpId {
        let image = ImageOp::new(data_url);
        let mut op = Operation::new(
            self.user_id.clone(),
            now_millis(),
            Bounds::default(),
            OpBody::Image(image.clone()),
        );
        self.assets.request(op.id, &image);
        self.assets.poll();
        let (w, h) = self
            .assets
            .get(&op.id)
            .map(|b| (b.width as f64, b.height as f64))
            .unwrap_or(DEFAULT_IMAGE_SIZE);

        let center = self.camera.view_to_model(Point::new(
            self.viewport.0 as f64 / 2.0,
            self.viewport.1 as f64 / 2.0,
        ));
        op.pos = Bounds::new(center.x - w / 2.0, center.y - h / 2.0, w, h);
        let id = op.id;
        self.append(op);
        id
    }

    /// Commit text at the pending anchor. Empty content abandons the
    /// placement. The body variant follows the active tool; non-text tools
    /// fall back to plain text.
    pub fn commit_text(&mut self, content: impl Into<String>) -> Option<OpId> {
        let anchor = self.text_anchor.take()?;
        let text = TextOp::new(content, self.color, self.size.max(12.0));
        if text.is_empty() {
            return None;
        }
        // Rough monospace estimate; the text widget layer owns real layout
        // and corrects the box through an Update.
        let w = text.content.chars().count() as f64 * text.size * 0.6;
        let h = text.size * 1.2;
        let pos = Bounds::new(anchor.x, anchor.y, w, h);
        let body = match self.tool {
            Tool::Latex => OpBody::Latex(text),
            Tool::Emoji => OpBody::Emoji(text),
            Tool::Formula => OpBody::Formula(text),
            _ => OpBody::Text(text),
        };
        let op = Operation::new(self.user_id.clone(), now_millis(), pos, body);
        let id = op.id;
        self.append(op);
        Some(id)
    }

    /// Flatten the visible scene to a white-backed pixmap and PNG bytes.
    pub fn save(&mut self) -> Result<(Pixmap, Vec<u8>), SaveError> {
        self.assets.poll();
        let (w, h) = self.viewport;
        let pixmap = flatten_scene(self.log.visible(), &self.assets, w, h)?;
        let png = pixmap.encode_png()?;
        Ok((pixmap, png))
    }

    // --- internals ----------------------------------------------------------

    fn select_down(&mut self, model: Point) {
        let scale = self.camera.scale();
        // A click on a handle of the current selection starts a resize.
        if let (Some(target), Some(bounds)) = (self.selection, self.selection_bounds) {
            if let Some(direction) = hit_test_handles(bounds, model, scale) {
                self.resize.begin(target, direction, bounds, model);
                return;
            }
        }
        match hit_test(model, self.log.visible(), scale) {
            Some(id) => {
                let bounds = self
                    .log
                    .visible()
                    .iter()
                    .find(|op| op.id == id)
                    .map(|op| op.pos);
                self.selection = Some(id);
                self.selection_bounds = bounds;
                self.gesture = Gesture::Moving {
                    target: id,
                    last: model,
                };
            }
            None => {
                self.selection = None;
                self.selection_bounds = None;
            }
        }
    }

    fn commit_stroke(&mut self, samples: &[Point]) {
        let Some(path) = PathOp::from_samples(samples, self.color, self.size) else {
            return; // accidental tap
        };
        let pos = path.bounds();
        let body = match self.tool {
            Tool::Highlighter => OpBody::Highlighter(path),
            _ => OpBody::Stroke(path),
        };
        self.commit(pos, body);
    }

    fn commit_shape(&mut self, kind: ShapeKind, start: Point, end: Point) {
        let Some(shape) = ShapeOp::from_drag(kind, start, end, self.color, self.size) else {
            return; // degenerate drag
        };
        let pos = shape.bounds();
        self.commit(pos, OpBody::Shape(shape));
    }

    fn commit(&mut self, pos: Bounds, body: OpBody) -> OpId {
        let op = Operation::new(self.user_id.clone(), now_millis(), pos, body);
        let id = op.id;
        self.append(op);
        id
    }

    fn append(&mut self, op: Operation) {
        self.log.append(op.clone());
        self.notify(&op);
    }

    /// Coalesce a continuous drag into a single raw `Update`: while the
    /// newest raw entry is the pending update for this target, swap it
    /// instead of appending. The change callback only fires when the drag
    /// finishes ([`Board::complete_lazy_update`]).
    ///
    /// Swapping requires the raw tail to actually be our own pending
    /// `Update`; an authoritative queue can land at any moment and put a
    /// peer's operation there, which must never be overwritten.
    fn lazy_update(&mut self, target: OpId, patch: OpPatch) {
        let op = Operation::new(
            self.user_id.clone(),
            now_millis(),
            Bounds::default(),
            OpBody::Update { target, patch },
        );
        let tail_is_own_update = self.pending_update == Some(target)
            && matches!(
                self.log.raw().last(),
                Some(last) if last.user_id == self.user_id
                    && matches!(&last.body, OpBody::Update { target: t, .. } if *t == target)
            );
        if tail_is_own_update {
            self.log.replace_last(op);
        } else {
            self.log.append(op);
            self.pending_update = Some(target);
        }
    }

    fn complete_lazy_update(&mut self) {
        if self.pending_update.take().is_some() {
            if let Some(op) = self.log.raw().last().cloned() {
                self.notify(&op);
            }
        }
    }

    fn notify(&mut self, op: &Operation) {
        if let Some(callback) = self.on_change.as_mut() {
            callback(op, self.log.raw());
        }
    }

    /// Drop the selection when its target left the visible scene.
    fn prune_selection(&mut self) {
        if let Some(id) = self.selection {
            if !self.log.visible().iter().any(|op| op.id == id) {
                self.selection = None;
                self.selection_bounds = None;
            }
        }
        if let Some(id) = self.hovered {
            if !self.log.visible().iter().any(|op| op.id == id) {
                self.hovered = None;
            }
        }
    }

    /// Queue decode requests for every visible image operation.
    fn request_assets(&mut self) {
        for op in self.log.visible() {
            if let OpBody::Image(image) = &op.body {
                self.assets.request(op.id, image);
            }
        }
    }
}
