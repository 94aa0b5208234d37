use std::sync::{Arc, RwLock};

use gpui::prelude::*;
use gpui::{
    Bounds, MouseButton, MouseDownEvent, MouseMoveEvent, MouseUpEvent, Pixels, Point, ScrollWheelEvent, Window,
    canvas, div, px,
};

use crate::error::SurfaceError;
use crate::factory::SurfaceFactory;
use crate::geom::{Insets, ScreenPoint, ScreenRect};
use crate::navigation::{NavButton, Navigator};
use crate::render::{Color, FillStyle, RenderCommand, RenderList};
use crate::surface::{PositionSupplier, Surface};

use super::config::SurfaceViewConfig;
use super::paint::{paint_render_list, to_hsla};
use super::state::{DragState, PlotLayer, ViewState};
use super::text::GpuiCaptioner;

/// A GPUI view that draws a plotting surface and navigates it.
///
/// Drags, wheel scrolls and clicks are handed to the factory's navigator;
/// a primary double-click restores the initial view.
pub struct SurfaceView<F: SurfaceFactory> {
    factory: F,
    state: Arc<RwLock<ViewState<F>>>,
    config: SurfaceViewConfig,
}

impl<F: SurfaceFactory> Clone for SurfaceView<F>
where
    F: Clone,
{
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            state: Arc::clone(&self.state),
            config: self.config.clone(),
        }
    }
}

impl<F: SurfaceFactory + Clone + 'static> SurfaceView<F> {
    /// Create a view whose initial aspect comes from the configuration
    /// alone.
    pub fn new(factory: F, config: &F::Config) -> Result<Self, SurfaceError> {
        Self::build(factory, config, None)
    }

    /// Create a view around plotted positions.
    ///
    /// Data ranges are read from the positions when the configuration
    /// leaves the view open, and the positions are offered to the
    /// navigator on clicks.
    pub fn with_positions(
        factory: F,
        config: &F::Config,
        positions: Arc<dyn PositionSupplier>,
    ) -> Result<Self, SurfaceError> {
        Self::build(factory, config, Some(positions))
    }

    fn build(
        factory: F,
        config: &F::Config,
        positions: Option<Arc<dyn PositionSupplier>>,
    ) -> Result<Self, SurfaceError> {
        let profile = factory.create_profile(config);
        let ranges = match &positions {
            Some(positions) if factory.use_ranges(config) => Some(factory.read_ranges(&profile, positions.as_ref())),
            _ => None,
        };
        let aspect = factory.create_aspect(config, ranges.as_deref())?;
        log::debug!("initial aspect {aspect:?}");
        let mut state = ViewState::new(profile, aspect, factory.create_navigator(config));
        state.positions = positions;
        Ok(Self {
            factory,
            state: Arc::new(RwLock::new(state)),
            config: SurfaceViewConfig::default(),
        })
    }

    /// Replace the view configuration.
    pub fn with_config(mut self, config: SurfaceViewConfig) -> Self {
        self.config = config;
        self
    }

    /// Draw `layer` on every frame between the surface background and
    /// foreground.
    pub fn with_layer(self, layer: impl Fn(&F::Surface, &mut RenderList) + 'static) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.layer = Some(Arc::new(layer));
        }
        self
    }

    /// Get a handle for reading and replacing the view's aspect.
    pub fn handle(&self) -> SurfaceHandle<F> {
        SurfaceHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn on_mouse_down(&mut self, ev: &MouseDownEvent, cx: &mut Context<Self>) {
        let Some(button) = nav_button(ev.button) else {
            return;
        };
        let pos = screen_point(ev.position);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(surface) = state.surface.clone() else {
            return;
        };

        if button == NavButton::Primary && ev.click_count >= 2 && surface.plot_bounds().contains(pos) {
            if state.reset() {
                cx.notify();
            }
            return;
        }

        state.drag = Some(DragState::new(button, pos, surface));
        cx.notify();
    }

    fn on_mouse_move(&mut self, ev: &MouseMoveEvent, cx: &mut Context<Self>) {
        let pos = screen_point(ev.position);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        state.hover = state
            .surface
            .as_ref()
            .filter(|surface| surface.plot_bounds().contains(pos))
            .map(|_| pos);

        let threshold = self.config.drag_threshold_px;
        let active = state.drag.as_mut().is_some_and(|drag| drag.track(pos, threshold));
        if active {
            let next = state.drag.as_ref().and_then(|drag| {
                state
                    .navigator
                    .drag(&drag.surface, drag.origin, pos, drag.button)
            });
            if let Some(aspect) = next {
                state.set_aspect(aspect);
            }
        }
        cx.notify();
    }

    fn on_mouse_up(&mut self, ev: &MouseUpEvent, cx: &mut Context<Self>) {
        let pos = screen_point(ev.position);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let Some(drag) = state.drag.take() else {
            return;
        };
        if !drag.active && ev.click_count == 1 {
            let positions = state.positions.clone();
            let next = state
                .navigator
                .click(&drag.surface, pos, drag.button, positions.as_deref());
            if let Some(aspect) = next {
                state.set_aspect(aspect);
            }
        }
        cx.notify();
    }

    fn on_scroll(&mut self, ev: &ScrollWheelEvent, cx: &mut Context<Self>) {
        let pos = screen_point(ev.position);
        let Ok(mut state) = self.state.write() else {
            return;
        };
        let delta = ev.delta.pixel_delta(px(self.config.wheel_click_px));
        let rotation = -f64::from(f32::from(delta.y)) / f64::from(self.config.wheel_click_px);
        if rotation.abs() < 0.01 {
            return;
        }
        let next = state
            .surface
            .as_ref()
            .and_then(|surface| state.navigator.wheel(surface, pos, rotation));
        if let Some(aspect) = next
            && state.set_aspect(aspect)
        {
            cx.notify();
        }
    }
}

impl<F: SurfaceFactory + Clone + 'static> Render for SurfaceView<F> {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let factory = self.factory.clone();
        let state = Arc::clone(&self.state);
        let config = self.config.clone();
        let background = to_hsla(config.background);

        div()
            .size_full()
            .bg(background)
            .child(
                canvas(
                    move |bounds, window, _| match state.write() {
                        Ok(mut state) => build_frame(&factory, &mut state, &config, bounds, window),
                        Err(_) => RenderList::new(),
                    },
                    move |_, frame, window, cx| {
                        paint_render_list(&frame, window, cx);
                    },
                )
                .size_full(),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_down(ev, cx);
                }),
            )
            .on_mouse_down(
                MouseButton::Right,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_down(ev, cx);
                }),
            )
            .on_mouse_down(
                MouseButton::Middle,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_down(ev, cx);
                }),
            )
            .on_mouse_move(cx.listener(|this, ev, _, cx| {
                this.on_mouse_move(ev, cx);
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_up(ev, cx);
                }),
            )
            .on_mouse_up(
                MouseButton::Right,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_up(ev, cx);
                }),
            )
            .on_mouse_up(
                MouseButton::Middle,
                cx.listener(|this, ev, _, cx| {
                    this.on_mouse_up(ev, cx);
                }),
            )
            .on_scroll_wheel(cx.listener(|this, ev, _, cx| {
                this.on_scroll(ev, cx);
            }))
    }
}

/// A handle on the aspect of a [`SurfaceView`].
///
/// The handle clones cheaply and can be moved into async tasks; call
/// `notify` on the view's entity after changing the aspect.
pub struct SurfaceHandle<F: SurfaceFactory> {
    state: Arc<RwLock<ViewState<F>>>,
}

impl<F: SurfaceFactory> Clone for SurfaceHandle<F> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<F: SurfaceFactory> SurfaceHandle<F> {
    /// Current aspect, or `None` if the view state is poisoned.
    pub fn aspect(&self) -> Option<F::Aspect> {
        self.state.read().ok().map(|state| state.aspect.clone())
    }

    /// Replace the aspect; returns whether it changed.
    pub fn set_aspect(&self, aspect: F::Aspect) -> bool {
        self.state.write().is_ok_and(|mut state| state.set_aspect(aspect))
    }

    /// Restore the initial aspect; returns whether it changed.
    pub fn reset(&self) -> bool {
        self.state.write().is_ok_and(|mut state| state.reset())
    }

    /// Replace the plotted positions offered to the navigator.
    pub fn set_positions(&self, positions: Option<Arc<dyn PositionSupplier>>) {
        if let Ok(mut state) = self.state.write() {
            state.positions = positions;
        }
    }

    /// Replace the extra drawing layer.
    pub fn set_layer(&self, layer: Option<PlotLayer<F::Surface>>) {
        if let Ok(mut state) = self.state.write() {
            state.layer = layer;
        }
    }

    /// Surface drawn in the most recent frame.
    pub fn surface(&self) -> Option<F::Surface> {
        self.state.read().ok().and_then(|state| state.surface.clone())
    }
}

fn build_frame<F: SurfaceFactory>(
    factory: &F,
    state: &mut ViewState<F>,
    config: &SurfaceViewConfig,
    bounds: Bounds<Pixels>,
    window: &Window,
) -> RenderList {
    let rect = screen_rect(bounds);
    let mut list = RenderList::new();
    list.push(RenderCommand::Rect {
        rect,
        style: FillStyle::solid(config.background),
    });

    let profile = if config.window_text {
        factory.with_captioner(&state.profile, Arc::new(GpuiCaptioner::new(window, config.text)))
    } else {
        state.profile.clone()
    };

    let surface = match layout_surface(factory, &profile, &state.aspect, rect, config.padding_px) {
        Ok(surface) => surface,
        Err(err) => {
            log::warn!("cannot lay out surface in {rect:?}: {err}");
            state.surface = None;
            return list;
        }
    };

    surface.paint_background(&mut list);
    if let Some(layer) = &state.layer {
        layer(&surface, &mut list);
    }
    surface.paint_foreground(&mut list);

    if config.show_position
        && let Some(pos) = state.hover
    {
        draw_position(&surface, pos, state.positions.as_deref(), &mut list);
    }

    state.surface = Some(surface);
    list
}

/// Surface whose axis annotations fit inside `rect`.
///
/// A trial surface over the whole rectangle supplies the annotation
/// insets; the real plot bounds are the rectangle shrunk by those.
fn layout_surface<F: SurfaceFactory>(
    factory: &F,
    profile: &F::Profile,
    aspect: &F::Aspect,
    rect: ScreenRect,
    padding: f64,
) -> Result<F::Surface, SurfaceError> {
    let trial = factory.create_surface(rect, profile, aspect)?;
    let pad = Insets::new(padding, padding, padding, padding);
    let plot = rect.inset(trial.plot_insets()).inset(pad);
    factory.create_surface(plot, profile, aspect)
}

fn draw_position<S: Surface>(
    surface: &S,
    pos: ScreenPoint,
    positions: Option<&dyn PositionSupplier>,
    out: &mut RenderList,
) {
    let bounds = surface.plot_bounds();
    if !bounds.contains(pos) {
        return;
    }
    let Some(dpos) = surface.graphics_to_data(pos, positions) else {
        return;
    };
    let text = surface.format_position(&dpos);
    let captioner = surface.captioner();
    let size = captioner.caption_bounds(&text);
    let pad = captioner.pad();
    let origin = ScreenPoint::new(bounds.min.x + pad, bounds.min.y + pad);
    out.push(RenderCommand::Rect {
        rect: ScreenRect::from_origin_size(origin.x - pad, origin.y - pad, size.width + 2.0 * pad, size.height + 2.0 * pad),
        style: FillStyle::solid(Color::new(1.0, 1.0, 1.0, 0.8)),
    });
    captioner.draw_caption(&text, origin, out);
}

fn nav_button(button: MouseButton) -> Option<NavButton> {
    match button {
        MouseButton::Left => Some(NavButton::Primary),
        MouseButton::Right => Some(NavButton::Secondary),
        MouseButton::Middle => Some(NavButton::Middle),
        _ => None,
    }
}

fn screen_point(point: Point<Pixels>) -> ScreenPoint {
    ScreenPoint::new(f64::from(f32::from(point.x)), f64::from(f32::from(point.y)))
}

fn screen_rect(bounds: Bounds<Pixels>) -> ScreenRect {
    ScreenRect::from_origin_size(
        f64::from(f32::from(bounds.origin.x)),
        f64::from(f32::from(bounds.origin.y)),
        f64::from(f32::from(bounds.size.width)),
        f64::from(f32::from(bounds.size.height)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{PlaneConfig, PlaneSurfaceFactory};
    use crate::range::Range;

    fn plane_state() -> (PlaneSurfaceFactory, ViewState<PlaneSurfaceFactory>) {
        let factory = PlaneSurfaceFactory;
        let config = PlaneConfig::default();
        let profile = factory.create_profile(&config);
        let ranges = [Range::new(0.0, 10.0), Range::new(0.0, 100.0)];
        let aspect = factory.create_aspect(&config, Some(&ranges[..])).unwrap();
        let navigator = factory.create_navigator(&config);
        (factory, ViewState::new(profile, aspect, navigator))
    }

    #[test]
    fn layout_keeps_annotations_inside() {
        let (factory, state) = plane_state();
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 600.0, 400.0);
        let surface = layout_surface(&factory, &state.profile, &state.aspect, rect, 4.0).unwrap();
        let plot = surface.plot_bounds();
        assert!(plot.min.x > rect.min.x && plot.min.y >= rect.min.y + 4.0);
        assert!(plot.max.x <= rect.max.x - 4.0 && plot.max.y < rect.max.y);
    }

    #[test]
    fn layout_fails_without_room() {
        let (factory, state) = plane_state();
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 10.0, 10.0);
        assert!(layout_surface(&factory, &state.profile, &state.aspect, rect, 4.0).is_err());
    }

    #[test]
    fn position_readout_only_inside_plot() {
        let (factory, state) = plane_state();
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 600.0, 400.0);
        let surface = layout_surface(&factory, &state.profile, &state.aspect, rect, 4.0).unwrap();
        let mut out = RenderList::new();
        draw_position(&surface, ScreenPoint::new(-5.0, -5.0), None, &mut out);
        assert!(out.is_empty());
        draw_position(&surface, surface.plot_bounds().center(), None, &mut out);
        assert!(
            out.commands()
                .iter()
                .any(|cmd| matches!(cmd, RenderCommand::Text { text, .. } if !text.is_empty()))
        );
    }

    #[test]
    fn reset_restores_initial_aspect() {
        let (_, mut state) = plane_state();
        let initial = state.aspect.clone();
        let rect = ScreenRect::from_origin_size(0.0, 0.0, 600.0, 400.0);
        let surface = layout_surface(&PlaneSurfaceFactory, &state.profile, &state.aspect, rect, 4.0).unwrap();
        let next = state.navigator.wheel(&surface, surface.plot_bounds().center(), -1.0).unwrap();
        assert!(state.set_aspect(next));
        assert!(state.reset());
        assert_eq!(state.aspect, initial);
        assert!(!state.reset());
    }
}
