use std::sync::Arc;

use crate::factory::SurfaceFactory;
use crate::geom::ScreenPoint;
use crate::navigation::NavButton;
use crate::render::RenderList;
use crate::surface::PositionSupplier;

/// Extra drawing between a surface's background and foreground.
pub type PlotLayer<S> = Arc<dyn Fn(&S, &mut RenderList)>;

#[derive(Debug, Clone)]
pub(crate) struct DragState<S> {
    pub(crate) button: NavButton,
    pub(crate) origin: ScreenPoint,
    /// Surface shown when the button went down; gestures are measured on it.
    pub(crate) surface: S,
    pub(crate) active: bool,
}

impl<S> DragState<S> {
    pub(crate) fn new(button: NavButton, origin: ScreenPoint, surface: S) -> Self {
        Self {
            button,
            origin,
            surface,
            active: false,
        }
    }

    /// Mark the drag active once the pointer leaves the threshold circle.
    pub(crate) fn track(&mut self, pos: ScreenPoint, threshold_px: f64) -> bool {
        if !self.active && self.origin.distance_sq(pos) > threshold_px * threshold_px {
            self.active = true;
        }
        self.active
    }
}

pub(crate) struct ViewState<F: SurfaceFactory> {
    pub(crate) profile: F::Profile,
    pub(crate) aspect: F::Aspect,
    pub(crate) initial_aspect: F::Aspect,
    pub(crate) navigator: F::Navigator,
    pub(crate) surface: Option<F::Surface>,
    pub(crate) drag: Option<DragState<F::Surface>>,
    pub(crate) hover: Option<ScreenPoint>,
    pub(crate) positions: Option<Arc<dyn PositionSupplier>>,
    pub(crate) layer: Option<PlotLayer<F::Surface>>,
}

impl<F: SurfaceFactory> ViewState<F> {
    pub(crate) fn new(profile: F::Profile, aspect: F::Aspect, navigator: F::Navigator) -> Self {
        Self {
            profile,
            initial_aspect: aspect.clone(),
            aspect,
            navigator,
            surface: None,
            drag: None,
            hover: None,
            positions: None,
            layer: None,
        }
    }

    /// Replace the aspect, returning whether it changed.
    pub(crate) fn set_aspect(&mut self, aspect: F::Aspect) -> bool {
        if aspect == self.aspect {
            return false;
        }
        log::trace!("aspect changed to {aspect:?}");
        self.aspect = aspect;
        true
    }

    pub(crate) fn reset(&mut self) -> bool {
        self.drag = None;
        let initial = self.initial_aspect.clone();
        self.set_aspect(initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drag_activates_past_threshold() {
        let mut drag = DragState::new(NavButton::Primary, ScreenPoint::new(10.0, 10.0), ());
        assert!(!drag.track(ScreenPoint::new(12.0, 12.0), 4.0));
        assert!(drag.track(ScreenPoint::new(15.0, 10.0), 4.0));
        // stays active once started
        assert!(drag.track(ScreenPoint::new(10.0, 10.0), 4.0));
    }
}
