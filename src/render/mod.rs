//! Transition renderer.
//!
//! The renderer owns at most two visuals: the current one and, while a
//! crossfade runs, the incoming one. Every frame is composited from scratch
//! into a [`Surface`]:
//!
//! - Steady: the current visual at full opacity.
//! - Transitioning: the incoming visual at full opacity, then the outgoing
//!   visual on top at `1 - eased` opacity, blurred by `eased * max_blur`.
//!
//! Requests that arrive while a crossfade is running are rejected rather than
//! queued.

pub mod clock;
pub mod media;
pub mod surface;

use image::RgbImage;
use std::time::{Duration, Instant};

pub use clock::{TransitionClock, ease_in_out_quad};
pub use media::{MediaError, MediaLoader, MediaSource};
pub use surface::Surface;

pub const TRANSITION_DURATION: Duration = Duration::from_millis(1500);

/// Blur radius at the end of a crossfade, in surface pixels at density 1.
pub const BASE_MAX_BLUR: f32 = 3.0;

/// Something the renderer can show.
#[derive(Debug, Clone)]
pub enum Visual {
    /// Solid black, used when there is nothing to show.
    Blank,
    Media(MediaSource),
}

impl Visual {
    pub fn url(&self) -> Option<&str> {
        match self {
            Visual::Blank => None,
            Visual::Media(source) => Some(source.url()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RendererState {
    Steady,
    Transitioning(TransitionClock),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Nothing was on screen yet; the visual is shown directly.
    Shown,
    Started,
    /// A crossfade is already running.
    Rejected,
}

/// Cover projection of one frame, reused until the frame or size changes.
struct Projection {
    frame: usize,
    width: u32,
    height: u32,
    image: RgbImage,
}

struct Layer {
    visual: Visual,
    shown_at: Instant,
    projection: Option<Projection>,
}

impl Layer {
    fn new(visual: Visual, now: Instant) -> Self {
        Self {
            visual,
            shown_at: now,
            projection: None,
        }
    }

    /// Draw onto `out`. Blank layers darken instead of drawing.
    fn draw(&mut self, out: &mut Surface, now: Instant, opacity: f32, blur: f32) {
        let Visual::Media(source) = &self.visual else {
            out.darken(opacity);
            return;
        };
        let (width, height) = (out.width(), out.height());
        let frame = source.frame_index_at(now.saturating_duration_since(self.shown_at));
        let stale = self
            .projection
            .as_ref()
            .is_none_or(|p| p.frame != frame || p.width != width || p.height != height);
        if stale {
            self.projection = Some(Projection {
                frame,
                width,
                height,
                image: surface::project_cover(source.frame(frame), width, height),
            });
        }
        let Some(projection) = &self.projection else {
            return;
        };
        if blur > 0.0 {
            out.blend(&surface::blurred(&projection.image, blur), opacity);
        } else {
            out.blend(&projection.image, opacity);
        }
    }
}

pub struct Renderer {
    state: RendererState,
    current: Option<Layer>,
    next: Option<Layer>,
    surface: Surface,
    max_blur: f32,
}

impl Renderer {
    pub fn new(width: u32, height: u32, pixel_density: f32) -> Self {
        Self {
            state: RendererState::Steady,
            current: None,
            next: None,
            surface: Surface::new(width, height),
            max_blur: BASE_MAX_BLUR * pixel_density.max(0.0),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, RendererState::Transitioning(_))
    }

    /// URL of the visual the renderer is showing or fading in; `None` when
    /// nothing has been shown yet.
    pub fn displayed(&self) -> Option<Option<&str>> {
        self.next
            .as_ref()
            .or(self.current.as_ref())
            .map(|layer| layer.visual.url())
    }

    pub fn is_displaying(&self, url: Option<&str>) -> bool {
        self.displayed() == Some(url)
    }

    /// Resizing only reallocates the surface; a running crossfade keeps its
    /// clock.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.resize(width, height) {
            tracing::debug!(width, height, "Render surface resized");
        }
    }

    #[cfg(test)]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Start a crossfade to `visual`.
    pub fn request_transition(&mut self, visual: Visual, now: Instant) -> TransitionOutcome {
        self.advance(now);
        if self.is_transitioning() {
            return TransitionOutcome::Rejected;
        }
        if self.current.is_none() {
            self.current = Some(Layer::new(visual, now));
            return TransitionOutcome::Shown;
        }
        self.next = Some(Layer::new(visual, now));
        self.state = RendererState::Transitioning(TransitionClock::start(now, TRANSITION_DURATION));
        TransitionOutcome::Started
    }

    /// Settle a finished crossfade. The outgoing visual is dropped here.
    pub fn advance(&mut self, now: Instant) {
        if let RendererState::Transitioning(clock) = self.state
            && clock.is_finished(now)
        {
            if let Some(next) = self.next.take() {
                self.current = Some(next);
            }
            self.state = RendererState::Steady;
        }
    }

    /// Composite one frame for `now`.
    pub fn draw_frame(&mut self, now: Instant) -> &Surface {
        self.advance(now);
        let Renderer {
            state,
            current,
            next,
            surface,
            max_blur,
        } = self;
        surface.clear();
        match state {
            RendererState::Transitioning(clock) => {
                let eased = ease_in_out_quad(clock.progress(now));
                if let Some(incoming) = next {
                    incoming.draw(surface, now, 1.0, 0.0);
                }
                if let Some(outgoing) = current {
                    outgoing.draw(surface, now, 1.0 - eased, eased * *max_blur);
                }
            }
            RendererState::Steady => {
                if let Some(active) = current {
                    active.draw(surface, now, 1.0, 0.0);
                }
            }
        }
        &self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(url: &str, color: [u8; 3]) -> Visual {
        Visual::Media(MediaSource::still(url, RgbImage::from_pixel(8, 8, Rgb(color))))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_visual_is_shown_without_transition() {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(4, 4, 1.0);
        assert_eq!(renderer.displayed(), None);
        assert_eq!(renderer.request_transition(solid("a", [255, 0, 0]), t0), TransitionOutcome::Shown);
        assert!(!renderer.is_transitioning());
        assert_eq!(renderer.draw_frame(t0).pixel(0, 0), [255, 0, 0]);
    }

    #[test]
    fn crossfade_runs_for_fixed_duration() {
        let t0 = Instant::now();
        // Zero density disables blur so the mix is exact.
        let mut renderer = Renderer::new(4, 4, 0.0);
        renderer.request_transition(solid("a", [255, 0, 0]), t0);
        assert_eq!(renderer.request_transition(solid("b", [0, 0, 255]), t0), TransitionOutcome::Started);
        assert!(renderer.is_displaying(Some("b")));

        // Start: outgoing fully opaque on top.
        assert_eq!(renderer.draw_frame(t0).pixel(1, 1), [255, 0, 0]);
        // Halfway: eased progress 0.5, equal mix.
        let mid = renderer.draw_frame(t0 + ms(750)).pixel(2, 2);
        assert!((126..=129).contains(&mid[0]) && (126..=129).contains(&mid[2]), "{mid:?}");
        assert!(renderer.is_transitioning());

        assert_eq!(renderer.draw_frame(t0 + TRANSITION_DURATION).pixel(1, 1), [0, 0, 255]);
        assert_eq!(renderer.state(), RendererState::Steady);
        assert!(renderer.is_displaying(Some("b")));
    }

    #[test]
    fn requests_during_crossfade_are_dropped() {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(4, 4, 1.0);
        renderer.request_transition(solid("initial", [0, 0, 0]), t0);

        assert_eq!(renderer.request_transition(solid("first", [255, 0, 0]), t0), TransitionOutcome::Started);
        assert_eq!(
            renderer.request_transition(solid("second", [0, 255, 0]), t0 + ms(200)),
            TransitionOutcome::Rejected
        );

        renderer.draw_frame(t0 + ms(1500));
        assert_eq!(renderer.state(), RendererState::Steady);
        assert!(renderer.is_displaying(Some("first")));
        assert_eq!(renderer.surface().pixel(0, 0), [255, 0, 0]);

        // Once settled, the next request is accepted again.
        assert_eq!(
            renderer.request_transition(solid("second", [0, 255, 0]), t0 + ms(1500)),
            TransitionOutcome::Started
        );
    }

    #[test]
    fn resize_keeps_transition_timing() {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(4, 4, 1.0);
        renderer.request_transition(solid("a", [255, 0, 0]), t0);
        renderer.request_transition(solid("b", [0, 0, 255]), t0);
        let before = renderer.state();

        renderer.resize(10, 6);
        assert_eq!(renderer.state(), before);
        let surface = renderer.draw_frame(t0 + ms(1499));
        assert_eq!((surface.width(), surface.height()), (10, 6));
        assert!(renderer.is_transitioning());
        renderer.draw_frame(t0 + ms(1500));
        assert!(!renderer.is_transitioning());
    }

    #[test]
    fn blank_target_fades_to_black() {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(2, 2, 0.0);
        renderer.request_transition(solid("a", [200, 200, 200]), t0);
        renderer.request_transition(Visual::Blank, t0);
        assert!(renderer.is_displaying(None));
        let mid = renderer.draw_frame(t0 + ms(750)).pixel(0, 0);
        assert_eq!(mid, [100, 100, 100]);
        assert_eq!(renderer.draw_frame(t0 + ms(1600)).pixel(0, 0), [0, 0, 0]);
    }

    /// Left half white, right half black.
    fn split(url: &str) -> Visual {
        let image = RgbImage::from_fn(16, 4, |x, _| if x < 8 { Rgb([255; 3]) } else { Rgb([0; 3]) });
        Visual::Media(MediaSource::still(url, image))
    }

    fn mid_fade_row(pixel_density: f32) -> Vec<u8> {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(16, 4, pixel_density);
        renderer.request_transition(split("edge"), t0);
        renderer.request_transition(solid("black", [0, 0, 0]), t0);
        let surface = renderer.draw_frame(t0 + ms(750));
        (0..16).map(|x| surface.pixel(x, 2)[0]).collect()
    }

    #[test]
    fn outgoing_visual_is_blurred_mid_fade() {
        // Without blur the edge would be a hard 128 | 0 step.
        let sharp = mid_fade_row(0.0);
        assert_eq!((sharp[7], sharp[8]), (128, 0));

        let soft = mid_fade_row(1.0);
        assert!(soft[7] < 127, "{soft:?}");
        assert!(soft[8] > 0, "{soft:?}");

        // Blur radius scales with pixel density.
        let softer = mid_fade_row(2.0);
        assert!(softer[7] < 127 && softer[8] > 0, "{softer:?}");
        assert_ne!(soft, softer);
    }

    #[test]
    fn no_blur_at_transition_start() {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(16, 4, 2.0);
        renderer.request_transition(split("edge"), t0);
        renderer.request_transition(solid("black", [0, 0, 0]), t0);
        let surface = renderer.draw_frame(t0);
        assert_eq!(surface.pixel(7, 2), [255, 255, 255]);
        assert_eq!(surface.pixel(8, 2), [0, 0, 0]);
    }

    #[test]
    fn at_most_two_visuals_are_held() {
        let t0 = Instant::now();
        let mut renderer = Renderer::new(2, 2, 1.0);
        renderer.request_transition(solid("a", [1, 1, 1]), t0);
        renderer.request_transition(solid("b", [2, 2, 2]), t0);
        renderer.advance(t0 + TRANSITION_DURATION);
        assert!(renderer.next.is_none());
        assert_eq!(renderer.current.as_ref().and_then(|l| l.visual.url()), Some("b"));
    }
}
