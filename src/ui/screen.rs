//! Full-screen artwork display.
//!
//! A single task owns the display store and the renderer. It reacts to:
//! - snapshots from the track poller
//! - artwork and media completions from background tasks
//! - terminal input (q/ESC to quit, focus changes for visibility)
//! - frame ticks, which composite and present one frame each
//!
//! [`ScreenState`] holds the decision logic and returns [`Command`]s for the
//! loop to run in the background, so it can be exercised without a terminal.

use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend, layout::Rect};
use std::io::{self, Stdout};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::artwork::{ArtworkKey, ArtworkResolver, ArtworkResult};
use crate::display::{DisplayStore, DisplayTarget};
use crate::event::{AppEvent, Command};
use crate::render::{MediaError, MediaLoader, MediaSource, Renderer, TransitionOutcome, Visual};
use crate::track::{TrackClient, TrackSnapshot, poller};
use crate::ui::widget::{SurfaceWidget, surface_size};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct ScreenState {
    store: DisplayStore,
    renderer: Renderer,
    /// Target whose media is being loaded.
    pending: Option<DisplayTarget>,
    pub should_exit: bool,
}

impl ScreenState {
    pub fn new(store: DisplayStore, renderer: Renderer) -> Self {
        Self {
            store,
            renderer,
            pending: None,
            should_exit: false,
        }
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<&DisplayTarget> {
        self.pending.as_ref()
    }

    pub fn on_snapshot(&mut self, snapshot: Option<TrackSnapshot>, now: Instant) -> Option<Command> {
        if let Some(key) = self.store.set_snapshot(snapshot) {
            tracing::debug!(artist = %key.artist, album = %key.album, "Resolving artwork");
            return Some(Command::ResolveArtwork(key));
        }
        self.reconcile(now)
    }

    pub fn on_artwork(
        &mut self,
        key: &ArtworkKey,
        artwork: Option<ArtworkResult>,
        now: Instant,
    ) -> Option<Command> {
        if !self.store.set_artwork(key, artwork) {
            tracing::debug!(artist = %key.artist, album = %key.album, "Dropping stale artwork");
            return None;
        }
        self.reconcile(now)
    }

    pub fn on_media(
        &mut self,
        target: DisplayTarget,
        result: Result<MediaSource, MediaError>,
        now: Instant,
    ) -> Option<Command> {
        if self.pending.as_ref() != Some(&target) {
            // Superseded while loading.
            return None;
        }
        self.pending = None;
        match result {
            Ok(source) => {
                let url = source.url().to_string();
                match self.renderer.request_transition(Visual::Media(source), now) {
                    TransitionOutcome::Rejected => {
                        tracing::debug!(url = %url, "Transition in progress, dropping target")
                    }
                    outcome => tracing::debug!(url = %url, ?outcome, "Showing target"),
                }
                None
            }
            Err(e) => {
                let url = target.url.as_deref().unwrap_or_default();
                if target.is_animated {
                    tracing::warn!(url = %url, error = %e, "Animation unplayable, using still");
                    self.store.mark_unplayable(url);
                    return self.reconcile(now);
                }
                tracing::warn!(url = %url, error = %e, "Failed to load artwork");
                None
            }
        }
    }

    /// Bring the renderer toward the store's current target. Returns the
    /// media load to start, if any.
    fn reconcile(&mut self, now: Instant) -> Option<Command> {
        let target = self.store.target()?;
        if self.renderer.is_displaying(target.url.as_deref()) {
            self.pending = None;
            return None;
        }
        if self.pending.as_ref().is_some_and(|p| p.url == target.url) {
            return None;
        }
        self.renderer.advance(now);
        if self.renderer.is_transitioning() {
            tracing::debug!(url = ?target.url, "Transition in progress, dropping target");
            return None;
        }
        if target.url.is_none() {
            self.pending = None;
            self.renderer.request_transition(Visual::Blank, now);
            return None;
        }
        self.pending = Some(target.clone());
        Some(Command::LoadMedia(target))
    }

    /// Handle user input events.
    pub fn on_terminal_event(&mut self, event: Event, visible: &watch::Sender<bool>) {
        match event {
            Event::Key(key) => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_exit = true,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.should_exit = true;
                }
                _ => {}
            },
            Event::FocusGained => {
                visible.send_replace(true);
            }
            Event::FocusLost => {
                visible.send_replace(false);
            }
            _ => {}
        }
    }
}

/// Everything the screen needs to run.
pub struct ScreenConfig {
    pub username: String,
    pub initial: Option<TrackSnapshot>,
    pub tracks: TrackClient,
    pub resolver: ArtworkResolver,
    pub loader: MediaLoader,
    pub placeholder: Option<String>,
    pub fps: u32,
    pub pixel_density: f32,
}

/// Restores the terminal even when the loop exits with an error.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, BoxError> {
        enable_raw_mode().map_err(to_boxed_err)?;
        execute!(io::stdout(), EnterAlternateScreen, EnableFocusChange).map_err(to_boxed_err)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn spawn_command(cmd: Command, resolver: &ArtworkResolver, loader: &MediaLoader, tx: &mpsc::Sender<AppEvent>) {
    let tx = tx.clone();
    match cmd {
        Command::ResolveArtwork(key) => {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                let artwork = resolver.resolve(&key).await;
                let _ = tx.send(AppEvent::Artwork(key, artwork)).await;
            });
        }
        Command::LoadMedia(target) => {
            let loader = loader.clone();
            tokio::spawn(async move {
                let result = loader.load(&target).await;
                let _ = tx.send(AppEvent::Media(target, result)).await;
            });
        }
    }
}

/// Hand a terminal event to the screen loop. Returns `false` once the loop
/// is gone. A full channel drops the event: bursts of resize or focus
/// events during a slow frame are not worth blocking on.
fn forward_input(tx: &mpsc::Sender<Event>, event: Event) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            tracing::trace!(event = ?dropped, "Input channel full, dropping event");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Run the display until the user quits.
pub async fn run(cfg: ScreenConfig) -> Result<(), BoxError> {
    let ScreenConfig {
        username,
        initial,
        tracks,
        resolver,
        loader,
        placeholder,
        fps,
        pixel_density,
    } = cfg;

    let (visible_tx, visible_rx) = watch::channel(true);
    let (snapshot_tx, mut snapshot_rx) = mpsc::channel(8);
    let (app_tx, mut app_rx) = mpsc::channel::<AppEvent>(32);
    let poller = tokio::spawn(poller::run(
        tracks,
        username,
        initial.clone(),
        snapshot_tx,
        visible_rx,
    ));
    {
        let loader = loader.clone();
        tokio::spawn(async move { loader.preload_placeholder().await });
    }

    let guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal: Terminal<CrosstermBackend<Stdout>> = Terminal::new(backend).map_err(to_boxed_err)?;
    let size = terminal.size().map_err(to_boxed_err)?;
    let (width, height) = surface_size(Rect::new(0, 0, size.width, size.height));

    let mut state = ScreenState::new(
        DisplayStore::new(placeholder),
        Renderer::new(width, height, pixel_density),
    );

    // A dedicated thread reads crossterm events and exits once the receiver
    // is gone.
    let (event_tx, mut event_rx) = mpsc::channel(32);
    thread::spawn(move || {
        loop {
            match crossterm::event::poll(Duration::from_millis(100)) {
                Ok(true) => match crossterm::event::read() {
                    Ok(ev) => {
                        if !forward_input(&event_tx, ev) {
                            break;
                        }
                    }
                    Err(_) => {}
                },
                Ok(false) => {}
                Err(_) => thread::sleep(Duration::from_millis(100)),
            }
        }
    });

    if let Some(cmd) = state.on_snapshot(initial, Instant::now()) {
        spawn_command(cmd, &resolver, &loader, &app_tx);
    }

    let mut frames = tokio::time::interval(Duration::from_secs(1) / fps.max(1));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let result = loop {
        if state.should_exit {
            break Ok(());
        }
        tokio::select! {
            biased;

            maybe_event = event_rx.recv() => {
                match maybe_event {
                    Some(event) => state.on_terminal_event(event, &visible_tx),
                    None => state.should_exit = true,
                }
            }

            Some(snapshot) = snapshot_rx.recv() => {
                if let Some(cmd) = state.on_snapshot(snapshot, Instant::now()) {
                    spawn_command(cmd, &resolver, &loader, &app_tx);
                }
            }

            Some(event) = app_rx.recv() => {
                let now = Instant::now();
                let cmd = match event {
                    AppEvent::Artwork(key, artwork) => state.on_artwork(&key, artwork, now),
                    AppEvent::Media(target, result) => state.on_media(target, result, now),
                };
                if let Some(cmd) = cmd {
                    spawn_command(cmd, &resolver, &loader, &app_tx);
                }
            }

            _ = frames.tick() => {
                if let Err(e) = draw(&mut terminal, state.renderer_mut()) {
                    break Err(e);
                }
            }
        }
    };

    poller.abort();
    drop(guard);
    result
}

fn draw(terminal: &mut Terminal<CrosstermBackend<Stdout>>, renderer: &mut Renderer) -> Result<(), BoxError> {
    terminal
        .draw(|f| {
            let area = f.area();
            let (width, height) = surface_size(area);
            renderer.resize(width, height);
            let surface = renderer.draw_frame(Instant::now());
            f.render_widget(SurfaceWidget::new(surface), area);
        })
        .map_err(to_boxed_err)?;
    Ok(())
}

fn to_boxed_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> BoxError {
    Box::new(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;
    use image::{Rgb, RgbImage};

    const PLACEHOLDER: &str = "placeholder.png";
    const ANIMATED: &str = "https://cdn.example/2160x2160/loop.mp4";

    fn playing(album: &str) -> Option<TrackSnapshot> {
        Some(TrackSnapshot {
            track: "Song".into(),
            artist: "Band".into(),
            album: album.into(),
            is_playing: true,
        })
    }

    fn cover(url: &str, animated: Option<&str>) -> Option<ArtworkResult> {
        Some(ArtworkResult {
            image_url: url.into(),
            animated_url: animated.map(str::to_string),
        })
    }

    fn state() -> ScreenState {
        ScreenState::new(
            DisplayStore::new(Some(PLACEHOLDER.into())),
            Renderer::new(4, 4, 1.0),
        )
    }

    fn media(url: &str) -> Result<MediaSource, MediaError> {
        Ok(MediaSource::still(url, RgbImage::from_pixel(2, 2, Rgb([50, 60, 70]))))
    }

    fn still(url: &str) -> DisplayTarget {
        DisplayTarget::still(Some(url.into()))
    }

    fn load(cmd: Option<Command>) -> DisplayTarget {
        match cmd {
            Some(Command::LoadMedia(target)) => target,
            other => panic!("expected a media load, got {other:?}"),
        }
    }

    fn resolve(cmd: Option<Command>) -> ArtworkKey {
        match cmd {
            Some(Command::ResolveArtwork(key)) => key,
            other => panic!("expected artwork resolution, got {other:?}"),
        }
    }

    /// Complete the media load requested by `cmd` and check it is on screen.
    fn show(state: &mut ScreenState, cmd: Option<Command>, now: Instant) {
        let target = load(cmd);
        let url = target.url.clone().unwrap();
        assert_eq!(state.on_media(target, media(&url), now), None);
        assert!(state.renderer().is_displaying(Some(&url)));
    }

    #[test]
    fn no_track_shows_placeholder() {
        let now = Instant::now();
        let mut state = state();
        let cmd = state.on_snapshot(None, now);
        assert_eq!(load(cmd.clone()), still(PLACEHOLDER));
        show(&mut state, cmd, now);
        assert!(!state.renderer().is_transitioning());
    }

    #[test]
    fn playing_track_resolves_then_shows_artwork() {
        let t0 = Instant::now();
        let mut state = state();
        let key = resolve(state.on_snapshot(playing("Album"), t0));

        // Held while loading: repeat polls start nothing.
        assert_eq!(state.on_snapshot(playing("Album"), t0), None);

        let cmd = state.on_artwork(&key, cover("cover.jpg", None), t0);
        assert_eq!(load(cmd.clone()), still("cover.jpg"));
        show(&mut state, cmd, t0);
    }

    #[test]
    fn same_url_is_a_no_op() {
        let t0 = Instant::now();
        let mut state = state();
        let cmd = state.on_snapshot(None, t0);
        // While the placeholder loads, repeat polls do not reload it.
        assert_eq!(state.on_snapshot(None, t0), None);
        show(&mut state, cmd, t0);
        // Once displayed, repeat polls are no-ops as well.
        assert_eq!(state.on_snapshot(None, t0), None);
        assert_eq!(state.pending(), None);
    }

    #[test]
    fn target_during_transition_is_dropped_and_retried() {
        let t0 = Instant::now();
        let mut state = state();
        let cmd = state.on_snapshot(None, t0);
        show(&mut state, cmd, t0);

        let key = resolve(state.on_snapshot(playing("One"), t0));
        let target = load(state.on_artwork(&key, cover("one.jpg", None), t0));
        state.on_media(target, media("one.jpg"), t0);
        assert!(state.renderer().is_transitioning());

        // The track disappears 200ms later; the placeholder cannot start mid-fade.
        let t1 = t0 + Duration::from_millis(200);
        assert_eq!(state.on_snapshot(None, t1), None);
        assert!(state.renderer().is_displaying(Some("one.jpg")));

        // The next poll after the fade settles picks it up.
        let t2 = t0 + Duration::from_millis(1600);
        assert_eq!(load(state.on_snapshot(None, t2)), still(PLACEHOLDER));
    }

    #[test]
    fn superseded_media_is_ignored() {
        let t0 = Instant::now();
        let mut state = state();
        let first = load(state.on_snapshot(None, t0));

        let key = resolve(state.on_snapshot(playing("Album"), t0));
        let second = load(state.on_artwork(&key, cover("cover.jpg", None), t0));

        assert_eq!(state.on_media(first, media(PLACEHOLDER), t0), None);
        assert_eq!(state.renderer().displayed(), None);
        assert_eq!(state.pending(), Some(&second));
    }

    #[test]
    fn unplayable_animation_falls_back_to_still() {
        let t0 = Instant::now();
        let mut state = state();
        let key = resolve(state.on_snapshot(playing("Album"), t0));
        let animated = load(state.on_artwork(&key, cover("cover.jpg", Some(ANIMATED)), t0));
        assert!(animated.is_animated);

        let err = Err(MediaError::UnsupportedAnimation("Mp4".into()));
        let cmd = state.on_media(animated, err, t0);
        assert_eq!(load(cmd.clone()), still("cover.jpg"));
        show(&mut state, cmd, t0);
    }

    #[test]
    fn failed_still_keeps_current_visual() {
        let t0 = Instant::now();
        let mut state = state();
        let cmd = state.on_snapshot(None, t0);
        show(&mut state, cmd, t0);

        let key = resolve(state.on_snapshot(playing("Album"), t0));
        let target = load(state.on_artwork(&key, cover("broken.jpg", None), t0));
        assert_eq!(state.on_media(target, Err(MediaError::Empty), t0), None);
        assert!(state.renderer().is_displaying(Some(PLACEHOLDER)));
        assert!(!state.renderer().is_transitioning());
    }

    #[test]
    fn missing_placeholder_fades_to_black() {
        let t0 = Instant::now();
        let mut state = ScreenState::new(DisplayStore::new(None), Renderer::new(2, 2, 0.0));
        let key = resolve(state.on_snapshot(playing("Album"), t0));
        let cmd = state.on_artwork(&key, cover("cover.jpg", None), t0);
        show(&mut state, cmd, t0);

        assert_eq!(state.on_snapshot(None, t0), None);
        assert!(state.renderer().is_displaying(None));
        assert!(state.renderer().is_transitioning());
    }

    #[test]
    fn input_burst_does_not_stop_forwarding() {
        let (tx, mut rx) = mpsc::channel(2);
        for _ in 0..5 {
            assert!(forward_input(&tx, Event::Resize(80, 24)));
        }
        assert_eq!(rx.try_recv().ok(), Some(Event::Resize(80, 24)));
        assert!(forward_input(&tx, Event::FocusLost));

        drop(rx);
        assert!(!forward_input(&tx, Event::FocusGained));
    }

    #[test]
    fn focus_and_quit_keys() {
        let mut state = state();
        let (tx, rx) = watch::channel(true);
        state.on_terminal_event(Event::FocusLost, &tx);
        assert!(!*rx.borrow());
        state.on_terminal_event(Event::FocusGained, &tx);
        assert!(*rx.borrow());
        assert!(!state.should_exit);

        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        state.on_terminal_event(Event::Key(ctrl_c), &tx);
        assert!(state.should_exit);
    }
}
