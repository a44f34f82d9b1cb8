use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::events::{CalibrationReady, PreparedQuilt, QuiltLoaded, ViewerCommand};
use crate::render::{QuiltPresenter, UniformState, Viewport};
use crate::tasks::loader::fit_prepared;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

#[derive(Debug)]
enum ViewerEvent {
    Calibration(CalibrationReady),
    Quilt(Box<PreparedQuilt>),
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewerOptions {
    pub fullscreen: bool,
}

type QuiltReceiver = mpsc::Receiver<QuiltLoaded>;
type CalibrationReceiver = mpsc::Receiver<CalibrationReady>;
type CommandSender = mpsc::Sender<ViewerCommand>;

/// What a key press asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Navigate(ViewerCommand),
    ToggleFullscreen,
    Quit,
}

pub fn key_action(key: &Key) -> Option<KeyAction> {
    match key {
        Key::Named(NamedKey::ArrowRight) | Key::Named(NamedKey::ArrowDown) => {
            Some(KeyAction::Navigate(ViewerCommand::Next))
        }
        Key::Named(NamedKey::ArrowLeft) | Key::Named(NamedKey::ArrowUp) => {
            Some(KeyAction::Navigate(ViewerCommand::Previous))
        }
        Key::Named(NamedKey::Escape) => Some(KeyAction::Quit),
        Key::Character(c) if c.eq_ignore_ascii_case("q") => Some(KeyAction::Quit),
        Key::Character(c) if c.eq_ignore_ascii_case("f") => Some(KeyAction::ToggleFullscreen),
        _ => None,
    }
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    presenter: QuiltPresenter,
}

struct ViewerApp {
    opts: ViewerOptions,
    cancel: CancellationToken,
    commands: CommandSender,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    uniforms: UniformState,
    pending_quilt: Option<PreparedQuilt>,
}

impl ViewerApp {
    fn new(opts: ViewerOptions, cancel: CancellationToken, commands: CommandSender) -> Self {
        Self {
            opts,
            cancel,
            commands,
            window: None,
            gpu: None,
            uniforms: UniformState::new(Viewport::new(1, 1)),
            pending_quilt: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title("Quilt Viewer");
        if self.opts.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured"
        );

        let presenter = QuiltPresenter::new(&device, format);
        self.uniforms
            .set_viewport(Viewport::new(config.width, config.height));
        self.gpu = Some(Gpu {
            surface,
            config,
            device,
            queue,
            presenter,
        });

        if let Some(quilt) = self.pending_quilt.take() {
            self.show_quilt(quilt);
        }
        Ok(())
    }

    fn show_quilt(&mut self, quilt: PreparedQuilt) {
        let Some(gpu) = self.gpu.as_mut() else {
            self.pending_quilt = Some(quilt);
            return;
        };
        let limit = gpu.device.limits().max_texture_dimension_2d;
        if quilt.width.max(quilt.height) > limit {
            debug!(
                width = quilt.width,
                height = quilt.height,
                limit,
                "quilt exceeds device texture limit; downsizing"
            );
        }
        let quilt = match fit_prepared(quilt, limit) {
            Ok(quilt) => quilt,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to fit quilt to device limits");
                return;
            }
        };
        if let Err(err) = gpu.presenter.set_quilt(
            &gpu.device,
            &gpu.queue,
            quilt.width,
            quilt.height,
            &quilt.pixels,
        ) {
            warn!(path = %quilt.path.display(), error = %err, "quilt rejected by GPU presenter");
            return;
        }
        self.uniforms.set_tiles(quilt.tiles);
        if let Some(window) = self.window.as_ref() {
            let name = quilt
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            window.set_title(&format!("Quilt Viewer - {name} ({})", quilt.tiles));
        }
        info!(path = %quilt.path.display(), tiles = %quilt.tiles, "showing quilt");
        self.request_redraw();
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.config.width = new_size.width.max(1);
        gpu.config.height = new_size.height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);
        self.uniforms
            .set_viewport(Viewport::new(gpu.config.width, gpu.config.height));
        debug!(
            width = gpu.config.width,
            height = gpu.config.height,
            "viewer surface resized"
        );
        self.request_redraw();
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(other) => {
                warn!(error = %other, "viewer surface reported an error; retrying");
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
                return;
            }
        };

        gpu.presenter.upload_uniforms(&gpu.queue, &mut self.uniforms);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewer-encoder"),
            });
        gpu.presenter.draw(&mut encoder, &view, CLEAR_COLOR);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let Some(action) = key_action(&event.logical_key) else {
            return;
        };
        match action {
            KeyAction::Navigate(cmd) => {
                if let Err(err) = self.commands.try_send(cmd) {
                    warn!(?cmd, error = %err, "playlist busy; dropping navigation");
                }
            }
            KeyAction::ToggleFullscreen => {
                if let Some(window) = self.window.as_ref() {
                    let next = match window.fullscreen() {
                        Some(_) => None,
                        None => Some(Fullscreen::Borderless(None)),
                    };
                    debug!(fullscreen = next.is_some(), "toggling fullscreen");
                    window.set_fullscreen(next);
                }
            }
            KeyAction::Quit => {
                info!("quit requested from keyboard");
                event_loop.exit();
            }
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gpu.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                self.handle_resize(size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, &event);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Calibration(CalibrationReady(resolved)) => {
                info!(
                    serial = %resolved.profile.serial,
                    live = resolved.is_live(),
                    "calibration active"
                );
                self.uniforms.set_profile(resolved.profile);
                self.request_redraw();
            }
            ViewerEvent::Quilt(quilt) => self.show_quilt(*quilt),
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Forward channel messages into the winit loop until either side closes.
fn spawn_forwarders(
    proxy: EventLoopProxy<ViewerEvent>,
    mut quilts: QuiltReceiver,
    mut calibration: CalibrationReceiver,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut calibration_open = true;
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => ViewerEvent::Cancelled,
                Some(QuiltLoaded(quilt)) = quilts.recv() => ViewerEvent::Quilt(Box::new(quilt)),
                ready = calibration.recv(), if calibration_open => match ready {
                    Some(ready) => ViewerEvent::Calibration(ready),
                    None => {
                        calibration_open = false;
                        continue;
                    }
                },
                else => break,
            };
            let done = matches!(event, ViewerEvent::Cancelled);
            if proxy.send_event(event).is_err() || done {
                break;
            }
        }
    })
}

/// Run the window on the calling thread until it closes or `cancel` fires.
pub fn run_windowed(
    from_loader: QuiltReceiver,
    calibration: CalibrationReceiver,
    commands: CommandSender,
    cancel: CancellationToken,
    opts: ViewerOptions,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();
    let forwarders = spawn_forwarders(proxy, from_loader, calibration, cancel.clone());

    let mut app = ViewerApp::new(opts, cancel, commands);
    let run_result = event_loop.run_app(&mut app);
    forwarders.abort();

    run_result.context("viewer event loop failed")
}
