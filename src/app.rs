//! Application event loop.
//!
//! A [`Level`] is the scene driver: it registers its textures and shapes once
//! the renderer is ready and then mutates them every frame. [`run`] owns the
//! winit event loop, creates the window, context and renderer, and calls the
//! level and [`Renderer::draw`] on every redraw.
//!
//! # Lifecycle
//!
//! 1. `resumed`: create the window, then (asynchronously) the context, the
//!    renderer and the level
//! 2. every `RedrawRequested`: `Level::on_frame`, then `Renderer::draw`
//! 3. any other window event goes to `Level::on_window_event`

use std::{future::Future, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::Window,
};

use crate::{config::RendererConfig, context::Context, error::RenderError, renderer::Renderer};

/// A scene driver.
pub trait Level: Sized + 'static {
    /// Loads the level's assets and registers them with `renderer`.
    fn init(renderer: &mut Renderer) -> impl Future<Output = anyhow::Result<Self>>;

    /// Advances the level by `dt` and updates the renderer's scene state.
    fn on_frame(&mut self, renderer: &mut Renderer, dt: Duration);

    fn on_window_event(&mut self, _renderer: &mut Renderer, _event: &WindowEvent) {}
}

struct AppState<L> {
    window: Arc<Window>,
    renderer: Renderer,
    level: L,
}

impl<L: Level> AppState<L> {
    async fn new(window: Arc<Window>, config: RendererConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window.clone()).await?;
        let mut renderer = Renderer::init(ctx, config).await?;
        let level = L::init(&mut renderer).await?;
        Ok(Self {
            window,
            renderer,
            level,
        })
    }

    fn redraw(&mut self, dt: Duration) {
        self.level.on_frame(&mut self.renderer, dt);
        match self.renderer.draw() {
            Ok(_) => {}
            // Reconfigure the surface if it's lost or outdated
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                let size = self.window.inner_size();
                self.renderer.resize(size.width, size.height);
            }
            Err(e) => log::error!("Unable to render {}", e),
        }
    }
}

enum AppEvent<L> {
    #[allow(dead_code)]
    Initialized(anyhow::Result<AppState<L>>),
}

struct App<L: Level> {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: EventLoopProxy<AppEvent<L>>,
    config: Option<RendererConfig>,
    state: Option<AppState<L>>,
    last_time: Instant,
}

impl<L: Level> App<L> {
    fn install(&mut self, event_loop: &ActiveEventLoop, state: anyhow::Result<AppState<L>>) {
        match state {
            Ok(state) => {
                let size = state.window.inner_size();
                self.state = Some(state);
                if let Some(state) = &mut self.state {
                    state.renderer.resize(size.width, size.height);
                    state.window.request_redraw();
                }
                self.last_time = Instant::now();
            }
            Err(e) => {
                log::error!("Initialization failed: {e:#}");
                event_loop.exit();
            }
        }
    }
}

impl<L: Level> ApplicationHandler<AppEvent<L>> for App<L> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(config) = self.config.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title("mirror-ngin");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID))
                .and_then(|element| element.dyn_into::<web_sys::HtmlCanvasElement>().ok());
            if canvas.is_none() {
                log::warn!("No <canvas id=\"{CANVAS_ID}\"> found, winit will create one");
            }
            window_attributes = window_attributes.with_canvas(canvas);
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let init_future = AppState::<L>::new(window, config);

        #[cfg(not(target_arch = "wasm32"))]
        {
            let state = self.async_runtime.block_on(init_future);
            self.install(event_loop, state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = init_future.await;
                if proxy.send_event(AppEvent::Initialized(state)).is_err() {
                    log::error!("Event loop closed before the level was initialized");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent<L>) {
        match event {
            // This is the message from our wasm `spawn_local`
            AppEvent::Initialized(state) => self.install(event_loop, state),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.renderer.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                state.redraw(dt);
                state.window.request_redraw();
            }
            other => state.level.on_window_event(&mut state.renderer, &other),
        }
    }
}

/// Opens a window and runs level `L` until the window is closed.
pub fn run<L: Level>(config: RendererConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info)?;
    }

    let event_loop: EventLoop<AppEvent<L>> = EventLoop::with_user_event().build()?;
    let mut app = App {
        #[cfg(not(target_arch = "wasm32"))]
        async_runtime: tokio::runtime::Runtime::new()?,
        proxy: event_loop.create_proxy(),
        config: Some(config),
        state: None,
        last_time: Instant::now(),
    };

    event_loop.run_app(&mut app)?;

    Ok(())
}
