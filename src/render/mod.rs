//! Calibration-driven compositing: uniforms, the CPU reference and the GPU presenter.

pub mod compositor;
pub mod pipeline;
pub mod uniforms;

pub use compositor::render_frame;
pub use pipeline::QuiltPresenter;
pub use uniforms::{UniformBlock, UniformState, Viewport, compute_uniforms};
